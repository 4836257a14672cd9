use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::info;

use crate::encoder::{EncodeError, TeamEncoder};
use crate::forest::RandomForest;
use crate::preprocess::{FEATURE_NAMES, MatchResult};

pub const ARTIFACT_VERSION: u32 = 1;
pub const MODEL_FILE: &str = "rf_model.json";
pub const ENCODER_FILE: &str = "team_mapping.json";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid artifact json in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialize artifact: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("{path} has artifact version {found}, expected {expected}")]
    Version {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("{path} content does not match its recorded fingerprint")]
    Corrupt { path: PathBuf },

    #[error("model was trained with encoder {model_expects}, found encoder {encoder_has}")]
    EncoderMismatch {
        model_expects: String,
        encoder_has: String,
    },

    #[error("model feature columns {found:?} do not match {expected:?}")]
    FeatureOrder {
        found: Vec<String>,
        expected: Vec<String>,
    },

    #[error("model forest is malformed")]
    MalformedForest,

    #[error("encoder artifact rejected: {0}")]
    Encoding(#[from] EncodeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub encoder: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            model: dir.join(MODEL_FILE),
            encoder: dir.join(ENCODER_FILE),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderArtifact {
    pub version: u32,
    pub generated_at: String,
    pub fingerprint: String,
    pub codes: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    pub generated_at: String,
    pub encoder_fingerprint: String,
    pub feature_names: Vec<String>,
    pub classes: Vec<MatchResult>,
    pub forest: RandomForest,
}

/// A model and the encoder it was trained with, checked against each other.
#[derive(Debug, Clone)]
pub struct ArtifactPair {
    pub encoder: TeamEncoder,
    pub model: RandomForest,
    pub generated_at: String,
}

/// Write both artifacts to temporary siblings, then move them into place:
/// encoder first, model last. A crash in between leaves an old model next to
/// a new encoder, which `load_pair` rejects on the fingerprint.
pub fn save_pair(
    paths: &ArtifactPaths,
    encoder: &TeamEncoder,
    model: &RandomForest,
) -> Result<String, ArtifactError> {
    let generated_at = Utc::now().to_rfc3339();
    let fingerprint = encoder.fingerprint();

    let encoder_artifact = EncoderArtifact {
        version: ARTIFACT_VERSION,
        generated_at: generated_at.clone(),
        fingerprint: fingerprint.clone(),
        codes: encoder.codes().clone(),
    };
    let model_artifact = ModelArtifact {
        version: ARTIFACT_VERSION,
        generated_at: generated_at.clone(),
        encoder_fingerprint: fingerprint.clone(),
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        classes: MatchResult::ALL.to_vec(),
        forest: model.clone(),
    };

    let encoder_tmp = write_tmp(&paths.encoder, &encoder_artifact)?;
    let model_tmp = write_tmp(&paths.model, &model_artifact)?;
    swap_into_place(&encoder_tmp, &paths.encoder)?;
    swap_into_place(&model_tmp, &paths.model)?;

    info!(
        model = %paths.model.display(),
        encoder = %paths.encoder.display(),
        fingerprint = %fingerprint,
        "artifact pair saved"
    );
    Ok(fingerprint)
}

pub fn load_encoder(path: &Path) -> Result<TeamEncoder, ArtifactError> {
    let artifact: EncoderArtifact = read_json(path)?;
    check_version(path, artifact.version)?;
    let encoder = TeamEncoder::from_codes(artifact.codes)?;
    if encoder.fingerprint() != artifact.fingerprint {
        return Err(ArtifactError::Corrupt {
            path: path.to_path_buf(),
        });
    }
    Ok(encoder)
}

/// Load and cross-check a model/encoder pair. Any mismatch is fatal.
pub fn load_pair(paths: &ArtifactPaths) -> Result<ArtifactPair, ArtifactError> {
    let encoder = load_encoder(&paths.encoder)?;

    let model: ModelArtifact = read_json(&paths.model)?;
    check_version(&paths.model, model.version)?;

    let encoder_has = encoder.fingerprint();
    if model.encoder_fingerprint != encoder_has {
        return Err(ArtifactError::EncoderMismatch {
            model_expects: model.encoder_fingerprint,
            encoder_has,
        });
    }
    if model.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES) {
        return Err(ArtifactError::FeatureOrder {
            found: model.feature_names,
            expected: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        });
    }
    if model.classes != MatchResult::ALL || !model.forest.is_well_formed() {
        return Err(ArtifactError::MalformedForest);
    }

    Ok(ArtifactPair {
        encoder,
        model: model.forest,
        generated_at: model.generated_at,
    })
}

fn check_version(path: &Path, found: u32) -> Result<(), ArtifactError> {
    if found == ARTIFACT_VERSION {
        return Ok(());
    }
    Err(ArtifactError::Version {
        path: path.to_path_buf(),
        found,
        expected: ARTIFACT_VERSION,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let raw = fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn write_tmp<T: Serialize>(path: &Path, value: &T) -> Result<PathBuf, ArtifactError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ArtifactError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_vec(value).map_err(ArtifactError::Serialize)?;
    fs::write(&tmp, json).map_err(|source| ArtifactError::Io {
        path: tmp.clone(),
        source,
    })?;
    Ok(tmp)
}

fn swap_into_place(tmp: &Path, path: &Path) -> Result<(), ArtifactError> {
    fs::rename(tmp, path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

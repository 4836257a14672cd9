use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::info;

use crate::dataset::MatchRecord;
use crate::encoder::{EncodeError, TeamEncoder};

/// Feature columns, in the order the classifier consumes them.
pub const FEATURE_NAMES: [&str; 3] = ["home_team_code", "away_team_code", "neutral"];

/// Matches on or before this date are excluded from training.
pub fn modern_era_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or(NaiveDate::MIN)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatchResult {
    Draw,
    HomeWin,
    AwayWin,
}

impl MatchResult {
    pub const ALL: [MatchResult; 3] = [MatchResult::Draw, MatchResult::HomeWin, MatchResult::AwayWin];

    pub fn code(self) -> u8 {
        match self {
            MatchResult::Draw => 0,
            MatchResult::HomeWin => 1,
            MatchResult::AwayWin => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(MatchResult::Draw),
            1 => Some(MatchResult::HomeWin),
            2 => Some(MatchResult::AwayWin),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self.code() as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            MatchResult::Draw => "draw",
            MatchResult::HomeWin => "home_win",
            MatchResult::AwayWin => "away_win",
        }
    }
}

// Wire and artifact form is the bare class code.
impl Serialize for MatchResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for MatchResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        MatchResult::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown match result code {code}")))
    }
}

/// Strict inequalities both ways; equal scores are a draw.
pub fn classify_result(home_score: u32, away_score: u32) -> MatchResult {
    if home_score > away_score {
        MatchResult::HomeWin
    } else if away_score > home_score {
        MatchResult::AwayWin
    } else {
        MatchResult::Draw
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f64; 3]);

impl FeatureVector {
    pub fn new(home_team_code: u32, away_team_code: u32, neutral: bool) -> Self {
        Self([
            f64::from(home_team_code),
            f64::from(away_team_code),
            if neutral { 1.0 } else { 0.0 },
        ])
    }

    pub fn values(&self) -> &[f64; 3] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchExample {
    pub home_team_code: u32,
    pub away_team_code: u32,
    pub neutral: u8,
    pub result: MatchResult,
}

impl MatchExample {
    pub fn features(&self) -> FeatureVector {
        FeatureVector::new(self.home_team_code, self.away_team_code, self.neutral != 0)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("raw corpus is empty")]
    EmptyCorpus,

    #[error("no scored matches after the {cutoff} cutoff ({raw_rows} raw rows)")]
    EmptyAfterCutoff { cutoff: NaiveDate, raw_rows: usize },

    #[error("encoding failed while building examples: {0}")]
    Encoding(#[from] EncodeError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassCounts {
    pub draw: usize,
    pub home_win: usize,
    pub away_win: usize,
}

impl ClassCounts {
    pub fn from_examples(examples: &[MatchExample]) -> Self {
        let mut counts = Self::default();
        for example in examples {
            match example.result {
                MatchResult::Draw => counts.draw += 1,
                MatchResult::HomeWin => counts.home_win += 1,
                MatchResult::AwayWin => counts.away_win += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.draw + self.home_win + self.away_win
    }

    pub fn share(&self, class: MatchResult) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let n = match class {
            MatchResult::Draw => self.draw,
            MatchResult::HomeWin => self.home_win,
            MatchResult::AwayWin => self.away_win,
        };
        n as f64 / total as f64
    }
}

#[derive(Debug, Clone)]
pub struct PreprocessSummary {
    pub raw_rows: usize,
    pub pre_cutoff: usize,
    pub unscored: usize,
    pub kept: usize,
    pub teams_encoded: usize,
    pub classes: ClassCounts,
}

#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub examples: Vec<MatchExample>,
    pub encoder: TeamEncoder,
    pub summary: PreprocessSummary,
}

/// Raw records → modern-era examples plus the encoder that produced them.
///
/// The encoder is fit over every home and away name in the full corpus, before
/// the cutoff filter, so the vocabulary covers teams that only appear in
/// older or unplayed fixtures too.
pub fn preprocess(records: &[MatchRecord]) -> Result<Preprocessed, PipelineError> {
    preprocess_with_cutoff(records, modern_era_cutoff())
}

pub fn preprocess_with_cutoff(
    records: &[MatchRecord],
    cutoff: NaiveDate,
) -> Result<Preprocessed, PipelineError> {
    if records.is_empty() {
        return Err(PipelineError::EmptyCorpus);
    }

    let encoder = TeamEncoder::fit(
        records
            .iter()
            .flat_map(|r| [r.home_team.as_str(), r.away_team.as_str()]),
    );

    let mut examples = Vec::new();
    let mut pre_cutoff = 0usize;
    let mut unscored = 0usize;
    for record in records {
        if record.date <= cutoff {
            pre_cutoff += 1;
            continue;
        }
        let Some(result) = record.result() else {
            unscored += 1;
            continue;
        };
        examples.push(MatchExample {
            home_team_code: encoder.encode(&record.home_team)?,
            away_team_code: encoder.encode(&record.away_team)?,
            neutral: u8::from(record.neutral),
            result,
        });
    }

    if examples.is_empty() {
        return Err(PipelineError::EmptyAfterCutoff {
            cutoff,
            raw_rows: records.len(),
        });
    }

    let classes = ClassCounts::from_examples(&examples);
    let summary = PreprocessSummary {
        raw_rows: records.len(),
        pre_cutoff,
        unscored,
        kept: examples.len(),
        teams_encoded: encoder.len(),
        classes,
    };
    info!(
        raw_rows = summary.raw_rows,
        kept = summary.kept,
        unscored = summary.unscored,
        teams = summary.teams_encoded,
        "preprocessing complete"
    );
    info!(
        home_win = classes.share(MatchResult::HomeWin),
        away_win = classes.share(MatchResult::AwayWin),
        draw = classes.share(MatchResult::Draw),
        "result distribution"
    );

    Ok(Preprocessed {
        examples,
        encoder,
        summary,
    })
}

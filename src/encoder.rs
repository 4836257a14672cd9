use std::collections::{BTreeMap, HashMap};

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("team '{0}' has no code in the persisted encoder")]
    UnknownTeam(String),

    #[error("teams '{first}' and '{second}' share code {code}")]
    DuplicateCode {
        code: u32,
        first: String,
        second: String,
    },
}

/// Team name → integer code. Fit once over the training corpus, then frozen:
/// the same mapping produces the training features and serves requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamEncoder {
    codes: BTreeMap<String, u32>,
}

impl TeamEncoder {
    /// Codes follow the code point order of the distinct names, starting at 0.
    pub fn fit<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let distinct = names
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect::<std::collections::BTreeSet<_>>();
        let codes = distinct
            .into_iter()
            .enumerate()
            .map(|(idx, name)| (name, idx as u32))
            .collect();
        Self { codes }
    }

    /// Rebuild from a persisted mapping. Two names sharing a code would alias
    /// each other at inference time, so that is rejected.
    pub fn from_codes(codes: BTreeMap<String, u32>) -> Result<Self, EncodeError> {
        let mut seen: HashMap<u32, &str> = HashMap::with_capacity(codes.len());
        for (name, code) in &codes {
            if let Some(first) = seen.insert(*code, name) {
                return Err(EncodeError::DuplicateCode {
                    code: *code,
                    first: first.to_string(),
                    second: name.clone(),
                });
            }
        }
        Ok(Self { codes })
    }

    pub fn encode(&self, team: &str) -> Result<u32, EncodeError> {
        self.codes
            .get(team)
            .copied()
            .ok_or_else(|| EncodeError::UnknownTeam(team.to_string()))
    }

    pub fn contains(&self, team: &str) -> bool {
        self.codes.contains_key(team)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn codes(&self) -> &BTreeMap<String, u32> {
        &self.codes
    }

    /// SHA-256 over the canonical JSON of the mapping, lowercase hex.
    pub fn fingerprint(&self) -> String {
        // BTreeMap serializes in key order, so equal mappings hash equally.
        let canonical = serde_json::to_vec(&self.codes).unwrap_or_default();
        let digest = Sha256::digest(&canonical);
        format!("{digest:x}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{EncodeError, TeamEncoder};

    #[test]
    fn codes_follow_sorted_distinct_names() {
        let encoder = TeamEncoder::fit(["Scotland", "England", "Scotland", "Wales", "England"]);
        assert_eq!(encoder.len(), 3);
        assert_eq!(encoder.encode("England"), Ok(0));
        assert_eq!(encoder.encode("Scotland"), Ok(1));
        assert_eq!(encoder.encode("Wales"), Ok(2));
    }

    #[test]
    fn non_ascii_names_sort_after_ascii() {
        let encoder = TeamEncoder::fit(["Curaçao", "Cuba", "Czechia"]);
        assert_eq!(encoder.encode("Cuba"), Ok(0));
        assert_eq!(encoder.encode("Curaçao"), Ok(1));
        assert_eq!(encoder.encode("Czechia"), Ok(2));
    }

    #[test]
    fn unknown_team_is_an_error_not_a_default_code() {
        let encoder = TeamEncoder::fit(["Brazil"]);
        assert_eq!(
            encoder.encode("France"),
            Err(EncodeError::UnknownTeam("France".to_string()))
        );
    }

    #[test]
    fn duplicate_codes_are_rejected() {
        let mut codes = BTreeMap::new();
        codes.insert("Brazil".to_string(), 4);
        codes.insert("France".to_string(), 4);
        let err = TeamEncoder::from_codes(codes).unwrap_err();
        assert!(matches!(err, EncodeError::DuplicateCode { code: 4, .. }));
    }

    #[test]
    fn fingerprint_tracks_mapping_content() {
        let a = TeamEncoder::fit(["Brazil", "France"]);
        let b = TeamEncoder::fit(["France", "Brazil"]);
        let c = TeamEncoder::fit(["Brazil", "Germany"]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}

use std::collections::BTreeSet;

use once_cell::sync::Lazy;

use crate::encoder::TeamEncoder;

/// National teams accepted by the prediction API.
pub const WORLD_CUP_TEAMS: [&str; 38] = [
    "Algeria",
    "Argentina",
    "Australia",
    "Austria",
    "Belgium",
    "Brazil",
    "Canada",
    "Cape Verde",
    "Colombia",
    "Croatia",
    "Curaçao",
    "Ecuador",
    "Egypt",
    "England",
    "France",
    "Germany",
    "Ghana",
    "Haiti",
    "Iran",
    "Ivory Coast",
    "Japan",
    "Jordan",
    "Mexico",
    "Netherlands",
    "New Zealand",
    "Panama",
    "Portugal",
    "Qatar",
    "Saudi Arabia",
    "Scotland",
    "South Africa",
    "South Korea",
    "Spain",
    "Switzerland",
    "Tunisia",
    "United States",
    "Uruguay",
    "Uzbekistan",
];

static WORLD_CUP: Lazy<TeamRegistry> =
    Lazy::new(|| TeamRegistry::from_names(WORLD_CUP_TEAMS.iter().copied()));

/// Closed whitelist of team names. Lookups are exact: no trimming or case
/// folding, so the name that passes validation is the name that gets encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRegistry {
    teams: BTreeSet<String>,
}

impl TeamRegistry {
    pub fn world_cup() -> &'static TeamRegistry {
        &WORLD_CUP
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            teams: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_valid(&self, name: &str) -> bool {
        self.teams.contains(name)
    }

    pub fn all_teams(&self) -> &BTreeSet<String> {
        &self.teams
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    /// Registry teams the encoder has no code for. Any entry here means the
    /// registry and the training vocabulary have drifted apart.
    pub fn coverage_gaps(&self, encoder: &TeamEncoder) -> Vec<&str> {
        self.teams
            .iter()
            .filter(|team| !encoder.contains(team))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{TeamRegistry, WORLD_CUP_TEAMS};
    use crate::encoder::TeamEncoder;

    #[test]
    fn world_cup_registry_holds_every_listed_team() {
        let registry = TeamRegistry::world_cup();
        assert_eq!(registry.len(), WORLD_CUP_TEAMS.len());
        assert!(registry.is_valid("Brazil"));
        assert!(registry.is_valid("Curaçao"));
        assert!(registry.is_valid("United States"));
    }

    #[test]
    fn lookups_are_exact() {
        let registry = TeamRegistry::world_cup();
        assert!(!registry.is_valid("brazil"));
        assert!(!registry.is_valid(" Brazil"));
        assert!(!registry.is_valid("Atlantis"));
        assert!(!registry.is_valid(""));
    }

    #[test]
    fn coverage_gaps_lists_unencoded_teams() {
        let registry = TeamRegistry::from_names(["Brazil", "France", "Qatar"]);
        let encoder = TeamEncoder::fit(["Brazil", "France", "Germany"]);
        assert_eq!(registry.coverage_gaps(&encoder), vec!["Qatar"]);
    }
}

use serde::{Deserialize, Serialize};

use quiz_core::model::ValidationResult;
use quiz_core::modes::ModeMetadata;

/// The four screens of a quiz run. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Screen {
    ModeSelect,
    Setup,
    Running,
    Results,
}

impl Screen {
    /// Whether the controller may move from `self` to `next`.
    #[must_use]
    pub fn can_enter(self, next: Screen) -> bool {
        matches!(
            (self, next),
            (Screen::ModeSelect, Screen::Setup)
                | (Screen::Setup, Screen::ModeSelect | Screen::Running)
                | (Screen::Running, Screen::Results)
                | (Screen::Results, Screen::Setup)
        )
    }
}

/// What the setup screen needs to offer options for the chosen mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupInfo {
    pub mode: ModeMetadata,
    pub validation: ValidationResult,
    /// Distinct categories of the questions this mode can use.
    pub categories: Vec<String>,
    /// Number of questions this mode can use.
    pub available: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_documented_edges_are_allowed() {
        use Screen::*;
        let all = [ModeSelect, Setup, Running, Results];
        let allowed: Vec<(Screen, Screen)> = all
            .iter()
            .flat_map(|&from| all.iter().map(move |&to| (from, to)))
            .filter(|(from, to)| from.can_enter(*to))
            .collect();
        assert_eq!(
            allowed,
            vec![
                (ModeSelect, Setup),
                (Setup, ModeSelect),
                (Setup, Running),
                (Running, Results),
                (Results, Setup),
            ]
        );
    }
}

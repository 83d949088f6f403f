use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::RegistryError;
use crate::model::{Bank, ModeId, ValidationResult};
use crate::modes::{
    FlashcardMode, MatchingMode, Mode, ModeMetadata, MultipleChoiceMode, TrueFalseMode,
};

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSettings {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// External enable/disable switches, `{ "modes": { "<id>": { "enabled": false } } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySettings {
    #[serde(default)]
    pub modes: BTreeMap<String, ModeSettings>,
}

impl RegistrySettings {
    /// Modes not mentioned are enabled.
    #[must_use]
    pub fn is_enabled(&self, id: &ModeId) -> bool {
        self.modes.get(id.as_str()).is_none_or(|m| m.enabled)
    }

    #[must_use]
    pub fn disable(mut self, id: &str) -> Self {
        self.modes
            .insert(id.to_string(), ModeSettings { enabled: false });
        self
    }
}

//
// ─── REGISTRY ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Registered,
    Disabled,
}

/// A mode that can run against a given bank, with its validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedMode {
    pub metadata: ModeMetadata,
    pub validation: ValidationResult,
}

/// Registered modes in registration order.
///
/// Constructed explicitly and shared by reference; there is no global instance.
#[derive(Default)]
pub struct ModeRegistry {
    modes: Vec<Box<dyn Mode>>,
    settings: RegistrySettings,
}

impl std::fmt::Debug for ModeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeRegistry")
            .field("modes", &self.ids())
            .field("settings", &self.settings)
            .finish()
    }
}

impl ModeRegistry {
    #[must_use]
    pub fn new(settings: RegistrySettings) -> Self {
        Self {
            modes: Vec::new(),
            settings,
        }
    }

    /// Registry holding the four built-in modes, minus any disabled ones.
    ///
    /// # Errors
    ///
    /// Propagates [`RegistryError`] from [`ModeRegistry::register`].
    pub fn with_defaults(settings: RegistrySettings) -> Result<Self, RegistryError> {
        let mut registry = Self::new(settings);
        registry.register(Box::new(MultipleChoiceMode::new()))?;
        registry.register(Box::new(TrueFalseMode::new()))?;
        registry.register(Box::new(FlashcardMode::new()))?;
        registry.register(Box::new(MatchingMode::new()))?;
        Ok(registry)
    }

    /// Adds a mode unless settings disable it.
    ///
    /// # Errors
    ///
    /// Rejects a mode with an empty id or name, or an id already registered.
    pub fn register(&mut self, mode: Box<dyn Mode>) -> Result<Registration, RegistryError> {
        let metadata = mode.metadata();
        if metadata.id.is_empty() {
            return Err(RegistryError::EmptyId);
        }
        if metadata.name.trim().is_empty() {
            return Err(RegistryError::EmptyName(metadata.id.clone()));
        }
        if self.get(&metadata.id).is_some() {
            return Err(RegistryError::Duplicate(metadata.id.clone()));
        }
        if !self.settings.is_enabled(&metadata.id) {
            warn!(mode = %metadata.id, "mode disabled by settings, skipping");
            return Ok(Registration::Disabled);
        }
        info!(mode = %metadata.id, name = %metadata.name, "mode registered");
        self.modes.push(mode);
        Ok(Registration::Registered)
    }

    #[must_use]
    pub fn get(&self, id: &ModeId) -> Option<&dyn Mode> {
        self.modes
            .iter()
            .find(|m| &m.metadata().id == id)
            .map(|m| m.as_ref())
    }

    pub fn modes(&self) -> impl Iterator<Item = &dyn Mode> {
        self.modes.iter().map(|m| m.as_ref())
    }

    #[must_use]
    pub fn ids(&self) -> Vec<ModeId> {
        self.modes.iter().map(|m| m.metadata().id.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// Every mode whose validation succeeds for `bank`, in registration order.
    /// An empty vector is a normal answer that callers must handle.
    #[must_use]
    pub fn supported_modes(&self, bank: &Bank) -> Vec<SupportedMode> {
        self.modes
            .iter()
            .filter_map(|mode| {
                let validation = mode.validate(bank);
                validation.is_supported.then(|| SupportedMode {
                    metadata: mode.metadata().clone(),
                    validation,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, BankId, Question, QuestionId};
    use crate::modes::ModeSession;
    use crate::modes::fixtures;

    struct Custom {
        metadata: ModeMetadata,
    }

    impl Mode for Custom {
        fn metadata(&self) -> &ModeMetadata {
            &self.metadata
        }

        fn supports_question(&self, _question: &Question) -> bool {
            false
        }

        fn create_session(&self) -> Box<dyn ModeSession> {
            MultipleChoiceMode::new().create_session()
        }
    }

    fn custom(id: &str, name: &str) -> Box<dyn Mode> {
        Box::new(Custom {
            metadata: ModeMetadata::new(id, name, ""),
        })
    }

    #[test]
    fn defaults_register_in_order() {
        let registry = ModeRegistry::with_defaults(RegistrySettings::default()).unwrap();
        let ids: Vec<String> = registry.ids().iter().map(|id| id.to_string()).collect();
        assert_eq!(
            ids,
            vec!["multiple-choice", "true-false", "flashcard", "matching-stage"]
        );
    }

    #[test]
    fn malformed_modes_are_rejected_at_registration() {
        let mut registry = ModeRegistry::default();
        assert_eq!(registry.register(custom(" ", "x")), Err(RegistryError::EmptyId));
        assert!(matches!(
            registry.register(custom("x", "")),
            Err(RegistryError::EmptyName(_))
        ));
        registry.register(custom("x", "X")).unwrap();
        assert!(matches!(
            registry.register(custom("x", "X again")),
            Err(RegistryError::Duplicate(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn disabled_modes_are_skipped() {
        let settings: RegistrySettings =
            serde_json::from_str(r#"{ "modes": { "flashcard": { "enabled": false } } }"#).unwrap();
        let registry = ModeRegistry::with_defaults(settings).unwrap();
        assert_eq!(registry.len(), 3);
        assert!(registry.get(&ModeId::new("flashcard")).is_none());
    }

    #[test]
    fn supported_modes_keep_registration_order() {
        let registry = ModeRegistry::with_defaults(RegistrySettings::default()).unwrap();
        // single-answer questions rule out multiple-choice only
        let bank = Bank::new(
            BankId::new("b"),
            "B",
            vec![Question::new(QuestionId::new(1), "Q", vec![Answer::correct("A")])],
        );
        let supported: Vec<String> = registry
            .supported_modes(&bank)
            .iter()
            .map(|m| m.metadata.id.to_string())
            .collect();
        assert_eq!(supported, vec!["true-false", "flashcard", "matching-stage"]);

        let full = registry.supported_modes(&fixtures::bank(3, 2));
        assert_eq!(full.len(), 4);
        assert!(full.iter().all(|m| m.validation.percentage == 100));
    }

    #[test]
    fn malformed_bank_supports_nothing() {
        let registry = ModeRegistry::with_defaults(RegistrySettings::default()).unwrap();
        let bank = Bank::from_json(BankId::new("bad"), r#"{ "questions": [1, 2] }"#).unwrap();
        assert!(registry.supported_modes(&bank).is_empty());
    }
}

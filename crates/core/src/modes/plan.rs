use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::error::ConfigError;
use crate::model::{Bank, Question};
use crate::modes::options::{ModeDefaults, SessionOptions};

/// Picks the questions for one session.
///
/// Order of steps: mode support, category filter, optional shuffle, then
/// truncation to the requested count (clamped to what is available).
pub struct SelectionBuilder<'a> {
    bank: &'a Bank,
    supports: fn(&Question) -> bool,
    defaults: ModeDefaults,
}

impl<'a> SelectionBuilder<'a> {
    #[must_use]
    pub fn new(bank: &'a Bank, supports: fn(&Question) -> bool, defaults: ModeDefaults) -> Self {
        Self {
            bank,
            supports,
            defaults,
        }
    }

    /// # Errors
    ///
    /// - `NoCategoriesSelected` when an explicit empty category list is given.
    /// - `NoQuestionsAfterFiltering` when nothing supported matches the categories.
    /// - `CountOutOfRange` when a count of 0 is requested.
    pub fn build(self, options: &SessionOptions, seed: u64) -> Result<Vec<Question>, ConfigError> {
        if let Some(categories) = &options.categories
            && categories.is_empty()
        {
            return Err(ConfigError::NoCategoriesSelected);
        }

        let mut candidates: Vec<Question> = self
            .bank
            .questions()
            .iter()
            .filter(|q| (self.supports)(q))
            .filter(|q| {
                options
                    .categories
                    .as_ref()
                    .is_none_or(|wanted| q.in_categories(wanted))
            })
            .cloned()
            .collect();

        if candidates.is_empty() {
            return Err(ConfigError::NoQuestionsAfterFiltering);
        }

        let requested = options
            .question_count
            .unwrap_or(self.defaults.question_count);
        if requested == 0 {
            return Err(ConfigError::CountOutOfRange {
                requested,
                available: candidates.len(),
            });
        }

        if options
            .shuffle_questions
            .unwrap_or(self.defaults.shuffle_questions)
        {
            let mut rng = StdRng::seed_from_u64(seed);
            candidates.shuffle(&mut rng);
        }

        let take = usize::try_from(requested)
            .unwrap_or(usize::MAX)
            .min(candidates.len());
        candidates.truncate(take);

        debug!(
            bank = %self.bank.id(),
            requested,
            selected = candidates.len(),
            "selected session questions"
        );
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, BankId, QuestionId};

    fn question(id: u64, category: &str) -> Question {
        Question::new(QuestionId::new(id), format!("Q{id}"), vec![Answer::correct("A")])
            .with_category(category)
    }

    fn bank() -> Bank {
        let mut questions: Vec<Question> = (1..=6)
            .map(|i| question(i, if i % 2 == 0 { "even" } else { "odd" }))
            .collect();
        questions.push(Question::new(QuestionId::new(7), "", vec![]));
        Bank::new(BankId::new("b"), "Bank", questions)
    }

    fn unshuffled() -> SessionOptions {
        SessionOptions {
            shuffle_questions: Some(false),
            ..SessionOptions::default()
        }
    }

    #[test]
    fn unsupported_questions_are_skipped() {
        let bank = bank();
        let picked = SelectionBuilder::new(&bank, Question::is_usable, ModeDefaults::TRUE_FALSE)
            .build(&unshuffled(), 1)
            .unwrap();
        assert_eq!(picked.len(), 6);
    }

    #[test]
    fn empty_category_list_is_rejected() {
        let bank = bank();
        let options = SessionOptions {
            categories: Some(Vec::new()),
            ..unshuffled()
        };
        let err = SelectionBuilder::new(&bank, Question::is_usable, ModeDefaults::TRUE_FALSE)
            .build(&options, 1)
            .unwrap_err();
        assert_eq!(err, ConfigError::NoCategoriesSelected);
    }

    #[test]
    fn unknown_category_leaves_nothing() {
        let bank = bank();
        let options = SessionOptions {
            categories: Some(vec!["missing".to_string()]),
            ..unshuffled()
        };
        let err = SelectionBuilder::new(&bank, Question::is_usable, ModeDefaults::TRUE_FALSE)
            .build(&options, 1)
            .unwrap_err();
        assert_eq!(err, ConfigError::NoQuestionsAfterFiltering);
    }

    #[test]
    fn count_is_clamped_and_zero_rejected() {
        let bank = bank();
        let options = SessionOptions {
            question_count: Some(100),
            categories: Some(vec!["even".to_string()]),
            ..unshuffled()
        };
        let picked = SelectionBuilder::new(&bank, Question::is_usable, ModeDefaults::TRUE_FALSE)
            .build(&options, 1)
            .unwrap();
        let ids: Vec<u64> = picked.iter().map(|q| q.id.value()).collect();
        assert_eq!(ids, vec![2, 4, 6]);

        let zero = SessionOptions {
            question_count: Some(0),
            ..unshuffled()
        };
        assert!(matches!(
            SelectionBuilder::new(&bank, Question::is_usable, ModeDefaults::TRUE_FALSE)
                .build(&zero, 1),
            Err(ConfigError::CountOutOfRange { requested: 0, .. })
        ));
    }

    #[test]
    fn same_seed_gives_same_order() {
        let bank = bank();
        let options = SessionOptions {
            shuffle_questions: Some(true),
            ..SessionOptions::default()
        };
        let a = SelectionBuilder::new(&bank, Question::is_usable, ModeDefaults::TRUE_FALSE)
            .build(&options, 42)
            .unwrap();
        let b = SelectionBuilder::new(&bank, Question::is_usable, ModeDefaults::TRUE_FALSE)
            .build(&options, 42)
            .unwrap();
        assert_eq!(a, b);
    }
}

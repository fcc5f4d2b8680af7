use raccord_contracts::defects::{Classification, DopError, RetryAction};
use raccord_contracts::vocabulary::{TermMatcher, TokenMatcher, Vocabulary};

/// Offline split of defects into fixable and unfixable.
pub struct ErrorClassifier<'a> {
    vocabulary: &'a Vocabulary,
    matcher: &'a dyn TermMatcher,
}

impl<'a> ErrorClassifier<'a> {
    pub fn new(vocabulary: &'a Vocabulary) -> Self {
        Self {
            vocabulary,
            matcher: &TokenMatcher,
        }
    }

    pub fn with_matcher(mut self, matcher: &'a dyn TermMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Identity-level keywords in the description make a defect unfixable
    /// whatever its type. Otherwise listed fixable types are fixable by rule
    /// and anything else is assumed fixable.
    pub fn fixability(&self, error: &DopError) -> Fixability {
        if self
            .vocabulary
            .unfixable_keyword(self.matcher, &error.description)
            .is_some()
        {
            return Fixability::Unfixable;
        }
        if self.vocabulary.is_fixable_type(&error.error_type) {
            return Fixability::ListedType;
        }
        Fixability::Assumed
    }

    pub fn classify(&self, errors: &[DopError]) -> Classification {
        let (unfixable, fixable): (Vec<DopError>, Vec<DopError>) = errors
            .iter()
            .cloned()
            .partition(|error| self.fixability(error) == Fixability::Unfixable);
        Classification {
            decision: decision_for(unfixable.len(), fixable.len()),
            fixable,
            unfixable,
        }
    }

    /// Fixable defects whose type is not in the fixable list.
    pub fn assumed_fixable(&self, errors: &[DopError]) -> usize {
        errors
            .iter()
            .filter(|error| self.fixability(error) == Fixability::Assumed)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fixability {
    Unfixable,
    ListedType,
    Assumed,
}

/// Classifies with the built-in bilingual vocabulary.
pub fn classify(errors: &[DopError]) -> Classification {
    ErrorClassifier::new(&Vocabulary::default()).classify(errors)
}

pub fn decision_for(unfixable: usize, fixable: usize) -> RetryAction {
    match (unfixable > 0, fixable > 0) {
        (true, false) => RetryAction::Skip,
        (true, true) => RetryAction::TryOnce,
        (false, true) => RetryAction::Retry,
        (false, false) => RetryAction::Skip,
    }
}

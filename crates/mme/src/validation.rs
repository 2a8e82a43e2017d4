//! Ontology-term validation.
//!
//! Feature and disorder identifiers received from (or sent to) partner servers must belong to the
//! namespace the API version accepts, for example `^HP:[0-9]+$` for phenotype features. A term that
//! fails validation is dropped from its enclosing list by the codec; it never fails a whole
//! conversion on its own.

use crate::MmeResult;
use mme_types::TermId;
use regex::{Regex, RegexBuilder};

/// Pattern accepted for phenotype features (Human Phenotype Ontology).
pub const HPO_TERM_PATTERN: &str = r"^HP:[0-9]+$";

/// Pattern accepted for disorders (OMIM).
pub const OMIM_TERM_PATTERN: &str = r"^MIM:[0-9]+$";

/// Case-insensitive, anchored term pattern.
#[derive(Clone, Debug)]
pub struct TermPattern {
    regex: Regex,
}

impl TermPattern {
    /// Compile a term pattern. Matching ignores case.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MmeError::InvalidPattern`] if `pattern` is not a valid regular
    /// expression.
    pub fn new(pattern: &str) -> MmeResult<Self> {
        let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self { regex })
    }

    /// Human Phenotype Ontology pattern. Digits are ASCII only.
    pub fn hpo() -> MmeResult<Self> {
        Self::new(HPO_TERM_PATTERN)
    }

    /// OMIM disorder pattern.
    pub fn omim() -> MmeResult<Self> {
        Self::new(OMIM_TERM_PATTERN)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// `true` if `id` matches the pattern (ignoring case and surrounding whitespace).
    pub fn matches(&self, id: &str) -> bool {
        self.regex.is_match(id.trim())
    }
}

/// Validates `id` against `pattern`.
///
/// No side effects. Callers normalise to uppercase before storing.
pub fn validate(id: &str, pattern: &TermPattern) -> bool {
    pattern.matches(id)
}

/// The pair of term patterns a wire codec validates against.
#[derive(Clone, Debug)]
pub struct TermValidator {
    phenotype: TermPattern,
    disorder: TermPattern,
}

impl TermValidator {
    pub fn new(phenotype: TermPattern, disorder: TermPattern) -> Self {
        Self {
            phenotype,
            disorder,
        }
    }

    /// HPO features and OMIM disorders, as accepted by every 1.x version.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MmeError::InvalidPattern`] if either built-in pattern fails to compile.
    pub fn standard() -> MmeResult<Self> {
        Ok(Self::new(TermPattern::hpo()?, TermPattern::omim()?))
    }

    pub fn phenotype_pattern(&self) -> &TermPattern {
        &self.phenotype
    }

    pub fn disorder_pattern(&self) -> &TermPattern {
        &self.disorder
    }

    /// Normalise and validate a phenotype term, logging and returning `None` if unsupported.
    pub fn phenotype_term(&self, raw: &str) -> Option<TermId> {
        accept(raw, &self.phenotype, "feature")
    }

    /// Normalise and validate a disorder term, logging and returning `None` if unsupported.
    pub fn disorder_term(&self, raw: &str) -> Option<TermId> {
        accept(raw, &self.disorder, "disorder")
    }
}

fn accept(raw: &str, pattern: &TermPattern, kind: &str) -> Option<TermId> {
    if !validate(raw, pattern) {
        tracing::warn!(
            "ignoring unsupported {} term [{}] (expected {})",
            kind,
            raw,
            pattern.as_str()
        );
        return None;
    }
    TermId::new(raw).ok()
}

//! Validated primitive types shared across the matchmaker crates.
//!
//! Each type here guarantees its invariant once constructed, so the wire and engine crates
//! never need to re-check trimming or case normalisation.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,

    /// The input contained whitespace where none is allowed
    #[error("Identifier cannot contain whitespace: {0}")]
    ContainsWhitespace(String),
}

/// A string type that guarantees non-empty content.
///
/// The input is trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Ontology term identifier such as `HP:0000316` or `MIM:614261`.
///
/// Construction trims and uppercases the input. Whether the term belongs to an accepted
/// namespace is decided by the wire layer, since the accepted namespaces depend on the API
/// version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermId(String);

impl TermId {
    /// Normalise `input` into a term identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TextError`] if the input is blank or contains inner whitespace.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        normalise_identifier(input.as_ref()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Gene symbol or gene identifier (for example `SRCAP` or `ENSG00000080603`), uppercased.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GeneSymbol(String);

impl GeneSymbol {
    /// Normalise `input` into a gene symbol.
    ///
    /// # Errors
    ///
    /// Returns [`TextError`] if the input is blank or contains inner whitespace.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        normalise_identifier(input.as_ref()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn normalise_identifier(input: &str) -> Result<String, TextError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TextError::Empty);
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(TextError::ContainsWhitespace(trimmed.to_owned()));
    }
    Ok(trimmed.to_uppercase())
}

macro_rules! impl_text_traits {
    ($ty:ident) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::str::FromStr for $ty {
            type Err = TextError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::new(s)
            }
        }

        impl serde::Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $ty::new(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

impl_text_traits!(NonEmptyText);
impl_text_traits!(TermId);
impl_text_traits!(GeneSymbol);

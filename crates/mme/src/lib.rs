//! Matchmaker Exchange wire/boundary support.
//!
//! This crate is responsible for translating between internal patient records and the versioned
//! GA4GH Matchmaker Exchange (MME) JSON format, in both directions.
//!
//! Responsibilities:
//! - Ontology-term validation ([`validation`])
//! - Domain-level patient carriers ([`model`])
//! - Privacy-preserving obfuscation of similarity match detail ([`privacy`])
//! - Per-version wire codecs ([`api_1`]) and the version registry ([`version`])
//!
//! Notes:
//! - This crate performs no I/O. HTTP, authentication, consent and persistence belong to
//!   `mme-core` and `api-rest`.

pub mod api_1;
pub mod model;
pub mod privacy;
pub mod validation;
pub mod version;

pub use model::{
    CandidateGene, ContactInfo, Disorder, Feature, LocalContact, LocalFeature, LocalGene,
    LocalPatient, MatchingPatient, Observed, PatientSource, Presence, RemoteMatch, Sex,
    SimilarityView,
};
pub use privacy::{
    obfuscate_feature_matches, FeatureMatchGroup, ObfuscatedFeature, MOST_GENERIC_PHENOTYPE_TERM,
};
pub use validation::{validate, TermPattern, TermValidator};
pub use version::{version_from_media_type, ApiRegistry, ApiVersion, RequestedVersion, WireCodec};

pub use mme_types::{GeneSymbol, NonEmptyText, TermId, TextError};

/// Errors returned by the `mme` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum MmeError {
    /// The payload does not satisfy the minimum shape required by the wire contract.
    #[error("{0}")]
    ProtocolViolation(String),

    #[error("unsupported API version [{requested}]")]
    UnsupportedVersion {
        requested: String,
        supported: Vec<String>,
    },

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid term pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl MmeError {
    /// `true` when the error was caused by the remote party's data rather than a local fault.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, MmeError::ProtocolViolation(_))
    }
}

/// Type alias for Results that can fail with an [`MmeError`].
pub type MmeResult<T> = Result<T, MmeError>;

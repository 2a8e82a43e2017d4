//! API version table.
//!
//! The registry is built once at startup and passed to whoever needs a codec. Lookups never
//! mutate it, so it is shared freely between concurrent requests.

use crate::api_1;
use crate::model::{
    ContactInfo, LocalPatient, MatchingPatient, PatientSource, RemoteMatch, SimilarityView,
};
use crate::validation::TermValidator;
use crate::{MmeError, MmeResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

const MEDIA_TYPE_PREFIX: &str = "application/vnd.ga4gh.matchmaker.v";
const MEDIA_TYPE_SUFFIX: &str = "+json";
const MEDIA_TYPE_UNVERSIONED: &str = "application/vnd.ga4gh.matchmaker+json";

/// Protocol revisions this crate can speak.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ApiVersion {
    V1_0,
    V1_1,
}

impl ApiVersion {
    pub const LATEST: ApiVersion = ApiVersion::V1_1;

    pub const ALL: [ApiVersion; 2] = [ApiVersion::V1_0, ApiVersion::V1_1];

    pub fn as_str(self) -> &'static str {
        match self {
            ApiVersion::V1_0 => "1.0",
            ApiVersion::V1_1 => "1.1",
        }
    }

    /// Parse a `major.minor` version token.
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == token.trim())
    }

    /// Versioned media type, e.g. `application/vnd.ga4gh.matchmaker.v1.0+json`.
    pub fn media_type(self) -> String {
        format!("{MEDIA_TYPE_PREFIX}{}{MEDIA_TYPE_SUFFIX}", self.as_str())
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a client asked for in a media-type header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestedVersion {
    /// No version named; the latest supported version applies.
    Latest,
    /// A specific `major.minor` version.
    Exact(String),
    /// Not a media type this protocol answers to.
    Unrecognised,
}

/// Read the protocol version named by a single media range.
///
/// Parameters (`; q=0.9`) are ignored. The bare matchmaker type, `application/*+json`,
/// `application/json` and wildcards all mean "latest".
pub fn version_from_media_type(media_type: &str) -> RequestedVersion {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if let Some(version) = essence
        .strip_prefix(MEDIA_TYPE_PREFIX)
        .and_then(|rest| rest.strip_suffix(MEDIA_TYPE_SUFFIX))
    {
        return RequestedVersion::Exact(version.to_string());
    }

    match essence.as_str() {
        MEDIA_TYPE_UNVERSIONED | "application/*+json" | "application/json" | "application/*"
        | "*/*" => RequestedVersion::Latest,
        _ => RequestedVersion::Unrecognised,
    }
}

/// A registered wire codec, one variant per wire shape.
#[derive(Clone, Debug)]
pub enum WireCodec {
    Api1(api_1::Codec),
}

impl WireCodec {
    pub fn version(&self) -> ApiVersion {
        match self {
            WireCodec::Api1(codec) => codec.version(),
        }
    }

    pub fn media_type(&self) -> String {
        self.version().media_type()
    }

    pub fn validator(&self) -> &TermValidator {
        match self {
            WireCodec::Api1(codec) => codec.validator(),
        }
    }

    pub fn encode_patient(&self, source: PatientSource<'_>, top_genes: usize) -> MmeResult<Value> {
        match self {
            WireCodec::Api1(codec) => codec.encode_patient(source, top_genes),
        }
    }

    pub fn encode_request(
        &self,
        patient: &LocalPatient,
        wire_id: &str,
        top_genes: usize,
    ) -> MmeResult<Value> {
        match self {
            WireCodec::Api1(codec) => codec.encode_request(patient, wire_id, top_genes),
        }
    }

    pub fn decode_request(&self, body: &Value) -> MmeResult<MatchingPatient> {
        match self {
            WireCodec::Api1(codec) => codec.decode_request(body),
        }
    }

    pub fn encode_response(&self, matches: &[SimilarityView], top_genes: usize) -> Value {
        match self {
            WireCodec::Api1(codec) => codec.encode_response(matches, top_genes),
        }
    }

    pub fn decode_response(&self, body: &Value) -> MmeResult<Vec<RemoteMatch>> {
        match self {
            WireCodec::Api1(codec) => codec.decode_response(body),
        }
    }

    pub fn error_body(&self, message: &str) -> Value {
        match self {
            WireCodec::Api1(_) => api_1::Codec::error_body(message),
        }
    }
}

/// Immutable map from version to codec.
#[derive(Clone, Debug, Default)]
pub struct ApiRegistry {
    codecs: BTreeMap<ApiVersion, WireCodec>,
}

impl ApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every version this crate supports, sharing one validator and default
    /// contact.
    pub fn with_supported_versions(validator: TermValidator, default_contact: ContactInfo) -> Self {
        let mut registry = Self::new();
        for version in ApiVersion::ALL {
            registry.register(
                version,
                WireCodec::Api1(api_1::Codec::new(
                    version,
                    validator.clone(),
                    default_contact.clone(),
                )),
            );
        }
        registry
    }

    /// Register `codec` for `version`, replacing any earlier registration.
    pub fn register(&mut self, version: ApiVersion, codec: WireCodec) {
        if let Some(previous) = self.codecs.insert(version, codec) {
            tracing::warn!(
                "replaced codec registered for API version {}",
                previous.version()
            );
        }
    }

    /// Registered version strings, oldest first.
    pub fn supported_versions(&self) -> Vec<String> {
        self.codecs.keys().map(|v| v.as_str().to_string()).collect()
    }

    /// Codec for the newest registered version.
    pub fn latest(&self) -> Option<&WireCodec> {
        self.codecs.values().next_back()
    }

    /// Codec for a `major.minor` version token.
    ///
    /// # Errors
    ///
    /// Returns [`MmeError::UnsupportedVersion`] carrying every registered version if `version`
    /// is not registered.
    pub fn resolve(&self, version: &str) -> MmeResult<&WireCodec> {
        ApiVersion::parse(version)
            .and_then(|v| self.codecs.get(&v))
            .ok_or_else(|| self.unsupported(version))
    }

    /// Codec for a media-type header such as `Accept`.
    ///
    /// A missing or blank header selects the latest version. For a comma-separated list the
    /// first range this protocol recognises decides.
    ///
    /// # Errors
    ///
    /// Returns [`MmeError::UnsupportedVersion`] if the named version is not registered, if no
    /// range is recognised, or if the registry is empty.
    pub fn negotiate(&self, header: Option<&str>) -> MmeResult<&WireCodec> {
        let header = header.map(str::trim).filter(|h| !h.is_empty());
        let Some(header) = header else {
            return self.latest().ok_or_else(|| self.unsupported("latest"));
        };

        for range in header.split(',') {
            match version_from_media_type(range) {
                RequestedVersion::Exact(version) => return self.resolve(&version),
                RequestedVersion::Latest => {
                    return self.latest().ok_or_else(|| self.unsupported("latest"))
                }
                RequestedVersion::Unrecognised => continue,
            }
        }

        Err(self.unsupported(header))
    }

    fn unsupported(&self, requested: &str) -> MmeError {
        MmeError::UnsupportedVersion {
            requested: requested.to_string(),
            supported: self.supported_versions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mme_types::NonEmptyText;

    fn registry() -> ApiRegistry {
        ApiRegistry::with_supported_versions(
            TermValidator::standard().unwrap(),
            ContactInfo::support(
                NonEmptyText::new("Support").unwrap(),
                NonEmptyText::new("Matchmaker Node").unwrap(),
                NonEmptyText::new("support@example.org").unwrap(),
            ),
        )
    }

    #[test]
    fn resolve_returns_registered_codec() {
        let registry = registry();
        let codec = registry.resolve("1.0").expect("1.0 is registered");
        assert_eq!(codec.version(), ApiVersion::V1_0);
    }

    #[test]
    fn resolve_unknown_version_reports_supported_set() {
        let registry = registry();
        let err = registry.resolve("9.9").expect_err("9.9 is not registered");
        match err {
            MmeError::UnsupportedVersion {
                requested,
                supported,
            } => {
                assert_eq!(requested, "9.9");
                assert_eq!(supported, vec!["1.0".to_string(), "1.1".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn supported_set_matches_registrations_exactly() {
        let mut registry = ApiRegistry::new();
        let full = registry_codec(ApiVersion::V1_0);
        registry.register(ApiVersion::V1_0, full);

        let err = registry.resolve("1.1").expect_err("only 1.0 registered");
        assert!(matches!(
            err,
            MmeError::UnsupportedVersion { ref supported, .. } if supported == &vec!["1.0".to_string()]
        ));
        assert_eq!(
            registry.latest().map(WireCodec::version),
            Some(ApiVersion::V1_0)
        );
    }

    fn registry_codec(version: ApiVersion) -> WireCodec {
        registry()
            .resolve(version.as_str())
            .expect("registered")
            .clone()
    }

    #[test]
    fn media_types_map_to_versions() {
        assert_eq!(
            version_from_media_type("application/vnd.ga4gh.matchmaker.v1.0+json"),
            RequestedVersion::Exact("1.0".into())
        );
        assert_eq!(
            version_from_media_type("Application/VND.ga4gh.matchmaker.v1.1+json; q=0.5"),
            RequestedVersion::Exact("1.1".into())
        );
        assert_eq!(
            version_from_media_type("application/vnd.ga4gh.matchmaker+json"),
            RequestedVersion::Latest
        );
        assert_eq!(
            version_from_media_type("application/*+json"),
            RequestedVersion::Latest
        );
        assert_eq!(
            version_from_media_type("text/html"),
            RequestedVersion::Unrecognised
        );
    }

    #[test]
    fn negotiate_defaults_to_latest() {
        let registry = registry();
        assert_eq!(
            registry.negotiate(None).map(WireCodec::version).ok(),
            Some(ApiVersion::LATEST)
        );
        assert_eq!(
            registry
                .negotiate(Some("text/html, application/json"))
                .map(WireCodec::version)
                .ok(),
            Some(ApiVersion::LATEST)
        );
    }

    #[test]
    fn negotiate_rejects_unknown_version_and_unrecognised_types() {
        let registry = registry();
        assert!(matches!(
            registry.negotiate(Some("application/vnd.ga4gh.matchmaker.v2.0+json")),
            Err(MmeError::UnsupportedVersion { .. })
        ));
        assert!(matches!(
            registry.negotiate(Some("text/html")),
            Err(MmeError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn versioned_media_type_is_rendered() {
        assert_eq!(
            ApiVersion::V1_0.media_type(),
            "application/vnd.ga4gh.matchmaker.v1.0+json"
        );
        assert_eq!(
            registry().latest().map(WireCodec::media_type),
            Some(ApiVersion::V1_1.media_type())
        );
    }
}

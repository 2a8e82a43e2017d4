//! Matchmaker Exchange API 1.x wire support.
//!
//! The 1.0 and 1.1 protocol revisions share one patient shape, so both are served by a single
//! [`Codec`] configured with the revision it speaks.

mod patient;
mod response;

use crate::model::{
    ContactInfo, LocalPatient, MatchingPatient, PatientSource, RemoteMatch, SimilarityView,
};
use crate::validation::TermValidator;
use crate::version::ApiVersion;
use crate::{MmeError, MmeResult};
use serde_json::{json, Value};

/// Wire codec for API 1.x.
///
/// Stateless once built: safe for unsynchronised concurrent use.
#[derive(Clone, Debug)]
pub struct Codec {
    version: ApiVersion,
    validator: TermValidator,
    default_contact: ContactInfo,
}

impl Codec {
    pub fn new(version: ApiVersion, validator: TermValidator, default_contact: ContactInfo) -> Self {
        Self {
            version,
            validator,
            default_contact,
        }
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    pub fn validator(&self) -> &TermValidator {
        &self.validator
    }

    pub fn default_contact(&self) -> &ContactInfo {
        &self.default_contact
    }

    /// Encode a local patient as a wire `patient` object.
    ///
    /// For a reply, features come from the privacy filter and at most `top_genes` candidate genes
    /// are included when the genes can be ranked. For a query, the patient's own features are
    /// validated and emitted as they are. `top_genes == 0` means all candidate genes.
    ///
    /// # Errors
    ///
    /// Returns [`MmeError::ProtocolViolation`] if, after filtering, the patient has neither
    /// features nor genes.
    pub fn encode_patient(&self, source: PatientSource<'_>, top_genes: usize) -> MmeResult<Value> {
        patient::encode(self, source, &source.patient().id, top_genes)
    }

    /// Encode an outgoing match request body for `patient`, published under `wire_id`.
    ///
    /// # Errors
    ///
    /// Returns [`MmeError::ProtocolViolation`] if the patient describes nothing.
    pub fn encode_request(
        &self,
        patient: &LocalPatient,
        wire_id: &str,
        top_genes: usize,
    ) -> MmeResult<Value> {
        let encoded = patient::encode(self, PatientSource::Query(patient), wire_id, top_genes)?;
        Ok(json!({ "patient": encoded }))
    }

    /// Decode the body of an incoming match request.
    ///
    /// # Errors
    ///
    /// Returns [`MmeError::ProtocolViolation`] if the body has no `patient` object, or if the
    /// patient itself fails [`Codec::decode_patient`].
    pub fn decode_request(&self, body: &Value) -> MmeResult<MatchingPatient> {
        match body.get("patient") {
            Some(patient @ Value::Object(_)) => self.decode_patient(patient),
            _ => Err(MmeError::ProtocolViolation(
                "request has no patient object".into(),
            )),
        }
    }

    /// Decode a wire `patient` object.
    ///
    /// Entries with unsupported term ids, unknown `observed` values or no usable gene id are
    /// dropped and logged, as are entries of the wrong JSON type.
    ///
    /// # Errors
    ///
    /// Returns [`MmeError::ProtocolViolation`] if the patient is not an object, if its id is
    /// missing, or if no usable feature and no usable gene remain.
    pub fn decode_patient(&self, patient: &Value) -> MmeResult<MatchingPatient> {
        patient::decode(self, patient)
    }

    /// Assemble a reply body from similarity views, keeping their order.
    ///
    /// Views that cannot be encoded are logged and left out of the reply.
    pub fn encode_response(&self, matches: &[SimilarityView], top_genes: usize) -> Value {
        response::encode(self, matches, top_genes)
    }

    /// Decode the `results` of a partner's reply. Unusable results are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`MmeError::ProtocolViolation`] if the body has no `results` array.
    pub fn decode_response(&self, body: &Value) -> MmeResult<Vec<RemoteMatch>> {
        response::decode(self, body)
    }

    /// Body of a non-200 reply.
    pub fn error_body(message: &str) -> Value {
        json!({ "message": message })
    }
}

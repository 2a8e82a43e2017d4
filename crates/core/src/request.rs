//! Match-request audit records.
//!
//! A record is created when a request is received or about to be sent, owned by the flow that
//! created it, and handed to the audit store once the flow finishes. The response is recorded
//! exactly once.

use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use mme::{MatchingPatient, RemoteMatch, WireCodec};
use serde::Serialize;
use uuid::Uuid;

/// `reply_http_status` of a request that was never dispatched.
pub const STATUS_NOT_ATTEMPTED: i32 = 0;

/// `reply_http_status` of a request whose dispatch failed at the network level
/// (DNS, TLS, refused connection, timeout).
pub const STATUS_COMMUNICATION_PROBLEM: i32 = -1;

/// Fields shared by incoming and outgoing match requests.
pub trait MatchRequest {
    fn id(&self) -> Uuid;
    fn remote_server_id(&self) -> Option<&str>;
    fn api_version_used(&self) -> &str;
    fn request_json(&self) -> Option<&str>;
    fn response_json(&self) -> Option<&str>;
    fn request_time(&self) -> DateTime<Utc>;
}

/// A query received from a partner server, with the reply we produced.
#[derive(Clone, Debug)]
pub struct IncomingMatchRequest {
    id: Uuid,
    remote_server_id: Option<String>,
    api_version_used: String,
    request_json: String,
    response_json: Option<String>,
    reply_status: Option<u16>,
    request_time: DateTime<Utc>,
    model_patient: Option<MatchingPatient>,
    is_test_request: bool,
}

impl IncomingMatchRequest {
    /// Start a record for a raw request body, before anything about it is known.
    pub fn received(raw_body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            remote_server_id: None,
            api_version_used: String::new(),
            request_json: raw_body.into(),
            response_json: None,
            reply_status: None,
            request_time: Utc::now(),
            model_patient: None,
            is_test_request: false,
        }
    }

    pub fn set_remote_server_id(&mut self, server_id: impl Into<String>) {
        self.remote_server_id = Some(server_id.into());
    }

    pub fn set_api_version_used(&mut self, version: impl Into<String>) {
        self.api_version_used = version.into();
    }

    /// Attach the decoded query patient. A patient marked as test data flags the request.
    pub fn set_model_patient(&mut self, patient: MatchingPatient) {
        self.is_test_request = patient.is_test;
        self.model_patient = Some(patient);
    }

    /// Record the reply sent back to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ResponseAlreadyRecorded`] if a reply was already recorded.
    pub fn record_response(&mut self, status: u16, body: impl Into<String>) -> CoreResult<()> {
        if self.response_json.is_some() {
            return Err(CoreError::ResponseAlreadyRecorded(self.id));
        }
        self.reply_status = Some(status);
        self.response_json = Some(body.into());
        Ok(())
    }

    pub fn model_patient(&self) -> Option<&MatchingPatient> {
        self.model_patient.as_ref()
    }

    /// The query patient is not a real patient; its matches must not be surfaced as real.
    pub fn is_test_request(&self) -> bool {
        self.is_test_request
    }

    pub fn reply_status(&self) -> Option<u16> {
        self.reply_status
    }
}

impl MatchRequest for IncomingMatchRequest {
    fn id(&self) -> Uuid {
        self.id
    }

    fn remote_server_id(&self) -> Option<&str> {
        self.remote_server_id.as_deref()
    }

    fn api_version_used(&self) -> &str {
        &self.api_version_used
    }

    fn request_json(&self) -> Option<&str> {
        Some(&self.request_json)
    }

    fn response_json(&self) -> Option<&str> {
        self.response_json.as_deref()
    }

    fn request_time(&self) -> DateTime<Utc> {
        self.request_time
    }
}

/// A query we sent (or tried to send) to a partner server on behalf of a local patient.
#[derive(Clone, Debug, Serialize)]
pub struct OutgoingMatchRequest {
    id: Uuid,
    remote_server_id: String,
    local_reference_patient_id: String,
    api_version_used: String,
    request_json: Option<String>,
    response_json: Option<String>,
    reply_http_status: i32,
    error_message: Option<String>,
    request_time: DateTime<Utc>,
}

impl OutgoingMatchRequest {
    pub fn new(
        remote_server_id: impl Into<String>,
        local_reference_patient_id: impl Into<String>,
        api_version_used: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            remote_server_id: remote_server_id.into(),
            local_reference_patient_id: local_reference_patient_id.into(),
            api_version_used: api_version_used.into(),
            request_json: None,
            response_json: None,
            reply_http_status: STATUS_NOT_ATTEMPTED,
            error_message: None,
            request_time: Utc::now(),
        }
    }

    pub fn set_request_json(&mut self, json: impl Into<String>) {
        self.request_json = Some(json.into());
    }

    /// The request could not be built or addressed; nothing went on the wire.
    pub fn mark_not_sent(&mut self, message: impl Into<String>) {
        self.reply_http_status = STATUS_NOT_ATTEMPTED;
        self.error_message = Some(message.into());
    }

    /// Dispatch failed before any HTTP reply arrived.
    pub fn mark_communication_problem(&mut self, message: impl Into<String>) {
        self.reply_http_status = STATUS_COMMUNICATION_PROBLEM;
        self.error_message = Some(message.into());
    }

    /// Record the partner's raw reply.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ResponseAlreadyRecorded`] if a reply was already recorded.
    pub fn record_response(&mut self, status: u16, body: impl Into<String>) -> CoreResult<()> {
        if self.response_json.is_some() {
            return Err(CoreError::ResponseAlreadyRecorded(self.id));
        }
        self.reply_http_status = i32::from(status);
        self.response_json = Some(body.into());
        Ok(())
    }

    pub fn local_reference_patient_id(&self) -> &str {
        &self.local_reference_patient_id
    }

    /// `0` when never attempted, [`STATUS_COMMUNICATION_PROBLEM`] on network failure,
    /// otherwise the HTTP status of the reply.
    pub fn reply_http_status(&self) -> i32 {
        self.reply_http_status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// A request body was built and went out without a local or network error.
    pub fn was_sent(&self) -> bool {
        self.request_json.is_some() && self.error_message.is_none()
    }

    pub fn error_contacting_remote_server(&self) -> bool {
        self.reply_http_status == STATUS_COMMUNICATION_PROBLEM
    }

    /// Sent, answered with a 2xx status, and the body parses as JSON.
    pub fn got_valid_reply(&self) -> bool {
        self.was_sent()
            && (200..300).contains(&self.reply_http_status)
            && self
                .response_json
                .as_deref()
                .is_some_and(|body| serde_json::from_str::<serde_json::Value>(body).is_ok())
    }

    /// Matches carried by a valid reply, decoded with `codec`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if there is no valid reply, or the codec's error if
    /// the reply has no `results`.
    pub fn remote_matches(&self, codec: &WireCodec) -> CoreResult<Vec<RemoteMatch>> {
        if !self.got_valid_reply() {
            return Err(CoreError::InvalidInput(format!(
                "match request {} has no valid reply",
                self.id
            )));
        }
        let body = self.response_json.as_deref().unwrap_or_default();
        let json: serde_json::Value =
            serde_json::from_str(body).map_err(CoreError::Deserialization)?;
        Ok(codec.decode_response(&json)?)
    }
}

impl MatchRequest for OutgoingMatchRequest {
    fn id(&self) -> Uuid {
        self.id
    }

    fn remote_server_id(&self) -> Option<&str> {
        Some(&self.remote_server_id)
    }

    fn api_version_used(&self) -> &str {
        &self.api_version_used
    }

    fn request_json(&self) -> Option<&str> {
        self.request_json.as_deref()
    }

    fn response_json(&self) -> Option<&str> {
        self.response_json.as_deref()
    }

    fn request_time(&self) -> DateTime<Utc> {
        self.request_time
    }
}

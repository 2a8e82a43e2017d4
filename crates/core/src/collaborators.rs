//! Narrow interfaces to the services the protocol engine depends on but does not own.
//!
//! Implementations must be safe to call repeatedly and independently from concurrent
//! request-handling threads.

use crate::config::RemoteServerConfig;
use crate::request::{IncomingMatchRequest, OutgoingMatchRequest};
use crate::CoreResult;
use mme::{LocalPatient, MatchingPatient, SimilarityView};
use std::net::IpAddr;

/// Finds local patients similar to a model patient, best match first.
pub trait SimilarityFinder: Send + Sync {
    fn find_matches(&self, patient: &MatchingPatient) -> CoreResult<Vec<SimilarityView>>;
}

/// What a patient's consent is being checked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsentPurpose {
    /// Sharing the patient's data with partner servers as a match.
    Matching,
}

pub trait ConsentChecker: Send + Sync {
    fn has_consent(&self, patient_id: &str, purpose: ConsentPurpose) -> bool;
}

/// Persists match-request records. Each call is an independent, atomic write.
pub trait AuditStore: Send + Sync {
    fn save_incoming(&self, request: &IncomingMatchRequest) -> CoreResult<()>;
    fn save_outgoing(&self, request: &OutgoingMatchRequest) -> CoreResult<()>;
}

/// Configured partner servers.
pub trait RemoteServerDirectory: Send + Sync {
    /// Identify the partner presenting `token` from `remote_ip`. Returns its server id.
    fn authenticate(&self, remote_ip: Option<IpAddr>, token: &str) -> Option<String>;

    fn server(&self, server_id: &str) -> Option<RemoteServerConfig>;
}

/// Read access to the host's local patients.
pub trait PatientRepository: Send + Sync {
    fn local_patient(&self, patient_id: &str) -> Option<LocalPatient>;
}

/// A POST about to be sent to a partner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Whatever the partner answered, whatever the status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportReply {
    pub status: u16,
    pub body: String,
}

/// No HTTP reply was obtained.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("could not connect: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Other(String),
}

/// Blocking HTTP POST, bounded by a timeout. No retries.
pub trait MatchTransport: Send + Sync {
    fn post(&self, request: &TransportRequest) -> Result<TransportReply, TransportError>;
}

//! # Matchmaker Core
//!
//! Protocol engine for the Matchmaker Exchange.
//!
//! This crate owns the request flows on both sides of a match:
//! - [`incoming`]: validating, authenticating and answering queries from partner servers
//! - [`outgoing`]: sending a local patient to a partner and classifying the outcome
//! - [`request`]: the audit records both flows produce
//!
//! Everything the flows depend on but do not own (similarity search, consent, patient storage,
//! audit persistence, HTTP) sits behind the traits in [`collaborators`]. [`in_memory`] and
//! [`remote_registry`] provide reference implementations.
//!
//! **No HTTP server concerns**: routing and header extraction belong in `api-rest`.

pub mod collaborators;
pub mod config;
pub mod constants;
mod error;
pub mod in_memory;
pub mod incoming;
pub mod outgoing;
pub mod remote_registry;
pub mod request;

pub use collaborators::{
    AuditStore, ConsentChecker, ConsentPurpose, MatchTransport, PatientRepository,
    RemoteServerDirectory, SimilarityFinder, TransportError, TransportReply, TransportRequest,
};
pub use config::{load_core_config, ConfigSources, CoreConfig, RemoteServerConfig};
pub use error::{CoreError, CoreResult};
pub use in_memory::{InMemoryAuditStore, InMemoryPatientStore, StoredPatient};
pub use incoming::{IncomingHttpRequest, IncomingRequestProcessor, MatchReply};
pub use outgoing::{pseudonymise_patient_id, HttpTransport, OutgoingRequestClient};
pub use remote_registry::RemoteServerRegistry;
pub use request::{
    IncomingMatchRequest, MatchRequest, OutgoingMatchRequest, STATUS_COMMUNICATION_PROBLEM,
    STATUS_NOT_ATTEMPTED,
};

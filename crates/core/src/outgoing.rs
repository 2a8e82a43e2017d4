//! Outgoing match requests.
//!
//! [`OutgoingRequestClient::send_request`] never returns an error: every outcome, including
//! "nothing was sent", is described by the returned [`OutgoingMatchRequest`] and persisted to the
//! audit store. Retrying is the caller's decision.

use crate::collaborators::{
    AuditStore, MatchTransport, PatientRepository, RemoteServerDirectory, TransportError,
    TransportReply, TransportRequest,
};
use crate::config::CoreConfig;
use crate::constants::{AUTH_TOKEN_HEADER, MATCH_ENDPOINT};
use crate::request::OutgoingMatchRequest;
use crate::{CoreError, CoreResult};
use mme::{ApiRegistry, WireCodec};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Blocking `reqwest` transport.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(CoreError::HttpClient)?;
        Ok(Self { client })
    }
}

impl MatchTransport for HttpTransport {
    fn post(&self, request: &TransportRequest) -> Result<TransportReply, TransportError> {
        let mut builder = self.client.post(&request.url).body(request.body.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(classify)?;
        Ok(TransportReply { status, body })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

/// Identifier under which a local patient is published to partners.
///
/// Lowercase hex SHA-256 of the local id, so the local id never leaves the server.
pub fn pseudonymise_patient_id(local_id: &str) -> String {
    hex::encode(Sha256::digest(local_id.as_bytes()))
}

/// `base_url` + `/match`, without doubling slashes.
pub fn match_url(base_url: &str) -> String {
    format!("{}/{MATCH_ENDPOINT}", base_url.trim().trim_end_matches('/'))
}

/// Sends local patients to partner servers.
#[derive(Clone)]
pub struct OutgoingRequestClient {
    registry: Arc<ApiRegistry>,
    config: Arc<CoreConfig>,
    servers: Arc<dyn RemoteServerDirectory>,
    patients: Arc<dyn PatientRepository>,
    transport: Arc<dyn MatchTransport>,
    audit: Arc<dyn AuditStore>,
}

impl OutgoingRequestClient {
    pub fn new(
        registry: Arc<ApiRegistry>,
        config: Arc<CoreConfig>,
        servers: Arc<dyn RemoteServerDirectory>,
        patients: Arc<dyn PatientRepository>,
        transport: Arc<dyn MatchTransport>,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            registry,
            config,
            servers,
            patients,
            transport,
            audit,
        }
    }

    /// The codec outgoing requests are written with.
    pub fn codec(&self) -> CoreResult<&WireCodec> {
        self.registry
            .latest()
            .ok_or_else(|| CoreError::InvalidInput("no API version is registered".into()))
    }

    /// Request body that would be sent for `patient_id`.
    ///
    /// `top_genes` overrides the configured number of candidate genes (`0` means all).
    pub fn generate_request_json(
        &self,
        patient_id: &str,
        top_genes: Option<usize>,
    ) -> CoreResult<Value> {
        let codec = self.codec()?;
        let patient = self
            .patients
            .local_patient(patient_id)
            .ok_or_else(|| CoreError::UnknownPatient(patient_id.to_string()))?;
        let top_genes = top_genes.unwrap_or(self.config.query_top_genes());
        Ok(codec.encode_request(&patient, &pseudonymise_patient_id(&patient.id), top_genes)?)
    }

    /// Query `server_id` with local patient `patient_id`.
    pub fn send_request(
        &self,
        patient_id: &str,
        server_id: &str,
        top_genes: Option<usize>,
    ) -> OutgoingMatchRequest {
        let version = self
            .registry
            .latest()
            .map(|c| c.version().as_str())
            .unwrap_or_default();
        let mut record = OutgoingMatchRequest::new(server_id, patient_id, version);

        self.dispatch(&mut record, patient_id, server_id, top_genes);

        if let Err(err) = self.audit.save_outgoing(&record) {
            tracing::error!("failed to persist outgoing match request: {}", err);
        }
        record
    }

    fn dispatch(
        &self,
        record: &mut OutgoingMatchRequest,
        patient_id: &str,
        server_id: &str,
        top_genes: Option<usize>,
    ) {
        let Some(server) = self.servers.server(server_id) else {
            tracing::warn!(
                "not sending [{}]: remote server [{}] is not configured",
                patient_id,
                server_id
            );
            record.mark_not_sent(CoreError::UnknownServer(server_id.to_string()).to_string());
            return;
        };

        let body = match self.generate_request_json(patient_id, top_genes) {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!("not sending [{}] to [{}]: {}", patient_id, server_id, err);
                record.mark_not_sent(err.to_string());
                return;
            }
        };
        let body = body.to_string();
        record.set_request_json(body.as_str());

        let media_type = self
            .codec()
            .map(WireCodec::media_type)
            .unwrap_or_default();
        let request = TransportRequest {
            url: match_url(&server.base_url),
            headers: vec![
                (AUTH_TOKEN_HEADER.to_string(), server.remote_auth_token.clone()),
                ("Content-Type".to_string(), media_type.clone()),
                ("Accept".to_string(), media_type),
            ],
            body,
        };

        tracing::debug!("POST {} for patient [{}]", request.url, patient_id);
        match self.transport.post(&request) {
            Ok(reply) => {
                tracing::info!(
                    "server [{}] answered query for [{}] with status {}",
                    server_id,
                    patient_id,
                    reply.status
                );
                if let Err(err) = record.record_response(reply.status, reply.body) {
                    tracing::error!("failed to record reply from [{}]: {}", server_id, err);
                }
            }
            Err(err) => {
                tracing::warn!("could not reach server [{}]: {}", server_id, err);
                record.mark_communication_problem(err.to_string());
            }
        }
    }
}

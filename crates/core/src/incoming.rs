//! Incoming match request processing.
//!
//! One call to [`IncomingRequestProcessor::process`] handles one request, strictly in order:
//! parse, authenticate, select the API version, decode, match, filter by consent, assemble the
//! reply. The first failing step ends the request. Every outcome is handed to the audit store.

use crate::collaborators::{
    AuditStore, ConsentChecker, ConsentPurpose, RemoteServerDirectory, SimilarityFinder,
};
use crate::config::CoreConfig;
use crate::request::IncomingMatchRequest;
use mme::api_1::Codec;
use mme::{version_from_media_type, ApiRegistry, MmeError, RequestedVersion, SimilarityView};
use serde_json::{json, Value};
use std::net::IpAddr;
use std::sync::Arc;

const JSON_MEDIA_TYPE: &str = "application/json";

/// The parts of an HTTP request the processor needs.
#[derive(Clone, Debug, Default)]
pub struct IncomingHttpRequest {
    pub body: String,
    pub remote_addr: Option<IpAddr>,
    pub auth_token: Option<String>,
    /// `Accept` header, or `Content-Type` when no `Accept` was sent.
    pub accept: Option<String>,
}

/// What to send back.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchReply {
    pub status: u16,
    pub body: Value,
    pub media_type: String,
}

impl MatchReply {
    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: Codec::error_body(message),
            media_type: JSON_MEDIA_TYPE.to_string(),
        }
    }
}

/// Processes match requests from partner servers.
#[derive(Clone)]
pub struct IncomingRequestProcessor {
    registry: Arc<ApiRegistry>,
    config: Arc<CoreConfig>,
    servers: Arc<dyn RemoteServerDirectory>,
    finder: Arc<dyn SimilarityFinder>,
    consent: Arc<dyn ConsentChecker>,
    audit: Arc<dyn AuditStore>,
}

impl IncomingRequestProcessor {
    pub fn new(
        registry: Arc<ApiRegistry>,
        config: Arc<CoreConfig>,
        servers: Arc<dyn RemoteServerDirectory>,
        finder: Arc<dyn SimilarityFinder>,
        consent: Arc<dyn ConsentChecker>,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            registry,
            config,
            servers,
            finder,
            consent,
            audit,
        }
    }

    /// Handle one match request. Never fails; every failure is a reply with an error status.
    pub fn process(&self, request: IncomingHttpRequest) -> MatchReply {
        let mut record = IncomingMatchRequest::received(request.body.as_str());
        let reply = self.run(&request, &mut record);

        if let Err(err) = record.record_response(reply.status, reply.body.to_string()) {
            tracing::error!("failed to record match reply: {}", err);
        }
        if let Err(err) = self.audit.save_incoming(&record) {
            tracing::error!("failed to persist incoming match request: {}", err);
        }
        reply
    }

    fn run(&self, request: &IncomingHttpRequest, record: &mut IncomingMatchRequest) -> MatchReply {
        // 1. parse
        let json: Value = match serde_json::from_str(&request.body) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!("rejecting match request with malformed JSON: {}", err);
                return MatchReply::error(400, "malformed JSON");
            }
        };

        // 2. authenticate
        let token = request.auth_token.as_deref().unwrap_or_default();
        let Some(server_id) = self.servers.authenticate(request.remote_addr, token) else {
            tracing::warn!(
                "rejecting match request from unauthorised caller {:?}",
                request.remote_addr
            );
            return MatchReply::error(401, "unauthorized server");
        };
        record.set_remote_server_id(&server_id);

        // 3. version
        let codec = match self.registry.negotiate(request.accept.as_deref()) {
            Ok(codec) => codec,
            Err(MmeError::UnsupportedVersion {
                requested,
                supported,
            }) => {
                tracing::warn!(
                    "server [{}] requested unsupported API version [{}]",
                    server_id,
                    requested
                );
                if let Some(version) = requested_version(request.accept.as_deref()) {
                    record.set_api_version_used(version);
                }
                return MatchReply {
                    status: 406,
                    body: json!({
                        "message": "unsupported API version",
                        "supportedVersions": supported,
                    }),
                    media_type: JSON_MEDIA_TYPE.to_string(),
                };
            }
            Err(err) => {
                tracing::error!("API version negotiation failed: {}", err);
                return MatchReply::error(500, "internal server error");
            }
        };
        record.set_api_version_used(codec.version().as_str());

        // 4. decode
        let patient = match codec.decode_request(&json) {
            Ok(patient) => patient,
            Err(err @ MmeError::ProtocolViolation(_)) => {
                tracing::warn!("server [{}] sent an invalid query: {}", server_id, err);
                return MatchReply::error(400, &err.to_string());
            }
            Err(err) => {
                tracing::error!("failed to decode query from [{}]: {}", server_id, err);
                return MatchReply::error(500, "internal server error");
            }
        };
        if patient.is_test {
            tracing::info!("server [{}] sent a test query", server_id);
        }
        record.set_model_patient(patient.clone());

        // 5. match
        let views = match self.finder.find_matches(&patient) {
            Ok(views) => views,
            Err(err) => {
                tracing::error!("similarity search failed for [{}]: {}", server_id, err);
                return MatchReply::error(500, "internal server error");
            }
        };

        // 6. consent
        let views: Vec<SimilarityView> = views
            .into_iter()
            .filter(|view| {
                let allowed = self
                    .consent
                    .has_consent(&view.patient.id, ConsentPurpose::Matching);
                if !allowed {
                    tracing::warn!(
                        "dropping match [{}]: no matching consent",
                        view.patient.id
                    );
                }
                allowed
            })
            .collect();

        // 7. assemble
        let body = codec.encode_response(&views, self.config.reply_top_genes());
        tracing::info!(
            "answering [{}] with {} match(es)",
            server_id,
            body["results"].as_array().map_or(0, Vec::len)
        );

        MatchReply {
            status: 200,
            body,
            media_type: codec.media_type(),
        }
    }
}

/// The `major.minor` token named by a media-type header, if any range names one.
fn requested_version(header: Option<&str>) -> Option<String> {
    header?
        .split(',')
        .find_map(|range| match version_from_media_type(range) {
            RequestedVersion::Exact(version) => Some(version),
            RequestedVersion::Latest | RequestedVersion::Unrecognised => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteServerConfig;
    use crate::in_memory::InMemoryAuditStore;
    use crate::remote_registry::RemoteServerRegistry;
    use crate::request::MatchRequest;
    use crate::{CoreError, CoreResult};
    use mme::{
        ContactInfo, FeatureMatchGroup, LocalFeature, LocalPatient, MatchingPatient,
        NonEmptyText, Presence, TermValidator,
    };
    use parking_lot::Mutex;
    use std::collections::BTreeSet;
    use std::time::Duration;

    const TOKEN: &str = "incoming-secret";

    /// Returns fixed views and counts calls.
    struct FixtureFinder {
        views: Vec<SimilarityView>,
        calls: Mutex<usize>,
        fail: bool,
    }

    impl SimilarityFinder for FixtureFinder {
        fn find_matches(&self, _patient: &MatchingPatient) -> CoreResult<Vec<SimilarityView>> {
            *self.calls.lock() += 1;
            if self.fail {
                return Err(CoreError::Similarity("index unavailable".into()));
            }
            Ok(self.views.clone())
        }
    }

    struct DenyList(BTreeSet<String>);

    impl ConsentChecker for DenyList {
        fn has_consent(&self, patient_id: &str, _purpose: ConsentPurpose) -> bool {
            !self.0.contains(patient_id)
        }
    }

    fn view(id: &str, score: f64) -> SimilarityView {
        SimilarityView {
            patient: LocalPatient {
                id: id.into(),
                features: vec![LocalFeature {
                    id: "HP:0000316".into(),
                    presence: Presence::Present,
                    age_of_onset: None,
                }],
                ..LocalPatient::default()
            },
            score,
            feature_matches: vec![FeatureMatchGroup::new(
                "HP:0000316",
                vec!["HP:0000316".into()],
            )],
        }
    }

    struct Harness {
        processor: IncomingRequestProcessor,
        finder: Arc<FixtureFinder>,
        audit: Arc<InMemoryAuditStore>,
    }

    fn harness(views: Vec<SimilarityView>, denied: &[&str], fail: bool) -> Harness {
        let contact = ContactInfo::support(
            NonEmptyText::new("Support").unwrap(),
            NonEmptyText::new("Node").unwrap(),
            NonEmptyText::new("support@example.org").unwrap(),
        );
        let registry = Arc::new(ApiRegistry::with_supported_versions(
            TermValidator::standard().unwrap(),
            contact.clone(),
        ));
        let config = Arc::new(
            CoreConfig::new(contact, 5, 0, Duration::from_secs(5), Vec::new()).expect("config"),
        );
        let servers = Arc::new(RemoteServerRegistry::new(vec![RemoteServerConfig {
            server_id: "partner-a".into(),
            name: None,
            base_url: "https://partner-a.example.org".into(),
            remote_auth_token: "outgoing-secret".into(),
            local_auth_token: TOKEN.into(),
            limit_accepted_ips: false,
        }]));
        let finder = Arc::new(FixtureFinder {
            views,
            calls: Mutex::new(0),
            fail,
        });
        let consent = Arc::new(DenyList(denied.iter().map(|s| s.to_string()).collect()));
        let audit = Arc::new(InMemoryAuditStore::new());

        Harness {
            processor: IncomingRequestProcessor::new(
                registry,
                config,
                servers,
                finder.clone(),
                consent,
                audit.clone(),
            ),
            finder,
            audit,
        }
    }

    fn request(body: Value) -> IncomingHttpRequest {
        IncomingHttpRequest {
            body: body.to_string(),
            remote_addr: None,
            auth_token: Some(TOKEN.into()),
            accept: Some("application/vnd.ga4gh.matchmaker.v1.0+json".into()),
        }
    }

    fn query() -> Value {
        json!({"patient": {"id": "remote-1", "features": [{"id": "HP:0000316", "observed": "yes"}]}})
    }

    #[test]
    fn well_formed_request_returns_scored_match() {
        let h = harness(vec![view("P0000001", 0.8)], &[], false);

        let reply = h.processor.process(request(query()));

        assert_eq!(reply.status, 200);
        assert_eq!(reply.media_type, "application/vnd.ga4gh.matchmaker.v1.0+json");
        let results = reply.body["results"].as_array().expect("results");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["score"]["patient"], 0.8);

        let audited = h.audit.incoming_by_server("partner-a");
        assert_eq!(audited.len(), 1);
        assert_eq!(audited[0].api_version_used(), "1.0");
        assert_eq!(audited[0].reply_status(), Some(200));
        assert!(audited[0].model_patient().is_some());
    }

    #[test]
    fn malformed_json_is_rejected_and_audited() {
        let h = harness(vec![view("P0000001", 0.8)], &[], false);
        let mut req = request(query());
        req.body = "{not json".into();

        let reply = h.processor.process(req);

        assert_eq!(reply.status, 400);
        assert_eq!(*h.finder.calls.lock(), 0);
        let audited = h.audit.incoming();
        assert_eq!(audited.len(), 1);
        assert_eq!(audited[0].request_json(), Some("{not json"));
    }

    #[test]
    fn unknown_token_is_unauthorised() {
        let h = harness(vec![view("P0000001", 0.8)], &[], false);
        let mut req = request(query());
        req.auth_token = Some("guess".into());

        let reply = h.processor.process(req);

        assert_eq!(reply.status, 401);
        assert_eq!(reply.body, json!({"message": "unauthorized server"}));
        assert_eq!(*h.finder.calls.lock(), 0);
        assert_eq!(h.audit.incoming().len(), 1);
    }

    #[test]
    fn unsupported_version_lists_supported_versions() {
        let h = harness(vec![], &[], false);
        let mut req = request(query());
        req.accept = Some("application/vnd.ga4gh.matchmaker.v9.9+json".into());

        let reply = h.processor.process(req);

        assert_eq!(reply.status, 406);
        assert_eq!(reply.body["supportedVersions"], json!(["1.0", "1.1"]));
        assert_eq!(*h.finder.calls.lock(), 0);
        assert_eq!(h.audit.incoming()[0].api_version_used(), "9.9");
    }

    #[test]
    fn unrecognised_media_type_leaves_version_blank() {
        let h = harness(vec![], &[], false);
        let mut req = request(query());
        req.accept = Some("text/html, application/xml".into());

        let reply = h.processor.process(req);

        assert_eq!(reply.status, 406);
        let audited = h.audit.incoming();
        assert_eq!(audited.len(), 1);
        assert_eq!(audited[0].api_version_used(), "");
    }

    #[test]
    fn protocol_violation_echoes_message() {
        let h = harness(vec![], &[], false);

        let reply = h
            .processor
            .process(request(json!({"patient": {"features": [{"id": "HP:0000316"}]}})));

        assert_eq!(reply.status, 400);
        assert_eq!(reply.body["message"], "remote patient has no id");
        assert_eq!(*h.finder.calls.lock(), 0);
        assert_eq!(h.audit.incoming().len(), 1);
    }

    #[test]
    fn matches_without_consent_are_dropped() {
        let h = harness(
            vec![view("P0000001", 0.9), view("P0000002", 0.7)],
            &["P0000001"],
            false,
        );

        let reply = h.processor.process(request(query()));

        let results = reply.body["results"].as_array().expect("results");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["patient"]["id"], "P0000002");
    }

    #[test]
    fn similarity_failure_is_internal_error_without_details() {
        let h = harness(vec![], &[], true);

        let reply = h.processor.process(request(query()));

        assert_eq!(reply.status, 500);
        assert_eq!(reply.body, json!({"message": "internal server error"}));
        assert_eq!(h.audit.incoming().len(), 1);
    }

    #[test]
    fn test_patients_flag_the_request() {
        let h = harness(vec![view("P0000001", 0.8)], &[], false);
        let body = json!({"patient": {"id": "remote-1", "test": true, "features": [{"id": "HP:0000316"}]}});

        let reply = h.processor.process(request(body));

        assert_eq!(reply.status, 200);
        assert!(h.audit.incoming()[0].is_test_request());
    }

    #[test]
    fn missing_accept_header_uses_latest_version() {
        let h = harness(vec![], &[], false);
        let mut req = request(query());
        req.accept = None;

        let reply = h.processor.process(req);

        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, json!({"results": []}));
        assert_eq!(h.audit.incoming()[0].api_version_used(), "1.1");
    }

    #[test]
    fn audit_failures_do_not_change_the_reply() {
        struct FailingAudit;
        impl AuditStore for FailingAudit {
            fn save_incoming(&self, _: &IncomingMatchRequest) -> CoreResult<()> {
                Err(CoreError::Audit("disk full".into()))
            }
            fn save_outgoing(&self, _: &crate::request::OutgoingMatchRequest) -> CoreResult<()> {
                Err(CoreError::Audit("disk full".into()))
            }
        }

        let h = harness(vec![view("P0000001", 0.8)], &[], false);
        let processor = IncomingRequestProcessor {
            audit: Arc::new(FailingAudit),
            ..h.processor
        };

        assert_eq!(processor.process(request(query())).status, 200);
    }
}

//! In-memory reference collaborators.
//!
//! These let the binaries run end-to-end without a host application. The similarity finder is a
//! plain overlap count and stands in for a real scoring engine.

use crate::collaborators::{
    AuditStore, ConsentChecker, ConsentPurpose, PatientRepository, SimilarityFinder,
};
use crate::request::{IncomingMatchRequest, MatchRequest, OutgoingMatchRequest};
use crate::{CoreError, CoreResult};
use mme::{
    FeatureMatchGroup, GeneSymbol, LocalPatient, MatchingPatient, Presence, SimilarityView, TermId,
};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// A local patient plus its matching consent, as stored in the patients fixture file.
#[derive(Clone, Debug, Deserialize)]
pub struct StoredPatient {
    #[serde(flatten)]
    pub patient: LocalPatient,
    #[serde(default = "default_consent")]
    pub matching_consent: bool,
}

fn default_consent() -> bool {
    true
}

/// Patient repository, consent checker and similarity finder over a fixed set of patients.
#[derive(Clone, Debug, Default)]
pub struct InMemoryPatientStore {
    patients: BTreeMap<String, StoredPatient>,
}

impl InMemoryPatientStore {
    pub fn new(patients: Vec<StoredPatient>) -> Self {
        Self {
            patients: patients
                .into_iter()
                .map(|stored| (stored.patient.id.clone(), stored))
                .collect(),
        }
    }

    /// Load patients from a JSON array of [`StoredPatient`].
    pub fn from_json_file(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path).map_err(CoreError::FileRead)?;
        let patients: Vec<StoredPatient> =
            serde_json::from_str(&text).map_err(CoreError::Deserialization)?;
        tracing::info!("loaded {} local patient(s) from {}", patients.len(), path.display());
        Ok(Self::new(patients))
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }

    fn view(stored: &StoredPatient, query: &MatchingPatient) -> Option<SimilarityView> {
        let patient = &stored.patient;
        let query_features: BTreeSet<&TermId> = query.observed_features().map(|f| &f.id).collect();
        let query_genes: BTreeSet<&GeneSymbol> = query.genes.iter().map(|g| &g.name).collect();

        let local_features: BTreeSet<TermId> = patient
            .features
            .iter()
            .filter(|f| f.presence == Presence::Present)
            .filter_map(|f| TermId::new(&f.id).ok())
            .collect();
        let local_genes: BTreeSet<GeneSymbol> = patient
            .genes
            .iter()
            .filter(|g| g.candidate)
            .filter_map(|g| GeneSymbol::new(&g.symbol).ok())
            .collect();

        let shared_features: Vec<&TermId> = local_features
            .iter()
            .filter(|id| query_features.contains(id))
            .collect();
        let shared_genes = local_genes
            .iter()
            .filter(|g| query_genes.contains(g))
            .count();

        let denominator = query_features.len() + query_genes.len();
        let shared = shared_features.len() + shared_genes;
        if denominator == 0 || shared == 0 {
            return None;
        }

        let mut feature_matches: Vec<FeatureMatchGroup> = shared_features
            .iter()
            .map(|id| FeatureMatchGroup::new(id.as_str(), vec![id.to_string()]))
            .collect();
        let unmatched = local_features.len() - shared_features.len();
        if unmatched > 0 {
            feature_matches.push(FeatureMatchGroup::new("", vec![String::new(); unmatched]));
        }

        Some(SimilarityView {
            patient: patient.clone(),
            score: shared as f64 / denominator as f64,
            feature_matches,
        })
    }
}

impl PatientRepository for InMemoryPatientStore {
    fn local_patient(&self, patient_id: &str) -> Option<LocalPatient> {
        self.patients.get(patient_id).map(|s| s.patient.clone())
    }
}

impl ConsentChecker for InMemoryPatientStore {
    fn has_consent(&self, patient_id: &str, purpose: ConsentPurpose) -> bool {
        match purpose {
            ConsentPurpose::Matching => self
                .patients
                .get(patient_id)
                .is_some_and(|s| s.matching_consent),
        }
    }
}

impl SimilarityFinder for InMemoryPatientStore {
    fn find_matches(&self, patient: &MatchingPatient) -> CoreResult<Vec<SimilarityView>> {
        let mut views: Vec<SimilarityView> = self
            .patients
            .values()
            .filter_map(|stored| Self::view(stored, patient))
            .collect();
        views.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.patient.id.cmp(&b.patient.id))
        });
        Ok(views)
    }
}

/// Audit store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    incoming: RwLock<Vec<IncomingMatchRequest>>,
    outgoing: RwLock<Vec<OutgoingMatchRequest>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incoming(&self) -> Vec<IncomingMatchRequest> {
        self.incoming.read().clone()
    }

    pub fn outgoing(&self) -> Vec<OutgoingMatchRequest> {
        self.outgoing.read().clone()
    }

    pub fn incoming_by_server(&self, server_id: &str) -> Vec<IncomingMatchRequest> {
        self.incoming
            .read()
            .iter()
            .filter(|r| r.remote_server_id() == Some(server_id))
            .cloned()
            .collect()
    }

    pub fn outgoing_by_server(&self, server_id: &str) -> Vec<OutgoingMatchRequest> {
        self.outgoing
            .read()
            .iter()
            .filter(|r| r.remote_server_id() == Some(server_id))
            .cloned()
            .collect()
    }

    pub fn outgoing_by_patient(&self, patient_id: &str) -> Vec<OutgoingMatchRequest> {
        self.outgoing
            .read()
            .iter()
            .filter(|r| r.local_reference_patient_id() == patient_id)
            .cloned()
            .collect()
    }
}

impl AuditStore for InMemoryAuditStore {
    fn save_incoming(&self, request: &IncomingMatchRequest) -> CoreResult<()> {
        self.incoming.write().push(request.clone());
        Ok(())
    }

    fn save_outgoing(&self, request: &OutgoingMatchRequest) -> CoreResult<()> {
        self.outgoing.write().push(request.clone());
        Ok(())
    }
}

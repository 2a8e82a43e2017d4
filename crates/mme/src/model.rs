//! Domain-level patient carriers.
//!
//! Two families of types live here:
//! - `Local*` types describe a patient held by this server, as handed to the codec for encoding.
//!   They are deliberately loose (raw strings, tri-state presence) because the host repository
//!   is not bound by the wire contract.
//! - [`MatchingPatient`] and its parts describe a patient as exchanged over the wire, after
//!   validation and normalisation.

use crate::privacy::FeatureMatchGroup;
use mme_types::{GeneSymbol, NonEmptyText, TermId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Patient sex as carried on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl Sex {
    /// Map an internal sex code (`M`, `F`, `O`, or the spelled-out word) to a wire value.
    ///
    /// Unknown codes yield `None`, in which case `sex` is omitted from the wire.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "M" | "MALE" => Some(Sex::Male),
            "F" | "FEMALE" => Some(Sex::Female),
            "O" | "OTHER" => Some(Sex::Other),
            _ => None,
        }
    }

    pub(crate) fn to_wire(self) -> &'static str {
        match self {
            Sex::Male => "MALE",
            Sex::Female => "FEMALE",
            Sex::Other => "OTHER",
        }
    }

    pub(crate) fn from_wire(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MALE" => Some(Sex::Male),
            "FEMALE" => Some(Sex::Female),
            "OTHER" => Some(Sex::Other),
            _ => None,
        }
    }
}

/// Closed two-value `observed` enumeration used on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Observed {
    #[default]
    Yes,
    No,
}

impl Observed {
    pub(crate) fn to_wire(self) -> &'static str {
        match self {
            Observed::Yes => "yes",
            Observed::No => "no",
        }
    }

    pub(crate) fn from_wire(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Some(Observed::Yes),
            "no" => Some(Observed::No),
            _ => None,
        }
    }
}

/// Internal tri-state presence of a phenotype feature.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    #[default]
    Present,
    Absent,
    Unknown,
}

/// Collapses the tri-state onto the wire enumeration.
///
/// `Unknown` becomes `No`. The wire has no "unknown" value, so a decoded feature never comes
/// back as `Unknown`; this loss is kept deliberately until product requirements say otherwise.
impl From<Presence> for Observed {
    fn from(presence: Presence) -> Self {
        match presence {
            Presence::Present => Observed::Yes,
            Presence::Absent | Presence::Unknown => Observed::No,
        }
    }
}

/// A validated phenotype feature.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Feature {
    pub id: TermId,
    pub observed: Observed,
    pub age_of_onset: Option<TermId>,
}

/// A validated disorder.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Disorder {
    pub id: TermId,
}

/// A candidate gene. Variant detail is reserved by the protocol but unused here.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CandidateGene {
    pub name: GeneSymbol,
}

/// Contact block. `name` and `href` are always present on encode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContactInfo {
    pub name: String,
    pub institution: Option<String>,
    pub href: String,
}

impl ContactInfo {
    /// Contact identity of the local support team, used whenever a patient has no usable
    /// contact of its own.
    pub fn support(name: NonEmptyText, institution: NonEmptyText, email: NonEmptyText) -> Self {
        Self {
            name: name.to_string(),
            institution: Some(institution.to_string()),
            href: mailto(email.as_str()),
        }
    }

    /// Contact to publish for a local patient.
    ///
    /// Falls back to `default` as a whole when the patient has no contact, the contact's
    /// institution is blank, its name is blank, or its email list is empty.
    pub fn for_local(local: Option<&LocalContact>, default: &ContactInfo) -> ContactInfo {
        let Some(local) = local else {
            return default.clone();
        };

        let name = local.name.as_deref().map(str::trim).unwrap_or_default();
        let institution = local
            .institution
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();
        let email = local
            .emails
            .iter()
            .map(|e| e.trim())
            .find(|e| !e.is_empty());

        match email {
            Some(email) if !name.is_empty() && !institution.is_empty() => ContactInfo {
                name: name.to_string(),
                institution: Some(institution.to_string()),
                href: mailto(email),
            },
            _ => default.clone(),
        }
    }
}

fn mailto(email: &str) -> String {
    if email.starts_with("mailto:") {
        email.to_string()
    } else {
        format!("mailto:{email}")
    }
}

/// A patient as exchanged over the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchingPatient {
    pub id: NonEmptyText,
    pub label: Option<String>,
    pub sex: Option<Sex>,
    pub features: BTreeSet<Feature>,
    pub disorders: BTreeSet<Disorder>,
    pub genes: BTreeSet<CandidateGene>,
    pub contact: Option<ContactInfo>,
    /// The partner marked this patient as a test record.
    pub is_test: bool,
}

impl MatchingPatient {
    /// Features reported as observed-present.
    pub fn observed_features(&self) -> impl Iterator<Item = &Feature> {
        self.features
            .iter()
            .filter(|f| f.observed == Observed::Yes)
    }
}

/// Contact details held by the local repository.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LocalContact {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub emails: Vec<String>,
}

/// Phenotype feature as held by the local repository.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct LocalFeature {
    pub id: String,
    #[serde(default)]
    pub presence: Presence,
    #[serde(default)]
    pub age_of_onset: Option<String>,
}

/// Gene as held by the local repository.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct LocalGene {
    pub symbol: String,
    /// Ranking score from the local genotype analysis, if any.
    #[serde(default)]
    pub score: Option<f64>,
    /// Genes that were reviewed and rejected are kept in the record but never published.
    #[serde(default = "default_true")]
    pub candidate: bool,
}

fn default_true() -> bool {
    true
}

/// A patient held by this server.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct LocalPatient {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Internal sex code (`M`, `F`, `O`, ...).
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub features: Vec<LocalFeature>,
    #[serde(default)]
    pub disorders: Vec<String>,
    #[serde(default)]
    pub genes: Vec<LocalGene>,
    #[serde(default)]
    pub contact: Option<LocalContact>,
    #[serde(default)]
    pub global_age_of_onset: Option<String>,
    #[serde(default)]
    pub mode_of_inheritance: Option<String>,
}

/// A local patient found similar to a query, with the scorer's per-feature match detail.
#[derive(Clone, Debug, PartialEq)]
pub struct SimilarityView {
    pub patient: LocalPatient,
    pub score: f64,
    pub feature_matches: Vec<FeatureMatchGroup>,
}

/// What the codec is asked to encode.
///
/// A query publishes the local patient's own features. A reply publishes only the obfuscated
/// view of how the patient matched the query.
#[derive(Clone, Copy, Debug)]
pub enum PatientSource<'a> {
    Query(&'a LocalPatient),
    Reply(&'a SimilarityView),
}

impl<'a> PatientSource<'a> {
    pub fn patient(&self) -> &'a LocalPatient {
        match *self {
            PatientSource::Query(patient) => patient,
            PatientSource::Reply(view) => &view.patient,
        }
    }

    pub fn is_reply(&self) -> bool {
        matches!(self, PatientSource::Reply(_))
    }
}

/// One result decoded from a partner's reply.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteMatch {
    pub patient: MatchingPatient,
    pub score: Option<f64>,
}

//! API 1.x `patient` object.

use super::Codec;
use crate::model::{
    CandidateGene, ContactInfo, Disorder, Feature, LocalGene, LocalPatient, MatchingPatient,
    Observed, PatientSource, Sex,
};
use crate::privacy::obfuscate_feature_matches;
use crate::{MmeError, MmeResult};
use mme_types::{GeneSymbol, NonEmptyText};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeSet;

// ============================================================================
// Outgoing wire model
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PatientOut {
    id: String,
    contact: ContactOut,
    #[serde(skip_serializing_if = "Option::is_none")]
    sex: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    age_of_onset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inheritance_mode: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    disorders: Vec<TermOut>,
    features: Vec<FeatureOut>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    genomic_features: Vec<GenomicFeatureOut>,
}

#[derive(Serialize)]
struct ContactOut {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    institution: Option<String>,
    href: String,
}

#[derive(Serialize)]
struct TermOut {
    id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FeatureOut {
    id: String,
    observed: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    age_of_onset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    matched: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    obfuscated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
}

#[derive(Serialize)]
struct GenomicFeatureOut {
    gene: TermOut,
}

// ============================================================================
// Incoming wire model
// ============================================================================

// Lenient by construction: partners add fields freely, so unknown keys are ignored and every
// field is optional. Values are read as raw JSON and checked entry by entry; an entry of the
// wrong shape is dropped, never the whole patient. Only a patient that is not an object is a
// schema mismatch.

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatientWire {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    label: Option<Value>,
    #[serde(default)]
    sex: Option<Value>,
    #[serde(default)]
    contact: Option<Value>,
    #[serde(default)]
    features: Option<Value>,
    #[serde(default)]
    disorders: Option<Value>,
    #[serde(default)]
    genomic_features: Option<Value>,
    #[serde(default)]
    test: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeatureWire {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    observed: Option<Value>,
    #[serde(default)]
    age_of_onset: Option<Value>,
}

#[derive(Deserialize)]
struct DisorderWire {
    #[serde(default)]
    id: Option<Value>,
}

#[derive(Deserialize)]
struct GenomicFeatureWire {
    #[serde(default)]
    gene: Option<GeneWire>,
}

#[derive(Deserialize)]
struct GeneWire {
    #[serde(default)]
    id: Option<Value>,
}

// ============================================================================
// Encode
// ============================================================================

pub(super) fn encode(
    codec: &Codec,
    source: PatientSource<'_>,
    wire_id: &str,
    top_genes: usize,
) -> MmeResult<Value> {
    let patient = source.patient();
    let id = wire_id.trim();
    if id.is_empty() {
        return Err(MmeError::ProtocolViolation(format!(
            "local patient [{}] has no publishable id",
            patient.id
        )));
    }

    let validator = codec.validator();
    let contact = ContactInfo::for_local(patient.contact.as_ref(), codec.default_contact());

    let features = match source {
        PatientSource::Reply(view) => {
            obfuscate_feature_matches(&view.feature_matches, validator.phenotype_pattern())
                .into_iter()
                .map(|f| FeatureOut {
                    id: f.id,
                    observed: Observed::Yes.to_wire(),
                    age_of_onset: None,
                    matched: Some(f.matched),
                    obfuscated: Some(f.obfuscated),
                    count: (f.count > 1).then_some(f.count),
                })
                .collect()
        }
        PatientSource::Query(_) => query_features(codec, patient),
    };

    let genes = select_genes(&patient.genes, top_genes);

    if features.is_empty() && genes.is_empty() {
        return Err(MmeError::ProtocolViolation(format!(
            "patient [{}] has no supported features and no candidate genes",
            patient.id
        )));
    }

    let mut seen_disorders = BTreeSet::new();
    let disorders = patient
        .disorders
        .iter()
        .filter_map(|raw| validator.disorder_term(raw))
        .filter(|term| seen_disorders.insert(term.clone()))
        .map(|term| TermOut {
            id: term.to_string(),
        })
        .collect();

    let wire = PatientOut {
        id: id.to_string(),
        contact: ContactOut {
            name: contact.name,
            institution: contact.institution,
            href: contact.href,
        },
        sex: patient
            .sex
            .as_deref()
            .and_then(Sex::from_code)
            .map(Sex::to_wire),
        age_of_onset: qualifier(codec, patient.global_age_of_onset.as_deref()),
        inheritance_mode: qualifier(codec, patient.mode_of_inheritance.as_deref()),
        disorders,
        features,
        genomic_features: genes
            .into_iter()
            .map(|gene| GenomicFeatureOut {
                gene: TermOut {
                    id: gene.to_string(),
                },
            })
            .collect(),
    };

    Ok(serde_json::to_value(wire)?)
}

fn query_features(codec: &Codec, patient: &LocalPatient) -> Vec<FeatureOut> {
    let validator = codec.validator();
    let mut seen = BTreeSet::new();

    patient
        .features
        .iter()
        .filter_map(|feature| {
            let id = validator.phenotype_term(&feature.id)?;
            if !seen.insert(id.clone()) {
                return None;
            }
            Some(FeatureOut {
                id: id.to_string(),
                observed: Observed::from(feature.presence).to_wire(),
                age_of_onset: feature
                    .age_of_onset
                    .as_deref()
                    .and_then(|raw| validator.phenotype_term(raw))
                    .map(|t| t.to_string()),
                matched: None,
                obfuscated: None,
                count: None,
            })
        })
        .collect()
}

/// Global qualifiers (age of onset, mode of inheritance) are HPO terms and optional.
fn qualifier(codec: &Codec, raw: Option<&str>) -> Option<String> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    codec
        .validator()
        .phenotype_term(raw)
        .map(|t| t.to_string())
}

/// Candidate genes to publish.
///
/// With `top > 0` and at least one scored candidate, the `top` best-scored genes are chosen
/// (ties broken by symbol, unscored genes last). Otherwise every candidate gene is published.
fn select_genes(genes: &[LocalGene], top: usize) -> Vec<GeneSymbol> {
    let mut candidates: Vec<(GeneSymbol, Option<f64>)> = Vec::new();
    for gene in genes.iter().filter(|g| g.candidate) {
        let Ok(symbol) = GeneSymbol::new(&gene.symbol) else {
            tracing::warn!("ignoring candidate gene with unusable symbol [{}]", gene.symbol);
            continue;
        };
        match candidates.iter_mut().find(|(s, _)| *s == symbol) {
            Some((_, score)) => *score = best_score(*score, gene.score),
            None => candidates.push((symbol, gene.score)),
        }
    }

    let rankable = candidates.iter().any(|(_, score)| score.is_some());
    if top > 0 && rankable {
        candidates.sort_by(|(a_sym, a), (b_sym, b)| {
            compare_scores(*b, *a).then_with(|| a_sym.cmp(b_sym))
        });
        candidates.truncate(top);
    }

    candidates.into_iter().map(|(symbol, _)| symbol).collect()
}

fn best_score(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn compare_scores(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

// ============================================================================
// Decode
// ============================================================================

pub(super) fn decode(codec: &Codec, patient: &Value) -> MmeResult<MatchingPatient> {
    let wire = match serde_path_to_error::deserialize::<_, PatientWire>(patient) {
        Ok(parsed) => parsed,
        Err(err) => {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() || path == "." {
                "<root>"
            } else {
                path.as_str()
            };
            return Err(MmeError::ProtocolViolation(format!(
                "patient schema mismatch at {path}: {source}"
            )));
        }
    };

    let id = wire
        .id
        .as_ref()
        .and_then(id_text)
        .and_then(|raw| NonEmptyText::new(raw).ok())
        .ok_or_else(|| MmeError::ProtocolViolation("remote patient has no id".into()))?;

    let validator = codec.validator();

    let mut features = BTreeSet::new();
    for (index, entry) in entries(wire.features.as_ref(), "features", &id).iter().enumerate() {
        let Ok(feature) = FeatureWire::deserialize(entry) else {
            tracing::warn!("ignoring features[{}] of patient [{}]: not an object", index, id);
            continue;
        };
        let Some(raw_id) = feature.id.as_ref().and_then(Value::as_str) else {
            tracing::warn!("ignoring features[{}] of patient [{}]: no string id", index, id);
            continue;
        };
        let observed = match feature.observed.as_ref() {
            None | Some(Value::Null) => Observed::Yes,
            Some(raw) => match raw.as_str().and_then(Observed::from_wire) {
                Some(observed) => observed,
                None => {
                    tracing::warn!(
                        "ignoring feature [{}] with unsupported observed value [{}]",
                        raw_id,
                        raw
                    );
                    continue;
                }
            },
        };
        let Some(term) = validator.phenotype_term(raw_id) else {
            continue;
        };
        let age_of_onset = feature
            .age_of_onset
            .as_ref()
            .and_then(term_text)
            .and_then(|raw| validator.phenotype_term(raw));
        features.insert(Feature {
            id: term,
            observed,
            age_of_onset,
        });
    }

    let mut disorders = BTreeSet::new();
    for entry in entries(wire.disorders.as_ref(), "disorders", &id) {
        let raw = DisorderWire::deserialize(entry)
            .ok()
            .and_then(|d| d.id)
            .and_then(|v| v.as_str().map(str::to_string));
        match raw {
            Some(raw) => {
                if let Some(term) = validator.disorder_term(&raw) {
                    disorders.insert(Disorder { id: term });
                }
            }
            None => tracing::warn!("ignoring disorder without a string id in patient [{}]", id),
        }
    }

    let mut genes = BTreeSet::new();
    for entry in entries(wire.genomic_features.as_ref(), "genomicFeatures", &id) {
        let raw = GenomicFeatureWire::deserialize(entry)
            .ok()
            .and_then(|f| f.gene)
            .and_then(|g| g.id);
        match raw.as_ref().and_then(Value::as_str).map(GeneSymbol::new) {
            Some(Ok(name)) => {
                genes.insert(CandidateGene { name });
            }
            _ => tracing::warn!("ignoring genomic feature without a usable gene id"),
        }
    }

    if features.is_empty() && genes.is_empty() {
        return Err(MmeError::ProtocolViolation(format!(
            "patient [{id}] has no supported features and no genes"
        )));
    }

    Ok(MatchingPatient {
        id,
        label: wire
            .label
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        sex: wire.sex.as_ref().and_then(Value::as_str).and_then(Sex::from_wire),
        features,
        disorders,
        genes,
        contact: wire.contact.as_ref().and_then(contact_from_wire),
        is_test: wire.test.as_ref().is_some_and(test_flag),
    })
}

/// Patient ids may arrive as strings or numbers.
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Items of an optional list field. Anything other than an array counts as empty.
fn entries<'a>(value: Option<&'a Value>, field: &str, patient: &NonEmptyText) -> &'a [Value] {
    match value {
        None | Some(Value::Null) => &[],
        Some(Value::Array(items)) => items.as_slice(),
        Some(_) => {
            tracing::warn!("ignoring [{}] of patient [{}]: not a list", field, patient);
            &[]
        }
    }
}

/// `true`, or the string `"true"` in any case.
fn test_flag(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// A term may be written as `"HP:..."` or `{"id": "HP:..."}`.
fn term_text(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get("id").and_then(Value::as_str),
        _ => None,
    }
}

fn contact_from_wire(value: &Value) -> Option<ContactInfo> {
    let field = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let name = field("name");
    let href = field("href");
    if name.is_none() && href.is_none() {
        return None;
    }

    Some(ContactInfo {
        name: name.unwrap_or_default(),
        institution: field("institution"),
        href: href.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LocalContact, LocalFeature, Presence, SimilarityView};
    use crate::privacy::FeatureMatchGroup;
    use crate::validation::TermValidator;
    use crate::version::ApiVersion;
    use mme_types::TermId;
    use serde_json::json;

    fn codec() -> Codec {
        Codec::new(
            ApiVersion::V1_0,
            TermValidator::standard().unwrap(),
            ContactInfo::support(
                NonEmptyText::new("Support").unwrap(),
                NonEmptyText::new("Matchmaker Node").unwrap(),
                NonEmptyText::new("support@example.org").unwrap(),
            ),
        )
    }

    fn feature(id: &str, presence: Presence) -> LocalFeature {
        LocalFeature {
            id: id.into(),
            presence,
            age_of_onset: None,
        }
    }

    fn gene(symbol: &str, score: Option<f64>) -> LocalGene {
        LocalGene {
            symbol: symbol.into(),
            score,
            candidate: true,
        }
    }

    fn local_patient() -> LocalPatient {
        LocalPatient {
            id: "P0000001".into(),
            sex: Some("F".into()),
            features: vec![
                feature("hp:0000316", Presence::Present),
                feature("HP:0004325", Presence::Unknown),
                feature("XX:1", Presence::Present),
            ],
            disorders: vec!["MIM:614261".into(), "ORPHA:1".into()],
            genes: vec![gene("srcap", None)],
            ..LocalPatient::default()
        }
    }

    #[test]
    fn test_encode_query_patient() {
        let codec = codec();
        let patient = local_patient();

        let json = encode(&codec, PatientSource::Query(&patient), &patient.id, 0)
            .expect("encode patient");

        assert_eq!(json["id"], "P0000001");
        assert_eq!(json["sex"], "FEMALE");
        assert_eq!(json["contact"]["href"], "mailto:support@example.org");
        assert_eq!(json["disorders"], json!([{"id": "MIM:614261"}]));
        assert_eq!(
            json["features"],
            json!([
                {"id": "HP:0000316", "observed": "yes"},
                {"id": "HP:0004325", "observed": "no"}
            ])
        );
        assert_eq!(json["genomicFeatures"], json!([{"gene": {"id": "SRCAP"}}]));
    }

    #[test]
    fn test_round_trip_is_lossy_for_unknown_presence() {
        let codec = codec();
        let patient = local_patient();

        let json = encode(&codec, PatientSource::Query(&patient), &patient.id, 0)
            .expect("encode patient");
        let decoded = decode(&codec, &json).expect("decode patient");

        let observed: Vec<(&str, Observed)> = decoded
            .features
            .iter()
            .map(|f| (f.id.as_str(), f.observed))
            .collect();
        assert_eq!(
            observed,
            vec![("HP:0000316", Observed::Yes), ("HP:0004325", Observed::No)]
        );
        assert_eq!(decoded.sex, Some(Sex::Female));
        assert_eq!(decoded.disorders.len(), 1);
    }

    #[test]
    fn test_encode_rejects_patient_with_nothing_to_send() {
        let codec = codec();
        let patient = LocalPatient {
            id: "P0000002".into(),
            features: vec![feature("XX:1", Presence::Present)],
            ..LocalPatient::default()
        };

        let err = encode(&codec, PatientSource::Query(&patient), &patient.id, 0)
            .expect_err("empty patient");
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn test_encode_omits_unknown_sex_and_empty_disorders() {
        let codec = codec();
        let patient = LocalPatient {
            id: "P0000003".into(),
            sex: Some("U".into()),
            genes: vec![gene("NOTCH2", None)],
            ..LocalPatient::default()
        };

        let json = encode(&codec, PatientSource::Query(&patient), "abc", 0).expect("encode");
        assert_eq!(json["id"], "abc");
        assert!(json.get("sex").is_none());
        assert!(json.get("disorders").is_none());
        assert_eq!(json["features"], json!([]));
    }

    #[test]
    fn test_encode_uses_patient_contact_when_complete() {
        let codec = codec();
        let mut patient = local_patient();
        patient.contact = Some(LocalContact {
            name: Some("Dr Jane Smith".into()),
            institution: Some("Children's Hospital".into()),
            emails: vec!["jane@example.org".into()],
        });

        let json = encode(&codec, PatientSource::Query(&patient), &patient.id, 0).expect("encode");
        assert_eq!(
            json["contact"],
            json!({
                "name": "Dr Jane Smith",
                "institution": "Children's Hospital",
                "href": "mailto:jane@example.org"
            })
        );
    }

    #[test]
    fn test_encode_emits_global_qualifiers() {
        let codec = codec();
        let mut patient = local_patient();
        patient.global_age_of_onset = Some("HP:0003577".into());
        patient.mode_of_inheritance = Some("HP:0000006".into());

        let json = encode(&codec, PatientSource::Query(&patient), &patient.id, 0).expect("encode");
        assert_eq!(json["ageOfOnset"], "HP:0003577");
        assert_eq!(json["inheritanceMode"], "HP:0000006");
    }

    #[test]
    fn test_reply_features_come_from_privacy_filter() {
        let codec = codec();
        let view = SimilarityView {
            patient: local_patient(),
            score: 0.8,
            feature_matches: vec![
                FeatureMatchGroup::new("HP:0000316", vec!["HP:0000316".into()]),
                FeatureMatchGroup::new("", vec!["".into(), "".into()]),
            ],
        };

        let json = encode(&codec, PatientSource::Reply(&view), &view.patient.id, 0)
            .expect("encode reply");
        assert_eq!(
            json["features"],
            json!([
                {"id": "HP:0000118", "observed": "yes", "matched": false, "obfuscated": true, "count": 2},
                {"id": "HP:0000316", "observed": "yes", "matched": true, "obfuscated": false}
            ])
        );
    }

    #[test]
    fn test_top_genes_are_ranked_by_score() {
        let genes = vec![
            gene("B3GALT6", Some(0.2)),
            gene("SRCAP", Some(0.9)),
            gene("NOTCH2", None),
            gene("FBN1", Some(0.9)),
            LocalGene {
                symbol: "TTN".into(),
                score: Some(1.0),
                candidate: false,
            },
        ];

        let top: Vec<String> = select_genes(&genes, 2)
            .into_iter()
            .map(|g| g.to_string())
            .collect();
        assert_eq!(top, vec!["FBN1", "SRCAP"]);

        assert_eq!(select_genes(&genes, 0).len(), 4);
    }

    #[test]
    fn test_top_genes_fall_back_to_all_without_scores() {
        let genes = vec![gene("SRCAP", None), gene("srcap", None), gene("NOTCH2", None)];
        assert_eq!(select_genes(&genes, 1).len(), 2);
    }

    #[test]
    fn test_decode_drops_invalid_terms() {
        let codec = codec();
        let json = json!({
            "id": "remote-1",
            "features": [
                {"id": "XX:1", "observed": "yes"},
                {"id": "hp:0000316"},
                {"id": "HP:0004325", "observed": "maybe"},
                {"id": "HP:0001999", "observed": "no", "ageOfOnset": {"id": "HP:0003577"}}
            ],
            "disorders": [{"id": "MIM:614261"}, {"id": "ORPHA:1"}, {}],
            "genomicFeatures": [{"gene": {"id": "srcap"}}, {"gene": {}}, {}]
        });

        let patient = decode(&codec, &json).expect("decode");
        let ids: Vec<&str> = patient.features.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["HP:0000316", "HP:0001999"]);
        assert!(patient.features.iter().any(|f| f.observed == Observed::No
            && f.age_of_onset.as_ref().map(TermId::as_str) == Some("HP:0003577")));
        assert_eq!(patient.disorders.len(), 1);
        let genes: Vec<&str> = patient.genes.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(genes, vec!["SRCAP"]);
        assert!(!patient.is_test);
    }

    #[test]
    fn test_decode_only_invalid_terms_is_violation() {
        let codec = codec();
        let json = json!({"id": "remote-1", "features": [{"id": "XX:1", "observed": "yes"}]});

        let err = decode(&codec, &json).expect_err("nothing usable");
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn test_decode_missing_id_is_reported_first() {
        let codec = codec();
        let err = decode(&codec, &json!({})).expect_err("no id");
        assert!(matches!(err, MmeError::ProtocolViolation(ref m) if m.contains("no id")));

        let err = decode(&codec, &json!({"id": "   ", "genomicFeatures": [{"gene": {"id": "SRCAP"}}]}))
            .expect_err("blank id");
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn test_decode_reports_schema_mismatch_for_non_object_patient() {
        let codec = codec();

        let err = decode(&codec, &json!(["remote-1"])).expect_err("not an object");
        match err {
            MmeError::ProtocolViolation(message) => {
                assert!(message.contains("schema mismatch at <root>"), "{message}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_drops_mistyped_entries_and_keeps_the_rest() {
        let codec = codec();
        let json = json!({
            "id": "remote-1",
            "features": [
                {"id": "HP:0000316"},
                {"id": 42},
                {"id": "HP:0004325", "observed": true},
                "HP:0001999",
                {"id": "HP:0000118", "observed": null}
            ],
            "disorders": [{"id": 614261}, {"id": "MIM:614261"}, "MIM:1"],
            "genomicFeatures": [{"gene": {"id": 7157}}, {"gene": "TP53"}, {"gene": {"id": "srcap"}}],
            "test": "false"
        });

        let patient = decode(&codec, &json).expect("good entries survive");
        let ids: Vec<&str> = patient.features.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["HP:0000118", "HP:0000316"]);
        let disorders: Vec<&str> = patient.disorders.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(disorders, vec!["MIM:614261"]);
        let genes: Vec<&str> = patient.genes.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(genes, vec!["SRCAP"]);
        assert!(!patient.is_test);
    }

    #[test]
    fn test_decode_tolerates_odd_list_and_flag_types() {
        let codec = codec();
        let json = json!({
            "id": 12345,
            "features": [{"id": "HP:0000316"}],
            "disorders": "MIM:614261",
            "genomicFeatures": {"gene": {"id": "SRCAP"}},
            "test": "TRUE"
        });

        let patient = decode(&codec, &json).expect("decode");
        assert_eq!(patient.id.as_str(), "12345");
        assert_eq!(patient.features.len(), 1);
        assert!(patient.disorders.is_empty());
        assert!(patient.genes.is_empty());
        assert!(patient.is_test);
    }

    #[test]
    fn test_decode_only_mistyped_gene_ids_is_violation() {
        let codec = codec();
        let json = json!({"id": "remote-1", "genomicFeatures": [{"gene": {"id": 7157}}]});

        let err = decode(&codec, &json).expect_err("nothing usable");
        assert!(err.is_protocol_violation());

        let err = decode(&codec, &json!({"id": true, "features": [{"id": "HP:0000316"}]}))
            .expect_err("boolean id");
        assert!(matches!(err, MmeError::ProtocolViolation(ref m) if m.contains("no id")));
    }

    #[test]
    fn test_decode_reads_optional_fields_permissively() {
        let codec = codec();
        let json = json!({
            "id": "remote-1",
            "label": "patient one",
            "sex": "male",
            "contact": {"name": "Dr Who", "href": "mailto:who@example.org"},
            "features": [{"id": "HP:0000316"}],
            "test": true,
            "species": "NCBITaxon:9606"
        });

        let patient = decode(&codec, &json).expect("decode");
        assert_eq!(patient.label.as_deref(), Some("patient one"));
        assert_eq!(patient.sex, Some(Sex::Male));
        assert_eq!(patient.contact.as_ref().map(|c| c.name.as_str()), Some("Dr Who"));
        assert!(patient.is_test);

        let odd = json!({"id": "remote-2", "label": 7, "contact": "n/a", "features": [{"id": "HP:0000316"}]});
        let patient = decode(&codec, &odd).expect("decode");
        assert!(patient.label.is_none());
        assert!(patient.contact.is_none());
    }
}

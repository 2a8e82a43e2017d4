//! API 1.x reply body: `{"results": [{"patient": {...}, "score": {"patient": 0.8}}]}`.

use super::{patient, Codec};
use crate::model::{PatientSource, RemoteMatch, SimilarityView};
use crate::{MmeError, MmeResult};
use serde_json::{json, Value};

pub(super) fn encode(codec: &Codec, matches: &[SimilarityView], top_genes: usize) -> Value {
    let results: Vec<Value> = matches
        .iter()
        .filter_map(|view| {
            match patient::encode(codec, PatientSource::Reply(view), &view.patient.id, top_genes) {
                Ok(patient) => Some(json!({
                    "patient": patient,
                    "score": { "patient": view.score },
                })),
                Err(err) => {
                    tracing::error!(
                        "leaving patient [{}] out of the reply: {}",
                        view.patient.id,
                        err
                    );
                    None
                }
            }
        })
        .collect();

    json!({ "results": results })
}

pub(super) fn decode(codec: &Codec, body: &Value) -> MmeResult<Vec<RemoteMatch>> {
    let results = body
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| MmeError::ProtocolViolation("reply has no results array".into()))?;

    let mut matches = Vec::with_capacity(results.len());
    for (index, result) in results.iter().enumerate() {
        let Some(patient_json) = result.get("patient") else {
            tracing::warn!("skipping reply result {} without a patient", index);
            continue;
        };
        match patient::decode(codec, patient_json) {
            Ok(patient) => matches.push(RemoteMatch {
                patient,
                score: result.pointer("/score/patient").and_then(Value::as_f64),
            }),
            Err(err) => tracing::warn!("skipping reply result {}: {}", index, err),
        }
    }
    Ok(matches)
}

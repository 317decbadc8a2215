use data_encoding::BASE64;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::labels::FINGERPRINT_ANNOTATION;

/// Metadata fields populated by the API server which never take part in a fingerprint.
const SERVER_METADATA_FIELDS: &[&str] = &[
    "creationTimestamp",
    "generation",
    "managedFields",
    "resourceVersion",
    "selfLink",
    "uid",
];

/// Computes a deterministic content hash of a resource body.
///
/// The body is stripped of the fingerprint annotation itself, of `status` and of
/// server populated metadata, then hashed in its canonical (key sorted) JSON form.
pub fn fingerprint(body: &Value) -> String {
    let canonical = canonicalize(body);
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();

    hex::encode(Sha256::digest(bytes))
}

/// Fingerprint a resource read back from the cluster was last applied with.
///
/// Resources applied by this engine carry the fingerprint they were rendered with; anything
/// else is hashed the same way a freshly rendered body would be. Edits made after the last
/// apply don't show up here, [`live_fingerprint`] covers those.
pub fn observed_fingerprint(body: &Value) -> String {
    body.pointer("/metadata/annotations")
        .and_then(|annotations| annotations.get(FINGERPRINT_ANNOTATION))
        .and_then(Value::as_str)
        .map(|fingerprint| fingerprint.to_owned())
        .unwrap_or_else(|| fingerprint(body))
}

/// Hashes the part of a live body that the desired body sets.
///
/// Both bodies are canonicalized and Secret `stringData` is folded into `data` first, then
/// the live body is cut down to the paths present in the desired one. Matches
/// [`desired_fingerprint`] as long as nobody changed a value this engine manages.
pub fn live_fingerprint(desired: &Value, live: &Value) -> String {
    fingerprint(&project(&comparable(desired), &comparable(live)))
}

/// Counterpart of [`live_fingerprint`] for the desired body alone.
pub fn desired_fingerprint(desired: &Value) -> String {
    fingerprint(&comparable(desired))
}

/// Stores the fingerprint in the annotations of a resource body.
pub fn annotate_fingerprint(body: &mut Value, fingerprint: &str) {
    let Some(metadata) = body.get_mut("metadata").and_then(Value::as_object_mut) else {
        return;
    };

    let annotations = metadata
        .entry("annotations")
        .or_insert_with(|| Value::Object(Default::default()));

    if let Some(annotations) = annotations.as_object_mut() {
        annotations.insert(
            FINGERPRINT_ANNOTATION.to_owned(),
            Value::String(fingerprint.to_owned()),
        );
    }
}

fn comparable(body: &Value) -> Value {
    let mut body = canonicalize(body);

    if let Some(object) = body.as_object_mut() {
        fold_string_data(object);
    }

    body
}

// the API server stores `stringData` base64 encoded under `data`
fn fold_string_data(object: &mut Map<String, Value>) {
    let Some(Value::Object(string_data)) = object.remove("stringData") else {
        return;
    };

    let data = object
        .entry("data")
        .or_insert_with(|| Value::Object(Default::default()));

    if let Some(data) = data.as_object_mut() {
        for (key, value) in string_data {
            let encoded = match value {
                Value::String(value) => Value::String(BASE64.encode(value.as_bytes())),
                other => other,
            };
            data.insert(key, encoded);
        }
    }
}

/// Keeps only the parts of `live` that `desired` has an opinion about. Arrays are projected
/// element by element when their lengths agree, otherwise compared whole.
fn project(desired: &Value, live: &Value) -> Value {
    match (desired, live) {
        (Value::Object(desired), Value::Object(live)) => Value::Object(
            desired
                .iter()
                .filter_map(|(key, wanted)| {
                    live.get(key).map(|found| (key.to_owned(), project(wanted, found)))
                })
                .collect(),
        ),
        (Value::Array(desired), Value::Array(live)) if desired.len() == live.len() => Value::Array(
            desired
                .iter()
                .zip(live)
                .map(|(wanted, found)| project(wanted, found))
                .collect(),
        ),
        (_, live) => live.clone(),
    }
}

fn canonicalize(body: &Value) -> Value {
    let mut body = body.clone();

    if let Some(object) = body.as_object_mut() {
        object.remove("status");
    }

    if let Some(metadata) = body.get_mut("metadata").and_then(Value::as_object_mut) {
        for field in SERVER_METADATA_FIELDS {
            metadata.remove(*field);
        }

        let annotations_emptied = match metadata.get_mut("annotations").and_then(Value::as_object_mut) {
            Some(annotations) => {
                annotations.remove(FINGERPRINT_ANNOTATION);
                annotations.is_empty()
            }
            None => false,
        };

        if annotations_emptied {
            metadata.remove("annotations");
        }
    }

    body
}

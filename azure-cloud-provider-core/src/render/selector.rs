use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::RenderError;

pub const DEFAULT_CONTROL_NODE_SELECTOR: &str = "node-role.kubernetes.io/control-plane=";

const MAX_NAME_LENGTH: usize = 63;
const MAX_PREFIX_LENGTH: usize = 253;

static LABEL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?$").unwrap());
static DNS_SUBDOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").unwrap()
});

/// A node selector given as whitespace separated `key=value` (or `key=`) entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSelector(BTreeMap<String, String>);

impl NodeSelector {
    pub fn parse(raw: &str) -> Result<Self, RenderError> {
        let mut labels = BTreeMap::new();

        for entry in raw.split_whitespace() {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| invalid(entry, "expected key=value"))?;

            validate_key(key).map_err(|reason| invalid(entry, reason))?;
            validate_value(value).map_err(|reason| invalid(entry, reason))?;

            labels.insert(key.to_owned(), value.to_owned());
        }

        if labels.is_empty() {
            return Err(invalid(raw, "selector is empty"));
        }

        Ok(Self(labels))
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        json!(self.0)
    }

    /// Tolerations letting the controllers schedule onto the selected nodes despite their
    /// `NoSchedule` taints.
    pub fn to_tolerations(&self) -> Value {
        Value::Array(
            self.0
                .iter()
                .map(|(key, value)| match value.is_empty() {
                    true => json!({"key": key, "operator": "Exists", "effect": "NoSchedule"}),
                    false => json!({"key": key, "operator": "Equal", "value": value, "effect": "NoSchedule"}),
                })
                .collect(),
        )
    }

    /// Human readable form used in log messages, e.g. `juju-application: "kubernetes-control-plane"`.
    pub fn describe(&self) -> String {
        self.0
            .iter()
            .map(|(key, value)| format!("{key}: \"{value}\""))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn invalid(entry: &str, reason: &'static str) -> RenderError {
    RenderError::InvalidSelector {
        entry: entry.to_owned(),
        reason,
    }
}

fn validate_key(key: &str) -> Result<(), &'static str> {
    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            if prefix.is_empty() || prefix.len() > MAX_PREFIX_LENGTH || !DNS_SUBDOMAIN.is_match(prefix) {
                return Err("label key prefix must be a DNS subdomain");
            }
            name
        }
        None => key,
    };

    if name.is_empty() || name.len() > MAX_NAME_LENGTH || !LABEL_NAME.is_match(name) {
        return Err("label key name must be 63 alphanumeric characters or less");
    }

    Ok(())
}

fn validate_value(value: &str) -> Result<(), &'static str> {
    if value.is_empty() {
        return Ok(());
    }

    if value.len() > MAX_NAME_LENGTH || !LABEL_NAME.is_match(value) {
        return Err("label value must be empty or 63 alphanumeric characters or less");
    }

    Ok(())
}

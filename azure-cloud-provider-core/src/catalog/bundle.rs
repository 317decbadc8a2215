use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::Value;

use crate::{
    render::template::scan_fields,
    resources::{kinds::find_kind, ResourceKey},
};

use super::{CatalogError, ReleaseVersion};

#[derive(Debug, Clone, PartialEq)]
pub struct ManifestTemplate {
    pub kind: String,
    pub api_version: String,
    pub namespace: Option<String>,
    pub name: String,
    pub body: Value,
    /// placeholders referenced by the body, in order of first appearance
    pub fields: Vec<String>,
}

impl ManifestTemplate {
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.kind, self.namespace.as_deref(), &self.name)
    }

    fn from_document(body: Value) -> Result<Self, String> {
        let text = |pointer: &str| body.pointer(pointer).and_then(Value::as_str).map(str::to_owned);

        let kind = text("/kind").ok_or("document has no kind")?;
        let api_version = text("/apiVersion").ok_or_else(|| format!("{kind} has no apiVersion"))?;
        let name = text("/metadata/name").ok_or_else(|| format!("{kind} has no name"))?;
        let namespace = text("/metadata/namespace");

        let managed = find_kind(&kind).ok_or_else(|| format!("{kind}/{name} is not a managed kind"))?;

        if managed.api_version() != api_version {
            return Err(format!(
                "{kind}/{name} uses {api_version}, expected {}",
                managed.api_version()
            ));
        }

        match (managed.namespaced, &namespace) {
            (true, None) => return Err(format!("{kind}/{name} is namespaced but has no namespace")),
            (false, Some(_)) => return Err(format!("{kind}/{name} is cluster scoped but has a namespace")),
            _ => {}
        }

        let mut fields = Vec::new();
        scan_fields(&body, &mut fields);

        Ok(Self {
            kind: managed.kind.to_owned(),
            api_version,
            namespace,
            name,
            body,
            fields,
        })
    }
}

/// The templates of one release of one controller, in the order they were published.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestBundle {
    pub version: ReleaseVersion,
    pub templates: Vec<ManifestTemplate>,
}

impl ManifestBundle {
    /// Reads a multi-document YAML source. Empty documents are skipped.
    pub fn parse(version: ReleaseVersion, source: &str) -> Result<Self, CatalogError> {
        let invalid = |reason: String| CatalogError::InvalidManifest {
            bundle: format!("{} {}", version.controller.display_name(), version.name),
            reason,
        };

        let mut templates = Vec::new();
        let mut keys = BTreeSet::new();

        for document in serde_yaml::Deserializer::from_str(source) {
            let body = Value::deserialize(document).map_err(|err| invalid(err.to_string()))?;

            if body.is_null() {
                continue;
            }

            let template = ManifestTemplate::from_document(body).map_err(invalid)?;

            if !keys.insert(template.key()) {
                return Err(invalid(format!("{} is declared twice", template.key())));
            }

            templates.push(template);
        }

        if templates.is_empty() {
            return Err(invalid("the bundle has no templates".to_owned()));
        }

        Ok(Self { version, templates })
    }

    /// Every placeholder used by the bundle, in template order.
    #[cfg(test)]
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();

        for field in self.templates.iter().flat_map(|template| template.fields.iter()) {
            if !fields.contains(&field.as_str()) {
                fields.push(field.as_str());
            }
        }

        fields
    }
}

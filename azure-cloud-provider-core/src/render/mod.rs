use log::debug;
use thiserror::Error;

use crate::{
    catalog::{ManifestBundle, ManifestTemplate},
    resources::{
        fingerprint::{annotate_fingerprint, fingerprint},
        kinds::find_kind,
        labels::apply_ownership_labels,
        Controller, ResourceSpec,
    },
};

use self::{context::ConfigurationContext, registry::rewrite_workload_images, template::substitute};

pub mod cloud_config;
pub mod context;
pub mod registry;
pub mod selector;
pub mod template;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Missing configuration value for '{}'!", .0)]
    MissingConfiguration(String),
    #[error("Invalid control node selector entry '{entry}'! Reason: {reason}")]
    InvalidSelector { entry: String, reason: &'static str },
    #[error("Couldn't render template '{template}'! Reason: {reason}")]
    InvalidTemplate { template: String, reason: String },
}

/// Expands every template of a bundle against the configuration context.
///
/// Either every template renders or none does. The output keeps the bundle order.
pub fn render(bundle: &ManifestBundle, context: &ConfigurationContext) -> Result<Vec<ResourceSpec>, RenderError> {
    let controller = bundle.version.controller;
    let resolve = |field: &str| context.resolve_field(field);

    debug!(
        "Rendering {} templates of {} {}...",
        bundle.templates.len(),
        controller.display_name(),
        bundle.version.name
    );

    bundle
        .templates
        .iter()
        .map(|template| render_template(template, controller, context, &resolve))
        .collect()
}

fn render_template<F>(
    template: &ManifestTemplate,
    controller: Controller,
    context: &ConfigurationContext,
    resolve: &F,
) -> Result<ResourceSpec, RenderError>
where
    F: Fn(&str) -> Result<Option<serde_json::Value>, RenderError>,
{
    let key = template.key();
    let invalid = |reason: &str| RenderError::InvalidTemplate {
        template: key.to_string(),
        reason: reason.to_owned(),
    };

    let managed = find_kind(&template.kind).ok_or_else(|| invalid("the kind is not managed"))?;
    let mut body = substitute(&template.body, resolve)?;

    if !body.is_object() {
        return Err(invalid("the rendered document is not an object"));
    }

    if managed.declares_containers() {
        if let Some(registry) = context.image_registry() {
            rewrite_workload_images(&mut body, registry);
        }
    }

    apply_ownership_labels(&mut body, controller);

    let fingerprint = fingerprint(&body);
    annotate_fingerprint(&mut body, &fingerprint);

    Ok(ResourceSpec {
        key,
        api_version: template.api_version.to_owned(),
        controller,
        body,
        fingerprint,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{
        resources::labels::{is_owned_by, FINGERPRINT_ANNOTATION},
        testing::{complete_context, test_catalog},
    };

    use super::*;

    fn provider_bundle() -> ManifestBundle {
        test_catalog().resolve(Controller::Provider, "").unwrap().clone()
    }

    #[test]
    fn render_is_deterministic() {
        let bundle = provider_bundle();
        let first = render(&bundle, &complete_context()).unwrap();
        let second = render(&bundle, &complete_context()).unwrap();

        assert_eq!(first.len(), bundle.templates.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.fingerprint, b.fingerprint);
            assert_eq!(
                serde_json::to_vec(&a.body).unwrap(),
                serde_json::to_vec(&b.body).unwrap()
            );
        }
    }

    #[test]
    fn rendered_resources_are_owned_and_annotated() {
        for spec in render(&provider_bundle(), &complete_context()).unwrap() {
            assert!(is_owned_by(&spec.body, Controller::Provider), "{}", spec.key);
            assert_eq!(
                spec.body.pointer("/metadata/annotations").unwrap()[FINGERPRINT_ANNOTATION],
                json!(spec.fingerprint)
            );
        }
    }

    #[test]
    fn missing_credentials_abort_the_whole_bundle() {
        let mut context = complete_context();
        context.subscription_id = None;

        assert_eq!(
            render(&provider_bundle(), &context),
            Err(RenderError::MissingConfiguration("subscription-id".to_owned()))
        );
    }

    #[test]
    fn image_registry_is_applied_to_workloads() {
        let mut context = complete_context();
        context.image_registry = Some("rocks.canonical.com/cdk".to_owned());

        let rendered = render(&provider_bundle(), &context).unwrap();
        let deployment = rendered
            .iter()
            .find(|spec| spec.key.kind == "Deployment")
            .unwrap();
        let image = deployment.body.pointer("/spec/template/spec/containers/0/image").unwrap();

        assert!(image.as_str().unwrap().starts_with("rocks.canonical.com/cdk/"));
    }

    #[test]
    fn context_values_reach_the_workloads() {
        let mut context = complete_context();
        context.replicas = Some(3);
        context.control_node_selector = Some("juju-application=kubernetes-control-plane".to_owned());
        context.cluster_tag = Some("kubernetes-4ypskxahbu3rnfgsds3pksvwe3uh0lxt".to_owned());

        let rendered = render(&provider_bundle(), &context).unwrap();
        let deployment = &rendered
            .iter()
            .find(|spec| spec.key.kind == "Deployment")
            .unwrap()
            .body;

        assert_eq!(deployment.pointer("/spec/replicas").unwrap(), &json!(3));
        assert_eq!(
            deployment.pointer("/spec/template/spec/nodeSelector").unwrap(),
            &json!({"juju-application": "kubernetes-control-plane"})
        );
        let args = deployment
            .pointer("/spec/template/spec/containers/0/args")
            .unwrap()
            .as_array()
            .unwrap();
        assert!(args.contains(&json!("--cluster-name=kubernetes-4ypskxahbu3rnfgsds3pksvwe3uh0lxt")));
    }

    #[test]
    fn different_context_changes_fingerprint() {
        let bundle = provider_bundle();
        let mut context = complete_context();
        let before = render(&bundle, &context).unwrap();
        context.location = Some("westus".to_owned());
        let after = render(&bundle, &context).unwrap();

        let secret = |specs: &[ResourceSpec]| {
            specs
                .iter()
                .find(|spec| spec.key.kind == "Secret")
                .map(|spec| spec.fingerprint.to_owned())
                .unwrap()
        };
        assert_ne!(secret(&before), secret(&after));
    }
}

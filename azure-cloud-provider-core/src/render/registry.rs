use serde_json::Value;

const CONTAINER_LISTS: &[&str] = &["containers", "initContainers"];

/// Replaces the registry host of a container image reference.
///
/// The first path component counts as a registry host when it contains a `.` or a `:` or
/// is `localhost`, mirroring how the container runtime resolves references. Images without
/// a host are returned unchanged.
pub fn rewrite_image(image: &str, registry: &str) -> String {
    let registry = registry.trim_end_matches('/');

    match image.split_once('/') {
        Some((host, rest)) if is_registry_host(host) => format!("{registry}/{rest}"),
        _ => image.to_owned(),
    }
}

fn is_registry_host(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

/// Rewrites every container image in the pod template of a workload body.
pub fn rewrite_workload_images(body: &mut Value, registry: &str) {
    let Some(pod_spec) = body.pointer_mut("/spec/template/spec") else {
        return;
    };

    for list in CONTAINER_LISTS {
        let Some(containers) = pod_spec.get_mut(*list).and_then(Value::as_array_mut) else {
            continue;
        };

        for container in containers {
            if let Some(image) = container.get_mut("image") {
                if let Some(current) = image.as_str() {
                    *image = Value::String(rewrite_image(current, registry));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn replaces_only_the_registry_host() {
        assert_eq!(
            rewrite_image(
                "mcr.microsoft.com/oss/kubernetes/azure-cloud-controller-manager:v1.24.0",
                "rocks.canonical.com/cdk/"
            ),
            "rocks.canonical.com/cdk/oss/kubernetes/azure-cloud-controller-manager:v1.24.0"
        );
        assert_eq!(
            rewrite_image("localhost:5000/csi-provisioner:v3.5.0", "dockerhub.io"),
            "dockerhub.io/csi-provisioner:v3.5.0"
        );
    }

    #[test]
    fn keeps_images_without_host() {
        assert_eq!(rewrite_image("busybox:1.36", "dockerhub.io"), "busybox:1.36");
        assert_eq!(rewrite_image("library/busybox", "dockerhub.io"), "library/busybox");
    }

    #[test]
    fn rewrites_init_and_regular_containers() {
        let mut body = json!({"spec": {"template": {"spec": {
            "initContainers": [{"name": "init", "image": "mcr.microsoft.com/a:v1"}],
            "containers": [{"name": "main", "image": "mcr.microsoft.com/b:v1"}, {"name": "noimage"}]
        }}}});
        rewrite_workload_images(&mut body, "rocks.canonical.com/cdk");

        let spec = body.pointer("/spec/template/spec").unwrap();
        assert_eq!(spec["initContainers"][0]["image"], "rocks.canonical.com/cdk/a:v1");
        assert_eq!(spec["containers"][0]["image"], "rocks.canonical.com/cdk/b:v1");
        assert!(spec["containers"][1].get("image").is_none());
    }
}

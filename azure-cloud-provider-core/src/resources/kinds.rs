use kube::discovery::ApiResource;

/// How a drifted resource of a given kind is brought back in line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// server-side apply over the existing object
    InPlace,
    /// delete the existing object and create it anew, for kinds with immutable fields
    Recreate,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ManagedKind {
    pub kind: &'static str,
    pub group: &'static str,
    pub version: &'static str,
    pub plural: &'static str,
    pub namespaced: bool,
    /// lower goes first on create, last on delete
    pub priority: u8,
    pub update_policy: UpdatePolicy,
}

const fn kind(
    kind: &'static str,
    group: &'static str,
    version: &'static str,
    plural: &'static str,
    namespaced: bool,
    priority: u8,
    update_policy: UpdatePolicy,
) -> ManagedKind {
    ManagedKind {
        kind,
        group,
        version,
        plural,
        namespaced,
        priority,
        update_policy,
    }
}

const RBAC: &str = "rbac.authorization.k8s.io";

pub static MANAGED_KINDS: &[ManagedKind] = &[
    kind("Namespace", "", "v1", "namespaces", false, 0, UpdatePolicy::InPlace),
    kind("ServiceAccount", "", "v1", "serviceaccounts", true, 1, UpdatePolicy::InPlace),
    kind("ClusterRole", RBAC, "v1", "clusterroles", false, 2, UpdatePolicy::InPlace),
    kind("Role", RBAC, "v1", "roles", true, 2, UpdatePolicy::InPlace),
    kind("ClusterRoleBinding", RBAC, "v1", "clusterrolebindings", false, 3, UpdatePolicy::Recreate),
    kind("RoleBinding", RBAC, "v1", "rolebindings", true, 3, UpdatePolicy::Recreate),
    kind("ConfigMap", "", "v1", "configmaps", true, 4, UpdatePolicy::InPlace),
    kind("Secret", "", "v1", "secrets", true, 4, UpdatePolicy::InPlace),
    kind("Service", "", "v1", "services", true, 5, UpdatePolicy::InPlace),
    kind("CSIDriver", "storage.k8s.io", "v1", "csidrivers", false, 5, UpdatePolicy::Recreate),
    kind("Deployment", "apps", "v1", "deployments", true, 6, UpdatePolicy::InPlace),
    kind("DaemonSet", "apps", "v1", "daemonsets", true, 6, UpdatePolicy::InPlace),
    kind("StorageClass", "storage.k8s.io", "v1", "storageclasses", false, 7, UpdatePolicy::Recreate),
];

/// Looks a kind up by name, ignoring case so that user supplied filters like `secret` work.
pub fn find_kind(name: &str) -> Option<&'static ManagedKind> {
    MANAGED_KINDS
        .iter()
        .find(|managed| managed.kind.eq_ignore_ascii_case(name))
}

impl ManagedKind {
    pub fn api_version(&self) -> String {
        match self.group {
            "" => self.version.to_owned(),
            group => format!("{group}/{}", self.version),
        }
    }

    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.to_owned(),
            version: self.version.to_owned(),
            api_version: self.api_version(),
            kind: self.kind.to_owned(),
            plural: self.plural.to_owned(),
        }
    }

    /// Whether the kind carries a pod template and therefore container images.
    pub fn declares_containers(&self) -> bool {
        matches!(self.kind, "Deployment" | "DaemonSet")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_kind_case_insensitively() {
        assert_eq!(find_kind("secret").unwrap().kind, "Secret");
        assert_eq!(find_kind("DAEMONSET").unwrap().kind, "DaemonSet");
        assert!(find_kind("Banana").is_none());
    }

    #[test]
    fn core_kinds_have_bare_api_version() {
        assert_eq!(find_kind("Secret").unwrap().api_version(), "v1");
        assert_eq!(
            find_kind("CSIDriver").unwrap().api_resource().api_version,
            "storage.k8s.io/v1"
        );
    }

    #[test]
    fn bindings_are_recreated_and_workloads_patched() {
        assert_eq!(
            find_kind("ClusterRoleBinding").unwrap().update_policy,
            UpdatePolicy::Recreate
        );
        assert_eq!(find_kind("Deployment").unwrap().update_policy, UpdatePolicy::InPlace);
    }

    #[test]
    fn service_accounts_precede_workloads() {
        assert!(find_kind("ServiceAccount").unwrap().priority < find_kind("Deployment").unwrap().priority);
        assert!(find_kind("Secret").unwrap().priority < find_kind("DaemonSet").unwrap().priority);
    }

    #[test]
    fn only_workloads_declare_containers() {
        let with_containers = MANAGED_KINDS
            .iter()
            .filter(|kind| kind.declares_containers())
            .map(|kind| kind.kind)
            .collect::<Vec<_>>();

        assert_eq!(with_containers, vec!["Deployment", "DaemonSet"]);
    }
}

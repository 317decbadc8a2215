/// Domain of the labels and annotations this engine writes, as a literal for `concat!`.
macro_rules! label_domain {
    () => {
        "azure-cloud-provider.io"
    };
}

pub mod catalog;
pub mod engine;
pub mod helpers;
pub mod kubernetes;
pub mod reconciler;
pub mod render;
pub mod resources;
pub mod status;
pub mod trigger;

#[cfg(test)]
pub(crate) mod testing;

pub const ENGINE_NAME: &str = "azure-cloud-provider";
pub const FIELD_MANAGER: &str = "azure-cloud-provider";
pub const LABEL_DOMAIN: &str = label_domain!();

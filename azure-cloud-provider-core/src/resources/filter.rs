use std::collections::BTreeSet;

use super::{Controller, UnknownControllerError};

/// Which controllers an action applies to. An empty selection means both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerFilter {
    #[default]
    Both,
    Only(Controller),
}

impl ControllerFilter {
    pub fn parse(raw: &str) -> Result<Self, UnknownControllerError> {
        match raw.trim() {
            "" | "both" | "all" => Ok(ControllerFilter::Both),
            other => Ok(ControllerFilter::Only(other.parse()?)),
        }
    }

    pub fn controllers(&self) -> Vec<Controller> {
        match self {
            ControllerFilter::Both => Controller::ALL.to_vec(),
            ControllerFilter::Only(controller) => vec![*controller],
        }
    }
}

/// Whitespace separated set of resource kinds. Matching ignores case; unknown kinds
/// simply match nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KindFilter {
    kinds: Option<BTreeSet<String>>,
}

impl KindFilter {
    pub fn all() -> Self {
        Self { kinds: None }
    }

    pub fn parse(raw: &str) -> Self {
        let kinds = raw
            .split_whitespace()
            .map(|kind| kind.to_ascii_lowercase())
            .collect::<BTreeSet<_>>();

        match kinds.is_empty() {
            true => Self::all(),
            false => Self { kinds: Some(kinds) },
        }
    }

    pub fn matches(&self, kind: &str) -> bool {
        match &self.kinds {
            Some(kinds) => kinds.contains(&kind.to_ascii_lowercase()),
            None => true,
        }
    }
}

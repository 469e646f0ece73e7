//! Developer tooling: read-only scene inspection and document validation.
//!
//! # Invariants
//! - Nothing here mutates a scene.

pub mod inspector;
pub mod validate;

pub use inspector::{DeferredInfo, EntityInfo, SceneInspector, SceneSummary};
pub use validate::{ValidationReport, validate_document};

pub fn crate_info() -> &'static str {
    "metaspace-tools v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("tools"));
    }
}

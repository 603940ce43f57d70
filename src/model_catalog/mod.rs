//! Enumerates the base Gemini models and the suffix-derived virtual
//! variants (`-search`, `-nothinking`, `-maxthinking`), and maps a resolved
//! (base, variant) pair to a thinking-budget policy.
//!
//! Mirrors the teacher's `model_catalog::MODEL_REGISTRY` LazyLock pattern,
//! but the registry here is a closed, hard-coded set rather than one built
//! from runtime provider configuration — this proxy has exactly one
//! upstream.

mod catalog;
mod thinking;

pub use catalog::{ModelDescriptor, ResolvedModel, CATALOG};
pub use thinking::{thinking_for, ThinkingPolicy};

/// Resolve an inbound model name (possibly carrying a variant suffix) to its
/// base descriptor plus variant flags.
///
/// # Errors
/// Returns `None` if the base name is not in the catalogue.
pub fn resolve(name: &str) -> Option<ResolvedModel> {
    CATALOG.resolve(name)
}

/// List every name the catalogue publishes (base models union synthesized
/// variants), sorted by name.
pub fn list_models() -> &'static [ModelDescriptor] {
    CATALOG.published()
}

pub fn is_search(name: &str) -> bool {
    resolve(name).is_some_and(|r| r.search)
}

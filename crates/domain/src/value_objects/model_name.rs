//! Model name normalization
//!
//! The runtime reports models with an explicit tag (`llama3:latest`) while
//! callers usually pass the bare name (`llama3`). Comparisons go through the
//! canonical form so both spellings refer to the same model.

/// Tag the runtime assumes when none is given
pub const DEFAULT_TAG: &str = "latest";

/// Return the canonical `name:tag` form of a model name
#[must_use]
pub fn canonical_model_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.contains(':') {
        trimmed.to_string()
    } else {
        format!("{trimmed}:{DEFAULT_TAG}")
    }
}

/// Whether two model names refer to the same model
#[must_use]
pub fn same_model(a: &str, b: &str) -> bool {
    canonical_model_name(a) == canonical_model_name(b)
}

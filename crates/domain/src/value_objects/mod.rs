//! Value objects - Immutable objects defined by their attributes

mod model_name;
mod platform;

pub use model_name::{DEFAULT_TAG, canonical_model_name, same_model};
pub use platform::Platform;

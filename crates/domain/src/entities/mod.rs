//! Domain entities - Objects with identity and lifecycle

mod checkpoint;
mod event;
mod install_state;
mod model;
mod runtime_status;

pub use checkpoint::{Checkpoint, InstallPhase};
pub use event::{InstallProgress, InstallStage, OperationKind, RuntimeEvent};
pub use install_state::InstallState;
pub use model::{InstalledModel, LoadedModel, ModelStatus, ModelView};
pub use runtime_status::{OperationOutcome, RuntimeHealth, RuntimeStatus};

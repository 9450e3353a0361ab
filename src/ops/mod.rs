// Action translator: maps typed operation requests to docker argument vectors.

pub mod translate;
pub mod types;

pub use translate::{CommandPlan, translate};
pub use types::{InvalidRequest, OpKind, OperationRequest, PortMapping};

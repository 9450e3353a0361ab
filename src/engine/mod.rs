// Operation engine: task supervision, lifecycle events, fan-out.

pub mod bus;
pub mod supervisor;
pub mod types;

pub use bus::{EventBus, Subscription};
pub use supervisor::{DockerLauncher, Launcher, Supervisor};
pub use types::{FailureKind, StatusEvent, SubmitError, Task, TaskId, TaskState};

// Process runner: spawns docker commands, streams output, enforces deadlines.

pub mod probe;
pub mod run;
pub mod types;

pub use probe::ensure_available;
pub use run::spawn;
pub use types::{CancelToken, DEFAULT_DEADLINE, OutputLine, ProcessCommand, RunResult};

pub mod loader;
pub mod types;

pub use loader::{CONFIG_FILE, load, save};
pub use types::Config;

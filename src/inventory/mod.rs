// State poller: periodic container/image inventory snapshots and diffs.

pub mod parse;
pub mod poller;
pub mod types;

pub use parse::{parse_containers, parse_images};
pub use poller::{Poller, query_snapshot};
pub use types::{ContainerSummary, ImageSummary, InventoryDiff, InventorySnapshot, SetChanges, diff};

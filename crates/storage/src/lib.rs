pub mod conformance;
mod error;
mod grist;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use grist::GristStore;
pub use memory::MemoryStore;
pub use record::{ColumnUpdates, Fields, RecordId, RecordSnapshot};
pub use traits::RecordStore;

mod record;
mod store;

pub use record::{GenerationRecord, HistoryFile, StoredRecord};
pub use store::{FileHistoryStore, HistoryStore, MemoryHistoryStore};

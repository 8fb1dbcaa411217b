mod memory;
mod sqlite;

pub use memory::InMemoryApplicationStore;
pub use sqlite::SqliteApplicationStore;

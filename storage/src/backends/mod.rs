pub mod memory;
pub mod remote;
pub mod sql;

pub use memory::InMemoryStore;
pub use remote::{RemoteDocumentStore, RemoteDocumentStoreConfig};
pub use sql::SqlStore;

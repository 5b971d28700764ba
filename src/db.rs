pub mod store;
pub use store::{CatalogStore, LedgerStore, LedgerTx};
pub mod pg_store;
pub use pg_store::PgStore;
pub mod memory_store;
pub use memory_store::{FailPoint, InMemoryStore};

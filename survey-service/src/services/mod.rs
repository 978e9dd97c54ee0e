pub mod memory;
pub mod metrics;
pub mod mongo;
pub mod store;

pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use mongo::MongoStore;
pub use store::{DocumentStore, StoreError, UpdateOutcome};

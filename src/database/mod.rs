pub mod convert;
pub mod dynamic;
pub mod manager;
pub mod memory;
pub mod models;
pub mod mongo;
pub mod repository;
pub mod store;

pub use dynamic::DynamicRepository;
pub use manager::{DatabaseError, DatabaseManager, TenantProvider};
pub use memory::{MemoryStore, MemoryTenants};
pub use mongo::MongoStore;
pub use repository::{Entity, Repository};
pub use store::{DocumentStore, FindOptions, UpdateOutcome};

pub mod approval;
pub mod database;
pub mod memory;
pub mod metrics;
pub mod requests;
pub mod store;
pub mod validation;

pub use approval::{ApprovalEngine, ApprovalPolicy};
pub use database::{Database, PgUnitOfWork};
pub use memory::{MemoryStore, MemoryUnitOfWork};
pub use metrics::init_metrics;
pub use requests::{ProviderRequestService, ServiceResult};
pub use store::{DirectoryStore, IdentityStore, RequestStore, Store, TagVocabulary, UnitOfWork};

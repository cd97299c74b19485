pub mod directory;
pub mod factory;
pub mod models;
pub mod registry;

pub use directory::{DirectoryError, PgTenantDirectory, TenantDirectory};
pub use factory::PgSourceFactory;
pub use models::{ConnectionProfile, TenantRecord};
pub use registry::{ConnectionSourceEntry, RegistryError, SourceFactory, SourceRegistry};

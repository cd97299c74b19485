// handlers/mod.rs - HTTP handlers, split by tenancy tier
//
// Master (tenant-agnostic): health probes and tenant administration under /api/master.
// Tenant (tenant-scoped): everything the tenant pipeline binds a tenant for.

pub mod health;
pub mod master;
pub mod tenant;

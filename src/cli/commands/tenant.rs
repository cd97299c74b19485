use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::{PgSourceFactory, PgTenantDirectory, SourceFactory, SourceRegistry, TenantDirectory};
use crate::tenancy::{TenantId, TenantValidator, Validation};

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "List active tenant ids")]
    List,

    #[command(about = "Validate a tenant and open its connection pool")]
    Check {
        #[arg(help = "Tenant ID")]
        tenant: String,
    },
}

pub async fn handle(cmd: TenantCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let registry = SourceRegistry::new(PgSourceFactory, config().database.default_profile.clone());
    let primary = registry
        .primary_source()
        .await
        .context("invalid master database configuration")?;
    let directory: Arc<dyn TenantDirectory> = Arc::new(PgTenantDirectory::new(primary));

    let result = match cmd {
        TenantCommands::List => list(directory.as_ref(), &output_format).await,
        TenantCommands::Check { tenant } => check(&registry, directory, &tenant, &output_format).await,
    };

    registry.close_all().await;
    result
}

async fn list(directory: &dyn TenantDirectory, output_format: &OutputFormat) -> anyhow::Result<()> {
    let ids = directory.find_all_active().await?;
    if ids.is_empty() {
        return output_empty_collection(output_format, "tenants", "No active tenants");
    }

    let names: Vec<String> = ids.iter().map(ToString::to_string).collect();
    output_list(output_format, "tenants", &names)
}

async fn check(
    registry: &SourceRegistry<PgSourceFactory>,
    directory: Arc<dyn TenantDirectory>,
    raw: &str,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    let id = TenantId::parse(raw).ok_or_else(|| anyhow!("tenant id must not be blank"))?;

    let record = match TenantValidator::new(directory).validate(&id).await? {
        Validation::Valid(record) => record,
        Validation::Rejected(reason) => {
            output_error(
                output_format,
                &format!("Tenant not found or inactive: {}", id),
                Some(&format!("{:?}", reason).to_lowercase()),
            )?;
            return Err(anyhow!("tenant {} rejected", id));
        }
    };

    let pool = match registry.get_source(&record).await {
        Ok(pool) => pool,
        Err(e) => {
            output_error(output_format, &format!("Tenant database unavailable: {}", id), Some("unavailable"))?;
            return Err(e.into());
        }
    };
    PgSourceFactory
        .ping(&pool)
        .await
        .with_context(|| format!("tenant {} pool opened but ping failed", id))?;

    output_success(
        output_format,
        &format!("Tenant {} ({}) is routable", id, record.name),
        Some(json!({
            "tenant_id": id,
            "name": record.name,
            "max_pool_size": record.connection.max_pool_size,
            "min_idle": record.connection.min_idle,
        })),
    )
}

use clap::Subcommand;

use crate::cli::OutputFormat;
use crate::config::{config, AppConfig};
use crate::database::models::tenant::redact_url;

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Show the effective configuration (credentials redacted)")]
    Show,
}

pub async fn handle(cmd: ConfigCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Show => show(config(), &output_format),
    }
}

fn show(config: &AppConfig, output_format: &OutputFormat) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Text => {
            for line in text_lines(config) {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

fn text_lines(config: &AppConfig) -> Vec<String> {
    let tenancy = &config.tenancy;
    let db = &config.database.default_profile;
    let or_off = |v: &str| if v.trim().is_empty() { "(disabled)".to_string() } else { v.to_string() };

    vec![
        format!("Environment:       {:?}", config.environment),
        format!("Listen:            {}:{}", config.server.host, config.server.port),
        format!("Tenant header:     {}", or_off(&tenancy.header_name)),
        format!("Tenant query:      {}", or_off(&tenancy.query_param)),
        format!("Subdomain:         {}", tenancy.subdomain_enabled),
        format!("Path prefix:       {}", tenancy.path_prefix.as_deref().unwrap_or("(disabled)")),
        format!("Default tenant:    {}", tenancy.default_tenant.as_deref().unwrap_or("(none)")),
        format!("Default paths:     {}", tenancy.default_tenant_paths.join(", ")),
        format!("Excluded paths:    {}", tenancy.excluded_paths.join(", ")),
        format!("Warm pools:        {}", tenancy.warm_pools),
        format!("Database:          {}", redact_url(&db.url)),
        format!("Driver:            {}", db.driver),
        format!("Pool size:         {} (min idle {})", db.max_pool_size, db.min_idle),
    ]
}

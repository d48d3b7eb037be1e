use anyhow::{Context, Result};
use platform_authz::AuthzConfig;
use platform_db::DatabaseSettings;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub default_org_slug: String,
    pub default_org_name: String,
    pub cors_allowed_origins: Vec<String>,
    pub authz: AuthzConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let default_org_slug =
            std::env::var("DEFAULT_ORG_SLUG").unwrap_or_else(|_| "default".into());
        let default_org_name =
            std::env::var("DEFAULT_ORG_NAME").unwrap_or_else(|_| "Default".into());
        let cors_allowed_origins = parse_origins(
            &std::env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
        );
        let authz = AuthzConfig::from_env().context("invalid authorization settings")?;

        Ok(Self {
            default_org_slug,
            default_org_name,
            cors_allowed_origins,
            authz,
        })
    }

    pub fn database(&self) -> Result<DatabaseSettings> {
        DatabaseSettings::from_env().context("invalid database settings")
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

mod config;
mod graphql;
mod http;
mod seed;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use platform_authz::AccessEngine;
use platform_db::{DbPool, connect};
use platform_obs::{ObsConfig, init_tracing};
use tracing::info;

use crate::{
    config::AppConfig,
    http::{AppState, ServeConfig},
};

#[derive(Parser, Debug)]
#[command(name = "access-engine", version, about = "Authorization and access-request engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP + GraphQL server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Create the default org and a demo catalog.
    Seed,
    /// Print the GraphQL schema.
    #[command(name = "schema:print")]
    SchemaPrint {
        #[arg(long, value_name = "FILE", help = "Destination file path")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[arg(long, help = "Allow starting even when migrations are pending")]
    allow_dirty: bool,
}

impl From<ServeCommand> for ServeConfig {
    fn from(value: ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(ObsConfig::from_env("access-engine"))?;
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(cmd) => run_server(cmd, Arc::new(AppConfig::load()?)).await,
        Command::Migrate(action) => {
            let config = AppConfig::load()?;
            match action {
                MigrateCommand::Up => migrate_up(&config).await,
                MigrateCommand::Down => migrate_down(&config).await,
            }
        }
        Command::Seed => run_seed(&AppConfig::load()?).await,
        Command::SchemaPrint { output } => schema_print(output),
    }
}

fn schema_print(path: Option<PathBuf>) -> Result<()> {
    let sdl = graphql::schema_sdl();
    match path {
        Some(path) => {
            std::fs::write(&path, sdl)?;
            info!(path = %path.display(), "schema written");
        }
        None => println!("{sdl}"),
    }
    Ok(())
}

async fn setup_pool(config: &AppConfig) -> Result<DbPool> {
    let settings = config.database()?;
    connect(&settings).await.map_err(Into::into)
}

async fn run_seed(config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    Migrator::up(&pool, None).await?;
    let engine = AccessEngine::with_defaults(pool.clone(), &config.authz);
    let org_id =
        seed::ensure_default_org(&pool, &config.default_org_slug, &config.default_org_name)
            .await?;
    seed::run(&pool, &engine, org_id).await
}

async fn run_server(cmd: ServeCommand, config: Arc<AppConfig>) -> Result<()> {
    let pool = setup_pool(&config).await?;
    ensure_migrations(&pool, cmd.allow_dirty).await?;
    let engine = AccessEngine::with_defaults(pool.clone(), &config.authz);
    let schema = graphql::build_schema(engine);
    let state = AppState {
        pool,
        schema,
        config,
    };
    http::serve(cmd.into(), state).await
}

async fn ensure_migrations(pool: &DbPool, allow_dirty: bool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(pool).await?;
    if !pending.is_empty() && !allow_dirty {
        anyhow::bail!(
            "pending migrations detected; run `cargo run -p server -- migrate up` or pass --allow-dirty"
        );
    }
    Ok(())
}

async fn migrate_up(config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    Migrator::up(&pool, None).await?;
    info!("database migrations applied");
    Ok(())
}

async fn migrate_down(config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    Migrator::down(&pool, Some(1)).await?;
    info!("most recent migration rolled back");
    Ok(())
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use db_infra::config::{
    config_file_path, ConfigFile, ConfigResolver, DatabaseConfig, Dialect, EnvVars,
    PushCredentials, FIXED_DB_CONFIG,
};
use db_infra::{
    BootstrapOptions, BootstrapOrchestrator, ConnectionPool, PrivilegedAccountSeed, SeaOrmConnector,
};
use tracing::{error, info, warn};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Postgres,
    Mysql,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Mysql => Dialect::MySql,
        }
    }
}

#[derive(Parser)]
#[command(name = "gabinete-setup")]
#[command(about = "Gabinete database setup tool")]
struct Args {
    /// Config file to read and write (defaults to GABINETE_CONFIG_FILE or config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replace the config file with the given database and push settings
    WriteConfig {
        #[arg(long, value_enum, default_value = "postgres")]
        dialect: DialectArg,
        #[arg(long)]
        host: String,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "")]
        password: String,
        #[arg(long)]
        database: String,
        #[arg(long)]
        tls: bool,
        /// VAPID public key; requires --push-private-key
        #[arg(long, requires = "push_private_key")]
        push_public_key: Option<String>,
        #[arg(long, requires = "push_public_key")]
        push_private_key: Option<String>,
        #[arg(long, requires = "push_public_key")]
        push_subject: Option<String>,
    },
    /// Show which database config would be used and where it came from
    ShowConfig,
    /// Run one bootstrap pass and print the final status as JSON
    Bootstrap,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_env_filter("db_infra=info,setup_cli=info,sqlx=warn")
        .init();

    let args = Args::parse();
    let env = EnvVars::from_process();
    let path = args.config.unwrap_or_else(|| config_file_path(&env));

    let result = match args.command {
        Command::WriteConfig {
            dialect,
            host,
            port,
            user,
            password,
            database,
            tls,
            push_public_key,
            push_private_key,
            push_subject,
        } => {
            let mut db = DatabaseConfig::new(dialect.into(), host, user, password, database)
                .with_tls(tls);
            if let Some(port) = port {
                db = db.with_port(port);
            }
            let push = push_public_key
                .zip(push_private_key)
                .map(|(public_key, private_key)| PushCredentials {
                    public_key,
                    private_key,
                    subject: push_subject,
                });
            write_config(&path, db, push)
        }
        Command::ShowConfig => show_config(env, path),
        Command::Bootstrap => bootstrap(env, path).await,
    };

    if let Err(e) = result {
        error!(error = %e, "setup=failed");
        std::process::exit(1);
    }
}

/// The file is always replaced as a whole; nothing from a previous file is
/// carried over.
fn write_config(path: &Path, db: DatabaseConfig, push: Option<PushCredentials>) -> CliResult {
    db.validate()?;
    if push.is_none() {
        warn!(path = %path.display(), "config_file written without push credentials");
    }
    let target = db.describe();
    ConfigFile { db: Some(db), push }.write(path)?;
    info!(path = %path.display(), target = %target, "config_file=written");
    println!("Wrote {target} to {}", path.display());
    Ok(())
}

fn show_config(env: EnvVars, path: PathBuf) -> CliResult {
    match ConfigResolver::new(FIXED_DB_CONFIG, env, path).resolve()? {
        Some(resolved) => println!("{} (from {})", resolved.config.describe(), resolved.source),
        None => println!("No database configuration found"),
    }
    Ok(())
}

async fn bootstrap(env: EnvVars, path: PathBuf) -> CliResult {
    let options = BootstrapOptions::from_env(&env)?;
    let seed = PrivilegedAccountSeed::from_env(&env);
    let orchestrator = BootstrapOrchestrator::new(
        ConfigResolver::new(FIXED_DB_CONFIG, env, path),
        ConnectionPool::new(Arc::new(SeaOrmConnector::default())),
        seed,
        options,
    );

    let state = orchestrator.run().await;
    info!(stage = %state.stage, steps = state.steps.len(), "bootstrap=finished");
    println!("{}", serde_json::to_string_pretty(&state)?);
    orchestrator.pool().teardown().await?;

    match state.error {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

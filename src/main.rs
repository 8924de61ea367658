use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, anyhow};
use chrono::{TimeDelta, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use nero_license::config::{Config, normalize_base_url};
use nero_license::dev::{self, DevRegistry};
use nero_license::{DeviceFingerprint, FilePersistence, HttpLicensingClient, LicenseStore, ShopRecord};

#[derive(Parser)]
#[command(name = "nero-license", version, about = "Nero device license management")]
struct Cli {
    /// Licensing backend base URL (overrides NERO_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// License state file (overrides NERO_STATE_PATH)
    #[arg(long, global = true)]
    state_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print this device's fingerprint
    Fingerprint,
    /// Activate a license key on this device
    Activate { key: String },
    /// Re-sync expiry and credit from the backend
    Refresh,
    /// Print license state and entitlement as JSON
    Status,
    /// Forget the license on this device
    Deactivate,
    /// Exit with status 1 unless the cached credit covers REQUIRED
    CheckCredit { required: u64 },
    /// Run the in-memory development licensing backend
    DevServer {
        /// Register a demo shop with key DEMO0001
        #[arg(long)]
        seed: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nero_license=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(url) = cli.api_url {
        config.api_url = normalize_base_url(&url);
    }
    if let Some(path) = cli.state_path {
        config.state_path = Some(path);
    }

    match cli.command {
        Command::DevServer { seed } => {
            run_dev_server(&config, seed).await?;
        }
        Command::Fingerprint => {
            println!("{}", DeviceFingerprint::current());
        }
        Command::Activate { key } => {
            let store = open_store(&config)?;
            store.activate(&key).await?;
            print_status(&store)?;
        }
        Command::Refresh => {
            let store = open_store(&config)?;
            store.refresh_license_info().await;
            print_status(&store)?;
        }
        Command::Status => {
            print_status(&open_store(&config)?)?;
        }
        Command::Deactivate => {
            open_store(&config)?.deactivate();
            println!("License removed from this device");
        }
        Command::CheckCredit { required } => {
            let entitlement = open_store(&config)?.entitlement();
            if !entitlement.can_afford(required) {
                eprintln!(
                    "Insufficient entitlement: phase {}, credit {}, required {}",
                    entitlement.phase, entitlement.credit, required
                );
                return Ok(ExitCode::from(1));
            }
            println!("ok");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn open_store(config: &Config) -> anyhow::Result<LicenseStore<HttpLicensingClient, FilePersistence>> {
    let path = config
        .resolve_state_path()
        .ok_or_else(|| anyhow!("no data directory available; set NERO_STATE_PATH"))?;
    let persistence = FilePersistence::open(&path)
        .with_context(|| format!("failed to open state file {}", path.display()))?;
    let api = HttpLicensingClient::from_config(config)?;

    tracing::debug!("Using licensing backend {}", api.base_url());

    Ok(LicenseStore::new(api, persistence, DeviceFingerprint::current()))
}

fn print_status(store: &LicenseStore<HttpLicensingClient, FilePersistence>) -> anyhow::Result<()> {
    let status = serde_json::json!({
        "fingerprint": store.fingerprint(),
        "state": store.snapshot(),
        "entitlement": store.entitlement(),
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn run_dev_server(config: &Config, seed: bool) -> anyhow::Result<()> {
    if !config.dev_mode {
        tracing::warn!("Running the development licensing backend without NERO_ENV=dev");
    }

    let registry = DevRegistry::new();
    if seed {
        let key = registry
            .insert(
                Some("DEMO0001"),
                ShopRecord {
                    id: Some(uuid::Uuid::new_v4().to_string()),
                    name: "Demo Shop".to_string(),
                    types: vec!["gold".to_string()],
                    owner_name: Some("Demo Owner".to_string()),
                    phone_number: None,
                    address: None,
                    license_expires_at: Some(Utc::now() + TimeDelta::days(30)),
                    credit: 100,
                },
            )
            .map_err(|e| anyhow!("failed to seed demo shop: {}", e))?;
        tracing::info!("DEV: Seeded demo shop with license {}", key);
    }

    let listener = tokio::net::TcpListener::bind(config.addr())
        .await
        .with_context(|| format!("failed to bind {}", config.addr()))?;
    dev::serve(listener, registry).await?;
    Ok(())
}

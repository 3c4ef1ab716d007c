use std::path::PathBuf;
use std::sync::Arc;

use drivemirror::config::{MirrorConfig, load_mappings};
use drivemirror::credentials::connect;
use drivemirror::logging::init_tracing;
use drivemirror::sync::orchestrator;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliMode {
    Run(CliOptions),
    Help,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CliOptions {
    config: Option<PathBuf>,
    credentials: Option<PathBuf>,
    strict: bool,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut options = CliOptions::default();
    let mut args = args.into_iter().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("{arg} requires a path"))?;
                options.config = Some(PathBuf::from(value));
            }
            "--credentials" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("{arg} requires a path"))?;
                options.credentials = Some(PathBuf::from(value));
            }
            "--strict" => options.strict = true,
            "--help" | "-h" => return Ok(CliMode::Help),
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(CliMode::Run(options))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let options = match parse_cli_mode(std::env::args())? {
        CliMode::Help => {
            println!("Usage: drivemirror [--config PATH] [--credentials PATH] [--strict]");
            println!("  --config PATH       Mapping document (default: dir_map.json)");
            println!("  --credentials PATH  Token file (default: credentials.json)");
            println!("                      JSON object holding an OAuth \"access_token\"");
            println!("  --strict            Exit non-zero if any mapping fails");
            return Ok(());
        }
        CliMode::Run(options) => options,
    };
    init_tracing();

    let mut config = MirrorConfig::from_env()?;
    if let Some(path) = options.config {
        config.map_path = path;
    }
    if let Some(path) = options.credentials {
        config.credentials_path = path;
    }

    let mappings = load_mappings(&config.map_path)?;
    if mappings.is_empty() {
        warn!(path = %config.map_path.display(), "mapping document has no entries");
    }
    let client = Arc::new(connect(&config).await?);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling in-flight mappings");
            signal_cancel.cancel();
        }
    });

    let outcomes = orchestrator::run(client, mappings, cancel).await;
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(mappings = outcomes.len(), failed, "sync finished");
    if options.strict && failed > 0 {
        anyhow::bail!("{failed} of {} mappings failed", outcomes.len());
    }
    Ok(())
}

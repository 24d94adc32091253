use clap::Parser;
use ghost_host::{FixtureSelector, GhostConfig, GhostService, RouteKey};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ghost-host")]
#[command(author, version, about = "Serve a canned fixture for a route", long_about = None)]
struct Args {
    /// Ghost configuration file (YAML)
    #[arg(short, long, env = "GHOST_CONFIG")]
    config: String,

    /// Route key, departure and arrival codes concatenated (e.g. ATLMIA)
    #[arg(short, long)]
    route: String,

    /// Serve the fixture at this position on the route
    #[arg(long, conflicts_with = "tag")]
    index: Option<usize>,

    /// Serve the first fixture carrying this tag
    #[arg(long)]
    tag: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = GhostConfig::from_file(&args.config)?;
    let service = GhostService::new(config)?;

    let selector = match (args.index, args.tag) {
        (Some(index), _) => Some(FixtureSelector::Index(index)),
        (None, Some(tag)) => Some(FixtureSelector::Tag(tag)),
        (None, None) => None,
    };
    let route = RouteKey::from(args.route);

    // Ctrl-C cuts the simulated delay short; the payload is still printed.
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    match service
        .serve_with_cancel(&route, selector.as_ref(), &cancel)
        .await
    {
        Ok(Some(served)) => {
            info!(
                "Served fixture {} for {} ({} rewrite(s), {}ms delay)",
                served.index,
                served.route,
                served.rewrites,
                served.delay.elapsed.as_millis()
            );
            println!("{}", served.payload);
            Ok(())
        }
        Ok(None) => {
            error!("No fixture available for route {}", route);
            std::process::exit(2);
        }
        Err(e) => {
            error!("Failed to serve route {}: {}", route, e);
            Err(e.into())
        }
    }
}

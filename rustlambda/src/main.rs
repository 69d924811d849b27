//! RustLambda - AWS Lambda custom runtime
//!
//! Serves the bundled event source handlers. `_HANDLER` selects one of them
//! by the name after the first `.`, e.g. `EventSources.sns`.

mod handlers;

use clap::Parser;
use rustlambda_runtime::{Environment, Runtime, RuntimeApiClient};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "rustlambda")]
#[command(about = "AWS Lambda custom runtime", long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUSTLAMBDA_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "rustlambda={level},rustlambda_runtime={level}",
                    level = args.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting RustLambda...");

    let environment = Environment::from_env()?;
    info!("  Runtime API: {}", environment.runtime_api);
    info!("  Handler: {}", environment.handler);

    let registry = handlers::registry();
    if !registry.contains(&environment.handler_name) {
        warn!(
            handler = %environment.handler_name,
            available = ?registry.names(),
            "Handler is not registered, every invocation will be reported as an error"
        );
    }

    let client = RuntimeApiClient::from_environment(&environment);
    let runtime = Runtime::with_registry(client, environment, registry).start();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, finishing the current invocation");
    runtime.shutdown();

    // A pending fetch only returns once an invocation arrives
    tokio::select! {
        () = runtime.wait() => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("Second interrupt, exiting without waiting");
        }
    }

    Ok(())
}

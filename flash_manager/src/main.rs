//! Runs one leveraged flash run against the in-memory market and prints what happened.
//!
//! Usage: `flash_manager [settings.toml] [collateral_units] [borrow_units]`

use alloy_primitives::U256;
use flash_manager::{
    chain::Chain,
    host::Host,
    testkit::fixture::{default_settings, units, Deployment},
    OrchestratorError, OrchestratorResult, Settings,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn parse_units(arg: Option<&String>, default: u64) -> OrchestratorResult<u64> {
    match arg {
        Some(value) => value
            .parse()
            .map_err(|_| OrchestratorError::Config(format!("not a whole number: {}", value))),
        None => Ok(default),
    }
}

fn run(args: &[String]) -> OrchestratorResult<()> {
    let settings = match args.get(1) {
        Some(path) => Settings::load(path)?,
        None => default_settings(),
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(settings.log_level.as_deref().unwrap_or("info")))
        .map_err(|err| OrchestratorError::Config(err.to_string()))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let collateral = units(parse_units(args.get(2), 10)?, 18);
    let borrow = units(parse_units(args.get(3), 15_000)?, 6);

    let deployment = Deployment::deploy_on(Chain::default(), &settings, U256::ZERO)?;
    info!(%collateral, %borrow, "Starting run");
    let report = deployment.run(collateral, borrow)?;

    let output = serde_json::json!({
        "report": report,
        "stage": format!("{:?}", deployment.orchestrator.stage()),
        "started_at": deployment.orchestrator.last_run_at(),
        "health": deployment.orchestrator.account_health()?,
        "events": deployment.chain.events(),
    });
    let rendered = serde_json::to_string_pretty(&output)
        .map_err(|err| OrchestratorError::Custom(err.to_string()))?;
    println!("{}", rendered);
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if let Err(err) = run(&args) {
        error!(error = %err, "Run failed");
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

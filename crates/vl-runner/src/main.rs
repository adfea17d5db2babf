use clap::Parser;
use tracing_subscriber::EnvFilter;
use vl_runner::{RunArgs, RunConfig, Scenario};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = RunArgs::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_directive()));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let config = RunConfig::from_args(&args)?;
    config.validate()?;

    let mut scenario = Scenario::new(config);
    if args.verbose >= 3 {
        scenario = scenario.trace_samples();
    }
    let token = scenario.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling virtual users");
            token.cancel();
        }
    });

    let report = scenario.run().await?;
    let out = if args.pretty { serde_json::to_string_pretty(&report)? } else { serde_json::to_string(&report)? };
    println!("{}", out);
    Ok(())
}

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use meridian_core::events::VaultEvent;
use meridian_sim::{Runner, Scenario, StepRecord};

#[derive(Parser, Debug)]
#[command(name = "meridian-sim")]
#[command(about = "Replay a fund scenario against an in-memory market")]
struct Args {
    /// Path to the scenario file
    #[arg(short, long, default_value = "scenarios/basic.toml")]
    scenario: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print one JSON record per step instead of a summary
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so JSON output stays clean
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let scenario = Scenario::load(&args.scenario)?;
    info!(
        scenario = %scenario.name,
        steps = scenario.steps.len(),
        "loaded scenario"
    );

    let mut runner = Runner::new(&scenario)?;
    runner.run(&scenario.steps, |record| {
        if args.json {
            println!("{}", serde_json::to_string(record)?);
        } else {
            print_summary(record);
        }
        Ok(())
    })?;

    let final_snapshot = runner.vault().snapshot(runner.now())?;
    if args.json {
        println!("{}", serde_json::to_string(&final_snapshot)?);
    } else if let VaultEvent::Snapshot { nav, share_price, total_supply, .. } = final_snapshot {
        println!("final: nav={nav} supply={total_supply} share_price={share_price}");
    }
    for holding in runner.vault().holdings() {
        info!(asset = %holding.asset, amount = holding.amount, "holding");
    }

    Ok(())
}

fn print_summary(record: &StepRecord) {
    let events: Vec<&str> = record.events.iter().map(VaultEvent::name).collect();
    println!(
        "#{:<3} t={} {:?} -> {:?} [{}]",
        record.step,
        record.time,
        record.action,
        record.outcome,
        events.join(", ")
    );
}

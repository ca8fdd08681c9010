//! `tnscheck` binary: evaluate connect-descriptor records against DNS and
//! cluster state, or inspect a single descriptor.

mod config;
mod store;

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use tnscheck_core::descriptor;
use tnscheck_engine::{EvaluationLedger, NoInventory, Orchestrator};
use tnscheck_resolve::{
    IdentityResolver, NslookupResolver, ResolveTimeouts, SqlplusInventory, SrvctlClusterQuery,
};
use tracing::info;

use config::Config;
use store::{ResultStore, StoredResult};

#[derive(Parser)]
#[command(name = "tnscheck", version, about = "Connect-descriptor endpoint validation")]
struct Cli {
    /// KEY=VALUE configuration file.
    #[arg(long, env = "TNSCHECK_CONF", default_value = "tnscheck.conf")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse one raw descriptor and print the structured form.
    Parse { descriptor: String },
    /// Evaluate every record of the input store and write the result store.
    Check {
        /// Input record store (JSON). Overrides SOURCE_JSON from the config.
        #[arg(long)]
        input: Option<PathBuf>,
        /// Result store to write (JSON). Overrides RESULTS_JSON.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Records evaluated in parallel.
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
        /// Re-evaluate every record, even those unchanged since the last run.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Parse { descriptor } => {
            let parsed = descriptor::parse(&descriptor);
            println!("{}", serde_json::to_string_pretty(&parsed)?);
            Ok(())
        }
        Command::Check {
            input,
            output,
            concurrency,
            force,
        } => check(&cli.config, input, output, concurrency, force).await,
    }
}

async fn check(
    config_path: &Path,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    concurrency: usize,
    force: bool,
) -> anyhow::Result<()> {
    let config = Config::load_or_default(config_path);
    let input = input
        .or_else(|| config.get("SOURCE_JSON").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("records.json"));
    let output = output
        .or_else(|| config.get("RESULTS_JSON").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("results.json"));

    let records = store::load_records(&input)?;
    info!(count = records.len(), input = %input.display(), "records loaded");

    let mut timeouts = ResolveTimeouts::default();
    if let Some(t) = config.get_duration_secs("CNAME_TIMEOUT_SECS") {
        timeouts.cname = t;
    }
    if let Some(t) = config.get_duration_secs("SCAN_TIMEOUT_SECS") {
        timeouts.scan = t;
    }
    if let Some(t) = config.get_duration_secs("INVENTORY_TIMEOUT_SECS") {
        timeouts.inventory = t;
    }

    let cluster = match config.get("SSH_USER") {
        Some(user) => SrvctlClusterQuery::with_user(user),
        None => SrvctlClusterQuery::default(),
    };
    let resolver =
        IdentityResolver::new(NslookupResolver::default(), cluster).with_timeouts(timeouts);
    let orchestrator = Orchestrator::new(resolver);

    let mut ledger = if force {
        EvaluationLedger::new()
    } else {
        store::load_results(&output)?.to_ledger()
    };

    let results = match config.get("INVENTORY_CONN") {
        Some(conn) => {
            let inventory = SqlplusInventory::new(conn);
            orchestrator
                .evaluate_batch(&records, Some(&inventory), &mut ledger, concurrency)
                .await
        }
        None => {
            orchestrator
                .evaluate_batch(&records, None::<&NoInventory>, &mut ledger, concurrency)
                .await
        }
    };

    let evaluated_at = Utc::now();
    let mut failures = 0usize;
    let result_store = ResultStore {
        results: records
            .into_iter()
            .zip(results)
            .map(|(input, result)| {
                if result.error_kind.is_some() {
                    failures += 1;
                }
                StoredResult {
                    input,
                    evaluated_at,
                    result,
                }
            })
            .collect(),
    };
    store::save_results(&output, &result_store)?;
    info!(
        total = result_store.results.len(),
        failures,
        output = %output.display(),
        "results written"
    );
    Ok(())
}

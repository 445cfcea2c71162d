//! shardquery - run one SQL query across every shard of a database.

use db_shardquery::cli::Cli;
use db_shardquery::config::Config;
use db_shardquery::error::{FederationError, Result};
use db_shardquery::logging;
use db_shardquery::output::ResultOutput;
use db_shardquery::QueryRunner;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Exit status when some shards failed but results were still printed.
const EXIT_PARTIAL: i32 = 2;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if cli.log_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{}: {}", e.category(), e);
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let query = cli.read_query()?;
    let format = cli.parse_output_format().map_err(FederationError::config)?;

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;
    let source = cli.resolve_source(&config)?;

    let runner = QueryRunner::from_source(source);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling query");
            interrupt.cancel();
        }
    });

    let outcome = runner.run(&query, &cancel).await?;

    print!("{}", ResultOutput::new(format).format(&outcome.result));

    if !outcome.is_partial() {
        return Ok(0);
    }
    if let Some(e) = &outcome.error {
        eprintln!("Error: {e} ({} of {} shards failed)", outcome.failed, outcome.shards);
    }
    Ok(EXIT_PARTIAL)
}

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use papergraph_core::{CoreError, ExitCode, HarvestConfig};
use papergraph_science::{HarvestOptions, HarvestReport, Harvester, ScienceError};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "papergraph",
    about = "Build a citation graph from seed titles and harvest open-access PDFs",
    version,
    long_about = None
)]
struct Cli {
    /// Also register other papers by the seed papers' authors.
    #[arg(short, long)]
    authors: bool,

    /// File of already-acquired keys, one per line.
    #[arg(short, long, value_name = "PATH")]
    crawled: Option<PathBuf>,

    /// Download PDFs for every registered paper.
    #[arg(short, long)]
    download: bool,

    /// Worker count for metadata lookups and downloads.
    #[arg(short = 'n', long)]
    num_workers: Option<usize>,

    /// Retry failed downloads through the configured SOCKS relay.
    #[arg(short, long)]
    proxy: bool,

    /// Rebuild the graph even if all_papers.json already exists.
    #[arg(short, long)]
    redo: bool,

    /// Config file (defaults to PAPERGRAPH_CONFIG or ~/.config/papergraph/config.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the run report as JSON.
    /// Also enabled by setting PAPERGRAPH_JSON=1.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("papergraph=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json_output = cli.json || std::env::var("PAPERGRAPH_JSON").as_deref() == Ok("1");

    let code = match run(cli, json_output).await {
        Ok(()) => ExitCode::Success,
        Err(err) => {
            if json_output {
                let _ = print_json(&serde_json::json!({
                    "status": "error",
                    "message": format!("{err:#}"),
                }));
            } else {
                eprintln!("Error: {err:#}");
            }
            exit_code(&err)
        }
    };
    std::process::exit(code as i32);
}

async fn run(cli: Cli, json_output: bool) -> Result<()> {
    let start = Instant::now();
    let config_path = cli.config.clone().unwrap_or_else(HarvestConfig::config_path);
    let config = HarvestConfig::load_from(&config_path)?;
    debug!(config = %config_path.display(), workers = config.workers, "config loaded");

    let options = HarvestOptions {
        include_authors: cli.authors,
        crawled: cli.crawled,
        download: cli.download,
        workers: cli.num_workers.unwrap_or(config.workers),
        proxy: cli.proxy,
        redo: cli.redo,
    };
    if options.workers == 0 {
        return Err(CoreError::Config("--num-workers must be at least 1".to_string()).into());
    }

    let harvester = Harvester::from_config(&config, &options)?;
    let report = harvester.run(&options).await?;
    let dur = start.elapsed().as_millis();

    if json_output {
        print_json(&serde_json::json!({
            "status": "ok",
            "data": report,
            "meta": { "duration_ms": dur }
        }))?;
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &HarvestReport) {
    if let Some(graph) = &report.graph {
        println!(
            "Seeds matched: {}/{}  (+{} from edges, +{} from authors)",
            graph.seeds_matched, graph.seeds, graph.from_edges, graph.from_authors
        );
        if !graph.patterns_learned.is_empty() {
            println!("URL patterns learned: {}", graph.patterns_learned.join(", "));
        }
    }
    if let Some(acquisition) = &report.acquisition {
        println!(
            "Downloaded: {}  failed: {}  skipped: {}",
            acquisition.acquired.len(),
            acquisition.failed.len(),
            acquisition.already_acquired
        );
    }
    println!(
        "Papers: {}  Authors: {}  URL patterns: {}",
        report.papers, report.authors, report.url_patterns
    );
}

fn exit_code(err: &anyhow::Error) -> ExitCode {
    let core = err.downcast_ref::<CoreError>().or_else(|| match err.downcast_ref::<ScienceError>() {
        Some(ScienceError::State(inner)) => Some(inner),
        _ => None,
    });
    match core {
        Some(CoreError::Config(_)) | Some(CoreError::TomlParse(_)) => ExitCode::InvalidArgs,
        Some(_) => ExitCode::StateError,
        None => ExitCode::GeneralError,
    }
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use smuggles::config::Config;
use smuggles::http::method::Method;
use smuggles::io::read_urls;
use smuggles::sink::{ErrorWriter, Finding, FindingsWriter, ScanError};
use smuggles::{baseline, engine, mutation};

/// A black-box HTTP request smuggling (desync) scanner. Reads target URLs
/// from stdin, probes each with a matrix of Transfer-Encoding mutations,
/// and classifies CL.TE / TE.CL findings by response-time deltas.
#[derive(Parser)]
#[command(name = "smuggles", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Number of concurrent workers.
    #[arg(long, default_value_t = 10)]
    workers: usize,

    /// HTTP method to probe; repeatable. Default: GET POST PUT DELETE.
    #[arg(long = "method", value_name = "METHOD")]
    methods: Vec<String>,

    /// Classification threshold above baseline, in seconds.
    #[arg(long, default_value_t = 5)]
    delay: u64,

    /// Enable only mutations matching this glob; repeatable.
    #[arg(long = "enable", value_name = "GLOB")]
    enable: Vec<String>,

    /// Disable mutations matching this glob; repeatable, wins over --enable.
    #[arg(long = "disable", value_name = "GLOB")]
    disable: Vec<String>,

    /// Stop probing a host after this many findings; 0 = unlimited.
    #[arg(long, default_value_t = 0)]
    stop_after: u64,

    /// Render a progress bar while scanning.
    #[arg(long)]
    progress: bool,

    #[arg(long)]
    verbose: bool,

    #[arg(long)]
    debug: bool,

    /// Baseline persistence file.
    #[arg(long, default_value = "smuggles.base")]
    baseline: PathBuf,

    /// Findings-log path; defaults to `findings.log` under --output-dir.
    #[arg(long)]
    findings: Option<PathBuf>,

    /// Error-log path; defaults to `errors.log` under --output-dir.
    #[arg(long)]
    errors: Option<PathBuf>,

    /// Directory supplying defaults for --findings and --errors.
    #[arg(long = "output-dir")]
    output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// List every mutation name the generator produces.
    ListMutations,
    /// Print one mutation's raw Transfer-Encoding header bytes by name.
    ShowMutation { name: String },
    /// Parse a findings-log line and print a PoC skeleton for it.
    Poc { line: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.debug);

    match &cli.command {
        Some(Command::ListMutations) => return list_mutations(),
        Some(Command::ShowMutation { name }) => return show_mutation(name),
        Some(Command::Poc { line }) => return print_poc(line),
        None => {}
    }

    let config = build_config(&cli).context("invalid configuration")?;
    run_scan(&config)
}

fn init_tracing(verbose: bool, debug: bool) {
    let default_level = if debug { "debug" } else if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_config(cli: &Cli) -> Result<Config> {
    let methods = if cli.methods.is_empty() {
        Method::defaults()
    } else {
        cli.methods
            .iter()
            .map(|m| m.parse::<Method>())
            .collect::<Result<Vec<_>, _>>()
            .context("invalid --method value")?
    };

    Ok(Config {
        workers: cli.workers,
        methods,
        delay: Duration::from_secs(cli.delay),
        enable: cli.enable.clone(),
        disable: cli.disable.clone(),
        stop_after: cli.stop_after,
        progress: cli.progress,
        verbose: cli.verbose,
        debug: cli.debug,
        baseline_path: cli.baseline.clone(),
        findings_path: cli.findings.clone(),
        errors_path: cli.errors.clone(),
        output_dir: cli.output_dir.clone(),
    })
}

/// Phase 1 (baseline) then phase 2 (test matrix), per the data-flow in the
/// system overview: load persisted baselines, collect what's missing, merge
/// and re-persist, then build and dispatch the randomized test matrix.
fn run_scan(config: &Config) -> Result<()> {
    let stdin = io::stdin();
    let parsed = read_urls(stdin.lock());

    let mut urls = Vec::new();
    let mut startup_errors = Vec::new();
    for result in parsed {
        match result {
            Ok(url) => urls.push(url),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed URL");
                startup_errors.push(ScanError { message: e.to_string() });
            }
        }
    }

    let existing = baseline::load(&config.baseline_path).context("failed to load baseline file")?;
    let outcome = baseline::collect_missing(&urls, &existing, config.workers);

    let mut merged = existing;
    merged.extend(outcome.baselines);
    for (canonical, err) in &outcome.errors {
        tracing::warn!(url = %canonical, error = %err, "baseline collection failed");
        startup_errors.push(ScanError { message: format!("baseline for {canonical}: {err}") });
    }
    baseline::store(&config.baseline_path, &merged).context("failed to persist baseline file")?;

    let mutations = mutation::filter(&mutation::generate(), &config.enable, &config.disable)
        .context("invalid mutation glob filter")?;

    let with_baseline: Vec<_> = urls
        .into_iter()
        .filter(|url| merged.contains_key(url.canonical()))
        .collect();

    let (findings, scan_errors) = engine::run(&with_baseline, &merged, &mutations, config);

    let mut findings_out = open_writer(&config.findings_output_path())?;
    for finding in &findings {
        findings_out.write_finding(finding)?;
    }

    let mut errors_out = open_writer(&config.errors_output_path())?;
    for err in startup_errors.into_iter().chain(scan_errors) {
        errors_out.write_error(&err)?;
    }

    Ok(())
}

fn open_writer(path: &std::path::Path) -> Result<std::fs::File> {
    std::fs::File::create(path).with_context(|| format!("failed to open {path:?} for writing"))
}

fn list_mutations() -> Result<()> {
    let mutations = mutation::generate();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for name in mutations.keys() {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

fn show_mutation(name: &str) -> Result<()> {
    let mutations = mutation::generate();
    let header = mutations
        .get(name)
        .with_context(|| format!("no such mutation: {name}"))?;
    io::stdout().write_all(header)?;
    println!();
    Ok(())
}

fn print_poc(line: &str) -> Result<()> {
    let finding = Finding::from_line(line).context("could not parse findings-log line")?;
    let mutations = mutation::generate();
    let header = mutations
        .get(&finding.mutation)
        .with_context(|| format!("unknown mutation in line: {}", finding.mutation))?;

    println!("# PoC skeleton for {} {} ({})", finding.method, finding.url, finding.status);
    println!("# mutation: {}", finding.mutation);
    println!("# header bytes: {:?}", String::from_utf8_lossy(header));
    Ok(())
}

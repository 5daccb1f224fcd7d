//! blockcheck - Ad and tracker blocking tester
//!
//! Binary entry point for the blockcheck CLI application.

#![warn(clippy::all, warnings)]
#![warn(clippy::pedantic, clippy::nursery)]

use blockcheck::cli::{Commands, OutputFormat, ProbeArgs, RunArgs};
use blockcheck::config::{system_dns, CategoryConfig, ConfigLoader};
use blockcheck::engine::{BlockTester, Settings};
use blockcheck::error::Result;
use blockcheck::probe::types::{ClassifiedResult, DomainEntry};
use blockcheck::report::{Report, Stats};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Set up logging based on verbosity level.
///
/// Logs go to stderr so that JSON/CSV output on stdout stays clean.
///
/// # Arguments
///
/// * `verbose` - Enable debug-level logging
/// * `quiet` - Enable error-level only logging
fn setup_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().without_time().with_writer(std::io::stderr))
        .init();
}

/// Load the domain list and category order from files or defaults.
///
/// # Arguments
///
/// * `domains` - Optional domain list file
/// * `categories` - Optional category order file
fn load_inputs(
    domains: Option<PathBuf>,
    categories: Option<PathBuf>,
) -> Result<(Vec<DomainEntry>, CategoryConfig)> {
    let entries = match domains {
        Some(path) => ConfigLoader::load_domains(path)?,
        None => ConfigLoader::load_default_domains(),
    };
    let config = match categories {
        Some(path) => ConfigLoader::load_categories(path)?,
        None => ConfigLoader::load_default_categories(),
    };
    Ok((entries, config))
}

/// Cancel `token` when the user presses Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling remaining probes");
            token.cancel();
        }
    });
}

/// Server shown to the user: the chosen one, else the detected system one.
fn dns_label(tester: &BlockTester) -> Option<String> {
    tester
        .dns()
        .server()
        .map(|addr| addr.to_string())
        .or_else(system_dns::detect)
}

fn millis(result: &ClassifiedResult) -> f64 {
    result.response_time.as_secs_f64() * 1000.0
}

fn detail(result: &ClassifiedResult) -> String {
    result
        .error
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default()
}

/// Run the block test over a domain list and output results.
///
/// # Arguments
///
/// * `args` - Run options
/// * `format` - Output format
async fn run_block_test(args: RunArgs, format: OutputFormat) -> Result<()> {
    let (entries, config) = load_inputs(args.domains, args.categories)?;
    let settings: Settings = args.probe.settings(args.workers);
    let tester = BlockTester::new(&settings)?;
    let dns_server = dns_label(&tester);

    eprintln!(
        "Testing {} domains via {} ({} workers)...\n",
        entries.len(),
        dns_server.as_deref().unwrap_or("system DNS"),
        settings.workers
    );

    let token = CancellationToken::new();
    cancel_on_ctrl_c(token.clone());

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_progress(rx, entries.len()));

    let results = tester.run(&token, &entries, Some(tx)).await;
    if let Err(e) = printer.await {
        tracing::warn!("progress printer failed: {e}");
    }
    eprintln!();

    let report = Report::build(&results, &config, dns_server);
    match format {
        OutputFormat::Table => print_report_table(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Csv | OutputFormat::Tsv => {
            let sep = format.separator().unwrap_or(',');
            print_delimited(report.categories.iter().flat_map(|g| g.results()), sep);
        }
    }

    Ok(())
}

/// Print one line per finished domain, in completion order.
async fn print_progress(mut rx: mpsc::UnboundedReceiver<ClassifiedResult>, total: usize) {
    let mut done = 0;
    let mut stats = Stats::default();
    while let Some(result) = rx.recv().await {
        done += 1;
        stats.add(result.status);
        eprintln!(
            "[{done:>3}/{total}] {:<8} {:<40} {:>8.1} ms  ({} blocked so far)",
            result.status,
            result.domain,
            millis(&result),
            stats.blocked
        );
    }
}

/// Print the grouped results, the summary and the recommendation.
fn print_report_table(report: &Report) {
    for group in &report.categories {
        println!(
            "\n== {} ({}/{} blocked, {:.1}%) ==",
            group.category, group.stats.blocked, group.stats.total, group.stats.percent_blocked
        );
        for sub in &group.subcategories {
            println!("  -- {} --", sub.subcategory);
            for r in &sub.results {
                let http = if r.http_status == 0 {
                    "-".to_string()
                } else {
                    r.http_status.to_string()
                };
                println!(
                    "  {:<8} {:<40} {:>9.1} ms  {:<4} {}",
                    r.status,
                    r.domain,
                    millis(r),
                    http,
                    detail(r)
                );
            }
        }
    }

    let stats = &report.stats;
    println!("\n=== Summary ===");
    if let Some(server) = &report.dns_server {
        println!("DNS server: {server}");
    }
    println!("Total domains: {}", stats.total);
    println!("Blocked: {} ({:.1}%)", stats.blocked, stats.percent_blocked);
    println!("Resolved: {} ({:.1}%)", stats.resolved, stats.percent_resolved);
    println!("Errors: {} ({:.1}%)", stats.errored, stats.percent_errored());
    println!("\n{}", report.recommendation);
}

/// Quote a field if it contains the separator or a quote.
fn escape_field(field: &str, sep: char) -> String {
    if field.contains(sep) || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Print results in CSV or TSV format.
fn print_delimited<'a>(results: impl Iterator<Item = &'a ClassifiedResult>, sep: char) {
    let header = ["Category", "Subcategory", "Domain", "Status", "Time(ms)", "HTTP", "Detail"];
    println!("{}", header.join(&sep.to_string()));
    for r in results {
        let fields = [
            escape_field(&r.category, sep),
            escape_field(&r.subcategory, sep),
            escape_field(&r.domain, sep),
            r.status.to_string(),
            format!("{:.1}", millis(r)),
            r.http_status.to_string(),
            escape_field(&detail(r), sep),
        ];
        println!("{}", fields.join(&sep.to_string()));
    }
}

/// Check a single domain.
///
/// # Arguments
///
/// * `domain` - Domain name to check
/// * `probe` - Probe options
/// * `format` - Output format
async fn run_single_check(domain: String, probe: ProbeArgs, format: OutputFormat) -> Result<()> {
    let tester = BlockTester::new(&probe.settings(1))?;
    let token = CancellationToken::new();
    cancel_on_ctrl_c(token.clone());

    eprintln!("Checking {domain}...\n");
    let result = tester.check(&token, &DomainEntry::new(domain)).await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Csv | OutputFormat::Tsv => {
            print_delimited(std::iter::once(&result), format.separator().unwrap_or(','));
        }
        OutputFormat::Table => {
            println!("Domain: {}", result.domain);
            println!("DNS server: {}", dns_label(&tester).as_deref().unwrap_or("system"));
            println!("Status: {}", result.status);
            println!("Time: {:.1} ms", millis(&result));
            if result.http_status != 0 {
                println!("HTTP status: {}", result.http_status);
            }
            if let Some(cause) = &result.error {
                println!("Detail: {cause}");
            }
        }
    }

    Ok(())
}

/// List the domains that would be tested, grouped by category.
fn run_list_domains(
    domains: Option<PathBuf>,
    categories: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let (entries, config) = load_inputs(domains, categories)?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    // Bucket by category in first-seen order, then listed categories first.
    let mut groups: Vec<(&str, Vec<&DomainEntry>)> = Vec::new();
    for entry in &entries {
        match groups.iter_mut().find(|(c, _)| *c == entry.category) {
            Some((_, members)) => members.push(entry),
            None => groups.push((entry.category.as_str(), vec![entry])),
        }
    }
    groups.sort_by_key(|(c, _)| config.category_rank(c).map_or((true, 0), |r| (false, r)));

    println!("Domain list ({} domains):", entries.len());
    for (category, members) in groups {
        let category = if category.is_empty() { "Uncategorized" } else { category };
        println!("\n{category} ({})", members.len());
        for (idx, entry) in members.iter().enumerate() {
            println!("  {:<4} {:<40} {}", idx + 1, entry.name, entry.subcategory);
        }
    }

    Ok(())
}

/// Main entry point for the blockcheck CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("blockcheck crashed: {panic_info}");
    }));

    let (cli, verbose) = blockcheck::cli::parse_verbose();
    setup_logging(verbose, cli.quiet);

    tracing::debug!("blockcheck starting...");

    match cli.command {
        Some(Commands::Run(args)) => run_block_test(args, cli.format).await?,
        Some(Commands::Check { domain, probe }) => {
            run_single_check(domain, probe, cli.format).await?;
        }
        Some(Commands::List {
            domains,
            categories,
        }) => run_list_domains(domains, categories, cli.format)?,
        None => run_block_test(RunArgs::default(), cli.format).await?,
    }

    Ok(())
}

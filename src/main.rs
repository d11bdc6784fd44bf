//! CLI entry point for `mailtrace`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailtrace::config::{self, Config};
use mailtrace::error::ForensicError;
use mailtrace::geo::{DisabledLocator, GeoLocator, IpInfoClient};
use mailtrace::model::evidence::{GeoLocation, SearchHit};
use mailtrace::parser::header;
use mailtrace::search::SearchOptions;
use mailtrace::session::AnalysisSession;
use mailtrace::trace;

/// Characters of context printed around each search hit.
const SNIPPET_RADIUS: usize = 30;

/// Forensic analysis of a single email message.
#[derive(Parser)]
#[command(name = "mailtrace", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Show headers, body, images and links of a message
    Analyze {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Trace the originating IP through the Received chain
    Trace {
        path: PathBuf,
        /// Write a map of the geolocated origin
        #[arg(long)]
        map: bool,
        /// Directory for the map (default: report.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        json: bool,
        /// Do not contact the geolocation service
        #[arg(long)]
        no_geo: bool,
    },
    /// Search the message body for a keyword
    Search {
        path: PathBuf,
        query: String,
        #[arg(short, long)]
        ignore_case: bool,
        #[arg(long)]
        json: bool,
    },
    /// Write an HTML analysis report
    Report {
        path: PathBuf,
        /// Directory for the report (default: report.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Do not contact the geolocation service
        #[arg(long)]
        no_geo: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Analyze { path, json } => cmd_analyze(&path, json, &config),
        Commands::Trace {
            path,
            map,
            output,
            json,
            no_geo,
        } => cmd_trace(&path, map, output, json, no_geo, &config),
        Commands::Search {
            path,
            query,
            ignore_case,
            json,
        } => cmd_search(&path, &query, ignore_case, json, &config),
        Commands::Report {
            path,
            output,
            no_geo,
        } => cmd_report(&path, output, no_geo, &config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, config::LOG_FILE_NAME);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Build a session with the locator the configuration and flags ask for.
fn open_session(path: &Path, no_geo: bool, config: &Config) -> anyhow::Result<AnalysisSession> {
    let geo = &config.geolocation;
    let locator: Arc<dyn GeoLocator> = if no_geo || !geo.enabled {
        Arc::new(DisabledLocator)
    } else {
        if geo.resolved_token().is_none() {
            tracing::warn!(
                "No geolocation token configured (set {}); requests may be rate limited",
                config::TOKEN_ENV
            );
        }
        Arc::new(IpInfoClient::from_config(geo))
    };

    // Each attempt may take the full request timeout
    let attempts = u64::from(geo.retries) + 1;
    let wait = Duration::from_secs(geo.timeout_secs.max(1) * attempts + 1);

    let mut session = AnalysisSession::new(locator, wait);
    session.load_file(path)?;
    Ok(session)
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Print the headers and resolved body of a message.
fn cmd_analyze(path: &Path, json: bool, config: &Config) -> anyhow::Result<()> {
    use humansize::{format_size, BINARY};

    let mut session = open_session(path, true, config)?;
    let size = session.raw().map(|r| r.len()).unwrap_or(0);

    // A bad Date is reported, but the rest of the message is still shown
    let (headers, date_error) = match session.headers() {
        Ok(headers) => (headers, None),
        Err(ForensicError::DateFormat(raw)) => {
            (header::address_fields(session.parsed()?), Some(raw))
        }
        Err(e) => return Err(e.into()),
    };
    let received = session.received_chain()?;
    let body = session.body()?;

    if json {
        let output = serde_json::json!({
            "file": path.to_string_lossy(),
            "size": size,
            "headers": headers,
            "date_error": date_error,
            "received_count": received.len(),
            "body": body,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let date = match (&headers.date, &date_error) {
        (Some(d), _) => Some(d.format(&config.general.date_format).to_string()),
        (None, Some(raw)) => Some(format!("{raw} (unparsable)")),
        (None, None) => None,
    };
    let absent = "(not present)";

    println!();
    println!("  {:<12} {}", "File:", path.display());
    println!("  {:<12} {}", "Size:", format_size(size, BINARY));
    println!("  {:<12} {}", "From:", headers.from.as_deref().unwrap_or(absent));
    println!("  {:<12} {}", "To:", headers.to.as_deref().unwrap_or(absent));
    println!(
        "  {:<12} {}",
        "Subject:",
        headers.subject.as_deref().unwrap_or(absent)
    );
    println!("  {:<12} {}", "Date:", date.as_deref().unwrap_or(absent));
    println!("  {:<12} {}", "Received:", received.len());
    println!();
    println!("{}", body.display_text());

    print_list("Images", &body.images);
    print_list("Links", &body.links);
    println!();
    Ok(())
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!();
    println!("  {title}:");
    for item in items {
        println!("    {item}");
    }
}

/// Trace the origin through the Received chain and geolocate it.
fn cmd_trace(
    path: &Path,
    map: bool,
    output: Option<PathBuf>,
    json: bool,
    no_geo: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let mut session = open_session(path, no_geo, config)?;
    let chain = session.received_chain()?;
    let hops = trace::hops(&chain);
    let origin = session.origin_ip()?;

    let located = if no_geo {
        None
    } else {
        let pb = spinner(format!("Geolocating {origin}..."));
        let result = session.trace().map(GeoLocation::clone);
        pb.finish_and_clear();
        match result {
            Ok(loc) => Some(loc),
            Err(e) => {
                eprintln!("  {e}");
                None
            }
        }
    };

    let map_path = match (&located, map) {
        (Some(_), true) => {
            let dir = output.unwrap_or_else(|| config::output_dir(config));
            Some(session.write_map(&dir)?)
        }
        (None, true) => {
            eprintln!("  No map written: origin was not geolocated");
            None
        }
        _ => None,
    };

    if json {
        let output = serde_json::json!({
            "file": path.to_string_lossy(),
            "hops": hops,
            "origin_ip": origin,
            "location": located,
            "map": map_path.as_ref().map(|p| p.to_string_lossy()),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("  {} hop(s), newest first", hops.len());
    for hop in &hops {
        let ips: Vec<String> = hop.ips.iter().map(ToString::to_string).collect();
        let raw: String = hop.raw.chars().take(90).collect();
        println!("  {:<3} {:<16} {}", hop.index, ips.join(","), raw);
    }
    println!();
    println!("  {:<12} {}", "Origin IP:", origin);
    if let Some(loc) = &located {
        println!("  {:<12} {}", "Location:", loc.label());
        println!(
            "  {:<12} {:.4}, {:.4}",
            "Coordinates:", loc.latitude, loc.longitude
        );
        if let Some(org) = &loc.org {
            println!("  {:<12} {}", "Network:", org);
        }
    }
    if let Some(p) = &map_path {
        println!("  {:<12} {}", "Map:", p.display());
    }
    println!();
    println!("  Note: the earliest Received header is not authenticated and may be forged.");
    println!();
    Ok(())
}

/// Search the body of a message.
fn cmd_search(
    path: &Path,
    query: &str,
    ignore_case: bool,
    json: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let mut session = open_session(path, true, config)?;
    let hits = session.search(query, SearchOptions { ignore_case })?;
    let text = session.body()?.display_text().to_string();

    if json {
        print_search_results_json(query, &text, &hits)?;
    } else {
        print_search_results_table(&text, &hits);
    }
    Ok(())
}

/// Print hits with the match highlighted.
fn print_search_results_table(text: &str, hits: &[SearchHit]) {
    println!();
    println!("  {} result(s)", hits.len());
    println!();

    for (i, hit) in hits.iter().enumerate() {
        let (before, matched, after) = hit.snippet(text, SNIPPET_RADIUS);
        let flatten = |s: &str| s.replace(['\n', '\r'], " ");
        println!(
            "  {:<4} {:>6}..{:<6} ...{}\x1b[1;33m{}\x1b[0m{}...",
            i + 1,
            hit.start,
            hit.end,
            flatten(&before),
            flatten(&matched),
            flatten(&after),
        );
    }
    if !hits.is_empty() {
        println!();
    }
}

fn print_search_results_json(query: &str, text: &str, hits: &[SearchHit]) -> anyhow::Result<()> {
    let items: Vec<serde_json::Value> = hits
        .iter()
        .map(|hit| {
            let (before, matched, after) = hit.snippet(text, SNIPPET_RADIUS);
            serde_json::json!({
                "start": hit.start,
                "end": hit.end,
                "match": matched,
                "before": before,
                "after": after,
            })
        })
        .collect();

    let output = serde_json::json!({
        "query": query,
        "result_count": hits.len(),
        "results": items,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Write the HTML report for a message.
fn cmd_report(
    path: &Path,
    output: Option<PathBuf>,
    no_geo: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let with_geo = !no_geo && config.report.include_geolocation;
    let mut session = open_session(path, !with_geo, config)?;

    let dir = output.unwrap_or_else(|| config::output_dir(config));
    let pb = with_geo.then(|| spinner("Geolocating origin...".to_string()));
    let written = session.write_report(&dir, with_geo);
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    println!("  Report written to {}", written?.display());
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailtrace", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use abusereport::aggregate::group;
use abusereport::cli::{Cli, OutputFormat};
use abusereport::config::Config;
use abusereport::errors::AbuseReportError;
use abusereport::log_index::LogIndex;
use abusereport::lookup::LookupCache;
use abusereport::output::{
    BatchStatistics, JsonFormatter, OutputFormatter, ReportBatch, TextFormatter, write_reports,
};
use abusereport::report::compose_all;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Handle schema generation early exit
    if cli.generate_schema {
        println!("{}", ReportBatch::generate_json_schema()?);
        return Ok(());
    }

    init_logging(&cli);

    let config = load_config(&cli)?;

    let input = read_stdin().await?;
    let lines: Vec<&str> = input.lines().collect();
    let mut index = LogIndex::build(&lines);
    index.retain_min_occurrences(config.report.min_occurrences);

    if index.is_empty() {
        eprintln!("{}", AbuseReportError::NothingToDo);
        return Ok(());
    }
    info!(lines = lines.len(), addresses = index.len(), "indexed input");

    let addresses = index.addresses();
    let mut cache = LookupCache::from_boxed(config.directory(), config.lookup_settings());
    let show_progress = cli.show_progress();
    let records = cache
        .resolve_all(&addresses, |addr, i, total| {
            if show_progress {
                eprintln!("[{i}/{total}] {addr}");
            }
        })
        .await;

    let groups = group(records);
    let options = config.report_options();
    let reports = compose_all(&groups, &index, &options);

    let statistics = BatchStatistics {
        lines_read: lines.len(),
        public_addresses: index.len(),
        lookups_issued: cache.queries_issued(),
        ..BatchStatistics::default()
    };
    let batch = ReportBatch::new(reports, &groups, statistics, options.generated_at);

    if let Some(ref dir) = cli.output_dir {
        let written = write_reports(dir, &batch)
            .with_context(|| format!("writing reports to {}", dir.display()))?;
        if show_progress {
            eprintln!(
                "Wrote {} report(s) to {} ({} file(s))",
                batch.reports.len(),
                dir.display(),
                written.len()
            );
        }
        return Ok(());
    }

    let formatter: Box<dyn OutputFormatter> = match cli.format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    };
    debug!(mime = formatter.mime_type(), "rendering output");
    print!("{}", formatter.format_batch(&batch)?);

    Ok(())
}

fn init_logging(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("abusereport={}", cli.log_level())));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Defaults, then the optional TOML file, then the environment, then flags.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match cli.config {
        Some(ref path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::new(),
    };
    config.apply_env();
    config.merge_with_cli(cli);
    config.normalize();
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Whole of stdin, with invalid UTF-8 replaced rather than rejected.
async fn read_stdin() -> Result<String> {
    let mut buf = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut buf)
        .await
        .context("reading log lines from stdin")?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

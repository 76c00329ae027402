use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use mimalloc::MiMalloc;
use reportnorm::config::AppConfig;
use reportnorm::parsers::ParserType;
use reportnorm::services::ingestion;
use reportnorm::services::port_mapper::PortMapper;
use reportnorm::services::sink::RecordingSink;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const USAGE: &str = "usage: reportnorm <openvas|nessus|webfuzzer> <report-path>";

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    // stdout carries the JSON records, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(
            config
                .log_json
                .then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)),
        )
        .with(
            (!config.log_json)
                .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(kind), Some(path)) = (args.next(), args.next()) else {
        bail!(USAGE);
    };
    let parser_type: ParserType = kind.parse().context(USAGE)?;
    let path = PathBuf::from(path);

    let size = fs::metadata(&path)
        .with_context(|| format!("cannot stat {}", path.display()))?
        .len();
    if size > config.max_report_bytes {
        bail!(
            "{} is {size} bytes, above the {} byte limit",
            path.display(),
            config.max_report_bytes
        );
    }
    let data = fs::read(&path).with_context(|| format!("cannot read {}", path.display()))?;

    let mapper = match &config.port_mapper_path {
        Some(mapper_path) => PortMapper::from_path(mapper_path)?,
        None => PortMapper::new(),
    };
    tracing::info!(
        parser = %parser_type,
        report = %path.display(),
        bytes = size,
        mapper_entries = mapper.len(),
        "Normalizing report"
    );

    let parser = parser_type.parser(Arc::new(mapper));
    let mut sink = RecordingSink::new();
    let result = ingestion::ingest(parser.as_ref(), &data, &mut sink)?;

    tracing::info!(
        hosts = result.summary.hosts,
        interfaces = result.summary.interfaces,
        services = result.summary.services,
        vulnerabilities = result.summary.vulnerabilities,
        notes = result.summary.notes,
        ignored = result.summary.ignored,
        errors = result.error_count,
        "Done"
    );
    println!("{}", serde_json::to_string_pretty(&sink.into_records())?);

    if result.malformed {
        bail!("{} could not be parsed as a {parser_type} report", path.display());
    }
    Ok(())
}

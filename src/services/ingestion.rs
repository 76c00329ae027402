//! Ingestion pipeline: parse one report and emit it to a sink.

use serde::Serialize;

use crate::errors::AppError;
use crate::parsers::Parser;
use crate::services::builder::{BuildSummary, ReportBuilder};
use crate::services::sink::Sink;

/// Summary of an ingestion run.
#[derive(Debug, Serialize)]
pub struct IngestionResult {
    pub source_tool: String,
    pub total_parsed: usize,
    /// True when the report could not be read and nothing was emitted.
    pub malformed: bool,
    #[serde(rename = "errors")]
    pub error_count: usize,
    pub error_details: Vec<IngestionError>,
    pub summary: BuildSummary,
}

/// Error during ingestion of a single record, or of the whole report when
/// `record_index` is absent.
#[derive(Debug, Serialize)]
pub struct IngestionError {
    pub record_index: Option<usize>,
    pub message: String,
}

/// Run the parser over `data` and feed the result to `sink`.
///
/// Parse problems are reported in the result; only sink failures are
/// returned as errors.
pub fn ingest<S: Sink>(
    parser: &dyn Parser,
    data: &[u8],
    sink: &mut S,
) -> Result<IngestionResult, AppError> {
    let report = parser.parse(data);
    let source_tool = report.source_tool.clone();
    let total_parsed = report.items.len();
    let malformed = report.is_malformed();
    let error_details: Vec<IngestionError> = report
        .errors
        .iter()
        .map(|e| IngestionError {
            record_index: e.record_index,
            message: e.error.to_string(),
        })
        .collect();

    let models_interfaces = report.models_interfaces;
    let summary = ReportBuilder::new(sink, models_interfaces).build(report)?;

    tracing::info!(
        source_tool = %source_tool,
        total_parsed,
        errors = error_details.len(),
        malformed,
        "Ingestion complete"
    );

    Ok(IngestionResult {
        source_tool,
        total_parsed,
        malformed,
        error_count: error_details.len(),
        error_details,
        summary,
    })
}

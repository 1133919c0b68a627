//! Validation stage: analyze the materialized edge set and persist the report.

use skintwin_hypergraph::{analyze, HypergraphAnalysisReportV1};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::store::{write_json, VesselStore};
use crate::RunContext;

/// Analyze `edges/all_edges.json` and write `database/hypergraph_analysis.json`.
///
/// The node registry is optional here; without it, unresolved references are
/// not reported. Nothing besides the report file is written.
pub fn validate_hypergraph(
    store: &VesselStore,
    config: &PipelineConfig,
    ctx: &RunContext,
) -> Result<HypergraphAnalysisReportV1> {
    let edges = store.load_edges()?;
    let registry = store.load_node_registry_if_present()?;
    let input = store.all_edges_path();

    let report = analyze(
        &edges,
        registry.as_ref(),
        &config.validator,
        &input.display().to_string(),
        &ctx.timestamp,
    );
    write_json(
        &store.database_file(&store.layout().analysis_file),
        &report,
    )?;
    Ok(report)
}

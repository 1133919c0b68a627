//! Vessel store and the file-backed pipeline stages.
//!
//! Stages, in run order:
//! 1. [`materialize::build_hypergraph`]: tables → ingredient vessels, edge
//!    files, node registry, statistics.
//! 2. [`enrich::enrich_vessels`]: product and supplier vessels from edges.
//! 3. [`formulations::update_formulations`]: formulation ingredient lists
//!    re-derived from edges.
//! 4. [`link::link_formulations`]: product → formulation edges.
//! 5. [`analysis::validate_hypergraph`]: read-only analysis report.
//!
//! Every stage after the first reads only materialized files.

pub mod analysis;
pub mod config;
pub mod enrich;
pub mod error;
pub mod formulations;
pub mod link;
pub mod materialize;
pub mod store;

pub use analysis::validate_hypergraph;
pub use config::{IdConventions, PipelineConfig, VesselLayout};
pub use enrich::{enrich_vessels, EnrichSummary};
pub use error::{Result, VesselError};
pub use formulations::{
    update_formulations, FormulationSummary, MappingMatcher, ProductMatcher, SubstringMatcher,
};
pub use link::{link_formulations, LinkSummary};
pub use materialize::{build_hypergraph, BuildOutcome, HypergraphStatisticsV1};
pub use store::{Vessel, VesselKind, VesselStore, WriteOutcome, WritePolicy};

/// Per-run values shared by every record a stage writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// RFC 3339 timestamp stamped into `created_at` and report headers.
    pub timestamp: String,
}

impl RunContext {
    pub fn now() -> Self {
        RunContext {
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn at(timestamp: impl Into<String>) -> Self {
        RunContext {
            timestamp: timestamp.into(),
        }
    }
}

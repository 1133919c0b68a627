//! SKIN-TWIN hypergraph core
//!
//! The cosmetic-product hypergraph links three node types through two
//! directed relation layers:
//!
//! ```text
//!   supplier ──SUPPLIER_PROVIDES_INGREDIENT──► ingredient
//!   ingredient ──INGREDIENT_IN_FORMULATION (concentration %)──► product
//! ```
//!
//! This crate holds the pure parts of the pipeline:
//! - [`classify`]: node classification by id prefix and ingredient merge,
//! - [`edges`]: single-pass edge processing into formulation/supply layers,
//! - [`stats`]: derived per-entity statistics (usage, tiers, portfolios),
//! - [`validate`]: the read-only validator and its analysis report.
//!
//! File I/O lives in `skintwin-vessels`.

pub mod classify;
pub mod edges;
pub mod model;
pub mod registry;
pub mod stats;
pub mod validate;

pub use classify::{classify_nodes, Classification, ClassifiedNodes, ClassifierConfig};
pub use edges::{FormulationEdge, FormulationLayer, SupplyEdge, SupplyLayer};
pub use model::{edge_id, EdgeKind, EdgeProperties, EdgeRecord, HypergraphMetadata, NodeKind, NodeRecord};
pub use registry::{NodeIndex, NodeRegistry};
pub use stats::{
    ingredient_stats, product_stats, supplier_stats, ComplexityTier, CriticalityWeights,
    IngredientStats, Population, PortfolioTier, ProductStats, SupplierStats, TopIngredient,
};
pub use validate::{analyze, HypergraphAnalysisReportV1, ValidatorConfig};

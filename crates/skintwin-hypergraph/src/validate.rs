//! Hypergraph validation and network analysis.
//!
//! Read-only over the materialized edge set:
//! - traversal smoke test (product → ingredients → suppliers),
//! - ingredient criticality ranking,
//! - supply-risk partition (single / multi / no supplier),
//! - topology metrics (counts, layer density, complexity, centrality),
//! - integrity checks (duplicate edge ids, concentration overflow,
//!   unresolved endpoints).
//!
//! Statistics are recomputed here from the edge records rather than reused
//! from the edge processor, so the report doubles as a consistency check.
//! Findings are diagnostic only; nothing here mutates its inputs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{EdgeRecord, NodeKind};
use crate::registry::NodeRegistry;
use crate::stats::CriticalityWeights;

pub const ANALYSIS_REPORT_VERSION: &str = "hypergraph_analysis_v1";

/// Above this layer density the network is reported as `dense`.
const DENSE_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Allowed excess over 100% before a product is flagged.
    pub overflow_tolerance: f64,
    /// Length of centrality and single-sourcing lists.
    pub top_n: usize,
    /// Single-sourced ingredients ranked within this many critical
    /// ingredients are raised as warnings.
    pub criticality_report_limit: usize,
    pub weights: CriticalityWeights,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            overflow_tolerance: 1.0,
            top_n: 5,
            criticality_report_limit: 10,
            weights: CriticalityWeights::default(),
        }
    }
}

// =============================================================================
// Report format
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypergraphAnalysisReportV1 {
    pub version: String,
    pub generated_at: String,
    pub input: String,
    pub traversal: TraversalCheckV1,
    pub criticality: Vec<CriticalityEntryV1>,
    pub supply_risk: SupplyRiskV1,
    pub metrics: NetworkMetricsV1,
    pub integrity: IntegrityV1,
    pub summary: AnalysisSummaryV1,
    pub findings: Vec<AnalysisFindingV1>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraversalCheckV1 {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    pub ingredient_count: usize,
    pub ingredients_with_suppliers: usize,
    pub ingredients_without_suppliers: Vec<String>,
    pub unique_suppliers: usize,
    /// Fraction of the product's ingredients with at least one supplier.
    pub coverage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalityEntryV1 {
    pub id: String,
    pub usage: u32,
    pub max_concentration: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleSourcedV1 {
    pub id: String,
    pub usage: u32,
    pub supplier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplyRiskV1 {
    pub total_ingredients: usize,
    /// Ordered by usage, most used first.
    pub single_sourced: Vec<SingleSourcedV1>,
    pub multi_sourced: Vec<String>,
    pub no_supplier: Vec<String>,
    pub single_sourced_ratio: f64,
    pub multi_sourced_ratio: f64,
    pub no_supplier_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeCountsV1 {
    pub products: usize,
    pub ingredients: usize,
    pub suppliers: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeCountsV1 {
    pub formulation: usize,
    pub supply: usize,
    pub other: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DensityV1 {
    pub formulation_layer: f64,
    pub supply_layer: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexityV1 {
    pub avg_product_ingredients: f64,
    pub min_product_ingredients: usize,
    pub max_product_ingredients: usize,
    pub avg_supplier_portfolio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedNodeV1 {
    pub id: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CentralityV1 {
    pub most_used_ingredients: Vec<RankedNodeV1>,
    pub top_suppliers: Vec<RankedNodeV1>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetricsV1 {
    pub nodes: NodeCountsV1,
    pub edges: EdgeCountsV1,
    pub density: DensityV1,
    pub complexity: ComplexityV1,
    pub centrality: CentralityV1,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverflowV1 {
    pub product_id: String,
    pub total_concentration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedRefV1 {
    pub edge_id: String,
    pub node_id: String,
    pub node_type: NodeKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrityV1 {
    pub edges_validated: usize,
    /// Ids seen more than once.
    pub duplicate_edge_ids: Vec<String>,
    /// Number of edges beyond the first for each duplicated id.
    pub duplicate_count: usize,
    pub concentration_overflows: Vec<OverflowV1>,
    /// `None` when no node registry was available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved_references: Option<Vec<UnresolvedRefV1>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummaryV1 {
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
    /// `sparse` | `dense`
    pub network_density: String,
    /// `unknown` | `low` | `moderate_single_sourcing` | `high_single_sourcing`
    pub supply_risk: String,
    /// `good` | `issues_found`
    pub data_quality: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFindingV1 {
    pub level: String, // "error" | "warning" | "info"
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

impl AnalysisFindingV1 {
    fn new(level: &str, code: &str, message: String, entity_id: Option<&str>) -> Self {
        AnalysisFindingV1 {
            level: level.to_string(),
            code: code.to_string(),
            message,
            entity_id: entity_id.map(str::to_string),
        }
    }
}

// =============================================================================
// Indexes
// =============================================================================

/// Borrowed adjacency built straight from edge records.
#[derive(Debug, Default)]
pub struct HypergraphIndex<'a> {
    pub formulation_edges: BTreeMap<&'a str, Vec<&'a EdgeRecord>>,
    pub supply_edges: BTreeMap<&'a str, Vec<&'a EdgeRecord>>,
    /// One product entry per formulation edge.
    pub ingredient_products: BTreeMap<&'a str, Vec<&'a str>>,
    pub ingredient_suppliers: BTreeMap<&'a str, BTreeSet<&'a str>>,
    pub ingredient_max_concentration: BTreeMap<&'a str, f64>,
    pub other_edges: usize,
}

impl<'a> HypergraphIndex<'a> {
    pub fn build(edges: &'a [EdgeRecord]) -> Self {
        let mut index = HypergraphIndex::default();
        for edge in edges {
            if edge.is_formulation() {
                let ingredient = edge.source_id.as_str();
                let product = edge.target_id.as_str();
                index.formulation_edges.entry(product).or_default().push(edge);
                index
                    .ingredient_products
                    .entry(ingredient)
                    .or_default()
                    .push(product);
                let max = index
                    .ingredient_max_concentration
                    .entry(ingredient)
                    .or_insert(0.0);
                *max = max.max(edge.concentration());
            } else if edge.is_supply() {
                let supplier = edge.source_id.as_str();
                let ingredient = edge.target_id.as_str();
                index.supply_edges.entry(supplier).or_default().push(edge);
                index
                    .ingredient_suppliers
                    .entry(ingredient)
                    .or_default()
                    .insert(supplier);
            } else {
                index.other_edges += 1;
            }
        }
        index
    }

    fn usage(&self, ingredient: &str) -> u32 {
        self.ingredient_products
            .get(ingredient)
            .map(|p| p.len() as u32)
            .unwrap_or(0)
    }

    fn supply_ingredient_count(&self) -> usize {
        self.ingredient_suppliers.len()
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

// =============================================================================
// Checks
// =============================================================================

/// Walk the product with the most formulation edges to its suppliers.
pub fn traversal_check(index: &HypergraphIndex<'_>) -> TraversalCheckV1 {
    let mut best: Option<(&str, &Vec<&EdgeRecord>)> = None;
    for (product, edges) in &index.formulation_edges {
        if best.map_or(true, |(_, b)| edges.len() > b.len()) {
            best = Some((*product, edges));
        }
    }
    let Some((product_id, edges)) = best else {
        return TraversalCheckV1::default();
    };

    let mut suppliers_found: BTreeSet<&str> = BTreeSet::new();
    let mut with = 0usize;
    let mut without = Vec::new();
    for edge in edges {
        match index.ingredient_suppliers.get(edge.source_id.as_str()) {
            Some(suppliers) if !suppliers.is_empty() => {
                with += 1;
                suppliers_found.extend(suppliers.iter().copied());
            }
            _ => without.push(edge.source_id.clone()),
        }
    }

    TraversalCheckV1 {
        product_id: Some(product_id.to_string()),
        ingredient_count: edges.len(),
        ingredients_with_suppliers: with,
        ingredients_without_suppliers: without,
        unique_suppliers: suppliers_found.len(),
        coverage: ratio(with, edges.len()),
    }
}

/// Rank formulation ingredients by criticality score, highest first.
pub fn criticality_ranking(
    index: &HypergraphIndex<'_>,
    weights: &CriticalityWeights,
) -> Vec<CriticalityEntryV1> {
    let mut scores: Vec<CriticalityEntryV1> = index
        .ingredient_products
        .keys()
        .map(|&id| {
            let usage = index.usage(id);
            let max_concentration = index
                .ingredient_max_concentration
                .get(id)
                .copied()
                .unwrap_or(0.0);
            CriticalityEntryV1 {
                id: id.to_string(),
                usage,
                max_concentration,
                score: weights.score(usage, max_concentration),
            }
        })
        .collect();
    scores.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    scores
}

/// Partition formulation ingredients by how many suppliers provide them.
pub fn supply_risk(index: &HypergraphIndex<'_>) -> SupplyRiskV1 {
    let mut risk = SupplyRiskV1 {
        total_ingredients: index.ingredient_products.len(),
        ..SupplyRiskV1::default()
    };
    for &id in index.ingredient_products.keys() {
        match index.ingredient_suppliers.get(id) {
            None => risk.no_supplier.push(id.to_string()),
            Some(s) if s.is_empty() => risk.no_supplier.push(id.to_string()),
            Some(s) if s.len() == 1 => risk.single_sourced.push(SingleSourcedV1 {
                id: id.to_string(),
                usage: index.usage(id),
                supplier: s.iter().next().map(|s| s.to_string()).unwrap_or_default(),
            }),
            Some(_) => risk.multi_sourced.push(id.to_string()),
        }
    }
    risk.single_sourced
        .sort_by(|a, b| b.usage.cmp(&a.usage).then_with(|| a.id.cmp(&b.id)));
    risk.single_sourced_ratio = ratio(risk.single_sourced.len(), risk.total_ingredients);
    risk.multi_sourced_ratio = ratio(risk.multi_sourced.len(), risk.total_ingredients);
    risk.no_supplier_ratio = ratio(risk.no_supplier.len(), risk.total_ingredients);
    risk
}

fn top_by_count<'a, I>(items: I, n: usize) -> Vec<RankedNodeV1>
where
    I: Iterator<Item = (&'a str, usize)>,
{
    let mut ranked: Vec<RankedNodeV1> = items
        .map(|(id, count)| RankedNodeV1 {
            id: id.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.id.cmp(&b.id)));
    ranked.truncate(n);
    ranked
}

pub fn network_metrics(index: &HypergraphIndex<'_>, top_n: usize) -> NetworkMetricsV1 {
    let products = index.formulation_edges.len();
    let ingredients = index.ingredient_products.len();
    let suppliers = index.supply_edges.len();
    let formulation: usize = index.formulation_edges.values().map(Vec::len).sum();
    let supply: usize = index.supply_edges.values().map(Vec::len).sum();

    let sizes: Vec<usize> = index.formulation_edges.values().map(Vec::len).collect();

    NetworkMetricsV1 {
        nodes: NodeCountsV1 {
            products,
            ingredients,
            suppliers,
            total: products + ingredients + suppliers,
        },
        edges: EdgeCountsV1 {
            formulation,
            supply,
            other: index.other_edges,
            total: formulation + supply + index.other_edges,
        },
        density: DensityV1 {
            formulation_layer: ratio(formulation, products * ingredients),
            supply_layer: ratio(supply, suppliers * index.supply_ingredient_count()),
        },
        complexity: ComplexityV1 {
            avg_product_ingredients: ratio(formulation, products),
            min_product_ingredients: sizes.iter().copied().min().unwrap_or(0),
            max_product_ingredients: sizes.iter().copied().max().unwrap_or(0),
            avg_supplier_portfolio: ratio(supply, suppliers),
        },
        centrality: CentralityV1 {
            most_used_ingredients: top_by_count(
                index.ingredient_products.iter().map(|(id, p)| (*id, p.len())),
                top_n,
            ),
            top_suppliers: top_by_count(
                index.supply_edges.iter().map(|(id, e)| (*id, e.len())),
                top_n,
            ),
        },
    }
}

fn unresolved_references(edges: &[EdgeRecord], nodes: &NodeRegistry) -> Vec<UnresolvedRefV1> {
    let index = nodes.index();
    let mut out = Vec::new();
    let mut check = |edge: &EdgeRecord, id: &str, kind: &NodeKind| {
        let known = match kind {
            NodeKind::Ingredient => index.ingredient(id).is_some(),
            NodeKind::Product => index.product(id).is_some(),
            NodeKind::Supplier => index.supplier(id).is_some(),
            _ => true,
        };
        if !known {
            out.push(UnresolvedRefV1 {
                edge_id: edge.id.clone(),
                node_id: id.to_string(),
                node_type: kind.clone(),
            });
        }
    };
    for edge in edges.iter().filter(|e| e.is_formulation() || e.is_supply()) {
        check(edge, &edge.source_id, &edge.source_type);
        check(edge, &edge.target_id, &edge.target_type);
    }
    out
}

pub fn integrity_check(
    edges: &[EdgeRecord],
    index: &HypergraphIndex<'_>,
    nodes: Option<&NodeRegistry>,
    overflow_tolerance: f64,
) -> IntegrityV1 {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut duplicated: BTreeSet<&str> = BTreeSet::new();
    let mut duplicate_count = 0;
    for edge in edges {
        if !seen.insert(edge.id.as_str()) {
            duplicate_count += 1;
            duplicated.insert(edge.id.as_str());
        }
    }

    let limit = 100.0 + overflow_tolerance;
    let concentration_overflows = index
        .formulation_edges
        .iter()
        .filter_map(|(product, edges)| {
            let total: f64 = edges.iter().map(|e| e.concentration()).sum();
            (total > limit).then(|| OverflowV1 {
                product_id: product.to_string(),
                total_concentration: total,
            })
        })
        .collect();

    IntegrityV1 {
        edges_validated: edges.len(),
        duplicate_edge_ids: duplicated.into_iter().map(str::to_string).collect(),
        duplicate_count,
        concentration_overflows,
        unresolved_references: nodes.map(|n| unresolved_references(edges, n)),
    }
}

// =============================================================================
// Report assembly
// =============================================================================

fn collect_findings(
    criticality: &[CriticalityEntryV1],
    risk: &SupplyRiskV1,
    integrity: &IntegrityV1,
    limit: usize,
) -> Vec<AnalysisFindingV1> {
    let mut findings = Vec::new();

    for id in &integrity.duplicate_edge_ids {
        findings.push(AnalysisFindingV1::new(
            "error",
            "duplicate_edge",
            format!("edge id `{id}` appears more than once"),
            Some(id.as_str()),
        ));
    }
    for o in &integrity.concentration_overflows {
        findings.push(AnalysisFindingV1::new(
            "error",
            "concentration_overflow",
            format!(
                "product {} has concentration overflow: {:.1}%",
                o.product_id, o.total_concentration
            ),
            Some(o.product_id.as_str()),
        ));
    }
    for r in integrity.unresolved_references.iter().flatten() {
        let level = if r.node_type == NodeKind::Ingredient {
            "warning"
        } else {
            "info"
        };
        findings.push(AnalysisFindingV1::new(
            level,
            "unresolved_node",
            format!(
                "{} `{}` referenced by edge `{}` is not a known node",
                r.node_type, r.node_id, r.edge_id
            ),
            Some(r.node_id.as_str()),
        ));
    }

    let critical: BTreeSet<&str> = criticality
        .iter()
        .take(limit)
        .map(|c| c.id.as_str())
        .collect();
    for s in risk
        .single_sourced
        .iter()
        .filter(|s| critical.contains(s.id.as_str()))
    {
        findings.push(AnalysisFindingV1::new(
            "warning",
            "single_sourced_critical_ingredient",
            format!(
                "critical ingredient {} (used {} times) has a single supplier: {}",
                s.id, s.usage, s.supplier
            ),
            Some(s.id.as_str()),
        ));
    }
    if !risk.single_sourced.is_empty() {
        findings.push(AnalysisFindingV1::new(
            "info",
            "single_sourcing",
            format!(
                "{} of {} formulation ingredients are single-sourced ({:.1}%)",
                risk.single_sourced.len(),
                risk.total_ingredients,
                risk.single_sourced_ratio * 100.0
            ),
            None,
        ));
    }
    if !risk.no_supplier.is_empty() {
        findings.push(AnalysisFindingV1::new(
            "info",
            "no_supplier_data",
            format!(
                "{} formulation ingredients have no supplier data",
                risk.no_supplier.len()
            ),
            None,
        ));
    }
    findings
}

fn summarize(
    findings: &[AnalysisFindingV1],
    metrics: &NetworkMetricsV1,
    risk: &SupplyRiskV1,
) -> AnalysisSummaryV1 {
    let mut summary = AnalysisSummaryV1::default();
    for f in findings {
        match f.level.as_str() {
            "error" => summary.error_count += 1,
            "warning" => summary.warning_count += 1,
            "info" => summary.info_count += 1,
            _ => {}
        }
    }
    let density = metrics
        .density
        .formulation_layer
        .max(metrics.density.supply_layer);
    summary.network_density = if density < DENSE_THRESHOLD {
        "sparse"
    } else {
        "dense"
    }
    .to_string();
    summary.supply_risk = if risk.total_ingredients == 0 {
        "unknown"
    } else if risk.single_sourced_ratio > 0.5 {
        "high_single_sourcing"
    } else if risk.single_sourced_ratio > 0.2 {
        "moderate_single_sourcing"
    } else {
        "low"
    }
    .to_string();
    summary.data_quality = if summary.error_count == 0 && summary.warning_count == 0 {
        "good"
    } else {
        "issues_found"
    }
    .to_string();
    summary
}

/// Run every check and assemble the consolidated report.
pub fn analyze(
    edges: &[EdgeRecord],
    nodes: Option<&NodeRegistry>,
    config: &ValidatorConfig,
    input: &str,
    generated_at: &str,
) -> HypergraphAnalysisReportV1 {
    let index = HypergraphIndex::build(edges);

    let traversal = traversal_check(&index);
    let criticality = criticality_ranking(&index, &config.weights);
    let supply_risk = supply_risk(&index);
    let metrics = network_metrics(&index, config.top_n);
    let integrity = integrity_check(edges, &index, nodes, config.overflow_tolerance);

    let findings = collect_findings(
        &criticality,
        &supply_risk,
        &integrity,
        config.criticality_report_limit,
    );
    let summary = summarize(&findings, &metrics, &supply_risk);

    tracing::info!(
        edges = edges.len(),
        errors = summary.error_count,
        warnings = summary.warning_count,
        "hypergraph analysis complete"
    );

    HypergraphAnalysisReportV1 {
        version: ANALYSIS_REPORT_VERSION.to_string(),
        generated_at: generated_at.to_string(),
        input: input.to_string(),
        traversal,
        criticality,
        supply_risk,
        metrics,
        integrity,
        summary,
        findings,
    }
}

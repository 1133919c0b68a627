//! `skintwin validate`: run the analysis and render it.

use anyhow::{anyhow, Result};
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use skintwin_hypergraph::validate::AnalysisFindingV1;
use skintwin_hypergraph::HypergraphAnalysisReportV1;
use skintwin_vessels::{validate_hypergraph, PipelineConfig, RunContext, VesselStore};

pub fn cmd_validate(
    store: &VesselStore,
    config: &PipelineConfig,
    ctx: &RunContext,
    out: Option<&PathBuf>,
    format: &str,
    fail_on_error: bool,
) -> Result<()> {
    let format = format.trim().to_ascii_lowercase();
    if !matches!(format.as_str(), "json" | "text") {
        return Err(anyhow!("unknown --format `{format}` (expected json|text)"));
    }

    let report = validate_hypergraph(store, config, ctx)?;
    let rendered = match format.as_str() {
        "json" => serde_json::to_string_pretty(&report)?,
        _ => render_report_text(&report),
    };

    match out {
        Some(path) => {
            std::fs::write(path, rendered)?;
            println!("{} {}", "wrote".green().bold(), path.display());
        }
        None => println!("{rendered}"),
    }

    if report.summary.error_count > 0 && fail_on_error {
        return Err(anyhow!(
            "hypergraph validation found {} error(s)",
            report.summary.error_count
        ));
    }
    Ok(())
}

pub fn render_report_text(r: &HypergraphAnalysisReportV1) -> String {
    let mut out = String::new();
    out.push_str("hypergraph analysis\n");
    out.push_str(&format!("  input: {}\n", r.input));
    out.push_str(&format!("  generated_at: {}\n", r.generated_at));

    let m = &r.metrics;
    out.push_str(&format!(
        "  nodes: products={} ingredients={} suppliers={}\n",
        m.nodes.products, m.nodes.ingredients, m.nodes.suppliers
    ));
    out.push_str(&format!(
        "  edges: formulation={} supply={} other={}\n",
        m.edges.formulation, m.edges.supply, m.edges.other
    ));
    out.push_str(&format!(
        "  density: formulation={:.4} supply={:.4} ({})\n",
        m.density.formulation_layer, m.density.supply_layer, r.summary.network_density
    ));
    out.push_str(&format!(
        "  complexity: ingredients/product min={} avg={:.1} max={}  portfolio avg={:.1}\n",
        m.complexity.min_product_ingredients,
        m.complexity.avg_product_ingredients,
        m.complexity.max_product_ingredients,
        m.complexity.avg_supplier_portfolio
    ));

    if let Some(product) = &r.traversal.product_id {
        out.push_str(&format!(
            "  traversal: {} → {}/{} ingredients with suppliers ({:.1}%), {} suppliers\n",
            product,
            r.traversal.ingredients_with_suppliers,
            r.traversal.ingredient_count,
            r.traversal.coverage * 100.0,
            r.traversal.unique_suppliers
        ));
    }

    let risk = &r.supply_risk;
    out.push_str(&format!(
        "  supply risk: single={:.1}% multi={:.1}% none={:.1}% ({})\n",
        risk.single_sourced_ratio * 100.0,
        risk.multi_sourced_ratio * 100.0,
        risk.no_supplier_ratio * 100.0,
        r.summary.supply_risk
    ));

    if !r.criticality.is_empty() {
        out.push_str("  most critical:\n");
        for c in r.criticality.iter().take(5) {
            out.push_str(&format!(
                "    {} score={:.2} usage={} max={:.1}%\n",
                c.id, c.score, c.usage, c.max_concentration
            ));
        }
    }

    out.push_str(&format!(
        "  summary: errors={} warnings={} infos={} quality={}\n",
        r.summary.error_count, r.summary.warning_count, r.summary.info_count, r.summary.data_quality
    ));

    if r.findings.is_empty() {
        out.push_str("  (no findings)\n");
        return out;
    }

    let mut by_level: BTreeMap<&str, Vec<&AnalysisFindingV1>> = BTreeMap::new();
    for f in &r.findings {
        by_level.entry(f.level.as_str()).or_default().push(f);
    }
    for (level, items) in by_level {
        out.push_str(&format!("\n{level}\n"));
        for f in items {
            let ctx = f
                .entity_id
                .as_deref()
                .map(|id| format!(" entity={id}"))
                .unwrap_or_default();
            out.push_str(&format!("  - {}: {}{}\n", f.code, f.message, ctx));
        }
    }
    out
}

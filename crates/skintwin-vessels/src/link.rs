//! Product → formulation links.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use skintwin_hypergraph::{edge_id, EdgeKind, EdgeProperties, EdgeRecord, NodeKind};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::store::{write_json, Vessel, VesselKind, VesselStore};
use crate::RunContext;

pub const RELATIONSHIPS_VERSION: &str = "vessel_relationships_v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductLinkV1 {
    pub product_id: String,
    pub formulation_id: String,
    pub ingredient_count: usize,
    pub total_concentration: f64,
}

/// `database/vessel_relationships.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselRelationshipsV1 {
    pub version: String,
    pub generated_at: String,
    pub total_products: usize,
    pub total_formulations: usize,
    pub total_edges: usize,
    pub links: Vec<ProductLinkV1>,
    pub unlinked_products: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSummary {
    pub linked: usize,
    pub unlinked: usize,
    /// Edges of other kinds kept in the consolidated file.
    pub preserved: usize,
}

/// Pick the formulation for a product: a declared `product_reference` wins,
/// then the conventional formulation id. First in file-name order on ties.
pub fn find_formulation<'v>(
    formulations: &'v [Vessel],
    product_id: &str,
    formulation_id: &str,
) -> Option<&'v Vessel> {
    formulations
        .iter()
        .find(|f| f.str_field("product_reference") == Some(product_id))
        .or_else(|| formulations.iter().find(|f| f.id() == Some(formulation_id)))
}

fn link_edge(prefix: &str, link: &ProductLinkV1, created_at: &str) -> EdgeRecord {
    let mut extra = Map::new();
    extra.insert(
        "ingredient_count".to_string(),
        Value::from(link.ingredient_count),
    );
    extra.insert(
        "total_concentration".to_string(),
        Value::from(link.total_concentration),
    );
    EdgeRecord {
        id: edge_id(prefix, &link.product_id, &link.formulation_id),
        kind: EdgeKind::ProductHasFormulation,
        source_id: link.product_id.clone(),
        source_type: NodeKind::Product,
        target_id: link.formulation_id.clone(),
        target_type: NodeKind::Formulation,
        properties: EdgeProperties {
            concentration: None,
            weight: None,
            created_at: Some(created_at.to_string()),
            extra,
        },
        extra: Map::new(),
    }
}

/// Regenerate `PRODUCT_HAS_FORMULATION` edges from product and formulation
/// vessels. All other edges in the consolidated file are kept as read.
pub fn link_formulations(
    store: &VesselStore,
    config: &PipelineConfig,
    ctx: &RunContext,
) -> Result<LinkSummary> {
    let previous = store.load_edges_if_present()?.unwrap_or_default();
    let products = store.load_all(VesselKind::Product)?;
    let formulations = store.load_all(VesselKind::Formulation)?;

    let mut links = Vec::new();
    let mut unlinked = Vec::new();
    for product_id in products.iter().filter_map(Vessel::id) {
        let conventional = config.ids.formulation_id_for(product_id);
        match find_formulation(&formulations, product_id, &conventional) {
            Some(f) => links.push(ProductLinkV1 {
                product_id: product_id.to_string(),
                formulation_id: f.id().unwrap_or(conventional.as_str()).to_string(),
                ingredient_count: f
                    .body
                    .get("ingredients")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len),
                total_concentration: f
                    .body
                    .get("total_concentration")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
            }),
            None => {
                tracing::debug!(id = %product_id, "no formulation vessel for product");
                unlinked.push(product_id.to_string());
            }
        }
    }

    let fresh: Vec<EdgeRecord> = links
        .iter()
        .map(|l| link_edge(&config.ids.edge_prefix, l, &ctx.timestamp))
        .collect();
    let kept: Vec<EdgeRecord> = previous
        .into_iter()
        .filter(|e| e.kind != EdgeKind::ProductHasFormulation)
        .collect();
    let summary = LinkSummary {
        linked: fresh.len(),
        unlinked: unlinked.len(),
        preserved: kept.len(),
    };

    store.write_edge_files(&fresh)?;
    let mut all_edges = kept;
    all_edges.extend(fresh);
    store.write_all_edges(&all_edges)?;

    let relationships = VesselRelationshipsV1 {
        version: RELATIONSHIPS_VERSION.to_string(),
        generated_at: ctx.timestamp.clone(),
        total_products: products.len(),
        total_formulations: formulations.len(),
        total_edges: all_edges.len(),
        links,
        unlinked_products: unlinked,
    };
    write_json(
        &store.database_file(&store.layout().relationships_file),
        &relationships,
    )?;

    tracing::info!(
        linked = summary.linked,
        unlinked = summary.unlinked,
        preserved = summary.preserved,
        "product links complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VesselLayout;
    use crate::store::read_json;
    use serde_json::json;

    #[test]
    fn links_replace_previous_links_and_keep_other_edges() {
        let dir = tempfile::tempdir().unwrap();
        let store = VesselStore::new(dir.path(), VesselLayout::default());
        let config = PipelineConfig::default();

        write_json(
            &store.dir(VesselKind::Product).join("B19PRD_Day.json"),
            &json!({"id": "B19PRD_Day"}),
        )
        .unwrap();
        write_json(
            &store.dir(VesselKind::Product).join("B19PRD_Gel.json"),
            &json!({"id": "B19PRD_Gel"}),
        )
        .unwrap();
        write_json(
            &store.dir(VesselKind::Formulation).join("B19FRM_Day.json"),
            &json!({"id": "B19FRM_Day", "ingredients": [{}, {}], "total_concentration": 99.5}),
        )
        .unwrap();

        let stale = EdgeRecord {
            kind: EdgeKind::ProductHasFormulation,
            ..EdgeRecord::formulation("B19EDG", "X", "Y", 0.0, "t0")
        };
        store
            .write_all_edges(&[
                EdgeRecord::formulation("B19EDG", "R001", "B19PRD_Day", 40.0, "t0"),
                stale,
            ])
            .unwrap();

        let summary = link_formulations(&store, &config, &RunContext::at("t1")).unwrap();
        assert_eq!(
            summary,
            LinkSummary {
                linked: 1,
                unlinked: 1,
                preserved: 1
            }
        );

        let edges = store.load_edges().unwrap();
        assert_eq!(edges.len(), 2);
        let link = edges
            .iter()
            .find(|e| e.kind == EdgeKind::ProductHasFormulation)
            .unwrap();
        assert_eq!(link.id, "B19EDG_B19PRD_Day_B19FRM_Day");
        assert_eq!(link.target_type, NodeKind::Formulation);
        assert_eq!(link.properties.extra["ingredient_count"], 2);
        assert_eq!(link.properties.extra["total_concentration"], 99.5);

        let rel: Value = read_json(&store.database_file("vessel_relationships.json")).unwrap();
        assert_eq!(rel["unlinked_products"], json!(["B19PRD_Gel"]));
        assert_eq!(rel["total_edges"], 2);
    }

    #[test]
    fn product_reference_beats_conventional_id() {
        let vessels = vec![
            Vessel {
                path: "a.json".into(),
                body: json!({"id": "B19FRM01"}).as_object().unwrap().clone(),
            },
            Vessel {
                path: "b.json".into(),
                body: json!({"id": "F-7", "product_reference": "B19PRD01"})
                    .as_object()
                    .unwrap()
                    .clone(),
            },
        ];
        let found = find_formulation(&vessels, "B19PRD01", "B19FRM01").unwrap();
        assert_eq!(found.id(), Some("F-7"));
    }
}

//! Pipeline configuration.
//!
//! Every field has a default matching the conventional `vessels/` tree, so an
//! absent config file is the normal case. A JSON file may override any subset.

use serde::{Deserialize, Serialize};
use std::path::Path;

use skintwin_hypergraph::{ClassifierConfig, ValidatorConfig};

use crate::error::{io_err, json_err, Result, VesselError};

/// Directory and file names under the vessel root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VesselLayout {
    pub sources_dir: String,
    pub ingredients_dir: String,
    pub products_dir: String,
    pub suppliers_dir: String,
    pub formulations_dir: String,
    pub edges_dir: String,
    pub database_dir: String,

    /// Product/ingredient node table (tab-separated).
    pub product_nodes_table: String,
    /// ingredient → product edge table.
    pub formulation_edges_table: String,
    /// Supplier/ingredient node table.
    pub supplier_nodes_table: String,
    /// ingredient/supplier edge table.
    pub supply_edges_table: String,

    pub all_edges_file: String,
    pub node_registry_file: String,
    pub statistics_file: String,
    pub analysis_file: String,
    pub relationships_file: String,
}

impl Default for VesselLayout {
    fn default() -> Self {
        VesselLayout {
            sources_dir: "examples".to_string(),
            ingredients_dir: "ingredients".to_string(),
            products_dir: "products".to_string(),
            suppliers_dir: "suppliers".to_string(),
            formulations_dir: "formulations".to_string(),
            edges_dir: "edges".to_string(),
            database_dir: "database".to_string(),
            product_nodes_table: "RAW-Nodes.csv".to_string(),
            formulation_edges_table: "RAW-Edges.csv".to_string(),
            supplier_nodes_table: "RSNodes.csv".to_string(),
            supply_edges_table: "RSEdges.csv".to_string(),
            all_edges_file: "all_edges.json".to_string(),
            node_registry_file: "hypergraph_nodes.json".to_string(),
            statistics_file: "hypergraph_statistics.json".to_string(),
            analysis_file: "hypergraph_analysis.json".to_string(),
            relationships_file: "vessel_relationships.json".to_string(),
        }
    }
}

/// Id prefixes used when synthesizing ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdConventions {
    pub edge_prefix: String,
    pub product_prefix: String,
    pub formulation_prefix: String,
}

impl Default for IdConventions {
    fn default() -> Self {
        IdConventions {
            edge_prefix: "B19EDG".to_string(),
            product_prefix: "B19PRD".to_string(),
            formulation_prefix: "B19FRM".to_string(),
        }
    }
}

impl IdConventions {
    /// Formulation id for a product: product prefix swapped for the
    /// formulation prefix.
    pub fn formulation_id_for(&self, product_id: &str) -> String {
        match product_id.strip_prefix(self.product_prefix.as_str()) {
            Some(rest) => format!("{}{}", self.formulation_prefix, rest),
            None => format!("{}_{}", self.formulation_prefix, product_id),
        }
    }

    /// Human-readable name derived from a product id (`B19PRD_Day_Cream` → `Day Cream`).
    pub fn display_name_for(&self, product_id: &str) -> String {
        let rest = product_id
            .strip_prefix(self.product_prefix.as_str())
            .unwrap_or(product_id);
        let name = rest.replace('_', " ").trim().to_string();
        if name.is_empty() {
            product_id.to_string()
        } else {
            name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub layout: VesselLayout,
    pub classifier: ClassifierConfig,
    pub ids: IdConventions,
    /// Fixed normalization denominator; `None` uses the classified
    /// ingredient count of the run.
    pub population_override: Option<usize>,
    pub validator: ValidatorConfig,
    /// Placeholder `location` for synthesized supplier vessels.
    pub default_supplier_location: String,
    /// Max characters of the label part of a vessel file name.
    pub label_filename_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            layout: VesselLayout::default(),
            classifier: ClassifierConfig::default(),
            ids: IdConventions::default(),
            population_override: None,
            validator: ValidatorConfig::default(),
            default_supplier_location: "South Africa".to_string(),
            label_filename_limit: 50,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VesselError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(io_err(path))?;
        let config: PipelineConfig = serde_json::from_str(&text).map_err(json_err(path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.classifier.ingredient_prefix.is_empty() {
            return Err(VesselError::Config(
                "classifier.ingredient_prefix must not be empty".to_string(),
            ));
        }
        if self.classifier.product_prefixes.iter().any(String::is_empty) {
            return Err(VesselError::Config(
                "classifier.product_prefixes must not contain empty prefixes".to_string(),
            ));
        }
        if self.population_override == Some(0) {
            return Err(VesselError::Config(
                "population_override must be positive".to_string(),
            ));
        }
        let tolerance = self.validator.overflow_tolerance;
        if tolerance.is_nan() || tolerance < 0.0 {
            return Err(VesselError::Config(
                "validator.overflow_tolerance must be non-negative".to_string(),
            ));
        }
        if self.ids.edge_prefix.is_empty() {
            return Err(VesselError::Config("ids.edge_prefix must not be empty".to_string()));
        }
        Ok(())
    }
}

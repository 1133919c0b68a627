//! Derived per-entity network statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::edges::{FormulationEdge, FormulationLayer, SupplyLayer};

/// Products with fewer ingredients than this are `simple`.
pub const SIMPLE_MAX_EXCLUSIVE: usize = 15;
/// Products with fewer ingredients than this (and not simple) are `moderate`.
pub const MODERATE_MAX_EXCLUSIVE: usize = 25;
/// Suppliers with fewer ingredients than this are `specialized`.
pub const SPECIALIZED_MAX_EXCLUSIVE: usize = 3;
/// Suppliers with fewer ingredients than this (and not specialized) are `focused`.
pub const FOCUSED_MAX_EXCLUSIVE: usize = 10;
/// Length of a product's `top_ingredients` list.
pub const TOP_INGREDIENTS: usize = 5;

/// Normalization denominator for centrality and specialization scores.
///
/// Computed once per run from the classified ingredient set unless a fixed
/// size is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Population(pub usize);

impl Population {
    pub fn resolve(ingredient_nodes: usize, override_size: Option<usize>) -> Self {
        Population(override_size.unwrap_or(ingredient_nodes))
    }

    /// `value / size`, or 0 for an empty population.
    pub fn normalize(&self, value: f64) -> f64 {
        if self.0 == 0 {
            0.0
        } else {
            value / self.0 as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    Simple,
    Moderate,
    Complex,
}

impl ComplexityTier {
    pub fn from_count(ingredient_count: usize) -> Self {
        if ingredient_count < SIMPLE_MAX_EXCLUSIVE {
            ComplexityTier::Simple
        } else if ingredient_count < MODERATE_MAX_EXCLUSIVE {
            ComplexityTier::Moderate
        } else {
            ComplexityTier::Complex
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortfolioTier {
    Specialized,
    Focused,
    Diversified,
}

impl PortfolioTier {
    pub fn from_size(portfolio_size: usize) -> Self {
        if portfolio_size < SPECIALIZED_MAX_EXCLUSIVE {
            PortfolioTier::Specialized
        } else if portfolio_size < FOCUSED_MAX_EXCLUSIVE {
            PortfolioTier::Focused
        } else {
            PortfolioTier::Diversified
        }
    }
}

/// Linear criticality weighting: `usage_weight * usage + concentration_weight * max/100`.
///
/// A tunable heuristic; the defaults are 0.6 and 0.4.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalityWeights {
    pub usage: f64,
    pub concentration: f64,
}

impl Default for CriticalityWeights {
    fn default() -> Self {
        CriticalityWeights {
            usage: 0.6,
            concentration: 0.4,
        }
    }
}

impl CriticalityWeights {
    pub fn score(&self, usage_frequency: u32, max_concentration: f64) -> f64 {
        self.usage * usage_frequency as f64 + self.concentration * (max_concentration / 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientStats {
    pub usage_frequency: u32,
    pub max_concentration: f64,
    pub suppliers: Vec<String>,
    pub centrality_score: f64,
}

pub fn ingredient_stats(
    ingredient_id: &str,
    formulations: &FormulationLayer,
    supply: &SupplyLayer,
    population: Population,
) -> IngredientStats {
    let usage_frequency = formulations.usage.get(ingredient_id).copied().unwrap_or(0);
    IngredientStats {
        usage_frequency,
        max_concentration: formulations
            .max_concentration
            .get(ingredient_id)
            .copied()
            .unwrap_or(0.0),
        suppliers: supply
            .suppliers_of
            .get(ingredient_id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default(),
        centrality_score: population.normalize(usage_frequency as f64),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopIngredient {
    pub ingredient_id: String,
    pub concentration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductStats {
    pub ingredient_count: usize,
    pub total_concentration: f64,
    pub ingredient_ids: Vec<String>,
    pub top_ingredients: Vec<TopIngredient>,
    pub complexity_tier: ComplexityTier,
    pub centrality_score: f64,
    pub formulation_density: f64,
}

/// Edges ordered by descending concentration; ties keep source order.
pub fn by_concentration_desc(edges: &[FormulationEdge]) -> Vec<&FormulationEdge> {
    let mut sorted: Vec<&FormulationEdge> = edges.iter().collect();
    sorted.sort_by(|a, b| b.concentration.total_cmp(&a.concentration));
    sorted
}

pub fn product_stats(edges: &[FormulationEdge], population: Population) -> ProductStats {
    let ingredient_count = edges.len();
    let total_concentration: f64 = edges.iter().map(|e| e.concentration).sum();

    let mut seen = BTreeSet::new();
    let ingredient_ids = edges
        .iter()
        .filter(|e| seen.insert(e.ingredient_id.as_str()))
        .map(|e| e.ingredient_id.clone())
        .collect();

    let top_ingredients = by_concentration_desc(edges)
        .into_iter()
        .take(TOP_INGREDIENTS)
        .map(|e| TopIngredient {
            ingredient_id: e.ingredient_id.clone(),
            concentration: e.concentration,
        })
        .collect();

    ProductStats {
        ingredient_count,
        total_concentration,
        ingredient_ids,
        top_ingredients,
        complexity_tier: ComplexityTier::from_count(ingredient_count),
        centrality_score: population.normalize(ingredient_count as f64),
        formulation_density: total_concentration / 100.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierStats {
    pub ingredient_count: usize,
    pub ingredient_ids: Vec<String>,
    pub specialization_index: f64,
    pub market_coverage: f64,
    pub portfolio_size_tier: PortfolioTier,
}

pub fn supplier_stats(portfolio: &BTreeSet<String>, population: Population) -> SupplierStats {
    let size = portfolio.len();
    let specialization_index = population.normalize(size as f64);
    SupplierStats {
        ingredient_count: size,
        ingredient_ids: portfolio.iter().cloned().collect(),
        specialization_index,
        market_coverage: specialization_index * 100.0,
        portfolio_size_tier: PortfolioTier::from_size(size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn edge(ingredient: &str, concentration: f64) -> FormulationEdge {
        FormulationEdge {
            ingredient_id: ingredient.to_string(),
            product_id: "B19PRD01".to_string(),
            concentration,
        }
    }

    #[test]
    fn tiers_use_fixed_thresholds() {
        assert_eq!(ComplexityTier::from_count(14), ComplexityTier::Simple);
        assert_eq!(ComplexityTier::from_count(15), ComplexityTier::Moderate);
        assert_eq!(ComplexityTier::from_count(24), ComplexityTier::Moderate);
        assert_eq!(ComplexityTier::from_count(25), ComplexityTier::Complex);
        assert_eq!(PortfolioTier::from_size(2), PortfolioTier::Specialized);
        assert_eq!(PortfolioTier::from_size(3), PortfolioTier::Focused);
        assert_eq!(PortfolioTier::from_size(10), PortfolioTier::Diversified);
    }

    #[test]
    fn simple_formulation_scenario() {
        let edges = vec![edge("R001", 40.0), edge("R002", 60.0)];
        let stats = product_stats(&edges, Population(180));
        assert_eq!(stats.ingredient_count, 2);
        assert_eq!(stats.total_concentration, 100.0);
        let top: Vec<_> = stats
            .top_ingredients
            .iter()
            .map(|t| t.ingredient_id.as_str())
            .collect();
        assert_eq!(top, ["R002", "R001"]);
        assert_eq!(stats.complexity_tier, ComplexityTier::Simple);
        assert_relative_eq!(stats.formulation_density, 1.0);
    }

    #[test]
    fn top_ingredients_are_capped() {
        let edges: Vec<_> = (0..8).map(|i| edge(&format!("R{i:03}"), i as f64)).collect();
        let stats = product_stats(&edges, Population(10));
        assert_eq!(stats.top_ingredients.len(), TOP_INGREDIENTS);
        assert_eq!(stats.top_ingredients[0].ingredient_id, "R007");
        assert_relative_eq!(stats.centrality_score, 0.8);
    }

    #[test]
    fn criticality_uses_linear_weighting() {
        let w = CriticalityWeights::default();
        assert_relative_eq!(w.score(3, 50.0), 0.6 * 3.0 + 0.4 * 0.5);
    }

    #[test]
    fn empty_population_normalizes_to_zero() {
        assert_eq!(Population(0).normalize(5.0), 0.0);
        assert_eq!(Population::resolve(40, None), Population(40));
        assert_eq!(Population::resolve(40, Some(180)), Population(180));
    }

    #[test]
    fn supplier_portfolio_stats() {
        let portfolio: BTreeSet<String> = ["R001", "R002", "R003"].iter().map(|s| s.to_string()).collect();
        let stats = supplier_stats(&portfolio, Population(100));
        assert_eq!(stats.ingredient_count, 3);
        assert_relative_eq!(stats.specialization_index, 0.03);
        assert_relative_eq!(stats.market_coverage, 3.0);
        assert_eq!(stats.portfolio_size_tier, PortfolioTier::Focused);
    }
}

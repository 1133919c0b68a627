//! SKIN-TWIN CLI
//!
//! One subcommand per batch stage over a vessel tree:
//! - `build`: classify nodes, process edges, materialize ingredient vessels,
//!   edge files, node registry and statistics
//! - `enrich`: product and supplier vessels
//! - `formulations`: formulation ingredient lists
//! - `link`: product → formulation edges
//! - `validate`: analysis report
//! - `run`: all of the above, in order

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use skintwin_vessels::{
    build_hypergraph, enrich_vessels, link_formulations, update_formulations, BuildOutcome,
    EnrichSummary, FormulationSummary, LinkSummary, MappingMatcher, PipelineConfig,
    ProductMatcher, RunContext, SubstringMatcher, VesselStore,
};

mod report;

#[derive(Parser)]
#[command(name = "skintwin")]
#[command(author, version, about = "SKIN-TWIN cosmetic hypergraph pipeline")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Vessel tree root.
    #[arg(long, global = true, env = "SKINTWIN_VESSELS_DIR", default_value = "vessels")]
    root: PathBuf,
    /// Pipeline config (JSON); built-in defaults when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct FormulationArgs {
    /// JSON object mapping formulation references to product ids. Replaces
    /// the substring matcher.
    #[arg(long)]
    mapping: Option<PathBuf>,
}

#[derive(Args)]
struct ValidateArgs {
    /// Output report path (defaults to stdout).
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// Output format: json|text
    #[arg(long, default_value = "text")]
    format: String,
    /// Exit non-zero when the report contains errors.
    #[arg(long)]
    fail_on_error: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Materialize the hypergraph from the source tables.
    Build,
    /// Merge derived statistics into product and supplier vessels.
    Enrich,
    /// Re-derive formulation vessels from formulation edges.
    Formulations(FormulationArgs),
    /// Emit product → formulation edges.
    Link,
    /// Analyze the materialized hypergraph (read-only).
    Validate(ValidateArgs),
    /// Run every stage in order.
    Run {
        #[command(flatten)]
        formulations: FormulationArgs,
        #[command(flatten)]
        validate: ValidateArgs,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn matcher_for(args: &FormulationArgs) -> Result<Box<dyn ProductMatcher>> {
    match &args.mapping {
        Some(path) => {
            let matcher = MappingMatcher::load(path)
                .with_context(|| format!("loading mapping {}", path.display()))?;
            Ok(Box::new(matcher))
        }
        None => Ok(Box::new(SubstringMatcher)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(cli.global.config.as_ref())?;
    let store = VesselStore::new(&cli.global.root, config.layout.clone());
    let ctx = RunContext::now();
    tracing::debug!(
        root = %store.root().display(),
        timestamp = %ctx.timestamp,
        "vessel store opened"
    );

    match cli.command {
        Commands::Build => cmd_build(&store, &config, &ctx)?,
        Commands::Enrich => cmd_enrich(&store, &config, &ctx)?,
        Commands::Formulations(args) => cmd_formulations(&store, &config, &args)?,
        Commands::Link => cmd_link(&store, &config, &ctx)?,
        Commands::Validate(args) => report::cmd_validate(
            &store,
            &config,
            &ctx,
            args.out.as_ref(),
            &args.format,
            args.fail_on_error,
        )?,
        Commands::Run {
            formulations,
            validate,
        } => {
            cmd_build(&store, &config, &ctx)?;
            cmd_enrich(&store, &config, &ctx)?;
            cmd_formulations(&store, &config, &formulations)?;
            cmd_link(&store, &config, &ctx)?;
            report::cmd_validate(
                &store,
                &config,
                &ctx,
                validate.out.as_ref(),
                &validate.format,
                validate.fail_on_error,
            )?;
        }
    }
    Ok(())
}

fn cmd_build(store: &VesselStore, config: &PipelineConfig, ctx: &RunContext) -> Result<()> {
    println!(
        "{} hypergraph from {}",
        "Building".green().bold(),
        store.root().join(&store.layout().sources_dir).display()
    );
    let BuildOutcome {
        ingredients_created,
        ingredients_skipped,
        edges_written,
        statistics,
    } = build_hypergraph(store, config, ctx).context("build stage failed")?;

    println!(
        "  {} {} products, {} ingredients, {} suppliers ({} discarded)",
        "→".cyan(),
        statistics.nodes.products,
        statistics.nodes.ingredients,
        statistics.nodes.suppliers,
        statistics.nodes.discarded
    );
    println!(
        "  {} {} ingredient vessels created, {} existing kept",
        "→".cyan(),
        ingredients_created,
        ingredients_skipped
    );
    println!(
        "  {} {} edges written ({} formulation, {} supply, {} preserved)",
        "→".cyan(),
        edges_written,
        statistics.edges.formulation,
        statistics.edges.supply,
        statistics.edges.preserved
    );
    if !statistics.unresolved_ingredients.is_empty() {
        println!(
            "  {} {} edge ingredients missing from the node tables",
            "→".yellow(),
            statistics.unresolved_ingredients.len()
        );
    }
    Ok(())
}

fn cmd_enrich(store: &VesselStore, config: &PipelineConfig, ctx: &RunContext) -> Result<()> {
    println!("{} product and supplier vessels", "Enriching".green().bold());
    let EnrichSummary {
        products_created,
        products_merged,
        suppliers_created,
        suppliers_merged,
    } = enrich_vessels(store, config, ctx).context("enrich stage failed")?;
    println!(
        "  {} products: {} created, {} enriched",
        "→".cyan(),
        products_created,
        products_merged
    );
    println!(
        "  {} suppliers: {} created, {} enriched",
        "→".cyan(),
        suppliers_created,
        suppliers_merged
    );
    Ok(())
}

fn cmd_formulations(
    store: &VesselStore,
    config: &PipelineConfig,
    args: &FormulationArgs,
) -> Result<()> {
    println!("{} formulation vessels", "Updating".green().bold());
    let matcher = matcher_for(args)?;
    let FormulationSummary {
        updated,
        created,
        unmatched,
    } = update_formulations(store, config, matcher.as_ref())
        .context("formulation stage failed")?;
    println!(
        "  {} {} updated, {} created",
        "→".cyan(),
        updated,
        created
    );
    if !unmatched.is_empty() {
        println!(
            "  {} {} formulation vessels matched no product edges",
            "→".yellow(),
            unmatched.len()
        );
    }
    Ok(())
}

fn cmd_link(store: &VesselStore, config: &PipelineConfig, ctx: &RunContext) -> Result<()> {
    println!("{} products to formulations", "Linking".green().bold());
    let LinkSummary {
        linked,
        unlinked,
        preserved,
    } = link_formulations(store, config, ctx).context("link stage failed")?;
    println!(
        "  {} {} linked, {} without formulation, {} other edges kept",
        "→".cyan(),
        linked,
        unlinked,
        preserved
    );
    Ok(())
}

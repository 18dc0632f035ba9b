//! Hierarchy Strategy CLI
//!
//! Loads a hierarchy, optimizes contributions level by level and forecasts
//! root revenue with Monte Carlo runs.

use anyhow::{Context, Result};
use clap::Parser;
use hierarchy_strategy::{
    snapshot, write_snapshot_csv, DistributionSummary, ForecastConfig, ForecastResult, NodeSnapshot,
    ObjectiveWeights, StepUnit, StrategyRunner, TailRisk,
};
use serde_json::json;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "hierarchy-strategy")]
#[command(about = "Optimize contributions across a business hierarchy and forecast revenue")]
struct Args {
    /// Hierarchy description (JSON)
    #[arg(long, default_value = "data/acme.json")]
    hierarchy: PathBuf,

    /// Objective weights (JSON with any of alpha, beta, gamma, delta)
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Revenue weight (overrides the weights file)
    #[arg(long)]
    alpha: Option<f64>,

    /// Margin weight
    #[arg(long)]
    beta: Option<f64>,

    /// Growth-spread weight
    #[arg(long)]
    gamma: Option<f64>,

    /// Volatility penalty
    #[arg(long)]
    delta: Option<f64>,

    /// Forecast steps
    #[arg(long, default_value_t = 5)]
    years: u32,

    /// Depth of the units whose revenue is walked (root = 0)
    #[arg(long, default_value_t = 5)]
    target_layer: usize,

    /// Number of Monte Carlo runs
    #[arg(long, default_value_t = 100)]
    runs: usize,

    /// Base seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Step monthly instead of annually
    #[arg(long)]
    monthly: bool,

    /// Disable the end-of-walk tail shock
    #[arg(long)]
    no_tail_risk: bool,

    /// Forecast every horizon from 1 to --years
    #[arg(long)]
    horizons: bool,

    /// Write the optimized tree as CSV
    #[arg(long)]
    snapshot_csv: Option<PathBuf>,

    /// Print a JSON response instead of tables
    #[arg(long)]
    json: bool,
}

impl Args {
    fn objective_weights(&self) -> Result<ObjectiveWeights> {
        let mut weights = match &self.weights {
            Some(path) => {
                let file = File::open(path).with_context(|| format!("opening weights {}", path.display()))?;
                serde_json::from_reader(file).with_context(|| format!("parsing weights {}", path.display()))?
            }
            None => ObjectiveWeights::default(),
        };
        if let Some(alpha) = self.alpha {
            weights.alpha = alpha;
        }
        if let Some(beta) = self.beta {
            weights.beta = beta;
        }
        if let Some(gamma) = self.gamma {
            weights.gamma = gamma;
        }
        if let Some(delta) = self.delta {
            weights.delta = delta;
        }
        Ok(weights)
    }

    fn forecast_config(&self) -> ForecastConfig {
        ForecastConfig {
            years: self.years,
            target_layer: self.target_layer,
            runs: self.runs,
            step: if self.monthly { StepUnit::Monthly } else { StepUnit::Annual },
            tail_risk: if self.no_tail_risk {
                TailRisk::disabled()
            } else {
                TailRisk::default()
            },
            seed: self.seed,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let start = Instant::now();
    let runner = StrategyRunner::from_path(&args.hierarchy)
        .with_context(|| format!("loading hierarchy {}", args.hierarchy.display()))?;
    let weights = args.objective_weights()?;
    let mut config = args.forecast_config();
    // one seed shared by every horizon so the sweep is comparable
    config.seed = Some(config.seed.unwrap_or_else(rand::random));

    let optimized = runner.optimize(&weights).context("optimizing contributions")?;
    let rows = snapshot(&optimized.tree);

    if let Some(path) = &args.snapshot_csv {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        write_snapshot_csv(&rows, BufWriter::new(file))
            .with_context(|| format!("writing snapshot {}", path.display()))?;
    }

    let forecasts = if args.horizons {
        runner.forecast_horizons(&optimized.tree, &config)?
    } else {
        vec![runner.forecast(&optimized.tree, config.clone())?]
    };

    if args.json {
        let response = json!({
            "weights": weights,
            "optimization": {
                "levels_solved": optimized.report.levels_solved,
                "single_child_levels": optimized.report.single_child_levels,
                "fallbacks": optimized.report.fallbacks.iter().map(|f| &f.unit).collect::<Vec<_>>(),
            },
            "tree": rows,
            "forecasts": forecasts.iter().map(forecast_json).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("Hierarchy Strategy v0.1.0");
    println!("=========================\n");
    println!("Hierarchy: {}", args.hierarchy.display());
    println!(
        "  Units: {} ({} leaves), depth {}",
        optimized.tree.node_count(),
        optimized.tree.leaf_count(),
        optimized.tree.depth()
    );
    println!(
        "  Weights: alpha={:.2} beta={:.2} gamma={:.2} delta={:.2}",
        weights.alpha, weights.beta, weights.gamma, weights.delta
    );
    println!(
        "  Levels solved: {}, single-child: {}, fallbacks: {}",
        optimized.report.levels_solved,
        optimized.report.single_child_levels,
        optimized.report.fallbacks.len()
    );
    for fallback in &optimized.report.fallbacks {
        println!("    kept seed at '{}': {:?}", fallback.unit, fallback.reason);
    }
    println!();

    print_tree(&rows);
    println!();

    for result in &forecasts {
        print_forecast(result);
    }

    println!("Completed in {:?}", start.elapsed());
    Ok(())
}

fn forecast_json(result: &ForecastResult) -> serde_json::Value {
    json!({
        "years": result.years,
        "target_layer": result.target_layer,
        "base_seed": result.base_seed,
        "perturbed_units": result.perturbed_units,
        "revenue": result.revenue_summary(),
        "margin_dollars": result.margin_dollars_summary(),
        "runs": result.runs,
    })
}

fn print_tree(rows: &[NodeSnapshot]) {
    println!(
        "{:>4} {:>6} {:>5} {:<28} {:>12} {:>8} {:>8} {:>8} {:>8}",
        "Id", "Parent", "Level", "Unit", "Revenue", "Margin", "Contrib", "MinC", "MaxC"
    );
    println!("{}", "-".repeat(95));
    for row in rows {
        let parent = row.parent_id.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "{:>4} {:>6} {:>5} {:<28} {:>12.4} {:>8.4} {:>8.4} {:>8.4} {:>8.4}",
            row.id,
            parent,
            row.level,
            row.name,
            row.revenue,
            row.margin,
            row.contribution,
            row.min_contribution,
            row.max_contribution
        );
    }
}

fn print_forecast(result: &ForecastResult) {
    println!(
        "Forecast: {} steps, layer {} ({} units), {} runs, seed {}",
        result.years,
        result.target_layer,
        result.perturbed_units,
        result.runs.len(),
        result.base_seed
    );
    if let Some(summary) = result.revenue_summary() {
        print_summary("Revenue", &summary);
    }
    if let Some(summary) = result.margin_dollars_summary() {
        print_summary("Margin $", &summary);
    }
    println!();
}

fn print_summary(label: &str, summary: &DistributionSummary) {
    println!(
        "  {:<9} mean {:>10.4}  sd {:>8.4}  p5 {:>10.4}  median {:>10.4}  p95 {:>10.4}",
        label, summary.mean, summary.std_dev, summary.p5, summary.median, summary.p95
    );
}

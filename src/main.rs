//! emiMeter
//!
//! Logistics emissions calculator comparing a baseline scenario with an
//! optimized one (EV adoption, distance reduction, cargo load factor).

mod calculator;
mod db;
mod error;
mod factors;
mod logging;
mod models;
mod sheet;

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use crate::calculator::AdjustmentLever;
use crate::models::{CategoryShare, ScenarioComparison};
use crate::sheet::ActivitySheet;

#[derive(Parser)]
#[command(name = "emimeter")]
#[command(about = "Estimate yearly CO2e emissions and compare baseline vs optimized scenarios")]
struct Cli {
    /// Path to the SQLite evaluation ledger
    #[arg(short, long, env = "EMIMETER_DB", default_value = "emimeter.db")]
    database: PathBuf,

    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    verbose_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct AdjustmentArgs {
    /// Share of the car fleet that is electric, in percent
    #[arg(long, value_name = "PERCENT")]
    ev_share: Option<f64>,

    /// Reduction in car distance, in percent
    #[arg(long, value_name = "PERCENT")]
    km_reduction: Option<f64>,

    /// Cargo plane load factor, in percent
    #[arg(long, value_name = "PERCENT")]
    load_factor: Option<f64>,
}

#[derive(Args, Debug)]
struct SheetArgs {
    /// Activity sheet (`.sheet` text or `.json`)
    sheet: Option<PathBuf>,

    /// Use the built-in sample activity instead of a sheet
    #[arg(long, conflicts_with = "sheet")]
    sample: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the emission factor table
    Factors,

    /// Print the sample activity sheet
    Sample {
        /// Print as JSON instead of the text sheet format
        #[arg(long)]
        json: bool,
    },

    /// Calculate baseline and optimized emissions for one activity sheet
    Calc {
        #[command(flatten)]
        input: SheetArgs,

        #[command(flatten)]
        adjustments: AdjustmentArgs,

        /// Show per-category tables for both scenarios
        #[arg(short, long)]
        verbose: bool,

        /// Print the comparison as JSON
        #[arg(long)]
        json: bool,

        /// Save the evaluation to the ledger
        #[arg(long)]
        save: bool,

        /// Label stored with a saved evaluation
        #[arg(long, requires = "save")]
        label: Option<String>,
    },

    /// Evaluate every sheet below a directory
    Batch {
        /// Directory to scan for `.sheet` and `.json` files
        dir: PathBuf,

        #[command(flatten)]
        adjustments: AdjustmentArgs,

        /// Save each evaluation to the ledger
        #[arg(long)]
        save: bool,
    },

    /// What-if analysis: step one adjustment from 0 to 100 percent
    Sweep {
        #[command(flatten)]
        input: SheetArgs,

        #[command(flatten)]
        adjustments: AdjustmentArgs,

        /// Adjustment to vary
        #[arg(short, long, value_enum)]
        param: AdjustmentLever,

        /// Step size in percent
        #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=100))]
        step: u32,

        /// Print the sweep as JSON
        #[arg(long)]
        json: bool,
    },

    /// Initialize an empty ledger
    Init,

    /// List saved evaluations
    History {
        /// Maximum number of evaluations to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show a saved evaluation
    Show {
        /// Evaluation ID
        id: i64,
    },

    /// Delete all saved evaluations
    Clear,
}

#[derive(Serialize)]
struct CalcOutput<'a> {
    name: Option<&'a str>,
    source: Option<String>,
    comparison: &'a ScenarioComparison,
    reduction_tons: f64,
    reduction_percent: f64,
    optimized_shares: Vec<CategoryShare>,
}

#[derive(Serialize)]
struct SweepOutput<'a> {
    param: AdjustmentLever,
    adjustments: &'a models::AdjustmentParameters,
    points: &'a [calculator::SweepPoint],
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose_log)?;

    match cli.command {
        Commands::Factors => {
            println!("{:<18} {:>12} {:>8}", "Category", "kg CO2e", "per");
            println!("{}", "-".repeat(40));
            for entry in factors::factor_table() {
                println!(
                    "{:<18} {:>12.2} {:>8}",
                    entry.category.label(),
                    entry.kg_per_unit,
                    entry.unit.symbol()
                );
            }
            println!(
                "{:<18} {:>12} {:>8}",
                models::EmissionCategory::Subcontractors.label(),
                "direct",
                models::ActivityUnit::TonsCo2e.symbol()
            );
        }

        Commands::Sample { json } => {
            let sample = ActivitySheet::sample();
            if json {
                println!("{}", serde_json::to_string_pretty(&sample)?);
            } else {
                print!("{}", sheet::render_sheet(&sample));
            }
        }

        Commands::Calc {
            input,
            adjustments,
            verbose,
            json,
            save,
            label,
        } => {
            let activity_sheet = resolve_sheet(&input, &adjustments)?;
            let comparison =
                calculator::compare_scenarios(&activity_sheet.activity, &activity_sheet.adjustments);
            let source = input.sheet.as_deref().map(|p| p.display().to_string());

            if json {
                let output = CalcOutput {
                    name: activity_sheet.name.as_deref(),
                    source: source.clone(),
                    comparison: &comparison,
                    reduction_tons: comparison.reduction_tons(),
                    reduction_percent: comparison.reduction_percent(),
                    optimized_shares: comparison.optimized.shares(),
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                if let Some(name) = &activity_sheet.name {
                    println!("{}\n", name);
                }
                if verbose {
                    println!("Baseline:\n");
                    println!("{}", calculator::format_report(&comparison.baseline));
                    println!("Optimized:\n");
                    println!("{}", calculator::format_report(&comparison.optimized));
                }
                println!("{}", comparison);
            }

            if save {
                let mut conn = db::open(&cli.database)?;
                let label = label.as_deref().or(activity_sheet.name.as_deref());
                let id = db::insert_evaluation(&mut conn, &comparison, label, source.as_deref())?;
                if !json {
                    println!("Saved as evaluation #{}", id);
                }
            }
        }

        Commands::Batch {
            dir,
            adjustments,
            save,
        } => {
            let mut conn = if save {
                Some(db::open(&cli.database)?)
            } else {
                None
            };
            let stats = run_batch(&dir, &adjustments, conn.as_mut())?;
            println!("\n{}", stats);
        }

        Commands::Sweep {
            input,
            adjustments,
            param,
            step,
            json,
        } => {
            let activity_sheet = resolve_sheet(&input, &adjustments)?;
            let points = calculator::sweep(
                &activity_sheet.activity,
                &activity_sheet.adjustments,
                param,
                step,
            );

            if json {
                let output = SweepOutput {
                    param,
                    adjustments: &activity_sheet.adjustments,
                    points: &points,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
                return Ok(());
            }

            println!("{:>16} {:>16} {:>14}", param.label(), "Optimized tCO2e", "Reduction");
            println!("{}", "-".repeat(48));
            for point in points {
                println!(
                    "{:>16.0} {:>16.2} {:>14.2}",
                    point.percent, point.optimized_total, point.reduction_tons
                );
            }
        }

        Commands::Init => {
            db::open(&cli.database)?;
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::History { limit } => {
            let conn = db::open(&cli.database)?;
            let records = db::list_evaluations(&conn, limit)?;
            if records.is_empty() {
                println!("No saved evaluations. Run 'calc --save' first.");
            } else {
                println!(
                    "{:>5} {:<20} {:<24} {:>12} {:>12}",
                    "ID", "Created", "Label", "Baseline", "Optimized"
                );
                println!("{}", "-".repeat(77));
                for r in records {
                    println!(
                        "{:>5} {:<20} {:<24} {:>12.2} {:>12.2}",
                        r.id,
                        r.created_at,
                        r.label.as_deref().unwrap_or("-"),
                        r.baseline_total,
                        r.optimized_total
                    );
                }
            }
        }

        Commands::Show { id } => {
            let conn = db::open(&cli.database)?;
            match db::get_evaluation(&conn, id)? {
                Some(record) => {
                    println!("Evaluation #{}", record.id);
                    println!("  Created: {}", record.created_at);
                    if let Some(label) = &record.label {
                        println!("  Label: {}", label);
                    }
                    if let Some(source) = &record.source {
                        println!("  Source: {}", source);
                    }
                    println!(
                        "  Adjustments: EV share {}%, KM reduction {}%, load factor {}%",
                        record.ev_share_percent,
                        record.km_reduction_percent,
                        record.load_factor_percent
                    );
                    println!();

                    let baseline = db::get_evaluation_report(&conn, id, db::Scenario::Baseline)?;
                    let optimized = db::get_evaluation_report(&conn, id, db::Scenario::Optimized)?;
                    println!("Baseline:\n");
                    println!("{}", calculator::format_report(&baseline));
                    println!("Optimized:\n");
                    println!("{}", calculator::format_report(&optimized));
                }
                None => bail!("Evaluation #{} not found", id),
            }
        }

        Commands::Clear => {
            let conn = db::open(&cli.database)?;
            let removed = db::clear_evaluations(&conn)?;
            println!("Removed {} saved evaluations", removed);
        }
    }

    Ok(())
}

/// Load the activity snapshot and apply adjustment flags on top of the sheet's values
fn resolve_sheet(input: &SheetArgs, overrides: &AdjustmentArgs) -> Result<ActivitySheet> {
    let mut activity_sheet = match (&input.sheet, input.sample) {
        (Some(path), _) => sheet::load_sheet(path)?,
        (None, true) => ActivitySheet::sample(),
        (None, false) => bail!("No activity sheet given. Pass a sheet path or --sample."),
    };

    apply_overrides(&mut activity_sheet, overrides)?;
    Ok(activity_sheet)
}

fn apply_overrides(activity_sheet: &mut ActivitySheet, overrides: &AdjustmentArgs) -> Result<()> {
    let adj = &mut activity_sheet.adjustments;
    if let Some(v) = overrides.ev_share {
        adj.ev_share_percent = v;
    }
    if let Some(v) = overrides.km_reduction {
        adj.km_reduction_percent = v;
    }
    if let Some(v) = overrides.load_factor {
        adj.load_factor_percent = v;
    }
    adj.validate()?;
    Ok(())
}

#[derive(Debug, Default)]
struct BatchStats {
    evaluated: usize,
    failed: usize,
    baseline_total: f64,
    optimized_total: f64,
}

impl std::fmt::Display for BatchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Evaluated {} sheets (baseline {:.2} t, optimized {:.2} t). Failed: {}",
            self.evaluated, self.baseline_total, self.optimized_total, self.failed
        )
    }
}

fn run_batch(
    dir: &Path,
    overrides: &AdjustmentArgs,
    mut conn: Option<&mut rusqlite::Connection>,
) -> Result<BatchStats> {
    let mut stats = BatchStats::default();

    println!("Scanning {} for activity sheets...", dir.display());
    let files = sheet::find_sheet_files(dir)?;
    println!("Found {} sheets", files.len());

    for path in &files {
        let evaluated = sheet::load_sheet(path).and_then(|mut s| {
            apply_overrides(&mut s, overrides)?;
            Ok(s)
        });

        match evaluated {
            Ok(activity_sheet) => {
                let comparison = calculator::compare_scenarios(
                    &activity_sheet.activity,
                    &activity_sheet.adjustments,
                );
                let source = path.display().to_string();

                if let Some(conn) = conn.as_deref_mut() {
                    db::insert_evaluation(
                        conn,
                        &comparison,
                        activity_sheet.name.as_deref(),
                        Some(&source),
                    )?;
                }

                println!(
                    "  {}: baseline {:.2} t, optimized {:.2} t ({:.1}% lower)",
                    source,
                    comparison.baseline.total_tons_co2e,
                    comparison.optimized.total_tons_co2e,
                    comparison.reduction_percent()
                );
                stats.evaluated += 1;
                stats.baseline_total += comparison.baseline.total_tons_co2e;
                stats.optimized_total += comparison.optimized.total_tons_co2e;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "sheet rejected");
                eprintln!("  Error in {}: {:#}", path.display(), e);
                stats.failed += 1;
            }
        }
    }

    info!(evaluated = stats.evaluated, failed = stats.failed, "batch finished");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AdjustmentParameters;

    #[test]
    fn test_overrides_replace_only_given_fields() {
        let mut activity_sheet = ActivitySheet::sample();
        let overrides = AdjustmentArgs {
            load_factor: Some(60.0),
            ..AdjustmentArgs::default()
        };
        apply_overrides(&mut activity_sheet, &overrides).unwrap();
        assert_eq!(
            activity_sheet.adjustments,
            AdjustmentParameters {
                ev_share_percent: 30.0,
                km_reduction_percent: 10.0,
                load_factor_percent: 60.0,
            }
        );
    }

    #[test]
    fn test_out_of_range_override_rejected() {
        let mut activity_sheet = ActivitySheet::sample();
        let overrides = AdjustmentArgs {
            km_reduction: Some(101.0),
            ..AdjustmentArgs::default()
        };
        assert!(apply_overrides(&mut activity_sheet, &overrides).is_err());
    }

    #[test]
    fn test_resolve_requires_input() {
        let input = SheetArgs {
            sheet: None,
            sample: false,
        };
        assert!(resolve_sheet(&input, &AdjustmentArgs::default()).is_err());
    }

    #[test]
    fn test_batch_counts_failures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("good.sheet"),
            sheet::render_sheet(&ActivitySheet::sample()),
        )
        .unwrap();
        std::fs::write(dir.path().join("bad.sheet"), "cars_km = -1\n").unwrap();

        let stats = run_batch(dir.path(), &AdjustmentArgs::default(), None).unwrap();
        assert_eq!(stats.evaluated, 1);
        assert_eq!(stats.failed, 1);
        assert!((stats.baseline_total - 4285.2).abs() < 1e-6);
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

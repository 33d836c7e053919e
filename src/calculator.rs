//! Emissions calculation logic

use std::fmt;

use clap::ValueEnum;
use serde::Serialize;
use tracing::{debug, trace};

use crate::factors::{self, EV_MITIGATION, KG_PER_TON};
use crate::models::{
    ActivityData, AdjustmentParameters, CategoryReportRow, EmissionCategory, EmissionsReport,
    ScenarioComparison,
};

/// Emissions of one category in tons CO2e
///
/// Inputs are assumed validated; percentages outside 0..=100 are not clamped.
pub fn compute_category(
    category: EmissionCategory,
    activity: &ActivityData,
    adjustments: &AdjustmentParameters,
) -> f64 {
    let tons = match category {
        EmissionCategory::Cars => {
            let ev = 1.0 - EV_MITIGATION * adjustments.ev_share_percent / 100.0;
            let distance = 1.0 - adjustments.km_reduction_percent / 100.0;
            kg(category, activity.cars_km) * ev * distance / KG_PER_TON
        }
        EmissionCategory::CargoPlanes => {
            let load = adjustments.load_factor_percent / 100.0;
            kg(category, activity.plane_hours) * load / KG_PER_TON
        }
        EmissionCategory::Trucks
        | EmissionCategory::Buses
        | EmissionCategory::Forklifts
        | EmissionCategory::OfficeLighting
        | EmissionCategory::Heating
        | EmissionCategory::Cooling
        | EmissionCategory::Computing => {
            kg(category, activity.input_value(category)) / KG_PER_TON
        }
        // Reported by third parties, already in tons
        EmissionCategory::Subcontractors => activity.subcontractor_total(),
    };
    trace!(category = category.key(), tons, "category computed");
    tons
}

fn kg(category: EmissionCategory, activity_value: f64) -> f64 {
    activity_value * factors::factor(category).unwrap_or_default()
}

/// Compute every category in report order and total them
pub fn build_report(activity: &ActivityData, adjustments: &AdjustmentParameters) -> EmissionsReport {
    let rows: Vec<CategoryReportRow> = EmissionCategory::ALL
        .into_iter()
        .map(|category| CategoryReportRow {
            category,
            activity_value: activity.input_value(category),
            emissions_tons: compute_category(category, activity, adjustments),
        })
        .collect();

    let total_tons_co2e = rows.iter().map(|r| r.emissions_tons).sum();
    debug!(total_tons_co2e, ?adjustments, "report built");

    EmissionsReport {
        rows,
        total_tons_co2e,
    }
}

/// Baseline (neutral adjustments) and optimized reports over the same activity
pub fn compare_scenarios(
    activity: &ActivityData,
    optimized: &AdjustmentParameters,
) -> ScenarioComparison {
    ScenarioComparison {
        adjustments: *optimized,
        baseline: build_report(activity, &AdjustmentParameters::baseline()),
        optimized: build_report(activity, optimized),
    }
}

/// Adjustment varied by a what-if sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AdjustmentLever {
    EvShare,
    KmReduction,
    LoadFactor,
}

impl AdjustmentLever {
    pub fn label(self) -> &'static str {
        match self {
            AdjustmentLever::EvShare => "EV share (%)",
            AdjustmentLever::KmReduction => "KM reduction (%)",
            AdjustmentLever::LoadFactor => "Load factor (%)",
        }
    }

    fn apply(self, adjustments: &AdjustmentParameters, percent: f64) -> AdjustmentParameters {
        let mut adjusted = *adjustments;
        match self {
            AdjustmentLever::EvShare => adjusted.ev_share_percent = percent,
            AdjustmentLever::KmReduction => adjusted.km_reduction_percent = percent,
            AdjustmentLever::LoadFactor => adjusted.load_factor_percent = percent,
        }
        adjusted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepPoint {
    pub percent: f64,
    pub optimized_total: f64,
    pub reduction_tons: f64,
}

/// Optimized totals with one lever stepped from 0 to 100 percent
///
/// `step` is clamped to at least 1. The final point is always 100.
pub fn sweep(
    activity: &ActivityData,
    adjustments: &AdjustmentParameters,
    lever: AdjustmentLever,
    step: u32,
) -> Vec<SweepPoint> {
    let baseline = build_report(activity, &AdjustmentParameters::baseline()).total_tons_co2e;
    let step = step.max(1);

    let mut percents: Vec<u32> = (0..=100).step_by(step as usize).collect();
    if percents.last() != Some(&100) {
        percents.push(100);
    }

    percents
        .into_iter()
        .map(|p| {
            let percent = f64::from(p);
            let adjusted = lever.apply(adjustments, percent);
            let optimized_total = build_report(activity, &adjusted).total_tons_co2e;
            SweepPoint {
                percent,
                optimized_total,
                reduction_tons: baseline - optimized_total,
            }
        })
        .collect()
}

/// Format a report as a table
pub fn format_report(report: &EmissionsReport) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{:<18} {:>16} {:>8} {:>14} {:>8}\n",
        "Category", "Activity", "Unit", "tCO2e", "Share"
    ));
    output.push_str(&format!("{}\n", "-".repeat(68)));

    for row in &report.rows {
        let share = if report.total_tons_co2e > 0.0 {
            row.emissions_tons / report.total_tons_co2e * 100.0
        } else {
            0.0
        };
        output.push_str(&format!(
            "{:<18} {:>16.2} {:>8} {:>14.3} {:>7.1}%\n",
            row.category.label(),
            row.activity_value,
            row.category.unit().symbol(),
            row.emissions_tons,
            share
        ));
    }

    output.push_str(&format!("{}\n", "-".repeat(68)));
    output.push_str(&format!(
        "{:<18} {:>16} {:>8} {:>14.2}\n",
        "Total", "", "", report.total_tons_co2e
    ));
    output
}

impl fmt::Display for ScenarioComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Emissions Summary (tons CO2e) ===")?;
        if self.adjustments.is_neutral() {
            writeln!(f, "Adjustments: none (optimized equals baseline)")?;
        } else {
            writeln!(
                f,
                "Adjustments: EV share {}%, KM reduction {}%, plane load factor {}%",
                self.adjustments.ev_share_percent,
                self.adjustments.km_reduction_percent,
                self.adjustments.load_factor_percent
            )?;
        }
        writeln!(f)?;

        writeln!(f, "  Baseline:  {:>12.2}", self.baseline.total_tons_co2e)?;
        writeln!(f, "  Optimized: {:>12.2}", self.optimized.total_tons_co2e)?;
        writeln!(
            f,
            "  Reduction: {:>12.2} ({:.1}%)",
            self.reduction_tons(),
            self.reduction_percent()
        )?;
        for category in EmissionCategory::ALL {
            let before = self.baseline.emissions(category);
            let after = self.optimized.emissions(category);
            if (before - after).abs() > f64::EPSILON {
                writeln!(
                    f,
                    "    {:<16} {:>10.2} -> {:.2}",
                    category.label(),
                    before,
                    after
                )?;
            }
        }
        writeln!(f)?;

        let shares = self.optimized.shares();
        if shares.is_empty() {
            writeln!(f, "No emissions to break down.")?;
        } else {
            writeln!(f, "Optimized share by category:")?;
            for share in shares {
                writeln!(
                    f,
                    "  {:<18} {:>10.2} {:>6.1}%",
                    share.category.label(),
                    share.emissions_tons,
                    share.percent
                )?;
            }
        }
        writeln!(f)?;

        writeln!(f, "Assumptions:")?;
        writeln!(
            f,
            "  - EV share reduces car emissions by at most {:.0}% (1 - {} * EV/100).",
            EV_MITIGATION * 100.0,
            EV_MITIGATION
        )?;
        writeln!(
            f,
            "  - Baseline uses 0% EV share, 0% KM reduction and 100% plane load factor."
        )?;
        writeln!(f, "  - Tons CO2e = kg CO2e / {}.", KG_PER_TON)?;

        Ok(())
    }
}

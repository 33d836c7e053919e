//! Evaluation ledger schema and operations

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::models::{CategoryReportRow, EmissionCategory, EmissionsReport, ScenarioComparison};

/// Which report of a comparison a stored row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Baseline,
    Optimized,
}

impl Scenario {
    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::Baseline => "baseline",
            Scenario::Optimized => "optimized",
        }
    }
}

/// Header of a saved evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRecord {
    pub id: i64,
    pub label: Option<String>,
    pub source: Option<String>,
    pub created_at: String,
    pub ev_share_percent: f64,
    pub km_reduction_percent: f64,
    pub load_factor_percent: f64,
    pub baseline_total: f64,
    pub optimized_total: f64,
}

/// Open a ledger file and make sure the schema exists
pub fn open(path: &std::path::Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    init_schema(&conn)?;
    debug!(path = %path.display(), "ledger opened");
    Ok(conn)
}

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        -- One row per calculate run
        CREATE TABLE IF NOT EXISTS evaluations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT,
            source TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            ev_share_percent REAL NOT NULL,
            km_reduction_percent REAL NOT NULL,
            load_factor_percent REAL NOT NULL,
            baseline_total REAL NOT NULL,
            optimized_total REAL NOT NULL
        );

        -- Per-category lines for both scenarios
        CREATE TABLE IF NOT EXISTS evaluation_rows (
            evaluation_id INTEGER NOT NULL REFERENCES evaluations(id) ON DELETE CASCADE,
            scenario TEXT NOT NULL,
            position INTEGER NOT NULL,
            category TEXT NOT NULL,
            activity_value REAL NOT NULL,
            emissions_tons REAL NOT NULL,
            PRIMARY KEY (evaluation_id, scenario, category)
        );

        CREATE INDEX IF NOT EXISTS idx_evaluation_rows_evaluation ON evaluation_rows(evaluation_id);
        "#,
    )?;
    Ok(())
}

/// Save a comparison and its rows, returning the new evaluation id
pub fn insert_evaluation(
    conn: &mut Connection,
    comparison: &ScenarioComparison,
    label: Option<&str>,
    source: Option<&str>,
) -> Result<i64> {
    let tx = conn.transaction()?;

    let adj = &comparison.adjustments;
    tx.execute(
        "INSERT INTO evaluations (label, source, ev_share_percent, km_reduction_percent,
             load_factor_percent, baseline_total, optimized_total)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (
            label,
            source,
            adj.ev_share_percent,
            adj.km_reduction_percent,
            adj.load_factor_percent,
            comparison.baseline.total_tons_co2e,
            comparison.optimized.total_tons_co2e,
        ),
    )?;
    let id = tx.last_insert_rowid();

    for (scenario, report) in [
        (Scenario::Baseline, &comparison.baseline),
        (Scenario::Optimized, &comparison.optimized),
    ] {
        for (position, row) in report.rows.iter().enumerate() {
            tx.execute(
                "INSERT INTO evaluation_rows (evaluation_id, scenario, position, category,
                     activity_value, emissions_tons)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (
                    id,
                    scenario.as_str(),
                    position as i64,
                    row.category.key(),
                    row.activity_value,
                    row.emissions_tons,
                ),
            )?;
        }
    }

    tx.commit()?;
    info!(id, label = label.unwrap_or("-"), "evaluation saved");
    Ok(id)
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EvaluationRecord> {
    Ok(EvaluationRecord {
        id: row.get(0)?,
        label: row.get(1)?,
        source: row.get(2)?,
        created_at: row.get(3)?,
        ev_share_percent: row.get(4)?,
        km_reduction_percent: row.get(5)?,
        load_factor_percent: row.get(6)?,
        baseline_total: row.get(7)?,
        optimized_total: row.get(8)?,
    })
}

const EVALUATION_COLUMNS: &str = "id, label, source, created_at, ev_share_percent, \
     km_reduction_percent, load_factor_percent, baseline_total, optimized_total";

/// List saved evaluations, newest first
pub fn list_evaluations(conn: &Connection, limit: usize) -> Result<Vec<EvaluationRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EVALUATION_COLUMNS} FROM evaluations ORDER BY id DESC LIMIT ?1"
    ))?;

    let rows = stmt.query_map([limit as i64], record_from_row)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Get one saved evaluation header
pub fn get_evaluation(conn: &Connection, id: i64) -> Result<Option<EvaluationRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {EVALUATION_COLUMNS} FROM evaluations WHERE id = ?1"),
            [id],
            record_from_row,
        )
        .optional()?;
    Ok(record)
}

/// Rebuild a stored report for one scenario
pub fn get_evaluation_report(
    conn: &Connection,
    id: i64,
    scenario: Scenario,
) -> Result<EmissionsReport> {
    let mut stmt = conn.prepare(
        "SELECT category, activity_value, emissions_tons
         FROM evaluation_rows
         WHERE evaluation_id = ?1 AND scenario = ?2
         ORDER BY position",
    )?;

    let rows = stmt.query_map((id, scenario.as_str()), |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, f64>(1)?,
            row.get::<_, f64>(2)?,
        ))
    })?;

    let mut results = Vec::new();
    for row in rows {
        let (category, activity_value, emissions_tons) = row?;
        let category: EmissionCategory = category
            .parse()
            .map_err(|e: String| anyhow::anyhow!("evaluation {}: {}", id, e))?;
        results.push(CategoryReportRow {
            category,
            activity_value,
            emissions_tons,
        });
    }

    let total_tons_co2e = results.iter().map(|r| r.emissions_tons).sum();
    Ok(EmissionsReport {
        rows: results,
        total_tons_co2e,
    })
}

/// Delete every saved evaluation; their rows go with them
pub fn clear_evaluations(conn: &Connection) -> Result<usize> {
    let removed = conn.execute("DELETE FROM evaluations", [])?;
    info!(removed, "ledger cleared");
    Ok(removed)
}

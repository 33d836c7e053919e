use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::cargo_bin("emimeter").unwrap()
}

fn sample_sheet(dir: &TempDir) -> std::path::PathBuf {
    let out = cmd().arg("sample").output().unwrap();
    assert!(out.status.success());
    let path = dir.path().join("sample.sheet");
    fs::write(&path, out.stdout).unwrap();
    path
}

#[test]
fn factors_table() {
    cmd()
        .arg("factors")
        .assert()
        .success()
        .stdout(contains("Cargo Planes"))
        .stdout(contains("9000.00"))
        .stdout(contains("Subcontractors"));
}

#[test]
fn calc_sample_summary() {
    cmd()
        .args(["calc", "--sample"])
        .assert()
        .success()
        .stdout(contains("Baseline:"))
        .stdout(contains("4285.20"))
        .stdout(contains("3600.00 -> 2880.00"));
}

#[test]
fn calc_sample_neutral_flags_match_baseline() {
    let out = cmd()
        .args([
            "calc",
            "--sample",
            "--json",
            "--ev-share",
            "0",
            "--km-reduction",
            "0",
            "--load-factor",
            "100",
        ])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(
        v["comparison"]["baseline"]["total_tons_co2e"],
        v["comparison"]["optimized"]["total_tons_co2e"]
    );
    assert_eq!(v["reduction_tons"], 0.0);
}

#[test]
fn calc_json_rows() {
    let out = cmd().args(["calc", "--sample", "--json"]).output().unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let rows = v["comparison"]["optimized"]["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0]["category"], "cars");
    assert_eq!(rows[9]["category"], "subcontractors");
    assert_eq!(rows[9]["emissions_tons"], 185.0);
    let planes = rows[4]["emissions_tons"].as_f64().unwrap();
    assert!((planes - 2880.0).abs() < 1e-9);
}

#[test]
fn calc_rejects_out_of_range_adjustment() {
    cmd()
        .args(["calc", "--sample", "--ev-share", "150"])
        .assert()
        .failure()
        .stderr(contains("ev_share_percent"));
}

#[test]
fn calc_requires_input() {
    cmd().arg("calc").assert().failure().stderr(contains("--sample"));
}

#[test]
fn calc_rejects_negative_sheet_value() {
    let dir = TempDir::new().unwrap();
    let path = sample_sheet(&dir);
    let content = fs::read_to_string(&path).unwrap().replace("buses_km = 80000", "buses_km = -5");
    fs::write(&path, content).unwrap();

    cmd()
        .arg("calc")
        .arg(&path)
        .assert()
        .failure()
        .stderr(contains("buses_km"));
}

#[test]
fn calc_sheet_verbose_tables() {
    let dir = TempDir::new().unwrap();
    let path = sample_sheet(&dir);
    cmd()
        .arg("calc")
        .arg(&path)
        .arg("--verbose")
        .assert()
        .success()
        .stdout(contains("Sample logistics company"))
        .stdout(contains("Office Lighting"))
        .stdout(contains("kWh-th"));
}

#[test]
fn save_history_show_clear() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("ledger.db");

    cmd()
        .arg("--database")
        .arg(&db)
        .args(["calc", "--sample", "--save", "--label", "FY2025"])
        .assert()
        .success()
        .stdout(contains("Saved as evaluation #1"));

    cmd()
        .arg("--database")
        .arg(&db)
        .arg("history")
        .assert()
        .success()
        .stdout(contains("FY2025"))
        .stdout(contains("4285.20"));

    cmd()
        .arg("--database")
        .arg(&db)
        .args(["show", "1"])
        .assert()
        .success()
        .stdout(contains("Label: FY2025"))
        .stdout(contains("Cargo Planes"));

    cmd()
        .arg("--database")
        .arg(&db)
        .args(["show", "7"])
        .assert()
        .failure()
        .stderr(contains("not found"));

    cmd()
        .arg("--database")
        .arg(&db)
        .arg("clear")
        .assert()
        .success()
        .stdout(contains("Removed 1"));

    cmd()
        .arg("--database")
        .arg(&db)
        .arg("history")
        .assert()
        .success()
        .stdout(contains("No saved evaluations"));
}

#[test]
fn batch_reports_each_sheet() {
    let dir = TempDir::new().unwrap();
    let sheets = dir.path().join("sheets");
    fs::create_dir(&sheets).unwrap();
    let sample = sample_sheet(&dir);
    fs::copy(&sample, sheets.join("north.sheet")).unwrap();
    fs::write(sheets.join("broken.sheet"), "cars_km = 10\n").unwrap();

    cmd()
        .arg("batch")
        .arg(&sheets)
        .assert()
        .success()
        .stdout(contains("Found 2 sheets"))
        .stdout(contains("Evaluated 1 sheets"))
        .stdout(contains("Failed: 1"))
        .stderr(contains("broken.sheet"));
}

#[test]
fn sweep_load_factor() {
    cmd()
        .args([
            "sweep",
            "--sample",
            "--ev-share",
            "0",
            "--km-reduction",
            "0",
            "--param",
            "load-factor",
            "--step",
            "50",
        ])
        .assert()
        .success()
        .stdout(contains("Load factor (%)"))
        .stdout(contains("685.20"))
        .stdout(contains("2485.20"))
        .stdout(contains("4285.20"))
        .stdout(contains("3600.00"));
}

#[test]
fn sweep_json_points() {
    let out = cmd()
        .args([
            "sweep",
            "--sample",
            "--ev-share",
            "0",
            "--km-reduction",
            "0",
            "--param",
            "load-factor",
            "--step",
            "50",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["param"], "load-factor");
    let points = v["points"].as_array().unwrap();
    assert_eq!(points.len(), 3);
    assert_eq!(points[1]["percent"], 50.0);
    let at_zero = points[0]["optimized_total"].as_f64().unwrap();
    let at_full = points[2]["optimized_total"].as_f64().unwrap();
    assert!((at_zero - 685.2).abs() < 1e-9);
    assert!((at_full - 4285.2).abs() < 1e-9);
    assert!((points[0]["reduction_tons"].as_f64().unwrap() - 3600.0).abs() < 1e-9);
}

#[test]
fn sweep_rejects_zero_step() {
    cmd()
        .args(["sweep", "--sample", "--param", "ev-share", "--step", "0"])
        .assert()
        .failure();
}

//! Activity sheet parsing
//!
//! Sheets are plain `key = value` text files (or the equivalent JSON) holding
//! one period's activity figures and, optionally, optimized adjustments.
//! `#` starts a comment, except in `name`, which takes the rest of its line.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::SheetError;
use crate::models::{ActivityData, AdjustmentParameters};

/// File extensions picked up by directory scans
pub const SHEET_EXTENSIONS: [&str; 2] = ["sheet", "json"];

const REQUIRED_FIELDS: [&str; 9] = [
    "cars_km",
    "trucks_km",
    "buses_km",
    "forklift_hours",
    "plane_hours",
    "lighting_kwh",
    "heating_kwh_thermal",
    "cooling_kwh",
    "computing_kwh",
];

const ADJUSTMENT_FIELDS: [&str; 3] = ["ev_share", "km_reduction", "load_factor"];

/// A validated activity snapshot with its optimized adjustments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivitySheet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub activity: ActivityData,
    #[serde(default)]
    pub adjustments: AdjustmentParameters,
}

impl ActivitySheet {
    pub fn sample() -> Self {
        ActivitySheet {
            name: Some("Sample logistics company".to_string()),
            activity: ActivityData::sample(),
            adjustments: AdjustmentParameters::sample_optimized(),
        }
    }

    fn validate(self) -> Result<Self, SheetError> {
        self.activity.validate()?;
        self.adjustments.validate()?;
        Ok(self)
    }
}

/// Parse a text sheet
pub fn parse_sheet(content: &str) -> Result<ActivitySheet, SheetError> {
    let line_re = Regex::new(r"^([A-Za-z_]+)\s*[=:]\s*(.*)$")?;

    let mut numbers: HashMap<&'static str, f64> = HashMap::new();
    let mut adjustments: HashMap<&'static str, f64> = HashMap::new();
    let mut subcontractors: Option<Vec<f64>> = None;
    let mut name: Option<String> = None;

    for (index, raw) in content.lines().enumerate() {
        let line_no = index + 1;
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let cap = line_re.captures(text).ok_or_else(|| SheetError::Malformed {
            line: line_no,
            text: text.to_string(),
        })?;
        let key = cap[1].to_ascii_lowercase();
        let value = if key == "name" {
            cap[2].trim()
        } else {
            cap[2].split('#').next().unwrap_or("").trim()
        };

        let duplicate = || SheetError::DuplicateField {
            line: line_no,
            key: key.clone(),
        };

        if let Some(field) = REQUIRED_FIELDS.into_iter().find(|f| *f == key) {
            let parsed = parse_number(line_no, &key, value)?;
            if numbers.insert(field, parsed).is_some() {
                return Err(duplicate());
            }
        } else if let Some(field) = ADJUSTMENT_FIELDS.into_iter().find(|f| *f == key) {
            let parsed = parse_number(line_no, &key, value)?;
            if adjustments.insert(field, parsed).is_some() {
                return Err(duplicate());
            }
        } else if key == "subcontractors" {
            if subcontractors.is_some() {
                return Err(duplicate());
            }
            let values = value
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| parse_number(line_no, &key, v))
                .collect::<Result<Vec<_>, _>>()?;
            subcontractors = Some(values);
        } else if key == "name" {
            if name.is_some() {
                return Err(duplicate());
            }
            name = Some(value.to_string());
        } else {
            return Err(SheetError::UnknownField { line: line_no, key });
        }
    }

    let required = |field: &'static str| {
        numbers
            .get(field)
            .copied()
            .ok_or(SheetError::MissingField(field))
    };

    let sheet = ActivitySheet {
        name,
        activity: ActivityData {
            cars_km: required("cars_km")?,
            trucks_km: required("trucks_km")?,
            buses_km: required("buses_km")?,
            forklift_hours: required("forklift_hours")?,
            plane_hours: required("plane_hours")?,
            lighting_kwh: required("lighting_kwh")?,
            heating_kwh_thermal: required("heating_kwh_thermal")?,
            cooling_kwh: required("cooling_kwh")?,
            computing_kwh: required("computing_kwh")?,
            subcontractor_emissions: subcontractors.unwrap_or_default(),
        },
        adjustments: AdjustmentParameters::from_partial(
            adjustments.get("ev_share").copied(),
            adjustments.get("km_reduction").copied(),
            adjustments.get("load_factor").copied(),
        ),
    };

    sheet.validate()
}

fn parse_number(line: usize, key: &str, value: &str) -> Result<f64, SheetError> {
    let cleaned: String = value.chars().filter(|c| *c != '_').collect();
    cleaned.parse::<f64>().map_err(|_| SheetError::InvalidNumber {
        line,
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Parse a JSON sheet; omitted adjustments take their neutral values
pub fn parse_json_sheet(content: &str) -> Result<ActivitySheet, SheetError> {
    let sheet: ActivitySheet = serde_json::from_str(content)?;
    sheet.validate()
}

/// Load a sheet from disk, choosing the format by extension
pub fn load_sheet(path: &Path) -> Result<ActivitySheet> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let sheet = if is_json {
        parse_json_sheet(&content)
    } else {
        parse_sheet(&content)
    }
    .with_context(|| format!("Invalid activity sheet {}", path.display()))?;

    debug!(path = %path.display(), json = is_json, "sheet loaded");
    Ok(sheet)
}

/// Render a sheet in the text format accepted by `parse_sheet`
pub fn render_sheet(sheet: &ActivitySheet) -> String {
    let a = &sheet.activity;
    let adj = &sheet.adjustments;
    let mut output = String::new();

    output.push_str("# emimeter activity sheet (yearly figures)\n");
    if let Some(name) = &sheet.name {
        output.push_str(&format!("name = {}\n", name));
    }
    output.push('\n');
    output.push_str(&format!("cars_km = {}\n", a.cars_km));
    output.push_str(&format!("trucks_km = {}\n", a.trucks_km));
    output.push_str(&format!("buses_km = {}\n", a.buses_km));
    output.push_str(&format!("forklift_hours = {}\n", a.forklift_hours));
    output.push_str(&format!("plane_hours = {}\n", a.plane_hours));
    output.push_str(&format!("lighting_kwh = {}\n", a.lighting_kwh));
    output.push_str(&format!("heating_kwh_thermal = {}\n", a.heating_kwh_thermal));
    output.push_str(&format!("cooling_kwh = {}\n", a.cooling_kwh));
    output.push_str(&format!("computing_kwh = {}\n", a.computing_kwh));

    let subs: Vec<String> = a.subcontractor_emissions.iter().map(|v| v.to_string()).collect();
    output.push_str(&format!("subcontractors = {}  # tCO2e\n", subs.join(", ")));

    output.push_str("\n# optimized scenario (percent)\n");
    output.push_str(&format!("ev_share = {}\n", adj.ev_share_percent));
    output.push_str(&format!("km_reduction = {}\n", adj.km_reduction_percent));
    output.push_str(&format!("load_factor = {}\n", adj.load_factor_percent));
    output
}

/// Find all sheet files below a directory, sorted by path
pub fn find_sheet_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }

    let mut sheets = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SHEET_EXTENSIONS.contains(&ext));
        if entry.file_type().is_file() && matches {
            sheets.push(path.to_path_buf());
        }
    }

    sheets.sort();
    Ok(sheets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
# yearly figures
name = Depot North
cars_km = 250000
trucks_km = 150_000
buses_km: 80000
forklift_hours = 2000
plane_hours = 400
lighting_kwh = 120000
heating_kwh_thermal = 50000
cooling_kwh = 300000
computing_kwh = 90000
subcontractors = 120, 45, 20   # tCO2e
ev_share = 30
"#;

    #[test]
    fn test_parse_text_sheet() {
        let sheet = parse_sheet(SAMPLE).unwrap();
        assert_eq!(sheet.name.as_deref(), Some("Depot North"));
        assert_eq!(sheet.activity, ActivityData::sample());
        assert_eq!(sheet.adjustments.ev_share_percent, 30.0);
        assert_eq!(sheet.adjustments.km_reduction_percent, 0.0);
        assert_eq!(sheet.adjustments.load_factor_percent, 100.0);
    }

    #[test]
    fn test_rendered_sample_parses_back() {
        let sample = ActivitySheet::sample();
        let parsed = parse_sheet(&render_sheet(&sample)).unwrap();
        assert_eq!(parsed, sample);
    }

    #[test]
    fn test_name_keeps_hash() {
        let content = SAMPLE.replace("name = Depot North", "name = Depot #3");
        let sheet = parse_sheet(&content).unwrap();
        assert_eq!(sheet.name.as_deref(), Some("Depot #3"));
        assert_eq!(parse_sheet(&render_sheet(&sheet)).unwrap(), sheet);
    }

    #[test]
    fn test_missing_subcontractors_is_zero() {
        let content = SAMPLE.replace("subcontractors = 120, 45, 20   # tCO2e\n", "");
        let sheet = parse_sheet(&content).unwrap();
        assert!(sheet.activity.subcontractor_emissions.is_empty());

        let content = SAMPLE.replace("120, 45, 20", "");
        let sheet = parse_sheet(&content).unwrap();
        assert!(sheet.activity.subcontractor_emissions.is_empty());
    }

    #[test]
    fn test_missing_required_field() {
        let content = SAMPLE.replace("plane_hours = 400\n", "");
        assert!(matches!(
            parse_sheet(&content),
            Err(SheetError::MissingField("plane_hours"))
        ));
    }

    #[test]
    fn test_unknown_and_duplicate_fields() {
        let content = format!("{SAMPLE}rockets_km = 5\n");
        assert!(matches!(
            parse_sheet(&content),
            Err(SheetError::UnknownField { ref key, .. }) if key == "rockets_km"
        ));

        let content = format!("{SAMPLE}cars_km = 5\n");
        assert!(matches!(
            parse_sheet(&content),
            Err(SheetError::DuplicateField { ref key, .. }) if key == "cars_km"
        ));
    }

    #[test]
    fn test_bad_number_reports_line() {
        let content = SAMPLE.replace("forklift_hours = 2000", "forklift_hours = lots");
        let err = parse_sheet(&content).unwrap_err();
        assert!(matches!(err, SheetError::InvalidNumber { line: 7, .. }));
    }

    #[test]
    fn test_malformed_line() {
        let content = format!("{SAMPLE}just some words\n");
        assert!(matches!(parse_sheet(&content), Err(SheetError::Malformed { .. })));
    }

    #[test]
    fn test_negative_activity_rejected() {
        let content = SAMPLE.replace("trucks_km = 150_000", "trucks_km = -150");
        assert!(matches!(parse_sheet(&content), Err(SheetError::Invalid(_))));
    }

    #[test]
    fn test_out_of_range_adjustment_rejected() {
        let content = SAMPLE.replace("ev_share = 30", "ev_share = 130");
        let err = parse_sheet(&content).unwrap_err();
        assert!(err.to_string().contains("ev_share_percent"));
    }

    #[test]
    fn test_parse_json_sheet_defaults_adjustments() {
        let json = serde_json::json!({
            "activity": ActivityData::sample(),
        })
        .to_string();
        let sheet = parse_json_sheet(&json).unwrap();
        assert_eq!(sheet.name, None);
        assert!(sheet.adjustments.is_neutral());
    }

    #[test]
    fn test_json_sheet_rejects_unknown_fields() {
        let mut json = serde_json::to_value(ActivitySheet::sample()).unwrap();
        json["adjustments"] = serde_json::json!({
            "ev_share": 30,
            "km_reduction": 10,
            "load_factor": 80,
        });
        assert!(matches!(
            parse_json_sheet(&json.to_string()),
            Err(SheetError::Json(_))
        ));

        let mut json = serde_json::to_value(ActivitySheet::sample()).unwrap();
        let activity = json["activity"].as_object_mut().unwrap();
        let subs = activity.remove("subcontractor_emissions").unwrap();
        activity.insert("subcontractors".to_string(), subs);
        assert!(matches!(
            parse_json_sheet(&json.to_string()),
            Err(SheetError::Json(_))
        ));

        let mut json = serde_json::to_value(ActivitySheet::sample()).unwrap();
        json["period"] = serde_json::json!("2025");
        assert!(matches!(
            parse_json_sheet(&json.to_string()),
            Err(SheetError::Json(_))
        ));
    }

    #[test]
    fn test_json_sheet_validated() {
        let mut sample = ActivitySheet::sample();
        sample.adjustments.load_factor_percent = 101.0;
        let json = serde_json::to_string(&sample).unwrap();
        assert!(matches!(parse_json_sheet(&json), Err(SheetError::Invalid(_))));
    }

    #[test]
    fn test_find_sheet_files() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("region");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("a.sheet"), SAMPLE).unwrap();
        fs::write(nested.join("b.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let files = find_sheet_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.sheet"));
        assert!(files[1].ends_with("region/b.json"));
    }

    #[test]
    fn test_load_sheet_by_extension() {
        let dir = tempdir().unwrap();
        let text = dir.path().join("depot.sheet");
        fs::write(&text, SAMPLE).unwrap();
        let json = dir.path().join("depot.json");
        fs::write(&json, serde_json::to_string(&ActivitySheet::sample()).unwrap()).unwrap();

        assert_eq!(load_sheet(&text).unwrap().activity, ActivityData::sample());
        assert_eq!(load_sheet(&json).unwrap(), ActivitySheet::sample());
        assert!(load_sheet(&dir.path().join("missing.sheet")).is_err());
    }
}

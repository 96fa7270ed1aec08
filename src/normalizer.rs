//! # City Record Normalizer
//!
//! The backend has shipped several metadata schemas over time: the current
//! lowercase one (`budget_eur`, `visa`, `vibe_tags`) and a legacy capitalized
//! one (`Monthly_Budget_Single`, `Digital_Nomad_Visa`). Each canonical
//! attribute resolves through an ordered list of candidate source keys, so
//! scoring and feed logic never branch on schema version.
//!
//! Normalization is pure and total: a missing or malformed field falls back
//! to a documented default (`"N/A"` for display strings, `Unknown` for the
//! visa tri-state) and never aborts the pipeline.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Display default for attributes with no resolvable source field.
pub const NA: &str = "N/A";

/// Tri-state visa availability as delivered by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisaAvailability {
    Yes,
    No,
    #[default]
    Unknown,
}

impl VisaAvailability {
    /// Only an explicit "Yes" counts as available for scoring.
    pub fn is_available(&self) -> bool {
        matches!(self, VisaAvailability::Yes)
    }
}

/// One city with every attribute resolved onto the canonical set.
/// `name` is the natural key for preferences and hiding, case-sensitive,
/// exactly as the backend delivered it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CityRecord {
    pub name: String,
    pub country: String,
    pub region: String,
    pub budget_eur: Option<f64>,
    pub budget_label: String,
    pub summer_temp: String,
    pub winter_temp: String,
    pub internet_label: String,
    pub internet_mbps: Option<u32>,
    pub visa_available: VisaAvailability,
    pub visa_type: String,
    pub visa_score: String,
    pub tax_rate: String,
    pub tax_regime: String,
    pub tax_score: String,
    pub vibe_tags: Vec<String>,
    /// Source-provided relevance: [0,1] fraction or 0-100 percentage.
    pub raw_similarity: Option<f64>,
    // Premium-only extras; pass through for the premium view.
    pub monthly_income_requirement_eur: Option<f64>,
    pub max_stay_months: Option<f64>,
    pub overall_score: Option<f64>,
    pub eu_eligibility: Option<i64>,
}

/* ----------------------------
Field resolution tables
---------------------------- */

const NAME_KEYS: &[&str] = &["city", "City", "name"];
const COUNTRY_KEYS: &[&str] = &["country", "Country"];
const REGION_KEYS: &[&str] = &["region", "Region"];
const BUDGET_EUR_KEYS: &[&str] = &["budget_eur", "Monthly_Budget_Single", "monthly_budget_eur"];
const BUDGET_LABEL_KEYS: &[&str] = &["budget", "Budget_Level"];
const SUMMER_KEYS: &[&str] = &["summer_temp", "Summer_Temp", "climate"];
const WINTER_KEYS: &[&str] = &["winter_temp", "Winter_Temp"];
const INTERNET_KEYS: &[&str] = &["internet", "Internet_Quality"];
const INTERNET_MBPS_KEYS: &[&str] = &["internet_mbps", "Internet_Speed_Mbps"];
const VISA_TYPE_KEYS: &[&str] = &["visa_type", "Visa_Type"];
const VISA_SCORE_KEYS: &[&str] = &["visa_score", "Visa_Score"];
const TAX_RATE_KEYS: &[&str] = &["tax_rate", "Tax_Rate_Standard_Pct"];
const TAX_REGIME_KEYS: &[&str] = &["tax_regime", "Tax_Regime"];
const TAX_SCORE_KEYS: &[&str] = &["tax_score", "Tax_Score"];
const VIBE_KEYS: &[&str] = &["vibe_tags", "vibe", "Vibe_Tags"];
const INCOME_REQ_KEYS: &[&str] = &["monthly_income_requirement_eur", "Monthly_Income_Requirement"];
const MAX_STAY_KEYS: &[&str] = &["max_stay_months", "Max_Stay_Months"];
const OVERALL_KEYS: &[&str] = &["overall_score", "Overall_Score"];
const EU_KEYS: &[&str] = &["eu_noneu_intl", "EU_NonEU_Intl"];

/// First candidate key with a non-empty value, rendered as a display string.
fn first_str(meta: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    for k in keys {
        match meta.get(*k) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// First candidate key parseable as a number (numbers and numeric strings).
fn first_num(meta: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    for k in keys {
        match meta.get(*k) {
            Some(Value::Number(n)) => return n.as_f64(),
            Some(Value::String(s)) => {
                if let Ok(v) = s.trim().parse::<f64>() {
                    return Some(v);
                }
            }
            _ => {}
        }
    }
    None
}

fn str_or_na(meta: &Map<String, Value>, keys: &[&str]) -> String {
    first_str(meta, keys).unwrap_or_else(|| NA.to_string())
}

/// Visa availability, tried in fixed priority order:
/// `visa == "Yes"`, then `Digital_Nomad_Visa == "Yes"`, then `visa == "1"`.
/// An explicit negative ("No"/"0") yields `No`; nothing resolvable → `Unknown`.
fn resolve_visa(meta: &Map<String, Value>) -> VisaAvailability {
    let get = |k: &str| meta.get(k).and_then(Value::as_str).map(str::trim);

    if get("visa") == Some("Yes") {
        return VisaAvailability::Yes;
    }
    if get("Digital_Nomad_Visa") == Some("Yes") {
        return VisaAvailability::Yes;
    }
    if get("visa") == Some("1") {
        return VisaAvailability::Yes;
    }
    for k in ["visa", "Digital_Nomad_Visa"] {
        if let Some(v) = get(k) {
            if v.eq_ignore_ascii_case("no") || v == "0" {
                return VisaAvailability::No;
            }
        }
    }
    VisaAvailability::Unknown
}

/// Vibe tags come as a comma-separated string or (rarely) a JSON array.
/// Order is preserved; blanks are dropped.
fn resolve_vibes(meta: &Map<String, Value>) -> Vec<String> {
    for k in VIBE_KEYS {
        match meta.get(*k) {
            Some(Value::String(s)) if !s.trim().is_empty() => {
                return s
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            Some(Value::Array(items)) => {
                return items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            _ => {}
        }
    }
    Vec::new()
}

/// Leading integer of speed labels like "100-200" or "150+ Mbps".
fn parse_mbps(raw: &str) -> Option<u32> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"^\s*(\d+)").expect("mbps regex"));
    re.captures(raw)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Map one raw metadata object onto the canonical attribute set.
/// `raw_similarity` comes from the result envelope, not the metadata.
pub fn normalize(meta: &Map<String, Value>, raw_similarity: Option<f64>) -> CityRecord {
    CityRecord {
        name: str_or_na(meta, NAME_KEYS),
        country: str_or_na(meta, COUNTRY_KEYS),
        region: str_or_na(meta, REGION_KEYS),
        budget_eur: first_num(meta, BUDGET_EUR_KEYS),
        budget_label: str_or_na(meta, BUDGET_LABEL_KEYS),
        summer_temp: str_or_na(meta, SUMMER_KEYS),
        winter_temp: str_or_na(meta, WINTER_KEYS),
        internet_label: str_or_na(meta, INTERNET_KEYS),
        internet_mbps: first_str(meta, INTERNET_MBPS_KEYS)
            .as_deref()
            .and_then(parse_mbps),
        visa_available: resolve_visa(meta),
        visa_type: str_or_na(meta, VISA_TYPE_KEYS),
        visa_score: str_or_na(meta, VISA_SCORE_KEYS),
        tax_rate: str_or_na(meta, TAX_RATE_KEYS),
        tax_regime: str_or_na(meta, TAX_REGIME_KEYS),
        tax_score: str_or_na(meta, TAX_SCORE_KEYS),
        vibe_tags: resolve_vibes(meta),
        raw_similarity,
        monthly_income_requirement_eur: first_num(meta, INCOME_REQ_KEYS),
        max_stay_months: first_num(meta, MAX_STAY_KEYS),
        overall_score: first_num(meta, OVERALL_KEYS),
        eu_eligibility: first_num(meta, EU_KEYS).map(|v| v as i64),
    }
}

/// Human label for the premium `eu_noneu_intl` eligibility code.
pub fn interpret_eu(code: Option<i64>) -> &'static str {
    match code {
        Some(0) => "EU citizens only",
        Some(1) => "EU and non-EU",
        Some(2) => "Everyone",
        Some(3) => "Non-EU only",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(v: Value) -> Map<String, Value> {
        v.as_object().expect("object literal").clone()
    }

    #[test]
    fn lowercase_schema_resolves() {
        let m = meta(json!({
            "city": "Lisbon",
            "country": "Portugal",
            "region": "Southern Europe",
            "budget_eur": 1400,
            "budget": "Moderate",
            "summer_temp": "Warm",
            "winter_temp": "Mild",
            "internet": "Excellent",
            "internet_mbps": "100-200",
            "visa": "Yes",
            "visa_type": "D8 Digital Nomad Visa",
            "vibe_tags": "Sunny, Creative, Beach-Adjacent"
        }));
        let c = normalize(&m, Some(0.82));
        assert_eq!(c.name, "Lisbon");
        assert_eq!(c.budget_eur, Some(1400.0));
        assert_eq!(c.internet_mbps, Some(100));
        assert_eq!(c.visa_available, VisaAvailability::Yes);
        assert_eq!(c.vibe_tags, vec!["Sunny", "Creative", "Beach-Adjacent"]);
        assert_eq!(c.raw_similarity, Some(0.82));
    }

    #[test]
    fn legacy_capitalized_schema_resolves() {
        let m = meta(json!({
            "City": "Tallinn",
            "Country": "Estonia",
            "Region": "Northern Europe",
            "Monthly_Budget_Single": "1300",
            "Digital_Nomad_Visa": "Yes",
            "Tax_Rate_Standard_Pct": 20,
            "Vibe_Tags": "Digital, Medieval, Nordic"
        }));
        let c = normalize(&m, None);
        assert_eq!(c.name, "Tallinn");
        assert_eq!(c.budget_eur, Some(1300.0));
        assert_eq!(c.visa_available, VisaAvailability::Yes);
        assert_eq!(c.tax_rate, "20");
        assert_eq!(c.vibe_tags.len(), 3);
    }

    #[test]
    fn visa_priority_ladder() {
        // Lowercase "visa" wins over the legacy key.
        let m = meta(json!({ "visa": "Yes", "Digital_Nomad_Visa": "No" }));
        assert_eq!(resolve_visa(&m), VisaAvailability::Yes);
        // "1" is accepted as an affirmative.
        let m = meta(json!({ "visa": "1" }));
        assert_eq!(resolve_visa(&m), VisaAvailability::Yes);
        // Explicit negative.
        let m = meta(json!({ "visa": "No" }));
        assert_eq!(resolve_visa(&m), VisaAvailability::No);
        // Nothing resolvable.
        let m = meta(json!({}));
        assert_eq!(resolve_visa(&m), VisaAvailability::Unknown);
        assert!(!VisaAvailability::Unknown.is_available());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let c = normalize(&meta(json!({})), None);
        assert_eq!(c.name, NA);
        assert_eq!(c.country, NA);
        assert_eq!(c.budget_eur, None);
        assert_eq!(c.internet_mbps, None);
        assert!(c.vibe_tags.is_empty());
        assert_eq!(c.raw_similarity, None);
    }

    #[test]
    fn vibe_tags_accept_array_form() {
        let m = meta(json!({ "vibe_tags": ["Historic", " Beer Culture ", ""] }));
        let c = normalize(&m, None);
        assert_eq!(c.vibe_tags, vec!["Historic", "Beer Culture"]);
    }

    #[test]
    fn eu_eligibility_labels() {
        assert_eq!(interpret_eu(Some(0)), "EU citizens only");
        assert_eq!(interpret_eu(Some(2)), "Everyone");
        assert_eq!(interpret_eu(Some(9)), "Unknown");
        assert_eq!(interpret_eu(None), "Unknown");
    }

    #[test]
    fn mbps_parses_leading_integer() {
        assert_eq!(parse_mbps("100-200"), Some(100));
        assert_eq!(parse_mbps(" 150+ Mbps"), Some(150));
        assert_eq!(parse_mbps("fast"), None);
    }
}

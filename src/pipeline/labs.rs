//! Regex-based lab-value parsing and severity classification.
//!
//! The parser looks for `Name: value unit` lines in extracted text and
//! classifies each hit against a declarative rule table. Tests whose name
//! matches no rule are kept with an empty range and a NORMAL status.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::{RecordStatus, TestResult};

/// Classification rule for one test family.
///
/// A rule applies when the parsed test name contains `test_contains`
/// (case-insensitive). Thresholds are checked from most to least severe.
struct LabRule {
    test_contains: &'static str,
    normal_range: (f64, f64),
    monitor_above: f64,
    urgent_above: f64,
}

/// Threshold table for common panels. Values are illustrative reference
/// ranges, not a clinical source of truth.
const LAB_RULES: &[LabRule] = &[
    LabRule {
        test_contains: "sugar",
        normal_range: (70.0, 100.0),
        monitor_above: 100.0,
        urgent_above: 125.0,
    },
    LabRule {
        test_contains: "glucose",
        normal_range: (70.0, 100.0),
        monitor_above: 100.0,
        urgent_above: 125.0,
    },
    LabRule {
        test_contains: "cholesterol",
        normal_range: (0.0, 200.0),
        monitor_above: 200.0,
        urgent_above: 240.0,
    },
    LabRule {
        test_contains: "triglyceride",
        normal_range: (0.0, 150.0),
        monitor_above: 150.0,
        urgent_above: 500.0,
    },
    LabRule {
        test_contains: "creatinine",
        normal_range: (0.6, 1.3),
        monitor_above: 1.3,
        urgent_above: 4.0,
    },
];

impl LabRule {
    fn classify(&self, value: f64) -> RecordStatus {
        if value > self.urgent_above {
            RecordStatus::Urgent
        } else if value > self.monitor_above {
            RecordStatus::Monitor
        } else {
            RecordStatus::Normal
        }
    }
}

fn rule_for(test_name: &str) -> Option<&'static LabRule> {
    let lowered = test_name.to_ascii_lowercase();
    LAB_RULES.iter().find(|r| lowered.contains(r.test_contains))
}

fn test_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([A-Za-z][A-Za-z ]*):\s*(\d+\.?\d*)\s*([a-zA-Z/%]+)")
            .unwrap_or_else(|e| panic!("invalid lab pattern: {e}"))
    })
}

/// Parse `Name: value unit` lines out of extracted text.
///
/// Later occurrences of the same test name overwrite earlier ones.
pub fn parse_lab_values(text: &str) -> BTreeMap<String, TestResult> {
    let mut parsed = BTreeMap::new();

    for captures in test_pattern().captures_iter(text) {
        let test_name = captures[1].trim().to_string();
        let value: f64 = match captures[2].parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        let unit = captures[3].trim().to_string();

        let (normal_range, status) = match rule_for(&test_name) {
            Some(rule) => (
                vec![rule.normal_range.0, rule.normal_range.1],
                rule.classify(value),
            ),
            None => (Vec::new(), RecordStatus::Normal),
        };

        parsed.insert(
            test_name,
            TestResult {
                value,
                unit,
                normal_range,
                status,
            },
        );
    }

    parsed
}

/// Overall record status: the most severe status among parsed values.
pub fn overall_status(parsed: &BTreeMap<String, TestResult>) -> RecordStatus {
    parsed
        .values()
        .map(|t| t.status)
        .max()
        .unwrap_or_default()
}

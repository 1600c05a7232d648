use async_trait::async_trait;
use resumable_extract::config::{RecoveryConfig, StorageConfig};
use resumable_extract::journal::LogRecord;
use resumable_extract::layout::RunLayout;
use resumable_extract::runner::UnitExtractor;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

pub const RUN_NAME: &str = "cohort";

pub fn storage(dir: &Path) -> StorageConfig {
    StorageConfig::with_output_dir(dir)
}

pub fn layout(dir: &Path) -> RunLayout {
    RunLayout::new(storage(dir), RUN_NAME).unwrap()
}

pub fn recovery_config() -> RecoveryConfig {
    RecoveryConfig {
        interactive: false,
        ..RecoveryConfig::default()
    }
}

pub fn units(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

pub fn record(value: Value) -> LogRecord {
    value
        .as_object()
        .cloned()
        .expect("test record must be a JSON object")
}

/// `count` distinct records belonging to `unit`
pub fn unit_records(unit: &str, count: usize) -> Vec<LogRecord> {
    (0..count)
        .map(|n| record(json!({"unit": unit, "title": format!("{unit} card {n}"), "n": n})))
        .collect()
}

/// `count` copies of the same record for `unit`
pub fn repeated_records(unit: &str, count: usize) -> Vec<LogRecord> {
    vec![record(json!({"unit": unit, "title": "Lab"})); count]
}

/// In-memory extractor with scripted units, record counts and failures
pub struct ScriptedExtractor {
    units: Vec<String>,
    counts: HashMap<String, usize>,
    failing: Mutex<HashSet<String>>,
    extracted: Mutex<Vec<String>>,
    repeated: bool,
}

impl ScriptedExtractor {
    pub fn new(plan: &[(&str, usize)]) -> Self {
        Self {
            units: plan.iter().map(|(unit, _)| unit.to_string()).collect(),
            counts: plan
                .iter()
                .map(|(unit, count)| (unit.to_string(), *count))
                .collect(),
            failing: Mutex::new(HashSet::new()),
            extracted: Mutex::new(Vec::new()),
            repeated: false,
        }
    }

    /// Every unit yields identical records instead of distinct ones
    pub fn with_repeated_records(mut self) -> Self {
        self.repeated = true;
        self
    }

    pub fn failing_on(self, unit: &str) -> Self {
        self.failing.lock().unwrap().insert(unit.to_string());
        self
    }

    pub fn recover(&self, unit: &str) {
        self.failing.lock().unwrap().remove(unit);
    }

    /// Units passed to `extract_unit`, in call order, failures included
    pub fn extracted(&self) -> Vec<String> {
        self.extracted.lock().unwrap().clone()
    }
}

#[async_trait]
impl UnitExtractor for ScriptedExtractor {
    async fn discover_units(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.units.clone())
    }

    async fn extract_unit(&self, unit: &str) -> anyhow::Result<Vec<LogRecord>> {
        self.extracted.lock().unwrap().push(unit.to_string());
        if self.failing.lock().unwrap().contains(unit) {
            anyhow::bail!("source unavailable while reading {unit}");
        }
        let count = self.counts.get(unit).copied().unwrap_or_default();
        if self.repeated {
            Ok(repeated_records(unit, count))
        } else {
            Ok(unit_records(unit, count))
        }
    }
}

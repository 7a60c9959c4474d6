// Export configuration: YAML file plus command-line overrides

use crate::error::{ExportError, Result};
use crate::export::refers_to_same_file;
use crate::filter::FilterSpec;
use crate::jsonl::SchemaOptions;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const MS_PER_DAY: i64 = 86_400_000;

/// Every recognized option. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    pub store_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    /// Inclusive lower bound: `YYYY-MM-DD`, RFC 3339, or epoch milliseconds
    pub from_date: Option<String>,
    /// Inclusive upper bound; a bare date means the end of that day (UTC)
    pub to_date: Option<String>,
    /// Last N days up to now; cannot be combined with `from_date`
    pub days: Option<u32>,
    #[serde(default)]
    pub decks: Vec<String>,
    #[serde(default)]
    pub card_types: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub min_interval: Option<i64>,
    /// Field indexes to export; empty or absent means every field
    pub fields: Option<Vec<usize>>,
    #[serde(default)]
    pub include_ids: bool,
    #[serde(default)]
    pub include_iso_time: bool,
    #[serde(default)]
    pub keep_markup: bool,
    #[serde(default)]
    pub compact: bool,
    pub timeout_secs: Option<u64>,
}

/// Validated configuration, ready to run
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPlan {
    pub store_path: PathBuf,
    pub output_path: PathBuf,
    pub filter: FilterSpec,
    pub schema: SchemaOptions,
    pub timeout: Option<Duration>,
}

impl ExportConfig {
    /// Load a YAML config file. An empty file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ExportError::config(format!("cannot read config file {}: {}", path.display(), e)))?;
        Self::from_yaml(&content).map_err(|e| match e {
            ExportError::Configuration(msg) => ExportError::config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| ExportError::config(e.to_string()))
    }

    /// Layer `overrides` on top of `self`; set values and non-empty lists win
    pub fn merge(self, overrides: ExportConfig) -> Self {
        fn list(base: Vec<String>, over: Vec<String>) -> Vec<String> {
            if over.is_empty() { base } else { over }
        }

        Self {
            store_path: overrides.store_path.or(self.store_path),
            output_path: overrides.output_path.or(self.output_path),
            from_date: overrides.from_date.or(self.from_date),
            to_date: overrides.to_date.or(self.to_date),
            days: overrides.days.or(self.days),
            decks: list(self.decks, overrides.decks),
            card_types: list(self.card_types, overrides.card_types),
            tags: list(self.tags, overrides.tags),
            min_interval: overrides.min_interval.or(self.min_interval),
            fields: overrides.fields.or(self.fields),
            include_ids: self.include_ids || overrides.include_ids,
            include_iso_time: self.include_iso_time || overrides.include_iso_time,
            keep_markup: self.keep_markup || overrides.keep_markup,
            compact: self.compact || overrides.compact,
            timeout_secs: overrides.timeout_secs.or(self.timeout_secs),
        }
    }

    /// Validate and build the plan. `now` anchors the `days` window.
    pub fn resolve(self, now: DateTime<Utc>) -> Result<ExportPlan> {
        let store_path = self
            .store_path
            .ok_or_else(|| ExportError::config("store_path is required"))?;
        let output_path = self
            .output_path
            .ok_or_else(|| ExportError::config("output_path is required"))?;

        if output_path.as_os_str().is_empty() || output_path.file_name().is_none() {
            return Err(ExportError::config(format!(
                "output_path {} is not a file path",
                output_path.display()
            )));
        }
        if refers_to_same_file(&store_path, &output_path) {
            return Err(ExportError::config("output_path must differ from store_path"));
        }

        let earliest = match (self.days, &self.from_date) {
            (Some(_), Some(_)) => return Err(ExportError::config("days and from_date cannot be combined")),
            (Some(0), None) => return Err(ExportError::config("days must be at least 1")),
            (Some(days), None) => Some(now.timestamp_millis() - i64::from(days) * MS_PER_DAY),
            (None, Some(from)) => Some(parse_date_bound(from, DateBound::Start)?),
            (None, None) => None,
        };
        let latest = self
            .to_date
            .as_deref()
            .map(|to| parse_date_bound(to, DateBound::End))
            .transpose()?;

        let filter = FilterSpec::new()
            .with_time_range(earliest, latest)
            .with_decks(&self.decks)
            .with_card_types(&self.card_types)
            .with_tags(&self.tags)
            .with_min_interval(self.min_interval);

        if filter.is_empty_range() {
            return Err(ExportError::config(format!(
                "from_date is after to_date ({} > {})",
                earliest.unwrap_or_default(),
                latest.unwrap_or_default()
            )));
        }
        if self.timeout_secs == Some(0) {
            return Err(ExportError::config("timeout_secs must be at least 1"));
        }

        let plan = ExportPlan {
            store_path,
            output_path,
            filter,
            schema: SchemaOptions {
                include_ids: self.include_ids,
                include_iso_time: self.include_iso_time,
                keep_markup: self.keep_markup,
                field_indexes: self.fields.filter(|indexes| !indexes.is_empty()),
                compact: self.compact,
            },
            timeout: self.timeout_secs.map(Duration::from_secs),
        };
        debug!(?plan, "Resolved export configuration");
        Ok(plan)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    /// First millisecond of a bare date
    Start,
    /// Last millisecond of a bare date
    End,
}

/// Parse a date option into epoch milliseconds (UTC)
pub fn parse_date_bound(value: &str, bound: DateBound) -> Result<i64> {
    let value = value.trim();

    if let Ok(ms) = value.parse::<i64>() {
        return Ok(ms);
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.timestamp_millis());
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ExportError::config(format!(
            "invalid date '{}': expected YYYY-MM-DD, RFC 3339, or epoch milliseconds",
            value
        ))
    })?;
    let time = match bound {
        DateBound::Start => NaiveTime::MIN,
        DateBound::End => NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
            .ok_or_else(|| ExportError::config("invalid end-of-day time"))?,
    };
    Ok(date.and_time(time).and_utc().timestamp_millis())
}

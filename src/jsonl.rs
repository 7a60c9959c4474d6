// JSONL encoding of joined review records

use crate::markup::clean_field;
use crate::models::{Grade, Interval, JoinedRecord, NoteField, ReviewType};
use chrono::DateTime;
use eyre::{Context, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{info, warn};

/// Output knobs that change line content but not which records are emitted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaOptions {
    /// Add `card_id`, `note_id`, `deck_id`
    pub include_ids: bool,
    /// Add `timestamp_iso` (UTC, second precision)
    pub include_iso_time: bool,
    /// Emit field text verbatim instead of cleaned plain text
    pub keep_markup: bool,
    /// 0-based field indexes to export; `None` or an empty list exports
    /// every field. Repeated indexes are exported once.
    pub field_indexes: Option<Vec<usize>>,
    /// Short keys, no deck or card type, field values as a list
    pub compact: bool,
}

/// Note fields as a JSON object in note-type field order
struct NoteFieldsOut(Vec<(String, String)>);

impl NoteFieldsOut {
    fn build(fields: &[NoteField], options: &SchemaOptions) -> Self {
        let text = |f: &NoteField| {
            if options.keep_markup {
                f.value.clone()
            } else {
                clean_field(&f.value)
            }
        };

        let selected: Vec<(String, String)> = match options.field_indexes.as_deref() {
            Some(indexes) if !indexes.is_empty() => {
                let mut seen = HashSet::new();
                indexes
                    .iter()
                    .filter(|&&i| seen.insert(i))
                    .filter_map(|&i| fields.get(i))
                    .map(|f| (f.name.clone(), text(f)))
                    .collect()
            }
            _ => fields.iter().map(|f| (f.name.clone(), text(f))).collect(),
        };
        Self(selected)
    }

    fn into_values(self) -> Vec<String> {
        self.0.into_iter().map(|(_, value)| value).collect()
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for NoteFieldsOut {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// One output line. Field order here is the order on the wire.
#[derive(Serialize)]
struct ReviewLine<'a> {
    event_id: i64,
    timestamp_ms: i64,
    deck: &'a str,
    card_type: &'a str,
    #[serde(skip_serializing_if = "NoteFieldsOut::is_empty")]
    note_fields: NoteFieldsOut,
    grade: Grade,
    elapsed_ms: i64,
    interval_days: Interval,
    prior_interval_days: Interval,
    review_type: ReviewType,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp_iso: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    card_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deck_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ease_factor: Option<f64>,
}

/// Compact line: short keys to keep exports small when fed to a language model
#[derive(Serialize)]
struct CompactLine {
    id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    t: Option<String>,
    rt: ReviewType,
    e: Grade,
    i: Interval,
    li: Interval,
    #[serde(skip_serializing_if = "Option::is_none")]
    f: Option<f64>,
    ms: i64,
    flds: Vec<String>,
}

fn ease_factor(permille: i64) -> Option<f64> {
    (permille > 0).then(|| permille as f64 / 1000.0)
}

fn iso_time(timestamp_ms: i64) -> Option<String> {
    DateTime::from_timestamp_millis(timestamp_ms).map(|t| t.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

/// Encode a record as one JSON object, without the trailing newline
///
/// Optional values that are absent are left out rather than written as null.
pub fn serialize(record: &JoinedRecord, options: &SchemaOptions) -> serde_json::Result<String> {
    let event = &record.event;
    if options.compact {
        return serde_json::to_string(&CompactLine {
            id: event.id,
            t: iso_time(event.timestamp_ms()),
            rt: event.review_type,
            e: event.grade,
            i: event.interval,
            li: event.prior_interval,
            f: ease_factor(event.ease_factor),
            ms: event.elapsed_ms,
            flds: NoteFieldsOut::build(&record.note.fields, options).into_values(),
        });
    }

    let line = ReviewLine {
        event_id: event.id,
        timestamp_ms: event.timestamp_ms(),
        deck: &record.deck.name,
        card_type: &record.card_type,
        note_fields: NoteFieldsOut::build(&record.note.fields, options),
        grade: event.grade,
        elapsed_ms: event.elapsed_ms,
        interval_days: event.interval,
        prior_interval_days: event.prior_interval,
        review_type: event.review_type,
        timestamp_iso: if options.include_iso_time {
            iso_time(event.timestamp_ms())
        } else {
            None
        },
        card_id: options.include_ids.then_some(record.card.id),
        note_id: options.include_ids.then_some(record.note.id),
        deck_id: options.include_ids.then_some(record.deck.id),
        ease_factor: ease_factor(event.ease_factor),
    };
    serde_json::to_string(&line)
}

/// An exported line read back
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportedReview {
    pub event_id: i64,
    pub timestamp_ms: i64,
    pub deck: String,
    pub card_type: String,
    #[serde(default)]
    pub note_fields: BTreeMap<String, String>,
    pub grade: Grade,
    pub elapsed_ms: i64,
    pub interval_days: f64,
    pub prior_interval_days: f64,
    pub review_type: ReviewType,
    pub timestamp_iso: Option<String>,
    pub card_id: Option<i64>,
    pub note_id: Option<i64>,
    pub deck_id: Option<i64>,
    pub ease_factor: Option<f64>,
}

/// A compact line read back
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompactReview {
    pub id: i64,
    pub t: Option<String>,
    pub rt: ReviewType,
    pub e: Grade,
    pub i: f64,
    pub li: f64,
    pub f: Option<f64>,
    pub ms: i64,
    #[serde(default)]
    pub flds: Vec<String>,
}

/// Any line an export can contain
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ExportedLine {
    Full(ExportedReview),
    Compact(CompactReview),
}

impl ExportedLine {
    pub fn event_id(&self) -> i64 {
        match self {
            ExportedLine::Full(r) => r.event_id,
            ExportedLine::Compact(r) => r.id,
        }
    }
}

/// Outcome of checking an export file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub lines: u64,
    pub valid: u64,
    pub malformed: u64,
    /// Lines whose event id is not greater than the previous line's
    pub out_of_order: u64,
    pub missing_final_newline: bool,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.malformed == 0 && self.out_of_order == 0 && !self.missing_final_newline
    }
}

/// Read every line of an export, returning the parsed records and a report
///
/// Malformed lines are logged and skipped.
pub fn read_export(path: &Path) -> Result<(Vec<ExportedLine>, VerifyReport)> {
    let file = File::open(path).context("Failed to open export file")?;
    let mut reader = BufReader::new(file);
    let mut report = VerifyReport::default();
    let mut records = Vec::new();
    let mut last_id: Option<i64> = None;

    for (line_num, line) in reader.by_ref().lines().enumerate() {
        let line = line.context("Failed to read export file")?;
        report.lines += 1;

        let record: ExportedLine = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    file = ?path,
                    line = line_num + 1,
                    error = ?e,
                    "Malformed export line"
                );
                report.malformed += 1;
                continue;
            }
        };

        let event_id = record.event_id();
        if last_id.is_some_and(|prev| event_id <= prev) {
            warn!(
                file = ?path,
                line = line_num + 1,
                event_id,
                "Export line out of order"
            );
            report.out_of_order += 1;
        }
        last_id = Some(event_id);
        report.valid += 1;
        records.push(record);
    }

    report.missing_final_newline = !ends_with_newline(reader.get_mut())?;

    info!(file = ?path, lines = report.lines, valid = report.valid, "Read export file");
    Ok((records, report))
}

/// Check an export file without keeping its records
pub fn verify_export(path: &Path) -> Result<VerifyReport> {
    read_export(path).map(|(_, report)| report)
}

fn ends_with_newline(file: &mut File) -> Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

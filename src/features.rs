//! Transaction batch preprocessing into a time-ordered feature table.
//!
//! Every derivation step is best-effort: a value that fails to parse degrades
//! that row's dependent features only, and a step whose input column is absent
//! from the batch is skipped and reported. Preprocessing never fails.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Baseline used when deriving a running balance from signed amounts.
pub const STARTING_BALANCE: f64 = 1000.0;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureStep {
    DateParsing,
    AmountCoercion,
    DayOfWeek,
    RunningBalance,
    CategoryEncoding,
}

/// Where the `balance` column of the table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceSource {
    /// At least one input row supplied `balance`; supplied values are used
    /// verbatim and the running computation is skipped entirely.
    Supplied,
    /// Derived as a running cumulative sum of `amount` from the baseline.
    Derived,
    /// Neither supplied balances nor an amount column were available.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Position of the originating element in the input sequence.
    pub source_index: usize,
    pub id: Option<String>,
    pub date: Option<NaiveDate>,
    /// Monday = 0 .. Sunday = 6, present only when `date` parsed.
    pub day_of_week: Option<u8>,
    pub amount: Option<f64>,
    pub balance: Option<f64>,
    pub category: Option<String>,
    /// Indicator flags aligned with the table's `category_labels`.
    pub category_flags: Vec<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    /// Sorted distinct category values observed in this batch only.
    pub category_labels: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Balance of the last row in table order, when it has one.
    pub fn last_balance(&self) -> Option<f64> {
        self.rows.last().and_then(|row| row.balance)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessReport {
    pub input_rows: u64,
    pub date_parse_failures: u64,
    pub amount_parse_failures: u64,
    pub balance_source: BalanceSource,
    pub skipped_steps: Vec<FeatureStep>,
}

impl Default for PreprocessReport {
    fn default() -> Self {
        Self {
            input_rows: 0,
            date_parse_failures: 0,
            amount_parse_failures: 0,
            balance_source: BalanceSource::Unavailable,
            skipped_steps: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepOutcome {
    Applied,
    Skipped,
}

#[derive(Debug, Clone)]
struct Record {
    row: FeatureRow,
    date_raw: Option<Value>,
    amount_raw: Option<Value>,
    balance_raw: Option<Value>,
}

impl Record {
    fn from_value(source_index: usize, value: &Value) -> Self {
        let object = value.as_object();
        let field = |name: &str| object.and_then(|map| map.get(name));
        Self {
            row: FeatureRow {
                source_index,
                id: field("id").and_then(coerce_identifier),
                date: None,
                day_of_week: None,
                amount: None,
                balance: None,
                category: field("category").and_then(Value::as_str).map(str::to_string),
                category_flags: Vec::new(),
            },
            date_raw: field("date").cloned(),
            amount_raw: field("amount").cloned(),
            balance_raw: field("balance").cloned(),
        }
    }
}

/// Builds a [`FeatureTable`] from a JSON value holding a sequence of
/// transaction-like objects.
///
/// Input that is not a sequence at all degrades to an empty table; callers
/// treat "no data" and "unparseable data" identically. Every input element
/// yields exactly one row.
pub fn preprocess(transactions: &Value) -> (FeatureTable, PreprocessReport) {
    let mut report = PreprocessReport::default();

    let Some(items) = transactions.as_array() else {
        warn!(
            component = "features",
            event = "features.preprocess.non_tabular",
            input_type = value_type_name(transactions)
        );
        return (FeatureTable::default(), report);
    };

    report.input_rows = items.len() as u64;
    info!(
        component = "features",
        event = "features.preprocess.start",
        input_rows = report.input_rows
    );

    let mut records: Vec<Record> = items
        .iter()
        .enumerate()
        .map(|(idx, item)| Record::from_value(idx, item))
        .collect();

    let outcome = derive_dates(&mut records, &mut report);
    note_step(FeatureStep::DateParsing, outcome, &mut report);

    let outcome = derive_amounts(&mut records, &mut report);
    note_step(FeatureStep::AmountCoercion, outcome, &mut report);

    // Dated rows ascending; undated rows after, in original relative order.
    records.sort_by_key(|record| (record.row.date.is_none(), record.row.date));

    let outcome = derive_day_of_week(&mut records);
    note_step(FeatureStep::DayOfWeek, outcome, &mut report);

    let outcome = derive_balances(&mut records, &mut report);
    note_step(FeatureStep::RunningBalance, outcome, &mut report);

    let (category_labels, outcome) = encode_categories(&mut records);
    note_step(FeatureStep::CategoryEncoding, outcome, &mut report);

    info!(
        component = "features",
        event = "features.preprocess.finish",
        output_rows = records.len(),
        date_parse_failures = report.date_parse_failures,
        amount_parse_failures = report.amount_parse_failures,
        balance_source = ?report.balance_source,
        category_columns = category_labels.len()
    );

    let rows = records.into_iter().map(|record| record.row).collect();
    (
        FeatureTable {
            category_labels,
            rows,
        },
        report,
    )
}

fn derive_dates(records: &mut [Record], report: &mut PreprocessReport) -> StepOutcome {
    if !records.iter().any(|record| record.date_raw.is_some()) {
        return StepOutcome::Skipped;
    }

    for record in records.iter_mut() {
        match &record.date_raw {
            None | Some(Value::Null) => {}
            Some(Value::String(raw)) => match parse_transaction_date(raw) {
                Some(date) => record.row.date = Some(date),
                None => {
                    report.date_parse_failures += 1;
                    warn!(
                        component = "features",
                        event = "features.preprocess.date_unparsed",
                        source_index = record.row.source_index,
                        raw = raw.as_str()
                    );
                }
            },
            Some(other) => {
                report.date_parse_failures += 1;
                warn!(
                    component = "features",
                    event = "features.preprocess.date_unparsed",
                    source_index = record.row.source_index,
                    input_type = value_type_name(other)
                );
            }
        }
    }

    StepOutcome::Applied
}

fn derive_amounts(records: &mut [Record], report: &mut PreprocessReport) -> StepOutcome {
    if !records.iter().any(|record| record.amount_raw.is_some()) {
        return StepOutcome::Skipped;
    }

    for record in records.iter_mut() {
        match &record.amount_raw {
            None | Some(Value::Null) => {}
            Some(raw) => match coerce_number(raw) {
                Some(amount) => record.row.amount = Some(amount),
                None => {
                    report.amount_parse_failures += 1;
                    warn!(
                        component = "features",
                        event = "features.preprocess.amount_uncoercible",
                        source_index = record.row.source_index,
                        input_type = value_type_name(raw)
                    );
                }
            },
        }
    }

    StepOutcome::Applied
}

fn derive_day_of_week(records: &mut [Record]) -> StepOutcome {
    if !records.iter().any(|record| record.row.date.is_some()) {
        return StepOutcome::Skipped;
    }

    for record in records.iter_mut() {
        record.row.day_of_week = record
            .row
            .date
            .map(|date| date.weekday().num_days_from_monday() as u8);
    }

    StepOutcome::Applied
}

fn derive_balances(records: &mut [Record], report: &mut PreprocessReport) -> StepOutcome {
    let any_supplied = records
        .iter()
        .any(|record| matches!(&record.balance_raw, Some(value) if !value.is_null()));

    if any_supplied {
        for record in records.iter_mut() {
            record.row.balance = record.balance_raw.as_ref().and_then(coerce_number);
        }
        report.balance_source = BalanceSource::Supplied;
        return StepOutcome::Applied;
    }

    if records.iter().any(|record| record.amount_raw.is_some()) {
        let mut running = STARTING_BALANCE;
        for record in records.iter_mut() {
            // Uncoercible amounts contribute nothing but the row keeps a balance.
            running += record.row.amount.unwrap_or(0.0);
            record.row.balance = Some(running);
        }
        report.balance_source = BalanceSource::Derived;
        return StepOutcome::Applied;
    }

    report.balance_source = BalanceSource::Unavailable;
    StepOutcome::Skipped
}

fn encode_categories(records: &mut [Record]) -> (Vec<String>, StepOutcome) {
    let distinct: BTreeSet<String> = records
        .iter()
        .filter_map(|record| record.row.category.clone())
        .collect();

    if distinct.is_empty() {
        return (Vec::new(), StepOutcome::Skipped);
    }

    let labels: Vec<String> = distinct.into_iter().collect();
    for record in records.iter_mut() {
        record.row.category_flags = labels
            .iter()
            .map(|label| record.row.category.as_deref() == Some(label.as_str()))
            .collect();
    }

    (labels, StepOutcome::Applied)
}

fn note_step(step: FeatureStep, outcome: StepOutcome, report: &mut PreprocessReport) {
    if outcome == StepOutcome::Skipped {
        debug!(
            component = "features",
            event = "features.preprocess.step_skipped",
            step = ?step
        );
        report.skipped_steps.push(step);
    }
}

fn parse_transaction_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }

    None
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn coerce_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => Some(raw.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

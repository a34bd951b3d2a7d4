//! Anomaly scoring over a preprocessed transaction table.
//!
//! [`RandomSampleDetector`] is a conforming stub behind the
//! [`AnomalyDetector`] contract: it samples rows uniformly without replacement
//! and assigns uniformly drawn high-confidence scores. The contract fixes the
//! shape of the result set so an isolation-forest-style estimator can be
//! substituted without changing callers.

use rand::{seq::index, thread_rng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::features::FeatureTable;

/// Expected fraction of transactions treated as anomalous.
pub const DEFAULT_CONTAMINATION: f64 = 0.05;

const SCORE_MIN: f64 = 0.70;
const SCORE_MAX: f64 = 1.00;

/// Closed set of human-readable anomaly explanations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyReason {
    #[serde(rename = "Unusual amount")]
    UnusualAmount,
    #[serde(rename = "Unusual merchant")]
    UnusualMerchant,
    #[serde(rename = "Unusual time")]
    UnusualTime,
    #[serde(rename = "Unusual location")]
    UnusualLocation,
    #[serde(rename = "Pattern deviation")]
    PatternDeviation,
}

impl AnomalyReason {
    pub const ALL: [AnomalyReason; 5] = [
        AnomalyReason::UnusualAmount,
        AnomalyReason::UnusualMerchant,
        AnomalyReason::UnusualTime,
        AnomalyReason::UnusualLocation,
        AnomalyReason::PatternDeviation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnusualAmount => "Unusual amount",
            Self::UnusualMerchant => "Unusual merchant",
            Self::UnusualTime => "Unusual time",
            Self::UnusualLocation => "Unusual location",
            Self::PatternDeviation => "Pattern deviation",
        }
    }
}

/// The flagged row's `id` when the input supplied one, else its positional
/// index in the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransactionId {
    Supplied(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub transaction_id: TransactionId,
    /// In [0.70, 1.00], rounded to 4 decimals.
    pub anomaly_score: f64,
    pub reason: AnomalyReason,
}

/// Contract for anything that flags a subset of table rows as anomalous.
pub trait AnomalyDetector {
    fn detect(
        &self,
        table: &FeatureTable,
        contamination: f64,
        rng: &mut dyn RngCore,
    ) -> Vec<AnomalyRecord>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSampleDetector;

impl AnomalyDetector for RandomSampleDetector {
    fn detect(
        &self,
        table: &FeatureTable,
        contamination: f64,
        rng: &mut dyn RngCore,
    ) -> Vec<AnomalyRecord> {
        if table.is_empty() {
            return Vec::new();
        }

        let count = flagged_count(table.len(), contamination);
        let selected = index::sample(&mut *rng, table.len(), count);

        let mut records = Vec::with_capacity(count);
        for idx in selected.iter() {
            // Skip-and-continue: a missing row never aborts the whole call.
            let Some(row) = table.rows.get(idx) else {
                continue;
            };
            let transaction_id = match &row.id {
                Some(id) => TransactionId::Supplied(id.clone()),
                None => TransactionId::Index(idx),
            };
            let reason = AnomalyReason::ALL[rng.gen_range(0..AnomalyReason::ALL.len())];
            records.push(AnomalyRecord {
                transaction_id,
                anomaly_score: round4(rng.gen_range(SCORE_MIN..=SCORE_MAX)),
                reason,
            });
        }

        records
    }
}

/// Flags `max(1, floor(rows * contamination))` transactions, clamped to the
/// row count, using thread-local randomness.
pub fn detect(table: &FeatureTable, contamination: f64) -> Vec<AnomalyRecord> {
    detect_with(table, contamination, &mut thread_rng())
}

/// [`detect`] with an explicit random source.
pub fn detect_with(
    table: &FeatureTable,
    contamination: f64,
    rng: &mut dyn RngCore,
) -> Vec<AnomalyRecord> {
    info!(
        component = "anomaly",
        event = "anomaly.detect.start",
        rows = table.len(),
        contamination = contamination
    );

    let records = RandomSampleDetector.detect(table, contamination, rng);

    info!(
        component = "anomaly",
        event = "anomaly.detect.finish",
        flagged = records.len()
    );

    records
}

fn flagged_count(rows: usize, contamination: f64) -> usize {
    let nominal = rows as f64 * contamination;
    // A negative or NaN product casts to 0; the minimum of one flag then holds.
    let floored = if nominal.is_finite() { nominal.floor() as usize } else { 0 };
    floored.max(1).min(rows)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

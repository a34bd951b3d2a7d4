//! Stochastic balance projection over a fixed daily horizon.
//!
//! [`RandomWalkProjector`] is a conforming stub behind the
//! [`BalanceProjector`] contract, not a fitted model: each day adds a normal
//! draw scaled to the starting balance plus a deterministic weekend spending
//! adjustment. Determinism across calls is not guaranteed; a caller that needs
//! reproducible output injects a seeded source through [`forecast_with`].

use chrono::{Datelike, Days, NaiveDate, Utc, Weekday};
use rand::{thread_rng, RngCore};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::features::FeatureTable;

pub const DEFAULT_HORIZON_DAYS: u32 = 30;
/// Starting point when the table carries no usable balance.
pub const FALLBACK_STARTING_BALANCE: f64 = 1000.0;
/// Projected balances never drop below this after a day's update.
pub const BALANCE_FLOOR: f64 = 100.0;

const DAILY_VOLATILITY_RATIO: f64 = 0.02;
const WEEKEND_SPEND_RATIO: f64 = 0.01;

/// One projected day. `balance` is rounded to 2 decimals at emission; the
/// running computation keeps full precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub balance: f64,
}

/// Contract for anything that projects a daily balance trajectory. A real
/// time-series model can replace [`RandomWalkProjector`] without changing
/// callers.
pub trait BalanceProjector {
    fn project(
        &self,
        table: &FeatureTable,
        horizon_days: u32,
        start_date: NaiveDate,
        rng: &mut dyn RngCore,
    ) -> Vec<ForecastPoint>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomWalkProjector;

impl BalanceProjector for RandomWalkProjector {
    fn project(
        &self,
        table: &FeatureTable,
        horizon_days: u32,
        start_date: NaiveDate,
        rng: &mut dyn RngCore,
    ) -> Vec<ForecastPoint> {
        if table.is_empty() {
            return Vec::new();
        }

        let start_balance = table.last_balance().unwrap_or(FALLBACK_STARTING_BALANCE);
        // Normal::new rejects a non-finite sigma; degrade to a flat walk then.
        let daily_delta = Normal::new(0.0, (start_balance * DAILY_VOLATILITY_RATIO).abs()).ok();

        let mut current = start_balance;
        let mut points = Vec::with_capacity(horizon_days as usize);
        for offset in 0..horizon_days {
            let Some(date) = start_date.checked_add_days(Days::new(u64::from(offset))) else {
                break;
            };

            let mut change = daily_delta
                .map(|dist| dist.sample(&mut *rng))
                .unwrap_or(0.0);
            if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                change -= start_balance * WEEKEND_SPEND_RATIO;
            }

            current = (current + change).max(BALANCE_FLOOR);
            points.push(ForecastPoint {
                date,
                balance: round2(current),
            });
        }

        points
    }
}

/// Projects `horizon_days` consecutive daily balances starting today, using
/// thread-local randomness.
pub fn forecast(table: &FeatureTable, horizon_days: u32) -> Vec<ForecastPoint> {
    forecast_with(
        table,
        horizon_days,
        Utc::now().date_naive(),
        &mut thread_rng(),
    )
}

/// [`forecast`] with an explicit start date and random source.
pub fn forecast_with(
    table: &FeatureTable,
    horizon_days: u32,
    start_date: NaiveDate,
    rng: &mut dyn RngCore,
) -> Vec<ForecastPoint> {
    info!(
        component = "forecast",
        event = "forecast.start",
        rows = table.len(),
        horizon_days = horizon_days,
        start_date = %start_date
    );

    let points = RandomWalkProjector.project(table, horizon_days, start_date, rng);

    info!(
        component = "forecast",
        event = "forecast.finish",
        points = points.len()
    );

    points
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

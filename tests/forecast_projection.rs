use chrono::{Days, NaiveDate};
use finsight_core::{
    forecast_with, preprocess, FeatureTable, BALANCE_FLOOR, DEFAULT_HORIZON_DAYS,
};
use rand::{rngs::StdRng, SeedableRng};
use regex::Regex;
use serde_json::json;

const START: &str = "2024-01-01"; // a Monday

fn start_date() -> NaiveDate {
    START.parse().expect("valid start date")
}

fn table_with_last_balance(balance: f64) -> FeatureTable {
    let (table, _) = preprocess(&json!([
        {"date": "2024-01-01", "amount": 10, "balance": 900.0},
        {"date": "2024-01-02", "amount": -5, "balance": balance}
    ]));
    table
}

#[test]
fn empty_table_forecasts_nothing() {
    let table = FeatureTable::default();
    let mut rng = StdRng::seed_from_u64(1);
    let points = forecast_with(&table, DEFAULT_HORIZON_DAYS, start_date(), &mut rng);
    assert!(points.is_empty());
}

#[test]
fn horizon_is_exact_and_dates_are_consecutive() {
    let table = table_with_last_balance(2500.0);

    for horizon in [1_u32, 7, 30, 90] {
        let mut rng = StdRng::seed_from_u64(7);
        let points = forecast_with(&table, horizon, start_date(), &mut rng);
        assert_eq!(points.len(), horizon as usize);

        for (offset, point) in points.iter().enumerate() {
            let expected = start_date()
                .checked_add_days(Days::new(offset as u64))
                .unwrap();
            assert_eq!(point.date, expected);
        }
    }
}

#[test]
fn zero_horizon_yields_no_points() {
    let table = table_with_last_balance(2500.0);
    let mut rng = StdRng::seed_from_u64(3);
    assert!(forecast_with(&table, 0, start_date(), &mut rng).is_empty());
}

#[test]
fn balances_never_drop_below_the_floor() {
    // A starting balance already at the floor forces the clamp on most days.
    let table = table_with_last_balance(BALANCE_FLOOR);

    for seed in 0..50 {
        let mut rng = StdRng::seed_from_u64(seed);
        let points = forecast_with(&table, DEFAULT_HORIZON_DAYS, start_date(), &mut rng);
        for point in &points {
            assert!(point.balance >= BALANCE_FLOOR, "balance {}", point.balance);
        }
    }
}

#[test]
fn emitted_balances_are_rounded_to_two_decimals() {
    let table = table_with_last_balance(3333.33);
    let mut rng = StdRng::seed_from_u64(11);
    let points = forecast_with(&table, DEFAULT_HORIZON_DAYS, start_date(), &mut rng);

    for point in &points {
        let cents = point.balance * 100.0;
        assert!(
            (cents - cents.round()).abs() < 1e-6,
            "balance {} is not 2dp-rounded",
            point.balance
        );
    }
}

#[test]
fn missing_balance_column_falls_back_to_the_baseline() {
    // Rows with neither amount nor balance leave the table without balances.
    let (table, _) = preprocess(&json!([{"category": "food"}, {"category": "rent"}]));
    assert_eq!(table.last_balance(), None);

    let mut rng = StdRng::seed_from_u64(21);
    let points = forecast_with(&table, DEFAULT_HORIZON_DAYS, start_date(), &mut rng);
    assert_eq!(points.len(), DEFAULT_HORIZON_DAYS as usize);

    // Fallback baseline is 1000; a 30-day 2% random walk stays well inside
    // this band for any seed we pin.
    for point in &points {
        assert!(point.balance > 300.0 && point.balance < 1700.0);
    }
}

#[test]
fn repeated_calls_preserve_shape_even_when_values_vary() {
    let table = table_with_last_balance(2000.0);

    let mut rng_a = StdRng::seed_from_u64(100);
    let mut rng_b = StdRng::seed_from_u64(200);
    let a = forecast_with(&table, DEFAULT_HORIZON_DAYS, start_date(), &mut rng_a);
    let b = forecast_with(&table, DEFAULT_HORIZON_DAYS, start_date(), &mut rng_b);

    assert_eq!(a.len(), b.len());
    let dates_a: Vec<NaiveDate> = a.iter().map(|p| p.date).collect();
    let dates_b: Vec<NaiveDate> = b.iter().map(|p| p.date).collect();
    assert_eq!(dates_a, dates_b);
}

#[test]
fn same_seed_reproduces_the_same_trajectory() {
    let table = table_with_last_balance(2000.0);

    let mut rng_a = StdRng::seed_from_u64(42);
    let mut rng_b = StdRng::seed_from_u64(42);
    let a = forecast_with(&table, DEFAULT_HORIZON_DAYS, start_date(), &mut rng_a);
    let b = forecast_with(&table, DEFAULT_HORIZON_DAYS, start_date(), &mut rng_b);
    assert_eq!(a, b);
}

#[test]
fn weekend_spending_pulls_the_average_trajectory_down() {
    // From Mon 2024-01-01, a 30-day window holds 8 weekend days, each costing
    // 1% of the starting balance. Averaged over many seeds the final balance
    // sits near start - 8% with the zero-mean noise washed out.
    let start_balance = 1_000_000.0;
    let table = table_with_last_balance(start_balance);

    let runs = 200;
    let mut total = 0.0;
    for seed in 0..runs {
        let mut rng = StdRng::seed_from_u64(seed);
        let points = forecast_with(&table, 30, start_date(), &mut rng);
        total += points.last().expect("non-empty forecast").balance;
    }
    let average = total / runs as f64;

    let expected = start_balance - 8.0 * 0.01 * start_balance;
    assert!(
        (average - expected).abs() < 0.04 * start_balance,
        "average final balance {average} too far from {expected}"
    );
}

#[test]
fn forecast_points_serialize_with_iso_dates() {
    let table = table_with_last_balance(1500.0);
    let mut rng = StdRng::seed_from_u64(5);
    let points = forecast_with(&table, 3, start_date(), &mut rng);

    let date_re = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    for point in &points {
        let value = serde_json::to_value(point).unwrap();
        let date = value["date"].as_str().expect("date serializes as string");
        assert!(date_re.is_match(date), "date={date}");
        assert!(value["balance"].is_number());
    }
}

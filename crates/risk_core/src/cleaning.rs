//! Data cleaning and derived order features
//!
//! Steps, applied in order by [`clean`]:
//! - `Return_Flag` coerced to 0/1 integers
//! - exact-duplicate rows dropped
//! - rows missing a present critical field dropped
//! - calendar features from `Order_Date`
//! - median price imputation and `High_Price_Flag`
//! - `Delivery_Issue_Flag`
//!
//! Unparseable dates and prices are never fatal; they are counted in the
//! [`CleaningReport`].

use crate::errors::{Result, RiskError};
use crate::schema::Field;
use crate::table::{OrderTable, Value};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Quantile above which an order counts as high-priced
pub const HIGH_PRICE_QUANTILE: f64 = 0.75;

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%d-%b-%Y", "%b %d, %Y",
];

/// What the cleaner did to a table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub duplicates_removed: usize,
    pub incomplete_removed: usize,
    pub unparseable_dates: usize,
    pub imputed_prices: usize,
    pub price_median: Option<f64>,
    pub price_threshold: Option<f64>,
    pub output_rows: usize,
}

/// Run every cleaning and feature-building step
#[instrument(skip(table), fields(rows = table.len()))]
pub fn clean(table: OrderTable) -> Result<(OrderTable, CleaningReport)> {
    let mut report = CleaningReport {
        input_rows: table.len(),
        ..Default::default()
    };

    // Unlabeled tables reach here only under an optional label policy
    let table = if table.schema().has(Field::ReturnFlag) {
        coerce_return_flag(table)?
    } else {
        table
    };

    let (table, duplicates) = drop_duplicates(table);
    report.duplicates_removed = duplicates;

    let (table, incomplete) = drop_incomplete(table);
    report.incomplete_removed = incomplete;

    let (table, unparseable) = derive_calendar_features(table)?;
    report.unparseable_dates = unparseable;

    let (table, price) = derive_price_features(table)?;
    report.imputed_prices = price.imputed;
    report.price_median = price.median;
    report.price_threshold = price.threshold;

    let table = derive_delivery_flag(table)?;
    report.output_rows = table.len();

    info!(
        "Cleaned {} → {} rows ({} duplicates, {} incomplete)",
        report.input_rows, report.output_rows, report.duplicates_removed, report.incomplete_removed
    );
    Ok((table, report))
}

/// Parse `Return_Flag` into integer 0/1; missing cells stay missing
pub fn coerce_return_flag(table: OrderTable) -> Result<OrderTable> {
    let Some(raw) = table.field(Field::ReturnFlag) else {
        return Err(RiskError::Schema(format!("missing '{}' column", Field::ReturnFlag)));
    };

    let coerced = raw
        .iter()
        .enumerate()
        .map(|(row, value)| match value {
            Value::Missing => Ok(Value::Missing),
            other => parse_label(other)
                .map(Value::Int)
                .ok_or_else(|| RiskError::InvalidLabel {
                    row: row + 1,
                    value: other.render(),
                }),
        })
        .collect::<Result<Vec<_>>>()?;

    table.with_column(Field::ReturnFlag.column(), coerced)
}

fn parse_label(value: &Value) -> Option<i64> {
    let label = match value {
        Value::Int(i) => *i,
        Value::Float(f) if f.fract() == 0.0 => *f as i64,
        Value::Text(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                1
            } else if s.eq_ignore_ascii_case("false") {
                0
            } else if let Ok(i) = s.parse::<i64>() {
                i
            } else {
                let f = s.parse::<f64>().ok()?;
                if f.fract() != 0.0 {
                    return None;
                }
                f as i64
            }
        }
        _ => return None,
    };
    matches!(label, 0 | 1).then_some(label)
}

/// Drop rows identical to an earlier row across every column
pub fn drop_duplicates(table: OrderTable) -> (OrderTable, usize) {
    let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(table.len());
    let keep: Vec<bool> = (0..table.len())
        .map(|i| {
            let key: Vec<String> = table
                .row(i)
                .into_iter()
                .map(|v| match v {
                    // Keep missing distinct from an empty-looking text cell
                    Value::Missing => "\u{0}".to_string(),
                    other => other.render(),
                })
                .collect();
            seen.insert(key)
        })
        .collect();

    let removed = keep.iter().filter(|k| !**k).count();
    if removed > 0 {
        debug!("Dropped {} duplicate rows", removed);
    }
    (table.retain_rows(&keep), removed)
}

/// Drop rows missing any critical field the schema carries
pub fn drop_incomplete(table: OrderTable) -> (OrderTable, usize) {
    let critical = table.schema().critical_present();
    let keep: Vec<bool> = (0..table.len())
        .map(|i| {
            critical.iter().all(|field| {
                table
                    .field(*field)
                    .map(|values| !values[i].is_missing())
                    .unwrap_or(true)
            })
        })
        .collect();

    let removed = keep.iter().filter(|k| !**k).count();
    if removed > 0 {
        debug!("Dropped {} rows missing {:?}", removed, critical);
    }
    (table.retain_rows(&keep), removed)
}

/// Parse a date cell; `None` when no known format matches
pub fn parse_order_date(raw: &str) -> Option<Value> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(date_value(dt.naive_local()));
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(date_value(dt));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, format) {
            return Some(Value::Date(d));
        }
    }
    None
}

fn date_value(dt: NaiveDateTime) -> Value {
    if dt.num_seconds_from_midnight() == 0 && dt.nanosecond() == 0 {
        Value::Date(dt.date())
    } else {
        Value::DateTime(dt)
    }
}

fn date_of(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Date(d) => Some(*d),
        Value::DateTime(dt) => Some(dt.date()),
        _ => None,
    }
}

/// Parse `Order_Date` and add `Order_Month` / `Order_DayOfWeek`
///
/// Returns the number of non-missing dates that failed to parse.
pub fn derive_calendar_features(table: OrderTable) -> Result<(OrderTable, usize)> {
    let Some(raw) = table.field(Field::OrderDate) else {
        return Ok((table, 0));
    };

    let mut unparseable = 0;
    let parsed: Vec<Value> = raw
        .iter()
        .map(|value| match value {
            Value::Text(s) => parse_order_date(s).unwrap_or_else(|| {
                unparseable += 1;
                Value::Missing
            }),
            Value::Date(_) | Value::DateTime(_) => value.clone(),
            _ => Value::Missing,
        })
        .collect();

    if unparseable > 0 {
        warn!("{} order dates could not be parsed and were set to missing", unparseable);
    }

    let months = parsed
        .iter()
        .map(|v| date_of(v).map_or(Value::Missing, |d| Value::Int(d.month() as i64)))
        .collect();
    let weekdays = parsed
        .iter()
        .map(|v| {
            date_of(v).map_or(Value::Missing, |d| {
                Value::Int(d.weekday().num_days_from_monday() as i64)
            })
        })
        .collect();

    let table = table
        .with_column(Field::OrderDate.column(), parsed)?
        .with_column(Field::OrderMonth.column(), months)?
        .with_column(Field::OrderDayOfWeek.column(), weekdays)?;
    Ok((table, unparseable))
}

/// Outcome of price imputation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSummary {
    pub imputed: usize,
    pub median: Option<f64>,
    pub threshold: Option<f64>,
}

/// Coerce `Price` to numbers, impute the median, add `High_Price_Flag`
pub fn derive_price_features(table: OrderTable) -> Result<(OrderTable, PriceSummary)> {
    let Some(raw) = table.field(Field::Price) else {
        return Ok((table, PriceSummary::default()));
    };

    let parsed: Vec<Option<f64>> = raw.iter().map(Value::as_f64).collect();
    let mut valid: Vec<f64> = parsed.iter().flatten().copied().collect();
    valid.sort_by(f64::total_cmp);

    let median = quantile(&valid, 0.5);
    let fill = median.unwrap_or_else(|| {
        if !parsed.is_empty() {
            warn!("No parseable prices; imputing 0.0");
        }
        0.0
    });

    let imputed = parsed.iter().filter(|p| p.is_none()).count();
    if imputed > 0 {
        warn!("Imputed {} unparseable prices with median {}", imputed, fill);
    }

    // A fully integral column with nothing imputed is written back as read
    let integral = imputed == 0 && raw.iter().all(|v| as_i64(v).is_some());
    let prices: Vec<f64> = parsed.iter().map(|p| p.unwrap_or(fill)).collect();
    let mut sorted = prices.clone();
    sorted.sort_by(f64::total_cmp);
    let threshold = quantile(&sorted, HIGH_PRICE_QUANTILE);

    let flags = prices
        .iter()
        .map(|p| Value::Int(threshold.is_some_and(|t| *p > t) as i64))
        .collect();

    let price_values: Vec<Value> = if integral {
        raw.iter().map(|v| as_i64(v).map_or(Value::Missing, Value::Int)).collect()
    } else {
        prices.into_iter().map(Value::Float).collect()
    };

    let table = table
        .with_column(Field::Price.column(), price_values)?
        .with_column(Field::HighPriceFlag.column(), flags)?;

    Ok((
        table,
        PriceSummary {
            imputed,
            median,
            threshold,
        },
    ))
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Text(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Add `Delivery_Issue_Flag` (1 when the issue reads "yes", any case)
pub fn derive_delivery_flag(table: OrderTable) -> Result<OrderTable> {
    let Some(raw) = table.field(Field::DeliveryIssue) else {
        return Ok(table);
    };

    let flags = raw
        .iter()
        .map(|v| Value::Int((v.render().to_lowercase() == "yes") as i64))
        .collect();
    table.with_column(Field::DeliveryIssueFlag.column(), flags)
}

/// Linear-interpolation quantile of sorted values
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

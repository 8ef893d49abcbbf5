//! CSV export of merged records.
//!
//! The layout is byte-compatible with the browser exporter it replaces:
//! `timestamp,x,y,z,resultant,velocity`, ISO-8601 UTC timestamps with
//! milliseconds, numbers with three decimals, rows joined by `\n` and no
//! trailing newline.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{FusionError, Result};
use crate::types::{ExportRecord, TimeUnit};

pub const CSV_HEADER: &str = "timestamp,x,y,z,resultant,velocity";

/// Format `x` with three fractional digits the way JavaScript's
/// `Number.prototype.toFixed(3)` does.
///
/// Rust rounds exact decimal ties to even, JavaScript away from zero. A double
/// only sits exactly on a third-decimal tie when it is an odd multiple of 1/16,
/// so those are rounded by hand and everything else goes through `format!`.
pub fn to_fixed(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let abs = x.abs();
    let sixteenths = abs * 16.0;
    let digits = if abs < 1e12 && sixteenths.fract() == 0.0 && sixteenths % 2.0 == 1.0 {
        let n = (abs * 1000.0).round() as u64;
        format!("{}.{:03}", n / 1000, n % 1000)
    } else {
        format!("{:.3}", abs)
    };

    // -0.0 < 0.0 is false, so negative zero prints unsigned
    if x < 0.0 {
        format!("-{}", digits)
    } else {
        digits
    }
}

/// ISO-8601 UTC with millisecond precision and a `Z` suffix.
pub fn iso_timestamp(t: i64, unit: TimeUnit) -> Result<String> {
    let dt = match unit {
        TimeUnit::Millis => DateTime::<Utc>::from_timestamp_millis(t),
        TimeUnit::Micros => DateTime::<Utc>::from_timestamp_micros(t),
    }
    .ok_or(FusionError::TimestampRange(t))?;
    Ok(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

pub fn csv_row(record: &ExportRecord, unit: TimeUnit) -> Result<String> {
    let velocity = match record.v {
        Some(v) => to_fixed(v),
        None => "NaN".to_string(),
    };
    Ok(format!(
        "{},{},{},{},{},{}",
        iso_timestamp(record.t, unit)?,
        to_fixed(record.x),
        to_fixed(record.y),
        to_fixed(record.z),
        to_fixed(record.resultant()),
        velocity
    ))
}

pub fn write_csv<W: Write>(writer: &mut W, records: &[ExportRecord], unit: TimeUnit) -> Result<()> {
    writer.write_all(CSV_HEADER.as_bytes())?;
    for record in records {
        writer.write_all(b"\n")?;
        writer.write_all(csv_row(record, unit)?.as_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_csv<P: AsRef<Path>>(path: P, records: &[ExportRecord], unit: TimeUnit) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_csv(&mut writer, records, unit)
}

/// `accel_fused_<epoch-ms>.csv`
pub fn default_export_name(now: DateTime<Utc>) -> String {
    format!("accel_fused_{}.csv", now.timestamp_millis())
}

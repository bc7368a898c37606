//! Display helpers used when flattening a [`DomainAsset`](crate::asset::DomainAsset)
//! into grid columns. All of them are pure and total.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::asset::{ExternalCalibration, TemperatureSensor};

pub fn format_bus_type(bus_type: Option<&str>) -> String {
    bus_type.unwrap_or_default().to_string()
}

pub fn format_slot_number(slot_number: Option<i64>) -> String {
    match slot_number {
        Some(slot) if slot >= 0 => slot.to_string(),
        _ => String::new(),
    }
}

pub fn format_temperature(reading: Option<f64>) -> String {
    match reading {
        Some(t) if t.is_finite() => format!("{t:.1} °C"),
        _ => String::new(),
    }
}

pub fn format_boolean(value: bool) -> String {
    String::from(if value { "True" } else { "False" })
}

/// ISO 8601 with millisecond precision, or empty when the calibration kind is
/// not supported or no date is known.
pub fn format_date(date: Option<DateTime<Utc>>, supported: bool) -> String {
    match date {
        Some(d) if supported => format_timestamp(&d),
        _ => String::new(),
    }
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn format_recommended_interval(months: Option<u32>, supported: bool) -> String {
    match months {
        Some(1) if supported => "1 month".to_string(),
        Some(m) if supported => format!("{m} months"),
        _ => String::new(),
    }
}

pub fn first_reading(sensors: &[TemperatureSensor]) -> Option<f64> {
    sensors.first().map(|s| s.reading)
}

/// A custom due date overrides the recommended one.
pub fn calibration_due_date(calibration: Option<&ExternalCalibration>) -> Option<DateTime<Utc>> {
    calibration.map(|c| c.next_custom_due_date.unwrap_or(c.next_recommended_date))
}

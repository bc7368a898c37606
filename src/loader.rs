use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use chrono::{DateTime, Utc};
use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::asset::{
    AlarmStatusUpdate, AssetLocation, AssetPresence, DomainAsset, ExternalCalibration,
    LocationState, SelfCalibration, StatusUpdate, TemperatureSensor,
};
use crate::domain::GridError;
use crate::row::Value;

// Separator for multi valued cells such as temperature readings.
const LIST_SEPARATOR: char = ';';

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// All columns of a frame, cast to strings.
struct StringTable {
    height: usize,
    columns: HashMap<String, Vec<Option<String>>>,
}

impl StringTable {
    fn require(&self, names: &[&str]) -> Result<(), GridError> {
        match names.iter().find(|n| !self.columns.contains_key(**n)) {
            Some(missing) => Err(GridError::MissingColumn(missing.to_string())),
            None => Ok(()),
        }
    }

    /// Cell text, `None` for missing columns, nulls and blank cells.
    fn text(&self, column: &str, row: usize) -> Option<&str> {
        self.columns
            .get(column)
            .and_then(|c| c.get(row))
            .and_then(|v| v.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn string(&self, column: &str, row: usize) -> String {
        self.text(column, row).unwrap_or_default().to_string()
    }

    fn required(&self, column: &str, row: usize) -> Result<&str, GridError> {
        self.text(column, row).ok_or_else(|| GridError::InvalidValue {
            column: column.to_string(),
            row,
            value: String::new(),
        })
    }

    fn parse<T: FromStr>(&self, column: &str, row: usize) -> Result<Option<T>, GridError> {
        self.text(column, row)
            .map(|s| s.parse::<T>().map_err(|_| invalid(column, row, s)))
            .transpose()
    }

    fn boolean(&self, column: &str, row: usize) -> Result<bool, GridError> {
        match self.text(column, row).map(str::to_ascii_lowercase).as_deref() {
            None | Some("false") | Some("0") => Ok(false),
            Some("true") | Some("1") => Ok(true),
            Some(other) => Err(invalid(column, row, other)),
        }
    }

    fn timestamp(&self, column: &str, row: usize) -> Result<Option<DateTime<Utc>>, GridError> {
        self.text(column, row)
            .map(|s| parse_timestamp(s).ok_or_else(|| invalid(column, row, s)))
            .transpose()
    }

    fn sensors(&self, column: &str, row: usize) -> Result<Vec<TemperatureSensor>, GridError> {
        let Some(cell) = self.text(column, row) else {
            return Ok(Vec::new());
        };
        cell.split(LIST_SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(idx, s)| {
                s.parse::<f64>()
                    .map(|reading| TemperatureSensor::new(format!("sensor{idx}"), reading))
                    .map_err(|_| invalid(column, row, s))
            })
            .collect()
    }
}

fn invalid(column: &str, row: usize, value: &str) -> GridError {
    GridError::InvalidValue {
        column: column.to_string(),
        row,
        value: value.to_string(),
    }
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Reads an asset snapshot. Nested fields use dotted column names, e.g.
/// `location.systemName` or `externalCalibration.nextRecommendedDate`.
pub fn load_assets(path: &Path) -> Result<Vec<DomainAsset>, GridError> {
    let table = load_table(path)?;
    table.require(&["id", "lastUpdatedTimestamp"])?;

    let start_time = Instant::now();
    let assets = (0..table.height)
        .into_par_iter()
        .map(|row| parse_asset(&table, row))
        .collect::<Result<Vec<DomainAsset>, GridError>>()?;
    info!(
        "Parsed {} assets in {}ms",
        assets.len(),
        start_time.elapsed().as_millis()
    );
    Ok(assets)
}

pub fn load_alarm_updates(path: &Path) -> Result<Vec<AlarmStatusUpdate>, GridError> {
    let table = load_table(path)?;
    table.require(&["assetId", "alarm", "lastUpdatedTimestamp"])?;
    (0..table.height)
        .map(|row| {
            Ok(AlarmStatusUpdate {
                asset_id: table.required("assetId", row)?.to_string(),
                alarm: Value::from(table.text("alarm", row)),
                last_updated_timestamp: required_timestamp(&table, row)?,
            })
        })
        .collect()
}

pub fn load_status_updates(path: &Path) -> Result<Vec<StatusUpdate>, GridError> {
    let table = load_table(path)?;
    table.require(&["assetId", "status", "lastUpdatedTimestamp"])?;
    (0..table.height)
        .map(|row| {
            Ok(StatusUpdate {
                asset_id: table.required("assetId", row)?.to_string(),
                status: Value::from(table.text("status", row)),
                last_updated_timestamp: required_timestamp(&table, row)?,
            })
        })
        .collect()
}

fn required_timestamp(table: &StringTable, row: usize) -> Result<DateTime<Utc>, GridError> {
    let raw = table.required("lastUpdatedTimestamp", row)?;
    parse_timestamp(raw).ok_or_else(|| invalid("lastUpdatedTimestamp", row, raw))
}

fn parse_asset(table: &StringTable, row: usize) -> Result<DomainAsset, GridError> {
    let supports_self_calibration = table.boolean("supportsSelfCalibration", row)?;
    let supports_external_calibration = table.boolean("supportsExternalCalibration", row)?;

    let self_calibration = table
        .timestamp("selfCalibration.date", row)?
        .map(|date| -> Result<SelfCalibration, GridError> {
            Ok(SelfCalibration {
                date,
                temperature_sensors: table.sensors("selfCalibration.temperatureSensors", row)?,
            })
        })
        .transpose()?;

    let external_calibration = match (
        table.timestamp("externalCalibration.date", row)?,
        table.timestamp("externalCalibration.nextRecommendedDate", row)?,
    ) {
        (Some(date), Some(next_recommended_date)) => Some(ExternalCalibration {
            date,
            recommended_interval: table.parse("externalCalibration.recommendedInterval", row)?,
            next_recommended_date,
            next_custom_due_date: table.timestamp("externalCalibration.nextCustomDueDate", row)?,
            temperature_sensors: table.sensors("externalCalibration.temperatureSensors", row)?,
        }),
        _ => None,
    };

    let location = AssetLocation {
        system_name: table.string("location.systemName", row),
        parent: table.string("location.parent", row),
        resource_uri: table.string("location.resourceUri", row),
        slot_number: table.parse("location.slotNumber", row)?,
        state: LocationState {
            asset_presence: table
                .text("location.state.assetPresence", row)
                .map(AssetPresence::parse)
                .unwrap_or_default(),
        },
    };

    let last_updated = required_timestamp(table, row)?;
    Ok(DomainAsset::new(table.required("id", row)?, last_updated)
        .name(table.string("name", row))
        .workspace(table.string("workspace", row))
        .serial_number(table.string("serialNumber", row))
        .model_name(table.string("modelName", row))
        .vendor_name(table.string("vendorName", row))
        .firmware_version(table.string("firmwareVersion", row))
        .hardware_version(table.string("hardwareVersion", row))
        .bus_type(table.text("busType", row).map(str::to_string))
        .visa_resource_name(table.string("visaResourceName", row))
        .location(location)
        .temperature_sensors(table.sensors("temperatureSensors", row)?)
        .supports_self_calibration(supports_self_calibration)
        .supports_external_calibration(supports_external_calibration)
        .self_calibration(self_calibration)
        .external_calibration(external_calibration)
        .is_ni_asset(table.boolean("isNIAsset", row)?))
}

fn load_table(path: &Path) -> Result<StringTable, GridError> {
    let file_info = get_file_info(path.to_path_buf())?;
    debug!(
        "Loading {:?} file {} ({} bytes)",
        file_info.file_type,
        file_info.path.display(),
        file_info.file_size
    );
    let frame = match file_info.file_type {
        FileType::CSV => load_csv(&file_info.path)?,
        FileType::PARQUET => load_parquet(&file_info.path)?,
        FileType::ARROW => load_arrow(&file_info.path)?,
    };

    // Each column is converted in its own thread.
    let df = frame.collect()?;
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let columns = names
        .par_iter()
        .map(|name| load_column(&df, name))
        .collect::<Result<HashMap<String, Vec<Option<String>>>, PolarsError>>()?;

    Ok(StringTable {
        height: df.height(),
        columns,
    })
}

fn load_column(df: &DataFrame, col_name: &str) -> Result<(String, Vec<Option<String>>), PolarsError> {
    let col = df.column(col_name)?.cast(&DataType::String)?;
    let series = col.str()?;
    let data = series
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect();
    Ok((col_name.to_string(), data))
}

fn detect_file_type(path: &Path) -> Result<FileType, GridError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(GridError::UnknownFileType),
    }
}

fn get_file_info(path: PathBuf) -> Result<FileInfo, GridError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => GridError::FileNotFound,
        ErrorKind::PermissionDenied => GridError::PermissionDenied,
        _ => GridError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(GridError::LoadingFailed("Not a file!".into()));
    }

    let file_size = metadata.len();
    let file_type = detect_file_type(&path)?;

    Ok(FileInfo {
        path,
        file_size,
        file_type,
    })
}

fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}

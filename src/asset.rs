use chrono::{DateTime, Utc};
use derive_setters::Setters;

use crate::format::{
    calibration_due_date, first_reading, format_boolean, format_bus_type, format_date,
    format_recommended_interval, format_slot_number, format_temperature,
};
use crate::row::{Row, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssetPresence {
    Initializing,
    Present,
    NotPresent,
    #[default]
    Unknown,
}

impl AssetPresence {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetPresence::Initializing => "INITIALIZING",
            AssetPresence::Present => "PRESENT",
            AssetPresence::NotPresent => "NOT_PRESENT",
            AssetPresence::Unknown => "UNKNOWN",
        }
    }

    /// Unrecognised values map to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "INITIALIZING" => AssetPresence::Initializing,
            "PRESENT" => AssetPresence::Present,
            "NOT_PRESENT" => AssetPresence::NotPresent,
            _ => AssetPresence::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureSensor {
    pub name: String,
    pub reading: f64,
}

impl TemperatureSensor {
    pub fn new(name: impl Into<String>, reading: f64) -> Self {
        Self {
            name: name.into(),
            reading,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocationState {
    pub asset_presence: AssetPresence,
}

#[derive(Debug, Clone, PartialEq, Default, Setters)]
#[setters(into)]
pub struct AssetLocation {
    pub system_name: String,
    pub parent: String,
    pub resource_uri: String,
    pub slot_number: Option<i64>,
    pub state: LocationState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelfCalibration {
    pub date: DateTime<Utc>,
    pub temperature_sensors: Vec<TemperatureSensor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExternalCalibration {
    pub date: DateTime<Utc>,
    /// Months between calibrations.
    pub recommended_interval: Option<u32>,
    pub next_recommended_date: DateTime<Utc>,
    pub next_custom_due_date: Option<DateTime<Utc>>,
    pub temperature_sensors: Vec<TemperatureSensor>,
}

/// An asset record as delivered by the data source.
#[derive(Debug, Clone, PartialEq, Setters)]
#[setters(into)]
pub struct DomainAsset {
    pub id: String,
    pub name: String,
    pub workspace: String,
    pub serial_number: String,
    pub model_name: String,
    pub vendor_name: String,
    pub firmware_version: String,
    pub hardware_version: String,
    pub bus_type: Option<String>,
    pub visa_resource_name: String,
    pub location: AssetLocation,
    pub temperature_sensors: Vec<TemperatureSensor>,
    pub supports_self_calibration: bool,
    pub supports_external_calibration: bool,
    pub self_calibration: Option<SelfCalibration>,
    pub external_calibration: Option<ExternalCalibration>,
    pub is_ni_asset: bool,
    pub last_updated_timestamp: DateTime<Utc>,
}

impl DomainAsset {
    pub fn new(id: impl Into<String>, last_updated_timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            workspace: String::new(),
            serial_number: String::new(),
            model_name: String::new(),
            vendor_name: String::new(),
            firmware_version: String::new(),
            hardware_version: String::new(),
            bus_type: None,
            visa_resource_name: String::new(),
            location: AssetLocation::default(),
            temperature_sensors: Vec::new(),
            supports_self_calibration: false,
            supports_external_calibration: false,
            self_calibration: None,
            external_calibration: None,
            is_ni_asset: false,
            last_updated_timestamp,
        }
    }
}

/// Flattened, display ready projection of a [`DomainAsset`].
///
/// `status`, `asset_alarm`, `job_status` and `utilization_status` are sticky:
/// they are never derived from the asset and survive recomputation.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetViewModel {
    pub id: String,
    pub system_name: String,
    pub name: String,
    pub asset_parent: String,
    pub workspace: String,
    pub serial_number: String,
    pub model_name: String,
    pub vendor_name: String,
    pub firmware_version: String,
    pub hardware_version: String,
    pub bus_type: String,
    pub visa_resource_name: String,
    pub resource_uri: String,
    pub slot_number: String,
    pub current_temperature: String,
    pub supports_calibration: String,
    pub supports_self_calibration: String,
    pub self_calibration_date: String,
    pub self_calibration_temperature: String,
    pub supports_external_calibration: String,
    pub external_calibration_date: String,
    pub external_calibration_recommended_interval: String,
    pub external_calibration_due_date: String,
    pub external_calibration_temperature: String,
    pub last_updated_timestamp: DateTime<Utc>,
    pub asset_presence: String,
    pub is_ni_asset: String,
    pub status: Option<Value>,
    pub asset_alarm: Option<Value>,
    pub job_status: String,
    pub utilization_status: String,
}

impl AssetViewModel {
    /// Derives the view-model with sticky fields at their defaults.
    pub fn from_asset(asset: &DomainAsset) -> Self {
        let self_supported = asset.supports_self_calibration;
        let external_supported = asset.supports_external_calibration;
        let external = asset.external_calibration.as_ref();

        let self_calibration_temperature = match &asset.self_calibration {
            Some(cal) if self_supported => format_temperature(first_reading(&cal.temperature_sensors)),
            _ => String::new(),
        };
        let external_calibration_temperature = match external {
            Some(cal) if external_supported => {
                format_temperature(first_reading(&cal.temperature_sensors))
            }
            _ => String::new(),
        };

        Self {
            id: asset.id.clone(),
            system_name: asset.location.system_name.clone(),
            name: asset.name.clone(),
            asset_parent: asset.location.parent.clone(),
            workspace: asset.workspace.clone(),
            serial_number: asset.serial_number.clone(),
            model_name: asset.model_name.clone(),
            vendor_name: asset.vendor_name.clone(),
            firmware_version: asset.firmware_version.clone(),
            hardware_version: asset.hardware_version.clone(),
            bus_type: format_bus_type(asset.bus_type.as_deref()),
            visa_resource_name: asset.visa_resource_name.clone(),
            resource_uri: asset.location.resource_uri.clone(),
            slot_number: format_slot_number(asset.location.slot_number),
            current_temperature: format_temperature(first_reading(&asset.temperature_sensors)),
            supports_calibration: format_boolean(self_supported || external_supported),
            supports_self_calibration: format_boolean(self_supported),
            self_calibration_date: format_date(
                asset.self_calibration.as_ref().map(|c| c.date),
                self_supported,
            ),
            self_calibration_temperature,
            supports_external_calibration: format_boolean(external_supported),
            external_calibration_date: format_date(external.map(|c| c.date), external_supported),
            external_calibration_recommended_interval: format_recommended_interval(
                external.and_then(|c| c.recommended_interval),
                external_supported,
            ),
            external_calibration_due_date: format_date(
                calibration_due_date(external),
                external_supported,
            ),
            external_calibration_temperature,
            last_updated_timestamp: asset.last_updated_timestamp,
            asset_presence: asset.location.state.asset_presence.as_str().to_string(),
            is_ni_asset: format_boolean(asset.is_ni_asset),
            status: None,
            asset_alarm: None,
            job_status: String::new(),
            utilization_status: String::new(),
        }
    }

    /// Copies the sticky fields of `previous` onto `self`.
    pub fn keep_sticky_from(&mut self, previous: &AssetViewModel) {
        self.status = previous.status.clone();
        self.asset_alarm = previous.asset_alarm.clone();
        self.job_status = previous.job_status.clone();
        self.utilization_status = previous.utilization_status.clone();
    }
}

impl From<&AssetViewModel> for Row {
    fn from(vm: &AssetViewModel) -> Self {
        Row::new(vm.id.clone())
            .with("systemName", vm.system_name.as_str())
            .with("name", vm.name.as_str())
            .with("assetParent", vm.asset_parent.as_str())
            .with("workspace", vm.workspace.as_str())
            .with("serialNumber", vm.serial_number.as_str())
            .with("modelName", vm.model_name.as_str())
            .with("vendorName", vm.vendor_name.as_str())
            .with("firmwareVersion", vm.firmware_version.as_str())
            .with("hardwareVersion", vm.hardware_version.as_str())
            .with("busType", vm.bus_type.as_str())
            .with("visaResourceName", vm.visa_resource_name.as_str())
            .with("resourceUri", vm.resource_uri.as_str())
            .with("slotNumber", vm.slot_number.as_str())
            .with("currentTemperature", vm.current_temperature.as_str())
            .with("supportsCalibration", vm.supports_calibration.as_str())
            .with("supportsSelfCalibration", vm.supports_self_calibration.as_str())
            .with("selfCalibrationDate", vm.self_calibration_date.as_str())
            .with("selfCalibrationTemperature", vm.self_calibration_temperature.as_str())
            .with("supportsExternalCalibration", vm.supports_external_calibration.as_str())
            .with("externalCalibrationDate", vm.external_calibration_date.as_str())
            .with(
                "externalCalibrationRecommendedInterval",
                vm.external_calibration_recommended_interval.as_str(),
            )
            .with("externalCalibrationDueDate", vm.external_calibration_due_date.as_str())
            .with(
                "externalCalibrationTemperatureSensors",
                vm.external_calibration_temperature.as_str(),
            )
            .with("lastUpdatedTimestamp", vm.last_updated_timestamp)
            .with("assetPresence", vm.asset_presence.as_str())
            .with("isNIAsset", vm.is_ni_asset.as_str())
            .with("status", vm.status.clone().unwrap_or_default())
            .with("assetAlarm", vm.asset_alarm.clone().unwrap_or_default())
            .with("jobStatus", vm.job_status.as_str())
            .with("utilizationStatus", vm.utilization_status.as_str())
    }
}

/// Alarm state pushed for a single asset.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmStatusUpdate {
    pub asset_id: String,
    pub alarm: Value,
    pub last_updated_timestamp: DateTime<Utc>,
}

/// Utilization status pushed for a single asset.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub asset_id: String,
    pub status: Value,
    pub last_updated_timestamp: DateTime<Utc>,
}

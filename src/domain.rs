use std::fmt;
use std::io::Error;

use derive_setters::Setters;
use polars::error::PolarsError;

use crate::row::Row;
use crate::table::{ColumnWidth, SortingProperty, TableState};

/// Data field used as fingerprint when nothing else is configured.
pub const DEFAULT_FINGERPRINT: &str = "lastUpdatedTimestamp";

#[derive(Debug)]
pub enum GridError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    PathExpansion(String),
    MissingColumn(String),
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },
    UnknownColumn(String),
    MissingParentField,
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::IoError(e) => write!(f, "io error: {e}"),
            GridError::PolarsError(e) => write!(f, "polars error: {e}"),
            GridError::LoadingFailed(msg) => write!(f, "loading failed: {msg}"),
            GridError::FileNotFound => write!(f, "file not found"),
            GridError::PermissionDenied => write!(f, "permission denied"),
            GridError::UnknownFileType => write!(f, "unknown file type"),
            GridError::PathExpansion(msg) => write!(f, "could not expand path: {msg}"),
            GridError::MissingColumn(name) => write!(f, "missing column \"{name}\""),
            GridError::InvalidValue { column, row, value } => {
                write!(f, "invalid value \"{value}\" in column \"{column}\", row {row}")
            }
            GridError::UnknownColumn(name) => write!(f, "unknown column \"{name}\""),
            GridError::MissingParentField => write!(f, "tree mode needs a parent data field"),
        }
    }
}

impl std::error::Error for GridError {}

impl From<Error> for GridError {
    fn from(err: Error) -> Self {
        GridError::IoError(err)
    }
}

impl From<PolarsError> for GridError {
    fn from(err: PolarsError) -> Self {
        GridError::PolarsError(err)
    }
}

/// How columns from a saved [`TableState`] are applied.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ColumnStateBehavior {
    /// Only columns the grid already defines are taken from the state.
    #[default]
    ImplementationOnly,
    /// The saved column list replaces the grid's columns.
    StateOnly,
}

#[derive(Debug, Clone, Setters)]
#[setters(into)]
pub struct GridConfig {
    pub grid_id: String,
    /// Field compared between revisions of a row. `None` means every push
    /// replaces the whole data source.
    pub fingerprint: Option<String>,
    /// Expand all groups after the first data source is rendered.
    pub expand_on_load: bool,
    /// Show rows as a tree built from `parent_data_field`.
    pub tree_mode: bool,
    pub parent_data_field: Option<String>,
    pub column_state: ColumnStateBehavior,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            grid_id: "asset-grid".to_string(),
            fingerprint: Some(DEFAULT_FINGERPRINT.to_string()),
            expand_on_load: true,
            tree_mode: false,
            parent_data_field: None,
            column_state: ColumnStateBehavior::ImplementationOnly,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    DataSource(Vec<Row>),
    Select(Vec<String>),
    ClearSelection,
    Group {
        fields: Vec<String>,
        expand: bool,
        atomic: bool,
    },
    ClearGrouping,
    SetFingerprint(Option<String>),
    SetColumnWidth(String, ColumnWidth),
    /// Switches tree mode. Without a data source the current rows are
    /// pushed again.
    SetTreeMode {
        enabled: bool,
        parent_data_field: Option<String>,
        data_source: Option<Vec<Row>>,
    },
    Sort(Vec<SortingProperty>),
    LoadState(TableState),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_timestamp_fingerprint() {
        let cfg = GridConfig::default();
        assert_eq!(cfg.fingerprint.as_deref(), Some(DEFAULT_FINGERPRINT));
        assert!(cfg.expand_on_load);
        assert!(!cfg.tree_mode);
        assert_eq!(cfg.column_state, ColumnStateBehavior::ImplementationOnly);
    }

    #[test]
    fn setters_override_defaults() {
        let cfg = GridConfig::default()
            .grid_id("instruments")
            .fingerprint(None::<String>)
            .expand_on_load(false)
            .tree_mode(true)
            .parent_data_field(Some("reportsTo".to_string()));
        assert_eq!(cfg.grid_id, "instruments");
        assert_eq!(cfg.parent_data_field.as_deref(), Some("reportsTo"));
        assert!(cfg.fingerprint.is_none());
        assert!(!cfg.expand_on_load);
    }

    #[test]
    fn io_errors_convert() {
        let err: GridError = Error::other("boom").into();
        assert!(matches!(err, GridError::IoError(_)));
        assert!(err.to_string().contains("boom"));
    }
}

pub mod asset;
pub mod cache;
pub mod domain;
pub mod format;
pub mod grid;
pub mod loader;
pub mod reconcile;
pub mod row;
pub mod table;

pub use asset::{AlarmStatusUpdate, AssetViewModel, DomainAsset, StatusUpdate};
pub use cache::{AssetCache, SharedAssetCache};
pub use domain::{ColumnStateBehavior, DEFAULT_FINGERPRINT, GridConfig, GridError, Message};
pub use grid::{Grid, GridConfiguration};
pub use reconcile::{RowOp, apply_ops, reconcile};
pub use row::{Row, Value};
pub use table::{
    Column, ColumnWidth, DataField, MemoryTable, SortDirection, SortingProperty, TableHost,
    TableState, TreeSettings, UpdateGuard,
};

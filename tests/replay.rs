use std::path::{Path, PathBuf};

use assetgrid::loader::{load_alarm_updates, load_assets, load_status_updates};
use assetgrid::{
    AssetCache, Column, Grid, GridConfig, GridError, MemoryTable, Message, Row, RowOp, TableHost,
    Value,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn rows(cache: &AssetCache) -> Vec<Row> {
    cache.get().iter().map(Row::from).collect()
}

fn grid() -> Grid<MemoryTable> {
    Grid::new(
        GridConfig::default(),
        vec![Column::new("name", "Name")],
        MemoryTable::new(),
    )
}

#[test]
fn loads_nested_asset_fields() {
    let assets = load_assets(&fixture("assets_01.csv")).unwrap();
    assert_eq!(assets.len(), 3);

    let scope = assets.iter().find(|a| a.id == "scope-2").unwrap();
    assert_eq!(scope.location.system_name, "rack-01");
    assert_eq!(scope.location.slot_number, Some(3));
    assert_eq!(scope.temperature_sensors.len(), 2);
    let external = scope.external_calibration.as_ref().unwrap();
    assert_eq!(external.recommended_interval, Some(24));
    assert!(external.next_custom_due_date.is_some());

    let psu = assets.iter().find(|a| a.id == "psu-3").unwrap();
    assert!(psu.external_calibration.is_none());
    assert!(!psu.is_ni_asset);
    assert_eq!(psu.location.slot_number, Some(-1));
}

#[test]
fn view_models_from_fixture() {
    let assets = load_assets(&fixture("assets_01.csv")).unwrap();
    let mut cache = AssetCache::new();
    cache.keep(Some(&assets));

    let scope = cache.get_by_id("scope-2").unwrap();
    assert_eq!(scope.current_temperature, "41.2 °C");
    assert_eq!(scope.external_calibration_due_date, "2025-01-15T00:00:00.000Z");
    assert_eq!(scope.self_calibration_temperature, "40.0 °C");

    let psu = cache.get_by_id("psu-3").unwrap();
    assert_eq!(psu.slot_number, "");
    assert_eq!(psu.supports_calibration, "False");
    assert_eq!(psu.asset_presence, "NOT_PRESENT");
}

#[test]
fn replays_snapshots_into_grid() {
    let mut cache = AssetCache::new();
    let mut grid = grid();

    cache.keep(Some(&load_assets(&fixture("assets_01.csv")).unwrap()));
    let ops = grid.revise_data_source(&rows(&cache));
    assert!(matches!(ops.as_slice(), [RowOp::Replace(r)] if r.len() == 3));

    cache.keep(Some(&load_assets(&fixture("assets_02.csv")).unwrap()));
    let ops = grid.revise_data_source(&rows(&cache));
    let kinds: Vec<(&str, &str)> = ops
        .iter()
        .map(|op| match op {
            RowOp::Replace(_) => ("replace", ""),
            RowOp::Remove(id) => ("remove", id.as_str()),
            RowOp::Update(id, _) => ("update", id.as_str()),
            RowOp::Add(row) => ("add", row.id.as_str()),
        })
        .collect();
    assert_eq!(
        kinds,
        vec![("update", "scope-2"), ("remove", "psu-3"), ("add", "dig-4")]
    );

    // Same fingerprint, so the rename stays invisible in the grid.
    let dmm = grid.host().row("dmm-1").unwrap();
    assert_eq!(dmm.get("name"), Some(Value::from("PXIe-4081")));
    assert_eq!(cache.get_by_id("dmm-1").unwrap().name, "PXIe-4081 renamed");
}

#[test]
fn status_batches_patch_cache_and_grid() {
    let mut cache = AssetCache::new();
    let mut grid = grid();
    cache.keep(Some(&load_assets(&fixture("assets_02.csv")).unwrap()));
    grid.revise_data_source(&rows(&cache));

    let alarms = load_alarm_updates(&fixture("alarms.csv")).unwrap();
    let statuses = load_status_updates(&fixture("statuses.csv")).unwrap();
    assert_eq!(alarms.len(), 3);
    assert_eq!(cache.sync_alarm_statuses(Some(&alarms)), 1);
    assert_eq!(cache.sync_utilization_statuses(Some(&statuses)), 0);
    assert!(cache.get_by_id("unknown-9").is_none());

    let scope = cache.get_by_id("scope-2").unwrap();
    assert_eq!(scope.asset_alarm, Some(Value::from("CALIBRATION_DUE")));
    assert_eq!(scope.status, Some(Value::from("IDLE")));
    assert_eq!(
        assetgrid::format::format_timestamp(&scope.last_updated_timestamp),
        "2024-05-02T09:30:00.000Z"
    );

    let ops = grid.revise_data_source(&rows(&cache));
    let updated: Vec<&str> = ops
        .iter()
        .filter_map(|op| match op {
            RowOp::Update(id, _) => Some(id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(updated, vec!["dmm-1", "dig-4"]);
    let dmm = grid.host().row("dmm-1").unwrap();
    assert_eq!(dmm.get("assetAlarm"), Some(Value::from("OVER_TEMPERATURE")));
}

#[test]
fn selection_survives_refresh() {
    let mut cache = AssetCache::new();
    let mut grid = grid();
    cache.keep(Some(&load_assets(&fixture("assets_01.csv")).unwrap()));
    grid.revise_data_source(&rows(&cache));
    grid.update(Message::Select(vec!["dmm-1".into(), "psu-3".into()]))
        .unwrap();
    let rx = grid.host_mut().subscribe_selection();

    cache.keep(Some(&load_assets(&fixture("assets_02.csv")).unwrap()));
    grid.revise_data_source(&rows(&cache));
    assert_eq!(rx.try_recv().ok(), Some(vec!["dmm-1".to_string()]));
    assert_eq!(grid.selected(), vec!["dmm-1".to_string()]);
}

#[test]
fn unsupported_files_are_rejected() {
    assert!(matches!(
        load_assets(&fixture("missing.csv")),
        Err(GridError::FileNotFound)
    ));
    let source = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("replay.rs");
    assert!(matches!(load_assets(&source), Err(GridError::UnknownFileType)));
    assert!(matches!(
        load_assets(&fixture("")),
        Err(GridError::LoadingFailed(_))
    ));
    let err = load_assets(&fixture("alarms.csv"));
    assert!(matches!(err, Err(GridError::MissingColumn(name)) if name == "id"));
}

#[test]
fn snapshot_as_tree_by_parent() {
    let mut cache = AssetCache::new();
    cache.keep(Some(&load_assets(&fixture("assets_01.csv")).unwrap()));
    let cfg = GridConfig::default()
        .tree_mode(true)
        .parent_data_field(Some("assetParent".to_string()));
    let mut grid = Grid::new(cfg, vec![Column::new("name", "Name")], MemoryTable::new());
    grid.revise_data_source(&rows(&cache));

    let tree = grid.host().tree().unwrap();
    assert_eq!(tree.parent_data_field, "assetParent");
    assert!(tree.data_fields.iter().any(|f| f.name == "assetParent"));
    assert!(grid.host().rows_expanded());
    assert_eq!(grid.rows().len(), 3);
}

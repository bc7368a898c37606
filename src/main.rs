use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{info, warn};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use assetgrid::loader::{load_alarm_updates, load_assets, load_status_updates};
use assetgrid::{
    AssetCache, Column, DEFAULT_FINGERPRINT, Grid, GridConfig, GridError, MemoryTable, Message,
    Row, SortDirection, SortingProperty, TableHost,
};

/// Replays asset snapshots through the view-model cache and the grid.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Asset snapshot files (csv, parquet, arrow), applied in order.
    #[arg(required = true)]
    snapshots: Vec<String>,

    /// Alarm status batch applied after the last snapshot.
    #[arg(long)]
    alarms: Option<String>,

    /// Utilization status batch applied after the last snapshot.
    #[arg(long)]
    statuses: Option<String>,

    /// Field compared to decide whether a row changed.
    #[arg(long, default_value = DEFAULT_FINGERPRINT)]
    fingerprint: String,

    /// Replace the whole grid on every snapshot.
    #[arg(long)]
    no_fingerprint: bool,

    /// Row ids selected after the first snapshot.
    #[arg(long, num_args = 1..)]
    select: Vec<String>,

    /// Fields to group the grid by.
    #[arg(long, num_args = 1..)]
    group: Vec<String>,

    /// Show the rows as a tree, using FIELD as the parent id.
    #[arg(long, value_name = "FIELD")]
    tree: Option<String>,

    /// Sort order as FIELD or FIELD:asc|desc.
    #[arg(long, num_args = 1.., value_parser = parse_sorting)]
    sort: Vec<SortingProperty>,
}

fn main() -> ExitCode {
    init_tracing();
    match run(Args::parse()) {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(ErrorLayer::default())
        .init();
}

fn run(args: Args) -> Result<(), GridError> {
    let fingerprint = (!args.no_fingerprint).then(|| args.fingerprint.clone());
    let cfg = GridConfig::default()
        .fingerprint(fingerprint)
        .tree_mode(args.tree.is_some())
        .parent_data_field(args.tree.clone());
    let mut grid = Grid::new(cfg, asset_columns(), MemoryTable::new());
    let selection = grid.host_mut().subscribe_selection();
    let mut cache = AssetCache::new();

    for (idx, snapshot) in args.snapshots.iter().enumerate() {
        let path = expand_path(snapshot)?;
        let assets = load_assets(&path)?;
        cache.keep(Some(&assets));
        push_rows(&mut grid, &cache)?;
        info!("Snapshot {} ({}) holds {} assets", idx + 1, path.display(), cache.len());

        if idx == 0 && !args.select.is_empty() {
            grid.update(Message::Select(args.select.clone()))?;
        }
    }

    let mut patched = false;
    if let Some(alarms) = &args.alarms {
        let updates = load_alarm_updates(&expand_path(alarms)?)?;
        cache.sync_alarm_statuses(Some(&updates));
        patched = true;
    }
    if let Some(statuses) = &args.statuses {
        let updates = load_status_updates(&expand_path(statuses)?)?;
        cache.sync_utilization_statuses(Some(&updates));
        patched = true;
    }
    if patched {
        push_rows(&mut grid, &cache)?;
    }

    if !args.group.is_empty() {
        grid.update(Message::Group {
            fields: args.group.clone(),
            expand: true,
            atomic: true,
        })?;
    }

    if !args.sort.is_empty() {
        grid.update(Message::Sort(args.sort.clone()))?;
    }

    for change in selection.try_iter() {
        info!("Selection changed: {change:?}");
    }
    print_rows(&grid);
    Ok(())
}

fn push_rows(grid: &mut Grid<MemoryTable>, cache: &AssetCache) -> Result<(), GridError> {
    let rows: Vec<Row> = cache.get().iter().map(Row::from).collect();
    if rows.is_empty() {
        warn!("Snapshot is empty, keeping the current rows");
    }
    grid.update(Message::DataSource(rows))
}

fn parse_sorting(raw: &str) -> Result<SortingProperty, String> {
    let (field, direction) = match raw.split_once(':') {
        Some((field, dir)) => (
            field,
            SortDirection::parse(dir).ok_or_else(|| format!("unknown sort direction \"{dir}\""))?,
        ),
        None => (raw, SortDirection::Ascending),
    };
    Ok(SortingProperty::new(field, direction))
}

fn expand_path(raw: &str) -> Result<PathBuf, GridError> {
    shellexpand::full(raw)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| GridError::PathExpansion(e.to_string()))
}

fn asset_columns() -> Vec<Column> {
    vec![
        Column::new("name", "Name"),
        Column::new("systemName", "System"),
        Column::new("assetParent", "Parent").hidden(),
        Column::new("modelName", "Model"),
        Column::new("vendorName", "Vendor"),
        Column::new("serialNumber", "Serial number"),
        Column::new("busType", "Bus"),
        Column::new("slotNumber", "Slot"),
        Column::new("currentTemperature", "Temperature"),
        Column::new("supportsCalibration", "Calibratable").hidden(),
        Column::new("externalCalibrationDueDate", "Calibration due"),
        Column::new("assetPresence", "Presence"),
        Column::new("status", "Status"),
        Column::new("assetAlarm", "Alarm"),
        Column::new("lastUpdatedTimestamp", "Last updated"),
    ]
}

fn print_rows(grid: &Grid<MemoryTable>) {
    let visible = grid.configuration().visible_columns;
    println!("id\t{}", visible.join("\t"));
    for row in grid.rows() {
        let cells = visible
            .iter()
            .map(|field| row.get(field).map(|v| v.to_string()).unwrap_or_default())
            .collect::<Vec<String>>();
        println!("{}\t{}", row.id, cells.join("\t"));
    }
    if let Some(sorting) = grid.configuration().sorting_properties {
        let order = sorting
            .iter()
            .map(|s| format!("{} {:?}", s.property_name, s.direction))
            .collect::<Vec<String>>();
        println!("# sorted by: {}", order.join(", "));
    }
    let selected = grid.host().selected();
    if !selected.is_empty() {
        println!("# selected: {}", selected.join(", "));
    }
}

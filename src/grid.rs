use tracing::{debug, info, trace, warn};

use crate::domain::{ColumnStateBehavior, GridConfig, GridError, Message};
use crate::reconcile::{RowOp, reconcile};
use crate::row::Row;
use crate::table::{
    Column, ColumnWidth, DataField, SortingProperty, TableHost, TableState, TreeSettings,
    UpdateGuard,
};

/// Data type handed to the host for columns without one.
const DEFAULT_DATA_TYPE: &str = "string";

/// Snapshot of the user facing grid layout.
#[derive(Debug, Clone, PartialEq)]
pub struct GridConfiguration {
    pub visible_columns: Vec<String>,
    pub column_widths: Vec<(String, Option<ColumnWidth>)>,
    pub grouping_properties: Vec<String>,
    /// `None` while the table is unsorted.
    pub sorting_properties: Option<Vec<SortingProperty>>,
}

/// Wraps a table host and keeps it in sync with the data source pushed from
/// outside.
pub struct Grid<T: TableHost> {
    config: GridConfig,
    host: T,
}

impl<T: TableHost> Grid<T> {
    pub fn new(config: GridConfig, columns: Vec<Column>, mut host: T) -> Self {
        info!(
            "Grid \"{}\" with {} columns, fingerprint {:?}",
            config.grid_id,
            columns.len(),
            config.fingerprint
        );
        host.set_columns(columns);
        let mut grid = Self { config, host };
        if grid.config.tree_mode && grid.config.parent_data_field.is_none() {
            warn!("Tree mode without a parent data field, showing a flat table");
        }
        grid.revise_tree_settings();
        grid
    }

    pub fn host(&self) -> &T {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut T {
        &mut self.host
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn columns(&self) -> &[Column] {
        self.host.columns()
    }

    pub fn rows(&self) -> &[Row] {
        self.host.current_rows()
    }

    pub fn update(&mut self, message: Message) -> Result<(), GridError> {
        trace!("Update: {message:?}");
        match message {
            Message::DataSource(rows) => {
                self.revise_data_source(&rows);
            }
            Message::Select(ids) => self.set_selection(&ids),
            Message::ClearSelection => self.clear_selection(),
            Message::Group {
                fields,
                expand,
                atomic,
            } => self.set_grouping(fields, expand, atomic),
            Message::ClearGrouping => self.host.set_grouping(Vec::new()),
            Message::SetFingerprint(field) => self.config.fingerprint = field,
            Message::SetColumnWidth(field, width) => self.set_column_width(&field, width)?,
            Message::SetTreeMode {
                enabled,
                parent_data_field,
                data_source,
            } => self.set_tree_mode(enabled, parent_data_field, data_source)?,
            Message::Sort(sorting) => self.host.set_sorting(sorting),
            Message::LoadState(state) => self.set_table_state(state),
        }
        Ok(())
    }

    /// Reconciles the host's rows against `incoming` and applies the result
    /// inside a single update bracket. Returns the applied operations.
    pub fn revise_data_source(&mut self, incoming: &[Row]) -> Vec<RowOp> {
        let first_render = self.host.current_rows().is_empty();
        let ops = reconcile(
            self.host.current_rows(),
            incoming,
            self.config.fingerprint.as_deref(),
        );
        if ops.is_empty() {
            return ops;
        }

        let tree = self.tree_active();
        let mut host = UpdateGuard::new(&mut self.host);
        for op in ops.iter().cloned() {
            match op {
                RowOp::Replace(rows) => host.replace_all(rows),
                RowOp::Remove(id) => host.remove_row(&id),
                RowOp::Update(id, row) => host.update_row(&id, row),
                RowOp::Add(row) => host.add_row(row),
            }
        }
        if first_render && self.config.expand_on_load {
            expand_rows(&mut *host, tree);
        }
        debug!("Applied {} row operations", ops.len());
        ops
    }

    /// Switches tree mode on or off. The host's tree settings are rebuilt and
    /// the data source is replaced as a whole, then expanded.
    pub fn set_tree_mode(
        &mut self,
        enabled: bool,
        parent_data_field: Option<String>,
        data_source: Option<Vec<Row>>,
    ) -> Result<(), GridError> {
        let parent_data_field = parent_data_field.or_else(|| self.config.parent_data_field.clone());
        if enabled && parent_data_field.is_none() {
            return Err(GridError::MissingParentField);
        }
        self.config.tree_mode = enabled;
        self.config.parent_data_field = parent_data_field;

        let rows = data_source.unwrap_or_else(|| self.host.current_rows().to_vec());
        let tree = self.tree_active();
        let settings = self.tree_settings();
        let mut host = UpdateGuard::new(&mut self.host);
        host.set_tree(settings);
        host.replace_all(rows);
        expand_rows(&mut *host, tree);
        info!("Tree mode {}", if tree { "on" } else { "off" });
        Ok(())
    }

    /// Fields the host needs to build the tree: every column, then `id`, then
    /// the parent field unless a column already defines it.
    pub fn tree_data_fields(&self) -> Vec<DataField> {
        let columns = self.host.columns();
        let mut fields: Vec<DataField> = columns
            .iter()
            .map(|c| {
                DataField::new(
                    c.data_field.as_str(),
                    c.data_type.as_deref().unwrap_or(DEFAULT_DATA_TYPE),
                )
            })
            .collect();
        fields.push(DataField::new("id", DEFAULT_DATA_TYPE));
        if let Some(parent) = &self.config.parent_data_field {
            if !columns.iter().any(|c| &c.data_field == parent) {
                fields.push(DataField::new(parent.as_str(), DEFAULT_DATA_TYPE));
            }
        }
        fields
    }

    fn tree_active(&self) -> bool {
        self.config.tree_mode && self.config.parent_data_field.is_some()
    }

    fn tree_settings(&self) -> Option<TreeSettings> {
        let parent = self.config.parent_data_field.as_ref()?;
        self.config.tree_mode.then(|| TreeSettings {
            parent_data_field: parent.clone(),
            data_fields: self.tree_data_fields(),
        })
    }

    fn revise_tree_settings(&mut self) {
        let settings = self.tree_settings();
        if settings.is_some() || self.host.tree().is_some() {
            self.host.set_tree(settings);
        }
    }

    /// Replaces the current selection.
    pub fn set_selection(&mut self, ids: &[String]) {
        self.host.clear_selection();
        self.host.select(ids);
    }

    pub fn clear_selection(&mut self) {
        self.host.clear_selection();
    }

    pub fn selected(&self) -> Vec<String> {
        self.host.selected()
    }

    pub fn set_grouping(&mut self, fields: Vec<String>, expand: bool, atomic: bool) {
        let expand = expand && !fields.is_empty();
        if atomic {
            let mut host = UpdateGuard::new(&mut self.host);
            host.set_grouping(fields);
            if expand {
                host.expand_all_groups();
            }
        } else {
            self.host.set_grouping(fields);
            if expand {
                self.host.expand_all_groups();
            }
        }
    }

    pub fn set_column_width(&mut self, data_field: &str, width: ColumnWidth) -> Result<(), GridError> {
        if self.host.set_column_width(data_field, width) {
            Ok(())
        } else {
            Err(GridError::UnknownColumn(data_field.to_string()))
        }
    }

    pub fn column_width(&self, data_field: &str) -> Result<Option<ColumnWidth>, GridError> {
        self.host
            .columns()
            .iter()
            .find(|c| c.data_field == data_field)
            .map(|c| c.width.clone())
            .ok_or_else(|| GridError::UnknownColumn(data_field.to_string()))
    }

    pub fn table_state(&self) -> TableState {
        self.host.state()
    }

    /// Loads a saved table state. Columns are merged according to
    /// [`GridConfig::column_state`].
    pub fn set_table_state(&mut self, mut state: TableState) {
        if self.config.column_state == ColumnStateBehavior::ImplementationOnly {
            state.columns = self
                .host
                .columns()
                .iter()
                .map(|current| {
                    state
                        .columns
                        .iter()
                        .find(|saved| saved.data_field == current.data_field)
                        .map(|saved| Column {
                            visible: saved.visible,
                            width: saved.width.clone(),
                            ..current.clone()
                        })
                        .unwrap_or_else(|| current.clone())
                })
                .collect();
        }
        debug!("Loading table state with {} columns", state.columns.len());
        self.host.load_state(state);
    }

    pub fn configuration(&self) -> GridConfiguration {
        let columns = self.host.columns();
        let sorting = self.host.sorting();
        GridConfiguration {
            visible_columns: columns
                .iter()
                .filter(|c| c.visible)
                .map(|c| c.data_field.clone())
                .collect(),
            column_widths: columns
                .iter()
                .map(|c| (c.data_field.clone(), c.width.clone()))
                .collect(),
            grouping_properties: self.host.grouping().to_vec(),
            sorting_properties: (!sorting.is_empty()).then(|| sorting.to_vec()),
        }
    }
}

fn expand_rows<T: TableHost + ?Sized>(host: &mut T, tree: bool) {
    if tree {
        host.expand_all_rows();
    } else {
        host.expand_all_groups();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Value;
    use crate::table::{MemoryTable, SortDirection};

    const FP: &str = "lastUpdatedTimestamp";

    fn item(id: &str, name: &str, ts: &str) -> Row {
        Row::new(id).with("name", name).with(FP, ts)
    }

    fn mock_source() -> Vec<Row> {
        vec![
            item("123", "Test item", "2021-01-01T00:00:00.000Z"),
            item("456", "Another item", "2021-01-02T00:00:00.000Z"),
            item("789", "Third item", "2021-01-03T00:00:00.000Z"),
        ]
    }

    fn grid(fingerprint: Option<&str>) -> Grid<MemoryTable> {
        let cfg = GridConfig::default().fingerprint(fingerprint.map(str::to_string));
        let columns = vec![
            Column::new("name", "Name"),
            Column::new("description", "Description").hidden(),
        ];
        let mut grid = Grid::new(cfg, columns, MemoryTable::new());
        grid.revise_data_source(&mock_source());
        grid
    }

    fn name_of(grid: &Grid<MemoryTable>, id: &str) -> Option<Value> {
        grid.host().row(id).and_then(|r| r.get("name"))
    }

    #[test]
    fn first_render_replaces_and_expands() {
        let mut grid = Grid::new(GridConfig::default(), Vec::new(), MemoryTable::new());
        let before = grid.host().refreshes();
        let ops = grid.revise_data_source(&mock_source());
        assert!(matches!(ops.as_slice(), [RowOp::Replace(rows)] if rows.len() == 3));
        assert!(grid.host().groups_expanded());
        assert!(!grid.host().rows_expanded());
        assert_eq!(grid.host().refreshes(), before + 1);
    }

    #[test]
    fn adds_new_rows() {
        let mut grid = grid(Some(FP));
        let mut next = mock_source();
        next.push(item("999", "new data item", "2021-02-01T00:00:00.000Z"));
        let ops = grid.revise_data_source(&next);
        assert_eq!(ops.len(), 1);
        assert_eq!(grid.rows().len(), 4);
    }

    #[test]
    fn removes_missing_rows_in_one_refresh() {
        let mut grid = grid(Some(FP));
        let before = grid.host().refreshes();
        let source = mock_source();
        grid.revise_data_source(&[source[0].clone(), source[2].clone()]);
        let ids: Vec<&str> = grid.rows().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["123", "789"]);
        assert_eq!(grid.host().refreshes(), before + 1);
    }

    #[test]
    fn keeps_rows_with_same_fingerprint() {
        let mut grid = grid(Some(FP));
        let ops = grid.revise_data_source(&[item("123", "An updated test item", "2021-01-01T00:00:00.000Z")]);
        assert_eq!(ops.len(), 2);
        assert_eq!(name_of(&grid, "123"), Some(Value::from("Test item")));
    }

    #[test]
    fn updates_rows_with_new_fingerprint() {
        let mut grid = grid(Some(FP));
        grid.revise_data_source(&[item("123", "An updated test item", "2021-03-01T00:00:00.000Z")]);
        assert_eq!(name_of(&grid, "123"), Some(Value::from("An updated test item")));
    }

    #[test]
    fn always_updates_without_fingerprint() {
        let mut grid = grid(None);
        grid.revise_data_source(&[item("123", "An updated test item", "2021-01-01T00:00:00.000Z")]);
        assert_eq!(grid.rows().len(), 1);
        assert_eq!(name_of(&grid, "123"), Some(Value::from("An updated test item")));
    }

    #[test]
    fn set_selection_replaces_previous() {
        let mut grid = grid(Some(FP));
        grid.update(Message::Select(vec!["123".into(), "456".into()])).unwrap();
        assert_eq!(grid.selected(), vec!["123".to_string(), "456".to_string()]);
        grid.update(Message::Select(vec!["789".into()])).unwrap();
        assert_eq!(grid.selected(), vec!["789".to_string()]);
        grid.update(Message::ClearSelection).unwrap();
        assert!(grid.selected().is_empty());
    }

    #[test]
    fn removing_selected_row_notifies_once() {
        let mut grid = grid(Some(FP));
        grid.set_selection(&["123".into(), "456".into()]);
        let rx = grid.host_mut().subscribe_selection();
        grid.revise_data_source(&mock_source()[..1]);
        assert_eq!(rx.try_recv().ok(), Some(vec!["123".to_string()]));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn changing_or_adding_rows_keeps_selection_silent() {
        let mut grid = grid(Some(FP));
        grid.set_selection(&["123".into(), "456".into()]);
        let rx = grid.host_mut().subscribe_selection();
        let mut next = mock_source();
        next[0] = item("123", "updated name", "2022-01-01T00:00:00.000Z");
        next.push(item("999", "new data item", "2022-01-01T00:00:00.000Z"));
        grid.revise_data_source(&next);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn grouping_is_reported_in_configuration() {
        let mut grid = grid(Some(FP));
        grid.update(Message::Group {
            fields: vec!["name".into()],
            expand: true,
            atomic: true,
        })
        .unwrap();
        assert!(grid.host().groups_expanded());
        grid.update(Message::SetColumnWidth("name".into(), ColumnWidth::Pixels(120)))
            .unwrap();

        let cfg = grid.configuration();
        assert_eq!(cfg.visible_columns, vec!["name".to_string()]);
        assert_eq!(cfg.grouping_properties, vec!["name".to_string()]);
        assert_eq!(cfg.sorting_properties, None);
        assert_eq!(
            cfg.column_widths[0],
            ("name".to_string(), Some(ColumnWidth::Pixels(120)))
        );

        grid.update(Message::ClearGrouping).unwrap();
        assert!(grid.configuration().grouping_properties.is_empty());
    }

    #[test]
    fn unknown_column_width_is_an_error() {
        let mut grid = grid(Some(FP));
        let err = grid.set_column_width("nope", ColumnWidth::Percent(10.0));
        assert!(matches!(err, Err(GridError::UnknownColumn(name)) if name == "nope"));
        assert!(grid.column_width("nope").is_err());
    }

    #[test]
    fn fingerprint_can_be_switched_off() {
        let mut grid = grid(Some(FP));
        grid.update(Message::SetFingerprint(None)).unwrap();
        let ops = grid.revise_data_source(&mock_source());
        assert!(matches!(ops.as_slice(), [RowOp::Replace(_)]));
    }

    fn tree_source() -> Vec<Row> {
        let mut rows = mock_source();
        rows.push(item("554", "TestItem3", "2010-02-02T00:00:00.000Z").with("reportsTo", "456"));
        rows
    }

    fn tree_grid() -> Grid<MemoryTable> {
        let cfg = GridConfig::default()
            .tree_mode(true)
            .parent_data_field(Some("reportsTo".to_string()));
        Grid::new(cfg, vec![Column::new("name", "Name")], MemoryTable::new())
    }

    fn names(fields: &[DataField]) -> Vec<&str> {
        fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn tree_mode_expands_rows_instead_of_groups() {
        let mut grid = tree_grid();
        grid.revise_data_source(&tree_source());
        assert!(grid.host().tree().is_some());
        assert!(grid.host().rows_expanded());
        assert!(!grid.host().groups_expanded());
        let children: Vec<&str> = grid.host().children("456").iter().map(|r| r.id.as_str()).collect();
        assert_eq!(children, vec!["554"]);
    }

    #[test]
    fn switching_tree_mode_replaces_and_expands() {
        let mut grid = grid(Some(FP));
        let before = grid.host().refreshes();
        grid.update(Message::SetTreeMode {
            enabled: true,
            parent_data_field: Some("reportsTo".into()),
            data_source: Some(tree_source()),
        })
        .unwrap();
        assert_eq!(grid.host().refreshes(), before + 1);
        assert_eq!(grid.rows().len(), 4);
        assert!(grid.host().rows_expanded());
        assert_eq!(
            grid.host().tree().map(|t| t.parent_data_field.as_str()),
            Some("reportsTo")
        );

        // Turning it off keeps the current rows and drops the tree.
        grid.update(Message::SetTreeMode {
            enabled: false,
            parent_data_field: None,
            data_source: None,
        })
        .unwrap();
        assert!(grid.host().tree().is_none());
        assert!(!grid.host().rows_expanded());
        assert!(grid.host().groups_expanded());
        assert_eq!(grid.rows().len(), 4);
        assert!(!grid.config().tree_mode);
    }

    #[test]
    fn tree_mode_needs_parent_field() {
        let mut grid = grid(Some(FP));
        let err = grid.update(Message::SetTreeMode {
            enabled: true,
            parent_data_field: None,
            data_source: None,
        });
        assert!(matches!(err, Err(GridError::MissingParentField)));
        assert!(!grid.config().tree_mode);
        assert!(grid.host().tree().is_none());
    }

    #[test]
    fn tree_without_parent_field_stays_flat() {
        let cfg = GridConfig::default().tree_mode(true);
        let mut grid = Grid::new(cfg, Vec::new(), MemoryTable::new());
        grid.revise_data_source(&mock_source());
        assert!(grid.host().tree().is_none());
        assert!(grid.host().groups_expanded());
    }

    #[test]
    fn tree_data_fields_append_id_and_parent() {
        let grid = tree_grid();
        let fields = grid.tree_data_fields();
        assert_eq!(names(&fields), vec!["name", "id", "reportsTo"]);
        assert!(fields.iter().all(|f| f.data_type == "string"));

        let columns = vec![
            Column::new("name", "Name").data_type("text"),
            Column::new("reportsTo", "Reports to"),
        ];
        let cfg = GridConfig::default().parent_data_field(Some("reportsTo".to_string()));
        let grid = Grid::new(cfg, columns, MemoryTable::new());
        let fields = grid.tree_data_fields();
        assert_eq!(names(&fields), vec!["name", "reportsTo", "id"]);
        assert_eq!(fields[0].data_type, "text");
    }

    #[test]
    fn table_state_lists_all_columns() {
        let grid = grid(Some(FP));
        let state = grid.table_state();
        let fields: Vec<&str> = state.columns.iter().map(|c| c.data_field.as_str()).collect();
        assert_eq!(fields, vec!["name", "description"]);
    }

    #[test]
    fn state_only_loading_shows_saved_columns() {
        let cfg = GridConfig::default().column_state(ColumnStateBehavior::StateOnly);
        let columns = vec![Column::new("name", "Name"), Column::new("serial", "Serial")];
        let mut grid = Grid::new(cfg, columns, MemoryTable::new());
        let mut state = grid.table_state();
        state.columns.truncate(1);
        grid.update(Message::LoadState(state)).unwrap();
        assert_eq!(grid.configuration().visible_columns, vec!["name".to_string()]);
        assert_eq!(grid.columns().len(), 1);
    }

    #[test]
    fn implementation_only_loading_keeps_defined_columns() {
        let mut grid = grid(Some(FP));
        grid.set_selection(&["456".into()]);
        let state = TableState {
            columns: vec![
                Column::new("name", "Renamed").hidden(),
                Column::new("extra", "Extra"),
            ],
            grouped: vec!["name".into()],
            sorting: Vec::new(),
            selected: vec!["123".into()],
        };
        grid.set_table_state(state);

        let columns = grid.columns();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].label, "Name");
        assert!(!columns[0].visible);
        assert_eq!(columns[1].data_field, "description");
        assert_eq!(grid.configuration().grouping_properties, vec!["name".to_string()]);
        assert_eq!(grid.selected(), vec!["123".to_string()]);
    }

    #[test]
    fn sorting_is_reported_in_configuration() {
        let mut grid = grid(Some(FP));
        let sorting = vec![SortingProperty::new("name", SortDirection::Descending)];
        grid.update(Message::Sort(sorting.clone())).unwrap();
        assert_eq!(grid.configuration().sorting_properties, Some(sorting));
        assert_eq!(grid.table_state().sorting.len(), 1);
    }
}

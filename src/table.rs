use std::ops::{Deref, DerefMut};
use std::sync::mpsc::{Receiver, Sender, channel};

use tracing::{debug, trace};

use crate::row::{Row, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnWidth {
    Pixels(u32),
    Percent(f32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub data_field: String,
    pub label: String,
    pub visible: bool,
    pub width: Option<ColumnWidth>,
    /// Type hint handed to the host in tree mode, `"string"` when unset.
    pub data_type: Option<String>,
}

impl Column {
    pub fn new(data_field: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            data_field: data_field.into(),
            label: label.into(),
            visible: true,
            width: None,
            data_type: None,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataField {
    pub name: String,
    pub data_type: String,
}

impl DataField {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// How a host builds its tree: rows are keyed by `id` and hang below the row
/// whose id equals their `parent_data_field` value.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeSettings {
    pub parent_data_field: String,
    pub data_fields: Vec<DataField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(SortDirection::Ascending),
            "desc" | "descending" => Some(SortDirection::Descending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortingProperty {
    pub property_name: String,
    pub direction: SortDirection,
}

impl SortingProperty {
    pub fn new(property_name: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            property_name: property_name.into(),
            direction,
        }
    }
}

/// Saved table layout, as returned by [`TableHost::state`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableState {
    pub columns: Vec<Column>,
    pub grouped: Vec<String>,
    pub sorting: Vec<SortingProperty>,
    pub selected: Vec<String>,
}

/// The table widget the grid drives.
///
/// `begin_update`/`end_update` may nest; a host only refreshes once the
/// outermost bracket is closed.
pub trait TableHost {
    fn current_rows(&self) -> &[Row];
    fn begin_update(&mut self);
    fn end_update(&mut self);
    fn add_row(&mut self, row: Row);
    fn remove_row(&mut self, id: &str);
    fn update_row(&mut self, id: &str, row: Row);
    fn replace_all(&mut self, rows: Vec<Row>);

    fn columns(&self) -> &[Column];
    fn set_columns(&mut self, columns: Vec<Column>);
    /// Returns `false` when no column has this data field.
    fn set_column_width(&mut self, data_field: &str, width: ColumnWidth) -> bool;

    fn selected(&self) -> Vec<String>;
    fn select(&mut self, ids: &[String]);
    fn clear_selection(&mut self);
    /// Every selection change is sent to all subscribers.
    fn subscribe_selection(&mut self) -> Receiver<Vec<String>>;

    fn set_grouping(&mut self, fields: Vec<String>);
    fn grouping(&self) -> &[String];
    fn set_sorting(&mut self, sorting: Vec<SortingProperty>);
    fn sorting(&self) -> &[SortingProperty];

    /// `None` switches tree mode off.
    fn set_tree(&mut self, settings: Option<TreeSettings>);
    fn tree(&self) -> Option<&TreeSettings>;
    fn expand_all_rows(&mut self);
    fn expand_all_groups(&mut self);

    fn state(&self) -> TableState;
    fn load_state(&mut self, state: TableState);
}

/// Scoped update bracket. Ends the update when dropped, also while unwinding,
/// so a host is never left suspended.
pub struct UpdateGuard<'a, T: TableHost + ?Sized> {
    host: &'a mut T,
}

impl<'a, T: TableHost + ?Sized> UpdateGuard<'a, T> {
    pub fn new(host: &'a mut T) -> Self {
        host.begin_update();
        Self { host }
    }
}

impl<T: TableHost + ?Sized> Deref for UpdateGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.host
    }
}

impl<T: TableHost + ?Sized> DerefMut for UpdateGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.host
    }
}

impl<T: TableHost + ?Sized> Drop for UpdateGuard<'_, T> {
    fn drop(&mut self) {
        self.host.end_update();
    }
}

/// In-memory table host. Keeps rows in data order and counts refreshes
/// instead of rendering. Sorting is recorded but not applied to the rows.
#[derive(Default)]
pub struct MemoryTable {
    rows: Vec<Row>,
    columns: Vec<Column>,
    selected: Vec<String>,
    grouping: Vec<String>,
    sorting: Vec<SortingProperty>,
    tree: Option<TreeSettings>,
    groups_expanded: bool,
    rows_expanded: bool,
    update_depth: usize,
    dirty: bool,
    selection_dirty: bool,
    refreshes: usize,
    listeners: Vec<Sender<Vec<String>>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes
    }

    pub fn is_updating(&self) -> bool {
        self.update_depth > 0
    }

    pub fn groups_expanded(&self) -> bool {
        self.groups_expanded
    }

    pub fn rows_expanded(&self) -> bool {
        self.rows_expanded
    }

    pub fn row(&self, id: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == id)
    }

    /// Direct children of `id` in tree mode. Empty outside tree mode.
    pub fn children(&self, id: &str) -> Vec<&Row> {
        let Some(tree) = &self.tree else {
            return Vec::new();
        };
        let parent = Value::from(id);
        self.rows
            .iter()
            .filter(|r| r.get(&tree.parent_data_field).as_ref() == Some(&parent))
            .collect()
    }

    fn changed(&mut self) {
        self.dirty = true;
        if self.update_depth == 0 {
            self.flush();
        }
    }

    fn selection_changed(&mut self) {
        self.selection_dirty = true;
        if self.update_depth == 0 {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.dirty {
            self.refreshes += 1;
            self.dirty = false;
            trace!("Refresh #{} with {} rows", self.refreshes, self.rows.len());
        }
        if self.selection_dirty {
            self.selection_dirty = false;
            let selection = self.selected.clone();
            debug!("Selection changed: {selection:?}");
            // Drop listeners whose receiver is gone.
            self.listeners
                .retain(|listener| listener.send(selection.clone()).is_ok());
        }
    }
}

impl TableHost for MemoryTable {
    fn current_rows(&self) -> &[Row] {
        &self.rows
    }

    fn begin_update(&mut self) {
        self.update_depth += 1;
    }

    fn end_update(&mut self) {
        self.update_depth = self.update_depth.saturating_sub(1);
        if self.update_depth == 0 {
            self.flush();
        }
    }

    fn add_row(&mut self, row: Row) {
        self.rows.push(row);
        self.changed();
    }

    fn remove_row(&mut self, id: &str) {
        let Some(pos) = self.rows.iter().position(|r| r.id == id) else {
            return;
        };
        self.rows.remove(pos);
        self.changed();
        if let Some(sel) = self.selected.iter().position(|s| s == id) {
            self.selected.remove(sel);
            self.selection_changed();
        }
    }

    fn update_row(&mut self, id: &str, row: Row) {
        if let Some(existing) = self.rows.iter_mut().find(|r| r.id == id) {
            *existing = row;
            self.changed();
        }
    }

    fn replace_all(&mut self, rows: Vec<Row>) {
        self.rows = rows;
        let before = self.selected.len();
        let rows = &self.rows;
        self.selected.retain(|id| rows.iter().any(|r| &r.id == id));
        self.changed();
        if self.selected.len() != before {
            self.selection_changed();
        }
    }

    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn set_columns(&mut self, columns: Vec<Column>) {
        self.columns = columns;
        self.changed();
    }

    fn set_column_width(&mut self, data_field: &str, width: ColumnWidth) -> bool {
        let Some(column) = self.columns.iter_mut().find(|c| c.data_field == data_field) else {
            return false;
        };
        column.width = Some(width);
        self.changed();
        true
    }

    fn selected(&self) -> Vec<String> {
        self.selected.clone()
    }

    fn select(&mut self, ids: &[String]) {
        let mut changed = false;
        for id in ids {
            if self.row(id).is_some() && !self.selected.contains(id) {
                self.selected.push(id.clone());
                changed = true;
            }
        }
        if changed {
            self.selection_changed();
        }
    }

    fn clear_selection(&mut self) {
        if !self.selected.is_empty() {
            self.selected.clear();
            self.selection_changed();
        }
    }

    fn subscribe_selection(&mut self) -> Receiver<Vec<String>> {
        let (tx, rx) = channel();
        self.listeners.push(tx);
        rx
    }

    fn set_grouping(&mut self, fields: Vec<String>) {
        self.grouping = fields;
        self.groups_expanded = false;
        self.changed();
    }

    fn grouping(&self) -> &[String] {
        &self.grouping
    }

    fn set_sorting(&mut self, sorting: Vec<SortingProperty>) {
        self.sorting = sorting;
        self.changed();
    }

    fn sorting(&self) -> &[SortingProperty] {
        &self.sorting
    }

    fn set_tree(&mut self, settings: Option<TreeSettings>) {
        self.tree = settings;
        self.rows_expanded = false;
        self.changed();
    }

    fn tree(&self) -> Option<&TreeSettings> {
        self.tree.as_ref()
    }

    fn expand_all_rows(&mut self) {
        if self.tree.is_some() {
            self.rows_expanded = true;
            self.changed();
        }
    }

    fn expand_all_groups(&mut self) {
        self.groups_expanded = true;
        self.changed();
    }

    fn state(&self) -> TableState {
        TableState {
            columns: self.columns.clone(),
            grouped: self.grouping.clone(),
            sorting: self.sorting.clone(),
            selected: self.selected.clone(),
        }
    }

    /// Unknown ids in the saved selection are skipped.
    fn load_state(&mut self, state: TableState) {
        self.columns = state.columns;
        self.grouping = state.grouped;
        self.sorting = state.sorting;
        self.changed();

        let rows = &self.rows;
        let selected: Vec<String> = state
            .selected
            .into_iter()
            .filter(|id| rows.iter().any(|r| &r.id == id))
            .collect();
        if selected != self.selected {
            self.selected = selected;
            self.selection_changed();
        }
    }
}

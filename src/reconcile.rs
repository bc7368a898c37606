use std::collections::{HashMap, VecDeque};

use tracing::{debug, trace};

use crate::row::Row;

/// A single row level change computed by [`reconcile`].
#[derive(Debug, Clone, PartialEq)]
pub enum RowOp {
    /// Swap the whole data source. Emitted on the first render and whenever no
    /// fingerprint is configured.
    Replace(Vec<Row>),
    Remove(String),
    Update(String, Row),
    Add(Row),
}

/// Computes the operations that turn `current` into `incoming`.
///
/// Removes and updates come first, in the order of `current`, followed by the
/// adds in the order of `incoming`. Rows whose fingerprint did not change are
/// left alone even if other fields differ.
pub fn reconcile(current: &[Row], incoming: &[Row], fingerprint: Option<&str>) -> Vec<RowOp> {
    if incoming.is_empty() {
        trace!("Nothing incoming, keeping {} rows", current.len());
        return Vec::new();
    }

    if current.is_empty() {
        debug!("First render with {} rows", incoming.len());
        return vec![RowOp::Replace(incoming.to_vec())];
    }

    let Some(field) = fingerprint else {
        debug!("No fingerprint configured, replacing {} rows", incoming.len());
        return vec![RowOp::Replace(incoming.to_vec())];
    };

    // Incoming positions per id, consumed front to back so duplicates match
    // in order and the leftovers become adds.
    let mut pending: HashMap<&str, VecDeque<usize>> = HashMap::new();
    for (idx, row) in incoming.iter().enumerate() {
        pending.entry(row.id.as_str()).or_default().push_back(idx);
    }
    let mut consumed = vec![false; incoming.len()];

    let mut ops = Vec::new();
    let (mut removed, mut updated, mut untouched) = (0, 0, 0);
    for existing in current {
        let matched = pending
            .get_mut(existing.id.as_str())
            .and_then(|queue| queue.pop_front());
        match matched {
            None => {
                trace!("Remove row {}", existing.id);
                ops.push(RowOp::Remove(existing.id.clone()));
                removed += 1;
            }
            Some(idx) => {
                consumed[idx] = true;
                let candidate = &incoming[idx];
                if existing.fingerprint(field) != candidate.fingerprint(field) {
                    trace!("Update row {}", existing.id);
                    ops.push(RowOp::Update(existing.id.clone(), candidate.clone()));
                    updated += 1;
                } else {
                    untouched += 1;
                }
            }
        }
    }

    let mut added = 0;
    for (row, _) in incoming.iter().zip(&consumed).filter(|(_, c)| !**c) {
        trace!("Add row {}", row.id);
        ops.push(RowOp::Add(row.clone()));
        added += 1;
    }

    debug!(
        "Reconciled on \"{field}\": {removed} removed, {updated} updated, {added} added, {untouched} untouched"
    );
    ops
}

/// Applies `ops` to a plain row vector the same way a table host would.
pub fn apply_ops(rows: &mut Vec<Row>, ops: impl IntoIterator<Item = RowOp>) {
    for op in ops {
        match op {
            RowOp::Replace(next) => *rows = next,
            RowOp::Remove(id) => {
                if let Some(pos) = rows.iter().position(|r| r.id == id) {
                    rows.remove(pos);
                }
            }
            RowOp::Update(id, row) => {
                if let Some(existing) = rows.iter_mut().find(|r| r.id == id) {
                    *existing = row;
                }
            }
            RowOp::Add(row) => rows.push(row),
        }
    }
}

use crate::column::Column;
use crate::data::MutationRequest;
use crate::error::GridError;
use crate::focus::Cell;
use crate::focus::FocusRegion;
use crate::query::Query;
use crate::value::Record;
use crate::value::RowKey;
use serde_json::Value;

/// Addresses a rendered cell, the terminal analogue of a target element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellTarget {
    pub region: FocusRegion,
    pub cell: Cell,
}

impl CellTarget {
    pub fn content(row: usize, col: usize) -> Self {
        Self {
            region: FocusRegion::Content,
            cell: Cell::new(row, col),
        }
    }
}

/// Everything known about the row and column behind a [`CellTarget`].
///
/// `row_index` and `row_data` are only set for content cells.
#[derive(Clone, Debug, PartialEq)]
pub struct RowInfo {
    pub target: CellTarget,
    pub row_index: Option<usize>,
    pub row_key: Option<RowKey>,
    pub row_data: Option<Record>,
    pub column_index: usize,
    pub column: Column,
    pub cell_value: Option<Value>,
}

/// Notifications for the host application, drained with
/// [`crate::grid::Grid::drain_events`].
#[derive(Clone, Debug, PartialEq)]
pub enum GridEvent {
    Init,
    RenderStart,
    /// A fetch was issued for `query`.
    DataRequest { query: Query },
    /// A mutation is about to be persisted.
    DataChangeRequest { request: MutationRequest },
    /// Focus moved to a cell. `info` is `None` when focus left the grid.
    CellFocus { info: Option<RowInfo> },
    CellClick { info: RowInfo },
    RowDoubleClick { info: RowInfo },
    SelectionChanged { keys: Vec<RowKey> },
    Error { error: GridError },
    Destroy,
}

//! Keyboard focus across the grid's header, content and aggregate regions.
//!
//! Each region owns a [`FocusMatrix`]: an occupancy grid plus a cursor. The cursor either
//! addresses an occupied cell or is `None` ("no focus"). [`FocusModel`] ties the three
//! regions together and decides when focus moves between them or leaves the grid.

use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FocusRegion {
    Header,
    Content,
    Aggregate,
}

impl FocusRegion {
    pub const ALL: [FocusRegion; 3] = [Self::Header, Self::Content, Self::Aggregate];

    fn next(self) -> Option<Self> {
        match self {
            Self::Header => Some(Self::Content),
            Self::Content => Some(Self::Aggregate),
            Self::Aggregate => None,
        }
    }

    fn prev(self) -> Option<Self> {
        match self {
            Self::Header => None,
            Self::Content => Some(Self::Header),
            Self::Aggregate => Some(Self::Content),
        }
    }
}

/// A cell address within one region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FocusMatrix {
    rows: usize,
    cols: usize,
    occupancy: Vec<bool>,
    current: Option<Cell>,
}

impl FocusMatrix {
    /// A fully occupied matrix.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            occupancy: vec![true; rows * cols],
            current: None,
        }
    }

    /// Builds a matrix from per-row occupancy. Short rows are padded with unoccupied cells.
    pub fn from_rows(rows: &[Vec<bool>]) -> Self {
        let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut occupancy = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            occupancy.extend(row.iter().copied());
            occupancy.extend(std::iter::repeat_n(false, cols - row.len()));
        }
        Self {
            rows: rows.len(),
            cols,
            occupancy,
            current: None,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn current(&self) -> Option<Cell> {
        self.current
    }

    pub fn is_occupied(&self, cell: Cell) -> bool {
        cell.row < self.rows
            && cell.col < self.cols
            && self.occupancy[cell.row * self.cols + cell.col]
    }

    /// Replaces the structure and re-clamps the cursor to the nearest occupied cell.
    pub fn reshape(&mut self, other: FocusMatrix) {
        let current = self.current;
        *self = other;
        self.current = current;
        self.reclamp();
    }

    fn reclamp(&mut self) {
        let Some(cur) = self.current else {
            return;
        };
        if self.is_occupied(cur) {
            return;
        }
        let target = Cell::new(
            cur.row.min(self.rows.saturating_sub(1)),
            cur.col.min(self.cols.saturating_sub(1)),
        );
        self.current = self.nearest_occupied(target);
    }

    fn nearest_occupied(&self, target: Cell) -> Option<Cell> {
        self.occupied_cells()
            .min_by_key(|c| (c.row.abs_diff(target.row) + c.col.abs_diff(target.col), *c))
    }

    fn occupied_cells(&self) -> impl DoubleEndedIterator<Item = Cell> + '_ {
        (0..self.rows * self.cols)
            .filter(|i| self.occupancy[*i])
            .map(|i| Cell::new(i / self.cols, i % self.cols))
    }

    pub fn first_focusable(&self) -> Option<Cell> {
        self.occupied_cells().next()
    }

    pub fn last_focusable(&self) -> Option<Cell> {
        self.occupied_cells().next_back()
    }

    /// Moves the cursor to `cell` if it is occupied.
    pub fn set_current(&mut self, cell: Cell) -> bool {
        if !self.is_occupied(cell) {
            return false;
        }
        self.current = Some(cell);
        true
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Target of a one-step move, skipping unoccupied cells. `None` at the region boundary.
    pub fn step_target(&self, from: Cell, dir: Direction) -> Option<Cell> {
        let mut cell = from;
        loop {
            cell = match dir {
                Direction::Up => Cell::new(cell.row.checked_sub(1)?, cell.col),
                Direction::Down if cell.row + 1 < self.rows => Cell::new(cell.row + 1, cell.col),
                Direction::Left => Cell::new(cell.row, cell.col.checked_sub(1)?),
                Direction::Right if cell.col + 1 < self.cols => Cell::new(cell.row, cell.col + 1),
                _ => return None,
            };
            if self.is_occupied(cell) {
                return Some(cell);
            }
        }
    }

    fn next_after(&self, from: Cell) -> Option<Cell> {
        self.occupied_cells().find(|c| *c > from)
    }

    fn prev_before(&self, from: Cell) -> Option<Cell> {
        self.occupied_cells().rev().find(|c| *c < from)
    }

    fn row_edge(&self, row: usize, end: bool) -> Option<Cell> {
        let mut cells = self.occupied_cells().filter(|c| c.row == row);
        if end { cells.last() } else { cells.next() }
    }
}

/// Navigation intents understood by [`FocusModel::navigate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Navigation {
    Move(Direction),
    /// Tab.
    Next,
    /// Shift+Tab.
    Prev,
    RowStart,
    RowEnd,
    /// First content cell.
    First,
    /// Last content cell.
    Last,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusChange {
    Moved {
        from: Option<(FocusRegion, Cell)>,
        to: (FocusRegion, Cell),
    },
    Unchanged,
    /// Focus was yielded to whatever follows (or precedes) the grid.
    LeftGrid { from: Option<(FocusRegion, Cell)> },
}

/// Imperative rendering calls issued on focus changes.
pub trait Presenter {
    fn apply_outline(&mut self, region: FocusRegion, cell: Cell);
    fn clear_outline(&mut self, region: FocusRegion, cell: Cell);
    fn open_tooltip(&mut self, region: FocusRegion, cell: Cell, text: &str);
    fn close_tooltip(&mut self);
}

/// A presenter that ignores every call, for headless use.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPresenter;

impl Presenter for NoopPresenter {
    fn apply_outline(&mut self, _: FocusRegion, _: Cell) {}
    fn clear_outline(&mut self, _: FocusRegion, _: Cell) {}
    fn open_tooltip(&mut self, _: FocusRegion, _: Cell, _: &str) {}
    fn close_tooltip(&mut self) {}
}

impl FocusChange {
    /// Forwards outline changes to `presenter`.
    pub fn present(&self, presenter: &mut dyn Presenter) {
        let from = match self {
            Self::Unchanged => return,
            Self::Moved { from, .. } | Self::LeftGrid { from } => *from,
        };
        if let Some((region, cell)) = from {
            presenter.clear_outline(region, cell);
        }
        if let Self::Moved { to, .. } = self {
            presenter.apply_outline(to.0, to.1);
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FocusModel {
    header: FocusMatrix,
    content: FocusMatrix,
    aggregate: FocusMatrix,
    active: Option<FocusRegion>,
}

impl FocusModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matrix(&self, region: FocusRegion) -> &FocusMatrix {
        match region {
            FocusRegion::Header => &self.header,
            FocusRegion::Content => &self.content,
            FocusRegion::Aggregate => &self.aggregate,
        }
    }

    fn matrix_mut(&mut self, region: FocusRegion) -> &mut FocusMatrix {
        match region {
            FocusRegion::Header => &mut self.header,
            FocusRegion::Content => &mut self.content,
            FocusRegion::Aggregate => &mut self.aggregate,
        }
    }

    pub fn active(&self) -> Option<FocusRegion> {
        self.active
    }

    /// The focused cell, if any.
    pub fn current(&self) -> Option<(FocusRegion, Cell)> {
        let region = self.active?;
        self.matrix(region).current().map(|c| (region, c))
    }

    /// Applies a structural change to one region.
    ///
    /// Returns a change when the focused cell had to move (or vanished).
    pub fn reshape(&mut self, region: FocusRegion, matrix: FocusMatrix) -> FocusChange {
        let before = self.current();
        self.matrix_mut(region).reshape(matrix);
        let after = self.current();
        match (before, after) {
            (b, Some(to)) if b != Some(to) => FocusChange::Moved { from: b, to },
            (Some(b), None) => {
                self.active = None;
                FocusChange::LeftGrid { from: Some(b) }
            }
            _ => FocusChange::Unchanged,
        }
    }

    /// Focuses `cell` in `region` directly. Unoccupied targets are ignored.
    pub fn click(&mut self, region: FocusRegion, cell: Cell) -> FocusChange {
        if !self.matrix(region).is_occupied(cell) {
            return FocusChange::Unchanged;
        }
        let from = self.current();
        if from == Some((region, cell)) {
            return FocusChange::Unchanged;
        }
        self.focus(region, cell);
        FocusChange::Moved {
            from,
            to: (region, cell),
        }
    }

    /// Removes focus from the grid.
    pub fn blur(&mut self) -> FocusChange {
        let from = self.current();
        if from.is_none() {
            return FocusChange::Unchanged;
        }
        for region in FocusRegion::ALL {
            self.matrix_mut(region).clear();
        }
        self.active = None;
        FocusChange::LeftGrid { from }
    }

    fn focus(&mut self, region: FocusRegion, cell: Cell) {
        if let Some(prev) = self.active
            && prev != region
        {
            self.matrix_mut(prev).clear();
        }
        self.active = Some(region);
        self.matrix_mut(region).set_current(cell);
    }

    fn move_to(
        &mut self,
        from: Option<(FocusRegion, Cell)>,
        region: FocusRegion,
        cell: Cell,
    ) -> FocusChange {
        if from == Some((region, cell)) {
            return FocusChange::Unchanged;
        }
        self.focus(region, cell);
        FocusChange::Moved {
            from,
            to: (region, cell),
        }
    }

    fn enter_forward(&self, start: Option<FocusRegion>) -> Option<(FocusRegion, Cell)> {
        let mut region = start;
        while let Some(r) = region {
            if let Some(cell) = self.matrix(r).first_focusable() {
                return Some((r, cell));
            }
            region = r.next();
        }
        None
    }

    fn enter_backward(&self, start: Option<FocusRegion>) -> Option<(FocusRegion, Cell)> {
        let mut region = start;
        while let Some(r) = region {
            if let Some(cell) = self.matrix(r).last_focusable() {
                return Some((r, cell));
            }
            region = r.prev();
        }
        None
    }

    pub fn navigate(&mut self, nav: Navigation) -> FocusChange {
        let from = self.current();
        let Some((region, cur)) = from else {
            // Entering the grid from outside.
            let target = match nav {
                Navigation::Next => self.enter_forward(Some(FocusRegion::Header)),
                Navigation::Prev => self.enter_backward(Some(FocusRegion::Aggregate)),
                Navigation::First | Navigation::Last => self.content_edge(nav),
                _ => self
                    .enter_forward(Some(FocusRegion::Content))
                    .or_else(|| self.enter_forward(Some(FocusRegion::Header))),
            };
            return match target {
                Some((r, c)) => self.move_to(None, r, c),
                None => FocusChange::Unchanged,
            };
        };

        let matrix = self.matrix(region);
        let target = match nav {
            Navigation::Move(dir) => matrix.step_target(cur, dir).map(|c| (region, c)),
            Navigation::RowStart => matrix.row_edge(cur.row, false).map(|c| (region, c)),
            Navigation::RowEnd => matrix.row_edge(cur.row, true).map(|c| (region, c)),
            Navigation::First | Navigation::Last => self.content_edge(nav),
            Navigation::Next => match matrix.next_after(cur) {
                Some(c) => Some((region, c)),
                None => match self.enter_forward(region.next()) {
                    Some(t) => Some(t),
                    None => return self.leave(from),
                },
            },
            Navigation::Prev => match matrix.prev_before(cur) {
                Some(c) => Some((region, c)),
                None => match self.enter_backward(region.prev()) {
                    Some(t) => Some(t),
                    None => return self.leave(from),
                },
            },
        };
        match target {
            Some((r, c)) => self.move_to(from, r, c),
            None => FocusChange::Unchanged,
        }
    }

    fn content_edge(&self, nav: Navigation) -> Option<(FocusRegion, Cell)> {
        let m = &self.content;
        let cell = if nav == Navigation::First {
            m.first_focusable()
        } else {
            m.last_focusable()
        };
        cell.map(|c| (FocusRegion::Content, c))
    }

    fn leave(&mut self, from: Option<(FocusRegion, Cell)>) -> FocusChange {
        tracing::debug!(?from, "focus left the grid");
        for region in FocusRegion::ALL {
            self.matrix_mut(region).clear();
        }
        self.active = None;
        FocusChange::LeftGrid { from }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> FocusModel {
        let mut m = FocusModel::new();
        m.reshape(FocusRegion::Header, FocusMatrix::new(1, 3));
        m.reshape(FocusRegion::Content, FocusMatrix::new(2, 3));
        m.reshape(
            FocusRegion::Aggregate,
            FocusMatrix::from_rows(&[vec![false, true, false]]),
        );
        m
    }

    #[test]
    fn arrows_skip_unoccupied_cells_and_stop_at_edges() {
        let mut m = FocusMatrix::from_rows(&[vec![true, false, false, true]]);
        m.set_current(Cell::new(0, 0));
        assert_eq!(m.step_target(Cell::new(0, 0), Direction::Right), Some(Cell::new(0, 3)));
        assert_eq!(m.step_target(Cell::new(0, 3), Direction::Right), None);
        assert_eq!(m.step_target(Cell::new(0, 0), Direction::Up), None);
    }

    #[test]
    fn arrows_never_cross_regions() {
        let mut m = model();
        m.click(FocusRegion::Header, Cell::new(0, 1));
        assert_eq!(m.navigate(Navigation::Move(Direction::Down)), FocusChange::Unchanged);
        assert_eq!(m.current(), Some((FocusRegion::Header, Cell::new(0, 1))));
    }

    #[test]
    fn tab_walks_regions_then_leaves() {
        let mut m = model();
        m.click(FocusRegion::Header, Cell::new(0, 2));
        m.navigate(Navigation::Next);
        assert_eq!(m.current(), Some((FocusRegion::Content, Cell::new(0, 0))));

        m.click(FocusRegion::Content, Cell::new(1, 2));
        m.navigate(Navigation::Next);
        assert_eq!(m.current(), Some((FocusRegion::Aggregate, Cell::new(0, 1))));

        let change = m.navigate(Navigation::Next);
        assert!(matches!(change, FocusChange::LeftGrid { .. }));
        assert_eq!(m.current(), None);
    }

    #[test]
    fn shift_tab_from_first_header_cell_leaves() {
        let mut m = model();
        m.click(FocusRegion::Header, Cell::new(0, 0));
        assert!(matches!(m.navigate(Navigation::Prev), FocusChange::LeftGrid { .. }));
    }

    #[test]
    fn shift_tab_lands_on_last_cell_of_previous_region() {
        let mut m = model();
        m.click(FocusRegion::Content, Cell::new(0, 0));
        m.navigate(Navigation::Prev);
        assert_eq!(m.current(), Some((FocusRegion::Header, Cell::new(0, 2))));
    }

    #[test]
    fn click_on_unoccupied_cell_is_ignored() {
        let mut m = model();
        assert_eq!(m.click(FocusRegion::Aggregate, Cell::new(0, 0)), FocusChange::Unchanged);
        assert_eq!(m.current(), None);
    }

    #[test]
    fn shrinking_reclamps_to_nearest_cell() {
        let mut m = model();
        m.click(FocusRegion::Content, Cell::new(1, 2));
        let change = m.reshape(FocusRegion::Content, FocusMatrix::new(1, 2));
        assert_eq!(
            change,
            FocusChange::Moved {
                from: Some((FocusRegion::Content, Cell::new(1, 2))),
                to: (FocusRegion::Content, Cell::new(0, 1)),
            }
        );
    }

    #[test]
    fn emptied_region_sets_no_focus() {
        let mut m = model();
        m.click(FocusRegion::Content, Cell::new(0, 0));
        let change = m.reshape(FocusRegion::Content, FocusMatrix::new(0, 3));
        assert!(matches!(change, FocusChange::LeftGrid { .. }));
        assert_eq!(m.current(), None);
    }

    #[test]
    fn home_end_and_content_edges() {
        let mut m = model();
        m.click(FocusRegion::Content, Cell::new(1, 1));
        m.navigate(Navigation::RowStart);
        assert_eq!(m.current(), Some((FocusRegion::Content, Cell::new(1, 0))));
        m.navigate(Navigation::RowEnd);
        assert_eq!(m.current(), Some((FocusRegion::Content, Cell::new(1, 2))));
        m.click(FocusRegion::Header, Cell::new(0, 0));
        m.navigate(Navigation::Last);
        assert_eq!(m.current(), Some((FocusRegion::Content, Cell::new(1, 2))));
    }

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl Presenter for Recorder {
        fn apply_outline(&mut self, region: FocusRegion, cell: Cell) {
            self.0.push(format!("apply {region:?} {},{}", cell.row, cell.col));
        }
        fn clear_outline(&mut self, region: FocusRegion, cell: Cell) {
            self.0.push(format!("clear {region:?} {},{}", cell.row, cell.col));
        }
        fn open_tooltip(&mut self, _: FocusRegion, _: Cell, text: &str) {
            self.0.push(format!("tip {text}"));
        }
        fn close_tooltip(&mut self) {
            self.0.push("untip".into());
        }
    }

    #[test]
    fn changes_drive_presenter_outlines() {
        let mut m = model();
        let mut p = Recorder::default();
        m.click(FocusRegion::Content, Cell::new(0, 0)).present(&mut p);
        m.navigate(Navigation::Move(Direction::Right)).present(&mut p);
        assert_eq!(
            p.0,
            vec!["apply Content 0,0", "clear Content 0,0", "apply Content 0,1"]
        );
    }
}

use crate::render;
use crate::render::fit_cell;
use crate::theme::Theme;
use crate::viewport::ViewportState;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::Span;
use ratatui_grid_core::column::ClipMode;
use ratatui_grid_core::edit::EditState;
use ratatui_grid_core::edit::ROW_ERROR_KEY;
use ratatui_grid_core::events::CellTarget;
use ratatui_grid_core::focus::Cell;
use ratatui_grid_core::focus::FocusRegion;
use ratatui_grid_core::focus::Presenter;
use ratatui_grid_core::grid::Grid;
use ratatui_grid_core::grid::GridAction;
use ratatui_grid_core::input::InputEvent;
use ratatui_grid_core::input::MouseButton;
use ratatui_grid_core::input::MouseEvent;
use ratatui_grid_core::input::MouseEventKind;
use ratatui_grid_core::l10n;
use ratatui_grid_core::l10n::DefaultLocalizer;
use ratatui_grid_core::l10n::Localizer;
use ratatui_grid_core::settings::SortDirection;
use ratatui_grid_core::value::Record;
use ratatui_grid_core::value::display_value;
use ratatui_grid_core::value::field;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use std::time::Instant;
use unicode_width::UnicodeWidthStr;

const DOUBLE_CLICK: Duration = Duration::from_millis(400);
const WHEEL_ROWS: i32 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tooltip {
    pub region: FocusRegion,
    pub cell: Cell,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PresenterState {
    pub outline: Option<(FocusRegion, Cell)>,
    pub tooltip: Option<Tooltip>,
}

/// [`Presenter`] that records outline and tooltip requests for [`GridView`] to draw.
///
/// Clones share state: hand one to [`Grid::with_presenter`] and keep the view's.
#[derive(Clone, Debug, Default)]
pub struct TerminalPresenter {
    state: Rc<RefCell<PresenterState>>,
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outline(&self) -> Option<(FocusRegion, Cell)> {
        self.state.borrow().outline
    }

    pub fn tooltip(&self) -> Option<Tooltip> {
        self.state.borrow().tooltip.clone()
    }
}

impl Presenter for TerminalPresenter {
    fn apply_outline(&mut self, region: FocusRegion, cell: Cell) {
        self.state.borrow_mut().outline = Some((region, cell));
    }

    fn clear_outline(&mut self, region: FocusRegion, cell: Cell) {
        let mut state = self.state.borrow_mut();
        if state.outline == Some((region, cell)) {
            state.outline = None;
        }
    }

    fn open_tooltip(&mut self, region: FocusRegion, cell: Cell, text: &str) {
        self.state.borrow_mut().tooltip = Some(Tooltip {
            region,
            cell,
            text: text.to_string(),
        });
    }

    fn close_tooltip(&mut self) {
        self.state.borrow_mut().tooltip = None;
    }
}

#[derive(Clone, Debug)]
pub struct GridViewOptions {
    pub show_scrollbar: bool,
    /// Bottom line with the pager, delete confirmation and validation messages.
    pub show_status: bool,
    pub col_gap: u16,
}

impl Default for GridViewOptions {
    fn default() -> Self {
        Self {
            show_scrollbar: true,
            show_status: true,
            col_gap: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct ColumnSpan {
    x: u16,
    width: u16,
}

/// Geometry of the last render, used for hit testing.
#[derive(Clone, Debug, Default)]
struct GridLayout {
    header: Rect,
    body: Rect,
    footer: Rect,
    status: Rect,
    columns: Vec<ColumnSpan>,
    /// Body lines taken by the row being added, drawn above the data rows.
    add_rows: u16,
}

struct RowPaint<'a> {
    y: u16,
    row: &'a Record,
    /// Content row index; `None` for the row being added.
    index: Option<usize>,
    base: Style,
    editing: bool,
}

/// Renders a [`Grid`] as header, content and aggregate regions plus a status line.
///
/// The view holds no grid state beyond scrolling. Keyboard input goes straight to the grid;
/// pointer input is hit-tested here first.
pub struct GridView {
    pub state: ViewportState,
    options: GridViewOptions,
    presenter: TerminalPresenter,
    localizer: Box<dyn Localizer>,
    layout: GridLayout,
    last_focus: Option<(FocusRegion, Cell)>,
    last_click: Option<(CellTarget, Instant)>,
}

impl Default for GridView {
    fn default() -> Self {
        Self {
            state: ViewportState::default(),
            options: GridViewOptions::default(),
            presenter: TerminalPresenter::new(),
            localizer: Box::new(DefaultLocalizer),
            layout: GridLayout::default(),
            last_focus: None,
            last_click: None,
        }
    }
}

impl GridView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: GridViewOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn with_localizer(mut self, localizer: impl Localizer + 'static) -> Self {
        self.localizer = Box::new(localizer);
        self
    }

    /// The presenter to install on the grid this view draws.
    pub fn presenter(&self) -> TerminalPresenter {
        self.presenter.clone()
    }

    pub fn options(&self) -> &GridViewOptions {
        &self.options
    }

    /// Routes pointer events through [`GridView::handle_mouse`] and everything else to the grid.
    pub fn handle_event(&mut self, grid: &mut Grid, event: InputEvent) -> GridAction {
        match event {
            InputEvent::Mouse(m) => self.handle_mouse(grid, m),
            other => grid.handle_event(other),
        }
    }

    pub fn handle_mouse(&mut self, grid: &mut Grid, event: MouseEvent) -> GridAction {
        match event.kind {
            MouseEventKind::ScrollUp => {
                self.state.scroll_y_by(-WHEEL_ROWS);
                GridAction::Redraw
            }
            MouseEventKind::ScrollDown => {
                self.state.scroll_y_by(WHEEL_ROWS);
                GridAction::Redraw
            }
            MouseEventKind::Down(MouseButton::Left) => {
                let Some(target) = self.hit_test(event.x, event.y) else {
                    return GridAction::None;
                };
                let now = Instant::now();
                let repeated = self
                    .last_click
                    .is_some_and(|(t, at)| t == target && now.duration_since(at) <= DOUBLE_CLICK);
                if repeated {
                    self.last_click = None;
                    grid.double_click(target)
                } else {
                    self.last_click = Some((target, now));
                    grid.click(target, event.modifiers)
                }
            }
            MouseEventKind::DoubleClick(MouseButton::Left) => {
                match self.hit_test(event.x, event.y) {
                    Some(target) => grid.double_click(target),
                    None => GridAction::None,
                }
            }
            _ => GridAction::None,
        }
    }

    /// Maps a terminal position to the cell drawn there during the last render.
    pub fn hit_test(&self, x: u16, y: u16) -> Option<CellTarget> {
        let col = self
            .layout
            .columns
            .iter()
            .position(|c| x >= c.x && x < c.x + c.width)?;
        let inside = |r: Rect| y >= r.y && y < r.y + r.height;
        let (region, row) = if inside(self.layout.header) {
            (FocusRegion::Header, 0)
        } else if inside(self.layout.body) {
            let line = y - self.layout.body.y;
            let line = line.checked_sub(self.layout.add_rows)?;
            (FocusRegion::Content, self.state.y as usize + line as usize)
        } else if inside(self.layout.footer) {
            (FocusRegion::Aggregate, (y - self.layout.footer.y) as usize)
        } else {
            return None;
        };
        Some(CellTarget {
            region,
            cell: Cell::new(row, col),
        })
    }

    pub fn render(&mut self, area: Rect, buf: &mut Buffer, grid: &Grid, theme: &Theme) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        self.layout = self.compute_layout(area, grid);
        buf.set_style(area, theme.text_primary);

        let session = grid.edit_session();
        let add_rows = self.layout.add_rows as u32;
        let body_lines = self.layout.body.height.saturating_sub(self.layout.add_rows);
        self.state.set_viewport(body_lines);
        self.state.set_content(grid.rows().len() as u32);

        let focus = self.presenter.outline();
        if focus != self.last_focus {
            if let Some((FocusRegion::Content, cell)) = focus {
                self.state.ensure_visible(cell.row as u32);
            }
            self.last_focus = focus;
        }

        self.render_header(buf, grid, theme, focus);
        if add_rows > 0 {
            let merged = session.merged();
            let paint = RowPaint {
                y: self.layout.body.y,
                row: &merged,
                index: None,
                base: theme.text_primary.patch(theme.editing),
                editing: true,
            };
            self.render_row(buf, grid, theme, &paint, focus);
        }
        self.render_body(buf, grid, theme, focus);
        self.render_footer(buf, grid, theme, focus);
        self.render_status(buf, grid, theme);
        self.render_tooltip(area, buf, theme);

        if self.options.show_scrollbar && area.width >= 2 && self.layout.body.height > 0 {
            let x = area.x + area.width - 1;
            render::render_scrollbar(
                Rect::new(x, self.layout.body.y, 1, self.layout.body.height),
                buf,
                &self.state,
                theme.text_muted,
            );
        }
    }

    fn compute_layout(&self, area: Rect, grid: &Grid) -> GridLayout {
        let inner_w = if self.options.show_scrollbar && area.width >= 2 {
            area.width - 1
        } else {
            area.width
        };
        let mut columns = Vec::new();
        let mut x = 0u16;
        for col in grid.columns().visible() {
            if x >= inner_w {
                break;
            }
            let width = col.width.max(1).min(inner_w - x);
            columns.push(ColumnSpan {
                x: area.x + x,
                width,
            });
            x = x.saturating_add(width).saturating_add(self.options.col_gap);
        }

        let mut remaining = area.height;
        let mut take = |want: u16| {
            let h = want.min(remaining);
            remaining -= h;
            h
        };
        let header_h = take(1);
        let status_h = take(u16::from(self.options.show_status));
        let footer_h = take(grid.aggregates().rows.len().min(u16::MAX as usize) as u16);
        let body_h = remaining;

        let header = Rect::new(area.x, area.y, inner_w, header_h);
        let body = Rect::new(area.x, area.y + header_h, inner_w, body_h);
        let footer = Rect::new(area.x, body.y + body_h, inner_w, footer_h);
        let status = Rect::new(area.x, footer.y + footer_h, area.width, status_h);
        let session = grid.edit_session();
        let adding = session.is_active() && session.origin() == EditState::Adding;
        GridLayout {
            header,
            body,
            footer,
            status,
            columns,
            add_rows: u16::from(adding && body_h > 0),
        }
    }

    fn render_header(
        &self,
        buf: &mut Buffer,
        grid: &Grid,
        theme: &Theme,
        focus: Option<(FocusRegion, Cell)>,
    ) {
        let area = self.layout.header;
        if area.height == 0 {
            return;
        }
        let base = theme.text_primary.patch(theme.header);
        buf.set_style(area, base);
        let sort = &grid.settings().sort;
        let multi = sort.columns.len() > 1;
        for (i, (span, col)) in self
            .layout
            .columns
            .iter()
            .zip(grid.columns().visible())
            .enumerate()
        {
            let mut title = col.header_text.clone();
            if let Some(pos) = sort.ordered().iter().position(|d| d.field == col.field) {
                let d = sort.ordered()[pos];
                title.push(' ');
                title.push(match d.direction {
                    SortDirection::Ascending => '▲',
                    SortDirection::Descending => '▼',
                });
                if multi {
                    title.push_str(&(pos + 1).to_string());
                }
            }
            let style = if focus == Some((FocusRegion::Header, Cell::new(0, i))) {
                base.patch(theme.focus)
            } else {
                base
            };
            let text = fit_cell(&title, span.width, col.clip_mode);
            buf.set_style(Rect::new(span.x, area.y, span.width, 1), style);
            render::render_spans(span.x, area.y, span.width, buf, &[Span::raw(text)], style);
        }
    }

    fn render_body(
        &self,
        buf: &mut Buffer,
        grid: &Grid,
        theme: &Theme,
        focus: Option<(FocusRegion, Cell)>,
    ) {
        let area = self.layout.body;
        let first_line = area.y + self.layout.add_rows;
        let lines = area.height.saturating_sub(self.layout.add_rows);
        if grid.rows().is_empty() {
            if lines > 0 {
                let text = self.localizer.text(l10n::EMPTY_RECORD, &[]);
                let style = theme.text_primary.patch(theme.text_muted);
                let spans = [Span::raw(text)];
                render::render_spans(area.x, first_line, area.width, buf, &spans, style);
            }
            return;
        }

        let session = grid.edit_session();
        let start = self.state.y as usize;
        for (dy, (idx, row)) in grid
            .rows()
            .iter()
            .enumerate()
            .skip(start)
            .take(lines as usize)
            .enumerate()
        {
            let key = grid.row_key(row);
            let mut base = theme.text_primary;
            if grid.selection().is_selected(&key) {
                base = base.patch(theme.selected);
            }
            let editing = session.is_active() && session.row_key() == Some(&key);
            let merged = editing.then(|| session.merged());
            if editing {
                base = base.patch(theme.editing);
            }
            let paint = RowPaint {
                y: first_line + dy as u16,
                row: merged.as_ref().unwrap_or(row),
                index: Some(idx),
                base,
                editing,
            };
            self.render_row(buf, grid, theme, &paint, focus);
        }
    }

    fn render_row(
        &self,
        buf: &mut Buffer,
        grid: &Grid,
        theme: &Theme,
        paint: &RowPaint<'_>,
        focus: Option<(FocusRegion, Cell)>,
    ) {
        let errors = grid.edit_session().errors();
        for (i, (span, col)) in self
            .layout
            .columns
            .iter()
            .zip(grid.columns().visible())
            .enumerate()
        {
            let mut style = paint.base;
            if paint.editing && errors.contains_key(&col.field) {
                style = style.patch(theme.danger);
            }
            if let Some(idx) = paint.index
                && focus == Some((FocusRegion::Content, Cell::new(idx, i)))
            {
                style = style.patch(theme.focus);
            }
            let value = display_value(field(paint.row, &col.field));
            let text = fit_cell(&value, span.width, col.clip_mode);
            buf.set_style(Rect::new(span.x, paint.y, span.width, 1), style);
            render::render_spans(span.x, paint.y, span.width, buf, &[Span::raw(text)], style);
        }
    }

    fn render_footer(
        &self,
        buf: &mut Buffer,
        grid: &Grid,
        theme: &Theme,
        focus: Option<(FocusRegion, Cell)>,
    ) {
        let area = self.layout.footer;
        let base = theme.text_primary.patch(theme.accent);
        for (r, values) in grid
            .aggregates()
            .rows
            .iter()
            .enumerate()
            .take(area.height as usize)
        {
            let y = area.y + r as u16;
            for (i, (span, value)) in self.layout.columns.iter().zip(values).enumerate() {
                let Some((kind, value)) = value else {
                    continue;
                };
                let style = if focus == Some((FocusRegion::Aggregate, Cell::new(r, i))) {
                    base.patch(theme.focus)
                } else {
                    base
                };
                let text = format!("{}: {}", kind.label(), display_value(value));
                let text = fit_cell(&text, span.width, ClipMode::Ellipsis);
                buf.set_style(Rect::new(span.x, y, span.width, 1), style);
                render::render_spans(span.x, y, span.width, buf, &[Span::raw(text)], style);
            }
        }
    }

    fn render_status(&self, buf: &mut Buffer, grid: &Grid, theme: &Theme) {
        let area = self.layout.status;
        if area.height == 0 {
            return;
        }
        let session = grid.edit_session();
        let page = &grid.settings().page;
        let (text, style) = if session.origin() == EditState::Deleting && session.is_active() {
            (self.localizer.text(l10n::CONFIRM_DELETE, &[]), theme.danger)
        } else if let Some((name, message)) = session.errors().first() {
            let reason = if name == ROW_ERROR_KEY {
                message.clone()
            } else {
                format!("{name}: {message}")
            };
            (
                self.localizer.text(l10n::SAVE_FAILED, &[("reason", reason)]),
                theme.danger,
            )
        } else if page.enabled {
            let args = [
                ("current", page.current_page.to_string()),
                ("pages", page.page_count().to_string()),
                ("total", page.total_records_count.to_string()),
            ];
            (self.localizer.text(l10n::PAGER_INFO, &args), theme.text_muted)
        } else {
            return;
        };
        let style = theme.text_primary.patch(style);
        render::render_spans(area.x, area.y, area.width, buf, &[Span::raw(text)], style);
    }

    fn render_tooltip(&self, area: Rect, buf: &mut Buffer, theme: &Theme) {
        let Some(tip) = self.presenter.tooltip() else {
            return;
        };
        let Some(span) = self.layout.columns.get(tip.cell.col) else {
            return;
        };
        let anchor_y = match tip.region {
            FocusRegion::Header => self.layout.header.y,
            FocusRegion::Aggregate => self.layout.footer.y + tip.cell.row as u16,
            FocusRegion::Content => {
                let Some(line) = (tip.cell.row as u32).checked_sub(self.state.y) else {
                    return;
                };
                if line >= self.state.viewport_h as u32 {
                    return;
                }
                self.layout.body.y + self.layout.add_rows + line as u16
            }
        };
        let bottom = area.y + area.height;
        let y = if anchor_y + 1 < bottom {
            anchor_y + 1
        } else if anchor_y > area.y {
            anchor_y - 1
        } else {
            return;
        };
        let max_w = (area.x + area.width).saturating_sub(span.x);
        let width = (UnicodeWidthStr::width(tip.text.as_str()) as u16).min(max_w);
        buf.set_style(Rect::new(span.x, y, width, 1), theme.tooltip);
        render::render_spans(span.x, y, width, buf, &[Span::raw(tip.text)], theme.tooltip);
    }
}

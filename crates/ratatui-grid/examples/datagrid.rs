use crossterm::event::DisableMouseCapture;
use crossterm::event::EnableMouseCapture;
use crossterm::event::Event;
use crossterm::event::KeyCode;
use crossterm::event::KeyEventKind;
use crossterm::terminal::EnterAlternateScreen;
use crossterm::terminal::LeaveAlternateScreen;
use crossterm::terminal::disable_raw_mode;
use crossterm::terminal::enable_raw_mode;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::widgets::Block;
use ratatui::widgets::Borders;
use ratatui_grid::aggregate::AggregateColumn;
use ratatui_grid::aggregate::AggregateRow;
use ratatui_grid::aggregate::AggregateType;
use ratatui_grid::column::ClipMode;
use ratatui_grid::column::ColumnDef;
use ratatui_grid::crossterm_input::input_event_from_crossterm;
use ratatui_grid::edit::EditSettings;
use ratatui_grid::grid::FetchTask;
use ratatui_grid::grid::Grid;
use ratatui_grid::grid::GridAction;
use ratatui_grid::grid::GridOptions;
use ratatui_grid::help::HelpBar;
use ratatui_grid::help::HelpBarOptions;
use ratatui_grid::selection::SelectionMode;
use ratatui_grid::selection::SelectionSettings;
use ratatui_grid::settings::FilterOperator;
use ratatui_grid::settings::FilterPredicate;
use ratatui_grid::settings::FilterSettings;
use ratatui_grid::theme::Theme;
use ratatui_grid::value::Record;
use ratatui_grid::view::GridView;
use serde_json::Value;
use serde_json::json;
use std::io;
use std::time::Duration;

const PRODUCTS: [&str; 6] = ["Chai", "Chang", "Aniseed Syrup", "Tofu", "Konbu", "Ikura"];

fn main() -> io::Result<()> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    crossterm::execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let theme = Theme::default();
    let mut view = GridView::new();
    let mut grid = Grid::local(options(), records()).with_presenter(view.presenter());
    let task = grid.init();
    settle(&mut grid, task);
    grid.set_selection_settings(SelectionSettings {
        mode: SelectionMode::Multiple,
        toggle: true,
    });

    let res = run(&mut terminal, &theme, &mut view, &mut grid);

    grid.destroy();
    disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    res
}

fn options() -> GridOptions {
    let mut options = GridOptions::new(vec![
        ColumnDef::new("id").header("ID").primary_key().width(5),
        ColumnDef::new("product")
            .header("Product")
            .width(10)
            .clip_mode(ClipMode::EllipsisWithTooltip),
        ColumnDef::new("price").header("Price").width(10),
        ColumnDef::new("stock").header("Stock").width(10),
        ColumnDef::new("discontinued")
            .header("Disc.")
            .width(6)
            .default_value(Value::Bool(false)),
    ]);
    options.allow_paging = true;
    options.page_settings.page_size = 12;
    options.edit_settings = EditSettings::all();
    options.aggregates = vec![AggregateRow {
        columns: vec![
            AggregateColumn {
                field: "price".into(),
                kind: AggregateType::Average,
            },
            AggregateColumn {
                field: "stock".into(),
                kind: AggregateType::Sum,
            },
        ],
    }];
    options
}

fn records() -> Vec<Record> {
    (0..120)
        .filter_map(|i| {
            let row = json!({
                "id": i,
                "product": PRODUCTS[i % PRODUCTS.len()],
                "price": 5 + (i * 7) % 40,
                "stock": (i * 13) % 90,
                "discontinued": i % 9 == 0,
            });
            match row {
                Value::Object(m) => Some(m),
                _ => None,
            }
        })
        .collect()
}

fn run<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    theme: &Theme,
    view: &mut GridView,
    grid: &mut Grid,
) -> io::Result<()> {
    let help = HelpBar::for_grid(
        grid.bindings(),
        HelpBarOptions {
            style: theme.text_muted,
            key_style: theme.accent,
            ..Default::default()
        },
    );
    let mut status = String::new();
    loop {
        terminal.draw(|f| {
            let area = f.area();
            let block = Block::default()
                .title("Grid (arrows, Enter sort/save, F2 edit, Ins add, Del delete, q)")
                .borders(Borders::ALL);
            let inner = block.inner(area);
            f.render_widget(block, area);

            let buf = f.buffer_mut();
            let grid_area = Rect::new(
                inner.x,
                inner.y,
                inner.width,
                inner.height.saturating_sub(2),
            );
            let status_y = inner.y + grid_area.height;
            view.render(grid_area, buf, grid, theme);
            buf.set_stringn(
                inner.x,
                status_y,
                &status,
                inner.width as usize,
                theme.text_primary,
            );
            help.render_ref(Rect::new(inner.x, status_y + 1, inner.width, 1), buf);
        })?;

        if !crossterm::event::poll(Duration::from_millis(50))? {
            continue;
        }
        let ev = crossterm::event::read()?;
        if let Event::Key(key) = &ev {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if key.code == KeyCode::Char('q') && !grid.edit_session().is_active() {
                return Ok(());
            }
        }
        let Some(ev) = input_event_from_crossterm(ev) else {
            continue;
        };
        match view.handle_event(grid, ev) {
            GridAction::Fetch(task) => settle(grid, Some(task)),
            GridAction::Save(task) => {
                let outcome = futures::executor::block_on(task);
                let next = grid.settle_save(outcome);
                settle(grid, next);
            }
            GridAction::FilterMenu { field } => toggle_filter(grid, &field),
            GridAction::CopyRequested(text) => {
                status = format!("copied {} bytes", text.len());
            }
            GridAction::FocusLeft | GridAction::Redraw | GridAction::None => {}
        }
        let events = grid.drain_events();
        if !events.is_empty() {
            status = format!("{} grid events", events.len());
        }
        if let Some((name, message)) = grid.edit_session().errors().first() {
            status = format!("{name}: {message}");
        }
    }
}

/// Stands in for a filter menu: toggles a "greater than 20" filter on the column.
fn toggle_filter(grid: &mut Grid, name: &str) {
    let mut filter: FilterSettings = grid.settings().filter.clone();
    if !filter.remove_field(name) {
        filter.columns.push(FilterPredicate::new(
            name,
            FilterOperator::GreaterThan,
            json!(20),
        ));
    }
    let task = grid.set_filter_settings(filter);
    settle(grid, task);
}

fn settle(grid: &mut Grid, mut next: Option<FetchTask>) {
    while let Some(task) = next {
        next = grid.settle_fetch(futures::executor::block_on(task));
    }
}

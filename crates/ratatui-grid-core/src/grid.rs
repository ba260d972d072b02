//! The grid coordinator.
//!
//! [`Grid`] owns every engine component and is the only writer of their state. Hosts drive it
//! from their event loop:
//!
//! - feed input with [`Grid::handle_event`] (or [`Grid::click`] for pointer hits),
//! - run any [`FetchTask`]/[`SaveTask`] they are handed and return the outcome through
//!   [`Grid::settle_fetch`]/[`Grid::settle_save`],
//! - render from the read accessors and drain notifications with [`Grid::drain_events`].
//!
//! In-memory sources settle inline, so tasks only reach the host for remote providers (and for
//! explicit persistence calls, which always return a task).

use crate::aggregate::AggregateRow;
use crate::aggregate::AggregateValues;
use crate::column::ClipMode;
use crate::column::Column;
use crate::column::ColumnDef;
use crate::column::ColumnModel;
use crate::data::BatchChanges;
use crate::data::DataFuture;
use crate::data::DataOrchestrator;
use crate::data::DataProvider;
use crate::data::DataSource;
use crate::data::Mutation;
use crate::data::MutationRequest;
use crate::data::PendingSnapshot;
use crate::data::PersistFuture;
use crate::data::RequestType;
use crate::edit::EditLifecycle;
use crate::edit::EditMode;
use crate::edit::EditSession;
use crate::edit::EditSettings;
use crate::edit::SavedRow;
use crate::error::DataError;
use crate::error::EditError;
use crate::error::GridError;
use crate::events::CellTarget;
use crate::events::GridEvent;
use crate::events::RowInfo;
use crate::focus::Direction;
use crate::focus::FocusChange;
use crate::focus::FocusMatrix;
use crate::focus::FocusModel;
use crate::focus::FocusRegion;
use crate::focus::Navigation;
use crate::focus::NoopPresenter;
use crate::focus::Presenter;
use crate::input::InputEvent;
use crate::input::KeyCode;
use crate::input::KeyEvent;
use crate::input::KeyModifiers;
use crate::keymap::GridBindings;
use crate::query::Query;
use crate::query::QueryBuilder;
use crate::query::QueryResult;
use crate::reconcile::SettingsReconciler;
use crate::reconcile::reconcile;
use crate::selection::SelectionHandler;
use crate::selection::SelectionSettings;
use crate::selection::SelectionState;
use crate::settings::FilterSettings;
use crate::settings::GridSettings;
use crate::settings::PageSettings;
use crate::settings::SearchSettings;
use crate::settings::SettingsCommand;
use crate::settings::SettingsPolicy;
use crate::settings::SortDirection;
use crate::settings::SortSettings;
use crate::validation::DefaultValidator;
use crate::validation::FieldValidator;
use crate::value::Record;
use crate::value::RowKey;
use crate::value::display_value;
use crate::value::field;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::IntoFuture;
use std::sync::Arc;
use unicode_width::UnicodeWidthStr;

/// Host configuration for a [`Grid`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GridOptions {
    pub columns: Vec<ColumnDef>,
    pub allow_sorting: bool,
    pub allow_multi_sorting: bool,
    pub allow_filtering: bool,
    pub allow_paging: bool,
    pub sort_settings: SortSettings,
    pub filter_settings: FilterSettings,
    pub search_settings: SearchSettings,
    pub page_settings: PageSettings,
    pub selection_settings: SelectionSettings,
    pub edit_settings: EditSettings,
    pub aggregates: Vec<AggregateRow>,
    /// Steps applied before the grid's own search/filter/sort/page steps.
    pub base_query: Option<Query>,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            allow_sorting: true,
            allow_multi_sorting: true,
            allow_filtering: true,
            allow_paging: false,
            sort_settings: SortSettings::default(),
            filter_settings: FilterSettings::default(),
            search_settings: SearchSettings::default(),
            page_settings: PageSettings::default(),
            selection_settings: SelectionSettings::default(),
            edit_settings: EditSettings::default(),
            aggregates: Vec::new(),
            base_query: None,
        }
    }
}

impl GridOptions {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    fn policy(&self) -> SettingsPolicy {
        SettingsPolicy {
            allow_sorting: self.allow_sorting,
            allow_multi_sorting: self.allow_multi_sorting,
            allow_filtering: self.allow_filtering,
            allow_paging: self.allow_paging,
        }
    }
}

/// A data request handed to the host. Await it and pass the outcome to
/// [`Grid::settle_fetch`].
pub struct FetchTask {
    id: u64,
    query: Query,
    future: DataFuture,
}

impl FetchTask {
    pub fn query(&self) -> &Query {
        &self.query
    }
}

impl fmt::Debug for FetchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchTask")
            .field("id", &self.id)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchOutcome {
    id: u64,
    pub result: Result<QueryResult, DataError>,
}

impl IntoFuture for FetchTask {
    type Output = FetchOutcome;
    type IntoFuture = BoxFuture<'static, FetchOutcome>;

    fn into_future(self) -> Self::IntoFuture {
        let id = self.id;
        self.future
            .map(move |result| FetchOutcome { id, result })
            .boxed()
    }
}

#[derive(Clone, Debug, PartialEq)]
enum SaveKind {
    Session,
    Batch,
    Patch { key: RowKey, patch: Record },
}

/// A persistence call handed to the host. Await it and pass the outcome to
/// [`Grid::settle_save`].
pub struct SaveTask {
    kind: SaveKind,
    request: MutationRequest,
    future: PersistFuture,
}

impl SaveTask {
    pub fn request(&self) -> &MutationRequest {
        &self.request
    }
}

impl fmt::Debug for SaveTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveTask")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SaveOutcome {
    kind: SaveKind,
    pub result: Result<Option<Record>, DataError>,
}

impl IntoFuture for SaveTask {
    type Output = SaveOutcome;
    type IntoFuture = BoxFuture<'static, SaveOutcome>;

    fn into_future(self) -> Self::IntoFuture {
        let kind = self.kind;
        self.future
            .map(move |result| SaveOutcome { kind, result })
            .boxed()
    }
}

/// Result of [`Grid::save_edit`].
#[derive(Debug)]
pub enum EditStep {
    /// Validation failed; see the session's error map.
    Invalid { count: usize },
    /// The row was moved into the pending batch.
    Staged,
    Save(SaveTask),
}

/// What the host should do after an input event.
#[derive(Debug)]
pub enum GridAction {
    None,
    Redraw,
    Fetch(FetchTask),
    Save(SaveTask),
    /// The filter menu was requested for a column.
    FilterMenu { field: String },
    CopyRequested(String),
    /// Keyboard focus moved past the first or last grid cell.
    FocusLeft,
}

#[derive(Debug, Default)]
struct FetchState {
    in_flight: Option<u64>,
    queued: bool,
    /// The in-flight fetch shares a request issued outside the grid, for another query.
    joined: bool,
    /// The next fetch asks for the total row count even when paging is off.
    recount: bool,
    next_id: u64,
}

/// The public read/query surface of a grid.
pub trait GridApi {
    /// Runs the current settings as a query. Shares an in-flight remote request if one exists.
    ///
    /// The result goes to the caller only; the grid's rows and row count are untouched. Use
    /// [`Grid::recount`] to refresh the count the grid shows.
    fn get_data(&self, skip_page: bool, requires_count: bool) -> DataFuture;
    fn visible_columns(&self) -> Vec<&Column>;
    fn hidden_columns(&self) -> Vec<&Column>;
    fn column_by_field(&self, field: &str) -> Option<&Column>;
    fn column_by_uid(&self, uid: &str) -> Option<&Column>;
    /// Merges `partial` into the row with `key`. With `persist` the change is also sent to
    /// the data source and the returned task must be settled.
    fn set_row_data(
        &mut self,
        key: &RowKey,
        partial: Record,
        persist: bool,
    ) -> Result<Option<SaveTask>, EditError>;
    fn set_cell_value(
        &mut self,
        key: &RowKey,
        field: &str,
        value: Value,
        persist: bool,
    ) -> Result<Option<SaveTask>, EditError>;
    fn row_info(&self, target: CellTarget) -> Option<RowInfo>;
}

pub struct Grid {
    columns: ColumnModel,
    settings: GridSettings,
    policy: SettingsPolicy,
    reconciler: SettingsReconciler,
    base_query: Option<Query>,
    data: DataOrchestrator,
    rows: Vec<Record>,
    aggregate_rows: Vec<AggregateRow>,
    aggregates: AggregateValues,
    focus: FocusModel,
    selection: SelectionState,
    selection_handler: Option<Box<dyn SelectionHandler>>,
    edit: EditLifecycle,
    validator: Box<dyn FieldValidator>,
    presenter: Box<dyn Presenter>,
    bindings: GridBindings,
    events: Vec<GridEvent>,
    fetch: FetchState,
    tooltip_open: bool,
    destroyed: bool,
}

impl Grid {
    pub fn new(options: GridOptions, source: DataSource) -> Self {
        let columns = ColumnModel::new(&options.columns);
        let policy = options.policy();
        let mut settings = GridSettings {
            sort: options.sort_settings,
            filter: options.filter_settings,
            search: options.search_settings,
            page: options.page_settings,
        };
        settings.page.enabled = options.allow_paging;
        let settings = reconcile(&columns, &settings);
        Self {
            reconciler: SettingsReconciler::new(&columns),
            columns,
            settings,
            policy,
            base_query: options.base_query,
            data: DataOrchestrator::new(source),
            rows: Vec::new(),
            aggregate_rows: options.aggregates,
            aggregates: AggregateValues::default(),
            focus: FocusModel::new(),
            selection: SelectionState::new(options.selection_settings),
            selection_handler: None,
            edit: EditLifecycle::new(options.edit_settings),
            validator: Box::new(DefaultValidator),
            presenter: Box::new(NoopPresenter),
            bindings: GridBindings::default(),
            events: Vec::new(),
            fetch: FetchState::default(),
            tooltip_open: false,
            destroyed: false,
        }
    }

    pub fn local(options: GridOptions, records: Vec<Record>) -> Self {
        Self::new(options, DataSource::Local(crate::data::LocalData::new(records)))
    }

    pub fn remote(options: GridOptions, provider: Arc<dyn DataProvider>) -> Self {
        Self::new(options, DataSource::Remote(provider))
    }

    pub fn with_presenter(mut self, presenter: impl Presenter + 'static) -> Self {
        self.presenter = Box::new(presenter);
        self
    }

    pub fn with_validator(mut self, validator: impl FieldValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn with_selection_handler(mut self, handler: impl SelectionHandler + 'static) -> Self {
        self.selection_handler = Some(Box::new(handler));
        self
    }

    pub fn with_bindings(mut self, bindings: GridBindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn columns(&self) -> &ColumnModel {
        &self.columns
    }

    pub fn settings(&self) -> &GridSettings {
        &self.settings
    }

    /// Rows of the current view.
    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn aggregates(&self) -> &AggregateValues {
        &self.aggregates
    }

    pub fn focus(&self) -> &FocusModel {
        &self.focus
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn edit_session(&self) -> &EditSession {
        self.edit.session()
    }

    pub fn batch(&self) -> &BatchChanges {
        self.edit.batch()
    }

    pub fn bindings(&self) -> &GridBindings {
        &self.bindings
    }

    pub fn pending(&self) -> PendingSnapshot {
        self.data.pending()
    }

    /// Whether the grid is waiting on its own fetch.
    pub fn is_fetching(&self) -> bool {
        self.fetch.in_flight.is_some()
    }

    pub fn drain_events(&mut self) -> Vec<GridEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: GridEvent) {
        self.events.push(event);
    }

    fn emit_error(&mut self, error: impl Into<GridError>) {
        self.emit(GridEvent::Error {
            error: error.into(),
        });
    }

    /// Builds the query for the current settings.
    pub fn query(&self, skip_page: bool, requires_count: bool) -> Query {
        QueryBuilder::new(&self.settings)
            .base(self.base_query.as_ref())
            .default_search_fields(self.columns.searchable_fields())
            .requires_count(requires_count)
            .skip_page(skip_page)
            .build()
    }

    /// Synchronous [`GridApi::get_data`] for in-memory sources.
    pub fn get_data_local(
        &self,
        skip_page: bool,
        requires_count: bool,
    ) -> Result<QueryResult, DataError> {
        self.data
            .execute_sync(&self.query(skip_page, requires_count))
    }

    pub fn init(&mut self) -> Option<FetchTask> {
        self.emit(GridEvent::Init);
        self.reshape_focus();
        self.emit(GridEvent::RenderStart);
        self.request_fetch()
    }

    /// Fetches again with a row count, updating `total_records_count` even when paging is off.
    pub fn recount(&mut self) -> Option<FetchTask> {
        self.fetch.recount = true;
        self.request_fetch()
    }

    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.edit.force_reset();
        if self.tooltip_open {
            self.presenter.close_tooltip();
            self.tooltip_open = false;
        }
        let change = self.focus.blur();
        change.present(self.presenter.as_mut());
        self.fetch = FetchState::default();
        self.destroyed = true;
        self.emit(GridEvent::Destroy);
    }

    fn request_fetch(&mut self) -> Option<FetchTask> {
        if self.destroyed {
            return None;
        }
        if self.fetch.in_flight.is_some() {
            tracing::debug!("settings changed while fetching; follow-up queued");
            self.fetch.queued = true;
            return None;
        }
        let requires_count = self.settings.page.enabled || self.fetch.recount;
        let query = self.query(false, requires_count);
        let id = self.fetch.next_id;
        self.fetch.next_id += 1;
        self.fetch.in_flight = Some(id);
        self.fetch.joined = self.data.is_pending();
        self.emit(GridEvent::DataRequest {
            query: query.clone(),
        });
        let future = self.data.execute(query.clone());
        if self.data.is_remote() {
            return Some(FetchTask { id, query, future });
        }
        match future.clone().now_or_never() {
            Some(result) => self.settle_fetch(FetchOutcome { id, result }),
            None => Some(FetchTask { id, query, future }),
        }
    }

    /// Applies a settled fetch. Returns the follow-up fetch when settings changed meanwhile.
    ///
    /// A failed fetch keeps the previous rows and reports through [`GridEvent::Error`].
    pub fn settle_fetch(&mut self, outcome: FetchOutcome) -> Option<FetchTask> {
        if self.fetch.in_flight != Some(outcome.id) {
            tracing::debug!(id = outcome.id, "ignoring stale fetch result");
            return None;
        }
        self.fetch.in_flight = None;
        if std::mem::take(&mut self.fetch.joined) {
            tracing::debug!(id = outcome.id, "fetch shared a host request; refetching");
            self.fetch.queued = false;
            return self.request_fetch();
        }
        match outcome.result {
            Ok(result) => {
                if self.apply_result(result) {
                    self.fetch.queued = true;
                }
            }
            Err(err) => {
                tracing::warn!(%err, "fetch failed; keeping the last rows");
                self.emit_error(err);
            }
        }
        if std::mem::take(&mut self.fetch.queued) {
            self.request_fetch()
        } else {
            None
        }
    }

    /// Returns `true` when the page had to be clamped and the view is stale.
    fn apply_result(&mut self, result: QueryResult) -> bool {
        self.rows = result.records;
        let mut clamped = false;
        if let Some(count) = result.count {
            self.fetch.recount = false;
            let page = &mut self.settings.page;
            page.total_records_count = count;
            let before = page.current_page;
            page.clamp();
            clamped = before != page.current_page;
        }
        self.rows_changed();
        clamped
    }

    fn rows_changed(&mut self) {
        let keys: Vec<RowKey> = self.rows.iter().map(|r| self.row_key(r)).collect();
        if self.selection.retain(|k| keys.contains(k)) {
            self.selection_changed();
        }
        self.aggregates = AggregateValues::compute(
            &self.aggregate_rows,
            &self.columns.visible(),
            &self.rows,
        );
        self.reshape_focus();
    }

    fn reshape_focus(&mut self) {
        let cols = self.columns.visible_count();
        let regions = [
            (FocusRegion::Header, FocusMatrix::new(1, cols)),
            (FocusRegion::Content, FocusMatrix::new(self.rows.len(), cols)),
            (FocusRegion::Aggregate, self.aggregates.occupancy()),
        ];
        for (region, matrix) in regions {
            let change = self.focus.reshape(region, matrix);
            self.focus_changed(change);
        }
    }

    fn focus_changed(&mut self, change: FocusChange) {
        if change == FocusChange::Unchanged {
            return;
        }
        if self.tooltip_open {
            self.presenter.close_tooltip();
            self.tooltip_open = false;
        }
        change.present(self.presenter.as_mut());
        match change {
            FocusChange::Moved { to: (region, cell), .. } => {
                let info = self.row_info(CellTarget { region, cell });
                if let Some(text) = info.as_ref().and_then(clipped_text) {
                    self.presenter.open_tooltip(region, cell, &text);
                    self.tooltip_open = true;
                }
                self.emit(GridEvent::CellFocus { info });
            }
            FocusChange::LeftGrid { .. } => self.emit(GridEvent::CellFocus { info: None }),
            FocusChange::Unchanged => {}
        }
    }

    /// Identity of `row`: its primary key, or the serialised row when no key column exists.
    pub fn row_key(&self, row: &Record) -> RowKey {
        self.columns
            .primary_key()
            .and_then(|pk| RowKey::of(row, &pk.field))
            .unwrap_or_else(|| RowKey::Json(Value::Object(row.clone()).to_string()))
    }

    fn position_of(&self, key: &RowKey) -> Option<usize> {
        self.rows.iter().position(|r| self.row_key(r) == *key)
    }

    fn focused_row(&self) -> Option<&Record> {
        match self.focus.current()? {
            (FocusRegion::Content, cell) => self.rows.get(cell.row),
            _ => None,
        }
    }

    fn header_field(&self) -> Option<String> {
        match self.focus.current()? {
            (FocusRegion::Header, cell) => {
                self.columns.visible_at(cell.col).map(|c| c.field.clone())
            }
            _ => None,
        }
    }

    fn command_action(&mut self, cmd: SettingsCommand) -> GridAction {
        if !self.settings.apply(cmd, &self.columns, self.policy) {
            return GridAction::None;
        }
        match self.request_fetch() {
            Some(task) => GridAction::Fetch(task),
            None => GridAction::Redraw,
        }
    }

    /// Applies a settings command. Returns the fetch to run, if the change needs one that the
    /// host has to drive.
    pub fn dispatch(&mut self, cmd: SettingsCommand) -> Option<FetchTask> {
        match self.command_action(cmd) {
            GridAction::Fetch(task) => Some(task),
            _ => None,
        }
    }

    pub fn sort_column(
        &mut self,
        field: &str,
        direction: Option<SortDirection>,
        multi: bool,
    ) -> Option<FetchTask> {
        self.dispatch(SettingsCommand::Sort {
            field: field.to_string(),
            direction,
            multi,
        })
    }

    pub fn set_filter_settings(&mut self, filter: FilterSettings) -> Option<FetchTask> {
        self.dispatch(SettingsCommand::SetFilter(filter))
    }

    pub fn set_search_settings(&mut self, search: SearchSettings) -> Option<FetchTask> {
        self.dispatch(SettingsCommand::SetSearch(search))
    }

    pub fn go_to_page(&mut self, page: usize) -> Option<FetchTask> {
        self.dispatch(SettingsCommand::GoToPage(page))
    }

    /// Replaces the column declarations. Sort and filter entries that lost their column's
    /// capability are dropped, which triggers a fetch.
    pub fn set_columns(&mut self, defs: &[ColumnDef]) -> Option<FetchTask> {
        self.columns = ColumnModel::new(defs);
        let refetch = match self.reconciler.on_columns_changed(&self.columns, &self.settings) {
            Some(next) => {
                self.settings = next;
                true
            }
            None => false,
        };
        self.rows_changed();
        if refetch { self.request_fetch() } else { None }
    }

    pub fn set_column_visible(&mut self, field: &str, visible: bool) -> Option<FetchTask> {
        if !self.columns.set_visible(field, visible) {
            return None;
        }
        self.rows_changed();
        let search = &self.settings.search;
        if search.is_active() && search.fields.is_empty() {
            self.request_fetch()
        } else {
            None
        }
    }

    pub fn set_selection_settings(&mut self, settings: SelectionSettings) {
        if self.selection.set_settings(settings) {
            self.selection_changed();
        }
    }

    fn selection_changed(&mut self) {
        self.emit(GridEvent::SelectionChanged {
            keys: self.selection.keys().iter().cloned().collect(),
        });
    }

    /// Activates selection for the row with `key`, consulting the selection handler.
    pub fn select_row(&mut self, key: &RowKey) -> bool {
        let handler = self
            .selection_handler
            .as_deref_mut()
            .map(|h| h as &mut dyn SelectionHandler);
        let changed = self.selection.on_activate(key, handler);
        if changed {
            self.selection_changed();
        }
        changed
    }

    pub fn select_all(&mut self) -> bool {
        let keys: Vec<RowKey> = self.rows.iter().map(|r| self.row_key(r)).collect();
        let handler = self
            .selection_handler
            .as_deref_mut()
            .map(|h| h as &mut dyn SelectionHandler);
        let changed = self.selection.select_all(keys.iter(), handler);
        if changed {
            self.selection_changed();
        }
        changed
    }

    pub fn clear_selection(&mut self) -> bool {
        let handler = self
            .selection_handler
            .as_deref_mut()
            .map(|h| h as &mut dyn SelectionHandler);
        let changed = self.selection.clear(handler);
        if changed {
            self.selection_changed();
        }
        changed
    }

    /// Tab-separated text of the selected rows, or of the focused row when nothing is selected.
    pub fn selected_text(&self) -> Option<String> {
        let rows: Vec<&Record> = if self.selection.is_empty() {
            self.focused_row().into_iter().collect()
        } else {
            self.rows
                .iter()
                .filter(|r| self.selection.is_selected(&self.row_key(r)))
                .collect()
        };
        if rows.is_empty() {
            return None;
        }
        let visible = self.columns.visible();
        let lines: Vec<String> = rows
            .iter()
            .map(|r| {
                visible
                    .iter()
                    .map(|c| display_value(field(r, &c.field)))
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .collect();
        Some(lines.join("\n"))
    }

    pub fn begin_add(&mut self) -> Result<(), EditError> {
        self.edit.begin_add(&self.columns)
    }

    pub fn begin_edit(&mut self, key: &RowKey) -> Result<(), EditError> {
        let idx = self
            .position_of(key)
            .ok_or_else(|| EditError::RowNotFound { key: key.clone() })?;
        self.edit.begin_edit(&self.columns, &self.rows[idx])
    }

    pub fn begin_delete(&mut self, key: &RowKey) -> Result<(), EditError> {
        let idx = self
            .position_of(key)
            .ok_or_else(|| EditError::RowNotFound { key: key.clone() })?;
        self.edit.begin_delete(&self.columns, &self.rows[idx])
    }

    pub fn set_edit_value(&mut self, field: &str, value: Value) -> Result<(), EditError> {
        self.edit.set_value(field, value)
    }

    pub fn cancel_edit(&mut self) -> Result<(), EditError> {
        self.edit.cancel()
    }

    /// Drops the session whatever its state, e.g. to escape a stalled save.
    pub fn force_reset_edit(&mut self) {
        self.edit.force_reset();
    }

    /// Validates the session and either stages it (batch mode) or starts persisting it.
    pub fn save_edit(&mut self) -> Result<EditStep, EditError> {
        match self.edit.validate(&self.columns, self.validator.as_ref()) {
            Ok(()) => {}
            Err(EditError::Invalid { count }) => return Ok(EditStep::Invalid { count }),
            Err(err) => return Err(err),
        }
        if self.edit.settings().mode == EditMode::Batch {
            let preview = self.edit.session().preview();
            self.edit.stage(&self.columns)?;
            self.apply_saved(preview);
            return Ok(EditStep::Staged);
        }
        let request = self.edit.begin_save(&self.columns)?;
        Ok(EditStep::Save(self.persist(SaveKind::Session, request)))
    }

    /// Starts persisting the staged batch. `None` when nothing is staged.
    pub fn save_batch(&mut self) -> Result<Option<SaveTask>, EditError> {
        let Some(request) = self.edit.begin_batch_save(&self.columns)? else {
            return Ok(None);
        };
        Ok(Some(self.persist(SaveKind::Batch, request)))
    }

    fn persist(&mut self, kind: SaveKind, request: MutationRequest) -> SaveTask {
        self.emit(GridEvent::DataChangeRequest {
            request: request.clone(),
        });
        let future = self.data.persist(request.clone());
        SaveTask {
            kind,
            request,
            future,
        }
    }

    /// Applies a settled persistence call. A successful batch save refreshes the view, so a
    /// fetch may be returned.
    pub fn settle_save(&mut self, outcome: SaveOutcome) -> Option<FetchTask> {
        match outcome.kind {
            SaveKind::Session => match self.edit.complete_save(outcome.result) {
                Ok(saved) => self.apply_saved(saved),
                Err(err) => self.emit_error(err),
            },
            SaveKind::Batch => match self.edit.complete_batch_save(outcome.result.map(|_| ())) {
                Ok(_) => return self.request_fetch(),
                Err(err) => self.emit_error(err),
            },
            SaveKind::Patch { key, mut patch } => match outcome.result {
                Ok(stored) => {
                    patch.extend(stored.unwrap_or_default());
                    self.patch_row(&key, patch);
                }
                Err(err) => {
                    tracing::warn!(%err, %key, "row update failed");
                    self.emit_error(err);
                }
            },
        }
        None
    }

    /// Patches the view in place after a save, without querying again.
    fn apply_saved(&mut self, saved: SavedRow) {
        match (saved.request_type, saved.key, saved.record) {
            (RequestType::Insert, _, Some(record)) => {
                self.rows.push(record);
                self.settings.page.total_records_count += 1;
            }
            (RequestType::Update, Some(key), Some(record)) => {
                if let Some(idx) = self.position_of(&key) {
                    self.rows[idx] = record;
                }
            }
            (RequestType::Remove, Some(key), _) => {
                if let Some(idx) = self.position_of(&key) {
                    self.rows.remove(idx);
                    let page = &mut self.settings.page;
                    page.total_records_count = page.total_records_count.saturating_sub(1);
                }
            }
            _ => return,
        }
        self.rows_changed();
    }

    fn patch_row(&mut self, key: &RowKey, patch: Record) {
        let Some(idx) = self.position_of(key) else {
            return;
        };
        self.rows[idx].extend(patch);
        self.rows_changed();
    }

    /// Runs a fetch and any follow-ups to completion.
    pub async fn refresh(&mut self) {
        let task = self.request_fetch();
        self.drive(task).await;
    }

    async fn drive(&mut self, mut next: Option<FetchTask>) {
        while let Some(task) = next {
            let outcome = task.await;
            next = self.settle_fetch(outcome);
        }
    }

    /// Validates and saves the session, waiting for the data source.
    pub async fn end_edit(&mut self) -> Result<(), EditError> {
        match self.save_edit()? {
            EditStep::Invalid { count } => Err(EditError::Invalid { count }),
            EditStep::Staged => Ok(()),
            EditStep::Save(task) => {
                let outcome = task.await;
                let failure = outcome.result.clone().err();
                let next = self.settle_save(outcome);
                self.drive(next).await;
                match failure {
                    Some(err) => Err(EditError::Data(err)),
                    None => Ok(()),
                }
            }
        }
    }

    /// Persists the staged batch and refreshes the view.
    pub async fn commit_batch(&mut self) -> Result<(), EditError> {
        let Some(task) = self.save_batch()? else {
            return Ok(());
        };
        let outcome = task.await;
        let failure = outcome.result.clone().err();
        let next = self.settle_save(outcome);
        self.drive(next).await;
        match failure {
            Some(err) => Err(EditError::Data(err)),
            None => Ok(()),
        }
    }

    /// Routes input through the sort, filter, edit and navigation handlers in that order.
    pub fn handle_event(&mut self, event: InputEvent) -> GridAction {
        match event {
            InputEvent::Key(key) => self.handle_key(&key),
            InputEvent::Paste(text) => self.handle_paste(text),
            InputEvent::Mouse(_) => GridAction::None,
        }
    }

    fn handle_key(&mut self, key: &KeyEvent) -> GridAction {
        if let Some(action) = self.sort_handler(key) {
            return action;
        }
        if let Some(action) = self.filter_handler(key) {
            return action;
        }
        if let Some(action) = self.edit_handler(key) {
            return action;
        }
        self.navigation_handler(key)
    }

    fn sort_handler(&mut self, key: &KeyEvent) -> Option<GridAction> {
        let multi = if self.bindings.sort.matches(key) {
            false
        } else if self.bindings.multi_sort.matches(key) {
            true
        } else {
            return None;
        };
        let field = self.header_field()?;
        Some(self.command_action(SettingsCommand::Sort {
            field,
            direction: None,
            multi,
        }))
    }

    fn filter_handler(&mut self, key: &KeyEvent) -> Option<GridAction> {
        if self.bindings.clear_filter.matches(key) {
            return Some(self.command_action(SettingsCommand::ClearFilter));
        }
        if !self.bindings.filter_menu.matches(key) {
            return None;
        }
        let field = self.header_field()?;
        if !self.policy.allow_filtering || !self.columns.can_filter(&field) {
            return Some(GridAction::None);
        }
        Some(GridAction::FilterMenu { field })
    }

    fn edit_handler(&mut self, key: &KeyEvent) -> Option<GridAction> {
        if self.edit.session().is_active() {
            if self.bindings.save.matches(key) {
                return Some(match self.save_edit() {
                    Ok(EditStep::Save(task)) => self.submit_save(task),
                    Ok(_) => GridAction::Redraw,
                    Err(err) => {
                        self.emit_error(err);
                        GridAction::Redraw
                    }
                });
            }
            if self.bindings.cancel.matches(key) {
                return Some(match self.cancel_edit() {
                    Ok(()) => GridAction::Redraw,
                    Err(_) => GridAction::None,
                });
            }
            return self.type_into_cell(key);
        }

        let result = if self.bindings.begin_edit.matches(key) {
            match self.focused_row().map(|r| self.row_key(r)) {
                Some(k) => self.begin_edit(&k),
                None => return None,
            }
        } else if self.bindings.begin_add.matches(key) {
            self.begin_add()
        } else if self.bindings.begin_delete.matches(key) {
            match self.focused_row().map(|r| self.row_key(r)) {
                Some(k) => self.begin_delete(&k),
                None => return None,
            }
        } else {
            return None;
        };
        Some(match result {
            Ok(()) => GridAction::Redraw,
            Err(err) => {
                tracing::debug!(%err, "edit shortcut refused");
                GridAction::None
            }
        })
    }

    /// In-memory saves settle right away; remote ones go to the host.
    fn submit_save(&mut self, task: SaveTask) -> GridAction {
        if self.data.is_remote() {
            return GridAction::Save(task);
        }
        let kind = task.kind.clone();
        match task.future.now_or_never() {
            Some(result) => match self.settle_save(SaveOutcome { kind, result }) {
                Some(fetch) => GridAction::Fetch(fetch),
                None => GridAction::Redraw,
            },
            None => GridAction::Redraw,
        }
    }

    fn navigation_handler(&mut self, key: &KeyEvent) -> GridAction {
        if self.bindings.select.matches(key) {
            let Some(k) = self.focused_row().map(|r| self.row_key(r)) else {
                return GridAction::None;
            };
            return redraw_if(self.select_row(&k));
        }
        if self.bindings.select_all.matches(key) {
            return redraw_if(self.select_all());
        }
        if self.bindings.copy.matches(key) {
            return match self.selected_text() {
                Some(text) => GridAction::CopyRequested(text),
                None => GridAction::None,
            };
        }
        if self.bindings.next_page.matches(key) {
            let page = self.settings.page.current_page + 1;
            return self.command_action(SettingsCommand::GoToPage(page));
        }
        if self.bindings.prev_page.matches(key) {
            let page = self.settings.page.current_page.saturating_sub(1).max(1);
            return self.command_action(SettingsCommand::GoToPage(page));
        }

        let Some(nav) = navigation_for(key) else {
            return GridAction::None;
        };
        let change = self.focus.navigate(nav);
        self.focus_changed(change);
        match change {
            FocusChange::Unchanged => GridAction::None,
            FocusChange::LeftGrid { .. } => GridAction::FocusLeft,
            FocusChange::Moved { .. } => GridAction::Redraw,
        }
    }

    /// Field of the focused content column when it accepts edits.
    fn focused_edit_field(&self) -> Option<String> {
        let Some((FocusRegion::Content, cell)) = self.focus.current() else {
            return None;
        };
        let column = self.columns.visible_at(cell.col)?;
        column.allow_editing.then(|| column.field.clone())
    }

    fn handle_paste(&mut self, text: String) -> GridAction {
        let Some(name) = self.focused_edit_field() else {
            return GridAction::None;
        };
        let value = typed_value(&self.type_hint(&name), text);
        match self.edit.set_value(&name, value) {
            Ok(()) => GridAction::Redraw,
            Err(_) => GridAction::None,
        }
    }

    /// The unedited value of `name`, whose type typed text is coerced back to.
    fn type_hint(&self, name: &str) -> Value {
        let session = self.edit.session();
        match session.original() {
            Some(orig) => field(orig, name).clone(),
            None => self
                .columns
                .by_field(name)
                .map(|c| c.default_value.clone())
                .unwrap_or(Value::Null),
        }
    }

    /// Appends a typed character to, or backspaces, the focused cell of the open session.
    fn type_into_cell(&mut self, key: &KeyEvent) -> Option<GridAction> {
        if key.typed_char().is_none() && key.code != KeyCode::Backspace {
            return None;
        }
        let name = self.focused_edit_field()?;
        let mut text = display_value(field(&self.edit.session().merged(), &name));
        match key.typed_char() {
            Some(c) => text.push(c),
            None => {
                text.pop();
            }
        }
        let value = typed_value(&self.type_hint(&name), text);
        Some(match self.edit.set_value(&name, value) {
            Ok(()) => GridAction::Redraw,
            Err(_) => GridAction::None,
        })
    }

    /// Pointer activation of a rendered cell. Header clicks sort (`ctrl` adds to the sort),
    /// content clicks select.
    pub fn click(&mut self, target: CellTarget, modifiers: KeyModifiers) -> GridAction {
        if !self.focus.matrix(target.region).is_occupied(target.cell) {
            return GridAction::None;
        }
        let change = self.focus.click(target.region, target.cell);
        self.focus_changed(change);
        let Some(info) = self.row_info(target) else {
            return GridAction::Redraw;
        };
        self.emit(GridEvent::CellClick { info: info.clone() });
        match target.region {
            FocusRegion::Header => {
                let action = self.command_action(SettingsCommand::Sort {
                    field: info.column.field,
                    direction: None,
                    multi: modifiers.extends(),
                });
                match action {
                    GridAction::None => GridAction::Redraw,
                    other => other,
                }
            }
            FocusRegion::Content => {
                if let Some(key) = info.row_key {
                    self.select_row(&key);
                }
                GridAction::Redraw
            }
            FocusRegion::Aggregate => GridAction::Redraw,
        }
    }

    /// Double-click on a content row. Opens an edit session when editing is allowed.
    pub fn double_click(&mut self, target: CellTarget) -> GridAction {
        if target.region != FocusRegion::Content {
            return self.click(target, KeyModifiers::none());
        }
        let change = self.focus.click(target.region, target.cell);
        self.focus_changed(change);
        let Some(info) = self.row_info(target) else {
            return GridAction::None;
        };
        let key = info.row_key.clone();
        self.emit(GridEvent::RowDoubleClick { info });
        if let Some(key) = key
            && self.edit.settings().allow_editing
            && !self.edit.session().is_active()
            && let Err(err) = self.begin_edit(&key)
        {
            tracing::debug!(%err, "double-click edit refused");
        }
        GridAction::Redraw
    }
}

/// Coerces typed text to the type of `hint` where the text allows it: numbers stay numbers and
/// booleans stay booleans. Anything else, and text that does not parse, becomes a string.
fn typed_value(hint: &Value, text: String) -> Value {
    if text.is_empty() && !hint.is_string() {
        return Value::Null;
    }
    match hint {
        Value::Number(_) | Value::Null => {
            if let Ok(n) = text.parse::<i64>() {
                return Value::from(n);
            }
            if let Some(n) = text.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                return Value::Number(n);
            }
        }
        Value::Bool(_) => match text.as_str() {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        },
        _ => {}
    }
    Value::String(text)
}

fn redraw_if(changed: bool) -> GridAction {
    if changed {
        GridAction::Redraw
    } else {
        GridAction::None
    }
}

fn navigation_for(key: &KeyEvent) -> Option<Navigation> {
    let m = key.modifiers;
    if m.alt {
        return None;
    }
    Some(match key.code {
        KeyCode::Up if !m.ctrl => Navigation::Move(Direction::Up),
        KeyCode::Down if !m.ctrl => Navigation::Move(Direction::Down),
        KeyCode::Left if !m.ctrl => Navigation::Move(Direction::Left),
        KeyCode::Right if !m.ctrl => Navigation::Move(Direction::Right),
        KeyCode::Tab if !m.ctrl && m.shift => Navigation::Prev,
        KeyCode::Tab if !m.ctrl => Navigation::Next,
        KeyCode::Home if m.ctrl => Navigation::First,
        KeyCode::Home => Navigation::RowStart,
        KeyCode::End if m.ctrl => Navigation::Last,
        KeyCode::End => Navigation::RowEnd,
        _ => return None,
    })
}

/// Tooltip text for a content cell whose value does not fit its column.
fn clipped_text(info: &RowInfo) -> Option<String> {
    if info.target.region != FocusRegion::Content
        || info.column.clip_mode != ClipMode::EllipsisWithTooltip
    {
        return None;
    }
    let text = display_value(info.cell_value.as_ref()?);
    let width = UnicodeWidthStr::width(text.replace(['\n', '\t'], " ").as_str());
    (width > usize::from(info.column.width)).then_some(text)
}

impl GridApi for Grid {
    fn get_data(&self, skip_page: bool, requires_count: bool) -> DataFuture {
        self.data.execute(self.query(skip_page, requires_count))
    }

    fn visible_columns(&self) -> Vec<&Column> {
        self.columns.visible()
    }

    fn hidden_columns(&self) -> Vec<&Column> {
        self.columns.hidden()
    }

    fn column_by_field(&self, field: &str) -> Option<&Column> {
        self.columns.by_field(field)
    }

    fn column_by_uid(&self, uid: &str) -> Option<&Column> {
        self.columns.by_uid(uid)
    }

    fn set_row_data(
        &mut self,
        key: &RowKey,
        partial: Record,
        persist: bool,
    ) -> Result<Option<SaveTask>, EditError> {
        let key_field = self
            .columns
            .primary_key()
            .map(|c| c.field.clone())
            .ok_or(EditError::MissingPrimaryKey)?;
        if self.position_of(key).is_none() {
            return Err(EditError::RowNotFound { key: key.clone() });
        }
        if !persist {
            self.patch_row(key, partial);
            return Ok(None);
        }
        let request = MutationRequest {
            key_field,
            mutation: Mutation::Update {
                key: key.clone(),
                record: partial.clone(),
            },
        };
        let kind = SaveKind::Patch {
            key: key.clone(),
            patch: partial,
        };
        Ok(Some(self.persist(kind, request)))
    }

    fn set_cell_value(
        &mut self,
        key: &RowKey,
        field: &str,
        value: Value,
        persist: bool,
    ) -> Result<Option<SaveTask>, EditError> {
        let mut partial = Record::new();
        partial.insert(field.to_string(), value);
        self.set_row_data(key, partial, persist)
    }

    fn row_info(&self, target: CellTarget) -> Option<RowInfo> {
        let column = self.columns.visible_at(target.cell.col)?.clone();
        let (row_index, row_key, row_data, cell_value) = match target.region {
            FocusRegion::Content => {
                let row = self.rows.get(target.cell.row)?;
                (
                    Some(target.cell.row),
                    Some(self.row_key(row)),
                    Some(row.clone()),
                    Some(field(row, &column.field).clone()),
                )
            }
            FocusRegion::Header => (
                None,
                None,
                None,
                Some(Value::String(column.header_text.clone())),
            ),
            FocusRegion::Aggregate => (
                None,
                None,
                None,
                self.aggregates
                    .get(target.cell.row, target.cell.col)
                    .map(|(_, v)| v.clone()),
            ),
        };
        Some(RowInfo {
            target,
            row_index,
            row_key,
            row_data,
            column_index: target.cell.col,
            column,
            cell_value,
        })
    }
}

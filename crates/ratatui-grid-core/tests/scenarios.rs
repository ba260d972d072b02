mod common;

use common::MockProvider;
use common::records;
use futures::future::join_all;
use ratatui_grid_core::column::ColumnDef;
use ratatui_grid_core::data::DataOrchestrator;
use ratatui_grid_core::edit::EditMode;
use ratatui_grid_core::edit::EditSettings;
use ratatui_grid_core::edit::EditState;
use ratatui_grid_core::error::DataError;
use ratatui_grid_core::error::GridError;
use ratatui_grid_core::events::GridEvent;
use ratatui_grid_core::grid::EditStep;
use ratatui_grid_core::grid::Grid;
use ratatui_grid_core::grid::GridApi;
use ratatui_grid_core::grid::GridOptions;
use ratatui_grid_core::query::Query;
use ratatui_grid_core::query::QueryStep;
use ratatui_grid_core::settings::FilterOperator;
use ratatui_grid_core::settings::FilterPredicate;
use ratatui_grid_core::settings::FilterSettings;
use ratatui_grid_core::settings::SortDirection;
use ratatui_grid_core::value::Record;
use ratatui_grid_core::value::RowKey;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn people() -> Vec<Record> {
    records([
        json!({"id": 1, "name": "B", "age": 30}),
        json!({"id": 2, "name": "A", "age": 30}),
        json!({"id": 3, "name": "C", "age": 40}),
    ])
}

fn people_options() -> GridOptions {
    GridOptions::new(vec![
        ColumnDef::new("id").primary_key(),
        ColumnDef::new("name"),
        ColumnDef::new("age"),
    ])
}

fn names(grid: &Grid) -> Vec<&str> {
    grid.rows()
        .iter()
        .filter_map(|r| r.get("name").and_then(|v| v.as_str()))
        .collect()
}

fn ids(grid: &Grid) -> Vec<i64> {
    grid.rows()
        .iter()
        .filter_map(|r| r.get("id").and_then(|v| v.as_i64()))
        .collect()
}

#[test]
fn second_page_of_three_holds_indices_three_to_five() {
    let data = records((0..10).map(|i| json!({"id": i})));
    let mut options = GridOptions::new(vec![ColumnDef::new("id").primary_key()]);
    options.allow_paging = true;
    options.page_settings.page_size = 3;
    let mut grid = Grid::local(options, data);
    assert!(grid.init().is_none());

    assert!(grid.go_to_page(2).is_none());
    assert_eq!(ids(&grid), vec![3, 4, 5]);
    assert_eq!(grid.settings().page.total_records_count, 10);
    assert_eq!(grid.settings().page.page_count(), 4);

    let result = grid.get_data_local(false, false).unwrap();
    assert_eq!(result.records, grid.rows());
    assert_eq!(result.count, None);
}

#[test]
fn multi_column_sort_breaks_ties_by_priority() {
    let mut grid = Grid::local(people_options(), people());
    grid.init();
    grid.sort_column("age", Some(SortDirection::Descending), false);
    grid.sort_column("name", Some(SortDirection::Ascending), true);
    assert_eq!(names(&grid), vec!["C", "A", "B"]);
}

#[test]
fn out_of_range_page_is_clamped_once_the_count_arrives() {
    let data = records((0..5).map(|i| json!({"id": i})));
    let mut options = GridOptions::new(vec![ColumnDef::new("id").primary_key()]);
    options.allow_paging = true;
    options.page_settings.page_size = 2;
    options.page_settings.current_page = 9;
    let mut grid = Grid::local(options, data);
    grid.init();
    assert_eq!(grid.settings().page.current_page, 3);
    assert_eq!(ids(&grid), vec![4]);
}

#[tokio::test]
async fn failed_save_keeps_dirty_values_and_reports_the_field() {
    let provider = Arc::new(
        MockProvider::new(records([
            json!({"id": 6, "price": 10}),
            json!({"id": 7, "price": 20}),
        ]))
        .rejecting(RowKey::Int(7)),
    );
    let mut options = GridOptions::new(vec![
        ColumnDef::new("id").primary_key(),
        ColumnDef::new("price"),
    ]);
    options.edit_settings = EditSettings::all();
    let mut grid = Grid::remote(options, provider.clone());
    grid.refresh().await;

    grid.begin_edit(&RowKey::Int(7)).unwrap();
    grid.set_edit_value("price", json!(50)).unwrap();
    let err = grid.end_edit().await.unwrap_err();
    assert_eq!(err.to_string(), "data provider failed: write rejected");

    let session = grid.edit_session();
    assert_eq!(session.state(), EditState::Editing);
    assert_eq!(session.dirty().get("price"), Some(&json!(50)));
    assert!(session.errors().contains_key("price"));
    assert_eq!(grid.rows()[1]["price"], json!(20));
    assert!(
        grid.drain_events()
            .iter()
            .any(|e| matches!(e, GridEvent::Error { .. }))
    );
}

#[tokio::test]
async fn successful_remote_save_patches_the_view() {
    let provider = Arc::new(MockProvider::new(people()));
    let mut options = people_options();
    options.edit_settings = EditSettings::all();
    let mut grid = Grid::remote(options, provider.clone());
    grid.refresh().await;

    grid.begin_edit(&RowKey::Int(3)).unwrap();
    grid.set_edit_value("age", json!(41)).unwrap();
    grid.end_edit().await.unwrap();

    assert_eq!(grid.edit_session().state(), EditState::Idle);
    assert_eq!(grid.rows()[2]["age"], json!(41));
    assert_eq!(provider.snapshot()[2]["age"], json!(41));
    assert_eq!(provider.executes(), 1);
}

#[tokio::test]
async fn settings_changes_while_pending_collapse_into_one_follow_up() {
    let provider = Arc::new(MockProvider::new(people()).delayed(Duration::from_millis(5)));
    let mut grid = Grid::remote(people_options(), provider.clone());

    let first = grid.init().unwrap();
    let min_age = |age: i64| FilterSettings {
        columns: vec![FilterPredicate::new(
            "age",
            FilterOperator::GreaterThanOrEqual,
            json!(age),
        )],
    };
    assert!(grid.set_filter_settings(min_age(35)).is_none());
    assert!(grid.set_filter_settings(min_age(30)).is_none());

    let follow_up = grid.settle_fetch(first.await).unwrap();
    let filtered = follow_up.query().steps().iter().any(|s| match s {
        QueryStep::Where { groups } => groups[0].0[0].value == json!(30),
        _ => false,
    });
    assert!(filtered);
    assert!(grid.settle_fetch(follow_up.await).is_none());

    assert_eq!(provider.executes(), 2);
    assert_eq!(names(&grid), vec!["B", "A", "C"]);
    assert!(!grid.is_fetching());
}

#[tokio::test]
async fn concurrent_executes_share_one_provider_call() {
    let provider = Arc::new(MockProvider::new(people()).delayed(Duration::from_millis(5)));
    let orchestrator = DataOrchestrator::remote(provider.clone());

    let calls: Vec<_> = (0..5)
        .map(|i| orchestrator.execute(Query::new().with_count(i == 0)))
        .collect();
    assert!(orchestrator.is_pending());
    let results = join_all(calls).await;

    assert_eq!(provider.executes(), 1);
    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(results[0].as_ref().map(|r| r.count), Ok(Some(3)));
    assert!(!orchestrator.is_pending());

    orchestrator.execute(Query::new()).await.unwrap();
    assert_eq!(provider.executes(), 2);
}

#[tokio::test]
async fn failed_fetch_keeps_the_last_rows() {
    let provider = Arc::new(MockProvider::new(people()));
    let mut options = people_options();
    options.allow_paging = true;
    options.page_settings.page_size = 2;
    let mut grid = Grid::remote(options, provider);
    grid.refresh().await;
    assert_eq!(ids(&grid), vec![1, 2]);
    grid.drain_events();

    let task = grid.go_to_page(2).unwrap();
    grid.drain_events();
    let mut outcome = task.await;
    outcome.result = Err(DataError::provider("connection reset"));
    assert!(grid.settle_fetch(outcome).is_none());
    assert_eq!(ids(&grid), vec![1, 2]);
    assert_eq!(
        grid.drain_events(),
        vec![GridEvent::Error {
            error: GridError::Data(DataError::provider("connection reset")),
        }]
    );
    assert_eq!(grid.visible_columns().len(), 3);
}

#[tokio::test]
async fn batch_edits_persist_together_and_refresh() {
    let provider = Arc::new(MockProvider::new(people()));
    let mut options = people_options();
    options.edit_settings = EditSettings {
        mode: EditMode::Batch,
        ..EditSettings::all()
    };
    let mut grid = Grid::remote(options, provider.clone());
    grid.refresh().await;

    grid.begin_edit(&RowKey::Int(1)).unwrap();
    grid.set_edit_value("name", json!("Bee")).unwrap();
    assert!(matches!(grid.save_edit(), Ok(EditStep::Staged)));
    grid.begin_delete(&RowKey::Int(2)).unwrap();
    assert!(matches!(grid.save_edit(), Ok(EditStep::Staged)));
    assert_eq!(grid.batch().len(), 2);
    assert_eq!(names(&grid), vec!["Bee", "C"]);

    grid.commit_batch().await.unwrap();
    assert!(grid.batch().is_empty());
    assert_eq!(names(&grid), vec!["Bee", "C"]);
    assert_eq!(provider.snapshot().len(), 2);
    assert_eq!(provider.executes(), 2);
}

fn five_ids() -> Vec<Record> {
    records((0..5).map(|i| json!({"id": i})))
}

#[tokio::test]
async fn host_query_in_flight_does_not_stand_in_for_the_grid_page() {
    let provider = Arc::new(MockProvider::new(five_ids()));
    let mut options = GridOptions::new(vec![ColumnDef::new("id").primary_key()]);
    options.allow_paging = true;
    options.page_settings.page_size = 2;
    let mut grid = Grid::remote(options, provider.clone());
    grid.refresh().await;
    assert_eq!(ids(&grid), vec![0, 1]);

    let host = grid.get_data(true, false);
    let task = grid.go_to_page(2).expect("page change fetches");
    let follow_up = grid.settle_fetch(task.await);
    assert_eq!(host.await.unwrap().records.len(), 5);

    let task = follow_up.expect("grid refetches with its own query");
    assert!(grid.settle_fetch(task.await).is_none());
    assert_eq!(ids(&grid), vec![2, 3]);
    assert_eq!(grid.settings().page.current_page, 2);
    assert_eq!(provider.executes(), 3);
}

#[tokio::test]
async fn recount_updates_the_total_without_paging() {
    let provider = Arc::new(MockProvider::new(five_ids()));
    let options = GridOptions::new(vec![ColumnDef::new("id").primary_key()]);
    let mut grid = Grid::remote(options, provider.clone());
    grid.refresh().await;
    assert_eq!(grid.settings().page.total_records_count, 0);

    let result = grid.get_data(false, true).await.unwrap();
    assert_eq!(result.count, Some(5));
    assert_eq!(grid.settings().page.total_records_count, 0);

    let task = grid.recount().expect("remote recount is a task");
    assert!(task.query().requires_count());
    assert!(grid.settle_fetch(task.await).is_none());
    assert_eq!(grid.settings().page.total_records_count, 5);
    assert_eq!(ids(&grid), vec![0, 1, 2, 3, 4]);

    grid.refresh().await;
    let last = provider.queries().pop().expect("a query was sent");
    assert!(!last.requires_count());
}

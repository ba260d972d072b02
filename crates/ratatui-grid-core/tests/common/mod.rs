#![allow(dead_code)]

use async_trait::async_trait;
use ratatui_grid_core::data::DataProvider;
use ratatui_grid_core::data::LocalData;
use ratatui_grid_core::data::Mutation;
use ratatui_grid_core::data::MutationRequest;
use ratatui_grid_core::error::DataError;
use ratatui_grid_core::query::Query;
use ratatui_grid_core::query::QueryResult;
use ratatui_grid_core::value::Record;
use ratatui_grid_core::value::RowKey;
use serde_json::Value;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// A remote provider backed by an in-memory collection.
pub struct MockProvider {
    data: LocalData,
    delay: Duration,
    reject_key: Option<RowKey>,
    executes: AtomicUsize,
    queries: Mutex<Vec<Query>>,
}

impl MockProvider {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            data: LocalData::new(records),
            delay: Duration::ZERO,
            reject_key: None,
            executes: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fails every mutation addressed at `key`.
    pub fn rejecting(mut self, key: RowKey) -> Self {
        self.reject_key = Some(key);
        self
    }

    pub fn executes(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<Query> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    pub fn snapshot(&self) -> Vec<Record> {
        self.data.snapshot()
    }
}

#[async_trait]
impl DataProvider for MockProvider {
    async fn execute(&self, query: &Query) -> Result<QueryResult, DataError> {
        self.executes.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut q) = self.queries.lock() {
            q.push(query.clone());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.data.execute(query))
    }

    async fn persist(&self, request: &MutationRequest) -> Result<Option<Record>, DataError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let target = match &request.mutation {
            Mutation::Update { key, .. } | Mutation::Remove { key } => Some(key),
            _ => None,
        };
        if target.is_some() && target == self.reject_key.as_ref() {
            return Err(DataError::provider("write rejected"));
        }
        self.data.apply(request)
    }
}

pub fn record(v: Value) -> Record {
    match v {
        Value::Object(m) => m,
        other => panic!("not an object: {other}"),
    }
}

pub fn records(values: impl IntoIterator<Item = Value>) -> Vec<Record> {
    values.into_iter().map(record).collect()
}

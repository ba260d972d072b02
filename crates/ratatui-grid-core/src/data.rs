//! Data sources and the single-flight orchestrator in front of them.

use crate::error::DataError;
use crate::query::Query;
use crate::query::QueryResult;
use crate::query::execute_local;
use crate::value::Record;
use crate::value::RowKey;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::Shared;
use parking_lot::Mutex;
use parking_lot::RwLock;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestType {
    Insert,
    Update,
    Remove,
    Batch,
}

/// Row changes staged by batch editing and persisted together.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BatchChanges {
    pub added: Vec<Record>,
    pub changed: Vec<Record>,
    pub deleted: Vec<RowKey>,
}

impl BatchChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.changed.len() + self.deleted.len()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "requestType", rename_all = "camelCase")]
pub enum Mutation {
    Insert { record: Record },
    Update { key: RowKey, record: Record },
    Remove { key: RowKey },
    Batch { changes: BatchChanges },
}

/// A mutation-shaped request sent to the data source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRequest {
    /// Field holding the primary key.
    pub key_field: String,
    #[serde(flatten)]
    pub mutation: Mutation,
}

impl MutationRequest {
    pub fn request_type(&self) -> RequestType {
        match self.mutation {
            Mutation::Insert { .. } => RequestType::Insert,
            Mutation::Update { .. } => RequestType::Update,
            Mutation::Remove { .. } => RequestType::Remove,
            Mutation::Batch { .. } => RequestType::Batch,
        }
    }
}

/// A remote data source.
///
/// Implementations must apply [`Query`] steps in order so results match local execution.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn execute(&self, query: &Query) -> Result<QueryResult, DataError>;

    /// Persists a mutation. May return the stored row (for example with server-assigned
    /// fields) which is then merged into the view.
    async fn persist(&self, request: &MutationRequest) -> Result<Option<Record>, DataError>;
}

/// An in-memory record collection.
#[derive(Clone, Debug, Default)]
pub struct LocalData {
    records: Arc<RwLock<Vec<Record>>>,
}

impl LocalData {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<Record> {
        self.records.read().clone()
    }

    pub fn execute(&self, query: &Query) -> QueryResult {
        execute_local(query, &self.records.read())
    }

    pub fn apply(&self, request: &MutationRequest) -> Result<Option<Record>, DataError> {
        let mut records = self.records.write();
        apply_mutation(&mut records, &request.key_field, &request.mutation)
    }
}

fn position(records: &[Record], key_field: &str, key: &RowKey) -> Option<usize> {
    records
        .iter()
        .position(|r| RowKey::of(r, key_field).as_ref() == Some(key))
}

fn apply_mutation(
    records: &mut Vec<Record>,
    key_field: &str,
    mutation: &Mutation,
) -> Result<Option<Record>, DataError> {
    match mutation {
        Mutation::Insert { record } => {
            records.push(record.clone());
            Ok(Some(record.clone()))
        }
        Mutation::Update { key, record } => {
            let idx = position(records, key_field, key)
                .ok_or_else(|| DataError::RowNotFound { key: key.clone() })?;
            let row = &mut records[idx];
            for (k, v) in record {
                row.insert(k.clone(), v.clone());
            }
            Ok(Some(row.clone()))
        }
        Mutation::Remove { key } => {
            let idx = position(records, key_field, key)
                .ok_or_else(|| DataError::RowNotFound { key: key.clone() })?;
            records.remove(idx);
            Ok(None)
        }
        Mutation::Batch { changes } => {
            let mut next = records.clone();
            for key in &changes.deleted {
                apply_mutation(&mut next, key_field, &Mutation::Remove { key: key.clone() })?;
            }
            for record in &changes.changed {
                let key = RowKey::of(record, key_field)
                    .ok_or_else(|| DataError::malformed("changed row has no primary key"))?;
                apply_mutation(
                    &mut next,
                    key_field,
                    &Mutation::Update {
                        key,
                        record: record.clone(),
                    },
                )?;
            }
            next.extend(changes.added.iter().cloned());
            *records = next;
            Ok(None)
        }
    }
}

pub enum DataSource {
    Local(LocalData),
    Remote(Arc<dyn DataProvider>),
}

pub type DataFuture = Shared<BoxFuture<'static, Result<QueryResult, DataError>>>;
pub type PersistFuture = BoxFuture<'static, Result<Option<Record>, DataError>>;

#[derive(Default)]
struct PendingState {
    in_flight: Option<(u64, DataFuture)>,
    next_id: u64,
    is_edit: bool,
}

/// Read-only view of the orchestrator's pending state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingSnapshot {
    pub is_pending: bool,
    pub is_edit: bool,
}

/// Executes queries against the grid's data source.
///
/// Remote reads are single-flight: while one provider call is outstanding, further calls
/// return a handle to that same call instead of issuing another one. The pending record is
/// cleared when the call settles, whichever caller drives it.
pub struct DataOrchestrator {
    source: DataSource,
    pending: Arc<Mutex<PendingState>>,
}

impl DataOrchestrator {
    pub fn new(source: DataSource) -> Self {
        Self {
            source,
            pending: Arc::new(Mutex::new(PendingState::default())),
        }
    }

    pub fn local(records: Vec<Record>) -> Self {
        Self::new(DataSource::Local(LocalData::new(records)))
    }

    pub fn remote(provider: Arc<dyn DataProvider>) -> Self {
        Self::new(DataSource::Remote(provider))
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.source, DataSource::Remote(_))
    }

    pub fn pending(&self) -> PendingSnapshot {
        let p = self.pending.lock();
        PendingSnapshot {
            is_pending: p.in_flight.is_some(),
            is_edit: p.is_edit,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.lock().in_flight.is_some()
    }

    /// Synchronous execution for in-memory sources.
    pub fn execute_sync(&self, query: &Query) -> Result<QueryResult, DataError> {
        match &self.source {
            DataSource::Local(data) => Ok(data.execute(query)),
            DataSource::Remote(_) => Err(DataError::RemoteSource),
        }
    }

    /// Executes `query`. Local sources resolve immediately.
    ///
    /// For remote sources, a call made while another is pending shares that call's result,
    /// even when `query` differs from the in-flight one.
    pub fn execute(&self, query: Query) -> DataFuture {
        let provider = match &self.source {
            DataSource::Local(data) => {
                let result = Ok(data.execute(&query));
                return futures::future::ready(result).boxed().shared();
            }
            DataSource::Remote(provider) => Arc::clone(provider),
        };

        let mut pending = self.pending.lock();
        if let Some((id, in_flight)) = &pending.in_flight {
            tracing::debug!(request = *id, "coalescing onto in-flight data request");
            return in_flight.clone();
        }

        let id = pending.next_id;
        pending.next_id += 1;
        let state = Arc::clone(&self.pending);
        tracing::debug!(
            request = id,
            requires_count = query.requires_count(),
            "issuing data request"
        );

        let call = async move {
            let result = provider
                .execute(&query)
                .await
                .and_then(|r| check_result(&query, r));
            if let Err(err) = &result {
                tracing::warn!(request = id, %err, "data request failed");
            }
            let mut p = state.lock();
            if p.in_flight.as_ref().is_some_and(|(cur, _)| *cur == id) {
                p.in_flight = None;
            }
            result
        }
        .boxed()
        .shared();

        pending.in_flight = Some((id, call.clone()));
        call
    }

    /// Persists a mutation through the source.
    pub fn persist(&self, request: MutationRequest) -> PersistFuture {
        let provider = match &self.source {
            DataSource::Local(data) => {
                return futures::future::ready(data.apply(&request)).boxed();
            }
            DataSource::Remote(provider) => Arc::clone(provider),
        };
        let state = Arc::clone(&self.pending);
        state.lock().is_edit = true;
        tracing::debug!(request_type = ?request.request_type(), "persisting mutation");
        async move {
            let result = provider.persist(&request).await;
            state.lock().is_edit = false;
            result
        }
        .boxed()
    }
}

fn check_result(query: &Query, result: QueryResult) -> Result<QueryResult, DataError> {
    if query.requires_count() && result.count.is_none() {
        return Err(DataError::malformed("count was requested but not returned"));
    }
    if let Some((_, take)) = query.page()
        && result.records.len() > take
    {
        return Err(DataError::malformed(format!(
            "{} rows returned for a page of {take}",
            result.records.len()
        )));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use serde_json::json;

    fn rec(v: Value) -> Record {
        match v {
            Value::Object(m) => m,
            _ => Record::new(),
        }
    }

    #[test]
    fn local_update_merges_fields() {
        let data = LocalData::new(vec![rec(json!({"id": 1, "name": "a", "n": 1}))]);
        let stored = data
            .apply(&MutationRequest {
                key_field: "id".into(),
                mutation: Mutation::Update {
                    key: RowKey::Int(1),
                    record: rec(json!({"n": 5})),
                },
            })
            .unwrap();
        assert_eq!(stored, Some(rec(json!({"id": 1, "name": "a", "n": 5}))));
    }

    #[test]
    fn local_remove_of_missing_row_fails_without_changes() {
        let data = LocalData::new(vec![rec(json!({"id": 1}))]);
        let err = data
            .apply(&MutationRequest {
                key_field: "id".into(),
                mutation: Mutation::Batch {
                    changes: BatchChanges {
                        added: vec![rec(json!({"id": 2}))],
                        changed: Vec::new(),
                        deleted: vec![RowKey::Int(9)],
                    },
                },
            })
            .unwrap_err();
        assert_eq!(err, DataError::RowNotFound { key: RowKey::Int(9) });
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn sync_execution_rejects_remote_sources() {
        struct Never;
        #[async_trait]
        impl DataProvider for Never {
            async fn execute(&self, _: &Query) -> Result<QueryResult, DataError> {
                Err(DataError::provider("unreachable"))
            }
            async fn persist(&self, _: &MutationRequest) -> Result<Option<Record>, DataError> {
                Ok(None)
            }
        }
        let o = DataOrchestrator::remote(Arc::new(Never));
        assert_eq!(o.execute_sync(&Query::new()), Err(DataError::RemoteSource));
    }

    #[test]
    fn mutation_request_serializes_request_type() {
        let req = MutationRequest {
            key_field: "id".into(),
            mutation: Mutation::Remove { key: RowKey::Int(3) },
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["requestType"], json!("remove"));
        assert_eq!(v["key"], json!(3));
    }
}

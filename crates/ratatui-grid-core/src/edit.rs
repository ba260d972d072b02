//! The add/edit/delete session state machine.
//!
//! ```text
//! Idle -> Adding | Editing | Deleting -> Validating -> Saving -> Idle
//!                                        Validating -> Idle        (cancel)
//!                                            Saving -> previous    (failure)
//! ```

use crate::column::ColumnModel;
use crate::data::BatchChanges;
use crate::data::Mutation;
use crate::data::MutationRequest;
use crate::data::RequestType;
use crate::error::DataError;
use crate::error::EditError;
use crate::validation::FieldValidator;
use crate::value::Record;
use crate::value::RowKey;
use crate::value::values_equal;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Error-map key for failures that belong to the row rather than one field.
pub const ROW_ERROR_KEY: &str = "$row";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditState {
    #[default]
    Idle,
    Adding,
    Editing,
    Deleting,
    Validating,
    Saving,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditMode {
    #[default]
    Normal,
    /// Validated rows are staged and persisted together by a later batch save.
    Batch,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditSettings {
    pub allow_adding: bool,
    pub allow_editing: bool,
    pub allow_deleting: bool,
    pub mode: EditMode,
}

impl EditSettings {
    pub fn all() -> Self {
        Self {
            allow_adding: true,
            allow_editing: true,
            allow_deleting: true,
            mode: EditMode::Normal,
        }
    }
}

/// The staged mutation of one row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EditSession {
    state: EditState,
    origin: EditState,
    row_key: Option<RowKey>,
    original: Option<Record>,
    dirty: Record,
    errors: IndexMap<String, String>,
}

impl EditSession {
    pub fn state(&self) -> EditState {
        self.state
    }

    /// The non-idle state the session was opened in.
    pub fn origin(&self) -> EditState {
        self.origin
    }

    pub fn row_key(&self) -> Option<&RowKey> {
        self.row_key.as_ref()
    }

    pub fn original(&self) -> Option<&Record> {
        self.original.as_ref()
    }

    pub fn dirty(&self) -> &Record {
        &self.dirty
    }

    pub fn errors(&self) -> &IndexMap<String, String> {
        &self.errors
    }

    pub fn is_active(&self) -> bool {
        self.state != EditState::Idle
    }

    /// Fields whose value differs from the original row. Every dirty field when adding.
    pub fn changed_fields(&self) -> Vec<&str> {
        self.dirty
            .iter()
            .filter(|(k, v)| match &self.original {
                Some(orig) => !orig.get(*k).is_some_and(|o| values_equal(o, v)),
                None => true,
            })
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// What a successful save of this session would change in the view.
    pub fn preview(&self) -> SavedRow {
        let request_type = match self.origin {
            EditState::Adding => RequestType::Insert,
            EditState::Deleting => RequestType::Remove,
            _ => RequestType::Update,
        };
        SavedRow {
            request_type,
            key: self.row_key.clone(),
            record: (self.origin != EditState::Deleting).then(|| self.merged()),
        }
    }

    /// The row as it would look once saved.
    pub fn merged(&self) -> Record {
        let mut out = self.original.clone().unwrap_or_default();
        for (k, v) in &self.dirty {
            out.insert(k.clone(), v.clone());
        }
        out
    }
}

/// Outcome of a successful save.
#[derive(Clone, Debug, PartialEq)]
pub struct SavedRow {
    pub request_type: RequestType,
    pub key: Option<RowKey>,
    /// The stored row for inserts and updates; `None` for removals.
    pub record: Option<Record>,
}

#[derive(Clone, Debug, Default)]
pub struct EditLifecycle {
    settings: EditSettings,
    session: EditSession,
    batch: BatchChanges,
    batch_in_flight: bool,
}

impl EditLifecycle {
    pub fn new(settings: EditSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> EditSettings {
        self.settings
    }

    pub fn set_settings(&mut self, settings: EditSettings) {
        self.settings = settings;
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn state(&self) -> EditState {
        self.session.state
    }

    pub fn batch(&self) -> &BatchChanges {
        &self.batch
    }

    fn ensure_idle(&self) -> Result<(), EditError> {
        if self.session.is_active() {
            tracing::warn!(
                state = ?self.session.state,
                "rejected edit session while another is active"
            );
            return Err(EditError::SessionActive {
                state: self.session.state,
            });
        }
        Ok(())
    }

    fn open(
        &mut self,
        state: EditState,
        row_key: Option<RowKey>,
        original: Option<Record>,
        dirty: Record,
    ) {
        tracing::info!(?state, key = ?row_key, "edit session opened");
        self.session = EditSession {
            state,
            origin: state,
            row_key,
            original,
            dirty,
            errors: IndexMap::new(),
        };
    }

    fn key_of(columns: &ColumnModel, row: &Record) -> Result<RowKey, EditError> {
        let pk = columns.primary_key().ok_or(EditError::MissingPrimaryKey)?;
        RowKey::of(row, &pk.field).ok_or(EditError::MissingPrimaryKey)
    }

    /// Opens an add session seeded with the column defaults.
    pub fn begin_add(&mut self, columns: &ColumnModel) -> Result<(), EditError> {
        if !self.settings.allow_adding {
            return Err(EditError::NotAllowed { op: "adding" });
        }
        self.ensure_idle()?;
        let dirty: Record = columns
            .columns()
            .iter()
            .map(|c| (c.field.clone(), c.default_value.clone()))
            .collect();
        self.open(EditState::Adding, None, None, dirty);
        Ok(())
    }

    pub fn begin_edit(&mut self, columns: &ColumnModel, row: &Record) -> Result<(), EditError> {
        if !self.settings.allow_editing {
            return Err(EditError::NotAllowed { op: "editing" });
        }
        self.ensure_idle()?;
        let key = Self::key_of(columns, row)?;
        self.open(EditState::Editing, Some(key), Some(row.clone()), row.clone());
        Ok(())
    }

    pub fn begin_delete(&mut self, columns: &ColumnModel, row: &Record) -> Result<(), EditError> {
        if !self.settings.allow_deleting {
            return Err(EditError::NotAllowed { op: "deleting" });
        }
        self.ensure_idle()?;
        let key = Self::key_of(columns, row)?;
        self.open(EditState::Deleting, Some(key), Some(row.clone()), Record::new());
        Ok(())
    }

    /// Stages a field value. Clears any error recorded for that field.
    pub fn set_value(&mut self, field: &str, value: Value) -> Result<(), EditError> {
        match self.session.state {
            EditState::Adding | EditState::Editing => {}
            EditState::Idle => return Err(EditError::NoSession),
            state => return Err(EditError::InvalidState { state }),
        }
        self.session.dirty.insert(field.to_string(), value);
        self.session.errors.shift_remove(field);
        self.session.errors.shift_remove(ROW_ERROR_KEY);
        Ok(())
    }

    /// Runs field rules over the staged values.
    ///
    /// On success the session is left in `Validating`. On failure it returns to the state it
    /// was opened in with `errors` populated.
    pub fn validate(
        &mut self,
        columns: &ColumnModel,
        validator: &dyn FieldValidator,
    ) -> Result<(), EditError> {
        let origin = match self.session.state {
            s @ (EditState::Adding | EditState::Editing | EditState::Deleting) => s,
            EditState::Idle => return Err(EditError::NoSession),
            state => return Err(EditError::InvalidState { state }),
        };
        self.session.state = EditState::Validating;
        self.session.errors.clear();

        if origin != EditState::Deleting {
            for column in columns.columns() {
                if column.validation_rules.is_empty() {
                    continue;
                }
                let value = self.session.dirty.get(&column.field).unwrap_or(&Value::Null);
                if let Some(message) =
                    validator.validate_field(&column.field, value, &column.validation_rules)
                {
                    self.session.errors.insert(column.field.clone(), message);
                }
            }
        }

        if self.session.errors.is_empty() {
            return Ok(());
        }
        let count = self.session.errors.len();
        tracing::debug!(count, "validation blocked save");
        self.session.state = origin;
        Err(EditError::Invalid { count })
    }

    fn mutation(&self) -> Result<Mutation, EditError> {
        let key = || {
            self.session
                .row_key
                .clone()
                .ok_or(EditError::MissingPrimaryKey)
        };
        Ok(match self.session.origin {
            EditState::Adding => Mutation::Insert {
                record: self.session.dirty.clone(),
            },
            EditState::Editing => Mutation::Update {
                key: key()?,
                record: self.session.dirty.clone(),
            },
            EditState::Deleting => Mutation::Remove { key: key()? },
            state => return Err(EditError::InvalidState { state }),
        })
    }

    /// Moves a validated session to `Saving` and returns the request to persist.
    pub fn begin_save(&mut self, columns: &ColumnModel) -> Result<MutationRequest, EditError> {
        match self.session.state {
            EditState::Validating => {}
            EditState::Idle => return Err(EditError::NoSession),
            state => return Err(EditError::InvalidState { state }),
        }
        let request = match self.save_request(columns) {
            Ok(request) => request,
            Err(err) => {
                self.session.state = self.session.origin;
                return Err(err);
            }
        };
        self.session.state = EditState::Saving;
        tracing::info!(origin = ?self.session.origin, "saving edit session");
        Ok(request)
    }

    fn save_request(&self, columns: &ColumnModel) -> Result<MutationRequest, EditError> {
        let mutation = self.mutation()?;
        let key_field = match (columns.primary_key(), &mutation) {
            (Some(pk), _) => pk.field.clone(),
            // Inserts are appended, never looked up by key.
            (None, Mutation::Insert { .. }) => String::new(),
            (None, _) => return Err(EditError::MissingPrimaryKey),
        };
        Ok(MutationRequest {
            key_field,
            mutation,
        })
    }

    /// Settles a save started by [`Self::begin_save`].
    ///
    /// Success resets the session. Failure returns it to its prior state, keeps the staged
    /// values and records the reason against the changed fields.
    pub fn complete_save(
        &mut self,
        result: Result<Option<Record>, DataError>,
    ) -> Result<SavedRow, EditError> {
        if self.session.state != EditState::Saving {
            return Err(EditError::InvalidState {
                state: self.session.state,
            });
        }
        let origin = self.session.origin;
        match result {
            Ok(stored) => {
                let mut saved = self.session.preview();
                if let (Some(row), Some(stored)) = (saved.record.as_mut(), stored) {
                    row.extend(stored);
                }
                tracing::info!(
                    request_type = ?saved.request_type,
                    key = ?saved.key,
                    "edit session saved"
                );
                self.session = EditSession::default();
                Ok(saved)
            }
            Err(err) => {
                tracing::warn!(%err, ?origin, "save failed; session kept");
                self.session.state = origin;
                self.record_failure(&err.to_string());
                Err(EditError::Data(err))
            }
        }
    }

    fn record_failure(&mut self, reason: &str) {
        let fields: Vec<String> = self
            .session
            .changed_fields()
            .into_iter()
            .map(str::to_string)
            .collect();
        if fields.is_empty() {
            self.session
                .errors
                .insert(ROW_ERROR_KEY.to_string(), reason.to_string());
        }
        for field in fields {
            self.session.errors.insert(field, reason.to_string());
        }
    }

    /// Discards the session. A save in flight cannot be cancelled; see [`Self::force_reset`].
    pub fn cancel(&mut self) -> Result<(), EditError> {
        match self.session.state {
            EditState::Idle => Err(EditError::NoSession),
            EditState::Saving => Err(EditError::InvalidState {
                state: EditState::Saving,
            }),
            state => {
                tracing::info!(?state, "edit session cancelled");
                self.session = EditSession::default();
                Ok(())
            }
        }
    }

    /// Resets to `Idle` from any state, including a stalled save.
    pub fn force_reset(&mut self) {
        if self.session.is_active() {
            tracing::warn!(state = ?self.session.state, "edit session force reset");
        }
        self.session = EditSession::default();
    }

    /// Moves a validated session into the batch and resets to `Idle`.
    ///
    /// When staging fails the session returns to the state it was opened in.
    pub fn stage(&mut self, columns: &ColumnModel) -> Result<(), EditError> {
        match self.session.state {
            EditState::Validating => {}
            EditState::Idle => return Err(EditError::NoSession),
            state => return Err(EditError::InvalidState { state }),
        }
        let staged = if self.settings.mode == EditMode::Batch {
            self.save_request(columns)
        } else {
            Err(EditError::NotAllowed { op: "batch staging" })
        };
        let request = match staged {
            Ok(request) => request,
            Err(err) => {
                self.session.state = self.session.origin;
                return Err(err);
            }
        };
        let key_field = request.key_field.as_str();

        match request.mutation {
            Mutation::Insert { record } => self.batch.added.push(record),
            Mutation::Update { key, record } => {
                let same = |r: &Record| RowKey::of(r, key_field).as_ref() == Some(&key);
                if let Some(added) = self.batch.added.iter_mut().find(|r| same(r)) {
                    *added = record;
                } else if let Some(changed) = self.batch.changed.iter_mut().find(|r| same(r)) {
                    *changed = record;
                } else {
                    self.batch.changed.push(record);
                }
            }
            Mutation::Remove { key } => {
                let before = self.batch.added.len();
                self.batch
                    .added
                    .retain(|r| RowKey::of(r, key_field).as_ref() != Some(&key));
                self.batch
                    .changed
                    .retain(|r| RowKey::of(r, key_field).as_ref() != Some(&key));
                if before == self.batch.added.len() && !self.batch.deleted.contains(&key) {
                    self.batch.deleted.push(key);
                }
            }
            Mutation::Batch { .. } => {}
        }
        tracing::info!(pending = self.batch.len(), "staged row into batch");
        self.session = EditSession::default();
        Ok(())
    }

    /// The request persisting the staged batch, or `None` when nothing is staged.
    pub fn begin_batch_save(
        &mut self,
        columns: &ColumnModel,
    ) -> Result<Option<MutationRequest>, EditError> {
        if self.batch_in_flight {
            return Err(EditError::InvalidState {
                state: EditState::Saving,
            });
        }
        if self.batch.is_empty() {
            return Ok(None);
        }
        let key_field = match columns.primary_key() {
            Some(pk) => pk.field.clone(),
            None if self.batch.changed.is_empty() && self.batch.deleted.is_empty() => {
                String::new()
            }
            None => return Err(EditError::MissingPrimaryKey),
        };
        self.batch_in_flight = true;
        Ok(Some(MutationRequest {
            key_field,
            mutation: Mutation::Batch {
                changes: self.batch.clone(),
            },
        }))
    }

    /// Clears the batch on success. On failure it stays staged for a retry.
    pub fn complete_batch_save(
        &mut self,
        result: Result<(), DataError>,
    ) -> Result<BatchChanges, EditError> {
        self.batch_in_flight = false;
        match result {
            Ok(()) => Ok(std::mem::take(&mut self.batch)),
            Err(err) => {
                tracing::warn!(%err, pending = self.batch.len(), "batch save failed");
                Err(EditError::Data(err))
            }
        }
    }

    pub fn discard_batch(&mut self) {
        self.batch = BatchChanges::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDef;
    use crate::validation::DefaultValidator;
    use crate::validation::ValidationRule;
    use serde_json::json;

    fn columns() -> ColumnModel {
        ColumnModel::new(&[
            ColumnDef::new("id").primary_key(),
            ColumnDef::new("name").rule(ValidationRule::Required),
            ColumnDef::new("price").default_value(json!(0)),
        ])
    }

    fn row(id: i64, price: i64) -> Record {
        match json!({"id": id, "name": "widget", "price": price}) {
            Value::Object(m) => m,
            _ => Record::new(),
        }
    }

    #[test]
    fn second_session_is_rejected_without_change() {
        let mut e = EditLifecycle::new(EditSettings::all());
        e.begin_edit(&columns(), &row(1, 10)).unwrap();
        let before = e.session().clone();
        assert_eq!(
            e.begin_add(&columns()),
            Err(EditError::SessionActive {
                state: EditState::Editing
            })
        );
        assert_eq!(e.session(), &before);
    }

    #[test]
    fn add_seeds_defaults() {
        let mut e = EditLifecycle::new(EditSettings::all());
        e.begin_add(&columns()).unwrap();
        assert_eq!(e.session().dirty()["price"], json!(0));
        assert_eq!(e.session().dirty()["name"], Value::Null);
    }

    #[test]
    fn insert_needs_no_primary_key() {
        let cols = ColumnModel::new(&[ColumnDef::new("name")]);
        let mut e = EditLifecycle::new(EditSettings::all());
        e.begin_add(&cols).unwrap();
        e.set_value("name", json!("b")).unwrap();
        e.validate(&cols, &DefaultValidator).unwrap();
        let req = e.begin_save(&cols).unwrap();
        assert_eq!(req.request_type(), RequestType::Insert);
        assert_eq!(e.state(), EditState::Saving);
    }

    #[test]
    fn refused_staging_returns_to_origin() {
        let mut e = EditLifecycle::new(EditSettings::all());
        e.begin_edit(&columns(), &row(2, 5)).unwrap();
        e.validate(&columns(), &DefaultValidator).unwrap();
        assert_eq!(
            e.stage(&columns()),
            Err(EditError::NotAllowed {
                op: "batch staging"
            })
        );
        assert_eq!(e.state(), EditState::Editing);
        assert!(e.begin_save(&columns()).is_err());
        assert_eq!(e.state(), EditState::Editing);
    }

    #[test]
    fn failed_validation_returns_to_origin() {
        let mut e = EditLifecycle::new(EditSettings::all());
        e.begin_add(&columns()).unwrap();
        let err = e.validate(&columns(), &DefaultValidator).unwrap_err();
        assert_eq!(err, EditError::Invalid { count: 1 });
        assert_eq!(e.state(), EditState::Adding);
        assert!(e.session().errors().contains_key("name"));
        assert!(matches!(e.begin_save(&columns()), Err(EditError::InvalidState { .. })));
    }

    #[test]
    fn failed_save_keeps_dirty_values() {
        let mut e = EditLifecycle::new(EditSettings::all());
        e.begin_edit(&columns(), &row(7, 40)).unwrap();
        e.set_value("price", json!(50)).unwrap();
        e.validate(&columns(), &DefaultValidator).unwrap();
        let req = e.begin_save(&columns()).unwrap();
        assert_eq!(req.request_type(), RequestType::Update);
        assert_eq!(e.state(), EditState::Saving);

        let err = e.complete_save(Err(DataError::provider("offline"))).unwrap_err();
        assert!(matches!(err, EditError::Data(_)));
        assert_eq!(e.state(), EditState::Editing);
        assert_eq!(e.session().dirty()["price"], json!(50));
        assert!(e.session().errors().contains_key("price"));
        assert!(!e.session().errors().contains_key("name"));
    }

    #[test]
    fn successful_save_merges_and_resets() {
        let mut e = EditLifecycle::new(EditSettings::all());
        e.begin_edit(&columns(), &row(7, 40)).unwrap();
        e.set_value("price", json!(55)).unwrap();
        e.validate(&columns(), &DefaultValidator).unwrap();
        e.begin_save(&columns()).unwrap();
        let saved = e.complete_save(Ok(None)).unwrap();
        assert_eq!(saved.key, Some(RowKey::Int(7)));
        assert_eq!(saved.record, Some(row(7, 55)));
        assert_eq!(e.state(), EditState::Idle);
    }

    #[test]
    fn delete_failure_uses_row_error() {
        let mut e = EditLifecycle::new(EditSettings::all());
        e.begin_delete(&columns(), &row(3, 1)).unwrap();
        e.validate(&columns(), &DefaultValidator).unwrap();
        e.begin_save(&columns()).unwrap();
        let _ = e.complete_save(Err(DataError::provider("locked")));
        assert_eq!(e.state(), EditState::Deleting);
        assert!(e.session().errors().contains_key(ROW_ERROR_KEY));
    }

    #[test]
    fn saving_cannot_be_cancelled_but_can_be_reset() {
        let mut e = EditLifecycle::new(EditSettings::all());
        e.begin_delete(&columns(), &row(3, 1)).unwrap();
        e.validate(&columns(), &DefaultValidator).unwrap();
        e.begin_save(&columns()).unwrap();
        assert!(e.cancel().is_err());
        e.force_reset();
        assert_eq!(e.state(), EditState::Idle);
    }

    #[test]
    fn disabled_operations_are_refused() {
        let mut e = EditLifecycle::new(EditSettings::default());
        assert_eq!(e.begin_add(&columns()), Err(EditError::NotAllowed { op: "adding" }));
    }

    #[test]
    fn batch_collapses_changes_to_added_rows() {
        let mut e = EditLifecycle::new(EditSettings {
            mode: EditMode::Batch,
            ..EditSettings::all()
        });
        let cols = columns();
        e.begin_add(&cols).unwrap();
        e.set_value("id", json!(9)).unwrap();
        e.set_value("name", json!("new")).unwrap();
        e.validate(&cols, &DefaultValidator).unwrap();
        e.stage(&cols).unwrap();

        e.begin_delete(&cols, &row(9, 0)).unwrap();
        e.validate(&cols, &DefaultValidator).unwrap();
        e.stage(&cols).unwrap();
        assert!(e.batch().is_empty());

        e.begin_delete(&cols, &row(2, 0)).unwrap();
        e.validate(&cols, &DefaultValidator).unwrap();
        e.stage(&cols).unwrap();
        let req = e.begin_batch_save(&cols).unwrap();
        assert_eq!(req.map(|r| r.request_type()), Some(RequestType::Batch));
        assert!(e.complete_batch_save(Err(DataError::provider("x"))).is_err());
        assert_eq!(e.batch().deleted, vec![RowKey::Int(2)]);
    }
}

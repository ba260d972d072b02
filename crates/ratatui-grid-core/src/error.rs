use crate::edit::EditState;
use crate::value::RowKey;
use thiserror::Error;

/// Failures raised while reading or persisting data.
///
/// `Clone` so that one provider failure can be handed to every caller that coalesced onto the
/// same in-flight request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DataError {
    /// The remote provider rejected the request.
    #[error("data provider failed: {reason}")]
    Provider { reason: String },

    /// The provider answered, but the answer does not fit the request.
    #[error("malformed data result: {reason}")]
    Malformed { reason: String },

    /// A synchronous read was attempted against a remote source.
    #[error("remote data sources can only be queried asynchronously")]
    RemoteSource,

    /// A mutation addressed a row that the source does not hold.
    #[error("row {key} not found")]
    RowNotFound { key: RowKey },
}

impl DataError {
    pub fn provider(reason: impl Into<String>) -> Self {
        Self::Provider {
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

/// Failures of the edit lifecycle.
///
/// Validation failures are not raised through this type for individual fields; they are kept in
/// the session's error map. [`EditError::Invalid`] only reports that the map blocked a save.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EditError {
    #[error("an edit session is already active ({state:?})")]
    SessionActive { state: EditState },

    #[error("no edit session is active")]
    NoSession,

    #[error("operation not valid while the session is {state:?}")]
    InvalidState { state: EditState },

    #[error("{op} is disabled by the edit settings")]
    NotAllowed { op: &'static str },

    #[error("no primary key column is declared")]
    MissingPrimaryKey,

    #[error("row {key} is not in the current view")]
    RowNotFound { key: RowKey },

    #[error("validation failed for {count} field(s)")]
    Invalid { count: usize },

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Anything reported through the grid's error event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GridError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Edit(#[from] EditError),
}

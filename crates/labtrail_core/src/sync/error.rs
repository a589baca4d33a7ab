//! Error taxonomy of the synchronization layer.

use crate::model::{EntityKind, ParentRef};
use crate::remote::RemoteError;
use crate::repo::mapping_repo::MappingError;
use crate::repo::RepoError;
use crate::sync::codec::DecodeError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SyncResult<T> = Result<T, SyncError>;

/// Failure of one record (or one batch) inside an explicit sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub kind: EntityKind,
    /// Remote id, local id or parent description of the failing item.
    pub target: String,
    pub message: String,
}

impl SyncFailure {
    pub fn new(kind: EntityKind, target: impl Into<String>, err: &SyncError) -> Self {
        Self {
            kind,
            target: target.into(),
            message: err.to_string(),
        }
    }
}

impl Display for SyncFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.target, self.message)
    }
}

#[derive(Debug)]
pub enum SyncError {
    /// No signed-in user; remote operations are blocked.
    NotAuthenticated,
    Remote(RemoteError),
    Mapping(MappingError),
    /// Local store failure. Always a hard failure for the caller.
    Local(RepoError),
    /// The parent record has no remote counterpart yet.
    ParentNotSynced { kind: EntityKind, parent: ParentRef },
    Decode(DecodeError),
    /// Another explicit sync pass is in progress.
    AlreadyRunning,
    /// An explicit sync pass finished with per-record failures.
    Partial(Vec<SyncFailure>),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "not signed in"),
            Self::Remote(err) => write!(f, "{err}"),
            Self::Mapping(err) => write!(f, "{err}"),
            Self::Local(err) => write!(f, "{err}"),
            Self::ParentNotSynced { kind, parent } => write!(
                f,
                "{kind} cannot be synced before its parent {} {}",
                parent.kind, parent.id
            ),
            Self::Decode(err) => write!(f, "{err}"),
            Self::AlreadyRunning => write!(f, "a sync is already running"),
            Self::Partial(failures) => {
                write!(f, "sync finished with {} failure(s)", failures.len())?;
                if let Some(first) = failures.first() {
                    write!(f, "; first: {first}")?;
                }
                Ok(())
            }
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Remote(err) => Some(err),
            Self::Mapping(err) => Some(err),
            Self::Local(err) => Some(err),
            Self::Decode(err) => Some(err),
            Self::NotAuthenticated
            | Self::ParentNotSynced { .. }
            | Self::AlreadyRunning
            | Self::Partial(_) => None,
        }
    }
}

impl From<RemoteError> for SyncError {
    fn from(value: RemoteError) -> Self {
        match value {
            RemoteError::NotAuthenticated => Self::NotAuthenticated,
            other => Self::Remote(other),
        }
    }
}

impl From<MappingError> for SyncError {
    fn from(value: MappingError) -> Self {
        Self::Mapping(value)
    }
}

impl From<RepoError> for SyncError {
    fn from(value: RepoError) -> Self {
        Self::Local(value)
    }
}

impl From<DecodeError> for SyncError {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

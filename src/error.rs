// SPDX-License-Identifier: MPL-2.0

use crate::api::RemoteError;
use crate::cache::CacheError;
use crate::people::UsernameValidation;
use crate::runtime::WorkerStopped;
use thiserror::Error;

/// Failures of a reader or people action. Sync and toggle entry points only
/// log these and report a coarse result; people operations return them.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("transport failure: {0}")]
    Transport(RemoteError),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("cannot resolve {0}")]
    Unresolvable(String),
    #[error("server rejected the request")]
    Rejected,
    #[error("only {} of {expected} usernames were accounted for", .results.len())]
    PartialValidation {
        results: Vec<UsernameValidation>,
        expected: usize,
    },
    #[error("unrecognized validation error for {username}: {code}")]
    UnrecognizedValidation {
        username: String,
        code: String,
        results: Vec<UsernameValidation>,
    },
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Worker(#[from] WorkerStopped),
}

impl From<RemoteError> for ActionError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::InvalidResponse(msg) => ActionError::MalformedResponse(msg),
            other => ActionError::Transport(other),
        }
    }
}

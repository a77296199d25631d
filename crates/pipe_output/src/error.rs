use std::{io, path::PathBuf};

use thiserror::Error;

use crate::piper::PiperState;

/// Errors raised while configuring or launching a [`crate::PipeOutput`].
///
/// Failures inside the run loop are not represented here; they end the loop and are reported
/// through [`crate::RunSummary`].
#[derive(Debug, Error)]
pub enum PipeOutputError {
    #[error("error locating executable `{path}`: {source}")]
    Resolve {
        path: String,
        #[source]
        source: ResolveError,
    },
    #[error("invalid PipeOutput config: {0}")]
    InvalidConfig(#[from] toml::de::Error),
    #[error("failed to spawn `{binary}`: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("stdin pipe unavailable for `{binary}`")]
    StdinUnavailable { binary: PathBuf },
    #[error("cannot {operation} a pipe output that is {state}")]
    InvalidState {
        operation: &'static str,
        state: PiperState,
    },
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("executable path is empty")]
    EmptyPath,
    #[error("`{name}` not found in search path")]
    NotFound { name: String },
    #[error("`{path}` is missing or unreadable: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("`{path}` is not a file")]
    NotFile { path: PathBuf },
    #[error("`{path}` is not executable")]
    NotExecutable { path: PathBuf },
}

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::telemetry::logging::InitError;
use crate::transport::FailureCause;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("logging initialization failed: {0}")]
    Logging(#[from] InitError),
    #[error("cannot read {path:?}: {source}")]
    ReadSource { path: PathBuf, source: io::Error },
    #[error("{0}")]
    Connection(FailureCause),
    #[error("the server did not finish the run in time")]
    RunTimedOut,
    #[error("the server closed the session unexpectedly")]
    SessionEnded,
}

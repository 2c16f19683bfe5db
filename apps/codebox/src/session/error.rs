use std::fmt;

use codebox_proto::NodeKind;
use thiserror::Error;

use crate::transport::ConnectionError;

/// A user action rejected locally; nothing was sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter both email and password")]
    MissingCredentials,
    #[error("Please enter some code to run")]
    EmptyCode,
    #[error("Please enter a name")]
    EmptyName,
    #[error("File name \"{0}\" needs an extension")]
    MissingExtension(String),
    #[error("Name \"{0}\" may not contain '/'")]
    NameContainsSeparator(String),
    #[error("An item named \"{0}\" already exists here")]
    DuplicateName(String),
    #[error("Please log in first")]
    NotAuthenticated,
    #[error("No file is open")]
    NoFileOpen,
    #[error("No file at \"{0}\"")]
    UnknownPath(String),
    #[error("\"{0}\" is still loading")]
    FileLoading(String),
    #[error("A save is already in progress")]
    SaveInProgress,
    #[error("Code is already running")]
    RunInProgress,
    #[error("No input was requested")]
    NoInputPending,
}

/// Which request could not be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Register,
    Login,
    Run,
    Save,
    LoadFile,
    Create(NodeKind),
    Delete,
    Download,
    Input,
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Register => f.write_str("register"),
            Request::Login => f.write_str("login"),
            Request::Run => f.write_str("run code"),
            Request::Save => f.write_str("save file"),
            Request::LoadFile => f.write_str("load file"),
            Request::Create(kind) => write!(f, "create {}", kind.as_str()),
            Request::Delete => f.write_str("delete file"),
            Request::Download => f.write_str("download file"),
            Request::Input => f.write_str("send input"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("Unable to {request}: Server connection not available")]
    NotSent {
        request: Request,
        #[source]
        source: ConnectionError,
    },
}

impl ActionError {
    pub fn not_sent(request: Request) -> impl FnOnce(ConnectionError) -> Self {
        move |source| ActionError::NotSent { request, source }
    }
}

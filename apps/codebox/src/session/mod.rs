//! Client-held session state and the controller that keeps it consistent
//! with the server's replies.

use std::collections::VecDeque;

use codebox_proto::ReturnCode;
use tokio::time::Instant;

pub mod controller;
pub mod error;
pub mod file_tree;
pub mod input_bridge;

pub use controller::{Controller, UserAction};
pub use error::{ActionError, Request, ValidationError};
pub use file_tree::{FileNode, FileTree};
pub use input_bridge::{InputBridge, InputCommit, PendingInputRequest};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    Anonymous,
    Authenticated {
        email: String,
    },
}

impl AuthState {
    pub fn email(&self) -> Option<&str> {
        match self {
            AuthState::Anonymous => None,
            AuthState::Authenticated { email } => Some(email),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFile {
    pub name: String,
    pub path: String,
    pub dirty: bool,
    /// Set until the file's content arrives.
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSave {
    pub path: String,
    /// Edit generation captured when the save was sent.
    pub generation: u64,
    pub sent_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRun {
    pub sent_at: Instant,
}

#[derive(Debug, Default)]
pub struct Session {
    pub(crate) auth: AuthState,
    pub(crate) current_file: Option<OpenFile>,
    pub(crate) pending_run: Option<PendingRun>,
    pub(crate) pending_saves: VecDeque<PendingSave>,
    pub(crate) selected_folder: Option<String>,
    pub(crate) pending_login: Option<String>,
    pub(crate) pending_downloads: VecDeque<String>,
    pub(crate) pending_loads: VecDeque<String>,
    pub(crate) input: InputBridge,
    pub(crate) tree: FileTree,
    pub(crate) edit_generation: u64,
    pub(crate) connection_failed: bool,
    pub(crate) runs_completed: u64,
    pub(crate) last_return_code: Option<ReturnCode>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub fn current_file(&self) -> Option<&OpenFile> {
        self.current_file.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.current_file.as_ref().is_some_and(|file| file.dirty)
    }

    pub fn pending_run(&self) -> bool {
        self.pending_run.is_some()
    }

    pub fn pending_save(&self) -> bool {
        !self.pending_saves.is_empty()
    }

    pub fn pending_saves(&self) -> impl Iterator<Item = &PendingSave> {
        self.pending_saves.iter()
    }

    /// The run affordance moves in lock-step with `pending_run`.
    pub fn run_locked(&self) -> bool {
        self.pending_run()
    }

    /// Saving is locked while a save is in flight or a run is executing.
    pub fn save_locked(&self) -> bool {
        self.pending_save() || self.pending_run()
    }

    pub fn selected_folder(&self) -> Option<&str> {
        self.selected_folder.as_deref()
    }

    pub fn pending_input(&self) -> Option<&PendingInputRequest> {
        self.input.pending()
    }

    pub fn tree(&self) -> &FileTree {
        &self.tree
    }

    pub fn connection_failed(&self) -> bool {
        self.connection_failed
    }

    pub fn runs_completed(&self) -> u64 {
        self.runs_completed
    }

    pub fn last_return_code(&self) -> Option<&ReturnCode> {
        self.last_return_code.as_ref()
    }
}

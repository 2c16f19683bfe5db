use std::time::Duration;

use codebox_proto::{
    ClientCommand, CreateRequest, ErrorCode, ListingEntry, NodeKind, ProtocolError, ReturnCode,
    SaveRequest, ServerMessage,
};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::error::{ActionError, Request, ValidationError};
use super::file_tree::{validate_new_name, FileNode, FileTree};
use super::{AuthState, OpenFile, PendingRun, PendingSave, Session};
use crate::surface::{Editor, NoticeKind, Surface};
use crate::transport::{ConnectionEvent, FailureCause, FrameSink};

const CONNECTION_LOST: &str = "Connection to the server failed. Restart to try again.";

/// Something the user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    Register { email: String, password: String },
    Login { email: String, password: String },
    Run,
    Save,
    OpenFile { path: String },
    /// `None` selects the implicit root.
    SelectFolder { path: Option<String> },
    Create { kind: NodeKind, name: String },
    Delete { path: String },
    Download { path: String },
    EditorChanged,
    InputCommitted { line: String },
}

/// Owns the [`Session`] and is the only thing that mutates it.
///
/// Every entry point takes the current time so request deadlines can be
/// driven by a paused clock.
pub struct Controller<S, E, K> {
    session: Session,
    surface: S,
    editor: E,
    sink: K,
    request_timeout: Option<Duration>,
    shown_run_lock: bool,
    shown_save_lock: bool,
}

impl<S: Surface, E: Editor, K: FrameSink> Controller<S, E, K> {
    pub fn new(surface: S, editor: E, sink: K) -> Self {
        Self {
            session: Session::new(),
            surface,
            editor,
            sink,
            request_timeout: None,
            shown_run_lock: false,
            shown_save_lock: false,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    // ---- connection ----

    pub fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => info!(target: "codebox::session", "connected"),
            ConnectionEvent::Message(text) => {
                if let Err(err) = self.handle_frame(&text) {
                    warn!(
                        target: "codebox::session",
                        error = %err,
                        frame = %text,
                        "dropping frame"
                    );
                }
            }
            ConnectionEvent::Closed => debug!(target: "codebox::session", "connection closed"),
            ConnectionEvent::Errored(reason) => {
                debug!(target: "codebox::session", %reason, "connection errored")
            }
            ConnectionEvent::TimedOut => debug!(target: "codebox::session", "connection timed out"),
            ConnectionEvent::Failed(cause) => self.connection_failed(&cause),
        }
    }

    fn connection_failed(&mut self, cause: &FailureCause) {
        if self.session.connection_failed {
            return;
        }
        self.session.connection_failed = true;
        warn!(target: "codebox::session", %cause, "connection failed");
        if let Some(deferred) = self.session.input.abort() {
            self.surface.end_input();
            self.surface.write_output(&deferred);
        }
        self.surface.show_connection_error(CONNECTION_LOST);
    }

    /// Decodes one inbound frame and applies it.
    pub fn handle_frame(&mut self, raw: &str) -> Result<(), ProtocolError> {
        let message = ServerMessage::decode(raw)?;
        trace!(target: "codebox::session", code = message.code(), "frame");
        self.handle_message(message);
        Ok(())
    }

    pub fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Registered => {
                self.surface.alert("Registered successfully!");
                self.surface.clear_credentials();
            }
            ServerMessage::LoggedIn { listing } => self.logged_in(listing),
            ServerMessage::StorageUpdated => {
                self.surface.notify(NoticeKind::Success, "Storage updated");
            }
            ServerMessage::FileContent { content } => self.file_loaded(&content),
            ServerMessage::FileSaved => self.file_saved(),
            ServerMessage::FileDeleted => {
                self.surface.notify(NoticeKind::Success, "File was deleted successfully!");
            }
            ServerMessage::Output { chunk } => {
                if let Some(text) = self.session.input.route_output(&chunk) {
                    self.surface.write_output(&text);
                }
            }
            ServerMessage::RunDone { return_code } => self.run_finished(return_code),
            ServerMessage::Error { code } => self.server_error(code),
            ServerMessage::InputRequested { prompt } => self.input_requested(prompt),
            ServerMessage::FileDownload { content } => {
                let path = self.session.pending_downloads.pop_front().unwrap_or_else(|| {
                    warn!(target: "codebox::session", "download content without a request");
                    String::from("download")
                });
                self.surface.offer_download(&path, &content);
            }
        }
    }

    fn logged_in(&mut self, listing: Vec<ListingEntry>) {
        let email = match self.session.pending_login.take() {
            Some(email) => email,
            None => match self.session.auth.email() {
                Some(email) => email.to_string(),
                None => {
                    warn!(target: "codebox::session", "login reply without a login request");
                    return;
                }
            },
        };
        info!(target: "codebox::session", %email, entries = listing.len(), "logged in");
        self.session.auth = AuthState::Authenticated {
            email: email.clone(),
        };
        self.session.tree = FileTree::from_listing(listing);
        self.session.selected_folder = None;

        self.surface.show_identity(&email);
        self.surface.set_files_enabled(true);
        self.render_tree();
        self.surface.alert(&format!("Logged in. Welcome! ({email})"));
        self.surface.clear_credentials();
    }

    /// Content replies arrive in request order. Only the reply for the file
    /// still waiting on screen is applied.
    fn file_loaded(&mut self, content: &str) {
        let Some(requested) = self.session.pending_loads.pop_front() else {
            warn!(target: "codebox::session", "file content without a request");
            return;
        };
        let file = match self.session.current_file.as_mut() {
            Some(file) if file.loading && file.path == requested => file,
            _ => {
                debug!(
                    target: "codebox::session",
                    path = %requested,
                    "dropping stale file content"
                );
                return;
            }
        };
        file.loading = false;
        file.dirty = false;
        self.editor.set_contents(content);
        self.editor.set_read_only(false);
    }

    fn file_saved(&mut self) {
        let Some(save) = self.session.pending_saves.pop_front() else {
            warn!(target: "codebox::session", "save reply with no save in flight");
            return;
        };
        let generation = self.session.edit_generation;
        if let Some(file) = self.session.current_file.as_mut() {
            if file.path == save.path && save.generation == generation {
                file.dirty = false;
            }
        }
        debug!(target: "codebox::session", path = %save.path, "save confirmed");
        self.surface.notify(NoticeKind::Success, "File was saved successfully!");
        self.sync_locks();
    }

    fn run_finished(&mut self, return_code: ReturnCode) {
        if let Some(deferred) = self.session.input.abort() {
            self.surface.end_input();
            self.surface.write_output(&deferred);
        }
        if self.session.pending_run.take().is_none() {
            debug!(target: "codebox::session", "run result with no run in flight");
        }
        info!(target: "codebox::session", code = ?return_code.code(), "run finished");
        self.surface.write_output(&return_code.status_line());
        self.session.runs_completed += 1;
        self.session.last_return_code = Some(return_code);
        self.sync_locks();
    }

    fn server_error(&mut self, code: ErrorCode) {
        warn!(target: "codebox::session", code = code.as_str(), "server reported an error");
        self.session.pending_login = None;
        let message = format!("Error: {}", code.description());
        if code.is_soft() {
            self.surface.notify(NoticeKind::Error, &message);
        } else {
            self.surface.alert(&message);
            self.surface.clear_credentials();
        }
    }

    fn input_requested(&mut self, prompt: String) {
        if let Some(displaced) = self.session.input.open(prompt.clone()) {
            warn!(
                target: "codebox::session",
                prompt = %displaced.prompt,
                "input request replaced before it was answered"
            );
            self.surface.end_input();
        }
        if let Err(err) = self.surface.begin_input(&prompt) {
            warn!(target: "codebox::session", error = %err, "cannot collect input");
            if let Some(deferred) = self.session.input.abort() {
                self.surface.write_output(&deferred);
            }
            if let Err(err) = self.send(ClientCommand::InputReply { line: None }) {
                warn!(target: "codebox::session", error = %err, "failed to send input failure");
            }
        }
    }

    // ---- user actions ----

    /// Applies a user action. Rejections are reported to the surface and
    /// returned.
    pub fn handle_action(&mut self, action: UserAction, now: Instant) -> Result<(), ActionError> {
        let result = self.apply_action(action, now);
        if let Err(err) = &result {
            debug!(target: "codebox::session", error = %err, "action rejected");
            match err {
                ActionError::NotSent {
                    request: Request::Delete,
                    ..
                } => self.surface.notify(NoticeKind::Error, &err.to_string()),
                _ => self.surface.alert(&err.to_string()),
            }
        }
        result
    }

    fn apply_action(&mut self, action: UserAction, now: Instant) -> Result<(), ActionError> {
        match action {
            UserAction::Register { email, password } => {
                check_credentials(&email, &password)?;
                self.send(ClientCommand::Register { email, password })
                    .map_err(ActionError::not_sent(Request::Register))
            }
            UserAction::Login { email, password } => {
                check_credentials(&email, &password)?;
                self.send(ClientCommand::Login {
                    email: email.clone(),
                    password,
                })
                .map_err(ActionError::not_sent(Request::Login))?;
                self.session.pending_login = Some(email);
                Ok(())
            }
            UserAction::Run => self.run(now),
            UserAction::Save => self.save(now),
            UserAction::OpenFile { path } => self.open_file(path, now),
            UserAction::SelectFolder { path } => self.select_folder(path),
            UserAction::Create { kind, name } => self.create(kind, name),
            UserAction::Delete { path } => self.delete(path),
            UserAction::Download { path } => {
                self.require_auth()?;
                match self.session.tree.find_by_path(&path) {
                    Some(FileNode::File { .. }) => {}
                    _ => return Err(ValidationError::UnknownPath(path).into()),
                }
                self.send(ClientCommand::DownloadFile { path: path.clone() })
                    .map_err(ActionError::not_sent(Request::Download))?;
                self.session.pending_downloads.push_back(path);
                Ok(())
            }
            UserAction::EditorChanged => {
                self.session.edit_generation += 1;
                if let Some(file) = self.session.current_file.as_mut() {
                    if !file.loading {
                        file.dirty = true;
                    }
                }
                Ok(())
            }
            UserAction::InputCommitted { line } => {
                let commit = self
                    .session
                    .input
                    .commit(&line)
                    .ok_or(ValidationError::NoInputPending)?;
                self.surface.end_input();
                self.surface.write_output(&commit.echo);
                let sent = self
                    .send(commit.reply)
                    .map_err(ActionError::not_sent(Request::Input));
                self.surface.write_output(&commit.flushed);
                sent
            }
        }
    }

    fn run(&mut self, now: Instant) -> Result<(), ActionError> {
        if self.session.pending_run.is_some() {
            return Err(ValidationError::RunInProgress.into());
        }
        let code = self.editor.contents();
        let open = self
            .session
            .current_file
            .as_ref()
            .map(|file| (file.path.clone(), file.loading));

        match open {
            Some((path, loading)) => {
                if !loading {
                    self.send_save(path.clone(), code, now)?;
                }
                self.surface.clear_output();
                self.send(ClientCommand::RunFile { path })
                    .map_err(ActionError::not_sent(Request::Run))?;
            }
            None => {
                if code.trim().is_empty() {
                    return Err(ValidationError::EmptyCode.into());
                }
                self.surface.clear_output();
                self.send(ClientCommand::RunSnippet { code })
                    .map_err(ActionError::not_sent(Request::Run))?;
            }
        }
        self.session.pending_run = Some(PendingRun { sent_at: now });
        self.sync_locks();
        Ok(())
    }

    fn save(&mut self, now: Instant) -> Result<(), ActionError> {
        let file = self
            .session
            .current_file
            .as_ref()
            .ok_or(ValidationError::NoFileOpen)?;
        if file.loading {
            return Err(ValidationError::FileLoading(file.name.clone()).into());
        }
        if self.session.save_locked() {
            return Err(ValidationError::SaveInProgress.into());
        }
        let path = file.path.clone();
        let content = self.editor.contents();
        self.send_save(path, content, now)
    }

    fn send_save(
        &mut self,
        path: String,
        content: String,
        now: Instant,
    ) -> Result<(), ActionError> {
        self.send(ClientCommand::SaveFile(SaveRequest {
            path: path.clone(),
            content,
        }))
        .map_err(ActionError::not_sent(Request::Save))?;
        self.session.pending_saves.push_back(PendingSave {
            path,
            generation: self.session.edit_generation,
            sent_at: now,
        });
        self.sync_locks();
        Ok(())
    }

    fn open_file(&mut self, path: String, now: Instant) -> Result<(), ActionError> {
        self.require_auth()?;
        let name = match self.session.tree.find_by_path(&path) {
            Some(FileNode::File { name, .. }) => name.clone(),
            _ => return Err(ValidationError::UnknownPath(path).into()),
        };

        let autosave = self
            .session
            .current_file
            .as_ref()
            .filter(|file| file.dirty && !file.loading)
            .map(|file| file.path.clone());
        if let Some(previous) = autosave {
            let content = self.editor.contents();
            self.send_save(previous, content, now)?;
        }

        self.send(ClientCommand::GetFile { path: path.clone() })
            .map_err(ActionError::not_sent(Request::LoadFile))?;
        self.session.pending_loads.push_back(path.clone());

        self.editor.set_contents(&format!("# Loading {name}..."));
        self.editor.set_read_only(true);
        self.surface.show_current_file(Some(&path));
        self.session.current_file = Some(OpenFile {
            name,
            path,
            dirty: false,
            loading: true,
        });
        Ok(())
    }

    fn select_folder(&mut self, path: Option<String>) -> Result<(), ActionError> {
        if let Some(path) = &path {
            match self.session.tree.find_by_path(path) {
                Some(node) if node.is_folder() => {}
                _ => return Err(ValidationError::UnknownPath(path.clone()).into()),
            }
        }
        self.session.selected_folder = path;
        Ok(())
    }

    fn create(&mut self, kind: NodeKind, name: String) -> Result<(), ActionError> {
        self.require_auth()?;
        validate_new_name(kind, &name)?;

        let selected = self.session.selected_folder.clone();
        let tree = &mut self.session.tree;
        let parent = tree.resolve_parent(selected.as_deref());
        if tree.list_sibling_names(parent.as_deref()).contains(&name) {
            return Err(ValidationError::DuplicateName(name).into());
        }

        let path = tree.insert_under_selected(selected.as_deref(), kind, &name);
        let request = ClientCommand::Create(CreateRequest {
            kind,
            name,
            path: path.clone(),
        });
        if let Err(err) = self.send(request) {
            self.session.tree.remove_by_path(&path);
            return Err(ActionError::not_sent(Request::Create(kind))(err));
        }
        info!(target: "codebox::session", kind = kind.as_str(), %path, "created");
        self.render_tree();
        Ok(())
    }

    fn delete(&mut self, path: String) -> Result<(), ActionError> {
        self.require_auth()?;
        if self.session.tree.find_by_path(&path).is_none() {
            return Err(ValidationError::UnknownPath(path).into());
        }
        self.send(ClientCommand::DeleteFile { path: path.clone() })
            .map_err(ActionError::not_sent(Request::Delete))?;

        let nested = format!("{path}/");
        let is_affected = |candidate: &str| candidate == path || candidate.starts_with(&nested);

        if self
            .session
            .current_file
            .as_ref()
            .is_some_and(|file| is_affected(&file.path))
        {
            self.session.current_file = None;
            self.editor.set_contents("");
            self.editor.set_read_only(false);
            self.surface.show_current_file(None);
        }
        if self
            .session
            .selected_folder
            .as_deref()
            .is_some_and(is_affected)
        {
            self.session.selected_folder = None;
        }
        self.session.tree.remove_by_path(&path);
        info!(target: "codebox::session", %path, "deleted");
        self.render_tree();
        Ok(())
    }

    // ---- request deadlines ----

    /// Earliest instant at which an in-flight run or save times out.
    pub fn next_deadline(&self) -> Option<Instant> {
        let timeout = self.request_timeout?;
        let run = self.session.pending_run.map(|run| run.sent_at);
        let save = self.session.pending_saves.front().map(|save| save.sent_at);
        let oldest = match (run, save) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        oldest.map(|sent_at| sent_at + timeout)
    }

    /// Rolls back every run or save older than the request timeout.
    /// Returns true when anything expired.
    pub fn expire_requests(&mut self, now: Instant) -> bool {
        let Some(timeout) = self.request_timeout else {
            return false;
        };
        let expired = |sent_at: Instant| now.saturating_duration_since(sent_at) >= timeout;
        let mut any = false;

        if self.session.pending_run.is_some_and(|run| expired(run.sent_at)) {
            self.session.pending_run = None;
            if let Some(deferred) = self.session.input.abort() {
                self.surface.end_input();
                self.surface.write_output(&deferred);
            }
            warn!(target: "codebox::session", ?timeout, "run request timed out");
            self.surface.notify(NoticeKind::Error, "Run request timed out");
            any = true;
        }

        let mut saves_expired = false;
        while self
            .session
            .pending_saves
            .front()
            .is_some_and(|save| expired(save.sent_at))
        {
            if let Some(save) = self.session.pending_saves.pop_front() {
                warn!(
                    target: "codebox::session",
                    path = %save.path,
                    ?timeout,
                    "save request timed out"
                );
            }
            saves_expired = true;
        }
        if saves_expired {
            self.surface.notify(NoticeKind::Error, "Save request timed out");
            any = true;
        }

        if any {
            self.sync_locks();
        }
        any
    }

    // ---- helpers ----

    fn send(&mut self, command: ClientCommand) -> Result<(), crate::transport::ConnectionError> {
        if let Some(field) = command.ambiguous_field() {
            warn!(
                target: "codebox::session",
                code = command.code(),
                field,
                "field contains the frame separator and will be split by the receiver"
            );
        }
        let frame = command.encode();
        trace!(target: "codebox::session", code = command.code(), "send");
        self.sink.send_frame(frame)
    }

    fn require_auth(&self) -> Result<(), ValidationError> {
        if self.session.auth.is_authenticated() {
            Ok(())
        } else {
            Err(ValidationError::NotAuthenticated)
        }
    }

    fn render_tree(&mut self) {
        let snapshot = self.session.tree.snapshot();
        self.surface.render_file_tree(&snapshot);
    }

    /// Pushes lock state to the surface when it changed.
    fn sync_locks(&mut self) {
        let run = self.session.run_locked();
        if run != self.shown_run_lock {
            self.shown_run_lock = run;
            self.surface.set_run_locked(run);
        }
        let save = self.session.save_locked();
        if save != self.shown_save_lock {
            self.shown_save_lock = save;
            self.surface.set_save_locked(save);
        }
    }
}

fn check_credentials(email: &str, password: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() || password.is_empty() {
        Err(ValidationError::MissingCredentials)
    } else {
        Ok(())
    }
}

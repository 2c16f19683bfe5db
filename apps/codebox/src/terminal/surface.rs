//! Printing implementations of the rendering and editor capabilities.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::session::FileNode;
use crate::surface::{Editor, NoticeKind, Surface, SurfaceError};

/// State the stdin reader and the controller both look at.
#[derive(Debug, Default)]
pub struct TerminalState {
    pub buffer: String,
    pub read_only: bool,
    pub input_pending: bool,
    pub tree: Vec<FileNode>,
    pub current_file: Option<String>,
    pub identity: Option<String>,
}

pub type SharedTerminal = Arc<Mutex<TerminalState>>;

pub fn shared() -> SharedTerminal {
    Arc::new(Mutex::new(TerminalState::default()))
}

pub struct TerminalSurface {
    state: SharedTerminal,
    download_dir: PathBuf,
}

impl TerminalSurface {
    pub fn new(state: SharedTerminal, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            state,
            download_dir: download_dir.into(),
        }
    }

    fn stdout(text: &str) {
        let mut out = io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

impl Surface for TerminalSurface {
    fn show_connection_error(&mut self, message: &str) {
        eprintln!("❌ {message}");
    }

    fn alert(&mut self, message: &str) {
        eprintln!("{message}");
    }

    fn notify(&mut self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Success => eprintln!("✔ {message}"),
            NoticeKind::Error => eprintln!("⚠ {message}"),
        }
    }

    fn clear_output(&mut self) {}

    fn write_output(&mut self, text: &str) {
        Self::stdout(text);
    }

    fn begin_input(&mut self, prompt: &str) -> Result<(), SurfaceError> {
        self.state.lock().input_pending = true;
        Self::stdout(prompt);
        Ok(())
    }

    fn end_input(&mut self) {
        self.state.lock().input_pending = false;
    }

    fn render_file_tree(&mut self, nodes: &[FileNode]) {
        self.state.lock().tree = nodes.to_vec();
    }

    fn show_identity(&mut self, email: &str) {
        self.state.lock().identity = Some(email.to_string());
    }

    fn set_files_enabled(&mut self, enabled: bool) {
        debug!(target: "codebox::terminal", enabled, "file commands");
    }

    fn set_run_locked(&mut self, locked: bool) {
        debug!(target: "codebox::terminal", locked, "run affordance");
    }

    fn set_save_locked(&mut self, locked: bool) {
        debug!(target: "codebox::terminal", locked, "save affordance");
    }

    fn show_current_file(&mut self, path: Option<&str>) {
        if let Some(path) = path {
            eprintln!("Opening {path}");
        }
        self.state.lock().current_file = path.map(str::to_string);
    }

    fn clear_credentials(&mut self) {}

    fn offer_download(&mut self, path: &str, content: &[u8]) {
        let name = Path::new(path)
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "download".into());
        let target = self.download_dir.join(name);
        match std::fs::write(&target, content) {
            Ok(()) => eprintln!("Downloaded {path} to {}", target.display()),
            Err(err) => {
                warn!(
                    target: "codebox::terminal",
                    path = %target.display(),
                    error = %err,
                    "download write failed"
                );
                eprintln!("⚠ Could not write {}: {err}", target.display());
            }
        }
    }
}

pub struct TerminalEditor {
    state: SharedTerminal,
}

impl TerminalEditor {
    pub fn new(state: SharedTerminal) -> Self {
        Self { state }
    }
}

impl Editor for TerminalEditor {
    fn contents(&self) -> String {
        self.state.lock().buffer.clone()
    }

    fn set_contents(&mut self, text: &str) {
        self.state.lock().buffer = text.to_string();
    }

    fn set_read_only(&mut self, read_only: bool) {
        self.state.lock().read_only = read_only;
    }
}

/// Renders a tree snapshot as an indented listing.
pub fn format_tree(nodes: &[FileNode]) -> String {
    fn walk(nodes: &[FileNode], depth: usize, out: &mut String) {
        for node in nodes {
            out.push_str(&"  ".repeat(depth));
            out.push_str(node.name());
            if node.is_folder() {
                out.push('/');
            }
            out.push('\n');
            walk(node.children(), depth + 1, out);
        }
    }
    let mut out = String::new();
    walk(nodes, 0, &mut out);
    out
}

//! Rendering and editor capabilities the session controller drives.
//!
//! The controller never draws anything itself; it tells a [`Surface`] what
//! changed and reads or writes the buffer through an [`Editor`].

use thiserror::Error;

use crate::session::FileNode;

pub mod recording;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("input region unavailable: {0}")]
    InputUnavailable(String),
}

pub trait Surface {
    /// Blocking "connection lost" prompt. Called at most once per connection.
    fn show_connection_error(&mut self, message: &str);
    /// Blocking message.
    fn alert(&mut self, message: &str);
    /// Non-blocking, auto-dismissing message.
    fn notify(&mut self, kind: NoticeKind, message: &str);

    fn clear_output(&mut self);
    fn write_output(&mut self, text: &str);
    /// Renders `prompt` followed by an editable caret region.
    fn begin_input(&mut self, prompt: &str) -> Result<(), SurfaceError>;
    fn end_input(&mut self);

    fn render_file_tree(&mut self, nodes: &[FileNode]);
    fn show_identity(&mut self, email: &str);
    fn set_files_enabled(&mut self, enabled: bool);
    fn set_run_locked(&mut self, locked: bool);
    fn set_save_locked(&mut self, locked: bool);
    /// `None` hides the current-file display.
    fn show_current_file(&mut self, path: Option<&str>);
    fn clear_credentials(&mut self);
    fn offer_download(&mut self, path: &str, content: &[u8]);
}

/// The text-editing widget.
pub trait Editor {
    fn contents(&self) -> String;
    fn set_contents(&mut self, text: &str);
    fn set_read_only(&mut self, read_only: bool);
}

//! Surface and editor that record what they were told, for tests and
//! headless use.

use super::{Editor, NoticeKind, Surface, SurfaceError};
use crate::session::FileNode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    ConnectionError(String),
    Alert(String),
    Notify(NoticeKind, String),
    ClearOutput,
    BeginInput(String),
    EndInput,
    RenderTree(Vec<FileNode>),
    Identity(String),
    FilesEnabled(bool),
    RunLocked(bool),
    SaveLocked(bool),
    CurrentFile(Option<String>),
    ClearCredentials,
    Download(String, Vec<u8>),
}

#[derive(Debug, Default)]
pub struct RecordingSurface {
    calls: Vec<SurfaceCall>,
    output: String,
    refuse_input: bool,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `begin_input` fail.
    pub fn refusing_input() -> Self {
        Self {
            refuse_input: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> &[SurfaceCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<SurfaceCall> {
        std::mem::take(&mut self.calls)
    }

    /// Everything written to the output area since the last clear,
    /// prompts included.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn alerts(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Alert(message) => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<(NoticeKind, &str)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Notify(kind, message) => Some((*kind, message.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn connection_errors(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, SurfaceCall::ConnectionError(_)))
            .count()
    }

    /// Most recent lock state pushed for the run affordance.
    pub fn run_locked(&self) -> Option<bool> {
        self.calls.iter().rev().find_map(|call| match call {
            SurfaceCall::RunLocked(locked) => Some(*locked),
            _ => None,
        })
    }

    pub fn save_locked(&self) -> Option<bool> {
        self.calls.iter().rev().find_map(|call| match call {
            SurfaceCall::SaveLocked(locked) => Some(*locked),
            _ => None,
        })
    }

    pub fn last_tree(&self) -> Option<&[FileNode]> {
        self.calls.iter().rev().find_map(|call| match call {
            SurfaceCall::RenderTree(nodes) => Some(nodes.as_slice()),
            _ => None,
        })
    }
}

impl Surface for RecordingSurface {
    fn show_connection_error(&mut self, message: &str) {
        self.calls.push(SurfaceCall::ConnectionError(message.to_string()));
    }

    fn alert(&mut self, message: &str) {
        self.calls.push(SurfaceCall::Alert(message.to_string()));
    }

    fn notify(&mut self, kind: NoticeKind, message: &str) {
        self.calls.push(SurfaceCall::Notify(kind, message.to_string()));
    }

    fn clear_output(&mut self) {
        self.output.clear();
        self.calls.push(SurfaceCall::ClearOutput);
    }

    fn write_output(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn begin_input(&mut self, prompt: &str) -> Result<(), SurfaceError> {
        if self.refuse_input {
            return Err(SurfaceError::InputUnavailable("input disabled".into()));
        }
        self.output.push_str(prompt);
        self.calls.push(SurfaceCall::BeginInput(prompt.to_string()));
        Ok(())
    }

    fn end_input(&mut self) {
        self.calls.push(SurfaceCall::EndInput);
    }

    fn render_file_tree(&mut self, nodes: &[FileNode]) {
        self.calls.push(SurfaceCall::RenderTree(nodes.to_vec()));
    }

    fn show_identity(&mut self, email: &str) {
        self.calls.push(SurfaceCall::Identity(email.to_string()));
    }

    fn set_files_enabled(&mut self, enabled: bool) {
        self.calls.push(SurfaceCall::FilesEnabled(enabled));
    }

    fn set_run_locked(&mut self, locked: bool) {
        self.calls.push(SurfaceCall::RunLocked(locked));
    }

    fn set_save_locked(&mut self, locked: bool) {
        self.calls.push(SurfaceCall::SaveLocked(locked));
    }

    fn show_current_file(&mut self, path: Option<&str>) {
        self.calls
            .push(SurfaceCall::CurrentFile(path.map(str::to_string)));
    }

    fn clear_credentials(&mut self) {
        self.calls.push(SurfaceCall::ClearCredentials);
    }

    fn offer_download(&mut self, path: &str, content: &[u8]) {
        self.calls
            .push(SurfaceCall::Download(path.to_string(), content.to_vec()));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryEditor {
    pub text: String,
    pub read_only: bool,
}

impl MemoryEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            read_only: false,
        }
    }
}

impl Editor for MemoryEditor {
    fn contents(&self) -> String {
        self.text.clone()
    }

    fn set_contents(&mut self, text: &str) {
        self.text = text.to_string();
    }

    fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }
}

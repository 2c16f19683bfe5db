//! One-shot suspension point for a running program's read of a line.

use codebox_proto::ClientCommand;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInputRequest {
    pub prompt: String,
}

/// Result of committing a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputCommit {
    /// Static text that replaces the caret region.
    pub echo: String,
    pub reply: ClientCommand,
    /// Output that arrived while the request was pending.
    pub flushed: String,
}

#[derive(Debug, Default)]
pub struct InputBridge {
    pending: Option<PendingInputRequest>,
    deferred: String,
}

impl InputBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&PendingInputRequest> {
        self.pending.as_ref()
    }

    /// Starts waiting for a line. Returns the request it displaced, if any.
    pub fn open(&mut self, prompt: impl Into<String>) -> Option<PendingInputRequest> {
        self.pending.replace(PendingInputRequest {
            prompt: prompt.into(),
        })
    }

    /// Passes `chunk` through when nothing is pending, otherwise holds it
    /// until the line is committed.
    pub fn route_output(&mut self, chunk: &str) -> Option<String> {
        if self.pending.is_some() {
            self.deferred.push_str(chunk);
            None
        } else {
            Some(chunk.to_string())
        }
    }

    /// Resumes the suspended exchange exactly once.
    pub fn commit(&mut self, line: &str) -> Option<InputCommit> {
        self.pending.take()?;
        Some(InputCommit {
            echo: format!("{line}\n"),
            reply: ClientCommand::InputReply {
                line: Some(line.to_string()),
            },
            flushed: std::mem::take(&mut self.deferred),
        })
    }

    /// Tears the request down without a reply. Returns any deferred output.
    pub fn abort(&mut self) -> Option<String> {
        self.pending.take()?;
        Some(std::mem::take(&mut self.deferred))
    }
}

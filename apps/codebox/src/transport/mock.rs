use super::{ConnectionError, FrameSink};

/// Sink that records frames instead of sending them.
#[derive(Debug, Clone)]
pub struct RecordingSink {
    open: bool,
    frames: Vec<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            open: true,
            frames: Vec::new(),
        }
    }

    pub fn set_open(&mut self, open: bool) {
        self.open = open;
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn take_frames(&mut self) -> Vec<String> {
        std::mem::take(&mut self.frames)
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for RecordingSink {
    fn send_frame(&mut self, frame: String) -> Result<(), ConnectionError> {
        if !self.open {
            return Err(ConnectionError::NotConnected);
        }
        self.frames.push(frame);
        Ok(())
    }
}

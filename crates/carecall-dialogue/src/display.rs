//! Console transcript of the interview, kept separate from tracing output.

use crate::message::{DialogueMessage, Role};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing::warn;

pub const DEFAULT_WELCOME: &str =
    "안녕하세요, 저는 담당 의사입니다. 먼저 증상과 성별, 나이를 알려주시겠어요? (예: '저는 두통이 있어요. 여성, 30대')";

/// Labels and fixed lines printed around the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayConfig {
    pub assistant_label: String,
    pub user_label: String,
    pub welcome: String,
    pub listening_cue: String,
    pub closing: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            assistant_label: "의사".to_string(),
            user_label: "환자".to_string(),
            welcome: DEFAULT_WELCOME.to_string(),
            listening_cue: "녹음 시작...".to_string(),
            closing: "대화를 종료합니다.".to_string(),
        }
    }
}

/// Writes speaker-prefixed lines to a sink. Write failures are logged and ignored.
pub struct ConsoleDisplay {
    config: DisplayConfig,
    out: Box<dyn Write + Send>,
}

impl ConsoleDisplay {
    pub fn new(config: DisplayConfig, out: Box<dyn Write + Send>) -> Self {
        Self { config, out }
    }

    pub fn stdout() -> Self {
        Self::new(DisplayConfig::default(), Box::new(io::stdout()))
    }

    /// Discards everything; used when no display is attached.
    pub fn sink() -> Self {
        Self::new(DisplayConfig::default(), Box::new(io::sink()))
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    pub fn welcome(&mut self) {
        let line = format!("{}: {}", self.config.assistant_label, self.config.welcome);
        self.line(&line);
    }

    pub fn turn_header(&mut self, turn: usize) {
        let line = format!("\n\n ===== {}번째 대화 =====", turn);
        self.line(&line);
    }

    pub fn listening(&mut self) {
        let cue = self.config.listening_cue.clone();
        self.line(&cue);
    }

    /// Print a user or assistant message with its speaker label. System messages are not shown.
    pub fn message(&mut self, message: &DialogueMessage) {
        let label = match message.role() {
            Role::Assistant => &self.config.assistant_label,
            Role::User => &self.config.user_label,
            Role::System => return,
        };
        let line = format!("{}: {}", label, message.content());
        self.line(&line);
    }

    pub fn closing(&mut self) {
        let closing = self.config.closing.clone();
        self.line(&closing);
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text).and_then(|_| self.out.flush()) {
            warn!("Failed to write console output: {}", e);
        }
    }
}

impl Default for ConsoleDisplay {
    fn default() -> Self {
        Self::stdout()
    }
}

/// Cloneable in-memory sink, so a caller can read back what a `ConsoleDisplay` printed.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        match self.inner.lock() {
            Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut buf = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "console buffer poisoned"))?;
        buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_prefixes_and_fixed_lines() {
        let buffer = SharedBuffer::new();
        let mut display = ConsoleDisplay::new(DisplayConfig::default(), Box::new(buffer.clone()));

        display.welcome();
        display.turn_header(1);
        display.message(&DialogueMessage::user("저는 두통이 있어요"));
        display.message(&DialogueMessage::assistant("성별과 나이를 알려주세요"));
        display.message(&DialogueMessage::system("hidden prompt"));
        display.closing();

        let out = buffer.contents();
        assert!(out.starts_with("의사: 안녕하세요"));
        assert!(out.contains(" ===== 1번째 대화 =====\n"));
        assert!(out.contains("환자: 저는 두통이 있어요\n"));
        assert!(out.contains("의사: 성별과 나이를 알려주세요\n"));
        assert!(!out.contains("hidden prompt"));
        assert!(out.ends_with("대화를 종료합니다.\n"));
    }

    #[test]
    fn custom_labels() {
        let buffer = SharedBuffer::new();
        let config = DisplayConfig {
            assistant_label: "Doctor".into(),
            user_label: "Patient".into(),
            ..DisplayConfig::default()
        };
        let mut display = ConsoleDisplay::new(config, Box::new(buffer.clone()));
        display.message(&DialogueMessage::user("hi"));
        assert_eq!(buffer.contents(), "Patient: hi\n");
    }
}

//! Load diagnostics
//!
//! Per-glyph and decompression problems do not abort a font load. Each parse
//! stage returns a [`ParseOutcome`] carrying its value plus the messages it
//! produced, and the loader folds them into the `TypeFace` message log.

use std::fmt;

/// Message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
}

/// A recorded load message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub severity: Severity,
    pub text: String,
}

impl Message {
    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Warning => write!(f, "[WARN] {}", self.text),
            Severity::Error => write!(f, "[ERROR] {}", self.text),
        }
    }
}

/// Value produced by a parse stage plus the messages it raised
#[derive(Debug, Clone)]
pub struct ParseOutcome<T> {
    pub value: T,
    pub messages: Vec<Message>,
}

impl<T> ParseOutcome<T> {
    /// Outcome without messages
    pub fn clean(value: T) -> Self {
        Self {
            value,
            messages: Vec::new(),
        }
    }

    pub fn with_messages(value: T, messages: Vec<Message>) -> Self {
        Self { value, messages }
    }

    /// Record a warning and mirror it to the log
    pub fn warn(&mut self, text: impl Into<String>) {
        let message = Message::warning(text);
        tracing::warn!("{}", message.text);
        self.messages.push(message);
    }

    /// Record an error and mirror it to the log
    pub fn error(&mut self, text: impl Into<String>) {
        let message = Message::error(text);
        tracing::error!("{}", message.text);
        self.messages.push(message);
    }

    /// Move this outcome's messages into `sink` and return the value
    pub fn drain_into(self, sink: &mut Vec<Message>) -> T {
        sink.extend(self.messages);
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParseOutcome<U> {
        ParseOutcome {
            value: f(self.value),
            messages: self.messages,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(Message::is_error)
    }
}

use std::fmt::Display;
#[cfg(test)]
use std::{cell::RefCell, rc::Rc};

/// A recoverable condition reported to the user without stopping the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.line, self.message)
    }
}

/// Receiver for diagnostics emitted while translating.
pub trait DiagSink {
    fn report(&mut self, diag: Diagnostic);
}

/// Default sink: forwards through the log facade.
pub struct LogSink;

impl DiagSink for LogSink {
    fn report(&mut self, diag: Diagnostic) {
        log::warn!("{}", diag);
    }
}

/// Buffers diagnostics for later inspection; clones share the buffer.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub(crate) struct CollectSink(Rc<RefCell<Vec<Diagnostic>>>);

#[cfg(test)]
impl CollectSink {
    pub fn take(&self) -> Vec<Diagnostic> {
        self.0.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

#[cfg(test)]
impl DiagSink for CollectSink {
    fn report(&mut self, diag: Diagnostic) {
        self.0.borrow_mut().push(diag);
    }
}

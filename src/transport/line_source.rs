//! Trait abstraction for the decoded-line transport to enable testing

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Source of decoded telemetry text lines.
///
/// The pipeline never opens or configures the physical device; it is handed
/// an already-open line source. Errors surface as
/// [`crate::error::SensorBridgeError::Transport`].
#[async_trait]
pub trait LineSource: Send {
    /// Read the next complete line, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when no complete line arrived within the timeout
    /// (a partial line stays buffered for the next call).
    async fn read_line(&mut self, timeout: Duration) -> Result<Option<String>>;

    /// Whether at least one more line is likely ready without waiting
    fn has_data(&self) -> bool;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::error::SensorBridgeError;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Mock line source fed from a scripted list of lines
    #[derive(Clone)]
    pub struct MockLineSource {
        pub lines: Arc<Mutex<VecDeque<String>>>,
        pub read_error: Arc<Mutex<Option<String>>>,
    }

    impl MockLineSource {
        pub fn new<I, S>(lines: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                lines: Arc::new(Mutex::new(lines.into_iter().map(Into::into).collect())),
                read_error: Arc::new(Mutex::new(None)),
            }
        }

        pub fn push_line(&self, line: impl Into<String>) {
            self.lines.lock().unwrap().push_back(line.into());
        }

        /// Inject one transport error, returned by the next `read_line` call
        pub fn set_read_error(&self, message: impl Into<String>) {
            *self.read_error.lock().unwrap() = Some(message.into());
        }
    }

    #[async_trait]
    impl LineSource for MockLineSource {
        async fn read_line(&mut self, _timeout: Duration) -> Result<Option<String>> {
            if let Some(message) = self.read_error.lock().unwrap().take() {
                return Err(SensorBridgeError::Transport(message));
            }
            Ok(self.lines.lock().unwrap().pop_front())
        }

        fn has_data(&self) -> bool {
            !self.lines.lock().unwrap().is_empty()
        }
    }
}

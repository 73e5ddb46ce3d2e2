/*!
 * Wait Types
 */

use crate::abi::HandleSignalsState;
use crate::core::errors::{IpcError, ResultCode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A successful wait: which handle became ready, and every watched state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitReady {
    pub index: usize,
    pub states: Vec<HandleSignalsState>,
}

/// A failed wait
///
/// `index` names the handle that decided the outcome; it is `None` for
/// deadline expiry and argument errors. `states` holds what could be read
/// for each watched handle (never-signaling for unresolvable ones).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitError {
    pub error: IpcError,
    pub index: Option<usize>,
    pub states: Vec<HandleSignalsState>,
}

impl WaitError {
    pub(crate) fn new(
        error: IpcError,
        index: Option<usize>,
        states: Vec<HandleSignalsState>,
    ) -> Self {
        Self {
            error,
            index,
            states,
        }
    }

    pub fn code(&self) -> ResultCode {
        self.error.code()
    }
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "wait failed on handle #{}: {}", index, self.error),
            None => write!(f, "wait failed: {}", self.error),
        }
    }
}

impl std::error::Error for WaitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<WaitError> for IpcError {
    fn from(err: WaitError) -> Self {
        err.error
    }
}

pub type WaitResult = Result<WaitReady, WaitError>;

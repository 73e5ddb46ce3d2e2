/*!
 * Error Types
 * Result codes shared with the native call boundary and the engine error type
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine operation result
///
/// # Must Use
/// IPC operations can fail and must be handled; the engine never retries on its own
pub type IpcResult<T> = Result<T, IpcError>;

/// Raw result code as it crosses the foreign call boundary
///
/// Values match the native runtime exactly: 0 is success, failures are negative.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    Ok = 0,
    Cancelled = -1,
    Unknown = -2,
    InvalidArgument = -3,
    DeadlineExceeded = -4,
    NotFound = -5,
    AlreadyExists = -6,
    PermissionDenied = -7,
    ResourceExhausted = -8,
    FailedPrecondition = -9,
    Aborted = -10,
    OutOfRange = -11,
    Unimplemented = -12,
    Internal = -13,
    Unavailable = -14,
    DataLoss = -15,
    Busy = -16,
    ShouldWait = -17,
}

impl ResultCode {
    /// Decode a raw value received from the call boundary
    pub const fn from_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            0 => Self::Ok,
            -1 => Self::Cancelled,
            -2 => Self::Unknown,
            -3 => Self::InvalidArgument,
            -4 => Self::DeadlineExceeded,
            -5 => Self::NotFound,
            -6 => Self::AlreadyExists,
            -7 => Self::PermissionDenied,
            -8 => Self::ResourceExhausted,
            -9 => Self::FailedPrecondition,
            -10 => Self::Aborted,
            -11 => Self::OutOfRange,
            -12 => Self::Unimplemented,
            -13 => Self::Internal,
            -14 => Self::Unavailable,
            -15 => Self::DataLoss,
            -16 => Self::Busy,
            -17 => Self::ShouldWait,
            _ => return None,
        })
    }

    #[inline(always)]
    pub const fn into_raw(self) -> i32 {
        self as i32
    }

    #[inline(always)]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Convert to an engine result, attaching `context` to any failure
    pub fn into_result(self, context: impl Into<String>) -> IpcResult<()> {
        let context = context.into();
        match self {
            Self::Ok => Ok(()),
            Self::Cancelled => Err(IpcError::Cancelled(context)),
            Self::Unknown => Err(IpcError::Unknown(context)),
            Self::InvalidArgument => Err(IpcError::InvalidArgument(context)),
            Self::DeadlineExceeded => Err(IpcError::DeadlineExceeded(context)),
            Self::NotFound => Err(IpcError::NotFound(context)),
            Self::AlreadyExists => Err(IpcError::AlreadyExists(context)),
            Self::PermissionDenied => Err(IpcError::PermissionDenied(context)),
            Self::ResourceExhausted => Err(IpcError::ResourceExhausted(context)),
            Self::FailedPrecondition => Err(IpcError::FailedPrecondition(context)),
            Self::Aborted => Err(IpcError::Aborted(context)),
            Self::OutOfRange => Err(IpcError::OutOfRange(context)),
            Self::Unimplemented => Err(IpcError::Unimplemented(context)),
            Self::Internal => Err(IpcError::Internal(context)),
            Self::Unavailable => Err(IpcError::Unavailable(context)),
            Self::DataLoss => Err(IpcError::DataLoss(context)),
            Self::Busy => Err(IpcError::Busy(context)),
            Self::ShouldWait => Err(IpcError::ShouldWait(context)),
        }
    }
}

impl<T> From<&IpcResult<T>> for ResultCode {
    fn from(result: &IpcResult<T>) -> Self {
        match result {
            Ok(_) => ResultCode::Ok,
            Err(e) => e.code(),
        }
    }
}

impl From<&IpcError> for ResultCode {
    fn from(err: &IpcError) -> Self {
        err.code()
    }
}

/// Unified engine error type with miette diagnostics
///
/// One variant per non-success result code. The payload is human context only;
/// callers branch on the variant (or on [`IpcError::code`]).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum IpcError {
    #[error("Operation cancelled: {0}")]
    #[diagnostic(
        code(ipc::cancelled),
        help("A handle involved in the operation was closed while it was pending.")
    )]
    Cancelled(String),

    #[error("Unknown failure: {0}")]
    #[diagnostic(code(ipc::unknown))]
    Unknown(String),

    #[error("Invalid argument: {0}")]
    #[diagnostic(
        code(ipc::invalid_argument),
        help("Check handle values, flags, sizes and option records passed to the call.")
    )]
    InvalidArgument(String),

    #[error("Deadline exceeded: {0}")]
    #[diagnostic(
        code(ipc::deadline_exceeded),
        help("No watched handle reached the requested state before the deadline.")
    )]
    DeadlineExceeded(String),

    #[error("Not found: {0}")]
    #[diagnostic(
        code(ipc::not_found),
        help("The handle is unknown to this process. It may have been closed or transferred.")
    )]
    NotFound(String),

    #[error("Already exists: {0}")]
    #[diagnostic(code(ipc::already_exists))]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    #[diagnostic(
        code(ipc::permission_denied),
        help("The handle or mapping does not carry the access rights this operation needs.")
    )]
    PermissionDenied(String),

    #[error("Resource exhausted: {0}")]
    #[diagnostic(
        code(ipc::resource_exhausted),
        help("A configured limit was reached. Close unused handles or raise the limit in IpcConfig.")
    )]
    ResourceExhausted(String),

    #[error("Failed precondition: {0}")]
    #[diagnostic(
        code(ipc::failed_precondition),
        help("The peer endpoint is gone or the requested state can never be reached.")
    )]
    FailedPrecondition(String),

    #[error("Aborted: {0}")]
    #[diagnostic(code(ipc::aborted))]
    Aborted(String),

    #[error("Out of range: {0}")]
    #[diagnostic(
        code(ipc::out_of_range),
        help("The request exceeds what the buffer or pipe can satisfy right now.")
    )]
    OutOfRange(String),

    #[error("Unimplemented: {0}")]
    #[diagnostic(
        code(ipc::unimplemented),
        help("The flag or option is not supported by this engine.")
    )]
    Unimplemented(String),

    #[error("Internal error: {0}")]
    #[diagnostic(
        code(ipc::internal),
        help("An unexpected internal error occurred. Please report this issue.")
    )]
    Internal(String),

    #[error("Unavailable: {0}")]
    #[diagnostic(code(ipc::unavailable))]
    Unavailable(String),

    #[error("Data loss: {0}")]
    #[diagnostic(code(ipc::data_loss))]
    DataLoss(String),

    #[error("Busy: {0}")]
    #[diagnostic(
        code(ipc::busy),
        help("The handle is in the middle of being transferred by another call.")
    )]
    Busy(String),

    #[error("Should wait: {0}")]
    #[diagnostic(
        code(ipc::should_wait),
        help("Not an error: wait for the relevant signal and retry.")
    )]
    ShouldWait(String),
}

impl IpcError {
    /// Result code this error is reported as at the call boundary
    pub const fn code(&self) -> ResultCode {
        match self {
            Self::Cancelled(_) => ResultCode::Cancelled,
            Self::Unknown(_) => ResultCode::Unknown,
            Self::InvalidArgument(_) => ResultCode::InvalidArgument,
            Self::DeadlineExceeded(_) => ResultCode::DeadlineExceeded,
            Self::NotFound(_) => ResultCode::NotFound,
            Self::AlreadyExists(_) => ResultCode::AlreadyExists,
            Self::PermissionDenied(_) => ResultCode::PermissionDenied,
            Self::ResourceExhausted(_) => ResultCode::ResourceExhausted,
            Self::FailedPrecondition(_) => ResultCode::FailedPrecondition,
            Self::Aborted(_) => ResultCode::Aborted,
            Self::OutOfRange(_) => ResultCode::OutOfRange,
            Self::Unimplemented(_) => ResultCode::Unimplemented,
            Self::Internal(_) => ResultCode::Internal,
            Self::Unavailable(_) => ResultCode::Unavailable,
            Self::DataLoss(_) => ResultCode::DataLoss,
            Self::Busy(_) => ResultCode::Busy,
            Self::ShouldWait(_) => ResultCode::ShouldWait,
        }
    }

    /// `ShouldWait` is a retry signal rather than a failure
    #[inline]
    pub const fn is_should_wait(&self) -> bool {
        matches!(self, Self::ShouldWait(_))
    }

    /// Human context attached to the error
    pub fn context(&self) -> &str {
        match self {
            Self::Cancelled(s)
            | Self::Unknown(s)
            | Self::InvalidArgument(s)
            | Self::DeadlineExceeded(s)
            | Self::NotFound(s)
            | Self::AlreadyExists(s)
            | Self::PermissionDenied(s)
            | Self::ResourceExhausted(s)
            | Self::FailedPrecondition(s)
            | Self::Aborted(s)
            | Self::OutOfRange(s)
            | Self::Unimplemented(s)
            | Self::Internal(s)
            | Self::Unavailable(s)
            | Self::DataLoss(s)
            | Self::Busy(s)
            | Self::ShouldWait(s) => s,
        }
    }
}

impl From<serde_json::Error> for IpcError {
    fn from(err: serde_json::Error) -> Self {
        IpcError::InvalidArgument(format!("Malformed configuration: {}", err))
    }
}

impl From<std::io::Error> for IpcError {
    fn from(err: std::io::Error) -> Self {
        IpcError::Unavailable(format!("I/O failure: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ResultCode; 18] = [
        ResultCode::Ok,
        ResultCode::Cancelled,
        ResultCode::Unknown,
        ResultCode::InvalidArgument,
        ResultCode::DeadlineExceeded,
        ResultCode::NotFound,
        ResultCode::AlreadyExists,
        ResultCode::PermissionDenied,
        ResultCode::ResourceExhausted,
        ResultCode::FailedPrecondition,
        ResultCode::Aborted,
        ResultCode::OutOfRange,
        ResultCode::Unimplemented,
        ResultCode::Internal,
        ResultCode::Unavailable,
        ResultCode::DataLoss,
        ResultCode::Busy,
        ResultCode::ShouldWait,
    ];

    #[test]
    fn test_raw_values_match_boundary() {
        assert_eq!(ResultCode::Ok.into_raw(), 0);
        assert_eq!(ResultCode::Cancelled.into_raw(), -1);
        assert_eq!(ResultCode::FailedPrecondition.into_raw(), -9);
        assert_eq!(ResultCode::ShouldWait.into_raw(), -17);
        assert_eq!(ResultCode::from_raw(-18), None);
        assert_eq!(ResultCode::from_raw(1), None);
    }

    #[test]
    fn test_error_code_agrees_with_into_result() {
        for code in ALL {
            assert_eq!(ResultCode::from_raw(code.into_raw()), Some(code));
            match code.into_result("ctx") {
                Ok(()) => assert!(code.is_ok()),
                Err(e) => {
                    assert_eq!(e.code(), code);
                    assert_eq!(e.context(), "ctx");
                }
            }
        }
    }

    #[test]
    fn test_should_wait_helper() {
        assert!(IpcError::ShouldWait("empty".into()).is_should_wait());
        assert!(!IpcError::Busy("x".into()).is_should_wait());
    }

    #[test]
    fn test_error_serializes_tagged() {
        let json = serde_json::to_string(&IpcError::NotFound("handle 7".into())).unwrap();
        assert_eq!(json, r#"{"error":"not_found","details":"handle 7"}"#);
    }
}

//! POSIX-flavored error kinds surfaced by the bridge's filesystem operations.

use std::fmt;

/// Error kinds returned by table, channel, and filesystem-layer operations.
///
/// `Protocol` and `Io` are fatal: any operation that returns one of these
/// should be treated by the caller as grounds to shut the bridge down
/// cleanly rather than merely reporting failure to the dispatcher.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BridgeError {
    NoSuchEntity,
    IsADirectory,
    NotADirectory,
    AccessDenied,
    PermissionDenied,
    BadFileDescriptor,
    NotEmpty,
    NotSupported,
    /// Malformed wire response, unrecognized directive, or violated protocol
    /// invariant. Fatal.
    Protocol,
    /// Closed pipe or other I/O failure talking to the controller. Fatal.
    Io,
}

impl BridgeError {
    /// True for errors that must trigger the bridge's clean-exit path
    /// rather than a plain error return to the calling operation.
    pub fn is_fatal(self) -> bool {
        matches!(self, BridgeError::Protocol | BridgeError::Io)
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BridgeError::NoSuchEntity => "no such file or directory",
            BridgeError::IsADirectory => "is a directory",
            BridgeError::NotADirectory => "not a directory",
            BridgeError::AccessDenied => "access denied",
            BridgeError::PermissionDenied => "permission denied",
            BridgeError::BadFileDescriptor => "bad file descriptor",
            BridgeError::NotEmpty => "directory not empty",
            BridgeError::NotSupported => "operation not supported",
            BridgeError::Protocol => "controller protocol error",
            BridgeError::Io => "controller I/O error",
        };
        f.write_str(s)
    }
}

impl std::error::Error for BridgeError {}

impl From<BridgeError> for libc::c_int {
    fn from(err: BridgeError) -> libc::c_int {
        match err {
            BridgeError::NoSuchEntity => libc::ENOENT,
            BridgeError::IsADirectory => libc::EISDIR,
            BridgeError::NotADirectory => libc::ENOTDIR,
            BridgeError::AccessDenied => libc::EACCES,
            BridgeError::PermissionDenied => libc::EPERM,
            BridgeError::BadFileDescriptor => libc::EBADF,
            BridgeError::NotEmpty => libc::ENOTEMPTY,
            BridgeError::NotSupported => libc::ENOSYS,
            BridgeError::Protocol => libc::EIO,
            BridgeError::Io => libc::EIO,
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(_: std::io::Error) -> BridgeError {
        BridgeError::Io
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

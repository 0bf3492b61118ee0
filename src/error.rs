// This file is part of the sftpio project
//
// Copyright (C) The sftpio authors, 2025. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::message::{Status, StatusCode};

/// Error raised by the SFTP session, its file streams, and its readers.
///
/// Server-reported failures keep their status code and message; everything
/// the client detects locally (bad arguments, disposed objects, framing
/// violations) is raised before any bytes hit the wire.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller supplied an invalid input. Raised before any network I/O.
    #[error("invalid argument: {0}")]
    Argument(&'static str),

    /// The operation was invoked after the object was disposed.
    #[error("the object has been disposed")]
    Disposed,

    /// There is no underlying session, or the session has terminated.
    #[error("the connection is closed")]
    ConnectionClosed,

    /// The server reported `SSH_FX_NO_SUCH_FILE` for the given path.
    #[error("{message}")]
    PathNotFound { path: String, message: String },

    /// The server reported `SSH_FX_PERMISSION_DENIED`.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Any other non-OK server status.
    #[error("sftp error {code}: {message}")]
    Sftp { code: u32, message: String },

    /// Framing violation, unknown message type, or a response id that does
    /// not belong to any pending request. Fatal for the session.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The operation exceeded the configured timeout. The pending request
    /// stays registered; its eventual response is dropped.
    #[error("the operation timed out")]
    Timeout,

    /// The caller's cancellation signal fired while waiting.
    #[error("the operation was cancelled")]
    Cancelled,

    /// The operation needs an extension the server did not advertise, or a
    /// capability the stream does not have (seek on a non-seekable stream,
    /// read on a write-only stream).
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    /// Stream-level I/O misuse, such as seeking before the beginning.
    #[error("{0}")]
    Io(String),
}

impl Error {
    /// Map a server `STATUS` response to an error, attaching the client's
    /// requested path to `NO_SUCH_FILE` failures when one is known.
    pub(crate) fn from_status(status: &Status, path: Option<&str>) -> Self {
        let message = status.message();

        match StatusCode::try_from(status.code) {
            Ok(StatusCode::PermissionDenied) => Error::PermissionDenied(message),
            Ok(StatusCode::NoSuchFile) => {
                let (path, message) = match path {
                    Some(p) if !message.ends_with('.') => {
                        (p.to_string(), format!("{message} Path: '{p}'."))
                    }
                    Some(p) => (p.to_string(), message),
                    None => (String::new(), message),
                };
                Error::PathNotFound { path, message }
            }
            _ => Error::Sftp {
                code: status.code,
                message,
            },
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value.to_string())
    }
}

impl From<russh::Error> for Error {
    fn from(value: russh::Error) -> Self {
        match value {
            russh::Error::ChannelOpenFailure(_) | russh::Error::Disconnect => {
                Error::ConnectionClosed
            }
            russh::Error::IO(io) => io.into(),
            other => Error::Io(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Status;

    fn status(code: u32, error: &'static str) -> Status {
        Status {
            code,
            error: error.into(),
            language: "en".into(),
        }
    }

    #[test]
    fn permission_denied_keeps_server_message() {
        let err = Error::from_status(&status(3, "no way"), Some("/tmp/x"));
        match err {
            Error::PermissionDenied(msg) => assert_eq!(msg, "no way"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn no_such_file_appends_path_once() {
        let err = Error::from_status(&status(2, "No such file"), Some("/a/b"));
        match err {
            Error::PathNotFound { path, message } => {
                assert_eq!(path, "/a/b");
                assert_eq!(message, "No such file Path: '/a/b'.");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // A message that already ends with a period is left alone.
        let err = Error::from_status(&status(2, "File is gone."), Some("/a/b"));
        match err {
            Error::PathNotFound { message, .. } => assert_eq!(message, "File is gone."),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_code_stringifies() {
        let err = Error::from_status(&status(77, ""), None);
        match err {
            Error::Sftp { code, message } => {
                assert_eq!(code, 77);
                assert_eq!(message, "77");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn default_messages_for_known_codes() {
        for (code, expected) in [
            (4, "An error occurred, but no specific error code exists to describe the failure."),
            (5, "A badly formatted packet or other protocol incompatibility was detected."),
            (8, "An attempted operation could not be completed by the server."),
        ] {
            let err = Error::from_status(&status(code, ""), None);
            match err {
                Error::Sftp { message, .. } => assert_eq!(message, expected),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }
}

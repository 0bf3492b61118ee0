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

//! Async SFTP version 3 client core.
//!
//! One [`SftpSession`] multiplexes any number of concurrent requests over
//! a single SSH channel, correlating responses by request id. On top of
//! the session sit [`SftpFileStream`] — a seekable, buffered byte stream
//! over a remote handle — and [`PipelinedReader`], a bounded window of
//! in-flight reads that keeps transfers fast over high-latency links.
//!
//! # Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # struct ClientHandler;
//! # #[async_trait::async_trait]
//! # impl russh::client::Handler for ClientHandler {
//! #     type Error = russh::Error;
//! # }
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use sftpio::{FileAccess, FileMode, SessionConfig, SftpSession};
//!
//! let config = Arc::new(russh::client::Config::default());
//! let mut ssh = russh::client::connect(config, ("localhost", 22), ClientHandler).await?;
//! ssh.authenticate_password("user", "pass").await?;
//!
//! let sftp = SftpSession::connect_with(&ssh, SessionConfig::default()).await?;
//! println!("cwd: {}", sftp.working_directory());
//!
//! let mut file = sftp
//!     .open_file("notes.txt", FileMode::Open, FileAccess::READ)
//!     .await?;
//! let mut buf = vec![0u8; 4096];
//! let n = file.read(&mut buf).await?;
//! println!("read {n} bytes");
//! file.close().await?;
//! # Ok(())
//! # }
//! ```

mod decode;
mod encode;
mod error;

pub mod message;
pub mod session;

pub use error::Error;
pub use message::{FileAttributes, Handle, Name, NameEntry, StatVfs, Status, StatusCode};
pub use session::{
    DirEntry, FileAccess, FileMode, IntoSftpStream, PipelinedReader, SeekOrigin, SessionConfig,
    SftpDir, SftpFileStream, SftpFuture, SftpSession,
};

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

//! The SFTP session: a full-duplex request/response multiplexer riding on
//! one SSH channel.
//!
//! See [`SftpSession`].

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use russh::client::Msg;
use russh::{Channel, ChannelStream};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::message::{Init, Message, Version};
use crate::Error;

mod blocking;
mod commands;
mod dir;
mod file;
mod pending;
mod reader;
mod receiver;

pub use dir::{DirEntry, SftpDir};
pub use file::{FileAccess, FileMode, SeekOrigin, SftpFileStream};
pub use reader::PipelinedReader;

use pending::{Pending, ResponseSlot};

/// An eagerly-issued SFTP operation: the request is on the wire before the
/// future is returned, so callers may hold several and await them in any
/// order. Dropping the future abandons the wait but leaves the request
/// registered; its eventual response is discarded.
pub type SftpFuture<T = ()> = BoxFuture<'static, Result<T, Error>>;

/// Session-level tuning, fixed at connect time.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Per-round-trip timeout. Exceeding it fails the waiting caller but
    /// leaves the session usable.
    pub timeout: Duration,
    /// Largest SSH channel packet the local side accepts; bounds how much
    /// data one `SSH_FXP_READ` may ask for.
    pub local_packet_size: u32,
    /// Largest SSH channel packet the remote side accepts; bounds how much
    /// data one `SSH_FXP_WRITE` may carry.
    pub remote_packet_size: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            local_packet_size: 0x8000,
            remote_packet_size: 0x8000,
        }
    }
}

struct SessionInfo {
    version: u32,
    extensions: Vec<(String, String)>,
}

/// An SFTP v3 client session.
///
/// Cheap to clone; all clones share the channel, the request-id space and
/// the working directory. The session multiplexes concurrent requests over
/// the channel and correlates responses by request id, so responses may
/// complete in any order — each one reaches exactly the caller that issued
/// its request.
#[derive(Clone)]
pub struct SftpSession {
    outbound: mpsc::UnboundedSender<Bytes>,
    pending: Arc<Pending>,
    info: Arc<SessionInfo>,
    working_dir: Arc<RwLock<String>>,
    config: SessionConfig,
    runtime: tokio::runtime::Handle,
}

impl SftpSession {
    /// Open a session over an established byte stream (typically a
    /// [`ChannelStream`] with the `sftp` subsystem already started).
    ///
    /// Performs the version handshake — `SSH_FXP_INIT` at version 3,
    /// validation of the server's `SSH_FXP_VERSION` — then resolves the
    /// initial working directory with `REALPATH(".")`.
    pub async fn connect<S>(mut stream: S, config: SessionConfig) -> Result<Self, Error>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        receiver::write_message(
            &mut stream,
            &Message::Init(Init {
                version: 3,
                extensions: Vec::new(),
            }),
            0,
        )
        .await?;

        let version = match tokio::time::timeout(config.timeout, receiver::read_message(&mut stream))
            .await
        {
            Ok(Ok((_, Message::Version(version)))) => version,
            Ok(Ok(_)) => return Err(Error::Protocol("expected a version response".into())),
            Ok(Err(err)) => return Err(err),
            Err(_) => return Err(Error::Timeout),
        };
        let info = Self::validate_version(version)?;

        let pending = Arc::new(Pending::new());
        let (outbound, rx) = mpsc::unbounded_channel();
        tokio::spawn(receiver::run(stream, rx, pending.clone()));

        let session = Self {
            outbound,
            pending,
            info: Arc::new(info),
            working_dir: Arc::new(RwLock::new(String::from("/"))),
            config,
            runtime: tokio::runtime::Handle::current(),
        };

        let working_dir = session.realpath(".").await?;
        *session.working_dir_mut() = working_dir;

        Ok(session)
    }

    /// Open a session over anything convertible to an SFTP byte stream:
    /// a [`Channel<Msg>`], a [`ChannelStream<Msg>`] or an authenticated
    /// [`russh::client::Handle`].
    pub async fn connect_with<T: IntoSftpStream>(
        ssh: T,
        config: SessionConfig,
    ) -> Result<Self, Error> {
        Self::connect(ssh.into_sftp_stream().await?, config).await
    }

    fn validate_version(version: Version) -> Result<SessionInfo, Error> {
        if version.version == 0 || version.version > 3 {
            return Err(Error::Protocol(format!(
                "server negotiated unsupported protocol version {}",
                version.version
            )));
        }

        let extensions = version
            .extensions
            .into_iter()
            .map(|ext| {
                (
                    String::from_utf8_lossy(&ext.name).into_owned(),
                    String::from_utf8_lossy(&ext.data).into_owned(),
                )
            })
            .collect();

        Ok(SessionInfo {
            version: version.version,
            extensions,
        })
    }

    /// The protocol version agreed at handshake, in `1..=3`.
    pub fn version(&self) -> u32 {
        self.info.version
    }

    /// The extensions advertised by the server's `VERSION` response, in
    /// the order they were sent.
    pub fn extensions(&self) -> &[(String, String)] {
        &self.info.extensions
    }

    pub(crate) fn supports_extension(&self, name: &str) -> bool {
        self.info.extensions.iter().any(|(n, _)| n == name)
    }

    /// The working directory, as resolved server-side at connect or by the
    /// last [`change_directory`](Self::change_directory).
    pub fn working_directory(&self) -> String {
        self.working_dir().clone()
    }

    fn working_dir(&self) -> RwLockReadGuard<'_, String> {
        self.working_dir
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn working_dir_mut(&self) -> RwLockWriteGuard<'_, String> {
        self.working_dir
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether the channel is still usable.
    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }

    /// Tear the session down: the I/O task closes the stream and every
    /// outstanding request completes with a connection-closed error.
    pub fn stop(&self) {
        let _ = self.outbound.send(Bytes::new());
    }

    /// Resolve `path` relative to the working directory and verify
    /// server-side that it names a listable directory.
    pub async fn change_directory(&self, path: &str) -> Result<(), Error> {
        let canonical = self.canonical_path(path).await?;
        let handle = self.opendir(canonical.clone()).await?;
        self.close(handle).await?;
        *self.working_dir_mut() = canonical;
        Ok(())
    }

    /// The server's absolute rendering of `path`.
    ///
    /// Relative paths are joined onto the working directory first. When the
    /// server refuses to resolve the full path (typically because the leaf
    /// does not exist yet), the parent is resolved instead and the leaf
    /// re-appended; failing even that, the joined path is returned as-is.
    pub async fn canonical_path(&self, path: &str) -> Result<String, Error> {
        if path.is_empty() {
            return Err(Error::Argument("path"));
        }

        let full = if path.starts_with('/') {
            path.to_string()
        } else {
            let base = self.working_directory();
            if base.ends_with('/') {
                format!("{base}{path}")
            } else {
                format!("{base}/{path}")
            }
        };

        if let Some(canonical) = self.realpath_or_none(&full).await {
            return Ok(canonical);
        }

        if full.ends_with("/.") || full.ends_with("/..") || full == "/" || !full.contains('/') {
            return Ok(full);
        }

        let (parent, leaf) = match full.rsplit_once('/') {
            Some(("", leaf)) => ("/", leaf),
            Some(split) => split,
            None => return Ok(full),
        };

        match self.realpath_or_none(parent).await {
            Some(parent) if parent.ends_with('/') => Ok(format!("{parent}{leaf}")),
            Some(parent) => Ok(format!("{parent}/{leaf}")),
            None => Ok(full),
        }
    }

    /// `REALPATH` that swallows server errors.
    async fn realpath_or_none(&self, path: &str) -> Option<String> {
        self.realpath(path).await.ok()
    }

    /// Bytes worth asking for per `SSH_FXP_READ` so that one data response
    /// still fits in one channel packet: 13 bytes cover the frame length,
    /// type, id and data-length fields.
    pub fn optimal_read_length(&self, buffer_size: u32) -> u32 {
        buffer_size
            .min(self.config.local_packet_size)
            .saturating_sub(13)
    }

    /// Bytes worth carrying per `SSH_FXP_WRITE`: 25 bytes of fixed header
    /// fields plus the handle length.
    pub fn optimal_write_length(&self, buffer_size: u32, handle_length: u32) -> u32 {
        buffer_size
            .min(self.config.remote_packet_size)
            .saturating_sub(25 + handle_length)
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Encode `message` under a fresh request id, register the completion
    /// slot, and hand the frame to the I/O task. The slot is registered
    /// before the frame leaves, so the response can never miss it; the
    /// send path takes no lock the receive path holds.
    pub(crate) fn issue(&self, message: &Message) -> Result<ResponseSlot, Error> {
        if self.outbound.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let id = self.pending.next_request_id();
        let frame = message.encode(id)?;
        let rx = self.pending.register(id);

        if self.outbound.send(frame).is_err() {
            self.pending.discard(id);
            return Err(Error::ConnectionClosed);
        }

        Ok(ResponseSlot::new(rx, self.config.timeout))
    }
}

impl std::fmt::Debug for SftpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SftpSession")
            .field("version", &self.info.version)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Conversion into the byte stream an [`SftpSession`] runs on.
#[async_trait]
pub trait IntoSftpStream {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static;
    async fn into_sftp_stream(self) -> Result<Self::Stream, Error>;
}

#[async_trait]
impl IntoSftpStream for ChannelStream<Msg> {
    type Stream = ChannelStream<Msg>;
    async fn into_sftp_stream(self) -> Result<Self::Stream, Error> {
        Ok(self)
    }
}

#[async_trait]
impl IntoSftpStream for Channel<Msg> {
    type Stream = ChannelStream<Msg>;
    async fn into_sftp_stream(self) -> Result<Self::Stream, Error> {
        // Start the SFTP subsystem on the channel.
        self.request_subsystem(false, "sftp").await?;
        Ok(self.into_stream())
    }
}

#[async_trait]
impl<H: russh::client::Handler> IntoSftpStream for &russh::client::Handle<H> {
    type Stream = ChannelStream<Msg>;
    async fn into_sftp_stream(self) -> Result<Self::Stream, Error> {
        self.channel_open_session().await?.into_sftp_stream().await
    }
}

#[async_trait]
impl<H: russh::client::Handler> IntoSftpStream for russh::client::Handle<H> {
    type Stream = ChannelStream<Msg>;
    async fn into_sftp_stream(self) -> Result<Self::Stream, Error> {
        (&self).into_sftp_stream().await
    }
}

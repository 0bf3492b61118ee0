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

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::message::Message;
use crate::Error;

use super::pending::Pending;

/// Largest frame the client will accept. A length prefix beyond this is
/// treated as stream desynchronization rather than a giant packet.
const MAX_FRAME_LENGTH: usize = 8 * 1024 * 1024;

/// Serialize and send one message outside the I/O task. Only used for the
/// version handshake, before the task owns the stream.
pub(crate) async fn write_message<S>(stream: &mut S, message: &Message, id: u32) -> Result<(), Error>
where
    S: AsyncWrite + Unpin,
{
    let frame = message.encode(id)?;
    stream
        .write_all(&frame)
        .await
        .map_err(|_| Error::ConnectionClosed)
}

/// Read exactly one frame and decode it. Only used for the version
/// handshake.
pub(crate) async fn read_message<S>(stream: &mut S) -> Result<(u32, Message), Error>
where
    S: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    stream
        .read_exact(&mut prefix)
        .await
        .map_err(|_| Error::ConnectionClosed)?;

    let frame_length = u32::from_be_bytes(prefix) as usize;
    if frame_length > MAX_FRAME_LENGTH {
        return Err(Error::Protocol("frame length out of bounds".into()));
    }

    let mut frame = BytesMut::with_capacity(4 + frame_length);
    frame.extend_from_slice(&prefix);
    frame.resize(4 + frame_length, 0);
    stream
        .read_exact(&mut frame[4..])
        .await
        .map_err(|_| Error::ConnectionClosed)?;

    let mut frame = frame.freeze();
    Message::decode(&mut frame)
}

/// The session's I/O task: the single writer of the channel and the single
/// reader draining it.
///
/// Outbound frames arrive pre-encoded over `outbound`; an empty frame is
/// the shutdown sentinel. Inbound bytes accumulate in a growable
/// reassembly buffer, since one channel read may carry many frames or a
/// fraction of one. Any fatal condition (stream EOF, framing violation,
/// a response id with no pending request) fails every outstanding request
/// and ends the task.
pub(crate) async fn run<S>(
    stream: S,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    pending: Arc<Pending>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut inbound = BytesMut::with_capacity(32 * 1024);

    let error = loop {
        tokio::select! {
            frame = outbound.recv() => {
                match frame {
                    // Closed channel or the explicit shutdown sentinel.
                    None => break Error::ConnectionClosed,
                    Some(frame) if frame.is_empty() => break Error::ConnectionClosed,
                    Some(frame) => {
                        if let Err(err) = writer.write_all(&frame).await {
                            debug!("sftp channel write failed: {err}");
                            break Error::ConnectionClosed;
                        }
                    }
                }
            }
            read = reader.read_buf(&mut inbound) => {
                match read {
                    Ok(0) => break Error::ConnectionClosed,
                    Ok(_) => {
                        if let Err(err) = drain_frames(&mut inbound, &pending) {
                            warn!("sftp session failed: {err}");
                            break err;
                        }
                    }
                    Err(err) => {
                        debug!("sftp channel read failed: {err}");
                        break Error::ConnectionClosed;
                    }
                }
            }
        }
    };

    // Refuse new requests first, then wake the waiters: a request racing
    // against teardown either fails to enqueue or is woken here.
    outbound.close();
    pending.fail_all(&error);
    let _ = writer.shutdown().await;
}

/// Decode every whole frame sitting in the reassembly buffer and dispatch
/// it to its waiter; leave a partial tail for the next channel read.
fn drain_frames(inbound: &mut BytesMut, pending: &Pending) -> Result<(), Error> {
    loop {
        if inbound.len() < 4 {
            return Ok(());
        }

        let frame_length =
            u32::from_be_bytes([inbound[0], inbound[1], inbound[2], inbound[3]]) as usize;
        if frame_length > MAX_FRAME_LENGTH {
            return Err(Error::Protocol("frame length out of bounds".into()));
        }
        if inbound.len() < 4 + frame_length {
            return Ok(());
        }

        let mut frame = inbound.split_to(4 + frame_length).freeze();
        let (id, message) = Message::decode(&mut frame)?;

        if !pending.complete(id, Ok(message)) {
            return Err(Error::Protocol(format!(
                "invalid response: no pending request with id {id}"
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Data;

    fn data_frame(id: u32) -> Bytes {
        Message::Data(Data(Bytes::from_static(b"abc")))
            .encode(id)
            .expect("encode")
    }

    #[tokio::test]
    async fn drains_every_whole_frame_in_the_buffer() {
        let pending = Pending::new();
        let rx1 = pending.register(1);
        let rx2 = pending.register(2);

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&data_frame(1));
        buf.extend_from_slice(&data_frame(2));

        drain_frames(&mut buf, &pending).expect("two valid frames");
        assert!(buf.is_empty());
        assert!(matches!(rx1.await.expect("completed"), Ok(Message::Data(_))));
        assert!(matches!(rx2.await.expect("completed"), Ok(Message::Data(_))));
    }

    #[tokio::test]
    async fn keeps_a_partial_frame_for_the_next_read() {
        let pending = Pending::new();
        let rx = pending.register(7);

        let frame = data_frame(7);
        let (head, tail) = frame.split_at(5);

        let mut buf = BytesMut::from(head);
        drain_frames(&mut buf, &pending).expect("nothing to drain yet");
        assert_eq!(buf.len(), 5);

        buf.extend_from_slice(tail);
        drain_frames(&mut buf, &pending).expect("frame now whole");
        assert!(buf.is_empty());
        assert!(matches!(rx.await.expect("completed"), Ok(Message::Data(_))));
    }

    #[test]
    fn a_response_without_a_pending_request_is_fatal() {
        let pending = Pending::new();
        let mut buf = BytesMut::from(&data_frame(9)[..]);
        assert!(matches!(
            drain_frames(&mut buf, &pending),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn an_absurd_length_prefix_is_fatal() {
        let pending = Pending::new();
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0][..]);
        assert!(matches!(
            drain_frames(&mut buf, &pending),
            Err(Error::Protocol(_))
        ));
    }
}

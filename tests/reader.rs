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

//! Pipelined-reader behavior: window growth, short-read recovery, EOF
//! latching, error latching, cancellation, and the sized-download seed.

mod common;

use std::time::Duration;

use common::{Behavior, Recorded};
use sftpio::{Error, Handle, PipelinedReader, SessionConfig, SftpSession};
use tokio_util::sync::CancellationToken;

async fn connect(behavior: Behavior) -> (SftpSession, common::TestServer) {
    let (stream, server) = common::spawn(behavior);
    let session = SftpSession::connect(stream, SessionConfig::default())
        .await
        .expect("handshake");
    (session, server)
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

async fn open_reading(session: &SftpSession) -> Handle {
    session.open("/f", 0x1, Default::default()).await.unwrap()
}

#[tokio::test]
async fn window_grows_one_per_successful_chunk() {
    let content = patterned(64 * 1024);
    let (session, _server) = connect(Behavior {
        content: content.clone(),
        ..Behavior::default()
    })
    .await;

    let handle = open_reading(&session).await;
    let mut reader = PipelinedReader::new(session.clone(), handle, 4096, 4, 0);
    let cancel = CancellationToken::new();
    assert_eq!(reader.window(), 1);

    let mut expected_window = 1;
    for _ in 0..6 {
        let chunk = reader.read_next(&cancel).await.unwrap();
        assert_eq!(chunk.len(), 4096);
        expected_window = (expected_window + 1).min(4);
        assert_eq!(reader.window(), expected_window);
        assert!(reader.in_flight() <= reader.window());
    }
}

#[tokio::test]
async fn short_read_issues_a_gap_fill_and_adopts_the_server_size() {
    let content = patterned(64 * 1024);
    let (session, server) = connect(Behavior {
        content: content.clone(),
        // The third request (offset 8192) only yields 3072 bytes.
        short_reads: [(8192u64, 3072u32)].into(),
        ..Behavior::default()
    })
    .await;

    let handle = open_reading(&session).await;
    let mut reader = PipelinedReader::new(session.clone(), handle, 4096, 4, 0);
    let cancel = CancellationToken::new();

    let mut collected = Vec::new();
    collected.extend_from_slice(&reader.read_next(&cancel).await.unwrap());
    collected.extend_from_slice(&reader.read_next(&cancel).await.unwrap());

    // The short chunk is delivered as-is, and the server's preferred size
    // is adopted from it.
    let short = reader.read_next(&cancel).await.unwrap();
    assert_eq!(short.len(), 3072);
    collected.extend_from_slice(&short);
    assert_eq!(reader.chunk_size(), 3072);

    // The next call consumes the gap fill, keeping the bytes contiguous.
    let gap = reader.read_next(&cancel).await.unwrap();
    assert_eq!(gap.len(), 1024);
    collected.extend_from_slice(&gap);
    assert_eq!(collected, content[..collected.len()]);

    // The gap fill went out for exactly the missing bytes.
    assert!(server
        .recorded()
        .contains(&Recorded::Read { offset: 8192 + 3072, length: 1024 }));

    // The window kept growing to its bound.
    assert_eq!(reader.window(), 4);
    assert!(reader.in_flight() <= reader.window());
}

#[tokio::test]
async fn chunk_size_never_drops_below_the_floor() {
    let content = patterned(8 * 1024);
    let (session, _server) = connect(Behavior {
        content,
        short_reads: [(0u64, 100u32)].into(),
        ..Behavior::default()
    })
    .await;

    let handle = open_reading(&session).await;
    let mut reader = PipelinedReader::new(session.clone(), handle, 4096, 4, 0);
    let cancel = CancellationToken::new();

    let short = reader.read_next(&cancel).await.unwrap();
    assert_eq!(short.len(), 100);
    assert_eq!(reader.chunk_size(), 512);
}

#[tokio::test]
async fn eof_latches_permanently() {
    let content = patterned(10_000);
    let (session, server) = connect(Behavior {
        content: content.clone(),
        ..Behavior::default()
    })
    .await;

    let handle = open_reading(&session).await;
    let mut reader = PipelinedReader::new(session.clone(), handle, 4096, 4, 0);
    let cancel = CancellationToken::new();

    let mut collected = Vec::new();
    loop {
        let chunk = reader.read_next(&cancel).await.unwrap();
        if chunk.is_empty() {
            break;
        }
        collected.extend_from_slice(&chunk);
    }
    assert_eq!(collected, content);
    assert_eq!(reader.window(), 0);
    assert!(reader.in_flight() <= reader.window());

    // Latched: empty forever, and silent on the wire. (The pause lets
    // speculative requests already in transit reach the server, so the
    // counts below compare a settled log.)
    tokio::time::sleep(Duration::from_millis(30)).await;
    let requests = server.reads().len();
    for _ in 0..3 {
        assert!(reader.read_next(&cancel).await.unwrap().is_empty());
    }
    assert_eq!(server.reads().len(), requests);
}

#[tokio::test]
async fn sized_download_skips_the_final_round_trip() {
    // 5000 bytes with 4096-byte chunks: the second chunk comes back short
    // at exactly the known size, and the speculative read at 8192 is
    // already in flight to confirm EOF.
    let content = patterned(5000);
    let (session, server) = connect(Behavior {
        content: content.clone(),
        ..Behavior::default()
    })
    .await;

    let handle = open_reading(&session).await;
    let mut reader =
        PipelinedReader::with_size(session.clone(), handle, 4096, 4, 0, Some(5000));
    let cancel = CancellationToken::new();

    let first = reader.read_next(&cancel).await.unwrap();
    assert_eq!(first.len(), 4096);
    let second = reader.read_next(&cancel).await.unwrap();
    assert_eq!(second.len(), 904);
    assert_eq!([first, second].concat(), content);

    // EOF is latched without a gap-fill request at offset 5000.
    assert_eq!(reader.window(), 0);
    assert!(!server.reads().iter().any(|(offset, _)| *offset == 5000));
    assert!(reader.read_next(&cancel).await.unwrap().is_empty());
}

#[tokio::test]
async fn for_download_seeds_the_window_to_cover_the_file() {
    let content = patterned(10_240);
    let (session, _server) = connect(Behavior {
        content: content.clone(),
        ..Behavior::default()
    })
    .await;

    // 10 chunks of 1024: seed is min(max_pending, 2 + 10).
    let handle = open_reading(&session).await;
    let reader =
        PipelinedReader::for_download(session.clone(), handle.clone(), 1024, 64, 10_240);
    assert_eq!(reader.window(), 12);

    let reader = PipelinedReader::for_download(session.clone(), handle.clone(), 1024, 4, 10_240);
    assert_eq!(reader.window(), 4);

    // An empty file still gets a live window.
    let reader = PipelinedReader::for_download(session.clone(), handle, 1024, 4, 0);
    assert_eq!(reader.window(), 2);
}

#[tokio::test]
async fn download_collects_the_whole_file() {
    let content = patterned(100_000);
    let (session, _server) = connect(Behavior {
        content: content.clone(),
        ..Behavior::default()
    })
    .await;

    let handle = open_reading(&session).await;
    let mut reader =
        PipelinedReader::for_download(session.clone(), handle, 8192, 8, 100_000);
    let cancel = CancellationToken::new();

    let mut collected = Vec::new();
    loop {
        let chunk = reader.read_next(&cancel).await.unwrap();
        if chunk.is_empty() {
            break;
        }
        assert!(reader.in_flight() <= 8);
        collected.extend_from_slice(&chunk);
    }
    assert_eq!(collected, content);
}

#[tokio::test]
async fn errors_latch_and_rethrow() {
    let content = patterned(64 * 1024);
    let (session, server) = connect(Behavior {
        content,
        fail_read_at: [(4096u64, common::STATUS_PERMISSION_DENIED)].into(),
        ..Behavior::default()
    })
    .await;

    let handle = open_reading(&session).await;
    let mut reader = PipelinedReader::new(session.clone(), handle, 4096, 4, 0);
    let cancel = CancellationToken::new();

    assert_eq!(reader.read_next(&cancel).await.unwrap().len(), 4096);
    assert!(matches!(
        reader.read_next(&cancel).await,
        Err(Error::PermissionDenied(_))
    ));
    assert_eq!(reader.window(), 0);

    // The error is latched; no further requests leave.
    tokio::time::sleep(Duration::from_millis(30)).await;
    let requests = server.reads().len();
    assert!(matches!(
        reader.read_next(&cancel).await,
        Err(Error::PermissionDenied(_))
    ));
    assert_eq!(server.reads().len(), requests);
}

#[tokio::test]
async fn caller_cancellation_does_not_latch() {
    let content = patterned(8192);
    let (session, _server) = connect(Behavior {
        content: content.clone(),
        delay_read_at: [(0u64, Duration::from_millis(150))].into(),
        ..Behavior::default()
    })
    .await;

    let handle = open_reading(&session).await;
    let mut reader = PipelinedReader::new(session.clone(), handle, 4096, 4, 0);

    // A token fired before the wait: the call gives up, nothing latches,
    // and the head request stays in flight.
    let cancelled = CancellationToken::new();
    cancelled.cancel();
    assert!(matches!(
        reader.read_next(&cancelled).await,
        Err(Error::Cancelled)
    ));
    assert_eq!(reader.window(), 1);
    assert_eq!(reader.in_flight(), 1);

    // A later call with a live token resumes the pipeline and receives
    // the very response the cancelled wait abandoned.
    let live = CancellationToken::new();
    let chunk = reader.read_next(&live).await.unwrap();
    assert_eq!(chunk.as_ref(), &content[..4096]);
    assert_eq!(reader.window(), 2);
}

#[tokio::test]
async fn dispose_latches_and_stops_requesting() {
    let content = patterned(64 * 1024);
    let (session, server) = connect(Behavior {
        content,
        ..Behavior::default()
    })
    .await;

    let handle = open_reading(&session).await;
    let mut reader = PipelinedReader::new(session.clone(), handle, 4096, 4, 0);
    let cancel = CancellationToken::new();
    assert_eq!(reader.read_next(&cancel).await.unwrap().len(), 4096);

    reader.dispose();
    assert_eq!(reader.in_flight(), 0);
    assert!(matches!(
        reader.read_next(&cancel).await,
        Err(Error::Disposed)
    ));

    let requests = server.reads().len();
    assert!(matches!(
        reader.read_next(&cancel).await,
        Err(Error::Disposed)
    ));
    assert_eq!(server.reads().len(), requests);
}

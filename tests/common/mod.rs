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

//! A scripted in-process SFTP server for integration tests.
//!
//! The server speaks raw wire bytes over one half of a `tokio::io::duplex`
//! pair, so the client under test is exercised against independently
//! hand-encoded frames rather than its own codec. Behavior quirks (short
//! reads, held replies, bogus ids, delays) are injected per offset.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

pub const STATUS_OK: u32 = 0;
pub const STATUS_EOF: u32 = 1;
pub const STATUS_NO_SUCH_FILE: u32 = 2;
pub const STATUS_PERMISSION_DENIED: u32 = 3;
pub const STATUS_FAILURE: u32 = 4;
pub const STATUS_OP_UNSUPPORTED: u32 = 8;

/// Requests the server saw, reduced to what tests assert on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Open { path: String, pflags: u32 },
    Close,
    Read { offset: u64, length: u32 },
    Write { offset: u64, length: u32 },
    FStat,
    FSetStat { size: Option<u64> },
    RealPath(String),
    OpenDir(String),
    ReadDir,
    Extended(String),
}

/// What `FSTAT` reports for any handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeReport {
    /// Attrs with the size flag, taken from the content length (or
    /// `explicit_size`).
    #[default]
    FromContent,
    /// Attrs with no groups at all.
    Absent,
    /// A FAILURE status.
    Fail,
}

#[derive(Default)]
pub struct Behavior {
    /// `REALPATH(".")` answer; default `/home/test`.
    pub home: Option<String>,
    /// Version to negotiate; default 3.
    pub version: Option<u32>,
    /// Extension pairs advertised in VERSION.
    pub extensions: Vec<(String, String)>,
    /// Backing bytes served by READ.
    pub content: Vec<u8>,
    pub size_report: SizeReport,
    pub explicit_size: Option<u64>,
    /// offset -> byte cap applied to the first READ at that offset.
    pub short_reads: HashMap<u64, u32>,
    /// offset -> status code for READs at that offset.
    pub fail_read_at: HashMap<u64, u32>,
    /// offset -> delay before answering a READ at that offset.
    pub delay_read_at: HashMap<u64, Duration>,
    /// Hold the reply for READ at `.0` until a READ at `.1` is answered;
    /// both replies then leave in one write.
    pub hold_read_until: Option<(u64, u64)>,
    /// Answer the READ at this offset under an id nobody issued.
    pub bogus_id_read_at: Option<u64>,
    /// Fail the nth WRITE (1-based) with the given status code.
    pub fail_write_at: Option<(usize, u32)>,
    /// Fail every READDIR with the given status code.
    pub fail_readdir: Option<u32>,
    /// Short names served by the first READDIR per handle.
    pub dir_entries: Vec<String>,
    /// Paths whose REALPATH yields NO_SUCH_FILE.
    pub realpath_fails_for: Vec<String>,
    /// Dribble replies a few bytes at a time to exercise reassembly.
    pub fragment_replies: bool,
}

#[derive(Clone)]
pub struct TestServer {
    requests: Arc<Mutex<Vec<Recorded>>>,
    writes: Arc<Mutex<Vec<(u64, Vec<u8>)>>>,
}

impl TestServer {
    pub fn recorded(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn reads(&self) -> Vec<(u64, u32)> {
        self.recorded()
            .into_iter()
            .filter_map(|r| match r {
                Recorded::Read { offset, length } => Some((offset, length)),
                _ => None,
            })
            .collect()
    }

    pub fn writes(&self) -> Vec<(u64, Vec<u8>)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.recorded()
            .iter()
            .filter(|r| matches!(r, Recorded::Close))
            .count()
    }
}

/// Spawn the scripted server; returns the client half of the stream.
pub fn spawn(behavior: Behavior) -> (DuplexStream, TestServer) {
    let (client, server) = tokio::io::duplex(256 * 1024);
    let handle = TestServer {
        requests: Arc::new(Mutex::new(Vec::new())),
        writes: Arc::new(Mutex::new(Vec::new())),
    };
    tokio::spawn(serve(
        server,
        behavior,
        handle.requests.clone(),
        handle.writes.clone(),
    ));
    (client, handle)
}

// ---- wire helpers -------------------------------------------------------

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn put_str(buf: &mut Vec<u8>, s: &[u8]) {
    put_u32(buf, s.len() as u32);
    buf.extend_from_slice(s);
}

/// One whole frame: length prefix, type, optional id, body.
fn frame(ty: u8, id: Option<u32>, body: &[u8]) -> Vec<u8> {
    let payload_len = 1 + if id.is_some() { 4 } else { 0 } + body.len();
    let mut out = Vec::with_capacity(4 + payload_len);
    put_u32(&mut out, payload_len as u32);
    out.push(ty);
    if let Some(id) = id {
        put_u32(&mut out, id);
    }
    out.extend_from_slice(body);
    out
}

fn status_frame(id: u32, code: u32, message: &str) -> Vec<u8> {
    let mut body = Vec::new();
    put_u32(&mut body, code);
    put_str(&mut body, message.as_bytes());
    put_str(&mut body, b"en");
    frame(101, Some(id), &body)
}

fn handle_frame(id: u32, handle: &str) -> Vec<u8> {
    let mut body = Vec::new();
    put_str(&mut body, handle.as_bytes());
    frame(102, Some(id), &body)
}

fn data_frame(id: u32, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    put_str(&mut body, data);
    frame(103, Some(id), &body)
}

fn name_frame(id: u32, entries: &[(String, u32)]) -> Vec<u8> {
    let mut body = Vec::new();
    put_u32(&mut body, entries.len() as u32);
    for (name, permissions) in entries {
        put_str(&mut body, name.as_bytes());
        put_str(&mut body, format!("-rw-r--r-- {name}").as_bytes());
        put_u32(&mut body, 0x4); // permissions group only
        put_u32(&mut body, *permissions);
    }
    frame(104, Some(id), &body)
}

struct Cursor<'a>(&'a [u8]);

impl<'a> Cursor<'a> {
    fn u32(&mut self) -> u32 {
        let (head, tail) = self.0.split_at(4);
        self.0 = tail;
        u32::from_be_bytes([head[0], head[1], head[2], head[3]])
    }

    fn u64(&mut self) -> u64 {
        let (head, tail) = self.0.split_at(8);
        self.0 = tail;
        u64::from_be_bytes([
            head[0], head[1], head[2], head[3], head[4], head[5], head[6], head[7],
        ])
    }

    fn bytes(&mut self) -> Vec<u8> {
        let len = self.u32() as usize;
        let (head, tail) = self.0.split_at(len);
        self.0 = tail;
        head.to_vec()
    }

    fn string(&mut self) -> String {
        String::from_utf8(self.bytes()).unwrap()
    }
}

async fn read_frame(stream: &mut DuplexStream) -> Option<(u8, u32, Vec<u8>)> {
    let mut prefix = [0u8; 4];
    stream.read_exact(&mut prefix).await.ok()?;
    let len = u32::from_be_bytes(prefix) as usize;

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.ok()?;

    let ty = payload[0];
    if ty == 1 || ty == 2 {
        Some((ty, 0, payload[1..].to_vec()))
    } else {
        let id = u32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
        Some((ty, id, payload[5..].to_vec()))
    }
}

async fn send(stream: &mut DuplexStream, frame: &[u8], fragment: bool) {
    if fragment {
        for chunk in frame.chunks(3) {
            if stream.write_all(chunk).await.is_err() {
                return;
            }
            let _ = stream.flush().await;
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    } else {
        let _ = stream.write_all(frame).await;
    }
}

// ---- the server loop ----------------------------------------------------

async fn serve(
    mut stream: DuplexStream,
    behavior: Behavior,
    requests: Arc<Mutex<Vec<Recorded>>>,
    writes: Arc<Mutex<Vec<(u64, Vec<u8>)>>>,
) {
    let home = behavior.home.clone().unwrap_or_else(|| "/home/test".into());
    let fragment = behavior.fragment_replies;
    let mut short_reads = behavior.short_reads.clone();
    let mut write_count = 0usize;
    let mut next_handle = 0u32;
    let mut served_dirs: HashSet<String> = HashSet::new();
    let mut held_reply: Option<Vec<u8>> = None;

    // Version handshake.
    let Some((ty, _, _)) = read_frame(&mut stream).await else {
        return;
    };
    assert_eq!(ty, 1, "expected INIT first");
    let mut body = Vec::new();
    put_u32(&mut body, behavior.version.unwrap_or(3));
    for (name, data) in &behavior.extensions {
        put_str(&mut body, name.as_bytes());
        put_str(&mut body, data.as_bytes());
    }
    send(&mut stream, &frame(2, None, &body), fragment).await;

    while let Some((ty, id, payload)) = read_frame(&mut stream).await {
        let mut cursor = Cursor(&payload);
        let record = |r: Recorded| requests.lock().unwrap().push(r);

        match ty {
            // OPEN
            3 => {
                let path = cursor.string();
                let pflags = cursor.u32();
                record(Recorded::Open { path, pflags });
                next_handle += 1;
                let reply = handle_frame(id, &format!("f{next_handle}"));
                send(&mut stream, &reply, fragment).await;
            }
            // CLOSE
            4 => {
                record(Recorded::Close);
                send(&mut stream, &status_frame(id, STATUS_OK, ""), fragment).await;
            }
            // READ
            5 => {
                let _handle = cursor.bytes();
                let offset = cursor.u64();
                let length = cursor.u32();
                record(Recorded::Read { offset, length });

                if let Some(delay) = behavior.delay_read_at.get(&offset) {
                    tokio::time::sleep(*delay).await;
                }

                let reply = if let Some(code) = behavior.fail_read_at.get(&offset) {
                    status_frame(id, *code, "read refused")
                } else if offset as usize >= behavior.content.len() {
                    status_frame(id, STATUS_EOF, "")
                } else {
                    let mut n = length as usize;
                    if let Some(cap) = short_reads.remove(&offset) {
                        n = n.min(cap as usize);
                    }
                    let end = (offset as usize + n).min(behavior.content.len());
                    let chunk = &behavior.content[offset as usize..end];
                    let reply_id = match behavior.bogus_id_read_at {
                        Some(bogus) if bogus == offset => id.wrapping_add(7777),
                        _ => id,
                    };
                    data_frame(reply_id, chunk)
                };

                match behavior.hold_read_until {
                    Some((held, _)) if held == offset => {
                        held_reply = Some(reply);
                    }
                    Some((_, trigger)) if trigger == offset => {
                        // Both frames leave in one write: the client's
                        // framer must split them.
                        let mut coalesced = reply;
                        if let Some(held) = held_reply.take() {
                            coalesced.extend_from_slice(&held);
                        }
                        send(&mut stream, &coalesced, fragment).await;
                    }
                    _ => send(&mut stream, &reply, fragment).await,
                }
            }
            // WRITE
            6 => {
                let _handle = cursor.bytes();
                let offset = cursor.u64();
                let data = cursor.bytes();
                write_count += 1;
                record(Recorded::Write {
                    offset,
                    length: data.len() as u32,
                });
                writes.lock().unwrap().push((offset, data));

                let reply = match behavior.fail_write_at {
                    Some((nth, code)) if nth == write_count => {
                        status_frame(id, code, "write refused")
                    }
                    _ => status_frame(id, STATUS_OK, ""),
                };
                send(&mut stream, &reply, fragment).await;
            }
            // LSTAT / STAT: a plain regular file.
            7 | 17 => {
                let mut body = Vec::new();
                put_u32(&mut body, 0x4);
                put_u32(&mut body, 0o100644);
                send(&mut stream, &frame(105, Some(id), &body), fragment).await;
            }
            // FSTAT
            8 => {
                record(Recorded::FStat);
                let reply = match behavior.size_report {
                    SizeReport::Fail => status_frame(id, STATUS_FAILURE, "fstat refused"),
                    SizeReport::Absent => frame(105, Some(id), &0u32.to_be_bytes()),
                    SizeReport::FromContent => {
                        let size = behavior
                            .explicit_size
                            .unwrap_or(behavior.content.len() as u64);
                        let mut body = Vec::new();
                        put_u32(&mut body, 0x1);
                        put_u64(&mut body, size);
                        frame(105, Some(id), &body)
                    }
                };
                send(&mut stream, &reply, fragment).await;
            }
            // SETSTAT
            9 => {
                send(&mut stream, &status_frame(id, STATUS_OK, ""), fragment).await;
            }
            // FSETSTAT
            10 => {
                let _handle = cursor.bytes();
                let flags = cursor.u32();
                let size = (flags & 0x1 != 0).then(|| cursor.u64());
                record(Recorded::FSetStat { size });
                send(&mut stream, &status_frame(id, STATUS_OK, ""), fragment).await;
            }
            // OPENDIR
            11 => {
                let path = cursor.string();
                record(Recorded::OpenDir(path));
                next_handle += 1;
                let reply = handle_frame(id, &format!("d{next_handle}"));
                send(&mut stream, &reply, fragment).await;
            }
            // READDIR
            12 => {
                let handle = String::from_utf8(cursor.bytes()).unwrap();
                record(Recorded::ReadDir);
                let reply = if let Some(code) = behavior.fail_readdir {
                    status_frame(id, code, "listing refused")
                } else if served_dirs.insert(handle) {
                    let entries: Vec<(String, u32)> = behavior
                        .dir_entries
                        .iter()
                        .map(|name| (name.clone(), 0o100644))
                        .collect();
                    name_frame(id, &entries)
                } else {
                    status_frame(id, STATUS_EOF, "")
                };
                send(&mut stream, &reply, fragment).await;
            }
            // REMOVE / MKDIR / RMDIR / RENAME / SYMLINK
            13 | 14 | 15 | 18 | 20 => {
                send(&mut stream, &status_frame(id, STATUS_OK, ""), fragment).await;
            }
            // REALPATH
            16 => {
                let path = cursor.string();
                record(Recorded::RealPath(path.clone()));
                let reply = if behavior.realpath_fails_for.contains(&path) {
                    status_frame(id, STATUS_NO_SUCH_FILE, "No such file")
                } else {
                    let resolved = resolve(&path, &home);
                    name_frame(id, &[(resolved, 0o40755)])
                };
                send(&mut stream, &reply, fragment).await;
            }
            // READLINK
            19 => {
                let reply = name_frame(id, &[("/target".into(), 0o100644)]);
                send(&mut stream, &reply, fragment).await;
            }
            // EXTENDED
            200 => {
                let request = cursor.string();
                record(Recorded::Extended(request.clone()));
                let reply = match request.as_str() {
                    "statvfs@openssh.com" | "fstatvfs@openssh.com" => {
                        let mut body = Vec::new();
                        for value in
                            [4096u64, 4096, 1000, 500, 400, 100, 50, 40, 99, 0x1, 255]
                        {
                            put_u64(&mut body, value);
                        }
                        frame(201, Some(id), &body)
                    }
                    "posix-rename@openssh.com" | "hardlink@openssh.com" => {
                        status_frame(id, STATUS_OK, "")
                    }
                    _ => status_frame(id, STATUS_OP_UNSUPPORTED, ""),
                };
                send(&mut stream, &reply, fragment).await;
            }
            _ => {
                send(
                    &mut stream,
                    &status_frame(id, STATUS_OP_UNSUPPORTED, ""),
                    fragment,
                )
                .await;
            }
        }
    }
}

fn resolve(path: &str, home: &str) -> String {
    if path == "." {
        home.to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{home}/{path}")
    }
}

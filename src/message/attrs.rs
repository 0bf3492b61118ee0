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

/*
SFTP ATTRS blob (embedded in OPEN, SETSTAT, FSETSTAT, MKDIR, NAME, ATTRS):
| u32: flags | {if SIZE} u64: size | {if UIDGID} u32: uid | {if UIDGID} u32: gid | {if PERMISSIONS} u32: permissions | {if ACMODTIME} u32: atime | {if ACMODTIME} u32: mtime | {if EXTENDED} u32: count + count * (string, string) |

    Flags:
        SIZE: 0x00000001
        UIDGID: 0x00000002
        PERMISSIONS: 0x00000004
        ACMODTIME: 0x00000008
        EXTENDED: 0x80000000

    File type: (high nibble of permissions)
        FIFO: 0x1
        CHR: 0x2
        DIR: 0x4
        BLK: 0x6
        REG: 0x8
        LNK: 0xA
        SOCK: 0xC
 */

use bytes::Bytes;
use time::{OffsetDateTime, UtcOffset};

use crate::decode::SftpDecode;
use crate::encode::SftpEncode;
use crate::Error;

const FLAG_SIZE: u32 = 0x0000_0001;
const FLAG_UIDGID: u32 = 0x0000_0002;
const FLAG_PERMISSIONS: u32 = 0x0000_0004;
const FLAG_ACMODTIME: u32 = 0x0000_0008;
const FLAG_EXTENDED: u32 = 0x8000_0000;

const TYPE_FIFO: u32 = 0x1;
const TYPE_CHARACTER: u32 = 0x2;
const TYPE_DIRECTORY: u32 = 0x4;
const TYPE_BLOCK: u32 = 0x6;
const TYPE_REGULAR: u32 = 0x8;
const TYPE_SYMLINK: u32 = 0xA;
const TYPE_SOCKET: u32 = 0xC;

const SET_UID: u32 = 0o4000;
const SET_GID: u32 = 0o2000;
const STICKY: u32 = 0o1000;

/// The sentinel for a time the server did not report.
const UNSET_TIME: OffsetDateTime = OffsetDateTime::UNIX_EPOCH;

/// The attribute groups as last decoded (or as defaulted for a fresh
/// record). Encoding emits only the groups that differ from this.
#[derive(Debug, Clone)]
struct Origin {
    size: i64,
    user_id: i32,
    group_id: i32,
    permissions: u32,
    last_access_time: OffsetDateTime,
    last_write_time: OffsetDateTime,
    extensions: Vec<(Bytes, Bytes)>,
}

impl Default for Origin {
    fn default() -> Self {
        Self {
            size: -1,
            user_id: -1,
            group_id: -1,
            permissions: 0,
            last_access_time: UNSET_TIME,
            last_write_time: UNSET_TIME,
            extensions: Vec::new(),
        }
    }
}

/// A mutable view of a remote file's metadata.
///
/// `size`, `user_id` and `group_id` use `-1` for "not reported by the
/// server". Times are UTC instants; the Unix epoch marks an unreported
/// time. The encoder writes only the groups mutated since the record was
/// decoded, so an untouched record serializes to a lone zero flag word.
#[derive(Debug, Clone)]
pub struct FileAttributes {
    pub size: i64,
    pub user_id: i32,
    pub group_id: i32,
    permissions: u32,
    pub last_access_time: OffsetDateTime,
    pub last_write_time: OffsetDateTime,
    pub extensions: Vec<(Bytes, Bytes)>,
    origin: Origin,
}

impl Default for FileAttributes {
    fn default() -> Self {
        let origin = Origin::default();
        Self {
            size: origin.size,
            user_id: origin.user_id,
            group_id: origin.group_id,
            permissions: origin.permissions,
            last_access_time: origin.last_access_time,
            last_write_time: origin.last_write_time,
            extensions: origin.extensions.clone(),
            origin,
        }
    }
}

impl PartialEq for FileAttributes {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size
            && self.user_id == other.user_id
            && self.group_id == other.group_id
            && self.permissions == other.permissions
            && self.last_access_time == other.last_access_time
            && self.last_write_time == other.last_write_time
            && self.extensions == other.extensions
    }
}

impl Eq for FileAttributes {}

macro_rules! permission_bit {
    ($(#[$doc:meta])* $get:ident, $set:ident, $bit:expr) => {
        $(#[$doc])*
        pub fn $get(&self) -> bool {
            self.permissions & $bit != 0
        }

        pub fn $set(&mut self, value: bool) {
            if value {
                self.permissions |= $bit;
            } else {
                self.permissions &= !$bit;
            }
        }
    };
}

macro_rules! file_type {
    ($(#[$doc:meta])* $name:ident, $nibble:expr) => {
        $(#[$doc])*
        pub fn $name(&self) -> bool {
            (self.permissions >> 12) & 0xF == $nibble
        }
    };
}

impl FileAttributes {
    /// The raw POSIX mode word: file-type nibble plus the low 12
    /// permission bits.
    pub fn permissions(&self) -> u32 {
        self.permissions
    }

    /// Replace the low 12 permission bits, leaving the file type intact.
    ///
    /// `mode` holds up to four octal digits written in decimal notation
    /// (special, user, group, other), e.g. `644` or `4755`. Any digit
    /// above 7, or a fifth digit, is rejected.
    pub fn set_permissions(&mut self, mode: i16) -> Result<(), Error> {
        if !(0..=7777).contains(&mode) {
            return Err(Error::Argument("mode"));
        }

        let mode = mode as u32;
        let special = mode / 1000;
        let user = mode / 100 % 10;
        let group = mode / 10 % 10;
        let other = mode % 10;

        if user > 7 || group > 7 || other > 7 {
            return Err(Error::Argument("mode"));
        }

        let bits = (special << 9) | (user << 6) | (group << 3) | other;
        self.permissions = (self.permissions & !0xFFF) | bits;
        Ok(())
    }

    /// `last_write_time` normalized to UTC.
    pub fn last_write_time_utc(&self) -> OffsetDateTime {
        self.last_write_time.to_offset(UtcOffset::UTC)
    }

    /// `last_access_time` normalized to UTC.
    pub fn last_access_time_utc(&self) -> OffsetDateTime {
        self.last_access_time.to_offset(UtcOffset::UTC)
    }

    file_type!(
        /// True when the file-type nibble names a regular file. Exactly one
        /// of the `is_*` predicates holds for a typed mode word.
        is_regular_file,
        TYPE_REGULAR
    );
    file_type!(is_directory, TYPE_DIRECTORY);
    file_type!(is_symbolic_link, TYPE_SYMLINK);
    file_type!(is_socket, TYPE_SOCKET);
    file_type!(is_block_device, TYPE_BLOCK);
    file_type!(is_character_device, TYPE_CHARACTER);
    file_type!(is_named_pipe, TYPE_FIFO);

    permission_bit!(
        /// The setuid bit.
        is_uid_set,
        set_is_uid_set,
        SET_UID
    );
    permission_bit!(is_gid_set, set_is_gid_set, SET_GID);
    permission_bit!(is_sticky_set, set_is_sticky_set, STICKY);
    permission_bit!(owner_can_read, set_owner_can_read, 0o400);
    permission_bit!(owner_can_write, set_owner_can_write, 0o200);
    permission_bit!(owner_can_execute, set_owner_can_execute, 0o100);
    permission_bit!(group_can_read, set_group_can_read, 0o40);
    permission_bit!(group_can_write, set_group_can_write, 0o20);
    permission_bit!(group_can_execute, set_group_can_execute, 0o10);
    permission_bit!(others_can_read, set_others_can_read, 0o4);
    permission_bit!(others_can_write, set_others_can_write, 0o2);
    permission_bit!(others_can_execute, set_others_can_execute, 0o1);

    fn size_changed(&self) -> bool {
        // Resetting the size to the "not reported" sentinel is not a change.
        self.size != self.origin.size && self.size >= 0
    }

    fn owner_changed(&self) -> bool {
        self.user_id != self.origin.user_id || self.group_id != self.origin.group_id
    }

    fn permissions_changed(&self) -> bool {
        self.permissions != self.origin.permissions
    }

    fn times_changed(&self) -> bool {
        self.last_access_time != self.origin.last_access_time
            || self.last_write_time != self.origin.last_write_time
    }

    fn extensions_changed(&self) -> bool {
        self.extensions != self.origin.extensions
    }

    fn triad(&self, read: u32, write: u32, exec: u32, special: u32, overlay: (char, char)) -> [char; 3] {
        [
            if self.permissions & read != 0 { 'r' } else { '-' },
            if self.permissions & write != 0 { 'w' } else { '-' },
            match (self.permissions & special != 0, self.permissions & exec != 0) {
                (true, true) => overlay.0,
                (true, false) => overlay.1,
                (false, true) => 'x',
                (false, false) => '-',
            },
        ]
    }
}

impl std::fmt::Display for FileAttributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.permissions == 0
            && self.size < 0
            && self.last_write_time == UNSET_TIME
        {
            return f.write_str("FileAttributes");
        }

        let type_char = match (self.permissions >> 12) & 0xF {
            TYPE_DIRECTORY => 'd',
            TYPE_SYMLINK => 'l',
            TYPE_SOCKET => 's',
            TYPE_FIFO => 'p',
            TYPE_CHARACTER => 'c',
            TYPE_BLOCK => 'b',
            _ => '-',
        };

        let mut out = String::with_capacity(48);
        out.push(type_char);
        out.extend(self.triad(0o400, 0o200, 0o100, SET_UID, ('s', 'S')));
        out.extend(self.triad(0o40, 0o20, 0o10, SET_GID, ('s', 'S')));
        out.extend(self.triad(0o4, 0o2, 0o1, STICKY, ('t', 'T')));

        if self.size >= 0 {
            out.push_str(&format!(" Size: {}", self.size));
        }
        if self.last_write_time != UNSET_TIME {
            let utc = self.last_write_time_utc();
            if let Ok(stamp) = utc.format(&time::format_description::well_known::Rfc3339) {
                out.push_str(&format!(" LastWriteTime: {stamp}"));
            }
        }

        f.write_str(out.trim_end())
    }
}

impl SftpDecode for FileAttributes {
    fn decode(buf: &mut dyn bytes::Buf) -> Result<Self, Error> {
        let flags = u32::decode(buf)?;
        let mut attrs = FileAttributes::default();

        if flags & FLAG_SIZE != 0 {
            attrs.size = u64::decode(buf)? as i64;
        }
        if flags & FLAG_UIDGID != 0 {
            attrs.user_id = u32::decode(buf)? as i32;
            attrs.group_id = u32::decode(buf)? as i32;
        }
        if flags & FLAG_PERMISSIONS != 0 {
            attrs.permissions = u32::decode(buf)?;
        }
        if flags & FLAG_ACMODTIME != 0 {
            let atime = u32::decode(buf)?;
            let mtime = u32::decode(buf)?;
            attrs.last_access_time =
                OffsetDateTime::from_unix_timestamp(atime as i64).unwrap_or(UNSET_TIME);
            attrs.last_write_time =
                OffsetDateTime::from_unix_timestamp(mtime as i64).unwrap_or(UNSET_TIME);
        }
        if flags & FLAG_EXTENDED != 0 {
            let count = u32::decode(buf)?;
            for _ in 0..count {
                let name = Bytes::decode(buf)?;
                let value = Bytes::decode(buf)?;
                attrs.extensions.push((name, value));
            }
        }

        attrs.origin = Origin {
            size: attrs.size,
            user_id: attrs.user_id,
            group_id: attrs.group_id,
            permissions: attrs.permissions,
            last_access_time: attrs.last_access_time,
            last_write_time: attrs.last_write_time,
            extensions: attrs.extensions.clone(),
        };
        Ok(attrs)
    }
}

impl SftpEncode for FileAttributes {
    fn encode(&self, buf: &mut dyn bytes::BufMut) -> Result<(), Error> {
        let mut flags = 0u32;
        if self.size_changed() {
            flags |= FLAG_SIZE;
        }
        if self.owner_changed() {
            flags |= FLAG_UIDGID;
        }
        if self.permissions_changed() {
            flags |= FLAG_PERMISSIONS;
        }
        if self.times_changed() {
            flags |= FLAG_ACMODTIME;
        }
        if self.extensions_changed() {
            flags |= FLAG_EXTENDED;
        }

        flags.encode(buf)?;

        if flags & FLAG_SIZE != 0 {
            (self.size as u64).encode(buf)?;
        }
        if flags & FLAG_UIDGID != 0 {
            (self.user_id as u32).encode(buf)?;
            (self.group_id as u32).encode(buf)?;
        }
        if flags & FLAG_PERMISSIONS != 0 {
            self.permissions.encode(buf)?;
        }
        if flags & FLAG_ACMODTIME != 0 {
            (self.last_access_time.unix_timestamp() as u32).encode(buf)?;
            (self.last_write_time.unix_timestamp() as u32).encode(buf)?;
        }
        if flags & FLAG_EXTENDED != 0 {
            let Ok(count) = u32::try_from(self.extensions.len()) else {
                return Err(Error::Protocol("too many extended attributes".into()));
            };
            count.encode(buf)?;
            for (name, value) in &self.extensions {
                name.encode(buf)?;
                value.encode(buf)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn decode(bytes: &[u8]) -> FileAttributes {
        let mut buf = bytes;
        FileAttributes::decode(&mut buf).expect("valid attrs blob")
    }

    fn encode(attrs: &FileAttributes) -> Vec<u8> {
        let mut out = Vec::new();
        attrs.encode(&mut out).expect("encode never fails on Vec");
        out
    }

    #[test]
    fn decode_regular_file_0644() {
        let attrs = decode(&[0, 0, 0, 0x04, 0, 0, 0x81, 0xA4]);

        assert!(attrs.is_regular_file());
        assert!(attrs.owner_can_read());
        assert!(attrs.owner_can_write());
        assert!(!attrs.owner_can_execute());
        assert!(attrs.group_can_read());
        assert!(!attrs.group_can_write());
        assert!(attrs.others_can_read());
        assert_eq!(attrs.size, -1);
        assert_eq!(attrs.user_id, -1);
        assert_eq!(attrs.group_id, -1);
        assert_eq!(attrs.last_write_time, OffsetDateTime::UNIX_EPOCH);

        let text = attrs.to_string();
        assert!(text.starts_with("-rw-r--r--"), "got {text:?}");
        assert_eq!(text, text.trim_end());

        // Nothing was mutated, so the delta encoding is a zero flag word.
        assert_eq!(encode(&attrs), [0, 0, 0, 0]);
    }

    #[test]
    fn mutate_and_encode_delta() {
        let mut attrs = decode(&[0, 0, 0, 0x04, 0, 0, 0x81, 0xA4]);

        attrs.set_is_uid_set(true);
        attrs.set_owner_can_execute(true);
        attrs.size = 123;
        attrs.user_id = 99;
        attrs.group_id = 66;
        attrs.last_access_time = datetime!(2025-08-10 17:51:37 UTC);
        attrs.last_write_time = datetime!(2016-12-02 13:18:20 +03:00);

        let mut expected = vec![0, 0, 0, 0x0F];
        expected.extend_from_slice(&123u64.to_be_bytes());
        expected.extend_from_slice(&99u32.to_be_bytes());
        expected.extend_from_slice(&66u32.to_be_bytes());
        expected.extend_from_slice(&0x0000_89E4u32.to_be_bytes());
        expected.extend_from_slice(&1754848297u32.to_be_bytes());
        expected.extend_from_slice(&1480673900u32.to_be_bytes());
        assert_eq!(encode(&attrs), expected);

        assert_eq!(
            attrs.last_write_time_utc(),
            datetime!(2016-12-02 10:18:20 UTC)
        );
    }

    #[test]
    fn set_permissions_rejects_bad_modes() {
        let mut attrs = FileAttributes::default();
        for mode in [8888, 10000, 8000, 80, 8, 1797, -1, i16::MAX] {
            assert!(
                matches!(attrs.set_permissions(mode), Err(Error::Argument("mode"))),
                "mode {mode} should be rejected"
            );
        }
    }

    #[test]
    fn set_permissions_preserves_high_bits() {
        let mut attrs = decode(&[0, 0, 0, 0x04, 0, 0, 0x81, 0xA4]);
        attrs.set_permissions(755).expect("valid mode");
        assert_eq!(attrs.permissions(), 0x8000 | 0o755);
        assert!(attrs.is_regular_file());

        attrs.set_permissions(4644).expect("valid mode");
        assert_eq!(attrs.permissions(), 0x8000 | 0o4644);
        assert!(attrs.is_uid_set());
    }

    #[test]
    fn file_types_are_mutually_exclusive() {
        for (nibble, check) in [
            (0xCu32, 0usize),
            (0xA, 1),
            (0x8, 2),
            (0x6, 3),
            (0x4, 4),
            (0x2, 5),
            (0x1, 6),
        ] {
            let mut blob = vec![0, 0, 0, 0x04];
            blob.extend_from_slice(&((nibble << 12) | 0o644).to_be_bytes());
            let attrs = decode(&blob);

            let predicates = [
                attrs.is_socket(),
                attrs.is_symbolic_link(),
                attrs.is_regular_file(),
                attrs.is_block_device(),
                attrs.is_directory(),
                attrs.is_character_device(),
                attrs.is_named_pipe(),
            ];
            for (i, value) in predicates.iter().enumerate() {
                assert_eq!(*value, i == check, "nibble {nibble:#x}, predicate {i}");
            }
        }
    }

    #[test]
    fn size_only_mutation_round_trips() {
        let mut attrs = decode(&[0, 0, 0, 0x04, 0, 0, 0x41, 0xFF]);
        attrs.size = 4096;

        let encoded = encode(&attrs);
        assert_eq!(&encoded[..4], &[0, 0, 0, 0x01]);

        let reread = decode(&encoded);
        assert_eq!(reread.size, 4096);
    }

    #[test]
    fn resetting_size_to_sentinel_is_not_a_change() {
        let mut blob = vec![0, 0, 0, 0x01];
        blob.extend_from_slice(&512u64.to_be_bytes());
        let mut attrs = decode(&blob);

        attrs.size = -1;
        assert_eq!(encode(&attrs), [0, 0, 0, 0]);
    }

    #[test]
    fn extended_attributes_keep_insertion_order() {
        let mut attrs = FileAttributes::default();
        attrs.extensions.push(("b@example".into(), "2".into()));
        attrs.extensions.push(("a@example".into(), "1".into()));

        let encoded = encode(&attrs);
        assert_eq!(&encoded[..4], &0x8000_0000u32.to_be_bytes());

        let reread = decode(&encoded);
        assert_eq!(
            reread.extensions,
            vec![("b@example".into(), "2".into()), ("a@example".into(), "1".into())]
        );
    }

    #[test]
    fn display_shows_special_bit_overlays() {
        let mut blob = vec![0, 0, 0, 0x04];
        blob.extend_from_slice(&(0x8000u32 | 0o4755).to_be_bytes());
        assert!(decode(&blob).to_string().starts_with("-rwsr-xr-x"));

        let mut blob = vec![0, 0, 0, 0x04];
        blob.extend_from_slice(&(0x4000u32 | 0o1777).to_be_bytes());
        assert!(decode(&blob).to_string().starts_with("drwxrwxrwt"));

        let mut blob = vec![0, 0, 0, 0x04];
        blob.extend_from_slice(&(0x8000u32 | 0o4644).to_be_bytes());
        assert!(decode(&blob).to_string().starts_with("-rwSr--r--"));
    }

    #[test]
    fn display_appends_size_and_write_time() {
        let mut blob = vec![0, 0, 0, 0x0D];
        blob.extend_from_slice(&42u64.to_be_bytes());
        blob.extend_from_slice(&(0x8000u32 | 0o600).to_be_bytes());
        blob.extend_from_slice(&0u32.to_be_bytes());
        blob.extend_from_slice(&1480673900u32.to_be_bytes());

        let text = decode(&blob).to_string();
        assert_eq!(
            text,
            "-rw------- Size: 42 LastWriteTime: 2016-12-02T10:18:20Z"
        );
    }

    #[test]
    fn empty_record_displays_type_name() {
        assert_eq!(FileAttributes::default().to_string(), "FileAttributes");
    }
}

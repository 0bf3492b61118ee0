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
SSH_FXP_NAME: 104
| u32: id | u32: file count | u32: file0 name length | u8[file0 name length]: file0 name | u32: file0 long name length | u8[file0 long name length]: file0 long name | file0 attrs | ...
 */

use bytes::Bytes;

use crate::decode::SftpDecode;
use crate::encode::SftpEncode;
use crate::Error;

use super::FileAttributes;

#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Name(pub Vec<NameEntry>);

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct NameEntry {
    pub filename: Bytes,
    pub long_name: Bytes,
    pub attrs: FileAttributes,
}

impl SftpDecode for NameEntry {
    fn decode(buf: &mut dyn bytes::Buf) -> Result<Self, Error> {
        let filename = Bytes::decode(buf)?;
        let long_name = Bytes::decode(buf)?;
        let attrs = FileAttributes::decode(buf)?;
        Ok(NameEntry {
            filename,
            long_name,
            attrs,
        })
    }
}

impl SftpEncode for NameEntry {
    fn encode(&self, buf: &mut dyn bytes::BufMut) -> Result<(), Error> {
        self.filename.encode(buf)?;
        self.long_name.encode(buf)?;
        self.attrs.encode(buf)
    }
}

impl SftpDecode for Name {
    fn decode(buf: &mut dyn bytes::Buf) -> Result<Self, Error> {
        Ok(Name(Vec::decode(buf)?))
    }
}

impl SftpEncode for Name {
    fn encode(&self, buf: &mut dyn bytes::BufMut) -> Result<(), Error> {
        self.0.as_slice().encode(buf)
    }
}

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
SSH_FXP_INIT: 1
| u32: version | u32: ext0 name length | u8[ext0 name length]: ext0 name | u32: ext0 value length | u8[ext0 value length]: ext0 value | ...
-> VERSION
 */

use bytes::Buf;

use crate::decode::SftpDecode;
use crate::encode::SftpEncode;
use crate::Error;

use super::version::{decode_extensions, encode_extensions, Extension};

#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Init {
    pub version: u32,
    pub extensions: Vec<Extension>,
}

impl SftpDecode for Init {
    fn decode(buf: &mut dyn Buf) -> Result<Self, Error> {
        let version = u32::decode(buf)?;
        let extensions = decode_extensions(buf)?;
        Ok(Init {
            version,
            extensions,
        })
    }
}

impl SftpEncode for Init {
    fn encode(&self, buf: &mut dyn bytes::BufMut) -> Result<(), Error> {
        self.version.encode(buf)?;
        encode_extensions(&self.extensions, buf)
    }
}

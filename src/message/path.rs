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

use bytes::Bytes;

use crate::decode::SftpDecode;
use crate::encode::SftpEncode;
use crate::Error;

/// A remote path as it travels on the wire: a length-prefixed byte string,
/// UTF-8 by convention, always forward-slash separated.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Path(pub Bytes);

impl Path {
    /// Lossy UTF-8 rendering for error messages and callers that want text.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl<T: Into<Bytes>> From<T> for Path {
    fn from(value: T) -> Self {
        Self(value.into())
    }
}

impl SftpDecode for Path {
    fn decode(buf: &mut dyn bytes::Buf) -> Result<Self, Error> {
        Ok(Path(Bytes::decode(buf)?))
    }
}

impl SftpEncode for Path {
    fn encode(&self, buf: &mut dyn bytes::BufMut) -> Result<(), Error> {
        self.0.encode(buf)
    }
}

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
SSH_FXP_STATUS: 101
| u32: id | u32: status code | u32: error length | u8[error length]: error | u32: language length | u8[language length]: language |
 */

use bytes::Bytes;

use crate::decode::SftpDecode;
use crate::encode::SftpEncode;
use crate::Error;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    Ok = 0,
    Eof = 1,
    NoSuchFile = 2,
    PermissionDenied = 3,
    Failure = 4,
    BadMessage = 5,
    NoConnection = 6,
    ConnectionLost = 7,
    OpUnsupported = 8,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Status {
    pub code: u32,
    pub error: Bytes,
    pub language: Bytes,
}

impl Status {
    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok as u32
    }

    pub fn is_eof(&self) -> bool {
        self.code == StatusCode::Eof as u32
    }

    /// The server's message, or the default sentence for its code when the
    /// server sent none. Codes without a default sentence stringify.
    pub fn message(&self) -> String {
        if !self.error.is_empty() {
            return String::from_utf8_lossy(&self.error).into_owned();
        }

        match StatusCode::try_from(self.code) {
            Ok(StatusCode::Ok) => "The operation completed successfully.".into(),
            Ok(StatusCode::NoSuchFile) => {
                "A reference was made to a file which does not exist.".into()
            }
            Ok(StatusCode::PermissionDenied) => {
                "The user does not have sufficient permissions to perform the operation.".into()
            }
            Ok(StatusCode::Failure) => {
                "An error occurred, but no specific error code exists to describe the failure."
                    .into()
            }
            Ok(StatusCode::BadMessage) => {
                "A badly formatted packet or other protocol incompatibility was detected.".into()
            }
            Ok(StatusCode::OpUnsupported) => {
                "An attempted operation could not be completed by the server.".into()
            }
            _ => self.code.to_string(),
        }
    }
}

impl TryFrom<u32> for StatusCode {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, u32> {
        match value {
            0 => Ok(Self::Ok),
            1 => Ok(Self::Eof),
            2 => Ok(Self::NoSuchFile),
            3 => Ok(Self::PermissionDenied),
            4 => Ok(Self::Failure),
            5 => Ok(Self::BadMessage),
            6 => Ok(Self::NoConnection),
            7 => Ok(Self::ConnectionLost),
            8 => Ok(Self::OpUnsupported),
            other => Err(other),
        }
    }
}

impl SftpDecode for Status {
    fn decode(buf: &mut dyn bytes::Buf) -> Result<Self, Error> {
        let code = u32::decode(buf)?;
        let error = Bytes::decode(buf)?;
        let language = Bytes::decode(buf)?;
        Ok(Status {
            code,
            error,
            language,
        })
    }
}

impl SftpEncode for Status {
    fn encode(&self, buf: &mut dyn bytes::BufMut) -> Result<(), Error> {
        self.code.encode(buf)?;
        self.error.encode(buf)?;
        self.language.encode(buf)
    }
}

/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The closed request/response sums and the length-framed wire codec.
//!
//! Every inbound frame decodes to one [`Request`]; every request produces at
//! most one [`Response`] frame. The dispatcher is exhaustive over the sum.

use std::io::Read;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context as _;
use lsp_server::RequestId;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use starlark_map::small_map::SmallMap;

use crate::error::Error;
use crate::module::handle::FileHandle;
use crate::parse::ast::SourcePosition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Client {
    Persistent,
    FileNotifier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeQuery {
    Attributes(String),
    Methods(String),
    Superclasses(String),
    Join(String, String),
    Meet(String, String),
    LessOrEqual(String, String),
    NormalizeType(String),
    TypeAtLocation {
        path: String,
        line: usize,
        column: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    TypeCheck {
        update_environment_with: Vec<PathBuf>,
        check: Vec<PathBuf>,
    },
    TypeQuery(TypeQuery),
    DisplayTypeErrors(Vec<PathBuf>),
    FlushTypeErrors,
    Stop,
    LanguageServerProtocol(String),
    ClientShutdown(RequestId),
    ClientExit(Client),
    Rage(RequestId),
    GetDefinition {
        id: RequestId,
        path: PathBuf,
        position: SourcePosition,
    },
    Hover {
        id: RequestId,
        path: PathBuf,
        position: SourcePosition,
    },
    OpenDocument(PathBuf),
    CloseDocument(PathBuf),
    SaveDocument(PathBuf),
    ClientConnection(Client),
}

impl Request {
    /// Stable name used for the `server_request` metric.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::TypeCheck { .. } => "TypeCheck",
            Request::TypeQuery(_) => "TypeQuery",
            Request::DisplayTypeErrors(_) => "DisplayTypeErrors",
            Request::FlushTypeErrors => "FlushTypeErrors",
            Request::Stop => "Stop",
            Request::LanguageServerProtocol(_) => "LanguageServerProtocol",
            Request::ClientShutdown(_) => "ClientShutdown",
            Request::ClientExit(_) => "ClientExit",
            Request::Rage(_) => "Rage",
            Request::GetDefinition { .. } => "GetDefinition",
            Request::Hover { .. } => "Hover",
            Request::OpenDocument(_) => "OpenDocument",
            Request::CloseDocument(_) => "CloseDocument",
            Request::SaveDocument(_) => "SaveDocument",
            Request::ClientConnection(_) => "ClientConnection",
        }
    }
}

pub type ErrorsByFile = SmallMap<FileHandle, Vec<Error>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    #[serde(with = "errors_by_file")]
    TypeCheck(ErrorsByFile),
    TypeQuery(String),
    ClientExit(Client),
    Stop,
    LanguageServerProtocol(String),
}

/// `SmallMap` keyed by handles serializes as a plain JSON object.
mod errors_by_file {
    use std::fmt;

    use serde::de::MapAccess;
    use serde::de::Visitor;
    use serde::Deserializer;
    use serde::Serializer;

    use super::ErrorsByFile;
    use crate::error::Error;
    use crate::module::handle::FileHandle;

    pub fn serialize<S: Serializer>(map: &ErrorsByFile, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(map.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<ErrorsByFile, D::Error> {
        struct MapVisitor;

        impl<'de> Visitor<'de> for MapVisitor {
            type Value = ErrorsByFile;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from file handle to errors")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = ErrorsByFile::new();
                while let Some((handle, errors)) =
                    access.next_entry::<FileHandle, Vec<Error>>()?
                {
                    map.insert(handle, errors);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(MapVisitor)
    }
}

/// Write one length-prefixed JSON frame.
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> anyhow::Result<()> {
    let body = serde_json::to_vec(message).context("encoding frame")?;
    let length = u32::try_from(body.len()).context("frame too large")?;
    writer.write_all(&length.to_be_bytes())?;
    writer.write_all(&body)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame; `None` on a clean end of stream.
pub fn read_message<R: Read, T: DeserializeOwned>(reader: &mut R) -> anyhow::Result<Option<T>> {
    let mut length_bytes = [0u8; 4];
    match reader.read_exact(&mut length_bytes) {
        Ok(()) => {}
        Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(error) => return Err(error.into()),
    }
    let length = u32::from_be_bytes(length_bytes) as usize;
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body)?;
    let message = serde_json::from_slice(&body).context("decoding frame")?;
    Ok(Some(message))
}

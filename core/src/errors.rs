// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Common decoding errors and macros.

use std::{collections::TryReserveError, io, result};

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    /// The encoded stream is malformed or inconsistent with itself. The data of the column
    /// chunk cannot be trusted.
    #[error("Protocol Error: {0}")]
    Protocol(String),

    /// The encoding or type is recognized but not supported by this decoder.
    #[error("Not yet implemented: {0}")]
    NotImplemented(String),

    #[error("Allocation Error: {0}")]
    Allocation(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Internal Error: {0}")]
    Internal(String),

    #[error(transparent)]
    Arrow {
        #[from]
        source: ArrowError,
    },

    #[error(transparent)]
    Parquet {
        #[from]
        source: ParquetError,
    },

    #[error(transparent)]
    IO {
        #[from]
        source: io::Error,
    },
}

impl From<TryReserveError> for DecodeError {
    fn from(e: TryReserveError) -> Self {
        DecodeError::Allocation(e.to_string())
    }
}

/// Column-level failures surface to the file orchestrator as I/O errors. The error kind keeps
/// "unsupported file" apart from "corrupt file".
impl From<DecodeError> for io::Error {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::IO { source } => source,
            DecodeError::NotImplemented(_) => io::Error::new(io::ErrorKind::Unsupported, e),
            DecodeError::Allocation(_) => io::Error::new(io::ErrorKind::OutOfMemory, e),
            DecodeError::Config(_) => io::Error::new(io::ErrorKind::InvalidInput, e),
            DecodeError::Internal(_) | DecodeError::Arrow { .. } => io::Error::other(e),
            DecodeError::Protocol(_) | DecodeError::Parquet { .. } => {
                io::Error::new(io::ErrorKind::InvalidData, e)
            }
        }
    }
}

pub type DecodeResult<T> = result::Result<T, DecodeError>;

// ----------------------------------------------------------------------
// Convenient macros for different errors

macro_rules! protocol_err {
    ($fmt:expr) => (crate::errors::DecodeError::Protocol($fmt.to_owned()));
    ($fmt:expr, $($args:expr),*) => (crate::errors::DecodeError::Protocol(format!($fmt, $($args),*)));
}

macro_rules! nyi_err {
    ($fmt:expr) => (crate::errors::DecodeError::NotImplemented($fmt.to_owned()));
    ($fmt:expr, $($args:expr),*) => (crate::errors::DecodeError::NotImplemented(format!($fmt, $($args),*)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros() {
        let e = protocol_err!("level {} exceeds {}", 3, 2);
        assert_eq!(e.to_string(), "Protocol Error: level 3 exceeds 2");

        let e = nyi_err!("DELTA_BINARY_PACKED");
        assert_eq!(e.to_string(), "Not yet implemented: DELTA_BINARY_PACKED");
    }

    #[test]
    fn test_io_error_kind() {
        let e: io::Error = protocol_err!("bad page").into();
        assert_eq!(e.kind(), io::ErrorKind::InvalidData);

        let e: io::Error = nyi_err!("INT96").into();
        assert_eq!(e.kind(), io::ErrorKind::Unsupported);

        let e: io::Error = DecodeError::Allocation("no memory".to_string()).into();
        assert_eq!(e.kind(), io::ErrorKind::OutOfMemory);

        let inner = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        let e: io::Error = DecodeError::from(inner).into();
        assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_try_reserve_error() {
        let mut v: Vec<u64> = Vec::new();
        let e: DecodeError = v.try_reserve(usize::MAX).unwrap_err().into();
        assert!(matches!(e, DecodeError::Allocation(_)));
    }
}

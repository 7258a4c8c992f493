// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
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

//! Simulator error types
//!
//! Every failure is fatal to the current simulation run: the driver reports
//! the error and exits non-zero. There is no internal retry.

use thiserror::Error;

/// Result type for simulator operations
pub type Result<T> = std::result::Result<T, SimulatorError>;

/// Simulator error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulatorError {
    /// An instruction-file line that is not a 32-character binary string
    #[error("line {line}: malformed instruction {text:?} (expected 32 binary digits)")]
    MalformedInstruction {
        /// 1-based line number in the input file
        line: usize,
        /// The offending line, after trimming
        text: String,
    },

    /// An (opcode, funct) pair with no entry in the instruction table
    #[error("unknown instruction: opcode {opcode:06b}, funct {funct:06b}")]
    UnknownInstruction {
        /// 6-bit opcode field
        opcode: u8,
        /// 6-bit funct field
        funct: u8,
    },

    /// A word address outside the backing memory
    #[error("memory address {address} out of range (memory holds {size} words)")]
    AddressOutOfRange {
        /// The word address that was accessed
        address: u32,
        /// Memory size in words
        size: usize,
    },

    /// Cache construction with a geometry that is not a power-of-two split
    #[error("invalid cache geometry: {reason}")]
    InvalidCacheGeometry {
        /// Which constraint was violated
        reason: String,
    },

    /// Unreadable or invalid TOML configuration
    #[error("config error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error (file operations)
    #[error("I/O error: {message}")]
    Io {
        /// Error message
        message: String,
    },
}

impl From<std::io::Error> for SimulatorError {
    fn from(err: std::io::Error) -> Self {
        SimulatorError::Io {
            message: err.to_string(),
        }
    }
}

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

//! Program loading and simulator configuration
//!
//! # Instruction files
//!
//! Plain text, one instruction per line, each line exactly 32 characters
//! from `{0, 1}` after trimming surrounding whitespace. Empty lines load
//! as the 32-bit zero word (a nop). Anything else fails the load with the
//! 1-based line number.
//!
//! # Configuration
//!
//! `SimConfig` is read from a TOML file; every key is optional and
//! defaults to the standard machine:
//!
//! ```text
//! [cache]
//! size_bytes = 256
//! line_bytes = 32
//! ways = 2
//!
//! [memory]
//! data_words = 4096
//! inst_words = 4096
//! ```

use crate::core::bits;
use crate::core::error::{Result, SimulatorError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Cache geometry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Total cache size in bytes
    pub size_bytes: u32,
    /// Line size in bytes
    pub line_bytes: u32,
    /// Associativity
    pub ways: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size_bytes: 256,
            line_bytes: 32,
            ways: 2,
        }
    }
}

/// Memory sizing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Data memory size in words; word `i` starts out holding `i`
    pub data_words: usize,
    /// Instruction memory size in words; zeroed except for the program
    pub inst_words: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_words: 4096,
            inst_words: 4096,
        }
    }
}

/// Simulator configuration
///
/// # Example
/// ```
/// use mipsim::core::loader::SimConfig;
///
/// let config = SimConfig::parse("[cache]\nways = 2\n").unwrap();
/// assert_eq!(config.cache.size_bytes, 256); // default preserved
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub cache: CacheConfig,
    pub memory: MemoryConfig,
}

impl SimConfig {
    /// Parse configuration from a TOML string
    ///
    /// # Errors
    ///
    /// `Config` if the TOML is invalid.
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| SimulatorError::Config {
            message: err.to_string(),
        })
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, `Config` if it does not parse.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }
}

/// Parse an instruction stream from text
///
/// # Errors
///
/// `MalformedInstruction` with the 1-based line number for any trimmed
/// line that is not empty and not exactly 32 binary digits.
///
/// # Example
/// ```
/// use mipsim::core::loader::parse_program;
///
/// let program = parse_program("00100000000000010000000000000101\n\n").unwrap();
/// assert_eq!(program, vec![0b001000_00000_00001_0000000000000101, 0]);
/// ```
pub fn parse_program(text: &str) -> Result<Vec<u32>> {
    let mut program = Vec::new();
    for (index, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            // Empty line loads as the zero word (nop)
            program.push(0);
            continue;
        }
        match bits::parse_word(line) {
            Some(word) => program.push(word),
            None => {
                return Err(SimulatorError::MalformedInstruction {
                    line: index + 1,
                    text: line.to_string(),
                })
            }
        }
    }
    Ok(program)
}

/// Read and parse an instruction file
///
/// # Errors
///
/// `Io` if the file cannot be read, `MalformedInstruction` on a bad line.
pub fn load_program<P: AsRef<Path>>(path: P) -> Result<Vec<u32>> {
    parse_program(&fs::read_to_string(path)?)
}

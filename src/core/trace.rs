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

//! Per-cycle trace output
//!
//! Each simulated cycle emits five stage lines in order (fetched, decoded,
//! execute, memory, write-back), separated by stage and cycle separator
//! lines. Stages holding a bubble report `nop`. The tracer
//! writes line-oriented UTF-8 to any [`Write`] sink; the driver hands it
//! stdout, tests hand it a buffer, and `--quiet` disables it entirely.

use crate::core::error::Result;
use crate::core::registers::RegisterFile;
use crate::core::system::Summary;
use std::io::{self, Write};

const STAGE_SEPARATOR: &str = "------------------";

/// Per-cycle pipeline trace writer
///
/// # Example
/// ```
/// use mipsim::core::trace::CycleTracer;
///
/// let mut buffer = Vec::new();
/// let mut tracer = CycleTracer::new(&mut buffer);
/// tracer.cycle_start(1).unwrap();
/// tracer.fetched("00000000000000000000000000000000").unwrap();
/// assert!(String::from_utf8(buffer).unwrap().contains("cycle 1"));
/// ```
pub struct CycleTracer<W: Write> {
    /// When disabled, every call returns immediately without writing
    enabled: bool,
    out: W,
}

impl CycleTracer<io::Stdout> {
    /// A tracer writing to standard output
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl CycleTracer<io::Sink> {
    /// A disabled tracer that discards everything
    pub fn sink() -> Self {
        Self {
            enabled: false,
            out: io::sink(),
        }
    }
}

impl<W: Write> CycleTracer<W> {
    /// Create an enabled tracer over any writer
    pub fn new(out: W) -> Self {
        Self { enabled: true, out }
    }

    /// Enable or disable tracing
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Check if tracing is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Start a cycle: the inter-cycle separator line
    pub fn cycle_start(&mut self, cycle: u64) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        writeln!(self.out, "================== cycle {cycle} ==================")?;
        Ok(())
    }

    /// The fetch stage line: the raw instruction bits
    pub fn fetched(&mut self, instruction_bits: &str) -> Result<()> {
        self.stage("fetched", instruction_bits)
    }

    /// The decode stage line: mnemonic and operand names
    pub fn decoded(&mut self, text: &str) -> Result<()> {
        self.stage("decoded", text)
    }

    /// The execute stage line: computed values, branch outcome
    pub fn execute(&mut self, text: &str) -> Result<()> {
        self.stage("execute", text)
    }

    /// The memory stage line: cache hit/miss and the word touched
    pub fn memory(&mut self, text: &str) -> Result<()> {
        self.stage("memory", text)
    }

    /// The write-back stage line: any register update; ends the cycle block
    pub fn write_back(&mut self, text: &str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        writeln!(self.out, "write-back: {text}")?;
        writeln!(self.out)?;
        Ok(())
    }

    fn stage(&mut self, label: &str, text: &str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        writeln!(self.out, "{label}: {text}")?;
        writeln!(self.out, "{STAGE_SEPARATOR}")?;
        Ok(())
    }

    /// Final run summary: counts, throughput, cache statistics
    pub fn summary(&mut self, summary: &Summary) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        writeln!(
            self.out,
            "instructions: {}, cycles: {} ({} stall{})",
            summary.instructions,
            summary.cycles,
            summary.stalls,
            if summary.stalls == 1 { "" } else { "s" }
        )?;
        writeln!(self.out, "throughput: {:.4}", summary.throughput)?;
        writeln!(
            self.out,
            "cache: {} hits, {} misses, {} writebacks",
            summary.cache.hits, summary.cache.misses, summary.cache.writebacks
        )?;
        Ok(())
    }

    /// Dump all 32 registers, one per line
    pub fn register_dump(&mut self, regs: &RegisterFile) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        for index in 0..32u8 {
            let value = regs.read(index);
            writeln!(self.out, "${index}: {} (0x{value:08X})", value as i32)?;
        }
        Ok(())
    }

    /// Flush the underlying writer
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

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

//! System integration
//!
//! The `System` aggregate owns every piece of simulated state (register
//! file, instruction and data memories, data cache, the four pipeline
//! latches, PC, HI/LO, and counters) for the lifetime of a run. Time
//! advances in discrete ticks: each tick executes all five stages against
//! the previous cycle's latch values and commits the next-cycle values at
//! the end (see `stages.rs`).

mod stages;

use super::error::Result;
use super::loader::SimConfig;
use super::memory::cache::{CacheStats, DataCache};
use super::memory::Memory;
use super::pipeline::{ExMem, IdEx, IfId, MemWb};
use super::registers::RegisterFile;
use super::trace::CycleTracer;
use serde::Serialize;
use std::io::Write;

/// Number of pipeline stages
pub const PIPELINE_DEPTH: u64 = 5;

/// Cycles needed to drain the pipeline after the last fetch
const DRAIN_CYCLES: u64 = PIPELINE_DEPTH - 1;

/// Final run statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    /// Instructions loaded (including empty-line nops)
    pub instructions: usize,
    /// Total simulated cycles
    pub cycles: u64,
    /// Stall cycles inserted for load-use hazards
    pub stalls: u64,
    /// Instructions per cycle
    pub throughput: f64,
    /// Cache hit/miss/writeback counters
    pub cache: CacheStats,
}

/// The simulated machine
///
/// # Example
/// ```
/// use mipsim::core::loader::SimConfig;
/// use mipsim::core::system::System;
/// use mipsim::core::trace::CycleTracer;
///
/// let mut system = System::new(&SimConfig::default()).unwrap();
/// // addi $1, $0, 5
/// system.load_program(&[0b001000_00000_00001_0000000000000101]).unwrap();
/// system.run(&mut CycleTracer::sink()).unwrap();
/// assert_eq!(system.registers().read(1), 5);
/// ```
pub struct System {
    /// Architectural register file; written by the WB stage
    pub(super) regs: RegisterFile,
    /// Instruction memory; zeroed except for the loaded program
    pub(super) inst_mem: Memory,
    /// Data memory; word `i` starts out holding `i`
    pub(super) data_mem: Memory,
    /// Data cache; accessed only by the MEM stage
    pub(super) cache: DataCache,
    /// IF/ID latch
    pub(super) if_id: IfId,
    /// ID/EX latch
    pub(super) id_ex: IdEx,
    /// EX/MEM latch
    pub(super) ex_mem: ExMem,
    /// MEM/WB latch
    pub(super) mem_wb: MemWb,
    /// Program counter (word address)
    pub(super) pc: u32,
    /// HI register (upper half of a mult product)
    pub(super) hi: u32,
    /// LO register (lower half of a mult product)
    pub(super) lo: u32,
    /// Cycles executed so far
    pub(super) cycle: u64,
    /// Stall cycles inserted so far
    pub(super) stall_count: u64,
    /// Number of instructions loaded
    pub(super) program_len: usize,
}

impl System {
    /// Construct the machine described by `config`
    ///
    /// # Errors
    ///
    /// `InvalidCacheGeometry` if the configured cache geometry is not a
    /// power-of-two split.
    pub fn new(config: &SimConfig) -> Result<Self> {
        let cache = DataCache::new(
            config.cache.size_bytes,
            config.cache.line_bytes,
            config.cache.ways,
        )?;
        Ok(Self {
            regs: RegisterFile::new(),
            inst_mem: Memory::new(config.memory.inst_words),
            data_mem: Memory::with_identity(config.memory.data_words),
            cache,
            if_id: IfId::default(),
            id_ex: IdEx::default(),
            ex_mem: ExMem::default(),
            mem_wb: MemWb::default(),
            pc: 0,
            hi: 0,
            lo: 0,
            cycle: 0,
            stall_count: 0,
            program_len: 0,
        })
    }

    /// Load an instruction stream at the start of instruction memory
    ///
    /// # Errors
    ///
    /// `AddressOutOfRange` if the program is larger than instruction
    /// memory.
    pub fn load_program(&mut self, program: &[u32]) -> Result<()> {
        for (index, word) in program.iter().enumerate() {
            self.inst_mem.write(index as u32, *word)?;
        }
        self.program_len = program.len();
        log::info!("loaded {} instruction(s)", program.len());
        Ok(())
    }

    /// The cycle budget: one per instruction, four to drain, one per stall
    pub fn total_cycles(&self) -> u64 {
        self.program_len as u64 + DRAIN_CYCLES + self.stall_count
    }

    /// Run the simulated clock until the pipeline has drained
    ///
    /// Emits the per-cycle trace, then the summary and a register dump,
    /// through `tracer`.
    ///
    /// # Errors
    ///
    /// Any decode or memory error is fatal and stops the run.
    pub fn run<W: Write>(&mut self, tracer: &mut CycleTracer<W>) -> Result<Summary> {
        while self.cycle < self.total_cycles() {
            self.step_cycle(tracer)?;
        }

        let summary = self.summary();
        tracer.summary(&summary)?;
        tracer.register_dump(&self.regs)?;
        tracer.flush()?;
        log::info!(
            "run complete: {} cycles, {} stall(s), throughput {:.4}",
            summary.cycles,
            summary.stalls,
            summary.throughput
        );
        Ok(summary)
    }

    /// Final run statistics
    pub fn summary(&self) -> Summary {
        let throughput = if self.cycle == 0 {
            0.0
        } else {
            self.program_len as f64 / self.cycle as f64
        };
        Summary {
            instructions: self.program_len,
            cycles: self.cycle,
            stalls: self.stall_count,
            throughput,
            cache: self.cache.stats(),
        }
    }

    /// The register file
    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// Mutable register file, for presetting test state
    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.regs
    }

    /// The data memory
    pub fn data_memory(&self) -> &Memory {
        &self.data_mem
    }

    /// Mutable data memory, for presetting test state
    pub fn data_memory_mut(&mut self) -> &mut Memory {
        &mut self.data_mem
    }

    /// The data cache
    pub fn cache(&self) -> &DataCache {
        &self.cache
    }

    /// Current program counter (word address)
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Cycles executed so far
    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    /// Stall cycles inserted so far
    pub fn stalls(&self) -> u64 {
        self.stall_count
    }

    /// The HI/LO multiply result pair
    pub fn hi_lo(&self) -> (u32, u32) {
        (self.hi, self.lo)
    }
}

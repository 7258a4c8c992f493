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

//! Hazard detection and forwarding
//!
//! The forwarding unit resolves RAW hazards by steering each EX operand
//! from the newest in-flight producer: the EX/MEM latch first, then
//! MEM/WB, then the architectural register file. The load-use case cannot
//! be forwarded (the loaded word does not exist until MEM completes) and
//! stalls the pipeline for one cycle instead.

use crate::core::instruction::Signals;
use crate::core::pipeline::{ExMem, IdEx, IfId, MemWb};

/// Where an EX operand is taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForwardSource {
    /// No hazard: read the architectural register
    #[default]
    RegisterFile,
    /// EX hazard: the previous instruction's ALU result in EX/MEM
    ExMem,
    /// MEM hazard: the result two instructions back, in MEM/WB
    MemWb,
}

/// Forwarding decision for both EX operands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Forwarding {
    /// Source for operand 1 (the rs value)
    pub operand_a: ForwardSource,
    /// Source for operand 2 (the rt value)
    pub operand_b: ForwardSource,
}

/// Resolve forwarding for the instruction entering EX
///
/// For each source register, in priority order: EX/MEM when it will write
/// that non-zero register; else MEM/WB under the same condition; else the
/// register file. The destination compared against is the *resolved* one
/// (rd or rt per REG_DST).
pub fn forward(ex_mem: &ExMem, mem_wb: &MemWb, rs: u8, rt: u8) -> Forwarding {
    Forwarding {
        operand_a: forward_one(ex_mem, mem_wb, rs),
        operand_b: forward_one(ex_mem, mem_wb, rt),
    }
}

fn forward_one(ex_mem: &ExMem, mem_wb: &MemWb, source: u8) -> ForwardSource {
    if matches!(ex_mem.dest_reg(), Some(dest) if dest != 0 && dest == source) {
        return ForwardSource::ExMem;
    }
    if matches!(mem_wb.dest_reg(), Some(dest) if dest != 0 && dest == source) {
        return ForwardSource::MemWb;
    }
    ForwardSource::RegisterFile
}

/// Detect the load-use hazard
///
/// True when the load in ID/EX produces a register the instruction in
/// IF/ID consumes. The engine then stalls one cycle: PC and IF/ID freeze
/// and a bubble enters ID/EX, so the consumer meets the loaded word
/// through the MEM/WB forwarding path a cycle later.
pub fn load_use_stall(id_ex: &IdEx, if_id: &IfId) -> bool {
    id_ex.ctrl.signals.contains(Signals::MEM_READ)
        && id_ex.fields.rt != 0
        && (id_ex.fields.rt == if_id.fields.rs || id_ex.fields.rt == if_id.fields.rt)
}

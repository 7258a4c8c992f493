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

//! Inter-stage pipeline latches
//!
//! Four records hold the values a stage publishes for the next cycle:
//! IF/ID, ID/EX, EX/MEM, and MEM/WB. Each stage reads only the
//! previous-cycle latch values and the engine commits the next-cycle
//! values atomically at the end of the tick.
//!
//! `Default` for every latch is the all-zero bubble: the zero-word
//! instruction with every control signal cleared.

use crate::core::instruction::{decode_fields, Control, InstrFields, Signals};

/// IF/ID latch: the fetched instruction and its decomposed fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IfId {
    /// PC of the fetched instruction (word address)
    pub pc: u32,
    /// Raw instruction word
    pub ir: u32,
    /// Decomposed instruction fields
    pub fields: InstrFields,
}

/// ID/EX latch: fields plus the decoded control bundle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdEx {
    pub pc: u32,
    pub ir: u32,
    pub fields: InstrFields,
    pub ctrl: Control,
}

/// EX/MEM latch: the ALU result and the carried store value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExMem {
    pub pc: u32,
    pub ir: u32,
    pub fields: InstrFields,
    pub ctrl: Control,
    /// ALU result (for loads and stores, the effective word address)
    pub alu_out: u32,
    /// The rt register value a store writes to memory
    pub store_value: u32,
    /// Branch-compare zero flag
    pub zero: bool,
    /// Full Booth product of a `mult`, destined for HI/LO
    pub mult_result: Option<(u32, u32)>,
}

/// MEM/WB latch: everything write-back needs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemWb {
    pub pc: u32,
    pub ir: u32,
    pub fields: InstrFields,
    pub ctrl: Control,
    pub alu_out: u32,
    /// The word a load pulled from the cache
    pub mem_data: Option<u32>,
    pub mult_result: Option<(u32, u32)>,
}

impl IfId {
    /// Latch a freshly fetched instruction
    pub fn fetch(pc: u32, ir: u32) -> Self {
        Self {
            pc,
            ir,
            fields: decode_fields(ir),
        }
    }

    /// True for the zero-word bubble
    #[inline]
    pub fn is_bubble(&self) -> bool {
        self.ir == 0
    }
}

impl IdEx {
    /// Latch a decoded instruction with its control bundle
    pub fn decode(if_id: &IfId, ctrl: Control) -> Self {
        Self {
            pc: if_id.pc,
            ir: if_id.ir,
            fields: if_id.fields,
            ctrl,
        }
    }

    #[inline]
    pub fn is_bubble(&self) -> bool {
        self.ir == 0
    }
}

impl ExMem {
    #[inline]
    pub fn is_bubble(&self) -> bool {
        self.ir == 0
    }

    /// The register write-back will target, if any
    ///
    /// `None` unless REG_WRITE is set; rd when REG_DST, else rt.
    pub fn dest_reg(&self) -> Option<u8> {
        dest_reg(&self.ctrl, &self.fields)
    }
}

impl MemWb {
    #[inline]
    pub fn is_bubble(&self) -> bool {
        self.ir == 0
    }

    /// The register write-back will target, if any
    pub fn dest_reg(&self) -> Option<u8> {
        dest_reg(&self.ctrl, &self.fields)
    }

    /// The value write-back commits: the loaded word for a load, the ALU
    /// result otherwise
    pub fn writeback_value(&self) -> u32 {
        if self.ctrl.signals.contains(Signals::MEM_TO_REG) {
            self.mem_data.unwrap_or(self.alu_out)
        } else {
            self.alu_out
        }
    }
}

fn dest_reg(ctrl: &Control, fields: &InstrFields) -> Option<u8> {
    if !ctrl.signals.contains(Signals::REG_WRITE) {
        return None;
    }
    if ctrl.signals.contains(Signals::REG_DST) {
        Some(fields.rd)
    } else {
        Some(fields.rt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instruction::Mnemonic;

    #[test]
    fn test_default_latches_are_bubbles() {
        assert!(IfId::default().is_bubble());
        assert!(IdEx::default().is_bubble());
        assert!(ExMem::default().is_bubble());
        assert!(MemWb::default().is_bubble());
        assert_eq!(IdEx::default().ctrl, Control::default());
    }

    #[test]
    fn test_fetch_decomposes_fields() {
        // add $3, $1, $2
        let latch = IfId::fetch(7, 0b000000_00001_00010_00011_00000_100000);
        assert_eq!(latch.pc, 7);
        assert_eq!(latch.fields.rs, 1);
        assert_eq!(latch.fields.rt, 2);
        assert_eq!(latch.fields.rd, 3);
        assert!(!latch.is_bubble());
    }

    #[test]
    fn test_dest_reg_r_type_uses_rd() {
        let ir = 0b000000_00001_00010_00011_00000_100000; // add $3, $1, $2
        let latch = ExMem {
            ir,
            fields: decode_fields(ir),
            ctrl: Mnemonic::Add.control(),
            ..Default::default()
        };
        assert_eq!(latch.dest_reg(), Some(3));
    }

    #[test]
    fn test_dest_reg_i_type_uses_rt() {
        let ir = 0b001000_00000_00001_0000000000000101; // addi $1, $0, 5
        let latch = ExMem {
            ir,
            fields: decode_fields(ir),
            ctrl: Mnemonic::Addi.control(),
            ..Default::default()
        };
        assert_eq!(latch.dest_reg(), Some(1));
    }

    #[test]
    fn test_dest_reg_none_without_reg_write() {
        let ir = 0b101011_00000_00001_0000000000000000; // sw $1, 0($0)
        let latch = MemWb {
            ir,
            fields: decode_fields(ir),
            ctrl: Mnemonic::Sw.control(),
            ..Default::default()
        };
        assert_eq!(latch.dest_reg(), None);
    }

    #[test]
    fn test_writeback_value_prefers_memory_word_for_loads() {
        let ir = 0b100011_00000_00001_0000000000000000; // lw $1, 0($0)
        let latch = MemWb {
            ir,
            fields: decode_fields(ir),
            ctrl: Mnemonic::Lw.control(),
            alu_out: 40,
            mem_data: Some(42),
            ..Default::default()
        };
        assert_eq!(latch.writeback_value(), 42);
    }
}

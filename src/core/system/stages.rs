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

//! The five pipeline stages and the per-tick sequencing
//!
//! A tick runs fetch, decode, execute, memory, and write-back against the
//! latch values the previous tick published, then commits the next-cycle
//! latches, the PC, and any stall or squash in one step at the end. That
//! models the stages running in parallel: nothing a stage writes this tick
//! is visible to another stage until the next one.
//!
//! Stage behavior follows the latched control signals: `alu_src` and
//! `alu_op` steer the EX datapath and BRANCH gates the redirect, MEM_READ
//! and MEM_WRITE select the cache operation, and MEM_TO_REG, REG_WRITE,
//! and REG_DST steer write-back.
//!
//! Forwarding reads the EX/MEM and MEM/WB latches computed in the previous
//! tick, matching real hardware; the register file is the fallback when no
//! in-flight producer matches.

use super::System;
use crate::core::alu;
use crate::core::bits;
use crate::core::error::Result;
use crate::core::hazard::{self, ForwardSource};
use crate::core::instruction::{disassemble, AluOp, AluSrc, Mnemonic, Signals};
use crate::core::memory::cache::WriteOrigin;
use crate::core::pipeline::{ExMem, IdEx, IfId, MemWb};
use crate::core::registers::reg_name;
use crate::core::trace::CycleTracer;
use std::io::Write;

/// Everything the EX stage publishes for the tick commit
#[derive(Default)]
struct ExOutput {
    alu_out: u32,
    store_value: u32,
    zero: bool,
    mult_result: Option<(u32, u32)>,
    /// Branch-taken redirect target
    redirect: Option<u32>,
    trace: String,
}

impl System {
    /// Execute one simulated clock cycle
    ///
    /// # Errors
    ///
    /// Decode failures and out-of-range memory accesses abort the run.
    pub fn step_cycle<W: Write>(&mut self, tracer: &mut CycleTracer<W>) -> Result<()> {
        tracer.cycle_start(self.cycle + 1)?;

        // IF: read the instruction word at PC
        let fetched_ir = self.inst_mem.read(self.pc)?;
        tracer.fetched(&bits::word_to_bits(fetched_ir))?;

        // ID: classify the instruction in IF/ID and emit control signals
        let decoded = Mnemonic::decode(self.if_id.ir)?;
        let ctrl = decoded.control();
        tracer.decoded(&disassemble(self.if_id.ir))?;

        // Load-use hazard check between ID/EX and IF/ID
        let stall = hazard::load_use_stall(&self.id_ex, &self.if_id);

        // EX, MEM, WB over the previous-cycle latches
        let ex_out = self.execute_stage()?;
        tracer.execute(&ex_out.trace)?;

        let (mem_data, mem_trace) = self.memory_stage()?;
        tracer.memory(&mem_trace)?;

        let wb_trace = self.write_back_stage();
        tracer.write_back(&wb_trace)?;

        // Commit: next-cycle latches become current atomically
        self.mem_wb = MemWb {
            pc: self.ex_mem.pc,
            ir: self.ex_mem.ir,
            fields: self.ex_mem.fields,
            ctrl: self.ex_mem.ctrl,
            alu_out: self.ex_mem.alu_out,
            mem_data,
            mult_result: self.ex_mem.mult_result,
        };
        self.ex_mem = ExMem {
            pc: self.id_ex.pc,
            ir: self.id_ex.ir,
            fields: self.id_ex.fields,
            ctrl: self.id_ex.ctrl,
            alu_out: ex_out.alu_out,
            store_value: ex_out.store_value,
            zero: ex_out.zero,
            mult_result: ex_out.mult_result,
        };

        if let Some(target) = ex_out.redirect {
            // Taken branch: squash the two younger instructions and redirect
            self.if_id = IfId::default();
            self.id_ex = IdEx::default();
            self.pc = target;
        } else if stall {
            // Freeze PC and IF/ID, bubble ID/EX; the budget grows by one
            self.id_ex = IdEx::default();
            self.stall_count += 1;
            log::debug!("load-use stall at cycle {}", self.cycle + 1);
        } else {
            self.id_ex = IdEx::decode(&self.if_id, ctrl);
            self.if_id = IfId::fetch(self.pc, fetched_ir);
            self.pc = self.pc.wrapping_add(1);
        }

        self.cycle += 1;
        Ok(())
    }

    /// EX: operand selection (with forwarding), ALU, branch resolution
    ///
    /// The latched control bundle drives the datapath: `alu_src` selects
    /// the second operand, `alu_op` selects the operation class (refined
    /// by the funct field on the R-type row and by the opcode on the
    /// immediate row), and BRANCH gates the PC redirect.
    fn execute_stage(&self) -> Result<ExOutput> {
        let latch = self.id_ex;
        if latch.is_bubble() {
            return Ok(ExOutput {
                trace: "nop".to_string(),
                ..ExOutput::default()
            });
        }

        let mnemonic = Mnemonic::decode(latch.ir)?;
        if mnemonic == Mnemonic::Break {
            return Ok(ExOutput {
                trace: "break".to_string(),
                ..ExOutput::default()
            });
        }
        if mnemonic.is_reserved() {
            return Ok(ExOutput {
                trace: format!("{} (reserved, no effect)", disassemble(latch.ir)),
                ..ExOutput::default()
            });
        }

        let fields = latch.fields;
        let forwarding = hazard::forward(&self.ex_mem, &self.mem_wb, fields.rs, fields.rt);
        let rs_value = self.operand(forwarding.operand_a, fields.rs);
        let rt_value = self.operand(forwarding.operand_b, fields.rt);
        let immediate = bits::sign_extend16(fields.imm);
        let operand_b = match latch.ctrl.alu_src {
            AluSrc::Register => rt_value,
            AluSrc::Immediate => immediate,
        };
        let disasm = disassemble(latch.ir);

        let mut out = ExOutput {
            store_value: rt_value,
            ..ExOutput::default()
        };

        match latch.ctrl.alu_op {
            AluOp::Function => {
                // R-type row: the funct field picks the operation
                match mnemonic {
                    Mnemonic::Add => out.alu_out = alu::add(rs_value, operand_b),
                    Mnemonic::Sub => out.alu_out = alu::sub(rs_value, operand_b),
                    Mnemonic::And => out.alu_out = alu::and(rs_value, operand_b),
                    Mnemonic::Or => out.alu_out = alu::or(rs_value, operand_b),
                    Mnemonic::Xor => out.alu_out = alu::xor(rs_value, operand_b),
                    Mnemonic::Nor => out.alu_out = alu::nor(rs_value, operand_b),
                    Mnemonic::Sll => out.alu_out = alu::sll(operand_b, u32::from(fields.shamt)),
                    Mnemonic::Srl => out.alu_out = alu::srl(operand_b, u32::from(fields.shamt)),
                    Mnemonic::Mult => {
                        let product = alu::mult(rs_value, operand_b, 32);
                        let hi = (product >> 32) as u32;
                        let lo = product as u32;
                        out.alu_out = lo;
                        out.mult_result = Some((hi, lo));
                        out.trace = format!("{disasm} => 0x{product:016X}");
                        return Ok(out);
                    }
                    // Reserved R-type forms carry the all-zero bundle and
                    // returned above
                    _ => {}
                }
                out.trace = format!("{disasm} => 0x{:08X}", out.alu_out);
            }
            AluOp::BranchCompare => {
                out.alu_out = alu::sub(rs_value, operand_b);
                out.zero = out.alu_out == 0;
                out.trace = format!("{disasm} => 0x{:08X}", out.alu_out);
                if latch.ctrl.signals.contains(Signals::BRANCH) {
                    let taken = match mnemonic {
                        Mnemonic::Beq => out.zero,
                        _ => !out.zero,
                    };
                    if taken {
                        let target = latch.pc.wrapping_add(1).wrapping_add(immediate);
                        out.redirect = Some(target);
                        out.trace = format!("{disasm} => taken, target {target}");
                    } else {
                        out.trace = format!("{disasm} => not taken");
                    }
                }
            }
            AluOp::MemAddress => {
                // Immediate row: address arithmetic by default, with the
                // opcode refining the logical immediates
                out.alu_out = match mnemonic {
                    Mnemonic::Andi => alu::and(rs_value, operand_b),
                    Mnemonic::Ori => alu::or(rs_value, operand_b),
                    Mnemonic::Xori => alu::xor(rs_value, operand_b),
                    _ => alu::add(rs_value, operand_b),
                };
                out.trace = if latch
                    .ctrl
                    .signals
                    .intersects(Signals::MEM_READ | Signals::MEM_WRITE)
                {
                    format!("{disasm} => address {}", out.alu_out)
                } else {
                    format!("{disasm} => 0x{:08X}", out.alu_out)
                };
            }
        }

        Ok(out)
    }

    /// Select an EX operand per the forwarding decision
    fn operand(&self, source: ForwardSource, register: u8) -> u32 {
        match source {
            ForwardSource::RegisterFile => self.regs.read(register),
            ForwardSource::ExMem => self.ex_mem.alu_out,
            ForwardSource::MemWb => self.mem_wb.writeback_value(),
        }
    }

    /// MEM: cache read for loads, cache write for stores
    fn memory_stage(&mut self) -> Result<(Option<u32>, String)> {
        let latch = self.ex_mem;
        if latch.is_bubble() {
            return Ok((None, "nop".to_string()));
        }

        if latch.ctrl.signals.contains(Signals::MEM_READ) {
            let access = self.cache.read(&mut self.data_mem, latch.alu_out)?;
            let outcome = if access.hit { "cache hit" } else { "cache miss" };
            let trace = format!(
                "{outcome}, word {} = 0x{:08X}",
                latch.alu_out, access.value
            );
            return Ok((Some(access.value), trace));
        }

        if latch.ctrl.signals.contains(Signals::MEM_WRITE) {
            let access = self.cache.write(
                &mut self.data_mem,
                latch.alu_out,
                latch.store_value,
                WriteOrigin::Cpu,
            )?;
            let outcome = if access.hit { "cache hit" } else { "cache miss" };
            let trace = format!(
                "{outcome}, word {} <- 0x{:08X}",
                latch.alu_out, latch.store_value
            );
            return Ok((None, trace));
        }

        Ok((None, "no memory access".to_string()))
    }

    /// WB: commit the register (or HI/LO) effect of the oldest instruction
    fn write_back_stage(&mut self) -> String {
        let latch = self.mem_wb;
        if latch.is_bubble() {
            return "nop".to_string();
        }

        if let Some((hi, lo)) = latch.mult_result {
            self.hi = hi;
            self.lo = lo;
            return format!("hi = 0x{hi:08X}, lo = 0x{lo:08X}");
        }

        if latch.ctrl.signals.contains(Signals::MEM_TO_REG) {
            // Load: the memory word goes to rt
            let value = latch.writeback_value();
            self.regs.write(latch.fields.rt, value);
            return format!(
                "{} = {} (0x{value:08X})",
                reg_name(latch.fields.rt),
                value as i32
            );
        }

        if latch.ctrl.signals.contains(Signals::REG_WRITE) {
            let dest = if latch.ctrl.signals.contains(Signals::REG_DST) {
                latch.fields.rd
            } else {
                latch.fields.rt
            };
            self.regs.write(dest, latch.alu_out);
            return format!(
                "{} = {} (0x{:08X})",
                reg_name(dest),
                latch.alu_out as i32,
                latch.alu_out
            );
        }

        match Mnemonic::decode(latch.ir) {
            Ok(Mnemonic::Break) => "break".to_string(),
            Ok(m) if m.is_reserved() => format!("{} (no effect)", m.name()),
            _ => "no register write".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader::SimConfig;
    use crate::core::memory::cache::MsiState;

    fn system_with(program: &[u32]) -> System {
        let mut system = System::new(&SimConfig::default()).unwrap();
        system.load_program(program).unwrap();
        system
    }

    fn run(system: &mut System) {
        system.run(&mut CycleTracer::sink()).unwrap();
    }

    // Hand-assembled encodings used across the stage tests
    const ADDI_1_0_5: u32 = 0b001000_00000_00001_0000000000000101; // addi $1, $0, 5
    const ADDI_2_0_3: u32 = 0b001000_00000_00010_0000000000000011; // addi $2, $0, 3
    const ADD_3_1_2: u32 = 0b000000_00001_00010_00011_00000_100000; // add $3, $1, $2
    const LW_1_0_0: u32 = 0b100011_00000_00001_0000000000000000; // lw $1, 0($0)
    const ADD_2_1_1: u32 = 0b000000_00001_00001_00010_00000_100000; // add $2, $1, $1

    #[test]
    fn test_single_addi() {
        let mut system = system_with(&[ADDI_1_0_5]);
        run(&mut system);
        assert_eq!(system.registers().read(1), 5);
        assert_eq!(system.cycles(), 5);
        assert_eq!(system.stalls(), 0);
    }

    #[test]
    fn test_back_to_back_dependency_forwards_without_stall() {
        let mut system = system_with(&[ADDI_1_0_5, ADDI_2_0_3, ADD_3_1_2]);
        run(&mut system);
        assert_eq!(system.registers().read(3), 8);
        assert_eq!(system.stalls(), 0);
    }

    #[test]
    fn test_load_use_inserts_one_stall() {
        let mut system = system_with(&[LW_1_0_0, ADD_2_1_1]);
        system.data_memory_mut().write(0, 42).unwrap();
        run(&mut system);
        assert_eq!(system.stalls(), 1);
        assert_eq!(system.cycles(), 2 + 4 + 1);
        assert_eq!(system.registers().read(1), 42);
        assert_eq!(system.registers().read(2), 84);
    }

    #[test]
    fn test_store_dirties_cache_not_memory() {
        // addi $1, $0, 5; two spacer nops; sw $1, 4($0)
        let sw_1_4_0: u32 = 0b101011_00000_00001_0000000000000100;
        let mut system = system_with(&[ADDI_1_0_5, 0, 0, sw_1_4_0]);
        run(&mut system);
        assert_eq!(system.cache().state(4), MsiState::Modified);
        // Write-back cache: memory still holds the identity value
        assert_eq!(system.data_memory().read(4).unwrap(), 4);
    }

    #[test]
    fn test_branch_taken_squashes_younger_instructions() {
        // beq $0, $0, 2 skips the two following instructions
        let beq_0_0_2: u32 = 0b000100_00000_00000_0000000000000010;
        let program = [beq_0_0_2, ADDI_1_0_5, ADDI_2_0_3, ADDI_1_0_5];
        // Target = 0 + 1 + 2 = 3, so only the last addi commits
        let mut system = system_with(&program);
        run(&mut system);
        assert_eq!(system.registers().read(1), 5);
        assert_eq!(system.registers().read(2), 0);
    }

    #[test]
    fn test_branch_not_taken_falls_through() {
        // bne $0, $0, 2 never branches
        let bne_0_0_2: u32 = 0b000101_00000_00000_0000000000000010;
        let mut system = system_with(&[bne_0_0_2, ADDI_1_0_5]);
        run(&mut system);
        assert_eq!(system.registers().read(1), 5);
    }

    #[test]
    fn test_branch_compares_forwarded_values() {
        // addi $1, $0, 5; nop; beq $1, $1, 1: the branch must see $1 = 5
        // through forwarding, making the comparison equal and taken
        let beq_1_1_1: u32 = 0b000100_00001_00001_0000000000000001;
        let program = [ADDI_1_0_5, 0, beq_1_1_1, ADDI_2_0_3];
        // Target = 2 + 1 + 1 = 4: the addi $2 at index 3 is squashed
        let mut system = system_with(&program);
        run(&mut system);
        assert_eq!(system.registers().read(2), 0);
    }

    #[test]
    fn test_mult_commits_to_hi_lo() {
        // addi $1, $0, 5; addi $2, $0, 3; mult $1, $2
        let mult_1_2: u32 = 0b000000_00001_00010_00000_00000_011000;
        let mut system = system_with(&[ADDI_1_0_5, ADDI_2_0_3, mult_1_2]);
        run(&mut system);
        assert_eq!(system.hi_lo(), (0, 15));
        // rd of the mult encoding is $0 and must stay untouched
        assert_eq!(system.registers().read(0), 0);
    }

    #[test]
    fn test_reserved_mnemonic_is_a_nop() {
        // jr $1 decodes but has no architectural effect
        let jr_1: u32 = 0b000000_00001_00000_00000_00000_001000;
        let mut system = system_with(&[ADDI_1_0_5, jr_1, ADDI_2_0_3]);
        run(&mut system);
        assert_eq!(system.registers().read(1), 5);
        assert_eq!(system.registers().read(2), 3);
    }

    #[test]
    fn test_break_keeps_draining() {
        let brk: u32 = 0b000000_00000_00000_00000_00000_001101;
        let mut system = system_with(&[brk, ADDI_1_0_5]);
        run(&mut system);
        // break produced no effect, the next instruction still committed
        assert_eq!(system.registers().read(1), 5);
    }

    #[test]
    fn test_unknown_instruction_fails_in_decode() {
        let mut system = system_with(&[0xFFFF_FFFF]);
        let err = system.run(&mut CycleTracer::sink()).unwrap_err();
        assert!(matches!(
            err,
            crate::core::error::SimulatorError::UnknownInstruction { .. }
        ));
    }

    #[test]
    fn test_write_back_precedes_distant_read() {
        // addi $1, $0, 5 writes back in cycle 5; add $3, $1, $2 issued three
        // instructions later reads the register file, not a forward
        let program = [ADDI_1_0_5, 0, 0, ADD_3_1_2];
        let mut system = system_with(&program);
        run(&mut system);
        assert_eq!(system.registers().read(3), 5);
    }

    #[test]
    fn test_trace_reports_cache_outcomes() {
        let mut buffer = Vec::new();
        {
            let mut tracer = CycleTracer::new(&mut buffer);
            let mut system = system_with(&[LW_1_0_0, 0, LW_1_0_0]);
            system.run(&mut tracer).unwrap();
        }
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("cache miss"));
        assert!(text.contains("cache hit"));
    }
}

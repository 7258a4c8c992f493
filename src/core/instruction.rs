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

//! Instruction decoding and control-signal generation
//!
//! Maps 32-bit instruction words to their fields, their mnemonic (via the
//! fixed `(opcode, funct)` table), their form classification, and the
//! control-signal bundle the decode stage publishes. Also renders the
//! human-readable form used by the trace.
//!
//! The zero word is `nop` and is classified before any table lookup.
//! Unknown `(opcode, funct)` pairs fail decoding.

use crate::core::bits;
use crate::core::error::{Result, SimulatorError};
use crate::core::registers::reg_name;
use bitflags::bitflags;

bitflags! {
    /// One-bit control signals carried through the pipeline latches
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Signals: u8 {
        /// Destination register is rd (R-type) rather than rt
        const REG_DST    = 1 << 0;
        /// Write-back takes the memory word rather than the ALU result
        const MEM_TO_REG = 1 << 1;
        /// The MEM stage issues a cache read
        const MEM_READ   = 1 << 2;
        /// The MEM stage issues a cache write
        const MEM_WRITE  = 1 << 3;
        /// EX resolves a branch
        const BRANCH     = 1 << 4;
        /// Write-back updates the register file
        const REG_WRITE  = 1 << 5;
    }
}

impl Default for Signals {
    fn default() -> Self {
        Signals::empty()
    }
}

/// ALU second-operand selector (the 2-bit aluSrc control field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AluSrc {
    /// `00`: the rt register value
    #[default]
    Register,
    /// `01`: the sign-extended 16-bit immediate
    Immediate,
}

/// ALU operation class (the 2-bit aluOp control field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AluOp {
    /// `00`: address arithmetic / immediate ALU operation
    #[default]
    MemAddress,
    /// `01`: branch comparison (subtract, test zero)
    BranchCompare,
    /// `10`: R-type operation selected by the funct field
    Function,
}

/// The control bundle the decode stage emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Control {
    pub signals: Signals,
    pub alu_src: AluSrc,
    pub alu_op: AluOp,
}

/// Decoded instruction fields
///
/// Format: | op (6) | rs (5) | rt (5) | rd (5) | shamt (5) | funct (6) |
/// with the I-type immediate overlaying the low 16 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstrFields {
    pub opcode: u8,
    pub rs: u8,
    pub rt: u8,
    pub rd: u8,
    pub shamt: u8,
    pub funct: u8,
    pub imm: u16,
}

/// Extract all fields from an instruction word
#[inline(always)]
pub fn decode_fields(instr: u32) -> InstrFields {
    InstrFields {
        opcode: (instr >> 26 & 0x3F) as u8,
        rs: (instr >> 21 & 0x1F) as u8,
        rt: (instr >> 16 & 0x1F) as u8,
        rd: (instr >> 11 & 0x1F) as u8,
        shamt: (instr >> 6 & 0x1F) as u8,
        funct: (instr & 0x3F) as u8,
        imm: (instr & 0xFFFF) as u16,
    }
}

/// Extract the 26-bit J-type target field
#[inline(always)]
pub fn jump_target(instr: u32) -> u32 {
    instr & 0x03FF_FFFF
}

/// Instruction mnemonic
///
/// The decoder recognizes every entry of the fixed table; mnemonics whose
/// execution the core leaves undefined (`jr`, `syscall`, `slt`, the HI/LO
/// moves, division, the conditional moves, the unsigned variants, and the
/// jumps) still decode without error and execute as nops with a trace
/// notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    Nop,
    Add,
    Sub,
    And,
    Or,
    Xor,
    Nor,
    Slt,
    Sll,
    Srl,
    Jr,
    Syscall,
    Break,
    Mfhi,
    Mflo,
    Mult,
    Multu,
    Div,
    Divu,
    Mthi,
    Mtlo,
    Movn,
    Movz,
    Sltu,
    Addu,
    Addiu,
    Beq,
    Bne,
    Lw,
    Sw,
    Addi,
    Andi,
    Ori,
    Xori,
    J,
    Jal,
}

impl Mnemonic {
    /// Decode an instruction word to its mnemonic
    ///
    /// The zero word decodes to `Nop` before any table lookup.
    ///
    /// # Errors
    ///
    /// `UnknownInstruction` for an `(opcode, funct)` pair with no table
    /// entry.
    pub fn decode(instr: u32) -> Result<Self> {
        if instr == 0 {
            return Ok(Mnemonic::Nop);
        }
        let fields = decode_fields(instr);
        match fields.opcode {
            0x00 => match fields.funct {
                0x00 => Ok(Mnemonic::Sll),
                0x02 => Ok(Mnemonic::Srl),
                0x08 => Ok(Mnemonic::Jr),
                0x0C => Ok(Mnemonic::Syscall),
                0x0D => Ok(Mnemonic::Break),
                0x0F => Ok(Mnemonic::Jal),
                0x10 => Ok(Mnemonic::Mfhi),
                0x11 => Ok(Mnemonic::Mthi),
                0x12 => Ok(Mnemonic::Mflo),
                0x13 => Ok(Mnemonic::Mtlo),
                0x18 => Ok(Mnemonic::Mult),
                0x19 => Ok(Mnemonic::Multu),
                0x1A => Ok(Mnemonic::Div),
                0x1B => Ok(Mnemonic::Divu),
                0x20 => Ok(Mnemonic::Add),
                0x21 => Ok(Mnemonic::Movn),
                0x22 => Ok(Mnemonic::Sub),
                0x23 => Ok(Mnemonic::Movz),
                0x24 => Ok(Mnemonic::And),
                0x25 => Ok(Mnemonic::Or),
                0x26 => Ok(Mnemonic::Xor),
                0x27 => Ok(Mnemonic::Nor),
                0x28 => Ok(Mnemonic::Addu),
                0x29 => Ok(Mnemonic::Addiu),
                0x2A => Ok(Mnemonic::Slt),
                0x2B => Ok(Mnemonic::Sltu),
                _ => Err(SimulatorError::UnknownInstruction {
                    opcode: fields.opcode,
                    funct: fields.funct,
                }),
            },
            0x02 => Ok(Mnemonic::J),
            0x03 => Ok(Mnemonic::Jal),
            0x04 => Ok(Mnemonic::Beq),
            0x05 => Ok(Mnemonic::Bne),
            0x08 => Ok(Mnemonic::Addi),
            0x0C => Ok(Mnemonic::Andi),
            0x0D => Ok(Mnemonic::Ori),
            0x0E => Ok(Mnemonic::Xori),
            0x23 => Ok(Mnemonic::Lw),
            0x2B => Ok(Mnemonic::Sw),
            _ => Err(SimulatorError::UnknownInstruction {
                opcode: fields.opcode,
                funct: fields.funct,
            }),
        }
    }

    /// Lowercase assembly name
    pub fn name(&self) -> &'static str {
        match self {
            Mnemonic::Nop => "nop",
            Mnemonic::Add => "add",
            Mnemonic::Sub => "sub",
            Mnemonic::And => "and",
            Mnemonic::Or => "or",
            Mnemonic::Xor => "xor",
            Mnemonic::Nor => "nor",
            Mnemonic::Slt => "slt",
            Mnemonic::Sll => "sll",
            Mnemonic::Srl => "srl",
            Mnemonic::Jr => "jr",
            Mnemonic::Syscall => "syscall",
            Mnemonic::Break => "break",
            Mnemonic::Mfhi => "mfhi",
            Mnemonic::Mflo => "mflo",
            Mnemonic::Mult => "mult",
            Mnemonic::Multu => "multu",
            Mnemonic::Div => "div",
            Mnemonic::Divu => "divu",
            Mnemonic::Mthi => "mthi",
            Mnemonic::Mtlo => "mtlo",
            Mnemonic::Movn => "movn",
            Mnemonic::Movz => "movz",
            Mnemonic::Sltu => "sltu",
            Mnemonic::Addu => "addu",
            Mnemonic::Addiu => "addiu",
            Mnemonic::Beq => "beq",
            Mnemonic::Bne => "bne",
            Mnemonic::Lw => "lw",
            Mnemonic::Sw => "sw",
            Mnemonic::Addi => "addi",
            Mnemonic::Andi => "andi",
            Mnemonic::Ori => "ori",
            Mnemonic::Xori => "xori",
            Mnemonic::J => "j",
            Mnemonic::Jal => "jal",
        }
    }

    /// R-type mnemonics, including those the core reserves
    pub fn is_r_type(&self) -> bool {
        matches!(
            self,
            Mnemonic::Add
                | Mnemonic::Sub
                | Mnemonic::And
                | Mnemonic::Or
                | Mnemonic::Xor
                | Mnemonic::Nor
                | Mnemonic::Slt
                | Mnemonic::Sll
                | Mnemonic::Srl
                | Mnemonic::Jr
                | Mnemonic::Syscall
                | Mnemonic::Break
                | Mnemonic::Mfhi
                | Mnemonic::Mflo
                | Mnemonic::Mult
                | Mnemonic::Multu
                | Mnemonic::Div
                | Mnemonic::Divu
                | Mnemonic::Mthi
                | Mnemonic::Mtlo
                | Mnemonic::Movn
                | Mnemonic::Movz
                | Mnemonic::Sltu
                | Mnemonic::Addu
        )
    }

    /// I-type (non-branch) mnemonics
    pub fn is_i_type(&self) -> bool {
        matches!(
            self,
            Mnemonic::Addi
                | Mnemonic::Andi
                | Mnemonic::Ori
                | Mnemonic::Xori
                | Mnemonic::Lw
                | Mnemonic::Sw
        )
    }

    /// Branch mnemonics
    pub fn is_branch(&self) -> bool {
        matches!(self, Mnemonic::Beq | Mnemonic::Bne)
    }

    /// Jump mnemonics (decoded; execution is a pass-through nop)
    pub fn is_jump(&self) -> bool {
        matches!(self, Mnemonic::J | Mnemonic::Jal)
    }

    /// Mnemonics that decode but execute as nops with a trace notice
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            Mnemonic::Jr
                | Mnemonic::Syscall
                | Mnemonic::Slt
                | Mnemonic::Mfhi
                | Mnemonic::Mflo
                | Mnemonic::Multu
                | Mnemonic::Div
                | Mnemonic::Divu
                | Mnemonic::Mthi
                | Mnemonic::Mtlo
                | Mnemonic::Movn
                | Mnemonic::Movz
                | Mnemonic::Sltu
                | Mnemonic::Addu
                | Mnemonic::Addiu
                | Mnemonic::J
                | Mnemonic::Jal
        )
    }

    /// Control signals per the fixed table
    ///
    /// | form       | regDst | aluSrc | memToReg | aluOp | memRead | memWrite | branch | regWrite |
    /// |-----------:|:------:|:------:|:--------:|:-----:|:-------:|:--------:|:------:|:--------:|
    /// | R-type     | 1      | 00     | 0        | 10    | 0       | 0        | 0      | 1        |
    /// | ALU-I-type | 0      | 01     | 0        | 00    | 0       | 0        | 0      | 1        |
    /// | lw         | 0      | 01     | 1        | 00    | 1       | 0        | 0      | 1        |
    /// | sw         | 0      | 01     | 0        | 00    | 0       | 1        | 0      | 0        |
    /// | beq/bne    | 0      | 00     | 0        | 01    | 0       | 0        | 1      | 0        |
    /// | nop/break  | 0      | 00     | 0        | 00    | 0       | 0        | 0      | 0        |
    ///
    /// Reserved mnemonics take the all-zero row: letting a nop keep its
    /// form's REG_WRITE would commit a stale ALU result in write-back.
    pub fn control(&self) -> Control {
        match self {
            Mnemonic::Add
            | Mnemonic::Sub
            | Mnemonic::And
            | Mnemonic::Or
            | Mnemonic::Xor
            | Mnemonic::Nor
            | Mnemonic::Sll
            | Mnemonic::Srl
            | Mnemonic::Mult => Control {
                signals: Signals::REG_DST | Signals::REG_WRITE,
                alu_src: AluSrc::Register,
                alu_op: AluOp::Function,
            },
            Mnemonic::Addi | Mnemonic::Andi | Mnemonic::Ori | Mnemonic::Xori => Control {
                signals: Signals::REG_WRITE,
                alu_src: AluSrc::Immediate,
                alu_op: AluOp::MemAddress,
            },
            Mnemonic::Lw => Control {
                signals: Signals::MEM_TO_REG | Signals::MEM_READ | Signals::REG_WRITE,
                alu_src: AluSrc::Immediate,
                alu_op: AluOp::MemAddress,
            },
            Mnemonic::Sw => Control {
                signals: Signals::MEM_WRITE,
                alu_src: AluSrc::Immediate,
                alu_op: AluOp::MemAddress,
            },
            Mnemonic::Beq | Mnemonic::Bne => Control {
                signals: Signals::BRANCH,
                alu_src: AluSrc::Register,
                alu_op: AluOp::BranchCompare,
            },
            _ => Control::default(),
        }
    }
}

/// Render an instruction word the way the decode trace shows it
///
/// # Example
/// ```
/// use mipsim::core::instruction::disassemble;
///
/// // addi $1, $0, 5
/// assert_eq!(disassemble(0b001000_00000_00001_0000000000000101), "addi $1, $0, 5");
/// assert_eq!(disassemble(0), "nop");
/// ```
pub fn disassemble(instr: u32) -> String {
    let mnemonic = match Mnemonic::decode(instr) {
        Ok(m) => m,
        Err(_) => return format!("unknown 0x{instr:08X}"),
    };
    let f = decode_fields(instr);
    let imm = bits::sign_extend16(f.imm) as i32;

    match mnemonic {
        Mnemonic::Nop => "nop".to_string(),
        Mnemonic::Syscall | Mnemonic::Break => mnemonic.name().to_string(),
        Mnemonic::Sll | Mnemonic::Srl => format!(
            "{} {}, {}, {}",
            mnemonic.name(),
            reg_name(f.rd),
            reg_name(f.rt),
            f.shamt
        ),
        Mnemonic::Mult | Mnemonic::Multu | Mnemonic::Div | Mnemonic::Divu => {
            format!("{} {}, {}", mnemonic.name(), reg_name(f.rs), reg_name(f.rt))
        }
        Mnemonic::Jr | Mnemonic::Mthi | Mnemonic::Mtlo => {
            format!("{} {}", mnemonic.name(), reg_name(f.rs))
        }
        Mnemonic::Mfhi | Mnemonic::Mflo => format!("{} {}", mnemonic.name(), reg_name(f.rd)),
        Mnemonic::J => format!("j 0x{:07X}", jump_target(instr)),
        Mnemonic::Jal if f.opcode == 0x03 => format!("jal 0x{:07X}", jump_target(instr)),
        Mnemonic::Lw | Mnemonic::Sw => format!(
            "{} {}, {}({})",
            mnemonic.name(),
            reg_name(f.rt),
            imm,
            reg_name(f.rs)
        ),
        Mnemonic::Beq | Mnemonic::Bne => format!(
            "{} {}, {}, {}",
            mnemonic.name(),
            reg_name(f.rs),
            reg_name(f.rt),
            imm
        ),
        Mnemonic::Addi | Mnemonic::Andi | Mnemonic::Ori | Mnemonic::Xori => format!(
            "{} {}, {}, {}",
            mnemonic.name(),
            reg_name(f.rt),
            reg_name(f.rs),
            imm
        ),
        // Remaining R-form mnemonics, including the R-encoded addiu/jal rows
        _ => format!(
            "{} {}, {}, {}",
            mnemonic.name(),
            reg_name(f.rd),
            reg_name(f.rs),
            reg_name(f.rt)
        ),
    }
}

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

//! Shared fixtures for integration tests: hand-rolled instruction encoders
//! and program-text helpers.

#![allow(dead_code)]

/// Encode an R-type instruction
pub fn r_type(rs: u8, rt: u8, rd: u8, shamt: u8, funct: u8) -> u32 {
    u32::from(rs & 0x1F) << 21
        | u32::from(rt & 0x1F) << 16
        | u32::from(rd & 0x1F) << 11
        | u32::from(shamt & 0x1F) << 6
        | u32::from(funct & 0x3F)
}

/// Encode an I-type instruction
pub fn i_type(opcode: u8, rs: u8, rt: u8, imm: u16) -> u32 {
    u32::from(opcode & 0x3F) << 26
        | u32::from(rs & 0x1F) << 21
        | u32::from(rt & 0x1F) << 16
        | u32::from(imm)
}

pub fn add(rd: u8, rs: u8, rt: u8) -> u32 {
    r_type(rs, rt, rd, 0, 0b100000)
}

pub fn sub(rd: u8, rs: u8, rt: u8) -> u32 {
    r_type(rs, rt, rd, 0, 0b100010)
}

pub fn slt(rd: u8, rs: u8, rt: u8) -> u32 {
    r_type(rs, rt, rd, 0, 0b101010)
}

pub fn sll(rd: u8, rt: u8, shamt: u8) -> u32 {
    r_type(0, rt, rd, shamt, 0b000000)
}

pub fn mult(rs: u8, rt: u8) -> u32 {
    r_type(rs, rt, 0, 0, 0b011000)
}

pub fn addi(rt: u8, rs: u8, imm: i16) -> u32 {
    i_type(0b001000, rs, rt, imm as u16)
}

pub fn lw(rt: u8, offset: i16, base: u8) -> u32 {
    i_type(0b100011, base, rt, offset as u16)
}

pub fn sw(rt: u8, offset: i16, base: u8) -> u32 {
    i_type(0b101011, base, rt, offset as u16)
}

pub fn beq(rs: u8, rt: u8, offset: i16) -> u32 {
    i_type(0b000100, rs, rt, offset as u16)
}

pub fn bne(rs: u8, rt: u8, offset: i16) -> u32 {
    i_type(0b000101, rs, rt, offset as u16)
}

/// Render a program as instruction-file text, one binary word per line
pub fn program_text(words: &[u32]) -> String {
    words
        .iter()
        .map(|word| format!("{word:032b}\n"))
        .collect()
}

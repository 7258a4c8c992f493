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

mod common;

use common::*;
use mipsim::core::alu;
use mipsim::core::error::SimulatorError;
use mipsim::core::loader::{self, SimConfig};
use mipsim::core::memory::cache::MsiState;
use mipsim::core::system::System;
use mipsim::core::trace::CycleTracer;
use std::io::Write;

fn run_program(program: &[u32]) -> System {
    let mut system = System::new(&SimConfig::default()).unwrap();
    system.load_program(program).unwrap();
    system.run(&mut CycleTracer::sink()).unwrap();
    system
}

fn run_program_traced(program: &[u32]) -> (System, String) {
    let mut buffer = Vec::new();
    let mut system = System::new(&SimConfig::default()).unwrap();
    system.load_program(program).unwrap();
    {
        let mut tracer = CycleTracer::new(&mut buffer);
        system.run(&mut tracer).unwrap();
    }
    (system, String::from_utf8(buffer).unwrap())
}

#[test]
fn test_simple_addi() {
    // addi $1, $0, 5: after the pipeline drains, $1 holds 5
    let system = run_program(&[addi(1, 0, 5)]);
    assert_eq!(system.registers().read(1), 5);
    assert_eq!(system.cycles(), 5);
    assert_eq!(system.stalls(), 0);
}

#[test]
fn test_simple_addi_from_file() {
    // The same scenario, loaded through the instruction-file path
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(program_text(&[addi(1, 0, 5)]).as_bytes())
        .unwrap();

    let program = loader::load_program(file.path()).unwrap();
    let system = run_program(&program);
    assert_eq!(system.registers().read(1), 5);
}

#[test]
fn test_forwarding_chain() {
    // addi $1, $0, 3; addi $2, $0, 4; add $3, $1, $2: back-to-back
    // dependencies resolve through forwarding, with no stall
    let system = run_program(&[addi(1, 0, 3), addi(2, 0, 4), add(3, 1, 2)]);
    assert_eq!(system.registers().read(3), 7);
    assert_eq!(system.stalls(), 0);
    assert_eq!(system.cycles(), 3 + 4);
}

#[test]
fn test_load_use_stall() {
    // lw $1, 0($0); add $2, $1, $1: exactly one stall cycle
    let mut system = System::new(&SimConfig::default()).unwrap();
    system.data_memory_mut().write(0, 42).unwrap();
    system.load_program(&[lw(1, 0, 0), add(2, 1, 1)]).unwrap();
    system.run(&mut CycleTracer::sink()).unwrap();

    assert_eq!(system.stalls(), 1);
    assert_eq!(system.cycles(), 2 + 4 + 1);
    assert_eq!(system.registers().read(1), 42);
    assert_eq!(system.registers().read(2), 84);
}

#[test]
fn test_cache_miss_then_hit() {
    // Two loads from the same line: the first misses, the second hits,
    // and both return the initialized data-memory contents
    let (system, trace) = run_program_traced(&[lw(1, 100, 0), lw(2, 101, 0)]);

    assert_eq!(system.registers().read(1), 100);
    assert_eq!(system.registers().read(2), 101);

    let stats = system.cache().stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);

    let miss_at = trace.find("cache miss").unwrap();
    let hit_at = trace.find("cache hit").unwrap();
    assert!(miss_at < hit_at);
}

#[test]
fn test_store_then_eviction_writes_back() {
    // sw $8, 4($0) with $8 = 0xDEADBEEF dirties the line; two loads with
    // the same set index and different tags evict it; a final load sees
    // the written-back value through the cache again
    let mut system = System::new(&SimConfig::default()).unwrap();
    system.registers_mut().write(8, 0xDEAD_BEEF);
    system
        .load_program(&[sw(8, 4, 0), lw(1, 36, 0), lw(2, 68, 0), lw(9, 4, 0)])
        .unwrap();
    system.run(&mut CycleTracer::sink()).unwrap();

    assert_eq!(system.registers().read(9), 0xDEAD_BEEF);
    assert_eq!(system.data_memory().read(4).unwrap(), 0xDEAD_BEEF);
    assert!(system.cache().stats().writebacks >= 1);
    // The refetched line is clean
    assert_eq!(system.cache().state(4), MsiState::Shared);
}

#[test]
fn test_booth_multiply_small_operands() {
    // 4-bit Booth multiply: 0111 * 0011 = 00010101 (21)
    assert_eq!(alu::mult(0b0111, 0b0011, 4), 0b0001_0101);
}

#[test]
fn test_mult_through_the_pipeline() {
    // mult $1, $2 runs the Booth multiplier on forwarded operands and
    // commits the 64-bit product to HI/LO
    let system = run_program(&[addi(1, 0, -3), addi(2, 0, 100), mult(1, 2)]);
    let (hi, lo) = system.hi_lo();
    assert_eq!(((u64::from(hi) << 32) | u64::from(lo)) as i64, -300);
}

#[test]
fn test_branch_taken_squashes_and_redirects() {
    // beq $0, $0, 2 branches over two instructions; the squashed addis
    // leave no architectural trace
    let system = run_program(&[
        beq(0, 0, 2),
        addi(1, 0, 11),
        addi(2, 0, 22),
        addi(3, 0, 33),
    ]);
    assert_eq!(system.registers().read(1), 0);
    assert_eq!(system.registers().read(2), 0);
    assert_eq!(system.registers().read(3), 33);
}

#[test]
fn test_branch_not_taken_has_no_effect() {
    let system = run_program(&[bne(0, 0, 2), addi(1, 0, 11), addi(2, 0, 22)]);
    assert_eq!(system.registers().read(1), 11);
    assert_eq!(system.registers().read(2), 22);
}

#[test]
fn test_cycle_budget_caps_backward_branches() {
    // A taken backward branch refetches older instructions, but the run
    // still stops after instruction_count + 4 + stall_count cycles; the
    // refetched addi never reaches write-back a second time
    let system = run_program(&[addi(1, 0, 1), bne(1, 0, -2)]);
    assert_eq!(system.cycles(), 2 + 4);
    assert_eq!(system.registers().read(1), 1);
}

#[test]
fn test_shifts_execute_and_slt_stays_reserved() {
    let system = run_program(&[
        addi(1, 0, -1),
        addi(2, 0, 1),
        slt(3, 1, 2),  // decodes, but executes as a nop
        sll(4, 2, 31), // 1 << 31
    ]);
    // slt is a reserved mnemonic: no register effect
    assert_eq!(system.registers().read(3), 0);
    assert_eq!(system.registers().read(4), 0x8000_0000);
}

#[test]
fn test_sw_forwarded_store_value() {
    // The store of a just-computed value must carry the forwarded rt
    let mut system = System::new(&SimConfig::default()).unwrap();
    system
        .load_program(&[addi(1, 0, 77), sw(1, 8, 0), lw(2, 8, 0)])
        .unwrap();
    system.run(&mut CycleTracer::sink()).unwrap();
    assert_eq!(system.registers().read(2), 77);
}

#[test]
fn test_malformed_program_fails_to_load() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{}", "0".repeat(32)).unwrap();
    writeln!(file, "0101").unwrap();

    let err = loader::load_program(file.path()).unwrap_err();
    assert!(matches!(
        err,
        SimulatorError::MalformedInstruction { line: 2, .. }
    ));
}

#[test]
fn test_invalid_geometry_fails_construction() {
    let mut config = SimConfig::default();
    config.cache.ways = 3;
    assert!(matches!(
        System::new(&config),
        Err(SimulatorError::InvalidCacheGeometry { .. })
    ));
}

#[test]
fn test_out_of_range_load_is_fatal() {
    // Address 5000 is beyond the 4096-word data memory
    let mut system = System::new(&SimConfig::default()).unwrap();
    system.load_program(&[lw(1, 5000, 0)]).unwrap();
    let err = system.run(&mut CycleTracer::sink()).unwrap_err();
    assert!(matches!(err, SimulatorError::AddressOutOfRange { .. }));
}

#[test]
fn test_trace_shape() {
    let (_, trace) = run_program_traced(&[addi(1, 0, 5)]);
    assert!(trace.contains("cycle 1"));
    assert!(trace.contains("fetched: 00100000000000010000000000000101"));
    assert!(trace.contains("decoded: addi $1, $0, 5"));
    assert!(trace.contains("write-back: $1 = 5"));
    assert!(trace.contains("throughput: 0.2000"));
    // Bubbles report nop
    assert!(trace.contains("execute: nop"));
}

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

//! Core simulation components
//!
//! This module contains all simulated hardware components:
//! - ALU (integer operations, Booth multiplier)
//! - Register file (32 architectural registers)
//! - Memory (flat word-addressable instruction and data memories)
//! - Data cache (2-way set-associative, write-back, MSI states)
//! - Pipeline latches (IF/ID, ID/EX, EX/MEM, MEM/WB)
//! - Instruction decoder and control-signal generation
//! - Hazard detection and forwarding
//! - System integration and the per-cycle trace

pub mod alu;
pub mod bits;
pub mod error;
pub mod hazard;
pub mod instruction;
pub mod loader;
pub mod memory;
pub mod pipeline;
pub mod registers;
pub mod system;
pub mod trace;

// Re-export commonly used types
pub use error::{Result, SimulatorError};
pub use instruction::Mnemonic;
pub use loader::SimConfig;
pub use memory::cache::DataCache;
pub use memory::Memory;
pub use registers::RegisterFile;
pub use system::System;
pub use trace::CycleTracer;

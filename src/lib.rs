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

//! Five-stage MIPS pipeline simulator core library
//!
//! This library provides the components of a cycle-driven simulator of an
//! in-order MIPS-style integer pipeline: the five stages and their latches,
//! the ALU with a Booth multiplier, the register file, and a two-way
//! set-associative write-back data cache with MSI block states over a flat
//! backing memory.
//!
//! # Example
//!
//! ```
//! use mipsim::core::loader::SimConfig;
//! use mipsim::core::system::System;
//! use mipsim::core::trace::CycleTracer;
//!
//! // addi $1, $0, 5
//! let program = vec![0b001000_00000_00001_0000000000000101];
//!
//! let mut system = System::new(&SimConfig::default()).unwrap();
//! system.load_program(&program).unwrap();
//!
//! let mut tracer = CycleTracer::sink();
//! let summary = system.run(&mut tracer).unwrap();
//! assert_eq!(summary.cycles, 5);
//! ```

pub mod core;

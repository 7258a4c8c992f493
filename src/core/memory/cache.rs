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

//! Set-associative write-back data cache with MSI block states
//!
//! The cache sits between the pipeline's MEM stage and the flat data
//! memory. Blocks are word-granular: each way of each set holds one block
//! per word of the line, and every block carries its own tag and MSI state.
//!
//! # Policies
//!
//! - **Hit**: tag equality and state ∈ {Shared, Modified} in either way of
//!   the selected set.
//! - **Write-allocate / write-back**: CPU stores that miss pull the whole
//!   line in first, then write the word, leaving the block Modified. Memory
//!   is only updated when a Modified block is evicted.
//! - **Replacement**: one victim pointer per set (the LRU bit). Any install
//!   into a way, whether a line fill or a CPU store, moves the pointer to
//!   the other way.
//!
//! # Address layout
//!
//! A 32-bit *word* address splits `[tag | set_index | block_offset]` from
//! the MSB; `block_offset` selects the word within the line.
//!
//! # Example
//!
//! ```
//! use mipsim::core::memory::cache::{DataCache, MsiState, WriteOrigin};
//! use mipsim::core::memory::Memory;
//!
//! let mut mem = Memory::with_identity(4096);
//! let mut cache = DataCache::new(256, 32, 2).unwrap();
//!
//! // First read misses and fills the line; the block becomes Shared
//! let access = cache.read(&mut mem, 100).unwrap();
//! assert_eq!(access.value, 100);
//! assert!(!access.hit);
//! assert_eq!(cache.state(100), MsiState::Shared);
//!
//! // A store hits the freshly filled line and dirties the block
//! cache.write(&mut mem, 100, 7, WriteOrigin::Cpu).unwrap();
//! assert_eq!(cache.state(100), MsiState::Modified);
//! ```

use crate::core::error::{Result, SimulatorError};
use crate::core::memory::Memory;
use serde::Serialize;

/// MSI coherence state of a cache block
///
/// There is a single cache, so no external coherence traffic exists;
/// Shared is the resting valid state and Modified marks dirty data that
/// memory does not yet have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MsiState {
    /// No valid data
    #[default]
    Invalid,
    /// Clean, valid data; memory agrees
    Shared,
    /// Dirty data; this cache holds the sole authoritative value
    Modified,
}

/// Who initiated a cache write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOrigin {
    /// A store instruction; write-allocates and leaves the block Modified
    Cpu,
    /// A line-fill install issued by the cache itself; leaves the block Shared
    Memory,
}

/// Outcome of a cache access
///
/// The returned data does not distinguish hit from miss; `hit` exists so
/// the trace can report the miss path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheAccess {
    /// The word read, or the word just written
    pub value: u32,
    /// Whether the access hit in the cache
    pub hit: bool,
}

/// Hit/miss/writeback counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Accesses that hit in the cache
    pub hits: u64,
    /// Accesses that required a line fill
    pub misses: u64,
    /// Modified blocks flushed to backing memory on eviction
    pub writebacks: u64,
}

/// A single word-granular cache block
#[derive(Debug, Clone, Copy, Default)]
struct Block {
    /// Address tag (the high `tag_bits` of the word address)
    tag: u32,
    /// Cached data word
    data: u32,
    /// MSI state
    state: MsiState,
}

/// Derived cache geometry
///
/// All quantities are fixed at construction from (cache size, line size,
/// associativity) and validated to be power-of-two splits of a 32-bit
/// word address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheGeometry {
    /// Total cache size in bytes
    pub size_bytes: u32,
    /// Line size in bytes
    pub line_bytes: u32,
    /// Number of ways per set
    pub ways: u32,
    /// Words per line (`line_bytes / 4`)
    pub words_per_line: u32,
    /// Number of sets
    pub num_sets: u32,
    /// Word-offset bits within a line
    pub offset_bits: u32,
    /// Set-index bits
    pub set_bits: u32,
    /// Tag bits (`32 - set_bits - offset_bits`)
    pub tag_bits: u32,
}

impl CacheGeometry {
    /// Derive and validate the geometry
    ///
    /// # Errors
    ///
    /// `InvalidCacheGeometry` unless cache size, line size, associativity,
    /// words-per-line, and the resulting set count are all positive powers
    /// of two, with at least one word per line and no more ways than
    /// blocks.
    pub fn new(size_bytes: u32, line_bytes: u32, ways: u32) -> Result<Self> {
        let geometry_error = |reason: String| SimulatorError::InvalidCacheGeometry { reason };

        if size_bytes == 0 || !size_bytes.is_power_of_two() {
            return Err(geometry_error(format!(
                "cache size {size_bytes} is not a positive power of two"
            )));
        }
        if line_bytes == 0 || !line_bytes.is_power_of_two() {
            return Err(geometry_error(format!(
                "line size {line_bytes} is not a positive power of two"
            )));
        }
        if line_bytes < 4 {
            return Err(geometry_error(format!(
                "line size {line_bytes} is smaller than one word"
            )));
        }
        if ways == 0 || !ways.is_power_of_two() {
            return Err(geometry_error(format!(
                "associativity {ways} is not a positive power of two"
            )));
        }

        let num_blocks = size_bytes / line_bytes;
        if num_blocks == 0 {
            return Err(geometry_error(format!(
                "line size {line_bytes} exceeds cache size {size_bytes}"
            )));
        }
        if ways > num_blocks {
            return Err(geometry_error(format!(
                "associativity {ways} exceeds the {num_blocks} blocks in the cache"
            )));
        }

        let num_sets = num_blocks / ways;
        let words_per_line = line_bytes / 4;
        let offset_bits = words_per_line.trailing_zeros();
        let set_bits = num_sets.trailing_zeros();

        Ok(Self {
            size_bytes,
            line_bytes,
            ways,
            words_per_line,
            num_sets,
            offset_bits,
            set_bits,
            tag_bits: 32 - set_bits - offset_bits,
        })
    }

    /// Split a word address into (tag, set index, block offset)
    #[inline(always)]
    fn decompose(&self, address: u32) -> (u32, u32, u32) {
        let offset = address & (self.words_per_line - 1);
        let set = address >> self.offset_bits & (self.num_sets - 1);
        let tag = address >> (self.offset_bits + self.set_bits);
        (tag, set, offset)
    }

    /// Rebuild a word address from (tag, set index, block offset)
    #[inline(always)]
    fn compose(&self, tag: u32, set: u32, offset: u32) -> u32 {
        tag << (self.offset_bits + self.set_bits) | set << self.offset_bits | offset
    }

    /// Word address of the first word of the line containing `address`
    #[inline(always)]
    fn line_base(&self, address: u32) -> u32 {
        address & !(self.words_per_line - 1)
    }
}

/// Two-way set-associative write-back data cache
pub struct DataCache {
    geometry: CacheGeometry,
    /// `sets[set][way][offset]`
    sets: Vec<Vec<Vec<Block>>>,
    /// Per-set victim pointer: the way replaced by the next fill
    victim: Vec<usize>,
    stats: CacheStats,
}

impl DataCache {
    /// Create a cache with the given geometry, all blocks Invalid
    ///
    /// # Arguments
    ///
    /// * `size_bytes` - Total cache size in bytes
    /// * `line_bytes` - Line size in bytes
    /// * `ways` - Associativity
    ///
    /// # Errors
    ///
    /// `InvalidCacheGeometry` for a non-power-of-two split (see
    /// [`CacheGeometry::new`]).
    pub fn new(size_bytes: u32, line_bytes: u32, ways: u32) -> Result<Self> {
        let geometry = CacheGeometry::new(size_bytes, line_bytes, ways)?;
        let sets = vec![
            vec![
                vec![Block::default(); geometry.words_per_line as usize];
                geometry.ways as usize
            ];
            geometry.num_sets as usize
        ];
        Ok(Self {
            geometry,
            sets,
            victim: vec![0; geometry.num_sets as usize],
            stats: CacheStats::default(),
        })
    }

    /// The derived geometry
    pub fn geometry(&self) -> &CacheGeometry {
        &self.geometry
    }

    /// Hit/miss/writeback counters
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// MSI state of the block holding `address`
    ///
    /// Returns `Invalid` when the tag matches in neither way.
    pub fn state(&self, address: u32) -> MsiState {
        let (tag, set, offset) = self.geometry.decompose(address);
        self.lookup(set, tag, offset)
            .map_or(MsiState::Invalid, |way| {
                self.sets[set as usize][way][offset as usize].state
            })
    }

    /// Read the word at `address`, filling the line from memory on a miss
    ///
    /// A read hit leaves the block's state unchanged; a miss installs the
    /// whole line as Shared (evicting and writing back Modified blocks
    /// first).
    ///
    /// # Errors
    ///
    /// `AddressOutOfRange` if the line (or a writeback target) falls
    /// outside backing memory.
    pub fn read(&mut self, memory: &mut Memory, address: u32) -> Result<CacheAccess> {
        let (tag, set, offset) = self.geometry.decompose(address);

        if let Some(way) = self.lookup(set, tag, offset) {
            self.stats.hits += 1;
            return Ok(CacheAccess {
                value: self.sets[set as usize][way][offset as usize].data,
                hit: true,
            });
        }

        self.stats.misses += 1;
        let way = self.fill_line(memory, address)?;
        Ok(CacheAccess {
            value: self.sets[set as usize][way][offset as usize].data,
            hit: false,
        })
    }

    /// Write the word at `address`
    ///
    /// CPU stores follow write-allocate/write-back: a miss fills the line
    /// first, and the written block ends Modified either way. Memory-origin
    /// writes install a single word as Shared, the way a line fill does.
    ///
    /// # Errors
    ///
    /// `AddressOutOfRange` if a fill or writeback touches an address
    /// outside backing memory.
    pub fn write(
        &mut self,
        memory: &mut Memory,
        address: u32,
        value: u32,
        origin: WriteOrigin,
    ) -> Result<CacheAccess> {
        match origin {
            WriteOrigin::Cpu => self.write_cpu(memory, address, value),
            WriteOrigin::Memory => self.install_word(memory, address, value),
        }
    }

    fn write_cpu(&mut self, memory: &mut Memory, address: u32, value: u32) -> Result<CacheAccess> {
        let (tag, set, offset) = self.geometry.decompose(address);

        let (way, hit) = match self.lookup(set, tag, offset) {
            Some(way) => {
                self.stats.hits += 1;
                (way, true)
            }
            None => {
                // Write-allocate: pull the line in before storing
                self.stats.misses += 1;
                (self.fill_line(memory, address)?, false)
            }
        };

        let block = &mut self.sets[set as usize][way][offset as usize];
        block.tag = tag;
        block.data = value;
        block.state = MsiState::Modified;
        self.touch(set, way);

        Ok(CacheAccess { value, hit })
    }

    /// Install a single word as Shared, as a cache-initiated fill does
    fn install_word(
        &mut self,
        memory: &mut Memory,
        address: u32,
        value: u32,
    ) -> Result<CacheAccess> {
        let (tag, set, offset) = self.geometry.decompose(address);

        let hit = self.lookup(set, tag, offset).is_some();
        let way = self.target_way(set, tag, offset);
        self.write_back_block(memory, set, way, offset)?;

        let block = &mut self.sets[set as usize][way][offset as usize];
        block.tag = tag;
        block.data = value;
        block.state = MsiState::Shared;
        self.touch(set, way);

        Ok(CacheAccess { value, hit })
    }

    /// Find the way holding a valid block for (tag, offset), if any
    fn lookup(&self, set: u32, tag: u32, offset: u32) -> Option<usize> {
        self.sets[set as usize]
            .iter()
            .position(|way| {
                let block = &way[offset as usize];
                block.tag == tag && block.state != MsiState::Invalid
            })
    }

    /// Choose the way a fill targets: a way already holding a valid block
    /// with this tag if one exists, otherwise the set's victim
    fn target_way(&self, set: u32, tag: u32, offset: u32) -> usize {
        self.lookup(set, tag, offset)
            .unwrap_or(self.victim[set as usize])
    }

    /// Fill the whole line containing `address` into one way, Shared
    ///
    /// Returns the way that now holds the line. Modified blocks resident in
    /// that way are written back to their own tagged addresses before being
    /// overwritten.
    fn fill_line(&mut self, memory: &mut Memory, address: u32) -> Result<usize> {
        let (tag, set, offset) = self.geometry.decompose(address);
        let way = self.target_way(set, tag, offset);

        for off in 0..self.geometry.words_per_line {
            self.write_back_block(memory, set, way, off)?;
        }

        let base = self.geometry.line_base(address);
        for off in 0..self.geometry.words_per_line {
            let value = memory.read(base + off)?;
            self.sets[set as usize][way][off as usize] = Block {
                tag,
                data: value,
                state: MsiState::Shared,
            };
        }

        self.touch(set, way);
        Ok(way)
    }

    /// Flush one block to backing memory if it is Modified
    fn write_back_block(&mut self, memory: &mut Memory, set: u32, way: usize, offset: u32) -> Result<()> {
        let block = self.sets[set as usize][way][offset as usize];
        if block.state == MsiState::Modified {
            let target = self.geometry.compose(block.tag, set, offset);
            log::debug!(
                "cache writeback: word {target} <- 0x{:08X} (set {set}, way {way})",
                block.data
            );
            memory.write(target, block.data)?;
            self.stats.writebacks += 1;
        }
        Ok(())
    }

    /// Mark `way` most-recently-used: the victim pointer moves off it
    #[inline(always)]
    fn touch(&mut self, set: u32, way: usize) {
        self.victim[set as usize] = (way + 1) % self.geometry.ways as usize;
    }
}

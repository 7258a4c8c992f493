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

use clap::{Parser, Subcommand};
use log::{error, info};
use mipsim::core::error::{Result, SimulatorError};
use mipsim::core::loader::{self, SimConfig};
use mipsim::core::system::System;
use mipsim::core::trace::CycleTracer;

/// Five-stage MIPS pipeline simulator
#[derive(Parser)]
#[command(name = "mipsim")]
#[command(about = "Five-stage MIPS pipeline simulator with an MSI data cache", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation against an instruction file
    Run {
        /// Instruction file: one 32-bit binary word per line
        program: String,

        /// TOML configuration file (cache geometry, memory sizes)
        #[arg(short = 'c', long)]
        config: Option<String>,

        /// Disable the per-cycle trace
        #[arg(short = 'q', long)]
        quiet: bool,

        /// Write final registers and statistics to a JSON file
        #[arg(long)]
        dump_json: Option<String>,
    },
}

fn main() -> Result<()> {
    // Initialize logger with default level INFO
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("mipsim v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let result = match args.command {
        Commands::Run {
            program,
            config,
            quiet,
            dump_json,
        } => cmd_run(&program, config.as_deref(), quiet, dump_json.as_deref()),
    };
    if let Err(err) = &result {
        error!("{err}");
    }
    result
}

fn cmd_run(
    program_path: &str,
    config_path: Option<&str>,
    quiet: bool,
    dump_json: Option<&str>,
) -> Result<()> {
    let config = match config_path {
        Some(path) => {
            info!("loading configuration from: {path}");
            SimConfig::from_file(path)?
        }
        None => SimConfig::default(),
    };
    info!(
        "cache: {} B, {} B lines, {}-way; memory: {} data words, {} instruction words",
        config.cache.size_bytes,
        config.cache.line_bytes,
        config.cache.ways,
        config.memory.data_words,
        config.memory.inst_words
    );

    info!("loading program from: {program_path}");
    let program = loader::load_program(program_path)?;

    let mut system = System::new(&config)?;
    system.load_program(&program)?;

    let mut tracer = CycleTracer::stdout();
    tracer.set_enabled(!quiet);

    let summary = match system.run(&mut tracer) {
        Ok(summary) => summary,
        Err(err) => {
            error!("error at cycle {}: {err}", system.cycles() + 1);
            return Err(err);
        }
    };

    info!(
        "completed: {} instructions, {} cycles, {} stall(s), {} cache hit(s), {} miss(es)",
        summary.instructions,
        summary.cycles,
        summary.stalls,
        summary.cache.hits,
        summary.cache.misses
    );

    if let Some(path) = dump_json {
        let dump = serde_json::json!({
            "registers": system.registers().snapshot(),
            "hi_lo": system.hi_lo(),
            "summary": summary,
        });
        let text = serde_json::to_string_pretty(&dump).map_err(|err| SimulatorError::Io {
            message: err.to_string(),
        })?;
        std::fs::write(path, text)?;
        info!("state dumped to: {path}");
    }

    Ok(())
}

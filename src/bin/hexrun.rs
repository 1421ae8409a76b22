/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! `hexrun`: loads a ROM image and executes it to completion with no
//! runtime logging. `NOP` sleeps 200ms, the Runner's contract for it.

use anyhow::{Context, Result};
use clap::Parser;
use hexvm::file_reader::{AsmFileReader, FileReader};
use hexvm::isa::Opcode;
use hexvm::syscall::DefaultSyscalls;
use hexvm::vm::{HaltReason, StepOutcome, VmState};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[clap(version, author = "Connor Nolan", about = "Runs a hexvm ROM image")]
struct Opts {
    /// ROM file to execute.
    rom: PathBuf,
}

const NOP_SLEEP: Duration = Duration::from_millis(200);

fn run(opts: Opts) -> Result<u8> {
    let rom_bytes = AsmFileReader
        .read_binary(&opts.rom)
        .with_context(|| format!("failed to read {}", opts.rom.display()))?;
    let mut vm = VmState::load(&rom_bytes)
        .with_context(|| format!("{} is not a valid ROM image", opts.rom.display()))?;
    let mut syscalls = DefaultSyscalls;

    loop {
        match vm.step(&mut syscalls)? {
            StepOutcome::Continued { opcode: Opcode::Nop } => thread::sleep(NOP_SLEEP),
            StepOutcome::Continued { .. } => {}
            StepOutcome::Halted {
                reason: HaltReason::Brk,
                ..
            } => return Ok(0),
            StepOutcome::Halted {
                reason: HaltReason::Exit(code),
                ..
            } => return Ok(code as u8),
        }
    }
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    match run(opts) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("hexrun: {err:#}");
            ExitCode::FAILURE
        }
    }
}

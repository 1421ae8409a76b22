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

//! `hexdbg`: a superset of `hexrun` that prints one trace line per
//! executed instruction (PC, mnemonic, registers, flags). `NOP` is a no-op
//! here rather than the Runner's wall-clock sleep, so tracing stays fast.

use anyhow::{Context, Result};
use clap::Parser;
use hexvm::file_reader::{AsmFileReader, FileReader};
use hexvm::syscall::DefaultSyscalls;
use hexvm::vm::{HaltReason, StepOutcome, VmState};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[clap(version, author = "Connor Nolan", about = "Traces execution of a hexvm ROM image")]
struct Opts {
    /// ROM file to execute.
    rom: PathBuf,

    /// Stop tracing (but keep running) after this many instructions.
    #[clap(long)]
    trace_limit: Option<usize>,
}

fn trace_line(vm: &VmState, opcode: hexvm::isa::Opcode) -> String {
    let (mnemonic, _) = opcode.mnemonic_and_operand_template();
    format!(
        "{:04X}: {:<8} A={:08X} X={:08X} Y={:08X} C={} Z={} N={} V={}",
        vm.program_counter,
        mnemonic,
        vm.accumulator,
        vm.x_index,
        vm.y_index,
        vm.carry_flag as u8,
        vm.zero_flag as u8,
        vm.negative_flag as u8,
        vm.overflow_flag as u8,
    )
}

fn run(opts: Opts) -> Result<u8> {
    let rom_bytes = AsmFileReader
        .read_binary(&opts.rom)
        .with_context(|| format!("failed to read {}", opts.rom.display()))?;
    let mut vm = VmState::load(&rom_bytes)
        .with_context(|| format!("{} is not a valid ROM image", opts.rom.display()))?;
    let mut syscalls = DefaultSyscalls;
    let mut steps = 0usize;

    loop {
        // The PC at the start of this step, before `step` advances it, is
        // what the trace line should show — it's where the instruction
        // that's about to execute actually lives.
        let pc_before = vm.program_counter;
        let opcode = hexvm::isa::Opcode::decode(vm.rom[pc_before as usize]);

        let within_limit = opts.trace_limit.map_or(true, |limit| steps < limit);
        if within_limit {
            eprintln!("{}", trace_line(&vm, opcode));
        }
        steps += 1;

        match vm.step(&mut syscalls)? {
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
            eprintln!("hexdbg: {err:#}");
            ExitCode::FAILURE
        }
    }
}

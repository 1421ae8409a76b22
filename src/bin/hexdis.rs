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

//! `hexdis`: renders a ROM image as an address/bytes/mnemonic listing.

use anyhow::{Context, Result};
use clap::Parser;
use hexvm::disasm::{disassemble, DisasmOptions};
use hexvm::file_reader::{AsmFileReader, FileReader};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[clap(version, author = "Connor Nolan", about = "Disassembles a hexvm ROM image")]
struct Opts {
    /// ROM file to disassemble.
    rom: PathBuf,

    /// Print the parsed header line.
    #[clap(long, default_value_t = true)]
    header: bool,
    #[clap(long = "no-header")]
    no_header: bool,

    /// Print each instruction's address.
    #[clap(long, default_value_t = true)]
    addr: bool,
    #[clap(long = "no-addr")]
    no_addr: bool,

    /// Print each instruction's raw bytes.
    #[clap(long, default_value_t = true)]
    bytes: bool,
    #[clap(long = "no-bytes")]
    no_bytes: bool,

    /// Print the decoded mnemonic and operands.
    #[clap(long, default_value_t = true)]
    insn: bool,
    #[clap(long = "no-insn")]
    no_insn: bool,

    /// Turn every column on, overriding any other toggle.
    #[clap(long = "log")]
    log_all: Option<String>,

    /// Turn every column off, overriding any other toggle.
    #[clap(long = "nolog")]
    nolog_all: Option<String>,
}

fn resolve_options(opts: &Opts) -> DisasmOptions {
    let mut resolved = DisasmOptions {
        show_header: opts.header && !opts.no_header,
        show_addr: opts.addr && !opts.no_addr,
        show_bytes: opts.bytes && !opts.no_bytes,
        show_insn: opts.insn && !opts.no_insn,
    };
    if opts.log_all.as_deref() == Some("all") {
        resolved = DisasmOptions {
            show_header: true,
            show_addr: true,
            show_bytes: true,
            show_insn: true,
        };
    }
    if opts.nolog_all.as_deref() == Some("all") {
        resolved = DisasmOptions {
            show_header: false,
            show_addr: false,
            show_bytes: false,
            show_insn: false,
        };
    }
    resolved
}

fn run(opts: Opts) -> Result<()> {
    let rom_bytes = AsmFileReader
        .read_binary(&opts.rom)
        .with_context(|| format!("failed to read {}", opts.rom.display()))?;
    let options = resolve_options(&opts);
    let listing = disassemble(&rom_bytes, &options)
        .with_context(|| format!("{} is not a valid ROM image", opts.rom.display()))?;

    if let Some(header_line) = listing.header_line {
        println!("{header_line}");
    }
    for line in listing.lines {
        println!("{line}");
    }
    Ok(())
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    match run(opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("hexdis: {err:#}");
            ExitCode::FAILURE
        }
    }
}

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

//! `hexasm`: assembles a source file into a 65,536 byte ROM image.

use anyhow::{Context, Result};
use clap::Parser;
use hexvm::file_reader::AsmFileReader;
use hexvm::{assemble, AssembleOptions};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[clap(version, author = "Connor Nolan", about = "Assembles hexvm source into a ROM image")]
struct Opts {
    /// Source file to assemble.
    #[clap(short, long)]
    input: PathBuf,

    /// Where to write the assembled ROM.
    #[clap(short, long)]
    output: PathBuf,

    /// Embed LABEL_NAME debug metadata frames in the ROM.
    #[clap(long)]
    debug: bool,

    /// Print the resolved entry point and ROM size after assembling.
    #[clap(short, long)]
    verbose: bool,
}

fn run(opts: Opts) -> Result<()> {
    let reader = AsmFileReader;
    let rom = assemble(
        &opts.input,
        AssembleOptions {
            debug_mode: opts.debug,
        },
        &reader,
    )
    .with_context(|| format!("failed to assemble {}", opts.input.display()))?;

    if opts.verbose {
        let header = hexvm::rom::Header::parse(&rom).context("assembled ROM had a bad header")?;
        eprintln!(
            "entry_point=$0x{:04X} debug_mode={} bytes={}",
            header.entry_point,
            header.debug_mode,
            rom.len()
        );
    }

    fs::write(&opts.output, &rom)
        .with_context(|| format!("failed to write {}", opts.output.display()))?;
    println!(
        "assembled {} -> {}",
        opts.input.display(),
        opts.output.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    match run(opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("hexasm: {err:#}");
            ExitCode::FAILURE
        }
    }
}

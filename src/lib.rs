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

//! `hexvm`: the ISA/ROM-format definitions, the assembler pipeline
//! (lexer → preprocessor → code generator), and the virtual machine shared
//! by the four `hexasm`/`hexdis`/`hexrun`/`hexdbg` binaries.

pub mod codegen;
pub mod disasm;
pub mod errors;
pub mod file_reader;
pub mod isa;
pub mod lexer;
pub mod preprocessor;
pub mod rom;
pub mod syscall;
pub mod vm;

use std::path::Path;

pub use codegen::AssembleOptions;
use errors::AssembleError;
use file_reader::FileReader;

/// Reads `source_path` through `reader`, then assembles it into a 65,536
/// byte ROM image. No partial ROM is returned on failure; assembly errors
/// surface via the typed `AssembleError` taxonomy, not a partial result.
pub fn assemble<F: FileReader>(
    source_path: &Path,
    options: AssembleOptions,
    reader: &F,
) -> Result<Vec<u8>, AssembleError> {
    let source = reader
        .read_to_string(source_path)
        .map_err(|e| AssembleError::Io(e.to_string()))?;
    codegen::assemble_tokens(&source, options)
}

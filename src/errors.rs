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

use thiserror::Error;

use crate::rom::{BadMetadata, HeaderError};

#[derive(Error, Debug, PartialEq)]
pub enum LexError {
    #[error("{line}:{col}: unterminated string literal")]
    UnterminatedString { line: usize, col: usize },
    #[error("{line}:{col}: unknown escape sequence '\\{ch}'")]
    BadEscape { line: usize, col: usize, ch: char },
    #[error("{line}:{col}: malformed number '{text}'")]
    BadNumber {
        line: usize,
        col: usize,
        text: String,
    },
    #[error("{line}:{col}: stray character '{ch}'")]
    StrayChar { line: usize, col: usize, ch: char },
}

#[derive(Error, Debug, PartialEq)]
pub enum PreprocessError {
    #[error("{line}: duplicate symbol definition: {name}")]
    DuplicateSymbol { line: usize, name: String },
    #[error("{line}: unknown identifier: {name}")]
    UnknownIdentifier { line: usize, name: String },
    #[error("macro recursion too deep expanding '{name}' (limit {limit})")]
    MacroRecursionTooDeep { name: String, limit: usize },
    #[error("{line}: invalid .repeat count")]
    BadRepeatCount { line: usize },
}

#[derive(Error, Debug, PartialEq)]
pub enum CodegenError {
    #[error("unresolved label: {name}")]
    UnresolvedLabel { name: String },
    #[error("ROM overflow: program and data exceed {limit} bytes (needed {needed})")]
    RomOverflow { needed: usize, limit: usize },
    #[error("relative label reference ({dir}{count}) has no matching anonymous label")]
    BadRelativeRef { dir: char, count: usize },
    #[error("{line}: '{mnemonic}' has no form matching its operands")]
    BadOperandShape { line: usize, mnemonic: &'static str },
}

#[derive(Error, Debug, PartialEq)]
pub enum AssembleError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
    #[error("I/O error reading source: {0}")]
    Io(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum VmError {
    #[error("header error: {0}")]
    Header(#[from] HeaderError),
    #[error("stack overflow at PC 0x{pc:04X}")]
    StackOverflow { pc: u16 },
    #[error("stack underflow at PC 0x{pc:04X}")]
    StackUnderflow { pc: u16 },
    #[error("bad debug metadata at PC 0x{pc:04X}: {source}")]
    BadMetadata { pc: u16, source: BadMetadata },
    #[error("PANIC opcode executed at PC 0x{pc:04X}")]
    PanicOpcode { pc: u16 },
    #[error("unknown syscall number {number} (A=0x{a:08X})")]
    UnknownSyscall { number: u32, a: u32 },
    #[error("syscall I/O error: {0}")]
    SyscallIo(String),
}

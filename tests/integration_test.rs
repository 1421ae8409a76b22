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

//! End-to-end tests driving the full pipeline through the public
//! `hexvm::assemble` entry point (with `MockFileReader` standing in for
//! disk) and, for the scenarios that need to observe execution, through
//! `VmState::run` on the resulting ROM bytes.

use hexvm::errors::AssembleError;
use hexvm::file_reader::MockFileReader;
use hexvm::rom::{Header, HEADER_BYTES, PADDING_BYTE, ROM_SIZE};
use hexvm::syscall::RecordingSyscalls;
use hexvm::vm::{HaltReason, VmState};
use hexvm::{assemble, AssembleOptions};
use std::path::Path;

fn assemble_source(src: &str, debug_mode: bool) -> Vec<u8> {
    let mut reader = MockFileReader::default();
    reader.add_file("test.asm", src);
    assemble(
        Path::new("test.asm"),
        AssembleOptions { debug_mode },
        &reader,
    )
    .unwrap()
}

fn run_to_halt(rom: &[u8]) -> (VmState, HaltReason) {
    let mut vm = VmState::load(rom).unwrap();
    let mut syscalls = RecordingSyscalls::default();
    let reason = vm.run(&mut syscalls).unwrap();
    (vm, reason)
}

// S1 — minimal program: header entry point is 16, byte 16 is BRK, the rest
// of the ROM is padding, and running it halts immediately.
#[test]
fn s1_minimal_program_rom_layout() {
    let rom = assemble_source("_START:\nBRK\n", false);
    assert_eq!(rom.len(), ROM_SIZE);

    let header = Header::parse(&rom[0..HEADER_BYTES]).unwrap();
    assert_eq!(header.entry_point, HEADER_BYTES as u16);
    assert_eq!(rom[HEADER_BYTES], hexvm::isa::Opcode::Brk.to_byte());
    assert!(rom[HEADER_BYTES + 1..].iter().all(|&b| b == PADDING_BYTE));

    let (_vm, reason) = run_to_halt(&rom);
    assert_eq!(reason, HaltReason::Brk);
}

// S2 — a recursive-looking accumulator-in/accumulator-out subroutine:
// fibonacci(10) == 55, computed iteratively via a WRAM-resident loop
// counter so the subroutine only needs LDA/STA/CMP/branch/JSR/RET.
const FIBONACCI_PROGRAM: &str = r#"
_START:
    LDA 0xA
    JSR Fibonacci
    BRK

Fibonacci:
    PUSH X
    PUSH Y
    STA $0x0000
    LDX 0x0
    LDY 0x1
FibLoop:
    LDA $0x0000
    CMP A 0x0
    BEQ FibDone
    PUSH A
    LDA X
    CLC
    ADD Y
    LDX Y
    LDY A
    POP A
    DEC A
    STA $0x0000
    JMP FibLoop
FibDone:
    LDA X
    POP Y
    POP X
    RET
"#;

#[test]
fn s2_fibonacci_accumulator_in_accumulator_out() {
    let rom = assemble_source(FIBONACCI_PROGRAM, false);
    let (vm, reason) = run_to_halt(&rom);
    assert_eq!(reason, HaltReason::Brk);
    assert_eq!(vm.accumulator, 55);
}

// S3 — indexed load with stride: WRAM holds four u32 values; LDA $addr X
// with stride 4 and X=2 reads the third.
#[test]
fn s3_indexed_load_with_stride() {
    let rom = assemble_source("STRIDE 0x4\nLDX 0x2\nLDA $0x0000 X\nBRK\n", false);
    let mut vm = VmState::load(&rom).unwrap();
    for (i, v) in [1u32, 2, 3, 4].into_iter().enumerate() {
        let addr = (i * 4) as u16;
        let bytes = v.to_le_bytes();
        vm.wram[addr as usize..addr as usize + 4].copy_from_slice(&bytes);
    }
    let mut syscalls = RecordingSyscalls::default();
    vm.run(&mut syscalls).unwrap();
    assert_eq!(vm.accumulator, 3);
}

// S4 — a macro emitting `INC A` once, called inside `.repeat 5`.
#[test]
fn s4_macro_plus_repeat() {
    let src = ".macro bump\nINC A\n.endmacro\nLDA 0x0\n.repeat 5\nbump\n.endrepeat\nBRK\n";
    let rom = assemble_source(src, false);
    let (vm, _) = run_to_halt(&rom);
    assert_eq!(vm.accumulator, 5);
}

// S5 — three anonymous labels; `@-`, `@--`, `@---` must resolve to the
// first, second, third nearest preceding one respectively.
#[test]
fn s5_relative_anonymous_labels_resolve_in_order() {
    let src = "\
_START:
@:
LDA 0x1
BRK
@AnonLabel:
LDA 0x2
BRK
@:
LDA 0x3
JMP @-
JMP @--
JMP @---
";
    let rom = assemble_source(src, false);
    // @- from the final JMP block is the third anon label (`LDA 0x3`'s own
    // block); @-- is `@AnonLabel:`; @--- is the first `@:`.
    let jmp_region_start = {
        // Find the first JMP opcode byte position.
        rom.iter()
            .position(|&b| b == hexvm::isa::Opcode::JmpAddr.to_byte())
            .unwrap()
    };
    let first_target = u16::from_le_bytes([rom[jmp_region_start + 1], rom[jmp_region_start + 2]]);
    let second_target =
        u16::from_le_bytes([rom[jmp_region_start + 4], rom[jmp_region_start + 5]]);
    let third_target = u16::from_le_bytes([rom[jmp_region_start + 7], rom[jmp_region_start + 8]]);

    // first_target (@-) points at the third anon label's address, i.e. the
    // `LDA 0x3` block; second_target (@--) at `@AnonLabel:`'s `LDA 0x2`;
    // third_target (@---) at the very first `@:`'s `LDA 0x1`.
    assert_ne!(first_target, second_target);
    assert_ne!(second_target, third_target);
    assert!(third_target < second_target && second_target < first_target);
}

// S6 — forward branch: the BEQ must skip the wrong load.
#[test]
fn s6_forward_branch_skips_wrong_load() {
    let rom = assemble_source("LDA 0x0\nCMP A 0x0\nBEQ Done\nLDA 0x63\nDone:\nBRK\n", false);
    let (vm, _) = run_to_halt(&rom);
    assert_eq!(vm.accumulator, 0);
}

// Invariant 1: Header::serialize(Header::parse(b)) == b.
#[test]
fn header_round_trips_through_serialize_and_parse() {
    let header = Header::new(0x2000, true);
    let bytes = header.serialize();
    let reparsed = Header::parse(&bytes).unwrap();
    assert_eq!(reparsed.serialize(), bytes);
}

// Invariant 3/4: ADD_LIT/SUB_LIT round-trip and INC/DEC cancel out.
#[test]
fn add_sub_round_trip_and_inc_dec_cancel() {
    let rom = assemble_source(
        "LDA 0xA\nCLC\nADD 0x5\nSEC\nSUB 0x5\nINC A\nDEC A\nBRK\n",
        false,
    );
    let (vm, _) = run_to_halt(&rom);
    assert_eq!(vm.accumulator, 0xA);
}

// Invariant 6: assembling in debug mode and disassembling reproduces every
// label's mnemonic-level use site.
#[test]
fn debug_mode_round_trips_through_disassembly() {
    let rom = assemble_source("_START:\nJMP Target\nTarget:\nBRK\n", true);
    let listing =
        hexvm::disasm::disassemble(&rom, &hexvm::disasm::DisasmOptions::default()).unwrap();
    let jmp_line = listing.lines.iter().find(|l| l.contains("JMP")).unwrap();
    assert!(jmp_line.contains("Target"));
}

// Duplicate labels are a hard assembly error with no partial ROM returned.
#[test]
fn duplicate_label_aborts_assembly_with_no_output() {
    let mut reader = MockFileReader::default();
    reader.add_file("test.asm", "Foo:\nBRK\nFoo:\nBRK\n");
    let result = assemble(
        Path::new("test.asm"),
        AssembleOptions { debug_mode: false },
        &reader,
    );
    assert!(matches!(result, Err(AssembleError::Preprocess(_))));
}

// An unresolved label reference is a codegen error, not a panic.
#[test]
fn unresolved_label_is_a_codegen_error() {
    let mut reader = MockFileReader::default();
    reader.add_file("test.asm", "JMP Nowhere\nBRK\n");
    let result = assemble(
        Path::new("test.asm"),
        AssembleOptions { debug_mode: false },
        &reader,
    );
    assert!(matches!(result, Err(AssembleError::Codegen(_))));
}

// Missing source file surfaces as an Io error, not a panic.
#[test]
fn missing_source_file_is_an_io_error() {
    let reader = MockFileReader::default();
    let result = assemble(
        Path::new("missing.asm"),
        AssembleOptions { debug_mode: false },
        &reader,
    );
    assert!(matches!(result, Err(AssembleError::Io(_))));
}

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

//! The virtual machine: register/flag/memory state plus the fetch-decode-
//! execute loop. `VmState::step` executes exactly one instruction;
//! `VmState::run` loops it to completion. Both the Runner and the Debugger
//! build on this same core, differing only in what they do between steps
//! (the Debugger traces, the Runner sleeps on `NOP`).

use crate::errors::VmError;
use crate::isa::Opcode;
use crate::rom::{DebugMetadataType, Header, ROM_SIZE};
use crate::syscall::{SyscallOutcome, SyscallTable};

/// Depth of the combined data/return-address stack, in bytes.
pub const STACK_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    Brk,
    Exit(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continued { opcode: Opcode },
    Halted { opcode: Opcode, reason: HaltReason },
}

pub struct VmState {
    pub rom: Box<[u8; ROM_SIZE]>,
    pub wram: Box<[u8; ROM_SIZE]>,
    pub stack: Box<[u8; STACK_SIZE]>,
    pub stack_pointer: usize,
    pub accumulator: u32,
    pub x_index: u32,
    pub y_index: u32,
    pub program_counter: u16,
    pub carry_flag: bool,
    pub zero_flag: bool,
    pub negative_flag: bool,
    pub overflow_flag: bool,
    pub index_byte_stride: u8,
}

impl VmState {
    /// Parses the ROM's header and constructs a freshly zeroed VM with the
    /// program counter at the header's `entry_point`.
    pub fn load(rom_bytes: &[u8]) -> Result<VmState, VmError> {
        let header = Header::parse(rom_bytes)?;
        let mut rom = Box::new([0u8; ROM_SIZE]);
        let n = rom_bytes.len().min(ROM_SIZE);
        rom[..n].copy_from_slice(&rom_bytes[..n]);
        Ok(VmState {
            rom,
            wram: Box::new([0u8; ROM_SIZE]),
            stack: Box::new([0u8; STACK_SIZE]),
            stack_pointer: 0,
            accumulator: 0,
            x_index: 0,
            y_index: 0,
            program_counter: header.entry_point,
            carry_flag: false,
            zero_flag: false,
            negative_flag: false,
            overflow_flag: false,
            index_byte_stride: 1,
        })
    }

    fn read_rom_u16(&self, addr: u16) -> u16 {
        let a = addr as usize;
        u16::from_le_bytes([self.rom[a], self.rom[a + 1]])
    }

    fn read_rom_u32(&self, addr: u16) -> u32 {
        let a = addr as usize;
        u32::from_le_bytes([self.rom[a], self.rom[a + 1], self.rom[a + 2], self.rom[a + 3]])
    }

    fn wram_idx(&self, addr: u16, offset: u16) -> usize {
        addr.wrapping_add(offset) as usize
    }

    fn read_wram_u32(&self, addr: u16) -> u32 {
        u32::from_le_bytes([
            self.wram[self.wram_idx(addr, 0)],
            self.wram[self.wram_idx(addr, 1)],
            self.wram[self.wram_idx(addr, 2)],
            self.wram[self.wram_idx(addr, 3)],
        ])
    }

    fn write_wram_u32(&mut self, addr: u16, value: u32) {
        let bytes = value.to_le_bytes();
        for (i, b) in bytes.into_iter().enumerate() {
            let idx = self.wram_idx(addr, i as u16);
            self.wram[idx] = b;
        }
    }

    fn push_u16(&mut self, value: u16) -> Result<(), VmError> {
        if self.stack_pointer + 2 > STACK_SIZE {
            return Err(VmError::StackOverflow {
                pc: self.program_counter,
            });
        }
        let bytes = value.to_le_bytes();
        self.stack[self.stack_pointer] = bytes[0];
        self.stack[self.stack_pointer + 1] = bytes[1];
        self.stack_pointer += 2;
        Ok(())
    }

    fn pop_u16(&mut self) -> Result<u16, VmError> {
        if self.stack_pointer < 2 {
            return Err(VmError::StackUnderflow {
                pc: self.program_counter,
            });
        }
        self.stack_pointer -= 2;
        Ok(u16::from_le_bytes([
            self.stack[self.stack_pointer],
            self.stack[self.stack_pointer + 1],
        ]))
    }

    fn push_u32(&mut self, value: u32) -> Result<(), VmError> {
        if self.stack_pointer + 4 > STACK_SIZE {
            return Err(VmError::StackOverflow {
                pc: self.program_counter,
            });
        }
        let bytes = value.to_le_bytes();
        self.stack[self.stack_pointer..self.stack_pointer + 4].copy_from_slice(&bytes);
        self.stack_pointer += 4;
        Ok(())
    }

    fn pop_u32(&mut self) -> Result<u32, VmError> {
        if self.stack_pointer < 4 {
            return Err(VmError::StackUnderflow {
                pc: self.program_counter,
            });
        }
        self.stack_pointer -= 4;
        Ok(u32::from_le_bytes(
            self.stack[self.stack_pointer..self.stack_pointer + 4]
                .try_into()
                .unwrap(),
        ))
    }

    fn reg(&self, r: crate::isa::Register) -> u32 {
        use crate::isa::Register::*;
        match r {
            A => self.accumulator,
            X => self.x_index,
            Y => self.y_index,
        }
    }

    fn set_reg(&mut self, r: crate::isa::Register, value: u32) {
        use crate::isa::Register::*;
        match r {
            A => self.accumulator = value,
            X => self.x_index = value,
            Y => self.y_index = value,
        }
    }

    fn apply_add_flags(&mut self, a: u32, b: u32, carry_in: bool) -> u32 {
        let (r1, c1) = a.overflowing_add(b);
        let (result, c2) = r1.overflowing_add(carry_in as u32);
        self.carry_flag = c1 || c2;
        self.zero_flag = result == 0;
        self.negative_flag = result & 0x8000_0000 != 0;
        self.overflow_flag = (!(a ^ b) & (a ^ result)) & 0x8000_0000 != 0;
        result
    }

    /// `a - b - borrow_in`, implemented as `a + !b + !borrow_in` so the
    /// carry flag keeps its "no borrow occurred" meaning throughout.
    fn apply_sub_flags(&mut self, a: u32, b: u32, borrow_in: bool) -> u32 {
        self.apply_add_flags(a, !b, !borrow_in)
    }

    /// `CMP`: same subtraction as `SUB`, but with no incoming borrow and no
    /// register mutation — only flags are observable.
    fn cmp_flags(&mut self, l: u32, r: u32) {
        let diff = l.wrapping_sub(r);
        self.carry_flag = l >= r;
        self.zero_flag = diff == 0;
        self.negative_flag = diff & 0x8000_0000 != 0;
        self.overflow_flag = ((l ^ r) & (l ^ diff)) & 0x8000_0000 != 0;
    }

    fn branch_taken(&self, op: Opcode) -> bool {
        use Opcode::*;
        match op {
            BcsAddr => self.carry_flag,
            BccAddr => !self.carry_flag,
            BeqAddr => self.zero_flag,
            BneAddr => !self.zero_flag,
            BmiAddr => self.negative_flag,
            BplAddr => !self.negative_flag,
            BvsAddr => self.overflow_flag,
            BvcAddr => !self.overflow_flag,
            _ => unreachable!("branch_taken called on non-branch opcode"),
        }
    }

    /// Executes exactly one instruction, advancing `program_counter`.
    pub fn step(&mut self, syscalls: &mut dyn SyscallTable) -> Result<StepOutcome, VmError> {
        use crate::isa::Register::*;
        use Opcode::*;

        let pc = self.program_counter;
        let op = Opcode::decode(self.rom[pc as usize]);
        let mut pc_increment = op.instruction_byte_length() as u16;

        match op {
            Panic => return Err(VmError::PanicOpcode { pc }),
            Brk => {
                return Ok(StepOutcome::Halted {
                    opcode: op,
                    reason: HaltReason::Brk,
                })
            }
            Nop => {}
            Clc => self.carry_flag = false,
            Sec => self.carry_flag = true,

            StrideLit => self.index_byte_stride = self.rom[pc as usize + 1],

            Systemcall => {
                let (outcome, result) = syscalls
                    .dispatch(self.accumulator, self.x_index)
                    .map_err(|e| VmError::SyscallIo(e.to_string()))?;
                match outcome {
                    SyscallOutcome::Unknown(number) => {
                        return Err(VmError::UnknownSyscall {
                            number,
                            a: self.accumulator,
                        })
                    }
                    SyscallOutcome::Exit(code) => {
                        self.accumulator = result;
                        return Ok(StepOutcome::Halted {
                            opcode: op,
                            reason: HaltReason::Exit(code),
                        });
                    }
                    SyscallOutcome::Continue => self.accumulator = result,
                }
            }

            LdaLit => self.accumulator = self.read_rom_u32(pc + 1),
            LdxLit => self.x_index = self.read_rom_u32(pc + 1),
            LdyLit => self.y_index = self.read_rom_u32(pc + 1),

            LdaAddr => {
                let addr = self.read_rom_u16(pc + 1);
                self.accumulator = self.read_wram_u32(addr);
            }
            LdxAddr => {
                let addr = self.read_rom_u16(pc + 1);
                self.x_index = self.read_wram_u32(addr);
            }
            LdyAddr => {
                let addr = self.read_rom_u16(pc + 1);
                self.y_index = self.read_wram_u32(addr);
            }

            LdaX => self.accumulator = self.x_index,
            LdaY => self.accumulator = self.y_index,
            LdxA => self.x_index = self.accumulator,
            LdxY => self.x_index = self.y_index,
            LdyA => self.y_index = self.accumulator,
            LdyX => self.y_index = self.x_index,

            LdaAddrX | LdaAddrY => {
                let addr = self.read_rom_u16(pc + 1);
                let idx = if op == LdaAddrX { self.x_index } else { self.y_index };
                let idx16 = idx as u16;
                let stride = self.index_byte_stride as u16;
                let effective = addr.wrapping_add(idx16.wrapping_mul(stride));
                self.accumulator = self.read_wram_u32(effective);
            }

            LeaAddr => self.accumulator = self.read_rom_u16(pc + 1) as u32,
            LexAddr => self.x_index = self.read_rom_u16(pc + 1) as u32,
            LeyAddr => self.y_index = self.read_rom_u16(pc + 1) as u32,

            StaAddr => {
                let addr = self.read_rom_u16(pc + 1);
                self.write_wram_u32(addr, self.accumulator);
            }
            StxAddr => {
                let addr = self.read_rom_u16(pc + 1);
                self.write_wram_u32(addr, self.x_index);
            }
            StyAddr => {
                let addr = self.read_rom_u16(pc + 1);
                self.write_wram_u32(addr, self.y_index);
            }

            JmpAddr => {
                self.program_counter = self.read_rom_u16(pc + 1);
                pc_increment = 0;
            }
            JsrAddr => {
                let target = self.read_rom_u16(pc + 1);
                self.push_u16(pc.wrapping_add(3))?;
                self.program_counter = target;
                pc_increment = 0;
            }
            Ret => {
                self.program_counter = self.pop_u16()?;
                pc_increment = 0;
            }

            CmpAX => self.cmp_flags(self.accumulator, self.x_index),
            CmpAY => self.cmp_flags(self.accumulator, self.y_index),
            CmpXA => self.cmp_flags(self.x_index, self.accumulator),
            CmpXY => self.cmp_flags(self.x_index, self.y_index),
            CmpYA => self.cmp_flags(self.y_index, self.accumulator),
            CmpYX => self.cmp_flags(self.y_index, self.x_index),

            CmpALit => {
                let r = self.read_rom_u32(pc + 1);
                self.cmp_flags(self.accumulator, r);
            }
            CmpXLit => {
                let r = self.read_rom_u32(pc + 1);
                self.cmp_flags(self.x_index, r);
            }
            CmpYLit => {
                let r = self.read_rom_u32(pc + 1);
                self.cmp_flags(self.y_index, r);
            }

            CmpAAddr => {
                let addr = self.read_rom_u16(pc + 1);
                let r = self.read_wram_u32(addr);
                self.cmp_flags(self.accumulator, r);
            }
            CmpXAddr => {
                let addr = self.read_rom_u16(pc + 1);
                let r = self.read_wram_u32(addr);
                self.cmp_flags(self.x_index, r);
            }
            CmpYAddr => {
                let addr = self.read_rom_u16(pc + 1);
                let r = self.read_wram_u32(addr);
                self.cmp_flags(self.y_index, r);
            }

            BcsAddr | BccAddr | BeqAddr | BneAddr | BmiAddr | BplAddr | BvsAddr | BvcAddr => {
                if self.branch_taken(op) {
                    self.program_counter = self.read_rom_u16(pc + 1);
                    pc_increment = 0;
                }
            }

            AddLit => {
                let operand = self.read_rom_u32(pc + 1);
                self.accumulator = self.apply_add_flags(self.accumulator, operand, self.carry_flag);
            }
            AddAddr => {
                let addr = self.read_rom_u16(pc + 1);
                let operand = self.read_wram_u32(addr);
                self.accumulator = self.apply_add_flags(self.accumulator, operand, self.carry_flag);
            }
            AddX => {
                self.accumulator = self.apply_add_flags(self.accumulator, self.x_index, self.carry_flag)
            }
            AddY => {
                self.accumulator = self.apply_add_flags(self.accumulator, self.y_index, self.carry_flag)
            }

            SubLit => {
                let operand = self.read_rom_u32(pc + 1);
                self.accumulator =
                    self.apply_sub_flags(self.accumulator, operand, !self.carry_flag);
            }
            SubAddr => {
                let addr = self.read_rom_u16(pc + 1);
                let operand = self.read_wram_u32(addr);
                self.accumulator =
                    self.apply_sub_flags(self.accumulator, operand, !self.carry_flag);
            }
            SubX => {
                self.accumulator =
                    self.apply_sub_flags(self.accumulator, self.x_index, !self.carry_flag)
            }
            SubY => {
                self.accumulator =
                    self.apply_sub_flags(self.accumulator, self.y_index, !self.carry_flag)
            }

            IncA | IncX | IncY => {
                let reg = match op {
                    IncA => A,
                    IncX => X,
                    _ => Y,
                };
                let value = self.reg(reg).wrapping_add(1);
                self.zero_flag = value == 0;
                self.negative_flag = value & 0x8000_0000 != 0;
                self.set_reg(reg, value);
            }
            IncAddr => {
                let addr = self.read_rom_u16(pc + 1);
                let value = self.read_wram_u32(addr).wrapping_add(1);
                self.zero_flag = value == 0;
                self.negative_flag = value & 0x8000_0000 != 0;
                self.write_wram_u32(addr, value);
            }

            DecA | DecX | DecY => {
                let reg = match op {
                    DecA => A,
                    DecX => X,
                    _ => Y,
                };
                let value = self.reg(reg).wrapping_sub(1);
                self.zero_flag = value == 0;
                self.negative_flag = value & 0x8000_0000 != 0;
                self.set_reg(reg, value);
            }
            DecAddr => {
                let addr = self.read_rom_u16(pc + 1);
                let value = self.read_wram_u32(addr).wrapping_sub(1);
                self.zero_flag = value == 0;
                self.negative_flag = value & 0x8000_0000 != 0;
                self.write_wram_u32(addr, value);
            }

            PushA => self.push_u32(self.accumulator)?,
            PushX => self.push_u32(self.x_index)?,
            PushY => self.push_u32(self.y_index)?,
            PopA => self.accumulator = self.pop_u32()?,
            PopX => self.x_index = self.pop_u32()?,
            PopY => self.y_index = self.pop_u32()?,

            DebugMetadataSignal => {
                let frame_len = DebugMetadataType::payload_length(&self.rom[pc as usize..])
                    .map_err(|source| VmError::BadMetadata { pc, source })?;
                self.program_counter = pc.wrapping_add(frame_len as u16);
                pc_increment = 0;
            }
        }

        if pc_increment != 0 {
            self.program_counter = pc.wrapping_add(pc_increment);
        }

        Ok(StepOutcome::Continued { opcode: op })
    }

    /// Runs to completion: loops `step` until it halts or errors.
    pub fn run(&mut self, syscalls: &mut dyn SyscallTable) -> Result<HaltReason, VmError> {
        loop {
            match self.step(syscalls)? {
                StepOutcome::Continued { .. } => {}
                StepOutcome::Halted { reason, .. } => return Ok(reason),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{assemble_tokens, AssembleOptions};
    use crate::syscall::RecordingSyscalls;

    fn run_source(src: &str) -> (VmState, HaltReason) {
        let rom = assemble_tokens(src, AssembleOptions { debug_mode: false }).unwrap();
        let mut vm = VmState::load(&rom).unwrap();
        let mut syscalls = RecordingSyscalls::default();
        let reason = vm.run(&mut syscalls).unwrap();
        (vm, reason)
    }

    #[test]
    fn s1_minimal_brk_halts_immediately() {
        let (_vm, reason) = run_source("_START:\nBRK\n");
        assert_eq!(reason, HaltReason::Brk);
    }

    #[test]
    fn s6_forward_branch_skips_the_wrong_load() {
        let (vm, _) = run_source("LDA 0x0\nCMP A 0x0\nBEQ Done\nLDA 0x63\nDone:\nBRK\n");
        assert_eq!(vm.accumulator, 0);
    }

    #[test]
    fn add_then_sub_restores_accumulator() {
        let (vm, _) = run_source("LDA 0xA\nCLC\nADD 0x5\nSEC\nSUB 0x5\nBRK\n");
        assert_eq!(vm.accumulator, 0xA);
    }

    #[test]
    fn inc_then_dec_leaves_accumulator_unchanged() {
        let (vm, _) = run_source("LDA 0x7\nINC A\nDEC A\nBRK\n");
        assert_eq!(vm.accumulator, 0x7);
    }

    #[test]
    fn jsr_ret_returns_to_instruction_after_call() {
        let (vm, reason) = run_source(
            "_START:\nJSR Callee\nLDA 0x2A\nBRK\nCallee:\nRET\n",
        );
        assert_eq!(reason, HaltReason::Brk);
        assert_eq!(vm.accumulator, 0x2A);
    }

    #[test]
    fn stride_scales_indexed_load() {
        let rom = assemble_tokens("STRIDE 0x4\nLDX 0x2\nLDA $0x0000 X\nBRK\n", AssembleOptions { debug_mode: false })
            .unwrap();
        let mut vm = VmState::load(&rom).unwrap();
        for (i, v) in [1u32, 2, 3, 4].into_iter().enumerate() {
            vm.write_wram_u32((i * 4) as u16, v);
        }
        let mut syscalls = RecordingSyscalls::default();
        vm.run(&mut syscalls).unwrap();
        assert_eq!(vm.accumulator, 3);
    }

    #[test]
    fn stack_underflow_on_ret_without_call() {
        let rom = assemble_tokens("RET\n", AssembleOptions { debug_mode: false }).unwrap();
        let mut vm = VmState::load(&rom).unwrap();
        let mut syscalls = RecordingSyscalls::default();
        let result = vm.run(&mut syscalls);
        assert!(matches!(result, Err(VmError::StackUnderflow { .. })));
    }

    #[test]
    fn panic_opcode_is_fatal() {
        let mut rom = vec![0xCCu8; ROM_SIZE];
        let header = Header::new(16, false);
        rom[0..16].copy_from_slice(&header.serialize());
        rom[16] = Opcode::Panic.to_byte();
        let mut vm = VmState::load(&rom).unwrap();
        let mut syscalls = RecordingSyscalls::default();
        assert!(matches!(
            vm.run(&mut syscalls),
            Err(VmError::PanicOpcode { .. })
        ));
    }

    #[test]
    fn debug_metadata_frame_is_skipped_by_the_interpreter() {
        let rom = assemble_tokens("Foo:\nBRK\n", AssembleOptions { debug_mode: true }).unwrap();
        let (_vm, reason) = {
            let mut vm = VmState::load(&rom).unwrap();
            let mut syscalls = RecordingSyscalls::default();
            let reason = vm.run(&mut syscalls).unwrap();
            (vm, reason)
        };
        assert_eq!(reason, HaltReason::Brk);
    }

    #[test]
    fn syscall_print_char_is_observable_via_recording_table() {
        let rom = assemble_tokens("LDA 0x2\nLDX 0x41\nSYSCALL\nBRK\n", AssembleOptions { debug_mode: false })
            .unwrap();
        let mut vm = VmState::load(&rom).unwrap();
        let mut syscalls = RecordingSyscalls::default();
        vm.run(&mut syscalls).unwrap();
        assert_eq!(syscalls.printed, "A");
    }

    #[test]
    fn unrecognized_syscall_number_is_a_fatal_error() {
        let rom = assemble_tokens("LDA 0x63\nSYSCALL\nBRK\n", AssembleOptions { debug_mode: false })
            .unwrap();
        let mut vm = VmState::load(&rom).unwrap();
        let mut syscalls = RecordingSyscalls::default();
        let result = vm.run(&mut syscalls);
        assert!(matches!(
            result,
            Err(VmError::UnknownSyscall { number: 0x63, .. })
        ));
    }
}

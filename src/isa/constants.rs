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

// Opcode byte values. Grouped by category; the groupings have no decoding
// significance (decode() is an exhaustive match, not arithmetic on ranges).

// control / misc
pub const PANIC_OPCODE: u8 = 0;
pub const NOP_OPCODE: u8 = 1;
pub const BRK_OPCODE: u8 = 2;
pub const CLC_OPCODE: u8 = 3;
pub const SEC_OPCODE: u8 = 4;
pub const RET_OPCODE: u8 = 5;
pub const STRIDE_LIT_OPCODE: u8 = 6;
pub const SYSTEMCALL_OPCODE: u8 = 7;

// immediate loads
pub const LDA_LIT_OPCODE: u8 = 8;
pub const LDX_LIT_OPCODE: u8 = 9;
pub const LDY_LIT_OPCODE: u8 = 10;

// WRAM loads
pub const LDA_ADDR_OPCODE: u8 = 11;
pub const LDX_ADDR_OPCODE: u8 = 12;
pub const LDY_ADDR_OPCODE: u8 = 13;

// register-to-register loads
pub const LDA_X_OPCODE: u8 = 14;
pub const LDA_Y_OPCODE: u8 = 15;
pub const LDX_A_OPCODE: u8 = 16;
pub const LDX_Y_OPCODE: u8 = 17;
pub const LDY_A_OPCODE: u8 = 18;
pub const LDY_X_OPCODE: u8 = 19;

// indexed loads (stride-scaled)
pub const LDA_ADDR_X_OPCODE: u8 = 20;
pub const LDA_ADDR_Y_OPCODE: u8 = 21;

// load-effective-address
pub const LEA_ADDR_OPCODE: u8 = 22;
pub const LEX_ADDR_OPCODE: u8 = 23;
pub const LEY_ADDR_OPCODE: u8 = 24;

// stores
pub const STA_ADDR_OPCODE: u8 = 25;
pub const STX_ADDR_OPCODE: u8 = 26;
pub const STY_ADDR_OPCODE: u8 = 27;

// control flow
pub const JMP_ADDR_OPCODE: u8 = 28;
pub const JSR_ADDR_OPCODE: u8 = 29;

// register-register compares
pub const CMP_A_X_OPCODE: u8 = 30;
pub const CMP_A_Y_OPCODE: u8 = 31;
pub const CMP_X_A_OPCODE: u8 = 32;
pub const CMP_X_Y_OPCODE: u8 = 33;
pub const CMP_Y_A_OPCODE: u8 = 34;
pub const CMP_Y_X_OPCODE: u8 = 35;

// immediate compares
pub const CMP_A_LIT_OPCODE: u8 = 36;
pub const CMP_X_LIT_OPCODE: u8 = 37;
pub const CMP_Y_LIT_OPCODE: u8 = 38;

// WRAM compares
pub const CMP_A_ADDR_OPCODE: u8 = 39;
pub const CMP_X_ADDR_OPCODE: u8 = 40;
pub const CMP_Y_ADDR_OPCODE: u8 = 41;

// branches
pub const BCS_ADDR_OPCODE: u8 = 42;
pub const BCC_ADDR_OPCODE: u8 = 43;
pub const BEQ_ADDR_OPCODE: u8 = 44;
pub const BNE_ADDR_OPCODE: u8 = 45;
pub const BMI_ADDR_OPCODE: u8 = 46;
pub const BPL_ADDR_OPCODE: u8 = 47;
pub const BVS_ADDR_OPCODE: u8 = 48;
pub const BVC_ADDR_OPCODE: u8 = 49;

// accumulator arithmetic
pub const ADD_LIT_OPCODE: u8 = 50;
pub const ADD_ADDR_OPCODE: u8 = 51;
pub const ADD_X_OPCODE: u8 = 52;
pub const ADD_Y_OPCODE: u8 = 53;

pub const SUB_LIT_OPCODE: u8 = 54;
pub const SUB_ADDR_OPCODE: u8 = 55;
pub const SUB_X_OPCODE: u8 = 56;
pub const SUB_Y_OPCODE: u8 = 57;

// increment / decrement
pub const INC_A_OPCODE: u8 = 58;
pub const INC_X_OPCODE: u8 = 59;
pub const INC_Y_OPCODE: u8 = 60;
pub const INC_ADDR_OPCODE: u8 = 61;

pub const DEC_A_OPCODE: u8 = 62;
pub const DEC_X_OPCODE: u8 = 63;
pub const DEC_Y_OPCODE: u8 = 64;
pub const DEC_ADDR_OPCODE: u8 = 65;

// stack
pub const PUSH_A_OPCODE: u8 = 66;
pub const PUSH_X_OPCODE: u8 = 67;
pub const PUSH_Y_OPCODE: u8 = 68;
pub const POP_A_OPCODE: u8 = 69;
pub const POP_X_OPCODE: u8 = 70;
pub const POP_Y_OPCODE: u8 = 71;

// debug metadata. Deliberately placed outside the printable-ASCII range
// used by label names, so a frame's closing signal can never be mistaken
// for a byte inside the name payload.
pub const DEBUG_METADATA_SIGNAL_OPCODE: u8 = 0xFF;

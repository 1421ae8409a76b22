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

//! The instruction set: opcode byte assignment, operand shapes, and the
//! pure functions every other module (lexer excepted) reasons about.

pub mod constants;

use constants::*;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Register {
    A,
    X,
    Y,
}

/// Which memory space an instruction's address operand indexes into.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AddressSpace {
    None,
    Rom,
    Wram,
}

/// The shape of the operand bytes following an opcode, used by the
/// disassembler to know how many bytes to print and how to annotate them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OperandTemplate {
    None,
    Imm32,
    Addr16,
    Imm8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Opcode {
    Panic,
    Nop,
    Brk,
    Clc,
    Sec,
    Ret,
    StrideLit,
    Systemcall,

    LdaLit,
    LdxLit,
    LdyLit,

    LdaAddr,
    LdxAddr,
    LdyAddr,

    LdaX,
    LdaY,
    LdxA,
    LdxY,
    LdyA,
    LdyX,

    LdaAddrX,
    LdaAddrY,

    LeaAddr,
    LexAddr,
    LeyAddr,

    StaAddr,
    StxAddr,
    StyAddr,

    JmpAddr,
    JsrAddr,

    CmpAX,
    CmpAY,
    CmpXA,
    CmpXY,
    CmpYA,
    CmpYX,

    CmpALit,
    CmpXLit,
    CmpYLit,

    CmpAAddr,
    CmpXAddr,
    CmpYAddr,

    BcsAddr,
    BccAddr,
    BeqAddr,
    BneAddr,
    BmiAddr,
    BplAddr,
    BvsAddr,
    BvcAddr,

    AddLit,
    AddAddr,
    AddX,
    AddY,

    SubLit,
    SubAddr,
    SubX,
    SubY,

    IncA,
    IncX,
    IncY,
    IncAddr,

    DecA,
    DecX,
    DecY,
    DecAddr,

    PushA,
    PushX,
    PushY,
    PopA,
    PopX,
    PopY,

    DebugMetadataSignal,
}

impl Opcode {
    /// Decodes a raw byte. Unknown byte values decode to `Panic`, matching
    /// the VM's fail-fast contract for corrupt or foreign ROM images.
    pub fn decode(byte: u8) -> Opcode {
        match byte {
            PANIC_OPCODE => Opcode::Panic,
            NOP_OPCODE => Opcode::Nop,
            BRK_OPCODE => Opcode::Brk,
            CLC_OPCODE => Opcode::Clc,
            SEC_OPCODE => Opcode::Sec,
            RET_OPCODE => Opcode::Ret,
            STRIDE_LIT_OPCODE => Opcode::StrideLit,
            SYSTEMCALL_OPCODE => Opcode::Systemcall,

            LDA_LIT_OPCODE => Opcode::LdaLit,
            LDX_LIT_OPCODE => Opcode::LdxLit,
            LDY_LIT_OPCODE => Opcode::LdyLit,

            LDA_ADDR_OPCODE => Opcode::LdaAddr,
            LDX_ADDR_OPCODE => Opcode::LdxAddr,
            LDY_ADDR_OPCODE => Opcode::LdyAddr,

            LDA_X_OPCODE => Opcode::LdaX,
            LDA_Y_OPCODE => Opcode::LdaY,
            LDX_A_OPCODE => Opcode::LdxA,
            LDX_Y_OPCODE => Opcode::LdxY,
            LDY_A_OPCODE => Opcode::LdyA,
            LDY_X_OPCODE => Opcode::LdyX,

            LDA_ADDR_X_OPCODE => Opcode::LdaAddrX,
            LDA_ADDR_Y_OPCODE => Opcode::LdaAddrY,

            LEA_ADDR_OPCODE => Opcode::LeaAddr,
            LEX_ADDR_OPCODE => Opcode::LexAddr,
            LEY_ADDR_OPCODE => Opcode::LeyAddr,

            STA_ADDR_OPCODE => Opcode::StaAddr,
            STX_ADDR_OPCODE => Opcode::StxAddr,
            STY_ADDR_OPCODE => Opcode::StyAddr,

            JMP_ADDR_OPCODE => Opcode::JmpAddr,
            JSR_ADDR_OPCODE => Opcode::JsrAddr,

            CMP_A_X_OPCODE => Opcode::CmpAX,
            CMP_A_Y_OPCODE => Opcode::CmpAY,
            CMP_X_A_OPCODE => Opcode::CmpXA,
            CMP_X_Y_OPCODE => Opcode::CmpXY,
            CMP_Y_A_OPCODE => Opcode::CmpYA,
            CMP_Y_X_OPCODE => Opcode::CmpYX,

            CMP_A_LIT_OPCODE => Opcode::CmpALit,
            CMP_X_LIT_OPCODE => Opcode::CmpXLit,
            CMP_Y_LIT_OPCODE => Opcode::CmpYLit,

            CMP_A_ADDR_OPCODE => Opcode::CmpAAddr,
            CMP_X_ADDR_OPCODE => Opcode::CmpXAddr,
            CMP_Y_ADDR_OPCODE => Opcode::CmpYAddr,

            BCS_ADDR_OPCODE => Opcode::BcsAddr,
            BCC_ADDR_OPCODE => Opcode::BccAddr,
            BEQ_ADDR_OPCODE => Opcode::BeqAddr,
            BNE_ADDR_OPCODE => Opcode::BneAddr,
            BMI_ADDR_OPCODE => Opcode::BmiAddr,
            BPL_ADDR_OPCODE => Opcode::BplAddr,
            BVS_ADDR_OPCODE => Opcode::BvsAddr,
            BVC_ADDR_OPCODE => Opcode::BvcAddr,

            ADD_LIT_OPCODE => Opcode::AddLit,
            ADD_ADDR_OPCODE => Opcode::AddAddr,
            ADD_X_OPCODE => Opcode::AddX,
            ADD_Y_OPCODE => Opcode::AddY,

            SUB_LIT_OPCODE => Opcode::SubLit,
            SUB_ADDR_OPCODE => Opcode::SubAddr,
            SUB_X_OPCODE => Opcode::SubX,
            SUB_Y_OPCODE => Opcode::SubY,

            INC_A_OPCODE => Opcode::IncA,
            INC_X_OPCODE => Opcode::IncX,
            INC_Y_OPCODE => Opcode::IncY,
            INC_ADDR_OPCODE => Opcode::IncAddr,

            DEC_A_OPCODE => Opcode::DecA,
            DEC_X_OPCODE => Opcode::DecX,
            DEC_Y_OPCODE => Opcode::DecY,
            DEC_ADDR_OPCODE => Opcode::DecAddr,

            PUSH_A_OPCODE => Opcode::PushA,
            PUSH_X_OPCODE => Opcode::PushX,
            PUSH_Y_OPCODE => Opcode::PushY,
            POP_A_OPCODE => Opcode::PopA,
            POP_X_OPCODE => Opcode::PopX,
            POP_Y_OPCODE => Opcode::PopY,

            DEBUG_METADATA_SIGNAL_OPCODE => Opcode::DebugMetadataSignal,

            _ => Opcode::Panic,
        }
    }

    /// The inverse of `decode`, used by the code generator to emit the
    /// opcode byte for a resolved instruction.
    pub fn to_byte(self) -> u8 {
        match self {
            Opcode::Panic => PANIC_OPCODE,
            Opcode::Nop => NOP_OPCODE,
            Opcode::Brk => BRK_OPCODE,
            Opcode::Clc => CLC_OPCODE,
            Opcode::Sec => SEC_OPCODE,
            Opcode::Ret => RET_OPCODE,
            Opcode::StrideLit => STRIDE_LIT_OPCODE,
            Opcode::Systemcall => SYSTEMCALL_OPCODE,

            Opcode::LdaLit => LDA_LIT_OPCODE,
            Opcode::LdxLit => LDX_LIT_OPCODE,
            Opcode::LdyLit => LDY_LIT_OPCODE,

            Opcode::LdaAddr => LDA_ADDR_OPCODE,
            Opcode::LdxAddr => LDX_ADDR_OPCODE,
            Opcode::LdyAddr => LDY_ADDR_OPCODE,

            Opcode::LdaX => LDA_X_OPCODE,
            Opcode::LdaY => LDA_Y_OPCODE,
            Opcode::LdxA => LDX_A_OPCODE,
            Opcode::LdxY => LDX_Y_OPCODE,
            Opcode::LdyA => LDY_A_OPCODE,
            Opcode::LdyX => LDY_X_OPCODE,

            Opcode::LdaAddrX => LDA_ADDR_X_OPCODE,
            Opcode::LdaAddrY => LDA_ADDR_Y_OPCODE,

            Opcode::LeaAddr => LEA_ADDR_OPCODE,
            Opcode::LexAddr => LEX_ADDR_OPCODE,
            Opcode::LeyAddr => LEY_ADDR_OPCODE,

            Opcode::StaAddr => STA_ADDR_OPCODE,
            Opcode::StxAddr => STX_ADDR_OPCODE,
            Opcode::StyAddr => STY_ADDR_OPCODE,

            Opcode::JmpAddr => JMP_ADDR_OPCODE,
            Opcode::JsrAddr => JSR_ADDR_OPCODE,

            Opcode::CmpAX => CMP_A_X_OPCODE,
            Opcode::CmpAY => CMP_A_Y_OPCODE,
            Opcode::CmpXA => CMP_X_A_OPCODE,
            Opcode::CmpXY => CMP_X_Y_OPCODE,
            Opcode::CmpYA => CMP_Y_A_OPCODE,
            Opcode::CmpYX => CMP_Y_X_OPCODE,

            Opcode::CmpALit => CMP_A_LIT_OPCODE,
            Opcode::CmpXLit => CMP_X_LIT_OPCODE,
            Opcode::CmpYLit => CMP_Y_LIT_OPCODE,

            Opcode::CmpAAddr => CMP_A_ADDR_OPCODE,
            Opcode::CmpXAddr => CMP_X_ADDR_OPCODE,
            Opcode::CmpYAddr => CMP_Y_ADDR_OPCODE,

            Opcode::BcsAddr => BCS_ADDR_OPCODE,
            Opcode::BccAddr => BCC_ADDR_OPCODE,
            Opcode::BeqAddr => BEQ_ADDR_OPCODE,
            Opcode::BneAddr => BNE_ADDR_OPCODE,
            Opcode::BmiAddr => BMI_ADDR_OPCODE,
            Opcode::BplAddr => BPL_ADDR_OPCODE,
            Opcode::BvsAddr => BVS_ADDR_OPCODE,
            Opcode::BvcAddr => BVC_ADDR_OPCODE,

            Opcode::AddLit => ADD_LIT_OPCODE,
            Opcode::AddAddr => ADD_ADDR_OPCODE,
            Opcode::AddX => ADD_X_OPCODE,
            Opcode::AddY => ADD_Y_OPCODE,

            Opcode::SubLit => SUB_LIT_OPCODE,
            Opcode::SubAddr => SUB_ADDR_OPCODE,
            Opcode::SubX => SUB_X_OPCODE,
            Opcode::SubY => SUB_Y_OPCODE,

            Opcode::IncA => INC_A_OPCODE,
            Opcode::IncX => INC_X_OPCODE,
            Opcode::IncY => INC_Y_OPCODE,
            Opcode::IncAddr => INC_ADDR_OPCODE,

            Opcode::DecA => DEC_A_OPCODE,
            Opcode::DecX => DEC_X_OPCODE,
            Opcode::DecY => DEC_Y_OPCODE,
            Opcode::DecAddr => DEC_ADDR_OPCODE,

            Opcode::PushA => PUSH_A_OPCODE,
            Opcode::PushX => PUSH_X_OPCODE,
            Opcode::PushY => PUSH_Y_OPCODE,
            Opcode::PopA => POP_A_OPCODE,
            Opcode::PopX => POP_X_OPCODE,
            Opcode::PopY => POP_Y_OPCODE,

            Opcode::DebugMetadataSignal => DEBUG_METADATA_SIGNAL_OPCODE,
        }
    }

    /// Total instruction length in bytes (opcode + operands). Pure function
    /// of the opcode; the interpreter never inspects operand bytes to learn
    /// how many there are.
    pub fn instruction_byte_length(self) -> u8 {
        match self {
            Opcode::Panic
            | Opcode::Nop
            | Opcode::Brk
            | Opcode::Clc
            | Opcode::Sec
            | Opcode::Ret
            | Opcode::Systemcall
            | Opcode::LdaX
            | Opcode::LdaY
            | Opcode::LdxA
            | Opcode::LdxY
            | Opcode::LdyA
            | Opcode::LdyX
            | Opcode::CmpAX
            | Opcode::CmpAY
            | Opcode::CmpXA
            | Opcode::CmpXY
            | Opcode::CmpYA
            | Opcode::CmpYX
            | Opcode::AddX
            | Opcode::AddY
            | Opcode::SubX
            | Opcode::SubY
            | Opcode::IncA
            | Opcode::IncX
            | Opcode::IncY
            | Opcode::DecA
            | Opcode::DecX
            | Opcode::DecY
            | Opcode::PushA
            | Opcode::PushX
            | Opcode::PushY
            | Opcode::PopA
            | Opcode::PopX
            | Opcode::PopY => 1,

            // opcode + 1-byte literal
            Opcode::StrideLit => 2,

            // opcode + 2-byte address
            Opcode::LdaAddr
            | Opcode::LdxAddr
            | Opcode::LdyAddr
            | Opcode::LdaAddrX
            | Opcode::LdaAddrY
            | Opcode::LeaAddr
            | Opcode::LexAddr
            | Opcode::LeyAddr
            | Opcode::StaAddr
            | Opcode::StxAddr
            | Opcode::StyAddr
            | Opcode::JmpAddr
            | Opcode::JsrAddr
            | Opcode::CmpAAddr
            | Opcode::CmpXAddr
            | Opcode::CmpYAddr
            | Opcode::BcsAddr
            | Opcode::BccAddr
            | Opcode::BeqAddr
            | Opcode::BneAddr
            | Opcode::BmiAddr
            | Opcode::BplAddr
            | Opcode::BvsAddr
            | Opcode::BvcAddr
            | Opcode::AddAddr
            | Opcode::SubAddr
            | Opcode::IncAddr
            | Opcode::DecAddr => 3,

            // opcode + 4-byte immediate
            Opcode::LdaLit
            | Opcode::LdxLit
            | Opcode::LdyLit
            | Opcode::CmpALit
            | Opcode::CmpXLit
            | Opcode::CmpYLit
            | Opcode::AddLit
            | Opcode::SubLit => 5,

            // opcode + type byte; the real frame length is computed at
            // runtime by `DebugMetadataType::payload_length` and overrides
            // this value via `pc_increment = 0` in the interpreter.
            Opcode::DebugMetadataSignal => 2,
        }
    }

    /// Which memory space this opcode's address operand (if any) indexes.
    pub fn address_space(self) -> AddressSpace {
        match self {
            Opcode::JmpAddr
            | Opcode::JsrAddr
            | Opcode::BcsAddr
            | Opcode::BccAddr
            | Opcode::BeqAddr
            | Opcode::BneAddr
            | Opcode::BmiAddr
            | Opcode::BplAddr
            | Opcode::BvsAddr
            | Opcode::BvcAddr => AddressSpace::Rom,

            Opcode::LdaAddr
            | Opcode::LdxAddr
            | Opcode::LdyAddr
            | Opcode::LdaAddrX
            | Opcode::LdaAddrY
            | Opcode::LeaAddr
            | Opcode::LexAddr
            | Opcode::LeyAddr
            | Opcode::StaAddr
            | Opcode::StxAddr
            | Opcode::StyAddr
            | Opcode::CmpAAddr
            | Opcode::CmpXAddr
            | Opcode::CmpYAddr
            | Opcode::AddAddr
            | Opcode::SubAddr
            | Opcode::IncAddr
            | Opcode::DecAddr => AddressSpace::Wram,

            _ => AddressSpace::None,
        }
    }

    /// Mnemonic text and operand shape, used by the disassembler.
    pub fn mnemonic_and_operand_template(self) -> (&'static str, OperandTemplate) {
        use OperandTemplate::*;
        match self {
            Opcode::Panic => ("PANIC", None),
            Opcode::Nop => ("NOP", None),
            Opcode::Brk => ("BRK", None),
            Opcode::Clc => ("CLC", None),
            Opcode::Sec => ("SEC", None),
            Opcode::Ret => ("RET", None),
            Opcode::StrideLit => ("STRIDE", Imm8),
            Opcode::Systemcall => ("SYSCALL", None),

            Opcode::LdaLit => ("LDA", Imm32),
            Opcode::LdxLit => ("LDX", Imm32),
            Opcode::LdyLit => ("LDY", Imm32),

            Opcode::LdaAddr => ("LDA", Addr16),
            Opcode::LdxAddr => ("LDX", Addr16),
            Opcode::LdyAddr => ("LDY", Addr16),

            Opcode::LdaX => ("LDA X", None),
            Opcode::LdaY => ("LDA Y", None),
            Opcode::LdxA => ("LDX A", None),
            Opcode::LdxY => ("LDX Y", None),
            Opcode::LdyA => ("LDY A", None),
            Opcode::LdyX => ("LDY X", None),

            Opcode::LdaAddrX => ("LDA", Addr16),
            Opcode::LdaAddrY => ("LDA", Addr16),

            Opcode::LeaAddr => ("LEA", Addr16),
            Opcode::LexAddr => ("LEX", Addr16),
            Opcode::LeyAddr => ("LEY", Addr16),

            Opcode::StaAddr => ("STA", Addr16),
            Opcode::StxAddr => ("STX", Addr16),
            Opcode::StyAddr => ("STY", Addr16),

            Opcode::JmpAddr => ("JMP", Addr16),
            Opcode::JsrAddr => ("JSR", Addr16),

            Opcode::CmpAX => ("CMP A, X", None),
            Opcode::CmpAY => ("CMP A, Y", None),
            Opcode::CmpXA => ("CMP X, A", None),
            Opcode::CmpXY => ("CMP X, Y", None),
            Opcode::CmpYA => ("CMP Y, A", None),
            Opcode::CmpYX => ("CMP Y, X", None),

            Opcode::CmpALit => ("CMP A", Imm32),
            Opcode::CmpXLit => ("CMP X", Imm32),
            Opcode::CmpYLit => ("CMP Y", Imm32),

            Opcode::CmpAAddr => ("CMP A", Addr16),
            Opcode::CmpXAddr => ("CMP X", Addr16),
            Opcode::CmpYAddr => ("CMP Y", Addr16),

            Opcode::BcsAddr => ("BCS", Addr16),
            Opcode::BccAddr => ("BCC", Addr16),
            Opcode::BeqAddr => ("BEQ", Addr16),
            Opcode::BneAddr => ("BNE", Addr16),
            Opcode::BmiAddr => ("BMI", Addr16),
            Opcode::BplAddr => ("BPL", Addr16),
            Opcode::BvsAddr => ("BVS", Addr16),
            Opcode::BvcAddr => ("BVC", Addr16),

            Opcode::AddLit => ("ADD", Imm32),
            Opcode::AddAddr => ("ADD", Addr16),
            Opcode::AddX => ("ADD X", None),
            Opcode::AddY => ("ADD Y", None),

            Opcode::SubLit => ("SUB", Imm32),
            Opcode::SubAddr => ("SUB", Addr16),
            Opcode::SubX => ("SUB X", None),
            Opcode::SubY => ("SUB Y", None),

            Opcode::IncA => ("INC A", None),
            Opcode::IncX => ("INC X", None),
            Opcode::IncY => ("INC Y", None),
            Opcode::IncAddr => ("INC", Addr16),

            Opcode::DecA => ("DEC A", None),
            Opcode::DecX => ("DEC X", None),
            Opcode::DecY => ("DEC Y", None),
            Opcode::DecAddr => ("DEC", Addr16),

            Opcode::PushA => ("PUSH A", None),
            Opcode::PushX => ("PUSH X", None),
            Opcode::PushY => ("PUSH Y", None),
            Opcode::PopA => ("POP A", None),
            Opcode::PopX => ("POP X", None),
            Opcode::PopY => ("POP Y", None),

            Opcode::DebugMetadataSignal => ("; LABEL", None),
        }
    }

    /// True for the eight `Bxx_ADDR` conditional-branch opcodes.
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            Opcode::BcsAddr
                | Opcode::BccAddr
                | Opcode::BeqAddr
                | Opcode::BneAddr
                | Opcode::BmiAddr
                | Opcode::BplAddr
                | Opcode::BvsAddr
                | Opcode::BvcAddr
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_round_trips_through_to_byte() {
        for byte in 0..=PUSH_A_OPCODE.max(POP_Y_OPCODE) {
            let op = Opcode::decode(byte);
            assert_eq!(op.to_byte(), byte, "byte {byte} did not round-trip");
        }
        assert_eq!(
            Opcode::decode(DEBUG_METADATA_SIGNAL_OPCODE).to_byte(),
            DEBUG_METADATA_SIGNAL_OPCODE
        );
    }

    #[test]
    fn unknown_byte_decodes_to_panic() {
        assert_eq!(Opcode::decode(200), Opcode::Panic);
    }

    #[test]
    fn every_opcode_has_nonzero_length() {
        for byte in 0..=POP_Y_OPCODE {
            assert!(Opcode::decode(byte).instruction_byte_length() >= 1);
        }
        assert!(
            Opcode::decode(DEBUG_METADATA_SIGNAL_OPCODE)
                .instruction_byte_length()
                >= 1
        );
    }

    #[test]
    fn branch_opcodes_are_rom_addressed() {
        assert_eq!(Opcode::BeqAddr.address_space(), AddressSpace::Rom);
        assert_eq!(Opcode::JmpAddr.address_space(), AddressSpace::Rom);
    }

    #[test]
    fn load_store_opcodes_are_wram_addressed() {
        assert_eq!(Opcode::LdaAddr.address_space(), AddressSpace::Wram);
        assert_eq!(Opcode::StaAddr.address_space(), AddressSpace::Wram);
    }
}

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

//! The two-pass code generator: turns the preprocessor's expanded token
//! stream into statements with resolved opcode variants (pass-independent),
//! assigns every label an address (pass A), then emits ROM bytes (pass B).

use crate::errors::CodegenError;
use crate::isa::{Opcode, Register};
use crate::lexer::{RelDir, TokenKind};
use crate::preprocessor::{ExpandedToken, SymbolTable};
use crate::rom::{emit_label_name_frame, Header, HEADER_BYTES, PADDING_BYTE, ROM_SIZE};

#[derive(Debug, Clone, PartialEq)]
pub enum AddrSource {
    Literal(u16),
    Label(String),
    Relative {
        dir: RelDir,
        count: usize,
        source_pos: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Imm32(u32),
    Imm8(u8),
    Addr(AddrSource),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    LabelDef(String),
    AnonLabelDef(usize),
    Data(Vec<u8>),
    Instruction { opcode: Opcode, operand: Operand },
}

impl Statement {
    fn byte_len(&self) -> usize {
        match self {
            Statement::LabelDef(_) | Statement::AnonLabelDef(_) => 0,
            Statement::Data(bytes) => bytes.len(),
            Statement::Instruction { opcode, .. } => opcode.instruction_byte_length() as usize,
        }
    }
}

/// Splits the expanded token stream into statements, resolving each
/// mnemonic's concrete opcode variant from its operand shape. This is the
/// one classification step both passes share: byte length and address
/// space are pure functions of the *resolved* opcode.
pub fn build_statements(tokens: &[ExpandedToken]) -> Result<Vec<Statement>, CodegenError> {
    let mut statements = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            ExpandedToken::StatementEnd => {
                i += 1;
            }
            ExpandedToken::LabelDef(name) => {
                statements.push(Statement::LabelDef(name.clone()));
                i += 1;
            }
            ExpandedToken::AnonLabelDef(id) => {
                statements.push(Statement::AnonLabelDef(*id));
                i += 1;
            }
            ExpandedToken::RelRef { .. } => {
                // A relative ref encountered outside of an instruction's
                // operand position (shouldn't happen from the lexer's
                // grammar, but guarded defensively).
                return Err(CodegenError::BadRelativeRef { dir: '?', count: 0 });
            }
            ExpandedToken::Instr(kind) => {
                let (stmt, consumed) = classify_statement(kind, &tokens[i + 1..])?;
                statements.push(stmt);
                i += 1 + consumed;
            }
        }
    }
    Ok(statements)
}

/// Looks at the token(s) following a statement's leading token to resolve
/// data directives and multi-form mnemonics into one concrete `Statement`.
/// Returns the statement and how many additional tokens (beyond the first)
/// it consumed as operands.
fn classify_statement(
    head: &TokenKind,
    rest: &[ExpandedToken],
) -> Result<(Statement, usize), CodegenError> {
    match head {
        TokenKind::DataBytes(values) => {
            let bytes = values.iter().map(|v| *v as u8).collect();
            Ok((Statement::Data(bytes), 0))
        }
        TokenKind::DataWords(values) => {
            let mut bytes = Vec::with_capacity(values.len() * 2);
            for v in values {
                bytes.extend_from_slice(&(*v as u16).to_le_bytes());
            }
            Ok((Statement::Data(bytes), 0))
        }
        TokenKind::DataDwords(values) => {
            let mut bytes = Vec::with_capacity(values.len() * 4);
            for v in values {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
            Ok((Statement::Data(bytes), 0))
        }
        TokenKind::StringLit(bytes) | TokenKind::CharGroup(bytes) => {
            Ok((Statement::Data(bytes.clone()), 0))
        }
        TokenKind::Opcode(op) => classify_opcode(*op, rest),
        _ => Err(CodegenError::BadOperandShape {
            line: 0,
            mnemonic: "statement",
        }),
    }
}

/// Peels the next operand token (skipping nothing; operands directly follow
/// the opcode in the token stream) used for single-operand mnemonics.
fn next_operand(rest: &[ExpandedToken]) -> Option<&ExpandedToken> {
    rest.first()
}

fn addr_source_from(tok: &ExpandedToken) -> Option<AddrSource> {
    match tok {
        ExpandedToken::Instr(TokenKind::Addr(a)) => Some(AddrSource::Literal(*a)),
        ExpandedToken::Instr(TokenKind::Ident(name)) => Some(AddrSource::Label(name.clone())),
        ExpandedToken::RelRef {
            dir,
            count,
            source_pos,
        } => Some(AddrSource::Relative {
            dir: *dir,
            count: *count,
            source_pos: *source_pos,
        }),
        _ => None,
    }
}

fn classify_opcode(
    placeholder: Opcode,
    rest: &[ExpandedToken],
) -> Result<(Statement, usize), CodegenError> {
    use Opcode::*;

    let no_operand = |op: Opcode| Ok((instr(op, Operand::None), 0));
    let bad = |mnemonic: &'static str| {
        Err(CodegenError::BadOperandShape {
            line: 0,
            mnemonic,
        })
    };

    match placeholder {
        Panic | Nop | Brk | Clc | Sec | Ret | Systemcall => no_operand(placeholder),

        StrideLit => match next_operand(rest) {
            Some(ExpandedToken::Instr(TokenKind::Lit(n))) => {
                Ok((instr(StrideLit, Operand::Imm8(*n as u8)), 1))
            }
            _ => bad("STRIDE"),
        },

        LeaAddr | LexAddr | LeyAddr | StaAddr | StxAddr | StyAddr | JmpAddr | JsrAddr
        | BcsAddr | BccAddr | BeqAddr | BneAddr | BmiAddr | BplAddr | BvsAddr | BvcAddr => {
            match next_operand(rest).and_then(addr_source_from) {
                Some(src) => Ok((instr(placeholder, Operand::Addr(src)), 1)),
                None => bad(placeholder.mnemonic_and_operand_template().0),
            }
        }

        LdaLit => classify_load(Register::A, rest),
        LdxLit => classify_load(Register::X, rest),
        LdyLit => classify_load(Register::Y, rest),

        CmpALit => classify_cmp(rest),

        AddLit => classify_acc_arith(AddLit, AddAddr, AddX, AddY, rest),
        SubLit => classify_acc_arith(SubLit, SubAddr, SubX, SubY, rest),

        IncA => classify_inc_dec(IncA, IncX, IncY, IncAddr, rest),
        DecA => classify_inc_dec(DecA, DecX, DecY, DecAddr, rest),

        PushA => classify_reg_select(PushA, PushX, PushY, rest),
        PopA => classify_reg_select(PopA, PopX, PopY, rest),

        // Already-concrete variants reached if a future caller re-classifies
        // an already-resolved statement; treated as a no-operand pass-through.
        other => no_operand(other),
    }
}

fn instr(opcode: Opcode, operand: Operand) -> Statement {
    Statement::Instruction { opcode, operand }
}

fn classify_load(reg: Register, rest: &[ExpandedToken]) -> Result<(Statement, usize), CodegenError> {
    use Opcode::*;
    let (lit_op, addr_op, addr_x_op, addr_y_op, from_a, from_x, from_y) = match reg {
        Register::A => (LdaLit, LdaAddr, Some(LdaAddrX), Some(LdaAddrY), None, Some(LdaX), Some(LdaY)),
        Register::X => (LdxLit, LdxAddr, None, None, Some(LdxA), None, Some(LdxY)),
        Register::Y => (LdyLit, LdyAddr, None, None, Some(LdyA), Some(LdyX), None),
    };
    let mnemonic = match reg {
        Register::A => "LDA",
        Register::X => "LDX",
        Register::Y => "LDY",
    };
    match rest.first() {
        Some(ExpandedToken::Instr(TokenKind::Lit(n))) => Ok((instr(lit_op, Operand::Imm32(*n)), 1)),
        Some(tok) if addr_source_from(tok).is_some() => {
            let src = addr_source_from(tok).unwrap();
            // Indexed forms (`LDA $addr X` / `LDA $addr Y`) only exist for A.
            match rest.get(1) {
                Some(ExpandedToken::Instr(TokenKind::Register(Register::X))) if addr_x_op.is_some() => {
                    Ok((instr(addr_x_op.unwrap(), Operand::Addr(src)), 2))
                }
                Some(ExpandedToken::Instr(TokenKind::Register(Register::Y))) if addr_y_op.is_some() => {
                    Ok((instr(addr_y_op.unwrap(), Operand::Addr(src)), 2))
                }
                _ => Ok((instr(addr_op, Operand::Addr(src)), 1)),
            }
        }
        Some(ExpandedToken::Instr(TokenKind::Register(Register::A))) if from_a.is_some() => {
            Ok((instr(from_a.unwrap(), Operand::None), 1))
        }
        Some(ExpandedToken::Instr(TokenKind::Register(Register::X))) if from_x.is_some() => {
            Ok((instr(from_x.unwrap(), Operand::None), 1))
        }
        Some(ExpandedToken::Instr(TokenKind::Register(Register::Y))) if from_y.is_some() => {
            Ok((instr(from_y.unwrap(), Operand::None), 1))
        }
        _ => Err(CodegenError::BadOperandShape {
            line: 0,
            mnemonic,
        }),
    }
}

/// `CMP <L> <R>`: the left register is the first operand token; the lexer
/// has only one `CMP` mnemonic (it never disambiguates by register), so
/// both operands are read off the token stream here.
fn classify_cmp(rest: &[ExpandedToken]) -> Result<(Statement, usize), CodegenError> {
    use Opcode::*;
    let left = match rest.first() {
        Some(ExpandedToken::Instr(TokenKind::Register(r))) => *r,
        _ => {
            return Err(CodegenError::BadOperandShape {
                line: 0,
                mnemonic: "CMP",
            })
        }
    };
    match rest.get(1) {
        Some(ExpandedToken::Instr(TokenKind::Register(r))) => {
            let op = match (left, r) {
                (Register::A, Register::X) => CmpAX,
                (Register::A, Register::Y) => CmpAY,
                (Register::X, Register::A) => CmpXA,
                (Register::X, Register::Y) => CmpXY,
                (Register::Y, Register::A) => CmpYA,
                (Register::Y, Register::X) => CmpYX,
                _ => {
                    return Err(CodegenError::BadOperandShape {
                        line: 0,
                        mnemonic: "CMP",
                    })
                }
            };
            Ok((instr(op, Operand::None), 2))
        }
        Some(ExpandedToken::Instr(TokenKind::Lit(n))) => {
            let op = match left {
                Register::A => CmpALit,
                Register::X => CmpXLit,
                Register::Y => CmpYLit,
            };
            Ok((instr(op, Operand::Imm32(*n)), 2))
        }
        Some(tok) if addr_source_from(tok).is_some() => {
            let op = match left {
                Register::A => CmpAAddr,
                Register::X => CmpXAddr,
                Register::Y => CmpYAddr,
            };
            Ok((
                instr(op, Operand::Addr(addr_source_from(tok).unwrap())),
                2,
            ))
        }
        _ => Err(CodegenError::BadOperandShape {
            line: 0,
            mnemonic: "CMP",
        }),
    }
}

fn classify_acc_arith(
    lit_op: Opcode,
    addr_op: Opcode,
    x_op: Opcode,
    y_op: Opcode,
    rest: &[ExpandedToken],
) -> Result<(Statement, usize), CodegenError> {
    match rest.first() {
        Some(ExpandedToken::Instr(TokenKind::Lit(n))) => Ok((instr(lit_op, Operand::Imm32(*n)), 1)),
        Some(ExpandedToken::Instr(TokenKind::Register(Register::X))) => {
            Ok((instr(x_op, Operand::None), 1))
        }
        Some(ExpandedToken::Instr(TokenKind::Register(Register::Y))) => {
            Ok((instr(y_op, Operand::None), 1))
        }
        Some(tok) if addr_source_from(tok).is_some() => {
            Ok((instr(addr_op, Operand::Addr(addr_source_from(tok).unwrap())), 1))
        }
        _ => Err(CodegenError::BadOperandShape {
            line: 0,
            mnemonic: "ADD/SUB",
        }),
    }
}

fn classify_inc_dec(
    a_op: Opcode,
    x_op: Opcode,
    y_op: Opcode,
    addr_op: Opcode,
    rest: &[ExpandedToken],
) -> Result<(Statement, usize), CodegenError> {
    match rest.first() {
        Some(ExpandedToken::Instr(TokenKind::Register(Register::A))) => {
            Ok((instr(a_op, Operand::None), 1))
        }
        Some(ExpandedToken::Instr(TokenKind::Register(Register::X))) => {
            Ok((instr(x_op, Operand::None), 1))
        }
        Some(ExpandedToken::Instr(TokenKind::Register(Register::Y))) => {
            Ok((instr(y_op, Operand::None), 1))
        }
        Some(tok) if addr_source_from(tok).is_some() => {
            Ok((instr(addr_op, Operand::Addr(addr_source_from(tok).unwrap())), 1))
        }
        _ => Ok((instr(a_op, Operand::None), 0)),
    }
}

fn classify_reg_select(
    a_op: Opcode,
    x_op: Opcode,
    y_op: Opcode,
    rest: &[ExpandedToken],
) -> Result<(Statement, usize), CodegenError> {
    match rest.first() {
        Some(ExpandedToken::Instr(TokenKind::Register(Register::A))) => {
            Ok((instr(a_op, Operand::None), 1))
        }
        Some(ExpandedToken::Instr(TokenKind::Register(Register::X))) => {
            Ok((instr(x_op, Operand::None), 1))
        }
        Some(ExpandedToken::Instr(TokenKind::Register(Register::Y))) => {
            Ok((instr(y_op, Operand::None), 1))
        }
        _ => Err(CodegenError::BadOperandShape {
            line: 0,
            mnemonic: "PUSH/POP",
        }),
    }
}

/// Assembly options. `debug_mode` controls whether `LABEL_NAME` metadata
/// frames are reserved in pass A / emitted in pass B.
#[derive(Debug, Copy, Clone)]
pub struct AssembleOptions {
    pub debug_mode: bool,
}

/// Pass A: walks statements assigning every label's address and computing
/// the entry point. Produces no bytes.
pub fn assign_addresses(
    statements: &[Statement],
    table: &mut SymbolTable,
    options: AssembleOptions,
) -> Result<u16, CodegenError> {
    let mut pc: u32 = HEADER_BYTES as u32;

    for stmt in statements {
        match stmt {
            Statement::Data(bytes) => {
                pc += bytes.len() as u32;
            }
            Statement::LabelDef(name) => {
                if options.debug_mode {
                    pc += label_name_frame_len(name) as u32;
                }
                if pc > u16::MAX as u32 {
                    return Err(CodegenError::RomOverflow {
                        needed: pc as usize,
                        limit: ROM_SIZE,
                    });
                }
                table.set_label_address(name, pc as u16);
            }
            Statement::AnonLabelDef(id) => {
                if pc > u16::MAX as u32 {
                    return Err(CodegenError::RomOverflow {
                        needed: pc as usize,
                        limit: ROM_SIZE,
                    });
                }
                table.set_anon_address(*id, pc as u16);
            }
            Statement::Instruction { .. } => {
                pc += stmt.byte_len() as u32;
            }
        }
        if pc as usize > ROM_SIZE {
            return Err(CodegenError::RomOverflow {
                needed: pc as usize,
                limit: ROM_SIZE,
            });
        }
    }

    let entry_point = match table.label_address("_START") {
        Some(addr) => addr,
        None => {
            let mut data_end = HEADER_BYTES as u32;
            for stmt in statements {
                if let Statement::Data(bytes) = stmt {
                    data_end += bytes.len() as u32;
                } else {
                    break;
                }
            }
            data_end as u16
        }
    };

    Ok(entry_point)
}

fn label_name_frame_len(name: &str) -> usize {
    // SIGNAL, type byte, name bytes, SIGNAL.
    name.len() + 3
}

/// Pass B: walks statements again, this time emitting bytes into a
/// freshly allocated ROM image.
pub fn emit(
    statements: &[Statement],
    table: &SymbolTable,
    entry_point: u16,
    options: AssembleOptions,
) -> Result<Vec<u8>, CodegenError> {
    let mut rom = vec![PADDING_BYTE; ROM_SIZE];
    let header = Header::new(entry_point, options.debug_mode);
    rom[0..HEADER_BYTES].copy_from_slice(&header.serialize());

    let mut pc = HEADER_BYTES;

    for stmt in statements {
        match stmt {
            Statement::Data(bytes) => {
                check_fits(pc, bytes.len())?;
                rom[pc..pc + bytes.len()].copy_from_slice(bytes);
                pc += bytes.len();
            }
            Statement::LabelDef(name) => {
                if options.debug_mode {
                    let mut frame = Vec::new();
                    emit_label_name_frame(&mut frame, name);
                    check_fits(pc, frame.len())?;
                    rom[pc..pc + frame.len()].copy_from_slice(&frame);
                    pc += frame.len();
                }
            }
            Statement::AnonLabelDef(_) => {}
            Statement::Instruction { opcode, operand } => {
                let len = opcode.instruction_byte_length() as usize;
                check_fits(pc, len)?;
                rom[pc] = opcode.to_byte();
                match operand {
                    Operand::None => {}
                    Operand::Imm8(b) => rom[pc + 1] = *b,
                    Operand::Imm32(v) => rom[pc + 1..pc + 5].copy_from_slice(&v.to_le_bytes()),
                    Operand::Addr(src) => {
                        let addr = resolve_addr(src, table)?;
                        rom[pc + 1..pc + 3].copy_from_slice(&addr.to_le_bytes());
                    }
                }
                pc += len;
            }
        }
    }

    Ok(rom)
}

fn check_fits(pc: usize, len: usize) -> Result<(), CodegenError> {
    if pc + len > ROM_SIZE {
        Err(CodegenError::RomOverflow {
            needed: pc + len,
            limit: ROM_SIZE,
        })
    } else {
        Ok(())
    }
}

fn resolve_addr(src: &AddrSource, table: &SymbolTable) -> Result<u16, CodegenError> {
    match src {
        AddrSource::Literal(a) => Ok(*a),
        AddrSource::Label(name) => {
            table
                .label_address(name)
                .ok_or_else(|| CodegenError::UnresolvedLabel { name: name.clone() })
        }
        AddrSource::Relative {
            dir,
            count,
            source_pos,
        } => table
            .resolve_relative(*source_pos, *dir, *count)
            .ok_or(CodegenError::BadRelativeRef {
                dir: if *dir == RelDir::Forward { '+' } else { '-' },
                count: *count,
            }),
    }
}

/// Top-level entry point: lex, preprocess, and run both codegen passes.
pub fn assemble_tokens(
    source: &str,
    options: AssembleOptions,
) -> Result<Vec<u8>, crate::errors::AssembleError> {
    let tokens = crate::lexer::Lexer::new(source).tokenize()?;
    let (stripped, mut table) = crate::preprocessor::strip_and_register(&tokens)?;
    let expanded = crate::preprocessor::expand(&stripped, &table)?;
    let statements = build_statements(&expanded)?;
    let entry_point = assign_addresses(&statements, &mut table, options)?;
    let rom = emit(&statements, &table, entry_point, options)?;
    Ok(rom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(src: &str) -> Vec<u8> {
        assemble_tokens(src, AssembleOptions { debug_mode: false }).unwrap()
    }

    #[test]
    fn minimal_start_brk() {
        let rom = assemble("_START:\nBRK\n");
        let header = Header::parse(&rom[0..HEADER_BYTES]).unwrap();
        assert_eq!(header.entry_point, HEADER_BYTES as u16);
        assert_eq!(rom[HEADER_BYTES], Opcode::Brk.to_byte());
        assert!(rom[HEADER_BYTES + 1..].iter().all(|&b| b == PADDING_BYTE));
    }

    #[test]
    fn no_start_defaults_entry_to_first_instruction() {
        let rom = assemble("NOP\nBRK\n");
        let header = Header::parse(&rom[0..HEADER_BYTES]).unwrap();
        assert_eq!(header.entry_point, HEADER_BYTES as u16);
    }

    #[test]
    fn forward_label_reference_resolves() {
        let rom = assemble("JMP Skip\nBRK\nSkip:\nBRK\n");
        let target = u16::from_le_bytes([rom[HEADER_BYTES + 1], rom[HEADER_BYTES + 2]]);
        // JMP(1) + addr(2) + BRK(1) = 4 bytes after the header to `Skip:`.
        assert_eq!(target, HEADER_BYTES as u16 + 4);
    }

    #[test]
    fn stride_and_indexed_load_classify_correctly() {
        let rom = assemble("STRIDE 0x4\nLDX 0x2\nLDA $0x0000 X\nBRK\n");
        assert_eq!(rom[HEADER_BYTES], Opcode::StrideLit.to_byte());
        let ldx_pos = HEADER_BYTES + 2;
        assert_eq!(rom[ldx_pos], Opcode::LdxLit.to_byte());
        let lda_pos = ldx_pos + 5;
        assert_eq!(rom[lda_pos], Opcode::LdaAddrX.to_byte());
    }

    #[test]
    fn cmp_disambiguates_register_and_literal_forms() {
        let rom = assemble("CMP A 0x0\nBRK\n");
        assert_eq!(rom[HEADER_BYTES], Opcode::CmpALit.to_byte());
    }

    #[test]
    fn debug_mode_emits_label_frame_before_address() {
        let rom = assemble_tokens("Foo:\nBRK\n", AssembleOptions { debug_mode: true }).unwrap();
        let header = Header::parse(&rom[0..HEADER_BYTES]).unwrap();
        assert!(header.debug_mode);
        // The frame opens immediately at HEADER_BYTES, and Foo's resolved
        // address is the byte right after the frame's closing signal.
        assert_eq!(rom[HEADER_BYTES], crate::isa::constants::DEBUG_METADATA_SIGNAL_OPCODE);
        let frame_len = crate::rom::DebugMetadataType::payload_length(&rom[HEADER_BYTES..]).unwrap();
        assert_eq!(rom[HEADER_BYTES + frame_len], Opcode::Brk.to_byte());
    }

    #[test]
    fn rom_overflow_is_reported() {
        let mut src = String::from("_START:\n");
        for _ in 0..20000 {
            src.push_str("LDA 0x1\n");
        }
        let result = assemble_tokens(&src, AssembleOptions { debug_mode: false });
        assert!(matches!(result, Err(crate::errors::AssembleError::Codegen(CodegenError::RomOverflow { .. }))));
    }
}

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

//! Two-pass token preprocessing: strip macro/define/repeat framing and
//! register symbols (pass 1), then expand macro calls, defines, and
//! `.repeat` blocks into a flat instruction-shaped token stream (pass 2).
//! Label resolution to addresses is the code generator's job; this stage
//! only registers names so codegen can look them up.

use std::collections::HashMap;

use crate::errors::PreprocessError;
use crate::lexer::{RelDir, Token, TokenKind};

const MAX_MACRO_RECURSION: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolEntry {
    Macro { body: Vec<Token> },
    Define { value: TokenKind },
    Label { address: Option<u16> },
    AnonLabel { id: usize, address: Option<u16> },
}

/// Macros, defines, and labels all live in one table, keyed by name, except
/// anonymous labels which have no name and are tracked separately in
/// `anon_order` by source position.
#[derive(Debug, Default)]
pub struct SymbolTable {
    pub symbols: HashMap<String, SymbolEntry>,
    /// Anonymous labels in source order: (source-position token index, id).
    pub anon_order: Vec<(usize, usize)>,
    next_anon_id: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label_address(&self, name: &str) -> Option<u16> {
        match self.symbols.get(name) {
            Some(SymbolEntry::Label { address }) => *address,
            _ => None,
        }
    }

    pub fn set_label_address(&mut self, name: &str, address: u16) {
        if let Some(SymbolEntry::Label { address: slot }) = self.symbols.get_mut(name) {
            *slot = Some(address);
        }
    }

    pub fn set_anon_address(&mut self, id: usize, address: u16) {
        for entry in self.symbols.values_mut() {
            if let SymbolEntry::AnonLabel {
                id: entry_id,
                address: slot,
            } = entry
            {
                if *entry_id == id {
                    *slot = Some(address);
                }
            }
        }
    }

    /// Resolves a `(dir, count)` relative reference from `token_index`: the
    /// `count`-th anonymous label strictly in direction `dir` from that
    /// source position.
    pub fn resolve_relative(
        &self,
        token_index: usize,
        dir: RelDir,
        count: usize,
    ) -> Option<u16> {
        if count == 0 {
            return None;
        }
        let ids: Vec<usize> = match dir {
            RelDir::Backward => self
                .anon_order
                .iter()
                .filter(|(pos, _)| *pos < token_index)
                .rev()
                .map(|(_, id)| *id)
                .collect(),
            RelDir::Forward => self
                .anon_order
                .iter()
                .filter(|(pos, _)| *pos > token_index)
                .map(|(_, id)| *id)
                .collect(),
        };
        let target_id = *ids.get(count - 1)?;
        self.symbols.values().find_map(|entry| match entry {
            SymbolEntry::AnonLabel { id, address } if *id == target_id => *address,
            _ => None,
        })
    }
}

/// A stripped token carries its index in the *stripped* stream, which is
/// the "source position" anonymous/relative-label resolution binary-searches
/// against.
#[derive(Debug, Clone, PartialEq)]
pub struct StrippedToken {
    pub kind: StrippedKind,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrippedKind {
    Pass(TokenKind),
    AnonLabelDef(usize),
}

/// Pass 1: strips `.macro`/`.endmacro`, `.define`, registers labels, assigns
/// anonymous-label ids, and leaves everything else untouched.
pub fn strip_and_register(tokens: &[Token]) -> Result<(Vec<StrippedToken>, SymbolTable), PreprocessError> {
    let mut table = SymbolTable::new();
    let mut out = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let tok = &tokens[i];
        match &tok.kind {
            TokenKind::MacroBegin(name) => {
                let mut body = Vec::new();
                i += 1;
                let mut found_end = false;
                while i < tokens.len() {
                    if matches!(tokens[i].kind, TokenKind::MacroEnd) {
                        found_end = true;
                        i += 1;
                        break;
                    }
                    body.push(tokens[i].clone());
                    i += 1;
                }
                if !found_end {
                    return Err(PreprocessError::DuplicateSymbol {
                        line: tok.pos.line,
                        name: format!(".macro {name} missing .endmacro"),
                    });
                }
                if table.symbols.contains_key(name) {
                    return Err(PreprocessError::DuplicateSymbol {
                        line: tok.pos.line,
                        name: name.clone(),
                    });
                }
                table
                    .symbols
                    .insert(name.clone(), SymbolEntry::Macro { body });
                continue;
            }
            TokenKind::MacroEnd => {
                // Only reachable if a stray .endmacro appears with no
                // matching .macro; pass through untouched so codegen
                // reports it as an unknown identifier downstream.
                i += 1;
            }
            TokenKind::Define(name, value) => {
                if table.symbols.contains_key(name) {
                    return Err(PreprocessError::DuplicateSymbol {
                        line: tok.pos.line,
                        name: name.clone(),
                    });
                }
                table.symbols.insert(
                    name.clone(),
                    SymbolEntry::Define {
                        value: (**value).clone(),
                    },
                );
                i += 1;
            }
            TokenKind::LabelDef(name) => {
                if table.symbols.contains_key(name) {
                    return Err(PreprocessError::DuplicateSymbol {
                        line: tok.pos.line,
                        name: name.clone(),
                    });
                }
                table
                    .symbols
                    .insert(name.clone(), SymbolEntry::Label { address: None });
                out.push(StrippedToken {
                    kind: StrippedKind::Pass(TokenKind::LabelDef(name.clone())),
                    line: tok.pos.line,
                });
                i += 1;
            }
            TokenKind::AnonLabelDef => {
                let id = table.next_anon_id;
                table.next_anon_id += 1;
                let key = format!("@anon#{id}");
                table
                    .symbols
                    .insert(key, SymbolEntry::AnonLabel { id, address: None });
                table.anon_order.push((out.len(), id));
                out.push(StrippedToken {
                    kind: StrippedKind::AnonLabelDef(id),
                    line: tok.pos.line,
                });
                i += 1;
            }
            other => {
                out.push(StrippedToken {
                    kind: StrippedKind::Pass(other.clone()),
                    line: tok.pos.line,
                });
                i += 1;
            }
        }
    }

    Ok((out, table))
}

/// A fully expanded token, ready for the code generator. Relative label
/// references keep the stripped-stream index they occurred at so the
/// generator can resolve them positionally.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpandedToken {
    Instr(TokenKind),
    LabelDef(String),
    AnonLabelDef(usize),
    RelRef { dir: RelDir, count: usize, source_pos: usize },
    StatementEnd,
}

/// Pass 2: expands macro calls, `.define` substitutions, and `.repeat`
/// blocks into a flat stream with no directive tokens left.
pub fn expand(
    tokens: &[StrippedToken],
    table: &SymbolTable,
) -> Result<Vec<ExpandedToken>, PreprocessError> {
    let mut out = Vec::new();
    expand_slice(tokens, table, 0, &mut out)?;
    Ok(out)
}

fn expand_slice(
    tokens: &[StrippedToken],
    table: &SymbolTable,
    depth: usize,
    out: &mut Vec<ExpandedToken>,
) -> Result<(), PreprocessError> {
    let mut i = 0;
    while i < tokens.len() {
        let stok = &tokens[i];
        match &stok.kind {
            StrippedKind::AnonLabelDef(id) => {
                out.push(ExpandedToken::AnonLabelDef(*id));
                i += 1;
            }
            StrippedKind::Pass(TokenKind::LabelDef(name)) => {
                out.push(ExpandedToken::LabelDef(name.clone()));
                i += 1;
            }
            StrippedKind::Pass(TokenKind::StatementEnd) => {
                out.push(ExpandedToken::StatementEnd);
                i += 1;
            }
            StrippedKind::Pass(TokenKind::RepeatBegin(count)) => {
                let mut depth_count = 1usize;
                let mut j = i + 1;
                let body_start = j;
                while j < tokens.len() && depth_count > 0 {
                    match &tokens[j].kind {
                        StrippedKind::Pass(TokenKind::RepeatBegin(_)) => depth_count += 1,
                        StrippedKind::Pass(TokenKind::RepeatEnd) => depth_count -= 1,
                        _ => {}
                    }
                    if depth_count > 0 {
                        j += 1;
                    }
                }
                if depth_count != 0 {
                    return Err(PreprocessError::BadRepeatCount { line: stok.line });
                }
                let body = &tokens[body_start..j];
                for _ in 0..*count {
                    expand_slice(body, table, depth, out)?;
                }
                i = j + 1;
            }
            StrippedKind::Pass(TokenKind::RepeatEnd) => {
                return Err(PreprocessError::BadRepeatCount { line: stok.line });
            }
            StrippedKind::Pass(TokenKind::RelLabelRef { dir, count }) => {
                out.push(ExpandedToken::RelRef {
                    dir: *dir,
                    count: *count,
                    source_pos: i,
                });
                i += 1;
            }
            StrippedKind::Pass(TokenKind::Ident(name)) => {
                match table.symbols.get(name) {
                    Some(SymbolEntry::Macro { body }) => {
                        if depth >= MAX_MACRO_RECURSION {
                            return Err(PreprocessError::MacroRecursionTooDeep {
                                name: name.clone(),
                                limit: MAX_MACRO_RECURSION,
                            });
                        }
                        let (stripped_body, _) = strip_tokens_only(body);
                        expand_slice(&stripped_body, table, depth + 1, out)?;
                    }
                    Some(SymbolEntry::Define { value }) => {
                        out.push(ExpandedToken::Instr(value.clone()));
                    }
                    Some(SymbolEntry::Label { .. }) => {
                        // A named label used as an operand (e.g. a JMP/JSR
                        // target): the code generator resolves it to an
                        // address once pass A has fixed every label.
                        out.push(ExpandedToken::Instr(TokenKind::Ident(name.clone())));
                    }
                    _ => {
                        return Err(PreprocessError::UnknownIdentifier {
                            line: stok.line,
                            name: name.clone(),
                        });
                    }
                }
                i += 1;
            }
            StrippedKind::Pass(other) => {
                out.push(ExpandedToken::Instr(other.clone()));
                i += 1;
            }
        }
    }
    Ok(())
}

/// Re-strips a macro body's raw tokens (macro bodies are stored as raw
/// `Token`s captured before pass 1 touched them) without re-registering any
/// symbols; macro bodies may reference labels/defines from the outer scope
/// but may not themselves declare new macros.
fn strip_tokens_only(tokens: &[Token]) -> (Vec<StrippedToken>, ()) {
    let out = tokens
        .iter()
        .filter_map(|t| match &t.kind {
            TokenKind::MacroBegin(_) | TokenKind::MacroEnd | TokenKind::Define(_, _) => None,
            TokenKind::LabelDef(name) => Some(StrippedToken {
                kind: StrippedKind::Pass(TokenKind::LabelDef(name.clone())),
                line: t.pos.line,
            }),
            TokenKind::AnonLabelDef => Some(StrippedToken {
                kind: StrippedKind::Pass(TokenKind::AnonLabelDef),
                line: t.pos.line,
            }),
            other => Some(StrippedToken {
                kind: StrippedKind::Pass(other.clone()),
                line: t.pos.line,
            }),
        })
        .collect();
    (out, ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn lex(src: &str) -> Vec<Token> {
        Lexer::new(src).tokenize().unwrap()
    }

    #[test]
    fn registers_label_and_passes_marker() {
        let toks = lex("_START:\nBRK\n");
        let (stripped, table) = strip_and_register(&toks).unwrap();
        assert!(table.symbols.contains_key("_START"));
        assert!(stripped
            .iter()
            .any(|t| matches!(&t.kind, StrippedKind::Pass(TokenKind::LabelDef(n)) if n == "_START")));
    }

    #[test]
    fn duplicate_label_is_an_error() {
        let toks = lex("FOO:\nBRK\nFOO:\nBRK\n");
        let result = strip_and_register(&toks);
        assert!(matches!(
            result,
            Err(PreprocessError::DuplicateSymbol { .. })
        ));
    }

    #[test]
    fn define_substitutes_single_token() {
        let toks = lex(".define FIVE 0x5\nLDA FIVE\n");
        let (stripped, table) = strip_and_register(&toks).unwrap();
        let expanded = expand(&stripped, &table).unwrap();
        assert!(expanded.iter().any(|t| matches!(
            t,
            ExpandedToken::Instr(TokenKind::Lit(5))
        )));
    }

    #[test]
    fn repeat_splices_body_n_times() {
        let toks = lex(".repeat 3\nINC A\n.endrepeat\n");
        let (stripped, table) = strip_and_register(&toks).unwrap();
        let expanded = expand(&stripped, &table).unwrap();
        let inc_count = expanded
            .iter()
            .filter(|t| matches!(t, ExpandedToken::Instr(TokenKind::Opcode(crate::isa::Opcode::IncA))))
            .count();
        assert_eq!(inc_count, 3);
    }

    #[test]
    fn macro_expands_in_place() {
        let toks = lex(".macro bump\nINC A\n.endmacro\nbump\nbump\n");
        let (stripped, table) = strip_and_register(&toks).unwrap();
        let expanded = expand(&stripped, &table).unwrap();
        let inc_count = expanded
            .iter()
            .filter(|t| matches!(t, ExpandedToken::Instr(TokenKind::Opcode(crate::isa::Opcode::IncA))))
            .count();
        assert_eq!(inc_count, 2);
    }

    #[test]
    fn relative_resolution_finds_nth_anon_label() {
        let toks = lex("@:\n@:\n@:\nJMP @--\n");
        let (stripped, table) = strip_and_register(&toks).unwrap();
        // Simulate codegen assigning addresses 0, 1, 2 to the three anon labels.
        let anon_ids: Vec<usize> = table.anon_order.iter().map(|(_, id)| *id).collect();
        let mut table = table;
        for (addr, id) in anon_ids.iter().enumerate() {
            table.set_anon_address(*id, addr as u16);
        }
        let expanded = expand(&stripped, &table).unwrap();
        let rel = expanded
            .iter()
            .find_map(|t| match t {
                ExpandedToken::RelRef { dir, count, source_pos } => Some((*dir, *count, *source_pos)),
                _ => None,
            })
            .unwrap();
        let resolved = table.resolve_relative(rel.2, rel.0, rel.1).unwrap();
        assert_eq!(resolved, 1); // second-nearest preceding anon label
    }
}

//! Developer tools
//!
//! [`Disassembler`] decodes a program into a [`Listing`], one entry per
//! instruction. Wrapped blocks are listed after the instruction owning them,
//! one level deeper.
//!
//! ```text
//! 0000  or lhs_len=8 rhs_len=3 rhs_offset=1
//! 0011    try len=3
//! 0016      token constant=0
//! 0019    token constant=0
//! ```

use super::bytecode::{instruction_len, opcode_at, read_u16, read_u32, OpCode};
use serde::Serialize;
use std::fmt;

/// A named operand value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Operand {
    /// Operand name, e.g. `constant` or `len`
    pub name: &'static str,
    /// Decoded value
    pub value: u32,
}

/// One decoded instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    /// Byte offset from the start of the program
    pub offset: usize,
    /// Nesting depth inside wrapped blocks
    pub depth: usize,
    /// The instruction
    pub opcode: OpCode,
    /// Fixed operands in encoding order
    pub operands: Vec<Operand>,
}

/// A decoded program
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Listing {
    entries: Vec<ListingEntry>,
}

impl Listing {
    /// Decoded instructions in program order
    pub fn entries(&self) -> &[ListingEntry] {
        &self.entries
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the program is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Opcodes in program order
    pub fn opcodes(&self) -> Vec<OpCode> {
        self.entries.iter().map(|entry| entry.opcode).collect()
    }

    /// Serialize as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            write!(
                f,
                "{:04}  {}{}",
                entry.offset,
                "  ".repeat(entry.depth),
                entry.opcode
            )?;
            for operand in &entry.operands {
                write!(f, " {}={}", operand.name, operand.value)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Decodes instruction bytes into a [`Listing`]
pub struct Disassembler<'c> {
    code: &'c [u8],
    entries: Vec<ListingEntry>,
}

impl<'c> Disassembler<'c> {
    /// Prepare to decode `code`
    pub fn new(code: &'c [u8]) -> Self {
        Self {
            code,
            entries: Vec::new(),
        }
    }

    /// Decode the whole program
    ///
    /// # Panics
    /// Panics on malformed bytecode.
    pub fn run(mut self) -> Listing {
        self.walk(0, self.code.len(), 0);
        Listing {
            entries: self.entries,
        }
    }

    fn walk(&mut self, start: usize, end: usize, depth: usize) {
        let mut pc = start;
        while pc < end {
            let op = opcode_at(self.code, pc);
            let len = instruction_len(self.code, pc);
            self.entries.push(ListingEntry {
                offset: pc,
                depth,
                opcode: op,
                operands: self.operands(op, pc),
            });

            match op {
                OpCode::Try | OpCode::Hidden | OpCode::LookAhead | OpCode::NotFollowedBy => {
                    self.walk(pc + 5, pc + len, depth + 1)
                }
                OpCode::Label | OpCode::Observing => self.walk(pc + 7, pc + len, depth + 1),
                OpCode::Or => {
                    let rhs = pc + 11 + read_u32(self.code, pc + 1) as usize;
                    self.walk(pc + 11, rhs, depth + 1);
                    self.walk(rhs, pc + len, depth + 1);
                }
                _ => {}
            }
            pc += len;
        }
    }

    fn operands(&self, op: OpCode, pc: usize) -> Vec<Operand> {
        let u16_at = |name, at| Operand {
            name,
            value: read_u16(self.code, at) as u32,
        };
        let u32_at = |name, at| Operand {
            name,
            value: read_u32(self.code, at),
        };

        match op {
            OpCode::Take1 | OpCode::Eof => Vec::new(),
            OpCode::TakeN => vec![u32_at("count", pc + 1)],
            OpCode::Invoke | OpCode::InvokeM => {
                vec![u16_at("dispatcher", pc + 1), u16_at("function", pc + 3)]
            }
            OpCode::Try | OpCode::Hidden | OpCode::LookAhead | OpCode::NotFollowedBy => {
                vec![u32_at("len", pc + 1)]
            }
            OpCode::Label => vec![u16_at("label", pc + 1), u32_at("len", pc + 3)],
            OpCode::Observing => vec![u16_at("dispatcher", pc + 1), u32_at("len", pc + 3)],
            OpCode::Or => vec![
                u32_at("lhs_len", pc + 1),
                u32_at("rhs_len", pc + 5),
                u16_at("rhs_offset", pc + 9),
            ],
            _ => vec![u16_at("constant", pc + 1)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::parsec::{take1, token, Parsec};
    use std::convert::Infallible;

    type P<A> = Parsec<Infallible, char, A>;

    #[test]
    fn test_nested_listing() {
        let left: P<char> = token('a');
        let right: P<char> = token('b');
        let parser = left.try_() | right;
        let listing = parser.disassemble();

        assert_eq!(
            listing.opcodes(),
            vec![OpCode::Or, OpCode::Try, OpCode::Token, OpCode::Token]
        );
        let depths: Vec<usize> = listing.entries().iter().map(|e| e.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 1]);
        assert_eq!(
            listing.to_string(),
            "0000  or lhs_len=8 rhs_len=3 rhs_offset=1\n\
             0011    try len=3\n\
             0016      token constant=0\n\
             0019    token constant=0\n"
        );
    }

    #[test]
    fn test_sequence_listing() {
        let parser: P<u32> = take1().map(|c: char| c as u32).label("any");
        let listing = parser.disassemble();
        assert_eq!(
            listing.opcodes(),
            vec![OpCode::Label, OpCode::Take1, OpCode::Invoke]
        );
        let invoke = &listing.entries()[2];
        assert_eq!(invoke.offset, 8);
        assert_eq!(
            invoke.operands,
            vec![
                Operand {
                    name: "dispatcher",
                    value: 0
                },
                Operand {
                    name: "function",
                    value: 1
                }
            ]
        );
    }

    #[test]
    fn test_json_output() {
        let parser: P<()> = eof_parser();
        let json = parser.disassemble().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["entries"][0]["opcode"], "Eof");
        assert_eq!(value["entries"][0]["offset"], 0);
    }

    fn eof_parser() -> P<()> {
        crate::engine::parsec::eof()
    }
}

//! Instruction encoding
//!
//! A program is a flat byte stream. Every instruction starts with a one-byte
//! [`OpCode`] followed by fixed-width little-endian operands:
//!
//! | Instruction | Layout |
//! |---|---|
//! | `Pure`, `Token`, `Tokens`, `Satisfy`, `OneOf`, `NoneOf`, `TakeWhile`, `TakeWhile1`, `Error`, `Newline` | `[op][u16 constant]` |
//! | `Take1`, `Eof` | `[op]` |
//! | `TakeN` | `[op][u32 count]` |
//! | `Invoke`, `InvokeM` | `[op][u16 dispatcher][u16 function]` |
//! | `Try`, `Hidden`, `LookAhead`, `NotFollowedBy` | `[op][u32 len][block]` |
//! | `Label` | `[op][u16 label][u32 len][block]` |
//! | `Observing` | `[op][u16 dispatcher][u32 len][block]` |
//! | `Or` | `[op][u32 lhs_len][u32 rhs_len][u16 rhs_offset][lhs][rhs]` |
//!
//! Wrapped blocks are length-framed, so a block simply ends where its frame
//! ends and no terminator instruction exists.
//!
//! Constant operands are relative: the interpreter adds the current constant
//! offset (see [`get_constant_id`]). `Or` stores the size of its left
//! branch's constant window so the right branch's bytes can stay unchanged
//! after its constants are appended behind the left's.

use super::buffer::GrowableBuffer;
use serde::Serialize;
use std::fmt;

/// Index of a constant, relative to the running constant offset
pub type ConstantId = u16;

/// Report malformed bytecode
#[cold]
#[inline(never)]
pub(crate) fn malformed(message: &str) -> ! {
    panic!("invalid bytecode: {}", message)
}

/// Single-byte instruction tag
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OpCode {
    /// Push a constant
    Pure = 0x01,
    /// Fail with a fancy error constant
    Error = 0x02,
    /// Match one token
    Token = 0x03,
    /// Match a token sequence
    Tokens = 0x04,
    /// Apply a function to the top value
    Invoke = 0x05,
    /// Apply a function producing a program, then run it
    InvokeM = 0x06,
    /// Consume any one token
    Take1 = 0x07,
    /// Consume exactly `n` tokens
    TakeN = 0x08,
    /// Consume one or more tokens matching a predicate
    TakeWhile1 = 0x09,
    /// Consume zero or more tokens matching a predicate
    TakeWhile = 0x0A,
    /// Consume one token matching a predicate
    Satisfy = 0x0B,
    /// Consume one token from a set
    OneOf = 0x0C,
    /// Consume one token outside a set
    NoneOf = 0x0D,
    /// Backtrack a failed block
    Try = 0x0E,
    /// Ordered choice
    Or = 0x0F,
    /// Name the expected items of a block
    Label = 0x10,
    /// Suppress the expected items of a block
    Hidden = 0x11,
    /// Run a block without consuming input
    LookAhead = 0x12,
    /// Succeed only where a block fails
    NotFollowedBy = 0x13,
    /// Match the end of input
    Eof = 0x14,
    /// Turn a block's failure into a value
    Observing = 0x15,
    /// Consume one line break token
    Newline = 0x16,
}

impl OpCode {
    /// All opcodes in encoding order
    pub const ALL: [OpCode; 22] = [
        OpCode::Pure,
        OpCode::Error,
        OpCode::Token,
        OpCode::Tokens,
        OpCode::Invoke,
        OpCode::InvokeM,
        OpCode::Take1,
        OpCode::TakeN,
        OpCode::TakeWhile1,
        OpCode::TakeWhile,
        OpCode::Satisfy,
        OpCode::OneOf,
        OpCode::NoneOf,
        OpCode::Try,
        OpCode::Or,
        OpCode::Label,
        OpCode::Hidden,
        OpCode::LookAhead,
        OpCode::NotFollowedBy,
        OpCode::Eof,
        OpCode::Observing,
        OpCode::Newline,
    ];

    /// Decode an opcode byte
    #[inline]
    pub fn from_byte(byte: u8) -> Option<OpCode> {
        match byte {
            0x01..=0x16 => Some(Self::ALL[byte as usize - 1]),
            _ => None,
        }
    }

    /// Mnemonic used in listings
    pub fn name(self) -> &'static str {
        match self {
            OpCode::Pure => "pure",
            OpCode::Error => "error",
            OpCode::Token => "token",
            OpCode::Tokens => "tokens",
            OpCode::Invoke => "invoke",
            OpCode::InvokeM => "invoke_m",
            OpCode::Take1 => "take1",
            OpCode::TakeN => "take_n",
            OpCode::TakeWhile1 => "take_while1",
            OpCode::TakeWhile => "take_while",
            OpCode::Satisfy => "satisfy",
            OpCode::OneOf => "one_of",
            OpCode::NoneOf => "none_of",
            OpCode::Try => "try",
            OpCode::Or => "or",
            OpCode::Label => "label",
            OpCode::Hidden => "hidden",
            OpCode::LookAhead => "look_ahead",
            OpCode::NotFollowedBy => "not_followed_by",
            OpCode::Eof => "eof",
            OpCode::Observing => "observing",
            OpCode::Newline => "newline",
        }
    }

    /// Bytes taken by the opcode and its fixed operands
    pub fn header_len(self) -> usize {
        match self {
            OpCode::Take1 | OpCode::Eof => 1,
            OpCode::Pure
            | OpCode::Error
            | OpCode::Token
            | OpCode::Tokens
            | OpCode::TakeWhile1
            | OpCode::TakeWhile
            | OpCode::Satisfy
            | OpCode::OneOf
            | OpCode::NoneOf
            | OpCode::Newline => 3,
            OpCode::TakeN
            | OpCode::Invoke
            | OpCode::InvokeM
            | OpCode::Try
            | OpCode::Hidden
            | OpCode::LookAhead
            | OpCode::NotFollowedBy => 5,
            OpCode::Label | OpCode::Observing => 7,
            OpCode::Or => 11,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Operand decoding
// ============================================================================

/// Decode the opcode at `pc`
#[inline]
pub fn opcode_at(code: &[u8], pc: usize) -> OpCode {
    match code.get(pc).copied().and_then(OpCode::from_byte) {
        Some(op) => op,
        None => malformed("unknown opcode"),
    }
}

/// Read a little-endian `u16` operand
#[inline]
pub fn read_u16(code: &[u8], at: usize) -> u16 {
    match code.get(at..at + 2) {
        Some(&[a, b]) => u16::from_le_bytes([a, b]),
        _ => malformed("truncated u16 operand"),
    }
}

/// Read a little-endian `u32` operand
#[inline]
pub fn read_u32(code: &[u8], at: usize) -> u32 {
    match code.get(at..at + 4) {
        Some(&[a, b, c, d]) => u32::from_le_bytes([a, b, c, d]),
        _ => malformed("truncated u32 operand"),
    }
}

/// Read the constant id at `at` and resolve it against `offset`
#[inline]
pub fn get_constant_id(code: &[u8], at: usize, offset: usize) -> usize {
    read_u16(code, at) as usize + offset
}

/// Total length of the instruction at `pc`, wrapped blocks included
pub fn instruction_len(code: &[u8], pc: usize) -> usize {
    let op = opcode_at(code, pc);
    let header = op.header_len();
    match op {
        OpCode::Try | OpCode::Hidden | OpCode::LookAhead | OpCode::NotFollowedBy => {
            header + read_u32(code, pc + 1) as usize
        }
        OpCode::Label | OpCode::Observing => header + read_u32(code, pc + 3) as usize,
        OpCode::Or => {
            header + read_u32(code, pc + 1) as usize + read_u32(code, pc + 5) as usize
        }
        _ => header,
    }
}

/// Convert a constant pool index into an operand
///
/// # Panics
/// Panics if the pool outgrew the 16-bit id space.
#[inline]
pub fn constant_id(index: usize) -> ConstantId {
    match ConstantId::try_from(index) {
        Ok(id) => id,
        Err(_) => panic!("constant pool overflow: {} constants", index + 1),
    }
}

#[inline]
fn block_len(len: usize) -> [u8; 4] {
    match u32::try_from(len) {
        Ok(len) => len.to_le_bytes(),
        Err(_) => panic!("block of {} bytes exceeds the u32 frame", len),
    }
}

// ============================================================================
// Instruction streams
// ============================================================================

/// A program's instruction bytes
///
/// Cloning shares the backing memory; the first write to a shared stream
/// copies it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Instructions {
    bytes: GrowableBuffer<u8>,
}

impl Instructions {
    /// An empty program
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// A single operand-less instruction
    pub fn op(op: OpCode) -> Self {
        Self {
            bytes: GrowableBuffer::new().append(op as u8),
        }
    }

    /// An instruction taking one constant
    pub fn with_constant(op: OpCode, id: ConstantId) -> Self {
        Self {
            bytes: GrowableBuffer::new()
                .append(op as u8)
                .extend_from_slice(&id.to_le_bytes()),
        }
    }

    /// An instruction taking a 32-bit count
    pub fn with_count(op: OpCode, count: u32) -> Self {
        Self {
            bytes: GrowableBuffer::new()
                .append(op as u8)
                .extend_from_slice(&count.to_le_bytes()),
        }
    }

    /// `Invoke` / `InvokeM`
    pub fn invoke(op: OpCode, dispatcher: ConstantId, function: ConstantId) -> Self {
        Self {
            bytes: GrowableBuffer::new()
                .append(op as u8)
                .extend_from_slice(&dispatcher.to_le_bytes())
                .extend_from_slice(&function.to_le_bytes()),
        }
    }

    /// Append `next` to this program
    pub fn then(self, next: &Instructions) -> Self {
        Self {
            bytes: self.bytes.extend_from_slice(next.as_bytes()),
        }
    }

    /// Wrap this program as the block of `op` (`Try`, `Hidden`, `LookAhead`,
    /// `NotFollowedBy`)
    pub fn framed(self, op: OpCode) -> Self {
        let len = block_len(self.len());
        let mut header = [0u8; 5];
        header[0] = op as u8;
        header[1..].copy_from_slice(&len);
        Self {
            bytes: self.bytes.prepend_slice(&header),
        }
    }

    /// Wrap this program as the block of a `Label` or `Observing` instruction
    pub fn framed_with(self, op: OpCode, id: ConstantId) -> Self {
        let len = block_len(self.len());
        let mut header = [0u8; 7];
        header[0] = op as u8;
        header[1..3].copy_from_slice(&id.to_le_bytes());
        header[3..].copy_from_slice(&len);
        Self {
            bytes: self.bytes.prepend_slice(&header),
        }
    }

    /// `Or` of two programs; `rhs_offset` is the size of `lhs`'s constant window
    pub fn or(lhs: Instructions, rhs: &Instructions, rhs_offset: ConstantId) -> Self {
        let mut header = [0u8; 11];
        header[0] = OpCode::Or as u8;
        header[1..5].copy_from_slice(&block_len(lhs.len()));
        header[5..9].copy_from_slice(&block_len(rhs.len()));
        header[9..].copy_from_slice(&rhs_offset.to_le_bytes());
        Self {
            bytes: lhs
                .bytes
                .prepend_slice(&header)
                .extend_from_slice(rhs.as_bytes()),
        }
    }

    /// Encoded length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the program has no instructions
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The encoded bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }
}

impl fmt::Debug for Instructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instructions")
            .field("len", &self.len())
            .field("bytes", &self.as_bytes())
            .finish()
    }
}

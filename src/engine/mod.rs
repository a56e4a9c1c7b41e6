//! Parsing engine
//!
//! Parsers are compiled to bytecode when they are built and executed by a
//! stack machine when they run.
//!
//! # Module Organization
//!
//! ## Memory
//! - [`buffer`] - Byte buffer that grows at both ends
//! - [`stack`] - Value stack holding inline values and shared objects
//! - [`type_registry`] - Runtime type tags for stack slots
//!
//! ## Programs
//! - [`bytecode`] - Opcodes and instruction encoding
//! - [`parsec`] - Parser primitives and combinators
//!
//! ## Execution
//! - [`vm`] - The interpreter and its limits
//! - [`state`] - Input cursor for one run
//! - [`error_stack`] - Pending error frames built on the value stack
//! - [`result`] - The four parse outcomes
//!
//! ## Errors
//! - [`error`] - Error items, fancy errors and merging
//! - [`source_pos`] - Line/column tracking
//!
//! ## Tooling
//! - [`debug`] - Disassembler
//! - [`parallel`] - Batch parsing

// ============================================================================
// Module Declarations
// ============================================================================

pub mod buffer;
pub mod bytecode;
pub mod debug;
pub mod error;
pub mod error_stack;
pub mod parsec;
pub mod result;
pub mod source_pos;
pub mod stack;
pub mod state;
pub mod token;
pub mod type_registry;
pub mod vm;

// Batch parsing (always available, uses rayon when feature is enabled)
pub mod parallel;

// ============================================================================
// Core Types
// ============================================================================

pub use parsec::Parsec;
pub use result::ParserResult;
pub use token::{CustomError, Token, Value};
pub use vm::ParserConfig;

// ============================================================================
// Errors
// ============================================================================

pub use error::{ErrorFancy, ErrorItem, ParseError, VmError};
pub use source_pos::SourcePos;

// ============================================================================
// Internals
// ============================================================================

pub use buffer::{BufferError, GrowableBuffer};
pub use bytecode::{Instructions, OpCode};
pub use debug::{Disassembler, Listing};
pub use stack::Stack;

// ============================================================================
// Batch parsing
// ============================================================================

pub use parallel::{
    parse_batch_parallel, parse_batch_parallel_owned, parse_batch_with_config, ParallelConfig,
};

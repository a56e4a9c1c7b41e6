//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and functions from
//! stackparsec. Importing this module with a wildcard import brings the core
//! types into scope:
//!
//! ```
//! use stackparsec::prelude::*;
//! ```
//!
//! # Re-exported Items
//!
//! ## Core Types
//! - [`Parsec`] - A compiled parser
//! - [`ParserResult`] - The four parse outcomes
//! - [`ParserConfig`] - Resource limits for one parse
//! - [`Token`], [`Value`], [`CustomError`] - Bounds on parser type parameters
//!
//! ## Primitives
//! - [`pure()`], [`error()`], [`fail()`], [`incorrect_indent()`]
//! - [`token()`], [`tokens()`], [`satisfy()`], [`one_of()`], [`none_of()`]
//! - [`take()`], [`take1()`], [`take_while()`], [`take_while1()`]
//! - [`eof()`], [`newline()`]
//!
//! ## Combinators
//! - [`map()`], [`bind()`], [`select_many()`]
//! - [`choice()`], [`try_()`], [`label()`], [`hidden()`]
//! - [`look_ahead()`], [`not_followed_by()`], [`observing()`], [`lazy()`]
//!
//! ## Error Handling
//! - [`ParseError`] - A parse failure
//! - [`ErrorItem`] - Expected or unexpected item
//! - [`ErrorFancy`] - Fail messages, indentation and custom errors
//! - [`SourcePos`] - Named source position
//! - [`VmError`] - Resource limit exceeded

// ============================================================================
// Core Types
// ============================================================================

pub use crate::engine::{CustomError, Parsec, ParserConfig, ParserResult, Token, Value};

// ============================================================================
// Primitives
// ============================================================================

pub use crate::engine::parsec::{
    eof, error, fail, incorrect_indent, newline, none_of, one_of, pure, satisfy, take, take1,
    take_while, take_while1, token, tokens,
};

// ============================================================================
// Combinators
// ============================================================================

pub use crate::engine::parsec::{
    bind, choice, hidden, label, lazy, look_ahead, map, not_followed_by, observing, select_many,
    try_,
};

// ============================================================================
// Error Handling
// ============================================================================

pub use crate::engine::{ErrorFancy, ErrorItem, ParseError, SourcePos, VmError};

//! Stackparsec - Parser combinators compiled to bytecode
//!
//! Parsers are built from small combinators, as in any parser combinator
//! library, but each combinator emits bytecode instead of building a tree of
//! closures. Running a parser executes that bytecode on a stack machine.
//! It provides:
//! - Token, token-run, predicate and end-of-input primitives
//! - Sequencing through `map`, `bind` and `select_many`
//! - Ordered choice with backtracking only under `try_`
//! - Labels, hidden errors, look-ahead and negative look-ahead
//! - Errors that merge expected items across alternatives
//! - Optional caller-supplied stack memory
//! - Resource limits on input size and nesting depth
//! - Developer tools (disassembler with JSON output)
//! - Optional batch parsing on a thread pool
//!
//! ## Quick Start
//!
//! ```rust
//! use stackparsec::prelude::*;
//! use std::convert::Infallible;
//!
//! let keyword: Parsec<Infallible, char, Vec<char>> = tokens("let".chars());
//! let input: Vec<char> = "let x".chars().collect();
//!
//! match keyword.parse(&input) {
//!     ParserResult::ConsumedOk(value, position) => {
//!         assert_eq!(value, vec!['l', 'e', 't']);
//!         assert_eq!(position.column, 4);
//!     }
//!     other => panic!("unexpected result: {:?}", other),
//! }
//! ```
//!
//! ## Combining Parsers
//!
//! ```rust
//! use stackparsec::prelude::*;
//! use std::convert::Infallible;
//!
//! type P<A> = Parsec<Infallible, char, A>;
//!
//! let digits: P<Vec<char>> = take_while1(|c: char| c.is_ascii_digit());
//! let number: P<u64> = digits
//!     .map(|ds: Vec<char>| ds.iter().fold(0, |n, d| n * 10 + d.to_digit(10).unwrap_or(0) as u64))
//!     .label("number");
//!
//! let input: Vec<char> = "x".chars().collect();
//! let error = number.parse(&input).into_result().unwrap_err();
//! assert_eq!(error.message(), "unexpected 'x'\nexpecting number");
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Enable debug logging using the `log` crate
//! - `parallel` - Distribute batch parsing with `rayon`

// Lint configuration for production quality
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]
// Allow some pedantic lints that are too noisy
#![allow(clippy::module_inception)]
#![allow(clippy::redundant_closure)]

// Prelude module for convenient imports
pub mod prelude;

// Bytecode compiler and stack machine
pub mod engine;

/// Re-export commonly used types for convenience
pub use engine::{
    CustomError, ErrorFancy, ErrorItem, ParseError, ParserConfig, ParserResult, Parsec, SourcePos,
    Token, Value, VmError,
};

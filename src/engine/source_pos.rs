//! Source positions
//!
//! [`SourcePos`] is the user-facing position attached to results and errors:
//! a source name plus token offset, line and column. Inside the machine the
//! name is constant for a whole run, so the interpreter threads the smaller
//! `Copy` [`Cursor`] instead and attaches the name when a position escapes.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Offset, line and column without a source name
///
/// Lines and columns are 1-based. The offset counts tokens, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cursor {
    /// Tokens consumed since the start of input
    pub offset: usize,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
}

impl Cursor {
    /// The start of input
    #[inline]
    pub fn start() -> Self {
        Self {
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Step over one token on the current line
    #[inline]
    pub fn next_token(self) -> Self {
        self.next(1)
    }

    /// Step over `amount` tokens on the current line
    #[inline]
    pub fn next(self, amount: usize) -> Self {
        Self {
            offset: self.offset + amount,
            line: self.line,
            column: self.column + amount,
        }
    }

    /// Step over a line break token
    #[inline]
    pub fn next_line(self) -> Self {
        Self {
            offset: self.offset + 1,
            line: self.line + 1,
            column: 1,
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::start()
    }
}

/// A named position in the input
///
/// Equality and ordering consider only the source name and offset; line and
/// column are derived bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePos {
    /// Name of the source (file name, or empty)
    pub name: Arc<str>,
    /// Tokens consumed since the start of input
    pub offset: usize,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
}

impl SourcePos {
    /// Create a position
    #[inline]
    pub fn new(name: impl Into<Arc<str>>, offset: usize, line: usize, column: usize) -> Self {
        Self {
            name: name.into(),
            offset,
            line,
            column,
        }
    }

    /// The start of the named source
    #[inline]
    pub fn from_name(name: impl Into<Arc<str>>) -> Self {
        Self::at(name.into(), Cursor::start())
    }

    /// Attach a source name to a cursor
    #[inline]
    pub fn at(name: Arc<str>, cursor: Cursor) -> Self {
        Self {
            name,
            offset: cursor.offset,
            line: cursor.line,
            column: cursor.column,
        }
    }

    /// The nameless part of this position
    #[inline]
    pub fn cursor(&self) -> Cursor {
        Cursor {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    /// Step over one token on the current line
    #[inline]
    pub fn next_token(&self) -> Self {
        Self::at(self.name.clone(), self.cursor().next_token())
    }

    /// Step over `amount` tokens on the current line
    #[inline]
    pub fn next(&self, amount: usize) -> Self {
        Self::at(self.name.clone(), self.cursor().next(amount))
    }

    /// Step over a line break token
    #[inline]
    pub fn next_line(&self) -> Self {
        Self::at(self.name.clone(), self.cursor().next_line())
    }
}

impl Default for SourcePos {
    fn default() -> Self {
        Self::from_name("")
    }
}

impl PartialEq for SourcePos {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset && self.name == other.name
    }
}

impl Eq for SourcePos {}

impl Hash for SourcePos {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.offset.hash(state);
    }
}

impl PartialOrd for SourcePos {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SourcePos {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then(self.offset.cmp(&other.offset))
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.name, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start() {
        let pos = SourcePos::from_name("input.txt");
        assert_eq!(pos.offset, 0);
        assert_eq!(pos.line, 1);
        assert_eq!(pos.column, 1);
        assert_eq!(pos.to_string(), "input.txt(1,1)");
    }

    #[test]
    fn test_advancing() {
        let pos = SourcePos::from_name("f").next_token().next(3);
        assert_eq!((pos.offset, pos.line, pos.column), (4, 1, 5));

        let pos = pos.next_line();
        assert_eq!((pos.offset, pos.line, pos.column), (5, 2, 1));
    }

    #[test]
    fn test_equality_ignores_line_and_column() {
        let a = SourcePos::new("f", 3, 1, 4);
        let b = SourcePos::new("f", 3, 2, 1);
        let c = SourcePos::new("g", 3, 1, 4);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_ordering() {
        let a = SourcePos::new("f", 1, 1, 2);
        let b = SourcePos::new("f", 5, 1, 6);
        let c = SourcePos::new("a", 9, 1, 10);
        assert!(a < b);
        assert!(c < a);
        assert_eq!(a.clone().max(b.clone()), b);
    }

    #[test]
    fn test_cursor_round_trip() {
        let cursor = Cursor::start().next(2).next_line().next_token();
        let pos = SourcePos::at(Arc::from("src"), cursor);
        assert_eq!(pos.cursor(), cursor);
        assert_eq!(pos.to_string(), "src(2,2)");
    }

    #[test]
    fn test_serde_round_trip() {
        let pos = SourcePos::new("main", 7, 2, 3);
        let json = serde_json::to_string(&pos).unwrap();
        let back: SourcePos = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pos);
        assert_eq!(back.line, 2);
    }
}

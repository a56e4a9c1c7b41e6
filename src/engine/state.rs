//! Parse state
//!
//! The input slice plus the current position. The interpreter saves a
//! [`Cursor`] before speculative work and restores it verbatim on backtrack.

use super::source_pos::{Cursor, SourcePos};
use std::sync::Arc;

/// A run of input tokens, kept on the stack instead of a copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: usize,
    pub len: usize,
}

impl Span {
    /// The tokens this span covers
    #[inline]
    pub fn of<'i, T>(self, input: &'i [T]) -> &'i [T] {
        &input[self.start..self.start + self.len]
    }
}

/// Input being parsed and the position reached so far
#[derive(Debug, Clone)]
pub struct ParseState<'i, T> {
    input: &'i [T],
    name: Arc<str>,
    cursor: Cursor,
}

impl<'i, T: Copy> ParseState<'i, T> {
    /// Start at the beginning of `input`
    pub fn new(input: &'i [T], name: impl Into<Arc<str>>) -> Self {
        Self {
            input,
            name: name.into(),
            cursor: Cursor::start(),
        }
    }

    /// The whole input
    #[inline]
    pub fn input(&self) -> &'i [T] {
        self.input
    }

    /// Tokens not yet consumed
    #[inline]
    pub fn remaining(&self) -> &'i [T] {
        &self.input[self.cursor.offset.min(self.input.len())..]
    }

    /// The next token, if any
    #[inline]
    pub fn peek(&self) -> Option<T> {
        self.input.get(self.cursor.offset).copied()
    }

    /// Whether every token has been consumed
    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.cursor.offset >= self.input.len()
    }

    /// Tokens consumed so far
    #[inline]
    pub fn offset(&self) -> usize {
        self.cursor.offset
    }

    /// Current position without the source name
    #[inline]
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Jump back (or forward) to a saved cursor
    #[inline]
    pub fn restore(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }

    /// Consume one token on the current line
    #[inline]
    pub fn next_token(&mut self) {
        self.cursor = self.cursor.next_token();
    }

    /// Consume `amount` tokens on the current line
    #[inline]
    pub fn next(&mut self, amount: usize) {
        self.cursor = self.cursor.next(amount);
    }

    /// Consume a line break token
    #[inline]
    pub fn next_line(&mut self) {
        self.cursor = self.cursor.next_line();
    }

    /// Source name used in positions
    #[inline]
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// Current position
    #[inline]
    pub fn position(&self) -> SourcePos {
        self.position_at(self.cursor)
    }

    /// Name an arbitrary cursor with this state's source
    #[inline]
    pub fn position_at(&self, cursor: Cursor) -> SourcePos {
        SourcePos::at(self.name.clone(), cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumption() {
        let input = ['a', 'b', '\n', 'c'];
        let mut state = ParseState::new(&input, "t");
        assert_eq!(state.peek(), Some('a'));

        state.next(2);
        assert_eq!(state.remaining(), &['\n', 'c']);
        state.next_line();
        state.next_token();
        assert!(state.is_at_end());
        assert_eq!(state.peek(), None);
        assert_eq!(state.position().to_string(), "t(2,2)");
    }

    #[test]
    fn test_span() {
        let input = "hello".chars().collect::<Vec<_>>();
        let span = Span { start: 1, len: 3 };
        assert_eq!(span.of(&input), &['e', 'l', 'l']);
    }

    #[test]
    fn test_restore() {
        let input = [1u8, 2, 3];
        let mut state = ParseState::new(&input, "");
        let saved = state.cursor();
        state.next(3);
        state.restore(saved);
        assert_eq!(state.offset(), 0);
        assert_eq!(state.remaining(), &[1, 2, 3]);
    }
}

//! Error frames on the value stack
//!
//! A failing instruction leaves a *pending error frame* on top of the stack
//! instead of a value:
//!
//! ```text
//!   top ->  Cursor                      (where the error happened)
//!           Entry::Expected(Token)      marker describing the slot below
//!           'a'                         payload
//!           Entry::Unexpected(Token)
//!           'c'
//!           Entry::Terminator           bottom of the frame
//! ```
//!
//! Frames are built incrementally with [`ErrorFrame`], edited in place by
//! `label`/`hidden` ([`strip_expected`]), combined by choice
//! ([`merge_top_frames`]) and finally turned into a [`ParseError`] by
//! [`pop_error`]. Payloads stay untyped on the stack until then: token runs
//! are input spans, labels and custom errors are shared constants.

use super::error::{greater_item, ErrorFancy, ErrorItem, ParseError};
use super::source_pos::Cursor;
use super::stack::{corrupted, Stack};
use super::state::{ParseState, Span};
use super::token::{CustomError, Token};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Kind of a trivial error item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemKind {
    /// Payload: one inline token
    Token,
    /// Payload: an input span, or a `Vec<T>` constant
    Tokens,
    /// Payload: a `String` object
    Label,
    /// No payload
    EndOfInput,
}

/// Marker slot sitting above its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Entry {
    Terminator,
    Expected(ItemKind),
    Unexpected(ItemKind),
    /// Payload: an `ErrorFancy<E>` object
    Fancy,
}

impl Entry {
    #[inline]
    fn payload_slots(self) -> usize {
        match self {
            Entry::Terminator
            | Entry::Expected(ItemKind::EndOfInput)
            | Entry::Unexpected(ItemKind::EndOfInput) => 0,
            _ => 1,
        }
    }
}

/// Builder appending items to an open error frame
pub(crate) struct ErrorFrame<'a, 's> {
    stack: &'a mut Stack<'s>,
    position: Cursor,
}

impl<'a, 's> ErrorFrame<'a, 's> {
    /// Start a new frame for an error at `position`
    #[inline]
    pub fn open(stack: &'a mut Stack<'s>, position: Cursor) -> Self {
        stack.push_value(Entry::Terminator);
        Self { stack, position }
    }

    /// Reopen the pending frame on top of the stack
    #[inline]
    pub fn reopen(stack: &'a mut Stack<'s>) -> Self {
        let position = match stack.pop_value::<Cursor>() {
            Some(position) => position,
            None => corrupted("no pending error frame to reopen"),
        };
        Self { stack, position }
    }

    /// Report `found` as unexpected: a token, or end of input for `None`
    #[inline]
    pub fn unexpected<T: Token>(self, found: Option<T>) -> Self {
        match found {
            Some(token) => {
                self.stack.push_value(token);
                self.stack.push_value(Entry::Unexpected(ItemKind::Token));
                self
            }
            None => self.unexpected_end_of_input(),
        }
    }

    /// Report a run of input tokens as unexpected
    #[inline]
    pub fn unexpected_span(self, span: Span) -> Self {
        self.stack.push_value(span);
        self.stack.push_value(Entry::Unexpected(ItemKind::Tokens));
        self
    }

    /// Report end of input as unexpected
    #[inline]
    pub fn unexpected_end_of_input(self) -> Self {
        self.stack.push_value(Entry::Unexpected(ItemKind::EndOfInput));
        self
    }

    /// Expect end of input
    #[inline]
    pub fn expected_end_of_input(self) -> Self {
        self.stack.push_value(Entry::Expected(ItemKind::EndOfInput));
        self
    }

    /// Expect a token stored in the constant pool
    #[inline]
    pub fn expected_token(self, constants: &Stack<'_>, id: usize) -> Self {
        self.stack.read_from_and_push(constants, id);
        self.stack.push_value(Entry::Expected(ItemKind::Token));
        self
    }

    /// Expect a token sequence stored in the constant pool
    #[inline]
    pub fn expected_tokens(self, constants: &Stack<'_>, id: usize) -> Self {
        self.stack.read_from_and_push(constants, id);
        self.stack.push_value(Entry::Expected(ItemKind::Tokens));
        self
    }

    /// Expect each token of a set, given as a slice of the constant
    #[inline]
    pub fn expected_each<T: Token>(self, tokens: &[T]) -> Self {
        for token in tokens {
            self.stack.push_value(*token);
            self.stack.push_value(Entry::Expected(ItemKind::Token));
        }
        self
    }

    /// Expect a label stored in the constant pool
    #[inline]
    pub fn expected_label(self, constants: &Stack<'_>, id: usize) -> Self {
        self.stack.read_from_and_push(constants, id);
        self.stack.push_value(Entry::Expected(ItemKind::Label));
        self
    }

    /// Add a fancy error stored in the constant pool
    #[inline]
    pub fn fancy(self, constants: &Stack<'_>, id: usize) -> Self {
        self.stack.read_from_and_push(constants, id);
        self.stack.push_value(Entry::Fancy);
        self
    }

    /// Seal the frame with its position
    #[inline]
    pub fn close(self) {
        self.stack.push_value(self.position);
    }
}

/// Number of slots in the frame whose cursor is `depth` below the top
pub(crate) fn frame_len(stack: &Stack<'_>, depth: usize) -> usize {
    if !stack.holds::<Cursor>(depth) {
        corrupted("expected a pending error frame");
    }
    let mut at = depth + 1;
    loop {
        match stack.peek_at::<Entry>(at) {
            Some(Entry::Terminator) => return at - depth + 1,
            Some(entry) => at += 1 + entry.payload_slots(),
            None => corrupted("unterminated error frame"),
        }
    }
}

/// Position of the frame whose cursor is `depth` below the top
#[inline]
pub(crate) fn frame_position(stack: &Stack<'_>, depth: usize) -> Cursor {
    match stack.peek_at::<Cursor>(depth) {
        Some(position) => position,
        None => corrupted("expected a pending error frame"),
    }
}

/// Drop the pending frame on top of the stack
#[inline]
pub(crate) fn discard(stack: &mut Stack<'_>) {
    let len = frame_len(stack, 0);
    stack.pop_n(len);
}

/// Drop the pending frame lying beneath the top `keep` slots
#[inline]
pub(crate) fn discard_under(stack: &mut Stack<'_>, keep: usize) {
    let len = frame_len(stack, keep);
    stack.drop_under(keep, len);
}

/// Merge the two pending frames on top of the stack into one
///
/// The frame further into the input survives alone; frames at the same
/// position are spliced into a single frame holding both item lists.
pub(crate) fn merge_top_frames(stack: &mut Stack<'_>) {
    let right_len = frame_len(stack, 0);
    let left_len = frame_len(stack, right_len);
    let right = frame_position(stack, 0);
    let left = frame_position(stack, right_len);

    match right.offset.cmp(&left.offset) {
        Ordering::Greater => stack.drop_under(right_len, left_len),
        Ordering::Less => stack.pop_n(right_len),
        // [.. left items, left cursor, right terminator, right items.., right cursor]
        Ordering::Equal => stack.drop_under(right_len - 1, 2),
    }
}

/// Remove every expected item from the pending frame on top of the stack
pub(crate) fn strip_expected(stack: &mut Stack<'_>) {
    let mut at = 1;
    loop {
        match stack.peek_at::<Entry>(at) {
            Some(Entry::Terminator) => return,
            Some(entry @ Entry::Expected(_)) => stack.drop_under(at, 1 + entry.payload_slots()),
            Some(entry) => at += 1 + entry.payload_slots(),
            None => corrupted("unterminated error frame"),
        }
    }
}

/// Pop the pending frame on top of the stack and materialize it
pub(crate) fn pop_error<E: CustomError, T: Token>(
    stack: &mut Stack<'_>,
    state: &ParseState<'_, T>,
) -> ParseError<E, T> {
    let position = match stack.pop_value::<Cursor>() {
        Some(position) => state.position_at(position),
        None => corrupted("expected a pending error frame"),
    };

    let mut unexpected = None;
    let mut expected = BTreeSet::new();
    let mut fancy: Vec<ErrorFancy<E>> = Vec::new();

    loop {
        let entry = match stack.pop_value::<Entry>() {
            Some(entry) => entry,
            None => corrupted("unterminated error frame"),
        };
        match entry {
            Entry::Terminator => break,
            Entry::Expected(kind) => {
                expected.insert(pop_item(stack, kind, state.input()));
            }
            Entry::Unexpected(kind) => {
                let item = pop_item(stack, kind, state.input());
                unexpected = greater_item(unexpected, Some(item));
            }
            Entry::Fancy => {
                let error = match stack.take::<ErrorFancy<E>>() {
                    Some(error) => error,
                    None => corrupted("fancy error payload has the wrong type"),
                };
                fancy.push(error);
            }
        }
    }

    if fancy.is_empty() {
        ParseError::Trivial {
            position,
            unexpected,
            expected,
        }
    } else {
        // Popped newest first
        let mut errors: Vec<ErrorFancy<E>> = Vec::with_capacity(fancy.len());
        for error in fancy.into_iter().rev() {
            if !errors.contains(&error) {
                errors.push(error);
            }
        }
        ParseError::Fancy { position, errors }
    }
}

fn pop_item<T: Token>(stack: &mut Stack<'_>, kind: ItemKind, input: &[T]) -> ErrorItem<T> {
    let item = match kind {
        ItemKind::Token => stack.pop_value::<T>().map(ErrorItem::Token),
        ItemKind::Tokens => match stack.pop_value::<Span>() {
            Some(span) => Some(ErrorItem::Tokens(span.of(input).to_vec())),
            None => stack.take::<Vec<T>>().map(ErrorItem::Tokens),
        },
        ItemKind::Label => stack.take::<String>().map(ErrorItem::Label),
        ItemKind::EndOfInput => Some(ErrorItem::EndOfInput),
    };
    match item {
        Some(item) => item,
        None => corrupted("error item payload has the wrong type"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn constants() -> Stack<'static> {
        let mut constants = Stack::new();
        constants.push_value('a');
        constants.push_value('b');
        constants.push_object(String::from("digit"));
        constants.push_object(ErrorFancy::<String>::Fail(String::from("nope")));
        constants.push_object(vec!['o', 'k']);
        constants
    }

    fn at(offset: usize) -> Cursor {
        Cursor::start().next(offset)
    }

    #[test]
    fn test_build_and_materialize() {
        let input: Vec<char> = "xyz".chars().collect();
        let state = ParseState::new(&input, "src");
        let pool = constants();
        let mut stack = Stack::new();

        ErrorFrame::open(&mut stack, at(0))
            .unexpected(Some('x'))
            .expected_token(&pool, 0)
            .expected_label(&pool, 2)
            .close();
        assert_eq!(frame_len(&stack, 0), 8);

        let error: ParseError<Infallible, char> = pop_error(&mut stack, &state);
        assert!(stack.is_empty());
        assert_eq!(error.unexpected(), Some(&ErrorItem::Token('x')));
        assert!(error.expects(&ErrorItem::Token('a')));
        assert!(error.expects(&ErrorItem::Label(String::from("digit"))));
        assert_eq!(error.position().to_string(), "src(1,1)");
    }

    #[test]
    fn test_span_payload() {
        let input: Vec<char> = "abx".chars().collect();
        let state = ParseState::new(&input, "");
        let pool = constants();
        let mut stack = Stack::new();

        ErrorFrame::open(&mut stack, at(0))
            .unexpected_span(Span { start: 0, len: 3 })
            .expected_tokens(&pool, 4)
            .close();
        let error: ParseError<Infallible, char> = pop_error(&mut stack, &state);
        assert_eq!(error.unexpected(), Some(&ErrorItem::Tokens(vec!['a', 'b', 'x'])));
        assert!(error.expects(&ErrorItem::Tokens(vec!['o', 'k'])));
    }

    #[test]
    fn test_fancy_wins_within_frame() {
        let input: Vec<char> = Vec::new();
        let state = ParseState::new(&input, "");
        let pool = constants();
        let mut stack = Stack::new();

        ErrorFrame::open(&mut stack, at(0))
            .unexpected_end_of_input()
            .fancy(&pool, 3)
            .close();
        let error: ParseError<String, char> = pop_error(&mut stack, &state);
        assert_eq!(
            error.fancy_errors(),
            &[ErrorFancy::Fail(String::from("nope"))]
        );
    }

    #[test]
    fn test_merge_same_position() {
        let input: Vec<char> = "c".chars().collect();
        let state = ParseState::new(&input, "");
        let pool = constants();
        let mut stack = Stack::new();
        stack.push_value(99u32);

        ErrorFrame::open(&mut stack, at(0))
            .unexpected(Some('c'))
            .expected_token(&pool, 0)
            .close();
        ErrorFrame::open(&mut stack, at(0))
            .unexpected(Some('c'))
            .expected_token(&pool, 1)
            .close();
        merge_top_frames(&mut stack);
        assert_eq!(frame_len(&stack, 0), 10);

        let error: ParseError<Infallible, char> = pop_error(&mut stack, &state);
        let expected: Vec<_> = error.expected().unwrap().iter().cloned().collect();
        assert_eq!(expected, vec![ErrorItem::Token('a'), ErrorItem::Token('b')]);
        assert_eq!(stack.pop_value::<u32>(), Some(99));
    }

    #[test]
    fn test_merge_keeps_further_frame() {
        let input: Vec<char> = "abc".chars().collect();
        let state = ParseState::new(&input, "");
        let pool = constants();

        for further_first in [true, false] {
            let mut stack = Stack::new();
            let (first, second) = if further_first { (2, 0) } else { (0, 2) };
            ErrorFrame::open(&mut stack, at(first))
                .expected_token(&pool, 0)
                .close();
            ErrorFrame::open(&mut stack, at(second))
                .expected_token(&pool, 1)
                .close();
            merge_top_frames(&mut stack);

            let error: ParseError<Infallible, char> = pop_error(&mut stack, &state);
            assert_eq!(error.position().offset, 2);
            assert_eq!(error.expected().map(|e| e.len()), Some(1));
            assert!(stack.is_empty());
        }
    }

    #[test]
    fn test_strip_and_relabel() {
        let input: Vec<char> = "x".chars().collect();
        let state = ParseState::new(&input, "");
        let pool = constants();
        let mut stack = Stack::new();

        ErrorFrame::open(&mut stack, at(0))
            .expected_token(&pool, 0)
            .unexpected(Some('x'))
            .expected_token(&pool, 1)
            .close();
        strip_expected(&mut stack);
        ErrorFrame::reopen(&mut stack)
            .expected_label(&pool, 2)
            .close();

        let error: ParseError<Infallible, char> = pop_error(&mut stack, &state);
        let expected: Vec<_> = error.expected().unwrap().iter().cloned().collect();
        assert_eq!(expected, vec![ErrorItem::Label(String::from("digit"))]);
        assert_eq!(error.unexpected(), Some(&ErrorItem::Token('x')));
    }

    #[test]
    fn test_discard_under_value() {
        let pool = constants();
        let mut stack = Stack::new();
        ErrorFrame::open(&mut stack, at(0))
            .expected_label(&pool, 2)
            .close();
        stack.push_object(String::from("value"));

        discard_under(&mut stack, 1);
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.take::<String>(), Some(String::from("value")));
        assert_eq!(stack.object_count(), 0);
    }

    #[test]
    fn test_discard() {
        let mut stack = Stack::new();
        ErrorFrame::open(&mut stack, at(1))
            .unexpected(Some('q'))
            .unexpected_end_of_input()
            .close();
        discard(&mut stack);
        assert!(stack.is_empty());
    }
}

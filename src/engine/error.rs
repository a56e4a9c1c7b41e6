//! Parse errors
//!
//! A failed parse yields a [`ParseError`], which is either:
//!
//! - **Trivial**: at most one unexpected [`ErrorItem`] plus the set of items
//!   that would have been accepted instead, or
//! - **Fancy**: a set of [`ErrorFancy`] values (`fail` messages, indentation
//!   errors, custom payloads). Fancy errors override trivial ones.
//!
//! Errors from alternative branches combine with [`ParseError::merge`].
//!
//! # Example Output
//!
//! ```text
//! input(1,3):
//! unexpected 'x'
//! expecting 'a', 'b', or digit
//! ```
//!
//! Resource-limit failures of the machine itself are reported separately as
//! [`VmError`].

use super::source_pos::SourcePos;
use super::token::{Described, Token};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// Error items
// ============================================================================

/// Something the parser found, or wanted to find
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorItem<T> {
    /// A single token
    Token(T),
    /// A run of tokens
    Tokens(Vec<T>),
    /// A named category, e.g. `digit`
    Label(String),
    /// The end of the input
    EndOfInput,
}

impl<T> ErrorItem<T> {
    #[inline]
    fn rank(&self) -> u8 {
        match self {
            ErrorItem::Token(_) => 0,
            ErrorItem::Tokens(_) => 1,
            ErrorItem::Label(_) => 2,
            ErrorItem::EndOfInput => 3,
        }
    }
}

/// Items order by kind first (`Token < Tokens < Label < EndOfInput`), then
/// by content; longer token runs rank above shorter ones.
impl<T: Ord> Ord for ErrorItem<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ErrorItem::Token(a), ErrorItem::Token(b)) => a.cmp(b),
            (ErrorItem::Tokens(a), ErrorItem::Tokens(b)) => {
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
            (ErrorItem::Label(a), ErrorItem::Label(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl<T: Ord> PartialOrd for ErrorItem<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Token> fmt::Display for ErrorItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorItem::Token(token) => T::describe(std::slice::from_ref(token), f),
            ErrorItem::Tokens(tokens) => write!(f, "{}", Described(tokens)),
            ErrorItem::Label(label) => f.write_str(label),
            ErrorItem::EndOfInput => f.write_str("end of input"),
        }
    }
}

// ============================================================================
// Fancy errors
// ============================================================================

/// An error that is not described by expected/unexpected items
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorFancy<E> {
    /// A `fail` message
    Fail(String),
    /// Indentation did not relate to the reference level as required
    Indentation {
        /// Required relation of `actual` to `reference`
        ordering: Ordering,
        /// Reference indentation level
        reference: usize,
        /// Indentation actually found
        actual: usize,
    },
    /// A user-defined payload
    Custom(E),
}

impl<E: fmt::Display> fmt::Display for ErrorFancy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorFancy::Fail(message) => f.write_str(message),
            ErrorFancy::Indentation {
                ordering,
                reference,
                actual,
            } => {
                let relation = match ordering {
                    Ordering::Less => "less than",
                    Ordering::Equal => "equal to",
                    Ordering::Greater => "greater than",
                };
                write!(
                    f,
                    "incorrect indentation (got {}, should be {} {})",
                    actual, relation, reference
                )
            }
            ErrorFancy::Custom(error) => write!(f, "{}", error),
        }
    }
}

// ============================================================================
// ParseError
// ============================================================================

/// A parse failure at a position
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError<E, T> {
    /// Unexpected / expected items
    Trivial {
        /// Where the failure was detected
        position: SourcePos,
        /// What was found, if known
        unexpected: Option<ErrorItem<T>>,
        /// What would have been accepted
        expected: BTreeSet<ErrorItem<T>>,
    },
    /// Fail messages, indentation errors and custom payloads
    Fancy {
        /// Where the failure was detected
        position: SourcePos,
        /// Distinct fancy errors, oldest first
        errors: Vec<ErrorFancy<E>>,
    },
}

impl<E, T> ParseError<E, T> {
    /// Where the failure was detected
    #[inline]
    pub fn position(&self) -> &SourcePos {
        match self {
            ParseError::Trivial { position, .. } | ParseError::Fancy { position, .. } => position,
        }
    }

    /// Whether this is a fancy error
    #[inline]
    pub fn is_fancy(&self) -> bool {
        matches!(self, ParseError::Fancy { .. })
    }

    /// The unexpected item of a trivial error
    #[inline]
    pub fn unexpected(&self) -> Option<&ErrorItem<T>> {
        match self {
            ParseError::Trivial { unexpected, .. } => unexpected.as_ref(),
            ParseError::Fancy { .. } => None,
        }
    }

    /// The expected items of a trivial error
    #[inline]
    pub fn expected(&self) -> Option<&BTreeSet<ErrorItem<T>>> {
        match self {
            ParseError::Trivial { expected, .. } => Some(expected),
            ParseError::Fancy { .. } => None,
        }
    }

    /// The fancy errors, empty for a trivial error
    #[inline]
    pub fn fancy_errors(&self) -> &[ErrorFancy<E>] {
        match self {
            ParseError::Fancy { errors, .. } => errors,
            ParseError::Trivial { .. } => &[],
        }
    }
}

impl<E: PartialEq, T: Ord> ParseError<E, T> {
    /// Whether `item` is among the expected items
    pub fn expects(&self, item: &ErrorItem<T>) -> bool {
        self.expected().map_or(false, |expected| expected.contains(item))
    }

    /// Combine the errors of two alternatives
    ///
    /// The error further into the input wins outright. At the same position a
    /// fancy error beats a trivial one, two fancy errors pool their entries,
    /// and two trivial errors union their expected items and keep the greater
    /// unexpected item.
    pub fn merge(self, other: Self) -> Self {
        match self.position().cmp(other.position()) {
            Ordering::Less => other,
            Ordering::Greater => self,
            Ordering::Equal => match (self, other) {
                (
                    ParseError::Trivial {
                        position,
                        unexpected: left,
                        mut expected,
                    },
                    ParseError::Trivial {
                        unexpected: right,
                        expected: more,
                        ..
                    },
                ) => {
                    expected.extend(more);
                    ParseError::Trivial {
                        position,
                        unexpected: greater_item(left, right),
                        expected,
                    }
                }
                (fancy @ ParseError::Fancy { .. }, ParseError::Trivial { .. })
                | (ParseError::Trivial { .. }, fancy @ ParseError::Fancy { .. }) => fancy,
                (
                    ParseError::Fancy {
                        position,
                        mut errors,
                    },
                    ParseError::Fancy { errors: more, .. },
                ) => {
                    for error in more {
                        if !errors.contains(&error) {
                            errors.push(error);
                        }
                    }
                    ParseError::Fancy { position, errors }
                }
            },
        }
    }
}

/// The greater of two optional unexpected items
pub(crate) fn greater_item<T: Ord>(
    left: Option<ErrorItem<T>>,
    right: Option<ErrorItem<T>>,
) -> Option<ErrorItem<T>> {
    match (left, right) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

impl<E: fmt::Display, T: Token> ParseError<E, T> {
    /// The message without the position header
    pub fn message(&self) -> String {
        Message(self).to_string()
    }

    /// Render the error under the offending source line
    ///
    /// Lines are located by the error's line number; the caret sits under its
    /// column.
    pub fn format_with_source(&self, source: &str) -> String {
        let position = self.position();
        let mut output = format!(
            "Error at line {}, column {}:\n",
            position.line, position.column
        );

        let bytes = source.as_bytes();
        let line_start = match position.line {
            0 | 1 => Some(0),
            line => memchr::memchr_iter(b'\n', bytes)
                .nth(line - 2)
                .map(|newline| newline + 1),
        };
        if let Some(start) = line_start {
            let end = memchr::memchr(b'\n', &bytes[start..]).map_or(bytes.len(), |n| start + n);
            output.push_str(source[start..end].trim_end_matches('\r'));
            output.push('\n');
            output.push_str(&" ".repeat(position.column.saturating_sub(1)));
            output.push_str("^\n");
        }

        output.push_str(&self.message());
        output
    }
}

impl<E: fmt::Display, T: Token> fmt::Display for ParseError<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.position())?;
        write!(f, "{}", Message(self))
    }
}

impl<E: fmt::Debug + fmt::Display, T: Token> std::error::Error for ParseError<E, T> {}

/// Display adapter for the message body
struct Message<'a, E, T>(&'a ParseError<E, T>);

impl<E: fmt::Display, T: Token> fmt::Display for Message<'_, E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            ParseError::Trivial {
                unexpected,
                expected,
                ..
            } => {
                if unexpected.is_none() && expected.is_empty() {
                    return f.write_str("unknown parse error");
                }
                let mut lines = Vec::with_capacity(2);
                if let Some(item) = unexpected {
                    lines.push(format!("unexpected {}", item));
                }
                if !expected.is_empty() {
                    let items: Vec<String> = expected.iter().map(|item| item.to_string()).collect();
                    lines.push(format!("expecting {}", or_list(&items)));
                }
                f.write_str(&lines.join("\n"))
            }
            ParseError::Fancy { errors, .. } => {
                let lines: Vec<String> = errors.iter().map(|error| error.to_string()).collect();
                f.write_str(&lines.join("\n"))
            }
        }
    }
}

/// `a`, `a or b`, `a, b, or c`
fn or_list(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{} or {}", first, second),
        [init @ .., last] => format!("{}, or {}", init.join(", "), last),
    }
}

// ============================================================================
// Machine errors
// ============================================================================

/// A configured resource limit stopped the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Input exceeds the configured maximum
    InputTooLarge {
        /// Tokens in the input
        input_size: usize,
        /// Configured maximum
        max_size: usize,
    },
    /// Nested blocks exceeded the configured depth
    RecursionLimitExceeded {
        /// Depth reached
        depth: usize,
        /// Configured maximum
        max_depth: usize,
    },
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::InputTooLarge {
                input_size,
                max_size,
            } => write!(
                f,
                "Input too large: {} tokens exceeds limit of {} tokens",
                input_size, max_size
            ),
            VmError::RecursionLimitExceeded { depth, max_depth } => write!(
                f,
                "Recursion limit exceeded: depth {} exceeds limit of {}",
                depth, max_depth
            ),
        }
    }
}

impl std::error::Error for VmError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    type Error = ParseError<String, char>;

    fn trivial(offset: usize, unexpected: Option<ErrorItem<char>>, expected: &[ErrorItem<char>]) -> Error {
        ParseError::Trivial {
            position: SourcePos::new("t", offset, 1, offset + 1),
            unexpected,
            expected: expected.iter().cloned().collect(),
        }
    }

    fn fancy(offset: usize, message: &str) -> Error {
        ParseError::Fancy {
            position: SourcePos::new("t", offset, 1, offset + 1),
            errors: vec![ErrorFancy::Fail(message.to_string())],
        }
    }

    #[test]
    fn test_item_order() {
        let token = ErrorItem::Token('z');
        let short = ErrorItem::Tokens(vec!['z', 'z']);
        let long = ErrorItem::Tokens(vec!['a', 'a', 'a']);
        let label = ErrorItem::Label("digit".to_string());
        let eoi = ErrorItem::<char>::EndOfInput;

        assert!(token < short);
        assert!(short < long);
        assert!(long < label);
        assert!(label < eoi);
        assert!(ErrorItem::Token('a') < ErrorItem::Token('b'));
        assert!(ErrorItem::<char>::Label("a".into()) < ErrorItem::Label("b".into()));
    }

    #[test]
    fn test_merge_same_position_unions() {
        let left = trivial(0, Some(ErrorItem::Token('c')), &[ErrorItem::Token('a')]);
        let right = trivial(0, Some(ErrorItem::EndOfInput), &[ErrorItem::Token('b')]);
        let merged = left.merge(right);

        assert!(merged.expects(&ErrorItem::Token('a')));
        assert!(merged.expects(&ErrorItem::Token('b')));
        assert_eq!(merged.unexpected(), Some(&ErrorItem::EndOfInput));
    }

    #[test]
    fn test_merge_further_position_wins() {
        let near = trivial(1, None, &[ErrorItem::Token('a')]);
        let far = trivial(4, None, &[ErrorItem::Token('b')]);

        let merged = near.clone().merge(far.clone());
        assert_eq!(merged, far);
        let merged = far.clone().merge(near);
        assert_eq!(merged, far);
    }

    #[test]
    fn test_fancy_dominates_at_same_position() {
        let plain = trivial(2, None, &[ErrorItem::Token('a')]);
        let custom = fancy(2, "boom");
        assert_eq!(plain.clone().merge(custom.clone()), custom);
        assert_eq!(custom.clone().merge(plain), custom);
    }

    #[test]
    fn test_fancy_merge_dedups() {
        let merged = fancy(0, "a").merge(fancy(0, "b")).merge(fancy(0, "a"));
        assert_eq!(merged.fancy_errors().len(), 2);
    }

    #[test]
    fn test_display() {
        let error = trivial(
            2,
            Some(ErrorItem::Token('x')),
            &[
                ErrorItem::Token('a'),
                ErrorItem::Token('b'),
                ErrorItem::Label("digit".to_string()),
            ],
        );
        assert_eq!(
            error.to_string(),
            "t(1,3):\nunexpected 'x'\nexpecting 'a', 'b', or digit"
        );

        let error = trivial(0, Some(ErrorItem::EndOfInput), &[ErrorItem::Tokens(vec!['o', 'k'])]);
        assert_eq!(error.message(), "unexpected end of input\nexpecting \"ok\"");
    }

    #[test]
    fn test_indentation_display() {
        let error: ErrorFancy<Infallible> = ErrorFancy::Indentation {
            ordering: Ordering::Greater,
            reference: 4,
            actual: 2,
        };
        assert_eq!(
            error.to_string(),
            "incorrect indentation (got 2, should be greater than 4)"
        );
    }

    #[test]
    fn test_format_with_source() {
        let error = ParseError::<String, char>::Trivial {
            position: SourcePos::new("", 9, 2, 4),
            unexpected: Some(ErrorItem::Token('!')),
            expected: BTreeSet::new(),
        };
        let rendered = error.format_with_source("first\nsec!nd\nthird");
        assert_eq!(
            rendered,
            "Error at line 2, column 4:\nsec!nd\n   ^\nunexpected '!'"
        );
    }

    #[test]
    fn test_vm_error_display() {
        let error = VmError::RecursionLimitExceeded {
            depth: 11,
            max_depth: 10,
        };
        assert_eq!(
            error.to_string(),
            "Recursion limit exceeded: depth 11 exceeds limit of 10"
        );
    }
}

//! Parse results
//!
//! Every top-level parse ends in one of four outcomes, split by success and
//! by whether any input was consumed:
//!
//! | | consumed input | consumed nothing |
//! |---|---|---|
//! | success | [`ParserResult::ConsumedOk`] | [`ParserResult::EmptyOk`] |
//! | failure | [`ParserResult::ConsumedErr`] | [`ParserResult::EmptyErr`] |

use super::error::ParseError;
use super::source_pos::SourcePos;

/// Outcome of running a parser over an input
#[derive(Debug, Clone, PartialEq)]
pub enum ParserResult<E, T, A> {
    /// Succeeded after consuming input
    ConsumedOk(A, SourcePos),
    /// Succeeded without consuming input
    EmptyOk(A, SourcePos),
    /// Failed after consuming input
    ConsumedErr(ParseError<E, T>, SourcePos),
    /// Failed without consuming input
    EmptyErr(ParseError<E, T>, SourcePos),
}

impl<E, T, A> ParserResult<E, T, A> {
    /// Whether the parse succeeded
    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, ParserResult::ConsumedOk(..) | ParserResult::EmptyOk(..))
    }

    /// Whether the parse failed
    #[inline]
    pub fn is_failed(&self) -> bool {
        !self.is_ok()
    }

    /// Whether any input was consumed
    #[inline]
    pub fn is_consumed(&self) -> bool {
        matches!(
            self,
            ParserResult::ConsumedOk(..) | ParserResult::ConsumedErr(..)
        )
    }

    /// Whether no input was consumed
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.is_consumed()
    }

    /// The parsed value, if the parse succeeded
    pub fn value(&self) -> Option<&A> {
        match self {
            ParserResult::ConsumedOk(value, _) | ParserResult::EmptyOk(value, _) => Some(value),
            _ => None,
        }
    }

    /// Consume the result, keeping only the value
    pub fn into_value(self) -> Option<A> {
        match self {
            ParserResult::ConsumedOk(value, _) | ParserResult::EmptyOk(value, _) => Some(value),
            _ => None,
        }
    }

    /// The error, if the parse failed
    pub fn error(&self) -> Option<&ParseError<E, T>> {
        match self {
            ParserResult::ConsumedErr(error, _) | ParserResult::EmptyErr(error, _) => Some(error),
            _ => None,
        }
    }

    /// Position the parse stopped at
    pub fn position(&self) -> &SourcePos {
        match self {
            ParserResult::ConsumedOk(_, position)
            | ParserResult::EmptyOk(_, position)
            | ParserResult::ConsumedErr(_, position)
            | ParserResult::EmptyErr(_, position) => position,
        }
    }

    /// Drop the consumed flag and position
    pub fn into_result(self) -> Result<A, ParseError<E, T>> {
        match self {
            ParserResult::ConsumedOk(value, _) | ParserResult::EmptyOk(value, _) => Ok(value),
            ParserResult::ConsumedErr(error, _) | ParserResult::EmptyErr(error, _) => Err(error),
        }
    }

    /// Case analysis over the four outcomes
    pub fn fold<R>(
        self,
        consumed_ok: impl FnOnce(A, SourcePos) -> R,
        empty_ok: impl FnOnce(A, SourcePos) -> R,
        consumed_err: impl FnOnce(ParseError<E, T>, SourcePos) -> R,
        empty_err: impl FnOnce(ParseError<E, T>, SourcePos) -> R,
    ) -> R {
        match self {
            ParserResult::ConsumedOk(value, position) => consumed_ok(value, position),
            ParserResult::EmptyOk(value, position) => empty_ok(value, position),
            ParserResult::ConsumedErr(error, position) => consumed_err(error, position),
            ParserResult::EmptyErr(error, position) => empty_err(error, position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    type Result = ParserResult<String, char, u32>;

    fn failure() -> ParseError<String, char> {
        ParseError::Trivial {
            position: SourcePos::default(),
            unexpected: None,
            expected: BTreeSet::new(),
        }
    }

    #[test]
    fn test_flags() {
        let ok: Result = ParserResult::ConsumedOk(1, SourcePos::default().next(1));
        assert!(ok.is_ok() && ok.is_consumed());
        assert_eq!(ok.value(), Some(&1));
        assert!(ok.error().is_none());
        assert_eq!(ok.position().offset, 1);

        let err: Result = ParserResult::EmptyErr(failure(), SourcePos::default());
        assert!(err.is_failed() && err.is_empty());
        assert!(err.value().is_none());
        assert_eq!(err.error(), Some(&failure()));
    }

    #[test]
    fn test_into_result() {
        let ok: Result = ParserResult::EmptyOk(5, SourcePos::default());
        assert_eq!(ok.into_result(), Ok(5));

        let err: Result = ParserResult::ConsumedErr(failure(), SourcePos::default());
        assert_eq!(err.into_result(), Err(failure()));
    }

    #[test]
    fn test_fold() {
        let describe = |result: Result| {
            result.fold(
                |v, _| format!("cok {}", v),
                |v, _| format!("eok {}", v),
                |_, _| "cerr".to_string(),
                |_, _| "eerr".to_string(),
            )
        };
        assert_eq!(describe(ParserResult::ConsumedOk(3, SourcePos::default())), "cok 3");
        assert_eq!(describe(ParserResult::EmptyOk(4, SourcePos::default())), "eok 4");
        assert_eq!(
            describe(ParserResult::EmptyErr(failure(), SourcePos::default())),
            "eerr"
        );
    }
}

//! Token, value and custom-error bounds
//!
//! Parsers are generic over three types: the input token `T`, the custom
//! error payload `E`, and the produced value `A`. The traits here collect the
//! bounds each one needs.

use std::fmt;

/// An input element the machine can match on
///
/// Tokens are stored inline on the value stack, so they must be `Copy`. `Ord`
/// gives error item sets a deterministic order.
pub trait Token: Copy + Ord + fmt::Debug + Send + Sync + 'static {
    /// Whether this token ends a line (drives [`newline`](crate::engine::parsec::newline))
    #[inline]
    fn is_line_break(&self) -> bool {
        false
    }

    /// Render a run of tokens for error messages
    fn describe(tokens: &[Self], f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match tokens {
            [single] => write!(f, "{:?}", single),
            _ => write!(f, "{:?}", tokens),
        }
    }
}

impl Token for char {
    #[inline]
    fn is_line_break(&self) -> bool {
        *self == '\n'
    }

    fn describe(tokens: &[Self], f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match tokens {
            [single] => write!(f, "{:?}", single),
            _ => {
                let text: String = tokens.iter().collect();
                write!(f, "{:?}", text)
            }
        }
    }
}

impl Token for u8 {
    #[inline]
    fn is_line_break(&self) -> bool {
        *self == b'\n'
    }

    fn describe(tokens: &[Self], f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match tokens {
            [single] => write!(f, "{:?}", *single as char),
            _ => write!(f, "\"{}\"", tokens.escape_ascii()),
        }
    }
}

impl Token for u16 {}
impl Token for u32 {}
impl Token for i32 {}
impl Token for i64 {}

/// A value a parser can produce
///
/// Values move between the constant pool and the live stack behind shared
/// pointers, hence `Clone + Send + Sync`.
pub trait Value: Clone + Send + Sync + 'static {}

impl<A: Clone + Send + Sync + 'static> Value for A {}

/// A user-defined error payload carried by fancy errors
pub trait CustomError: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

impl<E: Clone + PartialEq + fmt::Debug + Send + Sync + 'static> CustomError for E {}

/// Adapter implementing `Display` for a token run via [`Token::describe`]
pub(crate) struct Described<'a, T>(pub &'a [T]);

impl<T: Token> fmt::Display for Described<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        T::describe(self.0, f)
    }
}

//! Parser construction
//!
//! A [`Parsec`] is a compiled program: instruction bytes plus a constant
//! pool. Primitives create one-instruction programs; combinators append to,
//! wrap, or join existing ones. Nothing runs until [`Parsec::parse`].
//!
//! # Example
//!
//! ```rust
//! use stackparsec::prelude::*;
//! use std::convert::Infallible;
//!
//! type P<A> = Parsec<Infallible, char, A>;
//!
//! let digit: P<char> = satisfy(|c: char| c.is_ascii_digit()).label("digit");
//! let minus: P<char> = token('-');
//! let plus: P<char> = token('+');
//! let number = (minus | plus).select_many(
//!     move |_| digit.clone(),
//!     |sign: char, digit: char| format!("{}{}", sign, digit),
//! );
//!
//! let input: Vec<char> = "-7".chars().collect();
//! assert_eq!(number.parse(&input).into_value(), Some("-7".to_string()));
//! ```
//!
//! Parsers are immutable values. Reusing one in several places shares its
//! bytes until one of the uses extends them, at which point that use gets
//! its own copy.

use super::bytecode::{constant_id, ConstantId, Instructions, OpCode};
use super::debug::{Disassembler, Listing};
use super::error::{ErrorFancy, ParseError, VmError};
use super::error_stack::pop_error;
use super::result::ParserResult;
use super::stack::{corrupted, Stack};
use super::state::ParseState;
use super::token::{CustomError, Token, Value};
use super::vm::{execute, peek_value, take_value, Dispatch, Observe, ParserConfig, Predicate};
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ops::BitOr;
use std::sync::Arc;

/// Untyped program: instructions and the constants they refer to
#[derive(Clone)]
pub(crate) struct ParsecCore {
    pub(crate) instructions: Instructions,
    pub(crate) constants: Arc<Stack<'static>>,
}

impl ParsecCore {
    fn new() -> Self {
        Self {
            instructions: Instructions::new(),
            constants: Arc::new(Stack::new()),
        }
    }

    fn add_value<A: Copy + 'static>(&mut self, value: A) -> ConstantId {
        let id = constant_id(self.constants.len());
        Arc::make_mut(&mut self.constants).push_value(value);
        id
    }

    fn add_object<A: Any + Send + Sync>(&mut self, value: A) -> ConstantId {
        let id = constant_id(self.constants.len());
        Arc::make_mut(&mut self.constants).push_object(value);
        id
    }

    fn emit(mut self, code: &Instructions) -> Self {
        self.instructions = std::mem::take(&mut self.instructions).then(code);
        self
    }

    fn wrap(mut self, op: OpCode) -> Self {
        self.instructions = std::mem::take(&mut self.instructions).framed(op);
        self
    }

    fn wrap_with(mut self, op: OpCode, id: ConstantId) -> Self {
        self.instructions = std::mem::take(&mut self.instructions).framed_with(op, id);
        self
    }
}

impl fmt::Debug for ParsecCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsecCore")
            .field("instructions", &self.instructions.len())
            .field("constants", &self.constants.len())
            .finish()
    }
}

/// A parser over tokens `T` producing `A`, failing with custom errors `E`
pub struct Parsec<E, T, A> {
    core: ParsecCore,
    _marker: PhantomData<fn() -> (E, T, A)>,
}

impl<E, T, A> Clone for Parsec<E, T, A> {
    fn clone(&self) -> Self {
        Self::from_core(self.core.clone())
    }
}

impl<E, T, A> fmt::Debug for Parsec<E, T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parsec")
            .field("instructions", &self.core.instructions.len())
            .field("constants", &self.core.constants.len())
            .finish()
    }
}

impl<E, T, A> Parsec<E, T, A> {
    #[inline]
    fn from_core(core: ParsecCore) -> Self {
        Self {
            core,
            _marker: PhantomData,
        }
    }

    /// The compiled instructions
    #[inline]
    pub fn instructions(&self) -> &Instructions {
        &self.core.instructions
    }

    /// Number of entries in the constant pool
    #[inline]
    pub fn constant_count(&self) -> usize {
        self.core.constants.len()
    }

    /// Decode the program for inspection
    pub fn disassemble(&self) -> Listing {
        Disassembler::new(self.core.instructions.as_bytes()).run()
    }
}

// ============================================================================
// Primitives
// ============================================================================

fn single<E, T, A>(op: OpCode) -> Parsec<E, T, A> {
    Parsec::from_core(ParsecCore::new().emit(&Instructions::op(op)))
}

fn with_value<E, T, A, C: Copy + 'static>(op: OpCode, constant: C) -> Parsec<E, T, A> {
    let mut core = ParsecCore::new();
    let id = core.add_value(constant);
    Parsec::from_core(core.emit(&Instructions::with_constant(op, id)))
}

fn with_object<E, T, A, C: Any + Send + Sync>(op: OpCode, constant: C) -> Parsec<E, T, A> {
    let mut core = ParsecCore::new();
    let id = core.add_object(constant);
    Parsec::from_core(core.emit(&Instructions::with_constant(op, id)))
}

/// Succeed with `value` without consuming input
pub fn pure<E, T, A: Value>(value: A) -> Parsec<E, T, A> {
    with_object(OpCode::Pure, value)
}

/// Fail with a custom error
pub fn error<E: CustomError, T, A>(error: E) -> Parsec<E, T, A> {
    with_object(OpCode::Error, ErrorFancy::Custom(error))
}

/// Fail with a message
pub fn fail<E: CustomError, T, A>(message: impl Into<String>) -> Parsec<E, T, A> {
    with_object(OpCode::Error, ErrorFancy::<E>::Fail(message.into()))
}

/// Fail with an indentation error: `actual` should relate to `reference`
/// as `ordering`
pub fn incorrect_indent<E: CustomError, T, A>(
    ordering: Ordering,
    reference: usize,
    actual: usize,
) -> Parsec<E, T, A> {
    with_object(
        OpCode::Error,
        ErrorFancy::<E>::Indentation {
            ordering,
            reference,
            actual,
        },
    )
}

/// Match one specific token
pub fn token<E, T: Token>(expected: T) -> Parsec<E, T, T> {
    with_value(OpCode::Token, expected)
}

/// Match a token sequence
///
/// A partial match fails after consuming the matched prefix; wrap in
/// [`try_`] to backtrack.
pub fn tokens<E, T: Token>(expected: impl IntoIterator<Item = T>) -> Parsec<E, T, Vec<T>> {
    with_object(OpCode::Tokens, expected.into_iter().collect::<Vec<T>>())
}

/// Match one token satisfying `predicate`
pub fn satisfy<E, T: Token>(
    predicate: impl Fn(T) -> bool + Send + Sync + 'static,
) -> Parsec<E, T, T> {
    let predicate: Predicate<T> = Box::new(predicate);
    with_object(OpCode::Satisfy, predicate)
}

/// Match one token from `set`
pub fn one_of<E, T: Token>(set: impl IntoIterator<Item = T>) -> Parsec<E, T, T> {
    with_object(OpCode::OneOf, set.into_iter().collect::<Vec<T>>())
}

/// Match one token not in `set`
pub fn none_of<E, T: Token>(set: impl IntoIterator<Item = T>) -> Parsec<E, T, T> {
    with_object(OpCode::NoneOf, set.into_iter().collect::<Vec<T>>())
}

/// Consume exactly `count` tokens
///
/// # Panics
/// Panics if `count` does not fit in 32 bits.
pub fn take<E, T: Token>(count: usize) -> Parsec<E, T, Vec<T>> {
    let count = match u32::try_from(count) {
        Ok(count) => count,
        Err(_) => panic!("take count {} exceeds u32::MAX", count),
    };
    Parsec::from_core(ParsecCore::new().emit(&Instructions::with_count(OpCode::TakeN, count)))
}

/// Consume any one token
pub fn take1<E, T: Token>() -> Parsec<E, T, T> {
    single(OpCode::Take1)
}

/// Consume the longest run of tokens satisfying `predicate` (possibly none)
pub fn take_while<E, T: Token>(
    predicate: impl Fn(T) -> bool + Send + Sync + 'static,
) -> Parsec<E, T, Vec<T>> {
    let predicate: Predicate<T> = Box::new(predicate);
    with_object(OpCode::TakeWhile, predicate)
}

/// Consume the longest non-empty run of tokens satisfying `predicate`
pub fn take_while1<E, T: Token>(
    predicate: impl Fn(T) -> bool + Send + Sync + 'static,
) -> Parsec<E, T, Vec<T>> {
    let predicate: Predicate<T> = Box::new(predicate);
    with_object(OpCode::TakeWhile1, predicate)
}

/// Succeed only at the end of input
pub fn eof<E, T: Token>() -> Parsec<E, T, ()> {
    single(OpCode::Eof)
}

/// Match one line break token and move to the next line
pub fn newline<E, T: Token>() -> Parsec<E, T, T> {
    with_object(OpCode::Newline, String::from("newline"))
}

// ============================================================================
// Dispatchers
// ============================================================================

#[inline]
fn take_function<F: Any + Send + Sync>(stack: &mut Stack<'_>) -> Arc<F> {
    match stack.take_shared::<F>() {
        Some(function) => function,
        None => corrupted("function has the wrong type"),
    }
}

fn map_dispatch<T, A, B, F>(stack: &mut Stack<'_>, input: &[T])
where
    T: Token,
    A: Value,
    B: Value,
    F: Fn(A) -> B + Send + Sync + 'static,
{
    let function = take_function::<F>(stack);
    let value = take_value::<T, A>(stack, input);
    stack.push_object(function(value));
}

fn bind_dispatch<E, T, A, B, F>(stack: &mut Stack<'_>, input: &[T])
where
    T: Token,
    A: Value,
    F: Fn(A) -> Parsec<E, T, B> + Send + Sync + 'static,
{
    let function = take_function::<F>(stack);
    let value = take_value::<T, A>(stack, input);
    stack.push_object(function(value).core);
}

/// First half of `select_many`: like bind, but the value stays for `project`
fn select_dispatch<E, T, A, B, F>(stack: &mut Stack<'_>, input: &[T])
where
    T: Token,
    A: Value,
    F: Fn(A) -> Parsec<E, T, B> + Send + Sync + 'static,
{
    let function = take_function::<F>(stack);
    let value = peek_value::<T, A>(stack, input);
    stack.push_object(function(value).core);
}

fn project_dispatch<T, A, B, C, P>(stack: &mut Stack<'_>, input: &[T])
where
    T: Token,
    A: Value,
    B: Value,
    C: Value,
    P: Fn(A, B) -> C + Send + Sync + 'static,
{
    let project = take_function::<P>(stack);
    let second = take_value::<T, B>(stack, input);
    let first = take_value::<T, A>(stack, input);
    stack.push_object(project(first, second));
}

fn observe_dispatch<E, T, A>(stack: &mut Stack<'_>, state: &ParseState<'_, T>, succeeded: bool)
where
    E: CustomError,
    T: Token,
    A: Value,
{
    let observed: Result<A, ParseError<E, T>> = if succeeded {
        Ok(take_value::<T, A>(stack, state.input()))
    } else {
        Err(pop_error::<E, T>(stack, state))
    };
    stack.push_object(observed);
}

// ============================================================================
// Combinators
// ============================================================================

impl<E: CustomError, T: Token, A: Value> Parsec<E, T, A> {
    fn invoke<B>(
        self,
        op: OpCode,
        dispatch: Dispatch<T>,
        function: impl Any + Send + Sync,
    ) -> Parsec<E, T, B> {
        let mut core = self.core;
        let dispatcher = core.add_value(dispatch);
        let function = core.add_object(function);
        Parsec::from_core(core.emit(&Instructions::invoke(op, dispatcher, function)))
    }

    /// Transform the result
    pub fn map<B, F>(self, f: F) -> Parsec<E, T, B>
    where
        B: Value,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        self.invoke(OpCode::Invoke, map_dispatch::<T, A, B, F>, f)
    }

    /// Continue with the parser `f` builds from the result
    pub fn bind<B, F>(self, f: F) -> Parsec<E, T, B>
    where
        B: Value,
        F: Fn(A) -> Parsec<E, T, B> + Send + Sync + 'static,
    {
        self.invoke(OpCode::InvokeM, bind_dispatch::<E, T, A, B, F>, f)
    }

    /// Bind, then combine both results with `project`
    pub fn select_many<B, C, F, P>(self, bind: F, project: P) -> Parsec<E, T, C>
    where
        B: Value,
        C: Value,
        F: Fn(A) -> Parsec<E, T, B> + Send + Sync + 'static,
        P: Fn(A, B) -> C + Send + Sync + 'static,
    {
        let bound: Parsec<E, T, B> =
            self.invoke(OpCode::InvokeM, select_dispatch::<E, T, A, B, F>, bind);
        let mut core = bound.core;
        let dispatch: Dispatch<T> = project_dispatch::<T, A, B, C, P>;
        let dispatcher = core.add_value(dispatch);
        let function = core.add_object(project);
        Parsec::from_core(core.emit(&Instructions::invoke(OpCode::Invoke, dispatcher, function)))
    }

    /// Ordered choice: try `other` only if `self` fails without consuming
    pub fn or(self, other: Parsec<E, T, A>) -> Parsec<E, T, A> {
        let mut core = self.core;
        let rhs_offset = constant_id(core.constants.len());
        Arc::make_mut(&mut core.constants).append(&other.core.constants);
        core.instructions = Instructions::or(core.instructions, &other.core.instructions, rhs_offset);
        Parsec::from_core(core)
    }

    /// On failure, rewind to where this parser started
    pub fn try_(self) -> Self {
        Self::from_core(self.core.wrap(OpCode::Try))
    }

    /// Report failures without consumption as expecting `name`
    pub fn label(self, name: impl Into<String>) -> Self {
        let mut core = self.core;
        let id = core.add_object(name.into());
        Self::from_core(core.wrap_with(OpCode::Label, id))
    }

    /// Drop the expected items of failures without consumption
    pub fn hidden(self) -> Self {
        Self::from_core(self.core.wrap(OpCode::Hidden))
    }

    /// Succeed without consuming input
    pub fn look_ahead(self) -> Self {
        Self::from_core(self.core.wrap(OpCode::LookAhead))
    }

    /// Succeed, consuming nothing, only where this parser fails
    pub fn not_followed_by(self) -> Parsec<E, T, ()> {
        Parsec::from_core(self.core.wrap(OpCode::NotFollowedBy))
    }

    /// Return a failure as a value instead of failing
    ///
    /// Input consumed before the failure stays consumed.
    pub fn observing(self) -> Parsec<E, T, Result<A, ParseError<E, T>>> {
        let mut core = self.core;
        let observe: Observe<T> = observe_dispatch::<E, T, A>;
        let id = core.add_value(observe);
        Parsec::from_core(core.wrap_with(OpCode::Observing, id))
    }

    // ========================================================================
    // Running
    // ========================================================================

    /// Parse `input` with an unnamed source
    pub fn parse(&self, input: &[T]) -> ParserResult<E, T, A> {
        self.parse_named(input, "")
    }

    /// Parse `input`, naming the source in positions
    pub fn parse_named(&self, input: &[T], source_name: &str) -> ParserResult<E, T, A> {
        self.parse_unbounded(input, None, source_name)
    }

    /// Parse `input` using caller-supplied stack memory
    ///
    /// The stack moves to the heap if `scratch` runs out.
    pub fn parse_in(
        &self,
        input: &[T],
        scratch: &mut [MaybeUninit<u8>],
        source_name: &str,
    ) -> ParserResult<E, T, A> {
        self.parse_unbounded(input, Some(scratch), source_name)
    }

    /// Parse under the limits in `config`
    ///
    /// # Errors
    ///
    /// Returns [`VmError`] if the input or the nesting depth exceeds them.
    pub fn parse_with(
        &self,
        input: &[T],
        scratch: Option<&mut [MaybeUninit<u8>]>,
        source_name: &str,
        config: &ParserConfig,
    ) -> Result<ParserResult<E, T, A>, VmError> {
        execute(&self.core, input, scratch, source_name, config)
    }

    fn parse_unbounded(
        &self,
        input: &[T],
        scratch: Option<&mut [MaybeUninit<u8>]>,
        source_name: &str,
    ) -> ParserResult<E, T, A> {
        match self.parse_with(input, scratch, source_name, &ParserConfig::unbounded()) {
            Ok(result) => result,
            Err(error) => unreachable!("limits are disabled: {}", error),
        }
    }
}

impl<E: CustomError, T: Token, A: Value> BitOr for Parsec<E, T, A> {
    type Output = Parsec<E, T, A>;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.or(rhs)
    }
}

// ============================================================================
// Free-function forms
// ============================================================================

/// [`Parsec::map`]
pub fn map<E: CustomError, T: Token, A: Value, B: Value>(
    parser: Parsec<E, T, A>,
    f: impl Fn(A) -> B + Send + Sync + 'static,
) -> Parsec<E, T, B> {
    parser.map(f)
}

/// [`Parsec::bind`]
pub fn bind<E: CustomError, T: Token, A: Value, B: Value>(
    parser: Parsec<E, T, A>,
    f: impl Fn(A) -> Parsec<E, T, B> + Send + Sync + 'static,
) -> Parsec<E, T, B> {
    parser.bind(f)
}

/// [`Parsec::select_many`]
pub fn select_many<E: CustomError, T: Token, A: Value, B: Value, C: Value>(
    parser: Parsec<E, T, A>,
    bind: impl Fn(A) -> Parsec<E, T, B> + Send + Sync + 'static,
    project: impl Fn(A, B) -> C + Send + Sync + 'static,
) -> Parsec<E, T, C> {
    parser.select_many(bind, project)
}

/// [`Parsec::or`]
pub fn choice<E: CustomError, T: Token, A: Value>(
    first: Parsec<E, T, A>,
    second: Parsec<E, T, A>,
) -> Parsec<E, T, A> {
    first.or(second)
}

/// [`Parsec::try_`]
pub fn try_<E: CustomError, T: Token, A: Value>(parser: Parsec<E, T, A>) -> Parsec<E, T, A> {
    parser.try_()
}

/// [`Parsec::label`]
pub fn label<E: CustomError, T: Token, A: Value>(
    name: impl Into<String>,
    parser: Parsec<E, T, A>,
) -> Parsec<E, T, A> {
    parser.label(name)
}

/// [`Parsec::hidden`]
pub fn hidden<E: CustomError, T: Token, A: Value>(parser: Parsec<E, T, A>) -> Parsec<E, T, A> {
    parser.hidden()
}

/// [`Parsec::look_ahead`]
pub fn look_ahead<E: CustomError, T: Token, A: Value>(parser: Parsec<E, T, A>) -> Parsec<E, T, A> {
    parser.look_ahead()
}

/// [`Parsec::not_followed_by`]
pub fn not_followed_by<E: CustomError, T: Token, A: Value>(
    parser: Parsec<E, T, A>,
) -> Parsec<E, T, ()> {
    parser.not_followed_by()
}

/// [`Parsec::observing`]
pub fn observing<E: CustomError, T: Token, A: Value>(
    parser: Parsec<E, T, A>,
) -> Parsec<E, T, Result<A, ParseError<E, T>>> {
    parser.observing()
}

/// Build the parser on first use, for recursive grammars
pub fn lazy<E: CustomError, T: Token, A: Value>(
    build: impl Fn() -> Parsec<E, T, A> + Send + Sync + 'static,
) -> Parsec<E, T, A> {
    pure::<E, T, ()>(()).bind(move |_| build())
}

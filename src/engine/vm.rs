//! Bytecode interpreter
//!
//! [`execute`] runs a compiled program over an input slice. The machine walks
//! one length-framed block at a time; combinators that wrap a block (`try`,
//! `label`, choice, ...) recurse into it and post-process the outcome.
//!
//! Every block finishes in one of two ways:
//!
//! - **Ok**: exactly one value was pushed
//! - **Err**: exactly one pending error frame was pushed (see
//!   [`error_stack`](super::error_stack))
//!
//! Whether a block consumed input is never stored: it is the difference
//! between the cursor before and after the block ran.

use super::bytecode::{
    get_constant_id, instruction_len, malformed, opcode_at, read_u16, read_u32, OpCode,
};
use super::error::VmError;
use super::error_stack::{
    discard, discard_under, frame_len, merge_top_frames, pop_error, strip_expected, ErrorFrame,
};
use super::parsec::ParsecCore;
use super::result::ParserResult;
use super::stack::{corrupted, Stack, DEFAULT_MAX_STACK_SIZE};
use super::state::{ParseState, Span};
use super::token::{CustomError, Token, Value};
use std::any::Any;
use std::mem::MaybeUninit;

/// Logging macros - no-op when logging feature is disabled
#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Logging macros - use log crate when logging feature is enabled
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

// ============================================================================
// Configuration
// ============================================================================

/// Default initial stack size in bytes
pub const DEFAULT_STACK_BYTES: usize = 4096;

/// Default maximum input size in tokens (100M)
pub const DEFAULT_MAX_INPUT_SIZE: usize = 100 * 1024 * 1024;

/// Default maximum nesting depth of running blocks
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

/// Limits applied to one parse
///
/// # Example
///
/// ```rust
/// use stackparsec::engine::vm::ParserConfig;
///
/// let config = ParserConfig::new()
///     .with_max_input_size(1024)
///     .with_max_recursion_depth(64);
/// assert_eq!(config.max_recursion_depth, 64);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Stack bytes allocated up front when no scratch memory is supplied
    pub stack_size: usize,

    /// Hard cap on stack growth; exceeding it panics
    pub max_stack_size: usize,

    /// Maximum input length in tokens (0 = no limit)
    pub max_input_size: usize,

    /// Maximum nesting depth of running blocks (0 = no limit)
    pub max_recursion_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_BYTES,
            max_stack_size: DEFAULT_MAX_STACK_SIZE,
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
        }
    }
}

impl ParserConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Default sizes with the input and recursion limits switched off
    pub fn unbounded() -> Self {
        Self {
            max_input_size: 0,
            max_recursion_depth: 0,
            ..Self::default()
        }
    }

    /// Set the initial stack size
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    /// Set the hard cap on stack growth
    pub fn with_max_stack_size(mut self, bytes: usize) -> Self {
        self.max_stack_size = bytes;
        self
    }

    /// Set the maximum input size
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// Set the maximum recursion depth
    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }
}

// ============================================================================
// Constants the interpreter calls into
// ============================================================================

/// Applies the function on top of the stack to the value beneath it
pub(crate) type Dispatch<T> = fn(&mut Stack<'_>, &[T]);

/// Turns the outcome of an observed block into a `Result` value
pub(crate) type Observe<T> = fn(&mut Stack<'_>, &ParseState<'_, T>, bool);

/// Single-token predicate
pub(crate) type Predicate<T> = Box<dyn Fn(T) -> bool + Send + Sync>;

#[inline]
fn constant_value<A: Copy + 'static>(constants: &Stack<'_>, id: usize) -> A {
    match constants.get::<A>(id) {
        Some(value) => value,
        None => corrupted("constant has the wrong type"),
    }
}

#[inline]
fn constant_object<'c, A: Any>(constants: &'c Stack<'_>, id: usize) -> &'c A {
    match constants.object::<A>(id) {
        Some(value) => value,
        None => corrupted("constant has the wrong type"),
    }
}

#[inline]
fn block(code: &[u8], from: usize, len: usize) -> &[u8] {
    match code.get(from..from + len) {
        Some(block) => block,
        None => malformed("block runs past the end of its frame"),
    }
}

/// Turn a token-run span into `A`, if `A` is `Vec<T>`
#[inline]
fn materialize<T: Token, A: Value>(span: Span, input: &[T]) -> Option<A> {
    let owned: Box<dyn Any> = Box::new(span.of(input).to_vec());
    owned.downcast::<A>().ok().map(|value| *value)
}

/// Pop the top value as an `A`
///
/// # Panics
/// Panics if the top slot does not hold an `A`.
pub(crate) fn take_value<T: Token, A: Value>(stack: &mut Stack<'_>, input: &[T]) -> A {
    if let Some(span) = stack.peek::<Span>() {
        if let Some(value) = materialize::<T, A>(span, input) {
            stack.pop();
            return value;
        }
    }
    match stack.take::<A>() {
        Some(value) => value,
        None => corrupted("value has the wrong type"),
    }
}

/// Copy the top value out as an `A`, leaving it in place
pub(crate) fn peek_value<T: Token, A: Value>(stack: &Stack<'_>, input: &[T]) -> A {
    if let Some(span) = stack.peek::<Span>() {
        if let Some(value) = materialize::<T, A>(span, input) {
            return value;
        }
    }
    match stack.peek_cloned::<A>() {
        Some(value) => value,
        None => corrupted("value has the wrong type"),
    }
}

// ============================================================================
// Machine
// ============================================================================

/// How a block finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reply {
    Ok,
    Err,
}

struct Machine<'i, 's, T> {
    state: ParseState<'i, T>,
    stack: Stack<'s>,
    depth: usize,
    max_depth: usize,
}

impl<'i, 's, T: Token> Machine<'i, 's, T> {
    fn new(state: ParseState<'i, T>, stack: Stack<'s>, max_depth: usize) -> Self {
        Self {
            state,
            stack,
            depth: 0,
            max_depth,
        }
    }

    /// Run a block, leaving one value or one error frame on the stack
    fn run_block(
        &mut self,
        code: &[u8],
        constants: &Stack<'_>,
        offset: usize,
    ) -> Result<Reply, VmError> {
        self.depth += 1;
        if self.max_depth > 0 && self.depth > self.max_depth {
            return Err(VmError::RecursionLimitExceeded {
                depth: self.depth,
                max_depth: self.max_depth,
            });
        }
        let result = self.run_steps(code, constants, offset);
        self.depth -= 1;
        result
    }

    fn run_steps(
        &mut self,
        code: &[u8],
        constants: &Stack<'_>,
        offset: usize,
    ) -> Result<Reply, VmError> {
        let base = self.stack.len();
        let mut pc = 0;
        while pc < code.len() {
            if self.step(code, pc, constants, offset)? == Reply::Err {
                self.drop_partial_values(base);
                return Ok(Reply::Err);
            }
            pc += instruction_len(code, pc);
        }
        Ok(Reply::Ok)
    }

    /// Drop values an earlier instruction of a failed block left under its
    /// error frame
    fn drop_partial_values(&mut self, base: usize) {
        let frame = frame_len(&self.stack, 0);
        match self.stack.len().checked_sub(base + frame) {
            Some(extra) => self.stack.drop_under(frame, extra),
            None => corrupted("failed block popped values it did not push"),
        }
    }

    fn step(
        &mut self,
        code: &[u8],
        pc: usize,
        constants: &Stack<'_>,
        offset: usize,
    ) -> Result<Reply, VmError> {
        let op = opcode_at(code, pc);
        let constant = || get_constant_id(code, pc + 1, offset);

        let reply = match op {
            OpCode::Pure => {
                self.stack.read_from_and_push(constants, constant());
                Reply::Ok
            }
            OpCode::Error => {
                ErrorFrame::open(&mut self.stack, self.state.cursor())
                    .fancy(constants, constant())
                    .close();
                Reply::Err
            }
            OpCode::Token => self.token(constants, constant()),
            OpCode::Tokens => self.tokens(constants, constant()),
            OpCode::Take1 => self.take1(),
            OpCode::TakeN => self.take_n(read_u32(code, pc + 1) as usize),
            OpCode::TakeWhile => self.take_while(constants, constant(), false),
            OpCode::TakeWhile1 => self.take_while(constants, constant(), true),
            OpCode::Satisfy => self.satisfy(constants, constant()),
            OpCode::OneOf => self.one_of(constants, constant()),
            OpCode::NoneOf => self.none_of(constants, constant()),
            OpCode::Eof => self.eof(),
            OpCode::Newline => self.newline(constants, constant()),
            OpCode::Invoke => {
                self.invoke(code, pc, constants, offset);
                Reply::Ok
            }
            OpCode::InvokeM => {
                self.invoke(code, pc, constants, offset);
                return self.run_nested();
            }
            OpCode::Try => {
                let body = block(code, pc + 5, read_u32(code, pc + 1) as usize);
                return self.try_block(body, constants, offset);
            }
            OpCode::Or => return self.choice(code, pc, constants, offset),
            OpCode::Label => {
                let body = block(code, pc + 7, read_u32(code, pc + 3) as usize);
                return self.label(body, constants, offset, Some(constant()));
            }
            OpCode::Hidden => {
                let body = block(code, pc + 5, read_u32(code, pc + 1) as usize);
                return self.label(body, constants, offset, None);
            }
            OpCode::LookAhead => {
                let body = block(code, pc + 5, read_u32(code, pc + 1) as usize);
                return self.look_ahead(body, constants, offset);
            }
            OpCode::NotFollowedBy => {
                let body = block(code, pc + 5, read_u32(code, pc + 1) as usize);
                return self.not_followed_by(body, constants, offset);
            }
            OpCode::Observing => {
                let body = block(code, pc + 7, read_u32(code, pc + 3) as usize);
                return self.observing(body, constants, offset, constant());
            }
        };
        Ok(reply)
    }

    // ========================================================================
    // Primitives
    // ========================================================================

    fn token(&mut self, constants: &Stack<'_>, id: usize) -> Reply {
        let expected: T = constant_value(constants, id);
        match self.state.peek() {
            Some(found) if found == expected => {
                self.stack.push_value(found);
                self.state.next_token();
                Reply::Ok
            }
            found => {
                ErrorFrame::open(&mut self.stack, self.state.cursor())
                    .unexpected(found)
                    .expected_token(constants, id)
                    .close();
                Reply::Err
            }
        }
    }

    /// Match a token sequence; a partial match fails after consuming it
    fn tokens(&mut self, constants: &Stack<'_>, id: usize) -> Reply {
        let expected: &Vec<T> = constant_object(constants, id);
        let remaining = self.state.remaining();
        let start = self.state.cursor();
        let matched = expected
            .iter()
            .zip(remaining)
            .take_while(|(want, got)| want == got)
            .count();

        if matched == expected.len() {
            self.stack.push_value(Span {
                start: start.offset,
                len: matched,
            });
            self.state.next(matched);
            return Reply::Ok;
        }

        let available = remaining.len().min(expected.len());
        let frame = ErrorFrame::open(&mut self.stack, start);
        let frame = if available == 0 {
            frame.unexpected_end_of_input()
        } else {
            frame.unexpected_span(Span {
                start: start.offset,
                len: available,
            })
        };
        frame.expected_tokens(constants, id).close();
        self.state.next(matched);
        Reply::Err
    }

    fn take1(&mut self) -> Reply {
        match self.state.peek() {
            Some(found) => {
                self.stack.push_value(found);
                self.state.next_token();
                Reply::Ok
            }
            None => {
                ErrorFrame::open(&mut self.stack, self.state.cursor())
                    .unexpected_end_of_input()
                    .close();
                Reply::Err
            }
        }
    }

    fn take_n(&mut self, count: usize) -> Reply {
        if self.state.remaining().len() < count {
            ErrorFrame::open(&mut self.stack, self.state.cursor())
                .unexpected_end_of_input()
                .close();
            return Reply::Err;
        }
        self.stack.push_value(Span {
            start: self.state.offset(),
            len: count,
        });
        self.state.next(count);
        Reply::Ok
    }

    fn take_while(&mut self, constants: &Stack<'_>, id: usize, at_least_one: bool) -> Reply {
        let predicate: &Predicate<T> = constant_object(constants, id);
        let count = self
            .state
            .remaining()
            .iter()
            .take_while(|token| predicate(**token))
            .count();

        if at_least_one && count == 0 {
            ErrorFrame::open(&mut self.stack, self.state.cursor())
                .unexpected(self.state.peek())
                .close();
            return Reply::Err;
        }
        self.stack.push_value(Span {
            start: self.state.offset(),
            len: count,
        });
        self.state.next(count);
        Reply::Ok
    }

    fn satisfy(&mut self, constants: &Stack<'_>, id: usize) -> Reply {
        let predicate: &Predicate<T> = constant_object(constants, id);
        match self.state.peek() {
            Some(found) if predicate(found) => self.accept(found),
            found => {
                ErrorFrame::open(&mut self.stack, self.state.cursor())
                    .unexpected(found)
                    .close();
                Reply::Err
            }
        }
    }

    fn one_of(&mut self, constants: &Stack<'_>, id: usize) -> Reply {
        let set: &Vec<T> = constant_object(constants, id);
        match self.state.peek() {
            Some(found) if set.contains(&found) => self.accept(found),
            found => {
                ErrorFrame::open(&mut self.stack, self.state.cursor())
                    .unexpected(found)
                    .expected_each(set)
                    .close();
                Reply::Err
            }
        }
    }

    fn none_of(&mut self, constants: &Stack<'_>, id: usize) -> Reply {
        let set: &Vec<T> = constant_object(constants, id);
        match self.state.peek() {
            Some(found) if !set.contains(&found) => self.accept(found),
            found => {
                ErrorFrame::open(&mut self.stack, self.state.cursor())
                    .unexpected(found)
                    .close();
                Reply::Err
            }
        }
    }

    fn eof(&mut self) -> Reply {
        match self.state.peek() {
            None => {
                self.stack.push_value(());
                Reply::Ok
            }
            found => {
                ErrorFrame::open(&mut self.stack, self.state.cursor())
                    .unexpected(found)
                    .expected_end_of_input()
                    .close();
                Reply::Err
            }
        }
    }

    fn newline(&mut self, constants: &Stack<'_>, label: usize) -> Reply {
        match self.state.peek() {
            Some(found) if found.is_line_break() => {
                self.stack.push_value(found);
                self.state.next_line();
                Reply::Ok
            }
            found => {
                ErrorFrame::open(&mut self.stack, self.state.cursor())
                    .unexpected(found)
                    .expected_label(constants, label)
                    .close();
                Reply::Err
            }
        }
    }

    #[inline]
    fn accept(&mut self, found: T) -> Reply {
        self.stack.push_value(found);
        self.state.next_token();
        Reply::Ok
    }

    // ========================================================================
    // Functions and nested programs
    // ========================================================================

    fn invoke(&mut self, code: &[u8], pc: usize, constants: &Stack<'_>, offset: usize) {
        let dispatch: Dispatch<T> = constant_value(constants, get_constant_id(code, pc + 1, offset));
        self.stack
            .read_from_and_push(constants, get_constant_id(code, pc + 3, offset));
        dispatch(&mut self.stack, self.state.input());
    }

    /// Run the program a bind function just produced
    fn run_nested(&mut self) -> Result<Reply, VmError> {
        let program = match self.stack.take_shared::<ParsecCore>() {
            Some(program) => program,
            None => corrupted("bind function did not produce a program"),
        };
        log_debug!(
            "Entering nested program: {} bytes at offset {}",
            program.instructions.len(),
            self.state.offset()
        );
        self.run_block(program.instructions.as_bytes(), &program.constants, 0)
    }

    // ========================================================================
    // Block combinators
    // ========================================================================

    fn try_block(
        &mut self,
        body: &[u8],
        constants: &Stack<'_>,
        offset: usize,
    ) -> Result<Reply, VmError> {
        let start = self.state.cursor();
        let reply = self.run_block(body, constants, offset)?;
        if reply == Reply::Err && self.state.offset() != start.offset {
            log_debug!(
                "try: rewinding from offset {} to {}",
                self.state.offset(),
                start.offset
            );
            self.state.restore(start);
        }
        Ok(reply)
    }

    fn choice(
        &mut self,
        code: &[u8],
        pc: usize,
        constants: &Stack<'_>,
        offset: usize,
    ) -> Result<Reply, VmError> {
        let lhs_len = read_u32(code, pc + 1) as usize;
        let rhs_len = read_u32(code, pc + 5) as usize;
        let rhs_offset = read_u16(code, pc + 9) as usize;
        let lhs = block(code, pc + 11, lhs_len);
        let rhs = block(code, pc + 11 + lhs_len, rhs_len);

        let start = self.state.offset();
        if self.run_block(lhs, constants, offset)? == Reply::Ok {
            return Ok(Reply::Ok);
        }
        if self.state.offset() != start {
            return Ok(Reply::Err);
        }

        log_debug!("choice: left branch failed at offset {}, trying right", start);
        match self.run_block(rhs, constants, offset + rhs_offset)? {
            Reply::Ok => {
                discard_under(&mut self.stack, 1);
                Ok(Reply::Ok)
            }
            Reply::Err => {
                merge_top_frames(&mut self.stack);
                Ok(Reply::Err)
            }
        }
    }

    /// `label` (with a label constant) or `hidden` (without)
    fn label(
        &mut self,
        body: &[u8],
        constants: &Stack<'_>,
        offset: usize,
        label: Option<usize>,
    ) -> Result<Reply, VmError> {
        let start = self.state.offset();
        let reply = self.run_block(body, constants, offset)?;
        if reply == Reply::Err && self.state.offset() == start {
            strip_expected(&mut self.stack);
            if let Some(label) = label {
                ErrorFrame::reopen(&mut self.stack)
                    .expected_label(constants, label)
                    .close();
            }
        }
        Ok(reply)
    }

    fn look_ahead(
        &mut self,
        body: &[u8],
        constants: &Stack<'_>,
        offset: usize,
    ) -> Result<Reply, VmError> {
        let start = self.state.cursor();
        let reply = self.run_block(body, constants, offset)?;
        if reply == Reply::Ok {
            self.state.restore(start);
        }
        Ok(reply)
    }

    fn not_followed_by(
        &mut self,
        body: &[u8],
        constants: &Stack<'_>,
        offset: usize,
    ) -> Result<Reply, VmError> {
        let start = self.state.cursor();
        match self.run_block(body, constants, offset)? {
            Reply::Ok => {
                self.stack.pop();
                let matched = self.state.offset() - start.offset;
                self.state.restore(start);
                let found = self.state.peek();
                let frame = ErrorFrame::open(&mut self.stack, start);
                let frame = if matched > 1 {
                    frame.unexpected_span(Span {
                        start: start.offset,
                        len: matched,
                    })
                } else {
                    frame.unexpected(found)
                };
                frame.close();
                Ok(Reply::Err)
            }
            Reply::Err => {
                discard(&mut self.stack);
                self.state.restore(start);
                self.stack.push_value(());
                Ok(Reply::Ok)
            }
        }
    }

    fn observing(
        &mut self,
        body: &[u8],
        constants: &Stack<'_>,
        offset: usize,
        dispatcher: usize,
    ) -> Result<Reply, VmError> {
        let observe: Observe<T> = constant_value(constants, dispatcher);
        let reply = self.run_block(body, constants, offset)?;
        observe(&mut self.stack, &self.state, reply == Reply::Ok);
        Ok(Reply::Ok)
    }

    /// Turn the final reply into a result
    fn finish<E: CustomError, A: Value>(mut self, reply: Reply) -> ParserResult<E, T, A> {
        let position = self.state.position();
        let consumed = self.state.offset() > 0;
        let result = match reply {
            Reply::Ok => {
                let value = take_value::<T, A>(&mut self.stack, self.state.input());
                if consumed {
                    ParserResult::ConsumedOk(value, position)
                } else {
                    ParserResult::EmptyOk(value, position)
                }
            }
            Reply::Err => {
                let error = pop_error::<E, T>(&mut self.stack, &self.state);
                if consumed {
                    ParserResult::ConsumedErr(error, position)
                } else {
                    ParserResult::EmptyErr(error, position)
                }
            }
        };
        if !self.stack.is_empty() {
            corrupted("values left on the stack after the parse");
        }
        result
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Run `program` over `input`
///
/// The stack lives in `scratch` when given (moving to the heap if it runs
/// out), otherwise on the heap with `config.stack_size` bytes up front.
///
/// # Errors
///
/// Returns [`VmError`] if the input or the nesting depth exceeds the limits
/// in `config`.
pub(crate) fn execute<E: CustomError, T: Token, A: Value>(
    program: &ParsecCore,
    input: &[T],
    scratch: Option<&mut [MaybeUninit<u8>]>,
    source_name: &str,
    config: &ParserConfig,
) -> Result<ParserResult<E, T, A>, VmError> {
    if config.max_input_size > 0 && input.len() > config.max_input_size {
        return Err(VmError::InputTooLarge {
            input_size: input.len(),
            max_size: config.max_input_size,
        });
    }

    let stack: Stack<'_> = match scratch {
        Some(scratch) => Stack::from_scratch(scratch),
        None => Stack::with_capacity(config.stack_size),
    };
    let stack = stack.with_limit(config.max_stack_size);

    log_debug!(
        "Starting parse: input_len={}, code_len={}, constants={}",
        input.len(),
        program.instructions.len(),
        program.constants.len()
    );

    let mut machine = Machine::new(
        ParseState::new(input, source_name),
        stack,
        config.max_recursion_depth,
    );
    let reply = machine.run_block(
        program.instructions.as_bytes(),
        &program.constants,
        0,
    )?;

    log_debug!(
        "Parse finished: {:?} at offset {}",
        reply,
        machine.state.offset()
    );
    Ok(machine.finish(reply))
}

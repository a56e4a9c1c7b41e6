//! Batch parsing
//!
//! One parse always runs on one thread, but a batch of independent inputs
//! can be spread over a thread pool. Parsers are `Send + Sync`, and every
//! parse allocates its own stack, so the jobs share nothing mutable.
//!
//! # Feature Flag
//!
//! Work is distributed with rayon when the `parallel` feature is enabled:
//!
//! ```toml
//! [dependencies]
//! stackparsec = { version = "0.1", features = ["parallel"] }
//! ```
//!
//! Without it the same functions run the batch sequentially.
//!
//! # Example
//!
//! ```rust
//! use stackparsec::prelude::*;
//! use stackparsec::engine::parallel::parse_batch_parallel;
//! use std::convert::Infallible;
//!
//! let word: Parsec<Infallible, u8, Vec<u8>> = take_while1(|b: u8| b.is_ascii_alphabetic());
//! let inputs: Vec<&[u8]> = vec![&b"alpha"[..], &b"42"[..], &b"beta"[..]];
//!
//! let results = parse_batch_parallel(&word, &inputs);
//! assert_eq!(results.len(), 3);
//! assert!(results[0].is_ok());
//! assert!(results[1].is_failed());
//! ```

use super::parsec::Parsec;
use super::result::ParserResult;
use super::token::{CustomError, Token, Value};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Run `parser` over every input on the rayon pool
///
/// Results are in the same order as `inputs`.
#[cfg(feature = "rayon")]
pub fn parse_batch_parallel<E, T, A>(
    parser: &Parsec<E, T, A>,
    inputs: &[&[T]],
) -> Vec<ParserResult<E, T, A>>
where
    E: CustomError,
    T: Token,
    A: Value,
{
    inputs.par_iter().map(|input| parser.parse(input)).collect()
}

/// Run `parser` over every input in turn
#[cfg(not(feature = "rayon"))]
pub fn parse_batch_parallel<E, T, A>(
    parser: &Parsec<E, T, A>,
    inputs: &[&[T]],
) -> Vec<ParserResult<E, T, A>>
where
    E: CustomError,
    T: Token,
    A: Value,
{
    inputs.iter().map(|input| parser.parse(input)).collect()
}

/// Run `parser` over owned inputs on the rayon pool
#[cfg(feature = "rayon")]
pub fn parse_batch_parallel_owned<E, T, A>(
    parser: &Parsec<E, T, A>,
    inputs: Vec<Vec<T>>,
) -> Vec<ParserResult<E, T, A>>
where
    E: CustomError,
    T: Token,
    A: Value,
{
    inputs
        .into_par_iter()
        .map(|input| parser.parse(&input))
        .collect()
}

/// Run `parser` over owned inputs in turn
#[cfg(not(feature = "rayon"))]
pub fn parse_batch_parallel_owned<E, T, A>(
    parser: &Parsec<E, T, A>,
    inputs: Vec<Vec<T>>,
) -> Vec<ParserResult<E, T, A>>
where
    E: CustomError,
    T: Token,
    A: Value,
{
    inputs.into_iter().map(|input| parser.parse(&input)).collect()
}

/// Thread pool settings for [`parse_batch_with_config`]
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Number of threads to use (None = rayon's global pool)
    pub num_threads: Option<usize>,
    /// Minimum number of inputs handed to one worker at a time
    pub min_chunk_size: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            min_chunk_size: 1,
        }
    }
}

impl ParallelConfig {
    /// The global pool, one input per work item
    pub fn new() -> Self {
        Self::default()
    }

    /// Run on a dedicated pool of `n` threads
    pub fn with_num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    /// Hand inputs to workers at least `size` at a time
    pub fn with_min_chunk_size(mut self, size: usize) -> Self {
        self.min_chunk_size = size;
        self
    }
}

/// Parse multiple inputs under `config`
///
/// A dedicated pool is built when `num_threads` is set; if that fails the
/// global pool is used instead.
#[cfg(feature = "rayon")]
pub fn parse_batch_with_config<E, T, A>(
    parser: &Parsec<E, T, A>,
    inputs: &[&[T]],
    config: &ParallelConfig,
) -> Vec<ParserResult<E, T, A>>
where
    E: CustomError,
    T: Token,
    A: Value,
{
    let min_len = config.min_chunk_size.max(1);
    let run = || -> Vec<ParserResult<E, T, A>> {
        inputs
            .par_iter()
            .with_min_len(min_len)
            .map(|input| parser.parse(input))
            .collect()
    };
    let pool = config
        .num_threads
        .and_then(|n| rayon::ThreadPoolBuilder::new().num_threads(n).build().ok());
    match pool {
        Some(pool) => pool.install(run),
        None => run(),
    }
}

/// Parse multiple inputs sequentially (fallback); `config` is ignored
#[cfg(not(feature = "rayon"))]
pub fn parse_batch_with_config<E, T, A>(
    parser: &Parsec<E, T, A>,
    inputs: &[&[T]],
    _config: &ParallelConfig,
) -> Vec<ParserResult<E, T, A>>
where
    E: CustomError,
    T: Token,
    A: Value,
{
    parse_batch_parallel(parser, inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::parsec::{eof, tokens};
    use std::convert::Infallible;

    fn hello() -> Parsec<Infallible, u8, Vec<u8>> {
        let word: Parsec<Infallible, u8, Vec<u8>> = tokens(b"hello".iter().copied());
        word.select_many(|_| eof(), |word, _| word)
    }

    #[test]
    fn test_parse_batch() {
        let parser = hello();
        let inputs: Vec<&[u8]> = vec![&b"hello"[..]; 3];
        let results = parse_batch_parallel(&parser, &inputs);

        assert_eq!(results.len(), 3);
        for result in results {
            assert_eq!(result.into_value(), Some(b"hello".to_vec()));
        }
    }

    #[test]
    fn test_parse_batch_with_failures() {
        let parser = hello();
        let inputs: Vec<&[u8]> = vec![&b"hello"[..], &b"help"[..], &b"hello!"[..]];
        let results = parse_batch_parallel(&parser, &inputs);

        assert!(results[0].is_ok());
        assert!(results[1].is_failed() && results[1].is_consumed());
        assert!(results[2].is_failed());
    }

    #[test]
    fn test_parse_batch_owned_keeps_order() {
        let parser: Parsec<Infallible, u8, Vec<u8>> = tokens(b"ab".iter().copied());
        let inputs = vec![b"ab".to_vec(), b"xx".to_vec(), b"abab".to_vec()];
        let results = parse_batch_parallel_owned(&parser, inputs);
        let oks: Vec<bool> = results.iter().map(|r| r.is_ok()).collect();
        assert_eq!(oks, vec![true, false, true]);
    }

    #[test]
    fn test_parse_batch_with_config() {
        let parser = hello();
        let inputs: Vec<&[u8]> = vec![&b"hello"[..]; 16];
        let config = ParallelConfig::new()
            .with_num_threads(2)
            .with_min_chunk_size(4);
        let results = parse_batch_with_config(&parser, &inputs, &config);
        assert_eq!(results.len(), 16);
        assert!(results.iter().all(|r| r.is_ok()));
    }
}

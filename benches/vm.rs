//! Benchmarks for the stack machine
//!
//! Three workloads are benchmarked:
//! 1. Primitives - token runs and predicate scans with no combinator overhead
//! 2. Key/value lines - sequencing through `select_many` and `map`
//! 3. Expressions - recursive grammar with choice, `try_` and `lazy`
//!
//! Each workload also runs with caller-supplied scratch memory.
//!
//! Run with: cargo bench --bench vm

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use stackparsec::prelude::*;
use std::convert::Infallible;
use std::mem::MaybeUninit;

type P<A> = Parsec<Infallible, u8, A>;

// ============================================================================
// Grammars
// ============================================================================

fn then<A: Value, B: Value>(first: P<A>, second: P<B>) -> P<B> {
    first.select_many(move |_| second.clone(), |_, b| b)
}

fn skip<A: Value, B: Value>(first: P<A>, second: P<B>) -> P<A> {
    first.select_many(move |_| second.clone(), |a, _| a)
}

fn spaces() -> P<Vec<u8>> {
    take_while(|b: u8| b == b' ')
}

fn number() -> P<i64> {
    let digits: P<Vec<u8>> = take_while1(|b: u8| b.is_ascii_digit());
    let value = digits.map(|ds: Vec<u8>| {
        ds.iter()
            .fold(0i64, |n, d| n * 10 + i64::from(d - b'0'))
    });
    skip(value.label("number"), spaces())
}

fn symbol(c: u8) -> P<u8> {
    skip(token(c), spaces())
}

/// `key = value\n`, summing the values
fn key_values(lines: usize) -> P<i64> {
    let key: P<Vec<u8>> = take_while1(|b: u8| b.is_ascii_alphabetic());
    let line = then(skip(skip(key, spaces()), symbol(b'=')), skip(number(), newline()));
    (1..lines).fold(line.clone(), |acc, _| {
        let line = line.clone();
        acc.select_many(move |_| line.clone(), |a, b| a + b)
    })
}

/// expr = term ('+' expr)? ; term = number | '(' expr ')'
fn expr() -> P<i64> {
    let term = number() | then(symbol(b'('), skip(lazy(expr), symbol(b')')));
    let tail = try_(then(symbol(b'+'), lazy(expr))) | pure(0);
    term.select_many(move |_| tail.clone(), |a, b| a + b)
}

// ============================================================================
// Inputs
// ============================================================================

fn key_value_input(lines: usize) -> Vec<u8> {
    (0..lines)
        .map(|i| format!("key{} = {}\n", "x".repeat(i % 5), i))
        .collect::<String>()
        .into_bytes()
}

fn expression_input(terms: usize) -> Vec<u8> {
    let mut text = String::new();
    for i in 0..terms {
        if i > 0 {
            text.push_str(" + ");
        }
        if i % 3 == 0 {
            text.push_str(&format!("({} + 1)", i));
        } else {
            text.push_str(&i.to_string());
        }
    }
    text.into_bytes()
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives");
    let input: Vec<u8> = b"abcdefgh".repeat(1024);
    group.throughput(Throughput::Bytes(input.len() as u64));

    let scan: P<Vec<u8>> = take_while(|b: u8| b.is_ascii_lowercase());
    group.bench_function("take_while", |b| {
        b.iter(|| black_box(scan.parse(black_box(&input))))
    });

    let literal: P<Vec<u8>> = tokens(input.iter().copied());
    group.bench_function("tokens", |b| {
        b.iter(|| black_box(literal.parse(black_box(&input))))
    });

    group.finish();
}

fn bench_key_values(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_values");

    for lines in [10usize, 100] {
        let parser = key_values(lines);
        let input = key_value_input(lines);
        group.throughput(Throughput::Bytes(input.len() as u64));

        group.bench_with_input(BenchmarkId::new("heap", lines), &input, |b, input| {
            b.iter(|| black_box(parser.parse(input)))
        });

        group.bench_with_input(BenchmarkId::new("scratch", lines), &input, |b, input| {
            let mut scratch = vec![MaybeUninit::<u8>::uninit(); 16 * 1024];
            b.iter(|| black_box(parser.parse_in(input, &mut scratch, "")))
        });
    }

    group.finish();
}

fn bench_expressions(c: &mut Criterion) {
    let mut group = c.benchmark_group("expressions");
    let parser = expr();

    for terms in [10usize, 50] {
        let input = expression_input(terms);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(terms), &input, |b, input| {
            b.iter(|| black_box(parser.parse(input)))
        });
    }

    group.finish();
}

fn bench_build(c: &mut Criterion) {
    c.bench_function("build_expression_grammar", |b| b.iter(|| black_box(expr())));
}

criterion_group!(
    benches,
    bench_primitives,
    bench_key_values,
    bench_expressions,
    bench_build
);
criterion_main!(benches);

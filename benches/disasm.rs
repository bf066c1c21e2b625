//! Benchmarks for instruction decoding and body round trips.
//!
//! All inputs are synthetic streams built in memory so the numbers track the
//! decoder and emitter themselves rather than file I/O:
//! - A flat walk with [`Disassembler`]
//! - Full relocation through [`MethodBody::from_bytes`]
//! - Decode plus re-encode through [`MethodBody::to_bytes`]
//! - Signature blob parsing

extern crate cilweave;

use cilweave::prelude::*;
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

/// Builds a stream of `blocks` identical basic blocks, each ending in a short
/// backward branch to its own head, followed by a single `ret`.
fn counting_loop(blocks: usize) -> Vec<u8> {
    let block: [u8; 13] = [
        0x02, // ldarg.0
        0x1F, 0x0A, // ldc.i4.s 10
        0x58, // add
        0x0A, // stloc.0
        0x06, // ldloc.0
        0x20, 0x64, 0x00, 0x00, 0x00, // ldc.i4 100
        0x32, 0xF3, // blt.s -13 (block head)
    ];

    let mut code = Vec::with_capacity(blocks * block.len() + 1);
    for _ in 0..blocks {
        code.extend_from_slice(&block);
    }
    code.push(0x2A); // ret
    code
}

fn loop_signature() -> MethodSignature {
    MethodSignature {
        return_type: SignatureParameter::plain(TypeSignature::Void),
        params: vec![SignatureParameter::plain(TypeSignature::I4)],
        ..MethodSignature::default()
    }
}

/// Benchmark a flat cursor walk over a large instruction stream.
///
/// No relocation and no label arena, just opcode lookup and operand reads.
fn bench_disassemble_stream(c: &mut Criterion) {
    let code = counting_loop(4096);

    let mut group = c.benchmark_group("disassemble_stream");
    group.throughput(Throughput::Bytes(code.len() as u64));
    group.bench_function("walk", |b| {
        b.iter(|| {
            let mut disasm = Disassembler::new(black_box(&code));
            let mut count = 0usize;
            while disasm.move_next().unwrap() {
                count += 1;
            }
            black_box(count)
        });
    });
    group.finish();
}

/// Benchmark decoding a stream into an editable body.
///
/// Covers both relocation passes: byte offsets accumulate front to back, then
/// every branch displacement is resolved to an index label.
fn bench_body_decode(c: &mut Criterion) {
    let code = counting_loop(4096);
    let signature = loop_signature();
    let locals = vec![SignatureParameter::plain(TypeSignature::I4)];

    let mut group = c.benchmark_group("body_decode");
    group.throughput(Throughput::Bytes(code.len() as u64));
    group.bench_function("from_bytes", |b| {
        b.iter(|| {
            let body = MethodBody::from_bytes(
                black_box(&code),
                signature.clone(),
                locals.clone(),
            )
            .unwrap();
            black_box(body)
        });
    });
    group.finish();
}

/// Benchmark a full decode and re-encode cycle.
///
/// The decoded body is normalized to long branch forms, so the emitted stream
/// is larger than the input; throughput is measured against the input bytes.
fn bench_body_round_trip(c: &mut Criterion) {
    let code = counting_loop(1024);
    let signature = loop_signature();
    let locals = vec![SignatureParameter::plain(TypeSignature::I4)];
    let resolver = NullResolver;

    let mut group = c.benchmark_group("body_round_trip");
    group.throughput(Throughput::Bytes(code.len() as u64));
    group.bench_function("from_bytes_to_bytes", |b| {
        b.iter(|| {
            let body = MethodBody::from_bytes(
                black_box(&code),
                signature.clone(),
                locals.clone(),
            )
            .unwrap();
            let bytes = body.to_bytes(&resolver).unwrap();
            black_box(bytes)
        });
    });
    group.finish();
}

/// Benchmark parsing a generic instance method signature blob.
fn bench_signature_parse(c: &mut Criterion) {
    // instance string F(int32, class ref, !0[])
    let blob: &[u8] = &[
        0x20, 0x03, 0x0E, 0x08, 0x12, 0x08, 0x1D, 0x13, 0x00,
    ];

    let mut group = c.benchmark_group("signature_parse");
    group.throughput(Throughput::Bytes(blob.len() as u64));
    group.bench_function("method", |b| {
        b.iter(|| {
            let signature = SignatureParser::new(black_box(blob)).parse().unwrap();
            black_box(signature)
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_disassemble_stream,
    bench_body_decode,
    bench_body_round_trip,
    bench_signature_parse,
);
criterion_main!(benches);

use std::io::Read;

use criterion::{criterion_group, criterion_main, Criterion};
use git_hash::hasher::Hasher;
use git_packfile::{Bitmap, EwahError, HashfileReader};

const BITS: u32 = 1 << 20;

/// A bitmap alternating 32 clean words with 32 dirty words.
fn sample_ewah(seed: u64) -> Vec<u8> {
    let total = (BITS / 64) as u64;
    let mut payload = Vec::new();
    let mut written = 0u64;
    let mut x = seed;
    while written < total {
        let clean = 32.min(total - written);
        let dirty = 32.min(total - written - clean);
        payload.push(((written / 64) & 1) | (clean << 1) | (dirty << 33));
        for _ in 0..dirty {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            payload.push(x);
        }
        written += clean + dirty;
    }

    let mut out = Vec::new();
    out.extend_from_slice(&BITS.to_be_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    for w in payload {
        out.extend_from_slice(&w.to_be_bytes());
    }
    out.extend_from_slice(&0u32.to_be_bytes());
    out
}

fn bench_decode(c: &mut Criterion) {
    let data = sample_ewah(0x9e37_79b9_7f4a_7c15);

    c.bench_function("ewah_decode_1m_bits", |b| {
        b.iter(|| {
            let (mut bitmap, _) = Bitmap::parse(&data).unwrap();
            bitmap.materialize().unwrap();
            bitmap
        });
    });
}

fn bench_scan(c: &mut Criterion) {
    let (mut bitmap, _) = Bitmap::parse(&sample_ewah(7)).unwrap();
    bitmap.materialize().unwrap();

    c.bench_function("ewah_scan_1m_bits", |b| {
        b.iter(|| {
            let mut n = 0u64;
            bitmap
                .scan(|bit| {
                    n += bit as u64;
                    Ok::<_, EwahError>(())
                })
                .unwrap();
            n
        });
    });
}

fn bench_xor(c: &mut Criterion) {
    let (base, _) = Bitmap::parse(&sample_ewah(11)).unwrap();
    let (delta, _) = Bitmap::parse(&sample_ewah(13)).unwrap();

    c.bench_function("ewah_xor_1m_bits", |b| {
        b.iter(|| {
            let mut resolved = delta.clone();
            resolved.xor(&base).unwrap();
            resolved
        });
    });
}

fn bench_hashfile_read(c: &mut Criterion) {
    let mut data = vec![0x5au8; 4 << 20];
    let digest = Hasher::digest(&data).unwrap();
    data.extend_from_slice(digest.as_bytes());

    c.bench_function("hashfile_read_4mib", |b| {
        b.iter(|| {
            let mut reader = HashfileReader::new(&data[..]);
            let mut buf = [0u8; 16 * 1024];
            while reader.read(&mut buf).unwrap() != 0 {}
            reader.is_verified()
        });
    });
}

criterion_group!(
    benches,
    bench_decode,
    bench_scan,
    bench_xor,
    bench_hashfile_read,
);
criterion_main!(benches);

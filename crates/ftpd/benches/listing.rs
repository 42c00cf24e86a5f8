//! Performance benchmarks for GET bodies.
//!
//! These benchmarks measure the hot paths of a browsing session:
//! - Folder listing rendering
//! - The outbound transfer loop at common packet sizes

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ftpd::files::listing::render;
use ftpd::files::transfer::send_listing;
use ftpd::files::{EntryKind, FileEntry};
use ftpd::obex::{HeaderSet, MemoryOperation};
use tokio_util::sync::CancellationToken;

fn entries(count: usize) -> Vec<FileEntry> {
    let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    (0..count)
        .map(|i| {
            let folder = i % 10 == 0;
            let name = if folder {
                format!("album {i}")
            } else {
                format!("IMG_{i:05}.jpg")
            };
            FileEntry {
                path: PathBuf::from("/srv/shared").join(&name),
                name,
                kind: if folder { EntryKind::Folder } else { EntryKind::File },
                size: if folder { 0 } else { 2_500_000 + i as u64 },
                modified,
                readable: true,
                writable: i % 3 != 0,
            }
        })
        .collect()
}

/// Benchmark listing rendering for typical folder sizes.
fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("listing_render");

    for count in [10usize, 100, 1000] {
        let entries = entries(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &entries, |b, entries| {
            b.iter(|| render(black_box(entries)));
        });
    }

    group.finish();
}

/// Benchmark pushing a rendered listing through the outbound loop.
fn bench_send_listing(c: &mut Criterion) {
    let mut group = c.benchmark_group("send_listing");
    let document = render(&entries(1000));
    group.throughput(Throughput::Bytes(document.len() as u64));

    for packet in [255usize, 4096, 65535] {
        group.bench_with_input(BenchmarkId::from_parameter(packet), &packet, |b, &packet| {
            b.iter(|| {
                let mut op = MemoryOperation::new(HeaderSet::new()).with_max_packet_size(packet);
                send_listing(
                    &mut op,
                    Path::new("/srv/shared"),
                    black_box(document.as_bytes()),
                    CancellationToken::new(),
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_render, bench_send_listing);
criterion_main!(benches);

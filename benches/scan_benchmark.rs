use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rom_asset_scanner::catalog::CatalogIndex;
use rom_asset_scanner::codec::{decode_indexed, decompress};
use rom_asset_scanner::config::ScanConfig;
use rom_asset_scanner::scan::{find_gaps, BlockScanner, NullObserver, SkipRegions};
use rom_asset_scanner::{Pipeline, RomImage};

const ROM_SIZE: usize = 4 * 1024 * 1024;

fn stored_container(payload: &[u8]) -> Vec<u8> {
    let mut stream = vec![0x68, 0xDE];
    let chunks: Vec<&[u8]> = payload.chunks(0xFFFF).collect();
    for (i, chunk) in chunks.iter().enumerate() {
        stream.push(u8::from(i + 1 == chunks.len()));
        let len = chunk.len() as u16;
        stream.extend_from_slice(&len.to_le_bytes());
        stream.extend_from_slice(&(!len).to_le_bytes());
        stream.extend_from_slice(chunk);
    }
    let (mut a, mut b) = (1u32, 0u32);
    for &byte in payload {
        a = (a + byte as u32) % 65521;
        b = (b + a) % 65521;
    }
    stream.extend_from_slice(&((b << 16) | a).to_be_bytes());
    stream
}

/// Image CI8 64×64 à une palette
fn ci8_image() -> Vec<u8> {
    let mut data = Vec::new();
    for field in [2u32, 64, 64, 256, 1] {
        data.extend_from_slice(&field.to_be_bytes());
    }
    data.extend((0..64 * 64).map(|i| (i % 251) as u8));
    for i in 0..256u16 {
        data.extend_from_slice(&(i.wrapping_mul(0x0841) | 1).to_be_bytes());
    }
    data
}

/// ROM pseudo-aléatoire avec un bloc compressé tous les 64 Ko
fn synthetic_rom() -> RomImage {
    let mut state = 0x1234_5678u32;
    let mut data: Vec<u8> = (0..ROM_SIZE)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        })
        .collect();

    let image = ci8_image();
    let mut block = stored_container(&image);
    block.extend_from_slice(&[0x00, 0x10, 0x00, 0x00]);
    block.extend_from_slice(&(image.len() as u32).to_be_bytes());

    for offset in (0..ROM_SIZE - block.len()).step_by(0x10000) {
        data[offset..offset + block.len()].copy_from_slice(&block);
    }
    RomImage::new(data)
}

fn benchmark_block_scan(c: &mut Criterion) {
    let rom = synthetic_rom();
    let index = CatalogIndex::empty();
    let skip = SkipRegions::default();

    c.bench_function("block_scan_4mb", |b| {
        b.iter(|| {
            BlockScanner::new(black_box(&rom), &index, &skip)
                .with_window(0x20000)
                .scan(&NullObserver)
        })
    });

    let config = ScanConfig {
        search_window: 0x20000,
        skip_regions: Vec::new(),
        ..Default::default()
    };
    c.bench_function("full_pipeline_4mb", |b| {
        b.iter(|| Pipeline::new(black_box(&rom), None, &config).map(|p| p.run(&NullObserver)))
    });
}

fn benchmark_gaps(c: &mut Criterion) {
    let spans: Vec<(u32, u32)> = (0..10_000u32).map(|i| (i * 400, i * 400 + 250)).collect();

    c.bench_function("find_gaps_10k", |b| {
        b.iter(|| find_gaps(black_box(spans.iter().copied()), 4_000_000))
    });
}

fn benchmark_decode(c: &mut Criterion) {
    let image = ci8_image();
    let stream = stored_container(&image);

    c.bench_function("decompress_ci8_64x64", |b| {
        b.iter(|| decompress(black_box(&stream)))
    });

    c.bench_function("decode_ci8_64x64", |b| {
        b.iter(|| decode_indexed(black_box(&image)))
    });
}

criterion_group!(benches, benchmark_block_scan, benchmark_gaps, benchmark_decode);
criterion_main!(benches);

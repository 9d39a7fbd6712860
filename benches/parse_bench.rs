use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use masterfile::archive::{Archive, ReadOptions};
use masterfile::spatial::{block_label, sub_block_label};
use masterfile::{tag, FormatRevision};
use std::io::Cursor;

fn field(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = tag.to_vec();
    v.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    v.extend_from_slice(payload);
    v
}

fn record(tag: &[u8; 4], form_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut v = tag.to_vec();
    v.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    v.extend_from_slice(&0u32.to_le_bytes());
    v.extend_from_slice(&form_id.to_le_bytes());
    v.extend_from_slice(&0u32.to_le_bytes());
    v.extend_from_slice(payload);
    v
}

fn group(label: u32, kind: i32, body: &[u8]) -> Vec<u8> {
    let mut v = b"GRUP".to_vec();
    v.extend_from_slice(&((body.len() + 20) as u32).to_le_bytes());
    v.extend_from_slice(&label.to_le_bytes());
    v.extend_from_slice(&kind.to_le_bytes());
    v.extend_from_slice(&0u32.to_le_bytes());
    v.extend_from_slice(body);
    v
}

fn root() -> Vec<u8> {
    let mut hedr = 1.0f32.to_le_bytes().to_vec();
    hedr.extend_from_slice(&[0u8; 8]);
    record(b"TES4", 0, &field(b"HEDR", &hedr))
}

/// 10 000 globals in one top-level group.
fn globals_file() -> Vec<u8> {
    let mut body = Vec::new();
    for i in 0..10_000u32 {
        let mut payload = field(b"EDID", format!("gGlobal{i}\0").as_bytes());
        payload.extend(field(b"FNAM", b"f"));
        payload.extend(field(b"FLTV", &(i as f32).to_le_bytes()));
        body.extend(record(b"GLOB", 0x1000 + i, &payload));
    }
    let mut file = root();
    file.extend(group(tag::GLOB.as_label(), 0, &body));
    file
}

/// A 64×64 cell worldspace.
fn world_file() -> Vec<u8> {
    use std::collections::BTreeMap;
    let mut blocks: BTreeMap<u32, BTreeMap<u32, Vec<u8>>> = BTreeMap::new();
    let mut id = 0x1_0000u32;
    for x in -32i16..32 {
        for y in -32i16..32 {
            let mut xclc = (x as i32).to_le_bytes().to_vec();
            xclc.extend_from_slice(&(y as i32).to_le_bytes());
            let mut payload = field(b"DATA", &0u16.to_le_bytes());
            payload.extend(field(b"XCLC", &xclc));
            let sub = blocks.entry(block_label(x, y)).or_default().entry(sub_block_label(x, y)).or_default();
            sub.extend(record(b"CELL", id, &payload));
            let land = record(b"LAND", id + 1, &field(b"DATA", &1i32.to_le_bytes()));
            sub.extend(group(id, 6, &group(id, 9, &land)));
            id += 2;
        }
    }
    let mut world = Vec::new();
    for (b, subs) in blocks {
        let body: Vec<u8> = subs.into_iter().flat_map(|(s, content)| group(s, 5, &content)).collect();
        world.extend(group(b, 4, &body));
    }
    let mut top = record(b"WRLD", 0x3C, &field(b"EDID", b"Bench\0"));
    top.extend(group(0x3C, 1, &world));
    let mut file = root();
    file.extend(group(tag::WRLD.as_label(), 0, &top));
    file
}

fn bench_open(c: &mut Criterion) {
    let data = world_file();
    c.bench_function("open_world_framing", |b| {
        b.iter(|| Archive::from_reader(Cursor::new(black_box(&data[..])), ReadOptions::default()).unwrap())
    });
}

fn bench_load_group(c: &mut Criterion) {
    let data = globals_file();
    c.bench_function("load_10k_globals", |b| {
        b.iter_batched(
            || Archive::from_reader(Cursor::new(data.clone()), ReadOptions::default()).unwrap(),
            |ar| ar.records_of(tag::GLOB).unwrap().len(),
            BatchSize::SmallInput,
        )
    });
}

fn bench_ensure_cell(c: &mut Criterion) {
    let data = world_file();
    c.bench_function("ensure_cell_cold", |b| {
        b.iter_batched(
            || Archive::from_reader(Cursor::new(data.clone()), ReadOptions::default()).unwrap(),
            |ar| ar.ensure_cell(black_box(10), black_box(-7), 0).unwrap(),
            BatchSize::SmallInput,
        )
    });

    let warm = Archive::from_reader(Cursor::new(data.clone()), ReadOptions::default()).unwrap();
    warm.ensure_cell(10, -7, 0).unwrap();
    c.bench_function("ensure_cell_warm", |b| b.iter(|| warm.ensure_cell(black_box(10), black_box(-7), 0).unwrap()));
}

fn bench_scan(c: &mut Criterion) {
    let data = world_file();
    c.bench_function("scan_world", |b| {
        b.iter(|| masterfile::scan::scan(Cursor::new(black_box(&data[..])), FormatRevision::Standard).unwrap())
    });
}

criterion_group!(benches, bench_open, bench_load_group, bench_ensure_cell, bench_scan);
criterion_main!(benches);

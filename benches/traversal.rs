//! Benchmarks full-tree traversal and value resolution against a
//! synthetic in-memory hive, since no real `.hive` fixture ships with
//! this crate.

use criterion::{criterion_group, criterion_main, Criterion};
use regf_core::Hive;

const CP: &'static encoding_rs::Encoding = encoding_rs::WINDOWS_1252;
const OFFSET_NONE: u32 = 0xFFFF_FFFF;
const ROOT_KEY_FLAG: u16 = 0x0004;

fn header_bytes(root_offset: u32, bins_size: u32) -> Vec<u8> {
    let mut data = vec![0u8; 4096];
    data[0..4].copy_from_slice(b"regf");
    data[0x14..0x18].copy_from_slice(&1u32.to_le_bytes());
    data[0x18..0x1C].copy_from_slice(&5u32.to_le_bytes());
    data[0x24..0x28].copy_from_slice(&root_offset.to_le_bytes());
    data[0x28..0x2C].copy_from_slice(&bins_size.to_le_bytes());
    let checksum = regf_core::header::calculate_checksum(&data);
    data[0x1FC..0x200].copy_from_slice(&checksum.to_le_bytes());
    data
}

fn put_cell(bin: &mut [u8], offset: u32, payload: &[u8]) {
    let start = offset as usize;
    let size: i32 = -(4 + payload.len() as i32);
    bin[start..start + 4].copy_from_slice(&size.to_le_bytes());
    bin[start + 4..start + 4 + payload.len()].copy_from_slice(payload);
}

fn nk_bytes(
    name: &[u8],
    flags: u16,
    subkey_count: u32,
    subkey_list_offset: u32,
    value_count: u32,
    value_list_offset: u32,
) -> Vec<u8> {
    let mut data = vec![0u8; 0x4C + name.len()];
    data[0..2].copy_from_slice(b"nk");
    data[0x02..0x04].copy_from_slice(&flags.to_le_bytes());
    data[0x10..0x14].copy_from_slice(&OFFSET_NONE.to_le_bytes());
    data[0x14..0x18].copy_from_slice(&subkey_count.to_le_bytes());
    data[0x1C..0x20].copy_from_slice(&subkey_list_offset.to_le_bytes());
    data[0x24..0x28].copy_from_slice(&value_count.to_le_bytes());
    data[0x28..0x2C].copy_from_slice(&value_list_offset.to_le_bytes());
    data[0x2C..0x30].copy_from_slice(&OFFSET_NONE.to_le_bytes());
    data[0x30..0x34].copy_from_slice(&OFFSET_NONE.to_le_bytes());
    data[0x48..0x4A].copy_from_slice(&(name.len() as u16).to_le_bytes());
    data[0x4C..].copy_from_slice(name);
    data
}

fn li_bytes(offsets: &[u32]) -> Vec<u8> {
    let mut data = vec![b'l', b'i'];
    data.extend_from_slice(&(offsets.len() as u16).to_le_bytes());
    for o in offsets {
        data.extend_from_slice(&o.to_le_bytes());
    }
    data
}

fn vk_bytes(name: &[u8], value_type: u32, data_size_raw: i32, data_offset: u32) -> Vec<u8> {
    let mut data = vec![0u8; 0x14 + name.len()];
    data[0..2].copy_from_slice(b"vk");
    data[0x02..0x04].copy_from_slice(&(name.len() as u16).to_le_bytes());
    data[0x04..0x08].copy_from_slice(&data_size_raw.to_le_bytes());
    data[0x08..0x0C].copy_from_slice(&data_offset.to_le_bytes());
    data[0x0C..0x10].copy_from_slice(&value_type.to_le_bytes());
    data[0x10..0x12].copy_from_slice(&1u16.to_le_bytes());
    data[0x14..].copy_from_slice(name);
    data
}

/// Builds a hive with a root key, `width` children each holding `width`
/// grandchildren, and one inline DWORD value per grandchild.
fn build_wide_hive(width: u32) -> Vec<u8> {
    let mut bin = vec![0u8; 0x40000];
    bin[0..4].copy_from_slice(b"hbin");
    let bin_len = bin.len() as u32;
    bin[0x08..0x0C].copy_from_slice(&bin_len.to_le_bytes());

    let mut offset = 0x20u32;
    let mut alloc = |size: u32| -> u32 {
        let here = offset;
        offset += size;
        here
    };

    let mut child_offsets = Vec::with_capacity(width as usize);
    for c in 0..width {
        let name = format!("Child{c}");
        let mut grandchild_offsets = Vec::with_capacity(width as usize);
        for g in 0..width {
            let vname = b"On";
            let vk = vk_bytes(vname, 4, (4u32 | 0x8000_0000) as i32, 1);
            let vk_off = alloc(4 + vk.len() as u32);
            put_cell(&mut bin, vk_off, &vk);

            let value_list = vk_off.to_le_bytes().to_vec();
            let vl_off = alloc(4 + value_list.len() as u32);
            put_cell(&mut bin, vl_off, &value_list);

            let gname = format!("Grandchild{c}_{g}").into_bytes();
            let nk = nk_bytes(&gname, 0, 0, OFFSET_NONE, 1, vl_off);
            let nk_off = alloc(4 + nk.len() as u32);
            put_cell(&mut bin, nk_off, &nk);
            grandchild_offsets.push(nk_off);
        }

        let list = li_bytes(&grandchild_offsets);
        let list_off = alloc(4 + list.len() as u32);
        put_cell(&mut bin, list_off, &list);

        let nk = nk_bytes(name.as_bytes(), 0, width, list_off, 0, OFFSET_NONE);
        let nk_off = alloc(4 + nk.len() as u32);
        put_cell(&mut bin, nk_off, &nk);
        child_offsets.push(nk_off);
    }

    let list = li_bytes(&child_offsets);
    let list_off = alloc(4 + list.len() as u32);
    put_cell(&mut bin, list_off, &list);

    let root = nk_bytes(b"Root", ROOT_KEY_FLAG, width, list_off, 0, OFFSET_NONE);
    let root_off = alloc(4 + root.len() as u32);
    put_cell(&mut bin, root_off, &root);

    let mut data = header_bytes(root_off, bin.len() as u32);
    data.extend_from_slice(&bin);
    data
}

fn walk(hive: &regf_core::Hive<regf_core::SliceSource>) -> u64 {
    let mut count = 0u64;
    let root = hive.root_key().unwrap();
    for child in root.sub_keys() {
        for grandchild in child.sub_keys() {
            if let Ok(Some(value)) = grandchild.value_by_name("On") {
                if let Ok(data) = value.read_data() {
                    count += u64::from(data.as_u32().unwrap_or(0));
                }
            }
            count += 1;
        }
    }
    count
}

fn bench_traversal(c: &mut Criterion) {
    let small = build_wide_hive(4);
    let large = build_wide_hive(16);

    let mut group = c.benchmark_group("hive traversal");
    group
        .sample_size(50)
        .bench_function("walk 4x4 tree", |b| {
            b.iter(|| {
                let hive = Hive::from_bytes(small.clone(), CP).unwrap();
                walk(&hive)
            })
        })
        .bench_function("walk 16x16 tree", |b| {
            b.iter(|| {
                let hive = Hive::from_bytes(large.clone(), CP).unwrap();
                walk(&hive)
            })
        });
    group.finish();
}

criterion_group!(benches, bench_traversal);
criterion_main!(benches);

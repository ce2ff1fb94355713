use std::io::Cursor;
use std::path::PathBuf;

use hidra::image::{self, read_image, write_image, ImageError};
use hidra::isa::neander::{MAGIC, MEM_SIZE, PRESETS};
use hidra::LinearMemory;
use pretty_assertions::assert_eq;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("hidra_{}_{name}", std::process::id()))
}

fn sample_memory() -> LinearMemory {
    let mut mem = LinearMemory::with_presets(MEM_SIZE, PRESETS);
    for (i, cell) in mem.mem.iter_mut().enumerate().take(40) {
        *cell = (i * 7) as u8;
    }
    mem.mem[255] = 0xEE;
    mem
}

#[test]
fn save_then_load_round_trips() {
    let path = temp_path("roundtrip.mem");
    let mem = sample_memory();
    image::save(&path, &MAGIC, &mem).unwrap();

    let mut back = LinearMemory::new(MEM_SIZE);
    let cells = image::load(&path, &MAGIC, &mut back).unwrap();
    assert_eq!(cells, MEM_SIZE);
    assert_eq!(back, mem);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn on_disk_layout_is_magic_then_padded_cells() {
    let mut mem = LinearMemory::new(MEM_SIZE);
    mem.mem[0] = 0x20;
    mem.mem[1] = 0x80;
    let mut buf = Vec::new();
    write_image(&mut buf, &MAGIC, &mem).unwrap();

    assert_eq!(buf.len(), 4 + 2 * MEM_SIZE);
    assert_eq!(&buf[..8], &[0x03, b'N', b'D', b'R', 0x20, 0x00, 0x80, 0x00]);
    assert!(buf[4..].iter().skip(1).step_by(2).all(|&pad| pad == 0));
}

#[test]
fn foreign_magic_leaves_memory_untouched() {
    let path = temp_path("foreign.mem");
    std::fs::write(&path, [0x03, b'A', b'H', b'M', 0x11, 0x00]).unwrap();

    let mut mem = sample_memory();
    let before = mem.clone();
    let err = image::load(&path, &MAGIC, &mut mem).unwrap_err();
    match err {
        ImageError::FileFormatMismatch { expected, found } => {
            assert_eq!(expected, MAGIC);
            assert_eq!(found, vec![0x03, b'A', b'H', b'M']);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(mem, before);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn truncated_header_is_a_mismatch() {
    let err = read_image(&mut Cursor::new(vec![0x03, b'N']), &MAGIC, MEM_SIZE).unwrap_err();
    assert!(matches!(err, ImageError::FileFormatMismatch { .. }));
}

#[test]
fn short_image_fills_from_address_zero() {
    let bytes = vec![0x03, b'N', b'D', b'R', 1, 0, 2, 0, 3];
    let cells = read_image(&mut Cursor::new(bytes), &MAGIC, MEM_SIZE).unwrap();
    assert_eq!(cells, vec![1, 2, 3]);
}

#[test]
fn oversized_image_is_rejected() {
    let mut bytes = MAGIC.to_vec();
    bytes.extend(std::iter::repeat([9u8, 0]).take(MEM_SIZE + 1).flatten());
    let path = temp_path("big.mem");
    std::fs::write(&path, &bytes).unwrap();

    let mut mem = sample_memory();
    let before = mem.clone();
    let err = image::load(&path, &MAGIC, &mut mem).unwrap_err();
    assert!(matches!(err, ImageError::TooLarge { cells: 257, capacity: 256 }));
    assert_eq!(mem, before);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn missing_file_is_io_error() {
    let mut mem = sample_memory();
    let before = mem.clone();
    let err = image::load(&temp_path("does_not_exist.mem"), &MAGIC, &mut mem).unwrap_err();
    assert!(matches!(err, ImageError::Io(_)));
    assert_eq!(mem, before);
}

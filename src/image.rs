//! Memory image files: a 4-byte machine magic, then every cell as a
//! `value, 0x00` pair in address order.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::info;

use crate::memory::LinearMemory;

#[derive(thiserror::Error, Debug)]
pub enum ImageError {
    #[error("not an image for this machine: expected magic {expected:02x?}, found {found:02x?}")]
    FileFormatMismatch { expected: [u8; 4], found: Vec<u8> },
    #[error("image holds {cells} cells but memory has {capacity}")]
    TooLarge { cells: usize, capacity: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub fn write_image<W: Write>(out: &mut W, magic: &[u8; 4], mem: &LinearMemory) -> Result<(), ImageError> {
    out.write_all(magic)?;
    for &cell in mem.as_slice() {
        out.write_all(&[cell, 0x00])?;
    }
    out.flush()?;
    Ok(())
}

/// Decode an image without touching any live memory.
pub fn read_image<R: Read>(input: &mut R, magic: &[u8; 4], capacity: usize) -> Result<Vec<u8>, ImageError> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    if bytes.len() < magic.len() || bytes[..magic.len()] != magic[..] {
        let found = bytes.iter().take(magic.len()).copied().collect();
        return Err(ImageError::FileFormatMismatch { expected: *magic, found });
    }
    // a trailing value without its padding byte still counts as a cell
    let cells: Vec<u8> = bytes[magic.len()..].chunks(2).map(|pair| pair[0]).collect();
    if cells.len() > capacity {
        return Err(ImageError::TooLarge { cells: cells.len(), capacity });
    }
    Ok(cells)
}

pub fn save(path: &Path, magic: &[u8; 4], mem: &LinearMemory) -> Result<(), ImageError> {
    let mut out = BufWriter::new(File::create(path)?);
    write_image(&mut out, magic, mem)?;
    info!(path = %path.display(), cells = mem.len(), "image saved");
    Ok(())
}

/// Load into `mem` from address 0. On any error `mem` is left as it was.
pub fn load(path: &Path, magic: &[u8; 4], mem: &mut LinearMemory) -> Result<usize, ImageError> {
    let mut input = BufReader::new(File::open(path)?);
    let cells = read_image(&mut input, magic, mem.len())?;
    mem.mem[..cells.len()].copy_from_slice(&cells);
    info!(path = %path.display(), cells = cells.len(), "image loaded");
    Ok(cells.len())
}

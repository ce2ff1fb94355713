use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use hidra::image::read_image;
use hidra::MachineKind;

/// Memory image as read from disk, independent of any live machine.
#[derive(Debug, Clone)]
pub struct Image {
    pub kind: MachineKind,
    pub cells: Vec<u8>,
}

pub fn load_image(path: &Path, kind: MachineKind, capacity: usize) -> Result<Image> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let cells = read_image(&mut BufReader::new(file), &kind.magic(), capacity)?;
    Ok(Image { kind, cells })
}

pub fn read_u8(img: &Image, addr: usize) -> Option<u8> {
    img.cells.get(addr).copied()
}

// This file is part of nova64.
// Grounded on spec.md §4.5/§4.6 ("Source/destination space tags
// enumerate: cpu-ram, xram, vgc-char, vgc-color, vgc-gfx, vgc-sprite").

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SpaceTag {
    CpuRam,
    Xram,
    VgcChar,
    VgcColor,
    VgcGfx,
    VgcSprite,
}

impl SpaceTag {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(SpaceTag::CpuRam),
            1 => Some(SpaceTag::Xram),
            2 => Some(SpaceTag::VgcChar),
            3 => Some(SpaceTag::VgcColor),
            4 => Some(SpaceTag::VgcGfx),
            5 => Some(SpaceTag::VgcSprite),
            _ => None,
        }
    }
}

/// The VGC's internal memory spaces, reachable only through this
/// interface from the DMA engine and blitter (spec §4.5: "VGC-space
/// accesses go through the controller's try_read_memory_space /
/// try_write_memory_space interface").
pub trait VgcMemorySpace {
    fn space_len(&self, tag: SpaceTag) -> Option<usize>;
    fn try_read_memory_space(&self, tag: SpaceTag, addr: u32) -> Option<u8>;
    fn try_write_memory_space(&mut self, tag: SpaceTag, addr: u32, value: u8) -> bool;
}

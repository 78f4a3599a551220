// This file is part of nova64.
// Grounded on zinc64-system/src/c64.rs (device wiring) and spec.md §9's
// design note recasting the source's device-list polymorphism as a
// capability-set trait.

use crate::cpu::Addressable;
use crate::memmap;
use crate::util::{Event, Observers, Shared};

/// A bus-addressable peripheral. `owns` decides whether this device
/// answers for a given address; the fabric consults devices in
/// registration order and the first owner wins, so narrower/more
/// specific windows must be registered ahead of broader ones.
pub trait Device {
    fn owns(&self, addr: u16) -> bool;
    fn read(&self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RomImage {
    Basic,
    Native,
}

struct Rom {
    basic: Vec<u8>,
    native: Vec<u8>,
    active: RomImage,
}

impl Rom {
    fn image(&self) -> &[u8] {
        match self.active {
            RomImage::Basic => &self.basic,
            RomImage::Native => &self.native,
        }
    }
}

/// Address-decode fabric: an ordered device list plus a flat 64 Ki byte
/// array backing any cell no device claims (CPU RAM). Devices are the
/// bus's exclusive way of exposing state to the CPU; nothing else mutates
/// `ram` or the ROM image directly.
pub struct Bus {
    ram: Vec<u8>,
    rom: Rom,
    devices: Vec<Shared<dyn Device>>,
    observers: Observers,
}

impl Bus {
    pub fn new(rom_basic: Vec<u8>, rom_native: Vec<u8>) -> Self {
        let mut bus = Self {
            ram: vec![0; 0x10000],
            rom: Rom {
                basic: rom_basic,
                native: rom_native,
                active: RomImage::Basic,
            },
            devices: Vec::new(),
            observers: Observers::new(),
        };
        bus.init_vector_table();
        bus
    }

    /// Registers a device. Registration order is address-decode priority:
    /// call this with the most specific windows first.
    pub fn register(&mut self, device: Shared<dyn Device>) {
        self.devices.push(device);
    }

    pub fn register_observer(&mut self, listener: Box<dyn FnMut(&Event)>) {
        self.observers.register(listener);
    }

    /// Fires a notification to every registered observer. Used by devices
    /// (FIO's save/load, the ROM-swap register above) that need to tell
    /// the host something happened without the core blocking on it.
    pub fn notify(&mut self, event: Event) {
        self.observers.notify(event);
    }

    pub fn active_rom(&self) -> RomImage {
        self.rom.active
    }

    fn init_vector_table(&mut self) {
        self.write_vec(memmap::VEC_VGC_BASE, memmap::VGC_BASE);
        self.write_vec(
            memmap::VEC_VGC_COMMAND,
            memmap::VGC_BASE + crate::video::COMMAND_OFFSET,
        );
        self.write_vec(
            memmap::VEC_CHAR_RAM_BASE,
            memmap::VGC_BASE + crate::video::CHAR_RAM_OFFSET,
        );
        self.write_vec(
            memmap::VEC_COLOR_RAM_BASE,
            memmap::VGC_BASE + crate::video::COLOR_RAM_OFFSET,
        );
        self.write_vec(memmap::VEC_SID_BASE, memmap::SID0_BASE);
        self.write_vec(memmap::VEC_FIO_BASE, memmap::FIO_BASE);
    }

    fn write_vec(&mut self, at: u16, value: u16) {
        self.ram[at as usize] = value as u8;
        self.ram[at.wrapping_add(1) as usize] = (value >> 8) as u8;
    }

    fn owns_rom(&self, addr: u16) -> bool {
        addr >= memmap::ROM_BASE
    }

    fn is_rom_swap_register(&self, addr: u16) -> bool {
        addr == memmap::ROM_BASE + memmap::ROM_SWAP_OFFSET
    }

    /// Whether a write to `addr` would be silently dropped (the ROM
    /// window). Used by the DMA engine and blitter to abort before
    /// writing any byte when a destination range overlaps ROM.
    pub fn is_write_protected(&self, addr: u16) -> bool {
        self.owns_rom(addr)
    }
}

impl Addressable for Bus {
    fn read(&self, addr: u16) -> u8 {
        for device in &self.devices {
            if device.borrow().owns(addr) {
                return device.borrow().read(addr);
            }
        }
        if self.owns_rom(addr) {
            let offset = (addr - memmap::ROM_BASE) as usize;
            return *self.rom.image().get(offset).unwrap_or(&0);
        }
        self.ram[addr as usize]
    }

    fn write(&mut self, addr: u16, value: u8) {
        for device in &self.devices {
            if device.borrow().owns(addr) {
                device.borrow_mut().write(addr, value);
                return;
            }
        }
        if self.owns_rom(addr) {
            if self.is_rom_swap_register(addr) {
                let requested = match value {
                    0x01 => Some(RomImage::Basic),
                    0x02 => Some(RomImage::Native),
                    _ => None,
                };
                if let Some(image) = requested {
                    if image != self.rom.active {
                        self.rom.active = image;
                        debug!(target: "bus", "rom swap -> {:?}", image);
                        self.observers.notify(Event::RomSwapRequested);
                    }
                }
            }
            // All other writes into the ROM window are silently dropped.
            return;
        }
        self.ram[addr as usize] = value;
    }
}

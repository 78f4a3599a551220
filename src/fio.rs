// This file is part of nova64.
// Grounded on spec.md §4.10 in full; the binary file's two-byte
// little-endian load-address header is the same framing
// zinc64-loader/src/prg.rs reads for a PRG image, and the "load address
// prefix, then payload" split mirrors `PrgLoader::load`.

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;

use crate::bus::{Bus, Device};
use crate::cpu::Addressable;
use crate::sound::Player;
use crate::spacetag::{SpaceTag, VgcMemorySpace};
use crate::util::{Event, Shared};
use crate::video::Video;

const FILENAME_BASE: u16 = 0;
const FILENAME_LEN_CAP: u16 = 32;
const FILENAME_LEN: u16 = FILENAME_BASE + FILENAME_LEN_CAP;
const SRC_ADDR_LO: u16 = FILENAME_LEN + 1;
const SRC_ADDR_HI: u16 = SRC_ADDR_LO + 1;
const END_ADDR_LO: u16 = SRC_ADDR_HI + 1;
const END_ADDR_HI: u16 = END_ADDR_LO + 1;
const GFX_SPACE: u16 = END_ADDR_HI + 1;
const GFX_ADDR_LO: u16 = GFX_SPACE + 1;
const GFX_ADDR_HI: u16 = GFX_ADDR_LO + 1;
const GFX_LEN_LO: u16 = GFX_ADDR_HI + 1;
const GFX_LEN_HI: u16 = GFX_LEN_LO + 1;
const DIR_SIZE_LO: u16 = GFX_LEN_HI + 1;
const DIR_SIZE_HI: u16 = DIR_SIZE_LO + 1;
const SID_SONG: u16 = DIR_SIZE_HI + 1;
const COMMAND: u16 = SID_SONG + 1;
const STATUS: u16 = COMMAND + 1;
const ERROR: u16 = STATUS + 1;
const WINDOW_SIZE: u16 = ERROR + 1;

const CMD_SAVE: u8 = 1;
const CMD_LOAD: u8 = 2;
const CMD_DELETE: u8 = 3;
const CMD_DIROPEN: u8 = 4;
const CMD_DIRREAD: u8 = 5;
const CMD_GSAVE: u8 = 6;
const CMD_GLOAD: u8 = 7;
const CMD_SIDPLAY: u8 = 8;
const CMD_SIDSTOP: u8 = 9;

const PROGRAM_EXT: &str = "prg";
const DOC_EXT: &str = "txt";
const GFX_EXT: &str = "gfx";
const SID_EXT: &str = "sid";

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Status {
    Idle,
    Ok,
    Error,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum ErrorCode {
    None,
    NotFound,
    EndOfDir,
    Io,
}

pub struct Fio {
    base: u16,
    save_dir: PathBuf,
    filename: Vec<u8>,
    src_addr: u16,
    end_addr: u16,
    gfx_space: u8,
    gfx_addr: u16,
    gfx_len: u16,
    dir_size: u16,
    sid_song: u8,
    status: Status,
    error: ErrorCode,
    dir_listing: Vec<String>,
    dir_cursor: usize,
    bus: Shared<Bus>,
    video: Shared<Video>,
    player: Shared<Player>,
}

impl Fio {
    pub fn new(base: u16, save_dir: PathBuf, bus: Shared<Bus>, video: Shared<Video>, player: Shared<Player>) -> Self {
        Self {
            base,
            save_dir,
            filename: Vec::new(),
            src_addr: 0,
            end_addr: 0,
            gfx_space: 0,
            gfx_addr: 0,
            gfx_len: 0,
            dir_size: 0,
            sid_song: 1,
            status: Status::Idle,
            error: ErrorCode::None,
            dir_listing: Vec::new(),
            dir_cursor: 0,
            bus,
            video,
            player,
        }
    }

    fn filename_stem(&self) -> String {
        String::from_utf8_lossy(&self.filename).trim_end_matches('\0').to_string()
    }

    fn program_path(&self, stem: &str) -> PathBuf {
        self.save_dir.join(format!("{}.{}", stem, PROGRAM_EXT))
    }

    fn doc_path(&self, stem: &str) -> PathBuf {
        self.save_dir.join(format!("{}.{}", stem, DOC_EXT))
    }

    fn gfx_path(&self, stem: &str) -> PathBuf {
        self.save_dir.join(format!("{}.{}", stem, GFX_EXT))
    }

    fn sid_path(&self, stem: &str) -> PathBuf {
        self.save_dir.join(format!("{}.{}", stem, SID_EXT))
    }

    fn succeed(&mut self) {
        self.status = Status::Ok;
        self.error = ErrorCode::None;
    }

    fn fail(&mut self, err: ErrorCode) {
        self.status = Status::Error;
        self.error = err;
    }

    fn cmd_save(&mut self) {
        let stem = self.filename_stem();
        let len = self.end_addr.wrapping_sub(self.src_addr);
        let mut payload = Vec::with_capacity(2 + len as usize);
        payload.extend_from_slice(&self.src_addr.to_le_bytes());
        {
            let bus = self.bus.borrow();
            for i in 0..len {
                payload.push(bus.read(self.src_addr.wrapping_add(i)));
            }
        }
        match fs::write(self.program_path(&stem), &payload) {
            Ok(()) => {
                let doc = self.doc_path(&stem);
                if !doc.exists() {
                    let _ = fs::File::create(&doc).and_then(|mut f| f.write_all(b""));
                }
                self.succeed();
                self.bus.borrow_mut().notify(Event::ProgramSaved);
            }
            Err(_) => self.fail(ErrorCode::Io),
        }
    }

    fn cmd_load(&mut self) {
        let stem = self.filename_stem();
        match fs::read(self.program_path(&stem)) {
            Ok(data) if data.len() >= 2 => {
                let load_addr = u16::from_le_bytes([data[0], data[1]]);
                let mut bus = self.bus.borrow_mut();
                for (i, byte) in data[2..].iter().enumerate() {
                    bus.write(load_addr.wrapping_add(i as u16), *byte);
                }
                drop(bus);
                self.succeed();
                self.bus.borrow_mut().notify(Event::ProgramLoaded);
            }
            Ok(_) => self.fail(ErrorCode::Io),
            Err(_) => self.fail(ErrorCode::NotFound),
        }
    }

    fn cmd_delete(&mut self) {
        let stem = self.filename_stem();
        let prog = self.program_path(&stem);
        if !prog.exists() {
            self.fail(ErrorCode::NotFound);
            return;
        }
        match fs::remove_file(&prog) {
            Ok(()) => {
                let _ = fs::remove_file(self.doc_path(&stem));
                self.succeed();
            }
            Err(_) => self.fail(ErrorCode::Io),
        }
    }

    fn cmd_diropen(&mut self) {
        let ext_suffix = format!(".{}", PROGRAM_EXT);
        self.dir_listing = fs::read_dir(&self.save_dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| e.file_name().into_string().ok())
                    .filter(|name| name.ends_with(&ext_suffix))
                    .map(|name| name.trim_end_matches(&ext_suffix).to_string())
                    .collect()
            })
            .unwrap_or_default();
        self.dir_listing.sort();
        self.dir_cursor = 0;
        self.succeed();
    }

    fn cmd_dirread(&mut self) {
        match self.dir_listing.get(self.dir_cursor) {
            Some(name) => {
                self.filename = name.as_bytes().to_vec();
                let size = fs::metadata(self.program_path(name)).map(|m| m.len()).unwrap_or(0);
                self.dir_size = size as u16;
                self.dir_cursor += 1;
                self.succeed();
            }
            None => self.fail(ErrorCode::EndOfDir),
        }
    }

    fn cmd_gsave(&mut self) {
        let stem = self.filename_stem();
        let Some(tag) = SpaceTag::from_byte(self.gfx_space) else {
            self.fail(ErrorCode::Io);
            return;
        };
        let mut payload = Vec::with_capacity(self.gfx_len as usize);
        {
            let video = self.video.borrow();
            for i in 0..u32::from(self.gfx_len) {
                payload.push(video.try_read_memory_space(tag, u32::from(self.gfx_addr) + i).unwrap_or(0));
            }
        }
        match fs::write(self.gfx_path(&stem), &payload) {
            Ok(()) => self.succeed(),
            Err(_) => self.fail(ErrorCode::Io),
        }
    }

    fn cmd_gload(&mut self) {
        let stem = self.filename_stem();
        let Some(tag) = SpaceTag::from_byte(self.gfx_space) else {
            self.fail(ErrorCode::Io);
            return;
        };
        match fs::read(self.gfx_path(&stem)) {
            Ok(data) => {
                let mut video = self.video.borrow_mut();
                for (i, byte) in data.iter().enumerate() {
                    video.try_write_memory_space(tag, u32::from(self.gfx_addr) + i as u32, *byte);
                }
                self.succeed();
            }
            Err(_) => self.fail(ErrorCode::NotFound),
        }
    }

    fn cmd_sidplay(&mut self) {
        let stem = self.filename_stem();
        match fs::read(self.sid_path(&stem)) {
            Ok(data) => match crate::sound::parse_psid(&data) {
                Ok((header, load_address, payload)) => {
                    self.player.borrow_mut().play(
                        payload,
                        header.load_address,
                        load_address,
                        header.init_address,
                        header.play_address,
                        self.sid_song,
                    );
                    self.succeed();
                }
                Err(_) => self.fail(ErrorCode::Io),
            },
            Err(_) => self.fail(ErrorCode::NotFound),
        }
    }

    fn cmd_sidstop(&mut self) {
        self.player.borrow_mut().stop();
        self.succeed();
    }

    fn run_command(&mut self, command: u8) {
        match command {
            CMD_SAVE => self.cmd_save(),
            CMD_LOAD => self.cmd_load(),
            CMD_DELETE => self.cmd_delete(),
            CMD_DIROPEN => self.cmd_diropen(),
            CMD_DIRREAD => self.cmd_dirread(),
            CMD_GSAVE => self.cmd_gsave(),
            CMD_GLOAD => self.cmd_gload(),
            CMD_SIDPLAY => self.cmd_sidplay(),
            CMD_SIDSTOP => self.cmd_sidstop(),
            _ => {}
        }
    }
}

impl Device for Fio {
    fn owns(&self, addr: u16) -> bool {
        addr >= self.base && addr < self.base + WINDOW_SIZE
    }

    fn read(&self, addr: u16) -> u8 {
        let off = addr - self.base;
        if off >= FILENAME_BASE && off < FILENAME_BASE + FILENAME_LEN_CAP {
            return *self.filename.get((off - FILENAME_BASE) as usize).unwrap_or(&0);
        }
        match off {
            FILENAME_LEN => self.filename.len() as u8,
            SRC_ADDR_LO => self.src_addr as u8,
            SRC_ADDR_HI => (self.src_addr >> 8) as u8,
            END_ADDR_LO => self.end_addr as u8,
            END_ADDR_HI => (self.end_addr >> 8) as u8,
            GFX_SPACE => self.gfx_space,
            DIR_SIZE_LO => self.dir_size as u8,
            DIR_SIZE_HI => (self.dir_size >> 8) as u8,
            STATUS => match self.status {
                Status::Idle => 0,
                Status::Ok => 1,
                Status::Error => 2,
            },
            ERROR => match self.error {
                ErrorCode::None => 0,
                ErrorCode::NotFound => 1,
                ErrorCode::EndOfDir => 2,
                ErrorCode::Io => 3,
            },
            _ => 0,
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        let off = addr - self.base;
        if off >= FILENAME_BASE && off < FILENAME_BASE + FILENAME_LEN_CAP {
            let i = (off - FILENAME_BASE) as usize;
            if self.filename.len() <= i {
                self.filename.resize(i + 1, 0);
            }
            self.filename[i] = value;
            return;
        }
        match off {
            SRC_ADDR_LO => self.src_addr = (self.src_addr & 0xff00) | u16::from(value),
            SRC_ADDR_HI => self.src_addr = (self.src_addr & 0x00ff) | (u16::from(value) << 8),
            END_ADDR_LO => self.end_addr = (self.end_addr & 0xff00) | u16::from(value),
            END_ADDR_HI => self.end_addr = (self.end_addr & 0x00ff) | (u16::from(value) << 8),
            GFX_SPACE => self.gfx_space = value,
            GFX_ADDR_LO => self.gfx_addr = (self.gfx_addr & 0xff00) | u16::from(value),
            GFX_ADDR_HI => self.gfx_addr = (self.gfx_addr & 0x00ff) | (u16::from(value) << 8),
            GFX_LEN_LO => self.gfx_len = (self.gfx_len & 0xff00) | u16::from(value),
            GFX_LEN_HI => self.gfx_len = (self.gfx_len & 0x00ff) | (u16::from(value) << 8),
            SID_SONG => self.sid_song = value,
            COMMAND => self.run_command(value),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::Sid;
    use crate::util::{new_shared, IrqLine};

    fn make_fio(dir: &std::path::Path) -> (Fio, Shared<Bus>) {
        let bus = new_shared(Bus::new(vec![0; 0x4000], vec![0; 0x4000]));
        let video = new_shared(Video::new(crate::memmap::VGC_BASE, new_shared(IrqLine::new("vgc"))));
        let sid = new_shared(Sid::new(crate::memmap::SID0_BASE, 1_000_000, 44_100));
        let player = new_shared(Player::new(bus.clone(), sid, video.clone()));
        let fio = Fio::new(crate::memmap::FIO_BASE, dir.to_path_buf(), bus.clone(), video, player);
        (fio, bus)
    }

    fn write_filename(fio: &mut Fio, name: &str) {
        for (i, b) in name.bytes().enumerate() {
            fio.write(crate::memmap::FIO_BASE + FILENAME_BASE + i as u16, b);
        }
        fio.write(crate::memmap::FIO_BASE + FILENAME_BASE + name.len() as u16, 0);
    }

    #[test]
    fn save_then_load_round_trips_program_bytes() {
        let dir = std::env::temp_dir().join(format!("nova64-fio-test-{}", std::process::id()));
        let _ = fs::create_dir_all(&dir);
        let (mut fio, bus) = make_fio(&dir);

        bus.borrow_mut().write(0x0400, b'N');
        bus.borrow_mut().write(0x0401, b'O');
        bus.borrow_mut().write(0x0402, b'V');
        write_filename(&mut fio, "demo");
        fio.write(crate::memmap::FIO_BASE + SRC_ADDR_LO, 0x00);
        fio.write(crate::memmap::FIO_BASE + SRC_ADDR_HI, 0x04);
        fio.write(crate::memmap::FIO_BASE + END_ADDR_LO, 0x03);
        fio.write(crate::memmap::FIO_BASE + END_ADDR_HI, 0x04);
        fio.write(crate::memmap::FIO_BASE + COMMAND, CMD_SAVE);
        assert_eq!(fio.read(crate::memmap::FIO_BASE + STATUS), 1);
        assert!(dir.join("demo.txt").exists());

        bus.borrow_mut().write(0x0400, 0);
        bus.borrow_mut().write(0x0401, 0);
        bus.borrow_mut().write(0x0402, 0);
        fio.write(crate::memmap::FIO_BASE + COMMAND, CMD_LOAD);
        assert_eq!(fio.read(crate::memmap::FIO_BASE + STATUS), 1);
        assert_eq!(bus.borrow().read(0x0400), b'N');
        assert_eq!(bus.borrow().read(0x0401), b'O');
        assert_eq!(bus.borrow().read(0x0402), b'V');

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_of_missing_file_sets_not_found() {
        let dir = std::env::temp_dir().join(format!("nova64-fio-test-missing-{}", std::process::id()));
        let _ = fs::create_dir_all(&dir);
        let (mut fio, _bus) = make_fio(&dir);
        write_filename(&mut fio, "nope");
        fio.write(crate::memmap::FIO_BASE + COMMAND, CMD_LOAD);
        assert_eq!(fio.read(crate::memmap::FIO_BASE + STATUS), 2);
        assert_eq!(fio.read(crate::memmap::FIO_BASE + ERROR), 1);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn dir_read_past_end_sets_end_of_directory() {
        let dir = std::env::temp_dir().join(format!("nova64-fio-test-dir-{}", std::process::id()));
        let _ = fs::create_dir_all(&dir);
        let (mut fio, _bus) = make_fio(&dir);
        fio.write(crate::memmap::FIO_BASE + COMMAND, CMD_DIROPEN);
        fio.write(crate::memmap::FIO_BASE + COMMAND, CMD_DIRREAD);
        assert_eq!(fio.read(crate::memmap::FIO_BASE + STATUS), 2);
        assert_eq!(fio.read(crate::memmap::FIO_BASE + ERROR), 2);
        let _ = fs::remove_dir_all(&dir);
    }
}

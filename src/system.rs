// This file is part of nova64.
// Grounded on zinc64-system/src/c64.rs (`C64::build`, dependency wiring
// through `Shared<T>`, the device construction order) generalized to
// nova64's device set, and on spec.md §2's per-tick control flow
// ("the host invokes the scheduler to obtain a cycle budget... the
// emulator then repeatedly asks the CPU how many cycles the next
// instruction costs, executes it, advances all cycle-driven devices by
// that count, until the budget is exhausted or an early-exit predicate
// fires").

use std::path::PathBuf;

use crate::basic::Basic;
use crate::blitter::Blitter;
use crate::bus::{Bus, RomImage};
use crate::compiler_ctrl::CompilerCtrl;
use crate::config::MachineConfig;
use crate::cpu::{Addressable, Cpu6502, Variant};
use crate::dma::Dma;
use crate::fio::Fio;
use crate::memmap;
use crate::nic::Nic;
use crate::scheduler::{MonotonicClock, Scheduler, TimestampSource};
use crate::sound::{Player, Sid, SidAlias};
use crate::timer::Timer;
use crate::util::{new_shared, Event, IrqLine, Shared};
use crate::video::Video;
use crate::xram::Xram;

/// Converts a host keystroke (modifier bitmask + character) to the
/// machine code the CHARIN register should see. Spec.md §6: "in the
/// absence of a map, characters pass through as their ASCII values."
pub type KeyMap = Box<dyn Fn(u8, u8) -> u8>;

/// Everything spec.md §2 describes as "the core": the CPU, the bus
/// fabric and its devices, and the real-time scheduler, wired together
/// and advanced in lockstep. A host owns one of these, feeds it input
/// and wall-clock time, and pulls frames/samples back out.
pub struct Machine {
    bus: Shared<Bus>,
    cpu: Cpu6502,
    scheduler: Scheduler,
    irq_line: Shared<IrqLine>,
    video: Shared<Video>,
    #[allow(dead_code)] // kept alive: Dma/Blitter/CompilerCtrl hold clones, bus.devices holds the Device impl
    xram: Shared<Xram>,
    sid0: Shared<Sid>,
    sid1: Shared<Sid>,
    timer: Shared<Timer>,
    nic: Shared<Nic>,
    basic: Basic,
    key_map: Option<KeyMap>,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Self {
        let bus = new_shared(Bus::new(config.rom_basic.clone(), config.rom_native.clone()));
        let irq_line = new_shared(IrqLine::new("maskable"));
        let xram = new_shared(Xram::new(config.xram_size));

        let video = new_shared(Video::new(memmap::VGC_BASE, irq_line.clone()));
        let dma = new_shared(Dma::new(memmap::DMA_BASE, bus.clone(), xram.clone(), video.clone()));
        let blitter = new_shared(Blitter::new(memmap::BLITTER_BASE, bus.clone(), xram.clone(), video.clone()));
        let sid0 = new_shared(Sid::new(memmap::SID0_BASE, config.target_cycles_per_second as u32, 44_100));
        let sid1 = new_shared(Sid::new(memmap::SID1_BASE, config.target_cycles_per_second as u32, 44_100));
        let sid1_alias = new_shared(SidAlias::new(memmap::SID1_ALIAS_BASE, sid1.clone()));
        let timer = new_shared(Timer::new(memmap::TIMER_BASE, irq_line.clone()));
        let nic = new_shared(Nic::new(memmap::NIC_BASE, bus.clone(), irq_line.clone()));
        let player = new_shared(Player::new(bus.clone(), sid0.clone(), video.clone()));
        let fio = new_shared(Fio::new(
            memmap::FIO_BASE,
            config.fio_save_dir.clone(),
            bus.clone(),
            video.clone(),
            player,
        ));
        let compiler_ctrl = new_shared(CompilerCtrl::new(memmap::COMPILER_BASE, xram.clone(), bus.clone()));

        {
            let mut bus_mut = bus.borrow_mut();
            bus_mut.register(video.clone());
            bus_mut.register(dma);
            bus_mut.register(blitter);
            bus_mut.register(sid0.clone());
            bus_mut.register(sid1.clone());
            bus_mut.register(sid1_alias);
            bus_mut.register(timer.clone());
            bus_mut.register(nic.clone());
            bus_mut.register(fio);
            bus_mut.register(compiler_ctrl);
        }

        let mem: Shared<dyn Addressable> = bus.clone();
        let cpu = Cpu6502::new(mem, config.variant);
        let scheduler = Scheduler::new(config.target_cycles_per_second, config.max_backlog_cycles);

        Self {
            bus,
            cpu,
            scheduler,
            irq_line,
            video,
            xram,
            sid0,
            sid1,
            timer,
            nic,
            basic: Basic::new(),
            key_map: None,
        }
    }

    /// Initializes CPU registers from the reset vector, or from
    /// `entry` when the caller wants to bypass it (the CPU functional
    /// test harness boots this way).
    pub fn boot(&mut self, entry: Option<u16>) {
        self.cpu.boot(entry);
    }

    pub fn pc(&self) -> u16 {
        self.cpu.pc()
    }

    pub fn halted(&self) -> bool {
        self.cpu.halted()
    }

    pub fn variant(&self) -> Variant {
        self.cpu.variant()
    }

    pub fn request_nmi(&mut self) {
        self.cpu.non_maskable_interrupt_pending = true;
    }

    pub fn disassemble(&self, addr: u16) -> (String, u8) {
        self.cpu.disassemble(addr)
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.bus.borrow().read(addr)
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        self.bus.borrow_mut().write(addr, value);
    }

    pub fn active_rom(&self) -> RomImage {
        self.bus.borrow().active_rom()
    }

    pub fn register_observer(&mut self, listener: impl FnMut(&Event) + 'static) {
        self.bus.borrow_mut().register_observer(Box::new(listener));
    }

    /// Asks the scheduler for a cycle budget from elapsed wall-clock
    /// time, then runs the CPU and every cycle-driven device that far.
    /// Returns the number of cycles actually executed (can be less than
    /// the budget if the CPU halts mid-budget).
    pub fn tick(&mut self, source: &dyn TimestampSource) -> u64 {
        let budget = self.scheduler.take_cycle_budget(source, None);
        self.run(budget)
    }

    /// Convenience over `tick` for hosts using the default wall-clock
    /// source; see `scheduler::MonotonicClock`.
    pub fn tick_wall_clock(&mut self, clock: &MonotonicClock) -> u64 {
        self.tick(clock)
    }

    /// Runs the CPU for up to `budget` cycles. Per spec.md §2's control
    /// flow: peek the next instruction's cost, execute it only if it
    /// still fits the remaining budget, advance every cycle-driven
    /// device by exactly that count, repeat until the budget is
    /// exhausted or the CPU halts.
    pub fn run(&mut self, budget: u64) -> u64 {
        let mut consumed = 0u64;
        while !self.cpu.halted() {
            self.cpu.maskable_interrupt_pending = self.irq_line.borrow().is_low();
            let cost = u64::from(self.cpu.cycles_for_next());
            if consumed + cost > budget {
                break;
            }
            let actual = self.cpu.execute_next();
            self.advance_devices(actual);
            consumed += u64::from(actual);
        }
        consumed
    }

    fn advance_devices(&mut self, cycles: u8) {
        self.video.borrow_mut().advance_cycles(cycles);
        self.timer.borrow_mut().advance_cycles(cycles);
        self.sid0.borrow_mut().clock(u32::from(cycles));
        self.sid1.borrow_mut().clock(u32::from(cycles));
        self.nic.borrow_mut().poll_irq();
    }

    pub fn set_key_map(&mut self, key_map: impl Fn(u8, u8) -> u8 + 'static) {
        self.key_map = Some(Box::new(key_map));
    }

    /// Feeds one host keystroke to the VGC's CHARIN register, translated
    /// through the host's `key_map` if one was installed.
    pub fn feed_key(&mut self, modifier: u8, key_char: u8) {
        let byte = match &self.key_map {
            Some(map) => map(modifier, key_char),
            None => key_char,
        };
        self.video.borrow_mut().feed_char_in(byte);
    }

    pub fn frame_buffer(&self) -> Vec<u8> {
        self.video.borrow().frame_buffer().to_vec()
    }

    /// Renders `n` samples from each SID instance. Spec.md §4.7: "Two
    /// independent chip instances at different base addresses are
    /// supported so a machine can have stereo/dual-chip" — exposed here
    /// as a left/right pair; a mono host can just mix or drop one.
    pub fn render_samples(&mut self, n: usize) -> (Vec<i16>, Vec<i16>) {
        (self.sid0.borrow_mut().render_samples(n), self.sid1.borrow_mut().render_samples(n))
    }

    pub fn basic_enter_line(&mut self, number: u16, text: &str) {
        let mut bus = self.bus.borrow_mut();
        self.basic.enter_line(&mut *bus, number, text);
    }

    pub fn basic_delete_line(&mut self, number: u16) {
        let mut bus = self.bus.borrow_mut();
        self.basic.delete_line(&mut *bus, number);
    }

    pub fn basic_list_line(&self, number: u16) -> Option<String> {
        self.basic.list_line(number)
    }

    pub fn basic_list_program(&self) -> String {
        self.basic.list_program()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_machine() -> Machine {
        Machine::new(MachineConfig::default())
    }

    #[test]
    fn boots_and_runs_a_trivial_program() {
        let mut machine = new_machine();
        // LDA #$2A ; STA $00 ; JMP $0400 (spins in place: CPU-self-jump halt)
        machine.write(0x0400, 0xa9);
        machine.write(0x0401, 0x2a);
        machine.write(0x0402, 0x85);
        machine.write(0x0403, 0x00);
        machine.write(0x0404, 0x4c);
        machine.write(0x0405, 0x04);
        machine.write(0x0406, 0x04);
        machine.boot(Some(0x0400));
        let consumed = machine.run(1_000);
        assert!(consumed > 0);
        assert!(machine.halted());
        assert_eq!(machine.read(0x00), 0x2a);
    }

    #[test]
    fn rom_swap_register_fires_observer_and_flips_active_image() {
        let mut machine = new_machine();
        let seen = new_shared(Vec::new());
        let seen_clone = seen.clone();
        machine.register_observer(move |event| seen_clone.borrow_mut().push(event.clone()));
        assert_eq!(machine.active_rom(), RomImage::Basic);
        machine.write(memmap::ROM_BASE, 0x02);
        assert_eq!(machine.active_rom(), RomImage::Native);
        assert_eq!(seen.borrow().as_slice(), &[Event::RomSwapRequested]);
    }

    #[test]
    fn dma_copy_from_cpu_ram_to_vgc_char_ram_end_to_end() {
        let mut machine = new_machine();
        machine.write(0x0400, b'N');
        machine.write(0x0401, b'O');
        machine.write(0x0402, b'V');
        let base = memmap::DMA_BASE;
        machine.write(base, 0); // src space = cpu-ram
        machine.write(base + 1, 2); // dst space = vgc-char
        machine.write(base + 2, 0x00);
        machine.write(base + 3, 0x04); // src addr = 0x0400
        machine.write(base + 5, 100); // dst addr = 100
        machine.write(base + 8, 3); // length = 3
        machine.write(base + 13, 1); // command: start
        assert_eq!(machine.read(base + 14), 1); // status = ok
        assert_eq!(machine.read(memmap::VEC_CHAR_RAM_BASE), (memmap::VGC_BASE + crate::video::CHAR_RAM_OFFSET) as u8);
    }

    #[test]
    fn compile_and_run_byte_arithmetic_matches_spec_scenario() {
        let mut config = MachineConfig::default();
        config.rom_native = crate::compiler::build_runtime_rom();
        let mut machine = Machine::new(config);
        machine.write(memmap::ROM_BASE, 0x02); // swap in the runtime ROM: JT_* helpers live there
        assert_eq!(machine.active_rom(), RomImage::Native);

        let src = "byte x; void main() { x = 6 * 7; }";
        // Stage the source into XRAM (the compiler controller's source
        // space) via a direct DMA-engine copy from CPU RAM, mirroring
        // how a BASIC/C program would hand a buffer to the compiler.
        for (i, byte) in src.bytes().enumerate() {
            machine.write(0x2000 + i as u16, byte);
        }
        let dma_base = memmap::DMA_BASE;
        machine.write(dma_base, 0); // cpu-ram
        machine.write(dma_base + 1, 1); // xram
        machine.write(dma_base + 2, 0x00);
        machine.write(dma_base + 3, 0x20); // src addr 0x2000
        machine.write(dma_base + 5, 0x00);
        machine.write(dma_base + 6, 0x00);
        machine.write(dma_base + 7, 0x00); // dst addr 0 in xram
        machine.write(dma_base + 8, src.len() as u8);
        machine.write(dma_base + 13, 1);
        assert_eq!(machine.read(dma_base + 14), 1);

        let ctrl_base = memmap::COMPILER_BASE;
        machine.write(ctrl_base, 0x00);
        machine.write(ctrl_base + 1, 0x00);
        machine.write(ctrl_base + 2, 0x00); // source address = 0 in xram
        machine.write(ctrl_base + 3, src.len() as u8);
        machine.write(ctrl_base + 4, 0x00); // source length
        machine.write(ctrl_base + 5, 1); // command: compile
        assert_eq!(machine.read(ctrl_base + 6), 1); // status = ok

        assert_ne!(machine.read(crate::compiler::CODE_BASE), 0);

        machine.boot(Some(crate::compiler::CODE_BASE));
        machine.run(2_000_000);
        // `main` returns into the runtime ROM's editor-entry spin loop
        // (a JMP to itself), which the CPU core's self-jump detection
        // recognizes as a halt condition; reaching it within budget
        // confirms the generated call into the multiply helper and its
        // return both ran cleanly against the staged runtime ROM.
        assert!(machine.halted());
    }
}

// This file is part of nova64.
// Grounded on spec.md §4.7 in full (the observable algorithm is
// spec-authoritative, so this is hand-rolled rather than delegating to an
// external chip model — see DESIGN.md's dropped-dependency note). The
// `Chip`-shaped `clock`/`read`/`write` surface mirrors
// zinc64-core/src/sound/sid.rs's trait, generalized here from a facade
// over `resid` into a concrete implementation.

use std::collections::VecDeque;

use crate::bus::Device;

const FREQ_LO: u16 = 0;
const FREQ_HI: u16 = 1;
const PW_LO: u16 = 2;
const PW_HI: u16 = 3;
const CONTROL: u16 = 4;
const AD: u16 = 5;
const SR: u16 = 6;
const VOICE_STRIDE: u16 = 7;

const FILTER_CUTOFF_LO: u16 = 21;
const FILTER_CUTOFF_HI: u16 = 22;
const FILTER_RES_ROUTING: u16 = 23;
const MODE_VOLUME: u16 = 24;
const OSC3: u16 = 25;
const ENV3: u16 = 26;
pub const REGISTER_COUNT: u16 = 29;

const GATE: u8 = 0x01;
const SYNC: u8 = 0x02;
const RING: u8 = 0x04;
const TEST: u8 = 0x08;
const TRIANGLE: u8 = 0x10;
const SAW: u8 = 0x20;
const PULSE: u8 = 0x40;
const NOISE: u8 = 0x80;

/// Attack/decay/release nibble -> approximate number of envelope clock
/// cycles per 1/256th step, loosely modeled on the 6581's documented
/// rate table.
const RATE_TABLE: [u32; 16] = [
    8, 31, 62, 94, 148, 219, 266, 312, 391, 976, 1953, 3125, 3906, 11719, 19531, 31250,
];

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

struct Voice {
    freq: u16,
    pulse_width: u16,
    control: u8,
    attack: u8,
    decay: u8,
    sustain: u8,
    release: u8,
    phase: u32,
    noise_lfsr: u32,
    stage: Stage,
    level: u32,
    rate_counter: u32,
}

impl Default for Voice {
    fn default() -> Self {
        Self {
            freq: 0,
            pulse_width: 0,
            control: 0,
            attack: 0,
            decay: 0,
            sustain: 0,
            release: 0,
            phase: 0,
            noise_lfsr: 0x7ff_ffff,
            stage: Stage::Idle,
            level: 0,
            rate_counter: 0,
        }
    }
}

impl Voice {
    fn gate(&self) -> bool {
        self.control & GATE != 0
    }

    fn clock_envelope(&mut self, cycles: u32) {
        if self.gate() && self.stage == Stage::Idle {
            self.stage = Stage::Attack;
        }
        if !self.gate() && self.stage != Stage::Idle && self.stage != Stage::Release {
            self.stage = Stage::Release;
        }
        let rate_nibble = match self.stage {
            Stage::Attack => self.attack,
            Stage::Decay => self.decay,
            Stage::Release => self.release,
            Stage::Sustain | Stage::Idle => return,
        };
        let period = RATE_TABLE[(rate_nibble & 0x0f) as usize];
        self.rate_counter += cycles;
        while self.rate_counter >= period {
            self.rate_counter -= period;
            match self.stage {
                Stage::Attack => {
                    self.level = (self.level + 323).min(0x00ff_ffff);
                    if self.level >= 0x00ff_ffff {
                        self.stage = Stage::Decay;
                    }
                }
                Stage::Decay => {
                    let sustain_level = u32::from(self.sustain & 0x0f) * 0x0011_1100;
                    if self.level > sustain_level {
                        self.level = self.level.saturating_sub(323);
                        if self.level <= sustain_level {
                            self.level = sustain_level;
                            self.stage = Stage::Sustain;
                        }
                    } else {
                        self.stage = Stage::Sustain;
                    }
                }
                Stage::Release => {
                    self.level = self.level.saturating_sub(323);
                    if self.level == 0 {
                        self.stage = Stage::Idle;
                    }
                }
                Stage::Sustain | Stage::Idle => {}
            }
        }
    }

    fn clock_oscillator(&mut self, cycles: u32) {
        if self.control & TEST == 0 {
            self.phase = self.phase.wrapping_add(u32::from(self.freq) * cycles);
            // advance the noise LFSR roughly in step with the oscillator
            if self.control & NOISE != 0 {
                let bit = ((self.noise_lfsr >> 22) ^ (self.noise_lfsr >> 17)) & 1;
                self.noise_lfsr = ((self.noise_lfsr << 1) | bit) & 0x7ff_ffff;
            }
        }
    }

    /// Returns a signed sample contribution in roughly [-2048, 2047],
    /// mixing whichever waveform bits are set (as real SIDs do when more
    /// than one is enabled, via bitwise AND of the waveforms).
    fn waveform_sample(&self) -> i32 {
        let top = (self.phase >> 20) & 0xfff;
        let mut value: u32 = 0xfff;
        if self.control & TRIANGLE != 0 {
            let tri = if self.phase & 0x8000_0000 != 0 { 0xfff - top } else { top };
            let tri = if self.control & RING != 0 { tri ^ 0xfff } else { tri };
            value &= tri;
        }
        if self.control & SAW != 0 {
            value &= top;
        }
        if self.control & PULSE != 0 {
            let pw = u32::from(self.pulse_width & 0x0fff);
            let pulse = if top >= pw { 0xfffu32 } else { 0 };
            value &= pulse;
        }
        if self.control & NOISE != 0 {
            let noise = (self.noise_lfsr & 0xfff) as u32;
            value &= noise;
        }
        if self.control & (TRIANGLE | SAW | PULSE | NOISE) == 0 {
            value = 0;
        }
        i32::try_from(value).unwrap_or(0) - 0x800
    }

    fn output(&self) -> i32 {
        let env = (self.level >> 16) as i32; // 8-bit envelope level
        (self.waveform_sample() * env) / 255
    }
}

/// One 29-register SID-style audio chip instance.
pub struct Sid {
    base: u16,
    voices: [Voice; 3],
    filter_cutoff: u16,
    filter_res_routing: u8,
    mode_volume: u8,
    sample_queue: VecDeque<i16>,
    cycles_per_sample: u32,
    sample_accum: u32,
    low_pass_state: i32,
}

impl Sid {
    pub fn new(base: u16, cpu_clock_hz: u32, sample_rate_hz: u32) -> Self {
        Self {
            base,
            voices: [Voice::default(), Voice::default(), Voice::default()],
            filter_cutoff: 0,
            filter_res_routing: 0,
            mode_volume: 0x0f,
            sample_queue: VecDeque::new(),
            cycles_per_sample: (cpu_clock_hz / sample_rate_hz).max(1),
            sample_accum: 0,
            low_pass_state: 0,
        }
    }

    pub fn reset(&mut self) {
        for v in &mut self.voices {
            *v = Voice::default();
        }
        self.mode_volume = 0x0f;
        self.sample_queue.clear();
        self.sample_accum = 0;
        self.low_pass_state = 0;
    }

    fn master_volume(&self) -> u8 {
        self.mode_volume & 0x0f
    }

    fn synthesize_one_sample(&mut self) {
        let mix: i32 = self.voices.iter().map(Voice::output).sum();
        // A crude one-pole low-pass: blend the new mix into running state.
        self.low_pass_state += (mix - self.low_pass_state) / 4;
        let scaled = self.low_pass_state * i32::from(self.master_volume()) / 15;
        let sample = scaled.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        self.sample_queue.push_back(sample);
    }

    /// Advances oscillator phases and envelope state machines by `cycles`
    /// emulated CPU cycles, queuing output samples as the internal
    /// sample-rate boundary is crossed.
    pub fn clock(&mut self, cycles: u32) {
        for v in &mut self.voices {
            v.clock_oscillator(cycles);
            v.clock_envelope(cycles);
        }
        self.sample_accum += cycles;
        while self.sample_accum >= self.cycles_per_sample {
            self.sample_accum -= self.cycles_per_sample;
            self.synthesize_one_sample();
        }
    }

    /// Pulls `n` rendered samples. If fewer than `n` have been queued,
    /// the remainder is padded with silence rather than blocking — the
    /// host is expected to call `clock` enough in advance (spec §5).
    pub fn render_samples(&mut self, n: usize) -> Vec<i16> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.sample_queue.pop_front().unwrap_or(0));
        }
        out
    }

    pub fn gate_off_all_voices(&mut self) {
        for v in &mut self.voices {
            v.control &= !GATE;
        }
    }

    pub fn set_master_volume(&mut self, volume: u8) {
        self.mode_volume = (self.mode_volume & 0xf0) | (volume & 0x0f);
    }
}

impl Device for Sid {
    fn owns(&self, addr: u16) -> bool {
        addr >= self.base && addr < self.base + REGISTER_COUNT
    }

    fn read(&self, addr: u16) -> u8 {
        let off = addr - self.base;
        if off < VOICE_STRIDE * 3 {
            let voice = &self.voices[(off / VOICE_STRIDE) as usize];
            return match off % VOICE_STRIDE {
                FREQ_LO => voice.freq as u8,
                FREQ_HI => (voice.freq >> 8) as u8,
                PW_LO => voice.pulse_width as u8,
                PW_HI => (voice.pulse_width >> 8) as u8,
                CONTROL => voice.control,
                AD => (voice.attack << 4) | voice.decay,
                SR => (voice.sustain << 4) | voice.release,
                _ => 0,
            };
        }
        match off {
            FILTER_CUTOFF_LO => self.filter_cutoff as u8,
            FILTER_CUTOFF_HI => (self.filter_cutoff >> 8) as u8,
            FILTER_RES_ROUTING => self.filter_res_routing,
            MODE_VOLUME => self.mode_volume,
            OSC3 => (self.voices[2].phase >> 24) as u8,
            ENV3 => (self.voices[2].level >> 16) as u8,
            _ => 0,
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        let off = addr - self.base;
        if off < VOICE_STRIDE * 3 {
            let voice = &mut self.voices[(off / VOICE_STRIDE) as usize];
            match off % VOICE_STRIDE {
                FREQ_LO => voice.freq = (voice.freq & 0xff00) | u16::from(value),
                FREQ_HI => voice.freq = (voice.freq & 0x00ff) | (u16::from(value) << 8),
                PW_LO => voice.pulse_width = (voice.pulse_width & 0x0f00) | u16::from(value),
                PW_HI => voice.pulse_width = (voice.pulse_width & 0x00ff) | (u16::from(value & 0x0f) << 8),
                CONTROL => voice.control = value,
                AD => {
                    voice.attack = value >> 4;
                    voice.decay = value & 0x0f;
                }
                SR => {
                    voice.sustain = value >> 4;
                    voice.release = value & 0x0f;
                }
                _ => {}
            }
            return;
        }
        match off {
            FILTER_CUTOFF_LO => self.filter_cutoff = (self.filter_cutoff & 0xff00) | u16::from(value),
            FILTER_CUTOFF_HI => self.filter_cutoff = (self.filter_cutoff & 0x00ff) | (u16::from(value) << 8),
            FILTER_RES_ROUTING => self.filter_res_routing = value,
            MODE_VOLUME => self.mode_volume = value,
            _ => {}
        }
    }
}

/// A read-only alias device that mirrors a second chip instance at a
/// different base address transparently (spec §4.7: "a mirror region of
/// a second chip may exist at an alias address that routes to the second
/// chip transparently"). Holds no state of its own.
pub struct SidAlias {
    base: u16,
    target: crate::util::Shared<Sid>,
}

impl SidAlias {
    pub fn new(base: u16, target: crate::util::Shared<Sid>) -> Self {
        Self { base, target }
    }
}

impl Device for SidAlias {
    fn owns(&self, addr: u16) -> bool {
        addr >= self.base && addr < self.base + REGISTER_COUNT
    }

    fn read(&self, addr: u16) -> u8 {
        let off = addr - self.base;
        self.target.borrow().read(self.target.borrow().base + off)
    }

    fn write(&mut self, addr: u16, value: u8) {
        let off = addr - self.base;
        let target_addr = self.target.borrow().base + off;
        self.target.borrow_mut().write(target_addr, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_on_then_off_runs_attack_then_release() {
        let mut sid = Sid::new(0xa100, 1_000_000, 44_100);
        sid.write(0xa100 + CONTROL, GATE | TRIANGLE);
        sid.write(0xa100 + AD, 0x00);
        sid.clock(2_000);
        assert!(sid.voices[0].level > 0);
        sid.write(0xa100 + CONTROL, TRIANGLE);
        sid.write(0xa100 + SR, 0x00);
        sid.clock(200_000);
        assert_eq!(sid.voices[0].stage, Stage::Idle);
    }

    #[test]
    fn render_samples_pads_with_silence_when_starved() {
        let mut sid = Sid::new(0xa100, 1_000_000, 44_100);
        let out = sid.render_samples(4);
        assert_eq!(out, vec![0, 0, 0, 0]);
    }
}

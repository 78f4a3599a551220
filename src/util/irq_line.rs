// This file is part of nova64.
// Grounded on zinc64-core/src/util/irq_line.rs.

use bit_field::BitField;

/// A wired-OR interrupt line. Multiple sources can assert it; it stays
/// asserted until every source that raised it has been cleared.
pub struct IrqLine {
    kind: &'static str,
    signal: u32,
}

impl IrqLine {
    pub fn new(kind: &'static str) -> Self {
        Self { kind, signal: 0 }
    }

    pub fn is_low(&self) -> bool {
        self.signal != 0
    }

    pub fn reset(&mut self) {
        self.signal = 0;
    }

    pub fn set_low(&mut self, source: usize, value: bool) {
        trace!(target: "cpu::int", "{}.{} {}", self.kind, source, if value { "set" } else { "cleared" });
        self.signal.set_bit(source, value);
    }
}

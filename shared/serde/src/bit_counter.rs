use crate::bit_writer::BitWrite;

/// A `BitWrite` that only counts, used to size values before writing them
pub struct BitCounter {
    bits: u32,
}

impl BitCounter {
    pub fn new() -> Self {
        Self { bits: 0 }
    }

    pub fn bits_needed(&self) -> u32 {
        self.bits
    }
}

impl Default for BitCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl BitWrite for BitCounter {
    fn write_bit(&mut self, _: bool) {
        self.bits += 1;
    }

    fn write_byte(&mut self, _: u8) {
        self.bits += 8;
    }
}

use crate::error::SerdeErr;

/// Reads bits back out of a buffer produced by `BitWriter`
pub struct BitReader<'b> {
    buffer: &'b [u8],
    scratch: u8,
    scratch_index: u8,
    buffer_index: usize,
}

impl<'b> BitReader<'b> {
    pub fn new(buffer: &'b [u8]) -> Self {
        Self {
            buffer,
            scratch: 0,
            scratch_index: 0,
            buffer_index: 0,
        }
    }

    pub fn read_bit(&mut self) -> Result<bool, SerdeErr> {
        if self.scratch_index == 0 {
            let Some(byte) = self.buffer.get(self.buffer_index) else {
                return Err(SerdeErr);
            };
            self.scratch = *byte;
            self.scratch_index = 8;
            self.buffer_index += 1;
        }

        let bit = self.scratch & 1 != 0;
        self.scratch >>= 1;
        self.scratch_index -= 1;

        Ok(bit)
    }

    pub fn read_byte(&mut self) -> Result<u8, SerdeErr> {
        let mut output: u8 = 0;
        for index in 0..8 {
            if self.read_bit()? {
                output |= 1 << index;
            }
        }
        Ok(output)
    }

    /// Whole bytes not yet touched by the reader
    pub fn bytes_remaining(&self) -> usize {
        self.buffer.len() - self.buffer_index
    }
}

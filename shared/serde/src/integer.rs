use crate::{
    bit_reader::BitReader, bit_writer::BitWrite, error::SerdeErr, serde::Serde, ConstBitLength,
};

pub type UnsignedInteger<const BITS: u8> = SerdeInteger<false, BITS>;
pub type UnsignedVariableInteger<const BITS: u8> = SerdeInteger<true, BITS>;

/// An unsigned integer written with exactly `BITS` bits, or, when `VARIABLE`
/// is set, in `BITS`-sized groups each prefixed by a continuation bit.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct SerdeInteger<const VARIABLE: bool, const BITS: u8> {
    value: u64,
}

impl<const VARIABLE: bool, const BITS: u8> SerdeInteger<VARIABLE, BITS> {
    /// Panics if `BITS` is zero, or if a fixed-width integer cannot hold
    /// `value`. Both are programming errors at the call site.
    pub fn new<T: Into<u64>>(value: T) -> Self {
        let value = value.into();
        if BITS == 0 || BITS > 64 {
            panic!("can't create an integer with {} bits", BITS);
        }
        if !VARIABLE && BITS < 64 && value >= (1_u64 << BITS) {
            panic!(
                "with {} bits, can't encode number greater than {}",
                BITS,
                (1_u64 << BITS) - 1
            );
        }
        Self { value }
    }

    pub fn get(&self) -> u64 {
        self.value
    }
}

impl<const VARIABLE: bool, const BITS: u8> Serde for SerdeInteger<VARIABLE, BITS> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let mut value = self.value;

        if VARIABLE {
            loop {
                let proceed = BITS < 64 && value >= (1_u64 << BITS);
                writer.write_bit(proceed);
                for _ in 0..BITS {
                    writer.write_bit(value & 1 != 0);
                    value >>= 1;
                }
                if !proceed {
                    return;
                }
            }
        } else {
            for _ in 0..BITS {
                writer.write_bit(value & 1 != 0);
                value >>= 1;
            }
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let mut output: u64 = 0;
        let mut shift: u32 = 0;

        loop {
            let proceed = if VARIABLE { reader.read_bit()? } else { false };

            for _ in 0..BITS {
                let bit = reader.read_bit()?;
                if bit {
                    // a set bit past the 64th means the stream was not written by us
                    if shift >= 64 {
                        return Err(SerdeErr);
                    }
                    output |= 1 << shift;
                }
                shift += 1;
            }

            if !proceed {
                return Ok(Self { value: output });
            }
        }
    }
}

impl<const BITS: u8> ConstBitLength for SerdeInteger<false, BITS> {
    fn const_bit_length() -> u32 {
        BITS as u32
    }
}

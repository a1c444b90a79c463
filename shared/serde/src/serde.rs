use crate::{bit_counter::BitCounter, bit_reader::BitReader, bit_writer::BitWrite, error::SerdeErr};

/// A type that can be written to and read from a bit stream
pub trait Serde: Sized + Clone + PartialEq {
    /// Serialize into the given writer
    fn ser(&self, writer: &mut dyn BitWrite);

    /// Deserialize from the given reader
    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr>;

    /// Number of bits this value occupies once serialized
    fn bit_length(&self) -> u32 {
        let mut counter = BitCounter::new();
        self.ser(&mut counter);
        counter.bits_needed()
    }
}

/// Implemented by types whose serialized size never varies
pub trait ConstBitLength {
    fn const_bit_length() -> u32;
}

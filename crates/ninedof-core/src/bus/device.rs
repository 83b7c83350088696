//! Register-level access to one peripheral on a shared bus

use embedded_hal::i2c::I2c;

use super::{Bus, BusError, SharedBus, with_bus};

/// Largest register block moved in one transfer, in bytes
pub const MAX_BLOCK: usize = 32;

/// Order of the two bytes of a 16-bit register word on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Low byte at the lower register offset
    Little,
    /// High byte at the lower register offset
    Big,
}

impl ByteOrder {
    /// Assemble a word from two bytes as they were read.
    pub const fn decode(self, bytes: [u8; 2]) -> u16 {
        match self {
            Self::Little => u16::from_le_bytes(bytes),
            Self::Big => u16::from_be_bytes(bytes),
        }
    }

    /// Split a word into two bytes in wire order.
    pub const fn encode(self, word: u16) -> [u8; 2] {
        match self {
            Self::Little => word.to_le_bytes(),
            Self::Big => word.to_be_bytes(),
        }
    }
}

/// A peripheral at a fixed address on a shared bus, addressed through 8-bit
/// register offsets.
///
/// Multi-byte reads and writes rely on the chip auto-incrementing the
/// register pointer. Word and multi-byte transfers go through stack buffers
/// of at most [`MAX_BLOCK`] bytes; larger blocks are rejected at compile
/// time.
pub struct RegisterDevice<I> {
    bus: SharedBus<I>,
    address: u8,
    byte_order: ByteOrder,
}

impl<I: I2c> RegisterDevice<I> {
    pub fn new(bus: SharedBus<I>, address: u8, byte_order: ByteOrder) -> Self {
        Self {
            bus,
            address,
            byte_order,
        }
    }

    /// Peripheral address on the bus
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Word byte order declared for this peripheral
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// The shared bus this peripheral lives on
    pub fn bus(&self) -> &SharedBus<I> {
        &self.bus
    }

    fn with_bus<R>(&self, f: impl FnOnce(&mut Bus<I>, u8) -> R) -> R {
        let address = self.address;
        with_bus(&self.bus, |bus| f(bus, address))
    }

    /// Read the register at `offset`.
    pub fn read_byte(&self, offset: u8) -> Result<u8, BusError<I::Error>> {
        let bytes = self.read_bytes::<1>(offset)?;
        Ok(bytes[0])
    }

    /// Read `N` consecutive registers starting at `offset`.
    pub fn read_bytes<const N: usize>(&self, offset: u8) -> Result<[u8; N], BusError<I::Error>> {
        let mut bytes = [0u8; N];
        self.read_block(offset, &mut bytes)?;
        Ok(bytes)
    }

    /// Fill `buffer` from consecutive registers starting at `offset`.
    pub fn read_block(&self, offset: u8, buffer: &mut [u8]) -> Result<(), BusError<I::Error>> {
        self.with_bus(|bus, address| bus.write_read(address, &[offset], buffer))
    }

    /// Read the 16-bit word at `offset`.
    pub fn read_word(&self, offset: u8) -> Result<u16, BusError<I::Error>> {
        let words = self.read_words::<1>(offset)?;
        Ok(words[0])
    }

    /// Read `N` consecutive 16-bit words starting at `offset`.
    pub fn read_words<const N: usize>(&self, offset: u8) -> Result<[u16; N], BusError<I::Error>> {
        const { assert!(N * 2 <= MAX_BLOCK, "register block too large") };
        let mut buffer = [0u8; MAX_BLOCK];
        let bytes = &mut buffer[..N * 2];
        self.read_block(offset, bytes)?;

        let mut words = [0u16; N];
        for (word, pair) in words.iter_mut().zip(bytes.chunks_exact(2)) {
            *word = self.byte_order.decode([pair[0], pair[1]]);
        }
        Ok(words)
    }

    /// Write `value` to the register at `offset`.
    pub fn write_byte(&self, offset: u8, value: u8) -> Result<(), BusError<I::Error>> {
        self.write_bytes(offset, [value])
    }

    /// Write `values` to consecutive registers starting at `offset`.
    pub fn write_bytes<const N: usize>(
        &self,
        offset: u8,
        values: [u8; N],
    ) -> Result<(), BusError<I::Error>> {
        const { assert!(N < MAX_BLOCK, "register block too large") };
        let mut frame = [0u8; MAX_BLOCK];
        frame[0] = offset;
        frame[1..=N].copy_from_slice(&values);
        self.with_bus(|bus, address| bus.write(address, &frame[..=N]))
    }

    /// Write the 16-bit `word` at `offset`.
    pub fn write_word(&self, offset: u8, word: u16) -> Result<(), BusError<I::Error>> {
        self.write_words(offset, [word])
    }

    /// Write consecutive 16-bit words starting at `offset`.
    pub fn write_words<const N: usize>(
        &self,
        offset: u8,
        words: [u16; N],
    ) -> Result<(), BusError<I::Error>> {
        const { assert!(N * 2 < MAX_BLOCK, "register block too large") };
        let mut frame = [0u8; MAX_BLOCK];
        frame[0] = offset;
        for (pair, word) in frame[1..].chunks_exact_mut(2).zip(words) {
            pair.copy_from_slice(&self.byte_order.encode(word));
        }
        self.with_bus(|bus, address| bus.write(address, &frame[..=N * 2]))
    }

    /// Read the register at `offset`, replace the bits in `mask` with those
    /// of `value` and write it back.
    pub fn modify_byte(&self, offset: u8, mask: u8, value: u8) -> Result<(), BusError<I::Error>> {
        let current = self.read_byte(offset)?;
        self.write_byte(offset, (current & !mask) | (value & mask))
    }
}

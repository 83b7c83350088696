//! Mock I2C transport for testing
//!
//! Every simulated peripheral is a 256-byte register file with an
//! auto-incrementing register pointer. The first byte of a write sets the
//! pointer, further bytes are stored from there; reads return bytes from the
//! pointer onwards. Clones share state, so a test keeps one handle while the
//! bus under test owns another.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

/// Bus operation recorded for test verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOp {
    /// Bytes written to a device
    Write { address: u8, bytes: Vec<u8> },
    /// Number of bytes read from a device
    Read { address: u8, len: usize },
}

/// Failure reported by the mock transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    /// Nothing answers at the address
    Nack,
    /// Failure requested through [`MockI2c::fail_next`]
    Injected,
}

impl i2c::Error for MockError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Nack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            Self::Injected => ErrorKind::Other,
        }
    }
}

struct Device {
    registers: [u8; 256],
    pointer: u8,
}

impl Device {
    fn new() -> Self {
        Self {
            registers: [0; 256],
            pointer: 0,
        }
    }

    fn store(&mut self, bytes: &[u8]) {
        let Some((&offset, values)) = bytes.split_first() else {
            return;
        };
        self.pointer = offset;
        for &value in values {
            self.registers[self.pointer as usize] = value;
            self.pointer = self.pointer.wrapping_add(1);
        }
    }

    fn load(&mut self, buffer: &mut [u8]) {
        for byte in buffer {
            *byte = self.registers[self.pointer as usize];
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}

#[derive(Default)]
struct State {
    devices: BTreeMap<u8, Device>,
    ops: Vec<MockOp>,
    failures: usize,
}

/// Register-file backed I2C transport
#[derive(Clone, Default)]
pub struct MockI2c {
    state: Rc<RefCell<State>>,
}

impl MockI2c {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a device with all-zero registers answer at `address`.
    pub fn add_device(&self, address: u8) {
        self.state
            .borrow_mut()
            .devices
            .entry(address)
            .or_insert_with(Device::new);
    }

    /// Preload registers of the device at `address`, adding it if needed.
    pub fn set_registers(&self, address: u8, offset: u8, values: &[u8]) {
        let mut state = self.state.borrow_mut();
        let device = state.devices.entry(address).or_insert_with(Device::new);
        for (i, &value) in values.iter().enumerate() {
            device.registers[offset.wrapping_add(i as u8) as usize] = value;
        }
    }

    /// Current contents of `len` registers of the device at `address`.
    pub fn registers(&self, address: u8, offset: u8, len: usize) -> Vec<u8> {
        let state = self.state.borrow();
        match state.devices.get(&address) {
            Some(device) => (0..len)
                .map(|i| device.registers[offset.wrapping_add(i as u8) as usize])
                .collect(),
            None => Vec::new(),
        }
    }

    /// Make the next `count` transactions fail without touching any device.
    pub fn fail_next(&self, count: usize) {
        self.state.borrow_mut().failures = count;
    }

    /// Operations performed so far
    pub fn ops(&self) -> Vec<MockOp> {
        self.state.borrow().ops.clone()
    }

    /// Register writes (`offset`, values) sent to `address` so far
    pub fn writes(&self, address: u8) -> Vec<(u8, Vec<u8>)> {
        self.state
            .borrow()
            .ops
            .iter()
            .filter_map(|op| match op {
                MockOp::Write { address: a, bytes } if *a == address && bytes.len() > 1 => {
                    Some((bytes[0], bytes[1..].to_vec()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn clear_ops(&self) {
        self.state.borrow_mut().ops.clear();
    }
}

impl ErrorType for MockI2c {
    type Error = MockError;
}

impl I2c for MockI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        if state.failures > 0 {
            state.failures -= 1;
            return Err(MockError::Injected);
        }

        let State { devices, ops, .. } = &mut *state;
        let device = devices.get_mut(&address).ok_or(MockError::Nack)?;

        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    device.store(bytes);
                    ops.push(MockOp::Write {
                        address,
                        bytes: bytes.to_vec(),
                    });
                }
                Operation::Read(buffer) => {
                    device.load(buffer);
                    ops.push(MockOp::Read {
                        address,
                        len: buffer.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_write_then_read_back() {
        let mut i2c = MockI2c::new();
        i2c.add_device(0x50);

        i2c.write(0x50, &[0x10, 0xAA, 0xBB]).unwrap();
        let mut buffer = [0u8; 2];
        i2c.write_read(0x50, &[0x10], &mut buffer).unwrap();

        assert_eq!(buffer, [0xAA, 0xBB]);
        assert_eq!(i2c.writes(0x50), vec![(0x10, vec![0xAA, 0xBB])]);
    }

    #[test]
    fn test_mock_unknown_address_nacks() {
        let mut i2c = MockI2c::new();
        let mut buffer = [0u8; 1];

        assert_eq!(i2c.read(0x42, &mut buffer), Err(MockError::Nack));
        assert!(i2c.ops().is_empty());
    }
}

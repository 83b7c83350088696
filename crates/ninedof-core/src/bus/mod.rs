//! Shared I2C buses
//!
//! Several chips sit on one physical bus. A [`Bus`] wraps the transport and
//! remembers which peripheral address was selected last, so a device only
//! re-selects its address when another device used the bus in between.
//!
//! Buses are handed out as [`SharedBus`] handles by a [`BusRegistry`]: the
//! first request for a bus number opens it, later requests share the same
//! handle, and the bus is closed once the last handle is dropped.
//!
//! All access for one bus happens on one thread. The handle wraps the bus in
//! a `NoopRawMutex` blocking mutex, which gives interior mutability without
//! any cross-thread locking.

mod device;
#[cfg(test)]
pub(crate) mod mock;

use alloc::collections::BTreeMap;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt::Debug;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embedded_hal::i2c::I2c;
use log::{debug, info};
use thiserror_no_std::Error;

pub use device::{ByteOrder, RegisterDevice};

/// Highest 7-bit address tried by [`Bus::scan`]
const LAST_ADDRESS: u8 = 0x7F;

/// Transport failure on a bus transfer.
///
/// Carries the peripheral address and the transport's own error unchanged
/// (on Linux this wraps the OS errno).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("I2C transfer with device {address:#04x} failed: {error:?}")]
pub struct BusError<E: Debug> {
    /// Address of the peripheral the transfer was aimed at
    pub address: u8,
    /// Underlying transport error
    pub error: E,
}

/// One I2C bus together with its last-selected peripheral address
pub struct Bus<I> {
    i2c: I,
    number: u8,
    selected: Option<u8>,
}

/// Reference-counted handle to a bus shared by several devices
pub type SharedBus<I> = Rc<Mutex<NoopRawMutex, RefCell<Bus<I>>>>;

impl<I: I2c> Bus<I> {
    /// Wrap an opened transport as bus `number`.
    pub fn new(number: u8, i2c: I) -> Self {
        Self {
            i2c,
            number,
            selected: None,
        }
    }

    /// Bus number this transport was opened as
    pub fn number(&self) -> u8 {
        self.number
    }

    /// Address selected by the most recent transfer, if any
    pub fn selected(&self) -> Option<u8> {
        self.selected
    }

    /// Select `address` as the target of following transfers.
    ///
    /// Selecting the address that is already current is a no-op.
    pub fn select(&mut self, address: u8) {
        if self.selected != Some(address) {
            debug!("i2c-{}: selecting device {:#04x}", self.number, address);
            self.selected = Some(address);
        }
    }

    /// Write `bytes` to the device at `address`.
    pub fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusError<I::Error>> {
        self.select(address);
        self.i2c
            .write(address, bytes)
            .map_err(|error| BusError { address, error })
    }

    /// Read into `buffer` from the device at `address`.
    pub fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), BusError<I::Error>> {
        self.select(address);
        self.i2c
            .read(address, buffer)
            .map_err(|error| BusError { address, error })
    }

    /// Write `bytes`, then read into `buffer` without releasing the bus.
    pub fn write_read(
        &mut self,
        address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), BusError<I::Error>> {
        self.select(address);
        self.i2c
            .write_read(address, bytes, buffer)
            .map_err(|error| BusError { address, error })
    }

    /// Try every 7-bit address with a one-byte read and collect the ones
    /// that acknowledge.
    pub fn scan(&mut self) -> Vec<u8> {
        let mut found = Vec::new();
        let mut byte = [0u8; 1];

        for address in 1..=LAST_ADDRESS {
            if self.read(address, &mut byte).is_ok() {
                debug!("i2c-{}: device answered at {:#04x}", self.number, address);
                found.push(address);
            }
        }

        info!("i2c-{}: scan found {} device(s)", self.number, found.len());
        found
    }
}

/// Run `f` with exclusive access to the bus behind `handle`.
pub fn with_bus<I, R>(handle: &SharedBus<I>, f: impl FnOnce(&mut Bus<I>) -> R) -> R {
    handle.lock(|cell| f(&mut cell.borrow_mut()))
}

/// Open buses keyed by bus number.
///
/// The registry only holds weak references, so dropping the last
/// [`SharedBus`] handle closes the transport.
pub struct BusRegistry<I> {
    buses: BTreeMap<u8, Weak<Mutex<NoopRawMutex, RefCell<Bus<I>>>>>,
}

impl<I> Default for BusRegistry<I> {
    fn default() -> Self {
        Self {
            buses: BTreeMap::new(),
        }
    }
}

impl<I: I2c> BusRegistry<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a handle to bus `number`, opening it with `opener` if no handle
    /// to it is alive.
    pub fn open<E>(
        &mut self,
        number: u8,
        opener: impl FnOnce(u8) -> Result<I, E>,
    ) -> Result<SharedBus<I>, E> {
        if let Some(bus) = self.buses.get(&number).and_then(Weak::upgrade) {
            debug!("i2c-{number}: sharing open bus");
            return Ok(bus);
        }

        let i2c = opener(number)?;
        let bus = Rc::new(Mutex::new(RefCell::new(Bus::new(number, i2c))));
        self.buses.insert(number, Rc::downgrade(&bus));
        info!("i2c-{number}: bus opened");

        Ok(bus)
    }

    /// Whether a live handle to bus `number` exists
    pub fn is_open(&self, number: u8) -> bool {
        self.buses
            .get(&number)
            .is_some_and(|bus| bus.strong_count() > 0)
    }

    /// Forget buses whose last handle has been dropped, returning how many
    /// remain open.
    pub fn prune(&mut self) -> usize {
        self.buses.retain(|_, bus| bus.strong_count() > 0);
        self.buses.len()
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockI2c, MockOp};
    use super::*;

    #[test]
    fn test_registry_shares_one_bus_per_number() {
        let mut registry = BusRegistry::new();
        let mut opened = 0;

        let first = registry
            .open(1, |_| {
                opened += 1;
                Ok::<_, ()>(MockI2c::new())
            })
            .unwrap();
        let second = registry
            .open(1, |_| {
                opened += 1;
                Ok::<_, ()>(MockI2c::new())
            })
            .unwrap();

        assert_eq!(opened, 1);
        assert!(Rc::ptr_eq(&first, &second));
        assert!(registry.is_open(1));
        assert!(!registry.is_open(2));
    }

    #[test]
    fn test_registry_closes_bus_after_last_handle() {
        let mut registry = BusRegistry::new();
        let first = registry.open(3, |_| Ok::<_, ()>(MockI2c::new())).unwrap();
        let second = first.clone();

        drop(first);
        assert!(registry.is_open(3));

        drop(second);
        assert!(!registry.is_open(3));
        assert_eq!(registry.prune(), 0);
    }

    #[test]
    fn test_registry_propagates_open_failure() {
        let mut registry: BusRegistry<MockI2c> = BusRegistry::new();
        let result = registry.open(7, |number| Err(number));

        assert_eq!(result.err(), Some(7));
        assert!(!registry.is_open(7));
    }

    #[test]
    fn test_select_tracks_last_address() {
        let mock = MockI2c::new();
        mock.add_device(0x1E);
        let mut bus = Bus::new(0, mock.clone());

        assert_eq!(bus.selected(), None);
        bus.write(0x1E, &[0x02, 0x00]).unwrap();
        assert_eq!(bus.selected(), Some(0x1E));
    }

    #[test]
    fn test_transfer_error_carries_address() {
        let mock = MockI2c::new();
        let mut bus = Bus::new(0, mock.clone());

        let err = bus.write(0x53, &[0x2D, 0x08]).unwrap_err();
        assert_eq!(err.address, 0x53);
    }

    #[test]
    fn test_scan_lists_acknowledging_devices() {
        let mock = MockI2c::new();
        mock.add_device(0x1E);
        mock.add_device(0x53);
        mock.add_device(0x68);
        let mut bus = Bus::new(0, mock.clone());

        assert_eq!(bus.scan(), vec![0x1E, 0x53, 0x68]);
        assert!(
            mock.ops()
                .iter()
                .all(|op| matches!(op, MockOp::Read { len: 1, .. }))
        );
    }
}

pub mod i2c;
pub mod ioctl;

use crate::errors::BusResult;

pub use i2c::{ControlDevice, DevNode, I2cBus};

/// Bus capability consumed by peripheral drivers.
///
/// Implemented once per concrete transport; drivers never see the control
/// calls behind it.
pub trait I2c {
    /// Bind plain reads/writes to `address`
    fn select_address(&mut self, address: u16) -> BusResult<()>;

    /// Write to the selected address
    fn write(&mut self, data: &[u8]) -> BusResult<()>;

    /// Read `size` bytes from the selected address
    fn read(&mut self, size: usize) -> BusResult<Vec<u8>>;

    /// Register write followed by a read of `buf.len()` bytes, as one
    /// combined transaction against `address`
    fn block_read_from_register(
        &mut self,
        address: u16,
        register: u8,
        buf: &mut [u8],
    ) -> BusResult<()>;

    fn write_to(&mut self, address: u16, data: &[u8]) -> BusResult<()> {
        self.select_address(address)?;
        self.write(data)
    }

    fn read_from(&mut self, address: u16, size: usize) -> BusResult<Vec<u8>> {
        self.select_address(address)?;
        self.read(size)
    }
}

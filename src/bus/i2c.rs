use super::ioctl::{
    self, AddressSelect, BlockTransfer, CombinedMessages, Message, RdwrIoctlData, SmbusBlock,
    SmbusIoctlData, SmbusSize, I2C_RDWR, I2C_SLAVE, I2C_SMBUS, I2C_TENBIT,
};
use super::I2c;
use crate::errors::{BusError, BusResult};
use nix::errno::Errno;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

nix::ioctl_write_int_bad!(i2c_slave, I2C_SLAVE);
nix::ioctl_write_int_bad!(i2c_tenbit, I2C_TENBIT);
nix::ioctl_write_ptr_bad!(i2c_rdwr, I2C_RDWR, RdwrIoctlData);
nix::ioctl_write_ptr_bad!(i2c_smbus, I2C_SMBUS, SmbusIoctlData);

/// The operating-system side of a bus: control calls plus plain
/// reads/writes on the device node.
pub trait ControlDevice {
    fn set_address(&mut self, select: AddressSelect) -> BusResult<()>;

    fn smbus(&mut self, block: &mut SmbusBlock) -> BusResult<()>;

    /// Execute all messages as one atomic transaction, returning how many
    /// messages the driver completed.
    fn transfer(&mut self, messages: &mut CombinedMessages<'_>) -> BusResult<usize>;

    fn write(&mut self, data: &[u8]) -> BusResult<usize>;

    fn read(&mut self, buf: &mut [u8]) -> BusResult<usize>;
}

fn io_failure(call: &'static str) -> impl Fn(std::io::Error) -> BusError {
    move |e| BusError::IoFailure {
        call,
        errno: e.raw_os_error().map(Errno::from_raw).unwrap_or(Errno::EIO),
    }
}

/// An opened `/dev/i2c-N` character device
#[derive(Debug)]
pub struct DevNode {
    file: File,
    path: PathBuf,
    ten_bit: bool,
}

impl DevNode {
    pub fn open<P: AsRef<Path>>(path: P) -> BusResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| BusError::DeviceUnavailable {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            file,
            path,
            ten_bit: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ControlDevice for DevNode {
    fn set_address(&mut self, select: AddressSelect) -> BusResult<()> {
        let fd = self.file.as_raw_fd();
        if select.ten_bit != self.ten_bit {
            unsafe { i2c_tenbit(fd, i32::from(select.ten_bit)) }.map_err(|errno| {
                BusError::IoFailure {
                    call: "I2C_TENBIT",
                    errno,
                }
            })?;
            self.ten_bit = select.ten_bit;
        }
        unsafe { i2c_slave(fd, select.argument()) }.map_err(|errno| BusError::IoFailure {
            call: "I2C_SLAVE",
            errno,
        })?;
        Ok(())
    }

    fn smbus(&mut self, block: &mut SmbusBlock) -> BusResult<()> {
        let data = block.control_block();
        // SAFETY: `data` points into `block`, which outlives the call
        unsafe { i2c_smbus(self.file.as_raw_fd(), &data) }.map_err(|errno| {
            BusError::IoFailure {
                call: "I2C_SMBUS",
                errno,
            }
        })?;
        Ok(())
    }

    fn transfer(&mut self, messages: &mut CombinedMessages<'_>) -> BusResult<usize> {
        let mut control = messages.control_block();
        let header = control.header();
        // SAFETY: descriptors and their buffers are borrowed by `control`
        let completed = unsafe { i2c_rdwr(self.file.as_raw_fd(), &header) }.map_err(|errno| {
            BusError::IoFailure {
                call: "I2C_RDWR",
                errno,
            }
        })?;
        Ok(completed.max(0) as usize)
    }

    fn write(&mut self, data: &[u8]) -> BusResult<usize> {
        self.file.write(data).map_err(io_failure("write"))
    }

    fn read(&mut self, buf: &mut [u8]) -> BusResult<usize> {
        self.file.read(buf).map_err(io_failure("read"))
    }
}

/// Transaction engine over one exclusively owned bus handle
#[derive(Debug)]
pub struct I2cBus<D = DevNode> {
    device: D,
    selected: Option<u16>,
}

impl I2cBus<DevNode> {
    pub fn open<P: AsRef<Path>>(path: P) -> BusResult<Self> {
        let device = DevNode::open(path)?;
        debug!("[i2c] opened {}", device.path().display());
        Ok(Self::with_device(device))
    }

    pub fn path(&self) -> &Path {
        self.device.path()
    }
}

impl<D: ControlDevice> I2cBus<D> {
    pub fn with_device(device: D) -> Self {
        Self {
            device,
            selected: None,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn selected_address(&self) -> Option<u16> {
        self.selected
    }

    /// Bind subsequent raw reads and writes to `address`. No control call
    /// is issued when the address is already selected.
    pub fn select_address(&mut self, address: u16) -> BusResult<()> {
        if self.selected == Some(address) {
            return Ok(());
        }
        let select = ioctl::encode_address_select(address)?;
        // the kernel's view is unknown until the call succeeds
        self.selected = None;
        self.device.set_address(select)?;
        trace!("[i2c] selected address {:#04x}", address);
        self.selected = Some(address);
        Ok(())
    }

    fn require_selected(&self) -> BusResult<u16> {
        self.selected.ok_or(BusError::NoAddressSelected)
    }

    /// Write to the selected device.
    ///
    /// Up to two bytes go out verbatim (register + value). Anything longer is
    /// sent as an I2C block write: byte 0 is the command and the remainder
    /// travels behind an explicit length byte.
    pub fn raw_write(&mut self, data: &[u8]) -> BusResult<()> {
        let address = self.require_selected()?;
        if data.len() <= 2 {
            let written = self.device.write(data)?;
            if written != data.len() {
                return Err(BusError::ShortWrite {
                    expected: data.len(),
                    actual: written,
                });
            }
            trace!("[i2c] {:#04x} <- {:02x?}", address, data);
            return Ok(());
        }

        let mut block = ioctl::encode_smbus_block(
            data[0],
            SmbusSize::I2cBlockData,
            BlockTransfer::Write(&data[1..]),
        )?;
        self.device.smbus(&mut block)?;
        trace!(
            "[i2c] {:#04x} <- block cmd={:#04x} {:02x?}",
            address,
            data[0],
            &data[1..]
        );
        Ok(())
    }

    /// Read `size` bytes straight from the selected device
    pub fn raw_read(&mut self, size: usize) -> BusResult<Vec<u8>> {
        self.require_selected()?;
        let mut buf = vec![0u8; size];
        let read = self.device.read(&mut buf)?;
        if read < size {
            return Err(BusError::ShortRead {
                expected: size,
                actual: read,
            });
        }
        Ok(buf)
    }

    /// SMBus "receive byte" from the selected device
    pub fn smbus_read_byte(&mut self) -> BusResult<u8> {
        self.require_selected()?;
        let mut block = ioctl::encode_smbus_byte_read();
        self.device.smbus(&mut block)?;
        Ok(block.data()[0])
    }

    /// SMBus I2C block read of exactly `len` bytes starting at `command`
    pub fn smbus_read_i2c_block(&mut self, command: u8, len: usize) -> BusResult<Vec<u8>> {
        self.require_selected()?;
        let mut block =
            ioctl::encode_smbus_block(command, SmbusSize::I2cBlockData, BlockTransfer::Read(len))?;
        self.device.smbus(&mut block)?;
        Ok(block.decode()?.to_vec())
    }

    /// Write `write` then read into `read` without releasing the bus
    pub fn write_read(&mut self, address: u16, write: &[u8], read: &mut [u8]) -> BusResult<()> {
        let expected = read.len();
        let mut messages = ioctl::encode_combined_messages(vec![
            Message::Write {
                address,
                data: write,
            },
            Message::Read { address, buf: read },
        ])?;
        let completed = self.device.transfer(&mut messages)?;
        if completed < messages.len() {
            return Err(BusError::ShortRead {
                expected,
                actual: 0,
            });
        }
        Ok(())
    }

    /// Combined transaction: one-byte register write, then `buf.len()` bytes
    /// read back. Set bit 7 of `register` on chips that need it for
    /// auto-increment.
    pub fn block_read_from_register(
        &mut self,
        address: u16,
        register: u8,
        buf: &mut [u8],
    ) -> BusResult<()> {
        if buf.is_empty() {
            return Err(BusError::InvalidTransaction {
                reason: "block read of zero bytes".to_string(),
            });
        }
        self.write_read(address, &[register], buf)?;
        trace!(
            "[i2c] {:#04x} reg {:#04x} -> {:02x?}",
            address,
            register,
            buf
        );
        Ok(())
    }
}

impl<D: ControlDevice> I2c for I2cBus<D> {
    fn select_address(&mut self, address: u16) -> BusResult<()> {
        I2cBus::select_address(self, address)
    }

    fn write(&mut self, data: &[u8]) -> BusResult<()> {
        self.raw_write(data)
    }

    fn read(&mut self, size: usize) -> BusResult<Vec<u8>> {
        self.raw_read(size)
    }

    fn block_read_from_register(
        &mut self,
        address: u16,
        register: u8,
        buf: &mut [u8],
    ) -> BusResult<()> {
        I2cBus::block_read_from_register(self, address, register, buf)
    }
}

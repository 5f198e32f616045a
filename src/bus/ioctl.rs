//! Binary control blocks for the Linux i2c-dev interface.
//!
//! The `#[repr(C)]` layouts below mirror `struct i2c_msg`,
//! `struct i2c_rdwr_ioctl_data`, `union i2c_smbus_data` and
//! `struct i2c_smbus_ioctl_data` from the kernel headers. Building a block
//! never touches a file descriptor; the transaction engine hands the finished
//! block to a [`ControlDevice`](super::i2c::ControlDevice).

use crate::errors::{BusError, BusResult};
use std::marker::PhantomData;

// ioctl request codes (<linux/i2c-dev.h>)
pub const I2C_SLAVE: u32 = 0x0703;
pub const I2C_TENBIT: u32 = 0x0704;
pub const I2C_RDWR: u32 = 0x0707;
pub const I2C_SMBUS: u32 = 0x0720;

// i2c_msg flags
pub const I2C_M_RD: u16 = 0x0001;
pub const I2C_M_TEN: u16 = 0x0010;

pub const I2C_SMBUS_BLOCK_MAX: usize = 32;
pub const I2C_RDWR_IOCTL_MAX_MSGS: usize = 42;

const SEVEN_BIT_MAX: u16 = 0x7F;
const TEN_BIT_MAX: u16 = 0x3FF;

/// SMBus read/write marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SmbusDirection {
    Write = 0,
    Read = 1,
}

/// SMBus transaction size classes as numbered by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SmbusSize {
    Quick = 0,
    Byte = 1,
    ByteData = 2,
    WordData = 3,
    ProcCall = 4,
    BlockData = 5,
    I2cBlockBroken = 6,
    BlockProcCall = 7,
    I2cBlockData = 8,
}

impl SmbusSize {
    /// Size classes whose data block starts with a length byte
    pub fn is_block(self) -> bool {
        matches!(
            self,
            SmbusSize::BlockData
                | SmbusSize::I2cBlockBroken
                | SmbusSize::BlockProcCall
                | SmbusSize::I2cBlockData
        )
    }
}

/// Control block for `I2C_SLAVE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSelect {
    pub address: u16,
    pub ten_bit: bool,
}

impl AddressSelect {
    pub fn request(&self) -> u32 {
        I2C_SLAVE
    }

    /// Integer argument passed by value to the control call
    pub fn argument(&self) -> i32 {
        i32::from(self.address)
    }
}

/// Build the address-select block. Addresses above 0x7F are only valid as
/// 10-bit addresses and are flagged as such.
pub fn encode_address_select(address: u16) -> BusResult<AddressSelect> {
    match address {
        0..=SEVEN_BIT_MAX => Ok(AddressSelect {
            address,
            ten_bit: false,
        }),
        0x80..=TEN_BIT_MAX => Ok(AddressSelect {
            address,
            ten_bit: true,
        }),
        _ => Err(BusError::InvalidAddress { address }),
    }
}

/// `union i2c_smbus_data`: byte and word alias the start of `block`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmbusData {
    pub block: [u8; I2C_SMBUS_BLOCK_MAX + 2],
}

impl Default for SmbusData {
    fn default() -> Self {
        Self {
            block: [0; I2C_SMBUS_BLOCK_MAX + 2],
        }
    }
}

/// `struct i2c_smbus_ioctl_data`
#[repr(C)]
#[derive(Debug)]
pub struct SmbusIoctlData {
    pub read_write: u8,
    pub command: u8,
    pub size: u32,
    pub data: *mut SmbusData,
}

/// What a block transfer carries: bytes to send, or the number to fetch
#[derive(Debug, Clone, Copy)]
pub enum BlockTransfer<'a> {
    Write(&'a [u8]),
    Read(usize),
}

/// An owned SMBus control block together with its data buffer
#[derive(Debug, Clone)]
pub struct SmbusBlock {
    direction: SmbusDirection,
    command: u8,
    size: SmbusSize,
    requested: usize,
    data: SmbusData,
}

/// Lay out an SMBus block transfer.
///
/// Writes put the payload length in byte 0 followed by the payload. Reads
/// reserve byte 0 for the length the kernel reports back and pre-fill it
/// with the requested count, which is how I2C block reads learn their size.
pub fn encode_smbus_block(
    command: u8,
    size: SmbusSize,
    transfer: BlockTransfer<'_>,
) -> BusResult<SmbusBlock> {
    let len = match transfer {
        BlockTransfer::Write(payload) => payload.len(),
        BlockTransfer::Read(len) => len,
    };
    if len > I2C_SMBUS_BLOCK_MAX {
        return Err(BusError::PayloadTooLarge {
            len,
            max: I2C_SMBUS_BLOCK_MAX,
        });
    }
    if !size.is_block() {
        return Err(BusError::InvalidTransaction {
            reason: format!("size class {:?} carries no block", size),
        });
    }

    let mut data = SmbusData::default();
    data.block[0] = len as u8;
    let direction = match transfer {
        BlockTransfer::Write(payload) => {
            data.block[1..=len].copy_from_slice(payload);
            SmbusDirection::Write
        }
        BlockTransfer::Read(_) => SmbusDirection::Read,
    };

    Ok(SmbusBlock {
        direction,
        command,
        size,
        requested: len,
        data,
    })
}

/// Lay out an SMBus "receive byte" (no register, one byte back)
pub fn encode_smbus_byte_read() -> SmbusBlock {
    SmbusBlock {
        direction: SmbusDirection::Read,
        command: 0,
        size: SmbusSize::Byte,
        requested: 1,
        data: SmbusData::default(),
    }
}

impl SmbusBlock {
    pub fn direction(&self) -> SmbusDirection {
        self.direction
    }

    pub fn command(&self) -> u8 {
        self.command
    }

    pub fn size(&self) -> SmbusSize {
        self.size
    }

    /// Raw data area as the kernel sees it
    pub fn data(&self) -> &[u8] {
        &self.data.block
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data.block
    }

    /// Borrow the block as the struct passed to `I2C_SMBUS`. The returned
    /// pointer is valid for as long as `self` is neither moved nor dropped.
    pub fn control_block(&mut self) -> SmbusIoctlData {
        SmbusIoctlData {
            read_write: self.direction as u8,
            command: self.command,
            size: self.size as u32,
            data: &mut self.data,
        }
    }

    /// Payload following the length byte.
    ///
    /// For reads the length the device reported must equal the requested
    /// size; anything else is a protocol violation.
    pub fn decode(&self) -> BusResult<&[u8]> {
        if !self.size.is_block() {
            return Ok(&self.data.block[..1]);
        }
        let reported = usize::from(self.data.block[0]);
        if reported > I2C_SMBUS_BLOCK_MAX {
            return Err(BusError::LengthMismatch {
                expected: self.requested,
                actual: reported,
            });
        }
        if self.direction == SmbusDirection::Read {
            if reported < self.requested {
                return Err(BusError::ShortRead {
                    expected: self.requested,
                    actual: reported,
                });
            }
            if reported > self.requested {
                return Err(BusError::LengthMismatch {
                    expected: self.requested,
                    actual: reported,
                });
            }
        }
        Ok(&self.data.block[1..=reported])
    }
}

/// `struct i2c_msg`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cMsg {
    pub addr: u16,
    pub flags: u16,
    pub len: u16,
    pub buf: *mut u8,
}

/// `struct i2c_rdwr_ioctl_data`
#[repr(C)]
#[derive(Debug)]
pub struct RdwrIoctlData {
    pub msgs: *mut I2cMsg,
    pub nmsgs: u32,
}

/// One segment of a combined transaction
#[derive(Debug)]
pub enum Message<'a> {
    Write { address: u16, data: &'a [u8] },
    Read { address: u16, buf: &'a mut [u8] },
}

impl Message<'_> {
    pub fn address(&self) -> u16 {
        match self {
            Message::Write { address, .. } | Message::Read { address, .. } => *address,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Message::Write { data, .. } => data.len(),
            Message::Read { buf, .. } => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_read(&self) -> bool {
        matches!(self, Message::Read { .. })
    }

    pub fn flags(&self) -> u16 {
        let mut flags = 0;
        if self.is_read() {
            flags |= I2C_M_RD;
        }
        if self.address() > SEVEN_BIT_MAX {
            flags |= I2C_M_TEN;
        }
        flags
    }
}

/// A validated list of messages executed by a single `I2C_RDWR` call
#[derive(Debug)]
pub struct CombinedMessages<'a> {
    messages: Vec<Message<'a>>,
}

/// Validate the messages of a combined transaction.
pub fn encode_combined_messages(messages: Vec<Message<'_>>) -> BusResult<CombinedMessages<'_>> {
    if messages.is_empty() || messages.len() > I2C_RDWR_IOCTL_MAX_MSGS {
        return Err(BusError::InvalidTransaction {
            reason: format!(
                "{} messages, expected 1..={}",
                messages.len(),
                I2C_RDWR_IOCTL_MAX_MSGS
            ),
        });
    }
    for message in &messages {
        if message.address() > TEN_BIT_MAX {
            return Err(BusError::InvalidAddress {
                address: message.address(),
            });
        }
        if message.len() > usize::from(u16::MAX) {
            return Err(BusError::PayloadTooLarge {
                len: message.len(),
                max: usize::from(u16::MAX),
            });
        }
    }
    Ok(CombinedMessages { messages })
}

impl<'a> CombinedMessages<'a> {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message<'a>] {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut [Message<'a>] {
        &mut self.messages
    }

    /// Lay the descriptors out contiguously. The result mutably borrows the
    /// messages, so their buffers cannot be touched while it is alive.
    pub fn control_block(&mut self) -> RdwrControlBlock<'_> {
        let descriptors = self
            .messages
            .iter_mut()
            .map(|message| {
                let flags = message.flags();
                match message {
                    Message::Write { address, data } => I2cMsg {
                        addr: *address,
                        flags,
                        len: data.len() as u16,
                        // the kernel only reads from buffers of write messages
                        buf: data.as_ptr() as *mut u8,
                    },
                    Message::Read { address, buf } => I2cMsg {
                        addr: *address,
                        flags,
                        len: buf.len() as u16,
                        buf: buf.as_mut_ptr(),
                    },
                }
            })
            .collect();
        RdwrControlBlock {
            descriptors,
            _buffers: PhantomData,
        }
    }
}

/// Descriptor array plus the header that carries its count
#[derive(Debug)]
pub struct RdwrControlBlock<'b> {
    descriptors: Vec<I2cMsg>,
    _buffers: PhantomData<&'b mut ()>,
}

impl RdwrControlBlock<'_> {
    pub fn descriptors(&self) -> &[I2cMsg] {
        &self.descriptors
    }

    /// Header for `I2C_RDWR`; valid while `self` is alive
    pub fn header(&mut self) -> RdwrIoctlData {
        RdwrIoctlData {
            msgs: self.descriptors.as_mut_ptr(),
            nmsgs: self.descriptors.len() as u32,
        }
    }
}

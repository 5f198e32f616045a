//! Pin-level hardware access: sysfs line backends and the resource manager
//! that tracks which lines a board has exported.

pub mod manager;
pub mod sysfs;

use crate::errors::PinResult;

pub use manager::{LineState, PinHandle, PinResourceManager};
pub use sysfs::{PinModes, SysfsAnalog, SysfsGpio, SysfsPwm};

/// Line level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn as_sysfs(self) -> &'static str {
        match self {
            Level::Low => "0",
            Level::High => "1",
        }
    }
}

impl From<bool> for Level {
    fn from(value: bool) -> Self {
        if value {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl From<Level> for bool {
    fn from(value: Level) -> Self {
        matches!(value, Level::High)
    }
}

/// Line direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    pub fn as_sysfs(self) -> &'static str {
        match self {
            Direction::Input => "in",
            Direction::Output => "out",
        }
    }
}

/// One mux line and the level it must be driven to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxSetting {
    pub line: u32,
    pub level: Level,
}

impl MuxSetting {
    pub const fn new(line: u32, level: Level) -> Self {
        Self { line, level }
    }
}

/// Physical wiring behind one logical board pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinDescriptor {
    /// Board-level label, e.g. "IO10" or "J17-1"
    pub name: &'static str,
    pub gpio: Option<u32>,
    /// Pull resistor control line
    pub resistor: Option<u32>,
    /// Level-shifter direction line
    pub level_shifter: Option<u32>,
    pub pwm: Option<u32>,
    pub i2c_bus: Option<u8>,
    pub spi_bus: Option<u8>,
    /// Mux lines, driven in order before the pin is usable
    pub mux: &'static [MuxSetting],
}

const fn line(raw: u32) -> Option<u32> {
    if raw == 0 {
        None
    } else {
        Some(raw)
    }
}

impl PinDescriptor {
    /// Build a descriptor from table encodings: line 0 means absent, PWM
    /// channel -1 means absent.
    pub const fn from_raw(
        name: &'static str,
        gpio: u32,
        resistor: u32,
        level_shifter: u32,
        pwm: i32,
        mux: &'static [MuxSetting],
    ) -> Self {
        Self {
            name,
            gpio: line(gpio),
            resistor: line(resistor),
            level_shifter: line(level_shifter),
            pwm: if pwm < 0 { None } else { Some(pwm as u32) },
            i2c_bus: None,
            spi_bus: None,
            mux,
        }
    }

    pub const fn with_i2c(mut self, bus: u8) -> Self {
        self.i2c_bus = Some(bus);
        self
    }

    pub const fn with_spi(mut self, bus: u8) -> Self {
        self.spi_bus = Some(bus);
        self
    }
}

/// Export/direction/value control over numbered lines
pub trait LineController {
    fn export(&mut self, line: u32) -> PinResult<()>;

    /// Unexporting a line that is not exported succeeds
    fn unexport(&mut self, line: u32) -> PinResult<()>;

    fn set_direction(&mut self, line: u32, direction: Direction) -> PinResult<()>;

    fn write(&mut self, line: u32, level: Level) -> PinResult<()>;

    fn read(&mut self, line: u32) -> PinResult<Level>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{Direction, Level, LineController};
    use crate::errors::{PinError, PinResult};
    use std::collections::{BTreeMap, BTreeSet};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LineOp {
        Export(u32),
        Unexport(u32),
        Direction(u32, Direction),
        Write(u32, Level),
        Read(u32),
    }

    /// In-memory line controller recording every call in order
    #[derive(Debug, Default)]
    pub struct RecordingLines {
        pub ops: Vec<LineOp>,
        pub exported: BTreeSet<u32>,
        pub levels: BTreeMap<u32, Level>,
        pub fail_export: BTreeSet<u32>,
        pub fail_unexport: BTreeSet<u32>,
    }

    impl RecordingLines {
        pub fn exports(&self) -> Vec<u32> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    LineOp::Export(line) => Some(*line),
                    _ => None,
                })
                .collect()
        }

        pub fn position(&self, op: LineOp) -> Option<usize> {
            self.ops.iter().position(|o| *o == op)
        }

        fn failure() -> std::io::Error {
            std::io::Error::from_raw_os_error(nix::errno::Errno::EACCES as i32)
        }
    }

    impl LineController for RecordingLines {
        fn export(&mut self, line: u32) -> PinResult<()> {
            self.ops.push(LineOp::Export(line));
            if self.fail_export.contains(&line) {
                return Err(PinError::PinExportFailure {
                    line,
                    source: Self::failure(),
                });
            }
            self.exported.insert(line);
            Ok(())
        }

        fn unexport(&mut self, line: u32) -> PinResult<()> {
            self.ops.push(LineOp::Unexport(line));
            if self.fail_unexport.contains(&line) {
                return Err(PinError::PinUnexportFailure {
                    line,
                    source: Self::failure(),
                });
            }
            self.exported.remove(&line);
            Ok(())
        }

        fn set_direction(&mut self, line: u32, direction: Direction) -> PinResult<()> {
            self.ops.push(LineOp::Direction(line, direction));
            Ok(())
        }

        fn write(&mut self, line: u32, level: Level) -> PinResult<()> {
            self.ops.push(LineOp::Write(line, level));
            self.levels.insert(line, level);
            Ok(())
        }

        fn read(&mut self, line: u32) -> PinResult<Level> {
            self.ops.push(LineOp::Read(line));
            Ok(self.levels.get(&line).copied().unwrap_or(Level::Low))
        }
    }
}

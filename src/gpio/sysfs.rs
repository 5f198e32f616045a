use super::{Direction, Level, LineController};
use crate::errors::{PinError, PinResult};
use nix::errno::Errno;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

pub const DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";
pub const DEFAULT_PWM_ROOT: &str = "/sys/class/pwm/pwmchip0";
pub const DEFAULT_ANALOG_ROOT: &str = "/sys/bus/iio/devices/iio:device1";
pub const DEFAULT_PINMUX_ROOT: &str = "/sys/kernel/debug/gpio_debug";

fn write_file(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
    file.write_all(content.as_bytes())
}

fn write_attr(path: &Path, content: &str) -> PinResult<()> {
    trace!("[sysfs] {} <- {}", path.display(), content);
    write_file(path, content).map_err(|source| PinError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_attr(path: &Path) -> PinResult<String> {
    fs::read_to_string(path)
        .map(|content| content.trim().to_string())
        .map_err(|source| PinError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn parse_attr<T: std::str::FromStr>(path: &Path) -> PinResult<T> {
    let content = read_attr(path)?;
    content.parse().map_err(|_| PinError::InvalidValue {
        path: path.to_path_buf(),
        content,
    })
}

fn is_errno(err: &std::io::Error, errno: Errno) -> bool {
    err.raw_os_error() == Some(errno as i32)
}

/// GPIO lines under `/sys/class/gpio`
#[derive(Debug, Clone)]
pub struct SysfsGpio {
    root: PathBuf,
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new(DEFAULT_GPIO_ROOT)
    }
}

impl SysfsGpio {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn line_attr(&self, line: u32, attr: &str) -> PathBuf {
        self.root.join(format!("gpio{}", line)).join(attr)
    }
}

impl LineController for SysfsGpio {
    fn export(&mut self, line: u32) -> PinResult<()> {
        match write_file(&self.root.join("export"), &line.to_string()) {
            Ok(()) => {
                debug!("[gpio] exported line {}", line);
                Ok(())
            }
            Err(e) if is_errno(&e, Errno::EBUSY) => {
                debug!("[gpio] line {} already exported", line);
                Ok(())
            }
            Err(source) => Err(PinError::PinExportFailure { line, source }),
        }
    }

    fn unexport(&mut self, line: u32) -> PinResult<()> {
        match write_file(&self.root.join("unexport"), &line.to_string()) {
            Ok(()) => {
                debug!("[gpio] unexported line {}", line);
                Ok(())
            }
            Err(e) if is_errno(&e, Errno::EINVAL) => Ok(()),
            Err(source) => Err(PinError::PinUnexportFailure { line, source }),
        }
    }

    fn set_direction(&mut self, line: u32, direction: Direction) -> PinResult<()> {
        write_attr(&self.line_attr(line, "direction"), direction.as_sysfs())
    }

    fn write(&mut self, line: u32, level: Level) -> PinResult<()> {
        write_attr(&self.line_attr(line, "value"), level.as_sysfs())
    }

    fn read(&mut self, line: u32) -> PinResult<Level> {
        let path = self.line_attr(line, "value");
        match read_attr(&path)?.as_str() {
            "0" => Ok(Level::Low),
            "1" => Ok(Level::High),
            other => Err(PinError::InvalidValue {
                path,
                content: other.to_string(),
            }),
        }
    }
}

/// One channel of a sysfs PWM chip
#[derive(Debug, Clone)]
pub struct SysfsPwm {
    root: PathBuf,
    channel: u32,
}

impl SysfsPwm {
    pub fn new<P: Into<PathBuf>>(root: P, channel: u32) -> Self {
        Self {
            root: root.into(),
            channel,
        }
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    fn attr(&self, attr: &str) -> PathBuf {
        self.root.join(format!("pwm{}", self.channel)).join(attr)
    }

    pub fn export(&self) -> PinResult<()> {
        match write_file(&self.root.join("export"), &self.channel.to_string()) {
            Ok(()) => Ok(()),
            Err(e) if is_errno(&e, Errno::EBUSY) => Ok(()),
            Err(source) => Err(PinError::Io {
                path: self.root.join("export"),
                source,
            }),
        }
    }

    pub fn unexport(&self) -> PinResult<()> {
        match write_file(&self.root.join("unexport"), &self.channel.to_string()) {
            Ok(()) => Ok(()),
            Err(e) if is_errno(&e, Errno::EINVAL) => Ok(()),
            Err(source) => Err(PinError::Io {
                path: self.root.join("unexport"),
                source,
            }),
        }
    }

    pub fn enable(&self, enabled: bool) -> PinResult<()> {
        write_attr(&self.attr("enable"), if enabled { "1" } else { "0" })
    }

    /// Period in nanoseconds
    pub fn period(&self) -> PinResult<u32> {
        parse_attr(&self.attr("period"))
    }

    pub fn write_duty(&self, duty: u32) -> PinResult<()> {
        write_attr(&self.attr("duty_cycle"), &duty.to_string())
    }
}

/// ADC channels exposed through IIO
#[derive(Debug, Clone)]
pub struct SysfsAnalog {
    root: PathBuf,
}

impl Default for SysfsAnalog {
    fn default() -> Self {
        Self::new(DEFAULT_ANALOG_ROOT)
    }
}

impl SysfsAnalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Raw reading scaled from the 12-bit converter down to 10 bits
    pub fn read(&self, channel: u32) -> PinResult<u32> {
        let raw: u32 = parse_attr(&self.root.join(format!("in_voltage{}_raw", channel)))?;
        Ok(raw / 4)
    }
}

/// Pin function selection through the gpio_debug `current_pinmux` files
#[derive(Debug, Clone)]
pub struct PinModes {
    root: PathBuf,
}

impl Default for PinModes {
    fn default() -> Self {
        Self::new(DEFAULT_PINMUX_ROOT)
    }
}

impl PinModes {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn set_mode(&self, line: u32, mode: u8) -> PinResult<()> {
        let path = self
            .root
            .join(format!("gpio{}", line))
            .join("current_pinmux");
        write_attr(&path, &format!("mode{}", mode))
    }
}

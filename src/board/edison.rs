use super::pins::{PinTable, ARDUINO, MINIBOARD};
use crate::bus::I2cBus;
use crate::config::BoardConfig;
use crate::errors::{AdaptorError, AdaptorResult, PinError};
use crate::gpio::{
    Direction, Level, LineController, PinDescriptor, PinModes, PinResourceManager, SysfsAnalog,
    SysfsGpio, SysfsPwm,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Output-enable line of the Arduino breakout's buffers. Its presence is
/// what tells the two carrier boards apart.
pub const TRISTATE_LINE: u32 = 214;

const ARDUINO_MUX_HIGH: [u32; 2] = [263, 262];
const ARDUINO_MUX_LOW: [u32; 4] = [240, 241, 242, 243];
/// IO1, IO4 and IO13 back to GPIO function
const ARDUINO_GPIO_MODE_LINES: [u32; 3] = [131, 129, 40];
/// J17-10, J17-11, J17-12, J18-11
const MINIBOARD_MODE1_LINES: [u32; 4] = [111, 109, 115, 114];

const ARDUINO_I2C_INPUT_LINES: [u32; 4] = [14, 165, 212, 213];
const ARDUINO_I2C_LOW_LINES: [u32; 4] = [236, 237, 204, 205];
const ARDUINO_I2C_MODE_LINES: [u32; 2] = [28, 27];
const MINIBOARD_I2C_MODE_LINES: [u32; 2] = [20, 19];

const ARDUINO_I2C_BUS: u8 = 6;
const MINIBOARD_I2C_BUS: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardVariant {
    Arduino,
    Miniboard,
}

impl BoardVariant {
    pub fn pin_table(self) -> &'static PinTable {
        match self {
            BoardVariant::Arduino => &ARDUINO,
            BoardVariant::Miniboard => &MINIBOARD,
        }
    }

    pub fn i2c_bus(self) -> u8 {
        match self {
            BoardVariant::Arduino => ARDUINO_I2C_BUS,
            BoardVariant::Miniboard => MINIBOARD_I2C_BUS,
        }
    }
}

/// Intel Edison on either carrier board.
///
/// Owns every resource it hands out: exported lines through the pin
/// manager, PWM channels, and the single I2C bus handle drivers borrow
/// through [`i2c`](Self::i2c).
pub struct EdisonAdaptor<C = SysfsGpio> {
    pins: PinResourceManager<C>,
    modes: PinModes,
    analog: SysfsAnalog,
    pwm_root: PathBuf,
    dev_dir: PathBuf,
    variant: Option<BoardVariant>,
    pwm: BTreeMap<u32, SysfsPwm>,
    bus: Option<I2cBus>,
}

impl EdisonAdaptor<SysfsGpio> {
    pub fn new(config: &BoardConfig) -> Self {
        Self::with_lines(SysfsGpio::new(&config.gpio_root), config)
    }
}

impl<C: LineController> EdisonAdaptor<C> {
    pub fn with_lines(lines: C, config: &BoardConfig) -> Self {
        Self {
            pins: PinResourceManager::new(lines),
            modes: PinModes::new(&config.pinmux_root),
            analog: SysfsAnalog::new(&config.analog_root),
            pwm_root: config.pwm_root.clone(),
            dev_dir: config.dev_dir.clone(),
            variant: None,
            pwm: BTreeMap::new(),
            bus: None,
        }
    }

    pub fn variant(&self) -> Option<BoardVariant> {
        self.variant
    }

    pub fn pins(&self) -> &PinResourceManager<C> {
        &self.pins
    }

    /// Probe the carrier board and bring it to a known state
    pub fn connect(&mut self) -> AdaptorResult<BoardVariant> {
        let variant = match self.pins.export_line(TRISTATE_LINE) {
            Ok(()) => {
                self.connect_arduino()?;
                BoardVariant::Arduino
            }
            Err(e) => {
                debug!("[edison] tristate probe failed ({}), assuming miniboard", e);
                self.connect_miniboard()?;
                BoardVariant::Miniboard
            }
        };
        info!("[edison] connected to {:?} board", variant);
        self.variant = Some(variant);
        Ok(variant)
    }

    fn connect_arduino(&mut self) -> AdaptorResult<()> {
        self.pins.configure_line(TRISTATE_LINE, Direction::Output, Some(Level::Low))?;
        for line in ARDUINO_MUX_HIGH {
            self.pins.configure_transient(line, Direction::Output, Some(Level::High))?;
        }
        for line in ARDUINO_MUX_LOW {
            self.pins.configure_transient(line, Direction::Output, Some(Level::Low))?;
        }
        for line in ARDUINO_GPIO_MODE_LINES {
            self.modes.set_mode(line, 0)?;
        }
        self.pins.drive(TRISTATE_LINE, Level::High)?;
        Ok(())
    }

    fn connect_miniboard(&mut self) -> AdaptorResult<()> {
        for line in MINIBOARD_MODE1_LINES {
            self.modes.set_mode(line, 1)?;
        }
        Ok(())
    }

    fn lookup(&self, pin: &str) -> AdaptorResult<&'static PinDescriptor> {
        let variant = self.variant.ok_or(AdaptorError::NotConnected)?;
        Ok(variant.pin_table().lookup(pin)?)
    }

    pub fn digital_read(&mut self, pin: &str) -> AdaptorResult<Level> {
        let descriptor = self.lookup(pin)?;
        let handle = self.pins.acquire(descriptor, Direction::Input)?;
        Ok(self.pins.read(handle)?)
    }

    pub fn digital_write(&mut self, pin: &str, level: Level) -> AdaptorResult<()> {
        let descriptor = self.lookup(pin)?;
        let handle = self.pins.acquire(descriptor, Direction::Output)?;
        Ok(self.pins.write(handle, level)?)
    }

    /// Set the duty cycle of a PWM pin, `value` scaled over the channel's
    /// current period (255 = always on).
    pub fn pwm_write(&mut self, pin: &str, value: u8) -> AdaptorResult<()> {
        let descriptor = self.lookup(pin)?;
        let channel = descriptor.pwm.ok_or_else(|| PinError::NotPwmCapable {
            pin: pin.to_string(),
        })?;

        if !self.pwm.contains_key(&channel) {
            let line = descriptor.gpio.ok_or_else(|| PinError::NoGpioLine {
                pin: pin.to_string(),
            })?;
            self.digital_write(pin, Level::High)?;
            self.modes.set_mode(line, 1)?;
            let pwm = SysfsPwm::new(&self.pwm_root, channel);
            pwm.export()?;
            pwm.enable(true)?;
            debug!("[edison] pwm channel {} enabled for {}", channel, pin);
            self.pwm.insert(channel, pwm);
        }

        let pwm = self
            .pwm
            .get(&channel)
            .ok_or_else(|| PinError::NotPwmCapable {
                pin: pin.to_string(),
            })?;
        let period = pwm.period()?;
        let duty = u64::from(period) * u64::from(value) / 255;
        pwm.write_duty(duty as u32)?;
        Ok(())
    }

    /// Ten-bit reading of an analog channel
    pub fn analog_read(&self, channel: u32) -> AdaptorResult<u32> {
        Ok(self.analog.read(channel)?)
    }

    /// Route and open the board's I2C bus. Calling again once the bus is
    /// open does nothing.
    pub fn i2c_start(&mut self) -> AdaptorResult<()> {
        if self.bus.is_some() {
            return Ok(());
        }
        let variant = self.variant.ok_or(AdaptorError::NotConnected)?;
        match variant {
            BoardVariant::Miniboard => {
                for line in MINIBOARD_I2C_MODE_LINES {
                    self.modes.set_mode(line, 1)?;
                }
            }
            BoardVariant::Arduino => {
                self.pins.drive(TRISTATE_LINE, Level::Low)?;
                for line in ARDUINO_I2C_INPUT_LINES {
                    self.pins.configure_transient(line, Direction::Input, None)?;
                }
                for line in ARDUINO_I2C_LOW_LINES {
                    self.pins.configure_transient(line, Direction::Output, Some(Level::Low))?;
                }
                for line in ARDUINO_I2C_MODE_LINES {
                    self.modes.set_mode(line, 1)?;
                }
                self.pins.drive(TRISTATE_LINE, Level::High)?;
            }
        }

        let path = self.dev_dir.join(format!("i2c-{}", variant.i2c_bus()));
        let bus = I2cBus::open(&path)?;
        info!("[edison] i2c bus {} opened", path.display());
        self.bus = Some(bus);
        Ok(())
    }

    /// The open bus, for drivers to borrow per transaction
    pub fn i2c(&mut self) -> AdaptorResult<&mut I2cBus> {
        self.bus.as_mut().ok_or(AdaptorError::I2cNotStarted)
    }

    /// Release everything the adaptor holds, reporting every failure
    pub fn finalize(&mut self) -> Vec<AdaptorError> {
        let mut errors: Vec<AdaptorError> = Vec::new();

        if let Err(e) = self.pins.release_line(TRISTATE_LINE) {
            errors.push(e.into());
        }
        errors.extend(self.pins.release_all().into_iter().map(AdaptorError::from));

        for (channel, pwm) in std::mem::take(&mut self.pwm) {
            if let Err(e) = pwm.enable(false) {
                warn!("[edison] disabling pwm channel {} failed: {}", channel, e);
                errors.push(e.into());
            }
            if let Err(e) = pwm.unexport() {
                errors.push(e.into());
            }
        }

        if let Some(bus) = self.bus.take() {
            debug!("[edison] closing i2c bus {}", bus.path().display());
        }
        self.variant = None;

        if !errors.is_empty() {
            warn!("[edison] finalize finished with {} error(s)", errors.len());
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::testing::{LineOp, RecordingLines};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct Board {
        dir: TempDir,
        config: BoardConfig,
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn board() -> Board {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for line in [131, 129, 40, 111, 109, 115, 114, 28, 27, 20, 19, 12, 13] {
            touch(&root.join(format!("pinmux/gpio{}/current_pinmux", line)));
        }
        touch(&root.join("pwm/export"));
        touch(&root.join("pwm/unexport"));
        touch(&root.join("pwm/pwm0/enable"));
        touch(&root.join("pwm/pwm0/duty_cycle"));
        fs::write(root.join("pwm/pwm0/period"), "1000000\n").unwrap();
        touch(&root.join("iio/in_voltage0_raw"));
        fs::write(root.join("iio/in_voltage0_raw"), "2048\n").unwrap();
        touch(&root.join("dev/i2c-6"));
        touch(&root.join("dev/i2c-1"));

        let config = BoardConfig {
            gpio_root: root.join("gpio"),
            pwm_root: root.join("pwm"),
            analog_root: root.join("iio"),
            pinmux_root: root.join("pinmux"),
            dev_dir: root.join("dev"),
            ..BoardConfig::default()
        };
        Board { dir, config }
    }

    fn mode(board: &Board, line: u32) -> String {
        fs::read_to_string(
            board
                .dir
                .path()
                .join(format!("pinmux/gpio{}/current_pinmux", line)),
        )
        .unwrap()
    }

    fn miniboard_lines() -> RecordingLines {
        let mut lines = RecordingLines::default();
        lines.fail_export.insert(TRISTATE_LINE);
        lines
    }

    #[test]
    fn test_connect_arduino_sequence() {
        let board = board();
        let mut edison = EdisonAdaptor::with_lines(RecordingLines::default(), &board.config);
        assert_eq!(edison.connect().unwrap(), BoardVariant::Arduino);

        let ops = &edison.pins().controller().ops;
        assert_eq!(ops[0], LineOp::Export(TRISTATE_LINE));
        assert_eq!(ops[1], LineOp::Direction(TRISTATE_LINE, Direction::Output));
        assert_eq!(ops[2], LineOp::Write(TRISTATE_LINE, Level::Low));
        assert_eq!(
            &ops[3..7],
            &[
                LineOp::Export(263),
                LineOp::Direction(263, Direction::Output),
                LineOp::Write(263, Level::High),
                LineOp::Unexport(263),
            ]
        );
        assert!(ops.contains(&LineOp::Write(243, Level::Low)));
        assert_eq!(ops.last(), Some(&LineOp::Write(TRISTATE_LINE, Level::High)));
        assert_eq!(mode(&board, 131), "mode0");
        assert_eq!(mode(&board, 40), "mode0");
        assert!(edison.pins().is_exported(TRISTATE_LINE));
        assert!(!edison.pins().is_exported(263));
    }

    #[test]
    fn test_connect_miniboard_on_failed_probe() {
        let board = board();
        let mut edison = EdisonAdaptor::with_lines(miniboard_lines(), &board.config);
        assert_eq!(edison.connect().unwrap(), BoardVariant::Miniboard);
        for line in MINIBOARD_MODE1_LINES {
            assert_eq!(mode(&board, line), "mode1");
        }
        assert!(matches!(
            edison.digital_write("IO3", Level::High),
            Err(AdaptorError::Pin(PinError::UnknownPin { .. }))
        ));
    }

    #[test]
    fn test_pins_need_connection() {
        let board = board();
        let mut edison = EdisonAdaptor::with_lines(RecordingLines::default(), &board.config);
        assert!(matches!(
            edison.digital_read("3"),
            Err(AdaptorError::NotConnected)
        ));
        assert!(matches!(edison.i2c_start(), Err(AdaptorError::NotConnected)));
        assert!(matches!(edison.i2c(), Err(AdaptorError::I2cNotStarted)));
    }

    #[test]
    fn test_digital_write_then_read() {
        let board = board();
        let mut edison = EdisonAdaptor::with_lines(RecordingLines::default(), &board.config);
        edison.connect().unwrap();

        edison.digital_write("13", Level::High).unwrap();
        assert_eq!(edison.pins().state(40).unwrap().value, Some(Level::High));
        assert!(edison.pins().is_exported(243));
        assert_eq!(edison.digital_read("IO13").unwrap(), Level::High);
        assert_eq!(
            edison.pins().state(261).unwrap().value,
            Some(Level::Low),
            "level shifter back in read mode"
        );
    }

    #[test]
    fn test_pwm_write_scales_period() {
        let board = board();
        let mut edison = EdisonAdaptor::with_lines(RecordingLines::default(), &board.config);
        edison.connect().unwrap();

        edison.pwm_write("3", 51).unwrap();
        let root = board.dir.path();
        assert_eq!(fs::read_to_string(root.join("pwm/export")).unwrap(), "0");
        assert_eq!(fs::read_to_string(root.join("pwm/pwm0/enable")).unwrap(), "1");
        assert_eq!(
            fs::read_to_string(root.join("pwm/pwm0/duty_cycle")).unwrap(),
            "200000"
        );
        assert_eq!(mode(&board, 12), "mode1");
        assert_eq!(edison.pins().state(12).unwrap().value, Some(Level::High));

        edison.pwm_write("3", 255).unwrap();
        assert_eq!(
            fs::read_to_string(root.join("pwm/pwm0/duty_cycle")).unwrap(),
            "1000000"
        );
    }

    #[test]
    fn test_pwm_on_plain_pin() {
        let board = board();
        let mut edison = EdisonAdaptor::with_lines(RecordingLines::default(), &board.config);
        edison.connect().unwrap();
        assert!(matches!(
            edison.pwm_write("2", 10),
            Err(AdaptorError::Pin(PinError::NotPwmCapable { .. }))
        ));
    }

    #[test]
    fn test_analog_read() {
        let board = board();
        let edison = EdisonAdaptor::with_lines(RecordingLines::default(), &board.config);
        assert_eq!(edison.analog_read(0).unwrap(), 512);
    }

    #[test]
    fn test_i2c_start_arduino_routes_bus_six() {
        let board = board();
        let mut edison = EdisonAdaptor::with_lines(RecordingLines::default(), &board.config);
        edison.connect().unwrap();
        let before = edison.pins().controller().ops.len();

        edison.i2c_start().unwrap();
        let ops = edison.pins().controller().ops[before..].to_vec();
        assert_eq!(ops[0], LineOp::Write(TRISTATE_LINE, Level::Low));
        assert_eq!(
            &ops[1..4],
            &[
                LineOp::Export(14),
                LineOp::Direction(14, Direction::Input),
                LineOp::Unexport(14),
            ]
        );
        assert!(ops.contains(&LineOp::Write(205, Level::Low)));
        assert_eq!(ops.last(), Some(&LineOp::Write(TRISTATE_LINE, Level::High)));
        assert_eq!(mode(&board, 28), "mode1");
        assert_eq!(mode(&board, 27), "mode1");
        assert!(edison.i2c().unwrap().path().ends_with("i2c-6"));

        edison.i2c_start().unwrap();
        assert_eq!(edison.pins().controller().ops.len(), before + ops.len());
    }

    #[test]
    fn test_i2c_start_miniboard_routes_bus_one() {
        let board = board();
        let mut edison = EdisonAdaptor::with_lines(miniboard_lines(), &board.config);
        edison.connect().unwrap();
        edison.i2c_start().unwrap();
        assert_eq!(mode(&board, 20), "mode1");
        assert_eq!(mode(&board, 19), "mode1");
        assert!(edison.i2c().unwrap().path().ends_with("i2c-1"));
    }

    #[test]
    fn test_i2c_start_missing_device() {
        let board = board();
        fs::remove_file(board.dir.path().join("dev/i2c-6")).unwrap();
        let mut edison = EdisonAdaptor::with_lines(RecordingLines::default(), &board.config);
        edison.connect().unwrap();
        assert!(matches!(
            edison.i2c_start(),
            Err(AdaptorError::Bus(crate::errors::BusError::DeviceUnavailable { .. }))
        ));
    }

    #[test]
    fn test_finalize_releases_everything() {
        let board = board();
        let mut edison = EdisonAdaptor::with_lines(RecordingLines::default(), &board.config);
        edison.connect().unwrap();
        edison.digital_write("10", Level::Low).unwrap();
        edison.pwm_write("3", 128).unwrap();
        edison.i2c_start().unwrap();

        assert!(edison.finalize().is_empty());
        assert!(edison.pins().controller().exported.is_empty());
        assert_eq!(
            fs::read_to_string(board.dir.path().join("pwm/pwm0/enable")).unwrap(),
            "0"
        );
        assert!(matches!(edison.i2c(), Err(AdaptorError::I2cNotStarted)));
        assert!(edison.finalize().is_empty());
    }

    #[test]
    fn test_finalize_accumulates_errors() {
        let board = board();
        let mut lines = RecordingLines::default();
        lines.fail_unexport.insert(TRISTATE_LINE);
        lines.fail_unexport.insert(41);
        let mut edison = EdisonAdaptor::with_lines(lines, &board.config);
        edison.connect().unwrap();
        edison.digital_write("10", Level::High).unwrap();

        let errors = edison.finalize();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, AdaptorError::Pin(PinError::PinUnexportFailure { .. }))));
    }
}

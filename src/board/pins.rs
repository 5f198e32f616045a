//! Static pin maps for the two Edison carrier boards.

use crate::errors::{PinError, PinResult};
use crate::gpio::{Level, MuxSetting, PinDescriptor};

const NO_MUX: &[MuxSetting] = &[];

const IO10_MUX: &[MuxSetting] = &[
    MuxSetting::new(263, Level::High),
    MuxSetting::new(240, Level::Low),
];
const IO11_MUX: &[MuxSetting] = &[
    MuxSetting::new(262, Level::High),
    MuxSetting::new(241, Level::Low),
];
const IO12_MUX: &[MuxSetting] = &[MuxSetting::new(242, Level::Low)];
const IO13_MUX: &[MuxSetting] = &[MuxSetting::new(243, Level::Low)];

const fn pin(
    name: &'static str,
    gpio: u32,
    resistor: u32,
    level_shifter: u32,
    pwm: i32,
    mux: &'static [MuxSetting],
) -> PinDescriptor {
    PinDescriptor::from_raw(name, gpio, resistor, level_shifter, pwm, mux)
}

/// Immutable label to descriptor mapping for one board variant
#[derive(Debug)]
pub struct PinTable {
    pub board: &'static str,
    /// Prefix accepted in front of numeric labels, e.g. "IO" for "IO3"
    alias_prefix: Option<&'static str>,
    pins: &'static [PinDescriptor],
}

impl PinTable {
    /// Find a pin by label. Arduino header pins answer to both "3" and "IO3".
    pub fn lookup(&self, label: &str) -> PinResult<&'static PinDescriptor> {
        let name = match self.alias_prefix {
            Some(prefix) if !label.starts_with(prefix) => Some(format!("{}{}", prefix, label)),
            _ => None,
        };
        let name = name.as_deref().unwrap_or(label);
        self.pins
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| PinError::UnknownPin {
                pin: label.to_string(),
                board: self.board,
            })
    }

    pub fn pins(&self) -> &'static [PinDescriptor] {
        self.pins
    }
}

/// Arduino-compatible breakout: every header pin sits behind a pull
/// resistor line and a level shifter, some behind mux chains too.
pub static ARDUINO: PinTable = PinTable {
    board: "arduino",
    alias_prefix: Some("IO"),
    pins: ARDUINO_PINS,
};

const ARDUINO_PINS: &[PinDescriptor] = &[
    pin("IO0", 130, 216, 248, -1, NO_MUX),
    pin("IO1", 131, 217, 249, -1, NO_MUX),
    pin("IO2", 128, 218, 250, -1, NO_MUX),
    pin("IO3", 12, 219, 251, 0, NO_MUX),
    pin("IO4", 129, 220, 252, -1, NO_MUX),
    pin("IO5", 13, 221, 253, 1, NO_MUX),
    pin("IO6", 182, 222, 254, 2, NO_MUX),
    pin("IO7", 48, 223, 255, -1, NO_MUX),
    pin("IO8", 49, 224, 256, -1, NO_MUX),
    pin("IO9", 183, 225, 257, 3, NO_MUX),
    pin("IO10", 41, 226, 258, 4, IO10_MUX),
    pin("IO11", 43, 227, 259, 5, IO11_MUX),
    pin("IO12", 42, 228, 260, -1, IO12_MUX),
    pin("IO13", 40, 229, 261, -1, IO13_MUX),
];

/// Miniboard: J17..J20 headers wired straight to SoC lines
pub static MINIBOARD: PinTable = PinTable {
    board: "miniboard",
    alias_prefix: None,
    pins: MINIBOARD_PINS,
};

const MINIBOARD_PINS: &[PinDescriptor] = &[
    pin("J17-1", 182, 0, 0, 2, NO_MUX),
    pin("J17-2", 0, 0, 0, -1, NO_MUX),
    pin("J17-3", 0, 0, 0, -1, NO_MUX),
    pin("J17-4", 0, 0, 0, -1, NO_MUX),
    pin("J17-5", 135, 0, 0, -1, NO_MUX),
    pin("J17-6", 0, 0, 0, -1, NO_MUX),
    pin("J17-7", 27, 0, 0, -1, NO_MUX).with_i2c(1),
    pin("J17-8", 20, 0, 0, -1, NO_MUX).with_i2c(1),
    pin("J17-9", 28, 0, 0, -1, NO_MUX).with_i2c(1),
    pin("J17-10", 111, 0, 0, -1, NO_MUX),
    pin("J17-11", 109, 0, 0, -1, NO_MUX).with_spi(5),
    pin("J17-12", 115, 0, 0, -1, NO_MUX).with_spi(5),
    pin("J17-13", 0, 0, 0, -1, NO_MUX),
    pin("J17-14", 128, 0, 0, -1, NO_MUX),
    pin("J18-1", 13, 0, 0, 1, NO_MUX),
    pin("J18-2", 165, 0, 0, -1, NO_MUX),
    pin("J18-3", 0, 0, 0, -1, NO_MUX),
    pin("J18-4", 0, 0, 0, -1, NO_MUX),
    pin("J18-5", 0, 0, 0, -1, NO_MUX),
    pin("J18-6", 19, 0, 0, -1, NO_MUX).with_i2c(1),
    pin("J18-7", 12, 0, 0, 0, NO_MUX),
    pin("J18-8", 183, 0, 0, 3, NO_MUX),
    pin("J18-9", 0, 0, 0, -1, NO_MUX),
    pin("J18-10", 110, 0, 0, -1, NO_MUX).with_spi(5),
    pin("J18-11", 114, 0, 0, -1, NO_MUX).with_spi(5),
    pin("J18-12", 129, 0, 0, -1, NO_MUX),
    pin("J18-13", 130, 0, 0, -1, NO_MUX),
    pin("J18-14", 0, 0, 0, -1, NO_MUX),
    pin("J19-1", 0, 0, 0, -1, NO_MUX),
    pin("J19-2", 0, 0, 0, -1, NO_MUX),
    pin("J19-3", 0, 0, 0, -1, NO_MUX),
    pin("J19-4", 44, 0, 0, -1, NO_MUX),
    pin("J19-5", 46, 0, 0, -1, NO_MUX),
    pin("J19-6", 48, 0, 0, -1, NO_MUX),
    pin("J19-7", 0, 0, 0, -1, NO_MUX),
    pin("J19-8", 131, 0, 0, -1, NO_MUX),
    pin("J19-9", 14, 0, 0, -1, NO_MUX),
    pin("J19-10", 40, 0, 0, -1, NO_MUX),
    pin("J19-11", 43, 0, 0, -1, NO_MUX),
    pin("J19-12", 77, 0, 0, -1, NO_MUX),
    pin("J19-13", 82, 0, 0, -1, NO_MUX),
    pin("J19-14", 83, 0, 0, -1, NO_MUX),
    pin("J20-1", 0, 0, 0, -1, NO_MUX),
    pin("J20-2", 0, 0, 0, -1, NO_MUX),
    pin("J20-3", 0, 0, 0, -1, NO_MUX),
    pin("J20-4", 45, 0, 0, -1, NO_MUX),
    pin("J20-5", 47, 0, 0, -1, NO_MUX),
    pin("J20-6", 49, 0, 0, -1, NO_MUX),
    pin("J20-7", 15, 0, 0, -1, NO_MUX),
    pin("J20-8", 84, 0, 0, -1, NO_MUX),
    pin("J20-9", 42, 0, 0, -1, NO_MUX),
    pin("J20-10", 41, 0, 0, -1, NO_MUX),
    pin("J20-11", 78, 0, 0, -1, NO_MUX),
    pin("J20-12", 79, 0, 0, -1, NO_MUX),
    pin("J20-13", 80, 0, 0, -1, NO_MUX),
    pin("J20-14", 81, 0, 0, -1, NO_MUX),
];

//! Intel Edison board support: carrier-board pin maps and the adaptor that
//! owns the board's pins and I2C bus.

pub mod edison;
pub mod pins;

pub use edison::{BoardVariant, EdisonAdaptor, TRISTATE_LINE};
pub use pins::{PinTable, ARDUINO, MINIBOARD};

use super::{SensorDataFrame, SensorDriver, SensorFactory, Vector3};
use crate::bus::I2c;
use crate::config::SensorEntry;
use crate::errors::{SensorError, SensorResult};
use tracing::{debug, warn};

pub const ADDRESS_XM: u16 = 0x1d;
pub const ADDRESS_G: u16 = 0x6b;

// Gyroscope registers
const CTRL_REG1_G: u8 = 0x20;
const CTRL_REG2_G: u8 = 0x21;
const CTRL_REG3_G: u8 = 0x22;
const CTRL_REG4_G: u8 = 0x23;
const OUT_X_L_G: u8 = 0x28;

// Accelerometer / magnetometer registers
const OUT_X_L_M: u8 = 0x08;
const CTRL_REG0_XM: u8 = 0x1F;
const CTRL_REG1_XM: u8 = 0x20;
const CTRL_REG2_XM: u8 = 0x21;
const CTRL_REG3_XM: u8 = 0x22;
const CTRL_REG4_XM: u8 = 0x23;
const CTRL_REG5_XM: u8 = 0x24;
const CTRL_REG6_XM: u8 = 0x25;
const CTRL_REG7_XM: u8 = 0x26;
const OUT_X_L_A: u8 = 0x28;

/// Register address flag for multi-byte reads
const AUTO_INCREMENT: u8 = 0x80;

/// One full-scale selection: sensitivity in milli-units per LSB and the
/// register code selecting it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub label: &'static str,
    pub sensitivity: f64,
    pub code: u8,
}

const fn scale(label: &'static str, sensitivity: f64, code: u8) -> Scale {
    Scale {
        label,
        sensitivity,
        code,
    }
}

/// milli-dps/LSB
pub const GYRO_SCALES: &[Scale] = &[
    scale("245", 8.75, 0x00),
    scale("500", 17.50, 0x01),
    scale("2000", 70.0, 0x02),
];

/// milli-g/LSB
pub const ACCEL_SCALES: &[Scale] = &[
    scale("2", 0.061, 0),
    scale("4", 0.122, 1),
    scale("6", 0.183, 2),
    scale("8", 0.244, 3),
    scale("16", 0.732, 4),
];

/// milli-gauss/LSB
pub const MAGNETO_SCALES: &[Scale] = &[
    scale("2", 0.08, 0),
    scale("4", 0.16, 1),
    scale("8", 0.32, 2),
    scale("12", 0.48, 3),
];

/// The three independently enabled halves of the chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Accelerometer,
    Gyroscope,
    Magnetometer,
}

impl Capability {
    pub fn name(self) -> &'static str {
        match self {
            Capability::Accelerometer => "accelerometer",
            Capability::Gyroscope => "gyroscope",
            Capability::Magnetometer => "magnetometer",
        }
    }

    fn scales(self) -> &'static [Scale] {
        match self {
            Capability::Accelerometer => ACCEL_SCALES,
            Capability::Gyroscope => GYRO_SCALES,
            Capability::Magnetometer => MAGNETO_SCALES,
        }
    }

    fn address(self) -> u16 {
        match self {
            Capability::Gyroscope => ADDRESS_G,
            Capability::Accelerometer | Capability::Magnetometer => ADDRESS_XM,
        }
    }

    fn output_register(self) -> u8 {
        match self {
            Capability::Accelerometer => OUT_X_L_A,
            Capability::Gyroscope => OUT_X_L_G,
            Capability::Magnetometer => OUT_X_L_M,
        }
    }

    /// Register write that applies `scale`
    fn scale_write(self, scale: &Scale) -> [u8; 2] {
        match self {
            Capability::Accelerometer => [CTRL_REG2_XM, scale.code << 3],
            Capability::Gyroscope => [CTRL_REG4_G, scale.code << 4],
            Capability::Magnetometer => [CTRL_REG6_XM, scale.code << 5],
        }
    }

    fn lookup(self, label: &str) -> SensorResult<&'static Scale> {
        self.scales()
            .iter()
            .find(|s| s.label == label)
            .ok_or_else(|| SensorError::InvalidScale {
                capability: self.name(),
                label: label.to_string(),
                valid: self
                    .scales()
                    .iter()
                    .map(|s| s.label)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

#[derive(Debug)]
struct Group {
    enabled: bool,
    scale: &'static Scale,
}

/// ST LSM9DS0 nine-axis IMU: gyroscope at 0x6b, accelerometer and
/// magnetometer sharing 0x1d.
#[derive(Debug)]
pub struct Lsm9ds0 {
    id: String,
    bus_id: String,
    accel: Group,
    gyro: Group,
    magneto: Group,
}

impl Lsm9ds0 {
    pub fn new(id: String, bus_id: String, accel: bool, gyro: bool, magneto: bool) -> Self {
        Self {
            id,
            bus_id,
            accel: Group {
                enabled: accel,
                scale: &ACCEL_SCALES[0],
            },
            gyro: Group {
                enabled: gyro,
                scale: &GYRO_SCALES[0],
            },
            magneto: Group {
                enabled: magneto,
                scale: &MAGNETO_SCALES[0],
            },
        }
    }

    fn group(&self, capability: Capability) -> &Group {
        match capability {
            Capability::Accelerometer => &self.accel,
            Capability::Gyroscope => &self.gyro,
            Capability::Magnetometer => &self.magneto,
        }
    }

    fn group_mut(&mut self, capability: Capability) -> &mut Group {
        match capability {
            Capability::Accelerometer => &mut self.accel,
            Capability::Gyroscope => &mut self.gyro,
            Capability::Magnetometer => &mut self.magneto,
        }
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.group(capability).enabled
    }

    /// Currently programmed scale
    pub fn scale(&self, capability: Capability) -> &'static Scale {
        self.group(capability).scale
    }

    /// Choose the scale `initialize` will program, without touching the bus
    pub fn with_scale(mut self, capability: Capability, label: &str) -> SensorResult<Self> {
        self.group_mut(capability).scale = capability.lookup(label)?;
        Ok(self)
    }

    fn init_sequence(&self, capability: Capability) -> Vec<[u8; 2]> {
        let scale = capability.scale_write(self.scale(capability));
        match capability {
            Capability::Gyroscope => vec![
                // 95 Hz, 25 Hz cutoff, normal mode, all axes
                [CTRL_REG1_G, 0x1F],
                [CTRL_REG2_G, 0x00],
                // INT1 enabled, data ready on DRDY_G
                [CTRL_REG3_G, 0x88],
                scale,
            ],
            Capability::Accelerometer => vec![
                [CTRL_REG0_XM, 0x00],
                // 50 Hz, all axes
                [CTRL_REG1_XM, 0x57],
                scale,
                // data ready on INT1_XM
                [CTRL_REG3_XM, 0x04],
            ],
            Capability::Magnetometer => vec![
                // temperature sensor on, 100 Hz
                [CTRL_REG5_XM, 0x94],
                scale,
                // continuous conversion
                [CTRL_REG7_XM, 0x00],
                // magnetometer data ready on INT2_XM
                [CTRL_REG4_XM, 0x04],
            ],
        }
    }

    fn init_capability(&self, bus: &mut dyn I2c, capability: Capability) -> SensorResult<()> {
        let address = capability.address();
        for write in self.init_sequence(capability) {
            bus.write_to(address, &write)?;
        }
        debug!("[lsm9ds0] {} {} configured", self.id, capability.name());
        Ok(())
    }

    /// Configure every enabled capability. Each sequence stops at its first
    /// failed write; the others still run. Returns one error per failed
    /// capability.
    pub fn initialize(&mut self, bus: &mut dyn I2c) -> Vec<SensorError> {
        let mut errors = Vec::new();
        for capability in [
            Capability::Gyroscope,
            Capability::Accelerometer,
            Capability::Magnetometer,
        ] {
            if !self.is_enabled(capability) {
                continue;
            }
            if let Err(e) = self.init_capability(bus, capability) {
                warn!(
                    "[lsm9ds0] {} {} init failed: {}",
                    self.id,
                    capability.name(),
                    e
                );
                errors.push(e);
            }
        }
        errors
    }

    fn read_vector(&self, bus: &mut dyn I2c, capability: Capability) -> SensorResult<Vector3> {
        if !self.is_enabled(capability) {
            return Err(SensorError::CapabilityDisabled {
                sensor: self.id.clone(),
                capability: capability.name(),
            });
        }
        let mut raw = [0u8; 6];
        bus.block_read_from_register(
            capability.address(),
            capability.output_register() | AUTO_INCREMENT,
            &mut raw,
        )?;
        Ok(Vector3::from_le_bytes(&raw, self.scale(capability).sensitivity))
    }

    /// Acceleration in g
    pub fn read_accel(&self, bus: &mut dyn I2c) -> SensorResult<Vector3> {
        self.read_vector(bus, Capability::Accelerometer)
    }

    /// Angular rate in degrees per second
    pub fn read_gyro(&self, bus: &mut dyn I2c) -> SensorResult<Vector3> {
        self.read_vector(bus, Capability::Gyroscope)
    }

    /// Magnetic field in gauss
    pub fn read_magneto(&self, bus: &mut dyn I2c) -> SensorResult<Vector3> {
        self.read_vector(bus, Capability::Magnetometer)
    }

    fn set_scale(
        &mut self,
        bus: &mut dyn I2c,
        capability: Capability,
        label: &str,
    ) -> SensorResult<()> {
        let scale = capability.lookup(label)?;
        bus.write_to(capability.address(), &capability.scale_write(scale))?;
        self.group_mut(capability).scale = scale;
        Ok(())
    }

    pub fn set_accel_scale(&mut self, bus: &mut dyn I2c, label: &str) -> SensorResult<()> {
        self.set_scale(bus, Capability::Accelerometer, label)
    }

    pub fn set_gyro_scale(&mut self, bus: &mut dyn I2c, label: &str) -> SensorResult<()> {
        self.set_scale(bus, Capability::Gyroscope, label)
    }

    pub fn set_magneto_scale(&mut self, bus: &mut dyn I2c, label: &str) -> SensorResult<()> {
        self.set_scale(bus, Capability::Magnetometer, label)
    }
}

impl SensorDriver for Lsm9ds0 {
    fn init(&mut self, bus: &mut dyn I2c) -> SensorResult<()> {
        let errors = self.initialize(bus);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SensorError::PartialInit {
                sensor: self.id.clone(),
                errors,
            })
        }
    }

    fn read(&mut self, bus: &mut dyn I2c) -> SensorResult<SensorDataFrame> {
        let mut frame = SensorDataFrame::default();
        if self.accel.enabled {
            frame.accel = Some(self.read_accel(bus)?);
        }
        if self.gyro.enabled {
            frame.gyro = Some(self.read_gyro(bus)?);
        }
        if self.magneto.enabled {
            frame.mag = Some(self.read_magneto(bus)?);
        }
        Ok(frame)
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn bus(&self) -> &str {
        &self.bus_id
    }
}

pub static LSM9DS0_FACTORY: Lsm9ds0Factory = Lsm9ds0Factory;

pub struct Lsm9ds0Factory;

impl SensorFactory for Lsm9ds0Factory {
    fn name(&self) -> &'static str {
        "lsm9ds0"
    }

    fn create(&self, entry: &SensorEntry) -> SensorResult<Box<dyn SensorDriver>> {
        if !(entry.accel || entry.gyro || entry.magneto) {
            return Err(SensorError::InitError {
                sensor: entry.id.clone(),
                reason: "no capability enabled".to_string(),
            });
        }
        let mut driver = Lsm9ds0::new(
            entry.id.clone(),
            entry.bus.clone(),
            entry.accel,
            entry.gyro,
            entry.magneto,
        );
        for (capability, label) in [
            (Capability::Accelerometer, &entry.accel_scale),
            (Capability::Gyroscope, &entry.gyro_scale),
            (Capability::Magnetometer, &entry.magneto_scale),
        ] {
            if let Some(label) = label {
                driver = driver.with_scale(capability, label)?;
            }
        }
        Ok(Box::new(driver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::{DeviceOp, RecordingDevice};
    use crate::bus::I2cBus;
    use crate::errors::BusError;

    fn bus() -> I2cBus<RecordingDevice> {
        I2cBus::with_device(RecordingDevice::default())
    }

    fn imu() -> Lsm9ds0 {
        Lsm9ds0::new("imu0".to_string(), "i2c".to_string(), true, true, true)
    }

    #[test]
    fn test_initialize_write_sequences() {
        let mut bus = bus();
        let mut imu = imu();
        assert!(imu.initialize(&mut bus).is_empty());

        assert_eq!(
            bus.device().writes_to(ADDRESS_G),
            vec![
                vec![0x20, 0x1F],
                vec![0x21, 0x00],
                vec![0x22, 0x88],
                vec![0x23, 0x00],
            ]
        );
        assert_eq!(
            bus.device().writes_to(ADDRESS_XM),
            vec![
                vec![0x1F, 0x00],
                vec![0x20, 0x57],
                vec![0x21, 0x00],
                vec![0x22, 0x04],
                vec![0x24, 0x94],
                vec![0x25, 0x00],
                vec![0x26, 0x00],
                vec![0x23, 0x04],
            ]
        );
    }

    #[test]
    fn test_partial_init_keeps_other_capabilities() {
        let mut bus = bus();
        bus.device_mut().fail_registers.push((ADDRESS_G, CTRL_REG2_G));
        let mut imu = imu();

        let errors = imu.initialize(&mut bus);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], SensorError::Bus(BusError::IoFailure { .. })));

        // gyro stopped at the failing write
        assert_eq!(
            bus.device().writes_to(ADDRESS_G),
            vec![vec![0x20, 0x1F], vec![0x21, 0x00]]
        );
        assert_eq!(bus.device().writes_to(ADDRESS_XM).len(), 8);
    }

    #[test]
    fn test_driver_init_reports_partial_failure() {
        let mut bus = bus();
        bus.device_mut().fail_registers.push((ADDRESS_XM, CTRL_REG1_XM));
        bus.device_mut().fail_registers.push((ADDRESS_XM, CTRL_REG5_XM));
        let mut imu = imu();
        match SensorDriver::init(&mut imu, &mut bus) {
            Err(SensorError::PartialInit { sensor, errors }) => {
                assert_eq!(sensor, "imu0");
                assert_eq!(errors.len(), 2);
            }
            other => panic!("unexpected init result: {:?}", other),
        }
    }

    #[test]
    fn test_disabled_capability_is_skipped() {
        let mut bus = bus();
        let mut imu = Lsm9ds0::new("imu0".to_string(), "i2c".to_string(), true, false, false);
        assert!(imu.initialize(&mut bus).is_empty());
        assert!(bus.device().writes_to(ADDRESS_G).is_empty());
        assert_eq!(bus.device().writes_to(ADDRESS_XM).len(), 4);

        let ops_before = bus.device().ops.len();
        assert!(matches!(
            imu.read_gyro(&mut bus),
            Err(SensorError::CapabilityDisabled {
                capability: "gyroscope",
                ..
            })
        ));
        assert_eq!(bus.device().ops.len(), ops_before);
    }

    #[test]
    fn test_read_gyro_block_transfer() {
        let mut bus = bus();
        bus.device_mut()
            .read_responses
            .push_back(vec![0x00, 0x01, 0x00, 0x00, 0x00, 0xff]);
        let imu = imu();

        let v = imu.read_gyro(&mut bus).unwrap();
        assert!((v.x - 2.24).abs() < 1e-9);
        assert_eq!(v.y, 0.0);
        assert!((v.z + 2.24).abs() < 1e-9);

        match &bus.device().ops[..] {
            [DeviceOp::Transfer(messages)] => {
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[0].address, ADDRESS_G);
                assert_eq!(messages[0].data, vec![0xA8]);
                assert_eq!(messages[1].len, 6);
            }
            ops => panic!("unexpected ops: {:?}", ops),
        }
    }

    #[test]
    fn test_read_magneto_register() {
        let mut bus = bus();
        bus.device_mut().read_responses.push_back(vec![0x10, 0x00, 0, 0, 0, 0]);
        let imu = imu();
        let v = imu.read_magneto(&mut bus).unwrap();
        assert!((v.x - 16.0 * 0.08 / 1000.0).abs() < 1e-12);
        match &bus.device().ops[..] {
            [DeviceOp::Transfer(messages)] => {
                assert_eq!(messages[0].address, ADDRESS_XM);
                assert_eq!(messages[0].data, vec![0x88]);
            }
            ops => panic!("unexpected ops: {:?}", ops),
        }
    }

    #[test]
    fn test_set_accel_scale() {
        let mut bus = bus();
        let mut imu = imu();
        imu.set_accel_scale(&mut bus, "4").unwrap();
        assert_eq!(imu.scale(Capability::Accelerometer).sensitivity, 0.122);
        assert_eq!(bus.device().writes_to(ADDRESS_XM), vec![vec![0x21, 0x08]]);

        assert!(matches!(
            imu.set_accel_scale(&mut bus, "3"),
            Err(SensorError::InvalidScale { .. })
        ));
        assert_eq!(imu.scale(Capability::Accelerometer).label, "4");
        assert_eq!(bus.device().writes_to(ADDRESS_XM).len(), 1);
    }

    #[test]
    fn test_failed_scale_write_keeps_previous() {
        let mut bus = bus();
        bus.device_mut().fail_registers.push((ADDRESS_G, CTRL_REG4_G));
        let mut imu = imu();
        assert!(imu.set_gyro_scale(&mut bus, "2000").is_err());
        assert_eq!(imu.scale(Capability::Gyroscope).label, "245");
    }

    #[test]
    fn test_scale_codes_shifted() {
        let mut bus = bus();
        let mut imu = imu();
        imu.set_gyro_scale(&mut bus, "2000").unwrap();
        imu.set_magneto_scale(&mut bus, "12").unwrap();
        assert_eq!(bus.device().writes_to(ADDRESS_G), vec![vec![0x23, 0x20]]);
        assert_eq!(bus.device().writes_to(ADDRESS_XM), vec![vec![0x25, 0x60]]);
    }

    #[test]
    fn test_read_frame_scaled() {
        let mut bus = bus();
        let mut imu = imu().with_scale(Capability::Accelerometer, "16").unwrap();
        for _ in 0..3 {
            bus.device_mut()
                .read_responses
                .push_back(vec![0xe8, 0x03, 0, 0, 0, 0]);
        }
        let frame = SensorDriver::read(&mut imu, &mut bus).unwrap();
        assert!((frame.accel.unwrap().x - 0.732).abs() < 1e-9);
        assert!((frame.gyro.unwrap().x - 8.75).abs() < 1e-9);
        assert!((frame.mag.unwrap().x - 0.08).abs() < 1e-9);
    }

    #[test]
    fn test_factory_applies_scales() {
        let entry = SensorEntry {
            id: "imu0".to_string(),
            driver: "lsm9ds0".to_string(),
            bus: "i2c".to_string(),
            frequency: None,
            accel: true,
            gyro: false,
            magneto: false,
            accel_scale: Some("7".to_string()),
            gyro_scale: None,
            magneto_scale: None,
        };
        assert!(matches!(
            LSM9DS0_FACTORY.create(&entry),
            Err(SensorError::InvalidScale { .. })
        ));

        let none = SensorEntry {
            accel: false,
            accel_scale: None,
            ..entry
        };
        assert!(matches!(
            LSM9DS0_FACTORY.create(&none),
            Err(SensorError::InitError { .. })
        ));
    }
}

use crate::sensors::{SensorDataFrame, Vector3};
use serde::Serialize;

/// Header metadata common to all published readings
#[derive(Serialize, Clone, Debug)]
pub struct Header {
    /// Board the reading came from
    pub device_id: String,
    pub sensor_id: String,
    /// Sequence number for message ordering
    pub seq: u64,
    /// UTC timestamp in nanoseconds
    pub t_utc_ns: u64,
    /// Message schema version for evolution
    pub schema_v: u16,
}

impl Header {
    /// Create a new header stamped with the current time
    pub fn new(device_id: String, sensor_id: String, seq: u64) -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};

        let t_utc_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;

        Self {
            device_id,
            sensor_id,
            seq,
            t_utc_ns,
            schema_v: 1,
        }
    }
}

/// One polling cycle of a sensor; absent capabilities are omitted
#[derive(Serialize, Clone, Debug)]
pub struct ReadingMessage {
    pub h: Header,
    /// g
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accel: Option<Vector3>,
    /// degrees per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gyro: Option<Vector3>,
    /// gauss
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mag: Option<Vector3>,
}

impl ReadingMessage {
    pub fn new(h: Header, frame: SensorDataFrame) -> Self {
        Self {
            h,
            accel: frame.accel,
            gyro: frame.gyro,
            mag: frame.mag,
        }
    }

    /// Single-line JSON, one reading per output line
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_creation() {
        let header = Header::new("edison".to_string(), "imu0".to_string(), 42);

        assert_eq!(header.device_id, "edison");
        assert_eq!(header.sensor_id, "imu0");
        assert_eq!(header.seq, 42);
        assert_eq!(header.schema_v, 1);
        assert!(header.t_utc_ns > 0);
    }

    #[test]
    fn test_reading_serialization() {
        let frame = SensorDataFrame {
            accel: Some(Vector3 {
                x: 0.0,
                y: 0.5,
                z: 1.0,
            }),
            gyro: None,
            mag: None,
        };
        let header = Header::new("edison".to_string(), "imu0".to_string(), 1);
        let msg = ReadingMessage::new(header, frame);

        let json = msg.to_json().unwrap();
        assert!(!json.contains('\n'));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["h"]["sensor_id"], "imu0");
        assert_eq!(value["accel"]["z"], 1.0);
        assert!(value.get("gyro").is_none());
        assert!(value.get("mag").is_none());
    }
}

//! Resource model shared across the federation
//!
//! The federation treats domain payloads as opaque beyond this contract: a
//! display name, an optional description, an optional externally-meaningful
//! unique identifier string, and an optional validity period. Everything else
//! (sensor metadata schemas, observation result encodings) belongs to the
//! stores and their callers.

use crate::filter::TimeRange;
use crate::scoped_id::ScopedId;
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// Contract the filter algebra evaluates resources against
pub trait Resource {
    /// Human-readable name
    fn name(&self) -> &str;

    /// Longer free-text description, if any
    fn description(&self) -> Option<&str>;

    /// Externally-meaningful unique identifier (e.g. a sensor URN)
    fn uid(&self) -> Option<&str>;

    /// Period during which this resource description is valid
    ///
    /// `None` means "valid for all time".
    fn valid_time(&self) -> Option<TimeRange>;
}

/// Description of a sensing system (sensor, platform, process)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemDesc {
    /// Unique identifier, e.g. `urn:osh:sensor:weather001`
    pub uid: String,
    /// Display name
    pub name: String,
    /// Free-text description
    pub description: Option<String>,
    /// Validity period of this description
    pub valid_time: Option<TimeRange>,
}

impl SystemDesc {
    /// Create a description with just a UID and a name
    pub fn new(uid: impl Into<String>, name: impl Into<String>) -> Self {
        SystemDesc {
            uid: uid.into(),
            name: name.into(),
            description: None,
            valid_time: None,
        }
    }

    /// Attach a free-text description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a validity period
    pub fn with_valid_time(mut self, valid_time: TimeRange) -> Self {
        self.valid_time = Some(valid_time);
        self
    }
}

impl Resource for SystemDesc {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn uid(&self) -> Option<&str> {
        Some(&self.uid)
    }

    fn valid_time(&self) -> Option<TimeRange> {
        self.valid_time
    }
}

/// Sampling feature: the real-world thing a system observes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Unique identifier
    pub uid: String,
    /// Display name
    pub name: String,
    /// Free-text description
    pub description: Option<String>,
    /// Validity period
    pub valid_time: Option<TimeRange>,
}

impl Feature {
    /// Create a feature with just a UID and a name
    pub fn new(uid: impl Into<String>, name: impl Into<String>) -> Self {
        Feature {
            uid: uid.into(),
            name: name.into(),
            description: None,
            valid_time: None,
        }
    }

    /// Attach a free-text description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a validity period
    pub fn with_valid_time(mut self, valid_time: TimeRange) -> Self {
        self.valid_time = Some(valid_time);
        self
    }
}

impl Resource for Feature {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn uid(&self) -> Option<&str> {
        Some(&self.uid)
    }

    fn valid_time(&self) -> Option<TimeRange> {
        self.valid_time
    }
}

/// Single observation produced by a system
///
/// The result payload is an opaque JSON value; the federation only interprets
/// the system reference and the phenomenon time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObsRecord {
    /// Federation-wide id of the producing system
    pub system_id: ScopedId,
    /// When the observed phenomenon occurred
    pub phenomenon_time: Timestamp,
    /// Opaque observation result
    #[serde(with = "json_text")]
    pub result: serde_json::Value,
    /// Where the sample was taken (lat, lon), if georeferenced
    pub sampling_point: Option<(f64, f64)>,
}

impl ObsRecord {
    /// Create an observation with no sampling point
    pub fn new(system_id: ScopedId, phenomenon_time: Timestamp, result: serde_json::Value) -> Self {
        ObsRecord {
            system_id,
            phenomenon_time,
            result,
            sampling_point: None,
        }
    }

    /// Attach a sampling location
    pub fn with_sampling_point(mut self, lat: f64, lon: f64) -> Self {
        self.sampling_point = Some((lat, lon));
        self
    }
}

/// Serde adapter carrying a JSON value as its text form
///
/// Non-self-describing codecs (bincode) cannot deserialize a bare
/// `serde_json::Value`, so the opaque result payload travels as a string.
pub mod json_text {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize the value as compact JSON text
    pub fn serialize<S: Serializer>(
        value: &serde_json::Value,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Parse the value back from JSON text
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<serde_json::Value, D::Error> {
        let text = String::deserialize(deserializer)?;
        serde_json::from_str(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_desc_resource_contract() {
        let sys = SystemDesc::new("urn:osh:sensor:weather001", "Weather Station 1")
            .with_description("Rooftop station");

        assert_eq!(sys.name(), "Weather Station 1");
        assert_eq!(sys.uid(), Some("urn:osh:sensor:weather001"));
        assert_eq!(sys.description(), Some("Rooftop station"));
        assert!(sys.valid_time().is_none());
    }

    #[test]
    fn test_feature_valid_time() {
        let range = TimeRange::new(Timestamp::from_secs(10), Timestamp::from_secs(20)).unwrap();
        let feature = Feature::new("urn:osh:foi:river1", "River gauge site").with_valid_time(range);
        assert_eq!(feature.valid_time(), Some(range));
    }

    #[test]
    fn test_obs_record_serialization() {
        let obs = ObsRecord::new(
            ScopedId::from_raw(101),
            Timestamp::from_secs(1000),
            serde_json::json!({"temp": 21.5}),
        )
        .with_sampling_point(45.0, -122.0);

        let encoded = bincode::serialize(&obs).unwrap();
        let restored: ObsRecord = bincode::deserialize(&encoded).unwrap();
        assert_eq!(obs, restored);
    }
}

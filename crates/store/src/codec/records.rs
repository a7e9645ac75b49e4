//! Shipped codecs for the built-in record types
//!
//! Observation payloads have two versions in the wild. Version 1 predates
//! scope-packed identifiers and sampling geometry: it stored the raw id
//! value and the result as JSON text. Its decoder migrates to the current
//! shape so callers never see the old layout. System and feature
//! descriptions are still on their first payload version.

use obshub_core::{CoreError, Feature, ObsRecord, Result, ScopedId, SystemDesc, Timestamp};
use serde::{Deserialize, Serialize};

use super::VersionedCodec;

const OBS_V1: u32 = 1;
const OBS_V2: u32 = 2;
const SYSTEM_V1: u32 = 1;
const FEATURE_V1: u32 = 1;

#[derive(Serialize, Deserialize)]
struct ObsRecordV1 {
    system_ref: u64,
    phenomenon_time: Timestamp,
    result_json: String,
}

fn decode_obs_v1(bytes: &[u8]) -> Result<ObsRecord> {
    let old: ObsRecordV1 = bincode::deserialize(bytes)?;
    let result: serde_json::Value = serde_json::from_str(&old.result_json)
        .map_err(|e| CoreError::Decode(format!("v1 result payload: {e}")))?;
    Ok(ObsRecord::new(
        ScopedId::from_raw(old.system_ref),
        old.phenomenon_time,
        result,
    ))
}

fn encode_bincode<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(record)?)
}

fn decode_bincode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

/// Codec for observation records, with v1 migration
pub fn obs_codec() -> VersionedCodec<ObsRecord> {
    // the builder only fails without a current version, which is set here
    VersionedCodec::builder()
        .with_decoder(OBS_V1, decode_obs_v1)
        .current(OBS_V2, encode_bincode, decode_bincode)
        .build()
        .unwrap_or_else(|_| unreachable!())
}

/// Codec for system descriptions
pub fn system_codec() -> VersionedCodec<SystemDesc> {
    VersionedCodec::builder()
        .current(SYSTEM_V1, encode_bincode, decode_bincode)
        .build()
        .unwrap_or_else(|_| unreachable!())
}

/// Codec for sampling features
pub fn feature_codec() -> VersionedCodec<Feature> {
    VersionedCodec::builder()
        .current(FEATURE_V1, encode_bincode, decode_bincode)
        .build()
        .unwrap_or_else(|_| unreachable!())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_obs_round_trip_current() {
        let codec = obs_codec();
        let record = ObsRecord::new(
            ScopedId::from_raw(407),
            Timestamp::from_secs(1_700_000_000),
            json!({"temp": 21.5}),
        )
        .with_sampling_point(48.85, 2.35);

        let bytes = codec.encode(&record).unwrap();
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_obs_v1_migration() {
        let old = ObsRecordV1 {
            system_ref: 407,
            phenomenon_time: Timestamp::from_secs(1_600_000_000),
            result_json: r#"{"level":3.2}"#.to_string(),
        };
        let mut bytes = vec![OBS_V1 as u8];
        bytes.extend(bincode::serialize(&old).unwrap());

        let decoded = obs_codec().decode(&bytes).unwrap();
        assert_eq!(decoded.system_id, ScopedId::from_raw(407));
        assert_eq!(decoded.phenomenon_time, Timestamp::from_secs(1_600_000_000));
        assert_eq!(decoded.result, json!({"level": 3.2}));
        assert_eq!(decoded.sampling_point, None);
    }

    #[test]
    fn test_obs_v1_bad_json_is_decode_error() {
        let old = ObsRecordV1 {
            system_ref: 1,
            phenomenon_time: Timestamp::EPOCH,
            result_json: "not json".to_string(),
        };
        let mut bytes = vec![OBS_V1 as u8];
        bytes.extend(bincode::serialize(&old).unwrap());

        assert!(matches!(
            obs_codec().decode(&bytes),
            Err(CoreError::Decode(_))
        ));
    }

    #[test]
    fn test_obs_future_version_rejected() {
        let bytes = vec![3u8, 0, 0, 0];
        assert!(matches!(
            obs_codec().decode(&bytes),
            Err(CoreError::UnknownVersion(3))
        ));
    }

    #[test]
    fn test_system_round_trip() {
        let codec = system_codec();
        let desc = SystemDesc::new("urn:osh:sensor:42", "Weather Station")
            .with_description("rooftop array");
        let decoded = codec.decode(&codec.encode(&desc).unwrap()).unwrap();
        assert_eq!(decoded, desc);
    }

    #[test]
    fn test_feature_round_trip() {
        let codec = feature_codec();
        let feature = Feature::new("urn:osh:foi:9", "River Segment");
        let decoded = codec.decode(&codec.encode(&feature).unwrap()).unwrap();
        assert_eq!(decoded, feature);
    }
}

//! pprof profile decoding
//!
//! Profiling endpoints serve gzip-compressed protobuf. The decoder parses the
//! profile, checks that it is structurally sound, and writes it back
//! uncompressed so it can be inspected without another decompression step.

use super::PostProcessor;
use super::profile::Profile;
use crate::error::TransformError;
use crate::types::ResourceMeta;
use flate2::read::GzDecoder;
use prost::Message;
use std::io::Read;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decodes a pprof profile and re-encodes it uncompressed
#[derive(Clone, Copy, Debug, Default)]
pub struct PprofDecoder;

impl PprofDecoder {
    /// Parse a profile from raw or gzip-compressed bytes
    pub fn parse(raw: &[u8]) -> Result<Profile, TransformError> {
        if raw.is_empty() {
            return Err(TransformError::Invalid("empty profile".to_string()));
        }

        let profile = if raw.starts_with(&GZIP_MAGIC) {
            let mut decompressed = Vec::new();
            GzDecoder::new(raw)
                .read_to_end(&mut decompressed)
                .map_err(TransformError::Decompress)?;
            Profile::decode(decompressed.as_slice())?
        } else {
            Profile::decode(raw)?
        };

        validate(&profile)?;
        Ok(profile)
    }
}

impl PostProcessor for PprofDecoder {
    fn process(&self, raw: &[u8], _meta: &ResourceMeta<'_>) -> Result<Vec<u8>, TransformError> {
        let profile = Self::parse(raw)?;
        Ok(profile.encode_to_vec())
    }

    fn name(&self) -> &'static str {
        "pprof"
    }
}

fn validate(profile: &Profile) -> Result<(), TransformError> {
    match profile.string_table.first() {
        None => {
            return Err(TransformError::Invalid(
                "profile has no string table".to_string(),
            ));
        }
        Some(first) if !first.is_empty() => {
            return Err(TransformError::Invalid(format!(
                "string table must start with an empty string, found {:?}",
                first
            )));
        }
        Some(_) => {}
    }

    let value_count = profile.sample_type.len();
    if let Some((index, sample)) = profile
        .sample
        .iter()
        .enumerate()
        .find(|(_, s)| s.value.len() != value_count)
    {
        return Err(TransformError::Invalid(format!(
            "sample {} has {} values, expected {}",
            index,
            sample.value.len(),
            value_count
        )));
    }

    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::post_processing::profile::{Function, Line, Location, Sample, ValueType};
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn meta() -> ResourceMeta<'static> {
        ResourceMeta {
            remote_path: "/debug/pprof/heap",
            content_type: Some("application/octet-stream"),
        }
    }

    fn heap_profile() -> Profile {
        Profile {
            sample_type: vec![
                ValueType { r#type: 1, unit: 2 },
                ValueType { r#type: 3, unit: 4 },
            ],
            sample: vec![Sample {
                location_id: vec![1, 2],
                value: vec![10, 4096],
                label: vec![],
            }],
            string_table: ["", "alloc_objects", "count", "alloc_space", "bytes"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            period: 524288,
            ..Default::default()
        }
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn gzipped_profile_is_written_uncompressed() {
        let profile = heap_profile();
        let compressed = gzip(&profile.encode_to_vec());

        let output = PprofDecoder.process(&compressed, &meta()).unwrap();

        assert!(!output.starts_with(&GZIP_MAGIC));
        assert_eq!(Profile::decode(output.as_slice()).unwrap(), profile);
    }

    #[test]
    fn uncompressed_profile_is_accepted() {
        let profile = heap_profile();
        let output = PprofDecoder
            .process(&profile.encode_to_vec(), &meta())
            .unwrap();

        assert_eq!(Profile::decode(output.as_slice()).unwrap(), profile);
    }

    #[test]
    fn source_columns_and_doc_url_survive() {
        let mut profile = heap_profile();
        profile.string_table.extend(["main".to_string(), "https://go.dev/doc".to_string()]);
        profile.doc_url = 6;
        profile.function = vec![Function {
            id: 1,
            name: 5,
            ..Default::default()
        }];
        profile.location = vec![Location {
            id: 1,
            line: vec![Line {
                function_id: 1,
                line: 42,
                column: 7,
            }],
            ..Default::default()
        }];

        let output = PprofDecoder
            .process(&gzip(&profile.encode_to_vec()), &meta())
            .unwrap();
        let decoded = Profile::decode(output.as_slice()).unwrap();

        assert_eq!(decoded.doc_url, 6);
        assert_eq!(decoded.location[0].line[0].column, 7);
        assert_eq!(decoded, profile);
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(matches!(
            PprofDecoder.process(&[], &meta()),
            Err(TransformError::Invalid(_))
        ));
    }

    #[test]
    fn plain_text_is_not_a_profile() {
        assert!(PprofDecoder.process(b"up 1\n", &meta()).is_err());
    }

    #[test]
    fn truncated_gzip_is_rejected() {
        let compressed = gzip(&heap_profile().encode_to_vec());
        let truncated = &compressed[..compressed.len() / 2];

        assert!(PprofDecoder.process(truncated, &meta()).is_err());
    }

    #[test]
    fn string_table_must_start_empty() {
        let mut profile = heap_profile();
        profile.string_table[0] = "bogus".to_string();

        match PprofDecoder.process(&profile.encode_to_vec(), &meta()) {
            Err(TransformError::Invalid(msg)) => assert!(msg.contains("bogus")),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn sample_value_count_must_match_sample_types() {
        let mut profile = heap_profile();
        profile.sample[0].value.pop();

        match PprofDecoder.process(&profile.encode_to_vec(), &meta()) {
            Err(TransformError::Invalid(msg)) => assert!(msg.contains("expected 2")),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }
}

//! Common test utilities for promdiag integration tests

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use prost::Message;
use promdiag::post_processing::profile::{Profile, Sample, ValueType};
use promdiag::{Collector, CollectorConfig};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Metrics exposition served by the mock server
pub const METRICS_BODY: &str = "# HELP up Whether the target is up.\n# TYPE up gauge\nup 1\n";

/// A small but structurally valid profile
pub fn sample_profile(samples: i64) -> Profile {
    Profile {
        sample_type: vec![ValueType { r#type: 1, unit: 2 }],
        sample: (0..samples)
            .map(|i| Sample {
                location_id: vec![1],
                value: vec![i + 1],
                label: vec![],
            })
            .collect(),
        string_table: vec!["".into(), "goroutine".into(), "count".into()],
        ..Default::default()
    }
}

/// Gzip-compressed encoding, the way pprof endpoints serve profiles
pub fn gzipped(profile: &Profile) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&profile.encode_to_vec())
        .expect("gzip write failed");
    encoder.finish().expect("gzip finish failed")
}

/// Mount a 200 response with the given body and delay
pub async fn mount_body(server: &MockServer, route: &str, body: Vec<u8>, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(body)
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Mount a bare status response
pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Collector writing into `dir` with the given fetch timeout
pub fn collector_in(dir: &Path, timeout: Duration) -> Collector {
    Collector::new(CollectorConfig {
        fetch_timeout: timeout,
        output_dir: dir.to_path_buf(),
        ..Default::default()
    })
    .expect("valid collector config")
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::archive::read_bundle;
use crate::error::TransformError;
use crate::post_processing::PassThrough;
use crate::types::{ResourceEntry, ResourceMeta, RunOutcome};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_collector(output_dir: &Path, timeout: Duration) -> Collector {
    Collector::new(CollectorConfig {
        fetch_timeout: timeout,
        output_dir: output_dir.to_path_buf(),
        ..Default::default()
    })
    .unwrap()
}

async fn mount_text(server: &MockServer, route: &str, body: &str, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

fn archived_names(archive: &Path) -> Vec<String> {
    read_bundle(archive)
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect()
}

#[tokio::test]
async fn single_metrics_resource_is_archived() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    mount_text(&mock_server, "/metrics", "up 1\n", Duration::ZERO).await;

    let spec = BundleSpec::new(mock_server.uri(), "debug.tar.gz").with_resource(
        ResourceEntry::new("/metrics", "metrics.txt", PassThrough),
    );
    let collector = test_collector(temp_dir.path(), Duration::from_secs(5));

    let result = collector.run(&spec).await.unwrap();

    assert!(result.failures.is_empty());
    assert_eq!(result.outcome(), RunOutcome::Complete);
    assert_eq!(result.archive_path, temp_dir.path().join("debug.tar.gz"));

    let files = read_bundle(&result.archive_path).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "metrics.txt");
    assert_eq!(files[0].data, b"up 1\n");
    assert_eq!(result.collected[0].bytes, 5);
}

#[tokio::test]
async fn timed_out_resource_is_isolated() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    mount_text(&mock_server, "/metrics", "up 1\n", Duration::ZERO).await;
    mount_text(
        &mock_server,
        "/debug/pprof/heap",
        "never arrives",
        Duration::from_secs(5),
    )
    .await;

    let spec = BundleSpec::new(mock_server.uri(), "debug.tar.gz")
        .with_resource(ResourceEntry::new("/metrics", "metrics.txt", PassThrough))
        .with_resource(ResourceEntry::new(
            "/debug/pprof/heap",
            "heap.pb",
            PassThrough,
        ));
    let collector = test_collector(temp_dir.path(), Duration::from_millis(300));

    let result = collector.run(&spec).await.unwrap();

    assert_eq!(result.outcome(), RunOutcome::Partial);
    assert_eq!(archived_names(&result.archive_path), ["metrics.txt"]);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].remote_path, "/debug/pprof/heap");
    assert!(matches!(
        result.failures[0].error,
        ResourceError::Network {
            timed_out: true,
            ..
        }
    ));
}

#[tokio::test]
async fn empty_spec_produces_empty_archive() {
    let temp_dir = TempDir::new().unwrap();
    let collector = test_collector(temp_dir.path(), Duration::from_secs(5));
    let spec = BundleSpec::new("http://127.0.0.1:9", "debug.tar.gz");

    let result = collector.run(&spec).await.unwrap();

    assert!(result.failures.is_empty());
    assert!(result.collected.is_empty());
    assert!(result.archive_path.is_file());
    assert!(read_bundle(&result.archive_path).unwrap().is_empty());
}

#[tokio::test]
async fn archive_order_ignores_completion_order() {
    let names = ["a.txt", "b.txt", "c.txt", "d.txt"];
    let delay_orders: [[u64; 4]; 3] = [[300, 0, 200, 100], [0, 100, 200, 300], [300, 200, 100, 0]];

    for delays in delay_orders {
        let temp_dir = TempDir::new().unwrap();
        let mock_server = MockServer::start().await;
        let mut spec = BundleSpec::new(mock_server.uri(), "debug.tar.gz");

        for (name, delay) in names.iter().zip(delays) {
            let route = format!("/{}", name);
            mount_text(&mock_server, &route, name, Duration::from_millis(delay)).await;
            spec = spec.with_resource(ResourceEntry::new(route, *name, PassThrough));
        }

        let result = test_collector(temp_dir.path(), Duration::from_secs(5))
            .run(&spec)
            .await
            .unwrap();

        assert!(result.failures.is_empty(), "delays {delays:?}");
        assert_eq!(
            archived_names(&result.archive_path),
            names,
            "delays {delays:?}"
        );
        let positions: Vec<_> = result.collected.iter().map(|c| c.position).collect();
        assert_eq!(positions, [0, 1, 2, 3]);
    }
}

#[tokio::test]
async fn fetch_and_transform_failures_are_isolated() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    mount_text(&mock_server, "/metrics", "up 1\n", Duration::ZERO).await;
    mount_text(&mock_server, "/debug/pprof/heap", "not a profile", Duration::ZERO).await;
    Mock::given(method("GET"))
        .and(path("/debug/pprof/block"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let reject = |_: &[u8], _: &ResourceMeta<'_>| -> std::result::Result<Vec<u8>, TransformError> {
        Err(TransformError::Invalid("not a profile".into()))
    };
    let spec = BundleSpec::new(mock_server.uri(), "debug.tar.gz")
        .with_resource(ResourceEntry::new(
            "/debug/pprof/block",
            "block.pb",
            PassThrough,
        ))
        .with_resource(ResourceEntry::new("/debug/pprof/heap", "heap.pb", reject))
        .with_resource(ResourceEntry::new("/metrics", "metrics.txt", PassThrough));

    let result = test_collector(temp_dir.path(), Duration::from_secs(5))
        .run(&spec)
        .await
        .unwrap();

    assert_eq!(archived_names(&result.archive_path), ["metrics.txt"]);

    let failed: Vec<_> = result
        .failures
        .iter()
        .map(|f| f.remote_path.as_str())
        .collect();
    assert_eq!(failed, ["/debug/pprof/block", "/debug/pprof/heap"]);
    assert!(matches!(
        result.failures[0].error,
        ResourceError::HttpStatus { code: 500, .. }
    ));
    assert!(matches!(
        result.failures[1].error,
        ResourceError::PostProcess { .. }
    ));
}

#[tokio::test]
async fn every_resource_failing_still_writes_archive() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let spec = BundleSpec::new(mock_server.uri(), "debug.tar.gz")
        .with_resource(ResourceEntry::new("/metrics", "metrics.txt", PassThrough))
        .with_resource(ResourceEntry::new(
            "/debug/pprof/heap",
            "heap.pb",
            PassThrough,
        ));

    let result = test_collector(temp_dir.path(), Duration::from_secs(5))
        .run(&spec)
        .await
        .unwrap();

    assert_eq!(result.failures.len(), 2);
    assert!(result.collected.is_empty());
    assert!(read_bundle(&result.archive_path).unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_names_fail_before_any_request() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let spec = BundleSpec::new(mock_server.uri(), "debug.tar.gz")
        .with_resource(ResourceEntry::new("/metrics", "out.txt", PassThrough))
        .with_resource(ResourceEntry::new("/federate", "out.txt", PassThrough));

    let result = test_collector(temp_dir.path(), Duration::from_secs(5))
        .run(&spec)
        .await;

    assert!(matches!(result, Err(Error::DuplicateEntry { .. })));
    assert!(!temp_dir.path().join("debug.tar.gz").exists());
    // expect(0) is verified when the mock server drops
}

#[tokio::test]
async fn archive_failure_is_fatal_and_leaves_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let output_dir = temp_dir.path().join("missing");
    let mock_server = MockServer::start().await;
    mount_text(&mock_server, "/metrics", "up 1\n", Duration::ZERO).await;

    let spec = BundleSpec::new(mock_server.uri(), "debug.tar.gz")
        .with_resource(ResourceEntry::new("/metrics", "metrics.txt", PassThrough));

    let result = test_collector(&output_dir, Duration::from_secs(5))
        .run(&spec)
        .await;

    assert!(matches!(result, Err(Error::Archive { .. })));
    assert!(!output_dir.join("debug.tar.gz").exists());
}

#[derive(Clone, Default)]
struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn archive_failure_is_left_to_the_caller_to_report() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let temp_dir = TempDir::new().unwrap();
    let output_dir = temp_dir.path().join("missing");
    let mock_server = MockServer::start().await;
    mount_text(&mock_server, "/metrics", "up 1\n", Duration::ZERO).await;

    let spec = BundleSpec::new(mock_server.uri(), "debug.tar.gz")
        .with_resource(ResourceEntry::new("/metrics", "metrics.txt", PassThrough));
    let result = test_collector(&output_dir, Duration::from_secs(5))
        .run(&spec)
        .await;

    assert!(matches!(result, Err(Error::Archive { .. })));
    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("bundle collection failed"));
    assert!(!output.contains("ERROR"));
}

#[tokio::test]
async fn invalid_server_address_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let spec = BundleSpec::new("ftp://example.com", "debug.tar.gz");

    let result = test_collector(temp_dir.path(), Duration::from_secs(5))
        .run(&spec)
        .await;

    assert!(matches!(result, Err(Error::InvalidSpec(_))));
}

#[test]
fn zero_timeout_config_is_rejected() {
    let result = Collector::new(CollectorConfig {
        fetch_timeout: Duration::ZERO,
        ..Default::default()
    });
    assert!(matches!(result, Err(Error::Config { .. })));
}

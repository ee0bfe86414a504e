//! Snapshot → metric record 매핑
//!
//! 한 번의 poll 결과를 다음 순서로 sink에 기록합니다.
//!
//! 1. `uwsgi_overview` 1개
//! 2. `uwsgi_workers` worker마다 1개 (입력 순서)
//! 3. `uwsgi_apps` app마다 1개 (worker 순서, 그 안에서 app 순서)

use serde::de::IgnoredAny;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use super::parser::{decode_snapshot, StatsSnapshot};
use crate::sink::{FieldValue, Fields, MetricSink, Tags};

/// 서버 전체 measurement 이름
pub const OVERVIEW_MEASUREMENT: &str = "uwsgi_overview";
/// worker measurement 이름
pub const WORKERS_MEASUREMENT: &str = "uwsgi_workers";
/// app measurement 이름
pub const APPS_MEASUREMENT: &str = "uwsgi_apps";

/// 한 번의 poll에서 읽는 최대 바이트 수
pub const MAX_DOCUMENT_BYTES: usize = 16 * 1024 * 1024;

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// stream에서 snapshot을 읽어 sink에 기록
///
/// 첫 JSON 문서가 완성되면 EOF를 기다리지 않고 읽기를 멈춥니다. 연결을
/// 닫지 않는 stats 서버도 poll이 끝납니다.
///
/// 실패하지 않습니다. 읽기 에러는 그때까지 받은 바이트로 디코딩을 진행하며,
/// 디코딩 에러는 기본값 snapshot으로 흡수됩니다.
///
/// # Returns
/// 디코딩된 snapshot (`url`은 `target_label`)
pub async fn process<R, S>(mut stream: R, target_label: &str, sink: &mut S) -> StatsSnapshot
where
    R: AsyncRead + Unpin,
    S: MetricSink + ?Sized,
{
    let buf = read_document(&mut stream, target_label).await;

    let mut snapshot = decode_snapshot(&buf);
    snapshot.url = target_label.to_string();

    debug!(
        server = %target_label,
        workers = snapshot.workers.len(),
        "Decoded stats snapshot"
    );

    emit(&snapshot, sink);
    snapshot
}

/// 첫 문서가 끝나거나, EOF, 읽기 에러, 크기 제한 중 하나까지 읽기
async fn read_document<R>(stream: &mut R, target_label: &str) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    // 전체 파싱은 닫는 괄호가 보이거나 버퍼가 두 배로 커졌을 때만
    let mut next_check = 0;

    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() >= next_check || ends_with_closer(&buf) {
                    if document_settled(&buf) {
                        break;
                    }
                    next_check = buf.len() * 2;
                }
                if buf.len() >= MAX_DOCUMENT_BYTES {
                    warn!(
                        server = %target_label,
                        bytes_read = buf.len(),
                        limit = MAX_DOCUMENT_BYTES,
                        "Stats document exceeds size limit, decoding partial data"
                    );
                    break;
                }
            }
            Err(e) => {
                warn!(
                    server = %target_label,
                    error = %e,
                    bytes_read = buf.len(),
                    "Stats stream read failed, decoding partial data"
                );
                break;
            }
        }
    }

    buf
}

fn ends_with_closer(buf: &[u8]) -> bool {
    matches!(
        buf.iter().rev().find(|b| !b.is_ascii_whitespace()),
        Some(b'}' | b']')
    )
}

/// 첫 JSON 값이 완성됐거나 더 읽어도 고칠 수 없는 구문 에러인지 확인
fn document_settled(buf: &[u8]) -> bool {
    match serde_json::Deserializer::from_slice(buf)
        .into_iter::<IgnoredAny>()
        .next()
    {
        None => false,
        Some(Ok(_)) => true,
        Some(Err(e)) => !e.is_eof(),
    }
}

/// snapshot 전체를 sink에 기록
pub fn emit<S: MetricSink + ?Sized>(snapshot: &StatsSnapshot, sink: &mut S) {
    gather_overview(snapshot, sink);
    gather_workers(snapshot, sink);
    gather_apps(snapshot, sink);
}

fn gather_overview<S: MetricSink + ?Sized>(s: &StatsSnapshot, sink: &mut S) {
    let fields = field_map([
        ("listen_queue", s.listen_queue.into()),
        ("listen_queue_errors", s.listen_queue_errors.into()),
        ("signal_queue", s.signal_queue.into()),
        ("load", s.load.into()),
    ]);
    let tags = tag_map([
        ("url", s.url.clone()),
        ("pid", s.pid.to_string()),
        ("uid", s.uid.to_string()),
        ("gid", s.gid.to_string()),
        ("version", s.version.clone()),
        ("cwd", s.cwd.clone()),
    ]);
    sink.add_fields(OVERVIEW_MEASUREMENT, fields, tags);
}

fn gather_workers<S: MetricSink + ?Sized>(s: &StatsSnapshot, sink: &mut S) {
    for w in &s.workers {
        let fields = field_map([
            ("requests", w.requests.into()),
            ("accepting", w.accepting.into()),
            ("delta_request", w.delta_requests.into()),
            ("harakiri_count", w.harakiri_count.into()),
            ("signals", w.signals.into()),
            ("signal_queue", w.signal_queue.into()),
            ("status", w.status.as_str().into()),
            ("rss", w.rss.into()),
            ("vsz", w.vsz.into()),
            ("running_time", w.running_time.into()),
            ("last_spawn", w.last_spawn.into()),
            ("respawn_count", w.respawn_count.into()),
            ("tx", w.tx.into()),
            ("avg_rt", w.avg_rt.into()),
        ]);
        let tags = tag_map([
            ("worker_id", w.worker_id.to_string()),
            ("url", s.url.clone()),
            ("pid", w.pid.to_string()),
        ]);
        sink.add_fields(WORKERS_MEASUREMENT, fields, tags);
    }
}

fn gather_apps<S: MetricSink + ?Sized>(s: &StatsSnapshot, sink: &mut S) {
    for w in &s.workers {
        for a in &w.apps {
            let fields = field_map([
                ("modifier1", a.modifier1.into()),
                ("requests", a.requests.into()),
                ("startup_time", a.startup_time.into()),
                ("exceptions", a.exceptions.into()),
            ]);
            let tags = tag_map([
                ("app_id", a.app_id.to_string()),
                ("worker_id", w.worker_id.to_string()),
                ("mountpoint", a.mount_point.clone()),
                ("chdir", a.chdir.clone()),
            ]);
            sink.add_fields(APPS_MEASUREMENT, fields, tags);
        }
    }
}

fn field_map<const N: usize>(pairs: [(&str, FieldValue); N]) -> Fields {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn tag_map<const N: usize>(pairs: [(&str, String); N]) -> Tags {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::collector::parser::{AppStats, WorkerStats};
    use crate::sink::Metric;

    fn sample_snapshot() -> StatsSnapshot {
        StatsSnapshot {
            listen_queue: 1,
            load: 2.0,
            pid: 100,
            uid: 33,
            gid: 33,
            version: "2.0.21".to_string(),
            cwd: "/srv".to_string(),
            url: "tcp://127.0.0.1:1717".to_string(),
            workers: vec![
                WorkerStats {
                    worker_id: 1,
                    pid: 200,
                    requests: 5,
                    status: "idle".to_string(),
                    apps: vec![
                        AppStats {
                            app_id: 0,
                            mount_point: "/a".to_string(),
                            ..Default::default()
                        },
                        AppStats {
                            app_id: 1,
                            mount_point: "/b".to_string(),
                            ..Default::default()
                        },
                    ],
                    ..Default::default()
                },
                WorkerStats {
                    worker_id: 2,
                    pid: 201,
                    apps: vec![AppStats {
                        app_id: 0,
                        mount_point: "/c".to_string(),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_emit_count_and_order() {
        let mut records: Vec<Metric> = Vec::new();
        emit(&sample_snapshot(), &mut records);

        let names: Vec<&str> = records.iter().map(|m| m.measurement.as_str()).collect();
        assert_eq!(
            names,
            vec![
                OVERVIEW_MEASUREMENT,
                WORKERS_MEASUREMENT,
                WORKERS_MEASUREMENT,
                APPS_MEASUREMENT,
                APPS_MEASUREMENT,
                APPS_MEASUREMENT,
            ]
        );

        let mountpoints: Vec<&str> = records[3..]
            .iter()
            .map(|m| m.tag("mountpoint").unwrap())
            .collect();
        assert_eq!(mountpoints, vec!["/a", "/b", "/c"]);
        assert_eq!(records[5].tag("worker_id"), Some("2"));
    }

    #[test]
    fn test_overview_fields_and_tags() {
        let mut records: Vec<Metric> = Vec::new();
        emit(&sample_snapshot(), &mut records);

        let overview = &records[0];
        assert_eq!(overview.fields.len(), 4);
        assert_eq!(overview.field("listen_queue"), Some(&FieldValue::Int(1)));
        assert_eq!(overview.field("load"), Some(&FieldValue::Float(2.0)));
        assert_eq!(overview.tag("url"), Some("tcp://127.0.0.1:1717"));
        assert_eq!(overview.tag("pid"), Some("100"));
        assert_eq!(overview.tag("uid"), Some("33"));
        assert_eq!(overview.tag("version"), Some("2.0.21"));
        assert_eq!(overview.tag("cwd"), Some("/srv"));
    }

    #[test]
    fn test_worker_fields_and_tags() {
        let mut records: Vec<Metric> = Vec::new();
        emit(&sample_snapshot(), &mut records);

        let worker = &records[1];
        assert_eq!(worker.fields.len(), 14);
        assert_eq!(worker.field("requests"), Some(&FieldValue::Int(5)));
        assert_eq!(worker.field("delta_request"), Some(&FieldValue::Int(0)));
        assert_eq!(worker.field("status"), Some(&FieldValue::from("idle")));
        assert_eq!(worker.field("avg_rt"), Some(&FieldValue::Float(0.0)));
        assert_eq!(worker.tags.len(), 3);
        assert_eq!(worker.tag("worker_id"), Some("1"));
        assert_eq!(worker.tag("pid"), Some("200"));
        assert_eq!(worker.tag("url"), Some("tcp://127.0.0.1:1717"));
    }

    #[test]
    fn test_app_fields_and_tags() {
        let mut records: Vec<Metric> = Vec::new();
        emit(&sample_snapshot(), &mut records);

        let app = &records[3];
        let field_names: Vec<&str> = app.fields.keys().map(String::as_str).collect();
        assert_eq!(
            field_names,
            vec!["exceptions", "modifier1", "requests", "startup_time"]
        );
        let tag_names: Vec<&str> = app.tags.keys().map(String::as_str).collect();
        assert_eq!(tag_names, vec!["app_id", "chdir", "mountpoint", "worker_id"]);
    }

    #[tokio::test]
    async fn test_process_overwrites_url() {
        let stream = tokio_test::io::Builder::new()
            .read(br#"{"pid": 7, "url": "from-payload"}"#)
            .build();

        let mut records: Vec<Metric> = Vec::new();
        let snapshot = process(stream, "unix:///run/uwsgi/stats.sock", &mut records).await;

        assert_eq!(snapshot.url, "unix:///run/uwsgi/stats.sock");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tag("url"), Some("unix:///run/uwsgi/stats.sock"));
    }

    #[tokio::test]
    async fn test_process_chunked_stream() {
        let stream = tokio_test::io::Builder::new()
            .read(br#"{"load": 3, "workers": [{"id": 4,"#)
            .read(br#" "pid": 9, "apps": []}]}"#)
            .build();

        let mut records: Vec<Metric> = Vec::new();
        process(stream, "tcp://stats:1717", &mut records).await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].tag("worker_id"), Some("4"));
        assert_eq!(records[1].tag("pid"), Some("9"));
    }

    #[tokio::test]
    async fn test_process_empty_stream_emits_zero_overview() {
        let stream = tokio_test::io::Builder::new().build();

        let mut records: Vec<Metric> = Vec::new();
        process(stream, "tcp://stats:1717", &mut records).await;

        assert_eq!(records.len(), 1);
        let overview = &records[0];
        assert_eq!(overview.measurement, OVERVIEW_MEASUREMENT);
        assert_eq!(overview.field("listen_queue"), Some(&FieldValue::Int(0)));
        assert_eq!(overview.field("load"), Some(&FieldValue::Float(0.0)));
        assert_eq!(overview.tag("pid"), Some("0"));
        assert_eq!(overview.tag("version"), Some(""));
        assert_eq!(overview.tag("cwd"), Some(""));
    }

    #[tokio::test]
    async fn test_process_read_error_uses_received_bytes() {
        let stream = tokio_test::io::Builder::new()
            .read(br#"{"pid": 11, "workers": [{"id": 1,"#)
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))
            .build();

        let mut records: Vec<Metric> = Vec::new();
        process(stream, "tcp://stats:1717", &mut records).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tag("pid"), Some("0"));
    }

    #[tokio::test]
    async fn test_process_returns_while_peer_keeps_stream_open() {
        let (mut server, client) = tokio::io::duplex(1024);
        server
            .write_all(br#"{"pid": 100, "workers": [{"id": 1, "apps": []}]}"#)
            .await
            .unwrap();

        let mut records: Vec<Metric> = Vec::new();
        let snapshot = tokio::time::timeout(
            Duration::from_secs(5),
            process(client, "tcp://stats:1717", &mut records),
        )
        .await
        .expect("process waited for EOF after a complete document");

        assert_eq!(snapshot.pid, 100);
        assert_eq!(records.len(), 2);
        drop(server);
    }

    #[tokio::test]
    async fn test_process_stops_on_syntax_error_without_eof() {
        let (mut server, client) = tokio::io::duplex(1024);
        server.write_all(b"HTTP/1.1 200 OK\r\n").await.unwrap();

        let mut records: Vec<Metric> = Vec::new();
        tokio::time::timeout(
            Duration::from_secs(5),
            process(client, "tcp://stats:1717", &mut records),
        )
        .await
        .expect("process waited for EOF after invalid input");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tag("pid"), Some("0"));
        drop(server);
    }

    #[test]
    fn test_document_settled() {
        assert!(!document_settled(b""));
        assert!(!document_settled(b"  \n"));
        assert!(!document_settled(br#"{"pid": 1, "workers": ["#));
        assert!(!document_settled(br#"{"cwd": "}"#));
        assert!(document_settled(br#"{"pid": 1}"#));
        assert!(document_settled(b"{\"pid\": 1}\n"));
        assert!(document_settled(br#"{"pid": 1] "#));
        assert!(document_settled(b"garbage"));
        assert!(document_settled(br#"{"pid": x"#));
    }

    #[test]
    fn test_ends_with_closer() {
        assert!(ends_with_closer(b"{}\r\n"));
        assert!(ends_with_closer(b"[1]"));
        assert!(!ends_with_closer(br#"{"pid": 1"#));
        assert!(!ends_with_closer(b""));
    }

    #[tokio::test]
    async fn test_process_stops_on_broken_object_without_eof() {
        let (mut server, client) = tokio::io::duplex(1024);
        server.write_all(br#"{"pid": 5, "load": oops"#).await.unwrap();

        let mut records: Vec<Metric> = Vec::new();
        tokio::time::timeout(
            Duration::from_secs(5),
            process(client, "tcp://stats:1717", &mut records),
        )
        .await
        .expect("process waited for EOF after a broken object");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tag("pid"), Some("0"));
        drop(server);
    }
}

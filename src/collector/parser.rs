//! uWSGI stats JSON 파서
//!
//! stats 서버가 내보내는 JSON 문서를 [`StatsSnapshot`]으로 변환합니다.
//! 파싱은 관대하게(best-effort) 동작합니다:
//!
//! - 첫 번째 JSON 문서만 사용하고 뒤따르는 바이트는 무시
//! - 없거나 타입이 맞지 않는 필드는 0 / 빈 문자열
//! - 문법이 깨졌거나 비어 있는 문서는 모든 값이 0인 snapshot
//!
//! 어떤 경우에도 에러를 반환하지 않습니다.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// stats 서버 전체 snapshot
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StatsSnapshot {
    /// listen queue 길이
    #[serde(deserialize_with = "lenient::int")]
    pub listen_queue: i64,
    /// listen queue 에러 수
    #[serde(deserialize_with = "lenient::int")]
    pub listen_queue_errors: i64,
    /// signal queue 길이
    #[serde(deserialize_with = "lenient::int")]
    pub signal_queue: i64,
    /// 부하
    #[serde(deserialize_with = "lenient::float")]
    pub load: f64,
    /// master 프로세스 pid
    #[serde(deserialize_with = "lenient::int")]
    pub pid: i64,
    /// uid
    #[serde(deserialize_with = "lenient::int")]
    pub uid: i64,
    /// gid
    #[serde(deserialize_with = "lenient::int")]
    pub gid: i64,
    /// uWSGI 버전
    #[serde(deserialize_with = "lenient::string")]
    pub version: String,
    /// 작업 디렉터리
    #[serde(deserialize_with = "lenient::string")]
    pub cwd: String,
    /// worker 목록 (입력 순서 유지)
    #[serde(deserialize_with = "lenient::seq")]
    pub workers: Vec<WorkerStats>,
    /// 설정된 target 문자열 - payload 값은 사용하지 않음
    #[serde(skip)]
    pub url: String,
}

/// worker 프로세스 하나의 통계
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorkerStats {
    #[serde(rename = "id", deserialize_with = "lenient::int")]
    pub worker_id: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub pid: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub requests: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub delta_requests: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub accepting: i64,
    /// 강제 재시작 횟수
    #[serde(deserialize_with = "lenient::int")]
    pub harakiri_count: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub signals: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub signal_queue: i64,
    /// 상태 문자열 (idle, busy, cheap, ...)
    #[serde(deserialize_with = "lenient::string")]
    pub status: String,
    #[serde(deserialize_with = "lenient::int")]
    pub rss: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub vsz: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub running_time: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub last_spawn: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub respawn_count: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub tx: i64,
    /// 평균 응답 시간
    #[serde(deserialize_with = "lenient::float")]
    pub avg_rt: f64,
    #[serde(deserialize_with = "lenient::seq")]
    pub apps: Vec<AppStats>,
}

/// worker가 호스팅하는 애플리케이션 하나의 통계
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppStats {
    #[serde(rename = "id", deserialize_with = "lenient::int")]
    pub app_id: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub modifier1: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub requests: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub startup_time: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub exceptions: i64,
    #[serde(rename = "mountpoint", deserialize_with = "lenient::string")]
    pub mount_point: String,
    #[serde(deserialize_with = "lenient::string")]
    pub chdir: String,
}

/// 바이트 버퍼에서 snapshot 디코딩
///
/// 실패하지 않습니다. 디코딩할 수 없는 부분은 기본값으로 채워집니다.
pub fn decode_snapshot(bytes: &[u8]) -> StatsSnapshot {
    let mut documents = serde_json::Deserializer::from_slice(bytes).into_iter::<Value>();

    let document = match documents.next() {
        Some(Ok(document)) => document,
        Some(Err(e)) => {
            debug!(
                error = %e,
                bytes = bytes.len(),
                "Malformed stats document, using empty snapshot"
            );
            return StatsSnapshot::default();
        }
        None => {
            debug!("Empty stats stream, using empty snapshot");
            return StatsSnapshot::default();
        }
    };

    if !document.is_object() {
        debug!("Stats document is not an object, using empty snapshot");
        return StatsSnapshot::default();
    }

    StatsSnapshot::deserialize(document).unwrap_or_else(|e| {
        debug!(error = %e, "Undecodable stats document, using empty snapshot");
        StatsSnapshot::default()
    })
}

/// 타입이 맞지 않으면 기본값을 쓰는 필드 deserializer
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            // i64 범위를 벗어나거나 소수인 값은 0
            Value::Number(n) => n.as_i64().unwrap_or(0),
            _ => 0,
        })
    }

    pub fn float<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            _ => 0.0,
        })
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            _ => String::new(),
        })
    }

    /// 배열이 아니면 빈 목록, 원소가 객체가 아니면 기본값 원소
    pub fn seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(_) => T::deserialize(item).unwrap_or_default(),
                    _ => T::default(),
                })
                .collect(),
            _ => Vec::new(),
        })
    }
}

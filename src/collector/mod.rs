//! uWSGI stats 수집 모듈
//!
//! 설정된 stats 서버마다 연결 → 디코딩 → record 기록을 순서대로 수행합니다.
//!
//! # Example
//!
//! ```ignore
//! use uwsgi_exporter::collector::{CollectConfig, Collector};
//! use uwsgi_exporter::sink::Metric;
//!
//! let collector = Collector::new(CollectConfig {
//!     servers: vec!["tcp://127.0.0.1:1717".to_string()],
//!     ..Default::default()
//! })?;
//! let mut records: Vec<Metric> = Vec::new();
//! let report = collector.gather(&mut records).await?;
//! ```

mod client;
mod mapper;
mod parser;
mod target;

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

pub use client::{StatsClient, StatsStream, Timeouts};
pub use mapper::{emit, process, APPS_MEASUREMENT, OVERVIEW_MEASUREMENT, WORKERS_MEASUREMENT};
pub use parser::{decode_snapshot, AppStats, StatsSnapshot, WorkerStats};
pub use target::{AddressFamily, Endpoint, Target};

use crate::error::{AppError, AppResult, TargetError};
use crate::metrics::InternalMetrics;
use crate::sink::{Fields, MetricSink, Tags};

/// 수집 설정
#[derive(Debug, Clone)]
pub struct CollectConfig {
    /// stats 서버 target 문자열 목록 (순서대로 처리)
    pub servers: Vec<String>,
    /// 연결 타임아웃
    pub timeouts: Timeouts,
    /// 첫 실패에서 sweep 전체를 중단할지 여부
    pub fail_fast: bool,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            servers: vec![],
            timeouts: Timeouts::default(),
            fail_fast: false,
        }
    }
}

impl From<&crate::config::Config> for CollectConfig {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            servers: config.servers.clone(),
            timeouts: Timeouts {
                connect: Duration::from_millis(config.timeout_ms),
                response_header: Duration::from_millis(config.response_header_timeout_ms),
                request: Duration::from_millis(config.request_timeout_ms),
            },
            fail_fast: config.fail_fast,
        }
    }
}

/// 한 번의 sweep 결과
#[derive(Debug, Default)]
pub struct GatherReport {
    /// 처리를 시도한 target 수
    pub targets: usize,
    /// sink에 기록된 record 수
    pub records: usize,
    /// 실패한 target의 에러 (설정 순서)
    pub errors: Vec<TargetError>,
}

impl GatherReport {
    /// 성공한 target 수
    pub fn succeeded(&self) -> usize {
        self.targets - self.errors.len()
    }
}

/// Collector - 설정 기반 sweep 래퍼
pub struct Collector {
    client: StatsClient,
    config: CollectConfig,
    metrics: InternalMetrics,
}

impl Collector {
    /// 새 Collector 생성
    pub fn new(config: CollectConfig) -> AppResult<Self> {
        let client = StatsClient::new(config.timeouts).map_err(AppError::HttpClientInit)?;
        Ok(Self {
            client,
            config,
            metrics: InternalMetrics::new(),
        })
    }

    /// 설정된 target 전체를 순서대로 수집
    ///
    /// 기본 동작은 target별 격리: 실패한 target은 로그와 report에 남기고
    /// 다음 target을 계속 처리합니다. `fail_fast`이면 첫 실패를 그대로 반환합니다.
    pub async fn gather<S: MetricSink + ?Sized>(
        &self,
        sink: &mut S,
    ) -> Result<GatherReport, TargetError> {
        let mut counting = CountingSink { inner: sink, count: 0 };
        let mut report = GatherReport::default();

        for server in &self.config.servers {
            report.targets += 1;
            let start = Instant::now();
            let result = self.gather_server(server, &mut counting).await;
            let elapsed = start.elapsed();

            match result {
                Ok(()) => {
                    self.metrics.record_scrape_success(server, elapsed);
                    debug!(
                        server = %server,
                        duration_ms = elapsed.as_millis() as u64,
                        "Stats server collected"
                    );
                }
                Err(e) => {
                    self.metrics.record_scrape_failure(server, elapsed);
                    if self.config.fail_fast {
                        warn!(server = %server, error = %e, "Aborting sweep on first failure");
                        return Err(e);
                    }
                    warn!(server = %server, error = %e, "Failed to collect stats server");
                    report.errors.push(e);
                }
            }
        }

        report.records = counting.count;
        info!(
            targets = report.targets,
            failed = report.errors.len(),
            records = report.records,
            "Sweep complete"
        );
        Ok(report)
    }

    /// target 하나 수집: 파싱 → 연결 → 디코딩 → 기록
    ///
    /// 연결은 이 호출 안에서만 살아 있으며 반환 시 닫힙니다.
    pub async fn gather_server<S: MetricSink + ?Sized>(
        &self,
        server: &str,
        sink: &mut S,
    ) -> Result<(), TargetError> {
        let target = Target::parse(server)?;
        let stream = self.client.open(&target).await?;
        process(stream, target.label(), sink).await;
        Ok(())
    }

    /// 설정 참조 반환
    pub fn config(&self) -> &CollectConfig {
        &self.config
    }

    /// internal metrics 참조 반환
    pub fn internal_metrics(&self) -> &InternalMetrics {
        &self.metrics
    }
}

/// 기록된 record 수를 세는 sink 래퍼
struct CountingSink<'a, S: ?Sized> {
    inner: &'a mut S,
    count: usize,
}

impl<S: MetricSink + ?Sized> MetricSink for CountingSink<'_, S> {
    fn add_fields(&mut self, measurement: &str, fields: Fields, tags: Tags) {
        self.count += 1;
        self.inner.add_fields(measurement, fields, tags);
    }
}

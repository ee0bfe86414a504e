//! uWSGI stats 서버 연결 클라이언트
//!
//! target의 scheme에 따라 TCP, Unix socket, HTTP 중 하나로 연결하여
//! 읽기 가능한 stream을 반환합니다. 연결은 poll마다 새로 열리며,
//! stream을 drop하면 소켓이 닫힙니다.

use std::future::Future;
use std::io::{self, Cursor};
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Url};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::net::{lookup_host, TcpStream};
#[cfg(unix)]
use tokio::net::UnixStream;
use tracing::{debug, instrument};

use super::target::{AddressFamily, Endpoint, Target};
use crate::error::TargetError;

/// 연결 타임아웃 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// dial 타임아웃 (TCP, Unix, HTTP connect)
    pub connect: Duration,
    /// HTTP 응답 헤더 수신까지의 타임아웃
    pub response_header: Duration,
    /// HTTP 요청 전체 타임아웃
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            response_header: Duration::from_secs(5),
            request: Duration::from_secs(20),
        }
    }
}

/// 열린 stats stream
///
/// drop 시 내부 소켓이 닫힙니다.
#[derive(Debug)]
pub enum StatsStream {
    /// TCP 연결
    Tcp(TcpStream),
    /// Unix domain socket 연결
    #[cfg(unix)]
    Unix(UnixStream),
    /// 수신 완료된 HTTP 응답 body
    Body(Cursor<Vec<u8>>),
}

impl AsyncRead for StatsStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            StatsStream::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(unix)]
            StatsStream::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
            StatsStream::Body(body) => Pin::new(body).poll_read(cx, buf),
        }
    }
}

/// stats 서버 클라이언트
///
/// HTTP target용 `reqwest::Client`(connection pool)를 소유하며,
/// clone해도 pool을 공유합니다.
#[derive(Clone)]
pub struct StatsClient {
    http: Client,
    timeouts: Timeouts,
}

impl StatsClient {
    /// 새 클라이언트 생성
    ///
    /// # Errors
    /// HTTP 클라이언트 초기화 실패 시 reqwest 에러
    pub fn new(timeouts: Timeouts) -> Result<Self, reqwest::Error> {
        let http = ClientBuilder::new()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.request)
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, timeouts })
    }

    /// target에 연결하여 읽기 가능한 stream 반환
    #[instrument(skip(self, target), fields(server = %target, scheme = target.endpoint().scheme()))]
    pub async fn open(&self, target: &Target) -> Result<StatsStream, TargetError> {
        match target.endpoint() {
            Endpoint::Tcp { host, port, family } => {
                self.dial_tcp(target, host, *port, *family).await
            }
            Endpoint::Unix(path) => self.dial_unix(target, path).await,
            Endpoint::Http(url) => self.get(target, url).await,
        }
    }

    async fn dial_tcp(
        &self,
        target: &Target,
        host: &str,
        port: u16,
        family: AddressFamily,
    ) -> Result<StatsStream, TargetError> {
        let connect = async {
            let mut last_error = None;
            for addr in lookup_host((host, port)).await? {
                if !family.matches(&addr) {
                    continue;
                }
                debug!(addr = %addr, "Dialing stats server");
                match TcpStream::connect(addr).await {
                    Ok(stream) => return Ok(stream),
                    Err(e) => last_error = Some(e),
                }
            }
            Err(last_error.unwrap_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("no {} address found for {}", family, host),
                )
            }))
        };

        let stream = self.dial_with_timeout(target, connect).await?;
        Ok(StatsStream::Tcp(stream))
    }

    #[cfg(unix)]
    async fn dial_unix(&self, target: &Target, path: &Path) -> Result<StatsStream, TargetError> {
        debug!(path = %path.display(), "Dialing stats socket");
        let stream = self
            .dial_with_timeout(target, UnixStream::connect(path))
            .await?;
        Ok(StatsStream::Unix(stream))
    }

    #[cfg(not(unix))]
    async fn dial_unix(&self, target: &Target, path: &Path) -> Result<StatsStream, TargetError> {
        Err(TargetError::Connect {
            target: target.label().to_string(),
            source: io::Error::new(
                io::ErrorKind::Unsupported,
                format!(
                    "unix sockets are not supported on this platform ({})",
                    path.display()
                ),
            ),
        })
    }

    async fn get(&self, target: &Target, url: &Url) -> Result<StatsStream, TargetError> {
        let request_timeout_ms = self.timeouts.request.as_millis() as u64;

        debug!(url = %url, "Requesting stats over HTTP");

        // send()는 응답 헤더 수신 시점에 완료됨
        let send = self.http.get(url.clone()).send();
        let response = match tokio::time::timeout(self.timeouts.response_header, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(TargetError::from_reqwest(
                    target.label(),
                    request_timeout_ms,
                    e,
                ))
            }
            Err(_) => {
                return Err(TargetError::Timeout {
                    target: target.label().to_string(),
                    timeout_ms: self.timeouts.response_header.as_millis() as u64,
                })
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(TargetError::HttpStatus {
                target: target.label().to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TargetError::from_reqwest(target.label(), request_timeout_ms, e))?;

        Ok(StatsStream::Body(Cursor::new(body.to_vec())))
    }

    async fn dial_with_timeout<T, F>(&self, target: &Target, connect: F) -> Result<T, TargetError>
    where
        F: Future<Output = io::Result<T>>,
    {
        match tokio::time::timeout(self.timeouts.connect, connect).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(TargetError::Connect {
                target: target.label().to_string(),
                source,
            }),
            Err(_) => Err(TargetError::Timeout {
                target: target.label().to_string(),
                timeout_ms: self.timeouts.connect.as_millis() as u64,
            }),
        }
    }
}

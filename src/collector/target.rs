//! stats 서버 target 문자열 파싱
//!
//! 설정된 문자열 하나를 연결 방식(scheme)과 주소로 해석합니다.
//!
//! | 형식 | 연결 방식 |
//! |------|-----------|
//! | `tcp://host:port` (`tcp4`, `tcp6`) | TCP stream |
//! | `unix:///path/to/socket` | Unix domain socket |
//! | `http://host:port/path` (`https`) | HTTP GET |
//! | `host:port` | HTTP GET (`http://` 생략) |

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use url::{Host, Url};

use crate::error::TargetError;

/// TCP 주소 패밀리 제한
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    /// IPv4, IPv6 모두 허용 (`tcp`)
    Any,
    /// IPv4만 (`tcp4`)
    V4,
    /// IPv6만 (`tcp6`)
    V6,
}

impl AddressFamily {
    /// 주소가 이 패밀리에 속하는지 확인
    pub fn matches(&self, addr: &SocketAddr) -> bool {
        match self {
            AddressFamily::Any => true,
            AddressFamily::V4 => addr.is_ipv4(),
            AddressFamily::V6 => addr.is_ipv6(),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Any => write!(f, "tcp"),
            AddressFamily::V4 => write!(f, "tcp4"),
            AddressFamily::V6 => write!(f, "tcp6"),
        }
    }
}

/// 연결 대상 - scheme별로 하나의 dial 전략을 가짐
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    /// HTTP GET 후 응답 body를 stream으로 사용
    Http(Url),
    /// TCP stream 연결
    Tcp {
        host: String,
        port: u16,
        family: AddressFamily,
    },
    /// Unix domain socket 연결
    Unix(PathBuf),
}

impl Endpoint {
    /// scheme 이름
    pub fn scheme(&self) -> &'static str {
        match self {
            Endpoint::Http(url) if url.scheme() == "https" => "https",
            Endpoint::Http(_) => "http",
            Endpoint::Tcp { family, .. } => match family {
                AddressFamily::Any => "tcp",
                AddressFamily::V4 => "tcp4",
                AddressFamily::V6 => "tcp6",
            },
            Endpoint::Unix(_) => "unix",
        }
    }
}

/// 파싱된 stats 서버 target
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    label: String,
    endpoint: Endpoint,
}

impl Target {
    /// target 문자열 파싱
    ///
    /// 원본 문자열은 그대로 보존되어 `url` 태그 값으로 사용됩니다.
    ///
    /// # Errors
    /// URL로 해석할 수 없거나, 지원하지 않는 scheme이거나,
    /// scheme에 필요한 host/port/path가 없으면 `TargetError::Parse`
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        if raw.is_empty() {
            return Err(TargetError::parse(raw, "empty target"));
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TargetError::parse(
                raw,
                "contains whitespace or control characters",
            ));
        }

        let url = if raw.contains("://") {
            Url::parse(raw)
        } else {
            Url::parse(&format!("http://{}", raw))
        }
        .map_err(|e| TargetError::parse(raw, e.to_string()))?;

        let endpoint = match url.scheme() {
            "http" | "https" => {
                if url.host_str().is_none() {
                    return Err(TargetError::parse(raw, "missing host"));
                }
                Endpoint::Http(url)
            }
            "tcp" | "tcp4" | "tcp6" => {
                let family = match url.scheme() {
                    "tcp4" => AddressFamily::V4,
                    "tcp6" => AddressFamily::V6,
                    _ => AddressFamily::Any,
                };
                let host = match url.host() {
                    Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
                    Some(Host::Ipv4(addr)) => addr.to_string(),
                    Some(Host::Ipv6(addr)) => addr.to_string(),
                    _ => return Err(TargetError::parse(raw, "missing host")),
                };
                let port = url
                    .port()
                    .ok_or_else(|| TargetError::parse(raw, "missing port"))?;
                Endpoint::Tcp { host, port, family }
            }
            "unix" => {
                let path = url.path();
                if path.is_empty() || path == "/" {
                    return Err(TargetError::parse(raw, "missing socket path"));
                }
                Endpoint::Unix(PathBuf::from(path))
            }
            other => {
                return Err(TargetError::parse(
                    raw,
                    format!(
                        "unsupported scheme '{}' (expected http, https, tcp, tcp4, tcp6 or unix)",
                        other
                    ),
                ))
            }
        };

        Ok(Self {
            label: raw.to_string(),
            endpoint,
        })
    }

    /// 설정에 적힌 원본 문자열
    pub fn label(&self) -> &str {
        &self.label
    }

    /// 연결 대상
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp_target() {
        let target = Target::parse("tcp://127.0.0.1:5050").unwrap();
        assert_eq!(target.label(), "tcp://127.0.0.1:5050");
        assert_eq!(
            target.endpoint(),
            &Endpoint::Tcp {
                host: "127.0.0.1".to_string(),
                port: 5050,
                family: AddressFamily::Any,
            }
        );
    }

    #[test]
    fn test_parse_tcp_family_variants() {
        let target = Target::parse("tcp4://localhost:1717").unwrap();
        assert_eq!(target.endpoint().scheme(), "tcp4");

        let target = Target::parse("tcp6://[::1]:1717").unwrap();
        match target.endpoint() {
            Endpoint::Tcp { host, family, .. } => {
                assert_eq!(host, "::1");
                assert_eq!(*family, AddressFamily::V6);
            }
            other => panic!("Expected Tcp endpoint, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_unix_target() {
        let target = Target::parse("unix:///tmp/stats.sock").unwrap();
        assert_eq!(
            target.endpoint(),
            &Endpoint::Unix(PathBuf::from("/tmp/stats.sock"))
        );
    }

    #[test]
    fn test_parse_http_target() {
        let target = Target::parse("http://localhost:1717/stats").unwrap();
        match target.endpoint() {
            Endpoint::Http(url) => assert_eq!(url.path(), "/stats"),
            other => panic!("Expected Http endpoint, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_host_port_implies_http() {
        let target = Target::parse("localhost:1717").unwrap();
        assert_eq!(target.label(), "localhost:1717");
        match target.endpoint() {
            Endpoint::Http(url) => {
                assert_eq!(url.scheme(), "http");
                assert_eq!(url.host_str(), Some("localhost"));
                assert_eq!(url.port(), Some(1717));
            }
            other => panic!("Expected Http endpoint, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_whitespace_and_control_characters() {
        let err = Target::parse("not a url \t").unwrap_err();
        assert!(matches!(err, TargetError::Parse { .. }));
        assert_eq!(err.target(), "not a url \t");
    }

    #[test]
    fn test_rejects_empty_target() {
        assert!(matches!(
            Target::parse(""),
            Err(TargetError::Parse { .. })
        ));
    }

    #[test]
    fn test_rejects_unsupported_scheme() {
        let err = Target::parse("udp://localhost:1717").unwrap_err();
        assert!(err.to_string().contains("unsupported scheme 'udp'"));
    }

    #[test]
    fn test_rejects_tcp_without_port() {
        let err = Target::parse("tcp://localhost").unwrap_err();
        assert!(err.to_string().contains("missing port"));
    }

    #[test]
    fn test_rejects_unix_without_path() {
        let err = Target::parse("unix://").unwrap_err();
        assert!(matches!(err, TargetError::Parse { .. }));
    }
}

use std::sync::LazyLock;

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::{Host, Url};

/// Country code reported when a descriptor carries no recognizable annotation
pub const UNKNOWN_COUNTRY: &str = "??";

/// Standard alphabet, tolerant of missing padding and non-canonical trailing bits
pub(crate) const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

static COUNTRY_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:vless|vmess|trojan|ss)-([A-Z]{2})-").expect("country tag pattern is valid")
});

/// Descriptor protocol family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Vmess,
    Vless,
    Trojan,
    #[serde(rename = "ss")]
    Shadowsocks,
}

impl Protocol {
    pub const ALL: [Protocol; 4] = [
        Protocol::Vmess,
        Protocol::Vless,
        Protocol::Trojan,
        Protocol::Shadowsocks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Vmess => "vmess",
            Protocol::Vless => "vless",
            Protocol::Trojan => "trojan",
            Protocol::Shadowsocks => "ss",
        }
    }

    /// The `scheme://` prefix that tags a descriptor of this family
    pub fn prefix(&self) -> &'static str {
        match self {
            Protocol::Vmess => "vmess://",
            Protocol::Vless => "vless://",
            Protocol::Trojan => "trojan://",
            Protocol::Shadowsocks => "ss://",
        }
    }

    /// Detect the protocol from a raw descriptor's prefix
    pub fn detect(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| raw.starts_with(p.prefix()))
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Host and port a descriptor points at
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Build an endpoint, rejecting an empty host or port 0
    pub fn new(host: impl Into<String>, port: u16) -> Option<Self> {
        let host = host.into();
        if host.is_empty() || port == 0 {
            return None;
        }
        Some(Self { host, port })
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// A proxy connection descriptor
///
/// The raw string is the unit of storage and output. Every other attribute
/// is derived from it on demand, so re-deriving always yields the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor(String);

impl Descriptor {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn protocol(&self) -> Option<Protocol> {
        Protocol::detect(&self.0)
    }

    /// Extract host and port; `None` when the descriptor cannot be parsed
    pub fn endpoint(&self) -> Option<Endpoint> {
        parse_endpoint(&self.0)
    }

    /// Two-letter country annotation, or [`UNKNOWN_COUNTRY`]
    pub fn country_code(&self) -> &str {
        extract_country_code(&self.0)
    }
}

impl From<String> for Descriptor {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for Descriptor {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl std::fmt::Display for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract host and port from a raw descriptor.
///
/// Never fails loudly: every decode or syntax problem collapses into `None`.
pub fn parse_endpoint(raw: &str) -> Option<Endpoint> {
    let protocol = Protocol::detect(raw)?;
    match protocol {
        Protocol::Vmess => parse_vmess(&raw[protocol.prefix().len()..]),
        Protocol::Vless | Protocol::Trojan => parse_uri(raw),
        Protocol::Shadowsocks => parse_shadowsocks(raw),
    }
}

/// First `<protocol>-<CC>-` annotation in the descriptor
pub fn extract_country_code(raw: &str) -> &str {
    COUNTRY_TAG
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map_or(UNKNOWN_COUNTRY, |m| m.as_str())
}

fn parse_vmess(payload: &str) -> Option<Endpoint> {
    let mut encoded: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let padding = (4 - encoded.len() % 4) % 4;
    encoded.extend(std::iter::repeat('=').take(padding));

    let decoded = LENIENT_BASE64.decode(encoded.as_bytes()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let data: Value = serde_json::from_str(&text).ok()?;

    let host = data.get("add")?.as_str()?.trim();
    let port = match data.get("port")? {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok())?,
        Value::String(s) => s.trim().parse::<u16>().ok()?,
        _ => return None,
    };

    Endpoint::new(host, port)
}

fn parse_uri(raw: &str) -> Option<Endpoint> {
    let url = Url::parse(raw).ok()?;
    let host = match url.host()? {
        Host::Domain(domain) => domain.to_string(),
        Host::Ipv4(addr) => addr.to_string(),
        Host::Ipv6(addr) => addr.to_string(),
    };
    Endpoint::new(host, url.port()?)
}

// ss://userinfo@host:port#fragment; the host may itself contain colons
fn parse_shadowsocks(raw: &str) -> Option<Endpoint> {
    let (_, rest) = raw.split_once('@')?;
    let authority = rest.split_once('#').map_or(rest, |(before, _)| before);
    let (host, port) = authority.rsplit_once(':')?;
    let port = port.trim().parse::<u16>().ok()?;
    Endpoint::new(host, port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;

    fn vmess(json: &str) -> String {
        format!("vmess://{}", STANDARD.encode(json))
    }

    fn endpoint(host: &str, port: u16) -> Option<Endpoint> {
        Endpoint::new(host, port)
    }

    #[test]
    fn test_protocol_detect() {
        assert_eq!(Protocol::detect("vmess://abc"), Some(Protocol::Vmess));
        assert_eq!(Protocol::detect("vless://abc"), Some(Protocol::Vless));
        assert_eq!(Protocol::detect("trojan://abc"), Some(Protocol::Trojan));
        assert_eq!(Protocol::detect("ss://abc"), Some(Protocol::Shadowsocks));
        assert_eq!(Protocol::detect("socks5://abc"), None);
        assert_eq!(Protocol::detect("VMESS://abc"), None);
    }

    #[test]
    fn test_parse_vmess() {
        let link = vmess(r#"{"v":"2","ps":"node","add":"vm.example.com","port":443,"id":"x"}"#);
        assert_eq!(parse_endpoint(&link), endpoint("vm.example.com", 443));
    }

    #[test]
    fn test_parse_vmess_string_port_and_missing_padding() {
        let link = vmess(r#"{"add":"10.0.0.1","port":"8080"}"#);
        let unpadded = link.trim_end_matches('=').to_string();
        assert_eq!(parse_endpoint(&unpadded), endpoint("10.0.0.1", 8080));
    }

    #[test]
    fn test_parse_vmess_corrupted() {
        assert_eq!(parse_endpoint("vmess://!!!not-base64!!!"), None);
        // Valid base64, not JSON
        assert_eq!(parse_endpoint(&vmess("hello world")), None);
        // JSON without a port
        assert_eq!(parse_endpoint(&vmess(r#"{"add":"a.example"}"#)), None);
        // Port out of range
        assert_eq!(
            parse_endpoint(&vmess(r#"{"add":"a.example","port":70000}"#)),
            None
        );
        // Empty host
        assert_eq!(parse_endpoint(&vmess(r#"{"add":"","port":443}"#)), None);
    }

    #[test]
    fn test_parse_vless_and_trojan() {
        assert_eq!(
            parse_endpoint("vless://uuid@vl.example.com:8443?security=tls#vless-US-1"),
            endpoint("vl.example.com", 8443)
        );
        assert_eq!(
            parse_endpoint("trojan://secret@203.0.113.7:443#trojan-DE-2"),
            endpoint("203.0.113.7", 443)
        );
        assert_eq!(
            parse_endpoint("vless://uuid@[2001:db8::1]:2053#x"),
            endpoint("2001:db8::1", 2053)
        );
    }

    #[test]
    fn test_parse_vless_and_trojan_corrupted() {
        // No port
        assert_eq!(parse_endpoint("vless://uuid@vl.example.com#x"), None);
        // Port out of range
        assert_eq!(parse_endpoint("trojan://secret@host.example:99999"), None);
        // Port zero
        assert_eq!(parse_endpoint("trojan://secret@host.example:0"), None);
        // Unterminated IPv6 literal
        assert_eq!(parse_endpoint("vless://uuid@[2001:db8::1:443"), None);
    }

    #[test]
    fn test_parse_shadowsocks() {
        assert_eq!(
            parse_endpoint("ss://YWVzLTI1Ni1nY206cGFzcw@ss.example.com:990#ss-JP-3"),
            endpoint("ss.example.com", 990)
        );
    }

    #[test]
    fn test_parse_shadowsocks_ipv6_last_colon_split() {
        assert_eq!(
            parse_endpoint("ss://token@::1:8443#tag"),
            endpoint("::1", 8443)
        );
    }

    #[test]
    fn test_parse_shadowsocks_corrupted() {
        // No userinfo separator
        assert_eq!(parse_endpoint("ss://host.example:443#x"), None);
        // No port separator
        assert_eq!(parse_endpoint("ss://token@host.example#x"), None);
        // Non-numeric port
        assert_eq!(parse_endpoint("ss://token@host.example:abc#x"), None);
        // Empty host
        assert_eq!(parse_endpoint("ss://token@:443"), None);
    }

    #[test]
    fn test_parse_unknown_protocol() {
        assert_eq!(parse_endpoint("socks5://user@host.example:1080"), None);
        assert_eq!(parse_endpoint(""), None);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let links = [
            vmess(r#"{"add":"vm.example.com","port":443}"#),
            "vless://uuid@vl.example.com:8443#x".to_string(),
            "ss://token@::1:8443#tag".to_string(),
            "ss://broken".to_string(),
        ];
        for link in &links {
            let descriptor = Descriptor::new(link.clone());
            assert_eq!(descriptor.endpoint(), descriptor.endpoint());
            assert_eq!(descriptor.country_code(), descriptor.country_code());
        }
    }

    #[test]
    fn test_extract_country_code() {
        assert_eq!(
            extract_country_code("vless://u@h:443#🇺🇸[www.v2nodes.com] vless-US-11966229"),
            "US"
        );
        assert_eq!(extract_country_code("ss://t@h:1#ss-DE-1 trojan-FR-2"), "DE");
        assert_eq!(extract_country_code("trojan://t@h:1#trojan-us-2"), UNKNOWN_COUNTRY);
        assert_eq!(extract_country_code("trojan://t@h:1#trojan-USA-2"), UNKNOWN_COUNTRY);
        assert_eq!(extract_country_code("trojan://t@h:1#node"), UNKNOWN_COUNTRY);
    }

    #[test]
    fn test_descriptor_accessors() {
        let descriptor = Descriptor::from("trojan://secret@203.0.113.7:443#trojan-NL-9");
        assert_eq!(descriptor.protocol(), Some(Protocol::Trojan));
        assert_eq!(descriptor.country_code(), "NL");
        assert_eq!(
            descriptor.endpoint().map(|e| e.to_string()),
            Some("203.0.113.7:443".to_string())
        );
    }

    #[test]
    fn test_endpoint_display_brackets_ipv6() {
        let ep = Endpoint::new("::1", 8443).unwrap();
        assert_eq!(ep.to_string(), "[::1]:8443");
    }
}

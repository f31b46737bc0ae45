//! Share link decoding
//!
//! Turns one `ss://` or `vmess://` link into a [`ProxyDescriptor`]. Decoding is a pure
//! function of the input string.

mod shadowsocks;
mod vmess;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use thiserror::Error;

use crate::models::{ProxyDescriptor, ProxyKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported link scheme")]
    UnsupportedScheme,
    #[error("invalid base64 (padded: {padded}; unpadded: {unpadded})")]
    Base64 {
        padded: base64::DecodeError,
        unpadded: base64::DecodeError,
    },
    #[error("decoded content is not valid UTF-8")]
    InvalidUtf8,
    #[error("malformed credential, expected method:password@host:port")]
    MalformedCredential,
    #[error(r#"missing required field "{0}""#)]
    MissingField(&'static str),
    #[error("invalid port")]
    InvalidPort,
    #[error(r#"invalid value for field "{0}""#)]
    InvalidField(&'static str),
    #[error("invalid vmess document: {0}")]
    InvalidDocument(String),
}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Decode a single share link
pub fn decode(link: &str) -> DecodeResult<ProxyDescriptor> {
    let link = link.trim();
    if let Some(body) = link.strip_prefix(ProxyKind::Shadowsocks.scheme()) {
        shadowsocks::decode(body)
    } else if let Some(body) = link.strip_prefix(ProxyKind::Vmess.scheme()) {
        vmess::decode(body)
    } else {
        Err(DecodeError::UnsupportedScheme)
    }
}

/// Whether `input` is a link this module decodes, as opposed to a subscription URL
pub fn is_share_link(input: &str) -> bool {
    let input = input.trim_start();
    [ProxyKind::Shadowsocks, ProxyKind::Vmess]
        .iter()
        .any(|kind| input.starts_with(kind.scheme()))
}

/// Standard alphabet, padded first, then unpadded
pub(crate) fn decode_base64(input: &str) -> DecodeResult<Vec<u8>> {
    STANDARD.decode(input).or_else(|padded| {
        STANDARD_NO_PAD
            .decode(input)
            .map_err(|unpadded| DecodeError::Base64 { padded, unpadded })
    })
}

pub(crate) fn decode_base64_str(input: &str) -> DecodeResult<String> {
    String::from_utf8(decode_base64(input)?).map_err(|_| DecodeError::InvalidUtf8)
}

fn parse_port(raw: &str) -> DecodeResult<u16> {
    raw.trim()
        .parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
        .ok_or(DecodeError::InvalidPort)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ss_link(plain: &str) -> String {
        format!("ss://{}", STANDARD.encode(plain))
    }

    #[test]
    fn test_decode_dispatches_by_scheme() {
        let proxy = decode(&ss_link("aes-256-gcm:pw@1.2.3.4:8388")).unwrap();
        assert_eq!(proxy.kind(), ProxyKind::Shadowsocks);

        let doc = r#"{"add":"a.example","port":"443","id":"uuid","aid":"0"}"#;
        let proxy = decode(&format!("vmess://{}", STANDARD.encode(doc))).unwrap();
        assert_eq!(proxy.kind(), ProxyKind::Vmess);
    }

    #[test]
    fn test_decode_unsupported_scheme() {
        for link in ["trojan://pw@a.co:443", "https://sub.example/list", "", "ss:/abc"] {
            assert_eq!(decode(link), Err(DecodeError::UnsupportedScheme), "{link}");
        }
    }

    #[test]
    fn test_decode_trims_whitespace() {
        let link = format!("  {}\r", ss_link("rc4-md5:pw@h.example:80"));
        assert_eq!(decode(&link).unwrap().id(), "h.example:80");
    }

    #[test]
    fn test_decode_is_idempotent() {
        let link = ss_link("chacha20-ietf-poly1305:p@ss@9.9.9.9:443");
        let first = decode(&link).unwrap();
        let second = decode(&link).unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(first.outbound(), second.outbound());
    }

    #[test]
    fn test_is_share_link() {
        assert!(is_share_link("ss://abc"));
        assert!(is_share_link("vmess://abc"));
        assert!(!is_share_link("http://sub.example"));
        assert!(!is_share_link("trojan://x"));
    }

    #[test]
    fn test_decode_base64_padded_then_unpadded() {
        assert_eq!(decode_base64("YWI=").unwrap(), b"ab");
        assert_eq!(decode_base64("YWI").unwrap(), b"ab");
        assert_eq!(decode_base64_str("YWJj").unwrap(), "abc");
    }

    #[test]
    fn test_decode_base64_reports_both_failures() {
        let err = decode_base64("!!!").unwrap_err();
        assert!(matches!(err, DecodeError::Base64 { .. }));
        assert!(err.to_string().contains("padded"));
        assert!(err.to_string().contains("unpadded"));
    }

    #[test]
    fn test_decode_base64_str_rejects_invalid_utf8() {
        assert_eq!(decode_base64_str("/w=="), Err(DecodeError::InvalidUtf8));
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("8388"), Ok(8388));
        assert_eq!(parse_port(" 443 "), Ok(443));
        assert_eq!(parse_port("0"), Err(DecodeError::InvalidPort));
        assert_eq!(parse_port("65536"), Err(DecodeError::InvalidPort));
        assert_eq!(parse_port("http"), Err(DecodeError::InvalidPort));
    }
}

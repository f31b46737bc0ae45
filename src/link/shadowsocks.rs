use percent_encoding::percent_decode_str;
use url::Url;

use super::{decode_base64_str, parse_port, DecodeError, DecodeResult};
use crate::models::{ProxyDescriptor, ProxyKind};

/// Decode the part of an `ss://` link after the scheme.
///
/// Accepts the legacy form `base64(method:password@host:port)`, whose `#name` fragment is
/// discarded, and the SIP002 form `base64(method:password)@host:port[/?query]#name`.
pub(super) fn decode(body: &str) -> DecodeResult<ProxyDescriptor> {
    let body = body.trim();
    let head = body.split_once('#').map_or(body, |(head, _)| head);

    // The base64 alphabet has no '@', so its presence means SIP002.
    if head.contains('@') {
        decode_sip002(body)
    } else {
        decode_legacy(head)
    }
}

fn decode_legacy(encoded: &str) -> DecodeResult<ProxyDescriptor> {
    let encoded = percent_decode_str(encoded)
        .decode_utf8()
        .map_err(|_| DecodeError::InvalidUtf8)?;
    let plain = decode_base64_str(&encoded)?;
    let (method_password, host_port) = plain
        .trim()
        .rsplit_once('@')
        .ok_or(DecodeError::MalformedCredential)?;

    let (method, password) = split_method_password(method_password)?;
    let (host, port) = host_port
        .rsplit_once(':')
        .ok_or(DecodeError::MalformedCredential)?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(DecodeError::MalformedCredential);
    }

    Ok(ProxyDescriptor::shadowsocks(host, parse_port(port)?, method, password))
}

fn decode_sip002(body: &str) -> DecodeResult<ProxyDescriptor> {
    let url = Url::parse(&format!("{}{}", ProxyKind::Shadowsocks.scheme(), body)).map_err(
        |e| match e {
            url::ParseError::InvalidPort => DecodeError::InvalidPort,
            _ => DecodeError::MalformedCredential,
        },
    )?;

    let userinfo = percent_decode_str(url.username())
        .decode_utf8()
        .map_err(|_| DecodeError::InvalidUtf8)?;
    // SIP002 recommends the URL-safe alphabet; map it onto the standard one.
    let userinfo = userinfo.replace('-', "+").replace('_', "/");
    let method_password = decode_base64_str(&userinfo)?;
    let (method, password) = split_method_password(&method_password)?;

    let host = url
        .host_str()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
        .filter(|h| !h.is_empty())
        .ok_or(DecodeError::MalformedCredential)?;
    let port = match url.port() {
        Some(0) => return Err(DecodeError::InvalidPort),
        Some(port) => port,
        None => return Err(DecodeError::MalformedCredential),
    };

    let remark = url
        .fragment()
        .map(|f| percent_decode_str(f).decode_utf8_lossy().into_owned());

    Ok(ProxyDescriptor::shadowsocks(host, port, method, password).with_remark(remark))
}

fn split_method_password(raw: &str) -> DecodeResult<(&str, &str)> {
    match raw.split_once(':') {
        Some((method, password)) if !method.is_empty() => Ok((method, password)),
        _ => Err(DecodeError::MalformedCredential),
    }
}

use serde::Deserialize;

use super::{decode_base64_str, parse_port, DecodeError, DecodeResult};
use crate::models::{ProxyDescriptor, VmessTransport};

/// Field that v2rayN-style documents emit either as a string or as a number
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StrOrNum {
    Num(u64),
    /// Negative or fractional numbers, which are never a valid port or alter id
    Other(f64),
    Str(String),
}

impl StrOrNum {
    fn as_u16(&self) -> Option<u16> {
        match self {
            StrOrNum::Num(n) => u16::try_from(*n).ok(),
            StrOrNum::Other(_) => None,
            StrOrNum::Str(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VmessDocument {
    add: Option<String>,
    port: Option<StrOrNum>,
    id: Option<String>,
    aid: Option<StrOrNum>,
    ps: Option<String>,
    scy: Option<String>,
    net: Option<String>,
    host: Option<String>,
    path: Option<String>,
    tls: Option<String>,
    sni: Option<String>,
}

/// Decode the part of a `vmess://` link after the scheme: base64 of a JSON document.
pub(super) fn decode(body: &str) -> DecodeResult<ProxyDescriptor> {
    let json = decode_base64_str(body.trim())?;
    let doc: VmessDocument =
        serde_json::from_str(&json).map_err(|e| DecodeError::InvalidDocument(e.to_string()))?;

    let address = required(doc.add, "add")?;
    let port = match doc.port.ok_or(DecodeError::MissingField("port"))? {
        StrOrNum::Str(s) => parse_port(&s)?,
        number => number
            .as_u16()
            .filter(|p| *p != 0)
            .ok_or(DecodeError::InvalidPort)?,
    };
    let user_id = required(doc.id, "id")?;
    let alter_id = doc
        .aid
        .ok_or(DecodeError::MissingField("aid"))?
        .as_u16()
        .ok_or(DecodeError::InvalidField("aid"))?;

    let security = doc
        .scy
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "auto".to_string());
    let transport = VmessTransport {
        network: doc.net,
        host: doc.host,
        path: doc.path,
        tls: doc.tls.as_deref() == Some("tls"),
        sni: doc.sni,
    };

    Ok(
        ProxyDescriptor::vmess(&address, port, &user_id, alter_id, &security, &transport)
            .with_remark(doc.ps),
    )
}

fn required(value: Option<String>, name: &'static str) -> DecodeResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(DecodeError::MissingField(name))
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde_json::json;

    use super::*;
    use crate::models::{Credentials, ProxyKind};

    fn encode(doc: &serde_json::Value) -> String {
        STANDARD.encode(doc.to_string())
    }

    #[test]
    fn test_decode_string_port_and_aid() {
        let body = encode(&json!({
            "v": "2", "ps": "JP-01", "add": "jp.example", "port": "443",
            "id": "301d815f-a02a-4c2c-a424-b16cf0a241ae", "aid": "0",
            "net": "tcp", "type": "none", "tls": ""
        }));
        let proxy = decode(&body).unwrap();

        assert_eq!(proxy.kind(), ProxyKind::Vmess);
        assert_eq!(proxy.id(), "jp.example:443");
        assert_eq!(proxy.port(), 443);
        assert_eq!(proxy.remark(), Some("JP-01"));
        assert_eq!(
            proxy.credentials(),
            &Credentials::Vmess {
                user_id: "301d815f-a02a-4c2c-a424-b16cf0a241ae".to_string(),
                alter_id: 0,
                security: "auto".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_numeric_port_embedded_in_outbound() {
        let body = encode(&json!({
            "add": "1.2.3.4", "port": 10086, "id": "uuid-x", "aid": 64, "scy": "aes-128-gcm"
        }));
        let proxy = decode(&body).unwrap();
        let outbound = serde_json::to_value(proxy.outbound()).unwrap();

        let server = &outbound["settings"]["vnext"][0];
        assert_eq!(server["address"], "1.2.3.4");
        assert_eq!(server["port"], 10086);
        assert!(server["port"].is_number());
        assert_eq!(server["users"][0]["id"], "uuid-x");
        assert_eq!(server["users"][0]["alterId"], 64);
        assert_eq!(server["users"][0]["security"], "aes-128-gcm");
    }

    #[test]
    fn test_decode_ws_tls_stream_settings() {
        let body = encode(&json!({
            "add": "a.example", "port": "443", "id": "u", "aid": "0",
            "net": "ws", "host": "cdn.example", "path": "/ray", "tls": "tls"
        }));
        let proxy = decode(&body).unwrap();
        let stream = proxy.outbound().stream_settings.as_ref().unwrap();
        assert_eq!(stream.network, "ws");
        assert_eq!(stream.security.as_deref(), Some("tls"));
        assert_eq!(stream.ws_settings.as_ref().unwrap().path, "/ray");
    }

    #[test]
    fn test_decode_missing_fields() {
        let full = json!({"add": "h", "port": "1", "id": "u", "aid": "0"});
        for field in ["add", "port", "id", "aid"] {
            let mut doc = full.clone();
            doc.as_object_mut().unwrap().remove(field);
            assert_eq!(
                decode(&encode(&doc)),
                Err(DecodeError::MissingField(field)),
                "{field}"
            );
        }

        let empty_add = json!({"add": "", "port": "1", "id": "u", "aid": "0"});
        assert_eq!(
            decode(&encode(&empty_add)),
            Err(DecodeError::MissingField("add"))
        );
    }

    #[test]
    fn test_decode_invalid_port() {
        let ports = [
            json!("abc"),
            json!(0),
            json!(70000),
            json!(""),
            json!(-1),
            json!(443.5),
            json!(443.0),
        ];
        for port in ports {
            let doc = json!({"add": "h", "port": port, "id": "u", "aid": "0"});
            assert_eq!(decode(&encode(&doc)), Err(DecodeError::InvalidPort), "{doc}");
        }
    }

    #[test]
    fn test_decode_invalid_aid() {
        for aid in [json!("x"), json!(-1), json!(0.5)] {
            let doc = json!({"add": "h", "port": "1", "id": "u", "aid": aid});
            assert_eq!(
                decode(&encode(&doc)),
                Err(DecodeError::InvalidField("aid")),
                "{doc}"
            );
        }
    }

    #[test]
    fn test_decode_not_json() {
        let body = STANDARD.encode("not json");
        assert!(matches!(decode(&body), Err(DecodeError::InvalidDocument(_))));
    }
}

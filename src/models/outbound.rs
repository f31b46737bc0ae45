//! Typed v2ray outbound objects
//!
//! Serializes to the `outbounds[]` entry the engine expects, so a decoded descriptor can be
//! dropped into the engine config without being re-interpreted.

use std::collections::BTreeMap;

use serde::Serialize;

/// Tag the routing rule in the engine config points at
pub const PROXY_OUTBOUND_TAG: &str = "proxy";

/// Email v2ray requires on every vmess user entry
const VMESS_USER_EMAIL: &str = "t@t.tt";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundSpec {
    pub tag: String,
    pub protocol: String,
    pub settings: OutboundSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_settings: Option<StreamSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mux: Option<MuxSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutboundSettings {
    Shadowsocks { servers: Vec<ShadowsocksServer> },
    Vmess { vnext: Vec<VmessServer> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShadowsocksServer {
    pub address: String,
    pub method: String,
    pub ota: bool,
    pub password: String,
    pub port: u16,
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VmessServer {
    pub address: String,
    pub port: u16,
    pub users: Vec<VmessUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VmessUser {
    pub id: String,
    pub alter_id: u16,
    pub email: String,
    pub security: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSettings {
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_settings: Option<TlsSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ws_settings: Option<WsSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsSettings {
    pub server_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WsSettings {
    pub path: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MuxSettings {
    pub enabled: bool,
    pub concurrency: i32,
}

impl StreamSettings {
    pub fn tcp() -> Self {
        Self {
            network: "tcp".to_string(),
            security: None,
            tls_settings: None,
            ws_settings: None,
        }
    }
}

impl OutboundSpec {
    pub fn shadowsocks(address: &str, port: u16, method: &str, password: &str) -> Self {
        Self {
            tag: PROXY_OUTBOUND_TAG.to_string(),
            protocol: "shadowsocks".to_string(),
            settings: OutboundSettings::Shadowsocks {
                servers: vec![ShadowsocksServer {
                    address: address.to_string(),
                    method: method.to_string(),
                    ota: false,
                    password: password.to_string(),
                    port,
                    level: 1,
                }],
            },
            stream_settings: Some(StreamSettings::tcp()),
            mux: Some(MuxSettings {
                enabled: false,
                concurrency: -1,
            }),
        }
    }

    pub fn vmess(
        address: &str,
        port: u16,
        user_id: &str,
        alter_id: u16,
        security: &str,
        stream_settings: StreamSettings,
    ) -> Self {
        Self {
            tag: PROXY_OUTBOUND_TAG.to_string(),
            protocol: "vmess".to_string(),
            settings: OutboundSettings::Vmess {
                vnext: vec![VmessServer {
                    address: address.to_string(),
                    port,
                    users: vec![VmessUser {
                        id: user_id.to_string(),
                        alter_id,
                        email: VMESS_USER_EMAIL.to_string(),
                        security: security.to_string(),
                    }],
                }],
            },
            stream_settings: Some(stream_settings),
            mux: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shadowsocks_outbound_json() {
        let outbound = OutboundSpec::shadowsocks("1.2.3.4", 8388, "aes-256-gcm", "secret");
        assert_eq!(
            serde_json::to_value(&outbound).unwrap(),
            json!({
                "tag": "proxy",
                "protocol": "shadowsocks",
                "settings": {
                    "servers": [{
                        "address": "1.2.3.4",
                        "method": "aes-256-gcm",
                        "ota": false,
                        "password": "secret",
                        "port": 8388,
                        "level": 1
                    }]
                },
                "streamSettings": { "network": "tcp" },
                "mux": { "enabled": false, "concurrency": -1 }
            })
        );
    }

    #[test]
    fn test_vmess_outbound_json_with_ws_tls() {
        let mut headers = BTreeMap::new();
        headers.insert("Host".to_string(), "cdn.example".to_string());
        let stream = StreamSettings {
            network: "ws".to_string(),
            security: Some("tls".to_string()),
            tls_settings: Some(TlsSettings {
                server_name: "cdn.example".to_string(),
            }),
            ws_settings: Some(WsSettings {
                path: "/ray".to_string(),
                headers,
            }),
        };
        let outbound = OutboundSpec::vmess("a.example", 443, "uuid-1", 0, "auto", stream);
        let value = serde_json::to_value(&outbound).unwrap();

        assert_eq!(value["protocol"], "vmess");
        assert_eq!(value["settings"]["vnext"][0]["port"], 443);
        assert_eq!(value["settings"]["vnext"][0]["users"][0]["alterId"], 0);
        assert_eq!(value["settings"]["vnext"][0]["users"][0]["email"], "t@t.tt");
        assert_eq!(value["streamSettings"]["network"], "ws");
        assert_eq!(value["streamSettings"]["tlsSettings"]["serverName"], "cdn.example");
        assert_eq!(value["streamSettings"]["wsSettings"]["headers"]["Host"], "cdn.example");
        assert!(value.get("mux").is_none());
    }
}

//! Engine configuration document

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::Result;
use crate::models::{OutboundSpec, PROXY_OUTBOUND_TAG};

/// Build the full v2ray config with `outbound` as the routed proxy
pub fn render(http_port: u16, socks_port: u16, outbound: &OutboundSpec) -> Result<Value> {
    let proxy = serde_json::to_value(outbound)?;
    Ok(json!({
        "log": {
            "access": "",
            "error": "",
            "loglevel": "debug"
        },
        "inbounds": [
            inbound("socks", socks_port, "socks", json!({
                "auth": "noauth",
                "udp": true,
                "allowTransparent": false
            })),
            inbound("http", http_port, "http", json!({
                "auth": "noauth",
                "udp": true,
                "allowTransparent": false
            }))
        ],
        "outbounds": [
            {
                "tag": "direct",
                "protocol": "freedom",
                "settings": {}
            },
            {
                "tag": "block",
                "protocol": "blackhole",
                "settings": {
                    "response": { "type": "http" }
                }
            },
            proxy
        ],
        "routing": {
            "domainStrategy": "AsIs",
            "rules": [
                {
                    "type": "field",
                    "port": "0-65535",
                    "outboundTag": PROXY_OUTBOUND_TAG,
                    "enabled": true
                }
            ]
        }
    }))
}

fn inbound(tag: &str, port: u16, protocol: &str, settings: Value) -> Value {
    json!({
        "tag": tag,
        "port": port,
        "listen": "0.0.0.0",
        "protocol": protocol,
        "sniffing": {
            "enabled": false,
            "destOverride": ["http", "tls"],
            "routeOnly": false
        },
        "settings": settings
    })
}

/// Pretty JSON with four-space indentation
pub fn to_pretty_bytes(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    out.push(b'\n');
    Ok(out)
}

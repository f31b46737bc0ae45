use serde::Serialize;

use super::outbound::{OutboundSpec, StreamSettings};

/// Proxy protocol of a decoded link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    Shadowsocks,
    Vmess,
}

impl ProxyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyKind::Shadowsocks => "shadowsocks",
            ProxyKind::Vmess => "vmess",
        }
    }

    /// Link scheme prefix, including `://`
    pub fn scheme(&self) -> &'static str {
        match self {
            ProxyKind::Shadowsocks => "ss://",
            ProxyKind::Vmess => "vmess://",
        }
    }
}

impl std::fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Protocol-specific secrets, only read when building the outbound
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Shadowsocks {
        method: String,
        password: String,
    },
    Vmess {
        user_id: String,
        alter_id: u16,
        security: String,
    },
}

/// Vmess transport options taken from the share document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VmessTransport {
    pub network: Option<String>,
    pub host: Option<String>,
    pub path: Option<String>,
    pub tls: bool,
    pub sni: Option<String>,
}

impl VmessTransport {
    fn stream_settings(&self) -> StreamSettings {
        use super::outbound::{TlsSettings, WsSettings};

        let network = self
            .network
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or("tcp");
        let mut stream = StreamSettings {
            network: network.to_string(),
            ..StreamSettings::tcp()
        };

        if network == "ws" {
            let mut headers = std::collections::BTreeMap::new();
            if let Some(host) = self.host.as_deref().filter(|h| !h.is_empty()) {
                headers.insert("Host".to_string(), host.to_string());
            }
            stream.ws_settings = Some(WsSettings {
                path: self
                    .path
                    .clone()
                    .filter(|p| !p.is_empty())
                    .unwrap_or_else(|| "/".to_string()),
                headers,
            });
        }

        if self.tls {
            stream.security = Some("tls".to_string());
            let server_name = self
                .sni
                .as_deref()
                .filter(|s| !s.is_empty())
                .or_else(|| self.host.as_deref().filter(|h| !h.is_empty()));
            stream.tls_settings = server_name.map(|name| TlsSettings {
                server_name: name.to_string(),
            });
        }

        stream
    }
}

/// One decoded backend proxy
///
/// Immutable once built; the pool shares it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyDescriptor {
    id: String,
    kind: ProxyKind,
    address: String,
    port: u16,
    #[serde(skip_serializing)]
    credentials: Credentials,
    #[serde(skip_serializing_if = "Option::is_none")]
    remark: Option<String>,
    outbound: OutboundSpec,
}

impl ProxyDescriptor {
    pub fn shadowsocks(address: &str, port: u16, method: &str, password: &str) -> Self {
        Self {
            id: descriptor_id(address, port),
            kind: ProxyKind::Shadowsocks,
            address: address.to_string(),
            port,
            credentials: Credentials::Shadowsocks {
                method: method.to_string(),
                password: password.to_string(),
            },
            remark: None,
            outbound: OutboundSpec::shadowsocks(address, port, method, password),
        }
    }

    pub fn vmess(
        address: &str,
        port: u16,
        user_id: &str,
        alter_id: u16,
        security: &str,
        transport: &VmessTransport,
    ) -> Self {
        Self {
            id: descriptor_id(address, port),
            kind: ProxyKind::Vmess,
            address: address.to_string(),
            port,
            credentials: Credentials::Vmess {
                user_id: user_id.to_string(),
                alter_id,
                security: security.to_string(),
            },
            remark: None,
            outbound: OutboundSpec::vmess(
                address,
                port,
                user_id,
                alter_id,
                security,
                transport.stream_settings(),
            ),
        }
    }

    /// Attach a display name; consumes the builder value before it is shared
    pub fn with_remark(mut self, remark: Option<String>) -> Self {
        self.remark = remark.filter(|r| !r.trim().is_empty());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ProxyKind {
        self.kind
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn remark(&self) -> Option<&str> {
        self.remark.as_deref()
    }

    pub fn outbound(&self) -> &OutboundSpec {
        &self.outbound
    }

    /// Name used in log lines
    pub fn label(&self) -> String {
        match &self.remark {
            Some(remark) => format!("{} ({})", self.id, remark),
            None => self.id.clone(),
        }
    }
}

fn descriptor_id(address: &str, port: u16) -> String {
    format!("{}:{}", address, port)
}

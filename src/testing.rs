//! In-memory fakes for the component seams

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::check::ReachabilityCheck;
use crate::error::{Result, SwitchError};
use crate::models::ProxyDescriptor;
use crate::probe::Dialer;
use crate::sink::ConfigSink;
use crate::subscription::{FetchError, SubscriptionTransport};

pub fn ss(host: &str, port: u16) -> ProxyDescriptor {
    ProxyDescriptor::shadowsocks(host, port, "aes-256-gcm", "pw")
}

pub fn ss_link(host: &str, port: u16) -> String {
    format!("ss://{}", STANDARD.encode(format!("aes-256-gcm:pw@{}:{}", host, port)))
}

/// Base64 subscription body carrying `links`
pub fn subscription(links: &[String]) -> String {
    STANDARD.encode(links.join("\n"))
}

#[derive(Debug, Clone, Copy)]
pub enum DialBehavior {
    /// Connect succeeds after this many milliseconds
    Delay(u64),
    Refuse,
    /// Never completes
    Hang,
}

/// Dialer with scripted per-endpoint behavior; unknown endpoints refuse
pub struct FakeDialer {
    behaviors: Mutex<HashMap<String, DialBehavior>>,
}

impl FakeDialer {
    pub fn new<'a, I>(behaviors: I) -> Arc<Self>
    where
        I: IntoIterator<Item = (&'a str, DialBehavior)>,
    {
        Arc::new(Self {
            behaviors: Mutex::new(
                behaviors
                    .into_iter()
                    .map(|(id, b)| (id.to_string(), b))
                    .collect(),
            ),
        })
    }

    pub fn set(&self, id: &str, behavior: DialBehavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(id.to_string(), behavior);
    }
}

#[async_trait]
impl Dialer for FakeDialer {
    async fn dial(&self, host: &str, port: u16) -> std::io::Result<()> {
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&format!("{}:{}", host, port))
            .copied()
            .unwrap_or(DialBehavior::Refuse);

        match behavior {
            DialBehavior::Delay(ms) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(())
            }
            DialBehavior::Refuse => Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )),
            DialBehavior::Hang => std::future::pending().await,
        }
    }
}

/// Serves queued responses and counts requests
pub struct QueuedTransport {
    responses: tokio::sync::Mutex<VecDeque<std::result::Result<String, FetchError>>>,
    calls: AtomicUsize,
}

impl QueuedTransport {
    pub fn new(responses: Vec<std::result::Result<String, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: tokio::sync::Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriptionTransport for QueuedTransport {
    async fn get(&self, _url: &str) -> std::result::Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Transport("no response queued".into())))
    }
}

/// Records every activation
#[derive(Default)]
pub struct RecordingSink {
    activations: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn activations(&self) -> Vec<String> {
        self.activations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfigSink for RecordingSink {
    async fn activate(&self, descriptor: &ProxyDescriptor) -> Result<()> {
        self.activations
            .lock()
            .unwrap()
            .push(descriptor.id().to_string());
        if self.fail {
            return Err(SwitchError::Sink("engine refused to start".into()));
        }
        Ok(())
    }
}

/// Replays scripted outcomes, then repeats `fallback`
pub struct ScriptedCheck {
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
    calls: AtomicUsize,
}

impl ScriptedCheck {
    pub fn new(script: Vec<bool>, fallback: bool) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn always(pass: bool) -> Arc<Self> {
        Self::new(Vec::new(), pass)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityCheck for ScriptedCheck {
    async fn check(&self) -> Result<u16> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pass = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        if pass {
            Ok(200)
        } else {
            Err(SwitchError::Check("connection reset".into()))
        }
    }
}

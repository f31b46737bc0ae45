//! v2ray / v2fly engine sink
//!
//! Writes the engine config with the chosen outbound and restarts the engine process.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{template, ConfigSink};
use crate::error::{Result, SwitchError};
use crate::models::ProxyDescriptor;

/// Engine process and config file settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Engine executable, looked up on PATH unless absolute
    pub binary: String,
    /// Directory holding the config file
    pub config_dir: PathBuf,
    /// Config file name inside `config_dir`
    pub config_file: String,
    /// Local HTTP proxy inbound port
    pub http_port: u16,
    /// Local SOCKS proxy inbound port
    pub socks_port: u16,
    /// Time given to the engine to bind its ports after spawn
    pub startup_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: "v2ray".to_string(),
            config_dir: PathBuf::from("/etc/v2fly/"),
            config_file: "config.json".to_string(),
            http_port: 1080,
            socks_port: 1081,
            startup_grace: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(&self.config_file)
    }
}

pub struct V2rayConfigSink {
    config: EngineConfig,
    child: Mutex<Option<Child>>,
    stray_checked: AtomicBool,
}

impl V2rayConfigSink {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            child: Mutex::new(None),
            stray_checked: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn write_config(&self, descriptor: &ProxyDescriptor) -> Result<PathBuf> {
        let document = template::render(
            self.config.http_port,
            self.config.socks_port,
            descriptor.outbound(),
        )?;

        tokio::fs::create_dir_all(&self.config.config_dir).await?;
        let path = self.config.config_path();
        tokio::fs::write(&path, template::to_pretty_bytes(&document)?).await?;
        debug!("Wrote engine config to {}", path.display());
        Ok(path)
    }

    async fn restart(&self, path: &Path) -> Result<()> {
        let mut child = self.child.lock().await;

        match child.take() {
            Some(mut previous) => {
                // Already exited is fine.
                if let Err(e) = previous.kill().await {
                    debug!("Previous engine process not killed: {}", e);
                }
            }
            None => {
                if !self.stray_checked.swap(true, Ordering::SeqCst) {
                    if let Err(e) = kill_stray(&self.config.binary).await {
                        debug!("No stray engine process stopped: {}", e);
                    }
                }
            }
        }

        let mut spawned = Command::new(&self.config.binary)
            .arg("run")
            .arg("-c")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SwitchError::Sink(format!("failed to start {}: {}", self.config.binary, e))
            })?;

        if let Some(stdout) = spawned.stdout.take() {
            tokio::spawn(forward_output(stdout, false));
        }
        if let Some(stderr) = spawned.stderr.take() {
            tokio::spawn(forward_output(stderr, true));
        }

        info!(
            "Engine started (pid {:?}) with {}",
            spawned.id(),
            path.display()
        );
        *child = Some(spawned);
        drop(child);

        tokio::time::sleep(self.config.startup_grace).await;
        Ok(())
    }
}

#[async_trait]
impl ConfigSink for V2rayConfigSink {
    #[instrument(skip(self, descriptor), fields(proxy = %descriptor.id()))]
    async fn activate(&self, descriptor: &ProxyDescriptor) -> Result<()> {
        let path = self.write_config(descriptor).await?;
        self.restart(&path).await
    }

    async fn shutdown(&self) {
        if let Some(mut child) = self.child.lock().await.take() {
            match child.kill().await {
                Ok(()) => info!("Engine process stopped"),
                Err(e) => warn!("Failed to stop engine process: {}", e),
            }
        }
    }
}

/// Stop an engine instance this process did not start
async fn kill_stray(binary: &str) -> anyhow::Result<()> {
    let name = Path::new(binary)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(binary);

    #[cfg(windows)]
    let status = Command::new("taskkill")
        .args(["/IM", &format!("{}.exe", name.trim_end_matches(".exe")), "/F"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;

    #[cfg(not(windows))]
    let status = Command::new("pkill")
        .arg(name)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;

    if !status.success() {
        anyhow::bail!("{} not running ({})", name, status);
    }
    info!("Stopped stray {} process", name);
    Ok(())
}

async fn forward_output<R>(reader: R, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if is_stderr {
            warn!(target: "subswitch::engine", "{}", line);
        } else {
            info!(target: "subswitch::engine", "{}", line);
        }
    }
}

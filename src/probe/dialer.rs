use async_trait::async_trait;
use tokio::net::TcpStream;

/// Opens (and immediately closes) a connection to a proxy endpoint
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, host: &str, port: u16) -> std::io::Result<()>;
}

/// Plain TCP connect
pub struct TcpDialer;

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, host: &str, port: u16) -> std::io::Result<()> {
        let stream = TcpStream::connect((host, port)).await?;
        drop(stream);
        Ok(())
    }
}

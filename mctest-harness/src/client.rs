//! Minimal cache client for the ordinary get/set/incr path.
//!
//! Keeps the pool/accesspoint bookkeeping shape of the production client
//! it stands in for: servers belong to named pools, each server address
//! maps to one accesspoint, and operations go to the first server of the
//! default pool. Soft errors accumulate and are drained by `errors()`;
//! hard failures (refused connections, protocol garbage) are returned
//! directly.

use std::collections::HashMap;
use std::time::Duration;

use mctest_core::error::{McTestError, Result};
use mctest_protocol::codec::{self, IncrReply, StoreReply};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

struct Conn {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

pub struct McClient {
    name: String,
    pub default_serverpool: Option<String>,
    pools: HashMap<String, Vec<String>>,
    accesspoints: HashMap<String, (String, u16)>,
    conn: Option<Conn>,
    soft_errors: Vec<String>,
    timeout: Duration,
}

impl McClient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_serverpool: None,
            pools: HashMap::new(),
            accesspoints: HashMap::new(),
            conn: None,
            soft_errors: Vec::new(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_serverpool(&mut self, pool: impl Into<String>) {
        self.pools.entry(pool.into()).or_default();
    }

    pub fn add_server(&mut self, address: impl Into<String>) {
        // Accesspoints are attached separately; an address with no
        // accesspoint simply cannot be connected to.
        self.accesspoints.entry(address.into()).or_default();
    }

    pub fn add_accesspoint(&mut self, address: impl Into<String>, host: impl Into<String>, port: u16) {
        self.accesspoints
            .insert(address.into(), (host.into(), port));
    }

    pub fn serverpool_add_server(&mut self, pool: &str, address: impl Into<String>) -> Result<()> {
        match self.pools.get_mut(pool) {
            Some(servers) => {
                servers.push(address.into());
                Ok(())
            }
            None => Err(McTestError::Client(format!("unknown serverpool {}", pool))),
        }
    }

    /// Store with no expiry.
    pub async fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_with_exptime(key, value, 0).await
    }

    pub async fn set_with_exptime(&mut self, key: &str, value: &str, exptime: u32) -> Result<()> {
        let request = codec::set_request(key, 0, exptime, value);
        self.send_line(&request).await?;
        let reply = self.read_line().await?;
        match codec::parse_store_reply(&reply) {
            StoreReply::Stored => Ok(()),
            StoreReply::NotStored => Err(McTestError::Client(format!("{} not stored", key))),
            StoreReply::Error(e) => Err(McTestError::Client(e)),
        }
    }

    /// Fetch many keys at once; absent keys are simply missing from the
    /// result, never an error.
    pub async fn get(&mut self, keys: &[&str]) -> Result<HashMap<String, String>> {
        self.send_line(&codec::get_request(keys)).await?;

        let mut result = HashMap::new();
        loop {
            let line = self.read_line().await?;
            if line.trim_end() == "END" {
                break;
            }
            let header = codec::parse_value_header(&line).map_err(McTestError::Client)?;
            let data = self.read_line().await?;
            if data.len() != header.len {
                self.soft_errors.push(format!(
                    "{}: value length {} does not match header {}",
                    header.key,
                    data.len(),
                    header.len
                ));
            }
            result.insert(header.key, data);
        }
        Ok(result)
    }

    pub async fn incr(&mut self, key: &str, delta: u64) -> Result<u64> {
        self.send_line(&codec::incr_request(key, delta)).await?;
        let reply = self.read_line().await?;
        match codec::parse_incr_reply(&reply) {
            IncrReply::Value(v) => Ok(v),
            IncrReply::NotFound => Err(McTestError::Client(format!("{} not found", key))),
            IncrReply::Error(e) => Err(McTestError::Client(e)),
        }
    }

    /// Drain accumulated soft errors; `None` when there were none.
    pub fn errors(&mut self) -> Option<Vec<String>> {
        if self.soft_errors.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.soft_errors))
        }
    }

    async fn send_line(&mut self, line: &str) -> Result<()> {
        self.ensure_connected().await?;
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| McTestError::Client("not connected".to_string()))?;
        conn.writer
            .write_all(format!("{}\r\n", line).as_bytes())
            .await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String> {
        let secs = self.timeout.as_secs();
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| McTestError::Client("not connected".to_string()))?;
        match tokio::time::timeout(self.timeout, conn.lines.next_line())
            .await
            .map_err(|_| McTestError::Client(format!("no reply within {}s", secs)))??
        {
            Some(line) => Ok(line),
            None => Err(McTestError::Client("server closed connection".to_string())),
        }
    }

    async fn ensure_connected(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }

        let (host, port) = self.pick_accesspoint()?;
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect((host.as_str(), port)))
            .await
            .map_err(|_| McTestError::Client(format!("connect to {}:{} timed out", host, port)))?
            .map_err(|e| McTestError::Client(format!("connect to {}:{}: {}", host, port, e)))?;
        let (reader, writer) = stream.into_split();
        debug!(client = %self.name, host = %host, port, "client connected");
        self.conn = Some(Conn {
            lines: BufReader::new(reader).lines(),
            writer,
        });
        Ok(())
    }

    fn pick_accesspoint(&self) -> Result<(String, u16)> {
        let pool = self
            .default_serverpool
            .as_ref()
            .ok_or_else(|| McTestError::Client("no default serverpool".to_string()))?;
        let server = self
            .pools
            .get(pool)
            .and_then(|servers| servers.first())
            .ok_or_else(|| McTestError::Client(format!("serverpool {} is empty", pool)))?;
        match self.accesspoints.get(server) {
            Some((host, port)) if *port != 0 => Ok((host.clone(), *port)),
            _ => Err(McTestError::Client(format!(
                "no accesspoint for server {}",
                server
            ))),
        }
    }
}

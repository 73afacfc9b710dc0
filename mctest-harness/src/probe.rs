//! Sideband probe session.
//!
//! A raw line-oriented connection, separate from the ordinary client
//! path, used to inspect per-key metadata the server never exposes
//! through get/set. One session serves one probe sequence; there is no
//! reconnection. Every exchange runs under an explicit deadline so a
//! server that crashes mid-probe or drifts from the grammar surfaces as
//! an error instead of a hang.

use std::time::Duration;

use mctest_core::error::{McTestError, Result};
use mctest_protocol::parser::{is_end_marker, metaget_request, parse_meta_line};
use mctest_protocol::MetaInfo;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

pub struct SidebandProbe {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    timeout: Duration,
}

impl SidebandProbe {
    /// Open a session to a running instance. The connect itself runs
    /// under the same deadline as later exchanges.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| McTestError::ProbeTimeout {
                secs: timeout.as_secs(),
            })??;
        let (reader, writer) = stream.into_split();
        debug!(host, port, "sideband session open");
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            writer,
            timeout,
        })
    }

    /// Issue `metaget <key>` and parse the two-branch response.
    pub async fn get_metainfo(&mut self, key: &str) -> Result<MetaInfo> {
        let secs = self.timeout.as_secs();
        tokio::time::timeout(self.timeout, self.exchange(key))
            .await
            .map_err(|_| McTestError::ProbeTimeout { secs })?
    }

    async fn exchange(&mut self, key: &str) -> Result<MetaInfo> {
        let request = format!("{}\r\n", metaget_request(key));
        self.writer.write_all(request.as_bytes()).await?;

        let first = self.next_line().await?;
        if is_end_marker(&first) {
            return Ok(MetaInfo::NotFound);
        }

        let meta = parse_meta_line(&first).map_err(McTestError::ProtocolMismatch)?;
        if meta.key != key {
            return Err(McTestError::ProtocolMismatch(format!(
                "metainfo for wrong key: asked {}, got {}",
                key, meta.key
            )));
        }

        let end = self.next_line().await?;
        if !is_end_marker(&end) {
            return Err(McTestError::ProtocolMismatch(format!(
                "expected end marker after META line, got {:?}",
                end
            )));
        }

        Ok(MetaInfo::Found {
            age: meta.age,
            exptime: meta.exptime,
            origin: meta.origin,
        })
    }

    async fn next_line(&mut self) -> Result<String> {
        match self.lines.next_line().await? {
            Some(line) => Ok(line),
            None => Err(McTestError::ProtocolMismatch(
                "connection closed mid-response".to_string(),
            )),
        }
    }

    /// Terminate the session explicitly. Dropping the probe also closes
    /// the connection; this exists so scenarios can order teardown.
    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

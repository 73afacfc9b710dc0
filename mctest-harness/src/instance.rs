//! Launch configuration and runtime handle for one supervised server.

use camino::Utf8PathBuf;
use tokio::process::Child;

/// One ephemeral cache-server instance.
///
/// The instance exclusively owns its process handle while running; the
/// log multiplexer only ever sees the name and the stderr line stream.
/// Once `running` is true the port fields are frozen until `stop()`.
pub struct ServerInstance {
    name: String,
    port: Option<u16>,
    udp_port: Option<u16>,
    use_udp: bool,
    program: Utf8PathBuf,
    extra_args: Vec<String>,
    pub(crate) process: Option<Child>,
    pub(crate) running: bool,
    pub(crate) args: Vec<String>,
}

impl ServerInstance {
    pub fn new(name: impl Into<String>, program: impl Into<Utf8PathBuf>) -> Self {
        Self {
            name: name.into(),
            port: None,
            udp_port: None,
            use_udp: false,
            program: program.into(),
            extra_args: Vec::new(),
            process: None,
            running: false,
            args: Vec::new(),
        }
    }

    /// Pin the TCP port. Pinned ports are used as-is, with no bind retry.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Enable UDP on an auto-selected port.
    pub fn with_udp(mut self) -> Self {
        self.use_udp = true;
        self
    }

    /// Pin the UDP port (implies UDP is enabled).
    pub fn with_udp_port(mut self, port: u16) -> Self {
        self.use_udp = true;
        self.udp_port = Some(port);
        self
    }

    /// Pass-through arguments appended after the harness-owned flags.
    pub fn with_extra_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.extra_args = args.into_iter().collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> &Utf8PathBuf {
        &self.program
    }

    /// Bound TCP port; `None` until `start()` has succeeded for
    /// auto-selected instances.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn udp_port(&self) -> Option<u16> {
        self.udp_port
    }

    pub fn use_udp(&self) -> bool {
        self.use_udp
    }

    pub fn extra_args(&self) -> &[String] {
        &self.extra_args
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Final argv recorded by the last successful `start()`.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// `host:port` address for clients, once started.
    pub fn addr(&self) -> Option<String> {
        self.port.map(|p| format!("127.0.0.1:{}", p))
    }

    pub(crate) fn set_port(&mut self, port: u16) {
        self.port = Some(port);
    }

    pub(crate) fn set_udp_port(&mut self, port: u16) {
        self.udp_port = Some(port);
    }
}

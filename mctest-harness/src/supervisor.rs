//! Launch/retry/stop lifecycle for server instances.
//!
//! Ports are not reserved from the OS ahead of time: for auto-selected
//! ports the supervisor samples a random candidate, spawns the server
//! with it, and watches the first second of stderr for a `bind()`
//! failure. Attempts are capped; past the cap `start()` fails with
//! `PortExhausted` instead of retrying forever.

use std::process::Stdio;
use std::time::Duration;

use mctest_core::config::ServerConfig;
use mctest_core::error::{McTestError, Result};
use rand::RngExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::instance::ServerInstance;
use crate::logmux::{LogMux, Sink, Watch};

/// Marker prefix on the first stderr line of a server that lost a bind
/// race. Everything else on stderr is ordinary diagnostics.
const BIND_FAILURE_PREFIX: &str = "bind()";

/// Grace period between the hangup signal and a forced kill on stop.
const STOP_GRACE: Duration = Duration::from_secs(2);

pub struct Supervisor {
    mux: LogMux,
    launch_probe: Duration,
    max_port_attempts: u32,
    port_min: u16,
    port_max: u16,
    verbose: bool,
}

impl Supervisor {
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_sink(config, Sink::Stderr)
    }

    pub fn with_sink(config: &ServerConfig, sink: Sink) -> Self {
        Self {
            mux: LogMux::with_sink(sink),
            launch_probe: Duration::from_millis(config.launch_probe_ms),
            max_port_attempts: config.max_port_attempts,
            port_min: config.port_min,
            port_max: config.port_max,
            verbose: config.verbose,
        }
    }

    /// Launch an instance. No-op when it is already running.
    ///
    /// A pinned port is used directly; an auto-selected port is retried
    /// on bind conflicts up to the configured attempt ceiling. When both
    /// the TCP and UDP ports are auto-selected, the same candidate value
    /// is tried for both until half the budget is spent, then the two are
    /// sampled independently.
    pub async fn start(&self, instance: &mut ServerInstance) -> Result<()> {
        if instance.is_running() {
            return Ok(());
        }

        let auto_port = instance.port().is_none();
        let auto_udp = instance.use_udp() && instance.udp_port().is_none();
        let retryable = auto_port || auto_udp;

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if attempts > self.max_port_attempts {
                return Err(McTestError::PortExhausted {
                    attempts: self.max_port_attempts,
                });
            }

            let port = match instance.port() {
                Some(port) => port,
                None => self.sample_port(),
            };
            let udp_port = if instance.use_udp() {
                Some(match instance.udp_port() {
                    Some(port) => port,
                    None if auto_port && attempts * 2 <= self.max_port_attempts => port,
                    None => self.sample_port(),
                })
            } else {
                None
            };

            let args = self.build_args(port, udp_port, instance.extra_args());
            debug!(instance = %instance.name(), ?args, "spawning server");

            let mut child = Command::new(instance.program())
                .args(&args)
                .stdin(Stdio::null())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| {
                    McTestError::LaunchFatal(format!(
                        "failed to spawn {}: {}",
                        instance.program(),
                        e
                    ))
                })?;
            let stderr = child.stderr.take().ok_or_else(|| {
                McTestError::LaunchFatal("child stderr was not captured".to_string())
            })?;
            let mut lines = BufReader::new(stderr).lines();

            if retryable {
                match tokio::time::timeout(self.launch_probe, lines.next_line()).await {
                    // Silence within the probe interval: the bind succeeded.
                    Err(_) => {}
                    Ok(Ok(Some(line))) if line.starts_with(BIND_FAILURE_PREFIX) => {
                        debug!(instance = %instance.name(), port, "bind conflict, resampling");
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        continue;
                    }
                    Ok(Ok(Some(line))) => {
                        // Ordinary startup diagnostics; forward and carry on.
                        eprintln!("{}: {}", instance.name(), line);
                    }
                    Ok(Ok(None)) => {
                        let status = child.wait().await?;
                        return Err(McTestError::LaunchFatal(format!(
                            "{} exited during startup: {}",
                            instance.name(),
                            status
                        )));
                    }
                    Ok(Err(e)) => return Err(e.into()),
                }
            }

            instance.set_port(port);
            if let Some(udp) = udp_port {
                instance.set_udp_port(udp);
            }
            instance.args = args;
            instance.process = Some(child);
            instance.running = true;

            self.mux
                .register(Watch {
                    name: instance.name().to_string(),
                    lines,
                })
                .await;

            info!(instance = %instance.name(), port, attempts, "server started");
            return Ok(());
        }
    }

    /// Stop an instance. Safe no-op when never started or already
    /// stopped; the hangup signal is delivered at most once.
    pub async fn stop(&self, instance: &mut ServerInstance) -> Result<()> {
        let Some(mut child) = instance.process.take() else {
            instance.running = false;
            return Ok(());
        };

        if let Some(pid) = child.id() {
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;

            if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGHUP) {
                warn!(instance = %instance.name(), pid, "failed to send SIGHUP: {}", e);
            }
        }

        // Reap, falling back to a forced kill if the hangup is ignored.
        match tokio::time::timeout(STOP_GRACE, child.wait()).await {
            Ok(status) => {
                debug!(instance = %instance.name(), "server exited: {:?}", status.ok());
            }
            Err(_) => {
                warn!(instance = %instance.name(), "server ignored SIGHUP, killing");
                let _ = child.kill().await;
            }
        }

        instance.running = false;
        self.mux.deregister(instance.name()).await;
        info!(instance = %instance.name(), "server stopped");
        Ok(())
    }

    /// Number of instances currently being watched by the multiplexer.
    pub async fn watched(&self) -> usize {
        self.mux.watched().await
    }

    fn sample_port(&self) -> u16 {
        rand::rng().random_range(self.port_min..=self.port_max)
    }

    fn build_args(&self, port: u16, udp_port: Option<u16>, extra: &[String]) -> Vec<String> {
        let mut args = vec!["-p".to_string(), port.to_string()];
        if let Some(udp) = udp_port {
            args.push("-U".to_string());
            args.push(udp.to_string());
        }
        if self.verbose {
            args.push("-vv".to_string());
        }
        args.extend(extra.iter().cloned());
        args
    }
}

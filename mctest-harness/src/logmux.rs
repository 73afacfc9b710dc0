//! Shared fan-in of diagnostic output from all supervised instances.
//!
//! Exactly one background task drains the stderr streams of every
//! currently watched server. The task exclusively owns the watch list;
//! the supervisor talks to it over a channel, so no shared mutable
//! iteration ever happens across tasks. The task is spawned lazily on
//! the first registration and joined once the last instance has been
//! deregistered; a later registration respawns it.

use std::collections::HashSet;
use std::pin::Pin;
use std::task::Poll;

use tokio::io::{BufReader, Lines};
use tokio::process::ChildStderr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Destination for forwarded diagnostic lines.
#[derive(Clone)]
pub enum Sink {
    /// Forward to the harness's own stderr, mirroring the server output.
    Stderr,
    /// Forward into a channel; used by tests to observe the fan-in.
    Channel(mpsc::UnboundedSender<String>),
}

impl Sink {
    fn forward(&self, name: &str, line: &str) {
        match self {
            Sink::Stderr => eprintln!("{}: {}", name, line),
            Sink::Channel(tx) => {
                if tx.send(format!("{}: {}", name, line)).is_err() {
                    debug!(instance = name, "diagnostic sink closed, line dropped");
                }
            }
        }
    }
}

/// One watched instance: its name and the buffered stderr line stream
/// handed over by the supervisor after the launch probe.
pub struct Watch {
    pub name: String,
    pub lines: Lines<BufReader<ChildStderr>>,
}

enum MuxMsg {
    Watch(Watch),
    Unwatch(String),
}

struct Inner {
    tx: Option<mpsc::UnboundedSender<MuxMsg>>,
    task: Option<JoinHandle<()>>,
    names: HashSet<String>,
    sink: Sink,
}

/// Handle to the multiplexer task. Cloneable access is not needed; the
/// supervisor owns it and serializes registration through a mutex.
pub struct LogMux {
    inner: tokio::sync::Mutex<Inner>,
}

impl Default for LogMux {
    fn default() -> Self {
        Self::new()
    }
}

impl LogMux {
    pub fn new() -> Self {
        Self::with_sink(Sink::Stderr)
    }

    pub fn with_sink(sink: Sink) -> Self {
        Self {
            inner: tokio::sync::Mutex::new(Inner {
                tx: None,
                task: None,
                names: HashSet::new(),
                sink,
            }),
        }
    }

    /// Start watching an instance's stderr. Spawns the fan-in task if it
    /// is not currently running.
    pub async fn register(&self, watch: Watch) {
        let mut inner = self.inner.lock().await;

        let task_alive = inner
            .task
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false);
        if !task_alive {
            let (tx, rx) = mpsc::unbounded_channel();
            let sink = inner.sink.clone();
            inner.tx = Some(tx);
            inner.task = Some(tokio::spawn(mux_loop(rx, sink)));
        }

        debug!(instance = %watch.name, "watching stderr");
        inner.names.insert(watch.name.clone());
        if let Some(tx) = &inner.tx {
            // Cannot fail: the task only exits after this handle drops the
            // sender, which happens under the same lock in deregister().
            let _ = tx.send(MuxMsg::Watch(watch));
        }
    }

    /// Stop watching an instance. When the watch set drains, the fan-in
    /// task is joined; it is respawned by the next registration.
    pub async fn deregister(&self, name: &str) {
        let mut inner = self.inner.lock().await;
        if !inner.names.remove(name) {
            return;
        }

        if let Some(tx) = &inner.tx {
            let _ = tx.send(MuxMsg::Unwatch(name.to_string()));
        }

        if inner.names.is_empty() {
            inner.tx = None;
            if let Some(task) = inner.task.take() {
                debug!("watch set drained, joining log multiplexer");
                if let Err(e) = task.await {
                    warn!("log multiplexer task failed: {}", e);
                }
            }
        }
    }

    /// Number of currently registered instances.
    pub async fn watched(&self) -> usize {
        self.inner.lock().await.names.len()
    }
}

async fn mux_loop(mut rx: mpsc::UnboundedReceiver<MuxMsg>, sink: Sink) {
    let mut watches: Vec<Watch> = Vec::new();
    let mut cursor = 0usize;

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(MuxMsg::Watch(watch)) => watches.push(watch),
                Some(MuxMsg::Unwatch(name)) => {
                    // The instance may already be gone if its process
                    // exited and EOF removed it first.
                    watches.retain(|w| w.name != name);
                }
                None => break,
            },
            (idx, result) = next_line(&mut watches, cursor), if !watches.is_empty() => {
                cursor = idx + 1;
                match result {
                    Ok(Some(line)) => sink.forward(&watches[idx].name, &line),
                    Ok(None) => {
                        // EOF: the process exited or closed its stderr.
                        let watch = watches.swap_remove(idx);
                        debug!(instance = %watch.name, "stderr closed, dropping watch");
                    }
                    Err(e) => {
                        let watch = watches.swap_remove(idx);
                        warn!(instance = %watch.name, "stderr read failed: {}", e);
                    }
                }
            }
        }
    }
}

/// Single cooperative wait across all watched streams. Polls each watch
/// starting from a rotating cursor so one chatty instance cannot starve
/// the others.
fn next_line(
    watches: &mut [Watch],
    start: usize,
) -> impl Future<Output = (usize, std::io::Result<Option<String>>)> + '_ {
    std::future::poll_fn(move |cx| {
        let n = watches.len();
        for step in 0..n {
            let idx = (start + step) % n;
            if let Poll::Ready(result) = Pin::new(&mut watches[idx].lines).poll_next_line(cx) {
                return Poll::Ready((idx, result));
            }
        }
        Poll::Pending
    })
}

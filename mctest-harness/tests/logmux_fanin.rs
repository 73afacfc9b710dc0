//! Integration tests for the shared log fan-in task.
//!
//! Three concurrent child processes write to stderr; the multiplexer
//! must forward every line with the right instance-name prefix, with no
//! interleaving corruption, from a single background task.

use std::collections::HashSet;
use std::process::Stdio;
use std::time::Duration;

use mctest_harness::{LogMux, Sink, Watch};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

fn spawn_chatter(name: &str, lines: &[&str], linger_secs: u32) -> (Watch, Child) {
    let mut script = String::new();
    for line in lines {
        script.push_str(&format!("echo '{}' >&2\n", line));
    }
    script.push_str(&format!("sleep {}\n", linger_secs));

    let mut child = Command::new("sh")
        .args(["-c", &script])
        .stdin(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    let stderr = child.stderr.take().unwrap();
    let watch = Watch {
        name: name.to_string(),
        lines: BufReader::new(stderr).lines(),
    };
    (watch, child)
}

async fn collect(rx: &mut mpsc::UnboundedReceiver<String>, n: usize) -> Vec<String> {
    let mut out = Vec::new();
    for _ in 0..n {
        let line = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for forwarded line")
            .expect("sink closed early");
        out.push(line);
    }
    out
}

#[tokio::test]
async fn fans_in_three_instances_with_name_prefixes() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mux = LogMux::with_sink(Sink::Channel(tx));

    let mut children = Vec::new();
    let mut expected = HashSet::new();
    for name in ["mcd0", "mcd1", "mcd2"] {
        let lines = [format!("{}-alpha", name), format!("{}-beta", name)];
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let (watch, child) = spawn_chatter(name, &refs, 10);
        mux.register(watch).await;
        children.push(child);
        for line in &lines {
            expected.insert(format!("{}: {}", name, line));
        }
    }
    assert_eq!(mux.watched().await, 3);

    let forwarded: HashSet<String> = collect(&mut rx, 6).await.into_iter().collect();
    assert_eq!(forwarded, expected);

    for name in ["mcd0", "mcd1", "mcd2"] {
        mux.deregister(name).await;
    }
    assert_eq!(mux.watched().await, 0);

    for mut child in children {
        let _ = child.kill().await;
    }
}

#[tokio::test]
async fn respawns_after_the_watch_set_drains() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mux = LogMux::with_sink(Sink::Channel(tx));

    let (watch, mut child) = spawn_chatter("first", &["first-line"], 10);
    mux.register(watch).await;
    assert_eq!(collect(&mut rx, 1).await, vec!["first: first-line"]);
    mux.deregister("first").await;
    let _ = child.kill().await;

    // The fan-in task was joined above; a new registration must bring
    // it back.
    let (watch, mut child) = spawn_chatter("second", &["second-line"], 10);
    mux.register(watch).await;
    assert_eq!(collect(&mut rx, 1).await, vec!["second: second-line"]);
    mux.deregister("second").await;
    let _ = child.kill().await;
}

#[tokio::test]
async fn exited_process_is_dropped_from_the_watch_set() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mux = LogMux::with_sink(Sink::Channel(tx));

    // No linger: the process exits right after writing, closing stderr.
    let (watch, mut child) = spawn_chatter("brief", &["only-line"], 0);
    mux.register(watch).await;

    assert_eq!(collect(&mut rx, 1).await, vec!["brief: only-line"]);
    let _ = child.wait().await;

    // Deregistering an entry the multiplexer already removed on EOF is a
    // routine no-op.
    mux.deregister("brief").await;
    assert_eq!(mux.watched().await, 0);
}

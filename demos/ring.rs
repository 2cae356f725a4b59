//! Three-node ring demo.
//!
//! Simulates a closed loop of three nodes in one process, with
//! `tokio::io::duplex` pipes standing in for the serial links: A → B → C
//! back to A. Node A bootstraps the token; every node tries to chat each
//! turn and logs what it observes.
//!
//! Run with:
//!
//! ```sh
//! RUST_LOG=info cargo run --example ring
//! ```

use std::time::Duration;

use tokio::io::duplex;
use tokio::sync::mpsc;
use tokio::time::sleep;

use ringlink::config::LinkConfig;
use ringlink::node::{RingNode, RingNodeHandle};
use ringlink::station::LinkEvent;
use ringlink::LinkError;

const LINK_CAPACITY: usize = 4096;

fn node_config(regeneration_timeout_ms: u64, bootstrap: bool) -> LinkConfig {
    LinkConfig {
        regeneration_timeout_ms,
        turn_hold_ms: 20,
        tick_interval_ms: 5,
        bootstrap_holder: bootstrap,
        ..LinkConfig::default()
    }
}

/// Log everything a node observes on its link.
fn watch(name: &'static str, mut events: mpsc::Receiver<LinkEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                LinkEvent::DataReceived(payload) => {
                    tracing::info!(node = name, payload = %String::from_utf8_lossy(&payload), "data received");
                }
                other => {
                    tracing::debug!(node = name, event = ?other, "link event");
                }
            }
        }
    });
}

/// Keep trying to send a greeting; sends outside this node's turn fail
/// fast and are simply retried later.
fn chatter(name: &'static str, handle: RingNodeHandle) {
    tokio::spawn(async move {
        let mut sent = 0u32;
        loop {
            let greeting = format!("hello #{sent} from {name}");
            match handle.send(greeting.into_bytes()).await {
                Ok(()) => {
                    tracing::info!(node = name, sent, "greeting sent");
                    sent += 1;
                }
                Err(LinkError::NotHolder) => {} // not our turn yet
                Err(e) => {
                    tracing::warn!(node = name, error = %e, "send failed");
                    return;
                }
            }
            sleep(Duration::from_millis(50)).await;
        }
    });
}

#[tokio::main]
async fn main() -> ringlink::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Wire three unidirectional links into a loop: A → B → C → A.
    let (a_to_b_w, a_to_b_r) = duplex(LINK_CAPACITY);
    let (b_to_c_w, b_to_c_r) = duplex(LINK_CAPACITY);
    let (c_to_a_w, c_to_a_r) = duplex(LINK_CAPACITY);

    // Distinct regeneration timeouts: if the token is ever lost, exactly
    // one node times out first and heals the ring.
    let mut a = RingNode::builder()
        .config(node_config(600, true))
        .spawn(c_to_a_r, a_to_b_w)?;
    let mut b = RingNode::builder()
        .config(node_config(800, false))
        .spawn(a_to_b_r, b_to_c_w)?;
    let mut c = RingNode::builder()
        .config(node_config(1_000, false))
        .spawn(b_to_c_r, c_to_a_w)?;

    for (name, node) in [("A", &mut a), ("B", &mut b), ("C", &mut c)] {
        if let Some(events) = node.take_events() {
            watch(name, events);
        }
    }
    chatter("A", a.handle());
    chatter("B", b.handle());
    chatter("C", c.handle());

    sleep(Duration::from_secs(3)).await;

    for (name, node) in [("A", &a), ("B", &b), ("C", &c)] {
        let stats = node.handle().stats().await?;
        tracing::info!(node = name, ?stats, "final stats");
    }

    Ok(())
}

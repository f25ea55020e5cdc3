//! Turn-complete signals.
//!
//! The capture session waits on a [`TurnGate`] between `start` and `stop`.
//! The gate is independent of the recognition event stream, so the trigger
//! (Enter key, UI button, timeout, voice activity) can change without touching
//! the dialogue loop.

use async_trait::async_trait;
use quill_core::{QuillError, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

/// Blocks until the user has finished speaking for the current turn.
#[async_trait]
pub trait TurnGate: Send + Sync {
    async fn wait(&self) -> Result<()>;
}

/// Gate that opens immediately. Used with recognizers that deliver a whole
/// turn up front.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateGate;

#[async_trait]
impl TurnGate for ImmediateGate {
    async fn wait(&self) -> Result<()> {
        Ok(())
    }
}

/// Gate opened through a [`GateTrigger`] held elsewhere.
#[derive(Debug)]
pub struct ChannelGate {
    rx: Mutex<UnboundedReceiver<()>>,
}

/// Opens the paired [`ChannelGate`] once per call.
#[derive(Debug, Clone)]
pub struct GateTrigger {
    tx: UnboundedSender<()>,
}

impl ChannelGate {
    pub fn new() -> (Self, GateTrigger) {
        let (tx, rx) = unbounded_channel();
        (Self { rx: Mutex::new(rx) }, GateTrigger { tx })
    }
}

impl GateTrigger {
    /// Signal that the current turn is complete.
    ///
    /// Signals sent while nobody is waiting are queued for the next wait.
    pub fn complete_turn(&self) -> Result<()> {
        self.tx
            .send(())
            .map_err(|_| QuillError::Speech("turn gate has been dropped".to_string()))
    }
}

#[async_trait]
impl TurnGate for ChannelGate {
    async fn wait(&self) -> Result<()> {
        let mut rx = self.rx.lock().await;
        rx.recv()
            .await
            .ok_or_else(|| QuillError::Speech("turn-complete trigger closed".to_string()))
    }
}

/// Gate opened by pressing Enter on the terminal.
pub struct EnterGate {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl Default for EnterGate {
    fn default() -> Self {
        Self::new()
    }
}

impl EnterGate {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

#[async_trait]
impl TurnGate for EnterGate {
    async fn wait(&self) -> Result<()> {
        let mut lines = self.lines.lock().await;
        match lines.next_line().await? {
            Some(_) => Ok(()),
            None => Err(QuillError::Speech("standard input closed".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_immediate_gate_opens() {
        assert!(ImmediateGate.wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_channel_gate_waits_for_trigger() {
        let (gate, trigger) = ChannelGate::new();
        let pending = tokio::time::timeout(Duration::from_millis(20), gate.wait()).await;
        assert!(pending.is_err(), "gate must block until triggered");

        trigger.complete_turn().unwrap();
        gate.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_channel_gate_queues_early_signal() {
        let (gate, trigger) = ChannelGate::new();
        trigger.complete_turn().unwrap();
        trigger.complete_turn().unwrap();
        gate.wait().await.unwrap();
        gate.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_channel_gate_errors_when_trigger_dropped() {
        let (gate, trigger) = ChannelGate::new();
        drop(trigger);
        let err = gate.wait().await.unwrap_err();
        assert!(err.to_string().contains("trigger closed"));
    }

    #[test]
    fn test_trigger_errors_when_gate_dropped() {
        let (gate, trigger) = ChannelGate::new();
        drop(gate);
        assert!(trigger.complete_turn().is_err());
    }
}

//! `dojo connect` - Connect a toolkit for a user through OAuth.
//!
//! The "window" in a terminal is the printed authorization link. Pressing
//! Ctrl+C dismisses it, which cancels the flow the same way closing a
//! browser popup does.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use console::style;
use dojo_core::oauth::{
    AuthWindow, ConnectionApi, ConnectionModal, FlowConfig, FlowError, FlowListener, FlowOutcome,
};
use tokio::task::JoinHandle;

/// Auth "window" backed by the terminal.
#[derive(Default)]
pub struct TerminalWindow {
    dismissed: Arc<AtomicBool>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl TerminalWindow {
    /// Mark the window as dismissed by the user.
    pub fn dismiss(&self) {
        self.dismissed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuthWindow for TerminalWindow {
    async fn open(&self, url: &str) -> Result<(), FlowError> {
        println!("Open this link in your browser to authorize:\n");
        println!("  {}\n", style(url).underlined());
        println!("{}", style("Waiting for authorization (Ctrl+C to cancel)...").dim());

        let dismissed = self.dismissed.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                dismissed.store(true, Ordering::SeqCst);
            }
        });
        if let Ok(mut slot) = self.watcher.lock() {
            if let Some(previous) = slot.replace(watcher) {
                previous.abort();
            }
        }
        Ok(())
    }

    async fn is_closed(&self) -> bool {
        self.dismissed.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        if let Ok(mut slot) = self.watcher.lock() {
            if let Some(watcher) = slot.take() {
                watcher.abort();
            }
        }
    }
}

struct ConsoleListener;

impl FlowListener for ConsoleListener {
    fn on_connected(&self, connection_id: &str) {
        println!("{} Connected ({})", style("✓").green(), connection_id);
    }

    // Failures are reported once, by `main`, from the returned error.
    fn on_error(&self, _message: &str) {}

    fn on_warning(&self, message: &str) {
        eprintln!("{} {}", style("!").yellow(), message);
    }
}

/// `--timeout-secs 0` waits without a deadline.
pub fn flow_config(timeout_secs: u64) -> FlowConfig {
    FlowConfig {
        timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        ..FlowConfig::default()
    }
}

pub async fn run(
    api: Arc<dyn ConnectionApi>,
    toolkit: &str,
    user_id: &str,
    timeout_secs: u64,
) -> Result<(), String> {
    let window = Arc::new(TerminalWindow::default());
    let modal = ConnectionModal::new(api, window.clone(), flow_config(timeout_secs))
        .with_listener(Arc::new(ConsoleListener));

    let outcome = modal.connect(toolkit, user_id).await;
    window.close().await;

    match outcome {
        Ok(FlowOutcome::Connected { .. }) => Ok(()),
        Ok(FlowOutcome::Cancelled { connection_id }) => {
            println!("Authorization cancelled ({})", connection_id);
            Ok(())
        }
        Err(e) => Err(e.to_string()),
    }
}

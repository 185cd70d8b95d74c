//! Headless follow mode: output lines to stdout, status and diagnostics to
//! stderr. Suitable for piping or for terminals without the TUI feature.

use crate::api::DeployApi;
use crate::console::sanitize_line;
use crate::controller::{run_controller, UiCommand};
use crate::controls::Indicator;
use crate::model::{ConsoleConfig, UiEvent};
use crate::stream::transport::HttpStreamTransport;
use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Output line routing for the stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to keep file I/O off the
/// async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

fn timestamp() -> String {
    let fmt = time::macros::format_description!("[hour]:[minute]:[second]");
    time::OffsetDateTime::now_utc()
        .format(&fmt)
        .unwrap_or_else(|_| "--:--:--".into())
}

pub async fn run(cfg: ConsoleConfig) -> Result<()> {
    let backend = Arc::new(DeployApi::new(&cfg)?);
    let transport = Arc::new(HttpStreamTransport::new(&cfg)?);

    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (out_tx, out_handle) = spawn_output_writer();

    let controller = tokio::spawn(run_controller(cfg, backend, transport, ui_tx, cmd_rx));

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("listen for ctrl-c")?;
                let _ = cmd_tx.send(UiCommand::Quit);
                break;
            }
            ev = ui_rx.recv() => {
                let Some(ev) = ev else { break };
                match ev {
                    UiEvent::OutputLine(line) => {
                        let _ = out_tx.send(OutputLine::Stdout(sanitize_line(&line)));
                    }
                    UiEvent::StatusChanged(running) => {
                        let label = Indicator::from_state(Some(running)).label();
                        let _ = out_tx.send(OutputLine::Stderr(format!("[{}] {}", timestamp(), label)));
                    }
                    UiEvent::Info(msg) => {
                        let _ = out_tx.send(OutputLine::Stderr(format!("[{}] {}", timestamp(), msg)));
                    }
                    UiEvent::Resync => {
                        let _ = out_tx.send(OutputLine::Stderr(format!(
                            "[{}] stream lost; resynchronizing",
                            timestamp()
                        )));
                    }
                    UiEvent::ObservationArrived => {}
                }
            }
        }
    }

    drop(out_tx);
    let _ = out_handle.await;
    controller.await.context("controller task failed")?
}

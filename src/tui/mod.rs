mod state;

use crate::api::DeployApi;
use crate::controller::{self, UiCommand};
use crate::controls::Indicator;
use crate::model::{ActionKind, ConsoleConfig, UiEvent};
use crate::stream::transport::HttpStreamTransport;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use state::UiState;
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{error::TryRecvError, UnboundedReceiver, UnboundedSender};

pub async fn run(cfg: ConsoleConfig) -> Result<()> {
    let backend = Arc::new(DeployApi::new(&cfg)?);
    let transport = Arc::new(HttpStreamTransport::new(&cfg)?);

    // Unbounded channels avoid backpressure between the controller and the
    // render loop.
    let (ui_tx, ui_rx) = mpsc::unbounded_channel::<UiEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // The TUI runs in a dedicated thread to keep all blocking terminal I/O
    // out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(ui_rx, cmd_tx));

    let res = controller::run_controller(cfg, backend, transport, ui_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    mut ui_rx: UnboundedReceiver<UiEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState::default();
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep the render loop responsive.
        let mut disconnected = false;
        loop {
            match ui_rx.try_recv() {
                Ok(ev) => state.apply(ev),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }
        if disconnected {
            break Ok(());
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f, &mut state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                let page = state.console.viewport().max(1);
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char('s')) => request(&mut state, &cmd_tx, ActionKind::Start),
                    (_, KeyCode::Char('x')) => request(&mut state, &cmd_tx, ActionKind::Stop),
                    (_, KeyCode::Char('r')) => request(&mut state, &cmd_tx, ActionKind::Restart),
                    (_, KeyCode::Up) => state.console.scroll_up(1),
                    (_, KeyCode::Down) => state.console.scroll_down(1),
                    (_, KeyCode::PageUp) => state.console.scroll_up(page),
                    (_, KeyCode::PageDown) => state.console.scroll_down(page),
                    (_, KeyCode::Home) => state.console.scroll_to_top(),
                    (_, KeyCode::End) => state.console.scroll_to_bottom(),
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    res
}

/// Lock the controls and forward the command, but only when the control is
/// currently enabled.
fn request(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>, action: ActionKind) {
    if state.request(action) {
        let _ = cmd_tx.send(UiCommand::Dispatch(action));
    }
}

fn draw(f: &mut Frame, state: &mut UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(5),
            Constraint::Length(2),
        ])
        .split(f.area());

    draw_status(f, chunks[0], state);
    draw_console(f, chunks[1], state);
    draw_footer(f, chunks[2], state);
}

fn draw_status(f: &mut Frame, area: Rect, state: &UiState) {
    let panel = state.panel();
    let (color, symbol) = match panel.indicator {
        Indicator::Unknown => (Color::DarkGray, "?"),
        Indicator::Working => (Color::Green, "●"),
        Indicator::Napping => (Color::Red, "○"),
    };

    let mut lines = vec![Line::from(vec![
        Span::styled(symbol, Style::default().fg(color)),
        Span::raw(" "),
        Span::styled(
            panel.indicator.label(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
    ])];

    let mut controls: Vec<Span> = Vec::new();
    for (key, label, enabled) in [
        ("s", "start", panel.start),
        ("x", "stop", panel.stop),
        ("r", "restart", panel.restart),
    ] {
        let style = if enabled {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        controls.push(Span::styled(format!("[{key}] {label}"), style));
        controls.push(Span::raw("  "));
    }
    if state.action_in_flight {
        controls.push(Span::styled(
            "command in flight…",
            Style::default().fg(Color::Yellow),
        ));
    }
    lines.push(Line::from(controls));

    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Mr Deploy "),
    );
    f.render_widget(widget, area);
}

fn draw_console(f: &mut Frame, area: Rect, state: &mut UiState) {
    let inner_height = area.height.saturating_sub(2) as usize;
    state.console.set_viewport(inner_height);

    let title = if state.console.at_bottom() {
        format!(" Console ({} lines) ", state.console.len())
    } else {
        format!(
            " Console ({} lines, scrolled — End to follow) ",
            state.console.len()
        )
    };

    let lines: Vec<Line> = state
        .console
        .lines()
        .iter()
        .map(|l| Line::from(l.as_str()))
        .collect();
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .scroll((state.console.scroll() as u16, 0));
    f.render_widget(widget, area);
}

fn draw_footer(f: &mut Frame, area: Rect, state: &UiState) {
    let mut help = String::from("q quit  ↑/↓ scroll  PgUp/PgDn page  Home/End jump");
    if state.resyncs > 0 {
        help.push_str(&format!("  (resyncs: {})", state.resyncs));
    }
    let mut lines = vec![Line::from(Span::styled(
        help,
        Style::default().fg(Color::DarkGray),
    ))];
    if !state.info.is_empty() {
        lines.push(Line::from(Span::styled(
            state.info.clone(),
            Style::default().fg(Color::Yellow),
        )));
    }
    f.render_widget(Paragraph::new(lines), area);
}

//! Terminal UI: live caption panes over the shared pipeline state.
//!
//! Rendering only ever reads snapshots; the recognition loop never waits
//! on the UI. Logs go to the rotating file in this mode so stdout stays
//! clean for the terminal.

use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Frame, Terminal,
};

use salin_foundation::ShutdownToken;
use salin_telemetry::PipelineMetrics;

use crate::display::{CaptionSnapshot, DisplayState};

/// Everything the renderer needs, bundled once at startup.
pub struct TuiContext {
    pub display: Arc<DisplayState>,
    pub metrics: Arc<PipelineMetrics>,
    pub token: ShutdownToken,
    pub device_label: String,
    pub source_language: String,
    pub target_language: String,
    pub voice: String,
    pub started: Instant,
}

/// Runs the terminal UI until quit or shutdown. Raw mode is always
/// restored, also when the draw loop returns an error.
pub async fn run_tui(ctx: TuiContext) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_loop(&mut terminal, &ctx).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ctx: &TuiContext,
) -> io::Result<()> {
    let mut ui_tick = tokio::time::interval(Duration::from_millis(50));

    loop {
        terminal.draw(|f| draw_ui(f, ctx))?;

        tokio::select! {
            _ = ctx.token.wait() => return Ok(()),
            Some(event) = async {
                if event::poll(Duration::from_millis(10)).unwrap_or(false) {
                    event::read().ok()
                } else {
                    None
                }
            } => {
                if let Event::Key(key) = event {
                    let ctrl_c = key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL);
                    let quit =
                        matches!(key.code, KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc);
                    if quit || ctrl_c {
                        ctx.token.cancel();
                        return Ok(());
                    }
                }
            }
            _ = ui_tick.tick() => {}
        }
    }
}

fn draw_ui(f: &mut Frame, ctx: &TuiContext) {
    let snap = ctx.display.snapshot();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),
            Constraint::Length(8),
            Constraint::Length(1),
        ])
        .split(f.area());

    let caption_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[0]);

    draw_source(f, caption_chunks[0], ctx, &snap);
    draw_translation(f, caption_chunks[1], ctx, &snap);
    draw_status(f, chunks[1], ctx);
    draw_footer(f, chunks[2]);
}

fn draw_source(f: &mut Frame, area: Rect, ctx: &TuiContext, snap: &CaptionSnapshot) {
    let block = Block::default()
        .title(format!("Heard ({})", ctx.source_language))
        .borders(Borders::ALL);
    let paragraph = Paragraph::new(snap.source.clone())
        .block(block)
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn draw_translation(f: &mut Frame, area: Rect, ctx: &TuiContext, snap: &CaptionSnapshot) {
    let visible = snap.visible_translation(Instant::now()).to_string();
    let block = Block::default()
        .title(format!("Translated ({})", ctx.target_language))
        .borders(Borders::ALL);
    let paragraph = Paragraph::new(visible)
        .block(block)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn draw_status(f: &mut Frame, area: Rect, ctx: &TuiContext) {
    let block = Block::default().title("Status").borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(4)])
        .split(inner);

    let db = ctx.metrics.audio_level_db.load(Ordering::Relaxed) as f64 / 10.0;
    let level_percent = ((db + 90.0) / 90.0 * 100.0).clamp(0.0, 100.0) as u16;
    let gauge = Gauge::default()
        .gauge_style(if level_percent > 80 {
            Style::default().fg(Color::Red)
        } else if level_percent > 60 {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Green)
        })
        .percent(level_percent)
        .label(format!("mic {:.1} dB", db));
    f.render_widget(gauge, chunks[0]);

    let uptime = ctx.started.elapsed().as_secs();
    let fps = ctx.metrics.capture_fps.load(Ordering::Relaxed) as f64 / 10.0;
    let callbacks = ctx.metrics.capture_frames.load(Ordering::Relaxed);
    let dropped = ctx.metrics.capture_dropped_samples.load(Ordering::Relaxed);
    let partials = ctx.metrics.partial_events.load(Ordering::Relaxed);
    let finals = ctx.metrics.final_events.load(Ordering::Relaxed);
    let ok = ctx.metrics.translations_ok.load(Ordering::Relaxed);
    let failed = ctx.metrics.translations_failed.load(Ordering::Relaxed);
    let last_ms = ctx.metrics.translation_last_ms.load(Ordering::Relaxed);
    let played = ctx.metrics.synth_played.load(Ordering::Relaxed);
    let retries = ctx.metrics.synth_retries.load(Ordering::Relaxed);
    let failures = ctx.metrics.synth_failures.load(Ordering::Relaxed);

    let lines = vec![
        Line::from(format!(
            "Device: {} | {} -> {} | voice {}",
            ctx.device_label, ctx.source_language, ctx.target_language, ctx.voice
        )),
        Line::from(format!(
            "Uptime: {}s | capture {:.1} fps | {} callbacks, {} dropped samples",
            uptime, fps, callbacks, dropped
        )),
        Line::from(format!(
            "Recognition: {} partial / {} final",
            partials, finals
        )),
        Line::from(format!(
            "Translation: {} ok / {} failed (last {} ms)",
            ok, failed, last_ms
        )),
        Line::from(format!(
            "Speech: {} played / {} retried / {} failed",
            played, retries, failures
        )),
    ];
    f.render_widget(Paragraph::new(lines), chunks[1]);
}

fn draw_footer(f: &mut Frame, area: Rect) {
    let footer = Paragraph::new("q / Esc / Ctrl-C to quit")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(footer, area);
}

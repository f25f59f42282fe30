//! Read-only terminal viewer for a document

use std::io::stdout;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use richnote_core::render::styled_lines;
use richnote_core::{Color as NoteColor, Document, RunStyle, StyledRun};

// Catppuccin Mocha colors
const SURFACE0: Color = Color::Rgb(49, 50, 68);
const TEXT: Color = Color::Rgb(205, 214, 244);
const SUBTEXT0: Color = Color::Rgb(166, 173, 200);
const BLUE: Color = Color::Rgb(137, 180, 250);

/// Viewer state
pub struct Viewer {
    title: String,
    lines: Vec<Vec<StyledRun>>,
    span_count: usize,
    scroll: u16,
    running: bool,
}

impl Viewer {
    pub fn new(title: &str, doc: &Document) -> Self {
        Self {
            title: title.to_string(),
            lines: styled_lines(doc),
            span_count: doc.spans().iter().filter(|s| !s.is_computed()).count(),
            scroll: 0,
            running: true,
        }
    }

    fn max_scroll(&self) -> u16 {
        u16::try_from(self.lines.len().saturating_sub(1)).unwrap_or(u16::MAX)
    }

    pub fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Char('j') | KeyCode::Down => {
                self.scroll = (self.scroll + 1).min(self.max_scroll());
            }
            KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::Char('g') | KeyCode::Home => self.scroll = 0,
            KeyCode::Char('G') | KeyCode::End => self.scroll = self.max_scroll(),
            _ => {}
        }
    }
}

pub fn run(viewer: &mut Viewer) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_viewer(&mut terminal, viewer);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_viewer<B: Backend>(terminal: &mut Terminal<B>, viewer: &mut Viewer) -> Result<()> {
    while viewer.running {
        terminal.draw(|f| draw(f, viewer))?;

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                viewer.handle_key(key.code);
            }
        }
    }
    Ok(())
}

pub fn draw(frame: &mut Frame, viewer: &Viewer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title bar
            Constraint::Min(0),    // Document
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    let title_bar = Paragraph::new(format!(" richnote - {}", viewer.title))
        .style(Style::default().fg(TEXT).bg(SURFACE0));
    frame.render_widget(title_bar, chunks[0]);

    let lines: Vec<Line> = viewer.lines.iter().map(|runs| line_for(runs)).collect();
    let document = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(BLUE)),
        )
        .wrap(Wrap { trim: false })
        .scroll((viewer.scroll, 0));
    frame.render_widget(document, chunks[1]);

    let status = format!(
        " line {}/{}  {} spans  j/k scroll  q quit",
        usize::from(viewer.scroll) + 1,
        viewer.lines.len(),
        viewer.span_count
    );
    let status_bar = Paragraph::new(status).style(Style::default().fg(SUBTEXT0).bg(SURFACE0));
    frame.render_widget(status_bar, chunks[2]);
}

fn line_for(runs: &[StyledRun]) -> Line<'static> {
    Line::from(
        runs.iter()
            .map(|run| Span::styled(run.text.clone(), run_style(&run.style)))
            .collect::<Vec<_>>(),
    )
}

pub fn run_style(style: &RunStyle) -> Style {
    let mut out = Style::default().fg(style.foreground.map(to_color).unwrap_or(TEXT));
    if let Some(background) = style.background {
        out = out.bg(to_color(background));
    }
    if style.bold {
        out = out.add_modifier(Modifier::BOLD);
    }
    if style.italic {
        out = out.add_modifier(Modifier::ITALIC);
    }
    if style.underline {
        out = out.add_modifier(Modifier::UNDERLINED);
    }
    out
}

fn to_color(color: NoteColor) -> Color {
    Color::Rgb(color.red(), color.green(), color.blue())
}

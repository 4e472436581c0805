//! UI rendering for the TUI.

use booktalk_core::{FunctionResult, Message, ProgressStep, Sender};
use chrono::Local;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};

use crate::app::App;

// ========== Colors ==========

/// User message prefix
const USER_COLOR: Color = Color::Rgb(0, 180, 180);
/// Assistant message prefix
const ASSISTANT_COLOR: Color = Color::Rgb(80, 160, 80);
/// System / error messages
const ERROR_COLOR: Color = Color::Rgb(220, 80, 80);
/// Content-safety warnings
const WARNING_COLOR: Color = Color::Rgb(220, 180, 0);
/// Secondary text: timestamps, placeholders, progress
const DIM_COLOR: Color = Color::Rgb(128, 128, 128);
/// Active-book banner
const BANNER_COLOR: Color = Color::Rgb(180, 100, 180);
/// Book list entries under a reply
const BOOK_COLOR: Color = Color::Rgb(100, 180, 180);

/// Render the application UI.
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Status region grows with the progress list
    let status_lines = status_height(app);
    let chunks = Layout::vertical([
        Constraint::Length(1),            // Active-book banner / title
        Constraint::Min(5),               // Timeline
        Constraint::Length(status_lines), // Status + progress
        Constraint::Length(3),            // Input
        Constraint::Length(1),            // Footer
    ])
    .split(area);

    render_banner(frame, app, chunks[0]);
    render_timeline(frame, app, chunks[1]);
    render_status(frame, app, chunks[2]);
    render_input(frame, app, chunks[3]);
    render_footer(frame, app, chunks[4]);
}

fn status_height(app: &App) -> u16 {
    let mut lines = app.snapshot.progress.len();
    if !app.snapshot.status.is_empty() {
        lines += 1;
    }
    lines.min(6) as u16
}

/// Top line: active-book banner when a book frames the conversation,
/// otherwise the app title.
fn render_banner(frame: &mut Frame, app: &App, area: Rect) {
    let line = match &app.snapshot.active_book {
        Some(book) => Line::from(vec![
            Span::styled(" talking about: ", Style::default().fg(DIM_COLOR)),
            Span::styled(
                book.book_title.clone(),
                Style::default()
                    .fg(BANNER_COLOR)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("  (Ctrl-B to leave)", Style::default().fg(DIM_COLOR)),
        ]),
        None => Line::from(Span::styled(
            " booktalk",
            Style::default().add_modifier(Modifier::BOLD),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}

/// Render the message timeline, pinned to the bottom unless scrolled.
fn render_timeline(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();
    for message in &app.snapshot.messages {
        lines.extend(message_lines(message));
    }

    let inner_height = area.height.saturating_sub(2) as usize;
    let bottom = lines.len().saturating_sub(inner_height);
    let scroll = bottom.saturating_sub(app.scroll_offset) as u16;

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title(" Conversation "),
        )
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

/// Lines for one message: a prefixed text line, then any book lists from
/// its function results.
fn message_lines(message: &Message) -> Vec<Line<'static>> {
    let (prefix, prefix_style) = match message.sender {
        Sender::User => ("you", Style::default().fg(USER_COLOR)),
        Sender::Assistant => ("assistant", Style::default().fg(ASSISTANT_COLOR)),
        Sender::System => ("system", Style::default().fg(ERROR_COLOR)),
    };

    let text_style = if message.error {
        Style::default().fg(ERROR_COLOR)
    } else if message.warning {
        Style::default().fg(WARNING_COLOR)
    } else if message.temporary {
        Style::default().fg(DIM_COLOR).add_modifier(Modifier::ITALIC)
    } else {
        Style::default()
    };

    let time = message
        .timestamp
        .with_timezone(&Local)
        .format("%H:%M")
        .to_string();

    let mut lines = vec![Line::from(vec![
        Span::styled(format!("{time} "), Style::default().fg(DIM_COLOR)),
        Span::styled(format!("{prefix}: "), prefix_style.add_modifier(Modifier::BOLD)),
        Span::styled(message.text.clone(), text_style),
    ])];

    for result in &message.function_results {
        lines.extend(result_lines(result));
    }

    lines
}

fn result_lines(result: &FunctionResult) -> Vec<Line<'static>> {
    let book_style = Style::default().fg(BOOK_COLOR);
    let dim = Style::default().fg(DIM_COLOR);

    match result {
        FunctionResult::Recommendation { summary, books } => {
            let mut lines = Vec::new();
            if let Some(summary) = summary {
                lines.push(Line::from(Span::styled(
                    format!("        {summary}"),
                    dim,
                )));
            }
            for book in books {
                let mut spans = vec![Span::styled(
                    format!("        • {}", book.book_title),
                    book_style,
                )];
                if let Some(reason) = &book.reason {
                    spans.push(Span::styled(format!(" — {reason}"), dim));
                }
                lines.push(Line::from(spans));
            }
            lines
        }
        FunctionResult::Search { books } => books
            .iter()
            .map(|book| {
                let mut spans = vec![Span::styled(
                    format!("        • {}", book.book_title),
                    book_style,
                )];
                if let Some(description) = &book.description {
                    spans.push(Span::styled(format!(" — {description}"), dim));
                }
                Line::from(spans)
            })
            .collect(),
        FunctionResult::ContentFetch {
            status, book_title, ..
        } if status == "success" => {
            vec![Line::from(Span::styled(
                format!("        opened \"{book_title}\""),
                book_style,
            ))]
        }
        FunctionResult::ContentFetch { .. } | FunctionResult::NoContent { .. } => Vec::new(),
    }
}

/// Status line plus one line per in-flight progress step.
fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();
    if !app.snapshot.status.is_empty() {
        lines.push(Line::from(Span::styled(
            format!(" {}", app.snapshot.status),
            Style::default().fg(DIM_COLOR).add_modifier(Modifier::ITALIC),
        )));
    }
    for step in &app.snapshot.progress {
        lines.push(progress_line(step));
    }
    frame.render_widget(Paragraph::new(lines), area);
}

fn progress_line(step: &ProgressStep) -> Line<'static> {
    let icon = step.icon.clone().unwrap_or_else(|| "…".to_string());
    Line::from(vec![
        Span::raw(format!(" {icon} ")),
        Span::styled(step.status.clone(), Style::default().fg(DIM_COLOR)),
    ])
}

fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let title = if app.snapshot.processing {
        " Message (waiting for reply…) "
    } else {
        " Message "
    };
    let style = if app.snapshot.processing {
        Style::default().fg(DIM_COLOR)
    } else {
        Style::default()
    };
    let paragraph = Paragraph::new(app.input.as_str()).style(style).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title(title),
    );
    frame.render_widget(paragraph, area);

    if !app.snapshot.processing {
        // Place the cursor after the composed text
        let x = area.x + 1 + app.input.chars().count() as u16;
        frame.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::styled(
        " Enter send · Esc stop audio · Ctrl-B leave book · Ctrl-C quit",
        Style::default().fg(DIM_COLOR),
    )];
    if app.snapshot.playing_id.is_some() {
        spans.push(Span::styled(
            "  ▶ playing",
            Style::default().fg(ASSISTANT_COLOR),
        ));
    }
    if !app.snapshot.playback_status.is_empty() {
        spans.push(Span::styled(
            format!("  {}", app.snapshot.playback_status),
            Style::default().fg(WARNING_COLOR),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

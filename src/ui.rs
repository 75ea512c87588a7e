use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Clear, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
};

use crate::app::{App, InputMode};
use crate::state::UiState;

/// Parse a line of model output and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        match rest[start + 2..].find("**") {
            Some(end) => {
                let before = &rest[..start];
                if !before.is_empty() {
                    spans.push(Span::raw(before.to_string()));
                }
                let bold = &rest[start + 2..start + 2 + end];
                if !bold.is_empty() {
                    spans.push(Span::styled(
                        bold.to_string(),
                        Style::default().add_modifier(Modifier::BOLD),
                    ));
                }
                rest = &rest[start + 2 + end + 2..];
            }
            // No closing marker, keep the remainder literal
            None => break,
        }
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Wrapped line estimate for scroll math, using character counts so UTF-8
/// text does not over-count.
fn wrapped_line_count(text: &str, width: u16) -> u16 {
    let width = width.max(1) as usize;
    let mut total: u16 = 0;

    for line in text.lines() {
        let char_count = line.chars().count();
        total += ((char_count / width) + 1) as u16;
    }

    total.max(1)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, response card, input, footer
    let [header_area, body_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_response(app, frame, body_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Gemini Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!("[{}]", app.model()), Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    frame.render_widget(Paragraph::new(title), area);
}

fn render_response(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store dimensions for mouse hit-testing and scroll calculations
    // (inner size minus borders)
    app.response_area = Some(area);
    app.response_height = area.height.saturating_sub(2);
    let inner_width = area.width.saturating_sub(2);

    match app.ui_state() {
        UiState::Initial => {
            let hint = Paragraph::new(Span::styled(
                "Type a prompt below and press Enter.",
                Style::default().fg(Color::DarkGray),
            ))
            .block(response_block(" Response ", Color::DarkGray));
            frame.render_widget(hint, area);
            app.total_response_lines = 0;
        }
        UiState::Loading => {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            let thinking = Paragraph::new(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ))
            .block(response_block(" Response ", Color::DarkGray));
            frame.render_widget(thinking, area);
            app.total_response_lines = 0;
        }
        UiState::Success { text } => {
            let lines: Vec<Line> = text.lines().map(parse_markdown_line).collect();
            let body = if lines.is_empty() {
                Text::from(Span::styled(
                    "(the model returned no text)",
                    Style::default().fg(Color::DarkGray),
                ))
            } else {
                Text::from(lines)
            };

            app.total_response_lines = wrapped_line_count(&text, inner_width);
            if app.follow_stream {
                app.response_scroll = app
                    .total_response_lines
                    .saturating_sub(app.response_height);
            }

            let card = Paragraph::new(body)
                .block(response_block(" Response ", Color::Cyan))
                .wrap(Wrap { trim: true })
                .scroll((app.response_scroll, 0));
            frame.render_widget(card, area);

            if app.total_response_lines > app.response_height {
                let mut scrollbar_state = ScrollbarState::new(app.total_response_lines as usize)
                    .position(app.response_scroll as usize);
                frame.render_stateful_widget(
                    Scrollbar::new(ScrollbarOrientation::VerticalRight),
                    area,
                    &mut scrollbar_state,
                );
            }
        }
        UiState::Error { message } => {
            let card = Paragraph::new(Span::styled(message, Style::default().fg(Color::Red)))
                .block(response_block(" Error ", Color::Red))
                .wrap(Wrap { trim: true });
            frame.render_widget(card, area);
            app.total_response_lines = 0;
        }
    }
}

fn response_block(title: &str, border: Color) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(title.to_string())
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let loading = app.is_loading();

    let border_color = if loading {
        Color::DarkGray
    } else if app.input_mode == InputMode::Editing {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let title = if loading { " Prompt (waiting) " } else { " Prompt " };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor visible in a narrow field.
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let text_style = if loading {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Cyan)
    };

    let input = Paragraph::new(visible_text)
        .style(text_style)
        .block(input_block);

    frame.render_widget(input, area);

    // Show cursor when editing
    if app.input_mode == InputMode::Editing && !app.show_model_picker {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " INSERT ",
    };

    // Dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = if app.show_model_picker {
        vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" nav ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" select ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ]
    } else {
        match app.input_mode {
            InputMode::Editing => vec![
                Span::styled(" Enter ", key_style),
                Span::styled(" send ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" nav ", label_style),
            ],
            InputMode::Normal => vec![
                Span::styled(" i ", key_style),
                Span::styled(" edit ", label_style),
                Span::styled(" j/k ", key_style),
                Span::styled(" scroll ", label_style),
                Span::styled(" y ", key_style),
                Span::styled(" copy ", label_style),
                Span::styled(" M ", key_style),
                Span::styled(" model ", label_style),
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ],
        }
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    spans.extend(hints);

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    // Centered popup
    let popup_width = 44.min(area.width.saturating_sub(4));
    let popup_height = (app.available_models.len() as u16 + 2).min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Model (Enter to select, Esc to cancel) ");

    let current = app.model().to_string();
    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|model| {
            let style = if *model == current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", model)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_bold_becomes_styled_span() {
        let line = parse_markdown_line("light **converts** to energy");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "converts");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn unclosed_bold_marker_stays_literal() {
        let line = parse_markdown_line("a **dangling marker");
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "a **dangling marker");
    }

    #[test]
    fn wrapped_line_count_accounts_for_width() {
        assert_eq!(wrapped_line_count("", 10), 1);
        assert_eq!(wrapped_line_count("short", 10), 1);
        assert_eq!(wrapped_line_count("0123456789x", 10), 2);
        assert_eq!(wrapped_line_count("a\n\nb", 10), 3);
    }
}

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{
        Block, Borders, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
};

use crate::app::{App, FocusPane, InputMode, SUGGESTIONS};
use crate::client::DatasetMetadata;
use crate::conversation::{Message, RequestStatus, Role};
use crate::format::format_amount;
use crate::report::{classify, ReportView};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    // Body: conversation column on the left, sidebar on the right
    let [chat_area, sidebar_area] =
        Layout::horizontal([Constraint::Min(0), Constraint::Length(32)]).areas(body_area);

    let [transcript_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(chat_area);

    render_transcript(app, frame, transcript_area);
    render_input(app, frame, input_area);
    render_sidebar(app, frame, sidebar_area);

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let status = match app.conversation.status() {
        RequestStatus::Idle => Span::raw(""),
        RequestStatus::Pending => {
            Span::styled(" thinking… ", Style::default().fg(Color::Yellow))
        }
        RequestStatus::Failed => {
            Span::styled(" request failed ", Style::default().fg(Color::Red))
        }
    };

    let dataset_summary = match &app.metadata {
        Some(metadata) => format!(
            " [{} zones, {} crops]",
            metadata.zones.len(),
            metadata.crops.len()
        ),
        None => String::new(),
    };

    let title = Line::from(vec![
        Span::styled(
            " Agricultural Data Assistant ",
            Style::default().fg(Color::Cyan).bold(),
        ),
        Span::styled(dataset_summary, Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
        Span::raw(" "),
        status,
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Transcript;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Conversation ");

    let inner = block.inner(area);
    app.transcript_area = Some(area);

    let mut lines: Vec<Line<'static>> = Vec::new();
    for message in app.conversation.transcript() {
        push_message_lines(&mut lines, message);
    }

    if app.conversation.is_pending() {
        lines.push(Line::from(Span::styled(
            "Assistant:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )));
    }

    // Clamp the scroll against the estimated wrapped height so sticking to
    // the bottom keeps the newest message on screen.
    let total_rows = estimated_rows(&lines, inner.width);
    let max_scroll = total_rows.saturating_sub(inner.height);
    if app.stick_to_bottom {
        app.transcript_scroll = max_scroll;
    } else {
        app.transcript_scroll = app.transcript_scroll.min(max_scroll);
    }

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.transcript_scroll, 0));

    frame.render_widget(paragraph, area);

    if total_rows > inner.height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let mut scrollbar_state =
            ScrollbarState::new(total_rows as usize).position(app.transcript_scroll as usize);

        frame.render_stateful_widget(
            scrollbar,
            area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn push_message_lines(lines: &mut Vec<Line<'static>>, message: &Message) {
    match message.role {
        Role::User => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(message.text.clone()));
        }
        Role::Assistant => {
            lines.push(Line::from(Span::styled(
                "Assistant:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            for line in message.text.lines() {
                lines.push(Line::from(line.to_string()));
            }
            if let Some(view) = message.payload.as_ref().and_then(|p| classify(p)) {
                lines.push(Line::default());
                push_report_lines(lines, &view);
            }
        }
    }
    lines.push(Line::default());
}

/// Render a classified report as transcript lines.
fn push_report_lines(lines: &mut Vec<Line<'static>>, view: &ReportView) {
    let header_style = Style::default().fg(Color::Green).add_modifier(Modifier::BOLD);
    let cell_style = Style::default().fg(Color::White);

    match view {
        ReportView::Totals { estimated, value } => {
            lines.push(Line::from(vec![
                Span::styled(format!("{:<24}", "Estimated Sales"), header_style),
                Span::styled(format_amount(*estimated), cell_style),
            ]));
            lines.push(Line::from(vec![
                Span::styled(format!("{:<24}", "Total Value"), header_style),
                Span::styled(format_amount(*value), cell_style),
            ]));
        }
        ReportView::CropSales { rows } => {
            push_sales_table(lines, "Crop", rows, header_style, cell_style);
        }
        ReportView::ZoneSales { rows } => {
            push_sales_table(lines, "Zone", rows, header_style, cell_style);
        }
        ReportView::TopCrops { rows } => {
            lines.push(Line::from(Span::styled(
                "Top Performing Crops",
                header_style,
            )));
            for (i, row) in rows.iter().enumerate() {
                lines.push(Line::from(Span::styled(
                    format!(
                        " {}. {:<16} {:>14}",
                        i + 1,
                        row.label,
                        format_amount(row.value)
                    ),
                    cell_style,
                )));
            }
        }
        ReportView::Distribution { rows } => {
            lines.push(Line::from(Span::styled(
                format!(" {:<14} {:<14} {:>8}", "Zone", "Crop", "Records"),
                header_style,
            )));
            for row in rows {
                // Counts stay bare integers, unlike every other numeric cell
                lines.push(Line::from(Span::styled(
                    format!(" {:<14} {:<14} {:>8}", row.zone, row.crop, row.count),
                    cell_style,
                )));
            }
        }
        ReportView::Raw(value) => {
            let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            for line in text.lines() {
                lines.push(Line::from(Span::styled(
                    line.to_string(),
                    Style::default().fg(Color::DarkGray),
                )));
            }
        }
    }
}

fn push_sales_table(
    lines: &mut Vec<Line<'static>>,
    label_header: &str,
    rows: &[crate::report::SalesRow],
    header_style: Style,
    cell_style: Style,
) {
    lines.push(Line::from(Span::styled(
        format!(" {:<16} {:>14} {:>14}", label_header, "Estimated", "Value"),
        header_style,
    )));
    for row in rows {
        lines.push(Line::from(Span::styled(
            format!(
                " {:<16} {:>14} {:>14}",
                row.label,
                format_amount(row.estimated),
                format_amount(row.value)
            ),
            cell_style,
        )));
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Input;
    let border_color = if app.input_mode == InputMode::Editing {
        Color::Yellow
    } else if focused {
        Color::Cyan
    } else {
        Color::DarkGray
    };

    let title = if app.conversation.is_pending() {
        " Ask (waiting for reply) "
    } else {
        " Ask (i to type) "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scroll keeps the cursor inside the visible slice
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;
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

    let input = if visible_text.is_empty() && app.input_mode == InputMode::Normal {
        Paragraph::new("Type your query here...")
            .style(Style::default().fg(Color::DarkGray))
            .block(input_block)
    } else {
        Paragraph::new(visible_text)
            .style(Style::default().fg(Color::Cyan))
            .block(input_block)
    };

    frame.render_widget(input, area);

    if app.input_mode == InputMode::Editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_sidebar(app: &mut App, frame: &mut Frame, area: Rect) {
    let suggestions_height = (SUGGESTIONS.len() + 2) as u16;
    let [suggestions_area, metadata_area] =
        Layout::vertical([Constraint::Length(suggestions_height), Constraint::Min(0)])
            .areas(area);

    app.suggestions_area = Some(suggestions_area);

    let focused = app.focus == FocusPane::Suggestions;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Suggestions ");

    let items: Vec<ListItem> = SUGGESTIONS
        .iter()
        .map(|s| ListItem::new(format!(" {} ", s)))
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

    frame.render_stateful_widget(list, suggestions_area, &mut app.suggestion_state);

    render_metadata(app.metadata.as_ref(), frame, metadata_area);
}

fn render_metadata(metadata: Option<&DatasetMetadata>, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Dataset ");

    let lines = match metadata {
        Some(metadata) => {
            let mut lines = Vec::new();
            for (label, values) in [
                ("Zones", &metadata.zones),
                ("Crops", &metadata.crops),
                ("Divisions", &metadata.divisions),
            ] {
                lines.push(Line::from(Span::styled(
                    label,
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                )));
                for value in values {
                    lines.push(Line::from(format!(" • {}", value)));
                }
                lines.push(Line::default());
            }
            lines
        }
        None => vec![Line::from(Span::styled(
            "Loading…",
            Style::default().fg(Color::DarkGray),
        ))],
    };

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.input_mode {
        InputMode::Normal => " CHAT ",
        InputMode::Editing => " INPUT ",
    };

    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.input_mode {
        InputMode::Normal => vec![
            Span::styled(" i ", key_style),
            Span::styled(" type ", label_style),
            Span::styled(" Tab ", key_style),
            Span::styled(" focus ", label_style),
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" select ", label_style),
            Span::styled(" r ", key_style),
            Span::styled(" new chat ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
        InputMode::Editing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" stop typing ", label_style),
        ],
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

/// Estimate how many terminal rows `lines` occupy once wrapped to `width`.
fn estimated_rows(lines: &[Line], width: u16) -> u16 {
    if width == 0 {
        return lines.len() as u16;
    }
    lines
        .iter()
        .map(|line| {
            let w = line.width() as u16;
            if w == 0 {
                1
            } else {
                w.div_ceil(width)
            }
        })
        .sum()
}

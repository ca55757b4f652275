use crate::state::{App, FormState, Overlay, View};
use crate::theme::{self, icons};
use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap},
    Frame,
};
use sched_core::Task;

pub fn render(f: &mut Frame, app: &mut App) {
    let area = f.size();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(area);

    render_tabs(f, app, layout[0]);
    match app.view {
        View::Tasks => render_tasks(f, app, layout[1]),
        View::LastRuns => render_last_runs(f, app, layout[1]),
        View::Heights => render_heights(f, app, layout[1]),
    }
    render_footer(f, app, layout[2]);

    match &app.overlay {
        Overlay::None => {}
        Overlay::Help => render_help(f, centered_rect(60, 70, area)),
        Overlay::Form(form) => render_form(f, form, centered_rect(60, 60, area)),
        Overlay::ConfirmDelete(task) => render_confirm(f, task, centered_rect(50, 20, area)),
    }
}

fn render_tabs(f: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = View::ALL
        .iter()
        .enumerate()
        .map(|(idx, view)| Line::from(format!("{} {}", idx + 1, view.title())))
        .collect();
    let selected = View::ALL
        .iter()
        .position(|view| *view == app.view)
        .unwrap_or(0);
    let auto = if app.dashboard.auto_refresh() {
        format!(" auto-refresh {}s ", app.refresh_secs)
    } else {
        String::new()
    };
    let tabs = Tabs::new(titles)
        .select(selected)
        .highlight_style(theme::HEADER_STYLE)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" sched-console  {} {auto}", app.base_url)),
        );
    f.render_widget(tabs, area);
}

fn store_title(
    name: &str,
    fetching: bool,
    stale: bool,
    updated: Option<DateTime<Utc>>,
) -> String {
    let mut title = format!(" {name}");
    if fetching {
        title.push_str(&format!(" {}", icons::LOADING));
    } else if stale {
        title.push_str(&format!(" {}", icons::STALE));
    }
    if let Some(ts) = updated {
        title.push_str(&format!(
            "  updated {}",
            ts.with_timezone(&Local).format("%H:%M:%S")
        ));
    }
    title.push(' ');
    title
}

fn render_tasks(f: &mut Frame, app: &mut App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(10)])
        .split(area);

    let store = app.dashboard.tasks();
    let title = store_title(
        "Tasks",
        store.is_fetching(),
        store.did_invalidate(),
        store.last_updated_at(),
    );
    let rows: Vec<Row> = app
        .visible_tasks()
        .into_iter()
        .enumerate()
        .map(|(idx, task)| {
            let (flag, color) = if task.enabled {
                (icons::ENABLED, theme::enabled_color(true))
            } else {
                (icons::DISABLED, theme::enabled_color(false))
            };
            Row::new(vec![
                Cell::from(task.task_id.clone()),
                Cell::from(task.network.clone()),
                Cell::from(task.chain_id.clone()),
                Cell::from(task.kind.to_string()),
                Cell::from(task.duration.clone()),
                Cell::from(Span::styled(flag, color)),
                Cell::from(Span::styled(
                    task.status.clone(),
                    theme::status_color(&task.status),
                )),
                Cell::from(task.config_inline()),
            ])
            .style(theme::zebra_row_style(idx))
        })
        .collect();

    let widths = [
        Constraint::Length(20),
        Constraint::Length(12),
        Constraint::Length(16),
        Constraint::Length(10),
        Constraint::Length(9),
        Constraint::Length(4),
        Constraint::Length(10),
        Constraint::Min(10),
    ];
    let header = Row::new(vec![
        "Task ID", "Network", "Chain", "Kind", "Interval", "On", "Status", "Config",
    ])
    .style(theme::HEADER_STYLE);

    if rows.is_empty() {
        let message = if store.is_fetching() {
            "Loading tasks...".to_string()
        } else if let Some(err) = store.last_error() {
            format!("Failed to load tasks: {}", err.message)
        } else {
            "No tasks scheduled. Press n to add one.".to_string()
        };
        render_placeholder(f, &title, &message, chunks[0]);
    } else {
        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(theme::SELECTED_STYLE);
        f.render_stateful_widget(table, chunks[0], &mut app.tasks_state);
    }

    render_task_detail(f, app.selected_task().as_ref(), chunks[1]);
}

fn render_task_detail(f: &mut Frame, task: Option<&Task>, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Details ");
    let inner = block.inner(area);
    f.render_widget(block, area);
    let Some(task) = task else {
        return;
    };

    let mut lines = vec![Line::from(vec![
        Span::styled("Schedule: ", Style::default().fg(theme::MUTED)),
        Span::raw(task.schedule_ref().to_string()),
        Span::styled("  Version: ", Style::default().fg(theme::MUTED)),
        Span::raw(task.version.clone()),
    ])];
    if let Some(run_id) = task.run_id.as_deref() {
        lines.push(Line::from(vec![
            Span::styled("Run: ", Style::default().fg(theme::MUTED)),
            Span::raw(run_id.to_string()),
        ]));
    }
    let config = task.config_pretty();
    if config.is_empty() {
        lines.push(Line::from(Span::styled(
            "No configuration.",
            Style::default().fg(theme::MUTED),
        )));
    } else {
        lines.extend(config.lines().map(|line| Line::from(line.to_string())));
    }
    f.render_widget(Paragraph::new(lines), inner);
}

fn render_last_runs(f: &mut Frame, app: &mut App, area: Rect) {
    let store = app.dashboard.last_runs();
    let title = store_title(
        "Last Runs",
        store.is_fetching(),
        store.did_invalidate(),
        store.last_updated_at(),
    );
    let Some(selection) = app.dashboard.selection().cloned() else {
        render_placeholder(
            f,
            &title,
            "No task selected. Pick one on the Tasks view with Enter.",
            area,
        );
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(3)])
        .split(area);
    let page = app.dashboard.page().unwrap_or_default();
    let summary = Line::from(vec![
        Span::styled(selection.task_id.clone(), theme::HEADER_STYLE),
        Span::raw(format!(
            "  {}/{}  {}  page {} (offset {}, limit {})",
            selection.network,
            selection.chain_id,
            selection.kind,
            page.number(),
            page.offset,
            page.limit
        )),
    ]);
    f.render_widget(Paragraph::new(summary), chunks[0]);

    let range_sync = selection.kind.is_range_sync();
    let rows: Vec<Row> = store
        .items()
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            let error = record.error_text();
            let mut cells = vec![Cell::from(record.time_label())];
            if range_sync {
                cells.push(Cell::from(record.last_time_label()));
            }
            cells.extend([
                Cell::from(
                    record
                        .height
                        .map(|height| height.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Cell::from(record.hash.clone()),
                Cell::from(record.retry_count.to_string()),
                Cell::from(record.nonce_text()),
                Cell::from(Span::styled(error, Style::default().fg(theme::ERROR))),
            ]);
            Row::new(cells).style(theme::zebra_row_style(idx))
        })
        .collect();

    if rows.is_empty() {
        let message = if store.is_fetching() {
            "Loading run log...".to_string()
        } else if let Some(err) = store.last_error() {
            format!("Failed to load run log: {}", err.message)
        } else {
            "No runs recorded for this page.".to_string()
        };
        render_placeholder(f, &title, &message, chunks[1]);
        return;
    }

    let mut headers = vec!["Time"];
    let mut widths = vec![Constraint::Length(19)];
    if range_sync {
        headers.push("Last time");
        widths.push(Constraint::Length(19));
    }
    headers.extend(["Height", "Hash", "Retries", "Nonce", "Error"]);
    widths.extend([
        Constraint::Length(10),
        Constraint::Length(20),
        Constraint::Length(7),
        Constraint::Length(12),
        Constraint::Min(10),
    ]);

    let table = Table::new(rows, widths)
        .header(Row::new(headers).style(theme::HEADER_STYLE))
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(theme::SELECTED_STYLE);
    f.render_stateful_widget(table, chunks[1], &mut app.runs_state);
}

fn render_heights(f: &mut Frame, app: &mut App, area: Rect) {
    let store = app.dashboard.last_heights();
    let title = store_title(
        "Last Heights",
        store.is_fetching(),
        store.did_invalidate(),
        store.last_updated_at(),
    );
    if store.items().is_empty() {
        let message = match store.last_error() {
            Some(err) => format!("Failed to load heights: {}", err.message),
            None if store.is_fetching() => "Loading heights...".to_string(),
            None => "No heights reported.".to_string(),
        };
        render_placeholder(f, &title, &message, area);
        return;
    }

    let rows: Vec<Row> = store
        .items()
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            Row::new(vec![
                Cell::from(row.network.clone()),
                Cell::from(row.chain_id.clone()),
                Cell::from(
                    row.height
                        .map(|height| height.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
            ])
            .style(theme::zebra_row_style(idx))
        })
        .collect();
    let widths = [
        Constraint::Length(16),
        Constraint::Length(24),
        Constraint::Min(10),
    ];
    let table = Table::new(rows, widths)
        .header(Row::new(vec!["Network", "Chain", "Height"]).style(theme::HEADER_STYLE))
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(theme::SELECTED_STYLE);
    f.render_stateful_widget(table, area, &mut app.heights_state);
}

fn render_placeholder(f: &mut Frame, title: &str, message: &str, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let p = Paragraph::new(Line::from(Span::styled(
        message.to_string(),
        Style::default().fg(theme::WARN),
    )))
    .block(block)
    .wrap(Wrap { trim: true });
    f.render_widget(p, area);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = Vec::new();
    let tasks = app.dashboard.tasks();
    if let Some(status) = tasks.status() {
        spans.push(Span::styled(
            format!("backend: {status}  "),
            Style::default().fg(theme::ERROR),
        ));
    }
    let fetch_error = match app.view {
        View::Tasks => tasks.last_error(),
        View::LastRuns => app.dashboard.last_runs().last_error(),
        View::Heights => app.dashboard.last_heights().last_error(),
    };
    if let Some(err) = fetch_error {
        spans.push(Span::styled(
            format!("fetch failed at {}: {}  ", err.at.format("%H:%M:%S"), err.message),
            Style::default().fg(theme::ERROR),
        ));
    }
    if let Some(note) = &app.status_note {
        spans.push(Span::styled(note.clone(), Style::default().fg(theme::ACCENT)));
    }
    if spans.is_empty() {
        spans.push(Span::styled("Ready", Style::default().fg(theme::MUTED)));
    }

    let hints = match app.view {
        View::Tasks => {
            "Enter runs  e enable/disable  d delete  n new  s sort  r refresh  ? help  q quit"
        }
        View::LastRuns => "a auto-refresh  [ ] page  r refresh  Esc tasks  ? help  q quit",
        View::Heights => "r refresh  ? help  q quit",
    };
    let lines = vec![
        Line::from(spans),
        Line::from(Span::styled(hints, Style::default().fg(theme::MUTED))),
    ];
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::TOP));
    f.render_widget(p, area);
}

fn render_help(f: &mut Frame, area: Rect) {
    f.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Help")
        .border_style(Style::default().fg(Color::Yellow));
    let inner_area = block.inner(area);
    f.render_widget(block, area);

    let entries = [
        ("1 / 2 / 3", "Tasks / last runs / heights"),
        ("Tab", "Next view"),
        ("j / Down", "Next row"),
        ("k / Up", "Previous row"),
        ("Enter", "Show run log of the selected task"),
        ("e", "Enable or disable the selected task"),
        ("d", "Delete the selected task"),
        ("n", "New task"),
        ("s / S", "Cycle sort / reverse"),
        ("r", "Refresh current view"),
        ("a", "Toggle auto-refresh (run log)"),
        ("[ / ]", "Previous / next page (run log)"),
        ("?", "Toggle help"),
        ("q", "Quit"),
    ];
    let mut text = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    text.extend(entries.iter().map(|(keys, action)| {
        Line::from(vec![
            Span::styled(format!("{keys:<11}"), Color::Cyan),
            Span::raw(*action),
        ])
    }));

    let p = Paragraph::new(text).wrap(Wrap { trim: true });
    f.render_widget(p, inner_area);
}

fn render_form(f: &mut Frame, form: &FormState, area: Rect) {
    f.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" New task (Tab next field, Enter submit, Esc cancel) ")
        .border_style(Style::default().fg(theme::ACCENT));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut lines = Vec::new();
    for field in form.fields() {
        let focused = field == form.field;
        let marker = if focused { "> " } else { "  " };
        let mut value = form.value(field);
        if focused && field != crate::state::FormField::Kind {
            value.push('_');
        }
        let value_style = if focused {
            theme::SELECTED_STYLE
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::raw(marker),
            Span::styled(format!("{:<12}", field.label()), Style::default().fg(theme::MUTED)),
            Span::styled(value, value_style),
        ]));
    }
    lines.push(Line::from(""));
    if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(theme::ERROR),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            "Kind: Left/Right to switch. Interval like 30s, 5m, 1h.",
            Style::default().fg(theme::MUTED),
        )));
    }
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

fn render_confirm(f: &mut Frame, task: &Task, area: Rect) {
    f.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Delete task ")
        .border_style(Style::default().fg(theme::ERROR));
    let lines = vec![
        Line::from(format!(
            "Delete {} ({}/{})?",
            task.task_id, task.network, task.chain_id
        )),
        Line::from(""),
        Line::from(Span::styled("y confirm  n cancel", Style::default().fg(theme::MUTED))),
    ];
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn centered_rect(percent_x: u16, percent_y: u16, rect: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(rect);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1]);
    horizontal[1]
}

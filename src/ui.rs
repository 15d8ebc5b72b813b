use crate::api::Backend;
use crate::app::{ActiveInput, App, AuthField, InputMode, ProfileField, Screen};
use crate::models::{Task, TaskStatus};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

fn centered_rect_absolute(width: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length((r.height.saturating_sub(height)) / 2),
                Constraint::Length(height),
                Constraint::Length((r.height.saturating_sub(height) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Length((r.width.saturating_sub(width)) / 2),
                Constraint::Length(width),
                Constraint::Length((r.width.saturating_sub(width) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn key_span(key: &str) -> Span<'static> {
    Span::styled(format!(" {} ", key), Style::default().fg(Color::Red))
}

fn field_line(label: &str, value: &str, active: bool, masked: bool) -> Line<'static> {
    let shown = if masked {
        "*".repeat(value.chars().count())
    } else {
        value.to_string()
    };
    let label_style = if active {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    Line::from(vec![
        Span::styled(format!("{:<18}", label), label_style),
        Span::raw(shown),
        if active {
            Span::styled("_", Style::default().fg(Color::Green))
        } else {
            Span::raw("")
        },
    ])
}

fn status_glyph(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "[ ]",
        TaskStatus::InProgress => "[~]",
        TaskStatus::Done => "[x]",
    }
}

pub fn draw<B: Backend>(f: &mut Frame, app: &mut App<B>) {
    match app.screen {
        Screen::Login | Screen::Register => draw_auth(f, app),
        Screen::Dashboard => draw_dashboard(f, app),
        Screen::Profile => draw_profile(f, app),
    }
}

fn draw_auth<B: Backend>(f: &mut Frame, app: &App<B>) {
    let registering = app.screen == Screen::Register;
    let title = if registering {
        "Create Account"
    } else {
        "Sign In"
    };
    let height = if registering { 12 } else { 10 };
    let area = centered_rect_absolute(56, height, f.area());

    let mut lines: Vec<Line> = Vec::new();
    lines.push(field_line(
        "Email",
        &app.auth_form.email,
        app.auth_form.active == AuthField::Email,
        false,
    ));
    if registering {
        lines.push(field_line(
            "Username",
            &app.auth_form.username,
            app.auth_form.active == AuthField::Username,
            false,
        ));
    }
    lines.push(field_line(
        "Password",
        &app.auth_form.password,
        app.auth_form.active == AuthField::Password,
        true,
    ));
    if registering {
        lines.push(field_line(
            "Confirm password",
            &app.auth_form.confirm,
            app.auth_form.active == AuthField::Confirm,
            true,
        ));
    }
    lines.push(Line::from(""));
    if let Some(error) = &app.auth_form.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    } else {
        lines.push(Line::from(""));
    }
    let switch = if registering {
        vec![
            key_span("Ctrl-l"),
            Span::raw(": Sign In "),
            key_span("Enter"),
            Span::raw(": Register "),
            key_span("Esc"),
            Span::raw(": Quit"),
        ]
    } else {
        vec![
            key_span("Ctrl-r"),
            Span::raw(": Create Account "),
            key_span("Enter"),
            Span::raw(": Sign In "),
            key_span("Esc"),
            Span::raw(": Quit"),
        ]
    };
    lines.push(Line::from(switch));

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Nexus — {}", title));
    let form = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    f.render_widget(Clear, area);
    f.render_widget(form, area);
}

fn draw_dashboard<B: Backend>(f: &mut Frame, app: &mut App<B>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(f.area());

    draw_header(f, app, chunks[0]);
    draw_filter_bar(f, app, chunks[1]);

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(chunks[2]);

    draw_task_list(f, app, panes[0]);
    draw_task_detail(f, app, panes[1]);
    draw_legend(f, app, chunks[3]);

    if matches!(app.input_mode, InputMode::Editing | InputMode::Insert) {
        draw_task_form(f, app);
    }
}

fn draw_header<B: Backend>(f: &mut Frame, app: &App<B>, area: Rect) {
    let username = app
        .session
        .user()
        .map(|u| u.username.as_str())
        .unwrap_or("?");
    let (in_progress, done) = app.tasks.progress_counts();
    let header = Line::from(vec![
        Span::styled(
            " Nexus ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            " {} · {} tasks · {} in progress · {} done",
            username,
            app.tasks.total(),
            in_progress,
            done
        )),
    ]);
    f.render_widget(Paragraph::new(header), area);
}

fn draw_filter_bar<B: Backend>(f: &mut Frame, app: &App<B>, area: Rect) {
    let searching = matches!(app.input_mode, InputMode::Search);
    let mut spans = vec![Span::raw(" Filter: ")];
    spans.push(Span::styled(
        format!("[{}]", app.tasks.criteria.status.label()),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::raw("  Search: "));
    let search_style = if searching {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    };
    spans.push(Span::styled(app.tasks.criteria.search.clone(), search_style));
    if searching {
        spans.push(Span::styled("_", Style::default().fg(Color::Green)));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_task_list<B: Backend>(f: &mut Frame, app: &mut App<B>, area: Rect) {
    let tasks_widget = if !app.tasks.tasks().is_empty() {
        let items: Vec<ListItem> = app
            .tasks
            .tasks()
            .iter()
            .map(|task| {
                let mut style = Style::default();
                if task.status == TaskStatus::Done {
                    style = style
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::CROSSED_OUT);
                }
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{} ", status_glyph(task.status))),
                    Span::styled(task.title.clone(), style),
                ]))
            })
            .collect();

        List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Tasks"))
            .highlight_style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">> ")
    } else {
        List::new(vec![ListItem::new("No tasks match")])
            .block(Block::default().borders(Borders::ALL).title("Tasks"))
    };

    f.render_stateful_widget(tasks_widget, area, &mut app.state);
}

fn draw_task_detail<B: Backend>(f: &mut Frame, app: &App<B>, area: Rect) {
    let detail_block = Block::default().borders(Borders::ALL).title("Task Details");
    let selected: Option<&Task> = app.state.selected().and_then(|i| app.tasks.get(i));

    if let Some(task) = selected {
        let mut lines: Vec<Line<'static>> = Vec::new();

        lines.push(Line::from(vec![
            Span::styled("Status: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(task.status.label()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Priority: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(task.priority.label()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Created: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(task.created_at.format("%Y-%m-%d %H:%M").to_string()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Updated: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(task.updated_at.format("%Y-%m-%d %H:%M").to_string()),
        ]));

        lines.push(Line::from(vec![Span::styled(
            "Description: ",
            Style::default().add_modifier(Modifier::BOLD),
        )]));
        if task.description.trim().is_empty() {
            lines.push(Line::from(Span::raw("No description".to_string())));
        } else {
            for text_line in task.description.lines() {
                lines.push(Line::from(Span::raw(text_line.to_string())));
            }
        }

        let paragraph = Paragraph::new(lines)
            .block(detail_block)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    } else {
        let paragraph = Paragraph::new("Select a task to view details")
            .block(detail_block)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }
}

fn draw_task_form<B: Backend>(f: &mut Frame, app: &App<B>) {
    let area = centered_rect_absolute(60, 12, f.area());
    let form = &app.task_form;
    let title = if form.editing.is_some() {
        "Edit Task"
    } else {
        "New Task"
    };

    let mut lines: Vec<Line> = Vec::new();
    lines.push(field_line(
        "Title",
        &form.title,
        form.active == ActiveInput::Title,
        false,
    ));
    lines.push(field_line(
        "Description",
        &form.description,
        form.active == ActiveInput::Description,
        false,
    ));
    lines.push(field_line(
        "Status",
        form.status.label(),
        form.active == ActiveInput::Status,
        false,
    ));
    lines.push(field_line(
        "Priority",
        form.priority.label(),
        form.active == ActiveInput::Priority,
        false,
    ));
    lines.push(Line::from(""));
    if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    } else {
        lines.push(Line::from(""));
    }
    let legend = match app.input_mode {
        InputMode::Insert => vec![key_span("Esc"), Span::raw(": Stop Editing Text")],
        _ => vec![
            key_span("i"),
            Span::raw(": Edit Text "),
            key_span("Tab"),
            Span::raw(": Next Field "),
            key_span("Space"),
            Span::raw(": Cycle Value "),
            key_span("Enter"),
            Span::raw(": Save "),
            key_span("Esc"),
            Span::raw(": Cancel"),
        ],
    };
    lines.push(Line::from(legend));

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .style(Style::default().fg(Color::Green));
    let popup = Paragraph::new(lines)
        .style(Style::default().fg(Color::White))
        .block(block);

    f.render_widget(Clear, area);
    f.render_widget(popup, area);
}

fn draw_profile<B: Backend>(f: &mut Frame, app: &App<B>) {
    let area = centered_rect_absolute(64, 16, f.area());
    let form = &app.profile_form;

    let mut lines: Vec<Line> = Vec::new();
    lines.push(field_line(
        "Username",
        &form.username,
        form.active == ProfileField::Username,
        false,
    ));
    lines.push(field_line(
        "Email",
        &form.email,
        form.active == ProfileField::Email,
        false,
    ));
    let avatar_note = match form.avatar_bytes {
        Some(len) => format!("{} ({} bytes stored locally)", form.avatar_path, len),
        None => form.avatar_path.clone(),
    };
    lines.push(field_line(
        "Avatar file",
        &avatar_note,
        form.active == ProfileField::AvatarPath,
        false,
    ));
    lines.push(Line::from(""));
    lines.push(field_line(
        "Current password",
        &form.current_password,
        form.active == ProfileField::CurrentPassword,
        true,
    ));
    lines.push(field_line(
        "New password",
        &form.new_password,
        form.active == ProfileField::NewPassword,
        true,
    ));
    lines.push(field_line(
        "Confirm password",
        &form.confirm_password,
        form.active == ProfileField::ConfirmPassword,
        true,
    ));
    lines.push(Line::from(""));
    if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    } else if let Some(message) = &form.message {
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Green),
        )));
    } else {
        lines.push(Line::from(""));
    }
    lines.push(Line::from(vec![
        key_span("i"),
        Span::raw(": Edit "),
        key_span("Tab"),
        Span::raw(": Next Field "),
        key_span("Enter"),
        Span::raw(": Apply "),
        key_span("Esc"),
        Span::raw(": Back"),
    ]));

    let block = Block::default().borders(Borders::ALL).title("Profile");
    let popup = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    f.render_widget(Clear, area);
    f.render_widget(popup, area);
}

fn draw_legend<B: Backend>(f: &mut Frame, app: &App<B>, area: Rect) {
    if let Some(status) = &app.status_line {
        let line = Line::from(Span::styled(
            format!(" {}", status),
            Style::default().fg(Color::Red),
        ));
        f.render_widget(Paragraph::new(line), area);
        return;
    }
    let legend = match app.input_mode {
        InputMode::Search => Text::from(Line::from(vec![
            key_span("Esc"),
            Span::raw(": Done Searching "),
            Span::raw("(the list refreshes as you type)"),
        ])),
        _ => Text::from(Line::from(vec![
            key_span("q"),
            Span::raw(": Quit "),
            key_span("j/k"),
            Span::raw(": Move "),
            key_span("a"),
            Span::raw(": Add "),
            key_span("e"),
            Span::raw(": Edit "),
            key_span("d"),
            Span::raw(": Delete "),
            key_span("f"),
            Span::raw(": Filter "),
            key_span("/"),
            Span::raw(": Search "),
            key_span("r"),
            Span::raw(": Refresh "),
            key_span("p"),
            Span::raw(": Profile "),
            key_span("o"),
            Span::raw(": Sign Out"),
        ])),
    };
    f.render_widget(Paragraph::new(legend).alignment(Alignment::Left), area);
}

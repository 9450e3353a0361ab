use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Row, Table, TableState, Tabs};

use crate::app::{App, Tab};
use crate::ui::style::{COLOR_RUNNING, COLOR_SELECTED_BG, make_block};

const KEY_HINTS: &str =
    " Tab/1/2 switch  j/k move  b build  r run  p push  s stop  d remove  c commit  g dockerfile  Esc cancel  q quit";

pub fn draw(frame: &mut Frame, app: &App) {
    let size = frame.area();

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Percentage(35),
            Constraint::Length(2),
        ])
        .split(size);

    draw_tabs(frame, app, rows[0]);
    match app.tab {
        Tab::Images => draw_images(frame, app, rows[1]),
        Tab::Containers => draw_containers(frame, app, rows[1]),
    }
    draw_log(frame, app, rows[2]);
    draw_status(frame, app, rows[3]);
}

fn draw_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let tabs = Tabs::new(vec!["Images", "Containers"])
        .select(app.tab.index())
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, area);
}

fn draw_images(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!("Images ({})", app.snapshot.images.len());
    let block = make_block(&title, app.tab == Tab::Images);

    let rows: Vec<Row> = app
        .snapshot
        .images
        .iter()
        .map(|image| {
            Row::new(vec![
                image.repository.clone(),
                image.tag.clone(),
                image.id.clone(),
                image.size.clone(),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(40),
            Constraint::Percentage(15),
            Constraint::Percentage(25),
            Constraint::Percentage(20),
        ],
    )
    .header(header_row(&["REPOSITORY", "TAG", "IMAGE ID", "SIZE"]))
    .block(block)
    .row_highlight_style(
        Style::default()
            .bg(COLOR_SELECTED_BG)
            .add_modifier(Modifier::BOLD),
    );

    let mut state = TableState::default();
    state.select(Some(app.image_index));
    frame.render_stateful_widget(table, area, &mut state);
}

fn draw_containers(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!("Containers ({})", app.snapshot.containers.len());
    let block = make_block(&title, app.tab == Tab::Containers);

    let rows: Vec<Row> = app
        .snapshot
        .containers
        .iter()
        .map(|container| {
            Row::new(vec![
                container.id.clone(),
                container.name.clone(),
                container.image.clone(),
                container.status.clone(),
                container.ports.clone(),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(15),
            Constraint::Percentage(20),
            Constraint::Percentage(25),
            Constraint::Percentage(20),
            Constraint::Percentage(20),
        ],
    )
    .header(header_row(&["ID", "NAME", "IMAGE", "STATUS", "PORTS"]))
    .block(block)
    .row_highlight_style(
        Style::default()
            .bg(COLOR_SELECTED_BG)
            .add_modifier(Modifier::BOLD),
    );

    let mut state = TableState::default();
    state.select(Some(app.container_index));
    frame.render_stateful_widget(table, area, &mut state);
}

fn draw_log(frame: &mut Frame, app: &App, area: Rect) {
    let title = if app.busy { "Output (running)" } else { "Output" };
    let block = make_block(title, app.busy);

    // Keep the tail of the log in view.
    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = app
        .live_log
        .lines()
        .rev()
        .take(visible)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .map(Line::from)
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_status(frame: &mut Frame, app: &App, area: Rect) {
    let status_style = if app.busy {
        Style::default().fg(COLOR_RUNNING)
    } else {
        Style::default()
    };
    let lines = vec![
        Line::from(Span::styled(app.status.clone(), status_style)),
        Line::from(Span::styled(
            KEY_HINTS,
            Style::default().fg(Color::DarkGray),
        )),
    ];
    frame.render_widget(Paragraph::new(lines), area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    Row::new(titles.to_vec()).style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )
}

use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{
    Bar, BarChart, BarGroup, Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState,
};

use typer_terminal::config::Config;
use typer_terminal::editor::DraftColumn;
use typer_terminal::feed;
use typer_terminal::metrics;
use typer_terminal::reconcile::{ReconciledRecord, RevealPolicy};
use typer_terminal::session::Session;
use typer_terminal::state::{self, AppState, ProviderCommand, Screen, apply_delta};

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: Option<mpsc::Sender<ProviderCommand>>,
}

impl App {
    fn new(state: AppState, cmd_tx: Option<mpsc::Sender<ProviderCommand>>) -> Self {
        Self {
            state,
            should_quit: false,
            cmd_tx,
        }
    }

    fn send(&mut self, cmd: Option<ProviderCommand>) {
        let Some(cmd) = cmd else {
            return;
        };
        let Some(tx) = &self.cmd_tx else {
            self.state.push_log("[WARN] Data source worker unavailable");
            return;
        };
        if tx.send(cmd).is_err() {
            self.state.loading = false;
            self.state.saving = false;
            self.state.push_log("[ERROR] Data source worker stopped");
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.state.is_editing() {
            self.on_input_key(key);
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('1') => self.state.screen = Screen::Dashboard,
            KeyCode::Char('2') => self.state.screen = Screen::Matches,
            KeyCode::Char('3') => self.state.screen = Screen::Editor,
            KeyCode::Tab => self.state.screen = next_screen(self.state.screen),
            KeyCode::Char('r') => {
                let cmd = self.state.reload_command();
                self.send(cmd);
            }
            KeyCode::Char('s') => {
                let cmd = self.state.save_command();
                self.send(cmd);
            }
            KeyCode::Char('x') => {
                let path = format!(
                    "typer_export_{}.xlsx",
                    chrono::Local::now().format("%Y%m%d_%H%M%S")
                );
                let cmd = self.state.export_command(path);
                self.send(cmd);
            }
            KeyCode::Char('t') => self.state.cycle_team_filter(),
            KeyCode::Char('h') => self.state.toggle_home_only(),
            KeyCode::Char('g') => self.state.toggle_safe_mode(),
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            _ => match self.state.screen {
                Screen::Dashboard => {}
                Screen::Matches => self.on_matches_key(key),
                Screen::Editor => self.on_editor_key(key),
            },
        }
    }

    fn on_matches_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Char('p') | KeyCode::Enter => self.state.pick_selected(),
            _ => {}
        }
    }

    fn on_editor_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.state.editor_next_row(),
            KeyCode::Char('k') | KeyCode::Up => self.state.editor_prev_row(),
            KeyCode::Right => self.state.editor_next_col(),
            KeyCode::Left => self.state.editor_prev_col(),
            KeyCode::Enter | KeyCode::Char('e') => self.state.begin_cell_edit(),
            KeyCode::Char('a') => self.state.editor_add_row(),
            KeyCode::Char('d') | KeyCode::Delete => self.state.editor_remove_row(),
            KeyCode::Char('u') => self.state.revert_draft(),
            _ => {}
        }
    }

    fn on_input_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.state.cancel_input(),
            KeyCode::Enter => self.state.commit_input(),
            KeyCode::Tab => {
                self.state.editor_next_col();
                self.state.begin_cell_edit();
            }
            KeyCode::Backspace => self.state.input_pop(),
            KeyCode::Char(c) => self.state.input_push(c),
            _ => {}
        }
    }
}

fn next_screen(screen: Screen) -> Screen {
    match screen {
        Screen::Dashboard => Screen::Matches,
        Screen::Matches => Screen::Editor,
        Screen::Editor => Screen::Dashboard,
    }
}

fn main() -> io::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let config = Config::from_env();
    let session = Session::open(&config);

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    feed::spawn_provider(session, tx, cmd_rx);

    let initial = AppState::with_options(config.safe_mode, config.filter_from, config.filter_to);
    let mut app = App::new(initial, Some(cmd_tx));
    let cmd = app.state.reload_command();
    app.send(cmd);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<state::Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(6),
            Constraint::Length(2),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(&app.state))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    if !app.state.data_ready {
        render_unavailable(frame, chunks[1], &app.state);
    } else {
        match app.state.screen {
            Screen::Dashboard => render_dashboard(frame, chunks[1], &app.state),
            Screen::Matches => render_matches(frame, chunks[1], &app.state),
            Screen::Editor => render_editor(frame, chunks[1], &app.state),
        }
    }

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(footer_text(&app.state))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[3]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let screen = match state.screen {
        Screen::Dashboard => "Dashboard",
        Screen::Matches => "Matches",
        Screen::Editor => "Editor",
    };
    let range = match (state.filter.from, state.filter.to) {
        (None, None) => "all dates".to_string(),
        (from, to) => format!(
            "{}..{}",
            from.map(|d| d.format("%d/%m/%Y").to_string())
                .unwrap_or_default(),
            to.map(|d| d.format("%d/%m/%Y").to_string())
                .unwrap_or_default()
        ),
    };
    let mut flags = Vec::new();
    if state.safe_mode {
        flags.push("SAFE");
    }
    if state.draft.is_dirty() {
        flags.push("UNSAVED");
    }
    if state.loading {
        flags.push("LOADING");
    }
    if state.saving {
        flags.push("SAVING");
    }
    format!(
        "TYPER | {screen} | {} | {range} {}",
        state.team_filter_label(),
        flags.join(" ")
    )
}

fn footer_text(state: &AppState) -> String {
    let keys = if state.is_editing() {
        "Type value | Enter Commit | Tab Next cell | Esc Cancel"
    } else {
        match state.screen {
            Screen::Dashboard => {
                "1/2/3 Screens | t Team | h Home-only | g Safe | r Reload | x Export | ? Help | q Quit"
            }
            Screen::Matches => {
                "j/k Move | Enter/p Pick | t Team | h Home-only | g Safe | r Reload | ? Help | q Quit"
            }
            Screen::Editor => {
                "j/k Row | ←/→ Col | Enter Edit | a Add | d Del | s Save | u Revert | ? Help | q Quit"
            }
        }
    };
    match &state.status {
        Some(status) => format!("{keys}\n{status}"),
        None => keys.to_string(),
    }
}

fn render_unavailable(frame: &mut Frame, area: Rect, state: &AppState) {
    let text = match (&state.last_error, state.loading) {
        (Some(err), _) => format!("{err}\n\nFix the data source and press r to reload."),
        (None, true) => "Loading results and predictions...".to_string(),
        (None, false) => "No data loaded. Press r to reload.".to_string(),
    };
    let style = if state.last_error.is_some() {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let paragraph = Paragraph::new(text)
        .style(style)
        .block(Block::default().title("Data").borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn render_dashboard(frame: &mut Frame, area: Rect, state: &AppState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(1)])
        .split(area);

    let kpis = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(rows[0]);

    let m = &state.metrics;
    render_kpi(frame, kpis[0], "Winner accuracy", &metrics::format_percent(m.win_accuracy));
    render_kpi(frame, kpis[1], "Exact scores", &metrics::format_percent(m.exact_accuracy));
    render_kpi(frame, kpis[2], "Mean goal error", &metrics::format_error(m.mean_goal_error));
    render_kpi(
        frame,
        kpis[3],
        "Predicted",
        &format!("{} / {}", m.predicted, m.matches),
    );

    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(20)])
        .split(rows[1]);

    frame.render_widget(winner_chart(state), charts[0]);

    let errors: Vec<(String, u64)> = state
        .visible_records()
        .into_iter()
        .filter_map(|r| r.total_error.map(|e| (r.result.match_id.clone(), u64::from(e))))
        .collect();
    if errors.is_empty() {
        let empty = Paragraph::new("No predicted matches in this view")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().title("Goal error per match").borders(Borders::ALL));
        frame.render_widget(empty, charts[1]);
        return;
    }
    // Newest matches that fit the width.
    let fit = (charts[1].width.saturating_sub(2) / 5).max(1) as usize;
    let start = errors.len().saturating_sub(fit);
    let bars: Vec<Bar> = errors[start..]
        .iter()
        .map(|(id, err)| {
            Bar::default()
                .value(*err)
                .label(Line::from(id.clone()))
                .style(Style::default().fg(error_color(*err)))
        })
        .collect();
    let chart = BarChart::default()
        .block(Block::default().title("Goal error per match").borders(Borders::ALL))
        .data(BarGroup::default().bars(&bars))
        .bar_width(4)
        .bar_gap(1);
    frame.render_widget(chart, charts[1]);
}

fn render_kpi(frame: &mut Frame, area: Rect, title: &str, value: &str) {
    let paragraph = Paragraph::new(value.to_string())
        .style(Style::default().add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center)
        .block(Block::default().title(title.to_string()).borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn winner_chart(state: &AppState) -> BarChart<'static> {
    let hits = Bar::default()
        .value(state.metrics.winner_hits as u64)
        .label(Line::from("Hit"))
        .style(Style::default().fg(Color::Green));
    let misses = Bar::default()
        .value(state.metrics.winner_misses as u64)
        .label(Line::from("Miss"))
        .style(Style::default().fg(Color::Red));
    BarChart::default()
        .block(Block::default().title("Winner picks").borders(Borders::ALL))
        .data(BarGroup::default().bars(&[hits, misses]))
        .bar_width(10)
        .bar_gap(3)
}

fn error_color(err: u64) -> Color {
    match err {
        0 => Color::Green,
        1 | 2 => Color::Yellow,
        _ => Color::Red,
    }
}

fn render_matches(frame: &mut Frame, area: Rect, state: &AppState) {
    let visible = state.visible_records();
    if visible.is_empty() {
        let empty = Paragraph::new("No matches for this filter")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().title("Matches").borders(Borders::ALL));
        frame.render_widget(empty, area);
        return;
    }

    let header = Row::new(vec![
        "ID", "Date", "Home", "Away", "Score", "Pick", "Winner", "Err",
    ])
    .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = visible
        .iter()
        .map(|record| match_row(state, record))
        .collect();

    let widths = [
        Constraint::Length(6),
        Constraint::Length(11),
        Constraint::Min(12),
        Constraint::Min(12),
        Constraint::Length(6),
        Constraint::Length(6),
        Constraint::Length(7),
        Constraint::Length(4),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().title("Matches").borders(Borders::ALL))
        .highlight_style(Style::default().fg(Color::White).bg(Color::DarkGray));

    let mut table_state = TableState::default().with_selected(Some(state.selected));
    frame.render_stateful_widget(table, area, &mut table_state);
}

fn match_row<'a>(state: &AppState, record: &ReconciledRecord) -> Row<'a> {
    let result = &record.result;
    let pick = match record.predicted_score() {
        Some((home, Some(away))) => format!("{home}-{away}"),
        Some((home, None)) => format!("{home}-?"),
        None => "-".to_string(),
    };
    let (score, winner, err) = match state.reveal(record) {
        RevealPolicy::Locked => (
            "??".to_string(),
            Cell::from("locked").style(Style::default().fg(Color::DarkGray)),
            String::new(),
        ),
        RevealPolicy::Revealed => {
            let winner = match record.winner_correct {
                Some(true) => Cell::from("✓").style(Style::default().fg(Color::Green)),
                Some(false) => Cell::from("✗").style(Style::default().fg(Color::Red)),
                None => Cell::from("-"),
            };
            let err = record
                .total_error
                .map(|e| e.to_string())
                .unwrap_or_default();
            (
                format!("{}-{}", result.home_goals, result.away_goals),
                winner,
                err,
            )
        }
    };
    Row::new(vec![
        Cell::from(result.match_id.clone()),
        Cell::from(result.date_raw.clone()),
        Cell::from(result.home_team.clone()),
        Cell::from(result.away_team.clone()),
        Cell::from(score),
        Cell::from(pick),
        winner,
        Cell::from(err),
    ])
}

fn render_editor(frame: &mut Frame, area: Rect, state: &AppState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(3)])
        .split(area);

    let header = Row::new(
        std::iter::once("Match".to_string())
            .chain(DraftColumn::ALL.iter().map(|c| c.label().to_string()))
            .collect::<Vec<_>>(),
    )
    .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = state
        .draft
        .rows
        .iter()
        .enumerate()
        .map(|(idx, draft_row)| {
            let invalid = state.invalid_rows.contains(&idx);
            let row_style = if invalid {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            let mut cells = vec![Cell::from(state.draft_row_label(idx))];
            for col in DraftColumn::ALL {
                let editing_here = idx == state.editor_row && col == state.editor_col;
                let text = match (&state.input, editing_here) {
                    (Some(buf), true) => format!("{buf}_"),
                    _ => draft_row.cell(col).to_string(),
                };
                let style = if editing_here {
                    Style::default().add_modifier(Modifier::REVERSED)
                } else {
                    Style::default()
                };
                cells.push(Cell::from(text).style(style));
            }
            Row::new(cells).style(row_style)
        })
        .collect();

    let widths = [
        Constraint::Min(20),
        Constraint::Length(10),
        Constraint::Length(16),
        Constraint::Length(16),
        Constraint::Length(12),
    ];
    let title = format!("Predictions draft ({} rows)", state.draft.len());
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(Style::default().bg(Color::DarkGray));
    let selected = (!state.draft.is_empty()).then_some(state.editor_row);
    let mut table_state = TableState::default().with_selected(selected);
    frame.render_stateful_widget(table, sections[0], &mut table_state);

    let hint = match &state.input {
        Some(buf) => format!("{}: {buf}", state.editor_col.label()),
        None if state.draft.is_empty() => "Press a to add a prediction".to_string(),
        None => format!("Selected column: {}", state.editor_col.label()),
    };
    let input = Paragraph::new(hint).block(Block::default().title("Input").borders(Borders::ALL));
    frame.render_widget(input, sections[1]);
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No messages yet".to_string();
    }
    state
        .logs
        .iter()
        .rev()
        .take(4)
        .cloned()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 70, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Typer Terminal - Help",
        "",
        "Global:",
        "  1 / 2 / 3    Dashboard / Matches / Editor",
        "  Tab          Next screen",
        "  t            Cycle team filter",
        "  h            Home team only",
        "  g            Safe mode (hide results until picked)",
        "  r            Reload from data source",
        "  s            Save predictions",
        "  x            Export xlsx",
        "  ?            Toggle help",
        "  q            Quit",
        "",
        "Matches:",
        "  j/k or ↑/↓   Move",
        "  Enter / p    Pick this match in the editor",
        "",
        "Editor:",
        "  ←/→          Column",
        "  Enter / e    Edit cell",
        "  a / d        Add / delete row",
        "  u            Revert to saved predictions",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

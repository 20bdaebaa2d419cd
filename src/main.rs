use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use tracing::{error, info};

use nhl_explorer::assets;
use nhl_explorer::config::DashboardConfig;
use nhl_explorer::dashboard::{Dashboard, Field, Fragment, UpdateReport};
use nhl_explorer::export;
use nhl_explorer::logging;
use nhl_explorer::scoreboard::TeamCard;

mod chart_view;

const MAX_LOGS: usize = 200;

struct App {
    dashboard: Dashboard,
    focus: Field,
    logs: VecDeque<String>,
    help_overlay: bool,
    should_quit: bool,
    export_dir: PathBuf,
}

impl App {
    fn new(dashboard: Dashboard, export_dir: PathBuf) -> Self {
        let mut app = Self {
            dashboard,
            focus: Field::Team,
            logs: VecDeque::new(),
            help_overlay: false,
            should_quit: false,
            export_dir,
        };
        let teams = app.dashboard.team_options().len();
        let shots = app.dashboard.context().tables.shots.len();
        app.push_log(format!("[INFO] loaded {teams} teams, {shots} shot events"));
        app
    }

    fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.help_overlay = !self.help_overlay,
            KeyCode::Esc => self.help_overlay = false,
            KeyCode::Tab => self.move_focus(1),
            KeyCode::BackTab => self.move_focus(-1),
            KeyCode::Char('l') | KeyCode::Right => self.cycle_focused(1),
            KeyCode::Char('h') | KeyCode::Left => self.cycle_focused(-1),
            KeyCode::Char('x') | KeyCode::Char('X') => self.export_view(),
            _ => {}
        }
    }

    fn move_focus(&mut self, step: isize) {
        let len = Field::ALL.len() as isize;
        let pos = Field::ALL
            .iter()
            .position(|f| *f == self.focus)
            .unwrap_or(0) as isize;
        self.focus = Field::ALL[(pos + step).rem_euclid(len) as usize];
    }

    fn cycle_focused(&mut self, step: isize) {
        let report = self.dashboard.cycle(self.focus, step);
        self.note_report(&report);
    }

    fn note_report(&mut self, report: &UpdateReport) {
        for field in &report.reselected {
            let value = selection_label(&self.dashboard, *field);
            self.push_log(format!("[INFO] {} reset to {value}", field.label()));
        }
        for (fragment, msg) in &report.errors {
            self.push_log(format!("[WARN] {} unavailable: {msg}", fragment_label(*fragment)));
        }
    }

    fn export_view(&mut self) {
        if let Err(err) = std::fs::create_dir_all(&self.export_dir) {
            self.push_log(format!("[WARN] export dir unavailable: {err}"));
            return;
        }
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self.export_dir.join(format!("nhl_view_{stamp}.xlsx"));
        match export::export_view(&path, &self.dashboard) {
            Ok(report) => {
                info!(path = %path.display(), "view exported");
                self.push_log(format!(
                    "[INFO] exported {} ({} trend rows, {} shots, {} heatmap cells)",
                    path.display(),
                    report.trend_rows,
                    report.scatter_rows,
                    report.heatmap_cells
                ));
            }
            Err(err) => {
                error!("export failed: {err:#}");
                self.push_log(format!("[WARN] export failed: {err}"));
            }
        }
    }
}

fn main() -> Result<()> {
    let config = DashboardConfig::from_env();
    let _guard = logging::init_file_logging(&config.log_dir, "nhl_explorer.log")?;

    // Asset failures are fatal and reported before the terminal is taken over.
    let ctx = assets::load_context(&config.assets_dir).map_err(|err| {
        error!("startup failed: {err}");
        err
    })?;
    let dashboard = Dashboard::new(Arc::new(ctx), config.initial_selection())
        .context("build dashboard graph")?;
    let mut app = App::new(dashboard, config.export_dir.clone());

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, config.tick_rate);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("terminal loop failed: {err}");
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    tick_rate: Duration,
) -> io::Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.on_key(key);
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
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(12),
            Constraint::Min(10),
            Constraint::Length(5),
        ])
        .split(frame.size());

    let title = Paragraph::new("NHL - Game Explorer")
        .alignment(Alignment::Center)
        .style(Style::default().add_modifier(Modifier::BOLD));
    frame.render_widget(title, chunks[0]);

    render_selectors(frame, chunks[1], app);
    render_game_row(frame, chunks[2], &app.dashboard);
    render_chart_row(frame, chunks[3], &app.dashboard);

    let console = Paragraph::new(console_text(app))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[4]);

    if app.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn render_selectors(frame: &mut Frame, area: Rect, app: &App) {
    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(26),
            Constraint::Percentage(14),
            Constraint::Percentage(20),
            Constraint::Percentage(26),
            Constraint::Percentage(14),
        ])
        .split(area);

    for (field, cell) in Field::ALL.iter().zip(cells.iter()) {
        let focused = *field == app.focus;
        let border = if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let text = if focused {
            format!("< {} >", selection_label(&app.dashboard, *field))
        } else {
            selection_label(&app.dashboard, *field)
        };
        let widget = Paragraph::new(text).block(
            Block::default()
                .title(field.label())
                .borders(Borders::ALL)
                .border_style(border),
        );
        frame.render_widget(widget, *cell);
    }
}

fn render_game_row(frame: &mut Frame, area: Rect, dashboard: &Dashboard) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(60),
            Constraint::Percentage(20),
        ])
        .split(area);

    render_card(
        frame,
        cols[0],
        "Team",
        dashboard.card(Fragment::TeamCard),
        fragment_error(dashboard, Fragment::TeamCard),
    );

    let center = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(6)])
        .split(cols[1]);
    render_scoreboard(frame, center[0], dashboard);
    chart_view::render_xy_chart(
        frame,
        center[1],
        "Shots",
        dashboard.figure(Fragment::Scatter),
        fragment_error(dashboard, Fragment::Scatter),
    );

    render_card(
        frame,
        cols[2],
        "Opponent",
        dashboard.card(Fragment::OpponentCard),
        fragment_error(dashboard, Fragment::OpponentCard),
    );
}

fn render_chart_row(frame: &mut Frame, area: Rect, dashboard: &Dashboard) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    chart_view::render_heatmap(
        frame,
        cols[0],
        "Shot density",
        dashboard.figure(Fragment::Heatmap),
        fragment_error(dashboard, Fragment::Heatmap),
    );
    chart_view::render_xy_chart(
        frame,
        cols[1],
        "Goals per season",
        dashboard.figure(Fragment::GoalsTrend),
        fragment_error(dashboard, Fragment::GoalsTrend),
    );
}

fn render_card(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    card: Option<&TeamCard>,
    error: Option<&str>,
) {
    let (text, style) = match (card, error) {
        (_, Some(err)) => (err.to_string(), Style::default().fg(Color::Red)),
        (Some(card), None) => {
            let logo = card
                .logo
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            (
                format!("{}\n\n#{}\nlogo: {logo}", card.name, card.team_id),
                Style::default().add_modifier(Modifier::BOLD),
            )
        }
        (None, None) => ("-".to_string(), Style::default().fg(Color::DarkGray)),
    };
    let widget = Paragraph::new(text)
        .style(style)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().title(title.to_string()).borders(Borders::ALL));
    frame.render_widget(widget, area);
}

fn render_scoreboard(frame: &mut Frame, area: Rect, dashboard: &Dashboard) {
    let text = match dashboard.scoreboard() {
        Some(board) => {
            let venue = board.venue.as_deref().unwrap_or("venue unknown");
            format!("{}\nGame {} | {venue}", board.score_line(), board.game_id)
        }
        None => match fragment_error(dashboard, Fragment::Scoreboard) {
            Some(err) => err.to_string(),
            None => "pick a game for the score".to_string(),
        },
    };
    let widget = Paragraph::new(text)
        .alignment(Alignment::Center)
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::default().title("Score").borders(Borders::ALL));
    frame.render_widget(widget, area);
}

fn fragment_error(dashboard: &Dashboard, fragment: Fragment) -> Option<&str> {
    dashboard
        .fragment(fragment)
        .and_then(|state| state.error.as_deref())
}

fn selection_label(dashboard: &Dashboard, field: Field) -> String {
    let sel = dashboard.selection();
    let label = match field {
        Field::Team => sel.team.and_then(|team| {
            dashboard
                .team_options()
                .iter()
                .find(|o| o.value == team)
                .map(|o| o.label.clone())
        }),
        Field::Season => sel.season.map(|s| s.to_string()),
        Field::ShotType => sel.shot_type.clone(),
        Field::Game => sel.game.and_then(|game| {
            dashboard
                .game_options()
                .iter()
                .find(|o| o.value == game)
                .map(|o| o.label.clone())
        }),
        Field::Event => sel.event.map(|e| e.label().to_string()),
    };
    label.unwrap_or_else(|| "-".to_string())
}

fn fragment_label(fragment: Fragment) -> &'static str {
    match fragment {
        Fragment::SeasonOptions => "season list",
        Fragment::GameOptions => "game list",
        Fragment::TeamCard => "team card",
        Fragment::OpponentCard => "opponent card",
        Fragment::Scoreboard => "scoreboard",
        Fragment::GoalsTrend => "goals trend",
        Fragment::Heatmap => "heatmap",
        Fragment::Scatter => "shot scatter",
    }
}

fn console_text(app: &App) -> String {
    if app.logs.is_empty() {
        return "No messages yet".to_string();
    }
    app.logs
        .iter()
        .rev()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 50, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "NHL - Game Explorer - Help",
        "",
        "  Tab / Shift-Tab   Move between selectors",
        "  ←/→ or h/l        Change the focused selector",
        "  x                 Export the view to xlsx",
        "  ?                 Toggle help",
        "  q                 Quit",
        "",
        "Season and game lists follow the team; a game other",
        "than 'all' fills in the score and opponent.",
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

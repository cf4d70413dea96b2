use crate::client::AppSnapshot;
use color_eyre::eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use itertools::Itertools;
use khanate_client::map::{REGIONS, Region};
use ratatui::prelude::*;
use ratatui::widgets::*;
use std::io::stdout;
use unicode_width::UnicodeWidthStr;

pub enum UserEvent {
    Quit,
    NextOpponent,
    PrevOpponent,
    Battle,
    SpeedUp,
    LuckyBox,
    ConfirmCreate { name: String, region: Region },
    ConfirmTroops { archers: u64, cavalry: u64 },
    Redraw,
}

#[derive(Debug)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

impl Default for UiState {
    fn default() -> Self {
        UiState {
            mode: Mode::Normal,
            terminal: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
enum Mode {
    #[default]
    Normal,
    CreateModal(CreateState),
    TroopsModal(TroopsState),
    QuitModal,
}

#[derive(Clone, Debug)]
struct CreateState {
    name: String,
    region_idx: usize,
}

impl Default for CreateState {
    fn default() -> Self {
        CreateState { name: suggested_name(), region_idx: 0 }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum TroopField {
    #[default]
    Archers,
    Cavalry,
}

#[derive(Clone, Debug, Default)]
struct TroopsState {
    archers: u64,
    cavalry: u64,
    field: TroopField,
}

fn suggested_name() -> String {
    format!("{} Khanate", fakeit::name::last())
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    // Create a single persistent Terminal to preserve buffers across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub async fn next_event(state: &mut UiState) -> Result<UserEvent> {
    loop {
        if !event::poll(std::time::Duration::ZERO)? {
            tokio::time::sleep(std::time::Duration::from_millis(25)).await;
            continue;
        }
        let Event::Key(k) = event::read()? else { continue };
        if k.kind != KeyEventKind::Press { continue; }
        // Modal handling
        match &mut state.mode {
            Mode::CreateModal(cs) => {
                match k.code {
                    KeyCode::Esc => { state.mode = Mode::Normal; return Ok(UserEvent::Redraw); }
                    KeyCode::Enter => {
                        let name = cs.name.clone();
                        let region = REGIONS[cs.region_idx.min(REGIONS.len() - 1)];
                        state.mode = Mode::Normal;
                        return Ok(UserEvent::ConfirmCreate { name, region });
                    }
                    KeyCode::Up => { if cs.region_idx > 0 { cs.region_idx -= 1; } return Ok(UserEvent::Redraw); }
                    KeyCode::Down => { cs.region_idx = (cs.region_idx + 1).min(REGIONS.len() - 1); return Ok(UserEvent::Redraw); }
                    KeyCode::Tab => { cs.name = suggested_name(); return Ok(UserEvent::Redraw); }
                    KeyCode::Backspace => { cs.name.pop(); return Ok(UserEvent::Redraw); }
                    KeyCode::Char(c) => { cs.name.push(c); return Ok(UserEvent::Redraw); }
                    _ => {}
                }
            }
            Mode::TroopsModal(ts) => {
                let field = match ts.field {
                    TroopField::Archers => &mut ts.archers,
                    TroopField::Cavalry => &mut ts.cavalry,
                };
                match k.code {
                    KeyCode::Esc => { state.mode = Mode::Normal; return Ok(UserEvent::Redraw); }
                    KeyCode::Enter => {
                        let (archers, cavalry) = (ts.archers, ts.cavalry);
                        state.mode = Mode::Normal;
                        return Ok(UserEvent::ConfirmTroops { archers, cavalry });
                    }
                    KeyCode::Tab | KeyCode::Left | KeyCode::Right => {
                        ts.field = match ts.field {
                            TroopField::Archers => TroopField::Cavalry,
                            TroopField::Cavalry => TroopField::Archers,
                        };
                        return Ok(UserEvent::Redraw);
                    }
                    KeyCode::Up | KeyCode::Char('+') => { *field = field.saturating_add(1); return Ok(UserEvent::Redraw); }
                    KeyCode::Down | KeyCode::Char('-') => { *field = field.saturating_sub(1); return Ok(UserEvent::Redraw); }
                    KeyCode::Backspace => { *field /= 10; return Ok(UserEvent::Redraw); }
                    KeyCode::Char(c) if c.is_ascii_digit() => {
                        let d = u64::from(c.to_digit(10).unwrap_or(0));
                        *field = field.saturating_mul(10).saturating_add(d);
                        return Ok(UserEvent::Redraw);
                    }
                    _ => {}
                }
            }
            Mode::QuitModal => {
                match k.code {
                    KeyCode::Char('y') | KeyCode::Char('Y') => { return Ok(UserEvent::Quit); }
                    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => { state.mode = Mode::Normal; return Ok(UserEvent::Redraw); }
                    _ => {}
                }
            }
            Mode::Normal => {
                return Ok(match k.code {
                    KeyCode::Char('q') | KeyCode::Esc => { state.mode = Mode::QuitModal; UserEvent::Redraw }
                    KeyCode::Right => UserEvent::NextOpponent,
                    KeyCode::Left => UserEvent::PrevOpponent,
                    KeyCode::Char('b') => UserEvent::Battle,
                    KeyCode::Char('s') => UserEvent::SpeedUp,
                    KeyCode::Char('l') => UserEvent::LuckyBox,
                    KeyCode::Char('c') => { state.mode = Mode::CreateModal(CreateState::default()); UserEvent::Redraw }
                    KeyCode::Char('t') => { state.mode = Mode::TroopsModal(TroopsState::default()); UserEvent::Redraw }
                    _ => continue,
                });
            }
        }
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    // Clear the whole frame to avoid leftover fragments
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),  // status
            Constraint::Min(18),    // map + side panel
            Constraint::Length(8),  // errors + help + quote
        ])
        .split(f.area());

    draw_top(f, chunks[0], snap);
    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(chunks[1]);
    draw_map(f, middle[0], snap);
    draw_side(f, middle[1], snap);
    draw_bottom(f, chunks[2], snap);
    draw_modals(f, state);
}

fn draw_top(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let khanate_line = match &snap.khanate {
        Some(k) => format!(
            "{} | Lv {} ({} xp) | 🏹 {} archers | 🐎 {} cavalry",
            k.name, k.level, k.experience, k.archers, k.cavalry
        ),
        None => String::from("No Khanate yet; press c to found one"),
    };
    let gauge = Paragraph::new(format!(
        "Account: {:#x} | Balance: {} ETH\n{}\n{}",
        snap.account, snap.balance, khanate_line, snap.status
    ))
    .block(Block::default().borders(Borders::ALL).title("Khanate"));
    f.render_widget(gauge, area);
}

fn draw_map(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let block = Block::default().borders(Borders::ALL).title("Steppe Map");
    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.width < 8 || inner.height < 4 {
        return;
    }

    // Region outlines first, then khanate markers, then movements on top.
    for region in &REGIONS {
        place_marker(
            f,
            inner,
            region.x,
            region.y,
            &format!("· {}", region.name),
            Style::default().fg(Color::DarkGray),
        );
    }
    let mut foe_idx = 0;
    for opponent in &snap.opponents {
        let style = if opponent.is_self {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            let selected = foe_idx == snap.selected_opponent;
            foe_idx += 1;
            if selected {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            }
        };
        let tag = if opponent.is_self { "✦" } else { "⚑" };
        place_marker(
            f,
            inner,
            opponent.stats.location.x,
            opponent.stats.location.y,
            &format!("{tag} {}", opponent.stats.name),
            style,
        );
    }
    for movement in &snap.movements {
        let x = lerp(movement.origin.x, movement.destination.x, movement.progress);
        let y = lerp(movement.origin.y, movement.destination.y, movement.progress);
        place_marker(
            f,
            inner,
            x,
            y,
            &format!("⚔ {}s", movement.remaining_secs),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        );
    }
}

fn lerp(from: u8, to: u8, progress: f64) -> u8 {
    let value = f64::from(from) + (f64::from(to) - f64::from(from)) * progress;
    value.round().clamp(0.0, 100.0) as u8
}

/// Renders a one-line label at map coordinates scaled into `area`.
fn place_marker(f: &mut Frame, area: Rect, x: u8, y: u8, label: &str, style: Style) {
    let label_width = label.width() as u16;
    let max_x = area.width.saturating_sub(label_width.min(area.width));
    let col = area.x
        + ((u32::from(x.min(100)) * u32::from(max_x)) / 100) as u16;
    let row = area.y
        + ((u32::from(y.min(100)) * u32::from(area.height.saturating_sub(1))) / 100) as u16;
    let width = label_width.min(area.width.saturating_sub(col - area.x));
    if width == 0 {
        return;
    }
    let rect = Rect::new(col, row, width, 1);
    f.render_widget(Paragraph::new(label.to_string()).style(style), rect);
}

fn draw_side(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::styled("Opponents", Style::default().add_modifier(Modifier::BOLD)));
    let foes: Vec<_> = snap.opponents.iter().filter(|o| !o.is_self).collect();
    if foes.is_empty() {
        lines.push(Line::from("  None discovered yet"));
    } else {
        for (i, foe) in foes.iter().enumerate() {
            let cursor = if i == snap.selected_opponent { ">" } else { " " };
            let region = foe.region_name.unwrap_or("the wilds");
            let eta = foe
                .estimated_march_ms
                .map(|ms| format!(" ~{}s march", ms.div_ceil(1000)))
                .unwrap_or_default();
            lines.push(Line::from(format!(
                "{} {} ({}){}",
                cursor, foe.stats.name, region, eta
            )));
        }
    }

    lines.push(Line::from(""));
    lines.push(Line::styled("Troop Movements", Style::default().add_modifier(Modifier::BOLD)));
    if snap.movements.is_empty() {
        lines.push(Line::from("  None"));
    } else {
        for m in &snap.movements {
            lines.push(Line::from(format!(
                "  {} battle {} | {}s left (s to speed up)",
                m.movement_id, m.battle_id, m.remaining_secs
            )));
        }
    }
    if !snap.active_battles.is_empty() {
        lines.push(Line::from(format!(
            "  {} battle(s) pending on chain",
            snap.active_battles.len()
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::styled("Achievements", Style::default().add_modifier(Modifier::BOLD)));
    let earned = snap
        .achievements
        .iter()
        .map(|(a, unlocked)| {
            if *unlocked {
                format!("🏆 {}", a.title())
            } else {
                format!("🔒 {}", a.title())
            }
        })
        .join("  ");
    lines.push(Line::from(format!("  {earned}")));

    lines.push(Line::from(""));
    lines.push(Line::styled("Batyrs", Style::default().add_modifier(Modifier::BOLD)));
    if snap.batyrs.is_empty() {
        lines.push(Line::from("  None; try a lucky box (l)"));
    } else {
        for (id, batyr) in &snap.batyrs {
            lines.push(Line::from(format!(
                "  #{id} {} | {} (🏹+{}% 🐎+{}%)",
                batyr.name,
                batyr.ability,
                batyr.archer_bonus.saturating_sub(100),
                batyr.cavalry_bonus.saturating_sub(100),
            )));
        }
    }

    let side = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Horde"));
    f.render_widget(side, area);
}

fn draw_bottom(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Length(4)])
        .split(area);

    let mut lines: Vec<Line> = Vec::new();
    if snap.errors.is_empty() {
        lines.push(Line::from("No errors"));
    } else {
        for e in &snap.errors {
            lines.push(Line::from(e.clone()));
        }
    }
    let color = if snap.errors.is_empty() { Color::Green } else { Color::Red };
    let errors = Paragraph::new(lines)
        .style(Style::default().fg(color))
        .block(Block::default().borders(Borders::ALL).title("Errors"));
    f.render_widget(errors, chunks[0]);

    let help = Paragraph::new(format!(
        "←/→ select foe | b battle | s speed up | t troops | l lucky box | c create | q/Esc quit\n{}",
        snap.quote
    ))
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, chunks[1]);
}

fn draw_modals(f: &mut Frame, state: &UiState) {
    match &state.mode {
        Mode::CreateModal(cs) => {
            let area = centered_rect(60, 60, f.area());
            let block = Block::default().borders(Borders::ALL).title("Found a Khanate");
            let mut lines = vec![
                Line::from(format!("Name: {}_", cs.name)),
                Line::from("Tab suggests a name; type to edit"),
                Line::from(""),
                Line::from("Choose a region (↑/↓):"),
            ];
            for (i, region) in REGIONS.iter().enumerate() {
                let cursor = if i == cs.region_idx { ">" } else { " " };
                lines.push(Line::from(format!(
                    "{} {}: {}",
                    cursor, region.name, region.description
                )));
            }
            lines.push(Line::from("Enter=found Esc=cancel"));
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(Paragraph::new(lines), block.inner(area));
        }
        Mode::TroopsModal(ts) => {
            let area = centered_rect(50, 40, f.area());
            let block = Block::default().borders(Borders::ALL).title("Recruit Troops");
            let archer_cursor = if ts.field == TroopField::Archers { ">" } else { " " };
            let cavalry_cursor = if ts.field == TroopField::Cavalry { ">" } else { " " };
            let total_eth = (ts.archers as f64) * 0.01 + (ts.cavalry as f64) * 0.02;
            let p = Paragraph::new(format!(
                "{archer_cursor} Archers: {} (0.01 ETH each)\n{cavalry_cursor} Cavalry: {} (0.02 ETH each)\nTotal: {:.3} ETH\nTab switch | digits edit | Enter=buy Esc=cancel",
                ts.archers, ts.cavalry, total_eth
            ));
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Abandon the steppe? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}

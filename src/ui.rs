use crate::client::{AppSnapshot, Screen};
use chrono::{DateTime, Utc};
use color_eyre::eyre::{Result, eyre};
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use itertools::Itertools;
use ratatui::{prelude::*, widgets::*};
use std::io::stdout;
use unicode_width::UnicodeWidthStr;

pub enum UserEvent {
    Quit,
    Redraw,
    Connect,
    Disconnect,
    ShowWallet,
    ShowContest,
    ShowWinners,
    Refresh,
    Vote(usize),
    ConfirmSubmit { prompt: String },
    Reload,
}

#[derive(Debug)]
pub struct UiState {
    mode: Mode,
    selected_submission: usize,
    submission_count: usize,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

impl Default for UiState {
    fn default() -> Self {
        UiState {
            mode: Mode::Normal,
            selected_submission: 0,
            submission_count: 0,
            terminal: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
enum Mode {
    #[default]
    Normal,
    SubmitModal(SubmitState),
    QuitModal,
}

#[derive(Clone, Debug, Default)]
struct SubmitState {
    prompt: String,
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    // One persistent terminal so buffers survive between draws.
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub type InputEventReceiver = EventStream;

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(stream: &mut InputEventReceiver) -> Result<Event> {
    match stream.next().await {
        Some(Ok(event)) => Ok(event),
        Some(Err(err)) => Err(err.into()),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let Event::Key(key) = event else {
        return Some(UserEvent::Redraw);
    };
    if key.kind != KeyEventKind::Press {
        return None;
    }

    match &mut state.mode {
        Mode::SubmitModal(submit) => match key.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let prompt = submit.prompt.trim().to_owned();
                if prompt.is_empty() {
                    return Some(UserEvent::Redraw);
                }
                state.mode = Mode::Normal;
                Some(UserEvent::ConfirmSubmit { prompt })
            }
            KeyCode::Backspace => {
                submit.prompt.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) => {
                submit.prompt.push(c);
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::QuitModal => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.mode = Mode::QuitModal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('1') => Some(UserEvent::ShowWallet),
            KeyCode::Char('2') => Some(UserEvent::ShowContest),
            KeyCode::Char('3') => Some(UserEvent::ShowWinners),
            KeyCode::Char('c') => Some(UserEvent::Connect),
            KeyCode::Char('d') => Some(UserEvent::Disconnect),
            KeyCode::Char('r') => Some(UserEvent::Refresh),
            KeyCode::Char('R') => Some(UserEvent::Reload),
            KeyCode::Up | KeyCode::Char('k') => {
                state.selected_submission = state.selected_submission.saturating_sub(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let max = state.submission_count.saturating_sub(1);
                state.selected_submission = (state.selected_submission + 1).min(max);
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('v') => Some(UserEvent::Vote(state.selected_submission)),
            KeyCode::Char('s') => {
                state.mode = Mode::SubmitModal(SubmitState::default());
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
    }
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    state.submission_count = snap
        .contest
        .as_ref()
        .map(|contest| contest.snapshot.submissions.len())
        .unwrap_or(0);
    if state.submission_count == 0 {
        state.selected_submission = 0;
    } else {
        state.selected_submission = state
            .selected_submission
            .min(state.submission_count - 1);
    }
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title bar
            Constraint::Min(10),   // screen body
            Constraint::Length(6), // status/errors
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_title(f, chunks[0], snap);
    match snap.screen {
        Screen::Wallet => draw_wallet_card(f, chunks[1], snap),
        Screen::Contest => draw_contest(f, state, chunks[1], snap),
        Screen::Winners => draw_winners(f, chunks[1], snap),
    }
    draw_status(f, chunks[2], snap);
    draw_help(f, chunks[3], snap);
    draw_modals(f, state);
}

fn draw_title(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let account = match &snap.account {
        Some(account) => truncate_address(account),
        None => String::from("not connected"),
    };
    let text = format!(
        "Music Mural | {} | Account: {}",
        snap.target.chain_name, account
    );
    let widget = Paragraph::new(text)
        .style(Style::default().fg(Color::Magenta))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(widget, area);
}

fn draw_wallet_card(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let card = centered_rect(60, 60, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Connect Wallet");

    let mut lines: Vec<Line> = Vec::new();
    match &snap.account {
        Some(account) => {
            lines.push(Line::from(format!(
                "Address: {}",
                truncate_address(account)
            )));
            if let Some(chain_id) = &snap.chain_id {
                lines.push(Line::from(format!("ChainId: {chain_id}")));
            }
            if !snap.on_target_chain {
                lines.push(Line::styled(
                    format!("Switching to {}", snap.target.chain_name),
                    Style::default().fg(Color::Yellow),
                ));
            }
            lines.push(Line::from(""));
            lines.push(Line::from("d: Disconnect Wallet"));
        }
        None => {
            lines.push(Line::from("Connect your wallet to get started"));
            lines.push(Line::from(""));
            lines.push(Line::from(format!(
                "Network: {} ({})",
                snap.target.chain_name,
                snap.target.rpc_urls.iter().join(", ")
            )));
            lines.push(Line::from(""));
            lines.push(Line::from("c: Connect Wallet"));
        }
    }

    let widget = Paragraph::new(lines).wrap(Wrap { trim: false });
    f.render_widget(Clear, card);
    f.render_widget(&block, card);
    f.render_widget(widget, block.inner(card));
}

fn draw_contest(f: &mut Frame, state: &UiState, area: Rect, snap: &AppSnapshot) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Min(5)])
        .split(area);

    let Some(contest) = &snap.contest else {
        let widget = Paragraph::new("Loading contest...").block(
            Block::default()
                .borders(Borders::ALL)
                .title("Today's Music Mural"),
        );
        f.render_widget(widget, area);
        return;
    };

    let theme = contest.theme().unwrap_or("Open");
    let symbol = &snap.target.native_currency.symbol;
    let decimals = snap.target.native_currency.decimals;
    let overview = vec![
        Line::from(format!("Theme: {theme}")),
        Line::from(format!(
            "Ends in: {}",
            format_countdown(contest.remaining_ms(snap.now_ms))
        )),
        Line::from(format!(
            "Total Submissions: {}",
            contest.snapshot.submissions.len()
        )),
        Line::from(format!("Total Votes: {}", contest.snapshot.total_votes)),
        Line::from(format!(
            "Total Funds: {} {symbol}",
            contest.snapshot.total_funds.format_units(decimals)
        )),
    ];
    let widget = Paragraph::new(overview).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Today's Music Mural"),
    );
    f.render_widget(widget, rows[0]);

    if contest.snapshot.submissions.is_empty() {
        let empty = Paragraph::new(vec![
            Line::from(""),
            Line::styled(
                "No Submissions Yet!",
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Line::from("Submit your track and be the first to set the theme!"),
        ])
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Submissions"));
        f.render_widget(empty, rows[1]);
        return;
    }

    let can_vote = contest.can_vote(snap.account.as_deref());
    let width = rows[1].width.saturating_sub(6) as usize;
    let items: Vec<ListItem> = contest
        .snapshot
        .submissions
        .iter()
        .enumerate()
        .map(|(index, submission)| {
            let vote_label = if can_vote { "[v] Vote" } else { "Already Voted" };
            let lines = vec![
                Line::styled(
                    format!(
                        "Submission {} — {}",
                        index + 1,
                        truncate_address(&submission.submitter)
                    ),
                    Style::default().fg(Color::Magenta),
                ),
                Line::from(format!("  {}", fit_width(&submission.music_url, width))),
                Line::styled(
                    format!("  {vote_label}"),
                    if can_vote {
                        Style::default().fg(Color::Green)
                    } else {
                        Style::default().fg(Color::DarkGray)
                    },
                ),
            ];
            ListItem::new(lines)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Submissions"))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    let mut list_state = ListState::default();
    list_state.select(Some(state.selected_submission));
    f.render_stateful_widget(list, rows[1], &mut list_state);
}

fn draw_winners(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Here's What Won Last Time");

    let Some(results) = &snap.winners else {
        let widget = Paragraph::new("Loading past contests...").block(block);
        f.render_widget(widget, area);
        return;
    };

    if results.is_empty() {
        let widget = Paragraph::new(vec![
            Line::from(""),
            Line::styled(
                "No Contests Yet",
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Line::from("There are no contests to show yet. Check back later."),
        ])
        .alignment(Alignment::Center)
        .block(block);
        f.render_widget(widget, area);
        return;
    }

    let symbol = &snap.target.native_currency.symbol;
    let decimals = snap.target.native_currency.decimals;
    let width = area.width.saturating_sub(8) as usize;
    let mut lines: Vec<Line> = Vec::new();
    for result in results {
        lines.push(Line::styled(
            format!("🏆 {}", result.theme),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
        lines.push(Line::from(format!(
            "  {} | Voter Share: {} {symbol}",
            format_date(result.timestamp),
            result.voter_share.format_units(decimals)
        )));
        for (index, winner) in result.winners.iter().enumerate() {
            lines.push(Line::from(format!(
                "  Winner {}: {}",
                index + 1,
                truncate_address(&winner.submitter)
            )));
            lines.push(Line::styled(
                format!("    Prompt: {}", fit_width(&winner.prompt, width)),
                Style::default().fg(Color::DarkGray),
            ));
            lines.push(Line::from(format!(
                "    {}",
                fit_width(&winner.music_url, width)
            )));
            lines.push(Line::from(format!(
                "    Votes: {} | Payout: {} {symbol}",
                winner.votes,
                winner.payout.format_units(decimals)
            )));
        }
        lines.push(Line::from(""));
    }
    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(block);
    f.render_widget(widget, area);
}

fn draw_status(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let widget = if snap.errors.is_empty() {
        let status = if snap.status.trim().is_empty() {
            "Ready"
        } else {
            snap.status.as_str()
        };
        Paragraph::new(status)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Green))
    } else {
        let mut lines: Vec<Line> = snap
            .errors
            .iter()
            .map(|error| Line::from(error.clone()))
            .collect();
        lines.push(Line::from("Press R to reload"));
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Error"))
            .style(Style::default().fg(Color::Red))
    };
    f.render_widget(widget, area);
}

fn draw_help(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let help = match snap.screen {
        Screen::Wallet => "c connect | d disconnect | 2 contest | 3 winners | q quit",
        Screen::Contest => {
            if snap.media_available {
                "↑/↓ select | v vote | s submit track | r refresh | 1 wallet | 3 winners | q quit"
            } else {
                "↑/↓ select | v vote | r refresh | 1 wallet | 3 winners | q quit"
            }
        }
        Screen::Winners => "r refresh | 1 wallet | 2 contest | q quit",
    };
    let widget =
        Paragraph::new(help).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(widget, area);
}

fn draw_modals(f: &mut Frame, state: &UiState) {
    match &state.mode {
        Mode::SubmitModal(submit) => {
            let area = centered_rect(60, 30, f.area());
            let block = Block::default()
                .borders(Borders::ALL)
                .title("Submit a Track");
            let text = format!(
                "Describe the track to generate:\n> {}\n\nEnter=submit Esc=cancel",
                submit.prompt
            );
            f.render_widget(Clear, area);
            f.render_widget(&block, area);
            f.render_widget(Paragraph::new(text).wrap(Wrap { trim: false }), block.inner(area));
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let widget = Paragraph::new("Leave the contest? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(&block, area);
            f.render_widget(widget, block.inner(area));
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

/// Remaining time as HH:MM:SS, floored at zero by the caller's
/// saturating subtraction.
pub fn format_countdown(remaining_ms: u64) -> String {
    let total_seconds = remaining_ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

pub fn truncate_address(address: &str) -> String {
    if address.len() <= 13 {
        return address.to_owned();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 6..])
}

fn format_date(timestamp: u64) -> String {
    match DateTime::<Utc>::from_timestamp(timestamp as i64, 0) {
        Some(date) => date.format("%B %-d, %Y").to_string(),
        None => String::from("unknown date"),
    }
}

fn fit_width(text: &str, max: usize) -> String {
    if max == 0 || text.width() <= max {
        return text.to_owned();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_countdown__renders_hours_minutes_seconds() {
        assert_eq!(format_countdown(3_661_000), "01:01:01");
    }

    #[test]
    fn format_countdown__floors_at_zero() {
        let ends_at: u64 = 1_000;
        let now: u64 = 5_000;
        assert_eq!(format_countdown(ends_at.saturating_sub(now)), "00:00:00");
    }

    #[test]
    fn truncate_address__keeps_both_ends() {
        let address = "0x7f460A9B660ce4bC7e87ECd130DdB544360CE90e";
        assert_eq!(truncate_address(address), "0x7f46...0CE90e");
    }

    #[test]
    fn fit_width__truncates_on_display_width() {
        assert_eq!(fit_width("short", 20), "short");
        let fitted = fit_width("https://media.example/a-very-long-track-name.mp3", 20);
        assert!(fitted.ends_with('…'));
        assert!(fitted.width() <= 20);
    }
}

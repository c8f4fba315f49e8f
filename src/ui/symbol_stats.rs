use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use abc_tutor::{stats::UserProfile, Category};

use crate::{App, SortBy};

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolRow {
    pub symbol: char,
    pub correct: u32,
    pub attempts: u32,
    pub success_rate: Option<f64>,
    pub mastered: bool,
}

pub fn rows_for(profile: &UserProfile, category: Category) -> Vec<SymbolRow> {
    profile
        .stats(category)
        .iter()
        .map(|(symbol, stat)| SymbolRow {
            symbol: *symbol,
            correct: stat.correct,
            attempts: stat.attempts,
            success_rate: stat.success_rate(),
            mastered: stat.is_mastered(),
        })
        .collect()
}

pub fn sort_rows(rows: &mut [SymbolRow], sort_by: &SortBy, ascending: bool) {
    rows.sort_by(|a, b| {
        let cmp = match sort_by {
            SortBy::Symbol => a.symbol.cmp(&b.symbol),
            // never-asked symbols sort below every observed rate
            SortBy::SuccessRate => a
                .success_rate
                .unwrap_or(-1.0)
                .total_cmp(&b.success_rate.unwrap_or(-1.0)),
            SortBy::Attempts => a.attempts.cmp(&b.attempts),
        };
        if ascending {
            cmp
        } else {
            cmp.reverse()
        }
    });
}

pub fn present_row(row: &SymbolRow) -> Row<'static> {
    let (rate_display, rate_color) = match row.success_rate {
        None => ("—".to_string(), Color::DarkGray),
        Some(rate) => {
            let color = if row.mastered {
                Color::Green
            } else if rate >= 0.4 {
                Color::Yellow
            } else {
                Color::Red
            };
            (format!("{:.0}%", rate * 100.0), color)
        }
    };

    Row::new(vec![
        Cell::from(row.symbol.to_string()).style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from(row.correct.to_string()),
        Cell::from(row.attempts.to_string()),
        Cell::from(rate_display).style(Style::default().fg(rate_color)),
        Cell::from(if row.mastered { "✓" } else { "" })
            .style(Style::default().fg(Color::Green)),
    ])
}

pub fn render_symbol_stats(app: &mut App, f: &mut Frame) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(2),
        ])
        .split(area);

    let direction = if app.stats_state.sort_ascending {
        "↑"
    } else {
        "↓"
    };
    let sort_label = match app.stats_state.sort_by {
        SortBy::Symbol => "symbole",
        SortBy::SuccessRate => "réussite",
        SortBy::Attempts => "essais",
    };

    let Some((title_text, mut rows)) = app.stats_source().map(|(profile, category)| {
        let progress = profile.progress(category);
        let title = format!(
            "{} · {} · {}/{} maîtrisés (tri : {sort_label} {direction})",
            profile.name, category, progress.mastered, progress.total
        );
        (title, rows_for(profile, category))
    }) else {
        f.render_widget(
            Paragraph::new("Pas de statistiques en mode lecture").alignment(Alignment::Center),
            chunks[1],
        );
        return;
    };

    let title = Paragraph::new(title_text)
        .block(Block::default().borders(Borders::ALL).title("Stats"))
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    sort_rows(&mut rows, &app.stats_state.sort_by, app.stats_state.sort_ascending);

    // borders plus header
    let visible = chunks[1].height.saturating_sub(3) as usize;
    let max_scroll = rows.len().saturating_sub(visible);
    if app.stats_state.scroll_offset > max_scroll {
        app.stats_state.scroll_offset = max_scroll;
    }

    let header = Row::new(vec!["Symbole", "Correct", "Essais", "Réussite", "Maîtrisé"]).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );
    let body: Vec<Row> = rows
        .iter()
        .skip(app.stats_state.scroll_offset)
        .take(visible)
        .map(present_row)
        .collect();

    let table = Table::new(
        body,
        [
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Length(9),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(table, chunks[1]);

    let help = Paragraph::new("(1) symbole (2) réussite (3) essais (espace) inverser / (↑↓) défiler / (tab) retour")
        .style(Style::default().add_modifier(Modifier::ITALIC))
        .alignment(Alignment::Center);
    f.render_widget(help, chunks[2]);
}

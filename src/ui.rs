pub mod screen;
pub mod symbol_stats;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap},
};

use abc_tutor::{
    messages,
    policy::Question,
    reading::{ReadingController, ReadingState},
    session::{AnswerResult, Presenter},
    stats::Progress,
    Category,
};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

/// What the quiz screen shows; fed by the session controller
#[derive(Debug, Default)]
pub struct QuizView {
    pub category: Option<Category>,
    pub question: Option<Question>,
    pub result: Option<AnswerResult>,
    pub progress: Option<Progress>,
    pub status: Option<String>,
    pub selected: usize,
    pub can_listen: bool,
}

impl QuizView {
    pub fn new(can_listen: bool) -> Self {
        Self {
            can_listen,
            ..Self::default()
        }
    }

    pub fn select_next(&mut self) {
        if let Some(q) = &self.question {
            self.selected = (self.selected + 1) % q.choices.len();
        }
    }

    pub fn select_previous(&mut self) {
        if let Some(q) = &self.question {
            let len = q.choices.len();
            self.selected = (self.selected + len - 1) % len;
        }
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    fn choice_style(&self, index: usize, symbol: char) -> Style {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        match &self.result {
            Some(result) if result.symbol == symbol => bold.fg(Color::Green),
            Some(result) if result.chosen == symbol => bold.fg(Color::Red),
            Some(_) => bold.add_modifier(Modifier::DIM),
            None if index == self.selected => bold.fg(Color::Yellow),
            None => bold,
        }
    }

    fn legend(&self) -> &'static str {
        if self.can_listen {
            "(←/→ entrée) choisir / (espace) parler / (↑) répéter / (tab) stats / (esc) quitter"
        } else {
            "(←/→ entrée) choisir / (↑) répéter / (tab) stats / (esc) quitter"
        }
    }
}

impl Presenter for QuizView {
    fn present_question(&mut self, category: Category, question: &Question) {
        self.category = Some(category);
        self.question = Some(question.clone());
        self.result = None;
        self.status = None;
        self.selected = 0;
    }

    fn show_result(&mut self, result: &AnswerResult) {
        self.status = Some(result.message.clone());
        self.result = Some(result.clone());
    }

    fn show_progress(&mut self, progress: Progress) {
        self.progress = Some(progress);
    }

    fn show_retry(&mut self, message: &str) {
        self.status = Some(message.to_string());
    }

    fn show_listening(&mut self) {
        self.status = Some(messages::LISTENING.to_string());
    }
}

impl Widget for &QuizView {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(2), // prompt
                Constraint::Min(5),    // choices
                Constraint::Length(2), // status
                Constraint::Length(1), // progress
                Constraint::Length(1), // padding
                Constraint::Length(1), // legend
            ])
            .split(area);

        let prompt = match self.category {
            Some(Category::Letters) => "Quelle lettre entends-tu ?",
            Some(Category::Digits) => "Quel chiffre entends-tu ?",
            None => "",
        };
        Paragraph::new(Span::styled(prompt, bold_style.fg(Color::Cyan)))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        if let Some(question) = &self.question {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(
                    question
                        .choices
                        .iter()
                        .map(|_| Constraint::Ratio(1, question.choices.len() as u32)),
                )
                .split(chunks[1]);

            for (index, (symbol, column)) in question.choices.iter().zip(columns.iter()).enumerate()
            {
                let style = self.choice_style(index, *symbol);
                let inner_height = column.height.saturating_sub(2);
                let mut lines = vec![Line::from(""); (inner_height / 2) as usize];
                lines.push(Line::from(Span::styled(symbol.to_string(), style)));
                Paragraph::new(lines)
                    .alignment(Alignment::Center)
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .border_style(style)
                            .title(format!(" {} ", index + 1)),
                    )
                    .render(*column, buf);
            }
        }

        if let Some(status) = &self.status {
            let color = match &self.result {
                Some(r) if r.correct => Color::Green,
                Some(_) => Color::Red,
                None => Color::Yellow,
            };
            Paragraph::new(Span::styled(status.as_str(), bold_style.fg(color)))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .render(chunks[2], buf);
        }

        if let Some(progress) = self.progress {
            Gauge::default()
                .gauge_style(Style::default().fg(Color::Magenta))
                .ratio(progress.ratio().clamp(0.0, 1.0))
                .label(format!("{}/{} maîtrisés", progress.mastered, progress.total))
                .render(chunks[3], buf);
        }

        Paragraph::new(Span::styled(self.legend(), italic_style)).render(chunks[5], buf);
    }
}

/// The current sentence with the word to read highlighted
pub struct ReadingView<'r, 'a>(pub &'r ReadingController<'a>);

impl Widget for ReadingView<'_, '_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let reading = self.0;
        let session = reading.session();
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_bold_style = bold_style.add_modifier(Modifier::DIM);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(3),
                Constraint::Length(2),
                Constraint::Length(1),
            ])
            .split(area);

        Paragraph::new(Span::styled(
            session.reading().title.as_str(),
            bold_style.fg(Color::Cyan),
        ))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

        if reading.state() != ReadingState::Finished {
            let spans: Vec<Span> = session
                .words()
                .iter()
                .enumerate()
                .flat_map(|(i, word)| {
                    let style = if i == session.word_index() {
                        bold_style.fg(Color::Red).add_modifier(Modifier::UNDERLINED)
                    } else if i < session.word_index() {
                        bold_style.fg(Color::Green)
                    } else {
                        dim_bold_style
                    };
                    [Span::styled(word.as_str(), style), Span::raw(" ")]
                })
                .collect();
            Paragraph::new(Line::from(spans))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .render(chunks[1], buf);
        }

        if let Some(feedback) = reading.feedback() {
            Paragraph::new(Span::styled(feedback, bold_style.fg(Color::Yellow)))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .render(chunks[2], buf);
        }

        let legend = if reading.can_listen() {
            "(espace) lire / (entrée) mot suivant / (↑) répéter / (esc) quitter"
        } else {
            "(entrée) mot suivant / (↑) répéter / (esc) quitter"
        };
        Paragraph::new(Span::styled(
            legend,
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .render(chunks[3], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(buffer: &Buffer) -> String {
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    fn question() -> Question {
        Question {
            symbol: 'K',
            choices: vec!['B', 'K', 'Q', 'X'],
            correct_index: 1,
        }
    }

    #[test]
    fn quiz_shows_every_choice() {
        let mut view = QuizView::new(false);
        view.present_question(Category::Letters, &question());
        view.show_progress(Progress {
            mastered: 3,
            total: 26,
        });

        let area = Rect::new(0, 0, 80, 24);
        let mut buffer = Buffer::empty(area);
        (&view).render(area, &mut buffer);

        let text = rendered(&buffer);
        for c in ['B', 'K', 'Q', 'X'] {
            assert!(text.contains(c));
        }
        assert!(text.contains("3/26"));
        assert!(!text.contains("parler"));
    }

    #[test]
    fn result_colours_right_and_wrong_choices() {
        let mut view = QuizView::new(true);
        view.present_question(Category::Letters, &question());
        view.show_result(&AnswerResult {
            symbol: 'K',
            chosen: 'Q',
            correct: false,
            message: messages::incorrect(Category::Letters, 'K'),
        });

        let bold = Style::default().add_modifier(Modifier::BOLD);
        assert_eq!(view.choice_style(1, 'K'), bold.fg(Color::Green));
        assert_eq!(view.choice_style(2, 'Q'), bold.fg(Color::Red));
        assert_eq!(view.status.as_deref(), Some("Dommage ! C'est la lettre K."));
    }

    #[test]
    fn selection_wraps_around() {
        let mut view = QuizView::new(false);
        view.present_question(Category::Digits, &question());
        view.select_previous();
        assert_eq!(view.selected, 3);
        view.select_next();
        assert_eq!(view.selected, 0);
    }

    #[test]
    fn tiny_area_does_not_panic() {
        let mut view = QuizView::new(true);
        view.present_question(Category::Letters, &question());
        let area = Rect::new(0, 0, 20, 5);
        let mut buffer = Buffer::empty(area);
        (&view).render(area, &mut buffer);
        assert_eq!(*buffer.area(), area);
    }
}

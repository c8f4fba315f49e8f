use ratatui::Frame;

use crate::{ui::symbol_stats::render_symbol_stats, Activity, App, AppState};

use super::ReadingView;

/// One full-screen view of the app
pub trait Screen {
    fn render(&self, app: &mut App, f: &mut Frame);
}

/// Quiz or reading, whichever is running
pub struct PracticeScreen;

impl Screen for PracticeScreen {
    fn render(&self, app: &mut App, f: &mut Frame) {
        let area = f.area();
        match &app.activity {
            Activity::Quiz(session) => f.render_widget(session.presenter(), area),
            Activity::Reading(reading) => f.render_widget(ReadingView(reading), area),
        }
    }
}

pub struct StatsScreen;

impl Screen for StatsScreen {
    fn render(&self, app: &mut App, f: &mut Frame) {
        render_symbol_stats(app, f);
    }
}

pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Practice => Box::new(PracticeScreen),
        AppState::Stats => Box::new(StatsScreen),
    }
}

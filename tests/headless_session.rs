use std::sync::mpsc;
use std::time::{Duration, Instant};

use abc_tutor::config::Config;
use abc_tutor::history::HistoryLog;
use abc_tutor::policy::Question;
use abc_tutor::runtime::{FixedTicker, Runner, TestEventSource, TutorEvent};
use abc_tutor::session::{AnswerResult, Presenter, SessionController, SessionState, TutorContext};
use abc_tutor::speech::RecordingSpeaker;
use abc_tutor::stats::Progress;
use abc_tutor::store::{JsonProfileStore, ProfileStore};
use abc_tutor::writer::ProfileWriter;
use abc_tutor::Category;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::tempdir;

#[derive(Default)]
struct Screen {
    questions: Vec<Question>,
    results: Vec<AnswerResult>,
    progress: Option<Progress>,
}

impl Presenter for Screen {
    fn present_question(&mut self, _category: Category, question: &Question) {
        self.questions.push(question.clone());
    }

    fn show_result(&mut self, result: &AnswerResult) {
        self.results.push(result.clone());
    }

    fn show_progress(&mut self, progress: Progress) {
        self.progress = Some(progress);
    }
}

fn context(store: JsonProfileStore, speaker: &RecordingSpeaker) -> TutorContext {
    let profiles = store.load().unwrap();
    let config = Config {
        feedback_delay_ms: 0,
        ..Config::default()
    };
    TutorContext::new(
        config,
        profiles,
        ProfileWriter::spawn(store),
        Box::new(speaker.clone()),
    )
}

fn key(c: char) -> TutorEvent {
    TutorEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
}

// Drives a digits session through Runner/TestEventSource without a TTY:
// each key names a digit, ticks move on to the next question.
#[test]
fn keyboard_session_persists_and_logs_history() {
    let dir = tempdir().unwrap();
    let profiles_path = dir.path().join("profiles.json");
    let history_path = dir.path().join("history.csv");
    let speaker = RecordingSpeaker::new();

    let mut ctx = context(JsonProfileStore::with_path(&profiles_path), &speaker)
        .with_history(HistoryLog::with_path(&history_path));
    assert!(ctx.create_profile("Léa"));

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(2)),
    );

    let mut session = SessionController::with_rng(
        &mut ctx,
        "Léa",
        Category::Digits,
        Screen::default(),
        StdRng::seed_from_u64(99),
    )
    .unwrap();
    session.start().unwrap();

    let mut answered = 0;
    for _ in 0..500u32 {
        if answered == 6 {
            break;
        }
        // answer the asked digit on odd turns, a wrong offered digit otherwise
        if session.state() == SessionState::AwaitingAnswer {
            let question = session.question().unwrap();
            let typed = if answered % 2 == 1 {
                question.symbol
            } else {
                question.choices[(question.correct_index + 1) % question.choices.len()]
            };
            tx.send(key(typed)).unwrap();
        }
        match runner.step() {
            TutorEvent::Key(KeyEvent {
                code: KeyCode::Char(c),
                ..
            }) => {
                if session.submit_symbol(c).unwrap().is_some() {
                    answered += 1;
                }
            }
            TutorEvent::Tick => {
                session.poll(Instant::now()).unwrap();
            }
            _ => {}
        }
    }
    assert_eq!(answered, 6);

    let results = session.presenter().results.clone();
    assert_eq!(results.iter().filter(|r| r.correct).count(), 3);
    let summary = session.finish().unwrap();
    assert_eq!((summary.answered, summary.correct), (6, 3));

    let saved = JsonProfileStore::with_path(&profiles_path).load().unwrap();
    let lea = saved.get_profile("Léa").unwrap();
    assert_eq!(lea.totals(Category::Digits), (3, 6));
    assert_eq!(lea.totals(Category::Letters), (0, 0));
    assert!(lea.last_played_at.is_some());
    for result in &results {
        assert!(lea.stat(Category::Digits, result.symbol).unwrap().attempts >= 1);
    }

    let sessions = HistoryLog::with_path(&history_path).for_user("Léa").unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].category, Category::Digits);
    assert_eq!((sessions[0].answered, sessions[0].correct), (6, 3));
}

#[test]
fn progress_carries_over_to_the_next_session() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profiles.json");
    let speaker = RecordingSpeaker::new();

    {
        let mut ctx = context(JsonProfileStore::with_path(&path), &speaker);
        ctx.create_profile("Tom");
        let mut session =
            SessionController::new(&mut ctx, "Tom", Category::Letters, Screen::default()).unwrap();
        for _ in 0..3 {
            let correct = session.start().unwrap().correct_index;
            session.submit_answer(correct).unwrap();
        }
        session.finish().unwrap();
    }

    let mut ctx = context(JsonProfileStore::with_path(&path), &speaker);
    let mut session =
        SessionController::new(&mut ctx, "Tom", Category::Letters, Screen::default()).unwrap();
    assert_eq!(session.profile().unwrap().totals(Category::Letters), (3, 3));

    let question = session.start().unwrap().clone();
    let wrong = (question.correct_index + 1) % 4;
    session.submit_answer(wrong).unwrap();
    session.finish().unwrap();

    let saved = JsonProfileStore::with_path(&path).load().unwrap();
    assert_eq!(
        saved.get_profile("Tom").unwrap().totals(Category::Letters),
        (3, 4)
    );
}

#[test]
fn dropping_a_session_still_saves_answers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profiles.json");
    let speaker = RecordingSpeaker::new();

    let mut ctx = context(JsonProfileStore::with_path(&path), &speaker);
    ctx.create_profile("Zoé");
    {
        let mut session =
            SessionController::new(&mut ctx, "Zoé", Category::Digits, Screen::default()).unwrap();
        let correct = session.start().unwrap().correct_index;
        session.submit_answer(correct).unwrap();
    }

    let saved = JsonProfileStore::with_path(&path).load().unwrap();
    assert_eq!(
        saved.get_profile("Zoé").unwrap().totals(Category::Digits),
        (1, 1)
    );
}

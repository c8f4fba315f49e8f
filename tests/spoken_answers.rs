use std::sync::Arc;
use std::time::{Duration, Instant};

use abc_tutor::config::Config;
use abc_tutor::error::{RecognitionError, TutorError};
use abc_tutor::messages;
use abc_tutor::policy::Question;
use abc_tutor::reading::{Reading, ReadingController, ReadingState};
use abc_tutor::session::{AnswerResult, Presenter, SessionController, SessionState, TutorContext};
use abc_tutor::speech::{RecordingSpeaker, ScriptedRecognizer};
use abc_tutor::stats::Progress;
use abc_tutor::store::{MemoryProfileStore, ProfileCollection};
use abc_tutor::writer::ProfileWriter;
use abc_tutor::Category;
use assert_matches::assert_matches;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Default)]
struct Screen {
    retries: Vec<String>,
    listening: usize,
}

impl Presenter for Screen {
    fn present_question(&mut self, _category: Category, _question: &Question) {}

    fn show_result(&mut self, _result: &AnswerResult) {}

    fn show_progress(&mut self, _progress: Progress) {}

    fn show_retry(&mut self, message: &str) {
        self.retries.push(message.to_string());
    }

    fn show_listening(&mut self) {
        self.listening += 1;
    }
}

fn context(recognizer: ScriptedRecognizer, speaker: &RecordingSpeaker) -> TutorContext {
    let config = Config {
        feedback_delay_ms: 0,
        ..Config::default()
    };
    let mut ctx = TutorContext::new(
        config,
        ProfileCollection::new(),
        ProfileWriter::spawn(MemoryProfileStore::new()),
        Box::new(speaker.clone()),
    )
    .with_recognizer(Arc::new(recognizer));
    ctx.create_profile("Léa");
    ctx
}

/// Poll until the session leaves `AwaitingAnswer` or a retry shows up
fn poll_until<P: Presenter>(
    session: &mut SessionController<'_, P, StdRng>,
    done: impl Fn(&SessionController<'_, P, StdRng>) -> bool,
) -> Option<AnswerResult> {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if let Some(result) = session.poll(Instant::now()).unwrap() {
            return Some(result);
        }
        if done(session) {
            return None;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("recognition never completed");
}

#[test]
fn french_name_of_a_digit_is_graded() {
    let speaker = RecordingSpeaker::new();
    let mut ctx = context(ScriptedRecognizer::default(), &speaker);
    let mut session = SessionController::with_rng(
        &mut ctx,
        "Léa",
        Category::Digits,
        Screen::default(),
        StdRng::seed_from_u64(5),
    )
    .unwrap();
    let symbol = session.start().unwrap().symbol;
    let names = [
        "zéro", "un", "deux", "trois", "quatre", "cinq", "six", "sept", "huit", "neuf",
    ];
    let spoken = names[symbol.to_digit(10).unwrap() as usize];

    let result = session
        .handle_recognition(Ok(format!("le chiffre {spoken}")))
        .unwrap()
        .unwrap();
    assert!(result.correct);
    assert_eq!(result.symbol, symbol);
}

#[test]
fn background_recognition_grades_through_poll() {
    let speaker = RecordingSpeaker::new();
    let mut ctx = context(
        ScriptedRecognizer::new([Err(RecognitionError::Timeout)])
            .with_delay(Duration::from_millis(20)),
        &speaker,
    );
    let mut session = SessionController::with_rng(
        &mut ctx,
        "Léa",
        Category::Letters,
        Screen::default(),
        StdRng::seed_from_u64(8),
    )
    .unwrap();
    let symbol = session.start().unwrap().symbol;

    session.start_listening().unwrap();
    assert_eq!(session.presenter().listening, 1);
    assert!(poll_until(&mut session, |s| !s.presenter().retries.is_empty()).is_none());
    assert_eq!(
        session.presenter().retries[0],
        messages::recognition_retry(&RecognitionError::Timeout)
    );
    assert_eq!(session.state(), SessionState::AwaitingAnswer);
    assert!(!session.is_listening());

    // script exhausted: another timeout, still ungraded
    session.start_listening().unwrap();
    poll_until(&mut session, |s| s.presenter().retries.len() == 2);
    assert_eq!(session.profile().unwrap().totals(Category::Letters), (0, 0));

    // a typed answer still works after failed listening
    let result = session.submit_symbol(symbol).unwrap().unwrap();
    assert!(result.correct);
}

#[test]
fn answer_arriving_after_grading_is_dropped() {
    let speaker = RecordingSpeaker::new();
    let mut ctx = context(
        ScriptedRecognizer::hearing(["A", "B", "C", "D", "E", "F"]).with_delay(Duration::from_millis(50)),
        &speaker,
    );
    let mut session = SessionController::with_rng(
        &mut ctx,
        "Léa",
        Category::Letters,
        Screen::default(),
        StdRng::seed_from_u64(21),
    )
    .unwrap();
    let correct = session.start().unwrap().correct_index;
    session.start_listening().unwrap();
    assert_matches!(session.start_listening(), Err(TutorError::AlreadyListening));

    // keyboard wins the race
    session.submit_answer(correct).unwrap();
    assert!(!session.is_listening());
    std::thread::sleep(Duration::from_millis(120));
    session.poll(Instant::now()).unwrap();

    assert_eq!(session.summary().answered, 1);
    assert_eq!(session.profile().unwrap().totals(Category::Letters), (1, 1));
}

fn listen_and_wait(reading: &mut ReadingController<'_>) {
    reading.start_listening().unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while reading.is_listening() && Instant::now() < deadline {
        reading.poll(Instant::now());
        std::thread::sleep(Duration::from_millis(2));
    }
    reading.poll(Instant::now() + Duration::from_millis(1));
}

#[test]
fn reading_follows_the_recognizer() {
    let speaker = RecordingSpeaker::new();
    let ctx = context(
        ScriptedRecognizer::new([
            Ok("la".to_string()),
            Ok("vaches".to_string()),
            Err(RecognitionError::Unintelligible),
            Ok("Vache".to_string()),
        ]),
        &speaker,
    );
    let mut reading = ReadingController::new(&ctx, Reading::bundled("animaux").unwrap());
    assert_eq!(reading.session().current_word(), Some("La"));

    listen_and_wait(&mut reading);
    assert_eq!(reading.session().current_word(), Some("vache"));

    listen_and_wait(&mut reading);
    assert!(reading.feedback().unwrap().contains("vaches"));
    assert_eq!(speaker.last().as_deref(), Some("vache"));

    listen_and_wait(&mut reading);
    assert_eq!(
        reading.feedback(),
        Some(messages::recognition_retry(&RecognitionError::Unintelligible))
    );

    listen_and_wait(&mut reading);
    assert_eq!(reading.session().current_word(), Some("mange"));
    assert_eq!(reading.state(), ReadingState::AwaitingWord);
}

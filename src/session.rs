use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::config::Config;
use crate::error::{RecognitionError, Result, TutorError};
use crate::history::{HistoryLog, SessionRecord};
use crate::messages;
use crate::policy::{Question, QuestionPolicy};
use crate::speech::{Listener, Recognition, SpeechRecognizer, TextToSpeech};
use crate::stats::{Progress, UserProfile};
use crate::store::ProfileCollection;
use crate::symbols::{symbol_from_utterance, Category};
use crate::writer::ProfileWriter;

/// Everything a session needs, built once at startup
pub struct TutorContext {
    pub config: Config,
    pub profiles: ProfileCollection,
    pub writer: ProfileWriter,
    pub speaker: Box<dyn TextToSpeech>,
    pub recognizer: Option<Arc<dyn SpeechRecognizer>>,
    pub history: Option<HistoryLog>,
}

impl TutorContext {
    pub fn new(
        config: Config,
        profiles: ProfileCollection,
        writer: ProfileWriter,
        speaker: Box<dyn TextToSpeech>,
    ) -> Self {
        Self {
            config,
            profiles,
            writer,
            speaker,
            recognizer: None,
            history: None,
        }
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_history(mut self, history: HistoryLog) -> Self {
        self.history = Some(history);
        self
    }

    /// Create and persist a new profile; false if the name is taken or empty
    pub fn create_profile(&mut self, name: &str) -> bool {
        let created = self.profiles.create_profile(name);
        if created {
            self.writer.persist(&self.profiles);
        }
        created
    }
}

/// The screen a session talks to
pub trait Presenter {
    fn present_question(&mut self, category: Category, question: &Question);
    fn show_result(&mut self, result: &AnswerResult);
    fn show_progress(&mut self, progress: Progress);
    /// The same question stays open; `message` says why
    fn show_retry(&mut self, _message: &str) {}
    fn show_listening(&mut self) {}
}

/// How one question was answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerResult {
    pub symbol: char,
    pub chosen: char,
    pub correct: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingAnswer,
    /// Showing feedback until `resume_at`, then the next question
    Grading { resume_at: Instant },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub user: String,
    pub category: Category,
    pub answered: u32,
    pub correct: u32,
}

/// Drives ask → answer → record → next for one child and one category
pub struct SessionController<'a, P: Presenter, R: Rng = StdRng> {
    ctx: &'a mut TutorContext,
    user: String,
    category: Category,
    policy: QuestionPolicy,
    feedback_delay: Duration,
    rng: R,
    presenter: P,
    listener: Listener,
    state: SessionState,
    question: Option<Question>,
    answered: u32,
    correct: u32,
    was_complete: bool,
    finished: bool,
}

impl<'a, P: Presenter> SessionController<'a, P, StdRng> {
    pub fn new(
        ctx: &'a mut TutorContext,
        user: &str,
        category: Category,
        presenter: P,
    ) -> Result<Self> {
        Self::with_rng(ctx, user, category, presenter, StdRng::from_entropy())
    }
}

impl<'a, P: Presenter, R: Rng> SessionController<'a, P, R> {
    pub fn with_rng(
        ctx: &'a mut TutorContext,
        user: &str,
        category: Category,
        presenter: P,
        rng: R,
    ) -> Result<Self> {
        let was_complete = ctx.profiles.get_profile(user)?.progress(category).is_complete();
        let policy = QuestionPolicy::new(ctx.config.hard_pick_probability);
        let feedback_delay = ctx.config.feedback_delay();
        log::info!("starting {category} session for {user:?}");
        Ok(Self {
            ctx,
            user: user.to_string(),
            category,
            policy,
            feedback_delay,
            rng,
            presenter,
            listener: Listener::new(),
            state: SessionState::Idle,
            question: None,
            answered: 0,
            correct: 0,
            was_complete,
            finished: false,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn profile(&self) -> Result<&UserProfile> {
        self.ctx.profiles.get_profile(&self.user)
    }

    pub fn progress(&self) -> Result<Progress> {
        Ok(self.profile()?.progress(self.category))
    }

    pub fn is_listening(&self) -> bool {
        self.listener.is_listening()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            user: self.user.clone(),
            category: self.category,
            answered: self.answered,
            correct: self.correct,
        }
    }

    /// Ask a new question: present it and speak its symbol
    pub fn start(&mut self) -> Result<&Question> {
        self.listener.cancel();

        let profile = self.ctx.profiles.get_profile(&self.user)?;
        let question = self
            .policy
            .next_question(profile, self.category, &mut self.rng)?;
        let progress = profile.progress(self.category);
        log::debug!(
            "asking {:?} among {:?}",
            question.symbol,
            question.choices
        );

        self.ctx.speaker.speak(&question.symbol.to_string());
        self.presenter.present_question(self.category, &question);
        self.presenter.show_progress(progress);
        self.state = SessionState::AwaitingAnswer;
        Ok(&*self.question.insert(question))
    }

    /// Grade the choice at `choice_index`.
    ///
    /// Returns `Ok(None)` without touching any statistics when no question is
    /// waiting for an answer.
    pub fn submit_answer(&mut self, choice_index: usize) -> Result<Option<AnswerResult>> {
        if self.state != SessionState::AwaitingAnswer {
            log::debug!("ignoring answer {choice_index} while {:?}", self.state);
            return Ok(None);
        }
        let choices = self.question.as_ref().map_or(0, |q| q.choices.len());
        if choice_index >= choices {
            return Err(TutorError::InvalidChoice(choice_index));
        }
        self.grade(choice_index).map(Some)
    }

    /// Answer by naming a symbol; symbols not on offer are ignored
    pub fn submit_symbol(&mut self, symbol: char) -> Result<Option<AnswerResult>> {
        let index = self
            .question
            .as_ref()
            .and_then(|q| q.index_of(symbol.to_ascii_uppercase()));
        match index {
            Some(index) => self.submit_answer(index),
            None => Ok(None),
        }
    }

    /// Say the current symbol again
    pub fn repeat_prompt(&self) {
        if let (SessionState::AwaitingAnswer, Some(question)) = (self.state, &self.question) {
            self.ctx.speaker.speak(&question.symbol.to_string());
        }
    }

    /// Listen for a spoken answer in the background
    pub fn start_listening(&mut self) -> Result<()> {
        if self.state != SessionState::AwaitingAnswer {
            return Ok(());
        }
        let recognizer = self.ctx.recognizer.clone().ok_or(TutorError::NoRecognizer)?;
        self.ctx.speaker.stop();
        self.listener
            .start(recognizer, self.ctx.config.listen_settings())?;
        self.presenter.show_listening();
        Ok(())
    }

    /// Advance background work: deliver a finished recognition and move on
    /// once the feedback delay has passed.
    pub fn poll(&mut self, now: Instant) -> Result<Option<AnswerResult>> {
        let mut result = None;
        if let Some(Recognition { outcome, .. }) = self.listener.try_recv() {
            result = self.handle_recognition(outcome)?;
        }
        if let SessionState::Grading { resume_at } = self.state {
            if now >= resume_at {
                self.start()?;
            }
        }
        Ok(result)
    }

    /// Grade a spoken answer, or re-ask the same question if it can't be used
    pub fn handle_recognition(
        &mut self,
        outcome: std::result::Result<String, RecognitionError>,
    ) -> Result<Option<AnswerResult>> {
        if self.state != SessionState::AwaitingAnswer {
            log::debug!("ignoring recognition while {:?}", self.state);
            return Ok(None);
        }
        let Some(symbol) = self.question.as_ref().map(|q| q.symbol) else {
            return Ok(None);
        };

        let retry = match outcome {
            Ok(text) => {
                let index = symbol_from_utterance(&text, self.category)
                    .and_then(|heard| self.question.as_ref().and_then(|q| q.index_of(heard)));
                match index {
                    Some(index) => return self.grade(index).map(Some),
                    None => messages::heard_something_else(&text),
                }
            }
            Err(error) => {
                log::info!("recognition failed: {error}");
                messages::recognition_retry(&error).to_string()
            }
        };

        self.presenter.show_retry(&retry);
        self.ctx.speaker.speak(&format!("{retry} {symbol}"));
        Ok(None)
    }

    fn grade(&mut self, choice_index: usize) -> Result<AnswerResult> {
        self.listener.cancel();

        let (symbol, chosen, correct) = match self.question.as_ref() {
            Some(q) => (q.symbol, q.choices[choice_index], q.is_correct(choice_index)),
            None => return Err(TutorError::InvalidChoice(choice_index)),
        };

        let profile = self.ctx.profiles.get_profile_mut(&self.user)?;
        profile.record_answer(self.category, symbol, correct)?;
        let progress = profile.progress(self.category);
        self.ctx.writer.persist(&self.ctx.profiles);

        self.answered += 1;
        if correct {
            self.correct += 1;
        }

        let mut message = if correct {
            messages::CORRECT.to_string()
        } else {
            messages::incorrect(self.category, symbol)
        };
        if progress.is_complete() && !self.was_complete {
            self.was_complete = true;
            message = format!("{message} {}", messages::alphabet_complete(self.category));
            log::info!("{} mastered every {} symbol", self.user, self.category);
        }

        let result = AnswerResult {
            symbol,
            chosen,
            correct,
            message,
        };
        self.ctx.speaker.speak(&result.message);
        self.presenter.show_result(&result);
        self.presenter.show_progress(progress);
        self.state = SessionState::Grading {
            resume_at: Instant::now() + self.feedback_delay,
        };
        Ok(result)
    }

    /// Leave the session: stop speech and listening, make sure every answer
    /// is on disk and log the session.
    pub fn finish(mut self) -> Result<SessionSummary> {
        self.finished = true;
        self.shutdown_io();
        let summary = self.summary();

        if let (Some(history), true) = (&self.ctx.history, summary.answered > 0) {
            let record = SessionRecord {
                date: Utc::now(),
                user: summary.user.clone(),
                category: summary.category,
                answered: summary.answered,
                correct: summary.correct,
            };
            if let Err(e) = history.append(&record) {
                log::warn!("could not append to session history: {e}");
            }
        }

        self.ctx.writer.flush()?;
        log::info!(
            "{} finished a {} session: {}/{} correct",
            summary.user,
            summary.category,
            summary.correct,
            summary.answered
        );
        Ok(summary)
    }

    fn shutdown_io(&mut self) {
        self.listener.cancel();
        self.ctx.speaker.stop();
        self.question = None;
        self.state = SessionState::Idle;
    }
}

impl<P: Presenter, R: Rng> Drop for SessionController<'_, P, R> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.shutdown_io();
        if let Err(e) = self.ctx.writer.flush() {
            log::error!("progress may be lost: {e}");
        }
    }
}

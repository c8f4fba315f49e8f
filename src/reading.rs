use include_dir::{include_dir, Dir};
use serde::Deserialize;
use std::time::{Duration, Instant};

use crate::error::{RecognitionError, Result, TutorError};
use crate::messages;
use crate::session::TutorContext;
use crate::speech::{Listener, Recognition};

static READINGS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/readings");

pub const DEFAULT_READING: &str = "premieres-phrases";

const PUNCTUATION: &[char] = &['.', ',', '?', '!', ';', ':'];

/// A bundled text, read one word at a time
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Reading {
    pub name: String,
    pub title: String,
    pub sentences: Vec<String>,
}

impl Reading {
    pub fn bundled(name: &str) -> Result<Self> {
        let file = READINGS_DIR
            .get_file(format!("{name}.json"))
            .ok_or_else(|| TutorError::UnknownReading(name.to_string()))?;
        let contents = file
            .contents_utf8()
            .ok_or_else(|| TutorError::UnknownReading(name.to_string()))?;
        serde_json::from_str(contents).map_err(|e| {
            log::error!("bundled reading {name} is malformed: {e}");
            TutorError::UnknownReading(name.to_string())
        })
    }

    /// Names accepted by [`Reading::bundled`], sorted
    pub fn available() -> Vec<String> {
        let mut names: Vec<String> = READINGS_DIR
            .files()
            .filter_map(|f| f.path().file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// Lower-case and strip surrounding punctuation
fn normalize_word(word: &str) -> String {
    word.trim().trim_matches(PUNCTUATION).trim().to_lowercase()
}

pub fn word_matches(expected: &str, heard: &str) -> bool {
    let expected = normalize_word(expected);
    !expected.is_empty() && expected == normalize_word(heard)
}

fn split_words(sentence: &str) -> Vec<String> {
    sentence
        .split_whitespace()
        .filter(|w| !normalize_word(w).is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    NextWord,
    NextSentence,
    Finished,
}

/// Position within a reading
#[derive(Debug, Clone)]
pub struct ReadingSession {
    reading: Reading,
    sentence_index: usize,
    word_index: usize,
    words: Vec<String>,
}

impl ReadingSession {
    pub fn new(reading: Reading) -> Self {
        let mut session = Self {
            reading,
            sentence_index: 0,
            word_index: 0,
            words: Vec::new(),
        };
        session.load_sentence();
        session
    }

    fn load_sentence(&mut self) {
        while self.sentence_index < self.reading.sentences.len() {
            self.words = split_words(&self.reading.sentences[self.sentence_index]);
            self.word_index = 0;
            if !self.words.is_empty() {
                return;
            }
            self.sentence_index += 1;
        }
        self.words.clear();
    }

    pub fn reading(&self) -> &Reading {
        &self.reading
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn word_index(&self) -> usize {
        self.word_index
    }

    pub fn sentence_index(&self) -> usize {
        self.sentence_index
    }

    pub fn current_word(&self) -> Option<&str> {
        self.words.get(self.word_index).map(String::as_str)
    }

    pub fn is_finished(&self) -> bool {
        self.sentence_index >= self.reading.sentences.len()
    }

    pub fn matches(&self, heard: &str) -> bool {
        self.current_word()
            .is_some_and(|expected| word_matches(expected, heard))
    }

    pub fn advance(&mut self) -> Advance {
        if self.is_finished() {
            return Advance::Finished;
        }
        self.word_index += 1;
        if self.word_index < self.words.len() {
            return Advance::NextWord;
        }
        self.sentence_index += 1;
        self.load_sentence();
        if self.is_finished() {
            Advance::Finished
        } else {
            Advance::NextSentence
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingState {
    AwaitingWord,
    Advancing { resume_at: Instant },
    Finished,
}

/// Word-by-word reading practice driven by speech
pub struct ReadingController<'a> {
    ctx: &'a TutorContext,
    session: ReadingSession,
    listener: Listener,
    state: ReadingState,
    feedback: Option<String>,
    feedback_delay: Duration,
}

impl<'a> ReadingController<'a> {
    /// Open `reading` and speak its first word
    pub fn new(ctx: &'a TutorContext, reading: Reading) -> Self {
        log::info!("starting reading {:?}", reading.name);
        let mut controller = Self {
            ctx,
            session: ReadingSession::new(reading),
            listener: Listener::new(),
            state: ReadingState::AwaitingWord,
            feedback: None,
            feedback_delay: ctx.config.feedback_delay(),
        };
        controller.present_current();
        controller
    }

    pub fn session(&self) -> &ReadingSession {
        &self.session
    }

    pub fn state(&self) -> ReadingState {
        self.state
    }

    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    pub fn is_listening(&self) -> bool {
        self.listener.is_listening()
    }

    pub fn can_listen(&self) -> bool {
        self.ctx.recognizer.is_some()
    }

    fn present_current(&mut self) {
        if let Some(word) = self.session.current_word() {
            self.ctx.speaker.speak(word);
            self.state = ReadingState::AwaitingWord;
        } else {
            self.finish_reading();
        }
    }

    fn finish_reading(&mut self) {
        self.listener.cancel();
        self.state = ReadingState::Finished;
        self.feedback = Some(messages::ALL_DONE.to_string());
        self.ctx.speaker.speak(messages::ALL_DONE);
    }

    pub fn repeat_word(&self) {
        if self.state == ReadingState::AwaitingWord {
            if let Some(word) = self.session.current_word() {
                self.ctx.speaker.speak(word);
            }
        }
    }

    pub fn start_listening(&mut self) -> Result<()> {
        if self.state != ReadingState::AwaitingWord {
            return Ok(());
        }
        let recognizer = self.ctx.recognizer.clone().ok_or(TutorError::NoRecognizer)?;
        self.ctx.speaker.stop();
        self.listener
            .start(recognizer, self.ctx.config.listen_settings())?;
        self.feedback = Some(messages::LISTENING.to_string());
        Ok(())
    }

    /// Accept the current word without speech
    pub fn confirm_word(&mut self) {
        if self.state == ReadingState::AwaitingWord {
            self.listener.cancel();
            self.next_word();
        }
    }

    /// Judge a recognition; true when the current word was read correctly
    pub fn handle_recognition(
        &mut self,
        outcome: std::result::Result<String, RecognitionError>,
    ) -> bool {
        if self.state != ReadingState::AwaitingWord {
            return false;
        }
        let Some(word) = self.session.current_word().map(str::to_string) else {
            return false;
        };

        match outcome {
            Ok(text) if self.session.matches(&text) => {
                self.feedback = Some(messages::CORRECT.to_string());
                self.ctx.speaker.speak(messages::CORRECT);
                self.state = ReadingState::Advancing {
                    resume_at: Instant::now() + self.feedback_delay,
                };
                true
            }
            Ok(text) => {
                log::debug!("expected {word:?}, heard {text:?}");
                self.feedback = Some(messages::heard_something_else(&text));
                self.ctx.speaker.speak(&word);
                false
            }
            Err(error) => {
                log::info!("recognition failed: {error}");
                self.feedback = Some(messages::recognition_retry(&error).to_string());
                self.ctx.speaker.speak(&word);
                false
            }
        }
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        let mut matched = false;
        if let Some(Recognition { outcome, .. }) = self.listener.try_recv() {
            matched = self.handle_recognition(outcome);
        }
        if let ReadingState::Advancing { resume_at } = self.state {
            if now >= resume_at {
                self.next_word();
            }
        }
        matched
    }

    fn next_word(&mut self) {
        match self.session.advance() {
            Advance::Finished => self.finish_reading(),
            Advance::NextWord | Advance::NextSentence => {
                self.feedback = None;
                self.present_current();
            }
        }
    }

    pub fn finish(mut self) {
        self.listener.cancel();
        self.ctx.speaker.stop();
        self.state = ReadingState::Finished;
    }
}

//! Spoken prompts and spoken answers.
//!
//! Text-to-speech is fire-and-forget: failures are logged and never stop a
//! session. Recognition runs on a worker thread and reports back over a
//! channel, one result per `Listener::start`, unless it was cancelled first.

use std::collections::VecDeque;
use std::io::Read;
use std::process::{Child, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::CommandSpec;
use crate::error::{RecognitionError, Result, TutorError};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Extra time granted to a recognizer command beyond listen timeout + calibration
const COMMAND_GRACE: Duration = Duration::from_secs(10);

/// Exit code used by `timeout(1)` and friends
const TIMEOUT_EXIT_CODE: i32 = 124;

/// Speaks prompts and feedback aloud
pub trait TextToSpeech: Send {
    fn speak(&self, text: &str);
    /// Cut off whatever is being said
    fn stop(&self);
}

/// Turns one spoken phrase into text
pub trait SpeechRecognizer: Send + Sync {
    /// Block until a phrase is recognized, the listen timeout expires, or
    /// `cancel` is triggered.
    fn listen(
        &self,
        settings: &ListenSettings,
        cancel: &CancelToken,
    ) -> std::result::Result<String, RecognitionError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListenSettings {
    pub timeout: Duration,
    pub calibration: Duration,
    pub language: String,
}

impl Default for ListenSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            calibration: Duration::from_millis(500),
            language: "fr".to_string(),
        }
    }
}

/// Shared flag telling background work its result is no longer wanted
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of one `Listener::start`
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub ticket: u64,
    pub outcome: std::result::Result<String, RecognitionError>,
}

/// Runs at most one recognition at a time on a worker thread
pub struct Listener {
    tx: Sender<Recognition>,
    rx: Receiver<Recognition>,
    in_flight: Option<(u64, CancelToken)>,
    next_ticket: u64,
}

impl Default for Listener {
    fn default() -> Self {
        Self::new()
    }
}

impl Listener {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            in_flight: None,
            next_ticket: 0,
        }
    }

    /// Start listening; rejected while another recognition is outstanding
    pub fn start(
        &mut self,
        recognizer: Arc<dyn SpeechRecognizer>,
        settings: ListenSettings,
    ) -> Result<u64> {
        if self.in_flight.is_some() {
            return Err(TutorError::AlreadyListening);
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let token = CancelToken::new();
        self.in_flight = Some((ticket, token.clone()));

        let tx = self.tx.clone();
        thread::spawn(move || {
            let outcome = recognizer.listen(&settings, &token);
            if token.is_cancelled() {
                log::debug!("dropping recognition #{ticket} after cancellation");
                return;
            }
            let _ = tx.send(Recognition { ticket, outcome });
        });

        log::debug!("recognition #{ticket} started");
        Ok(ticket)
    }

    pub fn is_listening(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Abandon the outstanding recognition, if any
    pub fn cancel(&mut self) {
        if let Some((ticket, token)) = self.in_flight.take() {
            token.cancel();
            log::debug!("recognition #{ticket} cancelled");
        }
    }

    /// Non-blocking check for the outstanding result
    pub fn try_recv(&mut self) -> Option<Recognition> {
        while let Ok(recognition) = self.rx.try_recv() {
            if let Some(found) = self.accept(recognition) {
                return Some(found);
            }
        }
        None
    }

    /// Wait up to `timeout` for the outstanding result
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<Recognition> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(recognition) => {
                    if let Some(found) = self.accept(recognition) {
                        return Some(found);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }

    fn accept(&mut self, recognition: Recognition) -> Option<Recognition> {
        match &self.in_flight {
            Some((ticket, _)) if *ticket == recognition.ticket => {
                self.in_flight = None;
                Some(recognition)
            }
            _ => {
                log::debug!("ignoring stale recognition #{}", recognition.ticket);
                None
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Speaks through an external program such as `espeak-ng`
pub struct CommandSpeaker {
    spec: CommandSpec,
    current: Mutex<Option<Child>>,
}

impl CommandSpeaker {
    pub fn new(spec: CommandSpec) -> Self {
        Self {
            spec,
            current: Mutex::new(None),
        }
    }
}

impl TextToSpeech for CommandSpeaker {
    fn speak(&self, text: &str) {
        self.stop();

        let mut command = self.spec.command(&[("text", text)], Some(text));
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        match command.spawn() {
            Ok(child) => {
                if let Ok(mut current) = self.current.lock() {
                    *current = Some(child);
                }
            }
            Err(e) => log::warn!("could not run speech command {:?}: {e}", self.spec.program),
        }
    }

    fn stop(&self) {
        let child = self.current.lock().ok().and_then(|mut current| current.take());
        if let Some(mut child) = child {
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

impl Drop for CommandSpeaker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Logs utterances instead of speaking them
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSpeaker;

impl TextToSpeech for SilentSpeaker {
    fn speak(&self, text: &str) {
        log::debug!("(silent) {text}");
    }

    fn stop(&self) {}
}

/// Keeps every utterance, for headless runs and tests
#[derive(Debug, Clone, Default)]
pub struct RecordingSpeaker {
    spoken: Arc<Mutex<Vec<String>>>,
    stops: Arc<Mutex<usize>>,
}

impl RecordingSpeaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<String> {
        self.spoken.lock().ok().and_then(|s| s.last().cloned())
    }

    pub fn stop_count(&self) -> usize {
        self.stops.lock().map(|n| *n).unwrap_or(0)
    }
}

impl TextToSpeech for RecordingSpeaker {
    fn speak(&self, text: &str) {
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(text.to_string());
        }
    }

    fn stop(&self) {
        if let Ok(mut stops) = self.stops.lock() {
            *stops += 1;
        }
    }
}

/// Runs an external recognizer that prints the recognized phrase on stdout.
///
/// Exit status 0 with text is a recognition, 0 with no text is unintelligible
/// speech, 124 is a listen timeout and anything else is a service error.
pub struct CommandRecognizer {
    spec: CommandSpec,
}

impl CommandRecognizer {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

impl SpeechRecognizer for CommandRecognizer {
    fn listen(
        &self,
        settings: &ListenSettings,
        cancel: &CancelToken,
    ) -> std::result::Result<String, RecognitionError> {
        let timeout = format!("{:.1}", settings.timeout.as_secs_f64());
        let calibration = format!("{:.1}", settings.calibration.as_secs_f64());
        let mut command = self.spec.command(
            &[
                ("timeout", timeout.as_str()),
                ("calibration", calibration.as_str()),
                ("language", settings.language.as_str()),
            ],
            None,
        );
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| RecognitionError::Service(format!("{}: {e}", self.spec.program)))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + settings.calibration + settings.timeout + COMMAND_GRACE;
        let status = loop {
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RecognitionError::Service("cancelled".to_string()));
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    log::warn!("recognizer {:?} overran its deadline", self.spec.program);
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(RecognitionError::Timeout);
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(RecognitionError::Service(e.to_string())),
            }
        };

        let stdout = stdout.join().unwrap_or_default();

        match status.code() {
            Some(0) if stdout.trim().is_empty() => Err(RecognitionError::Unintelligible),
            Some(0) => Ok(stdout.trim().to_string()),
            Some(TIMEOUT_EXIT_CODE) => Err(RecognitionError::Timeout),
            _ => {
                let stderr = stderr.join().unwrap_or_default();
                log::warn!("recognizer failed with {status}: {}", stderr.trim());
                Err(RecognitionError::Service(format!("recognizer exited with {status}")))
            }
        }
    }
}

/// Read a child pipe to the end on its own thread so the child never blocks on a full pipe
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut text);
        }
        text
    })
}

/// Plays back a fixed list of outcomes; a timeout once the list runs out
#[derive(Debug, Default)]
pub struct ScriptedRecognizer {
    script: Mutex<VecDeque<std::result::Result<String, RecognitionError>>>,
    delay: Duration,
}

impl ScriptedRecognizer {
    pub fn new<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = std::result::Result<String, RecognitionError>>,
    {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn hearing<S: Into<String>>(phrases: impl IntoIterator<Item = S>) -> Self {
        Self::new(phrases.into_iter().map(|p| Ok(p.into())))
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn listen(
        &self,
        _settings: &ListenSettings,
        cancel: &CancelToken,
    ) -> std::result::Result<String, RecognitionError> {
        let deadline = Instant::now() + self.delay;
        while Instant::now() < deadline {
            if cancel.is_cancelled() {
                return Err(RecognitionError::Service("cancelled".to_string()));
            }
            thread::sleep(POLL_INTERVAL.min(self.delay));
        }
        self.script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or(Err(RecognitionError::Timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn settings() -> ListenSettings {
        ListenSettings::default()
    }

    #[test]
    fn listener_delivers_exactly_one_result() {
        let mut listener = Listener::new();
        let recognizer = Arc::new(ScriptedRecognizer::hearing(["bé"]));
        let ticket = listener.start(recognizer, settings()).unwrap();
        assert!(listener.is_listening());

        let recognition = listener.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(recognition.ticket, ticket);
        assert_eq!(recognition.outcome, Ok("bé".to_string()));
        assert!(!listener.is_listening());
        assert!(listener.recv_timeout(Duration::from_millis(50)).is_none());
    }

    #[test]
    fn second_start_is_rejected_while_in_flight() {
        let mut listener = Listener::new();
        let recognizer =
            Arc::new(ScriptedRecognizer::hearing(["a", "b"]).with_delay(Duration::from_millis(200)));
        listener.start(recognizer.clone(), settings()).unwrap();
        assert_matches!(
            listener.start(recognizer, settings()),
            Err(TutorError::AlreadyListening)
        );
    }

    #[test]
    fn cancelled_recognition_is_never_delivered() {
        let mut listener = Listener::new();
        let recognizer =
            Arc::new(ScriptedRecognizer::hearing(["a"]).with_delay(Duration::from_millis(100)));
        listener.start(recognizer, settings()).unwrap();
        listener.cancel();
        assert!(!listener.is_listening());
        assert!(listener.recv_timeout(Duration::from_millis(300)).is_none());
    }

    #[test]
    fn exhausted_script_times_out() {
        let recognizer = ScriptedRecognizer::new([Err(RecognitionError::Unintelligible)]);
        let token = CancelToken::new();
        assert_eq!(
            recognizer.listen(&settings(), &token),
            Err(RecognitionError::Unintelligible)
        );
        assert_eq!(
            recognizer.listen(&settings(), &token),
            Err(RecognitionError::Timeout)
        );
    }

    #[test]
    fn recording_speaker_keeps_utterances() {
        let speaker = RecordingSpeaker::new();
        speaker.speak("A");
        speaker.speak("Bravo");
        speaker.stop();
        assert_eq!(speaker.spoken(), vec!["A", "Bravo"]);
        assert_eq!(speaker.last().as_deref(), Some("Bravo"));
        assert_eq!(speaker.stop_count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn command_recognizer_reads_stdout() {
        let recognizer = CommandRecognizer::new(CommandSpec {
            program: "echo".to_string(),
            args: vec!["sept".to_string()],
        });
        assert_eq!(
            recognizer.listen(&settings(), &CancelToken::new()),
            Ok("sept".to_string())
        );
    }

    #[cfg(unix)]
    #[test]
    fn command_recognizer_maps_exit_codes() {
        let silent = CommandRecognizer::new(CommandSpec {
            program: "true".to_string(),
            args: vec![],
        });
        assert_eq!(
            silent.listen(&settings(), &CancelToken::new()),
            Err(RecognitionError::Unintelligible)
        );

        let timed_out = CommandRecognizer::new(CommandSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "exit 124".to_string()],
        });
        assert_eq!(
            timed_out.listen(&settings(), &CancelToken::new()),
            Err(RecognitionError::Timeout)
        );

        let broken = CommandRecognizer::new(CommandSpec {
            program: "false".to_string(),
            args: vec![],
        });
        assert_matches!(
            broken.listen(&settings(), &CancelToken::new()),
            Err(RecognitionError::Service(_))
        );
    }

    #[cfg(unix)]
    #[test]
    fn command_recognizer_handles_output_larger_than_a_pipe() {
        let chatty = CommandRecognizer::new(CommandSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "yes sept | head -c 200000".to_string()],
        });
        let started = Instant::now();
        let heard = chatty.listen(&settings(), &CancelToken::new()).unwrap();
        assert!(heard.len() > 100_000);
        assert!(heard.starts_with("sept"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn missing_program_is_a_service_error() {
        let recognizer = CommandRecognizer::new(CommandSpec {
            program: "abc-tutor-no-such-recognizer".to_string(),
            args: vec![],
        });
        assert_matches!(
            recognizer.listen(&settings(), &CancelToken::new()),
            Err(RecognitionError::Service(_))
        );
    }
}

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{Result, TutorError};
use crate::store::{ProfileCollection, ProfileStore};

const SAVE_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

enum WriterMessage {
    Save(Box<ProfileCollection>),
    Control(Control),
}

enum Control {
    Flush(Sender<Result<()>>),
    Shutdown,
}

/// Single background writer for the profile file.
///
/// Snapshots are written in submission order by one thread, so a later
/// snapshot can never be overwritten by an earlier one. When several
/// snapshots queue up only the newest is written.
pub struct ProfileWriter {
    tx: Sender<WriterMessage>,
    handle: Option<JoinHandle<()>>,
}

impl ProfileWriter {
    pub fn spawn<S: ProfileStore>(store: S) -> Self {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("profile-writer".to_string())
            .spawn(move || run_writer(store, rx))
            .map_err(|e| log::error!("could not start the profile writer thread: {e}"))
            .ok();
        Self { tx, handle }
    }

    /// Queue a snapshot for saving and return immediately
    pub fn persist(&self, profiles: &ProfileCollection) {
        if self
            .tx
            .send(WriterMessage::Save(Box::new(profiles.clone())))
            .is_err()
        {
            log::error!("profile writer is gone; progress was not saved");
        }
    }

    /// Wait until every queued snapshot is on disk.
    ///
    /// Reports the most recent save failure since the previous flush.
    pub fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.tx
            .send(WriterMessage::Control(Control::Flush(ack_tx)))
            .map_err(|_| TutorError::Persist("profile writer is not running".to_string()))?;
        ack_rx
            .recv()
            .map_err(|_| TutorError::Persist("profile writer stopped during flush".to_string()))?
    }
}

impl Drop for ProfileWriter {
    fn drop(&mut self) {
        let _ = self.tx.send(WriterMessage::Control(Control::Shutdown));
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_writer<S: ProfileStore>(store: S, rx: Receiver<WriterMessage>) {
    let mut last_error: Option<TutorError> = None;

    while let Ok(message) = rx.recv() {
        match message {
            WriterMessage::Save(mut snapshot) => {
                // coalesce saves queued before the next control message
                let mut pending = None;
                while let Ok(next) = rx.try_recv() {
                    match next {
                        WriterMessage::Save(newer) => snapshot = newer,
                        WriterMessage::Control(control) => {
                            pending = Some(control);
                            break;
                        }
                    }
                }

                if let Err(e) = save_with_retry(&store, &snapshot) {
                    last_error = Some(e);
                }

                if let Some(control) = pending {
                    if !handle_control(control, &mut last_error) {
                        return;
                    }
                }
            }
            WriterMessage::Control(control) => {
                if !handle_control(control, &mut last_error) {
                    return;
                }
            }
        }
    }
}

/// Returns false when the writer should stop
fn handle_control(control: Control, last_error: &mut Option<TutorError>) -> bool {
    match control {
        Control::Flush(ack) => {
            let result = match last_error.take() {
                Some(e) => Err(e),
                None => Ok(()),
            };
            let _ = ack.send(result);
            true
        }
        Control::Shutdown => false,
    }
}

fn save_with_retry<S: ProfileStore>(store: &S, snapshot: &ProfileCollection) -> Result<()> {
    let mut attempt = 1;
    loop {
        match store.save(snapshot) {
            Ok(()) => return Ok(()),
            Err(e) if attempt < SAVE_ATTEMPTS => {
                log::warn!("saving profiles failed (attempt {attempt}/{SAVE_ATTEMPTS}): {e}");
                thread::sleep(RETRY_BACKOFF * attempt);
                attempt += 1;
            }
            Err(e) => {
                log::error!("giving up saving profiles after {SAVE_ATTEMPTS} attempts: {e}");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{JsonProfileStore, MemoryProfileStore};
    use crate::symbols::Category;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn profiles_with_answers(n: u32) -> ProfileCollection {
        let mut profiles = ProfileCollection::new();
        profiles.create_profile("Léa");
        let lea = profiles.get_profile_mut("Léa").unwrap();
        for _ in 0..n {
            lea.record_answer(Category::Letters, 'A', true).unwrap();
        }
        profiles
    }

    #[test]
    fn flush_waits_for_the_latest_snapshot() {
        let store = MemoryProfileStore::new();
        let writer = ProfileWriter::spawn(store.clone());
        for n in 1..=20 {
            writer.persist(&profiles_with_answers(n));
        }
        writer.flush().unwrap();

        let saved = store.snapshot().unwrap();
        assert_eq!(
            saved.get_profile("Léa").unwrap().totals(Category::Letters),
            (20, 20)
        );
        assert!(store.save_count() >= 1);
        assert!(store.save_count() <= 20);
    }

    #[test]
    fn saves_after_a_flush_are_not_lost() {
        let store = MemoryProfileStore::new();
        let writer = ProfileWriter::spawn(store.clone());
        for round in 1..=5 {
            writer.persist(&profiles_with_answers(round * 2 - 1));
            writer.flush().unwrap();
            writer.persist(&profiles_with_answers(round * 2));
        }
        writer.flush().unwrap();

        let saved = store.snapshot().unwrap();
        assert_eq!(
            saved.get_profile("Léa").unwrap().totals(Category::Letters),
            (10, 10)
        );
    }

    #[test]
    fn writes_land_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        let writer = ProfileWriter::spawn(JsonProfileStore::with_path(&path));
        writer.persist(&profiles_with_answers(3));
        writer.flush().unwrap();
        drop(writer);

        let loaded = JsonProfileStore::with_path(&path).load().unwrap();
        assert_eq!(
            loaded.get_profile("Léa").unwrap().totals(Category::Letters),
            (3, 3)
        );
    }

    struct FailingStore {
        failures_left: Arc<AtomicU32>,
    }

    impl ProfileStore for FailingStore {
        fn load(&self) -> Result<ProfileCollection> {
            Ok(ProfileCollection::new())
        }

        fn save(&self, _profiles: &ProfileCollection) -> Result<()> {
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                Err(TutorError::Persist("disk full".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn transient_failures_are_retried() {
        let failures_left = Arc::new(AtomicU32::new(2));
        let writer = ProfileWriter::spawn(FailingStore {
            failures_left: failures_left.clone(),
        });
        writer.persist(&profiles_with_answers(1));
        assert!(writer.flush().is_ok());
        assert_eq!(failures_left.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn persistent_failures_surface_on_flush_once() {
        let writer = ProfileWriter::spawn(FailingStore {
            failures_left: Arc::new(AtomicU32::new(10)),
        });
        writer.persist(&profiles_with_answers(1));
        assert_matches!(writer.flush(), Err(TutorError::Persist(_)));
        // the error was reported; nothing new failed since
        assert!(writer.flush().is_ok());
    }
}

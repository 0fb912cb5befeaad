//! Shared ownership of the live session.
//!
//! The editor and the scheduler thread hold clones of one [`SessionHandle`].
//! Every edit publishes a complete new snapshot, so a reader never sees a
//! half-applied structural change.

use std::sync::Arc;

use arc_swap::ArcSwap;
use squelch_shared::{csv_codec, midi_codec, CsvError, MidiError, Session};
use tracing::info;

#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<ArcSwap<Session>>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").finish_non_exhaustive()
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new(Session::new())
    }
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(session)),
        }
    }

    /// Current snapshot. Holding it never blocks writers.
    pub fn load(&self) -> Arc<Session> {
        self.inner.load_full()
    }

    /// Read-copy-update: applies `f` to a copy and publishes it in one step.
    ///
    /// `f` may run more than once if another writer got in first.
    pub fn edit<F, R>(&self, mut f: F) -> R
    where
        F: FnMut(&mut Session) -> R,
    {
        loop {
            let current = self.inner.load_full();
            let mut next = Session::clone(&current);
            let result = f(&mut next);
            let previous = self.inner.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&*previous, &current) {
                return result;
            }
        }
    }

    /// Replaces the whole session at once.
    pub fn replace(&self, session: Session) {
        self.inner.store(Arc::new(session));
    }

    pub fn set_bpm(&self, bpm: u32) {
        self.edit(|session| session.set_bpm(bpm));
    }

    /// Parses `text` into a new session and swaps it in. On error nothing changes.
    pub fn import_csv(&self, text: &str) -> Result<(), CsvError> {
        let session = csv_codec::import_csv(text)?;
        info!(blocks = session.block_count(), bpm = session.bpm(), "imported csv session");
        self.replace(session);
        Ok(())
    }

    /// Parses `bytes` into a new session and swaps it in. On error nothing changes.
    pub fn import_midi(&self, bytes: &[u8]) -> Result<(), MidiError> {
        let session = midi_codec::import_midi(bytes)?;
        info!(blocks = session.block_count(), bpm = session.bpm(), "imported midi session");
        self.replace(session);
        Ok(())
    }

    pub fn export_csv(&self) -> String {
        csv_codec::export_csv(&self.load())
    }

    pub fn export_midi(&self) -> Vec<u8> {
        midi_codec::export_midi(&self.load())
    }
}

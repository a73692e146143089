//! Ordered conversation history.
//!
//! Committed entries are immutable and only ever appended. Placeholders are
//! provisional entries that are either committed in place or removed; the
//! [`PendingMessage`] guard removes its placeholder if it is dropped unsettled,
//! so an abandoned request never leaves a loading entry behind.
//!
//! `clear` bumps the log generation. Work that started under an older
//! generation is stale and cannot commit into the new log.

use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::message::{placeholder_text, Message, MessageId, Role};
use super::observer::SessionObserver;
use crate::api::{HistoryEntry, HistoryRole};
use crate::error::{PracticeError, Result};

#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
    next_id: u64,
    generation: u64,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_placeholders(&self) -> bool {
        self.messages.iter().any(|m| m.placeholder)
    }

    pub fn push_placeholder(&mut self, role: Role) -> MessageId {
        self.push(role, placeholder_text(role).to_string(), None, true)
    }

    pub fn append(&mut self, role: Role, text: String, audio_url: Option<String>) -> MessageId {
        self.push(role, text, audio_url, false)
    }

    /// Replace a placeholder with final content, keeping its position.
    /// Returns false if `id` is not a pending placeholder.
    pub fn commit(&mut self, id: MessageId, text: String, audio_url: Option<String>) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id && m.placeholder) {
            Some(message) => {
                message.text = text;
                message.audio_url = audio_url;
                message.placeholder = false;
                true
            }
            None => false,
        }
    }

    /// Remove a placeholder. Committed entries are never removed.
    pub fn remove_placeholder(&mut self, id: MessageId) -> bool {
        match self.messages.iter().position(|m| m.id == id && m.placeholder) {
            Some(index) => {
                self.messages.remove(index);
                true
            }
            None => false,
        }
    }

    /// Committed lines in the wire shape the backend expects
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.messages
            .iter()
            .filter(|m| !m.placeholder)
            .map(|m| HistoryEntry {
                role: match m.role {
                    Role::User => HistoryRole::User,
                    Role::Partner => HistoryRole::Ai,
                },
                content: m.text.clone(),
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.generation += 1;
    }

    fn push(&mut self, role: Role, text: String, audio_url: Option<String>, placeholder: bool) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(Message {
            id,
            role,
            text,
            audio_url,
            created_at: Utc::now(),
            placeholder,
        });
        id
    }
}

/// The session's log, shared between the controller and the pipeline.
///
/// Critical sections are short and never span an await. Every change is
/// reported to the observer after the lock is released.
#[derive(Clone)]
pub struct SharedLog {
    inner: Arc<Mutex<MessageLog>>,
    observer: Arc<dyn SessionObserver>,
}

impl SharedLog {
    pub fn new(observer: Arc<dyn SessionObserver>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MessageLog::new())),
            observer,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MessageLog> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f`; notify the observer only if it reports a change.
    fn mutate<T>(&self, f: impl FnOnce(&mut MessageLog) -> (T, bool)) -> T {
        let (out, snapshot) = {
            let mut log = self.lock();
            let (out, changed) = f(&mut log);
            (out, changed.then(|| log.messages().to_vec()))
        };
        if let Some(snapshot) = snapshot {
            self.observer.on_messages_changed(&snapshot);
        }
        out
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.lock().messages().to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation()
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.lock().history()
    }

    pub fn has_placeholders(&self) -> bool {
        self.lock().has_placeholders()
    }

    /// Insert a placeholder and return the guard that settles it.
    pub fn begin(&self, role: Role) -> PendingMessage {
        let (id, generation) = self.mutate(|log| ((log.push_placeholder(role), log.generation()), true));
        PendingMessage {
            log: self.clone(),
            id,
            generation,
            settled: false,
        }
    }

    pub fn append(&self, role: Role, text: String, audio_url: Option<String>) -> MessageId {
        self.mutate(|log| (log.append(role, text, audio_url), true))
    }

    pub fn clear(&self) {
        self.mutate(|log| {
            log.clear();
            ((), true)
        });
    }
}

/// A placeholder in flight. Commit it, or drop it to remove it.
pub struct PendingMessage {
    log: SharedLog,
    id: MessageId,
    generation: u64,
    settled: bool,
}

impl PendingMessage {
    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replace the placeholder with final content. Fails with
    /// `SessionInvalidated` if the log was cleared since the placeholder went in.
    pub fn commit(mut self, text: String, audio_url: Option<String>) -> Result<MessageId> {
        self.settled = true;
        let (id, generation) = (self.id, self.generation);
        let committed = self.log.mutate(|log| {
            let ok = log.generation() == generation && log.commit(id, text, audio_url);
            (ok, ok)
        });
        if committed {
            Ok(id)
        } else {
            Err(PracticeError::SessionInvalidated)
        }
    }
}

impl Drop for PendingMessage {
    fn drop(&mut self) {
        if !self.settled {
            let id = self.id;
            self.log.mutate(|log| ((), log.remove_placeholder(id)));
        }
    }
}

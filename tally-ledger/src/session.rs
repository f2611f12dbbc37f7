//! Submission state machine.
//!
//! One session per (group, user). Every inbound message restarts a debounce
//! timer; when it fires the buffered inputs are extracted together and handed
//! to the reconciler. Edit mode uses a longer window and replaces the caller's
//! last accepted submission instead of adding a new one.
//!
//! Outcomes are reported on an unbounded channel as [`SessionEvent`]s.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tally_core::{ExtractedPayment, HouseRegistry, ReceiptText, SubmissionError, SubmitterId};
use tally_ingest::{BeneficiaryValidator, ExtractionRequest, ReceiptExtractor};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::grid::LedgerBackend;
use crate::reconciler::{Reconciler, SavedReceipt, SubmitMode};

pub type SessionKey = SubmitterId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub buffer_delay: Duration,
    pub edit_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer_delay: Duration::from_secs(30),
            edit_delay: Duration::from_secs(60),
        }
    }
}

/// One chat message after OCR. Any part may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundMessage {
    pub text: String,
    pub caption: String,
    pub ocr_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Buffering,
    EditBuffering,
    Finalizing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Saved {
        submitter: SubmitterId,
        payment: ExtractedPayment,
        receipt: SavedReceipt,
        edit: bool,
    },
    Rejected {
        submitter: SubmitterId,
        payment: ExtractedPayment,
        error: SubmissionError,
    },
    EditExpired {
        submitter: SubmitterId,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no accepted submission to edit")]
    NoPriorSubmission,
}

#[derive(Debug, Default)]
struct Session {
    ocr: Vec<String>,
    user: Vec<String>,
    captions: Vec<String>,
    edit_mode: bool,
    finalize: Option<JoinHandle<()>>,
    expiry: Option<JoinHandle<()>>,
}

impl Session {
    fn absorb(&mut self, msg: InboundMessage) {
        for (part, sink) in [
            (msg.ocr_text, &mut self.ocr),
            (msg.text, &mut self.user),
            (msg.caption, &mut self.captions),
        ] {
            if !part.trim().is_empty() {
                sink.push(part.trim().to_string());
            }
        }
    }

    fn has_input(&self) -> bool {
        !(self.ocr.is_empty() && self.user.is_empty() && self.captions.is_empty())
    }

    fn clear_inputs(&mut self) {
        self.ocr.clear();
        self.user.clear();
        self.captions.clear();
    }

    fn cancel_timers(&mut self) {
        for handle in [self.finalize.take(), self.expiry.take()].into_iter().flatten() {
            handle.abort();
        }
    }

    fn receipt_text(&self) -> ReceiptText {
        ReceiptText {
            ocr_text: self.ocr.join("\n"),
            caption: self.captions.join(" "),
            user_text: self.user.join(" "),
        }
    }
}

#[derive(Debug, Default)]
struct SessionStore {
    sessions: HashMap<SessionKey, Session>,
    /// Last accepted submission per caller; outlives the session.
    last: HashMap<SessionKey, ExtractedPayment>,
    finalizing: HashSet<SessionKey>,
}

struct Inner<B> {
    store: Mutex<SessionStore>,
    reconciler: Mutex<Reconciler<B>>,
    extractor: ReceiptExtractor,
    validator: BeneficiaryValidator,
    registry: HouseRegistry,
    config: SessionConfig,
    events: mpsc::UnboundedSender<SessionEvent>,
}

pub struct SessionManager<B> {
    inner: Arc<Inner<B>>,
}

impl<B> Clone for SessionManager<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: LedgerBackend + 'static> SessionManager<B> {
    pub fn new(
        reconciler: Reconciler<B>,
        extractor: ReceiptExtractor,
        validator: BeneficiaryValidator,
        registry: HouseRegistry,
        config: SessionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            store: Mutex::new(SessionStore::default()),
            reconciler: Mutex::new(reconciler),
            extractor,
            validator,
            registry,
            config,
            events: tx,
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    /// Buffer a message and restart the finalize timer.
    pub async fn push(&self, key: SessionKey, msg: InboundMessage) {
        let mut store = self.inner.store.lock().await;
        let session = store.sessions.entry(key).or_default();
        session.absorb(msg);
        session.cancel_timers();

        let delay = if session.edit_mode {
            self.inner.config.edit_delay
        } else {
            self.inner.config.buffer_delay
        };
        let inner = Arc::clone(&self.inner);
        session.finalize = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.finalize(key).await;
        }));
        tracing::debug!(%key, edit = session.edit_mode, ?delay, "buffered message");
    }

    /// Start correcting the caller's last accepted submission. Anything
    /// buffered so far is discarded.
    pub async fn enter_edit(&self, key: SessionKey) -> Result<(), SessionError> {
        let mut store = self.inner.store.lock().await;
        if !store.last.contains_key(&key) {
            return Err(SessionError::NoPriorSubmission);
        }
        let session = store.sessions.entry(key).or_default();
        session.cancel_timers();
        session.clear_inputs();
        session.edit_mode = true;

        let delay = self.inner.config.edit_delay;
        let inner = Arc::clone(&self.inner);
        session.expiry = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.expire_edit(key).await;
        }));
        tracing::info!(%key, "edit mode entered");
        Ok(())
    }

    /// Drop the caller's session without finalizing it.
    pub async fn cancel(&self, key: SessionKey) -> bool {
        let mut store = self.inner.store.lock().await;
        match store.sessions.remove(&key) {
            Some(mut session) => {
                session.cancel_timers();
                true
            }
            None => false,
        }
    }

    /// Finalize the caller's session now instead of waiting for the timer.
    pub async fn flush(&self, key: SessionKey) {
        {
            let mut store = self.inner.store.lock().await;
            match store.sessions.get_mut(&key) {
                Some(session) if session.has_input() => session.cancel_timers(),
                _ => return,
            }
        }
        self.inner.finalize(key).await;
    }

    /// [`flush`](Self::flush) every session holding input.
    pub async fn flush_all(&self) {
        let keys: Vec<SessionKey> = {
            let store = self.inner.store.lock().await;
            store
                .sessions
                .iter()
                .filter(|(_, s)| s.has_input())
                .map(|(k, _)| *k)
                .collect()
        };
        for key in keys {
            self.flush(key).await;
        }
    }

    pub async fn state(&self, key: SessionKey) -> SessionState {
        let store = self.inner.store.lock().await;
        if store.finalizing.contains(&key) {
            return SessionState::Finalizing;
        }
        match store.sessions.get(&key) {
            Some(s) if s.edit_mode => SessionState::EditBuffering,
            Some(_) => SessionState::Buffering,
            None => SessionState::Idle,
        }
    }

    pub async fn last_submission(&self, key: SessionKey) -> Option<ExtractedPayment> {
        self.inner.store.lock().await.last.get(&key).cloned()
    }

    /// Run `f` against the reconciler while holding its lock.
    pub async fn with_reconciler<R>(&self, f: impl FnOnce(&Reconciler<B>) -> R) -> R {
        let rec = self.inner.reconciler.lock().await;
        f(&rec)
    }
}

impl<B: LedgerBackend + 'static> Inner<B> {
    async fn finalize(&self, key: SessionKey) {
        let (session, previous) = {
            let mut store = self.store.lock().await;
            let Some(mut session) = store.sessions.remove(&key) else {
                return;
            };
            if let Some(handle) = session.expiry.take() {
                handle.abort();
            }
            store.finalizing.insert(key);
            let previous = if session.edit_mode {
                store.last.get(&key).cloned()
            } else {
                None
            };
            (session, previous)
        };

        let receipt = session.receipt_text();
        let mut request = ExtractionRequest::new(&receipt).with_registry(&self.registry);
        if session.edit_mode {
            request = request.editing(previous.as_ref());
        }
        let payment = self.extractor.extract_buffered(&request);

        let mode = match &previous {
            Some(previous) => SubmitMode::Edit { previous },
            None => SubmitMode::New,
        };
        let outcome = {
            // Duplicate scan and write happen under this lock.
            let mut reconciler = self.reconciler.lock().await;
            reconciler.submit(&payment, Some(key), mode, &self.validator, Utc::now())
        };

        let mut store = self.store.lock().await;
        store.finalizing.remove(&key);
        let event = match outcome {
            Ok(receipt) => {
                store.last.insert(key, payment.clone());
                SessionEvent::Saved {
                    submitter: key,
                    payment,
                    receipt,
                    edit: previous.is_some(),
                }
            }
            Err(error) => SessionEvent::Rejected {
                submitter: key,
                payment,
                error,
            },
        };
        if self.events.send(event).is_err() {
            tracing::warn!(%key, "session event dropped: no listener");
        }
    }

    async fn expire_edit(&self, key: SessionKey) {
        let mut store = self.store.lock().await;
        let expired = matches!(
            store.sessions.get(&key),
            Some(s) if s.edit_mode && !s.has_input()
        );
        if !expired {
            return;
        }
        store.sessions.remove(&key);
        tracing::info!(%key, "edit window expired");
        if self.events.send(SessionEvent::EditExpired { submitter: key }).is_err() {
            tracing::warn!(%key, "session event dropped: no listener");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::MemoryGrid;
    use crate::setup::ensure_sheets;

    const RECEIPT: &str = "Commercial Bank of Ethiopia\n\
        Transaction ID: FT25012ABCDE\n\
        ETB 500.00 debited from ABEBE KEBEDE for water on 12-Jan-2025\n\
        Beneficiary\n\
        SEYOUM ASSEFA AND OR SENAIT DAGNE";

    fn manager() -> (SessionManager<MemoryGrid>, mpsc::UnboundedReceiver<SessionEvent>) {
        let registry = HouseRegistry::from_pairs([("407", "ABEBE KEBEDE"), ("901", "SARA HAILE")]);
        let mut grid = MemoryGrid::new();
        ensure_sheets(&mut grid, &registry).unwrap();
        SessionManager::new(
            Reconciler::open(grid).unwrap(),
            ReceiptExtractor::new().unwrap(),
            BeneficiaryValidator::new().unwrap(),
            registry,
            SessionConfig::default(),
        )
    }

    fn photo(caption: &str) -> InboundMessage {
        InboundMessage {
            ocr_text: RECEIPT.into(),
            caption: caption.into(),
            ..Default::default()
        }
    }

    fn text(t: &str) -> InboundMessage {
        InboundMessage {
            text: t.into(),
            ..Default::default()
        }
    }

    const ME: SubmitterId = SubmitterId { group_id: -100, user_id: 1 };

    #[tokio::test(start_paused = true)]
    async fn test_messages_are_combined_after_quiet_period() {
        let (mgr, mut rx) = manager();
        mgr.push(ME, photo("")).await;
        assert_eq!(mgr.state(ME).await, SessionState::Buffering);

        tokio::time::sleep(Duration::from_secs(20)).await;
        mgr.push(ME, text("407 meskerem")).await;
        // the first timer was restarted, nothing fired yet
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(rx.try_recv().is_err());

        let Some(SessionEvent::Saved { receipt, edit, .. }) = rx.recv().await else {
            panic!("expected a saved event");
        };
        assert!(!edit);
        assert_eq!(receipt.house_number, "407");
        assert_eq!(receipt.amount, "500.00");
        assert_eq!(mgr.state(ME).await, SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_is_rejected_and_session_reset() {
        let (mgr, mut rx) = manager();
        mgr.push(ME, photo("407 meskerem")).await;
        assert!(matches!(rx.recv().await, Some(SessionEvent::Saved { .. })));

        mgr.push(ME, photo("407 tikimt")).await;
        let Some(SessionEvent::Rejected { error, .. }) = rx.recv().await else {
            panic!("expected a rejection");
        };
        assert!(matches!(error, SubmissionError::DuplicateTransaction { row: 3, .. }));
        assert_eq!(mgr.state(ME).await, SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_bare_amount_replaces_previous() {
        let (mgr, mut rx) = manager();
        assert_eq!(mgr.enter_edit(ME).await, Err(SessionError::NoPriorSubmission));

        mgr.push(ME, photo("407 meskerem")).await;
        assert!(matches!(rx.recv().await, Some(SessionEvent::Saved { .. })));

        mgr.enter_edit(ME).await.unwrap();
        assert_eq!(mgr.state(ME).await, SessionState::EditBuffering);
        mgr.push(ME, text("700")).await;

        let Some(SessionEvent::Saved { receipt, edit, payment, .. }) = rx.recv().await else {
            panic!("expected a saved edit");
        };
        assert!(edit);
        assert_eq!(payment.house_number, "407");
        assert_eq!(receipt.amount, "700");
        assert_eq!(receipt.cell_total, 700.0);
        assert_eq!(receipt.replaced.map(|c| c.amount), Some("500.00".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entering_edit_discards_buffered_input() {
        let (mgr, mut rx) = manager();
        mgr.push(ME, photo("407 meskerem")).await;
        assert!(matches!(rx.recv().await, Some(SessionEvent::Saved { .. })));

        mgr.push(ME, photo("901 tikimt")).await;
        mgr.enter_edit(ME).await.unwrap();

        // nothing typed during the edit window
        assert_eq!(rx.recv().await, Some(SessionEvent::EditExpired { submitter: ME }));
        assert_eq!(mgr.state(ME).await, SessionState::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_and_cancel() {
        let (mgr, mut rx) = manager();
        mgr.push(ME, text("407")).await;
        assert!(mgr.cancel(ME).await);
        assert!(!mgr.cancel(ME).await);

        mgr.push(ME, photo("407 meskerem")).await;
        mgr.flush_all().await;
        assert!(matches!(rx.try_recv(), Ok(SessionEvent::Saved { .. })));
        let saved = mgr.with_reconciler(|r| r.book().len()).await;
        assert_eq!(saved, 1);
    }
}

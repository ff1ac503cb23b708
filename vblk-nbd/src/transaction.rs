//! The single in-flight transaction and the dead flag.
//!
//! Everything here sits behind one mutex. Every accessor takes the lock, does
//! its bookkeeping and releases it before returning, so callers cannot hold it
//! across socket I/O.

use crate::error::NbdError;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Outcome delivered from the reply receiver to the waiting caller.
pub type Completion = Result<Bytes, NbdError>;

/// The one request allowed on the wire at a time.
#[derive(Debug)]
struct Transaction {
    cookie: u64,
    /// Payload bytes the reply carries on success; 0 for everything but reads.
    reply_len: usize,
    /// Taken by the receiver when the reply arrives.
    sender: Option<oneshot::Sender<Completion>>,
}

#[derive(Debug)]
struct State {
    slot: Option<Transaction>,
    dead: bool,
    next_cookie: u64,
}

/// What the receiver needs to know about the pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending {
    pub cookie: u64,
    pub reply_len: usize,
}

/// Mutex-guarded transaction slot plus the one-way dead flag.
#[derive(Debug)]
pub struct TransactionStore {
    state: Mutex<State>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                slot: None,
                dead: false,
                next_cookie: 1,
            }),
        }
    }

    pub fn is_dead(&self) -> bool {
        self.state.lock().dead
    }

    /// Marks the connection dead. Returns true for the caller that flipped it.
    pub fn mark_dead(&self) -> bool {
        let mut state = self.state.lock();
        if state.dead {
            return false;
        }
        state.dead = true;
        true
    }

    /// Opens a new transaction and returns its cookie and completion receiver.
    ///
    /// Fails with `Dead` once the connection is unusable and with `Busy` while
    /// the previous transaction has not been finished.
    pub fn begin(
        &self,
        reply_len: usize,
    ) -> Result<(u64, oneshot::Receiver<Completion>), NbdError> {
        let mut state = self.state.lock();
        if state.dead {
            return Err(NbdError::Dead);
        }
        if state.slot.is_some() {
            return Err(NbdError::Busy);
        }

        let cookie = state.next_cookie;
        state.next_cookie = state.next_cookie.wrapping_add(1);

        let (tx, rx) = oneshot::channel();
        state.slot = Some(Transaction {
            cookie,
            reply_len,
            sender: Some(tx),
        });
        Ok((cookie, rx))
    }

    /// The transaction still waiting for its reply, if any.
    pub fn pending(&self) -> Option<Pending> {
        let state = self.state.lock();
        state.slot.as_ref().and_then(|t| {
            t.sender.as_ref().map(|_| Pending {
                cookie: t.cookie,
                reply_len: t.reply_len,
            })
        })
    }

    /// Delivers an outcome to the waiting caller.
    ///
    /// Returns false if nothing was waiting under `cookie`.
    pub fn complete(&self, cookie: u64, outcome: Completion) -> bool {
        let sender = {
            let mut state = self.state.lock();
            match state.slot.as_mut() {
                Some(t) if t.cookie == cookie => t.sender.take(),
                _ => None,
            }
        };
        match sender {
            // the caller may already have given up; nothing to do then
            Some(tx) => {
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Drops the pending sender without a value so the caller sees the
    /// connection go away.
    pub fn abort(&self) {
        let mut state = self.state.lock();
        if let Some(t) = state.slot.as_mut() {
            t.sender = None;
        }
    }

    /// Clears the slot after the caller has drained its completion.
    pub fn finish(&self) {
        self.state.lock().slot = None;
    }
}

impl Default for TransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

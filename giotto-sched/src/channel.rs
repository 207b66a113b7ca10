/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Double-buffered communication between tasks.
//!
//! A [`Channel`] holds two token slots:
//!
//! ```text
//! producer ──put()──►  pending  ──update()──►  committed  ──get()/remove()──►  consumer
//! ```
//!
//! Writes land in `pending` and stay invisible until the director calls
//! [`Channel::update`] right before the producer's next scheduled firing.
//! Readers only ever see `committed`, so every task firing in a slot observes
//! the same settled snapshot no matter in which order the slot fires them.
//!
//! # Ownership model
//! A `Channel` is a cheap handle (`Rc` inside).  The consumer's [`InputPort`]
//! creates it; producers keep clones inside their [`OutputPort`]; the director
//! reaches the same buffers through type-erased [`Commit`] handles.  The whole
//! model runs on one logical thread, so `Rc<RefCell<_>>` is all that is
//! needed.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;
use tracing::trace;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failure reading from a channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Nothing has been committed yet (or the committed token was removed).
    #[error("channel '{channel}' has no committed token")]
    Empty { channel: String },
}

// ── Channel ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Buffers<T> {
    pending: Option<T>,
    committed: Option<T>,
}

impl<T> Default for Buffers<T> {
    fn default() -> Self {
        Self {
            pending: None,
            committed: None,
        }
    }
}

/// Double-buffered, single-producer channel.  Cloning yields another handle to
/// the same buffers.
pub struct Channel<T> {
    name: Rc<str>,
    buffers: Rc<RefCell<Buffers<T>>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            name: Rc::clone(&self.name),
            buffers: Rc::clone(&self.buffers),
        }
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.buffers.borrow();
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("pending", &b.pending.is_some())
            .field("committed", &b.committed.is_some())
            .finish()
    }
}

impl<T: Clone> Channel<T> {
    /// Create an empty channel.
    pub fn new(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            name: Rc::from(name),
            buffers: Rc::new(RefCell::new(Buffers::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Overwrite `pending` with `token`.  Never blocks, never fails: only the
    /// most recent write matters.
    pub fn put(&self, token: T) {
        self.buffers.borrow_mut().pending = Some(token);
    }

    /// Publish: `committed = pending`.
    pub fn update(&self) {
        let mut b = self.buffers.borrow_mut();
        b.committed = b.pending.clone();
        trace!(channel = %self.name, committed = b.committed.is_some(), "channel updated");
    }

    /// Copy of the committed token.
    ///
    /// # Errors
    /// [`ChannelError::Empty`] if nothing is committed.
    pub fn get(&self) -> Result<T, ChannelError> {
        self.buffers
            .borrow()
            .committed
            .clone()
            .ok_or_else(|| self.empty_error())
    }

    /// Take the committed token, leaving the channel empty until the next
    /// [`update`](Self::update).
    ///
    /// # Errors
    /// [`ChannelError::Empty`] if nothing is committed.
    pub fn remove(&self) -> Result<T, ChannelError> {
        self.buffers
            .borrow_mut()
            .committed
            .take()
            .ok_or_else(|| self.empty_error())
    }

    /// `true` iff a committed token is available.
    pub fn has_token(&self) -> bool {
        self.buffers.borrow().committed.is_some()
    }

    /// `true` iff a write is waiting in `pending`.
    pub fn has_pending(&self) -> bool {
        self.buffers.borrow().pending.is_some()
    }

    /// Clear both buffers.
    pub fn reset(&self) {
        *self.buffers.borrow_mut() = Buffers::default();
    }

    fn empty_error(&self) -> ChannelError {
        ChannelError::Empty {
            channel: self.name.to_string(),
        }
    }
}

// ── Type-erased commit handle ─────────────────────────────────────────────────

/// What the director needs from a channel without knowing its token type.
pub trait Commit {
    fn channel_name(&self) -> &str;
    fn update(&self);
    fn reset(&self);
}

impl<T: Clone> Commit for Channel<T> {
    fn channel_name(&self) -> &str {
        self.name()
    }

    fn update(&self) {
        Channel::update(self);
    }

    fn reset(&self) {
        Channel::reset(self);
    }
}

/// Boxed commit handle as returned by [`OutputPort::remote_connections`].
pub type CommitHandle = Box<dyn Commit>;

// ── Ports ─────────────────────────────────────────────────────────────────────

/// Receiving end of a connection.  Owns the channel its producers write into.
#[derive(Debug, Clone)]
pub struct InputPort<T> {
    channel: Channel<T>,
}

impl<T: Clone> InputPort<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            channel: Channel::new(name),
        }
    }

    pub fn name(&self) -> &str {
        self.channel.name()
    }

    pub fn channel(&self) -> &Channel<T> {
        &self.channel
    }

    pub fn get(&self) -> Result<T, ChannelError> {
        self.channel.get()
    }

    pub fn remove(&self) -> Result<T, ChannelError> {
        self.channel.remove()
    }

    pub fn has_token(&self) -> bool {
        self.channel.has_token()
    }
}

/// Sending end.  Every token sent is `put` into each connected channel.
#[derive(Debug, Clone)]
pub struct OutputPort<T> {
    name: String,
    remotes: Vec<Channel<T>>,
}

impl<T: Clone + 'static> OutputPort<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remotes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connect this port to `input`.
    pub fn connect(&mut self, input: &InputPort<T>) {
        self.remotes.push(input.channel().clone());
    }

    /// Number of connected channels.
    pub fn width(&self) -> usize {
        self.remotes.len()
    }

    pub fn send(&self, token: T) {
        for ch in &self.remotes {
            ch.put(token.clone());
        }
    }

    /// Every channel this port's tokens are pushed to.
    pub fn remote_connections(&self) -> Vec<CommitHandle> {
        self.remotes
            .iter()
            .map(|ch| Box::new(ch.clone()) as CommitHandle)
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

use crate::control::{ControlBlock, ControlBlockRef};
use crate::error::{RecvError, TryRecvError};
use crate::token::CancelToken;
use crate::wait::{self, WaitOutcome};
use derivative::Derivative;
use std::mem::{self, ManuallyDrop};
use std::ops::Deref;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

/// The receiving end of a [`channel`].
///
/// There is exactly one receiver per channel and it cannot be cloned; every
/// claiming method takes `&mut self`, so consumer access is serialized by
/// construction. Dropping the receiver closes the channel.
///
/// [`channel`]: crate::channel
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct Receiver<T> {
    handle: ManuallyDrop<ControlBlockRef<T>>,
}

impl<T> Receiver<T> {
    pub(crate) fn new(handle: ControlBlockRef<T>) -> Self {
        Receiver {
            handle: ManuallyDrop::new(handle),
        }
    }

    /// Claims the slot at the read cursor without blocking.
    ///
    /// The returned slot exclusively owns the item until it is moved out or
    /// dropped; either way the slot is recycled for producers to reuse.
    pub fn try_claim(&mut self) -> Result<RecvSlot<'_, T>, TryRecvError> {
        let (claimed, recycled) = self.handle.ring.try_claim();

        // Skipping aborted reservations frees room; producers may be parked
        // waiting for it.
        if recycled && self.handle.config.wait.parks() {
            self.handle.not_full.notify();
        }

        match claimed {
            Some(cursor) => Ok(RecvSlot {
                channel: &self.handle,
                cursor,
            }),

            // Every credit being home means no reservation is in flight and
            // nothing is left to drain, so the emptiness is terminal.
            None if self.handle.is_closed() && self.handle.ring.is_quiescent() => {
                Err(TryRecvError::Disconnected)
            }

            None => Err(TryRecvError::Empty),
        }
    }

    /// Receives the next item without blocking.
    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        self.try_claim().map(RecvSlot::into_inner)
    }

    /// Receives the next item, waiting for one to be published.
    ///
    /// Honors the channel's default deadline, if one is configured.
    pub fn recv(&mut self) -> Result<T, RecvError> {
        self.recv_inner(self.default_deadline(), None)
    }

    /// Receives the next item, waiting at most `timeout`.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<T, RecvError> {
        self.recv_inner(Some(Instant::now() + timeout), None)
    }

    /// Receives the next item, abandoning the wait when `token` fires.
    pub fn recv_cancellable(&mut self, token: &CancelToken) -> Result<T, RecvError> {
        self.recv_inner(self.default_deadline(), Some(token))
    }

    /// Best-effort number of pending items; producers run concurrently with
    /// the query.
    pub fn len(&self) -> usize {
        self.handle.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        !self.handle.ring.has_room()
    }

    pub fn capacity(&self) -> usize {
        self.handle.ring.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    fn default_deadline(&self) -> Option<Instant> {
        self.handle.config.timeout.map(|timeout| Instant::now() + timeout)
    }

    fn recv_inner(
        &mut self,
        deadline: Option<Instant>,
        token: Option<&CancelToken>,
    ) -> Result<T, RecvError> {
        loop {
            match self.try_recv() {
                Ok(value) => return Ok(value),
                Err(TryRecvError::Disconnected) => return Err(RecvError::Disconnected),
                Err(TryRecvError::Empty) => {}
            }

            let ctrl = &**self.handle;
            let outcome = wait::wait_until(
                ctrl.config.wait,
                &ctrl.not_empty,
                deadline,
                token,
                || ctrl.ring.head_actionable() || (ctrl.is_closed() && ctrl.ring.is_quiescent()),
            );

            match outcome {
                WaitOutcome::Ready => continue,
                WaitOutcome::TimedOut => return Err(RecvError::Timeout),
                WaitOutcome::Cancelled => return Err(RecvError::Cancelled),
            }
        }
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        // Producers must not block on a ring nobody will drain.
        if self.handle.receivers.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.handle.close();

            // Whichever side disconnects last deallocates the control block.
            if !self.handle.connected.swap(false, Ordering::AcqRel) {
                unsafe { ManuallyDrop::drop(&mut self.handle) };
            }
        }
    }
}

/// A claimed slot in READING state, exclusively owned by the consumer.
///
/// Dereferences to the received item; [`into_inner`] moves the item out.
/// Dropping the slot discards the item. Either way the slot is recycled and
/// its capacity returned to the producers.
///
/// [`into_inner`]: RecvSlot::into_inner
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct RecvSlot<'a, T> {
    #[derivative(Debug = "ignore")]
    channel: &'a ControlBlock<T>,
    cursor: usize,
}

impl<T> RecvSlot<'_, T> {
    /// Moves the item out and recycles the slot.
    pub fn into_inner(self) -> T {
        let value = unsafe { self.channel.ring.take(self.cursor) };
        self.channel.ring.recycle(self.cursor);

        if self.channel.config.wait.parks() {
            self.channel.not_full.notify();
        }

        mem::forget(self);
        value
    }
}

impl<T> Deref for RecvSlot<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        unsafe { self.channel.ring.peek(self.cursor) }
    }
}

impl<T> Drop for RecvSlot<'_, T> {
    fn drop(&mut self) {
        unsafe { self.channel.ring.discard(self.cursor) };
        self.channel.ring.recycle(self.cursor);

        if self.channel.config.wait.parks() {
            self.channel.not_full.notify();
        }
    }
}

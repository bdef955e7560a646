use crate::control::{ControlBlock, ControlBlockRef};
use crate::error::{ReserveError, SendError, TryReserveError, TrySendError};
use crate::token::CancelToken;
use crate::wait::{self, WaitOutcome};
use derivative::Derivative;
use std::mem::{self, ManuallyDrop};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

/// The sending end of a [`channel`].
///
/// Cheap to clone; clones may be moved freely across threads. The channel
/// closes when the last sender is dropped or when any sender calls
/// [`close`].
///
/// [`channel`]: crate::channel
/// [`close`]: Sender::close
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct Sender<T> {
    handle: ManuallyDrop<ControlBlockRef<T>>,
}

impl<T> Sender<T> {
    pub(crate) fn new(handle: ControlBlockRef<T>) -> Self {
        Sender {
            handle: ManuallyDrop::new(handle),
        }
    }

    /// Reserves a slot without blocking.
    ///
    /// On success the calling thread exclusively owns the returned slot until
    /// it publishes into it or drops it.
    pub fn try_reserve(&self) -> Result<SendSlot<'_, T>, TryReserveError> {
        if self.handle.is_closed() {
            return Err(TryReserveError::Closed);
        }

        if !self.handle.ring.try_acquire() {
            return Err(TryReserveError::Full);
        }

        // A close may have won the race against the credit; the credit goes
        // back before the error surfaces so the drain accounting stays exact.
        if self.handle.is_closed() {
            self.handle.ring.release();

            // A parked consumer deciding between empty and drained must see
            // the credit come home.
            if self.handle.config.wait.parks() {
                self.handle.not_empty.notify();
            }

            return Err(TryReserveError::Closed);
        }

        Ok(SendSlot {
            channel: &self.handle,
            ticket: self.handle.ring.begin_write(),
        })
    }

    /// Reserves a slot, waiting for one to free up while the ring is full.
    ///
    /// Honors the channel's default deadline, if one is configured.
    pub fn reserve(&self) -> Result<SendSlot<'_, T>, ReserveError> {
        self.reserve_inner(self.default_deadline(), None)
    }

    /// Reserves a slot, waiting at most `timeout`.
    pub fn reserve_timeout(&self, timeout: Duration) -> Result<SendSlot<'_, T>, ReserveError> {
        self.reserve_inner(Some(Instant::now() + timeout), None)
    }

    /// Reserves a slot, abandoning the wait when `token` fires.
    pub fn reserve_cancellable(&self, token: &CancelToken) -> Result<SendSlot<'_, T>, ReserveError> {
        self.reserve_inner(self.default_deadline(), Some(token))
    }

    /// Sends a value without blocking, handing it back if the ring is full or
    /// the channel is closed.
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        match self.try_reserve() {
            Ok(slot) => Ok(slot.publish(value)),
            Err(TryReserveError::Full) => Err(TrySendError::Full(value)),
            Err(TryReserveError::Closed) => Err(TrySendError::Closed(value)),
        }
    }

    /// Sends a value, waiting for a slot while the ring is full.
    ///
    /// Honors the channel's default deadline, if one is configured.
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        self.send_inner(value, self.default_deadline(), None)
    }

    /// Sends a value, waiting at most `timeout` for a slot.
    pub fn send_timeout(&self, value: T, timeout: Duration) -> Result<(), SendError<T>> {
        self.send_inner(value, Some(Instant::now() + timeout), None)
    }

    /// Sends a value, abandoning the wait when `token` fires.
    pub fn send_cancellable(&self, value: T, token: &CancelToken) -> Result<(), SendError<T>> {
        self.send_inner(value, self.default_deadline(), Some(token))
    }

    /// Closes the channel: every subsequent reserve or send fails, while the
    /// consumer keeps draining whatever was already published. Idempotent
    /// across all senders.
    pub fn close(&self) {
        self.handle.close();
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.handle.ring.capacity()
    }

    fn default_deadline(&self) -> Option<Instant> {
        self.handle.config.timeout.map(|timeout| Instant::now() + timeout)
    }

    fn reserve_inner(
        &self,
        deadline: Option<Instant>,
        token: Option<&CancelToken>,
    ) -> Result<SendSlot<'_, T>, ReserveError> {
        loop {
            match self.try_reserve() {
                Ok(slot) => return Ok(slot),
                Err(TryReserveError::Closed) => return Err(ReserveError::Closed),
                Err(TryReserveError::Full) => {}
            }

            let ctrl = &**self.handle;
            let outcome = wait::wait_until(
                ctrl.config.wait,
                &ctrl.not_full,
                deadline,
                token,
                || ctrl.ring.has_room() || ctrl.is_closed(),
            );

            match outcome {
                WaitOutcome::Ready => continue,
                WaitOutcome::TimedOut => return Err(ReserveError::Timeout),
                WaitOutcome::Cancelled => return Err(ReserveError::Cancelled),
            }
        }
    }

    fn send_inner(
        &self,
        value: T,
        deadline: Option<Instant>,
        token: Option<&CancelToken>,
    ) -> Result<(), SendError<T>> {
        match self.reserve_inner(deadline, token) {
            Ok(slot) => Ok(slot.publish(value)),
            Err(ReserveError::Closed) => Err(SendError::Closed(value)),
            Err(ReserveError::Timeout) => Err(SendError::Timeout(value)),
            Err(ReserveError::Cancelled) => Err(SendError::Cancelled(value)),
        }
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.handle.senders.fetch_add(1, Ordering::Relaxed);
        Sender {
            handle: self.handle.clone(),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        // The consumer must not wait on producers that no longer exist.
        if self.handle.senders.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.handle.close();

            // Whichever side disconnects last deallocates the control block.
            if !self.handle.connected.swap(false, Ordering::AcqRel) {
                unsafe { ManuallyDrop::drop(&mut self.handle) };
            }
        }
    }
}

/// A reserved slot in WRITING state, exclusively owned by the reserving
/// thread.
///
/// Consumed by [`publish`]. Dropping the slot unpublished rolls the
/// reservation back; the consumer recycles it in sequence without ever
/// observing a value. Panics unwind through this rollback, but a thread
/// terminated without unwinding while holding a slot leaves it reserved
/// forever, and the channel permanently loses that slot's capacity.
///
/// [`publish`]: SendSlot::publish
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct SendSlot<'a, T> {
    #[derivative(Debug = "ignore")]
    channel: &'a ControlBlock<T>,
    ticket: usize,
}

impl<T> SendSlot<'_, T> {
    /// Writes `value` into the slot and makes it visible to the consumer.
    pub fn publish(self, value: T) {
        self.channel.ring.publish(self.ticket, value);

        if self.channel.config.wait.parks() {
            self.channel.not_empty.notify();
        }

        mem::forget(self);
    }
}

impl<T> Drop for SendSlot<'_, T> {
    fn drop(&mut self) {
        self.channel.ring.abort(self.ticket);

        // The consumer may be blocked on this very ticket.
        if self.channel.config.wait.parks() {
            self.channel.not_empty.notify();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{channel, channel_with, Config, WaitStrategy};
    use std::num::NonZeroUsize;
    use std::thread;

    fn cap(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn try_send_fails_when_the_ring_is_full() {
        let (tx, _rx) = channel(cap(1));

        assert_eq!(tx.try_send(1), Ok(()));
        assert_eq!(tx.try_send(2), Err(TrySendError::Full(2)));
    }

    #[test]
    fn try_send_fails_after_close() {
        let (tx, _rx) = channel(cap(1));

        tx.close();

        assert!(tx.is_closed());
        assert_eq!(tx.try_send(1), Err(TrySendError::Closed(1)));
    }

    #[test]
    fn close_reaches_every_sender() {
        let (tx1, _rx) = channel::<u8>(cap(1));
        let tx2 = tx1.clone();

        tx2.close();

        assert_eq!(tx1.try_send(1), Err(TrySendError::Closed(1)));
        assert_eq!(tx2.try_send(2), Err(TrySendError::Closed(2)));
    }

    #[test]
    fn dropping_the_receiver_closes_the_channel() {
        let (tx, rx) = channel(cap(1));

        drop(rx);

        assert_eq!(tx.try_send(1), Err(TrySendError::Closed(1)));
    }

    #[test]
    fn try_reserve_fails_once_credits_run_out() {
        let (tx, _rx) = channel::<u8>(cap(2));

        let a = tx.try_reserve().unwrap();
        let b = tx.try_reserve().unwrap();

        assert_eq!(tx.try_reserve().unwrap_err(), TryReserveError::Full);

        a.publish(1);
        b.publish(2);
    }

    #[test]
    fn reserve_timeout_reports_timeout_on_a_full_ring() {
        let (tx, _rx) = channel::<u8>(cap(1));

        let slot = tx.try_reserve().unwrap();

        assert_eq!(
            tx.reserve_timeout(Duration::from_millis(10)).unwrap_err(),
            ReserveError::Timeout
        );

        slot.publish(1);
    }

    #[test]
    fn cloning_a_sender_tracks_the_reference_count() {
        let (tx1, _rx) = channel::<u8>(cap(1));
        let tx2 = tx1.clone();

        assert_eq!(tx1.handle.senders.load(Ordering::Relaxed), 2);

        drop(tx2);

        assert_eq!(tx1.handle.senders.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn a_blocked_send_observes_the_receiver_going_away() {
        let (tx, rx) = channel_with(cap(1), Config::new().wait(WaitStrategy::Park));

        assert_eq!(tx.try_send(1), Ok(()));

        let blocked = thread::spawn(move || tx.send(2));

        thread::sleep(Duration::from_millis(20));
        drop(rx);

        assert_eq!(blocked.join().unwrap(), Err(SendError::Closed(2)));
    }
}

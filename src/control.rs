use crate::{config::Config, ring::Ring, wait::Monitor};
use crossbeam_utils::CachePadded;
use derivative::Derivative;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// State shared by every endpoint of one channel.
///
/// `connected` tracks endpoint liveness and decides which endpoint
/// deallocates; `closed` tracks whether producers may still reserve slots.
/// The two are independent: an explicit close leaves every handle alive.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub(crate) struct ControlBlock<T> {
    pub(crate) senders: CachePadded<AtomicUsize>,
    pub(crate) receivers: CachePadded<AtomicUsize>,
    pub(crate) connected: AtomicBool,
    pub(crate) closed: AtomicBool,
    pub(crate) ring: Ring<T>,
    pub(crate) config: Config,
    pub(crate) not_empty: Monitor,
    pub(crate) not_full: Monitor,
}

impl<T> ControlBlock<T> {
    fn new(capacity: usize, config: Config) -> Self {
        Self {
            senders: CachePadded::new(AtomicUsize::new(1)),
            receivers: CachePadded::new(AtomicUsize::new(1)),
            connected: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            ring: Ring::new(capacity),
            config,
            not_empty: Monitor::new(),
            not_full: Monitor::new(),
        }
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops the channel from accepting new items and wakes blocked callers
    /// so they can observe the closure. Idempotent.
    pub(crate) fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.not_empty.notify();
            self.not_full.notify();
        }
    }
}

#[derive(Derivative, Eq, PartialEq)]
#[derivative(Debug(bound = ""), Clone(bound = ""))]
pub(crate) struct ControlBlockRef<T>(NonNull<ControlBlock<T>>);

unsafe impl<T: Send> Send for ControlBlockRef<T> {}
unsafe impl<T: Send> Sync for ControlBlockRef<T> {}

impl<T> ControlBlockRef<T> {
    pub(crate) fn new(capacity: usize, config: Config) -> Self {
        ControlBlockRef(unsafe {
            NonNull::new_unchecked(Box::into_raw(Box::new(ControlBlock::new(capacity, config))))
        })
    }
}

impl<T> Deref for ControlBlockRef<T> {
    type Target = ControlBlock<T>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        unsafe { self.0.as_ref() }
    }
}

impl<T> Drop for ControlBlockRef<T> {
    fn drop(&mut self) {
        debug_assert!(!self.connected.load(Ordering::Relaxed));
        debug_assert_eq!(self.senders.load(Ordering::Relaxed), 0);
        debug_assert_eq!(self.receivers.load(Ordering::Relaxed), 0);

        unsafe { Box::from_raw(&**self as *const ControlBlock<T> as *mut ControlBlock<T>) };
    }
}

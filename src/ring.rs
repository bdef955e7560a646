use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicIsize, AtomicU8, AtomicUsize, Ordering};
use crossbeam_utils::CachePadded;
use derivative::Derivative;

// Slot lifecycle tags. A slot only ever moves forward through
// EMPTY -> WRITING -> READY -> READING and back to EMPTY on recycle.
// ABORTED replaces READY when a reservation is dropped unpublished,
// in which case the consumer recycles the slot without reading it.
pub(crate) const EMPTY: u8 = 0;
pub(crate) const WRITING: u8 = 1;
pub(crate) const READY: u8 = 2;
pub(crate) const READING: u8 = 3;
pub(crate) const ABORTED: u8 = 4;

struct Slot<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Slot {
            state: AtomicU8::new(EMPTY),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

/// The slot array and both cursors.
///
/// `tail` is the shared write cursor, advanced by producers one ticket at a
/// time. `head` is the read cursor, stored only by the consumer. `free` holds
/// the slot credits; a producer may only take a ticket while holding a credit,
/// which is what keeps `tail - head` bounded by the capacity and guarantees
/// that the slot a ticket maps to has already been recycled.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub(crate) struct Ring<T> {
    tail: CachePadded<AtomicUsize>,
    head: CachePadded<AtomicUsize>,
    free: CachePadded<AtomicIsize>,
    #[derivative(Debug = "ignore")]
    slots: Box<[CachePadded<Slot<T>>]>,
    mask: usize,
    capacity: usize,
}

unsafe impl<T: Send> Sync for Ring<T> {}
unsafe impl<T: Send> Send for Ring<T> {}

impl<T> Ring<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);

        // The slot array is padded to a power of two so that indexing is a
        // mask; the enforced bound remains the requested capacity.
        let len = capacity.next_power_of_two();

        Ring {
            tail: Default::default(),
            head: Default::default(),
            free: CachePadded::new(AtomicIsize::new(capacity as isize)),
            slots: (0..len).map(|_| Slot::new()).map(CachePadded::new).collect(),
            mask: len - 1,
            capacity,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn slot(&self, cursor: usize) -> &Slot<T> {
        let index = cursor & self.mask;
        debug_assert!(index < self.slots.len());
        unsafe { self.slots.get_unchecked(index) }
    }

    /// Best-effort number of slots between the cursors.
    pub(crate) fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        tail.wrapping_sub(head).min(self.capacity)
    }

    #[inline]
    pub(crate) fn has_room(&self) -> bool {
        self.free.load(Ordering::Relaxed) > 0
    }

    /// Whether every credit is home, i.e. no reservation is in flight and no
    /// published item remains unconsumed.
    #[inline]
    pub(crate) fn is_quiescent(&self) -> bool {
        self.free.load(Ordering::Acquire) == self.capacity as isize
    }

    /// Takes one slot credit, failing if the ring is full.
    ///
    /// The acquire pairs with the release in [`recycle`], so a producer that
    /// wins a credit also observes the completed read of the slot it is about
    /// to overwrite.
    ///
    /// [`recycle`]: Ring::recycle
    pub(crate) fn try_acquire(&self) -> bool {
        if self.free.fetch_sub(1, Ordering::Acquire) > 0 {
            true
        } else {
            self.free.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Returns a credit taken with [`try_acquire`] without using it.
    ///
    /// [`try_acquire`]: Ring::try_acquire
    pub(crate) fn release(&self) {
        self.free.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a ticket off the write cursor and moves its slot to WRITING.
    ///
    /// The caller must hold a credit; the single fetch_add is the only point
    /// of contention between producers.
    pub(crate) fn begin_write(&self) -> usize {
        let ticket = self.tail.fetch_add(1, Ordering::Relaxed);
        let slot = self.slot(ticket);
        debug_assert_eq!(slot.state.load(Ordering::Relaxed), EMPTY);
        slot.state.store(WRITING, Ordering::Relaxed);
        ticket
    }

    /// Writes the payload and flips the slot to READY.
    ///
    /// The release store is the synchronization edge that makes the payload
    /// write visible to the consumer's acquire load.
    pub(crate) fn publish(&self, ticket: usize, value: T) {
        let slot = self.slot(ticket);
        debug_assert_eq!(slot.state.load(Ordering::Relaxed), WRITING);
        unsafe { slot.value.get().write(MaybeUninit::new(value)) };
        slot.state.store(READY, Ordering::Release);
    }

    /// Rolls a reservation back without publishing a value.
    ///
    /// The ticket cannot be untaken, so the slot is tagged for the consumer
    /// to skip and recycle in sequence.
    pub(crate) fn abort(&self, ticket: usize) {
        let slot = self.slot(ticket);
        debug_assert_eq!(slot.state.load(Ordering::Relaxed), WRITING);
        slot.state.store(ABORTED, Ordering::Release);
    }

    /// Whether the slot at the read cursor can be claimed or skipped.
    pub(crate) fn head_actionable(&self) -> bool {
        let state = self.slot(self.head.load(Ordering::Relaxed)).state.load(Ordering::Acquire);
        matches!(state, READY | ABORTED)
    }

    /// Moves the slot at the read cursor to READING and returns its cursor,
    /// recycling aborted reservations along the way.
    ///
    /// Also reports whether any slot was recycled, so the caller can signal
    /// producers waiting for room.
    ///
    /// Must only be called by the consumer.
    pub(crate) fn try_claim(&self) -> (Option<usize>, bool) {
        let mut recycled = false;

        loop {
            let head = self.head.load(Ordering::Relaxed);
            let slot = self.slot(head);

            // Reading the state gates reading the payload, otherwise it would
            // be possible to observe a partially written value.
            match slot.state.load(Ordering::Acquire) {
                READY => {
                    slot.state.store(READING, Ordering::Relaxed);
                    return (Some(head), recycled);
                }

                ABORTED => {
                    self.recycle(head);
                    recycled = true;
                }

                _ => return (None, recycled),
            }
        }
    }

    /// Borrows the payload of a claimed slot.
    ///
    /// # Safety
    ///
    /// `cursor` must have been returned by [`try_claim`] and not yet recycled.
    ///
    /// [`try_claim`]: Ring::try_claim
    pub(crate) unsafe fn peek(&self, cursor: usize) -> &T {
        let slot = self.slot(cursor);
        debug_assert_eq!(slot.state.load(Ordering::Relaxed), READING);
        &*(*slot.value.get()).as_ptr()
    }

    /// Moves the payload out of a claimed slot. The caller must recycle the
    /// slot afterwards and must not read it again.
    ///
    /// # Safety
    ///
    /// `cursor` must have been returned by [`try_claim`] and not yet recycled.
    pub(crate) unsafe fn take(&self, cursor: usize) -> T {
        let slot = self.slot(cursor);
        debug_assert_eq!(slot.state.load(Ordering::Relaxed), READING);
        slot.value.get().read().assume_init()
    }

    /// Drops the payload of a claimed slot in place.
    ///
    /// # Safety
    ///
    /// `cursor` must have been returned by [`try_claim`] and not yet recycled.
    pub(crate) unsafe fn discard(&self, cursor: usize) {
        let slot = self.slot(cursor);
        debug_assert_eq!(slot.state.load(Ordering::Relaxed), READING);
        (*slot.value.get()).as_mut_ptr().drop_in_place();
    }

    /// Returns a drained or skipped slot to the producers and advances the
    /// read cursor past it.
    ///
    /// Must only be called by the consumer, with `cursor` at the read cursor.
    pub(crate) fn recycle(&self, cursor: usize) {
        debug_assert_eq!(self.head.load(Ordering::Relaxed), cursor);

        // Clearing the state comes after any payload access and before the
        // credit is returned, otherwise a producer could reserve the slot
        // while it still appears occupied, or observe a stale READY.
        self.slot(cursor).state.store(EMPTY, Ordering::Release);
        self.head.store(cursor.wrapping_add(1), Ordering::Relaxed);
        self.free.fetch_add(1, Ordering::Release);
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        let tail = *self.tail.get_mut();

        debug_assert_eq!(
            *self.free.get_mut() + tail.wrapping_sub(head) as isize,
            self.capacity as isize
        );

        // Drop any published items still resident between the cursors.
        let mut cursor = head;
        while cursor != tail {
            let slot = &mut *self.slots[cursor & self.mask];
            debug_assert_ne!(*slot.state.get_mut(), WRITING);

            if *slot.state.get_mut() == READY {
                unsafe { slot.value.get_mut().assume_init_drop() };
            }

            cursor = cursor.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use test_strategy::proptest;

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[proptest]
    fn capacity_returns_the_requested_bound(#[strategy(1..=100usize)] capacity: usize) {
        let ring = Ring::<()>::new(capacity);
        assert_eq!(ring.capacity(), capacity);
        assert!(ring.slots.len().is_power_of_two());
        assert!(ring.slots.len() >= capacity);
    }

    #[proptest]
    fn credits_bound_the_number_of_reservations(#[strategy(1..=100usize)] capacity: usize) {
        let ring = Ring::<()>::new(capacity);

        for _ in 0..capacity {
            assert!(ring.try_acquire());
        }

        assert!(!ring.try_acquire());
        assert!(!ring.has_room());

        ring.release();
        assert!(ring.try_acquire());
    }

    #[test]
    fn published_values_are_claimed_in_ticket_order() {
        let ring = Ring::new(4);

        for value in 0..4 {
            assert!(ring.try_acquire());
            let ticket = ring.begin_write();
            ring.publish(ticket, value);
        }

        for value in 0..4 {
            let (cursor, _) = ring.try_claim();
            let cursor = cursor.unwrap();
            assert_eq!(unsafe { ring.take(cursor) }, value);
            ring.recycle(cursor);
        }

        assert_eq!(ring.try_claim(), (None, false));
        assert!(ring.is_quiescent());
    }

    #[test]
    fn aborted_reservations_are_skipped_and_recycled() {
        let ring = Ring::new(2);

        assert!(ring.try_acquire());
        ring.abort(ring.begin_write());

        assert!(ring.try_acquire());
        let ticket = ring.begin_write();
        ring.publish(ticket, 42);

        let (cursor, recycled) = ring.try_claim();
        assert!(recycled, "the aborted slot is recycled on the way");

        let cursor = cursor.unwrap();
        assert_eq!(unsafe { ring.take(cursor) }, 42);
        ring.recycle(cursor);

        assert!(ring.is_quiescent());
    }

    #[test]
    fn cursors_wrap_around_the_slot_array() {
        let ring = Ring::new(2);

        for lap in 0..10 {
            assert!(ring.try_acquire());
            let ticket = ring.begin_write();
            ring.publish(ticket, lap);

            let (cursor, _) = ring.try_claim();
            let cursor = cursor.unwrap();
            assert_eq!(unsafe { ring.take(cursor) }, lap);
            ring.recycle(cursor);
        }
    }

    #[proptest]
    fn dropping_the_ring_drops_pending_items(
        #[strategy(1..=10usize)] capacity: usize,
        #[strategy(0..=5usize)] consumed: usize,
    ) {
        let drops = Arc::new(AtomicUsize::new(0));
        let ring = Ring::new(capacity);

        for _ in 0..capacity {
            assert!(ring.try_acquire());
            let ticket = ring.begin_write();
            ring.publish(ticket, DropCounter(drops.clone()));
        }

        for _ in 0..consumed.min(capacity) {
            let (cursor, _) = ring.try_claim();
            let cursor = cursor.unwrap();
            drop(unsafe { ring.take(cursor) });
            ring.recycle(cursor);
        }

        drop(ring);

        assert_eq!(drops.load(Ordering::Relaxed), capacity);
    }
}

//! Bounded MPSC channel on top of a lock-free ring buffer.
//!
//! # Overview
//!
//! This crate provides a fixed-capacity channel for any number of producer
//! threads and exactly one consumer thread. Under the hood, [`channel`] is a
//! pre-allocated ring of slots: a producer takes a ticket off a shared write
//! cursor, writes its item into the slot the ticket maps to, and publishes it
//! with a single release store; the consumer polls the slot at its private
//! read cursor, takes the item, and recycles the slot. No mutex is ever taken
//! on this path, and producers contend on nothing but one atomic counter.
//!
//! Unlike a lossy ring, the channel exerts backpressure: once `capacity`
//! items are in flight, producers either fail fast ([`Sender::try_send`]) or
//! wait for the consumer to catch up ([`Sender::send`]). Whether a blocked
//! call spins, yields, or parks is chosen per channel via [`Config`], and
//! every blocking call can be bounded by a deadline or a [`CancelToken`].
//!
//! # Hello, world!
//!
//! ```rust
//! use mpsc_ring::*;
//! use std::num::NonZeroUsize;
//!
//! // Open the channel.
//! let (tx, mut rx) = channel(NonZeroUsize::new(1).unwrap());
//!
//! // Send a message through the producer endpoint.
//! tx.send("Hello, world!").unwrap();
//!
//! // Receive the message through the consumer endpoint.
//! assert_eq!(rx.recv(), Ok("Hello, world!"));
//! ```
//!
//! # Communicating across threads
//!
//! [`Sender`] is a handle that may be cloned and moved to other threads;
//! every clone feeds the same ring. [`Receiver`] cannot be cloned and its
//! claiming methods take `&mut self`: one consumer is a structural guarantee,
//! not a convention. The channel lives as long as any endpoint does.
//!
//! ```rust
//! use mpsc_ring::*;
//! use std::{num::NonZeroUsize, thread};
//!
//! let (tx, mut rx) = channel(NonZeroUsize::new(8).unwrap());
//!
//! let producers: Vec<_> = (0..4)
//!     .map(|id| {
//!         let tx = tx.clone();
//!         thread::spawn(move || {
//!             for seq in 0..10 {
//!                 tx.send((id, seq)).unwrap();
//!             }
//!         })
//!     })
//!     .collect();
//!
//! // Hang up our own handle so the channel closes once the spawned
//! // producers are done.
//! drop(tx);
//!
//! let mut received = 0;
//! while let Ok(_item) = rx.recv() {
//!     received += 1;
//! }
//!
//! assert_eq!(received, 40);
//!
//! for producer in producers {
//!     producer.join().unwrap();
//! }
//! ```
//!
//! # Closing
//!
//! Any sender may close the channel, and the channel closes itself when the
//! last sender or the receiver is dropped. Closing stops new items from
//! entering; everything published before the close remains claimable, and
//! only once the ring is drained does the receiver see a terminal error.
//!
//! ```rust
//! use mpsc_ring::*;
//! use std::num::NonZeroUsize;
//!
//! let (tx, mut rx) = channel(NonZeroUsize::new(3).unwrap());
//!
//! tx.try_send(1).unwrap();
//! tx.try_send(2).unwrap();
//! tx.close();
//!
//! assert_eq!(tx.try_send(3), Err(TrySendError::Closed(3)));
//!
//! // Pending messages can still be received.
//! assert_eq!(rx.recv(), Ok(1));
//! assert_eq!(rx.recv(), Ok(2));
//!
//! // Finally, the channel reports itself as drained.
//! assert_eq!(rx.recv(), Err(RecvError::Disconnected));
//! ```
//!
//! # Reserving slots directly
//!
//! The two-step protocol behind `send` is public: [`Sender::try_reserve`]
//! yields a [`SendSlot`] the calling thread exclusively owns until it
//! publishes into it. A slot dropped unpublished is rolled back; the consumer
//! recycles it without ever observing a value.
//!
//! ```rust
//! use mpsc_ring::*;
//! use std::num::NonZeroUsize;
//!
//! let (tx, mut rx) = channel(NonZeroUsize::new(2).unwrap());
//!
//! tx.try_reserve().unwrap().publish("published");
//! drop(tx.try_reserve().unwrap()); // rolled back
//!
//! assert_eq!(rx.try_recv(), Ok("published"));
//! assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
//! ```

mod config;
mod control;
mod error;
mod receiver;
mod ring;
mod sender;
mod token;
mod wait;

pub use config::*;
pub use error::*;
pub use receiver::*;
pub use sender::*;
pub use token::*;

use control::ControlBlockRef;
use std::num::NonZeroUsize;

/// Opens a multi-producer single-consumer channel backed by a ring buffer
/// with the default [`Config`].
///
/// The ring can hold up to `capacity` items in flight, counting published
/// items as well as reservations not yet published. The slot array is padded
/// to the next power of two so cursors wrap with a mask, but the enforced
/// bound is exactly `capacity`.
pub fn channel<T>(capacity: NonZeroUsize) -> (Sender<T>, Receiver<T>) {
    channel_with(capacity, Config::default())
}

/// Opens a multi-producer single-consumer channel with an explicit
/// [`Config`].
pub fn channel_with<T>(capacity: NonZeroUsize, config: Config) -> (Sender<T>, Receiver<T>) {
    let ctrl = ControlBlockRef::new(capacity.get(), config);
    (Sender::new(ctrl.clone()), Receiver::new(ctrl))
}

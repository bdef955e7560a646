#![no_main]

use libfuzzer_sys::fuzz_target;
use mpsc_ring::*;
use std::{num::NonZeroUsize, thread};

fuzz_target!(|input: (Vec<u16>, u8, u8)| {
    let (data, capacity, senders) = input;
    let capacity = capacity as usize;
    let senders = senders as usize % 8;

    if let Some(capacity) = NonZeroUsize::new(capacity) {
        let (tx, mut rx) = channel::<(usize, u16)>(capacity);

        let chunk_size = if !data.is_empty() && senders > 0 {
            (data.len() + senders - 1) / senders
        } else {
            1
        };

        let chunks: Vec<&[u16]> = if senders == 0 {
            Vec::new()
        } else {
            data.chunks(chunk_size).collect()
        };

        let received = thread::scope(|s| {
            for (id, chunk) in chunks.iter().copied().enumerate() {
                let tx = tx.clone();
                s.spawn(move || {
                    for &value in chunk {
                        tx.send((id, value)).unwrap();
                    }
                });
            }

            drop(tx);

            let mut received = Vec::new();
            loop {
                match rx.recv() {
                    Ok(item) => received.push(item),
                    Err(RecvError::Disconnected) => break,
                    Err(err) => panic!("unexpected receive failure: {}", err),
                }
            }
            received
        });

        let mut per_sender = vec![Vec::new(); chunks.len()];
        for (id, value) in received {
            per_sender[id].push(value);
        }

        for (id, chunk) in chunks.iter().enumerate() {
            assert_eq!(
                per_sender[id].as_slice(),
                *chunk,
                "items from one producer arrive in their send order"
            );
        }
    }
});

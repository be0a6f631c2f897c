// Copyright (C) 2024 by GiGa infosystems
//! The process group and its collective primitives.
//!
//! Ranks are OS threads launched together by [`ProcessGroup::run`].
//! Collectives rendezvous on a shared deposit board guarded by a barrier;
//! two boards alternate by collective generation so a rank may run ahead
//! into the next collective without trampling a peer still reading the
//! last one. Point-to-point messages go through one mailbox per ordered
//! rank pair.
//!
//! A mismatched collective sequence (different order, different types) is a
//! protocol error and fatal to the whole group: it panics or deadlocks, it
//! is never silently repaired.
use crossbeam_channel::{unbounded, Receiver, Sender};
use parseis_core::{ParseisError, Report};
use std::any::Any;
use std::cell::Cell;
use std::sync::{Arc, Barrier, Mutex};

type Payload = Box<dyn Any + Send>;

struct Shared {
    barrier: Barrier,
    boards: [Mutex<Vec<Option<Payload>>>; 2],
    report: Arc<Report>,
}

/// A fixed group of ranks executing the same program.
pub struct ProcessGroup;

impl ProcessGroup {
    /// Launch `num_ranks` ranks, run `f` on each, and return the results in
    /// rank order. A panicking rank propagates its panic to the caller.
    pub fn run<T, F>(num_ranks: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(Communicator) -> T + Sync,
    {
        assert!(num_ranks > 0);

        let shared = Arc::new(Shared {
            barrier: Barrier::new(num_ranks),
            boards: [
                Mutex::new((0..num_ranks).map(|_| None).collect()),
                Mutex::new((0..num_ranks).map(|_| None).collect()),
            ],
            report: Arc::new(Report::new()),
        });

        let mut senders: Vec<Vec<Sender<Payload>>> =
            (0..num_ranks).map(|_| Vec::with_capacity(num_ranks)).collect();
        let mut receivers: Vec<Vec<Receiver<Payload>>> =
            (0..num_ranks).map(|_| Vec::with_capacity(num_ranks)).collect();
        for from in 0..num_ranks {
            for to in 0..num_ranks {
                let (tx, rx) = unbounded();
                senders[from].push(tx);
                receivers[to].push(rx);
            }
        }

        let comms: Vec<Communicator> = senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| Communicator {
                rank,
                num_ranks,
                shared: shared.clone(),
                senders,
                receivers,
                generation: Cell::new(0),
            })
            .collect();

        std::thread::scope(|scope| {
            let f = &f;
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| scope.spawn(move || f(comm)))
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(value) => value,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }
}

/// One rank's handle onto the group.
///
/// All collectives are synchronising: no rank leaves until every rank has
/// entered.
pub struct Communicator {
    rank: usize,
    num_ranks: usize,
    shared: Arc<Shared>,
    senders: Vec<Sender<Payload>>,
    receivers: Vec<Receiver<Payload>>,
    generation: Cell<usize>,
}

impl Communicator {
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn num_ranks(&self) -> usize {
        self.num_ranks
    }

    /// Block until every rank has reached this barrier.
    pub fn barrier(&self) {
        self.shared.barrier.wait();
    }

    fn next_parity(&self) -> usize {
        let generation = self.generation.get();
        self.generation.set(generation + 1);
        generation % 2
    }

    /// Gather one value from every rank; every rank receives the values in
    /// rank order.
    pub fn gather<T: Clone + Send + 'static>(&self, value: T) -> Vec<T> {
        let parity = self.next_parity();
        {
            let mut board = self.shared.boards[parity]
                .lock()
                .expect("collective board poisoned");
            board[self.rank] = Some(Box::new(value));
        }
        self.barrier();

        let board = self.shared.boards[parity]
            .lock()
            .expect("collective board poisoned");
        (0..self.num_ranks)
            .map(|r| {
                board[r]
                    .as_ref()
                    .expect("collective entered out of step")
                    .downcast_ref::<T>()
                    .expect("collective type mismatch across ranks")
                    .clone()
            })
            .collect()
    }

    /// Gather a slice from every rank, concatenated in rank order.
    pub fn gather_vec<T: Clone + Send + 'static>(&self, values: &[T]) -> Vec<T> {
        self.gather(values.to_vec()).into_iter().flatten().collect()
    }

    pub fn sum<T>(&self, value: T) -> T
    where
        T: Clone + Send + 'static + std::iter::Sum<T>,
    {
        self.gather(value).into_iter().sum()
    }

    pub fn max<T>(&self, value: T) -> T
    where
        T: Clone + Send + PartialOrd + 'static,
    {
        self.gather(value)
            .into_iter()
            .reduce(|a, b| if b > a { b } else { a })
            .expect("non-empty group")
    }

    pub fn min<T>(&self, value: T) -> T
    where
        T: Clone + Send + PartialOrd + 'static,
    {
        self.gather(value)
            .into_iter()
            .reduce(|a, b| if b < a { b } else { a })
            .expect("non-empty group")
    }

    /// The exclusive prefix sum of `local` over the ranks: the global
    /// offset at which this rank's slice begins.
    pub fn offset(&self, local: usize) -> usize {
        self.gather(local).iter().take(self.rank).sum()
    }

    /// Logical-or reduction.
    pub fn any(&self, flag: bool) -> bool {
        self.gather(flag).into_iter().any(|f| f)
    }

    /// Logical-and reduction.
    pub fn all(&self, flag: bool) -> bool {
        self.gather(flag).into_iter().all(|f| f)
    }

    /// Post a message to `to`'s mailbox. Never blocks.
    pub fn send_to<T: Send + 'static>(&self, to: usize, value: T) {
        self.senders[to]
            .send(Box::new(value))
            .expect("peer rank hung up");
    }

    /// Take the next message `from` posted to this rank. Blocks until one
    /// arrives.
    pub fn recv_from<T: Send + 'static>(&self, from: usize) -> T {
        let payload = self.receivers[from].recv().expect("peer rank hung up");
        *payload
            .downcast::<T>()
            .expect("message type mismatch between ranks")
    }

    /// The group's shared status report.
    pub fn report(&self) -> &Report {
        &self.shared.report
    }

    /// The collective polling point: fails on every rank if any rank has
    /// recorded a fatal entry.
    pub fn assert_ok(&self) -> Result<(), ParseisError> {
        let failed = self.any(self.shared.report.has_error());
        if failed {
            Err(ParseisError::ReportedFailure {
                entries: self.shared.report.error_messages(),
            })
        } else {
            Ok(())
        }
    }
}

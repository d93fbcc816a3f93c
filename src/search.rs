//! Parallel search for a fixed number of probable primes.
//!
//! A [SearchCoordinator] spawns one scoped worker thread per configured unit.
//! Every worker loops generate → test until the shared [SearchState] is
//! stopped. A worker that finds a prime claims the next sequence index from
//! the atomic counter and ships the record over a channel. The calling thread
//! drains that channel into a buffer keyed by index and, once all of
//! `1..=count` are present, feeds them to the [ResultSink] in order. A search
//! that fails part way delivers nothing.
//!
//! Workers are never interrupted: once the last index is claimed they notice
//! the stop flag at the top of their next iteration, and any prime they find
//! in the meantime gets no index and is dropped.

use crate::error::{Error, Result};
use crate::primality::PrimalityTester;
use crate::rand::{CandidateGenerator, OsRandom};
use crate::traits::{PrimalityTestConfig, RandomSource, ResultSink};
use crossbeam::channel::{self, Sender};
use num_bigint::BigUint;
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, trace, warn};

/// A probable prime together with its 1-based discovery index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimeRecord {
    pub index: usize,
    pub value: BigUint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    /// Fewer than `count` indices claimed, workers keep dispatching
    Running,
    /// All indices claimed, in-flight tests are finishing
    Draining,
    /// Every worker has returned
    Done,
}

/// Counters shared by all workers of one search
#[derive(Debug)]
pub struct SearchState {
    target: usize,
    found: AtomicUsize,
    stopped: AtomicBool,
    active: AtomicUsize,
}

impl SearchState {
    pub fn new(target: usize, workers: usize) -> Self {
        Self {
            target,
            found: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
            active: AtomicUsize::new(workers),
        }
    }

    /// Claim the next sequence index for a freshly found prime. Returns `None`
    /// once `target` indices have been handed out.
    pub fn claim(&self) -> Option<usize> {
        let index = self.found.fetch_add(1, Ordering::AcqRel) + 1;
        if index >= self.target {
            self.stopped.store(true, Ordering::Release);
        }
        (index <= self.target).then(|| index)
    }

    /// Number of indices handed out so far
    pub fn found(&self) -> usize {
        self.found.load(Ordering::Acquire).min(self.target)
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Ask every worker to stop after its current candidate
    pub fn cancel(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub(crate) fn worker_done(&self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn phase(&self) -> SearchPhase {
        if !self.is_stopped() {
            SearchPhase::Running
        } else if self.active.load(Ordering::Acquire) > 0 {
            SearchPhase::Draining
        } else {
            SearchPhase::Done
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// Random bytes drawn per candidate
    pub byte_length: usize,
    /// Number of primes to find
    pub count: usize,
    pub primality: PrimalityTestConfig,
    /// Worker threads, 0 means one per logical CPU
    pub workers: usize,
}

impl SearchConfig {
    pub fn new(byte_length: usize, count: usize) -> Self {
        Self {
            byte_length,
            count,
            primality: PrimalityTestConfig::default(),
            workers: 0,
        }
    }

    pub fn with_witnesses(mut self, witnesses: usize) -> Self {
        self.primality = PrimalityTestConfig::new(witnesses);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn worker_count(&self) -> usize {
        match self.workers {
            0 => num_cpus::get().max(1),
            n => n,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.byte_length == 0 {
            return Err(Error::invalid("byte length must be at least 1"));
        }
        if self.count == 0 {
            return Err(Error::invalid("prime count must be at least 1"));
        }
        Ok(())
    }
}

pub struct SearchCoordinator<S> {
    source: S,
    config: SearchConfig,
}

impl<S: RandomSource> SearchCoordinator<S> {
    pub fn new(source: S, config: SearchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { source, config })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search until `count` probable primes are found, then hand them to `sink`
    /// in index order.
    ///
    /// Records are held back until every index `1..=count` has arrived, so a
    /// failed search delivers nothing. The sink may stop delivery early with
    /// [ControlFlow::Break]. Returns the number of delivered records, which is
    /// `count` unless the sink stopped. A randomness failure cancels the search
    /// and is returned unless all records were already complete.
    pub fn run<K: ResultSink + ?Sized>(&self, sink: &mut K) -> Result<usize> {
        let SearchConfig {
            byte_length, count, ..
        } = self.config;
        let workers = self.config.worker_count();

        // nothing is dispatched on a source that cannot deliver
        self.source.fill_bytes(&mut [0u8; 1])?;

        debug!(byte_length, count, workers, "search started");
        let state = SearchState::new(count, workers);
        let (tx, rx) = channel::unbounded();

        thread::scope(|scope| {
            let (source, config, state) = (&self.source, &self.config, &state);
            for worker_id in 0..workers {
                let tx = tx.clone();
                scope.spawn(move || worker_loop(worker_id, source, config, state, tx));
            }
            drop(tx);

            let mut pending = BTreeMap::new();
            let mut complete = false;
            let mut delivered = 0;
            let mut failure = None;
            let mut draining = false;

            // ends once every worker dropped its sender
            for message in rx {
                match message {
                    Ok(PrimeRecord { index, value }) => {
                        pending.insert(index, value);
                        if pending.len() == count {
                            complete = true;
                            delivered = deliver(sink, std::mem::take(&mut pending));
                        }
                    }
                    Err(err) => {
                        failure.get_or_insert(err);
                    }
                }
                if !draining && state.is_stopped() {
                    draining = true;
                    debug!(found = state.found(), "search draining");
                }
            }

            debug!(delivered, "search done");
            match failure {
                Some(err) if !complete => Err(err),
                Some(err) => {
                    warn!(%err, "randomness failure after all primes were found");
                    Ok(delivered)
                }
                None => Ok(delivered),
            }
        })
    }

    /// Run the search and collect the records. Nothing is returned on failure.
    pub fn find_primes(&self) -> Result<Vec<PrimeRecord>> {
        // count is caller supplied, only small searches are preallocated
        let mut records = Vec::with_capacity(self.config.count.min(1024));
        self.run(&mut |record: PrimeRecord| {
            records.push(record);
            ControlFlow::Continue(())
        })?;
        Ok(records)
    }
}

fn deliver<K: ResultSink + ?Sized>(sink: &mut K, records: BTreeMap<usize, BigUint>) -> usize {
    let mut delivered = 0;
    for (index, value) in records {
        delivered += 1;
        if sink.accept(PrimeRecord { index, value }).is_break() {
            debug!(delivered, "sink stopped delivery");
            break;
        }
    }
    delivered
}

/// Find `count` probable primes of up to `byte_length` bytes using the operating
/// system randomness and one worker per CPU.
pub fn find_primes(byte_length: usize, count: usize) -> Result<Vec<PrimeRecord>> {
    SearchCoordinator::new(OsRandom, SearchConfig::new(byte_length, count))?.find_primes()
}

fn worker_loop<S: RandomSource>(
    worker_id: usize,
    source: &S,
    config: &SearchConfig,
    state: &SearchState,
    tx: Sender<Result<PrimeRecord>>,
) {
    trace!("Worker {worker_id} started");

    let generator = CandidateGenerator::new(source);
    let tester = PrimalityTester::new(source, config.primality);
    let mut tested = 0u64;

    while !state.is_stopped() {
        let outcome = generator
            .generate(config.byte_length)
            .and_then(|candidate| {
                let prime = tester.is_probably_prime(&candidate)?;
                Ok(prime.then(|| candidate))
            });
        tested += 1;

        match outcome {
            Ok(Some(value)) => {
                // overshoot from racing workers gets no index
                if let Some(index) = state.claim() {
                    trace!(worker_id, index, "prime found");
                    if tx.send(Ok(PrimeRecord { index, value })).is_err() {
                        break;
                    }
                }
            }
            Ok(None) => {}
            Err(err) => {
                state.cancel();
                let _ = tx.send(Err(err));
                break;
            }
        }
    }

    state.worker_done();
    trace!("Worker {worker_id} stopped after {tested} candidates");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand::tests::{seeded, BrokenSource, ExhaustibleSource};
    use std::collections::BTreeSet;

    fn recheck(value: &BigUint) -> bool {
        PrimalityTester::new(OsRandom, PrimalityTestConfig::strict())
            .is_probably_prime(value)
            .unwrap()
    }

    fn assert_valid(records: &[PrimeRecord], byte_length: usize, count: usize) {
        assert_eq!(records.len(), count);
        let indices: Vec<_> = records.iter().map(|r| r.index).collect();
        assert_eq!(indices, (1..=count).collect::<Vec<_>>());
        for r in records {
            assert!(r.value.bits() <= 8 * byte_length as u64);
            assert!(recheck(&r.value), "{} is not prime", r.value);
        }
    }

    #[test]
    fn single_32bit_prime() {
        let records = find_primes(4, 1).unwrap();
        assert_valid(&records, 4, 1);
        assert!(records[0].value <= BigUint::from(u32::MAX));
    }

    #[test]
    fn five_64bit_primes() {
        let records = find_primes(8, 5).unwrap();
        assert_valid(&records, 8, 5);
        let distinct: BTreeSet<_> = records.iter().map(|r| &r.value).collect();
        assert_eq!(distinct.len(), 5);
    }

    #[test]
    fn large_primes() {
        let config = SearchConfig::new(64, 2).with_workers(4);
        let records = SearchCoordinator::new(OsRandom, config)
            .unwrap()
            .find_primes()
            .unwrap();
        assert_valid(&records, 64, 2);
    }

    #[test]
    fn sink_sees_index_order() {
        let config = SearchConfig::new(4, 40).with_workers(8).with_witnesses(5);
        let coordinator = SearchCoordinator::new(OsRandom, config).unwrap();
        let mut seen = Vec::new();
        let delivered = coordinator
            .run(&mut |r: PrimeRecord| {
                seen.push(r);
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(delivered, 40);
        assert_valid(&seen, 4, 40);
    }

    #[test]
    fn single_worker_with_locked_rng() {
        let source = seeded(42);
        let config = SearchConfig::new(6, 3).with_workers(1);
        let records = SearchCoordinator::new(&source, config)
            .unwrap()
            .find_primes()
            .unwrap();
        assert_valid(&records, 6, 3);
    }

    #[test]
    fn more_workers_than_primes() {
        let config = SearchConfig::new(4, 2).with_workers(16);
        let records = SearchCoordinator::new(OsRandom, config)
            .unwrap()
            .find_primes()
            .unwrap();
        assert_valid(&records, 4, 2);
    }

    #[test]
    fn invalid_input() {
        for (bytes, count) in [(0, 1), (4, 0), (0, 0)] {
            let result = SearchCoordinator::new(OsRandom, SearchConfig::new(bytes, count));
            assert!(matches!(result, Err(Error::InvalidInput(_))));
            assert!(matches!(find_primes(bytes, count), Err(Error::InvalidInput(_))));
        }
    }

    #[test]
    fn unavailable_randomness_yields_nothing() {
        let coordinator = SearchCoordinator::new(BrokenSource, SearchConfig::new(4, 3)).unwrap();
        let mut seen = 0;
        let result = coordinator.run(&mut |_: PrimeRecord| {
            seen += 1;
            ControlFlow::Continue(())
        });
        assert!(matches!(result, Err(Error::RandomnessUnavailable(_))));
        assert_eq!(seen, 0);
    }

    #[test]
    fn randomness_lost_mid_search() {
        // the probe and a handful of candidates succeed, then the source dies
        let config = SearchConfig::new(64, 50).with_workers(2);
        let coordinator = SearchCoordinator::new(ExhaustibleSource::new(5), config).unwrap();
        assert!(matches!(
            coordinator.find_primes(),
            Err(Error::RandomnessUnavailable(_))
        ));
    }

    #[test]
    fn truncated_search_delivers_nothing() {
        // enough reads for hundreds of 32-bit primes, far from the target
        let config = SearchConfig::new(4, 100_000).with_workers(2);
        let coordinator = SearchCoordinator::new(ExhaustibleSource::new(20_000), config).unwrap();
        let mut seen = 0;
        let result = coordinator.run(&mut |_: PrimeRecord| {
            seen += 1;
            ControlFlow::Continue(())
        });
        assert!(matches!(result, Err(Error::RandomnessUnavailable(_))));
        assert_eq!(seen, 0);
    }

    #[test]
    fn huge_count_is_not_preallocated() {
        let config = SearchConfig::new(4, usize::MAX).with_workers(2);
        let coordinator = SearchCoordinator::new(ExhaustibleSource::new(500), config).unwrap();
        assert!(matches!(
            coordinator.find_primes(),
            Err(Error::RandomnessUnavailable(_))
        ));
    }

    #[test]
    fn sink_can_stop_delivery() {
        let config = SearchConfig::new(4, 10).with_workers(4);
        let coordinator = SearchCoordinator::new(OsRandom, config).unwrap();
        let mut seen = Vec::new();
        let delivered = coordinator
            .run(&mut |r: PrimeRecord| {
                seen.push(r.index);
                if seen.len() < 3 {
                    ControlFlow::Continue(())
                } else {
                    ControlFlow::Break(())
                }
            })
            .unwrap();
        assert_eq!(delivered, 3);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn claims_are_gap_free() {
        let state = SearchState::new(50, 8);
        let claimed: Vec<usize> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| (0..100).filter_map(|_| state.claim()).collect::<Vec<_>>()))
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });
        let claimed: BTreeSet<_> = claimed.into_iter().collect();
        assert_eq!(claimed, (1..=50).collect::<BTreeSet<_>>());
        assert_eq!(state.found(), 50);
        assert!(state.is_stopped());
    }

    #[test]
    fn phase_transitions() {
        let state = SearchState::new(2, 2);
        assert_eq!(state.phase(), SearchPhase::Running);
        assert_eq!(state.claim(), Some(1));
        assert_eq!(state.phase(), SearchPhase::Running);
        assert_eq!(state.claim(), Some(2));
        assert_eq!(state.phase(), SearchPhase::Draining);
        assert_eq!(state.claim(), None);
        state.worker_done();
        assert_eq!(state.phase(), SearchPhase::Draining);
        state.worker_done();
        assert_eq!(state.phase(), SearchPhase::Done);
        assert_eq!(state.found(), 2);

        let state = SearchState::new(5, 1);
        state.cancel();
        assert_eq!(state.phase(), SearchPhase::Draining);
    }

    #[test]
    fn config_defaults() {
        let config = SearchConfig::new(8, 3);
        assert_eq!(config.primality.rounds(), 10);
        assert!(config.worker_count() >= 1);
        assert_eq!(config.with_workers(3).worker_count(), 3);
        assert_eq!(config.with_witnesses(0).primality.rounds(), 10);
        assert!(config.validate().is_ok());
    }
}

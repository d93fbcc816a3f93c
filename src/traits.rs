use crate::error::Result;
use crate::search::PrimeRecord;
use std::ops::ControlFlow;
use std::sync::Arc;

/// A cryptographically secure byte source shared by every worker of a search.
///
/// Implementations must be safe to call from many threads at once, either because
/// each call is independent (like reading the OS generator) or because they
/// serialize access internally.
pub trait RandomSource: Send + Sync {
    /// Fill `dest` entirely with random bytes, or fail with
    /// [Error::RandomnessUnavailable][crate::Error::RandomnessUnavailable].
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()>;
}

impl<S: RandomSource + ?Sized> RandomSource for &S {
    #[inline]
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        (**self).fill_bytes(dest)
    }
}

impl<S: RandomSource + ?Sized> RandomSource for Arc<S> {
    #[inline]
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        (**self).fill_bytes(dest)
    }
}

/// Consumer of the primes found by a search.
///
/// The coordinator calls this from a single thread in strict index order, so
/// implementations need no synchronization of their own. Returning
/// [ControlFlow::Break] drops the remaining records.
pub trait ResultSink {
    fn accept(&mut self, record: PrimeRecord) -> ControlFlow<()>;
}

impl<F: FnMut(PrimeRecord) -> ControlFlow<()>> ResultSink for F {
    #[inline]
    fn accept(&mut self, record: PrimeRecord) -> ControlFlow<()> {
        self(record)
    }
}

/// Outcome of a primality test
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primality {
    Yes,
    No,
    /// carrying the probability of the number being a prime
    Probable(f32),
}

impl Primality {
    /// Check whether the number is either a sure or a probable prime
    #[inline]
    pub fn probably(self) -> bool {
        !matches!(self, Primality::No)
    }
}

/// Configuration of the randomized Miller-Rabin rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimalityTestConfig {
    /// Number of random witnesses tried. Zero falls back to the default.
    pub witnesses: usize,
}

impl PrimalityTestConfig {
    pub const DEFAULT_WITNESSES: usize = 10;

    pub fn new(witnesses: usize) -> Self {
        Self { witnesses }
    }

    /// A configuration suited for generating long-lived key material
    pub fn strict() -> Self {
        Self { witnesses: 40 }
    }

    /// Witness count actually used by the tester
    pub fn rounds(&self) -> usize {
        if self.witnesses == 0 {
            Self::DEFAULT_WITNESSES
        } else {
            self.witnesses
        }
    }

    /// Lower bound of the probability that a number passing every round is prime,
    /// i.e. `1 - 4^-rounds`.
    pub fn confidence(&self) -> f32 {
        1. - 0.25f32.powi(self.rounds().min(i32::MAX as usize) as i32)
    }
}

impl Default for PrimalityTestConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WITNESSES)
    }
}

//! Secure randomness providers and the candidate generator built on them

use crate::error::{Error, Result};
use crate::traits::RandomSource;
use num_bigint::BigUint;
use parking_lot::Mutex;
use rand::rngs::{OsRng, StdRng};
use rand::{CryptoRng, RngCore, SeedableRng};

/// The operating system CSPRNG. Every call is an independent read, so a single
/// instance can be shared by any number of threads without locking.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    #[inline]
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        OsRng.try_fill_bytes(dest).map_err(Error::from)
    }
}

/// A userspace CSPRNG made shareable by a mutex. The lock is held only while
/// bytes are copied out, never across a primality test.
#[derive(Debug)]
pub struct LockedRng<R>(Mutex<R>);

impl<R: RngCore + CryptoRng> LockedRng<R> {
    pub fn new(rng: R) -> Self {
        Self(Mutex::new(rng))
    }
}

impl LockedRng<StdRng> {
    /// Seed a [StdRng] from the operating system
    pub fn from_os() -> Result<Self> {
        Ok(Self::new(StdRng::from_rng(OsRng)?))
    }
}

impl<R: RngCore + CryptoRng + Send> RandomSource for LockedRng<R> {
    #[inline]
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        self.0.lock().try_fill_bytes(dest).map_err(Error::from)
    }
}

/// Draws fixed-length unsigned candidates from a [RandomSource]
#[derive(Debug, Clone)]
pub struct CandidateGenerator<S> {
    source: S,
}

impl<S: RandomSource> CandidateGenerator<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Draw `byte_length` random bytes and read them as a big-endian unsigned
    /// integer in `[0, 2^(8*byte_length))`.
    ///
    /// No filtering is applied: zero and even values are returned as drawn.
    pub fn generate(&self, byte_length: usize) -> Result<BigUint> {
        if byte_length == 0 {
            return Err(Error::invalid("byte length must be at least 1"));
        }
        let mut bytes = vec![0u8; byte_length];
        self.source.fill_bytes(&mut bytes)?;
        Ok(BigUint::from_bytes_be(&bytes))
    }

    /// Draw a uniform value in `[low, high)` by rejection sampling.
    ///
    /// Each draw spans exactly the bit length of `high`, which keeps the
    /// acceptance rate above `(high - low) / (2 * high)`.
    pub fn generate_range(&self, low: &BigUint, high: &BigUint) -> Result<BigUint> {
        if low >= high {
            return Err(Error::invalid(format!("empty sampling range [{}, {})", low, high)));
        }

        let bits = high.bits();
        let mut bytes = vec![0u8; ((bits + 7) / 8) as usize];
        let mask = u8::MAX >> ((8 - bits % 8) % 8);
        loop {
            self.source.fill_bytes(&mut bytes)?;
            bytes[0] &= mask;
            let value = BigUint::from_bytes_be(&bytes);
            if &value >= low && &value < high {
                break Ok(value);
            }
        }
    }
}

//! Randomized Miller-Rabin testing of arbitrary precision candidates

use crate::error::Result;
use crate::rand::CandidateGenerator;
use crate::tables::{SMALL_PRIMES, SMALL_PRIMES_BOUND};
use crate::traits::{Primality, PrimalityTestConfig, RandomSource};
use num_bigint::BigUint;
use num_integer::Integer;
use num_modular::{ModularPow, ModularUnaryOps};
use num_traits::{One, ToPrimitive, Zero};

/// Test if `target` is a strong probable prime to `base`.
///
/// `base` should lie in `[2, target - 2)`. Targets below 5 leave no such base
/// and are answered directly.
pub fn is_sprp(target: &BigUint, base: &BigUint) -> bool {
    if let Some(small) = target.to_u8() {
        if small < 5 {
            return small == 2 || small == 3;
        }
    }

    // find 2^shift*u + 1 = n
    let tm1 = target - 1u8;
    let shift = tm1.trailing_zeros().unwrap_or(0);
    let u = &tm1 >> shift;
    sprp_round(target, &tm1, &u, shift, base)
}

fn sprp_round(target: &BigUint, tm1: &BigUint, u: &BigUint, shift: u64, base: &BigUint) -> bool {
    let mut x = base.powm(u, target);
    if x.is_one() || &x == tm1 {
        return true;
    }

    for _ in 1..shift {
        x = (&x).sqm(target);
        if x.is_one() {
            return false;
        }
        if &x == tm1 {
            return true;
        }
    }
    false
}

/// Miller-Rabin tester drawing its witnesses from a shared [RandomSource]
#[derive(Debug, Clone)]
pub struct PrimalityTester<S> {
    rng: CandidateGenerator<S>,
    config: PrimalityTestConfig,
}

impl<S: RandomSource> PrimalityTester<S> {
    pub fn new(source: S, config: PrimalityTestConfig) -> Self {
        Self {
            rng: CandidateGenerator::new(source),
            config,
        }
    }

    pub fn config(&self) -> PrimalityTestConfig {
        self.config
    }

    /// Classify `target`. Small numbers and numbers with a small factor are
    /// decided exactly, everything else goes through the configured number of
    /// random Miller-Rabin rounds.
    pub fn test(&self, target: &BigUint) -> Result<Primality> {
        // shortcuts
        if let Some(small) = target.to_u32() {
            if let Ok(u) = u8::try_from(small) {
                return Ok(match SMALL_PRIMES.binary_search(&u) {
                    Ok(_) => Primality::Yes,
                    Err(_) => Primality::No,
                });
            }
        }
        if target.is_even() {
            return Ok(Primality::No);
        }

        // trial division with the rest of the table
        for &p in SMALL_PRIMES.iter().skip(1) {
            if (target % p).is_zero() {
                return Ok(Primality::No);
            }
        }
        if matches!(target.to_u32(), Some(v) if v < SMALL_PRIMES_BOUND) {
            return Ok(Primality::Yes);
        }

        Ok(if self.miller_rabin(target, self.config.rounds())? {
            Primality::Probable(self.config.confidence())
        } else {
            Primality::No
        })
    }

    /// Shorthand for `test(target)?.probably()`
    #[inline]
    pub fn is_probably_prime(&self, target: &BigUint) -> Result<bool> {
        Ok(self.test(target)?.probably())
    }

    /// Run `rounds` Miller-Rabin rounds with witnesses drawn uniformly from
    /// `[2, target - 2)`, without any prefiltering.
    ///
    /// Numbers below 5 leave no room for a witness and are answered directly.
    pub fn miller_rabin(&self, target: &BigUint, rounds: usize) -> Result<bool> {
        if let Some(small) = target.to_u8() {
            if small < 5 {
                return Ok(small == 2 || small == 3);
            }
        }

        let tm1 = target - 1u8;
        let shift = tm1.trailing_zeros().unwrap_or(0);
        let u = &tm1 >> shift;
        let low = BigUint::from(2u8);
        let high = target - 2u8;

        for _ in 0..rounds {
            let base = self.rng.generate_range(&low, &high)?;
            if !sprp_round(target, &tm1, &u, shift, &base) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

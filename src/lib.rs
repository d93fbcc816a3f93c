//! Parallel generation of large probable primes.
//!
//! Candidates are drawn from a shared [RandomSource], filtered by trial division
//! and verified with randomized Miller-Rabin rounds. [SearchCoordinator] fans the
//! work out across threads and delivers exactly `count` [PrimeRecord]s in
//! index order.
//!
//! ```no_run
//! let records = primegen::find_primes(64, 2)?;
//! for r in records {
//!     println!("{}: {}", r.index, r.value);
//! }
//! # Ok::<(), primegen::Error>(())
//! ```

mod error;
mod primality;
mod rand;
mod search;
mod tables;
mod traits;

pub use error::{Error, Result};
pub use primality::{is_sprp, PrimalityTester};
pub use self::rand::{CandidateGenerator, LockedRng, OsRandom};
pub use search::{find_primes, PrimeRecord, SearchConfig, SearchCoordinator, SearchPhase, SearchState};
pub use traits::{Primality, PrimalityTestConfig, RandomSource, ResultSink};

pub mod detail {
    pub use super::tables::{SMALL_PRIMES, SMALL_PRIMES_BOUND};
}

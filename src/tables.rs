//! Precomputed tables

/// All primes below 256
pub const SMALL_PRIMES: [u8; 54] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89,
    97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191,
    193, 197, 199, 211, 223, 227, 229, 233, 239, 241, 251,
];

/// Square of the first prime after the table. An odd number below this bound with
/// no factor in [SMALL_PRIMES] is a prime.
pub const SMALL_PRIMES_BOUND: u32 = 257 * 257;

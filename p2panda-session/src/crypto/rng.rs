// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Mutex;

use rand_chacha::rand_core::{SeedableRng, TryRngCore};
use thiserror::Error;

/// Cryptographically-secure random number generator that uses the ChaCha algorithm.
///
/// The generator is guarded by a mutex so one instance can be shared between sessions which are
/// established on different threads.
#[derive(Debug)]
pub struct Rng {
    rng: Mutex<rand_chacha::ChaCha20Rng>,
}

impl Default for Rng {
    fn default() -> Self {
        Self {
            rng: Mutex::new(rand_chacha::ChaCha20Rng::from_os_rng()),
        }
    }
}

#[cfg(any(test, feature = "test_utils"))]
impl Rng {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            rng: Mutex::new(rand_chacha::ChaCha20Rng::from_seed(seed)),
        }
    }
}

impl Rng {
    pub fn random_array<const N: usize>(&self) -> Result<[u8; N], RngError> {
        let mut rng = self.rng.lock().map_err(|_| RngError::LockPoisoned)?;
        let mut out = [0u8; N];
        rng.try_fill_bytes(&mut out)
            .map_err(|_| RngError::NotEnoughRandomness)?;
        Ok(out)
    }

    /// Returns a uniformly distributed number in the range `0..bound`.
    ///
    /// Uses rejection sampling to avoid the modulo bias.
    pub fn random_below(&self, bound: u32) -> Result<u32, RngError> {
        if bound == 0 {
            return Err(RngError::EmptyRange);
        }

        let zone = u32::MAX - (u32::MAX % bound);
        loop {
            let value = u32::from_le_bytes(self.random_array()?);
            if value < zone {
                return Ok(value % bound);
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum RngError {
    #[error("rng lock is poisoned")]
    LockPoisoned,

    #[error("unable to collect enough randomness")]
    NotEnoughRandomness,

    #[error("can not sample from an empty range")]
    EmptyRange,
}

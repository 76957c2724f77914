//! Operating-system randomness.

use oxtls_crypto::{Error, Random, Result};
use rand_core::{OsRng, RngCore};

/// CSPRNG backed by the operating system (`getrandom`).
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl Random for OsRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|_| Error::RandomGenerationFailed)
    }
}

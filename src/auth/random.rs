//! Entropy capability used for refresh tokens.

use rand_core::{OsRng, RngCore};

/// Source of random bytes.  Injected into the token manager so tests can
/// pin token values.
pub trait RandomSource: Send + Sync {
    fn fill(&self, buf: &mut [u8]);
}

/// Operating-system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }
}

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng, RngCore};
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::cell::UnsafeCell;

thread_local! {
    static RNG: UnsafeCell<ChaCha20Rng> = UnsafeCell::new(ChaCha20Rng::from_seed(OsRng.gen()));
}

/// Handle to a per-thread ChaCha20 generator seeded from the operating system.
///
/// `SecureRng` is zero-sized; every call reaches into the calling thread's own generator,
/// so it can be created wherever an `Rng` is needed without any shared state.
#[derive(Clone, Copy, Debug, Default)]
pub struct SecureRng;

impl SecureRng {
    pub fn next_u128() -> u128 {
        let mut bytes = [0u8; 16];
        SecureRng.fill_bytes(&mut bytes);
        u128::from_le_bytes(bytes)
    }
}

impl RngCore for SecureRng {
    fn next_u32(&mut self) -> u32 {
        // Each thread owns its RNG and no reference escapes the closure
        RNG.with(|rng| unsafe { (*rng.get()).next_u32() })
    }

    fn next_u64(&mut self) -> u64 {
        RNG.with(|rng| unsafe { (*rng.get()).next_u64() })
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        RNG.with(|rng| unsafe { (*rng.get()).fill_bytes(dest) })
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        // ChaCha20Rng never fails to fill
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for SecureRng {}

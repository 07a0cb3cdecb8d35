use crate::error::GeneratorError;
use jiff::Timestamp;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use snaplink_core::shortcode::MAX_LENGTH;
use snaplink_core::ShortCode;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use typed_builder::TypedBuilder;

/// The 62 symbols a generated code is drawn from.
pub const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of generated codes unless configured otherwise.
pub const DEFAULT_LENGTH: usize = 6;

// Separates generators built within the same clock tick.
static INSTANCES: AtomicU64 = AtomicU64::new(0);

/// Configures a [`RandomGenerator`].
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct RandomGeneratorSettings {
    /// Number of characters in every generated code.
    #[builder(default = DEFAULT_LENGTH)]
    pub length: usize,
    /// Fixed seed for reproducible sequences. Defaults to the construction time.
    #[builder(default, setter(strip_option))]
    pub seed: Option<u64>,
}

impl Default for RandomGeneratorSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Fixed-length random code generator over [`ALPHABET`].
///
/// Each character is drawn uniformly with replacement from a `StdRng` owned by
/// this instance, so separate generators never contend on a shared source.
/// This is not a security token generator: codes only need to avoid
/// collisions, not to be unpredictable.
pub struct RandomGenerator {
    length: usize,
    rng: Mutex<StdRng>,
}

impl RandomGenerator {
    pub fn new(settings: RandomGeneratorSettings) -> Result<Self, GeneratorError> {
        if settings.length == 0 || settings.length > MAX_LENGTH {
            return Err(GeneratorError::InvalidLength {
                length: settings.length,
            });
        }

        let seed = settings.seed.unwrap_or_else(clock_seed);

        Ok(Self {
            length: settings.length,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Draws the next candidate code.
    pub fn next_code(&self) -> ShortCode {
        let mut rng = self.rng.lock();
        let code: String = (0..self.length)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();
        ShortCode::new_unchecked(code)
    }
}

impl fmt::Debug for RandomGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomGenerator")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

fn clock_seed() -> u64 {
    let nanos = Timestamp::now().as_nanosecond() as u64;
    let instance = INSTANCES.fetch_add(1, Ordering::Relaxed);
    nanos ^ instance.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn seeded(length: usize, seed: u64) -> RandomGenerator {
        let settings = RandomGeneratorSettings::builder()
            .length(length)
            .seed(seed)
            .build();
        RandomGenerator::new(settings).unwrap()
    }

    #[test]
    fn default_length_is_six() {
        let generator = RandomGenerator::new(RandomGeneratorSettings::default()).unwrap();
        assert_eq!(generator.length(), 6);
        assert_eq!(generator.next_code().as_str().len(), 6);
    }

    #[test]
    fn custom_length_is_respected() {
        let generator = seeded(11, 7);
        for _ in 0..100 {
            assert_eq!(generator.next_code().as_str().len(), 11);
        }
    }

    #[test]
    fn zero_length_is_rejected() {
        let settings = RandomGeneratorSettings::builder().length(0).build();
        let err = RandomGenerator::new(settings).unwrap_err();
        assert_eq!(err, GeneratorError::InvalidLength { length: 0 });
    }

    #[test]
    fn overlong_length_is_rejected() {
        let settings = RandomGeneratorSettings::builder().length(33).build();
        let err = RandomGenerator::new(settings).unwrap_err();
        assert_eq!(err, GeneratorError::InvalidLength { length: 33 });

        assert_eq!(seeded(MAX_LENGTH, 3).next_code().as_str().len(), MAX_LENGTH);
    }

    #[test]
    fn codes_only_use_the_alphabet() {
        let generator = seeded(6, 42);
        for _ in 0..1_000 {
            let code = generator.next_code();
            assert!(code.as_str().bytes().all(|b| ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn every_symbol_shows_up() {
        let generator = seeded(32, 1);
        let mut seen = HashSet::new();
        for _ in 0..2_000 {
            seen.extend(generator.next_code().as_str().bytes());
        }
        assert_eq!(seen.len(), ALPHABET.len());
    }

    #[test]
    fn same_seed_same_sequence() {
        let a = seeded(6, 1234);
        let b = seeded(6, 1234);
        for _ in 0..50 {
            assert_eq!(a.next_code(), b.next_code());
        }
    }

    #[test]
    fn independent_instances_diverge() {
        let a = RandomGenerator::new(RandomGeneratorSettings::default()).unwrap();
        let b = RandomGenerator::new(RandomGeneratorSettings::default()).unwrap();
        let left: Vec<_> = (0..10).map(|_| a.next_code()).collect();
        let right: Vec<_> = (0..10).map(|_| b.next_code()).collect();
        assert_ne!(left, right);
    }

    #[test]
    fn tight_loop_rarely_repeats() {
        let generator = seeded(6, 99);
        let codes: HashSet<_> = (0..1_000).map(|_| generator.next_code()).collect();
        assert!(codes.len() >= 999);
    }
}

//! Bucket name derivation

use rand::Rng;

const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SUFFIX_LENGTH: usize = 8;
/// Upper bound the storage service puts on bucket names
const MAX_BUCKET_NAME_LENGTH: usize = 63;

/// Source of bucket names. Called at most once per CloudBucket.
pub trait NameSource: Send + Sync {
    fn bucket_name(&self, resource_name: &str) -> String;
}

/// Names with a suffix from the thread-local RNG
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomNames;

impl NameSource for RandomNames {
    fn bucket_name(&self, resource_name: &str) -> String {
        generate_bucket_name(resource_name, &mut rand::thread_rng())
    }
}

/// Derive a bucket name: lowercase, '_' replaced with '-', plus a random
/// `[a-z0-9]{8}` suffix. The base is shortened so the result never exceeds
/// 63 characters.
pub fn generate_bucket_name<R: Rng + ?Sized>(resource_name: &str, rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LENGTH)
        .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
        .collect();

    let base: String = resource_name
        .to_lowercase()
        .replace('_', "-")
        .chars()
        .take(MAX_BUCKET_NAME_LENGTH - SUFFIX_LENGTH - 1)
        .collect();
    let base = base.trim_matches('-');

    if base.is_empty() {
        suffix
    } else {
        format!("{}-{}", base, suffix)
    }
}

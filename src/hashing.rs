/// Block Header Hashing
///
/// A header is identified by one of two digests, picked by how many blocks
/// have been accepted so far:
/// - up to and including `SHA256D_AFTER_COUNT` accepted blocks: scrypt PoW hash
/// - after that: double SHA-256
///
/// Both digests are turned into the display form used by the hash list
/// (big-endian hex) by the same two reversal passes.

use scrypt::Params;
use sha2::{Digest, Sha256};

use crate::error::LinearizeError;
use crate::types::BLOCK_HEADER_SIZE;

/// Accepted-block count after which headers are identified by SHA-256d
pub const SHA256D_AFTER_COUNT: u64 = 319_000;

/// Memory-hard proof-of-work hash over a block header
pub trait PowHasher {
    fn pow_hash(&self, header: &[u8; BLOCK_HEADER_SIZE]) -> [u8; 32];
}

/// scrypt(N=1024, r=1, p=1) with the header as password and salt
#[derive(Clone)]
pub struct ScryptPow {
    params: Params,
}

impl ScryptPow {
    pub fn new() -> Result<Self, LinearizeError> {
        Ok(Self {
            params: Params::new(10, 1, 1, 32)?,
        })
    }
}

impl PowHasher for ScryptPow {
    fn pow_hash(&self, header: &[u8; BLOCK_HEADER_SIZE]) -> [u8; 32] {
        let mut out = [0u8; 32];
        scrypt::scrypt(header, header, &self.params, &mut out)
            .expect("32-byte output is a valid scrypt length");
        out
    }
}

/// Which digest identifies a header at a given position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderHashAlgo {
    Pow,
    Sha256d,
}

impl HeaderHashAlgo {
    pub fn for_accepted_count(accepted_count: u64) -> Self {
        Self::switching_after(accepted_count, SHA256D_AFTER_COUNT)
    }

    /// `Sha256d` once more than `switch_after` blocks have been accepted
    pub fn switching_after(accepted_count: u64, switch_after: u64) -> Self {
        if accepted_count > switch_after {
            HeaderHashAlgo::Sha256d
        } else {
            HeaderHashAlgo::Pow
        }
    }
}

pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first_hash = Sha256::digest(data);
    Sha256::digest(first_hash).into()
}

/// Reverse the byte order inside every 4-byte word
pub fn swap_word_bytes(hash: &mut [u8; 32]) {
    for word in hash.chunks_exact_mut(4) {
        word.reverse();
    }
}

/// Reverse the order of the 4-byte words, keeping each word's bytes
pub fn reverse_words(hash: &mut [u8; 32]) {
    let mut words = [[0u8; 4]; 8];
    for (dst, src) in words.iter_mut().zip(hash.chunks_exact(4)) {
        dst.copy_from_slice(src);
    }
    for (dst, src) in hash.chunks_exact_mut(4).zip(words.iter().rev()) {
        dst.copy_from_slice(src);
    }
}

/// Render a raw digest the way hash lists print it
pub fn display_hash(mut digest: [u8; 32]) -> String {
    swap_word_bytes(&mut digest);
    reverse_words(&mut digest);
    hex::encode(digest)
}

/// Computes header identifiers for the linearizer
pub struct HashCodec<P = ScryptPow> {
    pow: P,
    switch_after: u64,
}

impl HashCodec<ScryptPow> {
    pub fn new() -> Result<Self, LinearizeError> {
        Ok(Self::with_pow(ScryptPow::new()?))
    }
}

impl<P: PowHasher> HashCodec<P> {
    pub fn with_pow(pow: P) -> Self {
        Self {
            pow,
            switch_after: SHA256D_AFTER_COUNT,
        }
    }

    /// Move the Pow to Sha256d switch; chains other than the default use this
    pub fn with_switch_after(mut self, switch_after: u64) -> Self {
        self.switch_after = switch_after;
        self
    }

    pub fn switch_after(&self) -> u64 {
        self.switch_after
    }

    pub fn digest(&self, algo: HeaderHashAlgo, header: &[u8; BLOCK_HEADER_SIZE]) -> [u8; 32] {
        match algo {
            HeaderHashAlgo::Pow => self.pow.pow_hash(header),
            HeaderHashAlgo::Sha256d => sha256d(header),
        }
    }

    /// Display hash of `header` given the number of blocks accepted before it
    pub fn identify(&self, header: &[u8; BLOCK_HEADER_SIZE], accepted_count: u64) -> String {
        let algo = HeaderHashAlgo::switching_after(accepted_count, self.switch_after);
        display_hash(self.digest(algo, header))
    }
}

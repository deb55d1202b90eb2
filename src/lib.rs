pub mod blocks;
pub mod canonical_chain;
pub mod config;
pub mod error;
pub mod hashing;
pub mod linearizer;
pub mod output;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod linearizer_tests;

use tracing::info;

use crate::blocks::{BlockStream, NumberedBlockFiles};
use crate::canonical_chain::CanonicalIndex;
use crate::config::Settings;
use crate::error::LinearizeError;
use crate::hashing::{HashCodec, PowHasher};
use crate::linearizer::{LinearizeSummary, Linearizer};
use crate::output::OutputRotator;

/// Full run: load the hash list, check it, then linearize every input file
pub fn run_linearize(settings: &Settings) -> Result<LinearizeSummary, LinearizeError> {
    let codec = HashCodec::new()?;
    run_linearize_with(settings, &codec)
}

/// Same as `run_linearize` with a caller-supplied PoW hasher
pub fn run_linearize_with<P: PowHasher>(
    settings: &Settings,
    codec: &HashCodec<P>,
) -> Result<LinearizeSummary, LinearizeError> {
    let index = CanonicalIndex::load(&settings.hashlist)?;
    index.check_sanity_hash(settings.sanity_hash.as_deref())?;

    info!(
        input = %settings.input.display(),
        output = ?settings.output,
        netmagic = %settings.netmagic,
        "Linearizing"
    );

    let stream = BlockStream::new(NumberedBlockFiles::new(&settings.input), settings.netmagic);
    let rotator = OutputRotator::new(settings)?;
    Linearizer::new(&index, codec, stream, rotator).run()
}

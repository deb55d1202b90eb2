/// Linearizer
///
/// Drives blocks from the input stream through hash verification into the
/// output rotator, enforcing that accepted blocks follow the canonical hash
/// list exactly. Blocks not on the list are orphans and get skipped; a
/// canonical block arriving out of order aborts the run.

use serde::Serialize;
use tracing::{debug, error, info};

use crate::blocks::{BlockFileSource, BlockStream};
use crate::canonical_chain::CanonicalIndex;
use crate::error::LinearizeError;
use crate::hashing::{HashCodec, PowHasher};
use crate::output::OutputRotator;
use crate::telemetry::{truncate_hex, ProgressCounter};
use crate::types::BlockRecord;

const PROGRESS_INTERVAL: u64 = 1000;

/// Where the state machine currently is
#[derive(Debug)]
pub enum LinearizeState {
    SeekNext,
    Verify(BlockRecord),
    Emit(BlockRecord, String),
    Done,
    Aborted,
}

/// Counters reported when input is exhausted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinearizeSummary {
    pub accepted: u64,
    pub skipped_orphans: u64,
    pub input_files: u32,
    pub output_files: u32,
    pub bytes_written: u64,
    pub high_water_timestamp: u32,
}

pub struct Linearizer<'a, S: BlockFileSource, P: PowHasher> {
    index: &'a CanonicalIndex,
    codec: &'a HashCodec<P>,
    stream: BlockStream<S>,
    rotator: OutputRotator,
    state: LinearizeState,
    accepted_count: u64,
    skipped_orphans: u64,
    progress: ProgressCounter,
}

impl<'a, S: BlockFileSource, P: PowHasher> Linearizer<'a, S, P> {
    pub fn new(
        index: &'a CanonicalIndex,
        codec: &'a HashCodec<P>,
        stream: BlockStream<S>,
        rotator: OutputRotator,
    ) -> Self {
        Self {
            index,
            codec,
            stream,
            rotator,
            state: LinearizeState::SeekNext,
            accepted_count: 0,
            skipped_orphans: 0,
            progress: ProgressCounter::new(PROGRESS_INTERVAL),
        }
    }

    pub fn state(&self) -> &LinearizeState {
        &self.state
    }

    pub fn accepted_count(&self) -> u64 {
        self.accepted_count
    }

    fn transition(&mut self, state: LinearizeState) -> Result<LinearizeState, LinearizeError> {
        match state {
            LinearizeState::SeekNext => Ok(match self.stream.next_block()? {
                Some(block) => LinearizeState::Verify(block),
                None => LinearizeState::Done,
            }),

            LinearizeState::Verify(block) => {
                let hash = self.codec.identify(block.header_bytes(), self.accepted_count);

                if !self.index.contains(&hash) {
                    debug!(hash = %truncate_hex(&hash, 16), "Skipping unknown block");
                    self.skipped_orphans += 1;
                    return Ok(LinearizeState::SeekNext);
                }

                match self.index.expected_at(self.accepted_count) {
                    Some(expected) if expected == hash => Ok(LinearizeState::Emit(block, hash)),
                    Some(expected) => Err(LinearizeError::OutOfOrder {
                        expected: expected.to_string(),
                        actual: hash,
                    }),
                    None => Err(LinearizeError::CanonicalExhausted {
                        position: self.accepted_count,
                        actual: hash,
                    }),
                }
            }

            LinearizeState::Emit(block, hash) => {
                self.rotator.write(&block, &hash)?;
                self.accepted_count += 1;
                if self.progress.tick() {
                    info!(blocks = self.accepted_count, "Wrote blocks");
                }
                Ok(LinearizeState::SeekNext)
            }

            LinearizeState::Done => Ok(LinearizeState::Done),
            LinearizeState::Aborted => Ok(LinearizeState::Aborted),
        }
    }

    /// Advance the state machine by one transition.
    ///
    /// A fatal error leaves the machine in `Aborted`.
    pub fn step(&mut self) -> Result<&LinearizeState, LinearizeError> {
        let state = std::mem::replace(&mut self.state, LinearizeState::Aborted);
        match self.transition(state) {
            Ok(next) => {
                self.state = next;
                Ok(&self.state)
            }
            Err(e) => {
                error!(error = %e, accepted = self.accepted_count, "Linearize aborted");
                Err(e)
            }
        }
    }

    /// Run until input is exhausted, then close the last output file
    pub fn run(mut self) -> Result<LinearizeSummary, LinearizeError> {
        loop {
            match self.step()? {
                LinearizeState::Done => break,
                LinearizeState::Aborted => {
                    return Err(LinearizeError::Io(std::io::Error::other(
                        "linearizer already aborted",
                    )))
                }
                _ => {}
            }
        }

        self.rotator.finish()?;

        let summary = LinearizeSummary {
            accepted: self.accepted_count,
            skipped_orphans: self.skipped_orphans,
            input_files: self.stream.files_opened(),
            output_files: self.rotator.files_opened(),
            bytes_written: self.rotator.total_bytes(),
            high_water_timestamp: self.rotator.high_water(),
        };
        info!(
            accepted = summary.accepted,
            skipped = summary.skipped_orphans,
            output_files = summary.output_files,
            "Done"
        );
        Ok(summary)
    }
}

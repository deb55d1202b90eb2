/// Output Rotator
///
/// Writes accepted blocks verbatim into either one fixed file or a directory
/// of `blk%05d.dat` files. In directory mode a new file is started when the
/// size limit would be crossed, and optionally when a block opens a new
/// calendar month. Closed files can have their mtime set to the newest block
/// time seen so far.

use std::fs::{self, File, FileTimes};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{Datelike, TimeZone, Utc};
use tracing::{error, info};

use crate::config::{OutputTarget, Settings};
use crate::error::LinearizeError;
use crate::types::{BlockRecord, MonthBucket};

/// UTC calendar month of a block timestamp
pub fn month_bucket(timestamp: u32) -> MonthBucket {
    match Utc.timestamp_opt(i64::from(timestamp), 0).single() {
        Some(dt) => MonthBucket::new(dt.year(), dt.month()),
        // Every u32 second count is a valid UTC instant
        None => MonthBucket::new(1970, 1),
    }
}

struct OpenOutput {
    path: PathBuf,
    writer: BufWriter<File>,
}

/// Mutable rotation bookkeeping, private to the rotator
struct RotationState {
    current: Option<OpenOutput>,
    file_number: u32,
    bytes_written: u64,
    last_month: Option<MonthBucket>,
    high_water: u32,
}

pub struct OutputRotator {
    target: OutputTarget,
    max_out_sz: u64,
    split_timestamp: bool,
    file_timestamp: bool,
    state: RotationState,
    files_opened: u32,
    total_bytes: u64,
}

impl OutputRotator {
    pub fn new(settings: &Settings) -> Result<Self, LinearizeError> {
        if let OutputTarget::Directory(dir) = &settings.output {
            fs::create_dir_all(dir)?;
        }

        Ok(Self {
            target: settings.output.clone(),
            max_out_sz: settings.max_out_sz,
            split_timestamp: settings.split_timestamp,
            file_timestamp: settings.file_timestamp,
            state: RotationState {
                current: None,
                file_number: 0,
                bytes_written: 0,
                last_month: None,
                high_water: 0,
            },
            files_opened: 0,
            total_bytes: 0,
        })
    }

    fn current_path(&self) -> PathBuf {
        match &self.target {
            OutputTarget::File(path) => path.clone(),
            OutputTarget::Directory(dir) => {
                dir.join(format!("blk{:05}.dat", self.state.file_number))
            }
        }
    }

    /// Flush and close the open file, stamping its mtime when enabled
    fn close_current(&mut self) -> Result<(), LinearizeError> {
        let Some(OpenOutput { path, mut writer }) = self.state.current.take() else {
            return Ok(());
        };

        writer.flush()?;
        if self.file_timestamp {
            let times = FileTimes::new()
                .set_accessed(SystemTime::now())
                .set_modified(UNIX_EPOCH + Duration::from_secs(u64::from(self.state.high_water)));
            writer.get_ref().set_times(times)?;
        }
        info!(path = %path.display(), high_water = self.state.high_water, "Closed output file");
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), LinearizeError> {
        self.close_current()?;
        self.state.file_number += 1;
        self.state.bytes_written = 0;
        Ok(())
    }

    fn open_current(&mut self) -> Result<(), LinearizeError> {
        let path = self.current_path();
        info!(path = %path.display(), "Output file");
        let file = File::create(&path)?;
        self.state.current = Some(OpenOutput {
            path,
            writer: BufWriter::new(file),
        });
        self.files_opened += 1;
        Ok(())
    }

    /// Append one accepted block, rotating first if the policy asks for it.
    ///
    /// `hash` is only used for logging.
    pub fn write(&mut self, block: &BlockRecord, hash: &str) -> Result<(), LinearizeError> {
        let frame_size = block.frame_size();
        let timestamp = block.time();

        if let OutputTarget::Directory(_) = self.target {
            if self.state.current.is_some()
                && self.state.bytes_written > 0
                && self.state.bytes_written + frame_size > self.max_out_sz
            {
                self.rotate()?;
            }

            if self.split_timestamp {
                let bucket = month_bucket(timestamp);
                match self.state.last_month {
                    Some(last) if bucket > last => {
                        info!(month = %bucket, hash = %hash, "New month");
                        self.state.last_month = Some(bucket);
                        if self.state.current.is_some() {
                            self.rotate()?;
                        }
                    }
                    Some(_) => {}
                    None => {
                        info!(month = %bucket, hash = %hash, "New month");
                        self.state.last_month = Some(bucket);
                    }
                }
            }
        }

        if self.state.current.is_none() {
            self.open_current()?;
        }

        if let Some(out) = self.state.current.as_mut() {
            out.writer.write_all(&block.frame.to_bytes())?;
            out.writer.write_all(&block.payload)?;
        }
        self.state.bytes_written += frame_size;
        self.total_bytes += frame_size;
        self.state.high_water = self.state.high_water.max(timestamp);
        Ok(())
    }

    /// Close the last output file at the end of a successful run
    pub fn finish(&mut self) -> Result<(), LinearizeError> {
        self.close_current()
    }

    pub fn high_water(&self) -> u32 {
        self.state.high_water
    }

    pub fn files_opened(&self) -> u32 {
        self.files_opened
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

impl Drop for OutputRotator {
    fn drop(&mut self) {
        // Abort paths still close and stamp the partial file
        if let Err(e) = self.close_current() {
            error!(error = %e, "Failed to close output file");
        }
    }
}

/// Block Stream Reader
///
/// Walks `blk0001.dat`, `blk0002.dat`, ... and yields framed blocks in file
/// order. A zero byte where a frame should start is the pre-allocated tail
/// of a blk file and ends that file. The first numbered file that cannot be
/// opened ends the input.

use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::LinearizeError;
use crate::types::{BlockRecord, FrameHeader, NetMagic, BLOCK_HEADER_SIZE, FRAME_HEADER_SIZE};

/// Supplies input files by 1-based sequence number
pub trait BlockFileSource {
    type Reader: Read;

    /// Open file `file_index`, or `None` when there is no such file.
    fn open(&mut self, file_index: u32) -> io::Result<Option<Self::Reader>>;

    /// Name used in logs and errors
    fn describe(&self, file_index: u32) -> PathBuf;
}

/// `<dir>/blk%04d.dat`
pub struct NumberedBlockFiles {
    dir: PathBuf,
}

impl NumberedBlockFiles {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl BlockFileSource for NumberedBlockFiles {
    type Reader = BufReader<File>;

    fn open(&mut self, file_index: u32) -> io::Result<Option<Self::Reader>> {
        let path = self.describe(file_index);
        match File::open(&path) {
            Ok(file) => Ok(Some(BufReader::new(file))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                // Anything we cannot open counts as the end of the input
                warn!(path = %path.display(), error = %e, "Cannot open input file");
                Ok(None)
            }
        }
    }

    fn describe(&self, file_index: u32) -> PathBuf {
        self.dir.join(format!("blk{:04}.dat", file_index))
    }
}

/// Read until `buf` is full or the reader is exhausted; returns bytes read
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Sequential framed-block reader over all numbered input files
pub struct BlockStream<S: BlockFileSource> {
    source: S,
    magic: NetMagic,
    file_index: u32,
    current: Option<S::Reader>,
    files_opened: u32,
    exhausted: bool,
}

impl<S: BlockFileSource> BlockStream<S> {
    pub fn new(source: S, magic: NetMagic) -> Self {
        Self {
            source,
            magic,
            file_index: 1,
            current: None,
            files_opened: 0,
            exhausted: false,
        }
    }

    /// Number of input files opened so far
    pub fn files_opened(&self) -> u32 {
        self.files_opened
    }

    fn advance_file(&mut self) {
        // Dropping the reader closes the handle
        self.current = None;
        self.file_index += 1;
    }

    /// Next framed block, or `None` once every input file is consumed
    pub fn next_block(&mut self) -> Result<Option<BlockRecord>, LinearizeError> {
        if self.exhausted {
            return Ok(None);
        }

        loop {
            if self.current.is_none() {
                let path = self.source.describe(self.file_index);
                match self.source.open(self.file_index)? {
                    Some(reader) => {
                        info!(path = %path.display(), "Input file");
                        self.current = Some(reader);
                        self.files_opened += 1;
                    }
                    None => {
                        info!(path = %path.display(), "No more input files");
                        self.exhausted = true;
                        return Ok(None);
                    }
                }
            }

            let path = self.source.describe(self.file_index);
            let reader = match self.current.as_mut() {
                Some(reader) => reader,
                None => continue,
            };

            let mut frame_buf = [0u8; FRAME_HEADER_SIZE];
            let got = read_up_to(reader, &mut frame_buf)?;
            if got == 0 || frame_buf[0] == 0 {
                debug!(path = %path.display(), "End of block data");
                self.advance_file();
                continue;
            }
            if got < FRAME_HEADER_SIZE {
                return Err(LinearizeError::TruncatedBlock {
                    file: path,
                    wanted: FRAME_HEADER_SIZE,
                    got,
                });
            }

            let frame = FrameHeader::parse(&frame_buf);
            if frame.magic != self.magic {
                return Err(LinearizeError::BadMagic {
                    file: path,
                    found: frame.magic.to_string(),
                    expected: self.magic.to_string(),
                });
            }

            // The declared length is untrusted; grow with the data actually read
            let length = frame.length as usize;
            let mut payload = Vec::new();
            let got = reader
                .by_ref()
                .take(u64::from(frame.length))
                .read_to_end(&mut payload)?;
            if got < length {
                return Err(LinearizeError::TruncatedBlock {
                    file: path,
                    wanted: length,
                    got,
                });
            }
            if length < BLOCK_HEADER_SIZE {
                return Err(LinearizeError::ShortBlock {
                    file: path,
                    len: length,
                });
            }

            return Ok(Some(BlockRecord { frame, payload }));
        }
    }
}

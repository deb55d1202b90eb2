use std::path::PathBuf;

use clap::Parser;

use linearblox::blocks::{BlockFileSource, BlockStream};
use linearblox::hashing::{display_hash, HashCodec, HeaderHashAlgo};
use linearblox::types::NetMagic;

/// Reads a single blk file, ignoring the numbered-file sequence
struct SingleFile(PathBuf);

impl BlockFileSource for SingleFile {
    type Reader = std::io::BufReader<std::fs::File>;

    fn open(&mut self, file_index: u32) -> std::io::Result<Option<Self::Reader>> {
        if file_index != 1 {
            return Ok(None);
        }
        Ok(Some(std::io::BufReader::new(std::fs::File::open(&self.0)?)))
    }

    fn describe(&self, _file_index: u32) -> PathBuf {
        self.0.clone()
    }
}

#[derive(Parser, Debug)]
#[clap(name = "check-hash")]
#[clap(about = "Print both header hashes for the first blocks of a blk file", long_about = None)]
struct Args {
    /// blk*.dat file to inspect
    file: PathBuf,

    /// Number of blocks to print
    #[clap(long, default_value_t = 5)]
    count: usize,

    /// Network magic as hex
    #[clap(long, default_value = "70352205")]
    netmagic: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let magic: [u8; 4] = hex::decode(&args.netmagic)?
        .try_into()
        .map_err(|_| "netmagic must be 4 bytes")?;
    let codec = HashCodec::new()?;
    let mut stream = BlockStream::new(SingleFile(args.file.clone()), NetMagic(magic));

    for n in 0..args.count {
        let Some(block) = stream.next_block()? else {
            break;
        };
        let header = block.header();
        println!("Block {} ({} bytes, time {})", n, block.payload.len(), header.n_time);
        println!("  Header:  {}", hex::encode(block.header_bytes()));
        let pow = codec.digest(HeaderHashAlgo::Pow, block.header_bytes());
        let sha = codec.digest(HeaderHashAlgo::Sha256d, block.header_bytes());
        println!("  PoW:     {}", display_hash(pow));
        println!("  SHA256d: {}", display_hash(sha));
    }

    Ok(())
}

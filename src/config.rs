/// Run settings
///
/// Loaded once from a `key=value` config file (INI format, `#` comments),
/// with `LINEARIZE_*` environment variables layered on top, then passed by
/// reference to every component.

use std::path::{Path, PathBuf};

pub use config::{Config, Environment, File as ConfigFile, FileFormat};
use tracing::warn;

use crate::error::LinearizeError;
use crate::types::NetMagic;

pub const DEFAULT_NETMAGIC: &str = "70352205";
pub const DEFAULT_MAX_OUT_SZ: u64 = 1000 * 1000 * 1000;

/// Where accepted blocks are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// One fixed file, never rotated
    File(PathBuf),
    /// Numbered `blk%05d.dat` files, rotated by size and month
    Directory(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub netmagic: NetMagic,
    pub input: PathBuf,
    pub hashlist: PathBuf,
    pub output: OutputTarget,
    pub max_out_sz: u64,
    pub file_timestamp: bool,
    pub split_timestamp: bool,
    /// Hash that must be present in the hash list before anything runs
    pub sanity_hash: Option<String>,
    pub log_level: String,
    pub log_format: String,
    pub log_file: Option<String>,
    /// "daily", "hourly" or "never"
    pub log_rotation: String,
    /// `output_file` when it lost to `output`, reported once logging is up
    pub ignored_output_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            netmagic: NetMagic([0x70, 0x35, 0x22, 0x05]),
            input: PathBuf::from("input"),
            hashlist: PathBuf::from("hashlist.txt"),
            output: OutputTarget::File(PathBuf::from("bootstrap.dat")),
            max_out_sz: DEFAULT_MAX_OUT_SZ,
            file_timestamp: false,
            split_timestamp: false,
            sanity_hash: None,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            log_file: None,
            log_rotation: "daily".to_string(),
            ignored_output_file: None,
        }
    }
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).to_string())
}

fn optional_string(config: &Config, key: &str) -> Result<Option<String>, LinearizeError> {
    match config.get_string(key) {
        Ok(value) => Ok(Some(value.trim().to_string()).filter(|v| !v.is_empty())),
        Err(config::ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_netmagic(raw: &str) -> Result<NetMagic, LinearizeError> {
    let invalid = |reason: String| LinearizeError::InvalidSetting {
        key: "netmagic",
        reason,
    };
    let bytes = hex::decode(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    let magic: [u8; 4] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| invalid(format!("expected 4 bytes, got {}", b.len())))?;
    Ok(NetMagic(magic))
}

fn parse_flag(config: &Config, key: &'static str) -> Result<bool, LinearizeError> {
    match config.get_bool(key) {
        Ok(value) => Ok(value),
        Err(config::ConfigError::NotFound(_)) => Ok(false),
        Err(e) => Err(LinearizeError::InvalidSetting {
            key,
            reason: e.to_string(),
        }),
    }
}

impl Settings {
    /// Load settings from `path`, with environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LinearizeError> {
        let config = Config::builder()
            .add_source(ConfigFile::from(path.as_ref()).format(FileFormat::Ini))
            .add_source(Environment::with_prefix("LINEARIZE"))
            .build()?;
        Self::from_config(&config)
    }

    pub fn from_config(config: &Config) -> Result<Self, LinearizeError> {
        let defaults = Settings::default();

        let netmagic = parse_netmagic(
            &optional_string(config, "netmagic")?.unwrap_or_else(|| DEFAULT_NETMAGIC.to_string()),
        )?;

        let input = optional_string(config, "input")?
            .map(|p| expand_path(&p))
            .unwrap_or(defaults.input);
        let hashlist = optional_string(config, "hashlist")?
            .map(|p| expand_path(&p))
            .unwrap_or(defaults.hashlist);

        let output_dir = optional_string(config, "output")?;
        let output_file = optional_string(config, "output_file")?;
        let (output, ignored_output_file) = match (output_dir, output_file) {
            (Some(dir), file) => (
                OutputTarget::Directory(expand_path(&dir)),
                file.map(|f| expand_path(&f)),
            ),
            (None, Some(file)) => (OutputTarget::File(expand_path(&file)), None),
            (None, None) => return Err(LinearizeError::MissingOutput),
        };

        let max_out_sz = match optional_string(config, "max_out_sz")? {
            Some(raw) => raw.parse::<u64>().map_err(|e| LinearizeError::InvalidSetting {
                key: "max_out_sz",
                reason: format!("{raw:?}: {e}"),
            })?,
            None => DEFAULT_MAX_OUT_SZ,
        };

        Ok(Self {
            netmagic,
            input,
            hashlist,
            output,
            max_out_sz,
            file_timestamp: parse_flag(config, "file_timestamp")?,
            split_timestamp: parse_flag(config, "split_timestamp")?,
            sanity_hash: optional_string(config, "sanity_hash")?,
            log_level: optional_string(config, "log_level")?.unwrap_or(defaults.log_level),
            log_format: optional_string(config, "log_format")?.unwrap_or(defaults.log_format),
            log_file: optional_string(config, "log_file")?,
            log_rotation: optional_string(config, "log_rotation")?
                .unwrap_or(defaults.log_rotation),
            ignored_output_file,
        })
    }

    /// Non-fatal problems found while loading, one message each
    pub fn config_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if let (OutputTarget::Directory(dir), Some(file)) =
            (&self.output, &self.ignored_output_file)
        {
            warnings.push(format!(
                "Both output and output_file set, using output directory {} and ignoring {}",
                dir.display(),
                file.display()
            ));
        }
        warnings
    }

    /// Must run after `init_tracing`, otherwise the warnings go nowhere
    pub fn log_config_warnings(&self) {
        for warning in self.config_warnings() {
            warn!("{}", warning);
        }
    }
}

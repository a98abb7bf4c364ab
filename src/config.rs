//! Run configuration.
//!
//! Values come from command-line flags (or their environment variables),
//! then an optional TOML file, then defaults. Everything is validated
//! before the pipeline starts.

use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;
use crate::state::library::Library;
use crate::tiles::storage::StorageMode;

/// Storage mode used when neither the flags nor the file name one
pub const DEFAULT_STORAGE_MODE: StorageMode = StorageMode::Database;

/// Command-line arguments for tile-ingest
#[derive(Parser, Debug, Default)]
#[command(name = "tile-ingest")]
#[command(about = "Populate the image/tile catalog from a directory of pre-rendered tiles")]
#[command(version)]
pub struct CliArgs {
    /// TOML file with any of: root_directory, storage_mode, base_url, database
    #[arg(short, long, env = "TILE_INGEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory containing tiled images and JPEG2000 files
    #[arg(short, long, env = "TILE_INGEST_ROOT")]
    pub root: Option<PathBuf>,

    /// Where tile images should be stored
    #[arg(short, long, value_enum, env = "TILE_INGEST_MODE")]
    pub mode: Option<StorageMode>,

    /// URL the tile directory is served from (required unless mode is database)
    #[arg(short = 'u', long, env = "TILE_INGEST_BASE_URL")]
    pub base_url: Option<String>,

    /// SQLite catalog file
    #[arg(short, long, env = "TILE_INGEST_DATABASE")]
    pub database: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Contents of the optional TOML file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    root_directory: Option<PathBuf>,
    storage_mode: Option<StorageMode>,
    base_url: Option<String>,
    database: Option<PathBuf>,
}

impl FileConfig {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Validated configuration for one ingestion run
#[derive(Debug, Clone)]
pub struct Config {
    pub root_directory: PathBuf,
    pub storage_mode: StorageMode,
    /// Present whenever the storage mode stores URLs
    pub base_url: Option<Url>,
    pub database: PathBuf,
}

impl Config {
    /// Merge flags over the config file and validate the result
    pub fn load(args: &CliArgs) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };

        let root_directory = args
            .root
            .clone()
            .or(file.root_directory)
            .ok_or(ConfigError::MissingRoot)?;
        let storage_mode = args.mode.or(file.storage_mode).unwrap_or(DEFAULT_STORAGE_MODE);
        let base_url = args.base_url.clone().or(file.base_url);
        let database = match args.database.clone().or(file.database) {
            Some(path) => path,
            None => Library::default_path().ok_or(ConfigError::NoDataDir)?,
        };

        Self::validate(root_directory, storage_mode, base_url.as_deref(), database)
    }

    /// Check the directory and URL constraints and build a Config
    pub fn validate(
        root_directory: PathBuf,
        storage_mode: StorageMode,
        base_url: Option<&str>,
        database: PathBuf,
    ) -> Result<Self, ConfigError> {
        if !root_directory.is_dir() {
            return Err(ConfigError::NotADirectory(root_directory));
        }

        let base_url = base_url.map(parse_base_url).transpose()?;
        if storage_mode.stores_url() && base_url.is_none() {
            return Err(ConfigError::MissingBaseUrl(storage_mode.as_str()));
        }

        Ok(Self {
            root_directory,
            storage_mode,
            base_url,
            database,
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let malformed = |reason: String| ConfigError::MalformedUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| malformed(e.to_string()))?;
    match url.scheme() {
        "http" | "https" | "file" => Ok(url),
        other => Err(malformed(format!("unsupported scheme '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(root: &Path) -> CliArgs {
        CliArgs {
            root: Some(root.to_path_buf()),
            database: Some(root.join("catalog.db")),
            ..CliArgs::default()
        }
    }

    #[test]
    fn test_database_mode_needs_no_url() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&args(dir.path())).unwrap();

        assert_eq!(config.storage_mode, StorageMode::Database);
        assert!(config.base_url.is_none());
        assert_eq!(config.root_directory, dir.path());
    }

    #[test]
    fn test_filesystem_mode_requires_url() {
        let dir = TempDir::new().unwrap();
        let mut args = args(dir.path());
        args.mode = Some(StorageMode::Filesystem);

        assert!(matches!(
            Config::load(&args),
            Err(ConfigError::MissingBaseUrl("filesystem"))
        ));

        args.base_url = Some("http://localhost/tiles".to_string());
        let config = Config::load(&args).unwrap();
        assert_eq!(config.base_url.unwrap().as_str(), "http://localhost/tiles");
    }

    #[test]
    fn test_malformed_url() {
        let dir = TempDir::new().unwrap();
        let mut args = args(dir.path());
        args.mode = Some(StorageMode::Both);

        args.base_url = Some("not a url".to_string());
        assert!(matches!(Config::load(&args), Err(ConfigError::MalformedUrl { .. })));

        args.base_url = Some("ftp://host/tiles/".to_string());
        assert!(matches!(Config::load(&args), Err(ConfigError::MalformedUrl { .. })));
    }

    #[test]
    fn test_root_must_be_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, "x").unwrap();

        assert!(matches!(
            Config::load(&args(&file)),
            Err(ConfigError::NotADirectory(_))
        ));
        assert!(matches!(
            Config::load(&CliArgs::default()),
            Err(ConfigError::MissingRoot)
        ));
    }

    #[test]
    fn test_flags_override_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("ingest.toml");
        fs::write(
            &config_path,
            format!(
                "root_directory = {:?}\nstorage_mode = \"both\"\nbase_url = \"http://files/tiles/\"\n",
                dir.path().to_string_lossy()
            ),
        )
        .unwrap();

        let args = CliArgs {
            config: Some(config_path),
            base_url: Some("https://cdn/tiles/".to_string()),
            database: Some(dir.path().join("catalog.db")),
            ..CliArgs::default()
        };
        let config = Config::load(&args).unwrap();

        assert_eq!(config.storage_mode, StorageMode::Both);
        assert_eq!(config.base_url.unwrap().as_str(), "https://cdn/tiles/");
        assert_eq!(config.root_directory, dir.path());
    }

    #[test]
    fn test_unknown_file_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("ingest.toml");
        fs::write(&config_path, "root = \"/tmp\"\n").unwrap();

        let args = CliArgs {
            config: Some(config_path),
            ..CliArgs::default()
        };
        assert!(matches!(Config::load(&args), Err(ConfigError::Toml { .. })));
    }
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use greeting_core::{KeyError, Keypair, Pubkey};

pub const DEFAULT_RPC_URL: &str = "http://localhost:8899";

/// Where `cargo build-sbf --features entrypoint --sbf-out-dir dist/program`
/// leaves the greeting program and its deploy keypair.
pub const DEFAULT_PROGRAM_SO: &str = "dist/program/greeting_program.so";
pub const DEFAULT_PROGRAM_KEYPAIR: &str = "dist/program/greeting_program-keypair.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not a keypair file: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{} holds an invalid keypair: {source}", path.display())]
    Key {
        path: PathBuf,
        #[source]
        source: KeyError,
    },
    #[error("config has no {0}")]
    MissingKey(&'static str),
    #[error("HOME is not set")]
    NoHomeDir,
}

/// The subset of the ledger CLI's `config.yml` this tool reads.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CliConfig {
    pub json_rpc_url: Option<String>,
    pub keypair_path: Option<PathBuf>,
}

impl CliConfig {
    /// `~/.config/solana/cli/config.yml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = env::var_os("HOME").ok_or(ConfigError::NoHomeDir)?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("solana")
            .join("cli")
            .join("config.yml"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    /// The config file is flat `key: value` YAML; nested or unknown keys are
    /// skipped.
    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();
        for line in text.lines() {
            if line.starts_with([' ', '\t', '#']) || line.starts_with("---") {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                "json_rpc_url" => config.json_rpc_url = Some(value.to_string()),
                "keypair_path" => config.keypair_path = Some(PathBuf::from(value)),
                _ => {}
            }
        }
        config
    }
}

/// Explicit `--url`, else the config's url, else the local default.
pub fn resolve_rpc_url(explicit: Option<&str>, config: &Result<CliConfig, ConfigError>) -> String {
    if let Some(url) = explicit {
        return url.to_string();
    }
    let reason = match config {
        Ok(CliConfig {
            json_rpc_url: Some(url),
            ..
        }) => return url.clone(),
        Ok(_) => ConfigError::MissingKey("json_rpc_url").to_string(),
        Err(err) => err.to_string(),
    };
    eprintln!("warning: failed to read RPC url from CLI config ({reason}), falling back to {DEFAULT_RPC_URL}");
    DEFAULT_RPC_URL.to_string()
}

/// Explicit `--keypair` (must load), else the config's keypair, else a fresh
/// random keypair.
pub fn resolve_payer(
    explicit: Option<&Path>,
    config: &Result<CliConfig, ConfigError>,
) -> Result<Keypair, ConfigError> {
    if let Some(path) = explicit {
        return read_keypair_file(path);
    }
    let loaded = match config {
        Ok(CliConfig {
            keypair_path: Some(path),
            ..
        }) => read_keypair_file(path).map_err(|err| err.to_string()),
        Ok(_) => Err(ConfigError::MissingKey("keypair_path").to_string()),
        Err(err) => Err(err.to_string()),
    };
    Ok(loaded.unwrap_or_else(|reason| {
        eprintln!("warning: failed to load payer from CLI config ({reason}), falling back to a new random keypair");
        Keypair::generate()
    }))
}

/// Keypair files hold a JSON array of the 64 `secret || public` bytes.
pub fn read_keypair_file(path: &Path) -> Result<Keypair, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let bytes: Vec<u8> = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Keypair::from_bytes(&bytes).map_err(|source| ConfigError::Key {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_keypair_file(keypair: &Keypair, path: &Path) -> Result<(), ConfigError> {
    let io = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io)?;
    }
    let json = serde_json::to_string(&keypair.to_bytes().to_vec()).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(io)
}

/// Deployed program identity plus the build artifact it was deployed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramIdentity {
    pub id: Pubkey,
    pub artifact: PathBuf,
}

impl ProgramIdentity {
    /// Read the program id from the deploy keypair.
    pub fn load(keypair_path: &Path, artifact: &Path) -> Result<Self, ConfigError> {
        let keypair = read_keypair_file(keypair_path)?;
        Ok(Self {
            id: keypair.pubkey(),
            artifact: artifact.to_path_buf(),
        })
    }

    /// Whether the program has at least been built locally.
    pub fn artifact_present(&self) -> bool {
        self.artifact.is_file()
    }
}

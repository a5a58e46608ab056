use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DB_PATH: &str = "./devdata/wakemap.db";
pub const DOTENV_FILE: &str = ".env";

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    // where the rotating log files go, next to the database by default
    pub log_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let db_path = PathBuf::from(DEFAULT_DB_PATH);
        ServerConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_dir: log_dir_for(&db_path),
            db_path,
        }
    }
}

fn log_dir_for(db_path: &Path) -> PathBuf {
    db_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn parse_or_default<T: FromStr>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        None => default,
        Some(s) => match s.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!("[config] invalid value for {}: {:?}, using default", key, s);
                default
            }
        },
    }
}

/// Variables of a dotenv file. A missing file is an empty set, reading
/// stops at the first malformed line.
pub fn read_dotenv(path: &Path) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(err) => {
            if !err.not_found() {
                warn!("[config] failed to read {:?}: {}", path, err);
            }
            return vars;
        }
    };
    for item in iter {
        match item {
            Ok((key, value)) => {
                vars.insert(key, value);
            }
            Err(err) => {
                warn!("[config] stopped reading {:?}: {}", path, err);
                break;
            }
        }
    }
    vars
}

impl ServerConfig {
    /// `WAKEMAP_HOST`, `PORT`, `WAKEMAP_DB` and `WAKEMAP_LOG_DIR`, from the
    /// process environment or else from `./.env`.
    pub fn from_env() -> Self {
        let dotenv = read_dotenv(Path::new(DOTENV_FILE));
        Self::from_lookup(|key| env::var(key).ok().or_else(|| dotenv.get(key).cloned()))
    }

    /// Values are trimmed and `$VAR`/`${VAR}` references in them expanded
    /// through `lookup` (unknown ones become empty). Unset or empty results
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| {
                    shellexpand::env_with_context_no_errors(v.trim(), |var: &str| {
                        Some(lookup(var).unwrap_or_default())
                    })
                    .trim()
                    .to_string()
                })
                .filter(|v| !v.is_empty())
        };
        let defaults = ServerConfig::default();

        let db_path = get("WAKEMAP_DB")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);
        let log_dir = get("WAKEMAP_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| log_dir_for(&db_path));
        ServerConfig {
            host: get("WAKEMAP_HOST").unwrap_or(defaults.host),
            port: parse_or_default("PORT", get("PORT"), defaults.port),
            db_path,
            log_dir,
        }
    }
}

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::query::DefaultScope;

#[derive(Parser, Debug)]
#[command(name = "linkstash")]
#[command(about = "Runs the linkstash bookmark service", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".linkstash")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Only the literal `production` turns on production mode.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "production" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct App {
    #[serde(default = "default_database")]
    database: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_env")]
    env: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

fn default_database() -> String {
    "server.db".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_env() -> String {
    "development".to_string()
}

fn default_static_dir() -> String {
    "dist".to_string()
}

impl Default for App {
    fn default() -> Self {
        Self {
            database: default_database(),
            port: default_port(),
            env: default_env(),
            static_dir: default_static_dir(),
        }
    }
}

impl App {
    pub fn get_db(&self) -> &str {
        &self.database
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub fn get_env(&self) -> Environment {
        Environment::parse(&self.env)
    }
}

#[derive(Debug, Deserialize, Default, Clone, Copy)]
pub struct Listing {
    #[serde(default)]
    pub default_scope: DefaultScope,
}

/// What happens to a folder's bookmarks when the folder is deleted.
#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FolderDeletePolicy {
    /// Bookmarks keep their now dangling `folder_id`.
    #[default]
    Orphan,
    /// Deletion fails while any bookmark references the folder.
    Reject,
    /// Bookmarks are moved to unsorted before the folder goes.
    Detach,
}

#[derive(Debug, Deserialize, Default, Clone, Copy)]
pub struct Folders {
    #[serde(default)]
    pub on_delete: FolderDeletePolicy,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub listing: Listing,
    #[serde(default)]
    pub folders: Folders,
}

impl Config {
    pub fn new(path: &str) -> Result<Self> {
        let mut cfg = Config::load_config(path)?;
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    /// Reads `path` when it exists, otherwise starts from defaults. Environment
    /// overrides apply either way.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let mut cfg = if path.exists() {
            Config::load_config(&path.to_string_lossy())?
        } else {
            Config::default()
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    fn load_config(path: &str) -> Result<Config> {
        let yaml_str = fs::read_to_string(path)?;
        Config::parse(&yaml_str)
    }

    fn parse(yaml_str: &str) -> Result<Config> {
        let yaml_with_env = Config::substitute_env_vars(yaml_str)?;
        let config: Config = serde_yaml::from_str(&yaml_with_env)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(non_empty_var)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(port) = lookup("PORT") {
            self.app.port = port
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid PORT {port:?}: {e}"))?;
        }
        if let Some(mode) = lookup("ENV") {
            self.app.env = mode;
        }
        if let Some(database) = lookup("DATABASE_PATH") {
            self.app.database = database;
        }
        Ok(())
    }

    fn substitute_env_vars(yaml_str: &str) -> Result<String> {
        let mut result = yaml_str.to_string();
        let mut offset = 0;

        while let Some(start) = result[offset..].find("${") {
            let actual_start = offset + start;
            if let Some(end) = result[actual_start..].find("}") {
                let var_name = &result[actual_start + 2..actual_start + end];

                // ${VAR:-default}
                let env_value = if let Some(default_start) = var_name.find(":-") {
                    let actual_var = &var_name[..default_start];
                    let default_val = &var_name[default_start + 2..];
                    env::var(actual_var).unwrap_or_else(|_| default_val.to_string())
                } else {
                    env::var(var_name).unwrap_or_else(|_| {
                        tracing::warn!("environment variable '{}' not found", var_name);
                        String::new()
                    })
                };

                result.replace_range(actual_start..actual_start + end + 1, &env_value);
                offset = actual_start + env_value.len();
            } else {
                break;
            }
        }

        Ok(result)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

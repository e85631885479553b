use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::BaseDirs;
use serde::Deserialize;

const CONFIG_FILE_NAME: &str = "config.toml";
const INDEX_FILE_NAME: &str = "index.db";
const APP_NAME: &str = "rolo";

#[derive(Debug, Clone)]
pub struct Config {
    /// The file the settings came from; `None` when defaults were used.
    pub config_path: Option<PathBuf>,
    pub vdir: PathBuf,
    pub index_path: PathBuf,
    pub commands: Commands,
}

#[derive(Debug, Clone, Default)]
pub struct Commands {
    pub open: Option<CommandExec>,
    pub editor: Option<CommandExec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandExec {
    pub program: String,
    pub args: Vec<String>,
}

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

fn data_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine data directories")?;
    Ok(base.data_dir().join(APP_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Load settings from `explicit`, or from the default location.
///
/// A missing default file means defaults; a missing explicit file is an
/// error.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => {
            let path = expand_tilde(path);
            if !path.exists() {
                bail!("configuration file not found at {}", path.display());
            }
            path
        }
        None => config_path()?,
    };

    if !path.exists() {
        return from_file(ConfigFile::default(), None);
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;
    load_from_str(&raw, &path)
}

fn load_from_str(raw: &str, path: &Path) -> Result<Config> {
    let value: toml::Value = toml::from_str(raw)
        .with_context(|| format!("failed to parse {} as TOML", path.display()))?;

    warn_unknown_keys(&value);

    let cfg_file: ConfigFile = value
        .try_into()
        .with_context(|| format!("failed to deserialize config from {}", path.display()))?;

    from_file(cfg_file, Some(path.to_path_buf()))
}

fn from_file(cfg_file: ConfigFile, config_path: Option<PathBuf>) -> Result<Config> {
    let vdir = match cfg_file.vdir {
        Some(vdir) => expand_tilde(&vdir),
        None => data_root()?.join("vdir"),
    };
    let index_path = match cfg_file.index_path {
        Some(index_path) => expand_tilde(&index_path),
        None => data_root()?.join(INDEX_FILE_NAME),
    };

    Ok(Config {
        config_path,
        vdir,
        index_path,
        commands: cfg_file.commands.into(),
    })
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn warn_unknown_keys(value: &toml::Value) {
    let Some(table) = value.as_table() else {
        return;
    };

    let known = HashSet::from(["vdir", "index_path", "commands"]);
    for key in table.keys() {
        if !known.contains(key.as_str()) {
            log::warn!("unknown configuration key `{}`", key);
        }
    }

    if let Some(commands_val) = table.get("commands") {
        warn_unknown_commands_keys(commands_val);
    }
}

fn warn_unknown_commands_keys(value: &toml::Value) {
    let Some(table) = value.as_table() else {
        return;
    };
    let known = HashSet::from(["open", "editor"]);
    for key in table.keys() {
        if !known.contains(key.as_str()) {
            log::warn!("unknown commands entry `{}`", key);
        }
    }
}

// =============================================================================
// File deserialization
// =============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    vdir: Option<PathBuf>,
    index_path: Option<PathBuf>,
    commands: CommandsFile,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct CommandsFile {
    open: Option<CommandDef>,
    editor: Option<CommandDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CommandDef {
    Simple(String),
    List(Vec<String>),
}

impl From<CommandsFile> for Commands {
    fn from(file: CommandsFile) -> Self {
        Self {
            open: file.open.and_then(CommandExec::from_def),
            editor: file.editor.and_then(CommandExec::from_def),
        }
    }
}

impl CommandExec {
    fn from_def(def: CommandDef) -> Option<Self> {
        match def {
            CommandDef::Simple(cmd) => {
                let trimmed = cmd.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Self {
                        program: trimmed.to_string(),
                        args: Vec::new(),
                    })
                }
            }
            CommandDef::List(mut parts) => {
                if parts.is_empty() {
                    return None;
                }
                let program = parts.remove(0);
                Some(Self {
                    program,
                    args: parts,
                })
            }
        }
    }
}

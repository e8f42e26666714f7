//! kmgr configuration.
//!
//! Loaded from `$KMGR_CONFIG` when set, otherwise from
//! `~/.config/kmgr/config.json`. Every field has a default, so a missing file
//! (or a file naming only a few fields) is fine.

use crate::catalog::KernelNaming;
use crate::error::KmError;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KmConfig {
    /// Filesystem root the package database manages.
    pub root: PathBuf,
    /// Package database directory.
    pub db_path: PathBuf,
    /// Pacman configuration; repository search order comes from its sections.
    pub pacman_conf: PathBuf,
    /// Cache root for the recipe checkout. A leading `~` is expanded.
    pub cache_dir: String,
    pub recipe_url: String,
    pub recipe_branch: String,
    /// Directory name of the checkout inside `cache_dir`.
    pub checkout_name: String,
    pub terminal_helper: PathBuf,
    pub rootshell: PathBuf,
    /// Privilege escalation wrapper (`pkexec`, `sudo`, ...).
    pub escalation: String,
    /// Shell command run inside a kernel's recipe directory.
    pub build_command: String,
    /// `NAME=VALUE` lines applied to the environment before a build.
    pub build_env: String,
    /// Stage the headers package alongside every kernel install.
    pub with_headers: bool,
    pub naming: KernelNaming,
}

impl Default for KmConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            db_path: PathBuf::from("/var/lib/pacman/"),
            pacman_conf: PathBuf::from("/etc/pacman.conf"),
            cache_dir: "~/.cache/cachyos-km".to_string(),
            recipe_url: "https://github.com/cachyos/linux-cachyos.git".to_string(),
            recipe_branch: "master".to_string(),
            checkout_name: "pkgbuilds".to_string(),
            terminal_helper: PathBuf::from("/usr/lib/cachyos-kernel-manager/terminal-helper"),
            rootshell: PathBuf::from("/usr/lib/cachyos-kernel-manager/rootshell.sh"),
            escalation: "pkexec".to_string(),
            build_command: "makepkg -sicf --cleanbuild --skipchecksums".to_string(),
            build_env: String::new(),
            with_headers: true,
            naming: KernelNaming::default(),
        }
    }
}

impl KmConfig {
    /// Explicit config path override (for testing and CI).
    pub const CONFIG_ENV: &'static str = "KMGR_CONFIG";

    /// Load from `$KMGR_CONFIG`, else the user config path, else defaults.
    pub fn load() -> Result<Self, KmError> {
        if let Ok(explicit) = std::env::var(Self::CONFIG_ENV) {
            return Self::load_from(Path::new(&explicit));
        }
        let path = Self::user_path();
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, KmError> {
        let content = fs::read_to_string(path).map_err(|err| KmError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|err| KmError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// User config path. Respects `$XDG_CONFIG_HOME` and `$HOME` for test isolation.
    pub fn user_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
            .or_else(|| BaseDirs::new().map(|d| d.config_dir().to_path_buf()))
            .unwrap_or_else(|| PathBuf::from(".config"));
        config_dir.join("kmgr").join("config.json")
    }

    pub fn cache_dir(&self) -> PathBuf {
        expand_home(&self.cache_dir)
    }

    pub fn checkout_dir(&self) -> PathBuf {
        self.cache_dir().join(&self.checkout_name)
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    let home = std::env::var("HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| BaseDirs::new().map(|d| d.home_dir().to_path_buf()));
    match home {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

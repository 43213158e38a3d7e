// src/config.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

use crate::dispatch::PoolSizes;
use crate::fco::FcoRef;

/// Root configuration loaded from `config.yaml`.
///
/// This file controls:
/// - The archive repository (path + enabled flag)
/// - The static FCO inventory commands resolve targets from
/// - Worker pool sizes per operation category
/// - Server bind address and default operation options
///
/// Operators only need to edit `config.yaml`, not this Rust file.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Archive repository section.
    pub repository: RepositoryConfig,

    /// Inventory of known FCOs.
    ///
    /// Example:
    ///
    /// inventory:
    ///   - uuid: 4222f878-0f6d-4c2e-8f3a-1df7c5a5e001
    ///     name: web-01
    ///     type: vm
    ///     tags: [production]
    #[serde(default)]
    pub inventory: Vec<FcoRef>,

    /// Worker pool sizes per operation category.
    #[serde(default)]
    pub pools: PoolsConfig,

    /// API server settings; used by `serve` only.
    #[serde(default)]
    pub server: ServerConfig,

    /// Default operation options, overridable per invocation.
    #[serde(default)]
    pub options: OptionsConfig,
}

/// Repository configuration section.
///
/// Example in config.yaml:
///
/// repository:
///   name: nfs-archive
///   path: /var/lib/vmkeeper/archive
///   enabled: true
#[derive(Debug, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default = "default_repository_name")]
    pub name: String,

    /// Repository root directory. Resolved relative to the working
    /// directory when not absolute.
    pub path: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Worker pool configuration.
///
/// Example:
///
/// pools:
///   fco: 4
///   archive: 2
///   generation: 2
#[derive(Debug, Deserialize)]
pub struct PoolsConfig {
    #[serde(default = "default_fco_pool")]
    pub fco: usize,

    #[serde(default = "default_aux_pool")]
    pub archive: usize,

    #[serde(default = "default_aux_pool")]
    pub generation: usize,
}

impl Default for PoolsConfig {
    fn default() -> Self {
        Self {
            fco: default_fco_pool(),
            archive: default_aux_pool(),
            generation: default_aux_pool(),
        }
    }
}

impl PoolsConfig {
    pub fn sizes(&self) -> PoolSizes {
        PoolSizes {
            fco: self.fco,
            archive: self.archive,
            generation: self.generation,
        }
    }
}

/// API server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Default operation options.
///
/// Example:
///
/// options:
///   keep_generations: 7
#[derive(Debug, Deserialize)]
pub struct OptionsConfig {
    /// Retention count used by archive-remove when the CLI/API does not
    /// override it.
    #[serde(default = "default_keep_generations")]
    pub keep_generations: u32,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            keep_generations: default_keep_generations(),
        }
    }
}

fn default_repository_name() -> String {
    "archive".to_string()
}

fn default_true() -> bool {
    true
}

fn default_fco_pool() -> usize {
    4
}

fn default_aux_pool() -> usize {
    2
}

fn default_bind() -> String {
    "127.0.0.1:8974".to_string()
}

fn default_keep_generations() -> u32 {
    7
}

impl Config {
    /// Load and parse `config.yaml` from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let cfg: Config = serde_yaml::from_str(&raw).context("Failed to parse YAML config")?;

        Ok(cfg)
    }
}

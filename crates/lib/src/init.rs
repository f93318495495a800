//! Initialize a working directory: default `config.json` and an empty alert catalog.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{self, Config};

/// Paths written (or found already present) by [`init_config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitPaths {
    pub config: PathBuf,
    pub catalog: PathBuf,
}

/// Create the config file and the catalog file if they do not exist.
/// - Writes `config_path` with the default config (pretty JSON) if missing.
/// - Writes the catalog named by the (possibly pre-existing) config as `{}` if missing.
pub fn init_config(config_path: &Path) -> Result<InitPaths> {
    let config_dir = parent_dir(config_path);
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    let (config, _) = config::load_config(Some(config_path.to_path_buf()))?;
    if !config_path.exists() {
        let s = serde_json::to_string_pretty(&Config::default())?;
        std::fs::write(config_path, s)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let catalog = config::resolve_catalog_path(&config, config_path);
    if !catalog.exists() {
        let dir = parent_dir(&catalog);
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating catalog directory {}", dir.display()))?;
        std::fs::write(&catalog, b"{}")
            .with_context(|| format!("writing empty alert catalog to {}", catalog.display()))?;
        log::info!("created empty alert catalog at {}", catalog.display());
    } else {
        log::debug!("alert catalog already exists at {}, skipping", catalog.display());
    }

    Ok(InitPaths {
        config: config_path.to_path_buf(),
        catalog,
    })
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AlertCatalog;

    #[test]
    fn creates_config_and_catalog_once() {
        let dir = std::env::temp_dir().join(format!("assist-init-test-{}", std::process::id()));
        let config_path = dir.join("config.json");

        let paths = init_config(&config_path).unwrap();
        assert_eq!(paths.catalog, dir.join("resources").join("alerts.json"));
        let (config, _) = config::load_config(Some(config_path.clone())).unwrap();
        assert_eq!(config.poll.interval_ms, 1000);
        assert!(AlertCatalog::load(&paths.catalog).unwrap().is_empty());

        std::fs::write(&paths.catalog, r#"{"HighCPU": {}}"#).unwrap();
        init_config(&config_path).unwrap();
        assert_eq!(AlertCatalog::load(&paths.catalog).unwrap().len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}

use std::fs;
use std::path::PathBuf;

use crate::client::FileTokenStore;

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("MINDREVEAL_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("mindreveal").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn tokens_path() -> anyhow::Result<PathBuf> {
    Ok(get_config_dir()?.join("tokens.json"))
}

/// Token store shared by every CLI invocation.
pub fn open_token_store() -> anyhow::Result<FileTokenStore> {
    Ok(FileTokenStore::open(tokens_path()?))
}

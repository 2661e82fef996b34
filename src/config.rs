use crate::seed::DataFiles;
use std::env;

/// Runtime settings, all overridable through the environment. The data file
/// variables keep the names the deployment scripts already use.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub db_path: std::path::PathBuf,
    pub data_files: DataFiles,
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_owned())
}

impl Config {
    pub fn from_env() -> Config {
        Config {
            bind_addr: env_or("SWIFTRECIPE_ADDR", "127.0.0.1:8080"),
            db_path: env_or("SWIFTRECIPE_DB_PATH", "swiftrecipe.sled").into(),
            data_files: DataFiles {
                descriptions: env_or("DESCRIPTION_FILE_PATH", "data/descriptions.txt").into(),
                ingredients: env_or("INGREDIENTS_FILE_PATH", "data/ingredients.txt").into(),
                instructions: env_or("INSTRUCTIONS_FILE_PATH", "data/instructions.txt").into(),
            },
        }
    }
}

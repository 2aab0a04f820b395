use std::env;
use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::PublishError;

pub const DEFAULT_PORTAL_URL: &str = "https://www.arcgis.com";
pub const DEFAULT_GOAL_LIST_URL: &str =
    "https://unstats.un.org/SDGAPI/v1/sdg/Goal/List?includechildren=true";
pub const DEFAULT_METADATA_URL: &str =
    "https://raw.githubusercontent.com/UNStats/FIS4SDGs/master/metadataAPI.json";
pub const DEFAULT_OPEN_DATA_GROUP_ID: &str = "15c1671f5fbc4a00b1a359d51ea6a546";
pub const DEFAULT_DATA_DIR: &str = "FIS4SDGs/csv";
pub const DEFAULT_FOLDER: &str = "Open Data";
pub const DEFAULT_ADMIN_USERNAME: &str = "unstats_admin";

pub const USERNAME_ENV: &str = "SDG_CATALOG_USERNAME";
pub const PASSWORD_ENV: &str = "SDG_CATALOG_PASSWORD";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub portal_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub goal_list_url: Option<String>,
    #[serde(default)]
    pub metadata_url: Option<String>,
    #[serde(default)]
    pub open_data_group_id: Option<String>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub admin_username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub portal_url: String,
    pub goal_list_url: String,
    pub metadata_url: String,
    pub open_data_group_id: String,
    pub data_dir: Utf8PathBuf,
    pub folder: String,
    pub admin_username: String,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<(ResolvedConfig, Credentials), PublishError> {
        let config = Self::load(path)?;
        let credentials = Self::credentials_from(
            &config,
            env::var(USERNAME_ENV).ok(),
            env::var(PASSWORD_ENV).ok(),
        )?;
        Ok((Self::resolve_config(config), credentials))
    }

    pub fn load(path: Option<&str>) -> Result<Config, PublishError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("sdg-catalog.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| PublishError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| PublishError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(config: Config) -> ResolvedConfig {
        ResolvedConfig {
            portal_url: config
                .portal_url
                .unwrap_or_else(|| DEFAULT_PORTAL_URL.to_string()),
            goal_list_url: config
                .goal_list_url
                .unwrap_or_else(|| DEFAULT_GOAL_LIST_URL.to_string()),
            metadata_url: config
                .metadata_url
                .unwrap_or_else(|| DEFAULT_METADATA_URL.to_string()),
            open_data_group_id: config
                .open_data_group_id
                .unwrap_or_else(|| DEFAULT_OPEN_DATA_GROUP_ID.to_string()),
            data_dir: config
                .data_dir
                .map(Utf8PathBuf::from)
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATA_DIR)),
            folder: config.folder.unwrap_or_else(|| DEFAULT_FOLDER.to_string()),
            admin_username: config
                .admin_username
                .unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_string()),
        }
    }

    pub fn credentials_from(
        config: &Config,
        env_username: Option<String>,
        env_password: Option<String>,
    ) -> Result<Credentials, PublishError> {
        let username = env_username.or_else(|| config.username.clone());
        let password = env_password.or_else(|| config.password.clone());
        match (username, password) {
            (Some(username), Some(password)) => Ok(Credentials { username, password }),
            _ => Err(PublishError::MissingCredentials),
        }
    }
}

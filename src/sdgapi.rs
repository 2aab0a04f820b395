use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::PublishError;
use crate::taxonomy::{Goal, GoalDisplay};

pub trait SdgApiClient: Send + Sync {
    fn fetch_goal_tree(&self) -> Result<Vec<Goal>, PublishError>;
    fn fetch_display_metadata(&self) -> Result<Vec<GoalDisplay>, PublishError>;
}

#[derive(Clone)]
pub struct SdgApiHttpClient {
    client: Client,
    goal_list_url: String,
    metadata_url: String,
}

impl SdgApiHttpClient {
    pub fn new(goal_list_url: &str, metadata_url: &str) -> Result<Self, PublishError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("sdg-catalog/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PublishError::SdgApiHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| PublishError::SdgApiHttp(err.to_string()))?;
        Ok(Self {
            client,
            goal_list_url: goal_list_url.to_string(),
            metadata_url: metadata_url.to_string(),
        })
    }

    fn handle_goal_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, PublishError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "SDG API request failed".to_string());
        Err(PublishError::SdgApiStatus { status, message })
    }

    fn handle_metadata_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, PublishError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "display metadata request failed".to_string());
        Err(PublishError::DisplayMetadataStatus { status, message })
    }
}

impl SdgApiClient for SdgApiHttpClient {
    fn fetch_goal_tree(&self) -> Result<Vec<Goal>, PublishError> {
        let response = self
            .client
            .get(&self.goal_list_url)
            .send()
            .map_err(|err| PublishError::SdgApiHttp(err.to_string()))?;
        let response = Self::handle_goal_status(response)?;
        response
            .json()
            .map_err(|err| PublishError::SdgApiParse(err.to_string()))
    }

    fn fetch_display_metadata(&self) -> Result<Vec<GoalDisplay>, PublishError> {
        let response = self
            .client
            .get(&self.metadata_url)
            .send()
            .map_err(|err| PublishError::DisplayMetadataHttp(err.to_string()))?;
        let response = Self::handle_metadata_status(response)?;
        response
            .json()
            .map_err(|err| PublishError::DisplayMetadataHttp(err.to_string()))
    }
}

use std::time::Duration;

use camino::Utf8Path;
use reqwest::blocking::{Client, multipart};
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use serde_json::Value;

use crate::card::ItemCard;
use crate::error::PublishError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    pub owner_folder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: String,
    pub title: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GroupProperties {
    pub title: String,
    pub snippet: String,
    pub description: String,
    pub tags: Vec<String>,
    pub thumbnail: String,
}

#[derive(Debug, Clone)]
pub struct ShareOptions {
    pub everyone: bool,
    pub org: bool,
    pub groups: String,
    pub allow_members_to_edit: bool,
}

#[derive(Debug, Clone)]
pub struct CatalogUser {
    pub username: String,
}

pub trait CatalogClient: Send + Sync {
    fn username(&self) -> &str;
    fn search_items(&self, query: &str) -> Result<Vec<CatalogItem>, PublishError>;
    fn add_csv_item(&self, card: &ItemCard, data_file: &Utf8Path)
    -> Result<CatalogItem, PublishError>;
    fn update_item(
        &self,
        item: &CatalogItem,
        card: &ItemCard,
        data_file: Option<&Utf8Path>,
    ) -> Result<(), PublishError>;
    fn move_item(&self, item: &CatalogItem, folder: &str) -> Result<(), PublishError>;
    fn analyze_csv(&self, item_id: &str) -> Result<Value, PublishError>;
    fn publish_csv_item(
        &self,
        item: &CatalogItem,
        publish_parameters: &Value,
    ) -> Result<CatalogItem, PublishError>;
    fn share_item(&self, item: &CatalogItem, options: &ShareOptions) -> Result<(), PublishError>;
    fn get_group(&self, group_id: &str) -> Result<Group, PublishError>;
    fn search_groups(&self, query: &str) -> Result<Vec<Group>, PublishError>;
    fn create_group(&self, properties: &GroupProperties) -> Result<Group, PublishError>;
    fn update_group(&self, group_id: &str, properties: &GroupProperties)
    -> Result<(), PublishError>;
    fn set_group_tags(&self, group_id: &str, tags: &[String]) -> Result<(), PublishError>;
    fn user_items(&self, folder: &str, max_items: usize) -> Result<Vec<CatalogItem>, PublishError>;
    fn get_user(&self, username: &str) -> Result<Option<CatalogUser>, PublishError>;
    fn reassign_item(
        &self,
        item: &CatalogItem,
        new_owner: &str,
        folder: &str,
    ) -> Result<(), PublishError>;
    fn delete_item(&self, item: &CatalogItem) -> Result<(), PublishError>;
}

#[derive(Clone)]
pub struct CatalogHttpClient {
    client: Client,
    portal_url: String,
    username: String,
    token: String,
}

impl CatalogHttpClient {
    pub fn connect(portal_url: &str, username: &str, password: &str) -> Result<Self, PublishError> {
        let portal_url = portal_url.trim_end_matches('/').to_string();
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("sdg-catalog/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PublishError::CatalogHttp(err.to_string()))?,
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(&portal_url)
                .map_err(|err| PublishError::CatalogHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| PublishError::CatalogHttp(err.to_string()))?;

        let token_url = format!("{portal_url}/sharing/rest/generateToken");
        let response = client
            .post(&token_url)
            .form(&[
                ("username", username),
                ("password", password),
                ("referer", portal_url.as_str()),
                ("expiration", "120"),
                ("f", "json"),
            ])
            .send()
            .map_err(|err| PublishError::CatalogHttp(err.to_string()))?;
        let payload = Self::json_body(response).map_err(|err| match err {
            PublishError::CatalogApi(message) => PublishError::Authentication {
                username: username.to_string(),
                message,
            },
            other => other,
        })?;
        let token = payload
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| PublishError::Authentication {
                username: username.to_string(),
                message: "no token in response".to_string(),
            })?
            .to_string();

        Ok(Self {
            client,
            portal_url,
            username: username.to_string(),
            token,
        })
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/sharing/rest/{path}", self.portal_url)
    }

    fn user_url(&self, path: &str) -> String {
        self.rest_url(&format!("content/users/{}/{path}", self.username))
    }

    fn item_url(&self, item: &CatalogItem, action: &str) -> String {
        match &item.owner_folder {
            Some(folder) => self.user_url(&format!("{folder}/items/{}/{action}", item.id)),
            None => self.user_url(&format!("items/{}/{action}", item.id)),
        }
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, PublishError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "catalog request failed".to_string());
        Err(PublishError::CatalogStatus { status, message })
    }

    fn json_body(response: reqwest::blocking::Response) -> Result<Value, PublishError> {
        let response = Self::handle_status(response)?;
        let payload: Value = response
            .json()
            .map_err(|err| PublishError::CatalogHttp(err.to_string()))?;
        if let Some(error) = payload.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("catalog call failed")
                .to_string();
            return Err(PublishError::CatalogApi(message));
        }
        Ok(payload)
    }

    fn get_json(&self, url: &str, params: &[(&str, &str)]) -> Result<Value, PublishError> {
        let mut query: Vec<(&str, &str)> = vec![("f", "json"), ("token", self.token.as_str())];
        query.extend_from_slice(params);
        let response = self
            .client
            .get(url)
            .query(&query)
            .send()
            .map_err(|err| PublishError::CatalogHttp(err.to_string()))?;
        Self::json_body(response)
    }

    fn post_form(&self, url: &str, params: &[(&str, &str)]) -> Result<Value, PublishError> {
        let mut form: Vec<(&str, &str)> = vec![("f", "json"), ("token", self.token.as_str())];
        form.extend_from_slice(params);
        let response = self
            .client
            .post(url)
            .form(&form)
            .send()
            .map_err(|err| PublishError::CatalogHttp(err.to_string()))?;
        Self::json_body(response)
    }

    fn card_form(&self, card: &ItemCard) -> multipart::Form {
        multipart::Form::new()
            .text("f", "json")
            .text("token", self.token.clone())
            .text("title", card.title.clone())
            .text("snippet", card.snippet.clone())
            .text("description", card.description.clone())
            .text("tags", card.tags.join(","))
            .text("thumbnailurl", card.thumbnail.clone())
    }

    fn resolve_folder_id(&self, folder: &str) -> Result<String, PublishError> {
        if let Some(id) = self.find_folder_id(folder)? {
            return Ok(id);
        }
        let payload = self.post_form(&self.user_url("createFolder"), &[("title", folder)])?;
        payload
            .get("folder")
            .and_then(|value| value.get("id"))
            .and_then(Value::as_str)
            .map(|id| id.to_string())
            .ok_or_else(|| PublishError::CatalogApi("createFolder returned no folder id".to_string()))
    }

    fn find_folder_id(&self, folder: &str) -> Result<Option<String>, PublishError> {
        let url = self.rest_url(&format!("content/users/{}", self.username));
        let payload = self.get_json(&url, &[])?;
        let id = payload
            .get("folders")
            .and_then(Value::as_array)
            .and_then(|folders| {
                folders
                    .iter()
                    .find(|entry| entry.get("title").and_then(Value::as_str) == Some(folder))
            })
            .and_then(|entry| entry.get("id"))
            .and_then(Value::as_str)
            .map(|id| id.to_string());
        Ok(id)
    }
}

impl CatalogClient for CatalogHttpClient {
    fn username(&self) -> &str {
        &self.username
    }

    fn search_items(&self, query: &str) -> Result<Vec<CatalogItem>, PublishError> {
        let url = self.rest_url("search");
        let payload = self.get_json(&url, &[("q", query), ("num", "100")])?;
        let results = payload
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(results.iter().filter_map(item_from_value).collect())
    }

    fn add_csv_item(
        &self,
        card: &ItemCard,
        data_file: &Utf8Path,
    ) -> Result<CatalogItem, PublishError> {
        let form = self
            .card_form(card)
            .text("type", "CSV")
            .text("url", "")
            .text("async", "false")
            .file("file", data_file.as_std_path())
            .map_err(|err| PublishError::Filesystem(err.to_string()))?;
        let response = self
            .client
            .post(self.user_url("addItem"))
            .multipart(form)
            .send()
            .map_err(|err| PublishError::CatalogHttp(err.to_string()))?;
        let payload = Self::json_body(response)?;
        let id = payload
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| PublishError::CatalogApi("addItem returned no item id".to_string()))?;
        Ok(CatalogItem {
            id: id.to_string(),
            title: card.title.clone(),
            owner_folder: None,
        })
    }

    fn update_item(
        &self,
        item: &CatalogItem,
        card: &ItemCard,
        data_file: Option<&Utf8Path>,
    ) -> Result<(), PublishError> {
        let url = self.item_url(item, "update");
        match data_file {
            Some(path) => {
                let form = self
                    .card_form(card)
                    .file("file", path.as_std_path())
                    .map_err(|err| PublishError::Filesystem(err.to_string()))?;
                let response = self
                    .client
                    .post(&url)
                    .multipart(form)
                    .send()
                    .map_err(|err| PublishError::CatalogHttp(err.to_string()))?;
                Self::json_body(response)?;
            }
            None => {
                let tags = card.tags.join(",");
                self.post_form(
                    &url,
                    &[
                        ("title", card.title.as_str()),
                        ("snippet", card.snippet.as_str()),
                        ("description", card.description.as_str()),
                        ("tags", tags.as_str()),
                        ("thumbnailurl", card.thumbnail.as_str()),
                    ],
                )?;
            }
        }
        Ok(())
    }

    fn move_item(&self, item: &CatalogItem, folder: &str) -> Result<(), PublishError> {
        let folder_id = self.resolve_folder_id(folder)?;
        self.post_form(
            &self.item_url(item, "move"),
            &[("folder", folder_id.as_str())],
        )?;
        Ok(())
    }

    fn analyze_csv(&self, item_id: &str) -> Result<Value, PublishError> {
        let url = self.rest_url("content/features/analyze");
        self.post_form(
            &url,
            &[
                ("sourceLocale", "en-us"),
                ("filetype", "csv"),
                ("itemid", item_id),
            ],
        )
        .map_err(|err| match err {
            PublishError::CatalogApi(message) => PublishError::Analyze {
                item_id: item_id.to_string(),
                message,
            },
            other => other,
        })
    }

    fn publish_csv_item(
        &self,
        item: &CatalogItem,
        publish_parameters: &Value,
    ) -> Result<CatalogItem, PublishError> {
        let params = publish_parameters.to_string();
        let payload = self.post_form(
            &self.user_url("publish"),
            &[
                ("itemID", item.id.as_str()),
                ("filetype", "csv"),
                ("publishParameters", params.as_str()),
                ("overwrite", "true"),
            ],
        )?;
        let service_id = payload
            .get("services")
            .and_then(Value::as_array)
            .and_then(|services| services.first())
            .and_then(|service| service.get("serviceItemId"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PublishError::CatalogApi("publish returned no service item".to_string())
            })?;
        let title = publish_parameters
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(CatalogItem {
            id: service_id.to_string(),
            title,
            owner_folder: None,
        })
    }

    fn share_item(&self, item: &CatalogItem, options: &ShareOptions) -> Result<(), PublishError> {
        self.post_form(
            &self.item_url(item, "share"),
            &[
                ("everyone", bool_str(options.everyone)),
                ("org", bool_str(options.org)),
                ("groups", options.groups.as_str()),
                ("confirmItemControl", bool_str(options.allow_members_to_edit)),
            ],
        )?;
        Ok(())
    }

    fn get_group(&self, group_id: &str) -> Result<Group, PublishError> {
        let url = self.rest_url(&format!("community/groups/{group_id}"));
        let payload = self.get_json(&url, &[]).map_err(|err| match err {
            PublishError::CatalogApi(_) => PublishError::GroupNotFound(group_id.to_string()),
            other => other,
        })?;
        group_from_value(&payload).ok_or_else(|| PublishError::GroupNotFound(group_id.to_string()))
    }

    fn search_groups(&self, query: &str) -> Result<Vec<Group>, PublishError> {
        let url = self.rest_url("community/groups");
        let payload = self.get_json(&url, &[("q", query)])?;
        let results = payload
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(results.iter().filter_map(group_from_value).collect())
    }

    fn create_group(&self, properties: &GroupProperties) -> Result<Group, PublishError> {
        let tags = group_tags_str(&properties.tags);
        let payload = self.post_form(
            &self.rest_url("community/createGroup"),
            &[
                ("title", properties.title.as_str()),
                ("snippet", properties.snippet.as_str()),
                ("description", properties.description.as_str()),
                ("tags", tags.as_str()),
                ("thumbnailurl", properties.thumbnail.as_str()),
                ("isOpenData", "true"),
                ("access", "public"),
                ("isInvitationOnly", "true"),
                ("protected", "true"),
            ],
        )?;
        payload
            .get("group")
            .and_then(group_from_value)
            .ok_or_else(|| PublishError::CatalogApi("createGroup returned no group".to_string()))
    }

    fn update_group(
        &self,
        group_id: &str,
        properties: &GroupProperties,
    ) -> Result<(), PublishError> {
        let tags = group_tags_str(&properties.tags);
        self.post_form(
            &self.rest_url(&format!("community/groups/{group_id}/update")),
            &[
                ("title", properties.title.as_str()),
                ("snippet", properties.snippet.as_str()),
                ("description", properties.description.as_str()),
                ("tags", tags.as_str()),
                ("thumbnailurl", properties.thumbnail.as_str()),
                ("access", "Public"),
            ],
        )?;
        Ok(())
    }

    fn set_group_tags(&self, group_id: &str, tags: &[String]) -> Result<(), PublishError> {
        let tags = tags.join(",");
        self.post_form(
            &self.rest_url(&format!("community/groups/{group_id}/update")),
            &[("tags", tags.as_str())],
        )?;
        Ok(())
    }

    fn user_items(&self, folder: &str, max_items: usize) -> Result<Vec<CatalogItem>, PublishError> {
        let folder_id = match self.find_folder_id(folder)? {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };
        let url = self.rest_url(&format!("content/users/{}/{folder_id}", self.username));
        let num = max_items.to_string();
        let payload = self.get_json(&url, &[("num", num.as_str())])?;
        let values = payload
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut items = Vec::new();
        for value in &values {
            if let Some(mut item) = item_from_value(value) {
                if item.owner_folder.is_none() {
                    item.owner_folder = Some(folder_id.clone());
                }
                items.push(item);
            }
        }
        Ok(items)
    }

    fn get_user(&self, username: &str) -> Result<Option<CatalogUser>, PublishError> {
        let url = self.rest_url(&format!("community/users/{username}"));
        match self.get_json(&url, &[]) {
            Ok(payload) => Ok(payload
                .get("username")
                .and_then(Value::as_str)
                .map(|name| CatalogUser {
                    username: name.to_string(),
                })),
            Err(PublishError::CatalogApi(_)) => Ok(None),
            Err(other) => Err(other),
        }
    }

    fn reassign_item(
        &self,
        item: &CatalogItem,
        new_owner: &str,
        folder: &str,
    ) -> Result<(), PublishError> {
        self.post_form(
            &self.item_url(item, "reassign"),
            &[("targetUsername", new_owner), ("targetFoldername", folder)],
        )?;
        Ok(())
    }

    fn delete_item(&self, item: &CatalogItem) -> Result<(), PublishError> {
        self.post_form(&self.item_url(item, "delete"), &[])?;
        Ok(())
    }
}

fn bool_str(flag: bool) -> &'static str {
    if flag { "true" } else { "false" }
}

fn group_tags_str(tags: &[String]) -> String {
    tags.join(", ")
}

fn item_from_value(value: &Value) -> Option<CatalogItem> {
    Some(CatalogItem {
        id: value.get("id")?.as_str()?.to_string(),
        title: value
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        owner_folder: value
            .get("ownerFolder")
            .and_then(Value::as_str)
            .map(|folder| folder.to_string()),
    })
}

fn group_from_value(value: &Value) -> Option<Group> {
    Some(Group {
        id: value.get("id")?.as_str()?.to_string(),
        title: value
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        tags: value
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(|tag| tag.to_string())
                    .collect()
            })
            .unwrap_or_default(),
    })
}

use std::sync::{Arc, Mutex, MutexGuard};

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;

use sdg_catalog_publisher::app::{App, ProgressEvent, ProgressSink, RunOptions};
use sdg_catalog_publisher::card::{FALLBACK_THUMBNAIL_URL, ItemCard};
use sdg_catalog_publisher::catalog::{
    CatalogClient, CatalogItem, CatalogUser, Group, GroupProperties, ShareOptions,
};
use sdg_catalog_publisher::config::{Config, ConfigLoader};
use sdg_catalog_publisher::error::PublishError;
use sdg_catalog_publisher::output::JsonOutput;
use sdg_catalog_publisher::sdgapi::SdgApiClient;
use sdg_catalog_publisher::store::DataStore;
use sdg_catalog_publisher::taxonomy::{Goal, GoalDisplay, LevelFilter, TaxonomyFilter};

const GOAL_TREE: &str = r#"[
    {"code": "1", "title": "No Poverty", "description": "End poverty in all its forms everywhere", "targets": [
        {"code": "1.1", "description": "Eradicate extreme poverty", "indicators": [
            {"code": "1.1.1", "description": "Proportion of population below the international poverty line", "series": [
                {"code": "SI_POV_DAY1", "description": "Poverty headcount below $1.90/day", "release": "2020.Q1.G.01"},
                {"code": "SI_POV_EMP1", "description": "Employed population below poverty line", "release": "2020.Q1.G.01"}
            ]}
        ]}
    ]},
    {"code": "2", "title": "Zero Hunger", "description": "End hunger and achieve food security", "targets": [
        {"code": "2.1", "description": "End hunger and ensure access to safe food", "indicators": [
            {"code": "2.1.1", "description": "Prevalence of undernourishment", "series": [
                {"code": "SN_ITK_DEFC", "description": "Prevalence of undernourishment", "release": "2020.Q1.G.01"}
            ]}
        ]}
    ]}
]"#;

const DISPLAY_METADATA: &str = r#"[
    {"goal": 1, "icon_url_sq": "https://example.org/icons/sdg1.png", "targets": [
        {"target": "1.1", "indicators": [
            {"indicator": "1.1.1", "series": [
                {"series": "SI_POV_DAY1", "tags": ["poverty", "world bank"]}
            ]}
        ]}
    ]}
]"#;

const ANALYZE_RESPONSE: &str = r#"{
    "publishParameters": {
        "type": "csv",
        "layerInfo": {
            "name": "draft",
            "fields": [
                {"name": "series_code", "alias": "series_code", "type": "esriFieldTypeString", "sqlType": "sqlTypeOther"},
                {"name": "indicator", "alias": "indicator", "type": "esriFieldTypeDouble", "sqlType": "sqlTypeOther"},
                {"name": "geoAreaName", "alias": "geoAreaName", "type": "esriFieldTypeString", "sqlType": "sqlTypeOther"}
            ]
        }
    }
}"#;

const DAY1_CSV_TITLE: &str = "SI_POV_DAY1_2020Q1G01";
const DAY1_SERVICE_TITLE: &str = "Indicator 1.1.1 (SI_POV_DAY1): Poverty headcount below $1.90/day";

struct MockSdg;

impl SdgApiClient for MockSdg {
    fn fetch_goal_tree(&self) -> Result<Vec<Goal>, PublishError> {
        Ok(serde_json::from_str(GOAL_TREE).unwrap())
    }

    fn fetch_display_metadata(&self) -> Result<Vec<GoalDisplay>, PublishError> {
        Ok(serde_json::from_str(DISPLAY_METADATA).unwrap())
    }
}

struct EmptyDisplaySdg;

impl SdgApiClient for EmptyDisplaySdg {
    fn fetch_goal_tree(&self) -> Result<Vec<Goal>, PublishError> {
        Ok(serde_json::from_str(GOAL_TREE).unwrap())
    }

    fn fetch_display_metadata(&self) -> Result<Vec<GoalDisplay>, PublishError> {
        Ok(Vec::new())
    }
}

struct FailingDisplaySdg;

impl SdgApiClient for FailingDisplaySdg {
    fn fetch_goal_tree(&self) -> Result<Vec<Goal>, PublishError> {
        Ok(serde_json::from_str(GOAL_TREE).unwrap())
    }

    fn fetch_display_metadata(&self) -> Result<Vec<GoalDisplay>, PublishError> {
        Err(PublishError::DisplayMetadataHttp(
            "connection reset".to_string(),
        ))
    }
}

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}

#[derive(Default)]
struct CatalogState {
    next_id: usize,
    items: Vec<CatalogItem>,
    goal_groups: Vec<Group>,
    user_items: Vec<CatalogItem>,
    admin_exists: bool,
    fail_publish: bool,
    fail_share: bool,
    added: Vec<String>,
    updated: Vec<(String, bool)>,
    moved: Vec<(String, String)>,
    analyzed: Vec<String>,
    publish_parameters: Vec<Value>,
    shared: Vec<(String, String)>,
    group_tags: Vec<Vec<String>>,
    created_groups: Vec<GroupProperties>,
    updated_groups: Vec<(String, String)>,
    reassigned: Vec<(String, String)>,
    deleted: Vec<String>,
}

impl CatalogState {
    fn mint_item(&mut self, title: &str) -> CatalogItem {
        self.next_id += 1;
        CatalogItem {
            id: format!("item-{}", self.next_id),
            title: title.to_string(),
            owner_folder: None,
        }
    }
}

#[derive(Clone, Default)]
struct MockCatalog {
    state: Arc<Mutex<CatalogState>>,
}

impl MockCatalog {
    fn state(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap()
    }
}

impl CatalogClient for MockCatalog {
    fn username(&self) -> &str {
        "unstats_pub"
    }

    fn search_items(&self, _query: &str) -> Result<Vec<CatalogItem>, PublishError> {
        Ok(self.state().items.clone())
    }

    fn add_csv_item(
        &self,
        card: &ItemCard,
        _data_file: &Utf8Path,
    ) -> Result<CatalogItem, PublishError> {
        let mut state = self.state();
        let item = state.mint_item(&card.title);
        state.added.push(card.title.clone());
        state.items.push(item.clone());
        Ok(item)
    }

    fn update_item(
        &self,
        item: &CatalogItem,
        card: &ItemCard,
        data_file: Option<&Utf8Path>,
    ) -> Result<(), PublishError> {
        let mut state = self.state();
        state.updated.push((card.title.clone(), data_file.is_some()));
        if let Some(stored) = state.items.iter_mut().find(|stored| stored.id == item.id) {
            stored.title = card.title.clone();
        }
        Ok(())
    }

    fn move_item(&self, item: &CatalogItem, folder: &str) -> Result<(), PublishError> {
        let mut state = self.state();
        state.moved.push((item.id.clone(), folder.to_string()));
        if let Some(stored) = state.items.iter_mut().find(|stored| stored.id == item.id) {
            stored.owner_folder = Some(folder.to_string());
        }
        Ok(())
    }

    fn analyze_csv(&self, item_id: &str) -> Result<Value, PublishError> {
        self.state().analyzed.push(item_id.to_string());
        Ok(serde_json::from_str(ANALYZE_RESPONSE).unwrap())
    }

    fn publish_csv_item(
        &self,
        _item: &CatalogItem,
        publish_parameters: &Value,
    ) -> Result<CatalogItem, PublishError> {
        let mut state = self.state();
        if state.fail_publish {
            return Err(PublishError::CatalogApi("publish job failed".to_string()));
        }
        let title = publish_parameters
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        state.publish_parameters.push(publish_parameters.clone());
        let service = state.mint_item(&title);
        state.items.push(service.clone());
        Ok(service)
    }

    fn share_item(&self, item: &CatalogItem, options: &ShareOptions) -> Result<(), PublishError> {
        let mut state = self.state();
        if state.fail_share {
            return Err(PublishError::CatalogApi("sharing is disabled".to_string()));
        }
        state.shared.push((item.id.clone(), options.groups.clone()));
        Ok(())
    }

    fn get_group(&self, group_id: &str) -> Result<Group, PublishError> {
        Ok(Group {
            id: group_id.to_string(),
            title: "UN Open Data".to_string(),
            tags: vec!["sdg".to_string()],
        })
    }

    fn search_groups(&self, _query: &str) -> Result<Vec<Group>, PublishError> {
        Ok(self.state().goal_groups.clone())
    }

    fn create_group(&self, properties: &GroupProperties) -> Result<Group, PublishError> {
        let mut state = self.state();
        state.next_id += 1;
        let group = Group {
            id: format!("group-{}", state.next_id),
            title: properties.title.clone(),
            tags: properties.tags.clone(),
        };
        state.created_groups.push(properties.clone());
        state.goal_groups.push(group.clone());
        Ok(group)
    }

    fn update_group(
        &self,
        group_id: &str,
        properties: &GroupProperties,
    ) -> Result<(), PublishError> {
        self.state()
            .updated_groups
            .push((group_id.to_string(), properties.title.clone()));
        Ok(())
    }

    fn set_group_tags(&self, _group_id: &str, tags: &[String]) -> Result<(), PublishError> {
        self.state().group_tags.push(tags.to_vec());
        Ok(())
    }

    fn user_items(
        &self,
        _folder: &str,
        max_items: usize,
    ) -> Result<Vec<CatalogItem>, PublishError> {
        Ok(self.state().user_items.iter().take(max_items).cloned().collect())
    }

    fn get_user(&self, username: &str) -> Result<Option<CatalogUser>, PublishError> {
        if self.state().admin_exists {
            Ok(Some(CatalogUser {
                username: username.to_string(),
            }))
        } else {
            Ok(None)
        }
    }

    fn reassign_item(
        &self,
        item: &CatalogItem,
        new_owner: &str,
        _folder: &str,
    ) -> Result<(), PublishError> {
        self.state()
            .reassigned
            .push((item.id.clone(), new_owner.to_string()));
        Ok(())
    }

    fn delete_item(&self, item: &CatalogItem) -> Result<(), PublishError> {
        self.state().deleted.push(item.id.clone());
        Ok(())
    }
}

fn fixture_with<S: SdgApiClient>(sdg: S) -> (tempfile::TempDir, App<S, MockCatalog>, MockCatalog) {
    let temp = tempfile::tempdir().unwrap();
    let data_dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let config = ConfigLoader::resolve_config(Config {
        data_dir: Some(data_dir.to_string()),
        ..Config::default()
    });
    let catalog = MockCatalog::default();
    let app = App::new(DataStore::new(data_dir), sdg, catalog.clone(), config);
    (temp, app, catalog)
}

fn fixture() -> (tempfile::TempDir, App<MockSdg, MockCatalog>, MockCatalog) {
    fixture_with(MockSdg)
}

fn write_series_csv(temp: &tempfile::TempDir, code: &str) {
    std::fs::write(
        temp.path().join(format!("{code}_cube.pivot.csv")),
        format!("geoAreaName,series_code,latest_value\nWorld,{code},9.2\n"),
    )
    .unwrap();
}

fn day1_options(metadata_only: bool) -> RunOptions {
    RunOptions {
        filter: TaxonomyFilter {
            goal: LevelFilter::Exact("1".to_string()),
            series: LevelFilter::Exact("SI_POV_DAY1".to_string()),
            ..TaxonomyFilter::default()
        },
        metadata_only,
    }
}

#[test]
fn publishes_new_series_end_to_end() {
    let (temp, app, catalog) = fixture();
    write_series_csv(&temp, "SI_POV_DAY1");

    let report = app.process_taxonomy(&day1_options(false), &JsonOutput);

    assert_eq!(report.processed, 1);
    assert_eq!(report.published, 1);
    assert_eq!(report.updated, 0);
    assert!(report.failed_series.is_empty());
    assert!(report.aborted.is_none());

    let state = catalog.state();
    assert_eq!(state.added, vec![DAY1_CSV_TITLE.to_string()]);
    assert_eq!(state.analyzed.len(), 1);

    let params = &state.publish_parameters[0];
    assert_eq!(params["name"], DAY1_CSV_TITLE);
    assert_eq!(params["layerInfo"]["displayField"], "geoAreaName");
    assert_eq!(
        params["layerInfo"]["name"],
        "SI_POV_DAY1: Poverty headcount below $1.90/day"
    );
    let fields = params["layerInfo"]["fields"].as_array().unwrap();
    assert_eq!(fields[0]["alias"], "Series Code");
    assert_eq!(fields[1]["type"], "esriFieldTypeString");
    assert_eq!(fields[1]["sqlType"], "sqlTypeNVarchar");
    assert_eq!(fields[2]["alias"], "Geographic Area Name");

    let service = state
        .items
        .iter()
        .find(|item| item.title == DAY1_SERVICE_TITLE)
        .unwrap();
    assert_eq!(service.owner_folder.as_deref(), Some("Open Data"));
    assert_eq!(state.moved.len(), 2);
    assert!(state.moved.iter().all(|(_, folder)| folder == "Open Data"));
    assert_eq!(
        state.shared,
        vec![(
            service.id.clone(),
            "15c1671f5fbc4a00b1a359d51ea6a546".to_string()
        )]
    );

    assert_eq!(state.created_groups.len(), 1);
    assert_eq!(state.created_groups[0].title, "SDG 1");
    assert_eq!(
        state.created_groups[0].tags,
        vec![
            "SDG 1".to_string(),
            "Open Data".to_string(),
            "Hub".to_string()
        ]
    );

    assert_eq!(state.group_tags.len(), 3);
    assert_eq!(
        state.group_tags[2],
        vec![
            "sdg".to_string(),
            "Target 1.1".to_string(),
            "Indicator 1.1.1".to_string(),
            "SI_POV_DAY1".to_string()
        ]
    );
}

#[test]
fn second_run_updates_items_in_place() {
    let (temp, app, catalog) = fixture();
    write_series_csv(&temp, "SI_POV_DAY1");

    let first = app.process_taxonomy(&day1_options(false), &JsonOutput);
    let second = app.process_taxonomy(&day1_options(false), &JsonOutput);

    assert_eq!(first.published, 1);
    assert_eq!(second.published, 0);
    assert_eq!(second.updated, 1);
    assert!(second.failed_series.is_empty());

    let state = catalog.state();
    assert_eq!(state.added.len(), 1);
    assert_eq!(state.analyzed.len(), 1);
    assert_eq!(state.items.len(), 2);
    assert!(state
        .updated
        .contains(&(DAY1_CSV_TITLE.to_string(), true)));
    assert_eq!(state.moved.len(), 2);
    assert_eq!(state.created_groups.len(), 1);
    assert_eq!(state.updated_groups.len(), 1);
    assert_eq!(state.updated_groups[0].1, "SDG 1");
    assert_eq!(state.shared.len(), 2);
}

#[test]
fn metadata_only_updates_existing_service_item() {
    let (_temp, app, catalog) = fixture();
    {
        let mut state = catalog.state();
        let item = state.mint_item(DAY1_SERVICE_TITLE);
        state.items.push(item);
    }

    let report = app.process_taxonomy(&day1_options(true), &JsonOutput);

    assert_eq!(report.processed, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.published, 0);
    assert!(report.failed_series.is_empty());
    assert!(report.metadata_only);

    let state = catalog.state();
    assert!(state.added.is_empty());
    assert_eq!(state.updated, vec![(DAY1_SERVICE_TITLE.to_string(), false)]);
    assert_eq!(state.shared.len(), 1);
    assert_eq!(
        state.group_tags.last().unwrap().last().unwrap(),
        "SI_POV_DAY1"
    );
}

#[test]
fn metadata_only_missing_item_is_recorded_not_created() {
    let (_temp, app, catalog) = fixture();

    let report = app.process_taxonomy(&day1_options(true), &JsonOutput);

    assert_eq!(report.processed, 1);
    assert_eq!(report.updated, 0);
    assert_eq!(report.failed_series, vec!["SI_POV_DAY1".to_string()]);
    assert!(report.aborted.is_none());

    let state = catalog.state();
    assert!(state.added.is_empty());
    assert!(state.updated.is_empty());
    assert!(state.shared.is_empty());
}

#[test]
fn missing_csv_skips_series_and_continues() {
    let (temp, app, catalog) = fixture();
    write_series_csv(&temp, "SI_POV_EMP1");

    let report = app.process_taxonomy(&RunOptions::default(), &JsonOutput);

    assert_eq!(report.processed, 3);
    assert_eq!(report.published, 1);
    assert_eq!(
        report.failed_series,
        vec!["SI_POV_DAY1".to_string(), "SN_ITK_DEFC".to_string()]
    );
    assert!(report.aborted.is_none());

    let state = catalog.state();
    assert_eq!(state.added, vec!["SI_POV_EMP1_2020Q1G01".to_string()]);
}

#[test]
fn publish_error_aborts_remaining_walk() {
    let (temp, app, catalog) = fixture();
    write_series_csv(&temp, "SI_POV_DAY1");
    write_series_csv(&temp, "SI_POV_EMP1");
    catalog.state().fail_publish = true;

    let report = app.process_taxonomy(&RunOptions::default(), &JsonOutput);

    assert_eq!(report.processed, 1);
    assert_eq!(report.published, 0);
    assert_eq!(report.failed_series, vec!["SI_POV_DAY1".to_string()]);
    let reason = report.aborted.unwrap();
    assert!(reason.contains("publish job failed"));
}

#[test]
fn share_error_records_failure_and_aborts() {
    let (temp, app, catalog) = fixture();
    write_series_csv(&temp, "SI_POV_DAY1");
    catalog.state().fail_share = true;

    let report = app.process_taxonomy(&day1_options(false), &JsonOutput);

    assert_eq!(report.processed, 1);
    assert_eq!(report.published, 0);
    assert_eq!(report.updated, 0);
    assert_eq!(report.failed_series, vec!["SI_POV_DAY1".to_string()]);
    assert!(report.aborted.is_some());
}

#[test]
fn goal_filter_scopes_processing() {
    let (_temp, app, catalog) = fixture();
    let options = RunOptions {
        filter: TaxonomyFilter {
            goal: LevelFilter::Exact("2".to_string()),
            ..TaxonomyFilter::default()
        },
        metadata_only: false,
    };

    let report = app.process_taxonomy(&options, &JsonOutput);

    assert_eq!(report.processed, 1);
    assert_eq!(report.failed_series, vec!["SN_ITK_DEFC".to_string()]);

    let state = catalog.state();
    assert_eq!(state.created_groups.len(), 1);
    assert_eq!(state.created_groups[0].title, "SDG 2");
    let all_tags: Vec<String> = state.group_tags.iter().flatten().cloned().collect();
    assert!(all_tags.contains(&"Target 2.1".to_string()));
    assert!(!all_tags.contains(&"Target 1.1".to_string()));
}

#[test]
fn existing_goal_group_updated_not_recreated() {
    let (_temp, app, catalog) = fixture();
    catalog.state().goal_groups.push(Group {
        id: "group-goal-1".to_string(),
        title: "SDG 1".to_string(),
        tags: vec!["SDG 1".to_string()],
    });

    app.process_taxonomy(&day1_options(true), &JsonOutput);

    let state = catalog.state();
    assert!(state.created_groups.is_empty());
    assert_eq!(
        state.updated_groups,
        vec![("group-goal-1".to_string(), "SDG 1".to_string())]
    );
}

#[test]
fn empty_display_metadata_warns_and_falls_back() {
    let (_temp, app, catalog) = fixture_with(EmptyDisplaySdg);
    let sink = RecordingSink::default();

    let report = app.process_taxonomy(&day1_options(true), &sink);

    assert!(report.aborted.is_none());
    assert!(
        sink.messages()
            .iter()
            .any(|message| message == "no display metadata records; using fallback thumbnails")
    );
    let state = catalog.state();
    assert_eq!(state.created_groups[0].thumbnail, FALLBACK_THUMBNAIL_URL);
}

#[test]
fn display_metadata_failure_degrades_and_continues() {
    let (_temp, app, _catalog) = fixture_with(FailingDisplaySdg);
    let sink = RecordingSink::default();

    let report = app.process_taxonomy(&day1_options(true), &sink);

    assert!(report.aborted.is_none());
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed_series, vec!["SI_POV_DAY1".to_string()]);
    assert!(
        sink.messages()
            .iter()
            .any(|message| message.contains("display metadata unavailable"))
    );
}

#[test]
fn reassign_moves_every_item_to_admin() {
    let (_temp, app, catalog) = fixture();
    {
        let mut state = catalog.state();
        state.admin_exists = true;
        let first = state.mint_item("SI_POV_DAY1_2020Q1G01");
        let second = state.mint_item(DAY1_SERVICE_TITLE);
        state.user_items.push(first);
        state.user_items.push(second);
    }

    let report = app.reassign_to_admin(&JsonOutput).unwrap();

    assert_eq!(report.admin_username, "unstats_admin");
    assert_eq!(report.reassigned, 2);

    let state = catalog.state();
    assert_eq!(state.reassigned.len(), 2);
    assert!(state
        .reassigned
        .iter()
        .all(|(_, owner)| owner == "unstats_admin"));
}

#[test]
fn reassign_without_admin_user_is_noop() {
    let (_temp, app, catalog) = fixture();
    {
        let mut state = catalog.state();
        let item = state.mint_item(DAY1_SERVICE_TITLE);
        state.user_items.push(item);
    }

    let report = app.reassign_to_admin(&JsonOutput).unwrap();

    assert_eq!(report.reassigned, 0);
    assert!(catalog.state().reassigned.is_empty());
}

#[test]
fn cleanup_deletes_owned_items() {
    let (_temp, app, catalog) = fixture();
    {
        let mut state = catalog.state();
        for title in ["a", "b", "c"] {
            let item = state.mint_item(title);
            state.user_items.push(item);
        }
    }

    let report = app.cleanup_owned_items(true, &JsonOutput).unwrap();

    assert_eq!(report.deleted, 3);
    assert_eq!(catalog.state().deleted.len(), 3);
}

#[test]
fn cleanup_without_confirmation_is_refused() {
    let (_temp, app, catalog) = fixture();
    {
        let mut state = catalog.state();
        let item = state.mint_item("SI_POV_DAY1_2020Q1G01");
        state.user_items.push(item);
    }

    let result = app.cleanup_owned_items(false, &JsonOutput);

    assert_matches!(result, Err(PublishError::ConfirmationRequired(_)));
    assert!(catalog.state().deleted.is_empty());
}

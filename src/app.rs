use std::time::Duration;

use serde::Serialize;

use crate::card::{self, GoalCard, IndicatorCard, ItemCard};
use crate::catalog::{CatalogClient, CatalogItem, Group, GroupProperties, ShareOptions};
use crate::config::ResolvedConfig;
use crate::error::PublishError;
use crate::sdgapi::SdgApiClient;
use crate::store::DataStore;
use crate::taxonomy::{self, DisplayMetadata, Series, SeriesVisit, WalkEvent};

pub const GOAL_GROUP_SEARCH_TITLE: &str = "SDG Open Data";
pub const MAX_USER_ITEMS: usize = 800;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub filter: taxonomy::TaxonomyFilter,
    pub metadata_only: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: String,
    pub finished_at: String,
    pub metadata_only: bool,
    pub processed: usize,
    pub published: usize,
    pub updated: usize,
    pub failed_series: Vec<String>,
    pub aborted: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReassignReport {
    pub admin_username: String,
    pub reassigned: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub deleted: usize,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Default)]
struct RunContext {
    open_data_group: Option<Group>,
    failed_series: Vec<String>,
    processed: usize,
    published: usize,
    updated: usize,
}

enum SeriesSync {
    Published(CatalogItem),
    Updated(CatalogItem),
    Missing,
}

#[derive(Clone)]
pub struct App<S: SdgApiClient, C: CatalogClient> {
    store: DataStore,
    sdg: S,
    catalog: C,
    config: ResolvedConfig,
}

impl<S: SdgApiClient, C: CatalogClient> App<S, C> {
    pub fn new(store: DataStore, sdg: S, catalog: C, config: ResolvedConfig) -> Self {
        Self {
            store,
            sdg,
            catalog,
            config,
        }
    }

    pub fn process_taxonomy(&self, options: &RunOptions, sink: &dyn ProgressSink) -> RunReport {
        let started_at = iso_timestamp();
        let mut ctx = RunContext::default();
        let aborted = match self.run_walk(&mut ctx, options, sink) {
            Ok(()) => None,
            Err(err) => Some(err.to_string()),
        };
        RunReport {
            started_at,
            finished_at: iso_timestamp(),
            metadata_only: options.metadata_only,
            processed: ctx.processed,
            published: ctx.published,
            updated: ctx.updated,
            failed_series: ctx.failed_series,
            aborted,
        }
    }

    pub fn reassign_to_admin(&self, sink: &dyn ProgressSink) -> Result<ReassignReport, PublishError> {
        let admin = match self.catalog.get_user(&self.config.admin_username)? {
            Some(user) => user,
            None => {
                sink.event(ProgressEvent {
                    message: format!("admin user {} not found", self.config.admin_username),
                    elapsed: None,
                });
                return Ok(ReassignReport {
                    admin_username: self.config.admin_username.clone(),
                    reassigned: 0,
                });
            }
        };
        let items = self.catalog.user_items(&self.config.folder, MAX_USER_ITEMS)?;
        let mut reassigned = 0;
        for item in &items {
            sink.event(ProgressEvent {
                message: format!("reassigning item {} to admin user", item.title),
                elapsed: None,
            });
            self.catalog
                .reassign_item(item, &admin.username, &self.config.folder)?;
            reassigned += 1;
        }
        Ok(ReassignReport {
            admin_username: admin.username,
            reassigned,
        })
    }

    pub fn cleanup_owned_items(
        &self,
        confirmed: bool,
        sink: &dyn ProgressSink,
    ) -> Result<CleanupReport, PublishError> {
        if !confirmed {
            return Err(PublishError::ConfirmationRequired(
                "cleanup deletes every item owned by the publishing account; pass --yes to continue"
                    .to_string(),
            ));
        }
        let items = self.catalog.user_items(&self.config.folder, MAX_USER_ITEMS)?;
        let mut deleted = 0;
        for item in &items {
            sink.event(ProgressEvent {
                message: format!("deleting item {}", item.title),
                elapsed: None,
            });
            self.catalog.delete_item(item)?;
            deleted += 1;
        }
        Ok(CleanupReport { deleted })
    }

    fn run_walk(
        &self,
        ctx: &mut RunContext,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<(), PublishError> {
        let goals = self.sdg.fetch_goal_tree()?;
        let display = match self.sdg.fetch_display_metadata() {
            Ok(records) => DisplayMetadata::new(records),
            Err(err) => {
                sink.event(ProgressEvent {
                    message: format!("display metadata unavailable: {err}"),
                    elapsed: None,
                });
                DisplayMetadata::default()
            }
        };
        if display.is_empty() {
            sink.event(ProgressEvent {
                message: "no display metadata records; using fallback thumbnails".to_string(),
                elapsed: None,
            });
        }
        ctx.open_data_group = Some(self.catalog.get_group(&self.config.open_data_group_id)?);

        let mut goal_card: Option<GoalCard> = None;
        let mut indicator_card: Option<IndicatorCard> = None;
        for event in taxonomy::walk(&goals, &options.filter) {
            match event {
                WalkEvent::Goal(goal) => {
                    let record = goal.number().and_then(|number| display.goal(number));
                    let card = GoalCard::new(goal, record);
                    self.ensure_goal_group(&card)?;
                    goal_card = Some(card);
                }
                WalkEvent::Target { target, .. } => {
                    self.grow_group_tags(ctx, card::target_tags(target))?;
                }
                WalkEvent::Indicator {
                    goal,
                    target,
                    indicator,
                } => {
                    let thumbnail = goal_card
                        .as_ref()
                        .map(|card| card.thumbnail.as_str())
                        .unwrap_or(card::FALLBACK_THUMBNAIL_URL);
                    let card = IndicatorCard::new(goal, target, indicator, thumbnail);
                    self.grow_group_tags(ctx, card.tags.clone())?;
                    indicator_card = Some(card);
                }
                WalkEvent::Series(visit) => {
                    if let (Some(goal_card), Some(indicator_card)) = (&goal_card, &indicator_card) {
                        self.process_series(
                            ctx,
                            goal_card,
                            indicator_card,
                            &visit,
                            &display,
                            options,
                            sink,
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn process_series(
        &self,
        ctx: &mut RunContext,
        goal_card: &GoalCard,
        indicator_card: &IndicatorCard,
        visit: &SeriesVisit<'_>,
        display: &DisplayMetadata,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<(), PublishError> {
        let series = visit.series;
        let taxonomy_tags = visit
            .goal
            .number()
            .map(|number| {
                display.series_tags(
                    number,
                    &visit.target.code,
                    &visit.indicator.code,
                    &series.code,
                )
            })
            .unwrap_or_default();
        let item_card = ItemCard::new(
            goal_card,
            indicator_card,
            visit.target,
            series,
            taxonomy_tags,
        );

        sink.event(ProgressEvent {
            message: format!(
                "Processing series code: {} {}",
                visit.indicator.code, series.code
            ),
            elapsed: None,
        });
        ctx.processed += 1;

        match self.sync_series(ctx, &item_card, series, options, sink) {
            Ok(SeriesSync::Published(_)) => {
                ctx.published += 1;
                Ok(())
            }
            Ok(SeriesSync::Updated(_)) => {
                ctx.updated += 1;
                Ok(())
            }
            Ok(SeriesSync::Missing) => {
                ctx.failed_series.push(series.code.clone());
                Ok(())
            }
            Err(err) => {
                sink.event(ProgressEvent {
                    message: format!(
                        "Failed to process series code: {} {}",
                        visit.indicator.code, series.code
                    ),
                    elapsed: None,
                });
                ctx.failed_series.push(series.code.clone());
                Err(err)
            }
        }
    }

    fn sync_series(
        &self,
        ctx: &mut RunContext,
        item_card: &ItemCard,
        series: &Series,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<SeriesSync, PublishError> {
        let sync = if options.metadata_only {
            self.update_series_metadata(item_card, sink)?
        } else {
            self.publish_series(item_card, series, sink)?
        };
        match &sync {
            SeriesSync::Published(item) | SeriesSync::Updated(item) => {
                self.share_series_item(ctx, item, series)?;
            }
            SeriesSync::Missing => {}
        }
        Ok(sync)
    }

    fn update_series_metadata(
        &self,
        item_card: &ItemCard,
        sink: &dyn ProgressSink,
    ) -> Result<SeriesSync, PublishError> {
        match self.find_existing_item(&item_card.title, sink)? {
            Some(item) => {
                self.catalog.update_item(&item, item_card, None)?;
                Ok(SeriesSync::Updated(item))
            }
            None => Ok(SeriesSync::Missing),
        }
    }

    fn publish_series(
        &self,
        item_card: &ItemCard,
        series: &Series,
        sink: &dyn ProgressSink,
    ) -> Result<SeriesSync, PublishError> {
        if !self.store.has_series_csv(&series.code) {
            return Ok(SeriesSync::Missing);
        }
        let data_file = self.store.series_csv_path(&series.code);
        let mut csv_card = item_card.clone();
        csv_card.title = card::csv_title(series);

        let (csv_item, service_item, created) =
            match self.find_existing_item(&csv_card.title, sink)? {
                None => {
                    sink.event(ProgressEvent {
                        message: "Adding CSV File to ArcGIS Online....".to_string(),
                        elapsed: None,
                    });
                    let csv_item = self.catalog.add_csv_item(&csv_card, &data_file)?;
                    sink.event(ProgressEvent {
                        message: "Analyze Feature Service....".to_string(),
                        elapsed: None,
                    });
                    let analysis = self.catalog.analyze_csv(&csv_item.id)?;
                    let parameters = card::prepare_publish_parameters(
                        &analysis,
                        &csv_card.title,
                        &csv_card.snippet,
                    )
                    .ok_or_else(|| PublishError::Analyze {
                        item_id: csv_item.id.clone(),
                        message: "analysis returned no publish parameters".to_string(),
                    })?;
                    sink.event(ProgressEvent {
                        message: "Publishing Feature Service....".to_string(),
                        elapsed: None,
                    });
                    let service_item = self.catalog.publish_csv_item(&csv_item, &parameters)?;
                    (csv_item, service_item, true)
                }
                Some(csv_item) => {
                    self.catalog
                        .update_item(&csv_item, &csv_card, Some(&data_file))?;
                    match self.find_existing_item(&item_card.title, sink)? {
                        Some(service_item) => (csv_item, service_item, false),
                        None => return Ok(SeriesSync::Missing),
                    }
                }
            };

        if csv_item.owner_folder.is_none() {
            sink.event(ProgressEvent {
                message: format!("Moving CSV to {} Folder", self.config.folder),
                elapsed: None,
            });
            self.catalog.move_item(&csv_item, &self.config.folder)?;
        }

        sink.event(ProgressEvent {
            message: "Updating Feature Service metadata....".to_string(),
            elapsed: None,
        });
        self.catalog.update_item(&service_item, item_card, None)?;

        if service_item.owner_folder.is_none() {
            sink.event(ProgressEvent {
                message: format!("Moving Feature Service to {} Folder", self.config.folder),
                elapsed: None,
            });
            self.catalog.move_item(&service_item, &self.config.folder)?;
        }

        if created {
            Ok(SeriesSync::Published(service_item))
        } else {
            Ok(SeriesSync::Updated(service_item))
        }
    }

    fn share_series_item(
        &self,
        ctx: &mut RunContext,
        item: &CatalogItem,
        series: &Series,
    ) -> Result<(), PublishError> {
        if let Some(group) = ctx.open_data_group.as_ref() {
            self.catalog.share_item(
                item,
                &ShareOptions {
                    everyone: true,
                    org: true,
                    groups: group.id.clone(),
                    allow_members_to_edit: false,
                },
            )?;
        }
        self.grow_group_tags(ctx, vec![series.code.clone()])
    }

    fn grow_group_tags(
        &self,
        ctx: &mut RunContext,
        new_tags: Vec<String>,
    ) -> Result<(), PublishError> {
        if let Some(group) = ctx.open_data_group.as_mut() {
            group.tags.extend(new_tags);
            self.catalog.set_group_tags(&group.id, &group.tags)?;
        }
        Ok(())
    }

    fn ensure_goal_group(&self, goal_card: &GoalCard) -> Result<Group, PublishError> {
        let query = format!(
            "title:'{}' AND owner:{}",
            GOAL_GROUP_SEARCH_TITLE,
            self.catalog.username()
        );
        let results = self.catalog.search_groups(&query)?;
        for group in results {
            if group.title == goal_card.title {
                self.catalog.update_group(
                    &group.id,
                    &GroupProperties {
                        title: goal_card.title.clone(),
                        snippet: goal_card.snippet.clone(),
                        description: goal_card.description.clone(),
                        tags: goal_card.tags.clone(),
                        thumbnail: goal_card.thumbnail.clone(),
                    },
                )?;
                return Ok(group);
            }
        }
        self.catalog.create_group(&GroupProperties {
            title: goal_card.title.clone(),
            snippet: goal_card.snippet.clone(),
            description: goal_card.description.clone(),
            tags: vec![
                goal_card.title.clone(),
                "Open Data".to_string(),
                "Hub".to_string(),
            ],
            thumbnail: goal_card.thumbnail.clone(),
        })
    }

    fn find_existing_item(
        &self,
        title: &str,
        sink: &dyn ProgressSink,
    ) -> Result<Option<CatalogItem>, PublishError> {
        sink.event(ProgressEvent {
            message: format!("Searching for {title}"),
            elapsed: None,
        });
        let query = format!("title:'{title}' AND owner:{}", self.catalog.username());
        let results = self.catalog.search_items(&query)?;
        Ok(results.into_iter().find(|item| item.title == title))
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

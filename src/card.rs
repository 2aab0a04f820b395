use serde_json::Value;

use crate::taxonomy::{Goal, GoalDisplay, Indicator, Series, Target};

pub const FALLBACK_THUMBNAIL_URL: &str =
    "http://undesa.maps.arcgis.com/sharing/rest/content/items/aaa0678dba0a466e8efef6b9f11775fe/data";

pub const SNIPPET_LIMIT: usize = 250;

#[derive(Debug, Clone)]
pub struct GoalCard {
    pub title: String,
    pub snippet: String,
    pub description: String,
    pub tags: Vec<String>,
    pub thumbnail: String,
}

impl GoalCard {
    pub fn new(goal: &Goal, display: Option<&GoalDisplay>) -> Self {
        let thumbnail = display
            .and_then(|record| record.icon_url_sq.clone())
            .unwrap_or_else(|| FALLBACK_THUMBNAIL_URL.to_string());
        let title = format!("SDG {}", goal.code);
        Self {
            snippet: goal.title.clone(),
            description: goal.description.clone(),
            tags: vec![title.clone()],
            thumbnail,
            title,
        }
    }
}

pub fn target_tags(target: &Target) -> Vec<String> {
    vec![format!("Target {}", target.code)]
}

#[derive(Debug, Clone)]
pub struct IndicatorCard {
    pub name: String,
    pub tags: Vec<String>,
    pub snippet: String,
    pub description: String,
    pub credits: String,
    pub thumbnail: String,
}

impl IndicatorCard {
    pub fn new(goal: &Goal, target: &Target, indicator: &Indicator, thumbnail: &str) -> Self {
        let name = format!("Indicator {}", indicator.code);
        let description = format!(
            "<p><strong>Indicator {}: </strong>{}</p></p><p><strong>Target {}: </strong>{}</p><p>{}</p>",
            indicator.code,
            indicator.description,
            target.code,
            target.description,
            goal.description
        );
        Self {
            tags: vec![name.clone()],
            snippet: format!("{}: {}", indicator.code, indicator.description),
            description,
            credits: "UNSD".to_string(),
            thumbnail: thumbnail.to_string(),
            name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ItemCard {
    pub title: String,
    pub snippet: String,
    pub description: String,
    pub tags: Vec<String>,
    pub thumbnail: String,
}

impl ItemCard {
    pub fn new(
        goal_card: &GoalCard,
        indicator_card: &IndicatorCard,
        target: &Target,
        series: &Series,
        taxonomy_tags: Vec<String>,
    ) -> Self {
        let title = format!(
            "{} ({}): {}",
            indicator_card.name, series.code, series.description
        );
        let description = if series.description.is_empty() {
            series.code.clone()
        } else {
            series.description.clone()
        };
        let snippet = truncate_snippet(&format!("{}: {}", series.code, description));
        let body = format!(
            "<p><strong>Series {}: </strong>{}</p>{}<p><strong>Release Version</strong>: {}",
            series.code, description, indicator_card.description, series.release
        );
        let mut tags = goal_card.tags.clone();
        tags.extend(target_tags(target));
        tags.extend(indicator_card.tags.iter().cloned());
        tags.extend(taxonomy_tags);
        tags.push(series.release.clone());
        Self {
            title,
            snippet,
            description: body,
            tags,
            thumbnail: indicator_card.thumbnail.clone(),
        }
    }
}

fn truncate_snippet(snippet: &str) -> String {
    if snippet.chars().count() > SNIPPET_LIMIT {
        let mut truncated: String = snippet.chars().take(SNIPPET_LIMIT).collect();
        truncated.push_str("..");
        truncated
    } else {
        snippet.to_string()
    }
}

pub fn csv_title(series: &Series) -> String {
    format!("{}_{}", series.code, series.release.replace('.', ""))
}

pub fn field_alias(name: &str) -> String {
    match name {
        "series_release" => "Series Release".to_string(),
        "series_code" => "Series Code".to_string(),
        "series_description" => "Series Description".to_string(),
        "geoAreaCode" => "Geographic Area Code".to_string(),
        "geoAreaName" => "Geographic Area Name".to_string(),
        "Freq" => "Frequency".to_string(),
        "latest_year" => "Latest Year".to_string(),
        "latest_value" => "Latest Value".to_string(),
        "latest_source" => "Latest Source".to_string(),
        "latest_nature" => "Latest Nature".to_string(),
        "last_5_years_mean" => "Mean of the Last 5 Years".to_string(),
        "ISO3CD" => "ISO3 Code".to_string(),
        other => title_case(other),
    }
}

fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn prepare_publish_parameters(analysis: &Value, name: &str, layer_name: &str) -> Option<Value> {
    let mut params = analysis.get("publishParameters")?.clone();
    {
        let fields = params
            .get_mut("layerInfo")?
            .get_mut("fields")?
            .as_array_mut()?;
        for field in fields.iter_mut() {
            let field_name = field.get("name").and_then(Value::as_str)?.to_string();
            field["alias"] = Value::String(field_alias(&field_name));
            if field_name == "indicator" {
                field["type"] = Value::String("esriFieldTypeString".to_string());
                field["sqlType"] = Value::String("sqlTypeNVarchar".to_string());
            }
        }
    }
    params["layerInfo"]["displayField"] = Value::String("geoAreaName".to_string());
    params["name"] = Value::String(name.to_string());
    params["layerInfo"]["name"] = Value::String(layer_name.to_string());
    Some(params)
}

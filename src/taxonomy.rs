use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Goal {
    pub code: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Target {
    pub code: String,
    pub description: String,
    #[serde(default)]
    pub indicators: Vec<Indicator>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Indicator {
    pub code: String,
    pub description: String,
    #[serde(default)]
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Series {
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub release: String,
}

impl Goal {
    pub fn number(&self) -> Option<i64> {
        self.code.trim().parse().ok()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoalDisplay {
    pub goal: i64,
    #[serde(default)]
    pub icon_url_sq: Option<String>,
    #[serde(default)]
    pub targets: Vec<TargetDisplay>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetDisplay {
    pub target: String,
    #[serde(default)]
    pub indicators: Vec<IndicatorDisplay>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorDisplay {
    pub indicator: String,
    #[serde(default)]
    pub series: Vec<SeriesDisplay>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesDisplay {
    pub series: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DisplayMetadata {
    records: Vec<GoalDisplay>,
}

impl DisplayMetadata {
    pub fn new(records: Vec<GoalDisplay>) -> Self {
        Self { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn goal(&self, number: i64) -> Option<&GoalDisplay> {
        self.records.iter().find(|record| record.goal == number)
    }

    pub fn series_tags(
        &self,
        goal_number: i64,
        target_code: &str,
        indicator_code: &str,
        series_code: &str,
    ) -> Vec<String> {
        self.goal(goal_number)
            .and_then(|goal| {
                goal.targets
                    .iter()
                    .find(|target| target.target == target_code)
            })
            .and_then(|target| {
                target
                    .indicators
                    .iter()
                    .find(|indicator| indicator.indicator == indicator_code)
            })
            .and_then(|indicator| {
                indicator
                    .series
                    .iter()
                    .find(|series| series.series == series_code)
            })
            .map(|series| series.tags.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LevelFilter {
    #[default]
    All,
    Exact(String),
}

impl LevelFilter {
    pub fn from_option(value: Option<String>) -> Self {
        match value {
            Some(code) => LevelFilter::Exact(code),
            None => LevelFilter::All,
        }
    }

    pub fn matches(&self, code: &str) -> bool {
        match self {
            LevelFilter::All => true,
            LevelFilter::Exact(want) => want == code,
        }
    }

    pub fn matches_numeric(&self, code: &str) -> bool {
        match self {
            LevelFilter::All => true,
            LevelFilter::Exact(want) => {
                match (want.trim().parse::<i64>(), code.trim().parse::<i64>()) {
                    (Ok(lhs), Ok(rhs)) => lhs == rhs,
                    _ => false,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaxonomyFilter {
    pub goal: LevelFilter,
    pub target: LevelFilter,
    pub indicator: LevelFilter,
    pub series: LevelFilter,
}

#[derive(Debug, Clone, Copy)]
pub struct SeriesVisit<'a> {
    pub goal: &'a Goal,
    pub target: &'a Target,
    pub indicator: &'a Indicator,
    pub series: &'a Series,
}

#[derive(Debug, Clone, Copy)]
pub enum WalkEvent<'a> {
    Goal(&'a Goal),
    Target {
        goal: &'a Goal,
        target: &'a Target,
    },
    Indicator {
        goal: &'a Goal,
        target: &'a Target,
        indicator: &'a Indicator,
    },
    Series(SeriesVisit<'a>),
}

pub fn walk<'a>(goals: &'a [Goal], filter: &TaxonomyFilter) -> Vec<WalkEvent<'a>> {
    let mut events = Vec::new();
    for goal in goals {
        if !filter.goal.matches_numeric(&goal.code) {
            continue;
        }
        events.push(WalkEvent::Goal(goal));
        for target in &goal.targets {
            if !filter.target.matches(&target.code) {
                continue;
            }
            events.push(WalkEvent::Target { goal, target });
            for indicator in &target.indicators {
                if !filter.indicator.matches(&indicator.code) {
                    continue;
                }
                events.push(WalkEvent::Indicator {
                    goal,
                    target,
                    indicator,
                });
                for series in &indicator.series {
                    if !filter.series.matches(&series.code) {
                        continue;
                    }
                    events.push(WalkEvent::Series(SeriesVisit {
                        goal,
                        target,
                        indicator,
                        series,
                    }));
                }
            }
        }
    }
    events
}

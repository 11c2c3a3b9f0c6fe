use std::{collections::HashMap, str::FromStr};

use anyhow::Context;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::{
    activity::{
        self, CallsignCount, CallsignDuration, HallOfFameEntry, HeatmapCell, LastHeard, Status,
        TalkgroupFilter, TalkgroupRank, WithCountry,
    },
    database::Database,
    station_config::{LocalConfig, SetupView},
};

/// The reports selectable through `q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    ConfigInbox,
    LocalConfig,
    Heatmap,
    LastHeard,
    Status,
    TopCallsignsByCount,
    TopCallsignsByDuration,
    HallOfFame,
    TopTalkgroups,
}

impl FromStr for Report {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "config_inbox" => Ok(Self::ConfigInbox),
            "localconfig" => Ok(Self::LocalConfig),
            "fmheatmap" => Ok(Self::Heatmap),
            "fmlastheard" => Ok(Self::LastHeard),
            "fmstatus" => Ok(Self::Status),
            "fm_callsignTop10Count" => Ok(Self::TopCallsignsByCount),
            "fm_callsignTop10Duration" => Ok(Self::TopCallsignsByDuration),
            "fm_hallOfFameWeek" => Ok(Self::HallOfFame),
            "fm_topTalkgroups" => Ok(Self::TopTalkgroups),
            _ => Err(QueryError::BadQuery),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("bad query")]
    BadQuery,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadQuery => {
                log::warn!("Rejected unknown report");
                StatusCode::BAD_REQUEST
            }
            Self::Storage(e) => {
                log::error!("Report failed: {:?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

fn to_json<T: Serialize>(value: T) -> Result<serde_json::Value, QueryError> {
    Ok(serde_json::to_value(value).context("could not encode report")?)
}

fn rows_to_json<R, T>(rows: Vec<R>) -> Result<serde_json::Value, QueryError>
where
    T: From<R> + Serialize,
{
    to_json(rows.into_iter().map(T::from).collect::<Vec<T>>())
}

/// Runs the report named by `report` and returns its JSON document.
pub async fn execute(
    db: &Database,
    report: &str,
    params: &HashMap<String, String>,
) -> Result<serde_json::Value, QueryError> {
    let report: Report = report.parse()?;
    log::debug!("Running {:?}", report);

    match report {
        Report::ConfigInbox => match db.station_config().await? {
            Some(config) => to_json(SetupView::from(&config)),
            None => Ok(serde_json::json!({})),
        },
        Report::LocalConfig => match db.station_config().await? {
            Some(config) => to_json(LocalConfig::from(&config)),
            None => Ok(serde_json::json!({})),
        },
        Report::Heatmap => rows_to_json::<_, HeatmapCell>(db.heatmap().await?),
        Report::LastHeard => {
            let filter = TalkgroupFilter::from_params(params);
            log::debug!("Last heard filter {:?}", filter);
            rows_to_json::<_, WithCountry<LastHeard>>(db.last_heard(filter).await?)
        }
        Report::Status => rows_to_json::<_, WithCountry<Status>>(db.status().await?),
        Report::TopCallsignsByCount => rows_to_json::<_, CallsignCount>(
            db.top_ranked(activity::TOP_CALLS_BY_COUNT).await?,
        ),
        Report::TopCallsignsByDuration => rows_to_json::<_, CallsignDuration>(
            db.top_ranked(activity::TOP_CALLS_BY_DURATION).await?,
        ),
        Report::HallOfFame => rows_to_json::<_, HallOfFameEntry>(
            db.top_ranked(activity::TOP_CALLS_BY_SCORE).await?,
        ),
        Report::TopTalkgroups => {
            rows_to_json::<_, TalkgroupRank>(db.top_ranked(activity::TOP_TALKGROUPS).await?)
        }
    }
}

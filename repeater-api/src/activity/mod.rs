use std::collections::HashMap;

use diesel::sql_types::{BigInt, Integer, Nullable, Text};
use serde::Serialize;

use crate::{helpers, prefix};

pub const HEATMAP_METRIC: &str = "heatmap_week";
pub const TOP_CALLS_BY_COUNT: &str = "top_calls_qso";
pub const TOP_CALLS_BY_DURATION: &str = "top_calls_duration";
pub const TOP_CALLS_BY_SCORE: &str = "top_calls_score";
pub const TOP_TALKGROUPS: &str = "top_tg_duration";

const TIMESTAMP_FORMAT: &[time::format_description::FormatItem<'static>] =
    time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

pub fn format_timestamp(timestamp: time::PrimitiveDateTime) -> String {
    timestamp
        .format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| timestamp.to_string())
}

/// Talkgroup restriction for the last-heard feed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TalkgroupFilter {
    #[default]
    All,
    Local(i32),
    Monitored(Vec<i32>),
}

impl TalkgroupFilter {
    /// Reads `mode`, `tg` and `tgs`. Anything unusable falls back to no
    /// restriction rather than an error.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let param = |key: &str| params.get(key).map(String::as_str).unwrap_or_default();

        match param("mode") {
            "local" => match helpers::positive_talkgroup(param("tg")) {
                Some(tg) => Self::Local(tg),
                None => Self::All,
            },
            "monitored" => {
                let tgs: Vec<i32> = param("tgs")
                    .split(',')
                    .filter_map(helpers::positive_talkgroup)
                    .collect();
                if tgs.is_empty() {
                    Self::All
                } else {
                    Self::Monitored(tgs)
                }
            }
            _ => Self::All,
        }
    }

    pub fn talkgroups(&self) -> &[i32] {
        match self {
            Self::All => &[],
            Self::Local(tg) => std::slice::from_ref(tg),
            Self::Monitored(tgs) => tgs,
        }
    }

    /// SQL condition on `s.tg` with one placeholder per talkgroup.
    pub fn sql_condition(&self) -> Option<String> {
        match self.talkgroups() {
            [] => None,
            [_] => Some("s.tg = ?".to_owned()),
            tgs => Some(format!("s.tg IN ({})", vec!["?"; tgs.len()].join(", "))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, diesel::QueryableByName)]
pub struct LastHeard {
    #[diesel(sql_type = Text)]
    pub callsign: String,
    #[diesel(sql_type = Integer)]
    pub tg: i32,
    #[diesel(sql_type = Text)]
    pub server: String,
    #[diesel(sql_type = Text)]
    pub talk: String,
    #[diesel(sql_type = Text)]
    pub event_time: String,
    /// Seconds since the matching `start` event, if one was recorded.
    #[diesel(sql_type = Nullable<BigInt>)]
    pub duration_s: Option<i64>,
    #[diesel(sql_type = Nullable<Text>)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub callsign: String,
    pub tg: i32,
    pub server: String,
    pub event_time: String,
    pub location: Option<String>,
}

/// A precomputed row of `fmstats`.
#[derive(Debug, Clone, PartialEq, diesel::Queryable, diesel::Selectable)]
#[diesel(table_name = crate::schema::fmstats)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MetricRow {
    pub metric: String,
    pub rank: i32,
    pub callsign: Option<String>,
    pub tg: Option<i32>,
    pub weekday: Option<i32>,
    pub hour: Option<i32>,
    pub qso_count: Option<i64>,
    pub total_seconds: Option<f64>,
    pub score: Option<f64>,
}

impl MetricRow {
    fn count(&self) -> i64 {
        self.qso_count.unwrap_or(0)
    }

    fn total(&self) -> f64 {
        self.total_seconds.unwrap_or(0.0)
    }

    fn country_code(&self) -> Option<&'static str> {
        prefix::country_for(self.callsign.as_deref())
    }
}

fn average(total: f64, count: i64) -> f64 {
    if count > 0 {
        total / count as f64
    } else {
        0.0
    }
}

/// Attaches the prefix-derived country to a row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithCountry<T> {
    #[serde(flatten)]
    pub row: T,
    pub country_code: Option<&'static str>,
}

impl From<LastHeard> for WithCountry<LastHeard> {
    fn from(row: LastHeard) -> Self {
        let country_code = prefix::country_for_callsign(&row.callsign);
        Self { row, country_code }
    }
}

impl From<Status> for WithCountry<Status> {
    fn from(row: Status) -> Self {
        let country_code = prefix::country_for_callsign(&row.callsign);
        Self { row, country_code }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatmapCell {
    pub weekday: Option<i32>,
    pub hour: Option<i32>,
    pub count: i64,
}

impl From<MetricRow> for HeatmapCell {
    fn from(row: MetricRow) -> Self {
        Self {
            weekday: row.weekday,
            hour: row.hour,
            count: row.count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallsignCount {
    pub callsign: Option<String>,
    pub cnt: i64,
    pub country_code: Option<&'static str>,
}

impl From<MetricRow> for CallsignCount {
    fn from(row: MetricRow) -> Self {
        Self {
            cnt: row.count(),
            country_code: row.country_code(),
            callsign: row.callsign,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallsignDuration {
    pub callsign: Option<String>,
    pub sec: f64,
    pub country_code: Option<&'static str>,
}

impl From<MetricRow> for CallsignDuration {
    fn from(row: MetricRow) -> Self {
        Self {
            sec: row.total(),
            country_code: row.country_code(),
            callsign: row.callsign,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HallOfFameEntry {
    pub callsign: Option<String>,
    pub qso_count: i64,
    pub total_sec: f64,
    pub score: f64,
    pub avg_sec: f64,
    pub country_code: Option<&'static str>,
}

impl From<MetricRow> for HallOfFameEntry {
    fn from(row: MetricRow) -> Self {
        let (qso_count, total_sec) = (row.count(), row.total());
        Self {
            qso_count,
            total_sec,
            score: row.score.unwrap_or(0.0),
            avg_sec: average(total_sec, qso_count),
            country_code: row.country_code(),
            callsign: row.callsign,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TalkgroupRank {
    pub tg: Option<i32>,
    pub cnt: i64,
    pub total_sec: f64,
    pub avg_sec: f64,
}

impl From<MetricRow> for TalkgroupRank {
    fn from(row: MetricRow) -> Self {
        let (cnt, total_sec) = (row.count(), row.total());
        Self {
            tg: row.tg,
            cnt,
            total_sec,
            avg_sec: average(total_sec, cnt),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn metric(callsign: Option<&str>, count: Option<i64>, total: Option<f64>) -> MetricRow {
        MetricRow {
            metric: "top_calls_score".to_owned(),
            rank: 1,
            callsign: callsign.map(str::to_owned),
            tg: Some(262),
            weekday: None,
            hour: None,
            qso_count: count,
            total_seconds: total,
            score: Some(12.5),
        }
    }

    #[test]
    fn filter_defaults_to_all() {
        assert_eq!(TalkgroupFilter::from_params(&params(&[])), TalkgroupFilter::All);
        assert_eq!(
            TalkgroupFilter::from_params(&params(&[("mode", "bogus"), ("tg", "5")])),
            TalkgroupFilter::All
        );
    }

    #[test]
    fn local_filter() {
        assert_eq!(
            TalkgroupFilter::from_params(&params(&[("mode", "local"), ("tg", " 262 ")])),
            TalkgroupFilter::Local(262)
        );
        assert_eq!(
            TalkgroupFilter::from_params(&params(&[("mode", "local"), ("tg", "0")])),
            TalkgroupFilter::All
        );
        assert_eq!(
            TalkgroupFilter::from_params(&params(&[("mode", "local")])),
            TalkgroupFilter::All
        );
    }

    #[test]
    fn monitored_filter_drops_bad_tokens() {
        let filter = TalkgroupFilter::from_params(&params(&[
            ("mode", "monitored"),
            ("tgs", "1, abc,2,-5,,3"),
        ]));
        assert_eq!(filter, TalkgroupFilter::Monitored(vec![1, 2, 3]));
        assert_eq!(filter.sql_condition().as_deref(), Some("s.tg IN (?, ?, ?)"));

        let filter =
            TalkgroupFilter::from_params(&params(&[("mode", "monitored"), ("tgs", "abc,-5")]));
        assert_eq!(filter, TalkgroupFilter::All);
        assert_eq!(filter.sql_condition(), None);
    }

    #[test]
    fn hall_of_fame_average() {
        let entry = HallOfFameEntry::from(metric(Some("DL1ABC"), Some(4), Some(100.0)));
        assert_eq!(entry.avg_sec, 25.0);
        assert_eq!(entry.country_code, Some("DE"));

        let entry = HallOfFameEntry::from(metric(None, None, Some(100.0)));
        assert_eq!(entry.qso_count, 0);
        assert_eq!(entry.avg_sec, 0.0);
        assert_eq!(entry.country_code, None);
    }

    #[test]
    fn talkgroup_rank_coerces_nulls() {
        let rank = TalkgroupRank::from(metric(None, Some(3), None));
        assert_eq!(rank.cnt, 3);
        assert_eq!(rank.total_sec, 0.0);
        assert_eq!(rank.avg_sec, 0.0);
    }

    #[test]
    fn country_is_flattened_into_row() {
        let row = WithCountry::from(Status {
            callsign: "oe1xyz".to_owned(),
            tg: 232,
            server: "1".to_owned(),
            event_time: "2024-05-01 10:00:00".to_owned(),
            location: None,
        });
        let value = serde_json::to_value(row).unwrap();
        assert_eq!(value["callsign"], "oe1xyz");
        assert_eq!(value["country_code"], "AT");
        assert!(value["location"].is_null());
    }

    #[test]
    fn timestamps_drop_subseconds() {
        assert_eq!(
            format_timestamp(time::macros::datetime!(2024-01-02 03:04:05.678)),
            "2024-01-02 03:04:05"
        );
    }
}

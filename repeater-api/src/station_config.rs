use serde::Serialize;

use crate::activity::format_timestamp;

/// The station setup lives in a single row with this id.
pub const CONFIG_ID: i32 = 1;

#[derive(Debug, Clone, PartialEq, diesel::Queryable, diesel::Selectable)]
#[diesel(table_name = crate::schema::config)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StationConfig {
    pub id: i32,
    pub callsign: String,
    pub dns_domain: Option<String>,
    pub default_tg: Option<i32>,
    pub monitor_tgs: Option<String>,

    pub location: Option<String>,
    pub locator: Option<String>,
    pub sysop: Option<String>,
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub tx_freq: Option<String>,
    pub rx_freq: Option<String>,
    pub website: Option<String>,
    pub node_location: Option<String>,
    pub ctcss: Option<String>,

    pub reboot_requested: bool,
    pub updated_at: time::PrimitiveDateTime,
}

/// Full replacement of the config row, used for both insert and update.
/// `setup_password` is not part of it and survives every write.
#[derive(Debug, Clone, PartialEq, diesel::Insertable, diesel::AsChangeset)]
#[diesel(table_name = crate::schema::config)]
#[diesel(treat_none_as_null = true)]
pub struct ConfigUpdate {
    pub id: i32,
    pub callsign: String,
    pub dns_domain: Option<String>,
    pub default_tg: Option<i32>,
    pub monitor_tgs: Option<String>,

    pub location: Option<String>,
    pub locator: Option<String>,
    pub sysop: Option<String>,
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub tx_freq: Option<String>,
    pub rx_freq: Option<String>,
    pub website: Option<String>,
    pub node_location: Option<String>,
    pub ctcss: Option<String>,

    pub reboot_requested: bool,
    pub updated_at: time::PrimitiveDateTime,
}

/// Field names expected by the setup page; every value is a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupView {
    #[serde(rename = "Callsign")]
    callsign: String,
    #[serde(rename = "Region")]
    region: String,
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "Locator")]
    locator: String,
    #[serde(rename = "SYSOP")]
    sysop: String,
    #[serde(rename = "Latitude")]
    latitude: String,
    #[serde(rename = "Longitude")]
    longitude: String,
    #[serde(rename = "URL")]
    url: String,

    #[serde(rename = "RXFrequency")]
    rx_frequency: String,
    #[serde(rename = "TXFrequency")]
    tx_frequency: String,
    #[serde(rename = "Network")]
    network: String,
    #[serde(rename = "CTCSSRepeater")]
    ctcss_repeater: String,

    #[serde(rename = "TGDefault")]
    tg_default: String,
    #[serde(rename = "TGMonitored")]
    tg_monitored: String,
}

impl From<&StationConfig> for SetupView {
    fn from(value: &StationConfig) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();

        Self {
            callsign: value.callsign.clone(),
            region: text(&value.node_location),
            location: text(&value.location),
            locator: text(&value.locator),
            sysop: text(&value.sysop),
            latitude: text(&value.lat),
            longitude: text(&value.lon),
            url: text(&value.website),

            rx_frequency: text(&value.rx_freq),
            tx_frequency: text(&value.tx_freq),
            network: text(&value.dns_domain),
            ctcss_repeater: text(&value.ctcss),

            tg_default: value
                .default_tg
                .map(|tg| tg.to_string())
                .unwrap_or_default(),
            tg_monitored: text(&value.monitor_tgs),
        }
    }
}

/// Compact view kept for older dashboard pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalConfig {
    callsign: String,
    dns_domain: Option<String>,
    default_tg: Option<i32>,
    monitor_tgs: Option<String>,
    rxfreq: Option<String>,
    txfreq: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
    updated_at: String,
}

impl From<&StationConfig> for LocalConfig {
    fn from(value: &StationConfig) -> Self {
        Self {
            callsign: value.callsign.clone(),
            dns_domain: value.dns_domain.clone(),
            default_tg: value.default_tg,
            monitor_tgs: value.monitor_tgs.clone(),
            rxfreq: value.rx_freq.clone(),
            txfreq: value.tx_freq.clone(),
            latitude: value.lat.clone(),
            longitude: value.lon.clone(),
            updated_at: format_timestamp(value.updated_at),
        }
    }
}

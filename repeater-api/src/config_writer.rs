use std::collections::HashMap;

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use subtle::ConstantTimeEq;

use crate::{
    database::{self, Database},
    helpers::non_empty,
    station_config::{ConfigUpdate, CONFIG_ID},
};

/// Used when no setup password is stored.
const FALLBACK_PASSWORD: &str = "setuppassword";
const CREDENTIAL_FIELD: &str = "ConfigPassword";

lazy_static::lazy_static! {
    static ref CALLSIGN: regex::Regex = regex::Regex::new(r"^[A-Za-z0-9/]{3,}$").unwrap();
    static ref DIGITS: regex::Regex = regex::Regex::new(r"^[0-9]+$").unwrap();
    static ref DECIMAL: regex::Regex =
        regex::Regex::new(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?$").unwrap();
    static ref URL_SCHEME: regex::Regex = regex::Regex::new(r"(?i)^https?://").unwrap();
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("auth required")]
    Unauthorized,
    #[error("unreadable form data: {0}")]
    Unreadable(String),
    #[error("{}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl WriteError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Unreadable(_) => StatusCode::BAD_REQUEST,
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WriteError {
    fn into_response(self) -> Response {
        match &self {
            Self::Storage(e) => log::error!("Config write failed: {:?}", e),
            other => log::warn!("Config write rejected: {}", other),
        }
        let body = serde_json::json!({ "ok": false, "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

/// Success document of a config write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    ok: bool,
    stored_table: &'static str,
    id: i32,
    /// How many submitted fields were non-empty.
    count: usize,
}

/// The setup form after trimming and normalisation, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigForm {
    pub callsign: String,
    pub region: String,
    pub location: String,
    pub locator: String,
    pub latitude: String,
    pub longitude: String,
    pub url: String,
    pub ctcss: String,
    pub sysop: String,

    pub rx_frequency: String,
    pub tx_frequency: String,
    pub network: String,
    pub ctcss_repeater: String,

    pub tg_default: String,
    pub tg_monitored: String,
    pub reboot_flag: String,
}

impl ConfigForm {
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let field = |name: &str| {
            fields
                .get(name)
                .map(|v| v.trim().to_owned())
                .unwrap_or_default()
        };

        let mut url = field("URL");
        if !url.is_empty() && !URL_SCHEME.is_match(&url) {
            url = format!("https://{}", url);
        }

        Self {
            callsign: field("Callsign"),
            region: field("Region"),
            location: field("Location"),
            locator: field("Locator"),
            latitude: field("Latitude").replace(',', "."),
            longitude: field("Longitude").replace(',', "."),
            url,
            ctcss: field("CTCSS"),
            sysop: field("SYSOP"),

            rx_frequency: field("RXFrequency"),
            tx_frequency: field("TXFrequency"),
            network: field("Network"),
            ctcss_repeater: field("CTCSSRepeater"),

            tg_default: field("TGDefault"),
            tg_monitored: field("TGMonitored"),
            reboot_flag: field("RebootFlag"),
        }
    }

    fn values(&self) -> [&str; 16] {
        [
            self.callsign.as_str(),
            self.region.as_str(),
            self.location.as_str(),
            self.locator.as_str(),
            self.latitude.as_str(),
            self.longitude.as_str(),
            self.url.as_str(),
            self.ctcss.as_str(),
            self.sysop.as_str(),
            self.rx_frequency.as_str(),
            self.tx_frequency.as_str(),
            self.network.as_str(),
            self.ctcss_repeater.as_str(),
            self.tg_default.as_str(),
            self.tg_monitored.as_str(),
            self.reboot_flag.as_str(),
        ]
    }

    pub fn filled_count(&self) -> usize {
        self.values().iter().filter(|v| !v.is_empty()).count()
    }

    /// Checks every field and reports all violations at once.
    pub fn validate(&self) -> Result<ConfigUpdate, WriteError> {
        let mut errors = Vec::new();

        if !CALLSIGN.is_match(&self.callsign) {
            errors.push("Invalid callsign".to_owned());
        }

        for (name, value) in [
            ("RXFrequency", &self.rx_frequency),
            ("TXFrequency", &self.tx_frequency),
        ] {
            if !DIGITS.is_match(value) {
                errors.push(format!("{} must be an integer number (Hz)", name));
            }
        }

        if !DECIMAL.is_match(&self.latitude) || !DECIMAL.is_match(&self.longitude) {
            errors.push("Latitude/Longitude invalid".to_owned());
        }

        let default_tg = if self.tg_default.is_empty() {
            None
        } else if !DIGITS.is_match(&self.tg_default) {
            errors.push("TGDefault must be numeric if set".to_owned());
            None
        } else {
            match self.tg_default.parse::<i32>() {
                Ok(tg) => Some(tg),
                Err(_) => {
                    errors.push("TGDefault is out of range".to_owned());
                    None
                }
            }
        };

        if !errors.is_empty() {
            return Err(WriteError::Invalid(errors));
        }

        Ok(ConfigUpdate {
            id: CONFIG_ID,
            callsign: self.callsign.to_ascii_uppercase(),
            dns_domain: non_empty(&self.network),
            default_tg,
            monitor_tgs: non_empty(&self.tg_monitored),

            location: non_empty(&self.location),
            locator: non_empty(&self.locator.to_ascii_uppercase()),
            sysop: non_empty(&self.sysop),
            lat: Some(self.latitude.clone()),
            lon: Some(self.longitude.clone()),
            tx_freq: Some(self.tx_frequency.clone()),
            rx_freq: Some(self.rx_frequency.clone()),
            website: non_empty(&self.url),
            node_location: non_empty(&self.region),
            ctcss: Some(self.ctcss_repeater.clone()),

            reboot_requested: self.reboot_flag == "1",
            updated_at: database::now_utc(),
        })
    }
}

fn credential_matches(secret: &str, given: &str) -> bool {
    secret.as_bytes().ct_eq(given.as_bytes()).into()
}

/// Authenticates, validates and stores a submitted setup form.
pub async fn submit(
    db: &Database,
    method: &Method,
    mut fields: HashMap<String, String>,
) -> Result<Receipt, WriteError> {
    if method != Method::POST {
        return Err(WriteError::MethodNotAllowed);
    }

    let secret = db
        .setup_password()
        .await?
        .unwrap_or_else(|| FALLBACK_PASSWORD.to_owned());
    let given = fields.remove(CREDENTIAL_FIELD).unwrap_or_default();
    if !credential_matches(&secret, &given) {
        return Err(WriteError::Unauthorized);
    }

    let form = ConfigForm::from_fields(&fields);
    let update = form.validate()?;
    log::debug!("Storing config for {}", update.callsign);
    db.upsert_config(update).await?;

    Ok(Receipt {
        ok: true,
        stored_table: "config",
        id: CONFIG_ID,
        count: form.filled_count(),
    })
}

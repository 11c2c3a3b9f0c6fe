use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::database::Database;

/// The handful of svxlink.conf values used to create the first config row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SvxlinkSettings {
    pub callsign: String,
    pub dns_domain: String,
    pub default_tg: i32,
    pub monitor_tgs: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SvxlinkError {
    #[error("could not read {}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    #[error("CALLSIGN missing from [RepeaterLogic]")]
    MissingCallsign,
    #[error("DNS_DOMAIN missing from [ReflectorLogic]")]
    MissingDnsDomain,
}

impl FromStr for SvxlinkSettings {
    type Err = SvxlinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut settings = Self::default();
        let mut section = "";

        for line in s.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = name;
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            match (section, key) {
                ("RepeaterLogic", "CALLSIGN") => settings.callsign = value.to_owned(),
                ("ReflectorLogic", "DNS_DOMAIN") => settings.dns_domain = value.to_owned(),
                ("ReflectorLogic", "DEFAULT_TG") => {
                    settings.default_tg = leading_integer(value).unwrap_or(0)
                }
                ("ReflectorLogic", "MONITOR_TGS") => settings.monitor_tgs = value.to_owned(),
                _ => {}
            }
        }

        if settings.callsign.is_empty() {
            return Err(SvxlinkError::MissingCallsign);
        }
        if settings.dns_domain.is_empty() {
            return Err(SvxlinkError::MissingDnsDomain);
        }
        Ok(settings)
    }
}

/// Reads an optionally signed run of digits at the start of `value` and
/// ignores whatever follows, so `262 ;note` is 262.
fn leading_integer(value: &str) -> Option<i32> {
    let value = value.trim_start();
    let end = value
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(value.len(), |(i, _)| i);
    value[..end].parse().ok()
}

pub fn read(path: &Path) -> Result<SvxlinkSettings, SvxlinkError> {
    std::fs::read_to_string(path)
        .map_err(|e| SvxlinkError::Io(path.to_owned(), e))?
        .parse()
}

/// Creates the config row from svxlink.conf on first start. Problems are
/// logged; the server runs without a seeded row.
pub async fn seed_config(db: &Database, path: &Path) {
    let settings = match read(path) {
        Ok(s) => s,
        Err(SvxlinkError::Io(_, e)) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("No svxlink config at {}, not seeding", path.display());
            return;
        }
        Err(e) => {
            log::warn!("Not seeding config: {}", e);
            return;
        }
    };

    let callsign = settings.callsign.clone();
    match db.seed_config(settings).await {
        Ok(true) => log::info!("Seeded config for {} from {}", callsign, path.display()),
        Ok(false) => log::debug!("Config row already present, leaving it alone"),
        Err(e) => log::warn!("Could not seed config: {:?}", e),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const CONF: &str = "\
# svxlink.conf
[GLOBAL]
CALLSIGN=IGNORED\r
[RepeaterLogic]
CALLSIGN = DB0ABC
; RGR_SOUND_DELAY=0

[ReflectorLogic]
DNS_DOMAIN=fm-funknetz.de
DEFAULT_TG=262
MONITOR_TGS=262,9,91++
";

    #[test]
    fn parses_sections() {
        let settings: SvxlinkSettings = CONF.parse().unwrap();
        assert_eq!(
            settings,
            SvxlinkSettings {
                callsign: "DB0ABC".to_owned(),
                dns_domain: "fm-funknetz.de".to_owned(),
                default_tg: 262,
                monitor_tgs: "262,9,91++".to_owned(),
            }
        );
    }

    #[test]
    fn bad_default_tg_is_zero() {
        let settings: SvxlinkSettings =
            "[RepeaterLogic]\nCALLSIGN=DB0ABC\n[ReflectorLogic]\nDNS_DOMAIN=x\nDEFAULT_TG=abc\n"
                .parse()
                .unwrap();
        assert_eq!(settings.default_tg, 0);
        assert_eq!(settings.monitor_tgs, "");
    }

    #[test]
    fn default_tg_with_trailing_text() {
        let settings: SvxlinkSettings =
            "[RepeaterLogic]\nCALLSIGN=DB0ABC\n[ReflectorLogic]\nDNS_DOMAIN=x\nDEFAULT_TG=262 ;note\n"
                .parse()
                .unwrap();
        assert_eq!(settings.default_tg, 262);
    }

    #[test]
    fn leading_integers() {
        assert_eq!(leading_integer("9"), Some(9));
        assert_eq!(leading_integer("  -7x"), Some(-7));
        assert_eq!(leading_integer("91++"), Some(91));
        assert_eq!(leading_integer("+"), None);
        assert_eq!(leading_integer("abc"), None);
        assert_eq!(leading_integer("99999999999"), None);
    }

    #[test]
    fn required_keys() {
        assert!(matches!(
            "[ReflectorLogic]\nDNS_DOMAIN=x\n".parse::<SvxlinkSettings>(),
            Err(SvxlinkError::MissingCallsign)
        ));
        assert!(matches!(
            "[RepeaterLogic]\nCALLSIGN=DB0ABC\n".parse::<SvxlinkSettings>(),
            Err(SvxlinkError::MissingDnsDomain)
        ));
    }

    #[test]
    fn missing_file() {
        let err = read(Path::new("/nonexistent/svxlink.conf")).unwrap_err();
        assert!(matches!(err, SvxlinkError::Io(_, ref e) if e.kind() == std::io::ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn missing_file_does_not_seed() {
        let db = Database::in_memory().await;
        seed_config(&db, Path::new("/nonexistent/svxlink.conf")).await;
        assert!(db.station_config().await.unwrap().is_none());
    }
}

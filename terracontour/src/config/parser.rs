//! INI parsing logic for converting `Ini` → `ConfigFile`.

use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::{ConfigFile, ConfigFileError};
use super::MAX_SUBSAMPLE_BELOW;
use crate::decode::Encoding;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [source] section
    if let Some(section) = ini.section(Some("source")) {
        if let Some(v) = section.get("url") {
            let v = v.trim();
            if !v.is_empty() {
                if !(v.contains("{z}") && v.contains("{x}") && v.contains("{y}")) {
                    return Err(invalid(
                        "source",
                        "url",
                        v,
                        "must contain {z}, {x} and {y} placeholders",
                    ));
                }
                config.source.url = v.to_string();
            }
        }
        if let Some(v) = section.get("encoding") {
            config.source.encoding = Encoding::from_str(v).map_err(|_| {
                invalid(
                    "source",
                    "encoding",
                    v,
                    "must be one of: terrarium, mapbox, raw16, raw32",
                )
            })?;
        }
        if let Some(v) = parse_number::<u8>(section, "source", "maxzoom", "expected zoom 0-30")? {
            if v > 30 {
                return Err(invalid("source", "maxzoom", &v.to_string(), "expected zoom 0-30"));
            }
            config.source.maxzoom = v;
        }
        if let Some(v) = parse_number::<u64>(section, "source", "timeout_ms", "expected milliseconds")? {
            config.source.timeout_ms = v;
        }
        if let Some(v) =
            parse_number::<u64>(section, "source", "http_timeout_secs", "expected seconds")?
        {
            config.source.http_timeout_secs = v;
        }
        if let Some(v) = section.get("worker") {
            config.source.worker = parse_bool(v)
                .ok_or_else(|| invalid("source", "worker", v, "expected true or false"))?;
        }
    }

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = parse_number::<usize>(section, "cache", "size", "expected tile count")? {
            if v == 0 {
                return Err(invalid("cache", "size", "0", "must be at least 1"));
            }
            config.cache.size = v;
        }
    }

    // [contour] section
    if let Some(section) = ini.section(Some("contour")) {
        if let Some(v) = parse_number::<f64>(section, "contour", "interval", "expected number")? {
            if !(v > 0.0) || !v.is_finite() {
                return Err(invalid("contour", "interval", &v.to_string(), "must be positive"));
            }
            config.contour.interval = v;
        }
        if let Some(v) = section.get("major_interval") {
            let v = v.trim();
            if !v.is_empty() {
                let parsed: f64 = v
                    .parse()
                    .map_err(|_| invalid("contour", "major_interval", v, "expected number"))?;
                if !(parsed > 0.0) || !parsed.is_finite() {
                    return Err(invalid("contour", "major_interval", v, "must be positive"));
                }
                config.contour.major_interval = Some(parsed);
            }
        }
        if let Some(v) = parse_number::<f32>(section, "contour", "multiplier", "expected number")? {
            if !v.is_finite() {
                return Err(invalid("contour", "multiplier", &v.to_string(), "must be finite"));
            }
            config.contour.multiplier = v;
        }
        if let Some(v) =
            parse_number::<u8>(section, "contour", "overzoom", "expected zoom levels")?
        {
            config.contour.overzoom = v;
        }
        if let Some(v) =
            parse_number::<u32>(section, "contour", "subsample_below", "expected pixel width")?
        {
            if v > MAX_SUBSAMPLE_BELOW {
                return Err(invalid(
                    "contour",
                    "subsample_below",
                    &v.to_string(),
                    "must be at most 4096",
                ));
            }
            config.contour.subsample_below = v;
        }
    }

    Ok(config)
}

fn parse_number<T: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    match section.get(key) {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(section_name, key, v, reason)),
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

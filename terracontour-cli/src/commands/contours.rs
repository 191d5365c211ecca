//! Contours command - fetch a tile and print its contour lines.
//!
//! Output is a GeoJSON-style `FeatureCollection` of `LineString`s in the
//! composite grid's pixel space. Each feature carries its elevation and
//! whether it falls on the major interval.

use std::path::PathBuf;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use terracontour::config::ConfigFile;
use terracontour::{ContourSet, DemTileSource, Encoding, TileCoord};

use super::common::{load_config, resolve_config_path};
use crate::error::CliError;

/// Arguments for the contours command.
pub struct ContoursArgs {
    pub z: u8,
    pub x: u32,
    pub y: u32,
    pub url: Option<String>,
    pub encoding: Option<Encoding>,
    pub interval: Option<f64>,
    pub major_interval: Option<f64>,
    pub multiplier: Option<f32>,
    pub overzoom: Option<u8>,
    pub no_worker: bool,
    pub config: Option<PathBuf>,
}

/// Run the contours command.
pub async fn run(args: ContoursArgs) -> Result<(), CliError> {
    let mut config = load_config(&resolve_config_path(args.config.clone()))?;
    apply_overrides(&mut config, &args)?;

    let source = DemTileSource::new(config.to_source_config())?;
    let options = config.to_contour_options();
    let coord = TileCoord::new(args.z, args.x, args.y);

    source.on_timing(|t| {
        info!(
            tile = %t.coord,
            shared = t.shared,
            fetch_ms = t.fetch.map(|d| d.as_millis() as u64),
            decode_ms = t.decode.map(|d| d.as_millis() as u64),
            total_ms = t.total.as_millis() as u64,
            outcome = ?t.outcome,
            "Tile timing"
        );
    });

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling requests");
            interrupt.cancel();
        }
    });

    let contours = source.contour_tile(coord, &options, &cancel).await?;
    let output = match contours {
        Some(contours) => to_feature_collection(&contours, options.major_interval()),
        None => {
            warn!(tile = %coord, "Tile is outside the tile pyramid");
            to_feature_collection(&ContourSet::new(options.interval()), options.major_interval())
        }
    };

    let text = serde_json::to_string_pretty(&output).map_err(|e| CliError::Output(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn apply_overrides(config: &mut ConfigFile, args: &ContoursArgs) -> Result<(), CliError> {
    if let Some(url) = &args.url {
        config.source.url = url.clone();
    }
    if let Some(encoding) = args.encoding {
        config.source.encoding = encoding;
    }
    if let Some(interval) = args.interval {
        config.contour.interval = positive("interval", interval)?;
    }
    if let Some(major) = args.major_interval {
        config.contour.major_interval = Some(positive("major-interval", major)?);
    }
    if let Some(multiplier) = args.multiplier {
        if !multiplier.is_finite() {
            return Err(CliError::InvalidArgument {
                arg: "multiplier",
                reason: format!("{} is not a finite number", multiplier),
            });
        }
        config.contour.multiplier = multiplier;
    }
    if let Some(overzoom) = args.overzoom {
        config.contour.overzoom = overzoom;
    }
    if args.no_worker {
        config.source.worker = false;
    }
    Ok(())
}

fn positive(arg: &'static str, value: f64) -> Result<f64, CliError> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(CliError::InvalidArgument {
            arg,
            reason: format!("{} must be a positive number", value),
        })
    }
}

fn to_feature_collection(contours: &ContourSet, major_interval: f64) -> Value {
    let features: Vec<Value> = contours
        .iter()
        .flat_map(|(level, lines)| {
            let major = ContourSet::is_major(level, major_interval);
            lines.iter().map(move |line| {
                let coordinates: Vec<[f64; 2]> =
                    line.chunks_exact(2).map(|p| [p[0], p[1]]).collect();
                json!({
                    "type": "Feature",
                    "properties": { "ele": level, "level": u8::from(major) },
                    "geometry": { "type": "LineString", "coordinates": coordinates },
                })
            })
        })
        .collect();

    json!({ "type": "FeatureCollection", "features": features })
}

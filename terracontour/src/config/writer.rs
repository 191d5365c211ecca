//! INI serialization logic for converting `ConfigFile` → INI string.

use super::file::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let major_interval = config
        .contour
        .major_interval
        .map(|v| v.to_string())
        .unwrap_or_default();

    format!(
        r#"[source]
; Tile URL template with {{z}}, {{x}} and {{y}} placeholders
url = {}
; Tile encoding: terrarium, mapbox, raw16 or raw32
encoding = {}
; Highest zoom the source serves; finer tiles are cut from it
maxzoom = {}
; Deadline for one tile request, in milliseconds
timeout_ms = {}
; HTTP client timeout, in seconds
http_timeout_secs = {}
; Decode tiles on a background worker thread
worker = {}

[cache]
; Decoded tiles kept in memory
size = {}

[contour]
; Contour interval in elevation units
interval = {}
; Major contour interval (empty = 5 x interval)
major_interval = {}
; Elevation multiplier (3.28084 converts metres to feet)
multiplier = {}
; Zoom levels to borrow from a coarser tile
overzoom = {}
; Composite grids narrower than this many pixels are upsampled
subsample_below = {}
"#,
        config.source.url,
        config.source.encoding,
        config.source.maxzoom,
        config.source.timeout_ms,
        config.source.http_timeout_secs,
        config.source.worker,
        config.cache.size,
        config.contour.interval,
        major_interval,
        config.contour.multiplier,
        config.contour.overzoom,
        config.contour.subsample_below,
    )
}

//! terracontour CLI - decode DEM tiles and extract contour lines.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use terracontour::Encoding;

use crate::commands::contours::ContoursArgs;
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "terracontour")]
#[command(about = "Contour lines and elevation grids from tiled DEM rasters", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a local tile file and print its size and elevation range
    Decode {
        /// Path to the tile file
        file: PathBuf,

        /// Tile encoding: terrarium, mapbox, raw16 or raw32
        #[arg(long, default_value = "terrarium")]
        encoding: Encoding,
    },

    /// Fetch a tile and its neighbours and print its contour lines as JSON
    Contours {
        /// Zoom level
        #[arg(long)]
        z: u8,

        /// Tile column
        #[arg(long)]
        x: u32,

        /// Tile row
        #[arg(long)]
        y: u32,

        /// Tile URL template with {z}, {x} and {y} placeholders
        #[arg(long)]
        url: Option<String>,

        /// Tile encoding (overrides config)
        #[arg(long)]
        encoding: Option<Encoding>,

        /// Contour interval in elevation units
        #[arg(long)]
        interval: Option<f64>,

        /// Major contour interval
        #[arg(long)]
        major_interval: Option<f64>,

        /// Elevation multiplier (3.28084 for feet)
        #[arg(long)]
        multiplier: Option<f32>,

        /// Zoom levels to borrow from a coarser tile
        #[arg(long)]
        overzoom: Option<u8>,

        /// Decode on the calling runtime instead of a worker thread
        #[arg(long)]
        no_worker: bool,

        /// Config file (defaults to ~/.terracontour/config.ini)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write the default config file if it does not exist
    Init {
        /// Config file (defaults to ~/.terracontour/config.ini)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _logging = match commands::common::init_logging() {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: {}", e);
            None
        }
    };

    let result: Result<(), CliError> = match cli.command {
        Commands::Decode { file, encoding } => commands::decode::run(&file, encoding),
        Commands::Contours {
            z,
            x,
            y,
            url,
            encoding,
            interval,
            major_interval,
            multiplier,
            overzoom,
            no_worker,
            config,
        } => {
            commands::contours::run(ContoursArgs {
                z,
                x,
                y,
                url,
                encoding,
                interval,
                major_interval,
                multiplier,
                overzoom,
                no_worker,
                config,
            })
            .await
        }
        Commands::Init { config } => commands::init::run(config),
    };

    if let Err(e) = result {
        e.exit();
    }
}

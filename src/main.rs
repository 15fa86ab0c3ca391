use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};

use parcel_valuation::acquire::HttpDownloader;
use parcel_valuation::parcel::FILTERED_COLUMNS;
use parcel_valuation::{get_data, parcels_with_address, run, NumericPolicy, PipelineConfig, Result};

fn cli() -> Command {
    Command::new("Parcel Valuation")
        .version("1.0")
        .about("Maps parcel value per area as an extruded 3D choropleth")
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .global(true)
                .help("Directory holding the downloaded archive and the cache"),
        )
        .arg(
            Arg::new("url")
                .long("url")
                .global(true)
                .help("Where to download the parcel archive from"),
        )
        .arg(
            Arg::new("municipality")
                .short('m')
                .long("municipality")
                .global(true)
                .help("Municipality to keep"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .global(true)
                .help("Path of the exported HTML map"),
        )
        .arg(
            Arg::new("guard")
                .long("guard")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Reject zero-area parcels and clamp the colour scale instead of emitting NaN"),
        )
        .subcommand(
            Command::new("inspect")
                .about("Print the columns of parcels whose address contains a substring")
                .arg(
                    Arg::new("address")
                        .short('a')
                        .long("address")
                        .default_value("4817 SHEBOYGAN AVE")
                        .help("Literal address substring"),
                ),
        )
}

fn config_from(matches: &ArgMatches) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    if let Some(dir) = matches.get_one::<String>("data-dir") {
        config.data_dir = PathBuf::from(dir);
    }
    if let Some(url) = matches.get_one::<String>("url") {
        config.source_url = url.clone();
    }
    if let Some(municipality) = matches.get_one::<String>("municipality") {
        config.municipality = municipality.clone();
    }
    if let Some(output) = matches.get_one::<String>("output") {
        config.output_path = PathBuf::from(output);
    }
    if matches.get_flag("guard") {
        config.numeric_policy = NumericPolicy::Guard;
    }
    config
}

fn inspect(config: &PipelineConfig, address: &str) -> Result<()> {
    let downloader = HttpDownloader::new()?;
    let parcels = get_data(config, &downloader)?;
    let found = parcels_with_address(&parcels, address);

    println!("Columns: {:?}", FILTERED_COLUMNS);
    println!("{} parcels match {:?}", found.len(), address);
    for valued in found {
        println!(
            "  {} -> {}",
            valued.parcel.property_address.as_deref().unwrap_or_default(),
            valued.value_per_area
        );
    }
    Ok(())
}

fn saved_message(output: &Path) -> String {
    format!("3D parcel map saved to {}", output.display())
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        )
        .try_init();

    let matches = cli().get_matches();

    let result = match matches.subcommand() {
        Some(("inspect", sub)) => {
            let address = sub
                .get_one::<String>("address")
                .map(String::as_str)
                .unwrap_or_default();
            inspect(&config_from(sub), address).map(|_| None)
        }
        _ => {
            let config = config_from(&matches);
            run(&config).map(|_| Some(config.output_path))
        }
    };

    match result {
        Ok(Some(output)) => println!("{}", saved_message(&output)),
        Ok(None) => {}
        Err(e) => {
            eprintln!("Error processing parcels: {}", e);
            if matches!(e, parcel_valuation::Error::Zip(_) | parcel_valuation::Error::Shapefile(_)) {
                eprintln!("The downloaded archive may be incomplete; delete it to download again.");
            }
            std::process::exit(1);
        }
    }
}

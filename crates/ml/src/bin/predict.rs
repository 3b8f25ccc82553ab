//! Estimate the resale price of one HDB flat.
//!
//! ```text
//! hdb-predict --town TAMPINES --floor-area 92 --lease-year 1995
//! hdb-predict --postal-code 760123 --floor-area 990 --sqft --json
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Datelike;
use clap::{ArgGroup, Parser};

use hdb_core::config::AppConfig;
use hdb_ml::{FloorArea, PricePipeline, RawPropertyInput};

#[derive(Parser, Debug)]
#[command(name = "hdb-predict", about = "HDB resale price estimate")]
#[command(group(ArgGroup::new("location").required(true).args(["town", "postal_code"])))]
struct Args {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Town name, e.g. "ANG MO KIO".
    #[arg(long, requires = "lease_year")]
    town: Option<String>,

    /// 6-digit postal code; town and lease year are looked up.
    #[arg(long)]
    postal_code: Option<String>,

    /// Floor area, in square metres unless --sqft is given.
    #[arg(long)]
    floor_area: f64,

    /// Floor area is in square feet.
    #[arg(long)]
    sqft: bool,

    /// Lease commencement year. Required with --town.
    #[arg(long)]
    lease_year: Option<i32>,

    /// Average storey of the unit's storey range.
    #[arg(long, default_value_t = 10.0)]
    storey: f64,

    /// Expected sale year (default: this year).
    #[arg(long)]
    sale_year: Option<i32>,

    /// Expected sale month, 1-12 (default: this month).
    #[arg(long)]
    sale_month: Option<u32>,

    #[arg(long, default_value = "4 ROOM")]
    flat_type: String,

    #[arg(long, default_value = "IMPROVED")]
    flat_model: String,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
}

impl Args {
    fn to_input(&self) -> Result<RawPropertyInput> {
        let today = chrono::Local::now().date_naive();
        let area = if self.sqft {
            FloorArea::sqft(self.floor_area)
        } else {
            FloorArea::sqm(self.floor_area)
        };

        let mut builder = RawPropertyInput::builder()
            .floor_area(area)
            .storey_avg(self.storey)
            .sale_period(
                self.sale_year.unwrap_or_else(|| today.year()),
                self.sale_month.unwrap_or_else(|| today.month()),
            )
            .flat_type(self.flat_type.as_str())
            .flat_model(self.flat_model.as_str());
        if let Some(year) = self.lease_year {
            builder = builder.lease_commencement_year(year);
        }
        builder = match (&self.town, &self.postal_code) {
            (_, Some(code)) => builder.postal_code(code.as_str()),
            (Some(town), None) => builder.town(town.as_str()),
            (None, None) => anyhow::bail!("either --town or --postal-code is required"),
        };

        Ok(builder.build()?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(args.config.clone())?;

    hdb_core::logging::init_tracing(config.logging.json);

    tracing::info!(
        backend = ?config.predictor.backend,
        scaler = %config.artifacts.scaler_path.display(),
        "hdb-predict starting"
    );

    let input = args.to_input().context("invalid property details")?;

    let pipeline = PricePipeline::from_config(&config);
    pipeline
        .startup_check()
        .await
        .context("startup check failed")?;

    let result = pipeline
        .predict_price(&input)
        .await
        .context("prediction failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{result}");
    }
    Ok(())
}

//! The `features` command.

use crate::config::Config;
use cairns_data::snapshot::{read_parquet, write_parquet};
use cairns_features::{FeatureTransform, ScalingMethod, WindowedScaling};
use std::error::Error;
use std::path::PathBuf;
use tracing::{debug, info};

/// Arguments of `cairns features`.
#[derive(Debug)]
pub(crate) struct FeatureArgs {
    pub(crate) method: u8,
    pub(crate) input: Option<PathBuf>,
    pub(crate) output: Option<PathBuf>,
    pub(crate) window: Option<(i64, i64)>,
    pub(crate) scaling: ScalingMethod,
}

/// Run one transform over a snapshot. Returns the output path.
pub(crate) fn run_features(config: &Config, args: FeatureArgs) -> Result<PathBuf, Box<dyn Error>> {
    let input = args.input.unwrap_or_else(|| config.data.snapshot_path());
    let output = args
        .output
        .unwrap_or_else(|| config.data.feature_path(args.method));

    let mut transform = FeatureTransform::from_method(args.method, args.window)?;
    if let FeatureTransform::WindowedScaling(scaling) = &mut transform {
        scaling.method = args.scaling;
    }

    println!("Loading {}...", input.display());
    let df = read_parquet(&input)?;
    info!(rows = df.height(), transform = transform.name(), "snapshot loaded");

    let mut out = match &transform {
        FeatureTransform::WindowedScaling(scaling) => {
            let scaler = WindowedScaling::new(scaling.clone());
            let params = scaler.fit(&df)?;
            for (column, p) in &params.columns {
                debug!(column = %column, center = p.center, scale = p.scale, "fitted");
            }
            scaler.apply(df, &params)?
        }
        other => other.transform(df)?,
    };

    write_parquet(&output, &mut out)?;
    println!(
        "Feature method {} finished: {} rows written to {}",
        args.method,
        out.height(),
        output.display()
    );
    Ok(output)
}

//! The `download` command.
//!
//! | Mode | Action |
//! |------|--------|
//! | 1 | Refresh the security reference table |
//! | 2 | Download the full history of every listed security |
//! | 3 | Update one trading day for all securities |
//! | 4 | Export the store to Parquet, then clean and label it in place |

use super::store_manager;
use crate::config::Config;
use cairns_data::records::parse_trade_date;
use cairns_data::snapshot::write_parquet;
use cairns_data::{
    DailyUpdate, DownloadOptions, Exporter, Ingestor, SqliteStore, TushareSource,
};
use cairns_features::{FeaturePipeline, LabelerConfig};
use indicatif::{ProgressBar, ProgressStyle};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Arguments of `cairns download`.
#[derive(Debug)]
pub(crate) struct DownloadArgs {
    pub(crate) mode: u8,
    pub(crate) date: Option<String>,
    pub(crate) output: Option<PathBuf>,
}

pub(crate) async fn run_download(config: &Config, args: DownloadArgs) -> Result<(), Box<dyn Error>> {
    let store = store_manager::open_store(&config.store)?;

    match args.mode {
        1 => {
            let source = tushare_source(config)?;
            println!("Updating security reference table...");
            let rows = Ingestor::new(&store, &source).update_security_basic().await?;
            println!("Security reference table updated: {rows} securities");
        }
        2 => {
            let source = tushare_source(config)?;
            download_history(config, &store, &source).await?;
            println!("{}", store_summary(&store)?);
        }
        3 => {
            let source = tushare_source(config)?;
            let date = args.date.as_deref().map(parse_trade_date).transpose()?;
            match Ingestor::new(&store, &source).update_daily_data(date).await? {
                DailyUpdate::NoTradingData => println!("No trading data for the requested date"),
                DailyUpdate::Updated { rows } => println!("Daily data updated: {rows} rows"),
            }
            println!("{}", store_summary(&store)?);
        }
        4 => {
            let output = args.output.unwrap_or_else(|| config.data.snapshot_path());
            export_and_label(config, &store, &output)?;
        }
        other => return Err(format!("unknown download mode {other}, expected 1-4").into()),
    }

    store.close()?;
    Ok(())
}

fn tushare_source(config: &Config) -> Result<TushareSource, Box<dyn Error>> {
    let token = config
        .tushare
        .token
        .clone()
        .ok_or("no Tushare token: set [tushare] token or TUSHARE_TOKEN")?;
    let source = TushareSource::with_rate_limit(
        token,
        Duration::from_millis(config.tushare.rate_limit_ms),
    )?;

    Ok(match &config.tushare.base_url {
        Some(url) => source.with_base_url(url.clone()),
        None => source,
    })
}

async fn download_history(
    config: &Config,
    store: &SqliteStore,
    source: &TushareSource,
) -> Result<(), Box<dyn Error>> {
    let options = DownloadOptions {
        start_date: parse_trade_date(&config.data.start_date)?,
        ..Default::default()
    };

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let ingestor = Ingestor::new(store, source).with_progress(pb);
    let codes = ingestor.listed_codes()?;
    if codes.is_empty() {
        return Err("the security reference table is empty, run download --mode 1 first".into());
    }

    println!("Downloading history for {} securities...", codes.len());
    let report = ingestor.download_stocks(&codes, &options).await?;

    println!(
        "Download finished: {} downloaded, {} skipped, {} failed, {} rows",
        report.downloaded,
        report.skipped,
        report.failed.len(),
        report.rows
    );
    for (code, reason) in &report.failed {
        println!("  {code}: {reason}");
    }
    Ok(())
}

/// One-line description of the store contents after an update.
fn store_summary(store: &SqliteStore) -> Result<String, Box<dyn Error>> {
    let stats = store.get_stats()?;
    info!(
        total_bars = stats.total_bars,
        unique_codes = stats.unique_codes,
        securities = stats.securities,
        first_date = ?stats.first_date,
        last_date = ?stats.last_date,
        "store statistics"
    );

    let span = match (&stats.first_date, &stats.last_date) {
        (Some(first), Some(last)) => format!("{first} to {last}"),
        _ => "no trading days".to_string(),
    };
    Ok(format!(
        "Store holds {} bars for {} of {} securities, {span}",
        stats.total_bars, stats.unique_codes, stats.securities
    ))
}

/// Export the store, then overwrite the snapshot with the labeled table.
fn export_and_label(config: &Config, store: &SqliteStore, output: &Path) -> Result<(), Box<dyn Error>> {
    println!("Exporting daily bars to {}...", output.display());
    let exporter = Exporter::new(store);
    let Some(snapshot) =
        exporter.export(output, config.data.batch_size, &config.data.code_prefixes)?
    else {
        println!("No daily bars match, nothing exported");
        return Ok(());
    };

    let pipeline = FeaturePipeline::new(LabelerConfig {
        workers: config.features.workers,
        ..Default::default()
    });
    let mut labeled = pipeline.run(snapshot.frame)?;
    write_parquet(output, &mut labeled)?;

    info!(rows = labeled.height(), path = %output.display(), "labeled snapshot written");
    println!(
        "Exported {} rows in {} batches to {}",
        labeled.height(),
        snapshot.batches,
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairns_data::DailyBar;
    use cairns_data::snapshot::read_parquet;

    #[test]
    fn test_export_and_label_overwrites_snapshot() {
        let store = SqliteStore::in_memory().unwrap();
        let bars: Vec<DailyBar> = ["000001.SZ", "600000.SH"]
            .iter()
            .flat_map(|code| {
                (0..13).map(move |d| {
                    let mut bar = DailyBar::new(*code, format!("202401{:02}", d + 2));
                    bar.open = Some(10.0 + f64::from(d));
                    bar.close = Some(10.5 + f64::from(d));
                    bar
                })
            })
            .collect();
        store.upsert_daily_bars(&bars).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("stock_data.parquet");
        export_and_label(&Config::default(), &store, &output).unwrap();

        let labeled = read_parquet(&output).unwrap();
        assert_eq!(labeled.height(), 26);
        assert!(labeled.column("code").is_ok());
        assert!(labeled.column("Ret_t11_rank_std").is_ok());
        assert!(labeled.column("ts_code").is_err());
    }

    #[test]
    fn test_store_summary() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(
            store_summary(&store).unwrap(),
            "Store holds 0 bars for 0 of 0 securities, no trading days"
        );

        store
            .upsert_daily_bars(&[
                DailyBar::new("000001.SZ", "20240102"),
                DailyBar::new("000001.SZ", "20240103"),
                DailyBar::new("600000.SH", "20240103"),
            ])
            .unwrap();
        assert_eq!(
            store_summary(&store).unwrap(),
            "Store holds 3 bars for 2 of 0 securities, 20240102 to 20240103"
        );
    }

    #[test]
    fn test_missing_token_is_reported() {
        let err = tushare_source(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("TUSHARE_TOKEN"));
    }
}

//! SQLite record store for daily bars and security reference data.

use crate::error::Result;
use crate::records::{DailyBar, SecurityBasic};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::path::Path;
use tracing::debug;

const DAILY_BAR_SELECT: &str = "SELECT ts_code, trade_date, open, high, low, close, pre_close,
        \"change\", pct_chg, vol, amount
 FROM stock_daily";

/// SQLite-backed record store.
///
/// The connection is owned by the store and closed when it is dropped, so a
/// handle opened at process start is released on every exit path. Use
/// [`SqliteStore::close`] to observe close errors explicitly.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

/// Filter on security codes, combined with OR.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeFilter {
    prefixes: Vec<String>,
}

impl CodeFilter {
    /// Match every code.
    pub const fn all() -> Self {
        Self {
            prefixes: Vec::new(),
        }
    }

    /// Match codes starting with any of the given prefixes, e.g. `600`, `000`.
    pub fn prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// SQL `WHERE` clause, empty when the filter matches everything.
    fn where_clause(&self) -> String {
        if self.prefixes.is_empty() {
            return String::new();
        }
        let conditions = vec!["ts_code LIKE ? ESCAPE '\\'"; self.prefixes.len()].join(" OR ");
        format!("WHERE {conditions}")
    }

    fn params(&self) -> Vec<Value> {
        self.prefixes
            .iter()
            .map(|prefix| Value::Text(format!("{}%", escape_like(prefix))))
            .collect()
    }
}

/// Escape `LIKE` wildcards so a prefix matches literally.
fn escape_like(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for ch in prefix.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Summary statistics about store contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Total daily bar rows
    pub total_bars: usize,
    /// Number of distinct codes with at least one bar
    pub unique_codes: usize,
    /// Number of reference rows
    pub securities: usize,
    /// Earliest trade date stored
    pub first_date: Option<String>,
    /// Latest trade date stored
    pub last_date: Option<String>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Close the connection, reporting any error raised while closing.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS stock_daily (
                ts_code TEXT NOT NULL,
                trade_date TEXT NOT NULL,
                open REAL,
                high REAL,
                low REAL,
                close REAL,
                pre_close REAL,
                \"change\" REAL,
                pct_chg REAL,
                vol REAL,
                amount REAL,
                PRIMARY KEY (ts_code, trade_date)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_stock_daily_trade_date ON stock_daily(trade_date)",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS stock_basic (
                ts_code TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                name TEXT NOT NULL,
                area TEXT,
                industry TEXT,
                cnspell TEXT,
                market TEXT,
                list_date TEXT,
                act_name TEXT NOT NULL DEFAULT '',
                act_ent_type TEXT NOT NULL DEFAULT ''
            )",
            [],
        )?;

        Ok(())
    }

    /// Insert bars, overwriting every non-key column of existing rows.
    ///
    /// All rows are written in one transaction. Returns the number of rows written.
    pub fn upsert_daily_bars(&self, bars: &[DailyBar]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO stock_daily
                 (ts_code, trade_date, open, high, low, close, pre_close,
                  \"change\", pct_chg, vol, amount)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(ts_code, trade_date) DO UPDATE SET
                    open = excluded.open,
                    high = excluded.high,
                    low = excluded.low,
                    close = excluded.close,
                    pre_close = excluded.pre_close,
                    \"change\" = excluded.\"change\",
                    pct_chg = excluded.pct_chg,
                    vol = excluded.vol,
                    amount = excluded.amount",
            )?;

            for bar in bars {
                stmt.execute(params![
                    bar.ts_code,
                    bar.trade_date,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.pre_close,
                    bar.change,
                    bar.pct_chg,
                    bar.vol,
                    bar.amount,
                ])?;
            }
        }
        tx.commit()?;

        debug!(rows = bars.len(), "upserted daily bars");
        Ok(bars.len())
    }

    /// Insert reference rows keyed by code, overwriting existing rows.
    pub fn upsert_security_basics(&self, securities: &[SecurityBasic]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO stock_basic
                 (ts_code, symbol, name, area, industry, cnspell,
                  market, list_date, act_name, act_ent_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(ts_code) DO UPDATE SET
                    symbol = excluded.symbol,
                    name = excluded.name,
                    area = excluded.area,
                    industry = excluded.industry,
                    cnspell = excluded.cnspell,
                    market = excluded.market,
                    list_date = excluded.list_date,
                    act_name = excluded.act_name,
                    act_ent_type = excluded.act_ent_type",
            )?;

            for sec in securities {
                stmt.execute(params![
                    sec.ts_code,
                    sec.symbol,
                    sec.name,
                    sec.area,
                    sec.industry,
                    sec.cnspell,
                    sec.market,
                    sec.list_date,
                    sec.act_name,
                    sec.act_ent_type,
                ])?;
            }
        }
        tx.commit()?;

        debug!(rows = securities.len(), "upserted security basics");
        Ok(securities.len())
    }

    /// Check whether at least one bar is stored for a code.
    pub fn has_daily_bars(&self, ts_code: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM stock_daily WHERE ts_code = ?1 LIMIT 1",
                params![ts_code],
                |_| Ok(()),
            )
            .optional()?;

        Ok(found.is_some())
    }

    /// Get a single bar by key.
    pub fn get_daily_bar(&self, ts_code: &str, trade_date: &str) -> Result<Option<DailyBar>> {
        let sql = format!("{DAILY_BAR_SELECT} WHERE ts_code = ?1 AND trade_date = ?2");
        let bar = self
            .conn
            .query_row(&sql, params![ts_code, trade_date], bar_from_row)
            .optional()?;

        Ok(bar)
    }

    /// Count bars matching a filter.
    pub fn count_daily_bars(&self, filter: &CodeFilter) -> Result<usize> {
        let sql = format!(
            "SELECT COUNT(*) FROM stock_daily {}",
            filter.where_clause()
        );
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(filter.params()), |row| row.get(0))?;

        Ok(count as usize)
    }

    /// Fetch one window of bars matching a filter.
    ///
    /// Rows are ordered by `(ts_code, trade_date)` so consecutive windows never
    /// overlap and together cover every matching row exactly once.
    pub fn daily_bar_window(
        &self,
        filter: &CodeFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DailyBar>> {
        let sql = format!(
            "{DAILY_BAR_SELECT} {} ORDER BY ts_code, trade_date LIMIT ? OFFSET ?",
            filter.where_clause()
        );

        let mut values = filter.params();
        values.push(Value::Integer(limit as i64));
        values.push(Value::Integer(offset as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let bars = stmt
            .query_map(params_from_iter(values), bar_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(bars)
    }

    /// All reference codes, ordered.
    pub fn security_codes(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT ts_code FROM stock_basic ORDER BY ts_code")?;

        let codes = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(codes)
    }

    /// Get store statistics.
    pub fn get_stats(&self) -> Result<StoreStats> {
        let (total_bars, unique_codes, first_date, last_date): (
            i64,
            i64,
            Option<String>,
            Option<String>,
        ) = self.conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT ts_code), MIN(trade_date), MAX(trade_date)
             FROM stock_daily",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        let securities: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM stock_basic", [], |row| row.get(0))?;

        Ok(StoreStats {
            total_bars: total_bars as usize,
            unique_codes: unique_codes as usize,
            securities: securities as usize,
            first_date,
            last_date,
        })
    }
}

fn bar_from_row(row: &Row<'_>) -> rusqlite::Result<DailyBar> {
    Ok(DailyBar {
        ts_code: row.get(0)?,
        trade_date: row.get(1)?,
        open: row.get(2)?,
        high: row.get(3)?,
        low: row.get(4)?,
        close: row.get(5)?,
        pre_close: row.get(6)?,
        change: row.get(7)?,
        pct_chg: row.get(8)?,
        vol: row.get(9)?,
        amount: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(code: &str, date: &str, close: f64) -> DailyBar {
        let mut bar = DailyBar::new(code, date);
        bar.open = Some(close - 0.1);
        bar.close = Some(close);
        bar.vol = Some(1000.0);
        bar
    }

    fn security(code: &str, name: &str) -> SecurityBasic {
        SecurityBasic {
            ts_code: code.to_string(),
            symbol: code.split('.').next().unwrap().to_string(),
            name: name.to_string(),
            area: Some("深圳".to_string()),
            industry: Some("银行".to_string()),
            cnspell: None,
            market: Some("主板".to_string()),
            list_date: Some("19910403".to_string()),
            act_name: String::new(),
            act_ent_type: String::new(),
        }
    }

    #[test]
    fn test_store_initialization() {
        let store = SqliteStore::in_memory().unwrap();
        let stats = store.get_stats().unwrap();
        assert_eq!(stats.total_bars, 0);
        assert_eq!(stats.securities, 0);
        assert!(stats.first_date.is_none());
    }

    #[test]
    fn test_upsert_overwrites_existing_key() {
        let store = SqliteStore::in_memory().unwrap();

        store
            .upsert_daily_bars(&[bar("000001.SZ", "20240102", 9.39)])
            .unwrap();

        let mut revised = bar("000001.SZ", "20240102", 9.50);
        revised.vol = None;
        store.upsert_daily_bars(&[revised.clone()]).unwrap();

        assert_eq!(store.count_daily_bars(&CodeFilter::all()).unwrap(), 1);
        let stored = store
            .get_daily_bar("000001.SZ", "20240102")
            .unwrap()
            .unwrap();
        assert_eq!(stored, revised);
    }

    #[test]
    fn test_has_daily_bars() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(!store.has_daily_bars("600000.SH").unwrap());

        store
            .upsert_daily_bars(&[bar("600000.SH", "20240102", 7.0)])
            .unwrap();
        assert!(store.has_daily_bars("600000.SH").unwrap());
        assert!(!store.has_daily_bars("600001.SH").unwrap());
    }

    #[test]
    fn test_count_with_prefix_filter() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .upsert_daily_bars(&[
                bar("000001.SZ", "20240102", 9.0),
                bar("600000.SH", "20240102", 7.0),
                bar("601398.SH", "20240102", 5.0),
                bar("300750.SZ", "20240102", 150.0),
            ])
            .unwrap();

        assert_eq!(store.count_daily_bars(&CodeFilter::all()).unwrap(), 4);
        assert_eq!(
            store
                .count_daily_bars(&CodeFilter::prefixes(["600", "601"]))
                .unwrap(),
            2
        );
        assert_eq!(
            store
                .count_daily_bars(&CodeFilter::prefixes(["688"]))
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_prefix_wildcards_match_literally() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .upsert_daily_bars(&[
                bar("000001.SZ", "20240102", 9.0),
                bar("0_0001.SZ", "20240102", 1.0),
            ])
            .unwrap();

        let count = |prefix: &str| {
            store
                .count_daily_bars(&CodeFilter::prefixes([prefix]))
                .unwrap()
        };
        assert_eq!(count("0_0"), 1);
        assert_eq!(count("00_"), 0);
        assert_eq!(count("%"), 0);
        assert_eq!(count("000"), 1);
    }

    #[test]
    fn test_windows_are_ordered_and_disjoint() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .upsert_daily_bars(&[
                bar("600000.SH", "20240103", 7.1),
                bar("000001.SZ", "20240103", 9.1),
                bar("600000.SH", "20240102", 7.0),
                bar("000001.SZ", "20240102", 9.0),
            ])
            .unwrap();

        let filter = CodeFilter::all();
        let first = store.daily_bar_window(&filter, 3, 0).unwrap();
        let second = store.daily_bar_window(&filter, 3, 3).unwrap();

        let keys: Vec<(String, String)> = first
            .iter()
            .chain(second.iter())
            .map(|b| (b.ts_code.clone(), b.trade_date.clone()))
            .collect();

        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 1);
        assert_eq!(
            keys,
            vec![
                ("000001.SZ".to_string(), "20240102".to_string()),
                ("000001.SZ".to_string(), "20240103".to_string()),
                ("600000.SH".to_string(), "20240102".to_string()),
                ("600000.SH".to_string(), "20240103".to_string()),
            ]
        );
    }

    #[test]
    fn test_security_basic_upsert() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .upsert_security_basics(&[security("000001.SZ", "平安银行"), security("600000.SH", "浦发银行")])
            .unwrap();
        store
            .upsert_security_basics(&[security("000001.SZ", "平安银行A")])
            .unwrap();

        assert_eq!(
            store.security_codes().unwrap(),
            vec!["000001.SZ".to_string(), "600000.SH".to_string()]
        );
        let name: String = store
            .conn
            .query_row(
                "SELECT name FROM stock_basic WHERE ts_code = ?1",
                params!["000001.SZ"],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(name, "平安银行A");
    }

    #[test]
    fn test_store_stats() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .upsert_daily_bars(&[
                bar("000001.SZ", "20240102", 9.0),
                bar("000001.SZ", "20240105", 9.2),
                bar("600000.SH", "20240103", 7.0),
            ])
            .unwrap();

        let stats = store.get_stats().unwrap();
        assert_eq!(stats.total_bars, 3);
        assert_eq!(stats.unique_codes, 2);
        assert_eq!(stats.first_date.as_deref(), Some("20240102"));
        assert_eq!(stats.last_date.as_deref(), Some("20240105"));
    }

    #[test]
    fn test_reopen_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cairns.db");

        let store = SqliteStore::open(&path).unwrap();
        store
            .upsert_daily_bars(&[bar("000001.SZ", "20240102", 9.0)])
            .unwrap();
        store.close().unwrap();

        let reopened = SqliteStore::open(&path).unwrap();
        assert!(reopened.has_daily_bars("000001.SZ").unwrap());
    }
}

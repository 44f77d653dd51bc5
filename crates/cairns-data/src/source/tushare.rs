//! Daily bar and reference data from the Tushare Pro HTTP API.

use crate::error::{DataError, Result};
use crate::records::{DailyBar, SecurityBasic};
use crate::source::MarketDataSource;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "http://api.tushare.pro";

const DAILY_FIELDS: &str = "ts_code,trade_date,open,high,low,close,pre_close,change,pct_chg,vol,amount";
const BASIC_FIELDS: &str =
    "ts_code,symbol,name,area,industry,cnspell,market,list_date,act_name,act_ent_type";

/// Envelope returned by every Tushare endpoint.
#[derive(Debug, Deserialize)]
struct TushareResponse {
    code: i64,
    msg: Option<String>,
    data: Option<TushareTable>,
}

/// Column-oriented payload: field names plus positional row items.
#[derive(Debug, Deserialize)]
struct TushareTable {
    fields: Vec<String>,
    items: Vec<Vec<Value>>,
}

impl TushareTable {
    fn index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    fn require(&self, field: &str) -> Result<usize> {
        self.index(field)
            .ok_or_else(|| DataError::Parse(format!("Tushare payload has no '{field}' field")))
    }
}

fn text(item: &[Value], idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| item.get(i))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn number(item: &[Value], idx: Option<usize>) -> Option<f64> {
    idx.and_then(|i| item.get(i)).and_then(Value::as_f64)
}

fn parse_response(response: TushareResponse) -> Result<TushareTable> {
    if response.code != 0 {
        return Err(DataError::Provider(format!(
            "Tushare returned code {}: {}",
            response.code,
            response.msg.unwrap_or_default()
        )));
    }
    response
        .data
        .ok_or_else(|| DataError::Provider("Tushare response carries no data".to_string()))
}

fn parse_daily_bars(table: &TushareTable) -> Result<Vec<DailyBar>> {
    let code_idx = table.require("ts_code")?;
    let date_idx = table.require("trade_date")?;
    let open = table.index("open");
    let high = table.index("high");
    let low = table.index("low");
    let close = table.index("close");
    let pre_close = table.index("pre_close");
    let change = table.index("change");
    let pct_chg = table.index("pct_chg");
    let vol = table.index("vol");
    let amount = table.index("amount");

    table
        .items
        .iter()
        .map(|item| {
            let ts_code = text(item, Some(code_idx))
                .ok_or_else(|| DataError::Parse("Missing ts_code".to_string()))?;
            let trade_date = text(item, Some(date_idx))
                .ok_or_else(|| DataError::Parse(format!("Missing trade_date for {ts_code}")))?;

            Ok(DailyBar {
                ts_code,
                trade_date,
                open: number(item, open),
                high: number(item, high),
                low: number(item, low),
                close: number(item, close),
                pre_close: number(item, pre_close),
                change: number(item, change),
                pct_chg: number(item, pct_chg),
                vol: number(item, vol),
                amount: number(item, amount),
            })
        })
        .collect()
}

fn parse_security_basics(table: &TushareTable) -> Result<Vec<SecurityBasic>> {
    let code_idx = table.require("ts_code")?;
    let symbol = table.index("symbol");
    let name = table.index("name");
    let area = table.index("area");
    let industry = table.index("industry");
    let cnspell = table.index("cnspell");
    let market = table.index("market");
    let list_date = table.index("list_date");
    let act_name = table.index("act_name");
    let act_ent_type = table.index("act_ent_type");

    table
        .items
        .iter()
        .map(|item| {
            let ts_code = text(item, Some(code_idx))
                .ok_or_else(|| DataError::Parse("Missing ts_code".to_string()))?;
            let fallback_symbol = ts_code.split('.').next().unwrap_or_default().to_string();

            Ok(SecurityBasic {
                symbol: text(item, symbol).unwrap_or(fallback_symbol),
                name: text(item, name).unwrap_or_default(),
                area: text(item, area),
                industry: text(item, industry),
                cnspell: text(item, cnspell),
                market: text(item, market),
                list_date: text(item, list_date),
                act_name: text(item, act_name).unwrap_or_default(),
                act_ent_type: text(item, act_ent_type).unwrap_or_default(),
                ts_code,
            })
        })
        .collect()
}

/// Tushare Pro client with rate limiting.
pub struct TushareSource {
    client: reqwest::Client,
    token: String,
    base_url: String,
    rate_limit_delay: Duration,
}

impl std::fmt::Debug for TushareSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TushareSource")
            .field("base_url", &self.base_url)
            .field("rate_limit_delay", &self.rate_limit_delay)
            .finish_non_exhaustive()
    }
}

impl TushareSource {
    /// Create a client with default rate limiting (200 requests/minute).
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_rate_limit(token, Duration::from_millis(300))
    }

    /// Create a client with a custom delay between requests.
    pub fn with_rate_limit(token: impl Into<String>, rate_limit_delay: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            token: token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit_delay,
        })
    }

    /// Point the client at a different endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn call(&self, api_name: &str, params: Value, fields: &str) -> Result<TushareTable> {
        let body = json!({
            "api_name": api_name,
            "token": self.token,
            "params": params,
            "fields": fields,
        });

        debug!(api_name, "calling tushare");
        let payload = self.post(api_name, &body).await;

        // Apply rate limiting, failed requests included
        sleep(self.rate_limit_delay).await;

        parse_response(payload?)
    }

    async fn post(&self, api_name: &str, body: &Value) -> Result<TushareResponse> {
        let response = self.client.post(&self.base_url).json(body).send().await?;

        if !response.status().is_success() {
            return Err(DataError::Provider(format!(
                "Tushare request '{api_name}' failed with status {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

impl MarketDataSource for TushareSource {
    async fn daily_bars(
        &self,
        ts_code: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<Vec<DailyBar>> {
        let params = json!({
            "ts_code": ts_code,
            "start_date": start_date,
            "end_date": end_date,
        });
        let table = self.call("daily", params, DAILY_FIELDS).await?;
        parse_daily_bars(&table)
    }

    async fn daily_cross_section(&self, trade_date: &str) -> Result<Vec<DailyBar>> {
        let params = json!({ "trade_date": trade_date });
        let table = self.call("daily", params, DAILY_FIELDS).await?;
        parse_daily_bars(&table)
    }

    async fn security_basics(&self) -> Result<Vec<SecurityBasic>> {
        let params = json!({ "list_status": "L" });
        let table = self.call("stock_basic", params, BASIC_FIELDS).await?;
        parse_security_basics(&table)
    }
}

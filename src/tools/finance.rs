use std::collections::HashMap;

use futures::future::BoxFuture;
use reqwest::Client;
use rig::completion::ToolDefinition;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::{Tool, ToolError, definition_for, parse_args};
use crate::http::{self, HttpError};

const EXCHANGE_RATE_URL: &str = "https://api.exchangerate-api.com/v4/latest/USD";
const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

pub const INVALID_YESTERDAY_PRICE: &str = "Invalid yesterday price. It must be greater than zero.";

/// Describe the move from `yesterday_price` to `today_price` as a percentage.
pub fn calculate_percentage_change(yesterday_price: f64, today_price: f64) -> String {
    if yesterday_price <= 0.0 {
        return INVALID_YESTERDAY_PRICE.to_owned();
    }
    let change = today_price - yesterday_price;
    let percent_change = change / yesterday_price * 100.0;
    let direction = if change > 0.0 { "increased" } else { "decreased" };
    format!(
        "The price has {direction} by {:.2}%.",
        percent_change.abs()
    )
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PercentageChangeArgs {
    /// The price yesterday.
    pub yesterday_price: f64,
    /// The price today.
    pub today_price: f64,
}

pub struct PercentageChange;

impl Tool for PercentageChange {
    fn name(&self) -> &'static str {
        "calculate_percentage_change"
    }

    fn definition(&self) -> ToolDefinition {
        definition_for::<PercentageChangeArgs>(
            self.name(),
            "Calculates the percentage change between two prices and whether it is an increase or decrease.",
        )
    }

    fn call(&self, args: Value) -> BoxFuture<'static, Result<String, ToolError>> {
        let args = parse_args::<PercentageChangeArgs>(self.name(), args);
        Box::pin(async move {
            let args = args?;
            Ok(calculate_percentage_change(
                args.yesterday_price,
                args.today_price,
            ))
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StockPriceArgs {
    /// The ticker symbol of the stock, e.g. MSFT.
    pub ticker: String,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: String,
    currency: Option<String>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    description: String,
}

/// Previous close of a ticker, from the Yahoo Finance chart endpoint.
#[derive(Clone)]
pub struct StockPrice {
    client: Client,
}

impl StockPrice {
    pub fn new() -> Result<Self, HttpError> {
        Ok(Self {
            client: http::client()?,
        })
    }

    fn previous_close(envelope: ChartEnvelope) -> Result<(String, f64, Option<String>), ToolError> {
        let failed = |detail: String| ToolError::Failed {
            tool: "get_stock_price",
            detail,
        };
        if let Some(error) = envelope.chart.error {
            return Err(failed(error.description));
        }
        let meta = envelope
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .map(|result| result.meta)
            .ok_or_else(|| failed("no quote returned".to_owned()))?;
        let price = meta
            .previous_close
            .or(meta.chart_previous_close)
            .ok_or_else(|| failed(format!("no previous close for {}", meta.symbol)))?;
        Ok((meta.symbol, price, meta.currency))
    }
}

impl Tool for StockPrice {
    fn name(&self) -> &'static str {
        "get_stock_price"
    }

    fn definition(&self) -> ToolDefinition {
        definition_for::<StockPriceArgs>(
            self.name(),
            "Retrieve the previous closing stock price for a given ticker symbol.",
        )
    }

    fn call(&self, args: Value) -> BoxFuture<'static, Result<String, ToolError>> {
        let client = self.client.clone();
        let args = parse_args::<StockPriceArgs>(self.name(), args);
        Box::pin(async move {
            let ticker = args?.ticker.trim().to_uppercase();
            let response = client
                .get(format!("{YAHOO_CHART_URL}/{ticker}"))
                .query(&[("range", "1d"), ("interval", "1d")])
                .send()
                .await
                .map_err(HttpError::transport("yahoo-finance"))?;
            let envelope: ChartEnvelope = http::decode_json("yahoo-finance", response).await?;
            let (symbol, price, currency) = Self::previous_close(envelope)?;
            Ok(format!(
                "The previous closing price of {symbol} was {price:.2} {}.",
                currency.unwrap_or_else(|| "USD".to_owned())
            ))
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExchangeRateArgs {
    /// ISO 4217 code of the target currency, e.g. EUR.
    pub target_currency: String,
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

/// Exchange rate from USD to another currency.
#[derive(Clone)]
pub struct ExchangeRate {
    client: Client,
}

impl ExchangeRate {
    pub fn new() -> Result<Self, HttpError> {
        Ok(Self {
            client: http::client()?,
        })
    }

    fn describe(rates: &RatesResponse, target_currency: &str) -> Result<String, ToolError> {
        let code = target_currency.trim().to_uppercase();
        let rate = rates.rates.get(&code).ok_or_else(|| ToolError::Failed {
            tool: "get_exchange_rate",
            detail: format!("unknown currency code {code}"),
        })?;
        Ok(format!("The exchange rate from USD to {code} is {rate}."))
    }
}

impl Tool for ExchangeRate {
    fn name(&self) -> &'static str {
        "get_exchange_rate"
    }

    fn definition(&self) -> ToolDefinition {
        definition_for::<ExchangeRateArgs>(
            self.name(),
            "Retrieve the exchange rate from USD to the given currency.",
        )
    }

    fn call(&self, args: Value) -> BoxFuture<'static, Result<String, ToolError>> {
        let client = self.client.clone();
        let args = parse_args::<ExchangeRateArgs>(self.name(), args);
        Box::pin(async move {
            let args = args?;
            let response = client
                .get(EXCHANGE_RATE_URL)
                .send()
                .await
                .map_err(HttpError::transport("exchangerate-api"))?;
            let rates: RatesResponse = http::decode_json("exchangerate-api", response).await?;
            Self::describe(&rates, &args.target_currency)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_change_messages() {
        assert_eq!(
            calculate_percentage_change(100.0, 110.0),
            "The price has increased by 10.00%."
        );
        assert_eq!(
            calculate_percentage_change(200.0, 150.0),
            "The price has decreased by 25.00%."
        );
        assert_eq!(calculate_percentage_change(0.0, 10.0), INVALID_YESTERDAY_PRICE);
        assert_eq!(calculate_percentage_change(-5.0, 10.0), INVALID_YESTERDAY_PRICE);
    }

    #[tokio::test]
    async fn percentage_tool_via_json() {
        let output = PercentageChange
            .call(serde_json::json!({"yesterday_price": 100.0, "today_price": 110.0}))
            .await
            .unwrap();
        assert_eq!(output, "The price has increased by 10.00%.");
    }

    #[test]
    fn previous_close_from_chart() {
        let envelope: ChartEnvelope = serde_json::from_str(
            r#"{"chart": {"result": [{"meta": {"symbol": "MSFT", "currency": "USD",
                "chartPreviousClose": 415.5, "regularMarketPrice": 420.1}}], "error": null}}"#,
        )
        .unwrap();
        let (symbol, price, currency) = StockPrice::previous_close(envelope).unwrap();
        assert_eq!(symbol, "MSFT");
        assert!((price - 415.5).abs() < 1e-9);
        assert_eq!(currency.as_deref(), Some("USD"));
    }

    #[test]
    fn chart_error_is_reported() {
        let envelope: ChartEnvelope = serde_json::from_str(
            r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#,
        )
        .unwrap();
        let err = StockPrice::previous_close(envelope).unwrap_err();
        assert!(err.to_string().contains("symbol may be delisted"));
    }

    #[test]
    fn exchange_rate_lookup() {
        let rates: RatesResponse =
            serde_json::from_str(r#"{"base": "USD", "rates": {"EUR": 0.92, "JPY": 151.2}}"#)
                .unwrap();
        assert_eq!(
            ExchangeRate::describe(&rates, "eur").unwrap(),
            "The exchange rate from USD to EUR is 0.92."
        );
        assert!(matches!(
            ExchangeRate::describe(&rates, "XXX"),
            Err(ToolError::Failed { .. })
        ));
    }
}

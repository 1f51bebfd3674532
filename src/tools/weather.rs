use futures::future::BoxFuture;
use reqwest::Client;
use rig::completion::ToolDefinition;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::{Tool, ToolError, definition_for, parse_args};
use crate::http::{self, HttpError};

const FORECAST_URL: &str = "https://api.openweathermap.org/data/2.5/forecast";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ForecastArgs {
    /// City name, e.g. Berlin.
    pub city: String,
    /// Number of forecast entries to return.
    #[serde(default = "default_entries")]
    pub number_days: u32,
}

fn default_entries() -> u32 {
    5
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    list: Vec<ForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    dt_txt: String,
    weather: Vec<WeatherDescription>,
    main: MainReadings,
    wind: Option<Wind>,
}

#[derive(Debug, Deserialize)]
struct WeatherDescription {
    description: String,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: f64,
}

/// Forecast for a city from OpenWeatherMap, metric units.
#[derive(Clone)]
pub struct WeatherForecast {
    client: Client,
    api_key: String,
}

impl WeatherForecast {
    pub fn new(api_key: impl Into<String>) -> Result<Self, HttpError> {
        Ok(Self {
            client: http::client()?,
            api_key: api_key.into(),
        })
    }

    fn summarize(forecast: &ForecastResponse) -> String {
        forecast
            .list
            .iter()
            .map(|entry| {
                let description = entry
                    .weather
                    .first()
                    .map(|w| w.description.as_str())
                    .unwrap_or("unknown");
                let mut line = format!(
                    "Date: {}, Weather: {description}, Temp: {}°C",
                    entry.dt_txt, entry.main.temp
                );
                if let Some(humidity) = entry.main.humidity {
                    line.push_str(&format!(", Humidity: {humidity}%"));
                }
                if let Some(wind) = &entry.wind {
                    line.push_str(&format!(", Wind Speed: {} m/s", wind.speed));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Tool for WeatherForecast {
    fn name(&self) -> &'static str {
        "get_weather_forecast"
    }

    fn definition(&self) -> ToolDefinition {
        definition_for::<ForecastArgs>(
            self.name(),
            "Fetch the 5-day weather forecast for a given city.",
        )
    }

    fn call(&self, args: Value) -> BoxFuture<'static, Result<String, ToolError>> {
        let this = self.clone();
        let args = parse_args::<ForecastArgs>(self.name(), args);
        Box::pin(async move {
            let args = args?;
            let count = args.number_days.to_string();
            let response = this
                .client
                .get(FORECAST_URL)
                .query(&[
                    ("q", args.city.as_str()),
                    ("appid", this.api_key.as_str()),
                    ("units", "metric"),
                    ("cnt", count.as_str()),
                ])
                .send()
                .await
                .map_err(HttpError::transport("openweathermap"))?;
            let forecast: ForecastResponse = http::decode_json("openweathermap", response).await?;
            Ok(Self::summarize(&forecast))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarizes_entries() {
        let forecast: ForecastResponse = serde_json::from_str(
            r#"{"cod": "200", "list": [
                {"dt_txt": "2025-03-01 12:00:00", "weather": [{"description": "light rain"}],
                 "main": {"temp": 7.5, "humidity": 81}, "wind": {"speed": 3.2}},
                {"dt_txt": "2025-03-01 15:00:00", "weather": [{"description": "clear sky"}],
                 "main": {"temp": 9.0}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            WeatherForecast::summarize(&forecast),
            "Date: 2025-03-01 12:00:00, Weather: light rain, Temp: 7.5°C, Humidity: 81%, Wind Speed: 3.2 m/s\n\
             Date: 2025-03-01 15:00:00, Weather: clear sky, Temp: 9°C"
        );
    }

    #[test]
    fn entries_default_to_five() {
        let args: ForecastArgs = serde_json::from_value(serde_json::json!({"city": "Berlin"})).unwrap();
        assert_eq!(args.number_days, 5);
    }
}

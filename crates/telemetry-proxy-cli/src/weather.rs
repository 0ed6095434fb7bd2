//! The sample weather service wrapped by `tproxy run`.

use std::fmt;

use serde::Serialize;

use telemetry_proxy::intercept;

/// Summaries from coldest to hottest.
pub const SUMMARIES: [&str; 10] = [
    "Freezing",
    "Bracing",
    "Chilly",
    "Cool",
    "Mild",
    "Warm",
    "Balmy",
    "Hot",
    "Sweltering",
    "Scorching",
];

/// No summary exists at the requested index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSummary(pub usize);

impl fmt::Display for UnknownSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no summary at index {}", self.0)
    }
}

impl std::error::Error for UnknownSummary {}

/// One day of forecast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Forecast {
    pub day: u8,
    pub temperature_c: i32,
    pub temperature_f: i32,
    pub summary: &'static str,
}

pub trait Weather: Send + Sync {
    fn summary(&self, index: usize) -> Result<&'static str, UnknownSummary>;
    fn forecast(&self, start_celsius: i32, days: u8) -> Vec<Forecast>;
    fn connect(&self, region: &str, access_key: &str) -> bool;
}

intercept! {
    impl Weather {
        fn summary(&self, index: usize) -> Result<&'static str, UnknownSummary>;
        fn forecast(&self, start_celsius: i32, days: u8) -> Vec<Forecast>;
        fn connect(&self, region: &str, access_key: &str) -> bool;
    }
}

#[derive(Debug, Default)]
pub struct WeatherService;

impl Weather for WeatherService {
    fn summary(&self, index: usize) -> Result<&'static str, UnknownSummary> {
        SUMMARIES.get(index).copied().ok_or(UnknownSummary(index))
    }

    fn forecast(&self, start_celsius: i32, days: u8) -> Vec<Forecast> {
        (0..days)
            .map(|day| {
                let temperature_c = start_celsius.saturating_add(i32::from(day) * 3);
                Forecast {
                    day,
                    temperature_c,
                    temperature_f: fahrenheit(temperature_c),
                    summary: summary_for(temperature_c),
                }
            })
            .collect()
    }

    fn connect(&self, region: &str, access_key: &str) -> bool {
        !region.is_empty() && !access_key.is_empty()
    }
}

fn fahrenheit(celsius: i32) -> i32 {
    celsius.saturating_mul(9) / 5 + 32
}

/// Map -20..=55 °C onto the summaries.
fn summary_for(celsius: i32) -> &'static str {
    let offset = (celsius.clamp(-20, 55) + 20) as usize;
    SUMMARIES[offset * (SUMMARIES.len() - 1) / 75]
}

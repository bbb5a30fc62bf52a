//! Chart payloads for the dashboard's Plotly graph

use serde::Serialize;
use serde_json::{Value, json};

use crate::core::RateSample;

const LINE_COLOR: &str = "#667eea";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub dates: Vec<String>,
    pub rates: Vec<f64>,
    pub min: f64,
    pub max: f64,
    pub current: f64,
}

impl ChartData {
    /// Summarizes a non-empty history. Returns `None` for an empty one.
    pub fn from_history(history: &[RateSample]) -> Option<Self> {
        let current = history.last()?.rate;
        let rates: Vec<f64> = history.iter().map(|s| s.rate).collect();
        let min = rates.iter().copied().fold(f64::INFINITY, f64::min);
        let max = rates.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(ChartData {
            dates: history
                .iter()
                .map(|s| s.date.format("%Y-%m-%d").to_string())
                .collect(),
            rates,
            min,
            max,
            current,
        })
    }

    /// Plotly figure with a single line trace.
    pub fn figure(&self, code: &str) -> Value {
        json!({
            "data": [{
                "type": "scatter",
                "x": self.dates,
                "y": self.rates,
                "mode": "lines+markers",
                "name": code,
                "line": { "color": LINE_COLOR, "width": 2 },
                "marker": { "size": 4 }
            }],
            "layout": {
                "title": { "text": format!("{code} to RUB") },
                "xaxis": { "title": { "text": "Date" } },
                "yaxis": { "title": { "text": "Rate (RUB)" } },
                "hovermode": "x unified",
                "height": 500,
                "showlegend": false
            }
        })
    }
}

use crate::quote::error::MarketDataError;
use bigdecimal::BigDecimal;
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetIcon {
    Uri(String),
    NoImage,
}

/// Normalized market snapshot for one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRecord {
    pub id: String,
    pub display_name: String,
    pub symbol: String,
    pub price_usd: BigDecimal,
    pub change_24h_pct: f64,
    pub icon: AssetIcon,
}

/// Parses a `/coins/markets` body.
///
/// The body must be a JSON array. Entries that can't be normalized are
/// dropped with a warning instead of failing the batch.
pub fn parse_markets(body: &str) -> Result<Vec<AssetRecord>, MarketDataError> {
    let json: Value = serde_json::from_str(body)?;

    // example entry
    // {"id":"bitcoin","symbol":"btc","name":"Bitcoin","image":"https://...","current_price":65761,"price_change_percentage_24h":1.88,...}
    let entries = match json {
        Value::Array(entries) => entries,
        other => {
            return Err(MarketDataError::MalformedResponse(format!(
                "expected an array of market entries, got {}",
                json_type_name(&other)
            )))
        }
    };

    let mut records = Vec::with_capacity(entries.len());
    for entry in &entries {
        match entry_to_record(entry) {
            Ok(record) => records.push(record),
            Err(reason) => warn!("Dropping market entry {}: {}", entry, reason),
        }
    }

    Ok(records)
}

fn entry_to_record(entry: &Value) -> Result<AssetRecord, &'static str> {
    let entry = entry.as_object().ok_or("entry is not an object")?;

    let id = entry
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or("missing `id`")?;
    let name = entry
        .get("name")
        .and_then(Value::as_str)
        .ok_or("missing `name`")?;
    let symbol = entry
        .get("symbol")
        .and_then(Value::as_str)
        .ok_or("missing `symbol`")?;

    let price_usd = entry
        .get("current_price")
        .and_then(Value::as_number)
        .ok_or("missing or non-numeric `current_price`")?;
    let price_usd =
        BigDecimal::from_str(price_usd.as_str()).map_err(|_| "unparseable `current_price`")?;

    let change_24h_pct = entry
        .get("price_change_percentage_24h")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    let icon = match entry.get("image").and_then(Value::as_str) {
        Some(uri) if !uri.trim().is_empty() => AssetIcon::Uri(uri.to_string()),
        _ => AssetIcon::NoImage,
    };

    Ok(AssetRecord {
        id: id.to_string(),
        display_name: name.to_string(),
        symbol: symbol.to_uppercase(),
        price_usd,
        change_24h_pct,
        icon,
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

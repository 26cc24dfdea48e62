use crate::quote::error::FailureKind;
use crate::quote::response::{AssetIcon, AssetRecord};
use crate::store::FetchState;
use bigdecimal::{BigDecimal, RoundingMode};

fn format_price_usd(price: &BigDecimal) -> String {
    format!("${}", price.with_scale_round(2, RoundingMode::HalfUp))
}

fn format_price_change(price_change: f64) -> String {
    // if price change >= 0, add a plus sign
    if price_change >= 0.0 {
        return format!("+{:.*}%", 2, price_change);
    }

    format!("{:.*}%", 2, price_change)
}

fn format_record(record: &AssetRecord) -> String {
    format!(
        "{:<8} {:<20} {:>14} {:>9}",
        record.symbol,
        record.display_name,
        format_price_usd(&record.price_usd),
        format_price_change(record.change_24h_pct)
    )
}

fn format_records(records: &[AssetRecord]) -> String {
    if records.is_empty() {
        return "Your watchlist is empty. Use `add <name or symbol>` to add a coin.".to_string();
    }

    records
        .iter()
        .map(format_record)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text view of a store state.
pub fn render_state(state: &FetchState) -> String {
    match state {
        FetchState::Idle => "Waiting for a watchlist...".to_string(),
        FetchState::Loading => "Loading prices...".to_string(),
        FetchState::Success(records) => format_records(records),
        FetchState::Failure {
            kind,
            message,
            stale_records,
        } => {
            let banner = match kind {
                FailureKind::RateLimitExceeded { last_wait_hint_ms } => format!(
                    "{} Wait about {}s, then type `reload` to retry.",
                    message,
                    last_wait_hint_ms.div_ceil(1000)
                ),
                _ => format!("{} Type `reload` to retry.", message),
            };
            match stale_records {
                Some(records) if !records.is_empty() => {
                    format!("{}\nShowing last known prices:\n{}", banner, format_records(records))
                }
                _ => banner,
            }
        }
    }
}

/// Per-asset id and icon for whatever records the state holds.
pub fn render_details(state: &FetchState) -> String {
    let records = match state {
        FetchState::Success(records) => records,
        FetchState::Failure {
            stale_records: Some(records),
            ..
        } => records,
        _ => return render_state(state),
    };

    records
        .iter()
        .map(|record| match record.icon {
            AssetIcon::Uri(ref uri) => format!("{:<8} {:<24} {}", record.symbol, record.id, uri),
            AssetIcon::NoImage => format!("{:<8} {:<24} (no image)", record.symbol, record.id),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

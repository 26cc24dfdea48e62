pub const VS_CURRENCY: &str = "usd";

/// Provider ceiling for `per_page` on `/coins/markets`.
pub const MAX_BATCH_SIZE: usize = 100;

/// One batched `/coins/markets` request covering every id in `ids`.
pub fn markets_url(base_url: &str, ids: &[String]) -> String {
    let joined_ids = ids
        .iter()
        .map(|id| urlencoding::encode(id).into_owned())
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "{}/coins/markets?vs_currency={}&ids={}&order=market_cap_desc&per_page={}&page=1&sparkline=false&price_change_percentage=24h",
        base_url.trim_end_matches('/'),
        VS_CURRENCY,
        joined_ids,
        MAX_BATCH_SIZE
    )
}

pub fn search_url(base_url: &str, query: &str) -> String {
    format!(
        "{}/search?query={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(query)
    )
}

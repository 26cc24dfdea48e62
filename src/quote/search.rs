use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

/// `/search` body; only the coin section is read.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub coins: Vec<SearchHit>,
}

/// Exact symbol match wins over exact name match, both case-insensitive.
pub fn find_best_match<'a>(hits: &'a [SearchHit], query: &str) -> Option<&'a SearchHit> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }

    hits.iter()
        .find(|hit| hit.symbol.to_lowercase() == query)
        .or_else(|| hits.iter().find(|hit| hit.name.to_lowercase() == query))
}

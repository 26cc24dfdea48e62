use std::env;
use std::io::Result;
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::instrument;
use tracing::warn;

mod command;
mod config;
mod display;
mod quote;
mod store;
mod watchlist;

use crate::command::{Command, HELP};
use crate::config::Config;
use crate::display::{render_details, render_state};
use crate::quote::client::MarketDataClient;
use crate::quote::search::find_best_match;
use crate::quote::transport::{HttpTransport, ReqwestTransport};
use crate::store::MarketDataStore;
use crate::watchlist::{FileKeyValueStore, KeyValueStore, Watchlist};

const DEFAULT_CONFIG_PATH: &str = "app_config.json";

async fn read_config(file_path: &str) -> Result<Config> {
    let config_string = fs::read_to_string(file_path).await?;
    let config: Config = serde_json::from_str(config_string.as_str())?;
    Ok(config)
}

/// Looks `query` up by symbol or name and appends the match to the watchlist.
#[instrument(skip(client, watchlist, store))]
async fn add_to_watchlist<T: HttpTransport, S: KeyValueStore>(
    query: &str,
    client: &MarketDataClient<T>,
    watchlist: &Watchlist<S>,
    store: &MarketDataStore,
) {
    let hits = match client.search(query).await {
        Ok(hits) => hits,
        Err(e) => {
            warn!("Search for {} failed: {}", query, e);
            println!("Could not search for \"{}\": {}", query, e.user_message());
            return;
        }
    };

    let Some(hit) = find_best_match(&hits, query) else {
        println!(
            "Could not find \"{}\". Please check the symbol or name and try again.",
            query
        );
        return;
    };

    match watchlist.add(&hit.id).await {
        Ok(false) => println!("{} is already in your list.", hit.name),
        Ok(true) => {
            println!("Added {} ({}).", hit.name, hit.symbol.to_uppercase());
            refresh_from_watchlist(watchlist, store).await;
        }
        Err(e) => {
            error!("Error saving watchlist: {}", e);
            println!("Could not save. Try again.");
        }
    }
}

async fn remove_from_watchlist<S: KeyValueStore>(
    id: &str,
    watchlist: &Watchlist<S>,
    store: &MarketDataStore,
) {
    match watchlist.remove(id).await {
        Ok(false) => println!("{} is not in your list.", id),
        Ok(true) => {
            println!("Removed {}.", id);
            refresh_from_watchlist(watchlist, store).await;
        }
        Err(e) => {
            error!("Error saving watchlist: {}", e);
            println!("Could not save. Try again.");
        }
    }
}

async fn refresh_from_watchlist<S: KeyValueStore>(
    watchlist: &Watchlist<S>,
    store: &MarketDataStore,
) {
    match watchlist.ids().await {
        Ok(ids) => {
            store.set_identifiers(ids);
        }
        Err(e) => {
            warn!("Error reading watchlist: {}", e);
            println!("Could not read your watchlist: {}", e);
        }
    }
}

#[tokio::main]
async fn main() {
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = read_config(&config_path).await;

    tracing_subscriber::fmt()
        .with_max_level(
            config
                .as_ref()
                .map(Config::log_level)
                .unwrap_or(tracing::Level::INFO),
        )
        .init();

    let config = match config {
        Ok(config) => config,
        Err(error) => {
            error!("Error reading config file {}: {}", config_path, error);
            return;
        }
    };

    let transport = ReqwestTransport::new(&config.coingecko_api_key, config.request_timeout());
    let transport = match transport {
        Ok(transport) => transport,
        Err(error) => {
            error!("Error creating HTTP client: {}", error);
            return;
        }
    };

    let client = Arc::new(
        MarketDataClient::new(transport, &config.api_base_url)
            .with_retry_policy(config.retry_policy())
            .with_batch_size(config.batch_size),
    );
    let watchlist = Watchlist::new(
        FileKeyValueStore::new(&config.watchlist_path),
        &config.watchlist_key,
    );
    let store = MarketDataStore::new(client.clone());

    let mut state_receiver = store.subscribe();
    tokio::spawn(async move {
        while state_receiver.changed().await.is_ok() {
            let state = state_receiver.borrow_and_update().clone();
            println!("{}\n", render_state(&state));
        }
    });

    refresh_from_watchlist(&watchlist, &store).await;
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = signal::ctrl_c() => {
                info!("Ctrl+C pressed. Stopping...");
                break;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("stdin closed, stopping");
                break;
            }
            Err(e) => {
                error!("Error reading stdin: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match Command::parse(&line) {
            Ok(Command::Reload) | Ok(Command::Focus) => store.reload(),
            Ok(Command::Add(query)) => {
                add_to_watchlist(&query, client.as_ref(), &watchlist, &store).await
            }
            Ok(Command::Remove(id)) => remove_from_watchlist(&id, &watchlist, &store).await,
            Ok(Command::List) => {
                println!("watchlist: {}", store.identifiers().join(", "));
                println!("{}\n", render_details(&store.current_state()));
            }
            Ok(Command::Help) => println!("{}", HELP),
            Ok(Command::Quit) => break,
            Err(e) => println!("{}. {}", e, HELP),
        }
    }

    info!("Bye.");
}

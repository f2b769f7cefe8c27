use std::collections::HashMap;
use std::sync::Arc;
use std::time::{ Duration, SystemTime };
use tokio::sync::RwLock;
use serde::{ Deserialize, Serialize };
use crate::error::{ AppError, Result };

const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";
const CACHE_DURATION_SECS: u64 = 60; // Cache prices for 1 minute
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinQuote {
    pub id: String,
    pub symbol: String,
    pub usd_price: f64,
    pub image_url: Option<String>,
    pub last_updated: SystemTime,
}

#[derive(Debug, Clone)]
struct CachedQuote {
    quote: CoinQuote,
    fetched_at: SystemTime,
}

pub struct PriceService {
    client: reqwest::Client,
    base_url: String,
    cache: Arc<RwLock<HashMap<String, CachedQuote>>>,
}

#[derive(Deserialize)]
struct CoinGeckoCoin {
    id: String,
    symbol: String,
    #[serde(default)]
    image: Option<CoinGeckoImage>,
    market_data: CoinGeckoMarketData,
}

#[derive(Deserialize)]
struct CoinGeckoImage {
    large: Option<String>,
}

#[derive(Deserialize)]
struct CoinGeckoMarketData {
    current_price: HashMap<String, f64>,
}

impl CoinGeckoCoin {
    fn into_quote(self) -> Result<CoinQuote> {
        let usd_price = self.market_data.current_price
            .get("usd")
            .copied()
            .ok_or_else(|| AppError::External(format!("No USD price for {}", self.id)))?;

        Ok(CoinQuote {
            id: self.id,
            symbol: self.symbol,
            usd_price,
            image_url: self.image.and_then(|image| image.large),
            last_updated: SystemTime::now(),
        })
    }
}

impl PriceService {
    pub fn new() -> Result<Self> {
        Self::with_base_url(COINGECKO_API_BASE)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::Client
            ::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Get the USD price of a coin by name, ticker or CoinGecko id
    /// ("btc", "Bitcoin", "ethereum", ...).
    pub async fn get_price(&self, query: &str) -> Result<CoinQuote> {
        let coin_id = resolve_coin_id(query).ok_or_else(||
            AppError::InvalidInput("Please specify a cryptocurrency".to_string())
        )?;

        // Check cache first
        if let Some(cached) = self.get_from_cache(&coin_id).await {
            return Ok(cached);
        }

        let quote = self.fetch_coin(&coin_id).await?;

        self.update_cache(coin_id, quote.clone()).await;

        Ok(quote)
    }

    async fn get_from_cache(&self, coin_id: &str) -> Option<CoinQuote> {
        let cache = self.cache.read().await;
        if let Some(cached) = cache.get(coin_id) {
            let age = SystemTime::now()
                .duration_since(cached.fetched_at)
                .unwrap_or(Duration::from_secs(999));

            if age.as_secs() < CACHE_DURATION_SECS {
                return Some(cached.quote.clone());
            }
        }
        None
    }

    async fn update_cache(&self, coin_id: String, quote: CoinQuote) {
        let mut cache = self.cache.write().await;
        cache.insert(coin_id, CachedQuote {
            quote,
            fetched_at: SystemTime::now(),
        });
    }

    async fn fetch_coin(&self, coin_id: &str) -> Result<CoinQuote> {
        let url = format!(
            "{}/coins/{}?localization=false&tickers=false&community_data=false&developer_data=false",
            self.base_url,
            urlencoding::encode(coin_id)
        );

        let response = self.client
            .get(&url)
            .send().await
            .map_err(|e| AppError::External(format!("CoinGecko API error: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Unknown coin: {}", coin_id)));
        }

        if !response.status().is_success() {
            return Err(
                AppError::External(format!("CoinGecko API returned status: {}", response.status()))
            );
        }

        let coin: CoinGeckoCoin = response
            .json().await
            .map_err(|e| AppError::External(format!("Failed to parse CoinGecko response: {}", e)))?;

        coin.into_quote()
    }
}

/// Map user input to a CoinGecko coin id. Common tickers are expanded,
/// anything else is lowercased and passed through.
pub fn resolve_coin_id(query: &str) -> Option<String> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }

    let id = match query.as_str() {
        "btc" => "bitcoin",
        "eth" => "ethereum",
        "sol" => "solana",
        "bnb" => "binancecoin",
        "usdt" => "tether",
        "usdc" => "usd-coin",
        "xrp" => "ripple",
        "ada" => "cardano",
        "doge" => "dogecoin",
        "matic" | "pol" => "polygon-ecosystem-token",
        "avax" => "avalanche-2",
        "dot" => "polkadot",
        "link" => "chainlink",
        "ton" => "the-open-network",
        other => other,
    };
    Some(id.to_string())
}

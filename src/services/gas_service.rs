use std::time::Duration;

use serde::{ Deserialize, Serialize };

use crate::error::{ AppError, Result };

const ETHERSCAN_API_BASE: &str = "https://api.etherscan.io/v2/api";
const ETHEREUM_MAINNET_CHAIN_ID: u64 = 1;

/// Current Ethereum gas prices in Gwei, as reported by the Etherscan oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasPrices {
    #[serde(rename = "SafeGasPrice")]
    pub safe: String,
    #[serde(rename = "ProposeGasPrice")]
    pub propose: String,
    #[serde(rename = "FastGasPrice")]
    pub fast: String,
}

// On failure Etherscan puts an error string in `result` instead of an object
#[derive(Deserialize)]
struct GasOracleResponse {
    status: String,
    message: String,
    result: serde_json::Value,
}

impl GasOracleResponse {
    fn into_gas_prices(self) -> Result<GasPrices> {
        if self.status != "1" {
            let detail = match &self.result {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            // Almost always a missing or rejected API key
            return Err(
                AppError::Config(format!("Etherscan returned an error: {} ({})", self.message, detail))
            );
        }

        serde_json
            ::from_value(self.result)
            .map_err(|e| AppError::External(format!("Failed to parse gas oracle result: {}", e)))
    }
}

pub struct GasService {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl GasService {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client
            ::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, api_key })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn get_gas_prices(&self) -> Result<GasPrices> {
        let api_key = self.api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("ETHERSCAN_API_KEY not set".to_string()))?;

        let url = format!(
            "{}?chainid={}&module=gastracker&action=gasoracle&apikey={}",
            ETHERSCAN_API_BASE,
            ETHEREUM_MAINNET_CHAIN_ID,
            urlencoding::encode(api_key)
        );

        let response = self.client
            .get(&url)
            .send().await
            .map_err(|e| AppError::External(format!("Etherscan API error: {}", e)))?;

        if !response.status().is_success() {
            return Err(
                AppError::External(format!("Etherscan API returned status: {}", response.status()))
            );
        }

        let oracle: GasOracleResponse = response
            .json().await
            .map_err(|e| AppError::External(format!("Failed to parse Etherscan response: {}", e)))?;

        oracle.into_gas_prices()
    }
}

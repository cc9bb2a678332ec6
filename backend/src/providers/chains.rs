use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::config::ChainDatasetSettings;
use crate::http::{FetchError, HttpClient, HttpRequest};
use crate::types::{NativeCurrency, Testnet};

const TESTNET_MARKERS: [&str; 8] = ["testnet", "sepolia", "goerli", "holesky", "fuji", "mumbai", "amoy", "devnet"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChainEntry {
    name: String,
    chain_id: u64,
    #[serde(default)]
    rpc: Vec<String>,
    #[serde(default)]
    explorers: Vec<ChainExplorer>,
    native_currency: Option<NativeCurrency>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChainExplorer {
    url: String,
}

/// RPC endpoints that only work after substituting a project key.
fn needs_api_key(rpc: &str) -> bool {
    rpc.contains("${") || rpc.contains("API_KEY") || rpc.contains("YOUR-PROJECT-ID")
}

fn is_test_network(entry: &ChainEntry) -> bool {
    let name = entry.name.to_lowercase();
    entry.status.as_deref() != Some("deprecated") && TESTNET_MARKERS.iter().any(|m| name.contains(m))
}

fn usable_rpcs(rpc: Vec<String>) -> Vec<String> {
    rpc.into_iter().filter(|url| !needs_api_key(url)).collect()
}

/// Test networks from the public chain-metadata dataset.
pub struct ChainRegistry {
    http: HttpClient,
    settings: ChainDatasetSettings,
}

impl ChainRegistry {
    pub fn new(http: HttpClient, settings: ChainDatasetSettings) -> Self {
        Self { http, settings }
    }

    pub async fn try_list_testnets(&self) -> Result<Vec<Testnet>, FetchError> {
        let request = HttpRequest::get(&self.settings.dataset_url)
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(self.settings.timeout_seconds));
        let entries: Vec<ChainEntry> = self.http.get_json(request).await?;

        Ok(entries
            .into_iter()
            .filter(is_test_network)
            .filter_map(|entry| {
                let rpc = usable_rpcs(entry.rpc);
                if rpc.is_empty() {
                    return None;
                }
                Some(Testnet {
                    id: format!("testnet-{}", entry.chain_id),
                    name: entry.name,
                    chain_id: entry.chain_id,
                    rpc,
                    explorers: entry.explorers.into_iter().map(|e| e.url).collect(),
                    testnet: true,
                    native_currency: entry.native_currency,
                })
            })
            .take(self.settings.max_entries)
            .collect())
    }

    /// Dataset testnets, or the built-in list when the dataset is unreachable or empty.
    #[instrument(skip(self))]
    pub async fn list_testnets(&self) -> Vec<Testnet> {
        match self.try_list_testnets().await {
            Ok(testnets) if !testnets.is_empty() => {
                info!("Loaded {} testnets from chain dataset", testnets.len());
                testnets
            }
            Ok(_) => {
                warn!("Chain dataset contained no usable testnets, using built-in list");
                known_testnets()
            }
            Err(e) => {
                warn!("Chain dataset unavailable ({}), using built-in list", e);
                known_testnets()
            }
        }
    }
}

fn testnet(chain_id: u64, name: &str, rpc: &[&str], explorer: &str, currency: (&str, &str)) -> Testnet {
    Testnet {
        id: format!("testnet-{}", chain_id),
        name: name.to_string(),
        chain_id,
        rpc: usable_rpcs(rpc.iter().map(|s| s.to_string()).collect()),
        explorers: vec![explorer.to_string()],
        testnet: true,
        native_currency: Some(NativeCurrency {
            name: currency.0.to_string(),
            symbol: currency.1.to_string(),
            decimals: 18,
        }),
    }
}

pub fn known_testnets() -> Vec<Testnet> {
    vec![
        testnet(
            11155111,
            "Sepolia",
            &[
                "https://rpc.sepolia.org",
                "https://sepolia.infura.io/v3/YOUR-PROJECT-ID",
                "https://ethereum-sepolia-rpc.publicnode.com",
            ],
            "https://sepolia.etherscan.io",
            ("Sepolia Ether", "ETH"),
        ),
        testnet(
            80001,
            "Mumbai (Polygon)",
            &[
                "https://matic-mumbai.chainstacklabs.com",
                "https://rpc-mumbai.maticvigil.com",
                "https://polygon-mumbai-bor.publicnode.com",
            ],
            "https://mumbai.polygonscan.com",
            ("MATIC", "MATIC"),
        ),
        testnet(
            97,
            "BSC Testnet",
            &["https://data-seed-prebsc-1-s1.binance.org:8545", "https://bsc-testnet-rpc.publicnode.com"],
            "https://testnet.bscscan.com",
            ("BNB", "BNB"),
        ),
        testnet(
            43113,
            "Avalanche Fuji",
            &["https://api.avax-test.network/ext/bc/C/rpc", "https://avalanche-fuji-c-chain-rpc.publicnode.com"],
            "https://testnet.snowtrace.io",
            ("AVAX", "AVAX"),
        ),
        testnet(
            421613,
            "Arbitrum Goerli",
            &["https://goerli-rollup.arbitrum.io/rpc", "https://arbitrum-goerli-rpc.publicnode.com"],
            "https://goerli.arbiscan.io",
            ("Ether", "ETH"),
        ),
        testnet(
            84531,
            "Base Goerli",
            &["https://goerli.base.org", "https://base-goerli-rpc.publicnode.com"],
            "https://goerli.basescan.org",
            ("Ether", "ETH"),
        ),
        testnet(
            4002,
            "Fantom Testnet",
            &["https://rpc.testnet.fantom.network", "https://fantom-testnet-rpc.publicnode.com"],
            "https://testnet.ftmscan.com",
            ("Fantom", "FTM"),
        ),
        testnet(
            280,
            "zkSync Era Testnet",
            &["https://testnet.era.zksync.dev"],
            "https://goerli.explorer.zksync.io",
            ("Ether", "ETH"),
        ),
        testnet(
            1442,
            "Polygon zkEVM Testnet",
            &["https://rpc.public.zkevm-test.net"],
            "https://testnet-zkevm.polygonscan.com",
            ("Ether", "ETH"),
        ),
        testnet(
            534353,
            "Scroll Testnet",
            &["https://alpha-rpc.scroll.io/l2"],
            "https://blockscout.scroll.io",
            ("Ether", "ETH"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{StubReply, StubTransport};
    use std::sync::Arc;

    const DATASET: &str = r#"[
        {"name":"Ethereum Mainnet","chainId":1,"rpc":["https://eth.llamarpc.com"],
         "nativeCurrency":{"name":"Ether","symbol":"ETH","decimals":18}},
        {"name":"Sepolia","chainId":11155111,
         "rpc":["https://sepolia.infura.io/v3/${INFURA_API_KEY}","https://rpc.sepolia.org"],
         "explorers":[{"name":"etherscan","url":"https://sepolia.etherscan.io","standard":"EIP3091"}],
         "nativeCurrency":{"name":"Sepolia Ether","symbol":"ETH","decimals":18}},
        {"name":"Keyed Testnet","chainId":999,"rpc":["https://x.io/${API_KEY}"]},
        {"name":"Ropsten Testnet","chainId":3,"rpc":["https://ropsten.io"],"status":"deprecated"}
    ]"#;

    fn registry(stub: Arc<StubTransport>) -> ChainRegistry {
        ChainRegistry::new(
            HttpClient::new(stub),
            ChainDatasetSettings {
                dataset_url: "https://chains.test/chains.json".to_string(),
                ..ChainDatasetSettings::default()
            },
        )
    }

    #[tokio::test]
    async fn test_dataset_keeps_usable_testnets() {
        let stub = Arc::new(StubTransport::new().on("chains.test", StubReply::json(DATASET)));

        let testnets = registry(stub).list_testnets().await;

        assert_eq!(testnets.len(), 1);
        let sepolia = &testnets[0];
        assert_eq!(sepolia.id, "testnet-11155111");
        assert_eq!(sepolia.rpc, vec!["https://rpc.sepolia.org".to_string()]);
        assert_eq!(sepolia.explorers, vec!["https://sepolia.etherscan.io".to_string()]);
        assert!(sepolia.testnet);
    }

    #[tokio::test]
    async fn test_unreachable_dataset_uses_builtin_list() {
        let stub = Arc::new(StubTransport::new().on("chains.test", StubReply::Timeout));

        let testnets = registry(stub).list_testnets().await;

        assert_eq!(testnets.len(), 10);
        assert!(testnets.iter().all(|t| t.testnet && !t.rpc.is_empty()));
        assert!(testnets[0].rpc.iter().all(|r| !needs_api_key(r)));
    }
}

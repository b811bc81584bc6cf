//! Full node RPC client.
//!
//! Speaks the ledger's JSON dialect over HTTPS: hex strings with a `0x`
//! prefix for ids and programs, one POST endpoint per query. The DTO types
//! below own that wire shape; `chia-protocol` types appear only at the
//! conversion boundary. No retries and no internal timeouts beyond the
//! HTTP client's own; connectivity problems surface immediately.

use chia_protocol::{Bytes32, Coin, CoinSpend, Program, SpendBundle};
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ledger::client::Ledger;
use crate::ledger::types::CoinRecord;

pub struct FullNodeRpc {
    client: reqwest::Client,
    base_url: String,
}

impl FullNodeRpc {
    /// Build a client from the configuration. When cert and key paths are
    /// both present they become the mutual-TLS identity the node expects;
    /// the node's own self-signed certificate is accepted either way.
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder().danger_accept_invalid_certs(true);
        if let (Some(cert), Some(key)) = (&config.cert_file, &config.key_file) {
            let cert_pem = std::fs::read(cert)
                .map_err(|e| Error::Config(format!("cannot read {}: {e}", cert.display())))?;
            let key_pem = std::fs::read(key)
                .map_err(|e| Error::Config(format!("cannot read {}: {e}", key.display())))?;
            let identity = reqwest::Identity::from_pkcs8_pem(&cert_pem, &key_pem)
                .map_err(|e| Error::Config(format!("bad TLS identity: {e}")))?;
            builder = builder.identity(identity);
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            base_url: format!("https://{}:{}", config.full_node_host, config.full_node_port),
        })
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, endpoint: &str, body: &B) -> Result<R> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("POST {url}");
        let response = self.client.post(&url).json(body).send().await?;
        Ok(response.json().await?)
    }
}

impl Ledger for FullNodeRpc {
    async fn coin_record(&self, coin_id: Bytes32) -> Result<Option<CoinRecord>> {
        let resp: CoinRecordResponse = self
            .post("get_coin_record_by_name", &ByNameRequest { name: hex0x(coin_id.as_ref()) })
            .await?;
        match resp.coin_record {
            Some(record) if resp.success => Ok(Some(record.try_into()?)),
            _ => Ok(None),
        }
    }

    async fn coin_records_by_parent(&self, parent_id: Bytes32) -> Result<Vec<CoinRecord>> {
        let resp: CoinRecordsResponse = self
            .post(
                "get_coin_records_by_parent_ids",
                &ByParentRequest {
                    parent_ids: vec![hex0x(parent_id.as_ref())],
                    include_spent_coins: true,
                },
            )
            .await?;
        collect_records(resp)
    }

    async fn unspent_coin_records_by_puzzle_hash(
        &self,
        puzzle_hash: Bytes32,
    ) -> Result<Vec<CoinRecord>> {
        let resp: CoinRecordsResponse = self
            .post(
                "get_coin_records_by_puzzle_hash",
                &ByPuzzleHashRequest {
                    puzzle_hash: hex0x(puzzle_hash.as_ref()),
                    include_spent_coins: false,
                },
            )
            .await?;
        collect_records(resp)
    }

    async fn puzzle_and_solution(&self, coin_id: Bytes32, height: u32) -> Result<CoinSpend> {
        let resp: PuzzleSolutionResponse = self
            .post(
                "get_puzzle_and_solution",
                &PuzzleSolutionRequest { coin_id: hex0x(coin_id.as_ref()), height },
            )
            .await?;
        if !resp.success {
            return Err(Error::Protocol(
                resp.error.unwrap_or_else(|| "get_puzzle_and_solution failed".to_string()),
            ));
        }
        resp.coin_solution
            .ok_or_else(|| Error::Protocol("missing coin_solution in response".to_string()))?
            .try_into()
    }

    async fn push_tx(&self, bundle: &SpendBundle) -> Result<bool> {
        let resp: PushTxResponse = self
            .post("push_tx", &PushTxRequest { spend_bundle: RpcSpendBundle::from(bundle) })
            .await?;
        if let Some(error) = &resp.error {
            debug!("push_tx declined: {error}");
        }
        Ok(resp.success)
    }
}

fn collect_records(resp: CoinRecordsResponse) -> Result<Vec<CoinRecord>> {
    if !resp.success {
        return Err(Error::Protocol(
            resp.error.unwrap_or_else(|| "coin record query failed".to_string()),
        ));
    }
    resp.coin_records.unwrap_or_default().into_iter().map(TryInto::try_into).collect()
}

#[derive(Serialize)]
struct ByNameRequest {
    name: String,
}

#[derive(Serialize)]
struct ByParentRequest {
    parent_ids: Vec<String>,
    include_spent_coins: bool,
}

#[derive(Serialize)]
struct ByPuzzleHashRequest {
    puzzle_hash: String,
    include_spent_coins: bool,
}

#[derive(Serialize)]
struct PuzzleSolutionRequest {
    coin_id: String,
    height: u32,
}

#[derive(Serialize)]
struct PushTxRequest {
    spend_bundle: RpcSpendBundle,
}

#[derive(Deserialize)]
struct CoinRecordResponse {
    success: bool,
    coin_record: Option<RpcCoinRecord>,
}

#[derive(Deserialize)]
struct CoinRecordsResponse {
    success: bool,
    error: Option<String>,
    coin_records: Option<Vec<RpcCoinRecord>>,
}

#[derive(Deserialize)]
struct PuzzleSolutionResponse {
    success: bool,
    error: Option<String>,
    coin_solution: Option<RpcCoinSpend>,
}

#[derive(Deserialize)]
struct PushTxResponse {
    success: bool,
    error: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct RpcCoin {
    parent_coin_info: String,
    puzzle_hash: String,
    amount: u64,
}

#[derive(Deserialize)]
struct RpcCoinRecord {
    coin: RpcCoin,
    confirmed_block_index: u32,
    spent_block_index: u32,
    /// Older nodes report this flag; newer ones imply it from the height.
    spent: Option<bool>,
    #[serde(default)]
    coinbase: bool,
    #[serde(default)]
    timestamp: u64,
}

#[derive(Serialize, Deserialize)]
struct RpcCoinSpend {
    coin: RpcCoin,
    puzzle_reveal: String,
    solution: String,
}

#[derive(Serialize)]
struct RpcSpendBundle {
    coin_spends: Vec<RpcCoinSpend>,
    aggregated_signature: String,
}

fn hex0x(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn parse_hex(s: &str) -> Result<Vec<u8>> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
        .map_err(|e| Error::Protocol(format!("bad hex in response: {e}")))
}

fn parse_bytes32(s: &str) -> Result<Bytes32> {
    let raw = parse_hex(s)?;
    let arr: [u8; 32] = raw
        .try_into()
        .map_err(|_| Error::Protocol(format!("expected 32 byte value, got {s:?}")))?;
    Ok(Bytes32::new(arr))
}

impl TryFrom<RpcCoin> for Coin {
    type Error = Error;

    fn try_from(value: RpcCoin) -> Result<Coin> {
        Ok(Coin {
            parent_coin_info: parse_bytes32(&value.parent_coin_info)?,
            puzzle_hash: parse_bytes32(&value.puzzle_hash)?,
            amount: value.amount,
        })
    }
}

impl From<&Coin> for RpcCoin {
    fn from(coin: &Coin) -> Self {
        Self {
            parent_coin_info: hex0x(coin.parent_coin_info.as_ref()),
            puzzle_hash: hex0x(coin.puzzle_hash.as_ref()),
            amount: coin.amount,
        }
    }
}

impl TryFrom<RpcCoinRecord> for CoinRecord {
    type Error = Error;

    fn try_from(value: RpcCoinRecord) -> Result<CoinRecord> {
        let spent = value.spent.unwrap_or(value.spent_block_index > 0);
        Ok(CoinRecord {
            coin: value.coin.try_into()?,
            confirmed_block_index: value.confirmed_block_index,
            spent_block_index: value.spent_block_index,
            spent,
            coinbase: value.coinbase,
            timestamp: value.timestamp,
        })
    }
}

impl TryFrom<RpcCoinSpend> for CoinSpend {
    type Error = Error;

    fn try_from(value: RpcCoinSpend) -> Result<CoinSpend> {
        Ok(CoinSpend {
            coin: value.coin.try_into()?,
            puzzle_reveal: Program::from(parse_hex(&value.puzzle_reveal)?),
            solution: Program::from(parse_hex(&value.solution)?),
        })
    }
}

impl From<&SpendBundle> for RpcSpendBundle {
    fn from(bundle: &SpendBundle) -> Self {
        Self {
            coin_spends: bundle
                .coin_spends
                .iter()
                .map(|spend| RpcCoinSpend {
                    coin: RpcCoin::from(&spend.coin),
                    puzzle_reveal: hex0x(spend.puzzle_reveal.as_ref()),
                    solution: hex0x(spend.solution.as_ref()),
                })
                .collect(),
            aggregated_signature: hex0x(&bundle.aggregated_signature.to_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chia_bls::Signature;

    #[test]
    fn test_coin_record_response_parses() {
        let raw = r#"{
            "success": true,
            "coin_record": {
                "coin": {
                    "parent_coin_info": "0x0101010101010101010101010101010101010101010101010101010101010101",
                    "puzzle_hash": "0x0202020202020202020202020202020202020202020202020202020202020202",
                    "amount": 1
                },
                "confirmed_block_index": 10,
                "spent_block_index": 12,
                "spent": true,
                "coinbase": false,
                "timestamp": 1700000000
            }
        }"#;
        let resp: CoinRecordResponse = serde_json::from_str(raw).unwrap();
        let record: CoinRecord = resp.coin_record.unwrap().try_into().unwrap();
        assert!(record.spent);
        assert_eq!(record.coin.amount, 1);
        assert_eq!(record.coin.parent_coin_info, Bytes32::new([1u8; 32]));
    }

    #[test]
    fn test_spent_flag_implied_by_height() {
        let raw = r#"{
            "coin": {
                "parent_coin_info": "0x0101010101010101010101010101010101010101010101010101010101010101",
                "puzzle_hash": "0x0202020202020202020202020202020202020202020202020202020202020202",
                "amount": 5
            },
            "confirmed_block_index": 3,
            "spent_block_index": 7
        }"#;
        let record: CoinRecord =
            serde_json::from_str::<RpcCoinRecord>(raw).unwrap().try_into().unwrap();
        assert!(record.spent);
    }

    #[test]
    fn test_bad_hex_is_protocol_error() {
        assert!(matches!(parse_bytes32("0xzz"), Err(Error::Protocol(_))));
        assert!(matches!(parse_bytes32("0x00"), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_bundle_wire_shape() {
        let bundle = SpendBundle {
            coin_spends: vec![CoinSpend {
                coin: Coin {
                    parent_coin_info: Bytes32::new([1u8; 32]),
                    puzzle_hash: Bytes32::new([2u8; 32]),
                    amount: 1,
                },
                puzzle_reveal: Program::from(vec![0x80]),
                solution: Program::from(vec![0x80]),
            }],
            aggregated_signature: Signature::default(),
        };
        let rpc = RpcSpendBundle::from(&bundle);
        assert!(rpc.aggregated_signature.starts_with("0x"));
        assert_eq!(rpc.coin_spends[0].puzzle_reveal, "0x80");
        let json = serde_json::to_string(&PushTxRequest { spend_bundle: rpc }).unwrap();
        assert!(json.contains("\"spend_bundle\""));
        assert!(json.contains("\"coin_spends\""));
    }
}

use std::{
    fmt,
    str::FromStr,
    time::Duration,
};

use alloy::{
    primitives::{
        Address,
        U256,
    },
    sol_types::SolCall,
};
use serde::Serialize;
use serde_json::{
    Value,
    json,
};
use tracing::debug;

use crate::{
    contest_types::MusicContest,
    provider::{
        ChainAdapter,
        ProviderError,
    },
};

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const RECEIPT_POLL_ATTEMPTS: u32 = 90;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("contract response could not be decoded: {0}")]
    Decode(String),
    #[error("transaction {0} reverted on chain")]
    Reverted(String),
    #[error("transaction {0} was not confirmed in time")]
    ConfirmationTimeout(String),
}

/// Amount in the chain's smallest currency unit. Stored as the full-width
/// integer; serialized and displayed as its decimal string so it survives
/// transports without 256-bit integer support.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Wei(pub U256);

impl Wei {
    pub const ZERO: Wei = Wei(U256::ZERO);

    /// Render-time conversion into whole native units with three fraction
    /// digits, rounded. Never mutates the stored integer.
    pub fn format_units(&self, decimals: u8) -> String {
        let unit = U256::from(10).pow(U256::from(decimals));
        let thousand = U256::from(1000);
        let scaled = match self.0.checked_mul(thousand) {
            Some(milli) => (milli + unit / U256::from(2)) / unit,
            // Out of display range; drop the fraction rather than overflow.
            None => (self.0 / unit) * thousand,
        };
        let whole = scaled / thousand;
        let frac = scaled % thousand;
        format!("{whole}.{frac:03}")
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // U256 displays in base 10.
        write!(f, "{}", self.0)
    }
}

impl FromStr for Wei {
    type Err = alloy::primitives::ruint::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_str_radix(s, 10).map(Wei)
    }
}

impl Serialize for Wei {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<U256> for Wei {
    fn from(value: U256) -> Self {
        Wei(value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub submitter: String,
    pub music_url: String,
    pub theme: String,
}

/// Point-in-time read of the open contest; never cached across polls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContestSnapshot {
    pub submissions: Vec<Submission>,
    pub total_votes: u64,
    pub total_funds: Wei,
    pub started_at: u64,
    pub voters: Vec<String>,
}

impl ContestSnapshot {
    pub fn has_voted(&self, account: &str) -> bool {
        self.voters
            .iter()
            .any(|voter| voter.eq_ignore_ascii_case(account))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WinnerRecord {
    pub submitter: String,
    pub music_url: String,
    pub theme: String,
    pub prompt: String,
    pub votes: u64,
    pub payout: Wei,
    pub timestamp: u64,
    pub voter_share: Wei,
}

/// One finished contest, derived by grouping winner records that share
/// (theme, timestamp, voter share). Derived on every read, never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContestResult {
    pub theme: String,
    pub timestamp: u64,
    pub voter_share: Wei,
    pub winners: Vec<WinnerRecord>,
}

pub fn group_winners(records: Vec<WinnerRecord>) -> Vec<ContestResult> {
    let mut results: Vec<ContestResult> = Vec::new();
    for record in records {
        match results.iter_mut().find(|result| {
            result.theme == record.theme
                && result.timestamp == record.timestamp
                && result.voter_share == record.voter_share
        }) {
            Some(existing) => existing.winners.push(record),
            None => results.push(ContestResult {
                theme: record.theme.clone(),
                timestamp: record.timestamp,
                voter_share: record.voter_share,
                winners: vec![record],
            }),
        }
    }
    results
}

/// Typed facade over the deployed contract. Reads and writes both go
/// through the wallet provider; every response is decoded into named
/// records here so no positional tuple access leaks into the view layer.
#[derive(Clone)]
pub struct ContractGateway {
    adapter: ChainAdapter,
    address: Address,
}

impl ContractGateway {
    pub fn new(adapter: ChainAdapter, address: Address) -> Self {
        Self { adapter, address }
    }

    pub fn contract_address(&self) -> Address {
        self.address
    }

    pub async fn submission_fee(&self) -> Result<Wei, GatewayError> {
        let data = MusicContest::SUBMISSION_FEECall {}.abi_encode();
        let raw = self.call(data).await?;
        let fee = MusicContest::SUBMISSION_FEECall::abi_decode_returns(&raw)
            .map_err(|e| GatewayError::Decode(format!("SUBMISSION_FEE: {e}")))?;
        Ok(Wei(fee))
    }

    pub async fn current_theme(&self) -> Result<String, GatewayError> {
        let data = MusicContest::currentThemeCall {}.abi_encode();
        let raw = self.call(data).await?;
        MusicContest::currentThemeCall::abi_decode_returns(&raw)
            .map_err(|e| GatewayError::Decode(format!("currentTheme: {e}")))
    }

    pub async fn contest_details(&self) -> Result<ContestSnapshot, GatewayError> {
        let data = MusicContest::getSubmissionsCall {}.abi_encode();
        let raw = self.call(data).await?;
        decode_contest_snapshot(&raw)
    }

    pub async fn winners(&self) -> Result<Vec<WinnerRecord>, GatewayError> {
        let data = MusicContest::getWinnersCall {}.abi_encode();
        let raw = self.call(data).await?;
        decode_winner_records(&raw)
    }

    /// Sends the submission with the current fee attached and resolves once
    /// the transaction is confirmed on chain.
    pub async fn submit_music(
        &self,
        music_url: &str,
        theme: &str,
        prompt: &str,
    ) -> Result<String, GatewayError> {
        self.adapter.ensure_target_chain().await?;
        let fee = self.submission_fee().await?;
        let data = MusicContest::submitMusicCall {
            _musicUrl: music_url.to_owned(),
            _theme: theme.to_owned(),
            _prompt: prompt.to_owned(),
        }
        .abi_encode();
        let hash = self.send(data, Some(fee)).await?;
        self.wait_for_receipt(&hash).await?;
        Ok(hash)
    }

    /// One vote for the submission at `index`. The one-vote-per-address rule
    /// is enforced by the contract; callers pre-check the voted set purely
    /// as a UX courtesy.
    pub async fn vote_on_submission(&self, index: u64) -> Result<String, GatewayError> {
        self.adapter.ensure_target_chain().await?;
        let data = MusicContest::voteCall {
            _submissionIndex: U256::from(index),
        }
        .abi_encode();
        let hash = self.send(data, None).await?;
        self.wait_for_receipt(&hash).await?;
        Ok(hash)
    }

    async fn call(&self, data: Vec<u8>) -> Result<Vec<u8>, GatewayError> {
        let params = json!([
            {
                "to": self.address.to_string(),
                "data": format!("0x{}", hex::encode(&data)),
            },
            "latest",
        ]);
        let raw = self.adapter.provider().request("eth_call", params).await?;
        let raw = raw
            .as_str()
            .ok_or_else(|| GatewayError::Decode("eth_call did not return hex data".into()))?;
        hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
            .map_err(|e| GatewayError::Decode(format!("invalid eth_call hex: {e}")))
    }

    async fn send(&self, data: Vec<u8>, value: Option<Wei>) -> Result<String, GatewayError> {
        // A fresh signer account per write: a wallet-side account change is
        // always reflected on the next call.
        let from = self.signer_account().await?;
        let mut call = json!({
            "from": from,
            "to": self.address.to_string(),
            "data": format!("0x{}", hex::encode(&data)),
        });
        if let Some(value) = value {
            call["value"] = json!(format!("0x{:x}", value.0));
        }
        let hash = self
            .adapter
            .provider()
            .request("eth_sendTransaction", json!([call]))
            .await?;
        hash.as_str()
            .map(str::to_owned)
            .ok_or_else(|| GatewayError::Decode("eth_sendTransaction did not return a hash".into()))
    }

    async fn signer_account(&self) -> Result<String, GatewayError> {
        let accounts = self
            .adapter
            .provider()
            .request("eth_accounts", json!([]))
            .await?;
        accounts
            .as_array()
            .and_then(|list| list.first())
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| GatewayError::Provider(ProviderError::Unavailable))
    }

    async fn wait_for_receipt(&self, hash: &str) -> Result<(), GatewayError> {
        for attempt in 0..RECEIPT_POLL_ATTEMPTS {
            let receipt = self
                .adapter
                .provider()
                .request("eth_getTransactionReceipt", json!([hash]))
                .await?;
            if !receipt.is_null() {
                debug!(%hash, attempt, "transaction confirmed");
                if receipt_succeeded(&receipt) {
                    return Ok(());
                }
                return Err(GatewayError::Reverted(hash.to_owned()));
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
        Err(GatewayError::ConfirmationTimeout(hash.to_owned()))
    }
}

fn receipt_succeeded(receipt: &Value) -> bool {
    match receipt.get("status") {
        Some(Value::String(status)) => status != "0x0",
        Some(Value::Bool(ok)) => *ok,
        _ => true,
    }
}

fn decode_contest_snapshot(raw: &[u8]) -> Result<ContestSnapshot, GatewayError> {
    let decoded = MusicContest::getSubmissionsCall::abi_decode_returns(raw)
        .map_err(|e| GatewayError::Decode(format!("getSubmissions: {e}")))?;
    let submissions = decoded
        ._0
        .into_iter()
        .map(|entry| Submission {
            submitter: entry.submitter.to_string(),
            music_url: entry.musicUrl,
            theme: entry.theme,
        })
        .collect();
    Ok(ContestSnapshot {
        submissions,
        total_votes: to_u64(decoded._1, "totalVotes")?,
        total_funds: Wei(decoded._2),
        started_at: to_u64(decoded._3, "startTimestamp")?,
        voters: decoded._4.into_iter().map(|a| a.to_string()).collect(),
    })
}

fn decode_winner_records(raw: &[u8]) -> Result<Vec<WinnerRecord>, GatewayError> {
    let decoded = MusicContest::getWinnersCall::abi_decode_returns(raw)
        .map_err(|e| GatewayError::Decode(format!("getWinners: {e}")))?;
    decoded
        .into_iter()
        .map(|winner| {
            Ok(WinnerRecord {
                submitter: winner.submitter.to_string(),
                music_url: winner.musicUrl,
                theme: winner.theme,
                prompt: winner.prompt,
                votes: to_u64(winner.votes, "votes")?,
                payout: Wei(winner.payout),
                timestamp: to_u64(winner.timestamp, "timestamp")?,
                voter_share: Wei(winner.voterShare),
            })
        })
        .collect()
}

fn to_u64(value: U256, field: &str) -> Result<u64, GatewayError> {
    u64::try_from(value).map_err(|_| GatewayError::Decode(format!("{field} exceeds u64 range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolValue;
    use proptest::prelude::*;

    fn winner(theme: &str, timestamp: u64, share: u64, submitter: &str) -> WinnerRecord {
        WinnerRecord {
            submitter: submitter.to_owned(),
            music_url: format!("https://media.example/{submitter}.mp3"),
            theme: theme.to_owned(),
            prompt: "late night rain".to_owned(),
            votes: 3,
            payout: Wei(U256::from(250u64)),
            timestamp,
            voter_share: Wei(U256::from(share)),
        }
    }

    #[test]
    fn wei__displays_base_ten_string() {
        let value = Wei(U256::from_str_radix("340282366920938463463374607431768211456", 10).unwrap());
        assert_eq!(
            value.to_string(),
            "340282366920938463463374607431768211456"
        );
        let json = serde_json::to_value(value).unwrap();
        assert_eq!(json, "340282366920938463463374607431768211456");
    }

    #[test]
    fn wei__format_units_rounds_to_three_places() {
        let one_and_a_half = Wei(U256::from(1_500_000_000_000_000_000u128));
        assert_eq!(one_and_a_half.format_units(18), "1.500");
        assert_eq!(Wei::ZERO.format_units(18), "0.000");
        let just_over = Wei(U256::from(1_000_500_000_000_000_000u128));
        assert_eq!(just_over.format_units(18), "1.001");
    }

    #[test]
    fn group_winners__splits_on_any_key_component() {
        let records = vec![
            winner("Neon", 100, 7, "0xaa"),
            winner("Neon", 100, 7, "0xbb"),
            winner("Neon", 200, 7, "0xcc"),
            winner("Rust", 200, 7, "0xdd"),
        ];
        let grouped = group_winners(records);
        assert_eq!(grouped.len(), 3);
        assert_eq!(grouped[0].winners.len(), 2);
        assert_eq!(grouped[1].theme, "Neon");
        assert_eq!(grouped[1].timestamp, 200);
        assert_eq!(grouped[2].theme, "Rust");
    }

    #[test]
    fn group_winners__is_idempotent() {
        let records = vec![
            winner("Neon", 100, 7, "0xaa"),
            winner("Rust", 200, 9, "0xbb"),
            winner("Neon", 100, 7, "0xcc"),
        ];
        let grouped = group_winners(records);
        let flattened: Vec<WinnerRecord> = grouped
            .iter()
            .flat_map(|result| result.winners.clone())
            .collect();
        assert_eq!(group_winners(flattened), grouped);
    }

    #[test]
    fn decode_contest_snapshot__maps_tuple_to_named_fields() {
        let submitter = Address::from([0x11; 20]);
        let voter = Address::from([0x22; 20]);
        let encoded = (
            vec![MusicContest::SubmissionOverview {
                submitter,
                musicUrl: "https://media.example/a.mp3".to_owned(),
                theme: "Neon".to_owned(),
            }],
            U256::from(4u64),
            U256::from(1_000_000_000u64),
            U256::from(1_700_000_000u64),
            vec![voter],
        )
            .abi_encode_params();

        let snapshot = decode_contest_snapshot(&encoded).unwrap();
        assert_eq!(snapshot.submissions.len(), 1);
        assert_eq!(snapshot.submissions[0].submitter, submitter.to_string());
        assert_eq!(snapshot.submissions[0].theme, "Neon");
        assert_eq!(snapshot.total_votes, 4);
        assert_eq!(snapshot.total_funds.to_string(), "1000000000");
        assert_eq!(snapshot.started_at, 1_700_000_000);
        assert!(snapshot.has_voted(&voter.to_string().to_lowercase()));
        assert!(!snapshot.has_voted(&submitter.to_string()));
    }

    #[test]
    fn receipt_succeeded__reads_status_variants() {
        assert!(receipt_succeeded(&json!({"status": "0x1"})));
        assert!(!receipt_succeeded(&json!({"status": "0x0"})));
        assert!(receipt_succeeded(&json!({"transactionHash": "0xabc"})));
    }

    proptest! {
        #[test]
        fn wei__decimal_string_round_trips(hi in any::<u128>(), lo in any::<u128>()) {
            let value = Wei((U256::from(hi) << 128) | U256::from(lo));
            let rendered = value.to_string();
            prop_assert_eq!(rendered.parse::<Wei>().unwrap(), value);
        }
    }
}

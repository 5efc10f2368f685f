use anyhow::{Context, Result};
use solana_client::{rpc_client::RpcClient, rpc_config::RpcTransactionConfig};
use solana_sdk::{commitment_config::CommitmentConfig, signature::Signature};
use solana_transaction_status::{option_serializer::OptionSerializer, UiTransactionEncoding};

use crate::explorer;

/// Client at confirmed commitment, the level every flow settles at.
pub fn connect(url: &str) -> RpcClient {
    RpcClient::new_with_commitment(url.to_string(), CommitmentConfig::confirmed())
}

/// Connect and report the node version, failing early when the endpoint is
/// unreachable.
pub fn connect_with_check(url: &str) -> Result<RpcClient> {
    let client = connect(url);
    let version = client
        .get_version()
        .with_context(|| format!("RPC endpoint {} is not reachable", url))?;

    println!("Connected to {} (solana-core {})", url, version.solana_core);
    Ok(client)
}

/// Pull a transaction signature out of an RPC error message. Signatures are
/// the only base58 tokens that decode to 64 bytes, so any such token is one.
pub fn extract_failed_signature(message: &str) -> Option<Signature> {
    message
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .find_map(|token| {
            let bytes = bs58::decode(token).into_vec().ok()?;
            let bytes: [u8; 64] = bytes.try_into().ok()?;
            Some(Signature::from(bytes))
        })
}

/// Fetch and print the on-chain logs of a transaction. Diagnostics only, so
/// RPC failures are reported rather than propagated.
pub fn print_transaction_logs(client: &RpcClient, signature: &Signature, cluster: &str) {
    println!("\n==== Transaction logs for {} ====", signature);
    println!("{}", explorer::tx_url(signature, cluster));

    let config = RpcTransactionConfig {
        encoding: Some(UiTransactionEncoding::Json),
        commitment: Some(CommitmentConfig::confirmed()),
        max_supported_transaction_version: Some(0),
    };

    match client.get_transaction_with_config(signature, config) {
        Ok(tx) => {
            let logs: Option<Vec<String>> = tx
                .transaction
                .meta
                .and_then(|meta| match meta.log_messages {
                    OptionSerializer::Some(lines) => Some(lines),
                    _ => None,
                });

            match logs {
                Some(lines) => {
                    for line in lines {
                        println!("{}", line);
                    }
                }
                None => println!("No log messages provided by RPC"),
            }
        }
        Err(err) => println!("Failed to fetch transaction: {}", err),
    }

    println!("==== END LOGS ====\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_a_signature_in_an_error_message() {
        let signature = Signature::from([9u8; 64]);
        let message = format!(
            "Error: Transaction {} has already been processed",
            signature
        );

        assert_eq!(extract_failed_signature(&message), Some(signature));
    }

    #[test]
    fn strips_punctuation_around_the_token() {
        let signature = Signature::from([4u8; 64]);
        let message = format!("failed to confirm \"{}\".", signature);

        assert_eq!(extract_failed_signature(&message), Some(signature));
    }

    #[test]
    fn ignores_messages_without_signatures() {
        assert_eq!(extract_failed_signature("connection refused"), None);
        assert_eq!(extract_failed_signature(""), None);
    }

    #[test]
    fn ignores_address_sized_tokens() {
        // addresses decode to 32 bytes, not 64
        let address = solana_sdk::pubkey::Pubkey::new_from_array([5; 32]);
        let message = format!("Error: account {} not found", address);

        assert_eq!(extract_failed_signature(&message), None);
    }
}

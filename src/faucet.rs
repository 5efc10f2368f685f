use anyhow::{Context, Result};
use solana_client::rpc_client::RpcClient;
use solana_sdk::{native_token::LAMPORTS_PER_SOL, pubkey::Pubkey};

// flows below this floor get topped up before doing anything else
pub const MIN_BALANCE: u64 = LAMPORTS_PER_SOL;

/// Check the account balance and request one airdrop for the exact shortfall
/// when it sits below the 1 SOL floor. Blocks until the airdrop is confirmed;
/// a dropped airdrop is an error, there is no retry.
pub fn ensure_min_balance(client: &RpcClient, account: &Pubkey) -> Result<u64> {
    let balance = client
        .get_balance(account)
        .context("Failed to fetch balance")?;

    if balance >= MIN_BALANCE {
        return Ok(balance);
    }

    println!("Balance is below 1 SOL, requesting airdrop...");
    let signature = client
        .request_airdrop(account, MIN_BALANCE - balance)
        .context("Airdrop request failed")?;

    // confirm against a blockhash from request time; expiry means the drop
    // never landed
    let blockhash = client
        .get_latest_blockhash()
        .context("Failed to fetch a recent blockhash")?;
    client
        .confirm_transaction_with_spinner(&signature, &blockhash, client.commitment())
        .context("Airdrop was not confirmed")?;

    println!("Airdrop processed.");

    client
        .get_balance(account)
        .context("Failed to fetch balance")
}

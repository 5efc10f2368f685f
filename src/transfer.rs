use anyhow::{Context, Result};
use solana_client::rpc_client::RpcClient;
use solana_sdk::{
    instruction::Instruction,
    native_token::LAMPORTS_PER_SOL,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_instruction, system_program,
};

use crate::builder;

// 0.1 SOL moved to the target, and seeded through the throwaway account
pub const TRANSFER_LAMPORTS: u64 = LAMPORTS_PER_SOL / 10;

pub struct TransferPlan {
    pub instructions: Vec<Instruction>,
    // throwaway account created and drained inside the same transaction,
    // it must co-sign
    pub new_account: Keypair,
}

/// Plan the three-step transfer: open a throwaway system account funded with
/// rent plus 0.1 SOL, pay the target 0.1 SOL from the payer, then sweep the
/// rent portion back out of the throwaway. Order is load-bearing, the sweep
/// can only spend what the first instruction deposited.
pub fn plan_transfer(payer: &Pubkey, target: &Pubkey, rent_exempt_minimum: u64) -> TransferPlan {
    let new_account = Keypair::new();

    let create_account_ix = system_instruction::create_account(
        payer,
        &new_account.pubkey(),
        rent_exempt_minimum + TRANSFER_LAMPORTS,
        0,
        &system_program::id(),
    );

    let pay_target_ix = system_instruction::transfer(payer, target, TRANSFER_LAMPORTS);

    let sweep_ix =
        system_instruction::transfer(&new_account.pubkey(), payer, rent_exempt_minimum);

    TransferPlan {
        instructions: vec![create_account_ix, pay_target_ix, sweep_ix],
        new_account,
    }
}

pub fn run(
    client: &RpcClient,
    payer: &Keypair,
    target: &Pubkey,
    cluster: &str,
) -> Result<Signature> {
    let rent_exempt_minimum = client
        .get_minimum_balance_for_rent_exemption(0)
        .context("Failed to fetch rent-exemption minimum")?;

    let plan = plan_transfer(&payer.pubkey(), target, rent_exempt_minimum);
    println!("Throwaway account: {}", plan.new_account.pubkey());

    let tx = builder::build_signed_transaction(
        client,
        &payer.pubkey(),
        &[payer, &plan.new_account],
        &plan.instructions,
    )?;

    builder::send_and_confirm(client, &tx, cluster)
}

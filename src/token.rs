use anyhow::{ensure, Context, Result};
use mpl_token_metadata::{
    accounts::Metadata, instructions::CreateMetadataAccountV3Builder, types::DataV2,
};
use solana_client::rpc_client::RpcClient;
use solana_sdk::{
    instruction::Instruction,
    program_pack::Pack,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_instruction,
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account,
};
use spl_token::{
    instruction::{initialize_mint2, mint_to},
    state::Mint,
};
use std::path::Path;

use crate::{builder, explorer, keystore};

// whole tokens minted to each side
pub const PAYER_MINT_AMOUNT: u64 = 100;
pub const TARGET_MINT_AMOUNT: u64 = 10;

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub uri: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            name: "Devkit Token".to_string(),
            symbol: "DVK".to_string(),
            decimals: 6,
            uri: "https://raw.githubusercontent.com/solana-developers/opos-asset/main/assets/DeveloperPortal/metadata.json".to_string(),
        }
    }
}

pub struct TokenPlan {
    pub instructions: Vec<Instruction>,
    // fresh mint, co-signs the transaction
    pub mint: Keypair,
    pub metadata: Pubkey,
    pub payer_ata: Pubkey,
    pub target_ata: Pubkey,
}

/// Plan the whole token launch as one transaction: create and initialize the
/// mint, attach metadata, then for payer and target create the associated
/// token account and mint into it. Each account is created strictly before
/// the instruction that uses it.
pub fn plan_token_mint(
    payer: &Pubkey,
    target: &Pubkey,
    token: &TokenConfig,
    rent_exempt_minimum: u64,
) -> Result<TokenPlan> {
    // 10^decimals must stay inside u64 amounts
    ensure!(token.decimals <= 9, "Decimals above 9 are not supported");

    let mint = Keypair::new();
    let mint_pubkey = mint.pubkey();

    let create_mint_account_ix = system_instruction::create_account(
        payer,
        &mint_pubkey,
        rent_exempt_minimum,
        Mint::LEN as u64,
        &spl_token::id(),
    );

    // payer acts as both mint and freeze authority
    let initialize_mint_ix = initialize_mint2(
        &spl_token::id(),
        &mint_pubkey,
        payer,
        Some(payer),
        token.decimals,
    )
    .context("Failed to build the initialize-mint instruction")?;

    let (metadata, _) = Metadata::find_pda(&mint_pubkey);
    let metadata_ix = CreateMetadataAccountV3Builder::new()
        .metadata(metadata)
        .mint(mint_pubkey)
        .mint_authority(*payer)
        .payer(*payer)
        .update_authority(*payer, true)
        .data(DataV2 {
            name: token.name.clone(),
            symbol: token.symbol.clone(),
            uri: token.uri.clone(),
            seller_fee_basis_points: 0,
            creators: None,
            collection: None,
            uses: None,
        })
        .is_mutable(true)
        .instruction();

    let unit = 10u64.pow(token.decimals as u32);

    let payer_ata = get_associated_token_address(payer, &mint_pubkey);
    let create_payer_ata_ix =
        create_associated_token_account(payer, payer, &mint_pubkey, &spl_token::id());
    let mint_to_payer_ix = mint_to(
        &spl_token::id(),
        &mint_pubkey,
        &payer_ata,
        payer,
        &[],
        PAYER_MINT_AMOUNT * unit,
    )
    .context("Failed to build the mint-to instruction")?;

    let target_ata = get_associated_token_address(target, &mint_pubkey);
    let create_target_ata_ix =
        create_associated_token_account(payer, target, &mint_pubkey, &spl_token::id());
    let mint_to_target_ix = mint_to(
        &spl_token::id(),
        &mint_pubkey,
        &target_ata,
        payer,
        &[],
        TARGET_MINT_AMOUNT * unit,
    )
    .context("Failed to build the mint-to instruction")?;

    Ok(TokenPlan {
        instructions: vec![
            create_mint_account_ix,
            initialize_mint_ix,
            metadata_ix,
            create_payer_ata_ix,
            mint_to_payer_ix,
            create_target_ata_ix,
            mint_to_target_ix,
        ],
        mint,
        metadata,
        payer_ata,
        target_ata,
    })
}

pub fn run(
    client: &RpcClient,
    payer: &Keypair,
    target: &Pubkey,
    token: &TokenConfig,
    keys_dir: &Path,
    cluster: &str,
) -> Result<Signature> {
    let rent_exempt_minimum = client
        .get_minimum_balance_for_rent_exemption(Mint::LEN)
        .context("Failed to fetch rent-exemption minimum")?;

    let plan = plan_token_mint(&payer.pubkey(), target, token, rent_exempt_minimum)?;

    println!("Token mint address: {}", plan.mint.pubkey());
    println!("Metadata address: {}", plan.metadata);
    println!("Payer token account: {}", plan.payer_ata);
    println!("Target token account: {}", plan.target_ata);
    println!(
        "Mint explorer URL: {}",
        explorer::address_url(&plan.mint.pubkey(), cluster)
    );

    let tx = builder::build_signed_transaction(
        client,
        &payer.pubkey(),
        &[payer, &plan.mint],
        &plan.instructions,
    )?;
    let signature = builder::send_and_confirm(client, &tx, cluster)?;

    keystore::save_public_key(
        "tokenMint",
        &plan.mint.pubkey(),
        &keys_dir.join(keystore::PUBLIC_KEY_FILE),
    )?;

    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::hash::Hash;

    // spl-token instruction tags
    const INITIALIZE_MINT2: u8 = 20;
    const MINT_TO: u8 = 7;

    const RENT: u64 = 1_461_600;

    fn plan() -> (Pubkey, Pubkey, TokenPlan) {
        let payer = Pubkey::new_from_array([1; 32]);
        let target = Pubkey::new_from_array([2; 32]);
        let plan = plan_token_mint(&payer, &target, &TokenConfig::default(), RENT).unwrap();
        (payer, target, plan)
    }

    #[test]
    fn mint_account_is_created_first_and_initialized_second() {
        let (_, _, plan) = plan();
        assert_eq!(plan.instructions.len(), 7);

        let create = &plan.instructions[0];
        assert_eq!(create.program_id, solana_sdk::system_program::id());
        assert_eq!(create.accounts[1].pubkey, plan.mint.pubkey());
        assert!(create.accounts[1].is_signer);

        let initialize = &plan.instructions[1];
        assert_eq!(initialize.program_id, spl_token::id());
        assert_eq!(initialize.data[0], INITIALIZE_MINT2);
        assert_eq!(initialize.accounts[0].pubkey, plan.mint.pubkey());
    }

    #[test]
    fn metadata_follows_mint_initialization() {
        let (_, _, plan) = plan();

        let metadata_ix = &plan.instructions[2];
        assert_eq!(metadata_ix.program_id, mpl_token_metadata::ID);
        assert_eq!(metadata_ix.accounts[0].pubkey, plan.metadata);

        // the metadata PDA is derived from the mint
        let (expected, _) = Pubkey::find_program_address(
            &[
                b"metadata",
                mpl_token_metadata::ID.as_ref(),
                plan.mint.pubkey().as_ref(),
            ],
            &mpl_token_metadata::ID,
        );
        assert_eq!(plan.metadata, expected);
    }

    #[test]
    fn each_ata_exists_before_it_is_minted_to() {
        let (payer, target, plan) = plan();

        let payer_ata_ix = &plan.instructions[3];
        assert_eq!(payer_ata_ix.program_id, spl_associated_token_account::id());
        assert_eq!(
            payer_ata_ix.accounts[1].pubkey,
            get_associated_token_address(&payer, &plan.mint.pubkey())
        );

        let mint_to_payer = &plan.instructions[4];
        assert_eq!(mint_to_payer.data[0], MINT_TO);
        assert_eq!(mint_to_payer.accounts[1].pubkey, plan.payer_ata);

        let target_ata_ix = &plan.instructions[5];
        assert_eq!(
            target_ata_ix.accounts[1].pubkey,
            get_associated_token_address(&target, &plan.mint.pubkey())
        );

        let mint_to_target = &plan.instructions[6];
        assert_eq!(mint_to_target.data[0], MINT_TO);
        assert_eq!(mint_to_target.accounts[1].pubkey, plan.target_ata);
    }

    #[test]
    fn amounts_scale_with_decimals() {
        let (_, _, plan) = plan();

        let mint_to_payer = &plan.instructions[4];
        let amount = u64::from_le_bytes(mint_to_payer.data[1..9].try_into().unwrap());
        assert_eq!(amount, 100_000_000); // 100 tokens at 6 decimals

        let mint_to_target = &plan.instructions[6];
        let amount = u64::from_le_bytes(mint_to_target.data[1..9].try_into().unwrap());
        assert_eq!(amount, 10_000_000);
    }

    #[test]
    fn excessive_decimals_are_rejected() {
        let payer = Pubkey::new_from_array([1; 32]);
        let target = Pubkey::new_from_array([2; 32]);

        let mut token = TokenConfig::default();
        token.decimals = 10;
        assert!(plan_token_mint(&payer, &target, &token, RENT).is_err());

        token.decimals = 9;
        assert!(plan_token_mint(&payer, &target, &token, RENT).is_ok());
    }

    #[test]
    fn transaction_requires_payer_and_mint_signatures() {
        let payer = Keypair::new();
        let target = Pubkey::new_from_array([2; 32]);
        let plan =
            plan_token_mint(&payer.pubkey(), &target, &TokenConfig::default(), RENT).unwrap();

        let tx = builder::compile(
            &plan.instructions,
            &payer.pubkey(),
            &[&payer, &plan.mint],
            Hash::new_from_array([1; 32]),
        )
        .unwrap();

        assert_eq!(tx.signatures.len(), 2);
        assert!(tx.verify().is_ok());
    }
}

use anyhow::{Context, Result};
use mpl_token_metadata::{
    accounts::{MasterEdition, Metadata},
    instructions::{CreateMasterEditionV3Builder, CreateMetadataAccountV3Builder},
    types::DataV2,
};
use serde_json::json;
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

#[derive(Debug, Clone)]
pub struct NftConfig {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    // royalty in basis points, 500 = 5%
    pub seller_fee_basis_points: u16,
}

impl Default for NftConfig {
    fn default() -> Self {
        Self {
            name: "Devkit NFT".to_string(),
            symbol: "DVKN".to_string(),
            uri: "https://raw.githubusercontent.com/solana-developers/opos-asset/main/assets/DeveloperPortal/metadata.json".to_string(),
            seller_fee_basis_points: 500,
        }
    }
}

pub struct NftPlan {
    pub instructions: Vec<Instruction>,
    pub mint: Keypair,
    pub metadata: Pubkey,
    pub master_edition: Pubkey,
    pub payer_ata: Pubkey,
}

/// Plan an NFT mint as one transaction: a zero-decimal mint with metadata,
/// exactly one token minted to the payer, and a master edition capping the
/// supply. The master edition must come last, it requires supply to already
/// be 1.
pub fn plan_nft_mint(
    payer: &Pubkey,
    nft: &NftConfig,
    rent_exempt_minimum: u64,
) -> Result<NftPlan> {
    let mint = Keypair::new();
    let mint_pubkey = mint.pubkey();

    let create_mint_account_ix = system_instruction::create_account(
        payer,
        &mint_pubkey,
        rent_exempt_minimum,
        Mint::LEN as u64,
        &spl_token::id(),
    );

    let initialize_mint_ix =
        initialize_mint2(&spl_token::id(), &mint_pubkey, payer, Some(payer), 0)
            .context("Failed to build the initialize-mint instruction")?;

    let (metadata, _) = Metadata::find_pda(&mint_pubkey);
    let metadata_ix = CreateMetadataAccountV3Builder::new()
        .metadata(metadata)
        .mint(mint_pubkey)
        .mint_authority(*payer)
        .payer(*payer)
        .update_authority(*payer, true)
        .data(DataV2 {
            name: nft.name.clone(),
            symbol: nft.symbol.clone(),
            uri: nft.uri.clone(),
            seller_fee_basis_points: nft.seller_fee_basis_points,
            creators: None,
            collection: None,
            uses: None,
        })
        .is_mutable(true)
        .instruction();

    let payer_ata = get_associated_token_address(payer, &mint_pubkey);
    let create_payer_ata_ix =
        create_associated_token_account(payer, payer, &mint_pubkey, &spl_token::id());

    let mint_one_ix = mint_to(&spl_token::id(), &mint_pubkey, &payer_ata, payer, &[], 1)
        .context("Failed to build the mint-to instruction")?;

    let (master_edition, _) = MasterEdition::find_pda(&mint_pubkey);
    let master_edition_ix = CreateMasterEditionV3Builder::new()
        .edition(master_edition)
        .mint(mint_pubkey)
        .update_authority(*payer)
        .mint_authority(*payer)
        .payer(*payer)
        .metadata(metadata)
        .max_supply(0)
        .instruction();

    Ok(NftPlan {
        instructions: vec![
            create_mint_account_ix,
            initialize_mint_ix,
            metadata_ix,
            create_payer_ata_ix,
            mint_one_ix,
            master_edition_ix,
        ],
        mint,
        metadata,
        master_edition,
        payer_ata,
    })
}

pub fn run(
    client: &RpcClient,
    payer: &Keypair,
    nft: &NftConfig,
    keys_dir: &Path,
    cluster: &str,
) -> Result<Signature> {
    let rent_exempt_minimum = client
        .get_minimum_balance_for_rent_exemption(Mint::LEN)
        .context("Failed to fetch rent-exemption minimum")?;

    let plan = plan_nft_mint(&payer.pubkey(), nft, rent_exempt_minimum)?;

    println!("NFT mint address: {}", plan.mint.pubkey());
    println!("Metadata address: {}", plan.metadata);
    println!("Master edition address: {}", plan.master_edition);
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

    keystore::save_demo_data(
        "nft",
        json!({
            "mint": plan.mint.pubkey().to_string(),
            "metadata": plan.metadata.to_string(),
            "masterEdition": plan.master_edition.to_string(),
            "signature": signature.to_string(),
        }),
        &keys_dir.join(keystore::DEMO_DATA_FILE),
    )?;

    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::hash::Hash;

    const MINT_TO: u8 = 7;
    const RENT: u64 = 1_461_600;

    fn plan() -> NftPlan {
        let payer = Pubkey::new_from_array([1; 32]);
        plan_nft_mint(&payer, &NftConfig::default(), RENT).unwrap()
    }

    #[test]
    fn mints_exactly_one_token_before_the_master_edition() {
        let plan = plan();
        assert_eq!(plan.instructions.len(), 6);

        let mint_one = &plan.instructions[4];
        assert_eq!(mint_one.program_id, spl_token::id());
        assert_eq!(mint_one.data[0], MINT_TO);
        let amount = u64::from_le_bytes(mint_one.data[1..9].try_into().unwrap());
        assert_eq!(amount, 1);

        let master_edition = &plan.instructions[5];
        assert_eq!(master_edition.program_id, mpl_token_metadata::ID);
        assert_eq!(master_edition.accounts[0].pubkey, plan.master_edition);
    }

    #[test]
    fn nft_mint_has_zero_decimals() {
        let plan = plan();

        // initialize_mint2 data: tag, decimals, then the authorities
        let initialize = &plan.instructions[1];
        assert_eq!(initialize.data[0], 20);
        assert_eq!(initialize.data[1], 0);
    }

    #[test]
    fn metadata_and_edition_pdas_belong_to_the_mint() {
        let plan = plan();
        let mint = plan.mint.pubkey();

        let (metadata, _) = Pubkey::find_program_address(
            &[b"metadata", mpl_token_metadata::ID.as_ref(), mint.as_ref()],
            &mpl_token_metadata::ID,
        );
        assert_eq!(plan.metadata, metadata);

        let (edition, _) = Pubkey::find_program_address(
            &[
                b"metadata",
                mpl_token_metadata::ID.as_ref(),
                mint.as_ref(),
                b"edition",
            ],
            &mpl_token_metadata::ID,
        );
        assert_eq!(plan.master_edition, edition);
    }

    #[test]
    fn royalty_is_carried_into_the_metadata() {
        let payer = Pubkey::new_from_array([1; 32]);
        let nft = NftConfig {
            seller_fee_basis_points: 750,
            ..NftConfig::default()
        };
        let plan = plan_nft_mint(&payer, &nft, RENT).unwrap();

        // DataV2 serializes name, symbol and uri first; look for the raw
        // basis points right after the uri bytes
        let metadata_ix = &plan.instructions[2];
        let needle = 750u16.to_le_bytes();
        let found = metadata_ix
            .data
            .windows(2)
            .any(|window| window == needle);
        assert!(found);
    }

    #[test]
    fn transaction_compiles_with_payer_and_mint() {
        let payer = Keypair::new();
        let plan = plan_nft_mint(&payer.pubkey(), &NftConfig::default(), RENT).unwrap();

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

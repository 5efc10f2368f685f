//! Scaffolding for exercising the AMM program: PDA derivation, the pool
//! math its tests assert against, and a devnet setup flow that prepares a
//! funded depositor plus two test mints.

use anyhow::{ensure, Context, Result};
use solana_client::rpc_client::RpcClient;
use solana_sdk::{
    instruction::Instruction,
    native_token::LAMPORTS_PER_SOL,
    program_pack::Pack,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
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

use crate::{builder, keystore};

pub const AMM_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("ARDGpFFuRDPkR2m7HWQo8QvnoSqcZX8iS7rz4urW68Ta");

// the LP mint the program initializes
pub const LP_MINT_DECIMALS: u8 = 6;

// what the depositor gets to play with
pub const DEPOSITOR_FUNDING: u64 = LAMPORTS_PER_SOL / 10;
pub const MINT_A_SUPPLY: u64 = 10_000;
pub const MINT_B_SUPPLY: u64 = 20_000;

/// Every address the program's tests touch, derived from the AMM id and the
/// two token mints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmmAddresses {
    pub amm: Pubkey,
    pub pool: Pubkey,
    pub pool_authority: Pubkey,
    pub mint_liquidity: Pubkey,
    pub pool_account_a: Pubkey,
    pub pool_account_b: Pubkey,
}

pub fn derive_addresses(
    program_id: &Pubkey,
    id: &Pubkey,
    mint_a: &Pubkey,
    mint_b: &Pubkey,
) -> AmmAddresses {
    let (amm, _) = Pubkey::find_program_address(&[b"amm", id.as_ref()], program_id);

    let pool_seeds = [amm.as_ref(), mint_a.as_ref(), mint_b.as_ref()];
    let (pool, _) = Pubkey::find_program_address(&pool_seeds, program_id);
    let (pool_authority, _) = Pubkey::find_program_address(
        &[amm.as_ref(), mint_a.as_ref(), mint_b.as_ref(), b"authority"],
        program_id,
    );
    let (mint_liquidity, _) = Pubkey::find_program_address(
        &[
            amm.as_ref(),
            mint_a.as_ref(),
            mint_b.as_ref(),
            b"mint_liquidity",
        ],
        program_id,
    );

    // pool reserves live in ATAs owned by the authority PDA
    let pool_account_a = get_associated_token_address(&pool_authority, mint_a);
    let pool_account_b = get_associated_token_address(&pool_authority, mint_b);

    AmmAddresses {
        amm,
        pool,
        pool_authority,
        mint_liquidity,
        pool_account_a,
        pool_account_b,
    }
}

/// LP tokens minted for the first deposit: the integer square root of the
/// deposited amounts' product, rounded down.
pub fn initial_liquidity(amount_a: u64, amount_b: u64) -> u64 {
    integer_sqrt(amount_a as u128 * amount_b as u128) as u64
}

fn integer_sqrt(value: u128) -> u128 {
    if value == 0 {
        return 0;
    }
    if value <= 3 {
        return 1;
    }

    let mut z = value;
    let mut x = value / 2 + 1;
    while x < z {
        z = x;
        x = (value / x + x) / 2;
    }
    z
}

/// Token amounts a withdrawal pays out: the burned share of each reserve,
/// rounded down.
pub fn withdrawal_amounts(
    pool_a: u64,
    pool_b: u64,
    lp_amount: u64,
    lp_supply: u64,
) -> Result<(u64, u64)> {
    ensure!(lp_supply > 0, "LP supply is zero");
    ensure!(lp_amount <= lp_supply, "Burning more LP tokens than exist");

    let share =
        |reserve: u64| ((reserve as u128 * lp_amount as u128) / lp_supply as u128) as u64;
    Ok((share(pool_a), share(pool_b)))
}

// one test mint: create the account, initialize it, then seed the receiver's
// associated token account
fn plan_test_mint(
    payer: &Pubkey,
    receiver: &Pubkey,
    mint: &Pubkey,
    amount: u64,
    rent_exempt_minimum: u64,
) -> Result<Vec<Instruction>> {
    let create_ix = system_instruction::create_account(
        payer,
        mint,
        rent_exempt_minimum,
        Mint::LEN as u64,
        &spl_token::id(),
    );
    let initialize_ix = initialize_mint2(&spl_token::id(), mint, payer, None, 0)
        .context("Failed to build the initialize-mint instruction")?;

    let receiver_ata = get_associated_token_address(receiver, mint);
    let create_ata_ix = create_associated_token_account(payer, receiver, mint, &spl_token::id());
    let mint_to_ix = mint_to(&spl_token::id(), mint, &receiver_ata, payer, &[], amount)
        .context("Failed to build the mint-to instruction")?;

    Ok(vec![create_ix, initialize_ix, create_ata_ix, mint_to_ix])
}

/// Prepare everything the program's tests assume exists: a depositor wallet
/// holding 0.1 SOL and two zero-decimal mints with the depositor seeded.
/// Keypairs land in the key directory; the mints and the AMM id are fresh
/// on every run since mints cannot be re-initialized.
pub fn run_setup(
    client: &RpcClient,
    payer: &Keypair,
    keys_dir: &Path,
    cluster: &str,
) -> Result<AmmAddresses> {
    let depositor = keystore::load_or_generate_keypair("amm-depositor", keys_dir)?;
    println!("Depositor: {}", depositor.pubkey());

    let fund_ix =
        system_instruction::transfer(&payer.pubkey(), &depositor.pubkey(), DEPOSITOR_FUNDING);
    let tx = builder::build_signed_transaction(client, &payer.pubkey(), &[payer], &[fund_ix])?;
    let signature = builder::send_and_confirm(client, &tx, cluster)?;
    println!("Funded depositor: {}", signature);

    let rent_exempt_minimum = client
        .get_minimum_balance_for_rent_exemption(Mint::LEN)
        .context("Failed to fetch rent-exemption minimum")?;

    let mut mints = Vec::with_capacity(2);
    for (name, amount) in [("amm-mint-a", MINT_A_SUPPLY), ("amm-mint-b", MINT_B_SUPPLY)] {
        let mint = Keypair::new();
        let instructions = plan_test_mint(
            &payer.pubkey(),
            &depositor.pubkey(),
            &mint.pubkey(),
            amount,
            rent_exempt_minimum,
        )?;

        let tx = builder::build_signed_transaction(
            client,
            &payer.pubkey(),
            &[payer, &mint],
            &instructions,
        )?;
        let signature = builder::send_and_confirm(client, &tx, cluster)?;
        println!("Created {} {}: {}", name, mint.pubkey(), signature);

        keystore::save_keypair(&mint, name, keys_dir)?;
        mints.push(mint.pubkey());
    }

    let id = Keypair::new();
    keystore::save_keypair(&id, "amm-id", keys_dir)?;

    let addresses = derive_addresses(&AMM_PROGRAM_ID, &id.pubkey(), &mints[0], &mints[1]);
    Ok(addresses)
}

pub fn print_addresses(addresses: &AmmAddresses) {
    println!("AMM account: {}", addresses.amm);
    println!("Pool account: {}", addresses.pool);
    println!("Pool authority: {}", addresses.pool_authority);
    println!("LP mint: {}", addresses.mint_liquidity);
    println!("Pool token account A: {}", addresses.pool_account_a);
    println!("Pool token account B: {}", addresses.pool_account_b);
}

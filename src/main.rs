mod config;
mod keystore;
mod explorer;
mod rpc;
mod faucet;
mod builder;
mod transfer;
mod token;
mod nft;
mod todo;
mod amm;

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use solana_sdk::{pubkey::Pubkey, signature::Signer};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::Settings;
use crate::nft::NftConfig;
use crate::todo::TodoClient;
use crate::token::TokenConfig;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Solana devnet toolkit for wallets, tokens and program clients")]
struct Args {
    /// Path to config file
    #[clap(short, long, default_value = "config.json")]
    config: String,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a default config file with a fresh payer wallet
    Init,

    /// Show payer wallet address (useful for funding)
    ShowWallet,

    /// Top the payer up to 1 SOL from the devnet faucet
    Airdrop,

    /// Send 0.1 SOL to the target wallet through a throwaway account
    Transfer {
        /// Destination wallet, overrides the configured target
        #[clap(long)]
        to: Option<String>,
    },

    /// Create a token mint with metadata and seed the payer and target wallets
    CreateToken {
        /// Token name recorded in the metadata account
        #[clap(long)]
        name: Option<String>,

        /// Token symbol recorded in the metadata account
        #[clap(long)]
        symbol: Option<String>,

        /// Number of decimal places
        #[clap(long)]
        decimals: Option<u8>,

        /// URI of the off-chain metadata JSON
        #[clap(long)]
        uri: Option<String>,

        /// Destination wallet, overrides the configured target
        #[clap(long)]
        to: Option<String>,
    },

    /// Mint a one-of-one NFT with metadata and a master edition
    MintNft {
        /// NFT name recorded in the metadata account
        #[clap(long)]
        name: Option<String>,

        /// NFT symbol recorded in the metadata account
        #[clap(long)]
        symbol: Option<String>,

        /// URI of the off-chain metadata JSON
        #[clap(long)]
        uri: Option<String>,

        /// Royalty in basis points
        #[clap(long)]
        seller_fee_basis_points: Option<u16>,
    },

    /// Read and update the payer's on-chain todo list
    #[clap(subcommand)]
    Todo(TodoCommand),

    /// Prepare and inspect the AMM program's test fixtures
    #[clap(subcommand)]
    Amm(AmmCommand),

    /// Manage the local address registry
    #[clap(subcommand)]
    Keys(KeysCommand),
}

#[derive(Subcommand, Debug)]
enum TodoCommand {
    /// List every todo on the payer's profile
    List,

    /// Flip the completed flag on the given todo indexes
    Toggle { indexes: Vec<u8> },
}

#[derive(Subcommand, Debug)]
enum AmmCommand {
    /// Print every address the AMM program derives for the saved fixtures
    Addresses {
        /// AMM id, overrides the saved amm-id keypair
        #[clap(long)]
        id: Option<String>,

        /// First token mint, overrides the saved amm-mint-a keypair
        #[clap(long)]
        mint_a: Option<String>,

        /// Second token mint, overrides the saved amm-mint-b keypair
        #[clap(long)]
        mint_b: Option<String>,
    },

    /// Fund a depositor wallet and create the two test mints
    Setup,
}

#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// List saved addresses
    List,

    /// Save an address under a name
    Save { name: String, address: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Command::Init = args.command {
        let settings = Settings::generate()?;
        settings.save(&args.config)?;
        println!("Default config generated at: {}", args.config);
        println!("Payer wallet public key: {}", settings.payer_keypair()?.pubkey());
        println!("Please fund this wallet before sending transactions");
        return Ok(());
    }

    // Load config
    let settings = Settings::load(&args.config)?;

    match args.command {
        Command::Init => Ok(()), // handled above
        Command::ShowWallet => {
            let payer = settings.payer_keypair()?;
            let client = rpc::connect(&settings.rpc_url);

            println!("Payer wallet public key: {}", payer.pubkey());
            let balance = client
                .get_balance(&payer.pubkey())
                .context("Failed to fetch balance")?;
            println!("Current balance of 'payer' (in lamports): {}", balance);
            println!(
                "Explorer URL: {}",
                explorer::address_url(&payer.pubkey(), &settings.cluster)
            );
            println!("Please fund this wallet before sending transactions");
            Ok(())
        }
        Command::Airdrop => run_airdrop(&settings),
        Command::Transfer { to } => run_transfer(&settings, to),
        Command::CreateToken {
            name,
            symbol,
            decimals,
            uri,
            to,
        } => run_create_token(&settings, name, symbol, decimals, uri, to),
        Command::MintNft {
            name,
            symbol,
            uri,
            seller_fee_basis_points,
        } => run_mint_nft(&settings, name, symbol, uri, seller_fee_basis_points),
        Command::Todo(command) => run_todo(&settings, command).await,
        Command::Amm(command) => run_amm(&settings, command),
        Command::Keys(command) => run_keys(&settings, command),
    }
}

fn run_airdrop(settings: &Settings) -> Result<()> {
    let payer = settings.payer_keypair()?;
    let client = rpc::connect_with_check(&settings.rpc_url)?;

    println!("Payer address: {}", payer.pubkey());
    let balance = faucet::ensure_min_balance(&client, &payer.pubkey())?;
    println!("Current balance of 'payer' (in lamports): {}", balance);
    println!(
        "Explorer URL: {}",
        explorer::address_url(&payer.pubkey(), &settings.cluster)
    );
    Ok(())
}

fn run_transfer(settings: &Settings, to: Option<String>) -> Result<()> {
    let payer = settings.payer_keypair()?;
    let target = resolve_target(settings, to)?;
    let client = rpc::connect(&settings.rpc_url);

    println!("Payer address: {}", payer.pubkey());
    println!("Target wallet address: {}", target);

    let balance = faucet::ensure_min_balance(&client, &payer.pubkey())?;
    println!("Current balance of 'payer' (in lamports): {}", balance);

    let signature = transfer::run(&client, &payer, &target, &settings.cluster)?;
    println!("Transaction successfully sent.");
    println!(
        "Explorer URL: {}",
        explorer::tx_url(&signature, &settings.cluster)
    );
    Ok(())
}

fn run_create_token(
    settings: &Settings,
    name: Option<String>,
    symbol: Option<String>,
    decimals: Option<u8>,
    uri: Option<String>,
    to: Option<String>,
) -> Result<()> {
    let payer = settings.payer_keypair()?;
    let target = resolve_target(settings, to)?;
    let client = rpc::connect(&settings.rpc_url);

    println!("Payer address: {}", payer.pubkey());
    println!("Target wallet address: {}", target);

    let balance = faucet::ensure_min_balance(&client, &payer.pubkey())?;
    println!("Current balance of 'payer' (in lamports): {}", balance);

    let mut token = TokenConfig::default();
    if let Some(name) = name {
        token.name = name;
    }
    if let Some(symbol) = symbol {
        token.symbol = symbol;
    }
    if let Some(decimals) = decimals {
        token.decimals = decimals;
    }
    if let Some(uri) = uri {
        token.uri = uri;
    }

    let signature = token::run(
        &client,
        &payer,
        &target,
        &token,
        &settings.keys_dir(),
        &settings.cluster,
    )?;
    println!("Transaction successfully sent.");
    println!(
        "Explorer URL: {}",
        explorer::tx_url(&signature, &settings.cluster)
    );
    Ok(())
}

fn run_mint_nft(
    settings: &Settings,
    name: Option<String>,
    symbol: Option<String>,
    uri: Option<String>,
    seller_fee_basis_points: Option<u16>,
) -> Result<()> {
    let payer = settings.payer_keypair()?;
    let client = rpc::connect(&settings.rpc_url);

    println!("Payer address: {}", payer.pubkey());

    let balance = faucet::ensure_min_balance(&client, &payer.pubkey())?;
    println!("Current balance of 'payer' (in lamports): {}", balance);

    let mut nft = NftConfig::default();
    if let Some(name) = name {
        nft.name = name;
    }
    if let Some(symbol) = symbol {
        nft.symbol = symbol;
    }
    if let Some(uri) = uri {
        nft.uri = uri;
    }
    if let Some(basis_points) = seller_fee_basis_points {
        nft.seller_fee_basis_points = basis_points;
    }

    let signature = nft::run(&client, &payer, &nft, &settings.keys_dir(), &settings.cluster)?;
    println!("Transaction successfully sent.");
    println!(
        "Explorer URL: {}",
        explorer::tx_url(&signature, &settings.cluster)
    );
    Ok(())
}

async fn run_todo(settings: &Settings, command: TodoCommand) -> Result<()> {
    let payer = settings.payer_keypair()?;
    let client = rpc::connect(&settings.rpc_url);
    let todo_client = TodoClient::new();

    let (profile_address, profile) = todo_client.fetch_profile(&client, &payer.pubkey())?;

    match command {
        TodoCommand::List => {
            let records = todo_client.fetch_todos(&client, &profile_address, &profile)?;
            explorer::print_separator(None);
            print_todos(&profile, &records);
        }
        TodoCommand::Toggle { indexes } => {
            ensure!(!indexes.is_empty(), "No todo indexes given");

            let records = todo_client.fetch_todos(&client, &profile_address, &profile)?;
            let mut selected = Vec::with_capacity(indexes.len());
            for index in indexes {
                let record = records
                    .iter()
                    .find(|record| record.index == index)
                    .with_context(|| {
                        format!(
                            "No todo at index {} (profile has {})",
                            index, profile.todo_count
                        )
                    })?;
                selected.push(record.clone());
            }

            let requested = selected.len();
            let confirmed = todo_client
                .toggle_many(
                    &settings.rpc_url,
                    &settings.cluster,
                    Arc::new(payer),
                    selected,
                )
                .await?;
            println!("Confirmed {} of {} toggles", confirmed, requested);

            // show the list in its new state
            let records = todo_client.fetch_todos(&client, &profile_address, &profile)?;
            explorer::print_separator(None);
            print_todos(&profile, &records);
        }
    }
    Ok(())
}

fn run_amm(settings: &Settings, command: AmmCommand) -> Result<()> {
    match command {
        AmmCommand::Addresses { id, mint_a, mint_b } => {
            let keys_dir = settings.keys_dir();
            let id = resolve_amm_key(id.as_deref(), "amm-id", &keys_dir)?;
            let mint_a = resolve_amm_key(mint_a.as_deref(), "amm-mint-a", &keys_dir)?;
            let mint_b = resolve_amm_key(mint_b.as_deref(), "amm-mint-b", &keys_dir)?;

            let addresses = amm::derive_addresses(&amm::AMM_PROGRAM_ID, &id, &mint_a, &mint_b);
            amm::print_addresses(&addresses);
        }
        AmmCommand::Setup => {
            let payer = settings.payer_keypair()?;
            let client = rpc::connect(&settings.rpc_url);

            println!("Payer address: {}", payer.pubkey());
            let balance = faucet::ensure_min_balance(&client, &payer.pubkey())?;
            println!("Current balance of 'payer' (in lamports): {}", balance);

            let addresses = amm::run_setup(&client, &payer, &settings.keys_dir(), &settings.cluster)?;
            explorer::print_separator(None);
            amm::print_addresses(&addresses);
        }
    }
    Ok(())
}

fn run_keys(settings: &Settings, command: KeysCommand) -> Result<()> {
    let registry_path = settings.registry_path();
    match command {
        KeysCommand::List => {
            let registry = keystore::load_public_keys(&registry_path);
            if registry.is_empty() {
                println!("No saved addresses at {}", registry_path.display());
                return Ok(());
            }

            let mut names: Vec<_> = registry.keys().collect();
            names.sort();
            for name in names {
                println!("{}: {}", name, registry[name]);
            }
        }
        KeysCommand::Save { name, address } => {
            let pubkey = Pubkey::from_str(&address)
                .with_context(|| format!("Invalid address: {}", address))?;
            keystore::save_public_key(&name, &pubkey, &registry_path)?;
            println!("Saved {}: {}", name, pubkey);
        }
    }
    Ok(())
}

fn resolve_target(settings: &Settings, explicit: Option<String>) -> Result<Pubkey> {
    match explicit {
        Some(address) => Pubkey::from_str(&address).context("Invalid target wallet address"),
        None => settings.target_pubkey(),
    }
}

// explicit address on the command line wins over the keypair saved by `amm setup`
fn resolve_amm_key(explicit: Option<&str>, file: &str, keys_dir: &Path) -> Result<Pubkey> {
    if let Some(address) = explicit {
        return Pubkey::from_str(address).with_context(|| format!("Invalid address: {}", address));
    }

    let keypair = keystore::load_keypair(&keys_dir.join(format!("{}.json", file)))
        .with_context(|| format!("No saved {} keypair, run `amm setup` first", file))?;
    Ok(keypair.pubkey())
}

fn print_todos(profile: &todo::Profile, records: &[todo::TodoRecord]) {
    println!("Profile: {} ({} todos)", profile.name, profile.todo_count);
    for record in records {
        let mark = if record.todo.completed { "x" } else { " " };
        println!("[{}] {}: {}", mark, record.index, record.todo.content);
    }
}

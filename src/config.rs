use anyhow::{anyhow, Context, Result};
use bip39::Mnemonic;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Keypair};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::keystore;

// Layered settings: JSON config file first, then environment variables on top.
// The aliases keep the env names the flows have always used working
// (LOCAL_PAYER_JSON_ABSPATH, TARGET_WALLET_ADDRESS, RPC_URL, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // RPC endpoint URL
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    // Cluster name appended to explorer links
    #[serde(default = "default_cluster")]
    pub cluster: String,
    // Path to the payer keypair JSON file
    #[serde(default, alias = "local_payer_json_abspath", skip_serializing_if = "Option::is_none")]
    pub payer_path: Option<String>,
    // Destination wallet for the transfer and token flows
    #[serde(default, alias = "target_wallet_address", skip_serializing_if = "Option::is_none")]
    pub target_wallet: Option<String>,
    // Directory holding generated keypairs and the address registry
    #[serde(default = "default_keys_dir")]
    pub keys_dir: String,
    // base58-encoded secret key, used as the payer when no file path is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    // BIP39 mnemonic, the last payer fallback before the solana CLI keypair
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_phrase: Option<String>,
}

fn default_rpc_url() -> String {
    "https://api.devnet.solana.com".to_string()
}

fn default_cluster() -> String {
    "devnet".to_string()
}

fn default_keys_dir() -> String {
    keystore::DEFAULT_KEY_DIR.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            cluster: default_cluster(),
            payer_path: None,
            target_wallet: None,
            keys_dir: default_keys_dir(),
            secret_key: None,
            seed_phrase: None,
        }
    }
}

impl Settings {
    pub fn load(config_path: &str) -> Result<Self> {
        config::Config::builder()
            .add_source(config::File::from(Path::new(config_path)).required(false))
            .add_source(config::Environment::default())
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    pub fn save(&self, config_path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;

        // Create parent directories if they don't exist
        if let Some(parent) = PathBuf::from(config_path).parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(config_path, content)?;
        Ok(())
    }

    // Fresh config carrying a generated payer mnemonic, used by `init`
    pub fn generate() -> Result<Self> {
        let mut entropy = [0u8; 16]; // 16 bytes for 12 words
        OsRng.fill_bytes(&mut entropy);
        let mnemonic = Mnemonic::from_entropy(&entropy)
            .map_err(|e| anyhow!("Failed to generate mnemonic: {}", e))?;

        let mut settings = Self::default();
        settings.seed_phrase = Some(mnemonic.to_string());
        Ok(settings)
    }

    // Resolve the payer keypair: explicit file path, then base58 secret,
    // then mnemonic, then the standard solana CLI keypair
    pub fn payer_keypair(&self) -> Result<Keypair> {
        if let Some(path) = &self.payer_path {
            let path = expand_home(path);
            return keystore::load_keypair(&path)
                .with_context(|| format!("Failed to load payer keypair from {}", path.display()));
        }

        if let Some(encoded) = &self.secret_key {
            return keystore::keypair_from_base58(encoded);
        }

        if let Some(phrase) = &self.seed_phrase {
            return keystore::keypair_from_mnemonic(phrase);
        }

        if let Some(path) = default_cli_keypair_path() {
            if path.exists() {
                return keystore::load_keypair(&path);
            }
        }

        Err(anyhow!(
            "No payer configured: set LOCAL_PAYER_JSON_ABSPATH, SECRET_KEY or SEED_PHRASE, or run `init`"
        ))
    }

    pub fn target_pubkey(&self) -> Result<Pubkey> {
        match &self.target_wallet {
            Some(address) => {
                Pubkey::from_str(address).context("Invalid target wallet address")
            }
            None => Err(anyhow!(
                "No target wallet configured: set TARGET_WALLET_ADDRESS or target_wallet in the config file"
            )),
        }
    }

    pub fn keys_dir(&self) -> PathBuf {
        PathBuf::from(&self.keys_dir)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.keys_dir().join(keystore::PUBLIC_KEY_FILE)
    }

    pub fn demo_path(&self) -> PathBuf {
        self.keys_dir().join(keystore::DEMO_DATA_FILE)
    }
}

// ~/.config/solana/id.json, where the solana CLI keeps its keypair
fn default_cli_keypair_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("solana").join("id.json"))
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

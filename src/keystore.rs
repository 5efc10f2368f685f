//! Keypair files and the local address registry.
//!
//! Registry updates are plain read-modify-write JSON with no file locking:
//! two processes writing at once can interleave and the last writer wins.

use anyhow::{anyhow, bail, Context, Result};
use bip39::Mnemonic;
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::keypair::keypair_from_seed};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_KEY_DIR: &str = ".local_keys";
pub const PUBLIC_KEY_FILE: &str = "keys.json";
pub const DEMO_DATA_FILE: &str = "demo.json";

// ed25519 secret + public halves
const KEYPAIR_BYTES: usize = 64;

/// Load a JSON keypair file (the standard byte-array format) into a `Keypair`.
pub fn load_keypair(path: &Path) -> Result<Keypair> {
    if path.as_os_str().is_empty() {
        bail!("No path provided");
    }
    if !path.exists() {
        bail!("File does not exist: {}", path.display());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read keypair file {}", path.display()))?;
    let bytes: Vec<u8> = serde_json::from_str(&content)
        .with_context(|| format!("Keypair file {} is not a JSON byte array", path.display()))?;

    if bytes.len() != KEYPAIR_BYTES {
        bail!(
            "Keypair file {} holds {} bytes, expected {}",
            path.display(),
            bytes.len(),
            KEYPAIR_BYTES
        );
    }

    Keypair::from_bytes(&bytes)
        .map_err(|e| anyhow!("Invalid secret key in {}: {}", path.display(), e))
}

/// Write a keypair to `<dir>/<name>.json`, replacing any existing file.
pub fn save_keypair(keypair: &Keypair, name: &str, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create key directory {}", dir.display()))?;

    let path = dir.join(format!("{}.json", name));
    let bytes = keypair.to_bytes().to_vec();
    fs::write(&path, serde_json::to_string(&bytes)?)
        .with_context(|| format!("Failed to write keypair file {}", path.display()))?;

    Ok(path)
}

/// Load `<dir>/<name>.json` when it exists, otherwise generate a keypair
/// and persist it there.
pub fn load_or_generate_keypair(name: &str, dir: &Path) -> Result<Keypair> {
    let path = dir.join(format!("{}.json", name));
    if path.exists() {
        return load_keypair(&path);
    }

    let keypair = Keypair::new();
    save_keypair(&keypair, name, dir)?;
    Ok(keypair)
}

pub fn keypair_from_base58(encoded: &str) -> Result<Keypair> {
    let bytes = bs58::decode(encoded.trim())
        .into_vec()
        .context("Secret key is not valid base58")?;

    if bytes.len() != KEYPAIR_BYTES {
        bail!(
            "base58 secret decodes to {} bytes, expected {}",
            bytes.len(),
            KEYPAIR_BYTES
        );
    }

    Keypair::from_bytes(&bytes).map_err(|e| anyhow!("Invalid secret key: {}", e))
}

pub fn keypair_from_mnemonic(phrase: &str) -> Result<Keypair> {
    let mnemonic = Mnemonic::parse_normalized(phrase)
        .map_err(|e| anyhow!("Invalid mnemonic phrase: {}", e))?;

    // empty passphrase, first 32 seed bytes
    let seed = mnemonic.to_seed("");
    keypair_from_seed(&seed[..32])
        .map_err(|e| anyhow!("Failed to create keypair from seed: {}", e))
}

/// Load the locally stored addresses. Missing or unreadable files yield an
/// empty map so callers always get something usable.
pub fn load_public_keys(path: &Path) -> HashMap<String, Pubkey> {
    fn read(path: &Path) -> Result<HashMap<String, Pubkey>> {
        let content = fs::read_to_string(path)?;
        let raw: HashMap<String, String> = serde_json::from_str(&content)?;

        let mut keys = HashMap::new();
        for (name, address) in raw {
            keys.insert(name, Pubkey::from_str(&address)?);
        }
        Ok(keys)
    }

    read(path).unwrap_or_default()
}

/// Merge one named address into the registry file and return the new contents.
pub fn save_public_key(name: &str, address: &Pubkey, path: &Path) -> Result<HashMap<String, Pubkey>> {
    let mut data: HashMap<String, String> = load_public_keys(path)
        .into_iter()
        .map(|(name, pubkey)| (name, pubkey.to_string()))
        .collect();
    data.insert(name.to_string(), address.to_string());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, serde_json::to_string(&data)?)
        .with_context(|| format!("Failed to write registry file {}", path.display()))?;

    // reload for sanity
    Ok(load_public_keys(path))
}

/// Merge one named JSON value into the demo data file and return the new
/// contents.
pub fn save_demo_data(name: &str, value: serde_json::Value, path: &Path) -> Result<serde_json::Value> {
    let mut data = match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str::<serde_json::Value>(&content)
            .ok()
            .and_then(|value| value.as_object().cloned())
            .unwrap_or_default(),
        Err(_) => serde_json::Map::new(),
    };
    data.insert(name.to_string(), value);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, serde_json::to_string(&data)?)
        .with_context(|| format!("Failed to write demo data file {}", path.display()))?;

    Ok(serde_json::Value::Object(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use solana_sdk::signature::Signer;

    #[test]
    fn keypair_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let keypair = Keypair::new();

        let path = save_keypair(&keypair, "payer", dir.path()).unwrap();
        assert_eq!(path, dir.path().join("payer.json"));

        let loaded = load_keypair(&path).unwrap();
        assert_eq!(loaded.pubkey(), keypair.pubkey());
        assert_eq!(loaded.to_bytes(), keypair.to_bytes());
    }

    #[test]
    fn load_rejects_bad_inputs() {
        let dir = tempfile::tempdir().unwrap();

        assert!(load_keypair(Path::new("")).is_err());
        assert!(load_keypair(&dir.path().join("missing.json")).is_err());

        let not_json = dir.path().join("not-json.json");
        fs::write(&not_json, "hello").unwrap();
        assert!(load_keypair(&not_json).is_err());

        let short = dir.path().join("short.json");
        fs::write(&short, "[1,2,3]").unwrap();
        assert!(load_keypair(&short).is_err());
    }

    #[test]
    fn load_or_generate_is_stable_per_name() {
        let dir = tempfile::tempdir().unwrap();

        let first = load_or_generate_keypair("mint", dir.path()).unwrap();
        let second = load_or_generate_keypair("mint", dir.path()).unwrap();
        assert_eq!(first.pubkey(), second.pubkey());

        let other = load_or_generate_keypair("other", dir.path()).unwrap();
        assert_ne!(other.pubkey(), first.pubkey());
    }

    #[test]
    fn registry_merges_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");

        let mint = Keypair::new().pubkey();
        let ata = Keypair::new().pubkey();

        let keys = save_public_key("tokenMint", &mint, &path).unwrap();
        assert_eq!(keys.get("tokenMint"), Some(&mint));

        let keys = save_public_key("tokenAccount", &ata, &path).unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.get("tokenMint"), Some(&mint));
        assert_eq!(keys.get("tokenAccount"), Some(&ata));

        // overwrite under the same name
        let replacement = Keypair::new().pubkey();
        let keys = save_public_key("tokenMint", &replacement, &path).unwrap();
        assert_eq!(keys.get("tokenMint"), Some(&replacement));
    }

    #[test]
    fn registry_tolerates_missing_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("keys.json");
        assert!(load_public_keys(&missing).is_empty());

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{not json").unwrap();
        assert!(load_public_keys(&corrupt).is_empty());

        let bad_value = dir.path().join("bad-value.json");
        fs::write(&bad_value, r#"{"mint":"not-a-pubkey"}"#).unwrap();
        assert!(load_public_keys(&bad_value).is_empty());
    }

    #[test]
    fn demo_data_merges_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.json");

        save_demo_data("token", json!({"decimals": 6}), &path).unwrap();
        let data = save_demo_data("nft", json!({"supply": 1}), &path).unwrap();

        assert_eq!(data["token"]["decimals"], 6);
        assert_eq!(data["nft"]["supply"], 1);
    }

    #[test]
    fn base58_secret_roundtrip() {
        let keypair = Keypair::new();
        let encoded = keypair.to_base58_string();

        let decoded = keypair_from_base58(&encoded).unwrap();
        assert_eq!(decoded.pubkey(), keypair.pubkey());

        assert!(keypair_from_base58("abc").is_err());
        assert!(keypair_from_base58("0OIl").is_err());
    }

    #[test]
    fn mnemonic_derivation_is_deterministic() {
        let phrase =
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

        let first = keypair_from_mnemonic(phrase).unwrap();
        let second = keypair_from_mnemonic(phrase).unwrap();
        assert_eq!(first.pubkey(), second.pubkey());

        assert!(keypair_from_mnemonic("not a real mnemonic phrase").is_err());
    }
}

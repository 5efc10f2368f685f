//! Client for the on-chain todo program, covering what the dApp frontend
//! does: fetch the profile, list its todos, and toggle completion.

use anyhow::{ensure, Context, Result};
use borsh::{BorshDeserialize, BorshSerialize};
use futures::future;
use sha2::{Digest, Sha256};
use solana_client::rpc_client::RpcClient;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use std::sync::{Arc, Mutex};

use crate::{builder, rpc};

pub const TODO_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("HM2R1eMHED4LQJAPttv2kHaJQTTXM5JHTwLWBGFUYMkE");

// getMultipleAccounts RPC cap
const ACCOUNT_BATCH: usize = 100;

// anchor's sighash convention: first 8 bytes of sha256("namespace:name")
fn sighash(namespace: &str, name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("{}:{}", namespace, name).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

pub fn account_discriminator(name: &str) -> [u8; 8] {
    sighash("account", name)
}

pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    sighash("global", name)
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct Profile {
    pub key: [u8; 32],
    pub name: String,
    pub todo_count: u8,
}

impl Profile {
    pub fn wallet(&self) -> Pubkey {
        Pubkey::new_from_array(self.key)
    }
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct Todo {
    pub profile: [u8; 32],
    pub content: String,
    pub completed: bool,
}

#[derive(Debug, Clone)]
pub struct TodoRecord {
    pub index: u8,
    pub address: Pubkey,
    pub todo: Todo,
}

// anchor account: 8-byte discriminator, borsh body, then whatever padding
// the account was allocated with
fn decode_account<T: BorshDeserialize>(name: &str, data: &[u8]) -> Result<T> {
    ensure!(data.len() >= 8, "Account data too short for a {} account", name);
    ensure!(
        data[..8] == account_discriminator(name),
        "Account is not a {} account",
        name
    );

    let mut body = &data[8..];
    T::deserialize(&mut body).with_context(|| format!("Failed to decode {} account", name))
}

struct CacheEntry {
    profile: Pubkey,
    todo_count: u8,
    todos: Vec<TodoRecord>,
}

/// Todo program client with the frontend's caching behavior: the todo list
/// is cached under (profile address, todo count) and dropped after any
/// mutation confirms, so the next list call re-fetches.
pub struct TodoClient {
    program_id: Pubkey,
    cache: Mutex<Option<CacheEntry>>,
}

impl TodoClient {
    pub fn new() -> Self {
        Self {
            program_id: TODO_PROGRAM_ID,
            cache: Mutex::new(None),
        }
    }

    pub fn profile_pda(&self, authority: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[b"profile", authority.as_ref()], &self.program_id).0
    }

    pub fn todo_pda(&self, profile: &Pubkey, index: u8) -> Pubkey {
        Pubkey::find_program_address(&[b"todo", profile.as_ref(), &[index]], &self.program_id).0
    }

    pub fn fetch_profile(&self, client: &RpcClient, authority: &Pubkey) -> Result<(Pubkey, Profile)> {
        let address = self.profile_pda(authority);
        let account = client
            .get_account(&address)
            .with_context(|| format!("No profile found for wallet {}", authority))?;
        ensure!(
            account.owner == self.program_id,
            "Profile account {} is owned by the wrong program",
            address
        );

        let profile = decode_account::<Profile>("Profile", &account.data)?;
        Ok((address, profile))
    }

    /// List the profile's todos in index order. Served from cache while the
    /// profile's todo count is unchanged.
    pub fn fetch_todos(
        &self,
        client: &RpcClient,
        profile_address: &Pubkey,
        profile: &Profile,
    ) -> Result<Vec<TodoRecord>> {
        if let Some(todos) = self.cached(profile_address, profile.todo_count) {
            return Ok(todos);
        }

        let addresses: Vec<Pubkey> = (0..profile.todo_count)
            .map(|index| self.todo_pda(profile_address, index))
            .collect();

        let mut todos = Vec::with_capacity(addresses.len());
        for (batch, chunk) in addresses.chunks(ACCOUNT_BATCH).enumerate() {
            let accounts = client
                .get_multiple_accounts(chunk)
                .context("Failed to fetch todo accounts")?;

            for (offset, account) in accounts.into_iter().enumerate() {
                if let Some(account) = account {
                    let todo = decode_account::<Todo>("Todo", &account.data)?;
                    todos.push(TodoRecord {
                        index: (batch * ACCOUNT_BATCH + offset) as u8,
                        address: chunk[offset],
                        todo,
                    });
                }
            }
        }

        self.store(profile_address, profile.todo_count, &todos);
        Ok(todos)
    }

    pub fn toggle_instruction(&self, todo: &Pubkey, authority: &Pubkey) -> Instruction {
        Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new(*todo, false),
                AccountMeta::new_readonly(*authority, true),
            ],
            data: instruction_discriminator("toggle_todo").to_vec(),
        }
    }

    /// Toggle several todos at once, one transaction per todo submitted
    /// concurrently. Each toggle succeeds or fails on its own; the cache is
    /// dropped afterwards either way. Returns the number of confirmed
    /// toggles.
    pub async fn toggle_many(
        &self,
        rpc_url: &str,
        cluster: &str,
        payer: Arc<Keypair>,
        todos: Vec<TodoRecord>,
    ) -> Result<usize> {
        let mut handles = Vec::with_capacity(todos.len());

        for record in todos {
            let url = rpc_url.to_string();
            let cluster = cluster.to_string();
            let payer = payer.clone();
            let instruction = self.toggle_instruction(&record.address, &payer.pubkey());
            let index = record.index;

            handles.push(tokio::spawn(async move {
                let client = rpc::connect(&url);
                let tx = builder::build_signed_transaction(
                    &client,
                    &payer.pubkey(),
                    &[&*payer],
                    &[instruction],
                )?;
                let signature = builder::send_and_confirm(&client, &tx, &cluster)?;
                Ok::<(u8, Signature), anyhow::Error>((index, signature))
            }));
        }

        let results = future::join_all(handles).await;

        // any confirmed toggle changed on-chain state, re-fetch next time
        self.invalidate_cache();

        let mut confirmed = 0;
        for result in results {
            match result {
                Ok(Ok((index, signature))) => {
                    println!("Toggled todo {}: {}", index, signature);
                    confirmed += 1;
                }
                Ok(Err(err)) => println!("Toggle failed: {:#}", err),
                Err(err) => println!("Toggle task failed: {}", err),
            }
        }

        Ok(confirmed)
    }

    fn cached(&self, profile: &Pubkey, todo_count: u8) -> Option<Vec<TodoRecord>> {
        let cache = self.cache.lock().unwrap();
        let entry = cache.as_ref()?;
        if entry.profile == *profile && entry.todo_count == todo_count {
            return Some(entry.todos.clone());
        }
        None
    }

    fn store(&self, profile: &Pubkey, todo_count: u8, todos: &[TodoRecord]) {
        let mut cache = self.cache.lock().unwrap();
        *cache = Some(CacheEntry {
            profile: *profile,
            todo_count,
            todos: todos.to_vec(),
        });
    }

    pub fn invalidate_cache(&self) {
        let mut cache = self.cache.lock().unwrap();
        *cache = None;
    }
}

impl Default for TodoClient {
    fn default() -> Self {
        Self::new()
    }
}

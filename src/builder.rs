use anyhow::{ensure, Context, Result};
use solana_client::rpc_client::RpcClient;
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    packet::PACKET_DATA_SIZE,
    pubkey::Pubkey,
    signature::Signature,
    signers::Signers,
    transaction::Transaction,
};

use crate::rpc;

/// Compile instructions into a transaction and sign it. Pure except for the
/// blockhash fetch, so the offline [`compile`] step carries all the rules:
/// the instruction list keeps its order, every required signer must be
/// present, and the wire size has to fit in a single packet.
pub fn build_signed_transaction<T: Signers + ?Sized>(
    client: &RpcClient,
    payer: &Pubkey,
    signers: &T,
    instructions: &[Instruction],
) -> Result<Transaction> {
    let blockhash = client
        .get_latest_blockhash()
        .context("Failed to fetch a recent blockhash")?;

    compile(instructions, payer, signers, blockhash)
}

pub fn compile<T: Signers + ?Sized>(
    instructions: &[Instruction],
    payer: &Pubkey,
    signers: &T,
    blockhash: Hash,
) -> Result<Transaction> {
    ensure!(!instructions.is_empty(), "Refusing to build an empty transaction");

    let mut tx = Transaction::new_with_payer(instructions, Some(payer));
    tx.try_sign(signers, blockhash)
        .context("A required signer was missing or invalid")?;

    let wire_size = bincode::serialize(&tx)
        .context("Failed to serialize transaction")?
        .len();
    ensure!(
        wire_size <= PACKET_DATA_SIZE,
        "Transaction is {} bytes, above the {} byte packet limit",
        wire_size,
        PACKET_DATA_SIZE
    );

    Ok(tx)
}

/// Send a signed transaction and wait for confirmation. On failure the
/// signature is dug out of the error message and the on-chain logs printed
/// before the error propagates.
pub fn send_and_confirm(
    client: &RpcClient,
    tx: &Transaction,
    cluster: &str,
) -> Result<Signature> {
    match client.send_and_confirm_transaction(tx) {
        Ok(signature) => Ok(signature),
        Err(err) => {
            let message = err.to_string();
            if let Some(failed) = rpc::extract_failed_signature(&message) {
                rpc::print_transaction_logs(client, &failed, cluster);
            }
            Err(err).context("Transaction was not confirmed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{
        native_token::LAMPORTS_PER_SOL,
        signature::{Keypair, Signer},
        system_instruction, system_program,
    };

    fn blockhash() -> Hash {
        Hash::new_from_array([1; 32])
    }

    #[test]
    fn signs_with_every_required_signer() {
        let payer = Keypair::new();
        let new_account = Keypair::new();

        let instructions = [system_instruction::create_account(
            &payer.pubkey(),
            &new_account.pubkey(),
            LAMPORTS_PER_SOL,
            0,
            &system_program::id(),
        )];

        let tx = compile(
            &instructions,
            &payer.pubkey(),
            &[&payer, &new_account],
            blockhash(),
        )
        .unwrap();

        assert_eq!(tx.signatures.len(), 2);
        assert!(tx.verify().is_ok());
        assert_eq!(tx.message.account_keys[0], payer.pubkey());
    }

    #[test]
    fn missing_signer_is_an_error() {
        let payer = Keypair::new();
        let new_account = Keypair::new();

        let instructions = [system_instruction::create_account(
            &payer.pubkey(),
            &new_account.pubkey(),
            LAMPORTS_PER_SOL,
            0,
            &system_program::id(),
        )];

        // the new account never signs
        let result = compile(&instructions, &payer.pubkey(), &[&payer], blockhash());
        assert!(result.is_err());
    }

    #[test]
    fn instruction_order_is_preserved() {
        let payer = Keypair::new();
        let first = Pubkey::new_from_array([1; 32]);
        let second = Pubkey::new_from_array([2; 32]);
        let third = Pubkey::new_from_array([3; 32]);

        let instructions = [
            system_instruction::transfer(&payer.pubkey(), &first, 1),
            system_instruction::transfer(&payer.pubkey(), &second, 2),
            system_instruction::transfer(&payer.pubkey(), &third, 3),
        ];

        let tx = compile(&instructions, &payer.pubkey(), &[&payer], blockhash()).unwrap();

        let recipients: Vec<Pubkey> = tx
            .message
            .instructions
            .iter()
            .map(|ix| tx.message.account_keys[ix.accounts[1] as usize])
            .collect();
        assert_eq!(recipients, vec![first, second, third]);
    }

    #[test]
    fn rejects_an_empty_instruction_list() {
        let payer = Keypair::new();
        assert!(compile(&[], &payer.pubkey(), &[&payer], blockhash()).is_err());
    }

    #[test]
    fn rejects_oversized_transactions() {
        let payer = Keypair::new();
        let instructions = [Instruction {
            program_id: Pubkey::new_from_array([9; 32]),
            accounts: vec![],
            data: vec![0; PACKET_DATA_SIZE],
        }];

        let result = compile(&instructions, &payer.pubkey(), &[&payer], blockhash());
        assert!(result.is_err());
    }
}

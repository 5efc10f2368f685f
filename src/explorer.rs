use solana_sdk::{pubkey::Pubkey, signature::Signature};
use url::Url;

pub const DEFAULT_CLUSTER: &str = "devnet";

// printed when there is nothing to link to
pub const UNKNOWN_LINK: &str = "[unknown]";

/// Build an explorer.solana.com link for an address or a transaction
/// signature. An address wins when both are given; with neither, the
/// `[unknown]` placeholder comes back instead of a URL. Links carry a
/// `cluster` query parameter and a trailing newline.
pub fn explorer_url(address: Option<&str>, tx_signature: Option<&str>, cluster: Option<&str>) -> String {
    let base = if let Some(address) = address {
        format!("https://explorer.solana.com/address/{}", address)
    } else if let Some(signature) = tx_signature {
        format!("https://explorer.solana.com/tx/{}", signature)
    } else {
        return UNKNOWN_LINK.to_string();
    };

    let mut url = match Url::parse(&base) {
        Ok(url) => url,
        Err(_) => return UNKNOWN_LINK.to_string(),
    };
    url.query_pairs_mut()
        .append_pair("cluster", cluster.unwrap_or(DEFAULT_CLUSTER));

    format!("{}\n", url)
}

pub fn address_url(address: &Pubkey, cluster: &str) -> String {
    explorer_url(Some(&address.to_string()), None, Some(cluster))
}

pub fn tx_url(signature: &Signature, cluster: &str) -> String {
    explorer_url(None, Some(&signature.to_string()), Some(cluster))
}

/// Print a console separator, optionally followed by a message.
pub fn print_separator(message: Option<&str>) {
    println!("\n===============================================");
    println!("===============================================\n");
    if let Some(message) = message {
        println!("{}", message);
    }
}

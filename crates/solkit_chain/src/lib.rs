// Local helpers for Solana demo scripts: named key storage, failed-signature
// recovery, and the RPC plumbing around them.

pub mod cluster;
pub mod error;
pub mod explorer;
pub mod key_store;
pub mod keypair;
pub mod pubkey;
pub mod rpc;
pub mod signature;

// Re-export primary types for convenient access.
pub use cluster::{Cluster, RpcConfig, validate_url};
pub use error::{ChainError, Result};
pub use explorer::{ExplorerCategory, explorer_link};
pub use key_store::{
    EntryDecode, KeyMap, KeyStore, StoredKey, default_key_store_path, ensure_key_dir,
    load_public_keys, save_public_key,
};
pub use keypair::{Keypair, KeypairSource, ensure_funded, load_keypair};
pub use pubkey::{Pubkey, PubkeyError};
pub use rpc::{LAMPORTS_PER_SOL, RpcClient, lamports_to_sol, sol_to_lamports};
pub use signature::{
    FailedCall, SignatureExtractor, TransactionLogSource, match_failed_signature,
};

pub mod bip32;
pub mod buffer;
pub mod error;
pub mod mnemonic;
pub mod secp256k1;
pub mod seed;
pub mod ssh;

pub use bip32::{derive_master_key, ExtendedKey, MasterKey, Network};
pub use error::{KeyError, Result};
pub use mnemonic::{generate_mnemonic, validate_mnemonic};
pub use secp256k1::{PrivateKey, PublicKey};
pub use seed::{derive_seed, Seed};
pub use ssh::{derive_ssh_keypair, SshKeyPair};

use core::fmt;

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// Knobs for one derivation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyOptions {
    pub network: Network,
    /// Appended to both SSH keys when set.
    pub ssh_comment: Option<String>,
    /// Size of a freshly generated mnemonic.
    pub entropy_bits: usize,
}

impl Default for KeyOptions {
    fn default() -> Self {
        KeyOptions {
            network: Network::Mainnet,
            ssh_comment: None,
            entropy_bits: 256,
        }
    }
}

/// Every key derived from one mnemonic and passphrase.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBundle {
    pub master_private_key: String,
    pub master_public_key: String,
    pub ssh_private_key: String,
    pub ssh_public_key: String,
}

impl fmt::Debug for KeyBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBundle")
            .field("master_private_key", &"[REDACTED]")
            .field("master_public_key", &self.master_public_key)
            .field("ssh_private_key", &"[REDACTED]")
            .field("ssh_public_key", &self.ssh_public_key)
            .finish()
    }
}

/// Mainnet extended keys and an uncommented SSH keypair.
pub fn generate_keys(mnemonic: &str, passphrase: &str) -> Result<KeyBundle> {
    generate_keys_with(mnemonic, passphrase, &KeyOptions::default())
}

/// Mnemonic → seed → master key → {xprv, xpub, SSH keypair}.
///
/// The mnemonic is not validated here; any text yields a seed.
pub fn generate_keys_with(
    mnemonic: &str,
    passphrase: &str,
    options: &KeyOptions,
) -> Result<KeyBundle> {
    let seed = derive_seed(mnemonic, passphrase);
    let master = derive_master_key(seed.as_bytes())?;
    let ssh_keys = derive_ssh_keypair(&master.private_key);
    let comment = options.ssh_comment.as_deref();

    Ok(KeyBundle {
        master_private_key: master.to_extended_private(options.network).serialize()?,
        master_public_key: master.to_extended_public(options.network).serialize()?,
        ssh_private_key: ssh::encode_private(&ssh_keys, comment)?,
        ssh_public_key: ssh::encode_public(&ssh_keys, comment)?,
    })
}

/// Like [`generate_keys_with`], but a blank mnemonic is replaced by a fresh
/// one drawn from `rng`. Returns the mnemonic actually used.
pub fn generate_or_use<R: RngCore + CryptoRng>(
    rng: &mut R,
    mnemonic: &str,
    passphrase: &str,
    options: &KeyOptions,
) -> Result<(String, KeyBundle)> {
    let mnemonic = match mnemonic.trim() {
        "" => generate_mnemonic(rng, options.entropy_bits)?,
        given => given.to_string(),
    };
    let keys = generate_keys_with(&mnemonic, passphrase, options)?;
    Ok((mnemonic, keys))
}

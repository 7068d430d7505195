use core::fmt;

use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

pub const SEED_LEN: usize = 64;

const PBKDF2_ROUNDS: u32 = 2048;
const SALT_PREFIX: &str = "mnemonic";

/// 64-byte BIP-39 seed. Cleared from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; SEED_LEN]);

impl Seed {
    pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Seed(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }
}

impl AsRef<[u8]> for Seed {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed([REDACTED])")
    }
}

/// Stretch a mnemonic and passphrase into a seed with PBKDF2-HMAC-SHA512.
///
/// Any text is accepted; the mnemonic is not checked against the word list.
/// Both inputs are NFKD-normalized first.
pub fn derive_seed(mnemonic: &str, passphrase: &str) -> Seed {
    let password: Zeroizing<String> = Zeroizing::new(mnemonic.nfkd().collect());
    let mut salt: Zeroizing<String> = Zeroizing::new(String::from(SALT_PREFIX));
    salt.extend(passphrase.nfkd());

    let mut seed = [0u8; SEED_LEN];
    pbkdf2_hmac::<Sha512>(password.as_bytes(), salt.as_bytes(), PBKDF2_ROUNDS, &mut seed);
    Seed(seed)
}

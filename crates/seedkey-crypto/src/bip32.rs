use core::fmt;
use core::str::FromStr;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use crate::buffer::{LayoutWriter, Reader};
use crate::error::{KeyError, Result};
use crate::secp256k1::{PrivateKey, PublicKey};

const DOMAIN_SEPARATOR: &[u8] = b"Bitcoin seed";

pub const HARDENED_OFFSET: u32 = 1 << 31;

/// Size of the binary extended key record, before the Base58Check checksum.
pub const EXTENDED_KEY_LEN: usize = 78;

const CHECKSUM_LEN: usize = 4;

fn hmac_sha512(key: &[u8], data: &[u8]) -> [u8; 64] {
    let mut mac = Hmac::<Sha512>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

fn sha256d(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

fn check_encode(payload: &[u8]) -> String {
    let mut data = payload.to_vec();
    data.extend_from_slice(&sha256d(payload)[..CHECKSUM_LEN]);
    bs58::encode(data).into_string()
}

fn check_decode(s: &str) -> Result<Vec<u8>> {
    let mut data = bs58::decode(s).into_vec()?;
    if data.len() < CHECKSUM_LEN {
        return Err(KeyError::EncodingError(
            "base58check: data too short for checksum".to_string(),
        ));
    }
    let checksum = data.split_off(data.len() - CHECKSUM_LEN);
    if checksum[..] != sha256d(&data)[..CHECKSUM_LEN] {
        return Err(KeyError::InvalidChecksum);
    }
    Ok(data)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// `xprv` / `tprv`
    pub const fn private_version(self) -> u32 {
        match self {
            Network::Mainnet => 0x0488_ADE4,
            Network::Testnet => 0x0435_8394,
        }
    }

    /// `xpub` / `tpub`
    pub const fn public_version(self) -> u32 {
        match self {
            Network::Mainnet => 0x0488_B21E,
            Network::Testnet => 0x0435_87CF,
        }
    }

    /// Network and private/public flag for a version tag.
    pub fn from_version(version: u32) -> Option<(Network, bool)> {
        [Network::Mainnet, Network::Testnet]
            .into_iter()
            .find_map(|network| {
                if version == network.private_version() {
                    Some((network, true))
                } else if version == network.public_version() {
                    Some((network, false))
                } else {
                    None
                }
            })
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => f.write_str("mainnet"),
            Network::Testnet => f.write_str("testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            other => Err(KeyError::InvalidParameter(format!(
                "unknown network {other:?}"
            ))),
        }
    }
}

/// BIP-32 master key: secp256k1 keypair plus chain code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterKey {
    pub private_key: PrivateKey,
    pub public_key: PublicKey,
    pub chain_code: [u8; 32],
}

impl MasterKey {
    pub fn to_extended_private(&self, network: Network) -> ExtendedKey {
        ExtendedKey {
            version: network.private_version(),
            depth: 0,
            parent_fingerprint: [0u8; 4],
            child_number: 0,
            chain_code: self.chain_code,
            key_data: private_key_data(&self.private_key),
        }
    }

    pub fn to_extended_public(&self, network: Network) -> ExtendedKey {
        ExtendedKey {
            version: network.public_version(),
            depth: 0,
            parent_fingerprint: [0u8; 4],
            child_number: 0,
            chain_code: self.chain_code,
            key_data: self.public_key.to_compressed(),
        }
    }
}

fn private_key_data(private_key: &PrivateKey) -> [u8; 33] {
    let mut data = [0u8; 33];
    data[1..].copy_from_slice(&private_key.to_be_bytes());
    data
}

/// Derive the master key from a 16 to 64 byte seed.
///
/// Fails with [`KeyError::InvalidMasterKey`] when IL is zero or not below the
/// curve order; the seed is never rehashed.
pub fn derive_master_key(seed: &[u8]) -> Result<MasterKey> {
    if !(16..=64).contains(&seed.len()) {
        return Err(KeyError::InvalidParameter(format!(
            "seed must be 16 to 64 bytes, got {}",
            seed.len()
        )));
    }
    master_from_hmac(&hmac_sha512(DOMAIN_SEPARATOR, seed))
}

fn master_from_hmac(result: &[u8; 64]) -> Result<MasterKey> {
    let mut left = [0u8; 32];
    left.copy_from_slice(&result[..32]);
    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(&result[32..]);

    let private_key = PrivateKey::from_be_bytes(&left).ok_or(KeyError::InvalidMasterKey)?;
    let public_key = private_key.public_key();
    Ok(MasterKey {
        private_key,
        public_key,
        chain_code,
    })
}

/// Parse an `m/44'/0'/0/1` style path into child indices.
///
/// `'`, `h` or `H` after a component marks it hardened.
pub fn parse_path(path: &str) -> Result<Vec<u32>> {
    let invalid = |why: &str| KeyError::InvalidParameter(format!("derivation path {path:?}: {why}"));
    let mut parts = path.trim().split('/');
    if parts.next() != Some("m") {
        return Err(invalid("must start with \"m\""));
    }
    parts
        .map(|part| {
            let (digits, hardened) = match part.strip_suffix(['\'', 'h', 'H']) {
                Some(digits) => (digits, true),
                None => (part, false),
            };
            let index: u32 = digits
                .parse()
                .map_err(|_| invalid(&format!("bad component {part:?}")))?;
            if index >= HARDENED_OFFSET {
                return Err(invalid(&format!("index {index} out of range")));
            }
            Ok(if hardened { index | HARDENED_OFFSET } else { index })
        })
        .collect()
}

/// BIP-32 extended key in its serialized field layout.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtendedKey {
    pub version: u32,
    pub depth: u8,
    pub parent_fingerprint: [u8; 4],
    pub child_number: u32,
    pub chain_code: [u8; 32],
    /// `0x00 || scalar` for private keys, compressed point for public keys.
    pub key_data: [u8; 33],
}

impl ExtendedKey {
    pub fn network(&self) -> Option<Network> {
        Network::from_version(self.version).map(|(network, _)| network)
    }

    pub fn is_private(&self) -> bool {
        matches!(Network::from_version(self.version), Some((_, true)))
    }

    fn checked_network(&self) -> Result<(Network, bool)> {
        Network::from_version(self.version).ok_or_else(|| {
            KeyError::EncodingError(format!("unknown version 0x{:08x}", self.version))
        })
    }

    fn secret(&self) -> Result<Option<PrivateKey>> {
        if !self.checked_network()?.1 {
            return Ok(None);
        }
        if self.key_data[0] != 0x00 {
            return Err(KeyError::EncodingError(
                "private key data must start with 0x00".to_string(),
            ));
        }
        let mut scalar = [0u8; 32];
        scalar.copy_from_slice(&self.key_data[1..]);
        PrivateKey::from_be_bytes(&scalar)
            .map(Some)
            .ok_or_else(|| KeyError::EncodingError("private key out of range".to_string()))
    }

    /// The private key, if this is a well-formed private extended key.
    pub fn private_key(&self) -> Option<PrivateKey> {
        self.secret().ok().flatten()
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        match self.secret()? {
            Some(private_key) => Ok(private_key.public_key()),
            None => PublicKey::from_compressed(&self.key_data)
                .ok_or_else(|| KeyError::EncodingError("invalid public key point".to_string())),
        }
    }

    /// First four bytes of HASH160 of the public key.
    pub fn fingerprint(&self) -> Result<[u8; 4]> {
        let mut fingerprint = [0u8; 4];
        fingerprint.copy_from_slice(&self.public_key()?.hash160()[..4]);
        Ok(fingerprint)
    }

    /// Public counterpart of this key; public keys are returned unchanged.
    pub fn neuter(&self) -> Result<ExtendedKey> {
        let (network, private) = self.checked_network()?;
        if !private {
            return Ok(self.clone());
        }
        Ok(ExtendedKey {
            version: network.public_version(),
            key_data: self.public_key()?.to_compressed(),
            ..self.clone()
        })
    }

    /// Derive the child at `index`; indices from [`HARDENED_OFFSET`] up are hardened.
    ///
    /// Hardened children need the private key. An invalid child yields
    /// [`KeyError::InvalidChildKey`]; the caller picks the next index.
    pub fn derive_child(&self, index: u32) -> Result<ExtendedKey> {
        let depth = self
            .depth
            .checked_add(1)
            .ok_or_else(|| KeyError::InvalidParameter("maximum depth reached".to_string()))?;
        let secret = self.secret()?;
        let parent_public = self.public_key()?;

        let mut data = Vec::with_capacity(37);
        if index >= HARDENED_OFFSET {
            let private_key = secret.as_ref().ok_or_else(|| {
                KeyError::InvalidParameter(
                    "cannot derive hardened child without private key".to_string(),
                )
            })?;
            data.extend_from_slice(&private_key_data(private_key));
        } else {
            data.extend_from_slice(&parent_public.to_compressed());
        }
        data.extend_from_slice(&index.to_be_bytes());
        let result = hmac_sha512(&self.chain_code, &data);

        let mut left = [0u8; 32];
        left.copy_from_slice(&result[..32]);
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&result[32..]);

        let tweak = PrivateKey::from_be_bytes(&left).ok_or(KeyError::InvalidChildKey(index))?;
        let key_data = match secret {
            Some(private_key) => private_key_data(
                &private_key
                    .add_scalar(&tweak)
                    .ok_or(KeyError::InvalidChildKey(index))?,
            ),
            None => parent_public
                .add_generator_multiple(&tweak)
                .ok_or(KeyError::InvalidChildKey(index))?
                .to_compressed(),
        };

        let mut parent_fingerprint = [0u8; 4];
        parent_fingerprint.copy_from_slice(&parent_public.hash160()[..4]);

        Ok(ExtendedKey {
            version: self.version,
            depth,
            parent_fingerprint,
            child_number: index,
            chain_code,
            key_data,
        })
    }

    /// Walk a path such as `m/0'/1` from this key.
    pub fn derive_path(&self, path: &str) -> Result<ExtendedKey> {
        parse_path(path)?
            .into_iter()
            .try_fold(self.clone(), |key, index| key.derive_child(index))
    }

    pub fn to_bytes(&self) -> Result<[u8; EXTENDED_KEY_LEN]> {
        let mut layout = LayoutWriter::<EXTENDED_KEY_LEN>::new();
        layout
            .put_u32("version", self.version)?
            .put_u8("depth", self.depth)?
            .put("parent fingerprint", &self.parent_fingerprint, 4)?
            .put_u32("child number", self.child_number)?
            .put("chain code", &self.chain_code, 32)?
            .put("key data", &self.key_data, 33)?;
        layout.finish()
    }

    /// Parse and validate the 78-byte record.
    pub fn from_bytes(bytes: &[u8]) -> Result<ExtendedKey> {
        if bytes.len() != EXTENDED_KEY_LEN {
            return Err(KeyError::EncodingError(format!(
                "extended key must be {EXTENDED_KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut reader = Reader::new(bytes);
        let key = ExtendedKey {
            version: reader.u32("version")?,
            depth: reader.u8("depth")?,
            parent_fingerprint: reader.array("parent fingerprint")?,
            child_number: reader.u32("child number")?,
            chain_code: reader.array("chain code")?,
            key_data: reader.array("key data")?,
        };
        reader.finish("extended key")?;

        if key.depth == 0 && (key.parent_fingerprint != [0u8; 4] || key.child_number != 0) {
            return Err(KeyError::EncodingError(
                "master key with non-zero parent fingerprint or child number".to_string(),
            ));
        }
        key.public_key()?;
        Ok(key)
    }

    /// Base58Check text form (`xprv…`, `xpub…`, `tprv…`, `tpub…`).
    pub fn serialize(&self) -> Result<String> {
        Ok(check_encode(&self.to_bytes()?))
    }

    pub fn deserialize(s: &str) -> Result<ExtendedKey> {
        ExtendedKey::from_bytes(&check_decode(s.trim())?)
    }
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ExtendedKey");
        s.field("version", &format_args!("0x{:08x}", self.version))
            .field("depth", &self.depth)
            .field("parent_fingerprint", &self.parent_fingerprint)
            .field("child_number", &self.child_number);
        if self.is_private() {
            s.field("key_data", &"[REDACTED]");
        } else {
            s.field("chain_code", &self.chain_code)
                .field("key_data", &self.key_data);
        }
        s.finish()
    }
}

impl fmt::Display for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize().map_err(|_| fmt::Error)?)
    }
}

impl FromStr for ExtendedKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self> {
        ExtendedKey::deserialize(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::derive_seed;

    const ABANDON_ABOUT: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn vector1_master() -> MasterKey {
        derive_master_key(&hex::decode("000102030405060708090a0b0c0d0e0f").unwrap()).unwrap()
    }

    #[test]
    fn test_bip32_vector1_master() {
        let master = vector1_master();
        assert_eq!(
            master.to_extended_private(Network::Mainnet).to_string(),
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"
        );
        assert_eq!(
            master.to_extended_public(Network::Mainnet).to_string(),
            "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8"
        );
    }

    #[test]
    fn test_bip32_vector1_children() {
        let xprv = vector1_master().to_extended_private(Network::Mainnet);

        let child = xprv.derive_path("m/0'").unwrap();
        assert_eq!(
            child.to_string(),
            "xprv9uHRZZhk6KAJC1avXpDAp4MDc3sQKNxDiPvvkX8Br5ngLNv1TxvUxt4cV1rGL5hj6KCesnDYUhd7oWgT11eZG7XnxHrnYeSvkzY7d2bhkJ7"
        );
        assert_eq!(
            child.neuter().unwrap().to_string(),
            "xpub68Gmy5EdvgibQVfPdqkBBCHxA5htiqg55crXYuXoQRKfDBFA1WEjWgP6LHhwBZeNK1VTsfTFUHCdrfp1bgwQ9xv5ski8PX9rL2dZXvgGDnw"
        );

        let grandchild = child.derive_child(1).unwrap();
        assert_eq!(grandchild, xprv.derive_path("m/0h/1").unwrap());
        assert_eq!(
            grandchild.to_string(),
            "xprv9wTYmMFdV23N2TdNG573QoEsfRrWKQgWeibmLntzniatZvR9BmLnvSxqu53Kw1UmYPxLgboyZQaXwTCg8MSY3H2EU4pWcQDnRnrVA1xe8fs"
        );
        assert_eq!(
            grandchild.neuter().unwrap().to_string(),
            "xpub6ASuArnXKPbfEwhqN6e3mwBcDTgzisQN1wXN9BJcM47sSikHjJf3UFHKkNAWbWMiGj7Wf5uMash7SyYq527Hqck2AxYysAA7xmALppuCkwQ"
        );
        assert_eq!(grandchild.depth, 2);
        assert_eq!(grandchild.child_number, 1);
        assert_eq!(grandchild.parent_fingerprint, child.fingerprint().unwrap());
    }

    #[test]
    fn test_public_derivation_matches_private() {
        let xprv = vector1_master().to_extended_private(Network::Mainnet);
        let xpub = xprv.neuter().unwrap();
        for index in [0, 1, 7, HARDENED_OFFSET - 1] {
            assert_eq!(
                xpub.derive_child(index).unwrap(),
                xprv.derive_child(index).unwrap().neuter().unwrap()
            );
        }
    }

    #[test]
    fn test_hardened_from_public_fails() {
        let xpub = vector1_master().to_extended_public(Network::Mainnet);
        assert!(matches!(
            xpub.derive_child(HARDENED_OFFSET),
            Err(KeyError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_mnemonic_master_vectors() {
        let master = derive_master_key(derive_seed(ABANDON_ABOUT, "").as_bytes()).unwrap();
        assert_eq!(
            hex::encode(master.private_key.to_be_bytes()),
            "1837c1be8e2995ec11cda2b066151be2cfb48adf9e47b151d46adab3a21cdf67"
        );
        assert_eq!(
            hex::encode(master.chain_code),
            "7923408dadd3c7b56eed15567707ae5e5dca089de972e07f3b860450e2a3b70e"
        );
        assert_eq!(
            hex::encode(master.public_key.to_compressed()),
            "03d902f35f560e0470c63313c7369168d9d7df2d49bf295fd9fb7cb109ccee0494"
        );
        assert_eq!(
            master.to_extended_private(Network::Mainnet).to_string(),
            "xprv9s21ZrQH143K3GJpoapnV8SFfukcVBSfeCficPSGfubmSFDxo1kuHnLisriDvSnRRuL2Qrg5ggqHKNVpxR86QEC8w35uxmGoggxtQTPvfUu"
        );
        assert_eq!(
            master.to_extended_public(Network::Mainnet).to_string(),
            "xpub661MyMwAqRbcFkPHucMnrGNzDwb6teAX1RbKQmqtEF8kK3Z7LZ59qafCjB9eCRLiTVG3uxBxgKvRgbubRhqSKXnGGb1aoaqLrpMBDrVxga8"
        );
        assert_eq!(
            master.to_extended_private(Network::Testnet).to_string(),
            "tprv8ZgxMBicQKsPe5YMU9gHen4Ez3ApihUfykaqUorj9t6FDqy3nP6eoXiAo2ssvpAjoLroQxHqr3R5nE3a5dU3DHTjTgJDd7zrbniJr6nrCzd"
        );
        assert_eq!(
            master.to_extended_public(Network::Testnet).to_string(),
            "tpubD6NzVbkrYhZ4XYa9MoLt4BiMZ4gkt2faZ4BcmKu2a9te4LDpQmvEz2L2yDERivHxFPnxXXhqDRkUNnQCpZggCyEZLBktV7VaSmwayqMJy1s"
        );
    }

    #[test]
    fn test_invalid_master_scalar_is_reported() {
        let mut result = [0u8; 64];
        assert_eq!(master_from_hmac(&result), Err(KeyError::InvalidMasterKey));
        result[..32].fill(0xff);
        assert_eq!(master_from_hmac(&result), Err(KeyError::InvalidMasterKey));
        result[..32].copy_from_slice(
            &hex::decode("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141")
                .unwrap(),
        );
        assert_eq!(master_from_hmac(&result), Err(KeyError::InvalidMasterKey));
        result[31] = 0x40;
        assert!(master_from_hmac(&result).is_ok());
    }

    #[test]
    fn test_seed_length_is_checked() {
        assert!(matches!(
            derive_master_key(&[0u8; 15]),
            Err(KeyError::InvalidParameter(_))
        ));
        assert!(matches!(
            derive_master_key(&[0u8; 65]),
            Err(KeyError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_roundtrip_both_kinds() {
        let master = vector1_master();
        for network in [Network::Mainnet, Network::Testnet] {
            for key in [
                master.to_extended_private(network),
                master.to_extended_public(network),
            ] {
                let text = key.serialize().unwrap();
                let parsed: ExtendedKey = text.parse().unwrap();
                assert_eq!(parsed, key);
                assert_eq!(parsed.network(), Some(network));
            }
        }
    }

    #[test]
    fn test_layout() {
        let key = vector1_master().to_extended_private(Network::Mainnet);
        let bytes = key.to_bytes().unwrap();
        assert_eq!(bytes[..4], [0x04, 0x88, 0xad, 0xe4]);
        assert_eq!(bytes[4..13], [0u8; 9]);
        assert_eq!(bytes[13..45], key.chain_code);
        assert_eq!(bytes[45], 0x00);
        assert_eq!(bytes[46..], key.private_key().unwrap().to_be_bytes());
    }

    #[test]
    fn test_deserialize_rejects_tampering() {
        let text = vector1_master()
            .to_extended_private(Network::Mainnet)
            .to_string();
        let mut chars: Vec<char> = text.chars().collect();
        let i = chars.len() - 5;
        chars[i] = if chars[i] == 'a' { 'b' } else { 'a' };
        let tampered: String = chars.into_iter().collect();
        assert_eq!(
            ExtendedKey::deserialize(&tampered),
            Err(KeyError::InvalidChecksum)
        );

        assert!(matches!(
            ExtendedKey::deserialize("xprv0OIl"),
            Err(KeyError::EncodingError(_))
        ));
        assert!(matches!(
            ExtendedKey::deserialize(&check_encode(&[1, 2, 3])),
            Err(KeyError::EncodingError(_))
        ));
    }

    #[test]
    fn test_deserialize_rejects_bad_fields() {
        let key = vector1_master().to_extended_private(Network::Mainnet);

        let mut unknown = key.to_bytes().unwrap();
        unknown[..4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        assert!(matches!(
            ExtendedKey::deserialize(&check_encode(&unknown)),
            Err(KeyError::EncodingError(_))
        ));

        let mut orphan = key.to_bytes().unwrap();
        orphan[5] = 1;
        assert!(ExtendedKey::deserialize(&check_encode(&orphan)).is_err());

        let mut bad_prefix = key.to_bytes().unwrap();
        bad_prefix[45] = 0x01;
        assert!(ExtendedKey::deserialize(&check_encode(&bad_prefix)).is_err());

        let mut bad_point = key.neuter().unwrap().to_bytes().unwrap();
        bad_point[46..].fill(0);
        assert!(ExtendedKey::deserialize(&check_encode(&bad_point)).is_err());
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(parse_path("m").unwrap(), Vec::<u32>::new());
        assert_eq!(
            parse_path("m/44'/0h/0H/1/2").unwrap(),
            vec![
                44 | HARDENED_OFFSET,
                HARDENED_OFFSET,
                HARDENED_OFFSET,
                1,
                2
            ]
        );
        for bad in ["", "44'/0", "m/", "m/x", "m/2147483648", "m/-1"] {
            assert!(parse_path(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_debug_redacts_private_keys() {
        let key = vector1_master().to_extended_private(Network::Mainnet);
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("chain_code"));
    }

    #[test]
    fn test_network_from_str() {
        assert_eq!("Testnet".parse::<Network>().unwrap(), Network::Testnet);
        assert_eq!("mainnet".parse::<Network>().unwrap(), Network::Mainnet);
        assert!("regtest".parse::<Network>().is_err());
    }
}

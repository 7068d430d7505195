use core::fmt;

use ibig::UBig;
use k256::elliptic_curve::group::Curve;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use once_cell::sync::Lazy;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Order `n` of the secp256k1 base point.
pub static CURVE_ORDER: Lazy<UBig> = Lazy::new(|| {
    UBig::from_str_radix(
        "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141",
        16,
    )
    .unwrap()
});

/// True when the big-endian integer is a usable private scalar, `0 < s < n`.
pub fn is_valid_scalar(bytes: &[u8]) -> bool {
    let s = UBig::from_be_bytes(bytes);
    s != UBig::from(0u64) && s < *CURVE_ORDER
}

fn ubig_to_32_bytes(n: &UBig) -> [u8; 32] {
    let bytes = n.to_be_bytes();
    let mut arr = [0u8; 32];
    arr[32 - bytes.len()..].copy_from_slice(&bytes);
    arr
}

#[derive(Clone)]
pub struct PrivateKey(k256::SecretKey);

impl PrivateKey {
    /// Parse a 32-byte big-endian scalar; `None` unless `0 < s < n`.
    pub fn from_be_bytes(bytes: &[u8; 32]) -> Option<PrivateKey> {
        if !is_valid_scalar(bytes) {
            return None;
        }
        k256::SecretKey::from_bytes(k256::FieldBytes::from_slice(bytes))
            .ok()
            .map(PrivateKey)
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&self.0.to_bytes());
        arr
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.public_key())
    }

    /// `(self + tweak) mod n`, or `None` if the sum is zero.
    pub(crate) fn add_scalar(&self, tweak: &PrivateKey) -> Option<PrivateKey> {
        let sum = (UBig::from_be_bytes(&self.to_be_bytes())
            + UBig::from_be_bytes(&tweak.to_be_bytes()))
            % &*CURVE_ORDER;
        PrivateKey::from_be_bytes(&ubig_to_32_bytes(&sum))
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_be_bytes() == other.to_be_bytes()
    }
}

impl Eq for PrivateKey {}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(k256::PublicKey);

impl PublicKey {
    /// Parse a 33-byte SEC1 compressed point.
    pub fn from_compressed(bytes: &[u8; 33]) -> Option<PublicKey> {
        if bytes[0] != 0x02 && bytes[0] != 0x03 {
            return None;
        }
        k256::PublicKey::from_sec1_bytes(bytes).ok().map(PublicKey)
    }

    pub fn to_compressed(&self) -> [u8; 33] {
        let point = self.0.to_encoded_point(true);
        let mut arr = [0u8; 33];
        arr.copy_from_slice(point.as_bytes());
        arr
    }

    /// RIPEMD-160(SHA-256(compressed point)).
    pub fn hash160(&self) -> [u8; 20] {
        let digest = Ripemd160::digest(Sha256::digest(self.to_compressed()));
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&digest);
        arr
    }

    /// `self + tweak * G`, or `None` at the point at infinity.
    pub(crate) fn add_generator_multiple(&self, tweak: &PrivateKey) -> Option<PublicKey> {
        let point = tweak.0.public_key().to_projective() + self.0.to_projective();
        k256::PublicKey::from_affine(point.to_affine())
            .ok()
            .map(PublicKey)
    }
}

//! BIP-39 entropy and mnemonic sentence codec.
//!
//! Entropy of 128 to 256 bits (in 32-bit steps) is extended with the leading
//! `ENT / 32` bits of its SHA-256 digest, and every 11-bit group of the result
//! selects one word of the fixed English word list.

use std::collections::HashMap;

use bip39::Language;
use bitvec::prelude::{BitSlice, BitVec, Msb0};
use once_cell::sync::Lazy;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroizing;

use crate::error::{KeyError, Result};

/// Entropy sizes accepted by the codec, in bits.
pub const ENTROPY_BITS: [usize; 5] = [128, 160, 192, 224, 256];

/// Mnemonic lengths matching [`ENTROPY_BITS`].
pub const WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

const BITS_PER_WORD: usize = 11;

/// Read-only table of the 2048 mnemonic words with a reverse index.
pub struct WordList {
    words: &'static [&'static str; 2048],
    index: HashMap<&'static str, u16>,
}

impl WordList {
    fn new(words: &'static [&'static str; 2048]) -> Self {
        let index = words
            .iter()
            .enumerate()
            .map(|(i, word)| (*word, i as u16))
            .collect();
        WordList { words, index }
    }

    /// Word at an 11-bit index.
    pub fn word(&self, index: u16) -> Option<&'static str> {
        self.words.get(usize::from(index)).copied()
    }

    pub fn index_of(&self, word: &str) -> Option<u16> {
        self.index.get(word).copied()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// The BIP-39 English word list, loaded once per process.
pub static ENGLISH: Lazy<WordList> = Lazy::new(|| WordList::new(Language::English.word_list()));

fn check_entropy_bits(bits: usize) -> Result<()> {
    if ENTROPY_BITS.contains(&bits) {
        Ok(())
    } else {
        Err(KeyError::InvalidParameter(format!(
            "entropy must be one of {ENTROPY_BITS:?} bits, got {bits}"
        )))
    }
}

/// Draw `bit_length` bits of entropy from `rng` and encode them as a mnemonic.
pub fn generate_mnemonic<R: RngCore + CryptoRng>(rng: &mut R, bit_length: usize) -> Result<String> {
    check_entropy_bits(bit_length)?;
    let mut entropy = Zeroizing::new(vec![0u8; bit_length / 8]);
    rng.fill_bytes(&mut entropy);
    mnemonic_from_entropy(&entropy)
}

pub fn mnemonic_from_entropy(entropy: &[u8]) -> Result<String> {
    check_entropy_bits(entropy.len() * 8)?;
    let checksum_bits = entropy.len() * 8 / 32;
    let checksum = Sha256::digest(entropy);

    let mut bits = BitVec::<u8, Msb0>::from_slice(entropy);
    bits.extend_from_bitslice(&BitSlice::<u8, Msb0>::from_slice(&checksum)[..checksum_bits]);

    let words = bits
        .chunks(BITS_PER_WORD)
        .map(|group| {
            let index = group
                .iter()
                .by_vals()
                .fold(0u16, |acc, bit| (acc << 1) | u16::from(bit));
            ENGLISH
                .word(index)
                .ok_or_else(|| KeyError::InvalidParameter(format!("word index {index} out of range")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(words.join(" "))
}

/// Decode a mnemonic back into its entropy, verifying every word and the checksum.
pub fn entropy_from_mnemonic(mnemonic: &str) -> Result<Vec<u8>> {
    let normalized: String = mnemonic.nfkd().collect();
    let words: Vec<&str> = normalized.split_whitespace().collect();
    if !WORD_COUNTS.contains(&words.len()) {
        return Err(KeyError::InvalidParameter(format!(
            "mnemonic must have one of {WORD_COUNTS:?} words, got {}",
            words.len()
        )));
    }

    let mut bits = BitVec::<u8, Msb0>::with_capacity(words.len() * BITS_PER_WORD);
    for (position, word) in words.iter().enumerate() {
        let index = ENGLISH.index_of(word).ok_or_else(|| KeyError::InvalidWord {
            word: word.to_string(),
            position,
        })?;
        for shift in (0..BITS_PER_WORD).rev() {
            bits.push((index >> shift) & 1 == 1);
        }
    }

    // ENT + ENT/32 = 33 * ENT/32 bits in total
    let checksum_bits = bits.len() / 33;
    let entropy_bits = checksum_bits * 32;
    let entropy = bits.as_raw_slice()[..entropy_bits / 8].to_vec();

    let checksum = Sha256::digest(&entropy);
    let expected = &BitSlice::<u8, Msb0>::from_slice(&checksum)[..checksum_bits];
    if &bits[entropy_bits..] != expected {
        return Err(KeyError::InvalidChecksum);
    }
    Ok(entropy)
}

pub fn validate_mnemonic(mnemonic: &str) -> Result<()> {
    entropy_from_mnemonic(mnemonic).map(|_| ())
}

use primitive_types::H256;
use tiny_keccak::Hasher;

pub use crate::merkle::{hash_pair, ordered_root, EMPTY_ROOT};

mod merkle;

pub const HASH_LEN: usize = 32;

pub struct SHA3;

impl SHA3 {
    pub fn digest<B: AsRef<[u8]>>(bytes: B) -> H256 {
        let mut out = H256::zero();
        let mut keccak = tiny_keccak::Keccak::v256();
        keccak.update(bytes.as_ref());
        keccak.finalize(out.as_bytes_mut());
        out
    }

    pub fn digest_all<'a, I>(parts: I) -> H256
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut out = H256::zero();
        let mut keccak = tiny_keccak::Keccak::v256();
        for part in parts {
            keccak.update(part);
        }
        keccak.finalize(out.as_bytes_mut());
        out
    }
}

#[inline]
pub fn keccak256<B: AsRef<[u8]>>(bytes: B) -> H256 {
    SHA3::digest(bytes)
}

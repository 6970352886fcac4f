use primitive_types::H256;

use crate::SHA3;

/// Root of an ordered list with no items: keccak256 of the empty string.
pub const EMPTY_ROOT: H256 = H256([
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
]);

pub fn hash_pair(left: &H256, right: &H256) -> H256 {
    SHA3::digest_all([left.as_bytes(), right.as_bytes()])
}

///
/// # Ordered merkle root
///
/// Leaves are `keccak256(index ‖ item)` so that two lists holding the same items in a
/// different order never share a root. Odd levels pair the last node with itself.
pub fn ordered_root<I, B>(items: I) -> H256
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let leaves: Vec<H256> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let index = (index as u64).to_be_bytes();
            SHA3::digest_all([&index[..], item.as_ref()])
        })
        .collect();
    if leaves.is_empty() {
        return EMPTY_ROOT;
    }
    calculate_root(leaves)
}

fn calculate_root(leaves: Vec<H256>) -> H256 {
    if leaves.len() == 1 {
        return leaves[0];
    }
    let next: Vec<H256> = leaves
        .chunks(2)
        .map(|c| {
            let left = &c[0];
            let right = c.get(1).unwrap_or(left);
            hash_pair(left, right)
        })
        .collect();
    calculate_root(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_root() {
        assert_eq!(ordered_root(Vec::<Vec<u8>>::new()), EMPTY_ROOT);
        assert_eq!(SHA3::digest(b""), EMPTY_ROOT);
    }

    #[test]
    fn test_with_even_inputs() {
        let items = ["hello", "world", "job", "market"];
        let leaf = |i: u64, s: &str| SHA3::digest_all([&i.to_be_bytes()[..], s.as_bytes()]);
        let h_a_b = hash_pair(&leaf(0, "hello"), &leaf(1, "world"));
        let h_c_d = hash_pair(&leaf(2, "job"), &leaf(3, "market"));
        assert_eq!(ordered_root(items), hash_pair(&h_a_b, &h_c_d));
    }

    #[test]
    fn test_order_matters() {
        assert_ne!(ordered_root(["a", "b", "c"]), ordered_root(["b", "a", "c"]));
    }
}

//! Pool Account Layouts
//!
//! Views over the program's accounts. Account data is an 8-byte Anchor
//! discriminator followed by the Borsh encoding of the struct.
//!
//! Pool account (1700 bytes):
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0 | discriminator (8) |
//! | 8 | authority (32) |
//! | 40 | next_index (u64) |
//! | 48 | filled_subtrees (20 x 32) |
//! | 688 | current root (32) |
//! | 720 | root_history (30 x 32) |
//! | 1680 | root_history_index (u8) |
//! | 1681 | nullifier_count (u64) |
//! | 1689 | relayer_fee_bps (u16) |
//! | 1691 | total_fees_collected (u64) |
//! | 1699 | bump (u8) |

use borsh::{BorshDeserialize, BorshSerialize};
use serde::Serialize;
use sha2::{Digest as _, Sha256};
use sha3::{Digest as _, Keccak256};
use solana_sdk::pubkey::Pubkey;

use super::LedgerError;

/// Merkle tree depth
pub const TREE_DEPTH: usize = 20;

/// Roots kept in the validity window
pub const ROOT_HISTORY_SIZE: usize = 30;

/// Default relayer fee (0.3%)
pub const DEFAULT_RELAYER_FEE_BPS: u16 = 30;

/// Offset of the current root in pool account data
pub const ROOT_OFFSET: usize = 688;

/// Offset of the spent-nullifier counter in pool account data
pub const NULLIFIER_COUNT_OFFSET: usize = 1681;

/// Pool account data length, discriminator included
pub const POOL_ACCOUNT_LEN: usize =
    8 + 32 + (8 + 32 * TREE_DEPTH + 32) + 32 * ROOT_HISTORY_SIZE + 1 + 8 + 2 + 8 + 1;

/// Nullifier marker account data length, discriminator included
pub const MARKER_ACCOUNT_LEN: usize = 8 + 32 + 32 + 8;

/// Anchor account discriminator: `sha256("account:<Name>")[..8]`
pub fn account_discriminator(name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("account:{}", name).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

// ============================================================================
// Merkle tree
// ============================================================================

/// Keccak-256 of two nodes
pub fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Empty-subtree hashes; `zeros[0]` is `keccak256([0; 32])`
fn zero_hashes() -> [[u8; 32]; TREE_DEPTH + 1] {
    let mut zeros = [[0u8; 32]; TREE_DEPTH + 1];
    zeros[0] = Keccak256::digest([0u8; 32]).into();
    for level in 1..=TREE_DEPTH {
        zeros[level] = hash_pair(&zeros[level - 1], &zeros[level - 1]);
    }
    zeros
}

/// Append-only Merkle tree storing only the right frontier
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct IncrementalMerkleTree {
    pub next_index: u64,
    pub filled_subtrees: [[u8; 32]; TREE_DEPTH],
    pub current_root: [u8; 32],
}

impl Default for IncrementalMerkleTree {
    fn default() -> Self {
        Self::new()
    }
}

impl IncrementalMerkleTree {
    pub const MAX_LEAVES: u64 = 1 << TREE_DEPTH;

    pub fn new() -> Self {
        let zeros = zero_hashes();
        let mut filled_subtrees = [[0u8; 32]; TREE_DEPTH];
        filled_subtrees.copy_from_slice(&zeros[..TREE_DEPTH]);
        Self {
            next_index: 0,
            filled_subtrees,
            current_root: zeros[TREE_DEPTH],
        }
    }

    /// Append a leaf, returning its index
    pub fn insert(&mut self, leaf: [u8; 32]) -> Option<u64> {
        if self.next_index >= Self::MAX_LEAVES {
            return None;
        }
        let zeros = zero_hashes();
        let leaf_index = self.next_index;
        let mut node = leaf;
        let mut index = leaf_index;

        for level in 0..TREE_DEPTH {
            node = if index % 2 == 0 {
                self.filled_subtrees[level] = node;
                hash_pair(&node, &zeros[level])
            } else {
                hash_pair(&self.filled_subtrees[level], &node)
            };
            index /= 2;
        }

        self.current_root = node;
        self.next_index += 1;
        Some(leaf_index)
    }
}

// ============================================================================
// Pool state
// ============================================================================

/// Parsed pool account
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PoolState {
    pub authority: [u8; 32],
    pub merkle_tree: IncrementalMerkleTree,
    pub root_history: [[u8; 32]; ROOT_HISTORY_SIZE],
    pub root_history_index: u8,
    pub nullifier_count: u64,
    pub relayer_fee_bps: u16,
    pub total_fees_collected: u64,
    pub bump: u8,
}

impl PoolState {
    pub const ACCOUNT_NAME: &'static str = "PrivacyPool";

    /// Freshly initialized pool
    pub fn new(authority: Pubkey, bump: u8) -> Self {
        Self {
            authority: authority.to_bytes(),
            merkle_tree: IncrementalMerkleTree::new(),
            root_history: [[0u8; 32]; ROOT_HISTORY_SIZE],
            root_history_index: 0,
            nullifier_count: 0,
            relayer_fee_bps: DEFAULT_RELAYER_FEE_BPS,
            total_fees_collected: 0,
            bump,
        }
    }

    /// Parse pool account data
    pub fn from_account_data(data: &[u8]) -> Result<Self, LedgerError> {
        check_account(data, Self::ACCOUNT_NAME, POOL_ACCOUNT_LEN)?;
        Self::deserialize(&mut &data[8..])
            .map_err(|e| LedgerError::InvalidAccountData(format!("pool account: {}", e)))
    }

    /// Serialize to account data, discriminator included
    pub fn to_account_data(&self) -> Result<Vec<u8>, LedgerError> {
        let mut data = Vec::with_capacity(POOL_ACCOUNT_LEN);
        data.extend_from_slice(&account_discriminator(Self::ACCOUNT_NAME));
        self.serialize(&mut data)
            .map_err(|e| LedgerError::InvalidAccountData(e.to_string()))?;
        Ok(data)
    }

    pub fn authority(&self) -> Pubkey {
        Pubkey::new_from_array(self.authority)
    }

    pub fn current_root(&self) -> [u8; 32] {
        self.merkle_tree.current_root
    }

    pub fn commitment_count(&self) -> u64 {
        self.merkle_tree.next_index
    }

    /// Whether `root` is the current root or one in the history window
    pub fn is_known_root(&self, root: &[u8; 32]) -> bool {
        if *root == self.merkle_tree.current_root {
            return true;
        }
        self.root_history.iter().any(|r| r == root && *r != [0u8; 32])
    }

    /// Append a commitment, pushing the previous root into history
    pub fn add_commitment(&mut self, commitment: [u8; 32]) -> Result<u64, LedgerError> {
        let old_root = self.merkle_tree.current_root;
        let index = self
            .merkle_tree
            .insert(commitment)
            .ok_or_else(|| LedgerError::Rejected("merkle tree is full".to_string()))?;
        self.root_history[self.root_history_index as usize] = old_root;
        self.root_history_index =
            ((self.root_history_index as usize + 1) % ROOT_HISTORY_SIZE) as u8;
        Ok(index)
    }

    pub fn record_nullifier_spent(&mut self) {
        self.nullifier_count = self.nullifier_count.saturating_add(1);
    }

    pub fn summary(&self) -> PoolSummary {
        PoolSummary {
            authority: self.authority().to_string(),
            commitment_count: self.commitment_count(),
            current_root: hex::encode(self.current_root()),
            nullifier_count: self.nullifier_count,
            relayer_fee_bps: self.relayer_fee_bps,
            total_fees_collected: self.total_fees_collected,
        }
    }
}

/// Printable pool summary
#[derive(Debug, Clone, Serialize)]
pub struct PoolSummary {
    pub authority: String,
    pub commitment_count: u64,
    pub current_root: String,
    pub nullifier_count: u64,
    pub relayer_fee_bps: u16,
    pub total_fees_collected: u64,
}

/// Read the current root without parsing the whole account
pub fn root_from_account_data(data: &[u8]) -> Result<[u8; 32], LedgerError> {
    check_account(data, PoolState::ACCOUNT_NAME, POOL_ACCOUNT_LEN)?;
    let mut root = [0u8; 32];
    root.copy_from_slice(&data[ROOT_OFFSET..ROOT_OFFSET + 32]);
    Ok(root)
}

// ============================================================================
// Nullifier marker
// ============================================================================

/// Marker recording a spent nullifier
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct NullifierMarker {
    pub pool: [u8; 32],
    pub nullifier: [u8; 32],
    pub spent_at: u64,
}

impl NullifierMarker {
    pub const ACCOUNT_NAME: &'static str = "NullifierMarker";

    pub fn from_account_data(data: &[u8]) -> Result<Self, LedgerError> {
        check_account(data, Self::ACCOUNT_NAME, MARKER_ACCOUNT_LEN)?;
        Self::deserialize(&mut &data[8..])
            .map_err(|e| LedgerError::InvalidAccountData(format!("nullifier marker: {}", e)))
    }

    pub fn to_account_data(&self) -> Result<Vec<u8>, LedgerError> {
        let mut data = Vec::with_capacity(MARKER_ACCOUNT_LEN);
        data.extend_from_slice(&account_discriminator(Self::ACCOUNT_NAME));
        self.serialize(&mut data)
            .map_err(|e| LedgerError::InvalidAccountData(e.to_string()))?;
        Ok(data)
    }
}

fn check_account(data: &[u8], name: &str, min_len: usize) -> Result<(), LedgerError> {
    if data.len() < min_len {
        return Err(LedgerError::InvalidAccountData(format!(
            "{} account too short: {} < {}",
            name,
            data.len(),
            min_len
        )));
    }
    if data[..8] != account_discriminator(name) {
        return Err(LedgerError::InvalidAccountData(format!(
            "{} discriminator mismatch",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_layout() {
        assert_eq!(POOL_ACCOUNT_LEN, 1700);

        let mut state = PoolState::new(Pubkey::new_unique(), 254);
        state.add_commitment([7; 32]).unwrap();
        state.record_nullifier_spent();
        state.record_nullifier_spent();
        let data = state.to_account_data().unwrap();

        assert_eq!(data.len(), POOL_ACCOUNT_LEN);
        assert_eq!(&data[8..40], state.authority.as_slice());
        assert_eq!(&data[ROOT_OFFSET..ROOT_OFFSET + 32], &state.current_root());
        let count = &data[NULLIFIER_COUNT_OFFSET..NULLIFIER_COUNT_OFFSET + 8];
        assert_eq!(u64::from_le_bytes(count.try_into().unwrap()), 2);
        assert_eq!(data[POOL_ACCOUNT_LEN - 1], 254);
        assert_eq!(PoolState::from_account_data(&data).unwrap(), state);
        assert_eq!(root_from_account_data(&data).unwrap(), state.current_root());
    }

    #[test]
    fn test_zero_leaf_matches_keccak_of_zero_word() {
        let zeros = zero_hashes();
        assert_eq!(
            hex::encode(zeros[0]),
            "290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563"
        );
    }

    #[test]
    fn test_root_history_window() {
        let mut state = PoolState::new(Pubkey::new_unique(), 255);
        let initial = state.current_root();
        state.add_commitment([1; 32]).unwrap();
        let after_one = state.current_root();
        assert_ne!(initial, after_one);
        assert!(state.is_known_root(&initial));
        assert!(state.is_known_root(&after_one));
        assert!(!state.is_known_root(&[0u8; 32]));

        for i in 0..ROOT_HISTORY_SIZE as u8 {
            state.add_commitment([i.wrapping_add(2); 32]).unwrap();
        }
        assert!(!state.is_known_root(&initial));
        assert_eq!(state.commitment_count(), ROOT_HISTORY_SIZE as u64 + 1);
    }

    #[test]
    fn test_merkle_insert_two_leaves() {
        let mut tree = IncrementalMerkleTree::new();
        let zeros = zero_hashes();
        assert_eq!(tree.insert([1; 32]), Some(0));
        assert_eq!(tree.insert([2; 32]), Some(1));

        let mut node = hash_pair(&[1; 32], &[2; 32]);
        for zero in zeros.iter().take(TREE_DEPTH).skip(1) {
            node = hash_pair(&node, zero);
        }
        assert_eq!(tree.current_root, node);
    }

    #[test]
    fn test_rejects_wrong_account() {
        let marker = NullifierMarker {
            pool: [1; 32],
            nullifier: [2; 32],
            spent_at: 9,
        };
        let data = marker.to_account_data().unwrap();
        assert_eq!(data.len(), MARKER_ACCOUNT_LEN);
        assert_eq!(NullifierMarker::from_account_data(&data).unwrap(), marker);

        assert!(matches!(
            PoolState::from_account_data(&data),
            Err(LedgerError::InvalidAccountData(_))
        ));
        let mut padded = data.clone();
        padded.resize(POOL_ACCOUNT_LEN, 0);
        assert!(matches!(
            root_from_account_data(&padded),
            Err(LedgerError::InvalidAccountData(_))
        ));
    }
}

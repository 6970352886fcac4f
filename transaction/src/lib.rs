use anyhow::Result;
use thiserror::Error;
use tracing::trace;

use crypto::keccak256;
use primitive_types::H256;
use traits::{ExecutionContext, ExecutionOutcome, Repository, TransactionExecutor};
use types::receipt::{LogInfo, TransactionReceipt};
use types::tx::Transaction;
use types::Address;

pub const TX_GAS: u64 = 21_000;
pub const TX_DATA_GAS_PER_BYTE: u64 = 68;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("intrinsic gas {required} exceeds gas limit {limit}")]
    IntrinsicGas { required: u64, limit: u64 },
    #[error("block gas limit {block_limit} reached, {used} used")]
    BlockGasLimit { used: u64, block_limit: u64 },
    #[error("sender {0:?} can not pay for gas")]
    InsufficientGasFunds(Address),
}

pub fn transfer_topic() -> H256 {
    keccak256(b"Transfer(address,address,uint256)")
}

pub fn intrinsic_gas(tx: &Transaction) -> u64 {
    TX_GAS + TX_DATA_GAS_PER_BYTE * tx.data.len() as u64
}

pub fn make_transaction(from: Address, nonce: u64, to: Address, value: u128, gas_price: u128) -> Transaction {
    Transaction::new(nonce, from, to, value, gas_price, TX_GAS, vec![])
}

/// Plain value transfer executor.
///
/// Gas is charged at the intrinsic cost. The fee is paid from mineral first and from
/// the coin balance for the rest; a transfer that fails after the fee is charged still
/// produces a receipt, with its error set.
///
/// `tx.from` is taken as given. Transactions are expected to be authenticated before
/// they reach the executor; nothing here checks a signature.
#[derive(Debug, Default, Clone)]
pub struct TransferExecutor;

impl<R: Repository> TransactionExecutor<R> for TransferExecutor {
    fn execute(&self, ctx: ExecutionContext, repository: &mut R) -> Result<ExecutionOutcome> {
        let tx = ctx.tx;
        let gas_used = intrinsic_gas(tx);
        if gas_used > tx.gas_limit {
            return Err(ExecutionError::IntrinsicGas {
                required: gas_used,
                limit: tx.gas_limit,
            }
            .into());
        }
        let cumulative_gas = ctx.cumulative_gas_used + gas_used;
        if cumulative_gas > ctx.block.gas_limit() {
            return Err(ExecutionError::BlockGasLimit {
                used: cumulative_gas,
                block_limit: ctx.block.gas_limit(),
            }
            .into());
        }

        let fee = tx.gas_price.saturating_mul(gas_used as u128);
        let mineral_used = repository.mineral(&tx.from).min(fee);
        let coin_fee = fee - mineral_used;
        if repository.balance(&tx.from) < coin_fee {
            return Err(ExecutionError::InsufficientGasFunds(tx.from).into());
        }
        if mineral_used > 0 {
            repository.sub_mineral(&tx.from, mineral_used)?;
        }
        if coin_fee > 0 {
            repository.sub_balance(&tx.from, coin_fee)?;
        }
        repository.increment_nonce(&tx.from);

        let mut receipt = TransactionReceipt {
            tx_hash: tx.hash(),
            cumulative_gas,
            cumulative_mineral: ctx.cumulative_mineral_used + mineral_used,
            gas_used,
            mineral_used,
            ..Default::default()
        };

        let mut transfer = repository.start_tracking();
        match transfer.transfer(&tx.from, &tx.to, tx.value) {
            Ok(()) => {
                repository.commit_child(transfer);
                let log = LogInfo {
                    address: tx.to,
                    topics: vec![transfer_topic(), H256::from(tx.from)],
                    data: tx.value.to_be_bytes().to_vec(),
                };
                receipt.bloom = log.bloom();
                receipt.logs.push(log);
            }
            Err(e) => {
                trace!(tx = ?receipt.tx_hash, error = %e, "transfer failed");
                receipt.error = e.to_string();
            }
        }

        Ok(ExecutionOutcome {
            receipt,
            gas_used,
            mineral_used,
            fee,
        })
    }
}

#[cfg(test)]
mod tests {
    use state::State;
    use traits::{ChainHeadReader, StateStore};
    use types::block::{Block, BlockHeader};

    use super::*;

    struct NoChain;

    impl ChainHeadReader for NoChain {
        fn get_block_by_hash(&self, _hash: &H256) -> Result<Option<Block>> {
            Ok(None)
        }

        fn get_chain_block_by_number(&self, _number: u64) -> Result<Option<Block>> {
            Ok(None)
        }
    }

    fn header() -> BlockHeader {
        let mut header = BlockHeader::default();
        header.set_gas_limit(1_000_000);
        header
    }

    fn run<R: Repository>(tx: &Transaction, repo: &mut R, cumulative_gas_used: u64) -> Result<ExecutionOutcome> {
        let header = header();
        let ctx = ExecutionContext {
            tx,
            coinbase: Address::zero(),
            chain: &NoChain,
            block: &header,
            cumulative_gas_used,
            cumulative_mineral_used: 0,
        };
        TransferExecutor.execute(ctx, repo)
    }

    #[test]
    fn test_transfer_with_mineral_fee() {
        let state = State::in_memory();
        let mut repo = state.empty();
        let alice = Address::repeat_byte(1);
        let bob = Address::repeat_byte(2);
        repo.add_balance(&alice, 1_000_000).unwrap();
        let mut account = repo.account_state(&alice);
        account.mineral = 1_000;
        repo.put_account_state(alice, account);

        let tx = make_transaction(alice, 0, bob, 500, 1);
        let outcome = run(&tx, &mut repo, 0).unwrap();
        assert!(outcome.receipt.is_successful());
        assert_eq!(outcome.fee, 21_000);
        assert_eq!(outcome.mineral_used, 1_000);
        assert_eq!(repo.balance(&bob), 500);
        assert_eq!(repo.balance(&alice), 1_000_000 - 500 - 20_000);
        assert_eq!(repo.nonce(&alice), 1);
        assert_eq!(outcome.receipt.logs.len(), 1);
    }

    #[test]
    fn test_failed_transfer_still_charged() {
        let state = State::in_memory();
        let mut repo = state.empty();
        let alice = Address::repeat_byte(1);
        repo.add_balance(&alice, 21_000).unwrap();

        let tx = make_transaction(alice, 0, Address::repeat_byte(2), 1, 1);
        let outcome = run(&tx, &mut repo, 0).unwrap();
        assert!(!outcome.receipt.is_successful());
        assert_eq!(repo.balance(&alice), 0);
        assert_eq!(repo.nonce(&alice), 1);
        assert!(outcome.receipt.logs.is_empty());
    }

    #[test]
    fn test_not_includable() {
        let state = State::in_memory();
        let mut repo = state.empty();
        let alice = Address::repeat_byte(1);
        let tx = make_transaction(alice, 0, Address::repeat_byte(2), 1, 1);
        assert!(run(&tx, &mut repo, 0).is_err());

        repo.add_balance(&alice, 1_000_000).unwrap();
        assert!(run(&tx, &mut repo, 990_000).is_err());
        assert_eq!(repo.nonce(&alice), 0);
    }
}

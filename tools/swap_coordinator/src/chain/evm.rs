//! EVM side of the swap: the HashedTimelock contract.
//!
//! Calls are ABI-encoded here; signing, submission and receipt polling belong
//! to the injected [`EvmRpc`] transport.

use std::str::FromStr;

use alloy_primitives::{Address as EvmAddress, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall, SolEvent};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{classify, Address, Chain, ChainAdapter, LockDetails, LockId, LockLookup, Receipt};
use crate::crypto::{parse_hex32, Hashlock, Preimage};
use crate::quote::TokenAmount;
use crate::types::ChainError;

sol! {
    interface HashedTimelock {
        event LogHTLCNew(
            bytes32 indexed contractId,
            address indexed sender,
            address indexed receiver,
            uint256 amount,
            bytes32 hashlock,
            uint256 timelock
        );

        function newContract(address receiver, bytes32 hashlock, uint256 timelock)
            external
            payable
            returns (bytes32 contractId);

        function withdraw(bytes32 contractId, bytes32 preimage) external returns (bool);

        function refund(bytes32 contractId) external returns (bool);

        function getContract(bytes32 contractId)
            external
            view
            returns (
                address sender,
                address receiver,
                uint256 amount,
                bytes32 hashlock,
                uint256 timelock,
                bool withdrawn,
                bool refunded,
                bytes32 preimage
            );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmTransaction {
    pub from: EvmAddress,
    pub to: EvmAddress,
    pub value: U256,
    pub input: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmLog {
    pub address: EvmAddress,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmReceipt {
    pub transaction_hash: B256,
    pub success: bool,
    pub logs: Vec<EvmLog>,
}

/// Node access used by [`EvmHtlcAdapter`].
#[async_trait]
pub trait EvmRpc: Send + Sync {
    /// Accounts the connected wallet can sign for.
    async fn accounts(&self) -> Result<Vec<EvmAddress>, ChainError>;
    /// Signs, submits and waits for the receipt.
    async fn send_transaction(&self, tx: EvmTransaction) -> Result<EvmReceipt, ChainError>;
    async fn call(&self, to: EvmAddress, input: Bytes) -> Result<Bytes, ChainError>;
    async fn block_timestamp(&self) -> Result<u64, ChainError>;
}

pub struct EvmHtlcAdapter<R> {
    rpc: R,
    contract: EvmAddress,
}

impl<R: EvmRpc> EvmHtlcAdapter<R> {
    pub fn new(rpc: R, contract: EvmAddress) -> Self {
        Self { rpc, contract }
    }

    pub fn contract(&self) -> EvmAddress {
        self.contract
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    async fn sender(&self) -> Result<EvmAddress, ChainError> {
        self.rpc
            .accounts()
            .await?
            .into_iter()
            .next()
            .ok_or(ChainError::WalletUnavailable(Chain::Evm))
    }

    async fn submit(
        &self,
        input: Vec<u8>,
        value: U256,
        wrap: fn(String) -> ChainError,
    ) -> Result<EvmReceipt, ChainError> {
        let from = self.sender().await?;
        let receipt = self
            .rpc
            .send_transaction(EvmTransaction {
                from,
                to: self.contract,
                value,
                input: input.into(),
            })
            .await
            .map_err(|err| classify(err, wrap))?;
        if !receipt.success {
            return Err(wrap(format!(
                "transaction {} reverted",
                receipt.transaction_hash
            )));
        }
        Ok(receipt)
    }

    async fn get_contract(
        &self,
        contract_id: B256,
    ) -> Result<Option<HashedTimelock::getContractReturn>, ChainError> {
        let call = HashedTimelock::getContractCall {
            contractId: contract_id,
        };
        let output = self.rpc.call(self.contract, call.abi_encode().into()).await?;
        let found = HashedTimelock::getContractCall::abi_decode_returns(&output)
            .map_err(|err| ChainError::Transport(format!("decode getContract: {err}")))?;
        // The contract returns a zeroed struct for unknown ids.
        if found.sender == EvmAddress::ZERO {
            return Ok(None);
        }
        Ok(Some(found))
    }

    fn lock_id_from_receipt(&self, receipt: &EvmReceipt) -> Option<B256> {
        receipt
            .logs
            .iter()
            .filter(|log| log.address == self.contract)
            .find(|log| log.topics.first() == Some(&HashedTimelock::LogHTLCNew::SIGNATURE_HASH))
            .and_then(|log| log.topics.get(1).copied())
    }
}

/// Id HashedTimelock assigns to a new lock:
/// `sha256(sender ++ receiver ++ amount ++ hashlock ++ timelock)`, packed.
pub fn contract_id(
    sender: EvmAddress,
    receiver: EvmAddress,
    amount: U256,
    hashlock: B256,
    timelock: U256,
) -> B256 {
    let mut hasher = Sha256::new();
    hasher.update(sender.as_slice());
    hasher.update(receiver.as_slice());
    hasher.update(amount.to_be_bytes::<32>());
    hasher.update(hashlock.as_slice());
    hasher.update(timelock.to_be_bytes::<32>());
    B256::from_slice(&hasher.finalize())
}

fn parse_lock_id(lock_id: &LockId, wrap: fn(String) -> ChainError) -> Result<B256, ChainError> {
    parse_hex32(lock_id.as_str())
        .map(B256::from)
        .map_err(|err| wrap(format!("lock id {lock_id}: {err}")))
}

fn receipt_for(receipt: &EvmReceipt) -> Receipt {
    Receipt {
        chain: Chain::Evm,
        tx_id: receipt.transaction_hash.to_string(),
    }
}

#[async_trait]
impl<R: EvmRpc> ChainAdapter for EvmHtlcAdapter<R> {
    fn chain(&self) -> Chain {
        Chain::Evm
    }

    async fn get_client_address(&self) -> Result<Address, ChainError> {
        let account = self.sender().await?;
        Ok(Address::new(account.to_string()))
    }

    async fn lock(
        &self,
        counterparty: &Address,
        amount: &TokenAmount,
        hashlock: &Hashlock,
        expiry: u64,
    ) -> Result<LockId, ChainError> {
        if amount.amount == 0 {
            return Err(ChainError::LockFailed("amount must be positive".into()));
        }
        let receiver = EvmAddress::from_str(counterparty.as_str()).map_err(|err| {
            ChainError::LockFailed(format!("invalid receiver {counterparty}: {err}"))
        })?;
        let call = HashedTimelock::newContractCall {
            receiver,
            hashlock: B256::from(hashlock.to_bytes()),
            timelock: U256::from(expiry),
        };
        debug!(%receiver, %hashlock, expiry, "submitting newContract");
        let receipt = self
            .submit(call.abi_encode(), U256::from(amount.amount), ChainError::LockFailed)
            .await?;
        let contract_id = self.lock_id_from_receipt(&receipt).ok_or_else(|| {
            ChainError::LockFailed(format!(
                "transaction {} emitted no LogHTLCNew",
                receipt.transaction_hash
            ))
        })?;
        info!(lock_id = %contract_id, tx = %receipt.transaction_hash, "evm lock created");
        Ok(LockId::new(contract_id.to_string()))
    }

    async fn withdraw(&self, lock_id: &LockId, preimage: &Preimage) -> Result<Receipt, ChainError> {
        let call = HashedTimelock::withdrawCall {
            contractId: parse_lock_id(lock_id, ChainError::WithdrawFailed)?,
            preimage: B256::from(*preimage.as_bytes()),
        };
        let receipt = self
            .submit(call.abi_encode(), U256::ZERO, ChainError::WithdrawFailed)
            .await?;
        info!(%lock_id, tx = %receipt.transaction_hash, "evm lock withdrawn");
        Ok(receipt_for(&receipt))
    }

    async fn refund(&self, lock_id: &LockId) -> Result<Receipt, ChainError> {
        let call = HashedTimelock::refundCall {
            contractId: parse_lock_id(lock_id, ChainError::RefundFailed)?,
        };
        let receipt = self
            .submit(call.abi_encode(), U256::ZERO, ChainError::RefundFailed)
            .await?;
        info!(%lock_id, tx = %receipt.transaction_hash, "evm lock refunded");
        Ok(receipt_for(&receipt))
    }

    async fn lock_details(&self, lock_id: &LockId) -> Result<LockLookup<LockDetails>, ChainError> {
        let Ok(contract_id) = parse_lock_id(lock_id, ChainError::Transport) else {
            return Ok(LockLookup::Missing);
        };
        let Some(found) = self.get_contract(contract_id).await? else {
            return Ok(LockLookup::Missing);
        };
        Ok(LockLookup::Found(LockDetails {
            receiver: Address::new(found.receiver.to_string()),
            amount: u128::try_from(found.amount).unwrap_or(u128::MAX),
            hashlock: Hashlock::from_bytes(found.hashlock.0),
            expiry: u64::try_from(found.timelock).unwrap_or(u64::MAX),
            claimable: !found.withdrawn && !found.refunded,
        }))
    }

    async fn find_lock(
        &self,
        counterparty: &Address,
        amount: &TokenAmount,
        hashlock: &Hashlock,
        expiry: u64,
    ) -> Result<LockLookup<LockId>, ChainError> {
        let Ok(receiver) = EvmAddress::from_str(counterparty.as_str()) else {
            return Ok(LockLookup::Missing);
        };
        let sender = self.sender().await?;
        let expected = contract_id(
            sender,
            receiver,
            U256::from(amount.amount),
            B256::from(hashlock.to_bytes()),
            U256::from(expiry),
        );
        match self.get_contract(expected).await? {
            Some(_) => {
                debug!(lock_id = %expected, "evm lock found by terms");
                Ok(LockLookup::Found(LockId::new(expected.to_string())))
            }
            None => Ok(LockLookup::Missing),
        }
    }

    async fn block_timestamp(&self) -> Result<u64, ChainError> {
        self.rpc.block_timestamp().await
    }
}

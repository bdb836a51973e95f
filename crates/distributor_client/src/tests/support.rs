//! Scripted wallet that also plays the contract, for unit tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use alloy::{
    dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt},
    json_abi::Function,
    primitives::{address, Address, Bytes, B256, U256},
};
use async_trait::async_trait;
use serde_json::{json, Value};
use shared::{
    domain::BeneficiaryRecord,
    protocol::{methods, TransactionCall, WalletEvent, USER_REJECTED_CODE},
};
use tokio::sync::broadcast;

use crate::{
    binding::ContractBinding,
    interface::{functions, ContractInterface},
    provider::{ProviderAdapter, ProviderError, WalletProvider},
};

pub const OWNER: Address = address!("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
pub const OTHER: Address = address!("fB6916095ca1df60bB79Ce92cE3Ea74c37c5d359");
pub const CONTRACT: Address = address!("dbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB");
pub const USDT_TOKEN: Address = address!("D1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb");
pub const WETH_TOKEN: Address = address!("1111111111111111111111111111111111111111");
pub const SEPOLIA: u64 = 11_155_111;

pub fn beneficiaries(count: usize) -> Vec<BeneficiaryRecord> {
    (0..count)
        .map(|index| BeneficiaryRecord {
            wallet: Address::with_last_byte(index as u8 + 1),
            share: U256::from(100 * (index + 1)),
            last_claim_usdt: U256::from(1_700_000_000u64 + index as u64),
            last_claim_weth: U256::ZERO,
        })
        .collect()
}

pub struct MockState {
    pub accounts: Vec<Address>,
    pub authorized: bool,
    pub chain_id: u64,
    pub reject_connect: bool,
    pub reject_send: bool,
    pub revert_next: bool,
    pub fail_receipts: bool,
    pub never_mine: bool,
    /// Receipt polls answered with `null` before the receipt shows up.
    pub pending_polls: usize,
    pub failing_reads: Vec<&'static str>,
    pub owner: Address,
    pub interval: U256,
    pub paused: bool,
    pub locked: bool,
    pub beneficiaries: Vec<BeneficiaryRecord>,
    /// Overrides `beneficiariesCount()` independently of the stored records.
    pub reported_count: Option<U256>,
    pub index_delays: HashMap<usize, Duration>,
    pub calls: Vec<String>,
    pub indexed_reads: Vec<usize>,
    pub sent: Vec<String>,
    receipts: HashMap<B256, bool>,
    next_tx: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            accounts: vec![OWNER],
            authorized: false,
            chain_id: SEPOLIA,
            reject_connect: false,
            reject_send: false,
            revert_next: false,
            fail_receipts: false,
            never_mine: false,
            pending_polls: 0,
            failing_reads: Vec::new(),
            owner: OWNER,
            interval: U256::from(86_400),
            paused: false,
            locked: false,
            beneficiaries: Vec::new(),
            reported_count: None,
            index_delays: HashMap::new(),
            calls: Vec::new(),
            indexed_reads: Vec::new(),
            sent: Vec::new(),
            receipts: HashMap::new(),
            next_tx: 0,
        }
    }
}

impl MockState {
    fn total_shares(&self) -> U256 {
        self.beneficiaries
            .iter()
            .fold(U256::ZERO, |total, record| total + record.share)
    }

    fn evaluate(
        &mut self,
        function: &Function,
        inputs: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, ProviderError> {
        if self.failing_reads.iter().any(|name| *name == function.name) {
            return Err(reverted("read disabled by test"));
        }
        let values = match function.name.as_str() {
            functions::OWNER => vec![DynSolValue::Address(self.owner)],
            functions::TOTAL_SHARES => vec![uint(self.total_shares())],
            functions::DISTRIBUTION_INTERVAL => vec![uint(self.interval)],
            functions::IS_PAUSED => vec![DynSolValue::Bool(self.paused)],
            functions::IS_LOCKED => vec![DynSolValue::Bool(self.locked)],
            functions::USDT => vec![DynSolValue::Address(USDT_TOKEN)],
            functions::WETH => vec![DynSolValue::Address(WETH_TOKEN)],
            functions::BENEFICIARIES_COUNT => vec![uint(
                self.reported_count
                    .unwrap_or(U256::from(self.beneficiaries.len())),
            )],
            functions::BENEFICIARY_BY_INDEX => {
                let index = index_arg(inputs);
                self.indexed_reads.push(index);
                let record = self
                    .beneficiaries
                    .get(index)
                    .ok_or_else(|| reverted("index out of bounds"))?;
                vec![
                    DynSolValue::Address(record.wallet),
                    uint(record.share),
                    uint(record.last_claim_usdt),
                    uint(record.last_claim_weth),
                ]
            }
            functions::BENEFICIARY => {
                let wallet = address_arg(inputs);
                match self.beneficiaries.iter().find(|r| r.wallet == wallet) {
                    Some(record) => vec![
                        uint(record.share),
                        uint(record.last_claim_usdt),
                        uint(record.last_claim_weth),
                        DynSolValue::Bool(true),
                    ],
                    None => vec![
                        uint(U256::ZERO),
                        uint(U256::ZERO),
                        uint(U256::ZERO),
                        DynSolValue::Bool(false),
                    ],
                }
            }
            other => return Err(reverted(&format!("unexpected read {other}"))),
        };
        Ok(values)
    }

    fn apply_write(&mut self, function: &Function, inputs: &[DynSolValue]) {
        match function.name.as_str() {
            functions::ADD_BENEFICIARY => self.beneficiaries.push(BeneficiaryRecord {
                wallet: address_arg(inputs),
                share: uint_arg(inputs, 1),
                last_claim_usdt: U256::ZERO,
                last_claim_weth: U256::ZERO,
            }),
            functions::REMOVE_BENEFICIARY => {
                let wallet = address_arg(inputs);
                self.beneficiaries.retain(|record| record.wallet != wallet);
            }
            functions::UPDATE_SHARE => {
                let wallet = address_arg(inputs);
                let share = uint_arg(inputs, 1);
                for record in self.beneficiaries.iter_mut().filter(|r| r.wallet == wallet) {
                    record.share = share;
                }
            }
            functions::SET_DISTRIBUTION_INTERVAL => self.interval = uint_arg(inputs, 0),
            functions::SET_PAUSED => {
                self.paused = inputs.first().and_then(DynSolValue::as_bool).unwrap_or(false)
            }
            functions::LOCK_CONTRACT => self.locked = true,
            _ => {}
        }
    }
}

pub struct MockWallet {
    interface: ContractInterface,
    state: Mutex<MockState>,
    events: broadcast::Sender<WalletEvent>,
}

impl MockWallet {
    pub fn new() -> Arc<Self> {
        Self::with_state(MockState::default())
    }

    pub fn with_state(state: MockState) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            interface: ContractInterface::bundled().expect("bundled abi"),
            state: Mutex::new(state),
            events,
        })
    }

    pub fn adapter(self: &Arc<Self>) -> ProviderAdapter {
        ProviderAdapter::new(Arc::clone(self) as Arc<dyn WalletProvider>)
    }

    pub fn binding(self: &Arc<Self>) -> ContractBinding {
        ContractBinding::with_address(CONTRACT, self.interface.clone(), self.adapter())
    }

    pub fn interface(&self) -> ContractInterface {
        self.interface.clone()
    }

    pub fn update(&self, change: impl FnOnce(&mut MockState)) {
        change(&mut *self.lock());
    }

    pub fn inspect<T>(&self, read: impl FnOnce(&MockState) -> T) -> T {
        read(&*self.lock())
    }

    pub fn calls_to(&self, function: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|name| name.as_str() == function)
            .count()
    }

    pub fn emit(&self, event: WalletEvent) {
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    fn decode(&self, params: &Value) -> Result<(Function, Vec<DynSolValue>), ProviderError> {
        let call: TransactionCall =
            serde_json::from_value(params[0].clone()).map_err(|err| malformed(&err.to_string()))?;
        assert_eq!(call.to, CONTRACT, "calls must target the bound contract");
        let (selector, body) = call.data.split_at(4);
        let function = self
            .interface
            .abi()
            .functions()
            .find(|function| function.selector().as_slice() == selector)
            .cloned()
            .ok_or_else(|| reverted("unknown selector"))?;
        let inputs = function
            .abi_decode_input(body, true)
            .map_err(|err| malformed(&err.to_string()))?;
        Ok((function, inputs))
    }

    async fn eth_call(&self, params: Value) -> Result<Value, ProviderError> {
        let (function, inputs) = self.decode(&params)?;
        let (delay, outcome) = {
            let mut state = self.lock();
            state.calls.push(function.name.clone());
            let delay = if function.name == functions::BENEFICIARY_BY_INDEX {
                state.index_delays.get(&index_arg(&inputs)).copied()
            } else {
                None
            };
            (delay, state.evaluate(&function, &inputs))
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let encoded = function
            .abi_encode_output(&outcome?)
            .map_err(|err| malformed(&err.to_string()))?;
        Ok(json!(Bytes::from(encoded)))
    }

    fn send_transaction(&self, params: Value) -> Result<Value, ProviderError> {
        let (function, inputs) = self.decode(&params)?;
        let mut state = self.lock();
        state.sent.push(function.name.clone());
        if state.reject_send {
            return Err(rejected());
        }
        state.next_tx += 1;
        let tx_hash = B256::left_padding_from(&state.next_tx.to_be_bytes());
        let succeeded = !std::mem::take(&mut state.revert_next);
        if succeeded {
            state.apply_write(&function, &inputs);
        }
        state.receipts.insert(tx_hash, succeeded);
        Ok(json!(tx_hash))
    }

    fn receipt(&self, params: Value) -> Result<Value, ProviderError> {
        let tx_hash: B256 =
            serde_json::from_value(params[0].clone()).map_err(|err| malformed(&err.to_string()))?;
        let mut state = self.lock();
        if state.fail_receipts {
            return Err(ProviderError::Rpc {
                code: -32603,
                message: "header not found".to_string(),
            });
        }
        if state.never_mine {
            return Ok(Value::Null);
        }
        if state.pending_polls > 0 {
            state.pending_polls -= 1;
            return Ok(Value::Null);
        }
        Ok(match state.receipts.get(&tx_hash) {
            Some(succeeded) => json!({
                "transactionHash": tx_hash,
                "blockNumber": "0x10",
                "gasUsed": "0x5208",
                "status": if *succeeded { "0x1" } else { "0x0" },
            }),
            None => Value::Null,
        })
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        match method {
            methods::REQUEST_ACCOUNTS => {
                let mut state = self.lock();
                if state.reject_connect {
                    return Err(rejected());
                }
                state.authorized = true;
                Ok(json!(state.accounts))
            }
            methods::ACCOUNTS => {
                let state = self.lock();
                Ok(if state.authorized {
                    json!(state.accounts)
                } else {
                    json!([])
                })
            }
            methods::CHAIN_ID => Ok(json!(format!("{:#x}", self.lock().chain_id))),
            methods::CALL => self.eth_call(params).await,
            methods::SEND_TRANSACTION => self.send_transaction(params),
            methods::TRANSACTION_RECEIPT => self.receipt(params),
            other => Err(ProviderError::Rpc {
                code: -32601,
                message: format!("method {other} not supported"),
            }),
        }
    }

    fn subscribe_events(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

fn uint(value: U256) -> DynSolValue {
    DynSolValue::Uint(value, 256)
}

fn index_arg(inputs: &[DynSolValue]) -> usize {
    inputs
        .first()
        .and_then(DynSolValue::as_uint)
        .map(|(value, _)| value.saturating_to::<usize>())
        .unwrap_or(usize::MAX)
}

fn address_arg(inputs: &[DynSolValue]) -> Address {
    inputs
        .first()
        .and_then(DynSolValue::as_address)
        .unwrap_or(Address::ZERO)
}

fn uint_arg(inputs: &[DynSolValue], position: usize) -> U256 {
    inputs
        .get(position)
        .and_then(DynSolValue::as_uint)
        .map(|(value, _)| value)
        .unwrap_or(U256::ZERO)
}

pub fn rejected() -> ProviderError {
    ProviderError::Rpc {
        code: USER_REJECTED_CODE,
        message: "User rejected the request.".to_string(),
    }
}

fn reverted(reason: &str) -> ProviderError {
    ProviderError::Rpc {
        code: 3,
        message: format!("execution reverted: {reason}"),
    }
}

fn malformed(reason: &str) -> ProviderError {
    ProviderError::Malformed {
        method: "mock".to_string(),
        reason: reason.to_string(),
    }
}

//! Scripted `ChainSource` for synchronizer tests.

use crate::node::{
    AccountResult, AppResult, BalanceResult, BlockResult, ChainResult, ChainSource, NodeError,
    OrganizationResult, TokenResult,
};
use crate::sync::block_processor::fixtures::remote_block;

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct MockState {
    chains: Vec<ChainResult>,
    heights: HashMap<String, u64>,
    blocks: HashMap<(String, u64), BlockResult>,
    accounts: HashMap<String, AccountResult>,
    tokens: Vec<TokenResult>,
    apps: Vec<AppResult>,
    organizations: HashMap<String, OrganizationResult>,
    fail_accounts: bool,
    fail_all: bool,
    block_requests: usize,
}

/// In-memory node whose chains grow when the test says so.
#[derive(Default)]
pub struct MockChainSource {
    state: Mutex<MockState>,
}

impl MockChainSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chain with blocks `1..=height`.
    pub fn with_chain(self, address: &str, name: &str, height: u64) -> Self {
        self.state.lock().unwrap().chains.push(ChainResult {
            name: name.to_string(),
            address: address.to_string(),
            parent: String::new(),
            height,
            contracts: vec![],
        });
        self.extend_chain(address, height);
        self
    }

    /// Grow `address` up to `height` with generated blocks.
    pub fn extend_chain(&self, address: &str, height: u64) {
        let current = self.state.lock().unwrap().heights.get(address).copied().unwrap_or(0);
        for h in current + 1..=height {
            self.push_block(remote_block(address, h));
        }
        self.state
            .lock()
            .unwrap()
            .heights
            .insert(address.to_string(), height.max(current));
    }

    pub fn push_block(&self, block: BlockResult) {
        let mut state = self.state.lock().unwrap();
        let height = state.heights.entry(block.chain_address.clone()).or_insert(0);
        *height = (*height).max(block.height);
        state
            .blocks
            .insert((block.chain_address.clone(), block.height), block);
    }

    pub fn set_balance(&self, address: &str, symbol: &str, amount: u128) {
        self.state.lock().unwrap().accounts.insert(
            address.to_string(),
            AccountResult {
                address: address.to_string(),
                name: "anonymous".into(),
                stakes: None,
                balances: vec![BalanceResult {
                    chain: "main".into(),
                    amount: amount.to_string(),
                    symbol: symbol.to_string(),
                    decimals: 8,
                    ids: vec![],
                }],
            },
        );
    }

    pub fn add_token(&self, symbol: &str, name: &str, decimals: u32) {
        self.state.lock().unwrap().tokens.push(TokenResult {
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals,
            current_supply: "0".into(),
            max_supply: "0".into(),
            flags: "Transferable,Fungible".into(),
            metadata: vec![],
        });
    }

    pub fn add_app(&self, id: &str, title: &str) {
        self.state.lock().unwrap().apps.push(AppResult {
            id: id.to_string(),
            title: title.to_string(),
            url: String::new(),
            description: String::new(),
            icon: String::new(),
        });
    }

    pub fn add_organization(&self, id: &str, name: &str, members: &[&str]) {
        self.state.lock().unwrap().organizations.insert(
            id.to_string(),
            OrganizationResult {
                id: id.to_string(),
                name: name.to_string(),
                members: members.iter().map(|m| m.to_string()).collect(),
            },
        );
    }

    pub fn fail_accounts(&self, fail: bool) {
        self.state.lock().unwrap().fail_accounts = fail;
    }

    /// Make every request fail, as if the node were unreachable.
    pub fn fail_all(&self, fail: bool) {
        self.state.lock().unwrap().fail_all = fail;
    }

    pub fn block_requests(&self) -> usize {
        self.state.lock().unwrap().block_requests
    }

    fn check_reachable(&self) -> Result<(), NodeError> {
        if self.state.lock().unwrap().fail_all {
            return Err(NodeError::Status(503));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChainSource for MockChainSource {
    async fn get_chains(&self) -> Result<Vec<ChainResult>, NodeError> {
        self.check_reachable()?;
        Ok(self.state.lock().unwrap().chains.clone())
    }

    async fn get_block_height(&self, chain: &str) -> Result<u64, NodeError> {
        self.check_reachable()?;
        self.state
            .lock()
            .unwrap()
            .heights
            .get(chain)
            .copied()
            .ok_or_else(|| NodeError::Rpc {
                code: -32000,
                message: format!("chain {} not found", chain),
            })
    }

    async fn get_block_by_height(
        &self,
        chain: &str,
        height: u64,
    ) -> Result<Option<BlockResult>, NodeError> {
        self.check_reachable()?;
        let mut state = self.state.lock().unwrap();
        state.block_requests += 1;
        Ok(state.blocks.get(&(chain.to_string(), height)).cloned())
    }

    async fn get_block_by_hash(&self, hash: &str) -> Result<Option<BlockResult>, NodeError> {
        self.check_reachable()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .blocks
            .values()
            .find(|b| b.hash == hash)
            .cloned())
    }

    async fn get_account(&self, address: &str) -> Result<Option<AccountResult>, NodeError> {
        self.check_reachable()?;
        let state = self.state.lock().unwrap();
        if state.fail_accounts {
            return Err(NodeError::Status(503));
        }
        Ok(Some(state.accounts.get(address).cloned().unwrap_or_else(|| {
            AccountResult {
                address: address.to_string(),
                name: "anonymous".into(),
                stakes: None,
                balances: vec![],
            }
        })))
    }

    async fn get_tokens(&self) -> Result<Vec<TokenResult>, NodeError> {
        self.check_reachable()?;
        Ok(self.state.lock().unwrap().tokens.clone())
    }

    async fn get_apps(&self) -> Result<Vec<AppResult>, NodeError> {
        self.check_reachable()?;
        Ok(self.state.lock().unwrap().apps.clone())
    }

    async fn get_organization(&self, id: &str) -> Result<Option<OrganizationResult>, NodeError> {
        self.check_reachable()?;
        Ok(self.state.lock().unwrap().organizations.get(id).cloned())
    }
}

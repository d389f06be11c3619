//! Block ingestion service for mirror synchronization.
//!
//! This module provides the `BlockIngestService`, which fetches blocks and reference data from the
//! node and writes them into the mirror. A block that creates a token refreshes the token list
//! first, so its descriptions render the new token's decimals. Ingesting then gathers the touched
//! accounts and new organizations from the node, commits the block in one store write and finally
//! applies the gathered follow-ups. A node failure therefore leaves the block unapplied and it is
//! retried by the next pass.

use super::block_processor::{
    BlockProcessor, ProcessedBlock, account_refresh_from_result, app_from_result,
    chain_from_result, creates_token, organization_from_result, token_from_result,
};
use super::parallel::do_parallel_requests;
use super::types::SyncError;
use crate::mirror::{AccountRefresh, Chain, MirrorStore, Organization, Token};
use crate::node::{BlockResult, ChainSource, NodeError};

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Outcome of ingesting one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    /// False when the block was already mirrored.
    pub applied: bool,
    pub transactions: usize,
}

/// Service that moves node data into the mirror.
#[derive(Clone)]
pub struct BlockIngestService {
    source: Arc<dyn ChainSource>,
    store: Arc<dyn MirrorStore>,
    processor: BlockProcessor,
    window: usize,
}

impl BlockIngestService {
    /// Create a new service; `window` bounds the parallel account lookups per block.
    pub fn new(source: Arc<dyn ChainSource>, store: Arc<dyn MirrorStore>, window: usize) -> Self {
        Self {
            processor: BlockProcessor::new(store.clone()),
            source,
            store,
            window,
        }
    }

    pub fn store(&self) -> &Arc<dyn MirrorStore> {
        &self.store
    }

    /// Fetch the block at `height`, treating an absent block as an error.
    pub async fn fetch_block(&self, chain: &str, height: u64) -> Result<BlockResult, SyncError> {
        self.source
            .get_block_by_height(chain, height)
            .await?
            .ok_or_else(|| SyncError::MissingBlock {
                chain: chain.to_string(),
                height,
            })
    }

    /// Ingest a fetched block and its follow-ups.
    pub async fn ingest(&self, block: &BlockResult) -> Result<IngestOutcome, SyncError> {
        if self.store.block_by_hash(&block.hash)?.is_some() {
            debug!("Block {} already mirrored", block.hash);
            return Ok(IngestOutcome {
                applied: false,
                transactions: 0,
            });
        }

        if creates_token(block) {
            let count = self.refresh_tokens().await?;
            debug!("Block {} creates a token, refreshed {} tokens", block.hash, count);
        }

        let ProcessedBlock {
            bundle,
            touched_accounts,
            organizations,
        } = self.processor.process_block(block)?;
        let transactions = bundle.transactions.len();

        let accounts = self.fetch_accounts(&touched_accounts).await?;
        let organizations = self.fetch_new_organizations(&organizations).await?;

        if !self.store.apply_block(bundle)? {
            return Ok(IngestOutcome {
                applied: false,
                transactions: 0,
            });
        }

        for refresh in accounts {
            self.store.refresh_account(refresh)?;
        }
        for organization in organizations {
            debug!("Mirroring organization {}", organization.id);
            self.store.upsert_organization(organization)?;
        }

        Ok(IngestOutcome {
            applied: true,
            transactions,
        })
    }

    /// Fetch the current state of every address, `window` requests at a time.
    pub async fn fetch_accounts(
        &self,
        addresses: &BTreeSet<String>,
    ) -> Result<Vec<AccountRefresh>, SyncError> {
        let addresses: Vec<&String> = addresses.iter().collect();
        let results = do_parallel_requests("accounts", addresses.len(), self.window, |i| {
            let source = self.source.clone();
            let address = addresses[i].clone();
            async move { source.get_account(&address).await }
        })
        .await?;

        results
            .iter()
            .flatten()
            .map(account_refresh_from_result)
            .collect()
    }

    async fn fetch_new_organizations(
        &self,
        ids: &BTreeSet<String>,
    ) -> Result<Vec<Organization>, SyncError> {
        let mut organizations = Vec::new();
        for id in ids {
            if self.store.organization(id)?.is_some() {
                continue;
            }
            match self.source.get_organization(id).await? {
                Some(result) => organizations.push(organization_from_result(&result)),
                None => debug!("Organization {} unknown to the node", id),
            }
        }
        Ok(organizations)
    }

    /// Replace the mirrored token list with the node's.
    pub async fn refresh_tokens(&self) -> Result<usize, SyncError> {
        let tokens = self
            .source
            .get_tokens()
            .await?
            .iter()
            .map(token_from_result)
            .collect::<Result<Vec<Token>, _>>()?;
        let count = tokens.len();
        for token in tokens {
            self.store.upsert_token(token)?;
        }
        Ok(count)
    }

    /// Replace the mirrored application list with the node's.
    pub async fn refresh_apps(&self) -> Result<usize, SyncError> {
        let apps = self.source.get_apps().await?;
        for app in &apps {
            self.store.upsert_app(app_from_result(app))?;
        }
        Ok(apps.len())
    }

    /// Insert chains the mirror does not know yet, returning them.
    pub async fn refresh_chains(&self) -> Result<Vec<Chain>, SyncError> {
        let mut discovered = Vec::new();
        for result in self.source.get_chains().await? {
            let chain = chain_from_result(&result);
            if self.store.upsert_chain(chain.clone())? {
                discovered.push(chain);
            }
        }
        Ok(discovered)
    }

    pub async fn remote_height(&self, chain: &str) -> Result<u64, NodeError> {
        self.source.get_block_height(chain).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::codec::encode;
    use crate::mirror::InMemoryMirror;
    use crate::sync::block_processor::fixtures::*;
    use crate::sync::testing::MockChainSource;

    fn service(source: MockChainSource) -> (BlockIngestService, Arc<dyn MirrorStore>) {
        let store: Arc<dyn MirrorStore> = Arc::new(InMemoryMirror::new());
        (
            BlockIngestService::new(Arc::new(source), store.clone(), 16),
            store,
        )
    }

    #[tokio::test]
    async fn test_ingest_refreshes_touched_accounts() {
        let source = MockChainSource::new().with_chain("S3dMain", "main", 1);
        source.set_balance("X", "SOUL", 900);
        source.set_balance("Y", "SOUL", 100);
        let (service, store) = service(source);
        service.refresh_chains().await.unwrap();

        let block = service.fetch_block("S3dMain", 1).await.unwrap();
        let outcome = service.ingest(&block).await.unwrap();
        assert!(outcome.applied);
        assert_eq!(outcome.transactions, 1);

        let x = store.account("X").unwrap().unwrap();
        assert_eq!(x.balance_of("SOUL"), 900);
        assert!(x.transactions.contains("S3dMain-RT1"));

        let again = service.ingest(&block).await.unwrap();
        assert!(!again.applied);
        assert_eq!(store.transaction_count(None).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ingest_fetches_new_organizations_and_tokens() {
        let source = MockChainSource::new().with_chain("S3dMain", "main", 0);
        source.add_organization("validators", "Validators", &["A"]);
        source.add_token("NACHO", "Nacho", 0);
        source.push_block(remote_block_with_events(
            "S3dMain",
            1,
            vec![
                event("OrganizationCreate", "A", &encode::string_event("validators")),
                event("TokenCreate", "A", &encode::string_event("NACHO")),
            ],
        ));
        let (service, store) = service(source);
        service.refresh_chains().await.unwrap();

        let block = service.fetch_block("S3dMain", 1).await.unwrap();
        service.ingest(&block).await.unwrap();

        let organization = store.organization("validators").unwrap().unwrap();
        assert_eq!(organization.members, vec!["A".to_string()]);
        assert!(store.token("NACHO").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_token_created_and_minted_in_one_block() {
        let source = MockChainSource::new().with_chain("S3dMain", "main", 0);
        source.add_token("NACHO", "Nacho", 3);
        source.push_block(remote_block_with_events(
            "S3dMain",
            1,
            vec![
                event("TokenCreate", "A", &encode::string_event("NACHO")),
                event("TokenMint", "A", &encode::token_event("NACHO", 7000, "main")),
            ],
        ));
        let (service, store) = service(source);
        service.refresh_chains().await.unwrap();

        let block = service.fetch_block("S3dMain", 1).await.unwrap();
        service.ingest(&block).await.unwrap();

        let tx = store.transaction("S3dMain-RT1").unwrap().unwrap();
        assert_eq!(tx.summary.description, "A created token NACHO\nA minted 7 NACHO");
    }

    #[tokio::test]
    async fn test_missing_block_is_an_error() {
        let source = MockChainSource::new().with_chain("S3dMain", "main", 1);
        let (service, _) = service(source);
        let err = service.fetch_block("S3dMain", 5).await.unwrap_err();
        assert!(matches!(err, SyncError::MissingBlock { height: 5, .. }));
    }

    #[tokio::test]
    async fn test_node_failure_leaves_block_unapplied() {
        let source = MockChainSource::new().with_chain("S3dMain", "main", 1);
        source.fail_accounts(true);
        let (service, store) = service(source);
        service.refresh_chains().await.unwrap();

        let block = service.fetch_block("S3dMain", 1).await.unwrap();
        assert!(service.ingest(&block).await.is_err());
        assert_eq!(store.chain("S3dMain").unwrap().unwrap().height, 0);
        assert!(store.block_by_height("S3dMain", 1).unwrap().is_none());
    }
}

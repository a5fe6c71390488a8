//! # Chain Management
//!
//! [`Chain`] owns the tip hash and the store handle. It is the only thing
//! that writes blocks, and it writes each one together with the tip pointer
//! that references it in a single atomic batch:
//!
//! ```text
//! append(data)
//!   1. READ    — load the tip block          (missing -> CorruptChain)
//!   2. SOLVE   — pow.solve(tip.hash, data, clock.now())
//!   3. BUILD   — Block at tip.height + 1
//!   4. COMMIT  — { hash -> encode(block), tip_key -> hash } in one batch
//!   5. ADVANCE — in-memory tip = hash
//! ```
//!
//! A failure in any step returns before step 5, so the in-memory tip and the
//! store stay exactly as they were. The exception is a batch that became
//! visible even though the write reported an error, as with `StorageFlush`:
//! the tip moves onto the visible block before the error is returned.
//!
//! Solver output is checked before anything is written: a hash equal to
//! `SENTINEL_HASH` would read as "no predecessor" to the next block, so it is
//! refused. The tip key can never collide with a hash because bootstrap
//! rejects tip keys of hash length.
//!
//! ## Single Writer
//!
//! `append` takes `&mut self`: on an owned chain the borrow checker already
//! serializes writers. [`SharedChain`] puts the chain behind an
//! `Arc<RwLock<_>>` for multi-threaded callers; appends hold the write lock
//! for all five steps, lookups and iterator creation take the read lock.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::block::Block;
use super::codec::{self, CodecError};
use super::db::{KvStore, SledStore, StoreError, WriteBatch};
use super::iter::ChainIterator;
use crate::clock::{Clock, SystemClock};
use crate::config::{BlockHash, ChainConfig, HASH_LENGTH, SENTINEL_HASH};
use crate::pow::{HashCash, PowError, ProofOfWork, Solution};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors reported by chain operations. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The store could not be opened or created.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),

    /// A read from an open store failed.
    #[error("storage read failed: {0}")]
    StorageRead(#[source] StoreError),

    /// An atomic write did not commit. Nothing from the batch is visible.
    #[error("atomic write did not commit: {0}")]
    StorageWrite(#[source] StoreError),

    /// The batch is visible but was not flushed to disk. The chain has
    /// already advanced onto it.
    #[error("block committed but not durable: {0}")]
    StorageFlush(#[source] StoreError),

    /// The tip or a predecessor does not resolve, or stored blocks are not
    /// linked the way the chain wrote them.
    #[error("corrupt chain: {0}")]
    CorruptChain(String),

    /// Stored bytes could not be decoded into a block.
    #[error("serialization error: {0}")]
    Serialization(#[from] CodecError),

    /// The proof-of-work collaborator could not produce a solution.
    #[error("proof of work failed: {0}")]
    ProofOfWork(#[from] PowError),

    /// The solver returned a hash that is already stored. Writing it would
    /// overwrite an existing block.
    #[error("block {0} already exists")]
    DuplicateBlock(String),

    /// The solver returned a hash that cannot be used as a block key.
    #[error("invalid proof-of-work solution: {0}")]
    InvalidSolution(String),

    /// The configuration cannot describe a consistent chain.
    #[error("invalid chain configuration: {0}")]
    InvalidConfig(String),
}

impl From<StoreError> for ChainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Open { .. } => ChainError::StorageUnavailable(err),
            StoreError::Read(_) => ChainError::StorageRead(err),
            StoreError::Write(_) => ChainError::StorageWrite(err),
            StoreError::Flush(_) => ChainError::StorageFlush(err),
        }
    }
}

pub type ChainResult<T> = Result<T, ChainError>;

pub(crate) fn corrupt(reason: String) -> ChainError {
    warn!(%reason, "chain corruption detected");
    ChainError::CorruptChain(reason)
}

/// Read and decode the block stored under `hash`.
pub(crate) fn read_block<S: KvStore + ?Sized>(
    store: &S,
    hash: &BlockHash,
) -> ChainResult<Option<Block>> {
    match store.get(hash)? {
        Some(bytes) => Ok(Some(codec::decode(&bytes)?)),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// An append-only, hash-linked chain of blocks over a [`KvStore`].
pub struct Chain<S: KvStore = SledStore> {
    store: Arc<S>,
    tip: BlockHash,
    config: ChainConfig,
    pow: Arc<dyn ProofOfWork>,
    clock: Arc<dyn Clock>,
}

impl<S: KvStore> fmt::Debug for Chain<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("tip", &hex::encode(self.tip))
            .field("table", &self.config.table_name)
            .finish_non_exhaustive()
    }
}

impl Chain<SledStore> {
    /// Open the sled database described by `config` and bootstrap a chain on
    /// it, using [`HashCash`] at `config.difficulty_bits` and the system
    /// clock.
    pub fn open(config: ChainConfig) -> ChainResult<Self> {
        let pow = HashCash::new(config.difficulty_bits)?;

        let store = if config.temporary {
            SledStore::open_temporary(&config.table_name)?
        } else {
            if SledStore::exists(&config.path) {
                info!(path = %config.path.display(), "opening existing database");
            } else {
                info!(path = %config.path.display(), "creating new database");
            }
            SledStore::open(&config.path, &config.table_name)?
        };

        debug!(difficulty_bits = pow.difficulty_bits(), "using hashcash solver");
        Self::bootstrap(store, config, Arc::new(pow), Arc::new(SystemClock))
    }
}

impl<S: KvStore> Chain<S> {
    /// Bind a chain to `store`.
    ///
    /// If the store already records a tip, that tip is loaded and must
    /// resolve to a stored block. Otherwise an origin block is solved over
    /// `config.genesis_data` and written together with the tip pointer in
    /// one atomic batch.
    pub fn bootstrap(
        store: S,
        config: ChainConfig,
        pow: Arc<dyn ProofOfWork>,
        clock: Arc<dyn Clock>,
    ) -> ChainResult<Self> {
        validate_config(&config)?;
        let store = Arc::new(store);

        if let Some(raw) = store.get(&config.tip_key)? {
            let tip = parse_tip(&raw)?;
            let block = read_block(&*store, &tip)?.ok_or_else(|| {
                corrupt(format!("recorded tip {} is not stored", hex::encode(tip)))
            })?;
            info!(
                table = %config.table_name,
                tip = %hex::encode(tip),
                height = block.height(),
                "loaded existing chain"
            );
            return Ok(Self {
                store,
                tip,
                config,
                pow,
                clock,
            });
        }

        let timestamp = clock.now();
        let solution = pow.solve(&SENTINEL_HASH, &config.genesis_data, timestamp)?;
        check_solution(&solution)?;
        let genesis = Block::genesis(config.genesis_data.clone(), timestamp, solution);
        commit(&*store, &config.tip_key, &genesis)?;

        info!(
            table = %config.table_name,
            hash = %genesis.hash_hex(),
            "created genesis block"
        );

        Ok(Self {
            store,
            tip: *genesis.hash(),
            config,
            pow,
            clock,
        })
    }

    /// Append a block carrying `data` and return its hash.
    pub fn append(&mut self, data: impl AsRef<[u8]>) -> ChainResult<BlockHash> {
        let data = data.as_ref();
        let parent = self.tip_block()?;

        let timestamp = self.clock.now();
        let solution = self.pow.solve(parent.hash(), data, timestamp)?;
        check_solution(&solution)?;
        if self.store.get(&solution.hash)?.is_some() {
            return Err(ChainError::DuplicateBlock(hex::encode(solution.hash)));
        }

        let block = Block::new(&parent, data.to_vec(), timestamp, solution);
        if let Err(err) = commit(&*self.store, &self.config.tip_key, &block) {
            self.adopt_if_committed(block.hash());
            return Err(err);
        }
        self.tip = *block.hash();

        debug!(
            height = block.height(),
            hash = %block.hash_hex(),
            bytes = data.len(),
            "block appended"
        );
        Ok(self.tip)
    }

    /// Hash of the most recently appended block.
    pub fn tip_hash(&self) -> BlockHash {
        self.tip
    }

    /// The block at the tip. Fails with `CorruptChain` if it is not stored.
    pub fn tip_block(&self) -> ChainResult<Block> {
        read_block(&*self.store, &self.tip)?.ok_or_else(|| {
            corrupt(format!("tip {} is not stored", hex::encode(self.tip)))
        })
    }

    /// Height of the tip block. The chain holds `height + 1` blocks.
    pub fn height(&self) -> ChainResult<u64> {
        Ok(self.tip_block()?.height())
    }

    /// Look up any stored block by hash.
    pub fn lookup(&self, hash: &BlockHash) -> ChainResult<Option<Block>> {
        read_block(&*self.store, hash)
    }

    /// Walk from the current tip back to the origin block. The iterator keeps
    /// its own snapshot of the tip, so later appends do not affect it.
    pub fn iter(&self) -> ChainIterator<S> {
        ChainIterator::new(Arc::clone(&self.store), self.tip)
    }

    /// Full structural check: every block from tip to origin is stored under
    /// its own hash, heights fall by exactly one, the origin sits at height
    /// zero, and the proof-of-work collaborator accepts each block.
    ///
    /// Returns the number of blocks walked.
    pub fn verify(&self) -> ChainResult<u64> {
        let mut count = 0u64;
        for block in self.iter() {
            let block = block?;
            if !self.pow.verify(&block) {
                return Err(corrupt(format!(
                    "block {} at height {} fails proof-of-work verification",
                    block.hash_hex(),
                    block.height()
                )));
            }
            count += 1;
        }
        debug!(blocks = count, "chain verified");
        Ok(count)
    }

    /// Every block from tip to origin, rendered with its `Display` form.
    pub fn render(&self) -> ChainResult<String> {
        let mut out = String::new();
        for block in self.iter() {
            let block = block?;
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&block.to_string());
        }
        Ok(out)
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// The underlying store. Writing to it directly bypasses every check
    /// the chain makes; it is exposed for repair tooling and fault
    /// injection.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn flush(&self) -> ChainResult<()> {
        Ok(self.store.flush()?)
    }

    /// After a failed commit, move the tip onto `hash` if the store already
    /// records it. Otherwise the next append would build a sibling below it
    /// and orphan the visible block.
    fn adopt_if_committed(&mut self, hash: &BlockHash) {
        match self.store.get(&self.config.tip_key) {
            Ok(Some(raw)) if raw.as_slice() == hash.as_slice() => {
                warn!(
                    hash = %hex::encode(hash),
                    "failed commit is visible; advancing tip onto it"
                );
                self.tip = *hash;
            }
            Ok(_) => {}
            Err(err) => warn!(%err, "cannot re-read tip after failed commit"),
        }
    }
}

fn validate_config(config: &ChainConfig) -> ChainResult<()> {
    if config.tip_key.is_empty() || config.tip_key.len() == HASH_LENGTH {
        return Err(ChainError::InvalidConfig(format!(
            "tip key is {} bytes; it must be non-empty and not {} bytes long",
            config.tip_key.len(),
            HASH_LENGTH
        )));
    }
    Ok(())
}

fn check_solution(solution: &Solution) -> ChainResult<()> {
    if solution.hash == SENTINEL_HASH {
        return Err(ChainError::InvalidSolution(
            "hash equals the sentinel predecessor".to_string(),
        ));
    }
    Ok(())
}

fn parse_tip(raw: &[u8]) -> ChainResult<BlockHash> {
    BlockHash::try_from(raw).map_err(|_| {
        corrupt(format!(
            "tip pointer is {} bytes, expected {}",
            raw.len(),
            HASH_LENGTH
        ))
    })
}

/// Write `block` and point the tip at it, atomically.
fn commit<S: KvStore + ?Sized>(store: &S, tip_key: &[u8], block: &Block) -> ChainResult<()> {
    let encoded = codec::encode(block)?;
    let mut batch = WriteBatch::new();
    batch
        .put(block.hash().as_slice(), encoded)
        .put(tip_key, block.hash().as_slice());
    store.write_atomic(batch)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// SharedChain
// ---------------------------------------------------------------------------

/// Cloneable, thread-safe handle to a single chain.
pub struct SharedChain<S: KvStore = SledStore> {
    inner: Arc<RwLock<Chain<S>>>,
}

impl<S: KvStore> Clone for SharedChain<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: KvStore> fmt::Debug for SharedChain<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedChain").field(&*self.inner.read()).finish()
    }
}

impl<S: KvStore> SharedChain<S> {
    pub fn new(chain: Chain<S>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(chain)),
        }
    }

    /// Append under the write lock: no other append can observe the old tip
    /// once this one has read it.
    pub fn append(&self, data: impl AsRef<[u8]>) -> ChainResult<BlockHash> {
        self.inner.write().append(data)
    }

    pub fn tip_hash(&self) -> BlockHash {
        self.inner.read().tip_hash()
    }

    pub fn height(&self) -> ChainResult<u64> {
        self.inner.read().height()
    }

    pub fn lookup(&self, hash: &BlockHash) -> ChainResult<Option<Block>> {
        self.inner.read().lookup(hash)
    }

    /// Iterator over the tip as of this call. The lock is released before
    /// the iterator is returned.
    pub fn iter(&self) -> ChainIterator<S> {
        self.inner.read().iter()
    }

    pub fn verify(&self) -> ChainResult<u64> {
        self.inner.read().verify()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::db::{MemoryStore, StoreResult};

    /// Memory store whose writes can be switched off, or applied and then
    /// reported as failed.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_writes: AtomicBool,
        fail_flush: AtomicBool,
        misreport_writes: AtomicBool,
    }

    fn io_error(msg: &str) -> sled::Error {
        sled::Error::Io(std::io::Error::new(std::io::ErrorKind::Other, msg.to_string()))
    }

    impl FlakyStore {
        fn failing() -> Self {
            let store = Self::default();
            store.fail_writes.store(true, Ordering::SeqCst);
            store
        }
    }

    impl KvStore for FlakyStore {
        fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn write_atomic(&self, batch: WriteBatch) -> StoreResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Write(io_error("injected write failure")));
            }
            self.inner.write_atomic(batch)?;
            if self.fail_flush.load(Ordering::SeqCst) {
                return Err(StoreError::Flush(io_error("injected flush failure")));
            }
            if self.misreport_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Write(io_error("write reported lost")));
            }
            Ok(())
        }
    }

    fn config() -> ChainConfig {
        ChainConfig::temporary().with_difficulty_bits(0)
    }

    fn fast_pow() -> Arc<dyn ProofOfWork> {
        Arc::new(HashCash::new(0).unwrap())
    }

    fn memory_chain() -> Chain<MemoryStore> {
        Chain::bootstrap(
            MemoryStore::new(),
            config(),
            fast_pow(),
            Arc::new(ManualClock::new(1_700_000_000)),
        )
        .unwrap()
    }

    fn heights<S: KvStore>(chain: &Chain<S>) -> Vec<u64> {
        chain.iter().map(|b| b.unwrap().height()).collect()
    }

    #[test]
    fn bootstrap_creates_genesis() {
        let chain = memory_chain();
        let genesis = chain.tip_block().unwrap();

        assert_eq!(genesis.height(), 0);
        assert_eq!(genesis.prev_block_hash(), &SENTINEL_HASH);
        assert_eq!(genesis.data(), crate::config::GENESIS_DATA);
        assert_eq!(genesis.timestamp(), 1_700_000_000);
        assert_eq!(chain.height().unwrap(), 0);
        // genesis block + tip pointer
        assert_eq!(chain.store().len(), 2);
    }

    #[test]
    fn bootstrap_loads_existing_tip_without_writing() {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::new(0));
        let mut chain = Chain::bootstrap(store, config(), fast_pow(), clock.clone()).unwrap();
        chain.append(b"one").unwrap();
        let tip = chain.tip_hash();

        let Chain { store, .. } = chain;
        let store = Arc::try_unwrap(store).unwrap();
        let reloaded = Chain::bootstrap(store, config(), fast_pow(), clock).unwrap();

        assert_eq!(reloaded.tip_hash(), tip);
        assert_eq!(reloaded.store().len(), 3);
    }

    #[test]
    fn append_links_to_previous_tip() {
        let mut chain = memory_chain();
        let genesis_hash = chain.tip_hash();

        let hash = chain.append(b"first").unwrap();
        let block = chain.lookup(&hash).unwrap().expect("block stored");

        assert_eq!(chain.tip_hash(), hash);
        assert_eq!(block.height(), 1);
        assert_eq!(block.prev_block_hash(), &genesis_hash);
        assert_eq!(block.data(), b"first");
        assert_eq!(heights(&chain), vec![1, 0]);
    }

    #[test]
    fn n_appends_give_height_n() {
        let mut chain = memory_chain();
        for i in 0..10u32 {
            chain.append(i.to_le_bytes()).unwrap();
        }
        assert_eq!(chain.height().unwrap(), 10);
        assert_eq!(heights(&chain), (0..=10).rev().collect::<Vec<_>>());
        assert_eq!(chain.verify().unwrap(), 11);
    }

    #[test]
    fn append_uses_clock() {
        let clock = Arc::new(ManualClock::new(100));
        let mut chain =
            Chain::bootstrap(MemoryStore::new(), config(), fast_pow(), clock.clone()).unwrap();
        clock.advance(60);
        let hash = chain.append(b"later").unwrap();
        assert_eq!(chain.lookup(&hash).unwrap().unwrap().timestamp(), 160);
    }

    #[test]
    fn empty_payload_gets_fresh_hash() {
        let mut chain = memory_chain();
        let mut seen = vec![chain.tip_hash()];
        for _ in 0..5 {
            let hash = chain.append(b"").unwrap();
            assert!(!seen.contains(&hash));
            seen.push(hash);
        }
    }

    #[test]
    fn bootstrap_write_failure_returns_no_chain() {
        let err = Chain::bootstrap(
            FlakyStore::failing(),
            config(),
            fast_pow(),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::StorageWrite(_)));
    }

    #[test]
    fn failed_append_leaves_tip_and_store_unchanged() {
        let mut chain = Chain::bootstrap(
            FlakyStore::default(),
            config(),
            fast_pow(),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();
        chain.append(b"ok").unwrap();
        let tip = chain.tip_hash();
        let entries = chain.store().inner.len();

        chain.store().fail_writes.store(true, Ordering::SeqCst);
        let err = chain.append(b"lost").unwrap_err();

        assert!(matches!(err, ChainError::StorageWrite(_)));
        assert_eq!(chain.tip_hash(), tip);
        assert_eq!(chain.store().inner.len(), entries);
        assert_eq!(heights(&chain), vec![1, 0]);

        chain.store().fail_writes.store(false, Ordering::SeqCst);
        chain.append(b"recovered").unwrap();
        assert_eq!(heights(&chain), vec![2, 1, 0]);
    }

    #[test]
    fn missing_tip_block_is_corruption() {
        let mut chain = memory_chain();
        let hash = chain.append(b"doomed").unwrap();
        chain.store().remove(&hash);

        assert!(matches!(
            chain.append(b"next").unwrap_err(),
            ChainError::CorruptChain(_)
        ));
        let first = chain.iter().next().expect("one item");
        assert!(matches!(first, Err(ChainError::CorruptChain(_))));
        assert!(matches!(chain.verify(), Err(ChainError::CorruptChain(_))));
        assert_eq!(chain.tip_hash(), hash);
    }

    #[test]
    fn bootstrap_rejects_dangling_tip() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put(crate::config::DEFAULT_TIP_KEY, [9u8; 32].as_slice());
        store.write_atomic(batch).unwrap();

        let err = Chain::bootstrap(store, config(), fast_pow(), Arc::new(ManualClock::new(0)))
            .unwrap_err();
        assert!(matches!(err, ChainError::CorruptChain(_)));
    }

    #[test]
    fn bootstrap_rejects_malformed_tip() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put(crate::config::DEFAULT_TIP_KEY, b"short".as_slice());
        store.write_atomic(batch).unwrap();

        let err = Chain::bootstrap(store, config(), fast_pow(), Arc::new(ManualClock::new(0)))
            .unwrap_err();
        assert!(matches!(err, ChainError::CorruptChain(msg) if msg.contains("5 bytes")));
    }

    #[test]
    fn undecodable_block_is_serialization_error() {
        let chain = memory_chain();
        let mut batch = WriteBatch::new();
        batch.put(chain.tip_hash().as_slice(), b"garbage".as_slice());
        chain.store().write_atomic(batch).unwrap();

        assert!(matches!(
            chain.tip_block().unwrap_err(),
            ChainError::Serialization(_)
        ));
    }

    #[test]
    fn duplicate_solution_is_refused() {
        let constant = |_: &BlockHash, _: &[u8], _: i64| -> Result<Solution, PowError> {
            Ok(Solution {
                hash: [7u8; 32],
                nonce: 0,
            })
        };
        let mut chain = Chain::bootstrap(
            MemoryStore::new(),
            config(),
            Arc::new(constant),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();

        let err = chain.append(b"same hash again").unwrap_err();
        assert!(matches!(err, ChainError::DuplicateBlock(_)));
        assert_eq!(heights(&chain), vec![0]);
    }

    #[test]
    fn pow_failure_aborts_append() {
        let failing = |_: &BlockHash, data: &[u8], _: i64| -> Result<Solution, PowError> {
            if data.is_empty() {
                Ok(Solution {
                    hash: [1u8; 32],
                    nonce: 0,
                })
            } else {
                Err(PowError::Exhausted { difficulty_bits: 1 })
            }
        };
        let mut chain = Chain::bootstrap(
            MemoryStore::new(),
            config().with_genesis_data(Vec::new()),
            Arc::new(failing),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();

        let tip = chain.tip_hash();
        assert!(matches!(
            chain.append(b"x").unwrap_err(),
            ChainError::ProofOfWork(_)
        ));
        assert_eq!(chain.tip_hash(), tip);
    }

    #[test]
    fn verify_catches_forged_payload() {
        let pow: Arc<dyn ProofOfWork> = Arc::new(HashCash::new(4).unwrap());
        let mut chain = Chain::bootstrap(
            MemoryStore::new(),
            config(),
            Arc::clone(&pow),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();
        let hash = chain.append(b"honest").unwrap();
        assert_eq!(chain.verify().unwrap(), 2);

        // Same linkage, different payload: structurally fine, fails PoW.
        let honest = chain.lookup(&hash).unwrap().unwrap();
        let forged = Block::from_parts(
            honest.height(),
            honest.timestamp(),
            *honest.prev_block_hash(),
            b"forged".to_vec(),
            Solution {
                hash,
                nonce: honest.nonce(),
            },
        );
        let mut batch = WriteBatch::new();
        batch.put(hash.as_slice(), codec::encode(&forged).unwrap());
        chain.store().write_atomic(batch).unwrap();

        assert!(matches!(chain.verify(), Err(ChainError::CorruptChain(_))));
    }

    #[test]
    fn render_lists_blocks_tip_first() {
        let mut chain = memory_chain();
        chain.append(b"second entry").unwrap();
        let rendered = chain.render().unwrap();

        let tip_pos = rendered.find("second entry").unwrap();
        let genesis_pos = rendered.find("Genesis Block...").unwrap();
        assert!(tip_pos < genesis_pos);
        assert_eq!(rendered.matches("Height:").count(), 2);
    }

    #[test]
    fn shared_chain_serializes_concurrent_appends() {
        use std::thread;

        let shared = SharedChain::new(memory_chain());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for i in 0..25 {
                        shared.append(format!("thread {t} entry {i}")).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer should not panic");
        }

        assert_eq!(shared.height().unwrap(), 100);
        assert_eq!(shared.verify().unwrap(), 101);
        let walked: Vec<u64> = shared.iter().map(|b| b.unwrap().height()).collect();
        assert_eq!(walked, (0..=100).rev().collect::<Vec<_>>());
    }

    #[test]
    fn sentinel_solution_is_refused() {
        let solver = |_: &BlockHash, data: &[u8], _: i64| -> Result<Solution, PowError> {
            let byte = match data {
                b"" => 1,
                b"zero" => 0,
                _ => 2,
            };
            Ok(Solution {
                hash: [byte; 32],
                nonce: 0,
            })
        };
        let mut chain = Chain::bootstrap(
            MemoryStore::new(),
            config().with_genesis_data(Vec::new()),
            Arc::new(solver),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();
        let tip = chain.tip_hash();

        let err = chain.append(b"zero").unwrap_err();
        assert!(matches!(err, ChainError::InvalidSolution(_)));
        assert_eq!(chain.tip_hash(), tip);
        assert_eq!(chain.store().len(), 2);
        assert!(chain.store().get(&SENTINEL_HASH).unwrap().is_none());

        chain.append(b"other").unwrap();
        assert_eq!(heights(&chain), vec![1, 0]);
    }

    #[test]
    fn genesis_with_sentinel_solution_is_refused() {
        let zero = |_: &BlockHash, _: &[u8], _: i64| -> Result<Solution, PowError> {
            Ok(Solution {
                hash: SENTINEL_HASH,
                nonce: 0,
            })
        };
        let err = Chain::bootstrap(
            MemoryStore::new(),
            config(),
            Arc::new(zero),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::InvalidSolution(_)));
    }

    #[test]
    fn tip_key_must_not_look_like_a_hash() {
        for key in [vec![7u8; HASH_LENGTH], Vec::new()] {
            let err = Chain::bootstrap(
                MemoryStore::new(),
                config().with_tip_key(key),
                fast_pow(),
                Arc::new(ManualClock::new(0)),
            )
            .unwrap_err();
            assert!(matches!(err, ChainError::InvalidConfig(_)));
        }
    }

    #[test]
    fn flush_failure_advances_onto_visible_block() {
        let mut chain = Chain::bootstrap(
            FlakyStore::default(),
            config(),
            fast_pow(),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();
        chain.append(b"one").unwrap();

        chain.store().fail_flush.store(true, Ordering::SeqCst);
        let err = chain.append(b"not durable").unwrap_err();
        assert!(matches!(err, ChainError::StorageFlush(_)));

        let stored_tip = chain.store().get(crate::config::DEFAULT_TIP_KEY).unwrap();
        assert_eq!(stored_tip, Some(chain.tip_hash().to_vec()));
        assert_eq!(chain.height().unwrap(), 2);

        chain.store().fail_flush.store(false, Ordering::SeqCst);
        chain.append(b"after").unwrap();
        assert_eq!(heights(&chain), vec![3, 2, 1, 0]);
        // four blocks + tip pointer, nothing orphaned
        assert_eq!(chain.store().inner.len(), 5);
    }

    #[test]
    fn misreported_write_that_landed_is_adopted() {
        let mut chain = Chain::bootstrap(
            FlakyStore::default(),
            config(),
            fast_pow(),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();

        chain.store().misreport_writes.store(true, Ordering::SeqCst);
        assert!(matches!(
            chain.append(b"landed").unwrap_err(),
            ChainError::StorageWrite(_)
        ));
        chain.store().misreport_writes.store(false, Ordering::SeqCst);

        let hash = chain.append(b"next").unwrap();
        let block = chain.lookup(&hash).unwrap().unwrap();
        assert_eq!(block.height(), 2);
        assert_eq!(heights(&chain), vec![2, 1, 0]);
        assert_eq!(chain.store().inner.len(), 4);
    }

    #[test]
    fn storage_error_mapping() {
        let io = || sled::Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "x"));
        assert!(matches!(
            ChainError::from(StoreError::Read(io())),
            ChainError::StorageRead(_)
        ));
        assert!(matches!(
            ChainError::from(StoreError::Write(io())),
            ChainError::StorageWrite(_)
        ));
        assert!(matches!(
            ChainError::from(StoreError::Flush(io())),
            ChainError::StorageFlush(_)
        ));
        assert!(matches!(
            ChainError::from(StoreError::Open {
                path: "p".into(),
                source: io()
            }),
            ChainError::StorageUnavailable(_)
        ));
    }
}

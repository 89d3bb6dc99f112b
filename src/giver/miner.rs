//! Proof-of-work search for `Mine` messages
//!
//! The search builds a `Mine` body, reads its representation hash as a
//! big-endian integer and accepts it once the value is strictly below the
//! contract's `pow_complexity`. Otherwise the nonce (`data1`) is incremented
//! and `expire` is refreshed from the clock before the next attempt.

use crate::giver::queries::{MineMessageParams, Query};
use crate::tvm::{Address, Cell, TvmResult};
use num_bigint::BigUint;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Default validity window of a mined message, in seconds
pub const DEFAULT_EXPIRE_WINDOW: u32 = 300;

/// Source of the current unix time
pub trait Clock {
    fn unix_now(&self) -> u32;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_now(&self) -> u32 {
        u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(u32::MAX)
    }
}

impl<F: Fn() -> u32> Clock for F {
    fn unix_now(&self) -> u32 {
        self()
    }
}

/// Shared flag a host sets to stop a running search
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Seconds added to the current time for every candidate's `expire`
    pub expire_window: u32,
    /// First nonce to try
    pub start_nonce: BigUint,
    /// Attempts between progress log lines
    pub progress_interval: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            expire_window: DEFAULT_EXPIRE_WINDOW,
            start_nonce: BigUint::ZERO,
            progress_interval: 100_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Searching,
    Found,
}

/// One evaluated message
#[derive(Debug, Clone)]
pub struct Candidate {
    pub params: MineMessageParams,
    pub cell: Arc<Cell>,
    pub hash: [u8; 32],
    pub found: bool,
}

impl Candidate {
    pub fn hash_value(&self) -> BigUint {
        BigUint::from_bytes_be(&self.hash)
    }
}

/// Lazy sequence of candidates; ends after the first accepted one
pub struct MiningSearch<C> {
    params: MineMessageParams,
    complexity: BigUint,
    expire_window: u32,
    clock: C,
    state: SearchState,
    attempts: u64,
}

impl<C: Clock> MiningSearch<C> {
    pub fn new(
        mint_to: Address,
        seed: BigUint,
        complexity: BigUint,
        config: &MinerConfig,
        clock: C,
    ) -> Self {
        let params = MineMessageParams {
            expire: clock.unix_now().saturating_add(config.expire_window),
            mint_to,
            data1: config.start_nonce.clone(),
            seed,
            data2: None,
        };
        Self {
            params,
            complexity,
            expire_window: config.expire_window,
            clock,
            state: SearchState::Searching,
            attempts: 0,
        }
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Parameters of the next candidate to be evaluated
    pub fn params(&self) -> &MineMessageParams {
        &self.params
    }

    fn step(&mut self) -> TvmResult<Candidate> {
        let cell = Query::Mine(self.params.clone()).build()?;
        let hash = cell.hash();
        self.attempts += 1;

        let found = BigUint::from_bytes_be(&hash) < self.complexity;
        let params = if found {
            self.state = SearchState::Found;
            self.params.clone()
        } else {
            let next_expire = self.clock.unix_now().saturating_add(self.expire_window);
            let next = MineMessageParams {
                expire: next_expire,
                data1: &self.params.data1 + 1u8,
                ..self.params.clone()
            };
            std::mem::replace(&mut self.params, next)
        };

        Ok(Candidate {
            params,
            cell,
            hash,
            found,
        })
    }
}

impl<C: Clock> Iterator for MiningSearch<C> {
    type Item = TvmResult<Candidate>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            SearchState::Found => None,
            SearchState::Searching => Some(self.step()),
        }
    }
}

/// Accepted message together with the search statistics
#[derive(Debug, Clone)]
pub struct MinedMessage {
    pub params: MineMessageParams,
    pub cell: Arc<Cell>,
    pub hash: [u8; 32],
    pub attempts: u64,
}

#[derive(Debug, Clone)]
pub enum MineOutcome {
    Found(MinedMessage),
    Cancelled { attempts: u64, last_nonce: BigUint },
}

/// Drives the search until a candidate is accepted or the token is cancelled.
///
/// The token is checked before every attempt.
pub fn mine<C: Clock>(
    search: &mut MiningSearch<C>,
    cancel: &CancelToken,
    progress_interval: u64,
) -> TvmResult<MineOutcome> {
    let started = Instant::now();
    log::info!(
        "Mining started: complexity {}, nonce {}",
        search.complexity,
        search.params.data1
    );

    while !cancel.is_cancelled() {
        let Some(candidate) = search.next() else {
            break;
        };
        let candidate = candidate?;

        if candidate.found {
            let elapsed = started.elapsed().as_secs_f64();
            log::info!(
                "Found hash {} after {} attempts in {:.3}s",
                hex::encode(candidate.hash),
                search.attempts(),
                elapsed
            );
            return Ok(MineOutcome::Found(MinedMessage {
                params: candidate.params,
                cell: candidate.cell,
                hash: candidate.hash,
                attempts: search.attempts(),
            }));
        }

        if progress_interval > 0 && search.attempts() % progress_interval == 0 {
            log::debug!(
                "Mined {} hashes, last {}",
                search.attempts(),
                candidate.hash_value()
            );
        }
    }

    log::warn!("Mining stopped after {} attempts", search.attempts());
    Ok(MineOutcome::Cancelled {
        attempts: search.attempts(),
        last_nonce: search.params().data1.clone(),
    })
}

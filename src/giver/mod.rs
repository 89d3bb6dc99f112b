//! NFT giver contract: storage layout, message bodies and the mining search
//!
//! - data: contract storage, mining snapshot and state init
//! - queries: operation codes and message bodies
//! - miner: proof-of-work search over `Mine` messages
//! - link: wallet deep links for sending a mined body

pub mod data;
pub mod link;
pub mod miner;
pub mod queries;

pub use data::{
    GIVER_WORKCHAIN, MiningData, NftGiverConfig, NftGiverData, RoyaltyParams, StateInit,
    build_nft_giver_state_init, encode_off_chain_content, parse_biguint,
};
pub use link::{to_nano, transfer_link};
pub use miner::{
    CancelToken, Candidate, Clock, MineOutcome, MinedMessage, MinerConfig, MiningSearch,
    SearchState, SystemClock, mine,
};
pub use queries::{
    MineMessageParams, OperationCode, Query, parse_mine, parse_royalty_params_response,
    peek_operation,
};

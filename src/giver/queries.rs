//! Message bodies accepted (and sent) by the giver contract
//!
//! Every body starts with a 32-bit operation code followed by the
//! operation's fields in a fixed order.

use crate::giver::data::{RoyaltyParams, encode_off_chain_content};
use crate::tvm::{Address, Builder, Cell, Slice, TvmError, TvmResult};
use num_bigint::BigUint;
use std::sync::Arc;

/// 32-bit operation tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum OperationCode {
    ChangeOwner = 3,
    EditContent = 4,
    GetRoyaltyParams = 0x693d3950,
    GetRoyaltyParamsResponse = 0xa8cb00ad,
    Mine = 0x4d696e65,
    RescaleComplexity = 0x5253636c,
}

impl OperationCode {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            3 => Self::ChangeOwner,
            4 => Self::EditContent,
            0x693d3950 => Self::GetRoyaltyParams,
            0xa8cb00ad => Self::GetRoyaltyParamsResponse,
            0x4d696e65 => Self::Mine,
            0x5253636c => Self::RescaleComplexity,
            _ => return None,
        })
    }
}

/// Parameters of a `Mine` message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MineMessageParams {
    /// Unix time after which the contract rejects the message
    pub expire: u32,
    /// Receiver of the minted item
    pub mint_to: Address,
    /// Nonce varied by the miner
    pub data1: BigUint,
    /// Seed published by the contract when the search started; it changes
    /// after every successful mint, so the mined message must be sent before
    /// anyone else succeeds
    pub seed: BigUint,
    /// Second free field; `data1` is written in its place when absent
    pub data2: Option<BigUint>,
}

/// A message body for one of the giver operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    ChangeOwner {
        query_id: u64,
        new_owner: Address,
    },
    GetRoyaltyParams {
        query_id: u64,
    },
    EditContent {
        query_id: u64,
        collection_content: String,
        common_content: String,
        royalty_params: RoyaltyParams,
    },
    Mine(MineMessageParams),
    RescaleComplexity {
        query_id: u64,
        expire: u32,
    },
}

impl Query {
    pub fn op(&self) -> OperationCode {
        match self {
            Self::ChangeOwner { .. } => OperationCode::ChangeOwner,
            Self::GetRoyaltyParams { .. } => OperationCode::GetRoyaltyParams,
            Self::EditContent { .. } => OperationCode::EditContent,
            Self::Mine(_) => OperationCode::Mine,
            Self::RescaleComplexity { .. } => OperationCode::RescaleComplexity,
        }
    }

    /// Serializes the body; any field that does not fit fails the whole build
    pub fn build(&self) -> TvmResult<Arc<Cell>> {
        let mut builder = Builder::new();
        builder.store_u32(self.op().code())?;

        match self {
            Self::ChangeOwner {
                query_id,
                new_owner,
            } => {
                builder.store_u64(*query_id)?;
                builder.store_address(Some(new_owner))?;
            }
            Self::GetRoyaltyParams { query_id } => {
                builder.store_u64(*query_id)?;
            }
            Self::EditContent {
                query_id,
                collection_content,
                common_content,
                royalty_params,
            } => {
                builder.store_u64(*query_id)?;

                let mut common = Builder::new();
                common.store_bytes(common_content.as_bytes())?;

                let mut content = Builder::new();
                content.store_ref(encode_off_chain_content(collection_content)?)?;
                content.store_ref(common.build()?)?;

                builder.store_ref(content.build()?)?;
                builder.store_ref(royalty_params.to_cell()?)?;
            }
            Self::Mine(params) => {
                builder.store_u32(params.expire)?;
                builder.store_address(Some(&params.mint_to))?;
                builder.store_big_uint(&params.data1, 256)?;
                builder.store_big_uint(&params.seed, 128)?;
                builder.store_big_uint(params.data2.as_ref().unwrap_or(&params.data1), 256)?;
            }
            Self::RescaleComplexity { query_id, expire } => {
                builder.store_u64(*query_id)?;
                builder.store_u32(*expire)?;
            }
        }

        builder.build()
    }
}

/// Reads the opcode of a body without decoding the rest.
///
/// Returns the raw tag when it is not one of the giver operations.
pub fn peek_operation(cell: &Arc<Cell>) -> TvmResult<Result<OperationCode, u32>> {
    let code = Slice::from(cell.clone()).load_u32()?;
    Ok(OperationCode::from_code(code).ok_or(code))
}

fn expect_op(slice: &mut Slice, expected: OperationCode) -> TvmResult<()> {
    let actual = slice.load_u32()?;
    if actual != expected.code() {
        return Err(TvmError::InvalidTag {
            expected: expected.code(),
            actual,
        });
    }
    Ok(())
}

/// Decodes a `Mine` body back into its parameters.
///
/// `data2` is reported only when it differs from `data1`.
pub fn parse_mine(cell: Arc<Cell>) -> TvmResult<MineMessageParams> {
    let mut slice = Slice::new(cell);
    expect_op(&mut slice, OperationCode::Mine)?;

    let expire = slice.load_u32()?;
    let mint_to = slice.load_address()?.ok_or_else(|| {
        TvmError::InvalidAddressFormat("mint_to must not be addr_none".to_string())
    })?;
    let data1 = slice.load_big_uint(256)?;
    let seed = slice.load_big_uint(128)?;
    let data2 = slice.load_big_uint(256)?;

    Ok(MineMessageParams {
        expire,
        mint_to,
        data2: (data2 != data1).then_some(data2),
        data1,
        seed,
    })
}

/// Decodes the contract's reply to `GetRoyaltyParams`:
/// `query_id:uint64 royalty_factor:uint16 royalty_base:uint16 royalty_address:MsgAddress`
pub fn parse_royalty_params_response(cell: Arc<Cell>) -> TvmResult<(u64, RoyaltyParams)> {
    let mut slice = Slice::new(cell);
    expect_op(&mut slice, OperationCode::GetRoyaltyParamsResponse)?;

    let query_id = slice.load_u64()?;
    let royalty_factor = slice.load_uint(16)? as u16;
    let royalty_base = slice.load_uint(16)? as u16;
    let royalty_address = slice.load_address()?.ok_or_else(|| {
        TvmError::InvalidAddressFormat("royalty address must not be addr_none".to_string())
    })?;

    Ok((
        query_id,
        RoyaltyParams {
            royalty_factor,
            royalty_base,
            royalty_address,
        },
    ))
}

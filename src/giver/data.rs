//! NFT giver contract storage and state init

use crate::tvm::{Address, Builder, Cell, TvmError, TvmResult};
use num_bigint::BigUint;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;
use std::sync::Arc;

/// Workchain the giver contract is deployed to
pub const GIVER_WORKCHAIN: i8 = 0;

/// Prefix byte of off-chain metadata content
const OFF_CHAIN_CONTENT_PREFIX: u8 = 0x01;

/// `royalty_factor:uint16 royalty_base:uint16 royalty_address:MsgAddress`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoyaltyParams {
    pub royalty_factor: u16,
    pub royalty_base: u16,
    pub royalty_address: Address,
}

impl RoyaltyParams {
    pub fn to_cell(&self) -> TvmResult<Arc<Cell>> {
        let mut builder = Builder::new();
        builder.store_uint(self.royalty_factor as u64, 16)?;
        builder.store_uint(self.royalty_base as u64, 16)?;
        builder.store_address(Some(&self.royalty_address))?;
        builder.build()
    }
}

/// Snapshot returned by the contract's `get_mining_data` get-method.
///
/// The snapshot goes stale as soon as another miner succeeds: the contract
/// then publishes a new seed and complexity, and messages mined against the
/// old values are rejected on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MiningData {
    #[serde(alias = "powComplexity", alias = "complexity", deserialize_with = "de_biguint")]
    pub pow_complexity: BigUint,
    #[serde(alias = "lastSuccess")]
    pub last_success: u32,
    #[serde(deserialize_with = "de_biguint")]
    pub seed: BigUint,
    #[serde(alias = "targetDelta")]
    pub target_delta: u32,
    #[serde(alias = "minComplexity", alias = "min_cpl")]
    pub min_complexity: u8,
    #[serde(alias = "maxComplexity", alias = "max_cpl")]
    pub max_complexity: u8,
}

impl MiningData {
    /// Builds the snapshot from the six stack entries of `get_mining_data`,
    /// in contract order
    pub fn from_stack(stack: &[BigUint]) -> TvmResult<Self> {
        let [complexity, last_success, seed, target_delta, min_cpl, max_cpl] = stack else {
            return Err(TvmError::CellUnderflow);
        };

        fn narrow<T: TryFrom<BigUint>>(value: &BigUint, bits: usize) -> TvmResult<T> {
            T::try_from(value.clone()).map_err(|_| TvmError::ValueOutOfRange { bits })
        }

        Ok(Self {
            pow_complexity: complexity.clone(),
            last_success: narrow(last_success, 32)?,
            seed: seed.clone(),
            target_delta: narrow(target_delta, 32)?,
            min_complexity: narrow(min_cpl, 8)?,
            max_complexity: narrow(max_cpl, 8)?,
        })
    }
}

/// Accepts either a JSON object with named fields or the raw six-entry
/// get-method stack as a JSON array
impl FromStr for MiningData {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use serde::de::Error as _;
        use serde_json::Value;

        match serde_json::from_str(s)? {
            Value::Array(items) => {
                let stack = items
                    .iter()
                    .map(|item| {
                        let value = match item {
                            Value::Number(n) => n.as_u64().map(BigUint::from),
                            Value::String(text) => parse_biguint(text),
                            _ => None,
                        };
                        value.ok_or_else(|| {
                            serde_json::Error::custom(format!("invalid stack entry {item}"))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Self::from_stack(&stack).map_err(serde_json::Error::custom)
            }
            other => serde_json::from_value(other),
        }
    }
}

/// Accepts a JSON number, a decimal string or a `0x`-prefixed hex string
fn de_biguint<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u64),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Number(n) => Ok(BigUint::from(n)),
        Repr::Text(s) => parse_biguint(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid unsigned integer: {s:?}"))
        }),
    }
}

/// Parses a decimal or `0x`-prefixed hex unsigned integer
pub fn parse_biguint(text: &str) -> Option<BigUint> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => BigUint::parse_bytes(hex.as_bytes(), 16),
        None => BigUint::parse_bytes(text.as_bytes(), 10),
    }
}

/// Encodes an off-chain metadata URI: prefix byte, then snake-encoded text
pub fn encode_off_chain_content(content: &str) -> TvmResult<Arc<Cell>> {
    let mut data = Vec::with_capacity(content.len() + 1);
    data.push(OFF_CHAIN_CONTENT_PREFIX);
    data.extend_from_slice(content.as_bytes());

    let mut builder = Builder::new();
    builder.store_snake_bytes(&data)?;
    builder.build()
}

/// Full storage of the giver collection contract
#[derive(Debug, Clone)]
pub struct NftGiverData {
    pub owner_address: Address,
    pub next_item_index: u64,
    pub collection_content: String,
    pub common_content: String,
    pub nft_item_code: Arc<Cell>,
    pub royalty_params: RoyaltyParams,
    pub mining: MiningData,
}

impl NftGiverData {
    /// ```text
    /// storage#_ owner_address:MsgAddress next_item_index:uint64
    ///   ^[collection_content:^Cell common_content:^Cell]
    ///   nft_item_code:^Cell royalty_params:^RoyaltyParams
    ///   pow_complexity:uint256 last_success:uint32 seed:uint128
    ///   target_delta:uint32 min_cpl:uint8 max_cpl:uint8
    ///   = Storage;
    /// ```
    pub fn to_cell(&self) -> TvmResult<Arc<Cell>> {
        let mut builder = Builder::new();
        builder.store_address(Some(&self.owner_address))?;
        builder.store_u64(self.next_item_index)?;

        let mut common_content = Builder::new();
        common_content.store_bytes(self.common_content.as_bytes())?;

        let mut content = Builder::new();
        content.store_ref(encode_off_chain_content(&self.collection_content)?)?;
        content.store_ref(common_content.build()?)?;
        builder.store_ref(content.build()?)?;

        builder.store_ref(self.nft_item_code.clone())?;
        builder.store_ref(self.royalty_params.to_cell()?)?;

        builder.store_big_uint(&self.mining.pow_complexity, 256)?;
        builder.store_u32(self.mining.last_success)?;
        builder.store_big_uint(&self.mining.seed, 128)?;
        builder.store_u32(self.mining.target_delta)?;
        builder.store_uint(self.mining.min_complexity as u64, 8)?;
        builder.store_uint(self.mining.max_complexity as u64, 8)?;
        builder.build()
    }
}

/// Giver storage as read from a JSON file; the item code comes separately
#[derive(Debug, Clone, Deserialize)]
pub struct NftGiverConfig {
    pub owner_address: Address,
    #[serde(default)]
    pub next_item_index: u64,
    pub collection_content: String,
    pub common_content: String,
    pub royalty_params: RoyaltyParams,
    pub mining: MiningData,
}

impl NftGiverConfig {
    pub fn into_data(self, nft_item_code: Arc<Cell>) -> NftGiverData {
        NftGiverData {
            owner_address: self.owner_address,
            next_item_index: self.next_item_index,
            collection_content: self.collection_content,
            common_content: self.common_content,
            nft_item_code,
            royalty_params: self.royalty_params,
            mining: self.mining,
        }
    }
}

/// Code and data a contract is initialized with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateInit {
    pub code: Arc<Cell>,
    pub data: Arc<Cell>,
}

impl StateInit {
    pub fn new(code: Arc<Cell>, data: Arc<Cell>) -> Self {
        Self { code, data }
    }

    /// ```text
    /// _ split_depth:(Maybe (## 5)) special:(Maybe TickTock)
    ///   code:(Maybe ^Cell) data:(Maybe ^Cell)
    ///   library:(HashmapE 256 SimpleLib) = StateInit;
    /// ```
    pub fn to_cell(&self) -> TvmResult<Arc<Cell>> {
        let mut builder = Builder::new();
        builder.store_bit(false)?; // no split_depth
        builder.store_bit(false)?; // no special
        builder.store_maybe_ref(Some(self.code.clone()))?;
        builder.store_maybe_ref(Some(self.data.clone()))?;
        builder.store_bit(false)?; // empty library
        builder.build()
    }

    /// Address a deployment of this state init lands on
    pub fn contract_address(&self, workchain: i8) -> TvmResult<Address> {
        Ok(Address::new(workchain, self.to_cell()?.hash()))
    }
}

/// Derives the giver contract's state init and address
pub fn build_nft_giver_state_init(
    data: &NftGiverData,
    code: Arc<Cell>,
) -> TvmResult<(StateInit, Address)> {
    let state_init = StateInit::new(code, data.to_cell()?);
    let address = state_init.contract_address(GIVER_WORKCHAIN)?;
    Ok((state_init, address))
}

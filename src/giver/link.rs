//! `ton://transfer` deep links for sending a mined message through a wallet

use crate::tvm::{Address, AddressFlags, Cell, TvmError, TvmResult, boc_to_base64_url};
use std::sync::Arc;

/// Decimal places of one TON
const NANO_DECIMALS: usize = 9;

/// Converts a decimal TON amount ("0.05", "12") into nanotons
pub fn to_nano(amount: &str) -> TvmResult<u128> {
    let invalid = || TvmError::InvalidAmount(amount.to_string());
    let amount_str = amount.trim();

    let (whole, fraction) = amount_str.split_once('.').unwrap_or((amount_str, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if fraction.len() > NANO_DECIMALS {
        return Err(invalid());
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let fraction: u128 = format!("{fraction:0<NANO_DECIMALS$}")
        .parse()
        .map_err(|_| invalid())?;

    whole
        .checked_mul(10u128.pow(NANO_DECIMALS as u32))
        .and_then(|nano| nano.checked_add(fraction))
        .ok_or_else(invalid)
}

/// Builds a wallet deep link that sends `amount` nanotons to `address`
/// with `body` attached as a BoC
pub fn transfer_link(
    address: &Address,
    amount: u128,
    body: &Arc<Cell>,
    test_only: bool,
) -> TvmResult<String> {
    let flags = AddressFlags {
        test_only,
        ..AddressFlags::default()
    };
    Ok(format!(
        "ton://transfer/{}?amount={}&bin={}",
        address.to_user_friendly(flags),
        amount,
        boc_to_base64_url(body, true)?
    ))
}

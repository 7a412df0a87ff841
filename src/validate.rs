use rust_decimal::Decimal;

/// Smallest unit of the treasury token: 6 decimal places (USDC-style).
pub const TOKEN_DECIMALS: u32 = 6;

/// Returns true iff `s` is `0x` followed by exactly 40 hexadecimal
/// characters. Checksum casing is not validated.
pub fn is_valid_address(s: &str) -> bool {
    match s.strip_prefix("0x") {
        Some(body) => body.len() == 40 && hex::decode(body).is_ok(),
        None => false,
    }
}

/// Returns true iff `d` is strictly positive and representable at the token's
/// smallest unit without precision loss.
pub fn is_positive_amount(d: Decimal) -> bool {
    d > Decimal::ZERO && d.normalize().scale() <= TOKEN_DECIMALS
}

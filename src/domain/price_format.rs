use rust_decimal::Decimal;

/// Formats a price with 2-8 decimals, choosing the precision so that at
/// least one non-zero digit is always visible. Needed for low-priced
/// tokens (e.g. MOG at 4.0e-07) where a fixed 2-decimal format would
/// display as `$0.00` (spec §6, scenario 6).
pub fn format_price(price: Decimal) -> String {
    if price.is_zero() {
        return "$0.00".to_string();
    }

    let abs = price.abs();
    if abs >= Decimal::ONE {
        return format!("${:.2}", price);
    }

    // Count leading zeros in the fractional part before the first
    // significant digit, then show two significant digits beyond them
    // (clamped to the [2, 8] decimal range).
    let mut leading_zeros = 0u32;
    let mut probe = abs;
    let ten = Decimal::from(10u32);
    while probe > Decimal::ZERO && probe < Decimal::ONE && leading_zeros < 8 {
        probe *= ten;
        if probe < Decimal::ONE {
            leading_zeros += 1;
        } else {
            break;
        }
    }

    let decimals = (leading_zeros + 2).clamp(2, 8);
    format!("${:.*}", decimals as usize, price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn formats_normal_price_with_two_decimals() {
        assert_eq!(format_price(dec!(100.00)), "$100.00");
    }

    #[test]
    fn formats_low_priced_token_with_enough_decimals_to_show_a_digit() {
        assert_eq!(format_price(dec!(0.0000004)), "$0.00000040");
    }

    #[test]
    fn formats_zero() {
        assert_eq!(format_price(dec!(0)), "$0.00");
    }

    #[test]
    fn formats_negative_price_keeping_sign() {
        assert_eq!(format_price(dec!(-1.5)), "$-1.50");
    }
}

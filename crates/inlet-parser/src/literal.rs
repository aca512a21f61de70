//! Numeric literal interpretation.
//!
//! The lexer keeps number text verbatim; the expected type decides how it is
//! read. Integers accept decimal or `0x` hex with `_` separators. Floats also
//! accept hex mantissas with `p` exponents, `inf`, `nan` and `nan:0x...`.

/// Sign and magnitude of an integer literal.
fn split_sign(text: &str) -> (bool, &str) {
    match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    }
}

/// Reject leading, trailing and doubled underscores, then strip them.
fn strip_underscores(digits: &str) -> Option<String> {
    if digits.is_empty()
        || digits.starts_with('_')
        || digits.ends_with('_')
        || digits.contains("__")
    {
        return None;
    }
    Some(digits.replace('_', ""))
}

fn parse_magnitude(text: &str) -> Option<u128> {
    let (hex, digits) = match text.strip_prefix("0x") {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let digits = strip_underscores(digits)?;
    if hex {
        u128::from_str_radix(&digits, 16).ok()
    } else if digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

/// An unsigned index or count.
pub(crate) fn parse_u32(text: &str) -> Option<u32> {
    if text.starts_with(['+', '-']) {
        return None;
    }
    parse_magnitude(text).and_then(|n| u32::try_from(n).ok())
}

/// An `i32.const` operand. Values up to `u32::MAX` wrap into the signed range.
pub(crate) fn parse_i32(text: &str) -> Option<i32> {
    let (negative, rest) = split_sign(text);
    let magnitude = parse_magnitude(rest)?;
    if negative {
        (magnitude <= 1 << 31).then(|| (magnitude as i64).wrapping_neg() as i32)
    } else {
        u32::try_from(magnitude).ok().map(|n| n as i32)
    }
}

/// An `i64.const` operand. Values up to `u64::MAX` wrap into the signed range.
pub(crate) fn parse_i64(text: &str) -> Option<i64> {
    let (negative, rest) = split_sign(text);
    let magnitude = parse_magnitude(rest)?;
    if negative {
        (magnitude <= 1 << 63).then(|| (magnitude as i128).wrapping_neg() as i64)
    } else {
        u64::try_from(magnitude).ok().map(|n| n as i64)
    }
}

/// Layout of an IEEE 754 binary format.
#[derive(Debug, Clone, Copy)]
struct FloatFormat {
    mantissa_bits: u32,
    exponent_bits: u32,
}

const F32: FloatFormat = FloatFormat {
    mantissa_bits: 23,
    exponent_bits: 8,
};

const F64: FloatFormat = FloatFormat {
    mantissa_bits: 52,
    exponent_bits: 11,
};

impl FloatFormat {
    fn bias(self) -> i64 {
        (1 << (self.exponent_bits - 1)) - 1
    }

    fn sign_bit(self) -> u64 {
        1 << (self.mantissa_bits + self.exponent_bits)
    }

    fn exponent_mask(self) -> u64 {
        ((1 << self.exponent_bits) - 1) << self.mantissa_bits
    }
}

/// Mantissa digits beyond this many bits only feed the sticky bit.
const MANTISSA_CAPACITY: u32 = 120;

/// Exponents are clamped here; anything larger is out of range either way.
const EXPONENT_LIMIT: i64 = 100_000;

/// Bits of a float literal in `format`. Finite literals that round to
/// infinity are rejected.
fn parse_float_bits(text: &str, format: FloatFormat) -> Option<u64> {
    let (negative, rest) = split_sign(text);
    let sign = if negative { format.sign_bit() } else { 0 };
    let quiet = 1u64 << (format.mantissa_bits - 1);
    if rest == "inf" {
        return Some(sign | format.exponent_mask());
    }
    if rest == "nan" {
        return Some(sign | format.exponent_mask() | quiet);
    }
    if let Some(payload) = rest.strip_prefix("nan:") {
        let payload = parse_magnitude(payload)?;
        if payload == 0 || payload >= 1 << format.mantissa_bits {
            return None;
        }
        return Some(sign | format.exponent_mask() | payload as u64);
    }
    let magnitude = match rest.strip_prefix("0x") {
        Some(hex) => parse_hex_float(hex, format)?,
        None => parse_decimal_float(rest, format)?,
    };
    Some(sign | magnitude)
}

/// Decimal literals go through the standard library, which rounds once.
fn parse_decimal_float(text: &str, format: FloatFormat) -> Option<u64> {
    let cleaned = strip_underscores(text)?;
    let valid = cleaned
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !valid || !cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if format.mantissa_bits == F32.mantissa_bits {
        let value: f32 = cleaned.parse().ok()?;
        value.is_finite().then(|| u64::from(value.to_bits()))
    } else {
        let value: f64 = cleaned.parse().ok()?;
        value.is_finite().then(|| value.to_bits())
    }
}

/// `hexdigits[.hexdigits][p[+-]digits]` after the `0x`, rounded to nearest
/// even in `format`.
fn parse_hex_float(text: &str, format: FloatFormat) -> Option<u64> {
    let (mantissa, exponent) = match text.find(['p', 'P']) {
        Some(i) => (&text[..i], Some(&text[i + 1..])),
        None => (text, None),
    };
    let (whole, frac) = match mantissa.find('.') {
        Some(i) => (&mantissa[..i], &mantissa[i + 1..]),
        None => (mantissa, ""),
    };
    let whole = strip_underscores(whole)?;
    let frac = if frac.is_empty() {
        String::new()
    } else {
        strip_underscores(frac)?
    };

    // value = digits * 2^binexp, plus something below the kept digits if sticky
    let mut digits: u128 = 0;
    let mut binexp: i64 = 0;
    let mut sticky = false;
    for c in whole.chars() {
        let d = c.to_digit(16)?;
        if digits >> MANTISSA_CAPACITY == 0 {
            digits = digits * 16 + u128::from(d);
        } else {
            sticky |= d != 0;
            binexp += 4;
        }
    }
    for c in frac.chars() {
        let d = c.to_digit(16)?;
        if digits >> MANTISSA_CAPACITY == 0 {
            digits = digits * 16 + u128::from(d);
            binexp -= 4;
        } else {
            sticky |= d != 0;
        }
    }
    if let Some(e) = exponent {
        let (negative, e_digits) = split_sign(e);
        let e_digits = strip_underscores(e_digits)?;
        if !e_digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let magnitude = e_digits
            .parse::<u64>()
            .map_or(EXPONENT_LIMIT, |n| n.min(EXPONENT_LIMIT as u64) as i64);
        binexp += if negative { -magnitude } else { magnitude };
    }
    if digits == 0 {
        return Some(0);
    }

    let mantissa_bits = i64::from(format.mantissa_bits);
    let min_exponent = 1 - format.bias();
    let top = i64::from(127 - digits.leading_zeros());
    let exponent = top + binexp;
    let mut lsb_exponent = exponent.max(min_exponent) - mantissa_bits;
    let shift = lsb_exponent - binexp;

    let (mut q, half, below) = if shift <= 0 {
        (digits << (-shift) as u32, false, false)
    } else if shift > 128 {
        (0, false, true)
    } else {
        let s = shift as u32;
        let q = if s == 128 { 0 } else { digits >> s };
        let half = (digits >> (s - 1)) & 1 == 1;
        let below = digits & ((1u128 << (s - 1)) - 1) != 0;
        (q, half, below)
    };
    if half && (below || sticky || q & 1 == 1) {
        q += 1;
    }
    if q >> (format.mantissa_bits + 1) != 0 {
        q >>= 1;
        lsb_exponent += 1;
    }

    let implicit = 1u128 << format.mantissa_bits;
    if q < implicit {
        // subnormal or zero
        return Some(q as u64);
    }
    let biased = lsb_exponent + mantissa_bits + format.bias();
    if biased >= (1 << format.exponent_bits) - 1 {
        return None;
    }
    Some(((biased as u64) << format.mantissa_bits) | (q - implicit) as u64)
}

/// An `f32.const` operand as raw bits.
pub(crate) fn parse_f32_bits(text: &str) -> Option<u32> {
    parse_float_bits(text, F32).map(|bits| bits as u32)
}

/// An `f64.const` operand as raw bits.
pub(crate) fn parse_f64_bits(text: &str) -> Option<u64> {
    parse_float_bits(text, F64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u32_forms() {
        assert_eq!(parse_u32("0"), Some(0));
        assert_eq!(parse_u32("0x10"), Some(16));
        assert_eq!(parse_u32("1_000"), Some(1000));
        assert_eq!(parse_u32("-1"), None);
        assert_eq!(parse_u32("4294967296"), None);
        assert_eq!(parse_u32("1__0"), None);
    }

    #[test]
    fn test_i32_wraps_unsigned_range() {
        assert_eq!(parse_i32("-1"), Some(-1));
        assert_eq!(parse_i32("0xffffffff"), Some(-1));
        assert_eq!(parse_i32("-2147483648"), Some(i32::MIN));
        assert_eq!(parse_i32("-2147483649"), None);
        assert_eq!(parse_i32("4294967296"), None);
    }

    #[test]
    fn test_i64_bounds() {
        assert_eq!(parse_i64("-9223372036854775808"), Some(i64::MIN));
        assert_eq!(parse_i64("0xffffffffffffffff"), Some(-1));
        assert_eq!(parse_i64("18446744073709551616"), None);
    }

    #[test]
    fn test_float_forms() {
        assert_eq!(parse_f64_bits("1.5"), Some(1.5f64.to_bits()));
        assert_eq!(parse_f64_bits("-2"), Some((-2.0f64).to_bits()));
        assert_eq!(parse_f64_bits("1e3"), Some(1000f64.to_bits()));
        assert_eq!(parse_f64_bits("0x1p-2"), Some(0.25f64.to_bits()));
        assert_eq!(parse_f64_bits("0x1.8p1"), Some(3.0f64.to_bits()));
        assert_eq!(parse_f32_bits("inf"), Some(f32::INFINITY.to_bits()));
        assert_eq!(parse_f32_bits("-inf"), Some(f32::NEG_INFINITY.to_bits()));
        assert_eq!(parse_f32_bits("nan"), Some(0x7fc0_0000));
        assert_eq!(parse_f32_bits("nan:0x1"), Some(0x7f80_0001));
        assert_eq!(parse_f64_bits("abc"), None);
    }

    #[test]
    fn test_f32_decimal_rounds_once() {
        // Halfway between 1.0 and the next f32, nudged up by the trailing digits.
        assert_eq!(
            parse_f32_bits("1.00000005960464478926841280781445675529539585113525390625"),
            Some(0x3f80_0001)
        );
        assert_eq!(parse_f32_bits("0.1"), Some(0.1f32.to_bits()));
    }

    #[test]
    fn test_hex_float_rounds_once() {
        assert_eq!(parse_f32_bits("0x1.00000100000001p0"), Some(0x3f80_0001));
        // Exactly halfway rounds to even.
        assert_eq!(parse_f32_bits("0x1.000001p0"), Some(0x3f80_0000));
        assert_eq!(parse_f32_bits("0x1.000003p0"), Some(0x3f80_0002));
        // Bits past the 53rd still count.
        assert_eq!(
            parse_f64_bits("0x1.00000000000008000000000000001p0"),
            Some(0x3ff0_0000_0000_0001)
        );
    }

    #[test]
    fn test_hex_float_subnormals() {
        assert_eq!(parse_f64_bits("0x1p-1074"), Some(1));
        assert_eq!(parse_f64_bits("0x1p-1075"), Some(0));
        assert_eq!(parse_f64_bits("0x1.8p-1075"), Some(1));
        assert_eq!(parse_f32_bits("0x1p-149"), Some(1));
        assert_eq!(parse_f32_bits("-0x1p-149"), Some(0x8000_0001));
        assert_eq!(parse_f64_bits("0x1p-1022"), Some(f64::MIN_POSITIVE.to_bits()));
    }

    #[test]
    fn test_hex_float_extremes() {
        assert_eq!(parse_f64_bits("0x1.fffffffffffffp1023"), Some(f64::MAX.to_bits()));
        assert_eq!(parse_f32_bits("0x1.fffffep127"), Some(f32::MAX.to_bits()));
        assert_eq!(parse_f64_bits("0x0p0"), Some(0));
        assert_eq!(parse_f64_bits("0x1p-100000000"), Some(0));
    }

    #[test]
    fn test_out_of_range_floats_rejected() {
        assert_eq!(parse_f32_bits("1e39"), None);
        assert_eq!(parse_f64_bits("1e400"), None);
        assert_eq!(parse_f64_bits("0x1p1024"), None);
        assert_eq!(parse_f32_bits("0x1p128"), None);
        // Rounds up past the largest finite value.
        assert_eq!(parse_f32_bits("0x1.ffffffp127"), None);
        assert_eq!(parse_f64_bits("-0x1p99999999"), None);
    }
}

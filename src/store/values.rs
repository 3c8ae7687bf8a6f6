//! String conversions for typed accessors
//!
//! Parsing follows C library conventions: the longest valid prefix is used
//! and an unparsable value reads as zero.

/// Longest `[+-]?digits` prefix (after leading whitespace) in `radix`
fn parse_prefix(s: &str, radix: u32) -> i64 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits = if radix == 16 {
        digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits)
    } else {
        digits
    };

    let mut value: i64 = 0;
    for ch in digits.chars() {
        let Some(d) = ch.to_digit(radix) else {
            break;
        };
        value = value.saturating_mul(radix as i64).saturating_add(d as i64);
    }
    if negative {
        -value
    } else {
        value
    }
}

/// `0x` prefix selects hex, a leading `0` octal, anything else decimal.
pub fn string_to_int(s: &str) -> i32 {
    let radix = match s.as_bytes() {
        [b'0', b'x', ..] => 16,
        [b'0', ..] => 8,
        _ => 10,
    };
    let value = parse_prefix(s, radix).clamp(i64::from(i32::MIN), i64::from(i32::MAX));
    value as i32
}

pub fn string_to_int64(s: &str) -> i64 {
    parse_prefix(s, 10)
}

pub fn string_to_float(s: &str) -> f32 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let mantissa_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == mantissa_start || &s[mantissa_start..end] == "." {
        return 0.0;
    }
    // An exponent only counts when digits follow it.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > digits_start {
            end = exp_end;
        }
    }
    s[..end].parse::<f64>().map(|v| v as f32).unwrap_or(0.0)
}

/// `true` and `on`, in any case
pub fn string_to_boolean(s: &str) -> bool {
    s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("on")
}

pub fn format_float(value: f32) -> String {
    format!("{:.6}", value)
}

pub fn format_boolean(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

//! Typed conversions agree with the formatters used by the setters

use conftree::store::values::{
    format_boolean, format_float, string_to_boolean, string_to_float, string_to_int,
    string_to_int64,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn int_parses_its_decimal_form(n in any::<i32>()) {
        prop_assert_eq!(string_to_int(&n.to_string()), n);
    }

    #[test]
    fn int64_parses_its_decimal_form(n in any::<i64>().prop_filter("negation overflows", |n| *n != i64::MIN)) {
        prop_assert_eq!(string_to_int64(&n.to_string()), n);
    }

    #[test]
    fn trailing_garbage_is_ignored(n in 1..i32::MAX, junk in "[a-z ]{0,8}") {
        let text = format!("{}{}", n, junk);
        prop_assert_eq!(string_to_int(&text), n);
    }

    #[test]
    fn float_survives_six_decimals(n in -100_000i32..100_000) {
        let value = n as f32 / 4.0;
        prop_assert_eq!(string_to_float(&format_float(value)), value);
    }

    #[test]
    fn boolean_survives_formatting(b in any::<bool>()) {
        prop_assert_eq!(string_to_boolean(format_boolean(b)), b);
    }
}

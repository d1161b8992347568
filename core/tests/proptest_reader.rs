use proptest::prelude::*;
use wonder_core::{Value, read_string};

// ============================================================================
// Strategies
// ============================================================================

/// Integers small enough to print without an exponent.
fn integer() -> impl Strategy<Value = i64> {
    -1_000_000_000i64..1_000_000_000i64
}

/// Finite floats with a fractional part.
fn fractional() -> impl Strategy<Value = f64> {
    (-1.0e6f64..1.0e6f64).prop_filter("Must have a fraction", |f| f.fract() != 0.0)
}

/// Arbitrary string content, including characters that need escaping.
fn string_content() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            any::<char>(),
            Just('"'),
            Just('\\'),
            Just('\n'),
            Just('\t'),
        ],
        0..40,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

fn read_one(text: &str) -> Value {
    let mut forms = read_string(text, "proptest").expect("printed form should read back");
    assert_eq!(forms.len(), 1);
    forms.remove(0)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn integers_read_back(n in integer()) {
        prop_assert_eq!(read_one(&n.to_string()), Value::Number(n as f64));
    }

    #[test]
    fn floats_read_back(f in fractional()) {
        let printed = Value::Number(f).to_string();
        prop_assert_eq!(read_one(&printed), Value::Number(f));
    }

    #[test]
    fn digit_separators_are_ignored(n in 0u64..1_000_000_000u64) {
        let plain = n.to_string();
        let mut grouped = String::new();
        for (i, c) in plain.chars().enumerate() {
            if i > 0 && (plain.len() - i) % 3 == 0 {
                grouped.push('_');
            }
            grouped.push(c);
        }
        prop_assert_eq!(read_one(&grouped), Value::Number(n as f64));
    }

    #[test]
    fn strings_read_back_through_the_printer(s in string_content()) {
        let value = Value::string(&s);
        prop_assert_eq!(read_one(&value.to_string()), value);
    }

    #[test]
    fn nested_vectors_read_back(items in prop::collection::vec(integer(), 0..20)) {
        let value = Value::vector(items.iter().map(|n| Value::Number(*n as f64)).collect());
        prop_assert_eq!(read_one(&value.to_string()), value);
    }
}

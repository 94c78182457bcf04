//! Property-based tests for the column codec.
//!
//! Values are compared bit for bit, so absent (NaN) cells and signed zeros
//! must survive as written.

use proptest::prelude::*;
use sumvec::codec::column::{decode_times, decode_values, encode_times, encode_values};
use sumvec::ColumnEncoding;

/// Ascending timestamps with deltas from seconds to decades.
fn timestamp_strategy() -> impl Strategy<Value = Vec<i64>> {
    (
        -1_000_000_000i64..4_000_000_000i64,
        prop::collection::vec(0i64..1_000_000_000, 0..200),
    )
        .prop_map(|(base, deltas)| {
            let mut current = base;
            let mut times = vec![base];
            for delta in deltas {
                current += delta;
                times.push(current);
            }
            times
        })
}

/// Rates that plateau, jump, or go absent.
fn value_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(
        prop_oneof![
            4 => -1.0e6f64..1.0e6,
            2 => Just(0.0),
            1 => Just(f64::NAN),
            1 => Just(-0.0),
            1 => any::<f64>(),
        ],
        0..200,
    )
}

fn bits(values: &[f64]) -> Vec<u64> {
    values.iter().map(|v| v.to_bits()).collect()
}

proptest! {
    #[test]
    fn test_times_roundtrip_proptest(times in timestamp_strategy()) {
        for encoding in [ColumnEncoding::Gorilla, ColumnEncoding::Raw] {
            let encoded = encode_times(&times, encoding);
            let decoded = decode_times(&encoded, times.len(), encoding).unwrap();
            prop_assert_eq!(&decoded, &times);
        }
    }

    #[test]
    fn test_arbitrary_times_roundtrip(times in prop::collection::vec(any::<i64>(), 0..50)) {
        let encoded = encode_times(&times, ColumnEncoding::Gorilla);
        let decoded = decode_times(&encoded, times.len(), ColumnEncoding::Gorilla).unwrap();
        prop_assert_eq!(decoded, times);
    }

    #[test]
    fn test_values_roundtrip_proptest(values in value_strategy()) {
        for encoding in [ColumnEncoding::Gorilla, ColumnEncoding::Raw] {
            let encoded = encode_values(&values, encoding);
            let decoded = decode_values(&encoded, values.len(), encoding).unwrap();
            prop_assert_eq!(bits(&decoded), bits(&values));
        }
    }

    #[test]
    fn test_constant_column_compresses(value in -1000.0f64..1000.0, count in 16usize..500) {
        let values = vec![value; count];
        let encoded = encode_values(&values, ColumnEncoding::Gorilla);
        // One full value, then one bit per repeat.
        prop_assert!(encoded.len() <= 8 + count / 8 + 1);
        let decoded = decode_values(&encoded, count, ColumnEncoding::Gorilla).unwrap();
        prop_assert_eq!(decoded, values);
    }
}

#[test]
fn test_regular_steps_compress() {
    let times: Vec<i64> = (0..1000).map(|i| 1_577_836_800 + i * 86_400).collect();
    let encoded = encode_times(&times, ColumnEncoding::Gorilla);
    // Raw storage would take 8 bytes per step.
    assert!(encoded.len() < times.len() / 4);
    assert_eq!(
        decode_times(&encoded, times.len(), ColumnEncoding::Gorilla).unwrap(),
        times
    );
}

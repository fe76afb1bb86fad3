use proptest::prelude::*;
use tabula_types::{Bool, Float, GeoPoint, Int, Text, ValueType};

fn arb_int() -> impl Strategy<Value = Int> {
    prop_oneof![9 => any::<i64>().prop_map(Int::new), 1 => Just(Int::na())]
}

fn arb_float() -> impl Strategy<Value = Float> {
    prop_oneof![9 => any::<f64>().prop_map(Float::new), 1 => Just(Float::na())]
}

fn arb_bool() -> impl Strategy<Value = Bool> {
    prop_oneof![Just(Bool::False), Just(Bool::True), Just(Bool::Na)]
}

fn arb_text() -> impl Strategy<Value = Text> {
    prop_oneof![
        9 => proptest::collection::vec(any::<u8>(), 0..32).prop_map(Text::from),
        1 => Just(Text::na()),
    ]
}

proptest! {
    #[test]
    fn match_is_reflexive_for_int(x in arb_int()) {
        prop_assert!(x.matches(&x));
    }

    #[test]
    fn match_is_reflexive_for_float(x in arb_float()) {
        prop_assert!(ValueType::matches(&x, &x));
    }

    #[test]
    fn match_is_reflexive_for_text(x in arb_text()) {
        prop_assert!(x.matches(&x));
    }

    #[test]
    fn match_agrees_with_equal_on_valid_values(x in arb_int(), y in arb_int()) {
        if !x.is_na() && !y.is_na() {
            prop_assert_eq!(x.matches(&y), x.equal(y).is_true());
        }
    }

    #[test]
    fn na_absorbs_int_arithmetic(x in arb_int()) {
        prop_assert!((x + Int::na()).is_na());
        prop_assert!((Int::na() + x).is_na());
        prop_assert!((x * Int::na()).is_na());
        prop_assert!((Int::na() / x).is_na());
        prop_assert!((x % Int::na()).is_na());
    }

    #[test]
    fn bool_ops_are_kleene(a in arb_bool(), b in arb_bool()) {
        // AND is false whenever either side is false.
        if a.is_false() || b.is_false() {
            prop_assert!((a & b).is_false());
        }
        // OR is true whenever either side is true.
        if a.is_true() || b.is_true() {
            prop_assert!((a | b).is_true());
        }
        // Commutativity.
        prop_assert_eq!(a & b, b & a);
        prop_assert_eq!(a | b, b | a);
        prop_assert_eq!(a ^ b, b ^ a);
    }

    #[test]
    fn geo_point_normalization_is_idempotent(lat in any::<i64>(), lon in any::<i64>()) {
        let p = GeoPoint::new(Int::new(lat), Int::new(lon));
        let q = GeoPoint::new(p.latitude(), p.longitude());
        prop_assert!(p.matches(&q));
        // The result is always in range.
        let deg = 60 * 60 * 1000;
        prop_assert!(p.latitude().value() >= -90 * deg);
        prop_assert!(p.latitude().value() <= 90 * deg);
        prop_assert!(p.longitude().value() >= -180 * deg);
        prop_assert!(p.longitude().value() < 180 * deg);
    }
}

#[test]
fn is_na_holds_only_for_na() {
    assert!(Int::na().is_na());
    assert!(!Int::new(0).is_na());
    assert!(Float::na().is_na());
    assert!(!Float::new(0.0).is_na());
    assert!(Text::na().is_na());
    assert!(!Text::from("").is_na());
    assert!(GeoPoint::na().is_na());
    assert!(!GeoPoint::new(Int::new(0), Int::new(0)).is_na());
}

//! Normalization vectors for the big-decimal parser, including the
//! asymmetric negative-mantissa behavior near the 34-digit boundary. The
//! rounding direction is toward positive infinity: positive mantissas round
//! up on a tie-or-higher high digit, negative mantissas truncate.

use graphcsv::BigDecimal;
use num_bigint::BigInt;
use std::str::FromStr;

fn parse(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap_or_else(|err| panic!("parsing {value:?}: {err}"))
}

#[track_caller]
fn assert_parts(value: &str, expected_int: &str, expected_scale: i64) {
    let actual = parse(value);
    let (int, scale) = actual.as_parts();

    let expected = BigInt::from_str(expected_int).expect("valid expected mantissa");
    assert_eq!(
        (&expected, expected_scale),
        (int, scale),
        "for {value} [mantissa (expected {expected_int}, actual {int}), scale (expected {expected_scale}, actual {scale})]",
    );
}

#[test]
fn plain_values() {
    assert_parts("0.1", "1", 1);
    assert_parts("-0.1", "-1", 1);
    assert_parts("198.98765544", "19898765544", 8);
    assert_parts("0.00000093937698", "93937698", 14);
    assert_parts("98765587998098786876.0", "98765587998098786876", 0);
    assert_parts("98765000000", "98765", -6);
    assert_parts("-98765000000", "-98765", -6);
    assert_parts("98765000000.1", "987650000001", 1);
    assert_parts("-98765000000.2", "-987650000002", 1);
}

#[test]
fn zero_collapses_regardless_of_scale() {
    assert_parts("0", "0", 0);
    assert_parts("0.000", "0", 0);
    assert_parts("0e10", "0", 0);
    assert_parts("-0.0", "0", 0);
}

#[test]
fn exponents() {
    assert_parts("1e2", "1", -2);
    assert_parts("1e+2", "1", -2);
    assert_parts("12.5e-3", "125", 4);
    assert_parts("-3E4", "-3", -4);
}

#[test]
fn positive_rounding_outside_max_scale() {
    assert_parts(
        "0.1234567890123456789012345678901234",
        "1234567890123456789012345678901234",
        34,
    );
    assert_parts(
        "0.12345678901234567890123456789012344",
        "1234567890123456789012345678901234",
        34,
    );
    assert_parts(
        "0.12345678901234567890123456789012345",
        "1234567890123456789012345678901235",
        34,
    );
    assert_parts(
        "0.12345678901234567890123456789012346",
        "1234567890123456789012345678901235",
        34,
    );
}

#[test]
fn negative_rounding_outside_max_scale() {
    assert_parts(
        "-0.1234567890123456789012345678901234",
        "-1234567890123456789012345678901234",
        34,
    );
    // The digit-count estimate is never loop-corrected for negative
    // mantissas, so these keep 35 digits and a 35 scale.
    assert_parts(
        "-0.12345678901234567890123456789012344",
        "-12345678901234567890123456789012344",
        35,
    );
    assert_parts(
        "-0.12345678901234567890123456789012345",
        "-12345678901234567890123456789012345",
        35,
    );
    assert_parts(
        "-0.12345678901234567890123456789012346",
        "-12345678901234567890123456789012346",
        35,
    );
}

#[test]
fn negative_values_one_digit_past_the_estimate() {
    assert_parts(
        "-0.123456789012345678901234567890123424",
        "-12345678901234567890123456789012342",
        35,
    );
    assert_parts(
        "-0.123456789012345678901234567890123425",
        "-12345678901234567890123456789012342",
        35,
    );
    assert_parts(
        "-0.123456789012345678901234567890123426",
        "-12345678901234567890123456789012342",
        35,
    );
}

#[test]
fn rounding_split_across_the_dot() {
    assert_parts(
        "12.123456789012345678901234567890124",
        "1212345678901234567890123456789012",
        32,
    );
    assert_parts(
        "12.123456789012345678901234567890125",
        "1212345678901234567890123456789013",
        32,
    );
    assert_parts(
        "12.123456789012345678901234567890126",
        "1212345678901234567890123456789013",
        32,
    );

    assert_parts(
        "-12.1234567890123456789012345678901234",
        "-12123456789012345678901234567890123",
        33,
    );
    assert_parts(
        "-12.1234567890123456789012345678901235",
        "-12123456789012345678901234567890123",
        33,
    );
    assert_parts(
        "-12.1234567890123456789012345678901236",
        "-12123456789012345678901234567890123",
        33,
    );

    assert_parts(
        "1234567890123.123456789012345678901834567890124",
        "1234567890123123456789012345678902",
        21,
    );
    assert_parts(
        "-1234567890123.123456789012345678901894567890124",
        "-12345678901231234567890123456789018",
        22,
    );
}

#[test]
fn rounding_all_before_the_dot() {
    assert_parts(
        "1234567890123456789012345678901234",
        "1234567890123456789012345678901234",
        0,
    );
    assert_parts(
        "12345678901234567890123456789012344",
        "1234567890123456789012345678901234",
        -1,
    );
    assert_parts(
        "12345678901234567890123456789012345",
        "1234567890123456789012345678901235",
        -1,
    );
    assert_parts(
        "12345678901234567890123456789012346",
        "1234567890123456789012345678901235",
        -1,
    );

    assert_parts(
        "-12345678901234567890123456789012345",
        "-12345678901234567890123456789012345",
        0,
    );
    assert_parts(
        "-123456789012345678901234567890123454",
        "-12345678901234567890123456789012345",
        -1,
    );
    assert_parts(
        "-123456789012345678901234567890123455",
        "-12345678901234567890123456789012345",
        -1,
    );
    assert_parts(
        "-123456789012345678901234567890123456",
        "-12345678901234567890123456789012345",
        -1,
    );
}

#[test]
fn powers_of_ten() {
    assert_parts("10000000000000000000000000000000000000000", "1", -40);
    assert_parts("100000000000000000000000000000000000000001", "1", -41);
}

#[test]
fn nines_near_the_boundary() {
    assert_parts(
        "19999999999999999999999999999999994",
        "1999999999999999999999999999999999",
        -1,
    );
    assert_parts("19999999999999999999999999999999995", "2", -34);
    assert_parts(
        "19999999999999999999999999999999985",
        "1999999999999999999999999999999999",
        -1,
    );

    assert_parts(
        "1999999999999999999999999999999999",
        "1999999999999999999999999999999999",
        0,
    );
    assert_parts(
        "199999999999999999999999999999999",
        "199999999999999999999999999999999",
        0,
    );
    assert_parts("19999999999999999999999999999999999", "2", -34);
    assert_parts("199999999999999999999999999999999999999999", "2", -41);
}

#[test]
fn fours_and_fives() {
    assert_parts(
        "1444444444444444444444444444444444",
        "1444444444444444444444444444444444",
        0,
    );
    assert_parts(
        "14444444444444444444444444444444444",
        "1444444444444444444444444444444444",
        -1,
    );
    assert_parts(
        "144444444444444444444444444444444444",
        "1444444444444444444444444444444444",
        -2,
    );

    assert_parts(
        "1555555555555555555555555555555555",
        "1555555555555555555555555555555555",
        0,
    );
    assert_parts(
        "15555555555555555555555555555555555",
        "1555555555555555555555555555555556",
        -1,
    );
    assert_parts(
        "155555555555555555555555555555555555",
        "1555555555555555555555555555555556",
        -2,
    );
}

#[test]
fn normalization_is_idempotent() {
    let inputs = [
        "0.1",
        "-98765000000.2",
        "12345678901234567890123456789012345",
        "-0.12345678901234567890123456789012345",
        "155555555555555555555555555555555555",
        "0.000",
        "1e-30",
    ];

    for input in inputs {
        let first = parse(input);
        let reparsed = parse(&first.to_string());
        assert_eq!(first, reparsed, "for {input} (formatted {first})");
    }
}

#[test]
fn rejects_malformed_input() {
    for input in ["", "e10", "1e", "1e+", "abc", "1.2.3", "--5"] {
        assert!(
            BigDecimal::from_str(input).is_err(),
            "{input:?} should not parse"
        );
    }
}

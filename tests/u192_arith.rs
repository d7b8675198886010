use graphcsv::U192;

fn u192(value: &str) -> U192 {
    U192::from_dec_str(value).expect("valid decimal")
}

#[test]
fn parses_and_displays_decimal() {
    assert_eq!("248", u192("248").to_string());
    assert_eq!(
        "6277101735386680763835789423207666416102355444464034512895",
        u192("6277101735386680763835789423207666416102355444464034512895").to_string()
    );
    assert_eq!(
        "6277101735386680763835789423207666416102355444464034512895",
        U192::MAX.to_string()
    );

    assert_eq!(
        U192([
            6148914691236517205,
            6148914691236517205,
            6148914691236517205
        ]),
        u192("2092367245128893587945263141069222138700785148154678170965")
    );
}

#[test]
fn rejects_values_wider_than_192_bits() {
    let err = U192::from_dec_str("6277101735386680763835789423207666416102355444464034512896")
        .unwrap_err();
    assert_eq!(
        "has 193 bits but U192 accepts a maximum of 192 bits",
        err.to_string()
    );

    assert!(U192::from_dec_str("not a number").is_err());
}

#[test]
fn add_wraps() {
    assert_eq!(u192("496"), u192("248").wrapping_add(u192("248")));
    assert_eq!(u192("247"), u192("248").wrapping_add(U192::MAX));
}

#[test]
fn sub_wraps() {
    assert_eq!(u192("1"), u192("249").wrapping_sub(u192("248")));
    assert_eq!(U192::MAX, u192("248").wrapping_sub(u192("249")));
}

#[test]
fn mul_wraps() {
    assert_eq!(u192("61752"), u192("248").wrapping_mul(u192("249")));

    let c = u192("2092367245128893587945263141069222138700785148154678170965");
    assert_eq!(
        U192([
            6148914691236517204,
            6148914691236517205,
            6148914691236517205
        ]),
        c.wrapping_mul(u192("4"))
    );
}

#[test]
fn add_then_sub_round_trips() {
    let cases = [
        (U192::ZERO, U192::ZERO),
        (u192("248"), u192("249")),
        (U192::MAX, u192("1")),
        (
            u192("2092367245128893587945263141069222138700785148154678170965"),
            U192::MAX,
        ),
        (
            U192([u64::MAX, 0, u64::MAX]),
            U192([1, u64::MAX, 0]),
        ),
    ];

    for (a, b) in cases {
        assert_eq!(a, a.wrapping_add(b).wrapping_sub(b), "a={a:?} b={b:?}");
    }
}

#[test]
fn le_bytes_round_trip() {
    let value = u192("2092367245128893587945263141069222138700785148154678170965");
    assert_eq!(value, U192::from_le_bytes(value.to_le_bytes()));
}

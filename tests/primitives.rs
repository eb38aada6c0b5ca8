//! Wire-level vectors for the primitive families across the three rules.

use pretty_assertions::assert_eq;
use x690::prelude::*;
use x690::RealForm;

fn encode<T: std::any::Any>(value: &T, rule: &str) -> Vec<u8> {
    marshal_with(value, &Options::parse(rule).unwrap())
        .unwrap()
        .into_bytes()
}

fn decode<T: std::any::Any + Default>(bytes: &[u8], rule: EncodingRules) -> T {
    let mut decoded = T::default();
    let mut reader = Pdu::from_bytes(rule, bytes);
    unmarshal(&mut reader, &mut decoded).unwrap();
    decoded
}

fn decode_err<T: std::any::Any + Default>(bytes: &[u8], rule: EncodingRules) -> Error {
    let mut decoded = T::default();
    let mut reader = Pdu::from_bytes(rule, bytes);
    unmarshal(&mut reader, &mut decoded).unwrap_err()
}

#[test]
fn integer_two_complement_edges() {
    assert_eq!(vec![0x02, 0x01, 0x00], encode(&Integer::from(0), "der"));
    assert_eq!(vec![0x02, 0x01, 0x80], encode(&Integer::from(-128), "der"));
    assert_eq!(
        vec![0x02, 0x02, 0x00, 0x80],
        encode(&Integer::from(128), "der")
    );
    assert_eq!(
        vec![0x02, 0x02, 0xFF, 0x7F],
        encode(&Integer::from(-129), "der")
    );

    for value in [0i64, 1, -1, 127, -128, 128, -129, i64::MAX, i64::MIN] {
        let bytes = encode(&Integer::from(value), "der");
        assert_eq!(
            Integer::from(value),
            decode::<Integer>(&bytes, EncodingRules::Der)
        );
    }
}

#[test]
fn enumerated_shares_integer_content() {
    assert_eq!(vec![0x0A, 0x01, 0x05], encode(&Enumerated::from(5), "der"));
    assert_eq!(
        Enumerated::from(5),
        decode::<Enumerated>(&[0x0A, 0x01, 0x05], EncodingRules::Der)
    );
}

#[test]
fn boolean_rule_differences() {
    assert_eq!(vec![0x01, 0x01, 0xFF], encode(&true, "der"));
    assert_eq!(vec![0x01, 0x01, 0x00], encode(&false, "der"));

    assert!(decode::<bool>(&[0x01, 0x01, 0x01], EncodingRules::Ber));
    decode_err::<bool>(&[0x01, 0x01, 0x01], EncodingRules::Der);
    decode_err::<bool>(&[0x01, 0x01, 0x01], EncodingRules::Cer);
}

#[test]
fn oid_vectors() {
    let oid: ObjectIdentifier = "1.3.6.1.4.1.56521".parse().unwrap();
    assert_eq!(
        vec![0x06, 0x08, 0x2B, 0x06, 0x01, 0x04, 0x01, 0x83, 0xB9, 0x49],
        encode(&oid, "der")
    );
    assert_eq!(oid, decode(&encode(&oid, "der"), EncodingRules::Der));

    let relative: RelativeOid = "8571.3.2".parse().unwrap();
    assert_eq!(
        vec![0x0D, 0x04, 0xC2, 0x7B, 0x03, 0x02],
        encode(&relative, "der")
    );
    assert_eq!(
        relative,
        decode(&encode(&relative, "ber"), EncodingRules::Ber)
    );
}

#[test]
fn oid_arbitrary_precision_round_trip() {
    use num_bigint::BigUint;

    let huge: BigUint = "184467440737095516150".parse().unwrap();
    let oid = x690::types::ObjectIdentifier::new(vec![
        BigUint::from(2u8),
        BigUint::from(999u16),
        huge.clone(),
    ])
    .unwrap();

    let decoded: ObjectIdentifier = decode(&encode(&oid, "der"), EncodingRules::Der);
    assert_eq!(huge, decoded.arcs()[2]);
}

#[test]
fn utf8_string_hello() {
    let hello = String::from("Hello");
    assert_eq!(
        vec![0x0C, 0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F],
        encode(&hello, "der")
    );
    assert_eq!(
        vec![0x0C, 0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F],
        encode(&hello, "cer")
    );
}

#[test]
fn cer_segments_an_oversized_octet_string() {
    let contents = vec![b'X'; 2001];
    let bytes = encode(&contents, "cer");

    // Constructed outer with indefinite length, then 1000-byte segments.
    assert_eq!(&[0x24, 0x80, 0x04, 0x82, 0x03, 0xE8], &bytes[..6]);
    assert_eq!(&[0x00, 0x00], &bytes[bytes.len() - 2..]);

    assert_eq!(contents, decode::<Vec<u8>>(&bytes, EncodingRules::Cer));

    // DER keeps the primitive form at any size.
    let der = encode(&contents, "der");
    assert_eq!(&[0x04, 0x82, 0x07, 0xD1], &der[..4]);
}

#[test]
fn restricted_strings_validate_on_decode() {
    let printable = PrintableString::try_from("Test User 1").unwrap();
    let bytes = encode(&printable, "der");
    assert_eq!(0x13, bytes[0]);
    assert_eq!(
        printable,
        decode::<PrintableString>(&bytes, EncodingRules::Der)
    );

    // '@' is outside the PrintableString repertoire.
    decode_err::<PrintableString>(&[0x13, 0x01, b'@'], EncodingRules::Der);
    decode_err::<NumericString>(&[0x12, 0x01, b'x'], EncodingRules::Der);
    decode_err::<Ia5String>(&[0x16, 0x01, 0x80], EncodingRules::Der);
}

#[test]
fn bmp_and_universal_strings() {
    let bmp = BmpString::from("Hi\u{20AC}");
    let bytes = encode(&bmp, "der");
    assert_eq!(
        vec![0x1E, 0x06, 0x00, b'H', 0x00, b'i', 0x20, 0xAC],
        bytes
    );
    assert_eq!(bmp, decode::<BmpString>(&bytes, EncodingRules::Der));

    let universal = UniversalString::from("A");
    assert_eq!(
        vec![0x1C, 0x04, 0x00, 0x00, 0x00, 0x41],
        encode(&universal, "der")
    );
}

#[test]
fn bit_string_forms() {
    let mut bits = BitString::from_slice(&[0x0A, 0x3B, 0x5F, 0x29, 0x1C, 0xD0]);
    let bytes = encode(&bits, "der");
    assert_eq!(
        vec![0x03, 0x07, 0x00, 0x0A, 0x3B, 0x5F, 0x29, 0x1C, 0xD0],
        bytes
    );
    assert_eq!(bits, decode::<BitString>(&bytes, EncodingRules::Der));

    bits.truncate(44);
    let bytes = encode(&bits, "der");
    assert_eq!(
        vec![0x03, 0x07, 0x04, 0x0A, 0x3B, 0x5F, 0x29, 0x1C, 0xD0],
        bytes
    );

    // Constructed decode under BER.
    let constructed = [
        0x23, 0x80, 0x03, 0x03, 0x00, 0x0A, 0x3B, 0x03, 0x05, 0x04, 0x5F, 0x29, 0x1C, 0xD0, 0x00,
        0x00,
    ];
    assert_eq!(bits, decode::<BitString>(&constructed, EncodingRules::Ber));
    decode_err::<BitString>(&constructed, EncodingRules::Der);
}

#[test]
fn temporal_round_trips() {
    use chrono::NaiveDate;

    let generalized: GeneralizedTime = chrono::DateTime::parse_from_str(
        "2018-01-22 13:29:00 +0000",
        "%Y-%m-%d %H:%M:%S %z",
    )
    .unwrap();
    let bytes = encode(&generalized, "der");
    assert_eq!(b"20180122132900Z".to_vec(), bytes[2..].to_vec());
    assert_eq!(
        generalized,
        decode::<GeneralizedTime>(&bytes, EncodingRules::Der)
    );

    let utc: UtcTime = chrono::DateTime::parse_from_str(
        "2018-01-22 13:29:00 +0000",
        "%Y-%m-%d %H:%M:%S %z",
    )
    .unwrap()
    .into();
    let bytes = encode(&utc, "der");
    assert_eq!(
        vec![
            0x17, 0x0D, 0x31, 0x38, 0x30, 0x31, 0x32, 0x32, 0x31, 0x33, 0x32, 0x39, 0x30, 0x30,
            0x5A
        ],
        bytes
    );
    assert_eq!(utc, decode::<UtcTime>(&bytes, EncodingRules::Der));

    let date = NaiveDate::from_ymd_opt(2012, 12, 21).unwrap();
    let bytes = encode(&date, "ber");
    assert_eq!(
        vec![0x1F, 0x1F, 0x08, 0x32, 0x30, 0x31, 0x32, 0x31, 0x32, 0x32, 0x31],
        bytes
    );
    assert_eq!(date, decode::<Date>(&bytes, EncodingRules::Ber));

    let time = chrono::NaiveTime::from_hms_opt(13, 0, 5).unwrap();
    assert_eq!(time, decode::<TimeOfDay>(&encode(&time, "der"), EncodingRules::Der));
}

#[test]
fn duration_round_trip() {
    let duration: Duration = "P1Y2M3DT4H5M6.5S".parse().unwrap();
    let bytes = encode(&duration, "der");
    assert_eq!(0x22, bytes[0] & 0x3F);
    assert_eq!(duration, decode::<Duration>(&bytes, EncodingRules::Der));

    let negative: Duration = "-PT2H".parse().unwrap();
    assert_eq!(
        negative,
        decode::<Duration>(&encode(&negative, "ber"), EncodingRules::Ber)
    );
}

#[test]
fn real_binary_and_decimal() {
    assert_eq!(vec![0x09, 0x03, 0x80, 0x01, 0x05], encode(&10.0f64, "der"));
    assert_eq!(vec![0x09, 0x00], encode(&0.0f64, "der"));
    assert_eq!(vec![0x09, 0x01, 0x40], encode(&f64::INFINITY, "der"));

    for value in [0.5f64, -123.456, 3.25e8, 1e-7] {
        assert_eq!(value, decode::<f64>(&encode(&value, "der"), EncodingRules::Der));
    }

    // A decimal-form alias selected per configuration.
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Reading(f64);

    x690::register_real_alias::<Reading>(
        x690::AliasConfig::new(|value: &Reading| Ok(value.0), |wire| Ok(Reading(wire)))
            .with_real_form(RealForm::Nr2),
    );

    let bytes = encode(&Reading(42.5), "ber");
    assert_eq!(vec![0x09, 0x05, 0x02, b'4', b'2', b'.', b'5'], bytes);
    assert_eq!(Reading(42.5), decode::<Reading>(&bytes, EncodingRules::Ber));
}

#[test]
fn null_rejects_content() {
    assert_eq!(vec![0x05, 0x00], encode(&(), "der"));
    decode_err::<()>(&[0x05, 0x01, 0x00], EncodingRules::Der);
}

#[test]
fn minimal_length_enforcement() {
    // 0x81 0x05 is legal BER but not minimal.
    let padded = [0x04, 0x81, 0x05, 1, 2, 3, 4, 5];
    assert_eq!(
        vec![1, 2, 3, 4, 5],
        decode::<Vec<u8>>(&padded, EncodingRules::Ber)
    );
    decode_err::<Vec<u8>>(&padded, EncodingRules::Der);
    decode_err::<Vec<u8>>(&padded, EncodingRules::Cer);
}

#[test]
fn ber_reencode_parses_back_to_the_same_value() {
    // Decode a BER indefinite encoding, re-encode under DER, decode again.
    let indefinite = [
        0x24, 0x80, 0x04, 0x03, 1, 2, 3, 0x04, 0x02, 4, 5, 0x00, 0x00,
    ];
    let value: Vec<u8> = decode(&indefinite, EncodingRules::Ber);
    assert_eq!(vec![1, 2, 3, 4, 5], value);

    let der = encode(&value, "der");
    assert_eq!(vec![0x04, 0x05, 1, 2, 3, 4, 5], der);
    assert_eq!(value, decode::<Vec<u8>>(&der, EncodingRules::Der));
}

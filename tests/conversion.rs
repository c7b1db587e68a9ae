//! Lexing, rewriting, reshaping, and wrapping laws over the public API.

use rebind::prelude::*;

const ALL_REWRITE_TARGETS: [ParameterStyle; 8] = [
    ParameterStyle::Qmark,
    ParameterStyle::Numeric,
    ParameterStyle::PositionalColon,
    ParameterStyle::PositionalPyformat,
    ParameterStyle::NamedColon,
    ParameterStyle::NamedAt,
    ParameterStyle::NamedDollar,
    ParameterStyle::NamedPyformat,
];

#[test]
fn rewrite_preserves_placeholder_count_for_every_target() {
    let samples = [
        "SELECT * FROM t WHERE a = ? AND b = ?",
        "SELECT * FROM t WHERE a = :a AND b = :b",
        "SELECT $1, $2, $3 FROM t",
        "INSERT INTO t VALUES (%s, %(name)s)",
        "SELECT * FROM t WHERE x = @x AND y = $y",
        "SELECT 'quoted ?' , ? FROM t -- trailing :comment",
    ];
    for sql in samples {
        let placeholders = lex(sql);
        for target in ALL_REWRITE_TARGETS {
            let rewritten = rewrite(sql, &placeholders, target);
            assert_eq!(
                lex(&rewritten).len(),
                placeholders.len(),
                "count invariant for {sql:?} -> {target}"
            );
        }
    }
}

#[test]
fn lex_positions_strictly_increase() {
    let samples = [
        "SELECT ?, :a, $1, %s, @b, $name, %(c)s, :2",
        "UPDATE u SET e = :email, f = :flag WHERE id = :id",
    ];
    for sql in samples {
        let placeholders = lex(sql);
        for pair in placeholders.windows(2) {
            assert!(pair[0].position < pair[1].position, "positions increase in {sql:?}");
            assert!(pair[0].ordinal < pair[1].ordinal);
        }
    }
}

#[test]
fn lex_is_deterministic_and_cached_consistently() {
    let sql = "SELECT * FROM t WHERE a = :a AND b = ?";
    assert_eq!(lex(sql), lex(sql));
}

#[test]
fn reshape_round_trip_restores_sequence_order() {
    let placeholders = lex("SELECT * FROM t WHERE a = :a AND b = :b AND c = ?");
    let original = Params::positional([ParamValue::Int(1), ParamValue::Int(2), ParamValue::Int(3)]);
    let named = reshape(original.clone(), &placeholders, ParameterStyle::NamedColon).unwrap();
    let back = reshape(named, &placeholders, ParameterStyle::Qmark).unwrap();
    assert_eq!(back, original);
}

#[test]
fn boundary_sql_shapes() {
    assert!(lex("").is_empty());
    assert!(lex("-- just a comment").is_empty());
    assert!(lex("/* block ? comment */").is_empty());
    assert!(lex("SELECT 'a ? b', 'it''s :fine' FROM t").is_empty());
    assert!(lex("SELECT data ?? 'k', col::int FROM t").is_empty());
}

#[test]
fn integer_wrapping_boundary() {
    let unwrapped = wrap_parameters(
        Params::positional([ParamValue::Int(2_147_483_647)]),
        &lex("SELECT ?"),
    );
    match unwrapped {
        Params::Positional(values) => assert!(!values[0].is_wrapped()),
        other => panic!("unexpected shape {other:?}"),
    }

    let wrapped = wrap_parameters(
        Params::positional([ParamValue::Int(2_147_483_648)]),
        &lex("SELECT ?"),
    );
    match wrapped {
        Params::Positional(values) => {
            assert_eq!(values[0].sql_type(), SqlType::BigInt);
        }
        other => panic!("unexpected shape {other:?}"),
    }
}

#[test]
fn typed_wrapping_inference_table() {
    let placeholders = lex("SELECT ?, ?, ?, ?");
    let wrapped = wrap_parameters(
        Params::positional([
            ParamValue::Bool(true),
            ParamValue::Int(5_000_000_000),
            ParamValue::Text("hi".into()),
            ParamValue::Null,
        ]),
        &placeholders,
    );
    let Params::Positional(values) = wrapped else {
        panic!("shape must be preserved");
    };
    assert_eq!(values[0].sql_type(), SqlType::Boolean);
    assert_eq!(values[1].sql_type(), SqlType::BigInt);
    assert!(!values[2].is_wrapped());
    assert_eq!(values[3].sql_type(), SqlType::Null);

    match (&values[0], &values[1], &values[3]) {
        (Parameter::Typed(b), Parameter::Typed(big), Parameter::Typed(null)) => {
            assert_eq!(b.type_hint, "boolean");
            assert_eq!(big.type_hint, "bigint");
            assert_eq!(null.type_hint, "null");
        }
        other => panic!("expected typed slots, got {other:?}"),
    }
}

#[test]
fn unicode_named_placeholders_survive_rewriting() {
    let sql = "SELECT * FROM t WHERE name = :ñame";
    let placeholders = lex(sql);
    assert_eq!(placeholders[0].name.as_deref(), Some("ñame"));
    assert_eq!(
        rewrite(sql, &placeholders, ParameterStyle::NamedAt),
        "SELECT * FROM t WHERE name = @ñame"
    );
    assert_eq!(
        rewrite(sql, &placeholders, ParameterStyle::PositionalPyformat),
        "SELECT * FROM t WHERE name = %s"
    );
}

#[test]
fn dominant_style_uses_counts_then_precedence() {
    use rebind_core::dominant_style;

    let qmark_heavy = lex("SELECT ?, ?, :one");
    assert_eq!(dominant_style(&qmark_heavy), ParameterStyle::Qmark);

    let tied = lex("SELECT %s, :one");
    assert_eq!(dominant_style(&tied), ParameterStyle::NamedColon);

    let named_tie = lex("SELECT %(a)s, :b");
    assert_eq!(dominant_style(&named_tie), ParameterStyle::NamedPyformat);
}

#[test]
fn validate_matches_compile_behavior() {
    let placeholders = lex("SELECT :a, :b");
    let good = Params::named([("a", ParamValue::Int(1)), ("b", ParamValue::Int(2))]);
    assert!(validate(&placeholders, &good).is_ok());

    let scalar_ok = lex("SELECT :only");
    assert!(validate(&scalar_ok, &Params::Scalar(Parameter::from(1i64))).is_ok());

    assert!(matches!(
        validate(&placeholders, &Params::Scalar(Parameter::from(1i64))),
        Err(RebindError::MissingParameter(_))
    ));
}

#[test]
fn style_identity_rewrite_is_byte_identical() {
    let cases = [
        ("SELECT * FROM t WHERE a = ? AND b = ?", ParameterStyle::Qmark),
        ("SELECT $1, $2 FROM t", ParameterStyle::Numeric),
        ("SELECT :a FROM t WHERE b = :b", ParameterStyle::NamedColon),
        ("SELECT %(k)s FROM t", ParameterStyle::NamedPyformat),
    ];
    for (sql, style) in cases {
        assert_eq!(rewrite(sql, &lex(sql), style), sql);
    }
}

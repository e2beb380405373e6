use proptest::prelude::*;
use sestring_eval as se;
use se::encode::{encode_uint, uint_len};
use se::parser;
use se::sestring::{marker, BinaryOp, Expression, ParamKind, SeStr, SeString};

fn placeholder() -> impl Strategy<Value = u8> {
    prop_oneof![0xD0u8..=0xDF, Just(marker::STACK_COLOR)]
}

fn param_kind() -> impl Strategy<Value = ParamKind> {
    prop_oneof![
        Just(ParamKind::LocalNumber),
        Just(ParamKind::GlobalNumber),
        Just(ParamKind::LocalString),
        Just(ParamKind::GlobalString),
    ]
}

fn binary_op() -> impl Strategy<Value = BinaryOp> {
    prop_oneof![
        Just(BinaryOp::GreaterOrEqual),
        Just(BinaryOp::Greater),
        Just(BinaryOp::LessOrEqual),
        Just(BinaryOp::Less),
        Just(BinaryOp::Equal),
        Just(BinaryOp::NotEqual),
    ]
}

fn expression() -> impl Strategy<Value = Expression> {
    let leaf = prop_oneof![
        any::<u32>().prop_map(Expression::Integer),
        placeholder().prop_map(Expression::Placeholder),
        prop::collection::vec(any::<u8>(), 0..40)
            .prop_map(|b| Expression::String(SeString::from(b))),
    ];
    leaf.prop_recursive(6, 48, 2, |inner| {
        prop_oneof![
            (param_kind(), inner.clone()).prop_map(|(k, e)| Expression::Parameter(k, Box::new(e))),
            (binary_op(), inner.clone(), inner)
                .prop_map(|(op, l, r)| Expression::Binary(op, Box::new(l), Box::new(r))),
        ]
    })
}

proptest! {
    #[test]
    fn uint_encoding_round_trips(v in any::<u32>()) {
        let mut buf = Vec::new();
        encode_uint(&mut buf, v);
        prop_assert_eq!(buf.len(), uint_len(v));
        prop_assert!(!buf[1..].contains(&0));
        prop_assert_eq!(parser::decode_uint(&buf), Some((v, buf.len())));
    }

    #[test]
    fn expression_encoding_round_trips(e in expression()) {
        let bytes = e.encode();
        prop_assert_eq!(bytes.len(), e.encoded_len());
        prop_assert!(bytes.len() <= e.max_encoded_len());
        prop_assert_eq!(parser::expression_len(&bytes), Ok(bytes.len()));
        prop_assert_eq!(parser::parse_expression(&bytes), Ok(e));
    }

    #[test]
    fn payloads_cover_arbitrary_input(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let covered: usize = SeStr::new(&bytes)
            .payloads()
            .inspect(|p| {
                for expr in p.expressions() {
                    let _ = expr.to_string();
                }
            })
            .map(|p| p.envelope().len())
            .sum();
        prop_assert_eq!(covered, bytes.len());
        let _ = se::evaluate_lossy(&bytes);
    }
}

//! Access contract tests for both raw backings.

use conduit_raw::{FieldRule, MapRaw, Raw, RawError, RawExt, TreeRaw};
use proptest::prelude::*;
use serde_json::{json, Value};

// =============================================================================
// Null / optional matrix
// =============================================================================

mod matrix {
    use super::*;

    #[derive(Debug, Clone, Copy)]
    enum Stored {
        Absent,
        Null,
        Value,
    }

    #[derive(Debug, PartialEq)]
    enum Outcome {
        Value(u32),
        Default,
        Null,
        MissingField,
        NoDefault,
        NullNotAllowed,
    }

    const STORED: u32 = 7;
    const DEFAULT: u32 = 42;

    fn expected(stored: Stored, optional: bool, nullable: bool, default: bool) -> Outcome {
        match stored {
            Stored::Value => Outcome::Value(STORED),
            Stored::Null if nullable => Outcome::Null,
            Stored::Null => Outcome::NullNotAllowed,
            // A default implies optional.
            Stored::Absent if default => Outcome::Default,
            Stored::Absent if !optional => Outcome::MissingField,
            Stored::Absent if nullable => Outcome::Null,
            Stored::Absent => Outcome::NoDefault,
        }
    }

    fn observe(raw: &dyn Raw, optional: bool, nullable: bool, default: bool) -> Outcome {
        let mut rule = FieldRule::<u32>::new(optional, nullable);
        if default {
            rule = rule.or_default(|| DEFAULT);
        }
        match raw.get::<u32>("f", rule) {
            Ok(Some(DEFAULT)) => Outcome::Default,
            Ok(Some(v)) => Outcome::Value(v),
            Ok(None) => Outcome::Null,
            Err(RawError::MissingField { .. }) => Outcome::MissingField,
            Err(RawError::NoDefault { .. }) => Outcome::NoDefault,
            Err(RawError::NullNotAllowed { .. }) => Outcome::NullNotAllowed,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    fn backings(stored: Stored) -> Vec<Box<dyn Raw>> {
        let tree = match stored {
            Stored::Absent => json!({}),
            Stored::Null => json!({"f": null}),
            Stored::Value => json!({"f": STORED}),
        };
        let map = match stored {
            Stored::Absent => MapRaw::new(),
            Stored::Null => MapRaw::new().with_null("f"),
            Stored::Value => MapRaw::new().with("f", STORED),
        };
        vec![
            Box::new(TreeRaw::from_value(tree).unwrap()),
            Box::new(map),
        ]
    }

    #[test]
    fn every_combination_behaves_as_documented() {
        let mut checked = 0;
        for stored in [Stored::Absent, Stored::Null, Stored::Value] {
            for optional in [false, true] {
                for nullable in [false, true] {
                    for default in [false, true] {
                        let want = expected(stored, optional, nullable, default);
                        for raw in backings(stored) {
                            let got = observe(raw.as_ref(), optional, nullable, default);
                            assert_eq!(
                                got, want,
                                "stored={stored:?} optional={optional} nullable={nullable} default={default} backing={raw:?}"
                            );
                            checked += 1;
                        }
                    }
                }
            }
        }
        assert_eq!(checked, 48);
    }

    #[test]
    fn null_write_requires_nullable() {
        let mut raw = TreeRaw::new();
        let err = raw
            .set::<u32>("f", None, FieldRule::required())
            .unwrap_err();
        assert!(matches!(err, RawError::NullNotAllowed { .. }));
        assert!(!raw.contains("f"));

        raw.set::<u32>("f", None, FieldRule::required().nullable())
            .unwrap();
        assert_eq!(raw.value("f"), Some(&Value::Null));
    }

    #[test]
    fn clearing_required_field_is_rejected() {
        let mut raw = MapRaw::new().with("f", 1u32);
        assert!(matches!(
            raw.clear::<u32>("f", FieldRule::required()),
            Err(RawError::RequiredField { .. })
        ));
        assert!(raw.clear::<u32>("f", FieldRule::optional()).unwrap());
    }
}

// =============================================================================
// Extension fields
// =============================================================================

mod extensions {
    use super::*;

    #[test]
    fn unknown_fields_survive_read_modify_write() {
        let frame = r#"{"id":"1","timeout":100,"x-vendor":{"nested":[1,2,{"deep":null}]},"zeta":"last"}"#;
        let mut raw = TreeRaw::from_frame(frame).unwrap();

        let timeout: u64 = raw.require("timeout").unwrap();
        raw.set("timeout", Some(timeout * 2), FieldRule::required())
            .unwrap();

        assert_eq!(
            raw.to_frame().unwrap(),
            r#"{"id":"1","timeout":200,"x-vendor":{"nested":[1,2,{"deep":null}]},"zeta":"last"}"#
        );
    }

    #[test]
    fn local_object_gains_no_fields_on_first_serialization() {
        let local = MapRaw::new().with("a", 1u8).with_null("b");
        let tree = local.clone().into_tree().unwrap();
        assert_eq!(tree.keys(), vec!["a", "b"]);
        assert!(local.content_eq(&tree));
    }
}

// =============================================================================
// Round trip
// =============================================================================

proptest! {
    #[test]
    fn set_then_get_returns_value(
        text in ".*",
        number in any::<i64>(),
        flags in proptest::collection::vec(any::<bool>(), 0..8),
    ) {
        let mut raw = TreeRaw::new();
        raw.set("text", Some(text.clone()), FieldRule::required()).unwrap();
        raw.set("number", Some(number), FieldRule::required()).unwrap();
        raw.set("flags", Some(flags.clone()), FieldRule::required()).unwrap();

        let reparsed = TreeRaw::from_frame(&raw.to_frame().unwrap()).unwrap();
        prop_assert_eq!(reparsed.require::<String>("text").unwrap(), text);
        prop_assert_eq!(reparsed.require::<i64>("number").unwrap(), number);
        prop_assert_eq!(reparsed.require::<Vec<bool>>("flags").unwrap(), flags);
        prop_assert!(reparsed.content_eq(&raw));
    }
}

//! Property tests for unit naming.

use daedalus_codegen::{registration_name, UnitKey};
use daedalus_model::HttpVerb;
use proptest::prelude::*;

fn verb() -> impl Strategy<Value = HttpVerb> {
    prop::sample::select(HttpVerb::ALL.to_vec())
}

fn owner() -> impl Strategy<Value = String> {
    "[a-z]{1,4}(\\.[A-Za-z$_]{1,6}){1,3}"
}

fn pattern() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-zA-Z0-9_\\-.*:{}é ]{0,6}", 0..4)
        .prop_map(|segments| format!("/{}", segments.join("/")))
}

fn params() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-zA-Z_$][a-zA-Z0-9_$]{0,6}", 0..4)
}

fn key() -> impl Strategy<Value = UnitKey> {
    (owner(), verb(), pattern(), params())
        .prop_map(|(owner, verb, pattern, params)| UnitKey::new(owner, verb, pattern, params))
}

proptest! {
    #[test]
    fn test_render_parses_back(key in key()) {
        let name = key.render();
        prop_assert_eq!(UnitKey::parse(&name), Some(key));
    }

    #[test]
    fn test_rendering_is_injective(a in key(), b in key()) {
        if a != b {
            prop_assert_ne!(a.render(), b.render());
        } else {
            prop_assert_eq!(a.render(), b.render());
        }
    }

    #[test]
    fn test_rendering_is_deterministic(key in key()) {
        prop_assert_eq!(key.render(), key.clone().render());
    }

    #[test]
    fn test_rendered_parts_have_no_raw_separator(key in key()) {
        let name = key.render();
        prop_assert_eq!(name.matches('$').count(), 1 + key.params.len());
        prop_assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || "._$".contains(c)));
    }

    #[test]
    fn test_registration_name_differs_from_handlers(key in key()) {
        prop_assert_ne!(registration_name(&key.owner), key.render());
        prop_assert!(UnitKey::parse(&registration_name(&key.owner)).is_none());
    }
}

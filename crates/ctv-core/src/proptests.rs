//! Property-based tests for the channel contract.

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Value};

use crate::command::{MethodCall, METHOD_START_SCREEN_MIRRORING, METHOD_STOP_CASTING};
use crate::dispatch::Dispatcher;
use crate::handler::PlaceholderHandler;
use crate::reply::MethodResult;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

fn arb_arguments() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        ".*".prop_map(Value::String),
        prop::collection::hash_map("[a-zA-Z]{1,8}", ".*", 0..4)
            .prop_map(|m| json!(m)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Any method outside the command set gets the not-implemented reply,
    // whatever arguments come with it.
    #[test]
    fn test_unknown_methods_are_never_successful(
        method in ".*".prop_filter("known method", |m| {
            m != METHOD_START_SCREEN_MIRRORING && m != METHOD_STOP_CASTING
        }),
        arguments in arb_arguments(),
    ) {
        let dispatcher = Dispatcher::new(Arc::new(PlaceholderHandler));
        let reply = runtime().block_on(dispatcher.dispatch(MethodCall::new(method, arguments)));
        prop_assert_eq!(reply, MethodResult::NotImplemented);
    }

    // Optional string arguments, present or absent, never fault the
    // placeholder start.
    #[test]
    fn test_placeholder_start_accepts_optional_strings(
        device_id in prop::option::of(".*"),
        device_name in prop::option::of(".*"),
    ) {
        let mut args = serde_json::Map::new();
        if let Some(id) = device_id {
            args.insert("deviceId".into(), Value::String(id));
        }
        if let Some(name) = device_name {
            args.insert("deviceName".into(), Value::String(name));
        }

        let dispatcher = Dispatcher::new(Arc::new(PlaceholderHandler));
        let reply = runtime().block_on(dispatcher.dispatch(MethodCall::new(
            METHOD_START_SCREEN_MIRRORING,
            Value::Object(args),
        )));
        prop_assert_eq!(reply, MethodResult::Success(json!(true)));
    }

    // Stop ignores whatever arguments it is given.
    #[test]
    fn test_stop_ignores_arguments(arguments in arb_arguments()) {
        let dispatcher = Dispatcher::new(Arc::new(PlaceholderHandler));
        let reply = runtime().block_on(
            dispatcher.dispatch(MethodCall::new(METHOD_STOP_CASTING, arguments)),
        );
        prop_assert_eq!(reply, MethodResult::empty());
    }
}

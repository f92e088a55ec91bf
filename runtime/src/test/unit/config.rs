use std::collections::HashMap;

use test_case::test_case;

use crate::config::{DEVICE_ENV, KERNEL_SESSIONS_ENV, SEED_ENV};
use crate::{ContextConfig, Error};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn test_default_config() {
    let config = ContextConfig::default();
    assert_eq!(config.device, None);
    assert_eq!(config.seed, None);
    assert!(config.kernel_sessions);
}

#[test]
fn test_builder() {
    let config = ContextConfig::builder().device(1).seed(42).build();
    assert_eq!(config, ContextConfig { device: Some(1), seed: Some(42), kernel_sessions: true });

    let config = ContextConfig::builder().kernel_sessions(false).build();
    assert_eq!(config, ContextConfig { device: None, seed: None, kernel_sessions: false });
}

#[test]
fn test_from_empty_lookup() {
    assert_eq!(ContextConfig::from_lookup(lookup(&[])).unwrap(), ContextConfig::default());
}

#[test]
fn test_from_lookup() {
    let config = ContextConfig::from_lookup(lookup(&[(DEVICE_ENV, "2"), (SEED_ENV, " 1701 ")])).unwrap();
    assert_eq!(config.device, Some(2));
    assert_eq!(config.seed, Some(1701));
    assert!(config.kernel_sessions);
}

#[test_case("0", false; "zero")]
#[test_case("false", false; "false")]
#[test_case("OFF", false; "off uppercase")]
#[test_case("1", true; "one")]
#[test_case("yes", true; "yes")]
fn test_kernel_sessions_flag(value: &str, expected: bool) {
    let config = ContextConfig::from_lookup(lookup(&[(KERNEL_SESSIONS_ENV, value)])).unwrap();
    assert_eq!(config.kernel_sessions, expected);
}

#[test_case(DEVICE_ENV, "gpu0"; "non numeric device")]
#[test_case(DEVICE_ENV, "-1"; "negative device")]
#[test_case(SEED_ENV, "seed"; "non numeric seed")]
#[test_case(KERNEL_SESSIONS_ENV, "maybe"; "bad flag")]
fn test_malformed_values(key: &str, value: &str) {
    match ContextConfig::from_lookup(lookup(&[(key, value)])) {
        Err(Error::Config { key: bad_key, value: bad_value }) => {
            assert_eq!(bad_key, key);
            assert_eq!(bad_value, value);
        }
        other => panic!("expected config error, got {other:?}"),
    }
}

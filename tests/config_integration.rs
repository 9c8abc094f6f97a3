//! ---
//! moss_section: "15-testing-qa-runbook"
//! moss_subsection: "integration-tests"
//! moss_type: "source"
//! moss_scope: "code"
//! moss_description: "Configuration schema and instance-selection suites."
//! moss_version: "v0.0.0-prealpha"
//! moss_owner: "tbd"
//! ---
use moss_common::{ConfigError, MossConfig, StoragePartition};

const SINGLE_INSTANCE: &str = r#"
instances:
  - sal_index: 1
    tcpip:
      hostname: "x"
      port: 10
      timeout: 5
    s3_instance: tuc
"#;

#[test]
fn scenario_1_resolve_returns_the_matching_record() {
    let config: MossConfig = SINGLE_INSTANCE.parse().unwrap();
    let instance = config.resolve(1).unwrap();
    assert_eq!(instance.sal_index, 1);
    assert_eq!(instance.tcpip.hostname, "x");
    assert_eq!(instance.tcpip.port, 10);
    assert_eq!(instance.tcpip.timeout, 5);
    assert_eq!(instance.s3_instance, StoragePartition::Tuc);
}

#[test]
fn scenario_2_resolve_fails_for_an_absent_index() {
    let config: MossConfig = SINGLE_INSTANCE.parse().unwrap();
    let err = config.resolve(2).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { sal_index: 2 }), "{err}");
}

#[test]
fn schema_violations_fail_before_any_resource_is_touched() {
    let violations = [
        // missing required tcpip field
        r#"
instances:
  - sal_index: 1
    s3_instance: tuc
"#,
        // missing required timeout inside tcpip
        r#"
instances:
  - sal_index: 1
    tcpip:
      hostname: "x"
      port: 10
    s3_instance: tuc
"#,
        // wrong type for port
        r#"
instances:
  - sal_index: 1
    tcpip:
      hostname: "x"
      port: ten
      timeout: 5
    s3_instance: tuc
"#,
        // unknown per-instance property
        r#"
instances:
  - sal_index: 1
    tcpip:
      hostname: "x"
      port: 10
      timeout: 5
    s3_instance: tuc
    site: summit
"#,
        // unknown tcpip property
        r#"
instances:
  - sal_index: 1
    tcpip:
      hostname: "x"
      port: 10
      timeout: 5
      keepalive: true
    s3_instance: tuc
"#,
        // partition code outside the closed enumeration
        r#"
instances:
  - sal_index: 1
    tcpip:
      hostname: "x"
      port: 10
      timeout: 5
    s3_instance: lfa
"#,
        // missing required top-level instances array
        "site: summit\n",
    ];
    for doc in violations {
        let err = doc.parse::<MossConfig>().unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{doc}: {err}");
    }
}

#[test]
fn value_violations_are_rejected_by_validation() {
    let zero_index = r#"
instances:
  - sal_index: 0
    tcpip:
      hostname: "x"
      port: 10
      timeout: 5
    s3_instance: tuc
"#;
    assert!(matches!(
        zero_index.parse::<MossConfig>().unwrap_err(),
        ConfigError::Invalid(_)
    ));

    let duplicate_index = r#"
instances:
  - sal_index: 3
    tcpip:
      hostname: "x"
      port: 10
      timeout: 5
    s3_instance: tuc
  - sal_index: 3
    tcpip:
      hostname: "y"
      port: 11
      timeout: 5
    s3_instance: cp
"#;
    assert!(matches!(
        duplicate_index.parse::<MossConfig>().unwrap_err(),
        ConfigError::Invalid(_)
    ));
}

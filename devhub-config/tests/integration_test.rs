//! Integration tests for devhub configuration loading

use devhub_config::*;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use temp_env::with_vars;
use tempfile::NamedTempFile;

#[test]
fn test_default_config_is_valid() {
    let config = DevhubConfig::default();
    assert!(config.validate_all().is_ok());
    assert_eq!(config.store.database, "devhub");
    assert_eq!(config.store.tenant_prefix, "devhub-");
    assert_eq!(config.migration.batch_size, 100);
    assert_eq!(config.deployment.mode, DeploymentKind::Community);
}

#[test]
fn test_env_overrides() {
    let vars = vec![
        ("DEVHUB_LOG_LEVEL", Some("debug")),
        ("DEVHUB_LOG_FORMAT", Some("json")),
        ("DEVHUB_DATA_PATH", Some("/var/lib/devhub/data.json")),
        ("DEVHUB_DATABASE", Some("deviceauth")),
        ("DEVHUB_MIGRATION_BATCH_SIZE", Some("25")),
        ("DEVHUB_MIGRATION_TARGET", Some("4")),
        ("DEVHUB_MIGRATION_STEP_TIMEOUT", Some("30")),
        ("DEVHUB_DEPLOYMENT_MODE", Some("enterprise")),
        ("DEVHUB_CLOUD", Some("true")),
    ];

    with_vars(vars, || {
        let config = ConfigLoader::new().from_env().unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.store.data_path,
            PathBuf::from("/var/lib/devhub/data.json")
        );
        assert_eq!(config.store.database, "deviceauth");
        assert_eq!(config.migration.batch_size, 25);
        assert_eq!(config.migration.target_version, Some(4));
        assert_eq!(config.migration.step_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.deployment.mode, DeploymentKind::Enterprise);
        assert!(config.deployment.cloud);
    });
}

#[test]
fn test_invalid_env_values_are_rejected() {
    with_vars(vec![("DEVHUB_MIGRATION_BATCH_SIZE", Some("many"))], || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(err, ConfigError::EnvError(_)));
    });

    with_vars(vec![("DEVHUB_MIGRATION_BATCH_SIZE", Some("0"))], || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(err, ConfigError::DomainError { .. }));
    });

    with_vars(vec![("DEVHUB_DEPLOYMENT_MODE", Some("hosted"))], || {
        assert!(ConfigLoader::new().from_env().is_err());
    });
}

#[test]
fn test_yaml_file_with_env_override() {
    let yaml = r#"
store:
  data_path: "/tmp/devhub.json"
  database: "useradm"
  tenant_prefix: "useradm-"

migration:
  target_version: 6
  batch_size: 50
  step_timeout: 120
  include_tenants: false

deployment:
  mode: enterprise
  cloud: false

logging:
  level: warn
  format: compact
"#;
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    with_vars(vec![("DEVHUB_MIGRATION_BATCH_SIZE", Some("10"))], || {
        let config = ConfigLoader::new().load(Some(file.path())).unwrap();

        assert_eq!(config.store.database, "useradm");
        assert_eq!(config.store.tenant_prefix, "useradm-");
        assert_eq!(config.migration.target_version, Some(6));
        assert_eq!(config.migration.batch_size, 10);
        assert_eq!(config.migration.step_timeout, Some(Duration::from_secs(120)));
        assert!(!config.migration.include_tenants);
        assert_eq!(config.deployment.mode, DeploymentKind::Enterprise);
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(config.logging.format, LogFormat::Compact);
    });
}

#[test]
fn test_missing_file_is_read_error() {
    let err = ConfigLoader::new()
        .from_file("/nonexistent/devhub.yaml")
        .unwrap_err();
    assert!(matches!(err, ConfigError::FileReadError(_)));
}

#[test]
fn test_database_inside_tenant_namespace_is_rejected() {
    let yaml = "store:\n  database: \"devhub-acme\"\n";
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    with_vars(Vec::<(&str, Option<&str>)>::new(), || {
        assert!(ConfigLoader::new().from_file(file.path()).is_err());
    });
}

#[test]
fn test_custom_prefix_loader() {
    let vars = vec![
        ("DEVICEAUTH_DATABASE", Some("deviceauth")),
        ("DEVICEAUTH_MIGRATION_TARGET", Some("2")),
    ];

    with_vars(vars, || {
        let config = ConfigLoader::with_prefix("DEVICEAUTH").from_env().unwrap();
        assert_eq!(config.store.database, "deviceauth");
        assert_eq!(config.migration.target_version, Some(2));
    });
}

#[test]
fn test_sample_round_trips() {
    let sample = DevhubConfig::generate_sample();
    let parsed: DevhubConfig = serde_yaml::from_str(&sample).unwrap();
    assert_eq!(parsed, DevhubConfig::default());
}

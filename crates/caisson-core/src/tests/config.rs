use crate::config::{parse_size_in_blocks, StoreConfig};
use crate::error::CaissonError;

#[test]
fn parse_sizes_with_suffixes() {
    assert_eq!(parse_size_in_blocks("100B", 4096).unwrap(), 100);
    assert_eq!(parse_size_in_blocks("1M", 4096).unwrap(), 256);
    assert_eq!(parse_size_in_blocks("2G", 4096).unwrap(), 524288);
    assert_eq!(parse_size_in_blocks("10m", 1024 * 1024).unwrap(), 10);
}

#[test]
fn sizes_require_a_suffix() {
    assert!(matches!(
        parse_size_in_blocks("100", 4096),
        Err(CaissonError::BadSizeString(_))
    ));
    assert!(matches!(
        parse_size_in_blocks("100K", 4096),
        Err(CaissonError::BadSizeString(_))
    ));
    assert!(matches!(
        parse_size_in_blocks("", 4096),
        Err(CaissonError::BadSizeString(_))
    ));
    assert!(matches!(
        parse_size_in_blocks("G", 4096),
        Err(CaissonError::BadSizeString(_))
    ));
}

#[test]
fn load_yaml_config() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("caisson.yaml");
    std::fs::write(
        &path,
        "\
account_database: /var/lib/caisson/accounts.txt
disc_sets:
  - num: 0
    root: /srv/store/set0
  - num: 1
    root: /srv/store/set1
    block_size: 8192
housekeeping:
  interval_seconds: 900
",
    )
    .unwrap();

    let config = StoreConfig::load(&path).unwrap();
    assert_eq!(config.disc_sets.len(), 2);
    assert_eq!(config.disc_set(0).unwrap().block_size, 4096);
    assert_eq!(config.disc_set(1).unwrap().block_size, 8192);
    assert_eq!(config.housekeeping.interval_seconds, 900);
    assert_eq!(config.housekeeping.deleted_retention_seconds, 0);
    assert!(matches!(
        config.disc_set(7),
        Err(CaissonError::NoSuchDiscSet(7))
    ));

    // Reload picks up edits.
    std::fs::write(
        &path,
        "\
account_database: /var/lib/caisson/accounts.txt
disc_sets:
  - num: 0
    root: /srv/store/set0
housekeeping:
  interval_seconds: 60
",
    )
    .unwrap();
    let reloaded = config.reload().unwrap();
    assert_eq!(reloaded.housekeeping.interval_seconds, 60);
}

#[test]
fn duplicate_disc_sets_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("caisson.yaml");
    std::fs::write(
        &path,
        "\
account_database: /tmp/accounts.txt
disc_sets:
  - num: 0
    root: /srv/a
  - num: 0
    root: /srv/b
",
    )
    .unwrap();
    assert!(matches!(
        StoreConfig::load(&path),
        Err(CaissonError::Config(_))
    ));
}

use crate::accounts::AccountId;
use crate::error::CaissonError;
use crate::store::usage::{check_limits, MAX_SOFT_LIMIT_PERCENT};
use crate::store::{AccountUsageInfo, ObjectId};

#[test]
fn limits_must_be_positive() {
    assert!(check_limits(0, 100).is_err());
    assert!(check_limits(-5, 100).is_err());
    assert!(check_limits(50, 0).is_err());
}

#[test]
fn soft_must_be_below_hard() {
    assert!(check_limits(100, 100).is_err());
    assert!(check_limits(110, 100).is_err());
}

#[test]
fn soft_capped_at_97_percent_of_hard() {
    assert_eq!(MAX_SOFT_LIMIT_PERCENT, 97);
    // 98 > 97% of 100 — rejected.
    assert!(matches!(
        check_limits(98, 100),
        Err(CaissonError::BadLimits(_))
    ));
    // Exactly 97% is allowed.
    check_limits(97, 100).unwrap();
    check_limits(100, 110).unwrap();
}

#[test]
fn set_limits_rejection_mutates_nothing() {
    let mut usage = AccountUsageInfo::new(AccountId(0x05), 100, 110);
    let result = usage.set_limits(98, 100);
    assert!(result.is_err());
    assert_eq!(usage.blocks_soft_limit, 100);
    assert_eq!(usage.blocks_hard_limit, 110);
}

#[test]
fn save_load_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let mut usage = AccountUsageInfo::new(AccountId(0xabc), 100, 200);
    usage.blocks_used = 42;
    usage.blocks_in_old_files = 7;
    usage.client_store_marker = 99;
    usage.save(tmp.path()).unwrap();

    let loaded = AccountUsageInfo::load(tmp.path()).unwrap();
    assert_eq!(loaded, usage);
}

#[test]
fn next_object_id_is_monotonic() {
    let mut usage = AccountUsageInfo::new(AccountId(1), 10, 20);
    let a = usage.next_object_id();
    let b = usage.next_object_id();
    assert_eq!(a, ObjectId(2));
    assert_eq!(b, ObjectId(3));
    assert_eq!(usage.last_object_id_used, b);
}

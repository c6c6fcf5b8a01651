use std::time::Duration;

use crate::accounts::AccountId;
use crate::error::CaissonError;
use crate::housekeeping::{coordinator_channel, Command};

#[test]
fn command_lines_round_trip() {
    for cmd in [
        Command::ReloadConfig,
        Command::Terminate,
        Command::ReleaseAccount(AccountId(0x05)),
        Command::ReleaseAccount(AccountId(0xdeadbeef)),
    ] {
        let line = cmd.as_line();
        assert!(line.ends_with('\n'));
        assert_eq!(Command::parse(&line).unwrap(), cmd);
    }
}

#[test]
fn wire_format_matches_the_protocol_table() {
    assert_eq!(Command::ReloadConfig.as_line(), "h\n");
    assert_eq!(Command::Terminate.as_line(), "t\n");
    assert_eq!(Command::ReleaseAccount(AccountId(0x2a)).as_line(), "r2a\n");
}

#[test]
fn garbage_is_a_protocol_violation() {
    for line in ["x\n", "release 5\n", "r\n", "rzz\n", ""] {
        assert!(matches!(
            Command::parse(line),
            Err(CaissonError::CoordinatorProtocol(_))
        ));
    }
}

#[test]
fn release_for_current_account_means_abandon() {
    let (handle, endpoint) = coordinator_channel();
    handle.request_account_release(AccountId(0x05));

    let abandon = endpoint
        .check_for_command(Some(AccountId(0x05)), Duration::ZERO)
        .unwrap();
    assert!(abandon);
    assert!(!endpoint.terminate_wanted());
}

#[test]
fn release_for_another_account_is_ignored() {
    let (handle, endpoint) = coordinator_channel();
    handle.request_account_release(AccountId(0x06));

    let abandon = endpoint
        .check_for_command(Some(AccountId(0x05)), Duration::ZERO)
        .unwrap();
    assert!(!abandon);
}

#[test]
fn terminate_sets_the_flag_and_abandons() {
    let (handle, endpoint) = coordinator_channel();
    handle.request_terminate();

    let abandon = endpoint.check_for_command(None, Duration::ZERO).unwrap();
    assert!(abandon);
    assert!(endpoint.terminate_wanted());
}

#[test]
fn reload_sets_the_flag_once() {
    let (handle, endpoint) = coordinator_channel();
    handle.request_reload();

    assert!(endpoint.check_for_command(None, Duration::ZERO).unwrap());
    assert!(endpoint.take_reload_wanted());
    assert!(!endpoint.take_reload_wanted());
}

#[test]
fn owner_death_means_terminate() {
    let (handle, endpoint) = coordinator_channel();
    drop(handle);

    let abandon = endpoint.check_for_command(None, Duration::ZERO).unwrap();
    assert!(abandon);
    assert!(endpoint.terminate_wanted());
}

#[test]
fn commands_are_processed_in_order() {
    let (handle, endpoint) = coordinator_channel();
    handle.request_account_release(AccountId(0x01));
    handle.request_account_release(AccountId(0x02));
    handle.request_reload();

    // Not our account, ignored.
    assert!(!endpoint
        .check_for_command(Some(AccountId(0x02)), Duration::ZERO)
        .unwrap());
    // Ours.
    assert!(endpoint
        .check_for_command(Some(AccountId(0x02)), Duration::ZERO)
        .unwrap());
    // Then the reload.
    assert!(endpoint.check_for_command(None, Duration::ZERO).unwrap());
    assert!(endpoint.take_reload_wanted());
}

#[test]
fn empty_channel_times_out_quietly() {
    let (_handle, endpoint) = coordinator_channel();
    let start = std::time::Instant::now();
    let abandon = endpoint
        .check_for_command(None, Duration::from_millis(30))
        .unwrap();
    assert!(!abandon);
    assert!(start.elapsed() >= Duration::from_millis(25));
}

#[test]
fn garbage_on_the_channel_is_fatal() {
    let (handle, endpoint) = coordinator_channel();
    // Reach under the typed API: a desynchronized peer writes a bad line.
    assert!(handle.send_raw_for_tests("bogus\n"));

    let result = endpoint.check_for_command(None, Duration::ZERO);
    assert!(matches!(
        result,
        Err(CaissonError::CoordinatorProtocol(_))
    ));
}

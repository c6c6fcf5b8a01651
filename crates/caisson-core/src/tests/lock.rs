use crate::error::CaissonError;
use crate::store::AccountLock;

#[test]
fn second_acquire_fails_while_held() {
    let tmp = tempfile::tempdir().unwrap();
    let _held = AccountLock::try_acquire(tmp.path()).unwrap();

    let second = AccountLock::try_acquire(tmp.path());
    assert!(matches!(second, Err(CaissonError::Locked(_))));
}

#[test]
fn released_on_drop() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let _held = AccountLock::try_acquire(tmp.path()).unwrap();
    }
    AccountLock::try_acquire(tmp.path()).unwrap();
}

#[test]
fn retry_gives_up_after_bounded_attempts() {
    let tmp = tempfile::tempdir().unwrap();
    let _held = AccountLock::try_acquire(tmp.path()).unwrap();

    let start = std::time::Instant::now();
    let result = AccountLock::acquire_with_retry(tmp.path(), 3, 10);
    assert!(matches!(result, Err(CaissonError::Locked(_))));
    // Two sleeps of ~10ms each; well under a second either way.
    assert!(start.elapsed() < std::time::Duration::from_secs(2));
}

#[test]
fn retry_succeeds_once_the_holder_releases() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().to_path_buf();
    let held = AccountLock::try_acquire(&root).unwrap();

    let releaser = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(50));
        drop(held);
    });

    let lock = AccountLock::acquire_with_retry(tmp.path(), 20, 20).unwrap();
    drop(lock);
    releaser.join().unwrap();
}

#[test]
fn mutual_exclusion_between_threads() {
    // Simulated housekeeping vs client session: both race for the same
    // account; exactly one non-blocking acquisition may succeed at a time.
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().to_path_buf();
    let barrier = std::sync::Arc::new(std::sync::Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let root = root.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                match AccountLock::try_acquire(&root) {
                    Ok(lock) => {
                        std::thread::sleep(std::time::Duration::from_millis(30));
                        drop(lock);
                        true
                    }
                    Err(_) => false,
                }
            })
        })
        .collect();

    let wins: usize = handles
        .into_iter()
        .map(|h| h.join().unwrap() as usize)
        .sum();
    // At most one winner per 30ms hold window; with a simultaneous start,
    // never all four.
    assert!(wins >= 1);
    assert!(wins < 4);
}

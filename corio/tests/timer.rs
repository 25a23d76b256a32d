use corio::task::{self, Task};
use corio::time::{sleep, sleep_until};
use corio::Builder;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

#[corio::test]
async fn test_sleep_basic() {
    let start = Instant::now();
    sleep(Duration::from_millis(50)).await;
    let elapsed = start.elapsed();

    assert!(
        elapsed >= Duration::from_millis(50),
        "Sleep should wait at least the specified duration"
    );
}

#[corio::test]
async fn test_sleep_zero_duration() {
    let start = Instant::now();
    sleep(Duration::from_millis(0)).await;
    let elapsed = start.elapsed();

    assert!(
        elapsed < Duration::from_millis(10),
        "Zero duration sleep should be fast"
    );
}

#[corio::test]
async fn test_sleep_until_past_deadline() {
    let deadline = Instant::now();
    sleep(Duration::from_millis(5)).await;

    let start = Instant::now();
    sleep_until(deadline).await;
    assert!(start.elapsed() < Duration::from_millis(5));
}

#[test]
fn test_timers_fire_in_deadline_order() {
    let rt = Builder::new().build().unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));

    for (label, millis) in [("c", 30), ("a", 10), ("b", 20), ("a2", 10)] {
        let log = log.clone();
        rt.spawn(async move {
            sleep(Duration::from_millis(millis)).await;
            log.borrow_mut().push(label);
            Ok(())
        });
    }

    rt.run().unwrap();
    assert_eq!(*log.borrow(), vec!["a", "a2", "b", "c"]);
}

#[test]
fn test_timer_registered_while_firing_waits_for_its_deadline() {
    let rt = Builder::new().build().unwrap();
    let start = Instant::now();

    let elapsed = rt
        .block_on(async move {
            sleep(Duration::from_millis(10)).await;
            sleep(Duration::from_millis(20)).await;
            Ok(start.elapsed())
        })
        .unwrap();

    assert!(elapsed >= Duration::from_millis(30));
}

#[test]
fn test_abandoned_sleeps_do_not_fire_into_reused_slots() {
    let rt = Builder::new().build().unwrap();

    let fired = rt
        .block_on(async {
            // Register and abandon many timers, then let unrelated timers
            // reuse their slots.
            for _ in 0..100 {
                let abandoned = task::spawn(async {
                    sleep(Duration::from_secs(60)).await;
                    Ok(())
                });
                task::yield_now().await;
                abandoned.abort();
            }

            let mut fired = 0;
            for _ in 0..100 {
                let short = Task::new(async {
                    sleep(Duration::from_millis(1)).await;
                    Ok(1)
                });
                fired += short.await?;
            }

            Ok(fired)
        })
        .unwrap();

    assert_eq!(fired, 100);
    assert_eq!(rt.metrics().timers, 0);
}

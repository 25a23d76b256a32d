use corio::task::{self, Raced, Task};
use corio::time::sleep;
use corio::{Builder, Error, race};

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

fn sleep_then<T: 'static>(millis: u64, value: T) -> Task<T> {
    Task::new(async move {
        sleep(Duration::from_millis(millis)).await;
        Ok(value)
    })
}

#[test]
fn test_race_shorter_sleep_wins() {
    let rt = Builder::new().build().unwrap();
    let start = Instant::now();

    let raced = rt
        .block_on(task::race(vec![sleep_then(100, 1), sleep_then(200, 2)]))
        .unwrap();

    let elapsed = start.elapsed();

    assert_eq!(raced, Raced { index: 0, value: 1 });
    assert!(elapsed >= Duration::from_millis(100));
    assert!(
        elapsed < Duration::from_millis(180),
        "the loser must not keep the loop alive, took {elapsed:?}"
    );
}

#[test]
fn test_race_later_branch_can_win() {
    let rt = Builder::new().build().unwrap();

    let raced = rt
        .block_on(task::race(vec![
            sleep_then(500, "slow"),
            sleep_then(50, "medium"),
            sleep_then(10, "fast"),
        ]))
        .unwrap();

    assert_eq!(raced.index, 2);
    assert_eq!(raced.value, "fast");
}

#[test]
fn test_race_empty_fails() {
    let rt = Builder::new().build().unwrap();
    let result = rt.block_on(task::race(Vec::<Task<u8>>::new()));

    assert!(matches!(result, Err(Error::EmptyRace)));
}

#[test]
fn test_race_loser_long_sleep_is_cancelled() {
    let rt = Builder::new().build().unwrap();
    let start = Instant::now();

    rt.block_on(task::race(vec![sleep_then(10, ()), sleep_then(60_000, ())]))
        .unwrap();

    assert!(start.elapsed() < Duration::from_secs(1));

    let metrics = rt.metrics();
    assert_eq!(metrics.timers, 0);
    assert_eq!(metrics.tasks, 0);
}

#[test]
fn test_race_discards_loser_outcome() {
    let rt = Builder::new().build().unwrap();
    let loser_finished = Rc::new(Cell::new(false));
    let flag = loser_finished.clone();

    let raced = rt
        .block_on(task::race(vec![
            sleep_then(5, 0),
            Task::new(async move {
                sleep(Duration::from_millis(50)).await;
                flag.set(true);
                Err(Error::msg("should never surface"))
            }),
        ]))
        .unwrap();

    assert_eq!(raced.index, 0);
    assert!(!loser_finished.get());
}

#[test]
fn test_race_winner_failure_propagates() {
    let rt = Builder::new().build().unwrap();

    let result = rt.block_on(task::race(vec![
        Task::new(async {
            sleep(Duration::from_millis(5)).await;
            Err::<u8, _>(Error::msg("winner failed"))
        }),
        sleep_then(50, 1),
    ]));

    assert_eq!(result.unwrap_err().to_string(), "winner failed");
}

#[corio::test]
async fn test_race_macro_different_types() -> corio::Result<()> {
    let result = race! {
        async {
            sleep(Duration::from_millis(50)).await;
            Ok(42i32)
        } => |v| format!("number: {v}"),
        async {
            sleep(Duration::from_millis(5)).await;
            Ok("hello")
        } => |v| format!("string: {v}"),
    }?;

    assert_eq!(result, "string: hello");
    Ok(())
}

#[corio::test]
async fn test_race_macro_single_branch() -> corio::Result<()> {
    let result = race! {
        async { Ok(21) } => |v| v * 2,
    }?;

    assert_eq!(result, 42);
    Ok(())
}

#[corio::test]
async fn test_race_inside_join() -> corio::Result<()> {
    let values = task::join_all(vec![
        Task::new(async {
            let raced = task::race(vec![sleep_then(5, 1), sleep_then(1_000, 2)]).await?;
            Ok(raced.value)
        }),
        sleep_then(10, 3),
    ])
    .await?;

    assert_eq!(values, vec![1, 3]);
    Ok(())
}

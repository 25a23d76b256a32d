use corio::task::{self, Task};
use corio::time::sleep;
use corio::{Builder, Error, join};

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
fn test_join_two_sleepers_returns_pair() {
    let rt = Builder::new().build().unwrap();
    let start = Instant::now();

    let values = rt
        .block_on(task::join_all(vec![sleep_then(100, 1), sleep_then(200, 2)]))
        .unwrap();

    let elapsed = start.elapsed();

    assert_eq!(values, vec![1, 2]);
    assert!(elapsed >= Duration::from_millis(200));
    assert!(
        elapsed < Duration::from_millis(280),
        "join should take the longest child, took {elapsed:?}"
    );
}

#[test]
fn test_join_elapsed_is_max_not_sum() {
    let rt = Builder::new().build().unwrap();
    let start = Instant::now();

    let children = (1..=8).map(|i| sleep_then(i * 10, i)).collect();
    let values = rt.block_on(task::join_all(children)).unwrap();

    assert_eq!(values, (1..=8).collect::<Vec<_>>());
    assert!(
        start.elapsed() < Duration::from_millis(200),
        "children must sleep concurrently"
    );
}

#[test]
fn test_join_empty() {
    let rt = Builder::new().build().unwrap();
    let values = rt.block_on(task::join_all(Vec::<Task<u8>>::new())).unwrap();

    assert!(values.is_empty());
}

#[test]
fn test_join_propagates_child_failure_after_all_finish() {
    let rt = Builder::new().build().unwrap();
    let slow_done = Rc::new(Cell::new(false));
    let flag = slow_done.clone();

    let result = rt.block_on(task::join_all(vec![
        Task::new(async move {
            sleep(Duration::from_millis(30)).await;
            flag.set(true);
            Ok(1)
        }),
        Task::new(async { Err(Error::msg("child failed")) }),
    ]));

    assert_eq!(result.unwrap_err().to_string(), "child failed");
    assert!(slow_done.get());
}

#[corio::test]
async fn test_join_macro_mixed_types() -> corio::Result<()> {
    let (num, text, list) = join!(
        async { Ok(100i32) },
        async {
            sleep(Duration::from_millis(5)).await;
            Ok(String::from("test"))
        },
        async { Ok(vec![1, 2, 3]) },
    )?;

    assert_eq!(num, 100);
    assert_eq!(text, "test");
    assert_eq!(list, vec![1, 2, 3]);
    Ok(())
}

#[corio::test]
async fn test_join_macro_single_future() -> corio::Result<()> {
    let value = join!(async { Ok(42) })?;

    assert_eq!(value, 42);
    Ok(())
}

#[corio::test]
async fn test_join_macro_failure() {
    let result = join!(
        async { Ok(1) },
        async { Err::<(), _>(Error::msg("nope")) },
    );

    assert!(result.is_err());
}

#[corio::test]
async fn test_join_nested() -> corio::Result<()> {
    let inner = task::join_all(vec![sleep_then(5, 1), sleep_then(10, 2)]);
    let outer = task::join_all(vec![
        Task::new(async move { Ok(inner.await?.iter().sum::<i32>()) }),
        sleep_then(1, 10),
    ]);

    assert_eq!(outer.await?, vec![3, 10]);
    Ok(())
}

#[test]
fn test_join_child_aborting_itself_fails_the_join() {
    let rt = Builder::new().build().unwrap();

    let result = rt.block_on(task::join_all(vec![
        sleep_then(10, 1),
        Task::new(async {
            if let Some(id) = task::current().await {
                task::abort(id);
            }
            std::future::pending::<()>().await;
            Ok(2)
        }),
    ]));

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(rt.metrics().tasks, 0);
}

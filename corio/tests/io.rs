use corio::io::{self, Interest};
use corio::task::{self, Task};
use corio::time::sleep;
use corio::{Builder, Error};

use std::os::fd::RawFd;
use std::time::Duration;

struct Pipe {
    rx: RawFd,
    tx: RawFd,
}

impl Pipe {
    fn new() -> Self {
        let mut fds = [0; 2];
        corio::sys::cvt(unsafe { libc::pipe(fds.as_mut_ptr()) }).unwrap();

        io::set_nonblocking(fds[0]).unwrap();
        io::set_nonblocking(fds[1]).unwrap();

        Self {
            rx: fds[0],
            tx: fds[1],
        }
    }

    fn close_writer(&mut self) {
        unsafe { libc::close(self.tx) };
        self.tx = -1;
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        for fd in [self.rx, self.tx] {
            if fd >= 0 {
                unsafe { libc::close(fd) };
            }
        }
    }
}

#[corio::test]
async fn test_echo_through_pipe() -> corio::Result<()> {
    let pipe = Pipe::new();
    let (rx, tx) = (pipe.rx, pipe.tx);

    let writer = task::spawn(async move {
        for chunk in [&b"hello "[..], &b"world"[..]] {
            sleep(Duration::from_millis(5)).await;
            io::write_all(tx, chunk).await?;
        }
        Ok(())
    });

    let mut received = Vec::new();
    let mut buffer = [0u8; 64];

    while received.len() < 11 {
        let n = io::read(rx, &mut buffer).await?;
        received.extend_from_slice(&buffer[..n]);
    }

    writer.await?;
    assert_eq!(received, b"hello world");
    Ok(())
}

#[corio::test]
async fn test_read_reports_end_of_stream() -> corio::Result<()> {
    let mut pipe = Pipe::new();
    pipe.close_writer();

    let mut buffer = [0u8; 8];
    assert_eq!(io::read(pipe.rx, &mut buffer).await?, 0);
    Ok(())
}

#[corio::test]
async fn test_writable_pipe_is_ready() -> corio::Result<()> {
    let pipe = Pipe::new();

    io::ready(pipe.tx, Interest::WRITABLE).await?;
    Ok(())
}

#[test]
fn test_lost_readiness_wait_is_deregistered() {
    let rt = Builder::new().build().unwrap();
    let pipe = Pipe::new();
    let rx = pipe.rx;

    let raced = rt
        .block_on(task::race(vec![
            Task::new(async move {
                io::readable(rx).await?;
                Ok("data")
            }),
            Task::new(async {
                sleep(Duration::from_millis(10)).await;
                Ok("timeout")
            }),
        ]))
        .unwrap();

    assert_eq!(raced.value, "timeout");
    assert_eq!(rt.metrics().io, 0);
}

#[test]
fn test_registration_slot_reuse_after_abort() {
    let rt = Builder::new().build().unwrap();
    let pipe = Pipe::new();
    let (rx, tx) = (pipe.rx, pipe.tx);

    let received = rt
        .block_on(async move {
            // A waiter that is abandoned while registered.
            let abandoned = task::spawn(async move {
                io::readable(rx).await?;
                Ok(())
            });
            task::yield_now().await;
            assert_eq!(corio::metrics().map(|m| m.io), Some(1));

            abandoned.abort();
            assert_eq!(corio::metrics().map(|m| m.io), Some(0));

            // An unrelated waiter on the same descriptor must be the one
            // that gets woken.
            let reader = task::spawn(async move {
                let mut buffer = [0u8; 4];
                let n = io::read(rx, &mut buffer).await?;
                Ok(buffer[..n].to_vec())
            });
            task::yield_now().await;

            io::write_all(tx, b"ok").await?;
            reader.await
        })
        .unwrap();

    assert_eq!(received, b"ok");
}

#[corio::test]
async fn test_double_deregister_is_harmless() -> corio::Result<()> {
    let pipe = Pipe::new();
    let rx = pipe.rx;

    let waiter = task::spawn(async move {
        io::readable(rx).await?;
        Ok(())
    });
    task::yield_now().await;

    // Explicit removal, then teardown of the waiter's own registration.
    assert!(io::deregister(rx)?);
    assert!(!io::deregister(rx)?);
    assert!(waiter.abort());

    assert!(matches!(waiter.await, Err(Error::Cancelled)));
    Ok(())
}

#[corio::test]
async fn test_displaced_waiter_is_woken() -> corio::Result<()> {
    let pipe = Pipe::new();
    let rx = pipe.rx;

    let first = task::spawn(async move {
        io::readable(rx).await?;
        Ok("first woke")
    });
    task::yield_now().await;

    let second = task::spawn(async move {
        io::readable(rx).await?;
        Ok("second woke")
    });
    task::yield_now().await;

    // Registering the second waiter displaced the first one.
    assert_eq!(first.await?, "first woke");
    assert!(second.abort());
    Ok(())
}

#[corio::test]
async fn test_one_wait_covers_both_directions() -> corio::Result<()> {
    let pipe = Pipe::new();

    // The write end of an empty pipe is writable only; a combined wait
    // still resolves, and leaves nothing registered behind.
    io::ready(pipe.tx, Interest::BOTH).await?;
    assert_eq!(corio::metrics().map(|m| m.io), Some(0));
    Ok(())
}

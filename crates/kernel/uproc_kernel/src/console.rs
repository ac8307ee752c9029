//! Console streams shared by every process.

use std::{
    collections::VecDeque,
    io::{self, Write as _},
};

use crate::sync::{SleepLock, SleepLockCondVar};

#[derive(Default)]
struct InputQueue {
    bytes: VecDeque<u8>,
    closed: bool,
}

pub struct Console {
    input: SleepLock<InputQueue>,
    input_ready: SleepLockCondVar,
    output: SleepLock<Vec<u8>>,
    echo: bool,
}

impl Console {
    #[must_use]
    pub fn new(echo: bool) -> Self {
        Self {
            input: SleepLock::new(InputQueue::default()),
            input_ready: SleepLockCondVar::new(),
            output: SleepLock::new(Vec::new()),
            echo,
        }
    }

    /// Queues bytes for console readers.
    pub fn push_input(&self, bytes: &[u8]) {
        let mut input = self.input.lock();
        input.bytes.extend(bytes);
        drop(input);
        self.input_ready.notify();
    }

    /// Marks the end of console input.
    ///
    /// Blocked and future readers get 0 bytes once the queue is drained.
    pub fn close_input(&self) {
        self.input.lock().closed = true;
        self.input_ready.notify();
    }

    /// Reads queued input into `buf`.
    ///
    /// Sleeps until at least one byte is queued or input is closed, then
    /// returns whatever is queued, up to `buf.len()` bytes.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        let mut input = self.input.lock();
        while input.bytes.is_empty() && !input.closed {
            input = self.input_ready.wait(input);
        }
        let n = usize::min(buf.len(), input.bytes.len());
        for (dst, src) in buf.iter_mut().zip(input.bytes.drain(..n)) {
            *dst = src;
        }
        n
    }

    /// Writes to the console. Always accepts the whole buffer.
    pub fn write(&self, bytes: &[u8]) -> usize {
        log::trace!("console: \"{}\"", bytes.escape_ascii());
        self.output.lock().extend_from_slice(bytes);
        if self.echo {
            let mut stdout = io::stdout().lock();
            let _ = stdout.write_all(bytes);
            let _ = stdout.flush();
        }
        bytes.len()
    }

    /// Drains the output written so far.
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut *self.output.lock())
    }
}

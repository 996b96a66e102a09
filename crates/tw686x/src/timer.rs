// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{
    lock,
    watchdog::{Scheduler, TimerTask},
    Device,
};
use std::{
    io,
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use tw686x_sys::RegisterIo;

enum Message {
    Schedule(TimerTask, Duration),
    Shutdown,
}

/// Create a scheduler handle for [`DeviceBuilder::with_scheduler`] and the
/// worker that will run its timers once the device exists.
///
/// ```
/// use std::sync::Arc;
/// use tw686x::{sim::SimulatedHardware, timer, Device};
///
/// let hw = Arc::new(SimulatedHardware::new());
/// let (handle, worker) = timer::channel();
/// let device = Arc::new(
///     Device::builder(hw.clone())
///         .with_allocator(hw.clone())
///         .with_scheduler(handle)
///         .build()?,
/// );
/// let timers = worker.spawn(device.clone())?;
/// timers.shutdown();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// [`DeviceBuilder::with_scheduler`]: crate::DeviceBuilder::with_scheduler
pub fn channel() -> (Arc<TimerHandle>, TimerWorker) {
    let (sender, receiver) = mpsc::channel();
    (
        Arc::new(TimerHandle {
            sender: Mutex::new(sender.clone()),
        }),
        TimerWorker { sender, receiver },
    )
}

/// [`Scheduler`] that forwards deadlines to a [`TimerThread`].
#[derive(Debug)]
pub struct TimerHandle {
    sender: Mutex<Sender<Message>>,
}

impl Scheduler for TimerHandle {
    fn schedule(&self, task: TimerTask, delay: Duration) {
        if lock(&self.sender)
            .send(Message::Schedule(task, delay))
            .is_err()
        {
            log::debug!("timer thread gone, {} not armed", task);
        }
    }
}

/// Receiving half of [`channel`], not yet running.
pub struct TimerWorker {
    sender: Sender<Message>,
    receiver: Receiver<Message>,
}

impl TimerWorker {
    /// Start the timer thread for `device`.
    pub fn spawn<R: RegisterIo + 'static>(self, device: Arc<Device<R>>) -> io::Result<TimerThread> {
        let receiver = self.receiver;
        let handle = thread::Builder::new()
            .name("tw686x-timer".to_owned())
            .spawn(move || run(&device, &receiver))?;
        Ok(TimerThread {
            sender: self.sender,
            handle: Some(handle),
        })
    }
}

/// A running timer thread. Stops on [`shutdown`](TimerThread::shutdown)
/// or drop.
pub struct TimerThread {
    sender: Sender<Message>,
    handle: Option<JoinHandle<()>>,
}

impl TimerThread {
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.sender.send(Message::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("timer thread panicked");
            }
        }
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<R: RegisterIo>(device: &Device<R>, receiver: &Receiver<Message>) {
    let mut deadlines: [Option<Instant>; 2] = [None; 2];
    loop {
        let now = Instant::now();
        for task in TimerTask::ALL {
            if deadlines[task.index()].map_or(false, |at| at <= now) {
                deadlines[task.index()] = None;
                device.run_timer(task);
            }
        }

        let message = match deadlines.iter().flatten().min() {
            Some(at) => receiver.recv_timeout(at.saturating_duration_since(Instant::now())),
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match message {
            Ok(Message::Schedule(task, delay)) => {
                deadlines[task.index()] = Some(Instant::now() + delay);
            }
            Ok(Message::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
    log::debug!("timer thread exiting");
}

//! The polling loop

use std::time::Duration;

use super::changes::{Cycle, Pass};
use super::{Event, Monitor, MonitorError, StopHandle};
use crate::graph::Graph;

/// Endless event stream returned by [`Monitor::start`]
///
/// Each `next()` call either yields an event from the current cycle or
/// sleeps and runs the next one. The stream ends when the monitor is
/// stopped or no units are left. An error ends the stream after it has
/// been yielded once.
pub struct Watch<'m> {
    monitor: &'m mut Monitor,
    interval: Duration,
    refresh_factor: u32,
    ticks: u64,
    cycle: Option<Cycle>,
    done: bool,
}

impl<'m> Watch<'m> {
    pub(super) fn new(monitor: &'m mut Monitor, interval: Duration, refresh_factor: u32) -> Self {
        Self {
            monitor,
            interval,
            refresh_factor,
            ticks: 0,
            cycle: None,
            done: false,
        }
    }

    /// Graph state as of the last yielded event
    pub fn graph(&self) -> &Graph {
        &self.monitor.graph
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.monitor.stop_handle()
    }

    pub fn stop(&self) {
        self.monitor.stop();
    }

    /// Number of cycles run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn finish(&mut self) {
        if let Some(mut cycle) = self.cycle.take() {
            cycle.finish(self.monitor);
        }
        if !self.done {
            tracing::info!(ticks = self.ticks, "Monitor stopped");
        }
        self.done = true;
        self.monitor.running.stop();
    }
}

impl Iterator for Watch<'_> {
    type Item = Result<Event, MonitorError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if !self.monitor.is_running() {
                self.finish();
                return None;
            }

            if let Some(cycle) = self.cycle.as_mut() {
                if let Some(event) = cycle.next(self.monitor) {
                    return Some(Ok(event));
                }
                cycle.finish(self.monitor);
                self.cycle = None;
            }

            if self.monitor.graph.is_empty() {
                tracing::info!("No modules left to monitor");
                self.finish();
                return None;
            }

            std::thread::sleep(self.interval);
            if !self.monitor.is_running() {
                self.finish();
                return None;
            }

            self.ticks += 1;
            let pass = if self.ticks % u64::from(self.refresh_factor) == 0 {
                Pass::Refresh
            } else {
                Pass::Monitor
            };
            match Cycle::begin(self.monitor, pass) {
                Ok(cycle) => self.cycle = Some(cycle),
                Err(e) => {
                    tracing::error!(error = %e, "Monitoring failed");
                    self.finish();
                    return Some(Err(e));
                }
            }
        }
    }
}

impl std::iter::FusedIterator for Watch<'_> {}

impl Drop for Watch<'_> {
    fn drop(&mut self) {
        if let Some(mut cycle) = self.cycle.take() {
            cycle.finish(self.monitor);
        }
        self.monitor.running.stop();
    }
}

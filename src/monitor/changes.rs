//! One poll cycle as a pull-based event stream

use std::collections::VecDeque;

use super::{Event, EventKind, Monitor, MonitorError};
use crate::graph::{Graph, UnitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pass {
    /// Known units only
    Monitor,
    /// Known units, then discovery
    Refresh,
}

/// State of one poll cycle, detached from the monitor it runs against.
///
/// Event order: modified units, removed units, then (refresh only) new
/// units. A removed unit stays in the graph until the event after its
/// `Removed` event is requested, or the cycle is finished.
#[derive(Debug)]
pub(crate) struct Cycle {
    pass: Pass,
    modified: VecDeque<Event>,
    vanished: VecDeque<UnitId>,
    pending_detach: Option<UnitId>,
    discovered: bool,
    created: VecDeque<Event>,
}

impl Cycle {
    /// Scan known units. Modifications are applied to the graph here.
    pub(crate) fn begin(monitor: &mut Monitor, pass: Pass) -> Result<Self, MonitorError> {
        let _span = match pass {
            Pass::Monitor => tracing::info_span!("monitor"),
            Pass::Refresh => tracing::info_span!("refresh"),
        }
        .entered();

        let (modified, vanished) = monitor.scan()?;
        tracing::debug!(
            modified = modified.len(),
            vanished = vanished.len(),
            "Scanned known modules"
        );
        Ok(Self {
            pass,
            modified: modified.into(),
            vanished: vanished.into(),
            pending_detach: None,
            discovered: false,
            created: VecDeque::new(),
        })
    }

    pub(crate) fn next(&mut self, monitor: &mut Monitor) -> Option<Event> {
        self.apply_detach(monitor);

        if let Some(event) = self.modified.pop_front() {
            return Some(event);
        }

        while let Some(id) = self.vanished.pop_front() {
            let Some(unit) = monitor.graph.unit(id) else {
                continue;
            };
            let event = Event::new(EventKind::Removed, unit, None);
            self.pending_detach = Some(id);
            return Some(event);
        }

        if self.pass == Pass::Refresh && !self.discovered {
            self.discovered = true;
            let _span = tracing::info_span!("discover").entered();
            self.created = monitor.discover().into();
        }

        self.created.pop_front()
    }

    /// Apply the removal whose event was already handed out
    pub(crate) fn finish(&mut self, monitor: &mut Monitor) {
        self.apply_detach(monitor);
    }

    /// Run the rest of the cycle, discarding events
    pub(crate) fn drain(&mut self, monitor: &mut Monitor) {
        while self.next(monitor).is_some() {}
    }

    fn apply_detach(&mut self, monitor: &mut Monitor) {
        if let Some(id) = self.pending_detach.take() {
            monitor.detach(id);
        }
    }
}

/// Events of a single [`Monitor::monitor`] or [`Monitor::refresh`] pass
///
/// Borrowing the monitor for the lifetime of the stream keeps the graph
/// consistent with the events seen so far. Dropping the stream early
/// applies a removal already yielded; anything not yet yielded is picked
/// up again by the next pass.
pub struct Changes<'m> {
    monitor: &'m mut Monitor,
    cycle: Cycle,
}

impl<'m> Changes<'m> {
    pub(crate) fn new(monitor: &'m mut Monitor, cycle: Cycle) -> Self {
        Self { monitor, cycle }
    }

    /// Graph state as of the last yielded event
    pub fn graph(&self) -> &Graph {
        &self.monitor.graph
    }
}

impl Iterator for Changes<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        self.cycle.next(self.monitor)
    }
}

impl Drop for Changes<'_> {
    fn drop(&mut self) {
        self.cycle.finish(self.monitor);
    }
}

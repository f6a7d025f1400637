//! Handler dispatch on top of the watch loop
//!
//! An [`Application`] owns a [`Monitor`] plus an ordered list of
//! [`Handler`]s. Every event is offered to each handler in install order
//! together with a read-only view of the graph and a per-event context.
//! Handler failures are logged and never end the loop.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::graph::Graph;
use crate::monitor::{Event, Monitor, MonitorError, StopHandle};

/// Per-event variables shared between handlers
pub type Context = BTreeMap<String, String>;

/// Deferred work a handler asks to run right after it returns
pub type Thunk = Box<dyn FnOnce() -> anyhow::Result<()>>;

pub type HandlerError = anyhow::Error;

pub type HandlerResult = Result<Option<Thunk>, HandlerError>;

/// What a handler sees of the monitor while handling an event
pub struct MonitorHandle<'a> {
    pub graph: &'a Graph,
    stop: StopHandle,
}

impl<'a> MonitorHandle<'a> {
    pub fn new(graph: &'a Graph, stop: StopHandle) -> Self {
        Self { graph, stop }
    }

    /// End the watch loop before the next event
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }
}

pub trait Handler {
    fn invoke(
        &mut self,
        event: &Event,
        monitor: &MonitorHandle<'_>,
        context: &mut Context,
    ) -> HandlerResult;

    /// Name used in logs
    fn name(&self) -> &str {
        "handler"
    }
}

impl<F> Handler for F
where
    F: FnMut(&Event, &MonitorHandle<'_>, &mut Context) -> HandlerResult,
{
    fn invoke(
        &mut self,
        event: &Event,
        monitor: &MonitorHandle<'_>,
        context: &mut Context,
    ) -> HandlerResult {
        self(event, monitor, context)
    }
}

pub struct Application {
    monitor: Monitor,
    handlers: Vec<Box<dyn Handler>>,
    variables: Context,
}

impl Application {
    pub fn new(monitor: Monitor) -> Self {
        Self {
            monitor,
            handlers: Vec::new(),
            variables: Context::new(),
        }
    }

    pub fn install(&mut self, handler: impl Handler + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Install a closure handler
    pub fn install_fn<F>(&mut self, f: F)
    where
        F: FnMut(&Event, &MonitorHandle<'_>, &mut Context) -> HandlerResult + 'static,
    {
        self.install(f);
    }

    /// Variable copied into every event's context
    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut Monitor {
        &mut self.monitor
    }

    /// Run the watch loop, dispatching every event, until it stops.
    ///
    /// Returns the number of events dispatched.
    pub fn run(&mut self, interval: Duration, refresh_factor: u32) -> Result<usize, MonitorError> {
        let Self {
            monitor,
            handlers,
            variables,
        } = self;

        let mut watch = monitor.start(interval, refresh_factor)?;
        let mut count = 0;
        while let Some(event) = watch.next() {
            let event = event?;
            let handle = MonitorHandle::new(watch.graph(), watch.stop_handle());
            dispatch(handlers, variables, &event, &handle);
            count += 1;
        }
        Ok(count)
    }
}

/// Offer one event to every handler, in order.
///
/// Each event gets a fresh copy of `variables` as its context; handlers see
/// what earlier handlers wrote into it.
pub fn dispatch(
    handlers: &mut [Box<dyn Handler>],
    variables: &Context,
    event: &Event,
    monitor: &MonitorHandle<'_>,
) -> Context {
    let _span = tracing::debug_span!("dispatch", kind = %event.kind, name = %event.name).entered();
    let mut context = variables.clone();

    for handler in handlers.iter_mut() {
        match handler.invoke(event, monitor, &mut context) {
            Ok(Some(thunk)) => {
                if let Err(e) = thunk() {
                    tracing::warn!(handler = handler.name(), error = %e, "Handler task failed");
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(handler = handler.name(), error = %e, "Handler failed");
            }
        }
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::UnitId;
    use crate::monitor::EventKind;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    fn event() -> Event {
        Event {
            kind: EventKind::Modified,
            unit: UnitId(0),
            name: "pkg.a".into(),
            path: PathBuf::from("/src/pkg/a.py"),
            warning: None,
        }
    }

    fn boxed<F>(f: F) -> Box<dyn Handler>
    where
        F: FnMut(&Event, &MonitorHandle<'_>, &mut Context) -> HandlerResult + 'static,
    {
        Box::new(f)
    }

    #[test]
    fn test_handlers_run_in_order_and_share_context() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (l1, l2) = (log.clone(), log.clone());
        let mut handlers = vec![
            boxed(move |e, _, ctx| {
                l1.borrow_mut().push(format!("first {}", e.name));
                ctx.insert("seen".into(), "yes".into());
                Ok(None)
            }),
            boxed(move |_, _, ctx| {
                l2.borrow_mut().push(format!("second {}", ctx["seen"]));
                Ok(None)
            }),
        ];

        let graph = Graph::new();
        let mut vars = Context::new();
        vars.insert("project".into(), "demo".into());
        let handle = MonitorHandle::new(&graph, StopHandle::default());
        let ctx = dispatch(&mut handlers, &vars, &event(), &handle);

        assert_eq!(*log.borrow(), ["first pkg.a", "second yes"]);
        assert_eq!(ctx["project"], "demo");
        // Variables are copied, never written back
        assert!(!vars.contains_key("seen"));
    }

    #[test]
    fn test_failures_do_not_stop_dispatch() {
        let ran = Rc::new(RefCell::new(0));
        let (r1, r2) = (ran.clone(), ran.clone());
        let mut handlers = vec![
            boxed(|_, _, _| anyhow::bail!("boom")),
            boxed(move |_, _, _| {
                let r = r1.clone();
                Ok(Some(Box::new(move || -> anyhow::Result<()> {
                    *r.borrow_mut() += 1;
                    anyhow::bail!("thunk failed")
                }) as Thunk))
            }),
            boxed(move |_, _, _| {
                *r2.borrow_mut() += 10;
                Ok(None)
            }),
        ];

        let graph = Graph::new();
        let handle = MonitorHandle::new(&graph, StopHandle::default());
        dispatch(&mut handlers, &Context::new(), &event(), &handle);
        assert_eq!(*ran.borrow(), 11);
    }

    #[test]
    fn test_handler_can_stop_monitor() {
        let stop = StopHandle::default();
        stop.start();
        let mut handlers = vec![boxed(|_, m, _| {
            m.stop();
            Ok(None)
        })];
        let graph = Graph::new();
        let handle = MonitorHandle::new(&graph, stop.clone());
        dispatch(&mut handlers, &Context::new(), &event(), &handle);
        assert!(!stop.is_running());
    }
}

//! Lifecycle events emitted by an execution engine and their dispatch table.
//!
//! Subscribers register for the event kinds they care about. Dispatch is
//! synchronous and in registration order; the first subscriber error aborts
//! dispatch and is returned to the engine, which must stop the unit.

use std::rc::Rc;

use anyhow::Result;

use crate::core::scope::{Scope, Test};
use crate::core::types::Outcome;

#[derive(Debug, Clone, Copy)]
pub enum LifecycleEvent<'a> {
    BeforeGroup(&'a Rc<Scope>),
    AfterGroup(&'a Rc<Scope>),
    BeforeTest(&'a Test),
    AfterTestResult(&'a Test, &'a Outcome),
    AfterTest(&'a Test),
}

impl LifecycleEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            LifecycleEvent::BeforeGroup(_) => EventKind::BeforeGroup,
            LifecycleEvent::AfterGroup(_) => EventKind::AfterGroup,
            LifecycleEvent::BeforeTest(_) => EventKind::BeforeTest,
            LifecycleEvent::AfterTestResult(..) => EventKind::AfterTestResult,
            LifecycleEvent::AfterTest(_) => EventKind::AfterTest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BeforeGroup,
    AfterGroup,
    BeforeTest,
    AfterTestResult,
    AfterTest,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::BeforeGroup,
        EventKind::AfterGroup,
        EventKind::BeforeTest,
        EventKind::AfterTestResult,
        EventKind::AfterTest,
    ];

    fn slot(self) -> usize {
        match self {
            EventKind::BeforeGroup => 0,
            EventKind::AfterGroup => 1,
            EventKind::BeforeTest => 2,
            EventKind::AfterTestResult => 3,
            EventKind::AfterTest => 4,
        }
    }
}

pub trait Subscriber {
    fn on_event(&mut self, event: &LifecycleEvent<'_>) -> Result<()>;
}

/// Per-kind subscriber table for one unit run.
#[derive(Default)]
pub struct EventBus<'s> {
    subscribers: Vec<&'s mut dyn Subscriber>,
    table: [Vec<usize>; EventKind::ALL.len()],
}

impl<'s> EventBus<'s> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber` for each kind in `kinds`.
    pub fn subscribe(&mut self, kinds: &[EventKind], subscriber: &'s mut dyn Subscriber) {
        let index = self.subscribers.len();
        self.subscribers.push(subscriber);
        for kind in kinds {
            let slot = &mut self.table[kind.slot()];
            if !slot.contains(&index) {
                slot.push(index);
            }
        }
    }

    pub fn dispatch(&mut self, event: LifecycleEvent<'_>) -> Result<()> {
        for &index in &self.table[event.kind().slot()] {
            self.subscribers[index].on_event(&event)?;
        }
        Ok(())
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.table[kind.slot()].len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scope::ScopeId;
    use anyhow::anyhow;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<EventKind>,
    }

    impl Subscriber for Recorder {
        fn on_event(&mut self, event: &LifecycleEvent<'_>) -> Result<()> {
            self.seen.push(event.kind());
            Ok(())
        }
    }

    struct Failing;

    impl Subscriber for Failing {
        fn on_event(&mut self, _event: &LifecycleEvent<'_>) -> Result<()> {
            Err(anyhow!("sink closed"))
        }
    }

    #[test]
    fn dispatches_only_subscribed_kinds() {
        let mut all = Recorder::default();
        let mut tests_only = Recorder::default();
        let group = Scope::group(ScopeId(1), "g", None, None);
        let test = Test::new(ScopeId(2), "t", Some(&group));
        {
            let mut bus = EventBus::new();
            bus.subscribe(&EventKind::ALL, &mut all);
            bus.subscribe(&[EventKind::BeforeTest, EventKind::AfterTest], &mut tests_only);
            assert_eq!(bus.subscriber_count(EventKind::BeforeTest), 2);
            assert_eq!(bus.subscriber_count(EventKind::AfterGroup), 1);

            bus.dispatch(LifecycleEvent::BeforeGroup(&group)).expect("dispatch");
            bus.dispatch(LifecycleEvent::BeforeTest(&test)).expect("dispatch");
            bus.dispatch(LifecycleEvent::AfterTestResult(&test, &Outcome::Passed))
                .expect("dispatch");
            bus.dispatch(LifecycleEvent::AfterTest(&test)).expect("dispatch");
            bus.dispatch(LifecycleEvent::AfterGroup(&group)).expect("dispatch");
        }
        assert_eq!(all.seen.len(), 5);
        assert_eq!(tests_only.seen, vec![EventKind::BeforeTest, EventKind::AfterTest]);
    }

    #[test]
    fn subscriber_error_stops_dispatch() {
        let mut failing = Failing;
        let mut later = Recorder::default();
        let group = Scope::group(ScopeId(1), "g", None, None);
        {
            let mut bus = EventBus::new();
            bus.subscribe(&EventKind::ALL, &mut failing);
            bus.subscribe(&EventKind::ALL, &mut later);
            let err = bus
                .dispatch(LifecycleEvent::BeforeGroup(&group))
                .expect_err("should fail");
            assert!(err.to_string().contains("sink closed"));
        }
        assert!(later.seen.is_empty());
    }
}

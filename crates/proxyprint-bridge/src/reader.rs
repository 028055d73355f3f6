// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process card reader event hub.
//
// Each reader address gets a FIFO of undelivered events and a `Notify`.
// Reporting an event enqueues it and wakes one waiter; if nobody is waiting
// the `Notify` keeps a permit, so an event reported between a waiter's queue
// check and its `notified().await` is never lost.
//
// `Void` is the exception: it only releases the tasks waiting at the moment
// it is reported.  It is never queued, so a later wait cannot pick up a
// stale cancellation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, warn};

use proxyprint_core::card::CardNumberFormat;
use proxyprint_core::types::ReaderEvent;

use crate::traits::ReaderEventSource;

#[derive(Default)]
struct SlotState {
    queue: VecDeque<ReaderEvent>,
    /// Bumped by every `Void`.
    voids: u64,
}

#[derive(Default)]
struct ReaderSlot {
    state: Mutex<SlotState>,
    notify: Notify,
}

impl ReaderSlot {
    fn state(&self) -> MutexGuard<'_, SlotState> {
        lock(&self.state)
    }
}

/// Routes reader events to the tasks waiting on each reader address.
#[derive(Default)]
pub struct ReaderEventHub {
    slots: Mutex<HashMap<String, Arc<ReaderSlot>>>,
}

impl ReaderEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, reader: &str) -> Arc<ReaderSlot> {
        Arc::clone(lock(&self.slots).entry(reader.to_string()).or_default())
    }

    /// Number of undelivered events queued at `reader`.
    pub fn pending_events(&self, reader: &str) -> usize {
        lock(&self.slots)
            .get(reader)
            .map(|slot| slot.state().queue.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ReaderEventSource for ReaderEventHub {
    async fn wait_for_event(
        &self,
        reader: &str,
        format: CardNumberFormat,
        timeout: Duration,
    ) -> Option<ReaderEvent> {
        let slot = self.slot(reader);
        let deadline = tokio::time::Instant::now() + timeout;
        let voids = slot.state().voids;
        loop {
            let notified = slot.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = slot.state();
                if state.voids != voids {
                    return Some(ReaderEvent::Void);
                }
                if let Some(event) = state.queue.pop_front() {
                    return Some(apply_format(event, format));
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                debug!(reader, "no reader event before timeout");
                return None;
            }
        }
    }

    fn report_event(&self, reader: &str, event: ReaderEvent) {
        debug!(reader, ?event, "reader event reported");
        let slot = self.slot(reader);
        if event == ReaderEvent::Void {
            slot.state().voids += 1;
            slot.notify.notify_waiters();
            return;
        }
        slot.state().queue.push_back(event);
        slot.notify.notify_one();
    }
}

/// Re-render the card number of a swipe in the requested format.
fn apply_format(event: ReaderEvent, format: CardNumberFormat) -> ReaderEvent {
    match event {
        ReaderEvent::CardSwiped { card_number } => match format.normalize(&card_number) {
            Ok(card_number) => ReaderEvent::CardSwiped { card_number },
            Err(e) => {
                warn!("unreadable card: {e}");
                ReaderEvent::Other("unreadable card".into())
            }
        },
        other => other,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

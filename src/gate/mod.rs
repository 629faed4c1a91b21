//! Event gates: link graph, bounded queues and dispatch workers.
//!
//! Internal modules:
//! - [`handle`]: [`EventGate`] handle, posting and listener API, builder;
//! - [`links`]: symmetric partner lists with ordered two-sided locking;
//! - [`dispatch`]: the per-gate [`Dispatcher`] worker loop;
//! - [`stats`]: per-gate drop/delivery counters.

mod dispatch;
mod handle;
mod links;
mod stats;

pub use dispatch::Dispatcher;
pub use handle::{DEFAULT_QUEUE_CAPACITY, EventGate, GateBuilder, WeakGate};
pub use stats::StatsSnapshot;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{Notify, mpsc};
    use tokio::time::timeout;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::diagnostics::{Bus, DiagnosticKind};
    use crate::error::GateError;
    use crate::events::{AddItem, Event};
    use crate::listeners::{Listener, Mutation};

    fn item(uid: &str) -> Event {
        Event::new(AddItem::new(uid))
    }

    /// Forwards the uid of every `AddItem` it receives.
    struct Recorder {
        tx: mpsc::UnboundedSender<String>,
    }

    impl Recorder {
        fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (Arc::new(Self { tx }), rx)
        }
    }

    #[async_trait]
    impl Listener for Recorder {
        async fn on_add_item(&self, _ev: &Event, req: &AddItem) {
            let _ = self.tx.send(req.source_item_uid.clone());
        }
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("delivery timed out")
            .expect("recorder dropped")
    }

    async fn nothing_more(rx: &mut mpsc::UnboundedReceiver<String>) {
        assert!(
            timeout(Duration::from_millis(100), rx.recv()).await.is_err(),
            "unexpected delivery"
        );
    }

    #[test]
    fn link_is_symmetric_and_idempotent() {
        let a = EventGate::new("a");
        let b = EventGate::new("b");

        assert!(a.link(&b).unwrap());
        assert!(a.is_linked_to(&b) && b.is_linked_to(&a));
        assert!(!b.link(&a).unwrap());
        assert_eq!(a.partner_count(), 1);
        assert_eq!(b.partner_count(), 1);

        assert!(b.unlink(&a));
        assert!(!a.is_linked_to(&b) && !b.is_linked_to(&a));
        assert!(!a.unlink(&b));
    }

    #[test]
    fn self_link_is_rejected() {
        let a = EventGate::new("a");
        let err = a.link(&a.clone()).unwrap_err();
        assert!(matches!(err, GateError::SelfLink { .. }));
        assert_eq!(a.partner_count(), 0);
    }

    #[test]
    fn unlink_all_clears_both_sides() {
        let a = EventGate::new("a");
        let b = EventGate::new("b");
        let c = EventGate::new("c");
        a.link(&b).unwrap();
        a.link(&c).unwrap();
        b.link(&c).unwrap();

        assert_eq!(a.unlink_all(), 2);
        assert_eq!(a.partner_count(), 0);
        assert_eq!(b.partners(), vec![c.clone()]);
        assert_eq!(c.partners(), vec![b.clone()]);
    }

    #[test]
    fn dropped_gate_leaves_the_graph() {
        let a = EventGate::new("a");
        {
            let b = EventGate::new("b");
            a.link(&b).unwrap();
            assert_eq!(a.partner_count(), 1);
        }
        assert_eq!(a.partner_count(), 0);
        assert!(a.partners().is_empty());
    }

    #[test]
    fn concurrent_link_unlink_stays_symmetric() {
        let gates: Vec<EventGate> = (0..4).map(|i| EventGate::new(format!("g{i}"))).collect();

        std::thread::scope(|s| {
            for t in 0..4usize {
                let gates = &gates;
                s.spawn(move || {
                    for round in 0..500usize {
                        let a = &gates[(t + round) % 4];
                        let b = &gates[(t + round * 3 + 1) % 4];
                        if a == b {
                            continue;
                        }
                        if round % 3 == 0 {
                            a.unlink(b);
                        } else if round % 7 == 0 {
                            a.unlink_all();
                        } else {
                            let _ = b.link(a);
                        }
                    }
                });
            }
        });

        for a in &gates {
            for b in &gates {
                assert_eq!(a.is_linked_to(b), b.is_linked_to(a), "{a:?} / {b:?}");
            }
        }
    }

    #[tokio::test]
    async fn post_fans_out_to_partners_only() {
        let a = EventGate::new("a");
        let b = EventGate::new("b");
        let c = EventGate::new("c");
        a.link(&b).unwrap();
        a.link(&c).unwrap();

        let _wa = a.dispatcher().unwrap();
        let _wb = b.dispatcher().unwrap();
        let _wc = c.dispatcher().unwrap();

        a.post(item("x"));

        assert_eq!(a.stats().accepted, 0);
        assert_eq!(b.stats().accepted, 1);
        assert_eq!(c.stats().accepted, 1);
    }

    #[tokio::test]
    async fn partners_do_not_reforward() {
        let a = EventGate::new("a");
        let b = EventGate::new("b");
        let c = EventGate::new("c");
        a.link(&b).unwrap();
        b.link(&c).unwrap();
        let _wb = b.dispatcher().unwrap();
        let _wc = c.dispatcher().unwrap();

        a.post(item("x"));

        assert_eq!(b.stats().accepted, 1);
        assert_eq!(c.stats().accepted, 0);
    }

    #[tokio::test]
    async fn full_queue_drops_newest_without_blocking() {
        let gate = EventGate::builder("small").capacity(3).build();
        let (rec, mut rx) = Recorder::new();
        gate.add_listener(rec);

        let worker = gate.dispatcher().unwrap();
        for i in 0..4 {
            gate.post_local(item(&i.to_string()));
        }
        let stats = gate.stats();
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.dropped_full, 1);

        let token = CancellationToken::new();
        let handle = tokio::spawn(worker.run(token.clone()));

        assert_eq!(next(&mut rx).await, "0");
        assert_eq!(next(&mut rx).await, "1");
        assert_eq!(next(&mut rx).await, "2");
        nothing_more(&mut rx).await;

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn events_posted_while_idle_are_never_delivered() {
        let gate = EventGate::new("idle");
        let (rec, mut rx) = Recorder::new();
        gate.add_listener(rec);

        gate.post_local(item("early"));
        assert_eq!(gate.stats().dropped_idle, 1);

        let token = CancellationToken::new();
        let handle = gate.start(token.clone()).unwrap();
        gate.post_local(item("late"));

        assert_eq!(next(&mut rx).await, "late");
        nothing_more(&mut rx).await;

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn delivery_preserves_arrival_order_for_every_listener() {
        let gate = EventGate::new("ordered");
        let (first, mut rx1) = Recorder::new();
        let (second, mut rx2) = Recorder::new();
        gate.add_listener(first);
        gate.add_listener(second);

        let token = CancellationToken::new();
        let handle = gate.start(token.clone()).unwrap();
        for uid in ["e1", "e2", "e3"] {
            gate.post_local(item(uid));
        }

        for rx in [&mut rx1, &mut rx2] {
            assert_eq!(next(rx).await, "e1");
            assert_eq!(next(rx).await, "e2");
            assert_eq!(next(rx).await, "e3");
        }

        token.cancel();
        handle.await.unwrap();
        assert_eq!(gate.stats().delivered, 3);
    }

    #[tokio::test]
    async fn post_batch_keeps_order_at_each_partner() {
        let src = EventGate::new("src");
        let dst = EventGate::new("dst");
        src.link(&dst).unwrap();
        let (rec, mut rx) = Recorder::new();
        dst.add_listener(rec);

        let token = CancellationToken::new();
        let handle = dst.start(token.clone()).unwrap();
        src.post_batch(vec![item("b1"), item("b2"), item("b3")]);

        assert_eq!(next(&mut rx).await, "b1");
        assert_eq!(next(&mut rx).await, "b2");
        assert_eq!(next(&mut rx).await, "b3");

        token.cancel();
        handle.await.unwrap();
    }

    /// Removes itself from its gate after the first event.
    struct OneShot {
        gate: WeakGate,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Listener for OneShot {
        async fn on_add_item(&self, _ev: &Event, _req: &AddItem) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = self.gate.upgrade() {
                assert_eq!(gate.remove_listener(self), Mutation::Staged);
            }
        }
    }

    #[tokio::test]
    async fn listener_can_remove_itself_during_delivery() {
        let gate = EventGate::new("reentrant");
        let one_shot = Arc::new(OneShot {
            gate: gate.downgrade(),
            calls: AtomicUsize::new(0),
        });
        let (rec, mut rx) = Recorder::new();
        gate.add_listener(one_shot.clone());
        gate.add_listener(rec);

        let token = CancellationToken::new();
        let handle = gate.start(token.clone()).unwrap();
        gate.post_local(item("e1"));
        gate.post_local(item("e2"));

        assert_eq!(next(&mut rx).await, "e1");
        assert_eq!(next(&mut rx).await, "e2");
        assert_eq!(one_shot.calls.load(Ordering::SeqCst), 1);
        assert_eq!(gate.listener_count(), 1);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn weak_listener_handle_does_not_keep_the_gate_alive() {
        let partner = EventGate::new("partner");
        let gate = EventGate::new("short-lived");
        gate.link(&partner).unwrap();
        let one_shot = Arc::new(OneShot {
            gate: gate.downgrade(),
            calls: AtomicUsize::new(0),
        });
        gate.add_listener(one_shot.clone());

        let token = CancellationToken::new();
        let handle = gate.start(token.clone()).unwrap();
        token.cancel();
        handle.await.unwrap();

        let weak = gate.downgrade();
        drop(gate);
        assert!(weak.upgrade().is_none());
        assert_eq!(partner.partner_count(), 0);
    }

    /// Registers a second-stage listener when primed by the first event.
    struct Primer {
        gate: WeakGate,
        next_stage: Arc<Recorder>,
    }

    #[async_trait]
    impl Listener for Primer {
        async fn on_add_item(&self, _ev: &Event, _req: &AddItem) {
            if let Some(gate) = self.gate.upgrade() {
                gate.add_listener(self.next_stage.clone());
            }
        }
    }

    #[tokio::test]
    async fn listener_added_during_delivery_sees_next_event_only() {
        let gate = EventGate::new("priming");
        let (stage2, mut rx) = Recorder::new();
        gate.add_listener(Arc::new(Primer {
            gate: gate.downgrade(),
            next_stage: stage2,
        }));

        let token = CancellationToken::new();
        let handle = gate.start(token.clone()).unwrap();
        gate.post_local(item("first"));
        gate.post_local(item("second"));

        assert_eq!(next(&mut rx).await, "second");
        assert_eq!(gate.listener_count(), 2);

        token.cancel();
        handle.await.unwrap();
    }

    /// Signals that delivery reached it, then waits until released.
    struct Gatekeeper {
        reached: mpsc::UnboundedSender<()>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Listener for Gatekeeper {
        async fn on_add_item(&self, _ev: &Event, _req: &AddItem) {
            let _ = self.reached.send(());
            self.release.notified().await;
        }
    }

    #[tokio::test]
    async fn cancellation_mid_delivery_skips_remaining_listeners() {
        let gate = EventGate::new("interrupted");
        let (reached_tx, mut reached) = mpsc::unbounded_channel();
        gate.add_listener(Arc::new(Gatekeeper {
            reached: reached_tx,
            release: Arc::new(Notify::new()),
        }));
        let (second, mut second_rx) = Recorder::new();
        gate.add_listener(second);

        let token = CancellationToken::new();
        let handle = gate.start(token.clone()).unwrap();
        gate.post_local(item("halted"));
        timeout(Duration::from_secs(2), reached.recv())
            .await
            .unwrap()
            .unwrap();

        let (late, _late_rx) = Recorder::new();
        assert_eq!(gate.add_listener(late), Mutation::Staged);

        token.cancel();
        handle.await.unwrap();

        nothing_more(&mut second_rx).await;
        assert_eq!(gate.stats().delivered, 0);
        assert_eq!(gate.listener_count(), 3);
        assert!(!gate.is_running());
    }

    struct Panicker;

    #[async_trait]
    impl Listener for Panicker {
        async fn on_add_item(&self, _ev: &Event, req: &AddItem) {
            panic!("cannot handle {}", req.source_item_uid);
        }
    }

    #[tokio::test]
    async fn panicking_listener_does_not_stop_delivery() {
        let bus = Bus::new(16);
        let mut diags = bus.subscribe();
        let gate = EventGate::builder("faulty").diagnostics(bus).build();
        let (rec, mut rx) = Recorder::new();
        gate.add_listener(Arc::new(Panicker));
        gate.add_listener(rec);

        let token = CancellationToken::new();
        let handle = gate.start(token.clone()).unwrap();
        gate.post_local(item("p1"));
        gate.post_local(item("p2"));

        assert_eq!(next(&mut rx).await, "p1");
        assert_eq!(next(&mut rx).await, "p2");
        assert_eq!(gate.stats().listener_panics, 2);

        let mut reasons = Vec::new();
        while let Ok(d) = diags.try_recv() {
            if d.kind == DiagnosticKind::ListenerPanicked {
                assert_eq!(d.gate.as_deref(), Some("faulty"));
                reasons.extend(d.reason.as_deref().map(str::to_owned));
            }
        }
        assert_eq!(reasons, ["cannot handle p1", "cannot handle p2"]);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn overflow_is_reported_on_the_bus() {
        let bus = Bus::new(16);
        let mut diags = bus.subscribe();
        let gate = EventGate::builder("tiny").capacity(1).diagnostics(bus).build();

        let _worker = gate.dispatcher().unwrap();
        gate.post_local(item("kept"));
        gate.post_local(item("lost"));

        let d = diags.recv().await.unwrap();
        assert_eq!(d.kind, DiagnosticKind::QueueOverflow);
        assert_eq!(d.gate.as_deref(), Some("tiny"));
        assert_eq!(d.event_type.as_deref(), Some(AddItem::TYPE));
    }

    #[tokio::test]
    async fn only_one_dispatcher_per_gate() {
        let gate = EventGate::new("single");
        let worker = gate.dispatcher().unwrap();
        assert!(gate.is_running());
        assert!(matches!(
            gate.dispatcher(),
            Err(GateError::AlreadyRunning { .. })
        ));

        drop(worker);
        assert!(!gate.is_running());
        assert!(gate.dispatcher().is_ok());
    }

    #[tokio::test]
    async fn stopping_discards_pending_events_and_allows_restart() {
        let gate = EventGate::new("restart");
        let (rec, mut rx) = Recorder::new();
        gate.add_listener(rec);

        let worker = gate.dispatcher().unwrap();
        gate.post_local(item("stale-1"));
        gate.post_local(item("stale-2"));
        drop(worker);

        let token = CancellationToken::new();
        let handle = gate.start(token.clone()).unwrap();
        gate.post_local(item("fresh"));
        assert_eq!(next(&mut rx).await, "fresh");

        token.cancel();
        handle.await.unwrap();
        assert!(!gate.is_running());

        let token = CancellationToken::new();
        let handle = gate.start(token.clone()).unwrap();
        gate.post_local(item("again"));
        assert_eq!(next(&mut rx).await, "again");
        token.cancel();
        handle.await.unwrap();
    }
}

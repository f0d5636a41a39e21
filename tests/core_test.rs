use std::sync::Arc;

use stream_chat::core::{
    accept, BroadcastBus, BusEvent, Identity, ModerationCache, PresenceTracker, RoomRegistry, Topic,
};
use stream_chat::error::ChatError;
use stream_chat::protocol::message::ChatFrame;
use stream_chat::sweeper::reconcile_once;
use stream_chat::trace::TraceHub;
use stream_chat::upstream::{MemoryUpstream, TenantContext, Timeout};
use stream_chat::utils::current_timestamp;

fn tenant() -> TenantContext {
    TenantContext::new("public")
}

fn text_of(event: &BusEvent) -> String {
    match event {
        BusEvent::Chat(frame) => frame.message.clone(),
        other => panic!("unexpected event: {:?}", other),
    }
}

// ----------------------------------------------------------------------------
// [RoomRegistry]
// ----------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_join_creates_single_room() {
    let mem = Arc::new(MemoryUpstream::new());
    let registry = Arc::new(RoomRegistry::new(mem));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.join(&tenant(), "brand-new").await })
        })
        .collect();

    let mut rooms = Vec::new();
    for h in handles {
        rooms.push(h.await.unwrap().expect("generic room join must succeed"));
    }

    assert_eq!(registry.count(), 1);
    assert!(rooms.iter().all(|r| Arc::ptr_eq(r, &rooms[0])), "모든 커넥션이 같은 룸 객체를 봐야 합니다.");
}

#[tokio::test]
async fn test_missing_stream_room_is_never_created() {
    let mem = Arc::new(MemoryUpstream::new());
    let registry = RoomRegistry::new(mem);

    let result = registry.join(&tenant(), "stream_XYZ").await;
    assert!(matches!(result, Err(ChatError::RoomNotFound(_))));
    assert!(registry.get("stream_XYZ").is_none());
    assert_eq!(registry.count(), 0);
}

#[tokio::test]
async fn test_churned_generic_rooms_do_not_accumulate() {
    let mem = Arc::new(MemoryUpstream::new());
    let registry = RoomRegistry::new(mem);

    for n in 0..1000u64 {
        let room = registry.join(&tenant(), &format!("room-{}", n)).await.unwrap();
        room.add_member(n);
        registry.leave(&room, n, |_| {});
    }

    assert_eq!(registry.count(), 0);
}

#[tokio::test]
async fn test_chat_toggle_blocks_new_joins_only() {
    let mem = Arc::new(MemoryUpstream::new());
    mem.add_stream("42", true, true);
    let registry = RoomRegistry::new(mem);

    let room = registry.join(&tenant(), "stream_42").await.unwrap();
    room.add_member(1);

    assert!(registry.force_deactivate("stream_42"));
    assert!(matches!(registry.join(&tenant(), "stream_42").await, Err(ChatError::RoomInactive(_))));
    assert_eq!(registry.snapshot("stream_42").unwrap().member_count, 1);

    assert!(!registry.reactivate("stream_42"));
    assert!(registry.join(&tenant(), "stream_42").await.is_ok());
}

// ----------------------------------------------------------------------------
// [BroadcastBus]
// ----------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_subscriber_sees_same_order_under_concurrent_publishers() {
    let bus = Arc::new(BroadcastBus::new(1024));
    let topic = Topic::Room("lobby".into());

    let mut subs: Vec<_> = (0..3).map(|_| bus.subscribe(&topic)).collect();

    let publishers: Vec<_> = (0..2)
        .map(|p| {
            let bus = Arc::clone(&bus);
            let topic = topic.clone();
            tokio::spawn(async move {
                for n in 0..100 {
                    bus.publish(&topic, BusEvent::Chat(ChatFrame::system(format!("{}-{}", p, n))));
                    if n % 10 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        })
        .collect();
    for p in publishers {
        p.await.unwrap();
    }

    let mut sequences = Vec::new();
    for sub in &mut subs {
        let mut seen = Vec::new();
        for _ in 0..200 {
            seen.push(text_of(&sub.recv().await.unwrap()));
        }
        sequences.push(seen);
    }

    assert!(sequences.iter().all(|s| s == &sequences[0]));

    // 같은 발행자의 메시지는 발행 순서 유지
    for p in 0..2 {
        let prefix = format!("{}-", p);
        let own: Vec<&String> = sequences[0].iter().filter(|m| m.starts_with(&prefix)).collect();
        let expected: Vec<String> = (0..100).map(|n| format!("{}-{}", p, n)).collect();
        assert_eq!(own, expected.iter().collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn test_rooms_do_not_leak_into_each_other() {
    let bus = BroadcastBus::new(16);
    let mut a = bus.subscribe(&Topic::Room("stream_1".into()));
    let mut b = bus.subscribe(&Topic::Room("stream_2".into()));

    bus.publish(&Topic::Room("stream_2".into()), BusEvent::Chat(ChatFrame::system("for two")));
    bus.publish(&Topic::Room("stream_1".into()), BusEvent::Chat(ChatFrame::system("for one")));

    assert_eq!(text_of(&a.recv().await.unwrap()), "for one");
    assert_eq!(text_of(&b.recv().await.unwrap()), "for two");
}

// ----------------------------------------------------------------------------
// [PresenceTracker]
// ----------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_presence_peak_never_exceeds_real_membership() {
    let mem = Arc::new(MemoryUpstream::new());
    mem.add_stream("42", true, true);
    let registry = Arc::new(RoomRegistry::new(mem.clone()));
    let presence = Arc::new(PresenceTracker::new(Arc::new(BroadcastBus::new(64))));
    let trace_hub = TraceHub::new();
    let room = registry.join(&tenant(), "stream_42").await.unwrap();

    let reconciler = {
        let (registry, presence, mem, trace_hub) =
            (Arc::clone(&registry), Arc::clone(&presence), mem.clone(), Arc::clone(&trace_hub));
        tokio::spawn(async move {
            for _ in 0..200 {
                reconcile_once(&registry, &presence, mem.as_ref(), &trace_hub, &tenant()).await;
                tokio::task::yield_now().await;
            }
        })
    };

    let joins: Vec<_> = (0..20u64)
        .map(|conn_id| {
            let (room, presence) = (Arc::clone(&room), Arc::clone(&presence));
            tokio::spawn(async move {
                room.add_member_with(conn_id, |n| {
                    presence.joined("42", n);
                });
            })
        })
        .collect();
    for j in joins {
        j.await.unwrap();
    }
    reconciler.await.unwrap();

    assert_eq!(presence.snapshot("42").live, 20);
    assert_eq!(presence.snapshot("42").peak, 20);

    let mut last_peak = presence.snapshot("42").peak;
    for conn_id in 0..15u64 {
        registry.leave(&room, conn_id, |n| {
            presence.left("42", n);
        });
        let peak = presence.snapshot("42").peak;
        assert!(peak >= last_peak);
        last_peak = peak;
    }
    assert_eq!(presence.snapshot("42").live, 5);
    assert_eq!(presence.snapshot("42").peak, 20);
}

// ----------------------------------------------------------------------------
// [Filter + ModerationCache]
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_refreshed_snapshot_drives_filter() {
    let mem = Arc::new(MemoryUpstream::new());
    mem.add_banned_word("spam");
    let now = current_timestamp();
    mem.add_timeout(Timeout {
        target_id:  "2".into(),
        issued_by:  "1".into(),
        expires_at: now + 60_000,
        is_active:  true,
    });

    let cache = ModerationCache::new(mem.clone());
    cache.refresh(&tenant()).await.unwrap();
    let snapshot = cache.load();

    let alice = Identity::authenticated("1", "alice");
    let bob   = Identity::authenticated("2", "bob");

    assert!(matches!(accept(&alice, "buy SPAM here", &snapshot, now), Err(ChatError::BannedContent)));
    assert!(matches!(accept(&bob, "hello", &snapshot, now), Err(ChatError::Timeout)));
    assert_eq!(accept(&bob, "hello", &snapshot, now + 60_001).unwrap(), "hello");
    assert_eq!(accept(&alice, "  hello    world ", &snapshot, now).unwrap(), "hello world");
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_snapshot() {
    let mem = Arc::new(MemoryUpstream::new());
    mem.add_banned_word("spam");
    let cache = ModerationCache::new(mem.clone());
    cache.refresh(&tenant()).await.unwrap();

    mem.set_unavailable(true);
    assert!(cache.refresh(&tenant()).await.is_err());
    assert_eq!(cache.load().banned_word_count(), 1);
}

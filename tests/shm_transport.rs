// End-to-end tests of the shared-memory transport. Both peers live in this
// process, which exercises the same named objects two processes would share.

#[cfg(target_os = "linux")]
mod linux_tests {
    use crossbeam_channel::Receiver;
    use duochat::Ring::unlink_channel;
    use duochat::Ring::Buffer::layout::Direction;
    use duochat::Transport::{ChatEvent, ConnectionState, EventSink, ShmTransport, Transport};
    use duochat::{ChatConfig, ChatError, PeerRole};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    /// Channel names are system-wide, so every test gets its own.
    struct TestChannel(String);

    impl TestChannel {
        fn new(tag: &str) -> Self {
            let name = format!("test_{}_{}_{}", tag, std::process::id(), fastrand::u32(..));
            Self(name)
        }
    }

    impl Drop for TestChannel {
        fn drop(&mut self) {
            let _ = unlink_channel(&self.0);
        }
    }

    fn peer(channel: &TestChannel, role: PeerRole) -> (ShmTransport, Receiver<ChatEvent>) {
        let (sink, rx) = EventSink::channel();
        (ShmTransport::new(channel.0.clone(), role, sink), rx)
    }

    fn next_received(rx: &Receiver<ChatEvent>) -> (String, String) {
        loop {
            match rx.recv_timeout(WAIT).expect("no message arrived") {
                ChatEvent::MessageReceived { text, sender } => return (text, sender),
                _ => continue,
            }
        }
    }

    #[test]
    fn two_peers_exchange_messages() {
        let channel = TestChannel::new("demo");
        let (a, a_rx) = peer(&channel, PeerRole::A);
        let (b, b_rx) = peer(&channel, PeerRole::B);
        a.start().unwrap();
        b.start().unwrap();

        a.send("hi").unwrap();
        assert_eq!(next_received(&b_rx), ("hi".to_string(), "Peer A".to_string()));

        b.send("yo").unwrap();
        assert_eq!(next_received(&a_rx), ("yo".to_string(), "Peer B".to_string()));

        a.stop();
        b.stop();
    }

    #[test]
    fn start_reports_running_and_stop_reports_offline() {
        let channel = TestChannel::new("status");
        let (a, rx) = peer(&channel, PeerRole::A);
        assert_eq!(a.state(), ConnectionState::Offline);

        a.start().unwrap();
        assert_eq!(a.state(), ConnectionState::Running);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), ChatEvent::StatusChanged(ConnectionState::Running));

        a.stop();
        assert_eq!(a.state(), ConnectionState::Offline);
        let statuses: Vec<_> = rx
            .try_iter()
            .filter(|e| matches!(e, ChatEvent::StatusChanged(_)))
            .collect();
        assert_eq!(statuses, vec![ChatEvent::StatusChanged(ConnectionState::Offline)]);
    }

    #[test]
    fn second_start_is_rejected() {
        let channel = TestChannel::new("twice");
        let (a, rx) = peer(&channel, PeerRole::A);
        a.start().unwrap();
        assert!(matches!(a.start(), Err(ChatError::AlreadyRunning)));
        assert!(rx.try_iter().any(|e| e == ChatEvent::Log("Already running.".into())));
        a.stop();
    }

    #[test]
    fn send_while_offline_is_not_connected() {
        let channel = TestChannel::new("offline");
        let (a, rx) = peer(&channel, PeerRole::A);
        assert!(matches!(a.send("lost"), Err(ChatError::NotConnected)));
        assert_eq!(rx.try_recv().unwrap(), ChatEvent::Log("Not connected.".into()));

        a.start().unwrap();
        a.stop();
        assert!(matches!(a.send("lost"), Err(ChatError::NotConnected)));
    }

    #[test]
    fn stop_is_idempotent_and_safe_before_start() {
        let channel = TestChannel::new("stop");
        let (a, rx) = peer(&channel, PeerRole::B);
        a.stop();
        a.stop();
        assert!(rx.try_recv().is_err());

        a.start().unwrap();
        a.stop();
        a.stop();
        assert_eq!(a.state(), ConnectionState::Offline);
    }

    #[test]
    fn long_text_arrives_truncated() {
        let channel = TestChannel::new("long");
        let (a, a_rx) = peer(&channel, PeerRole::A);
        let (b, b_rx) = peer(&channel, PeerRole::B);
        a.start().unwrap();
        b.start().unwrap();

        let long = "z".repeat(300);
        a.send(&long).unwrap();
        let (text, _) = next_received(&b_rx);
        assert_eq!(text, "z".repeat(239));

        let echoed = a_rx.try_iter().find_map(|e| match e {
            ChatEvent::MessageSent { text, sender } => Some((text, sender)),
            _ => None,
        });
        assert_eq!(echoed, Some(("z".repeat(239), "Peer A".to_string())));
    }

    #[test]
    fn empty_send_is_a_no_op() {
        let channel = TestChannel::new("empty");
        let (a, _a_rx) = peer(&channel, PeerRole::A);
        a.start().unwrap();
        a.send("").unwrap();
        assert_eq!(a.head(Direction::AtoB), Some(0));
    }

    #[test]
    fn heads_survive_restart_cycles() {
        let channel = TestChannel::new("heads");
        let (a, _a_rx) = peer(&channel, PeerRole::A);
        let (b, _b_rx) = peer(&channel, PeerRole::B);
        b.start().unwrap();

        let mut last = 0;
        for round in 0..3 {
            a.start().unwrap();
            for i in 0..5 {
                a.send(&format!("round {} msg {}", round, i)).unwrap();
            }
            let head = a.head(Direction::AtoB).unwrap();
            assert!(head >= last + 5);
            last = head;
            a.stop();
        }
        assert_eq!(last, 15);
        b.stop();
    }

    #[test]
    fn message_sent_before_peer_starts_is_read_later() {
        let channel = TestChannel::new("late");
        let (a, _a_rx) = peer(&channel, PeerRole::A);
        a.start().unwrap();
        a.send("early").unwrap();

        let (b, b_rx) = peer(&channel, PeerRole::B);
        b.start().unwrap();
        assert_eq!(next_received(&b_rx).0, "early");
    }

    #[test]
    fn restart_does_not_deliver_phantom_message() {
        let channel = TestChannel::new("phantom");
        let (b, b_rx) = peer(&channel, PeerRole::B);
        b.start().unwrap();
        b.stop();
        b.start().unwrap();

        std::thread::sleep(Duration::from_millis(500));
        assert!(!b_rx
            .try_iter()
            .any(|e| matches!(e, ChatEvent::MessageReceived { .. })));
        b.stop();
    }

    #[test]
    fn session_facade_runs_shared_memory() {
        let channel = TestChannel::new("facade");
        let a = duochat::start(ChatConfig::shared_memory(channel.0.clone(), PeerRole::A)).unwrap();
        let b = duochat::start(ChatConfig::shared_memory(channel.0.clone(), PeerRole::B)).unwrap();

        duochat::send(&a, "via handle").unwrap();
        assert_eq!(next_received(b.events()).0, "via handle");

        duochat::stop(&a);
        duochat::stop(&b);
        assert_eq!(a.state(), ConnectionState::Offline);
    }

    #[test]
    fn builder_pairs_talk_without_transport() {
        use duochat::Ring::ChannelBuilder;

        let channel = TestChannel::new("builder");
        let a = ChannelBuilder::new().with_channel(channel.0.clone()).with_peer(PeerRole::A).build().unwrap();
        let mut b = ChannelBuilder::new().with_channel(channel.0.clone()).with_peer(PeerRole::B).build().unwrap();
        assert!(a.mapping.is_creator());
        assert!(!b.mapping.is_creator());
        assert_eq!(a.names.segment, format!("/ShmChat_{}_map", channel.0));

        assert!(b.consumer.receive_timeout(Duration::from_millis(10)).unwrap().is_none());
        assert_eq!(a.producer.send("direct").unwrap(), 1);
        let msg = b.consumer.receive_timeout(WAIT).unwrap().unwrap();
        assert_eq!(msg.text(), "direct");
        assert_eq!(b.consumer.local_tail(), 1);
        assert_eq!(b.consumer.sender_label(), "Peer A");
    }

    #[test]
    fn concurrent_senders_keep_head_and_slots_in_step() {
        use duochat::Ring::Buffer::RING_CAPACITY;
        use duochat::Ring::ChannelBuilder;
        use std::collections::HashSet;

        const THREADS: usize = 4;
        const PER_THREAD: usize = 16;
        assert!(THREADS * PER_THREAD <= RING_CAPACITY);

        let channel = TestChannel::new("concurrent");
        let a = ChannelBuilder::new().with_channel(channel.0.clone()).with_peer(PeerRole::A).build().unwrap();
        let b = ChannelBuilder::new().with_channel(channel.0.clone()).with_peer(PeerRole::B).build().unwrap();

        std::thread::scope(|s| {
            for t in 0..THREADS {
                let producer = &a.producer;
                s.spawn(move || {
                    for i in 0..PER_THREAD {
                        producer.send(&format!("t{}-m{}", t, i)).unwrap();
                    }
                });
            }
        });

        let total = THREADS * PER_THREAD;
        assert_eq!(a.mapping.head(Direction::AtoB), total as i32);
        assert_eq!(b.consumer.signal().value().unwrap(), total as i32);

        let stored: Vec<String> = (0..total)
            .map(|slot| b.consumer.ring().peek_slot(slot).unwrap().text())
            .collect();
        let unique: HashSet<String> = stored.into_iter().collect();
        assert_eq!(unique.len(), total);
        for t in 0..THREADS {
            for i in 0..PER_THREAD {
                assert!(unique.contains(&format!("t{}-m{}", t, i)));
            }
        }
    }

    #[test]
    fn invalid_channel_is_rejected_before_start() {
        let err = duochat::start(ChatConfig::shared_memory("bad/name", PeerRole::A)).unwrap_err();
        assert!(matches!(err, ChatError::InvalidConfig(_)));
    }
}

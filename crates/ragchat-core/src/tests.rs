#[cfg(test)]
mod tests {
    use crate::conversation::{ConversationController, SubmitOutcome};
    use crate::event_bus::EventBus;
    use crate::ports::*;
    use crate::registry::SessionRegistry;
    use ragchat_types::event::{ChatEvent, ExchangeState};
    use ragchat_types::message::*;
    use ragchat_types::session::{PageRequest, Session};
    use ragchat_types::{ChatError, ErrorKind};

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use futures::executor::block_on;
    use std::cell::{Cell, RefCell};
    use std::future::Future;
    use std::pin::Pin;
    use std::rc::Rc;
    use std::task::{Context, Poll};

    // ─── Mock Store ──────────────────────────────────────────

    /// Minimal store: a clock that ticks one second per write, plus
    /// switches to make reads or writes fail.
    struct MockStore {
        sessions: RefCell<Vec<Session>>,
        messages: RefCell<Vec<Message>>,
        clock: Cell<i64>,
        next_id: Cell<u32>,
        fail_reads: Cell<bool>,
        fail_writes: Cell<bool>,
        fail_sender: Cell<Option<Sender>>,
        append_calls: Cell<usize>,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                sessions: RefCell::new(Vec::new()),
                messages: RefCell::new(Vec::new()),
                clock: Cell::new(1_700_000_000),
                next_id: Cell::new(0),
                fail_reads: Cell::new(false),
                fail_writes: Cell::new(false),
                fail_sender: Cell::new(None),
                append_calls: Cell::new(0),
            }
        }

        fn tick(&self) -> DateTime<Utc> {
            self.clock.set(self.clock.get() + 1);
            Utc.timestamp_opt(self.clock.get(), 0).unwrap()
        }

        fn id(&self, prefix: &str) -> String {
            self.next_id.set(self.next_id.get() + 1);
            format!("{}{:03}", prefix, self.next_id.get())
        }

        fn check_write(&self) -> ragchat_types::Result<()> {
            if self.fail_writes.get() {
                return Err(ChatError::Network("connection refused".to_string()));
            }
            Ok(())
        }

        fn update(&self, id: &str, f: impl FnOnce(&mut Session)) -> ragchat_types::Result<Session> {
            self.check_write()?;
            let now = self.tick();
            let mut sessions = self.sessions.borrow_mut();
            let session = sessions
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| ChatError::NotFound(format!("Session not found: {}", id)))?;
            f(session);
            session.updated_at = now;
            Ok(session.clone())
        }

        fn seed_message(&self, session_id: &str, sender: Sender, content: &str, at: DateTime<Utc>, id: &str) {
            self.messages.borrow_mut().push(Message {
                id: id.to_string(),
                session_id: session_id.to_string(),
                sender,
                content: content.to_string(),
                user_id: None,
                context: None,
                created_at: at,
            });
        }
    }

    #[async_trait(?Send)]
    impl RemoteStore for MockStore {
        async fn list_sessions(&self, user_id: &str, favorite: Option<bool>) -> ragchat_types::Result<Vec<Session>> {
            if self.fail_reads.get() {
                return Err(ChatError::Http { status: 503, message: "unavailable".to_string() });
            }
            let mut found: Vec<Session> = self
                .sessions
                .borrow()
                .iter()
                .filter(|s| s.user_id == user_id && favorite.map_or(true, |f| s.favorite == f))
                .cloned()
                .collect();
            found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(found)
        }

        async fn create_session(&self, user_id: &str, title: &str) -> ragchat_types::Result<Session> {
            self.check_write()?;
            let now = self.tick();
            let session = Session {
                id: self.id("s"),
                user_id: user_id.to_string(),
                title: title.to_string(),
                favorite: false,
                created_at: now,
                updated_at: now,
            };
            self.sessions.borrow_mut().push(session.clone());
            Ok(session)
        }

        async fn rename_session(&self, session_id: &str, title: &str) -> ragchat_types::Result<Session> {
            self.update(session_id, |s| s.title = title.to_string())
        }

        async fn set_favorite(&self, session_id: &str, favorite: bool) -> ragchat_types::Result<Session> {
            self.update(session_id, |s| s.favorite = favorite)
        }

        async fn delete_session(&self, session_id: &str) -> ragchat_types::Result<()> {
            self.check_write()?;
            self.sessions.borrow_mut().retain(|s| s.id != session_id);
            self.messages.borrow_mut().retain(|m| m.session_id != session_id);
            Ok(())
        }

        async fn list_messages(&self, session_id: &str, page: u32, size: u32) -> ragchat_types::Result<MessagePage> {
            if self.fail_reads.get() {
                return Err(ChatError::Network("timeout".to_string()));
            }
            let all: Vec<Message> = self
                .messages
                .borrow()
                .iter()
                .filter(|m| m.session_id == session_id)
                .cloned()
                .collect();
            let total = all.len() as u64;
            let content: Vec<Message> = all
                .into_iter()
                .skip((page * size) as usize)
                .take(size as usize)
                .collect();
            let total_pages = ((total + size as u64 - 1) / size as u64) as u32;
            Ok(MessagePage {
                content,
                page,
                size,
                total_elements: total,
                total_pages,
                last: page + 1 >= total_pages,
            })
        }

        async fn append_message(&self, session_id: &str, message: NewMessage) -> ragchat_types::Result<Message> {
            self.append_calls.set(self.append_calls.get() + 1);
            self.check_write()?;
            if self.fail_sender.get() == Some(message.sender) {
                return Err(ChatError::Http { status: 500, message: "write rejected".to_string() });
            }
            let saved = Message {
                id: self.id("m"),
                session_id: session_id.to_string(),
                sender: message.sender,
                content: message.content,
                user_id: Some(message.user_id).filter(|_| message.sender == Sender::User),
                context: message.context,
                created_at: self.tick(),
            };
            self.messages.borrow_mut().push(saved.clone());
            Ok(saved)
        }

        fn backend_name(&self) -> &str {
            "mock"
        }
    }

    // ─── Mock Providers ──────────────────────────────────────

    /// Returns a fixed reply and records the history it was given
    struct MockProvider {
        reply: Reply,
        seen: RefCell<Vec<Vec<Message>>>,
    }

    impl MockProvider {
        fn new(content: &str, context: Option<Vec<ContextSnippet>>) -> Self {
            Self {
                reply: Reply { content: content.to_string(), context },
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    #[async_trait(?Send)]
    impl ResponseProvider for MockProvider {
        async fn generate(&self, history: &[Message], _include_context: bool) -> ragchat_types::Result<Reply> {
            self.seen.borrow_mut().push(history.to_vec());
            Ok(self.reply.clone())
        }

        fn provider_name(&self) -> &str {
            "mock"
        }
    }

    struct FailingProvider;

    #[async_trait(?Send)]
    impl ResponseProvider for FailingProvider {
        async fn generate(&self, _history: &[Message], _include_context: bool) -> ragchat_types::Result<Reply> {
            Err(ChatError::Provider("model unavailable".to_string()))
        }

        fn provider_name(&self) -> &str {
            "failing"
        }
    }

    /// Yields to the executor once before replying, so a second future
    /// can run while the first exchange is awaiting its reply.
    struct SlowProvider {
        calls: Cell<usize>,
    }

    struct YieldOnce(bool);

    impl Future for YieldOnce {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                Poll::Ready(())
            } else {
                self.0 = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    #[async_trait(?Send)]
    impl ResponseProvider for SlowProvider {
        async fn generate(&self, history: &[Message], _include_context: bool) -> ragchat_types::Result<Reply> {
            self.calls.set(self.calls.get() + 1);
            YieldOnce(false).await;
            Ok(Reply::text(format!("re: {}", history.last().map(|m| m.content.as_str()).unwrap_or(""))))
        }

        fn provider_name(&self) -> &str {
            "slow"
        }
    }

    fn controller(store: &Rc<MockStore>, provider: Rc<dyn ResponseProvider>, bus: &EventBus) -> ConversationController {
        ConversationController::new(store.clone(), provider, bus.clone())
    }

    fn assert_ordered(messages: &[Message]) {
        for pair in messages.windows(2) {
            assert!(
                pair[0].order_key() <= pair[1].order_key(),
                "{} should not precede {}",
                pair[0].id,
                pair[1].id
            );
        }
    }

    // ─── EventBus Tests ──────────────────────────────────────

    #[test]
    fn test_event_bus_emit_and_drain() {
        let bus = EventBus::new();
        assert!(!bus.has_pending());
        bus.emit(ChatEvent::SessionsLoaded { count: 2 });
        bus.emit(ChatEvent::SessionCreated { session_id: "s1".to_string() });
        assert!(bus.has_pending());

        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ChatEvent::SessionsLoaded { count: 2 });
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn test_event_bus_clone_shares_state() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();
        bus1.emit(ChatEvent::SessionsLoaded { count: 0 });
        assert!(bus2.has_pending());
        assert_eq!(bus2.drain().len(), 1);
        assert!(!bus1.has_pending());
    }

    #[test]
    fn test_event_bus_drain_session_keeps_other_events() {
        let bus = EventBus::new();
        bus.emit(ChatEvent::SessionsLoaded { count: 2 });
        bus.emit(ChatEvent::HistoryLoaded { session_id: "s1".to_string(), count: 3 });
        bus.emit(ChatEvent::SessionUpdated { session_id: "s2".to_string() });
        bus.emit(ChatEvent::Error { session_id: Some("s1".to_string()), message: "boom".to_string() });
        bus.emit(ChatEvent::Error { session_id: None, message: "list failed".to_string() });

        let taken = bus.drain_session("s1");
        assert_eq!(taken.len(), 2);
        assert!(matches!(taken[0], ChatEvent::HistoryLoaded { count: 3, .. }));
        assert!(matches!(taken[1], ChatEvent::Error { .. }));

        assert_eq!(bus.len(), 3);
        let rest = bus.drain();
        assert_eq!(rest[0], ChatEvent::SessionsLoaded { count: 2 });
        assert_eq!(rest[1].session_id(), Some("s2"));
        assert_eq!(rest[2].session_id(), None);
        assert!(bus.is_empty());
    }

    // ─── SessionRegistry Tests ───────────────────────────────

    #[test]
    fn test_registry_create_then_list() {
        let store = Rc::new(MockStore::new());
        let registry = SessionRegistry::new(store.clone(), EventBus::new());

        block_on(async {
            registry.create("alice", "Trip").await.unwrap();
            let listed = registry.list("alice", None).await.unwrap();
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].title, "Trip");
            assert!(!listed[0].favorite);
        });
    }

    #[test]
    fn test_registry_create_inserts_at_head() {
        let store = Rc::new(MockStore::new());
        let registry = SessionRegistry::new(store.clone(), EventBus::new());

        block_on(async {
            let first = registry.create("alice", "First").await.unwrap();
            let second = registry.create("alice", "Second").await.unwrap();
            let ids: Vec<String> = registry.sessions().into_iter().map(|s| s.id).collect();
            assert_eq!(ids, vec![second.id, first.id]);
        });
    }

    #[test]
    fn test_registry_list_replaces_mirror_wholesale() {
        let store = Rc::new(MockStore::new());
        let registry = SessionRegistry::new(store.clone(), EventBus::new());

        block_on(async {
            registry.create("alice", "A").await.unwrap();
            let b = registry.create("alice", "B").await.unwrap();
            registry.set_favorite(&b.id, true).await.unwrap();

            let favorites = registry.list("alice", Some(true)).await.unwrap();
            assert_eq!(favorites.len(), 1);
            assert_eq!(registry.sessions(), favorites);
        });
    }

    #[test]
    fn test_registry_rename_replaces_in_place() {
        let store = Rc::new(MockStore::new());
        let registry = SessionRegistry::new(store.clone(), EventBus::new());

        block_on(async {
            let a = registry.create("alice", "A").await.unwrap();
            let b = registry.create("alice", "B").await.unwrap();
            let c = registry.create("alice", "C").await.unwrap();

            let renamed = registry.rename(&b.id, "Renamed").await.unwrap();
            assert!(renamed.updated_at > b.updated_at);

            let sessions = registry.sessions();
            let ids: Vec<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
            assert_eq!(ids, vec![c.id.as_str(), b.id.as_str(), a.id.as_str()]);
            assert_eq!(sessions[1].title, "Renamed");
            assert_eq!(sessions[1], renamed);
        });
    }

    #[test]
    fn test_registry_update_of_unmirrored_session_is_ignored() {
        let store = Rc::new(MockStore::new());
        let bus = EventBus::new();
        let other = SessionRegistry::new(store.clone(), EventBus::new());
        let registry = SessionRegistry::new(store.clone(), bus.clone());

        block_on(async {
            let foreign = other.create("alice", "Elsewhere").await.unwrap();
            let updated = registry.set_favorite(&foreign.id, true).await.unwrap();
            assert!(updated.favorite);
            assert!(registry.is_empty());
        });
        assert!(!bus
            .drain()
            .iter()
            .any(|e| matches!(e, ChatEvent::SessionUpdated { .. })));
    }

    #[test]
    fn test_registry_favorite_filter_round_trip() {
        let store = Rc::new(MockStore::new());
        let registry = SessionRegistry::new(store.clone(), EventBus::new());

        block_on(async {
            let s1 = registry.create("alice", "Trip").await.unwrap();
            registry.create("alice", "Work").await.unwrap();

            registry.set_favorite(&s1.id, true).await.unwrap();
            let favs = registry.list("alice", Some(true)).await.unwrap();
            assert!(favs.iter().any(|s| s.id == s1.id));

            registry.set_favorite(&s1.id, false).await.unwrap();
            let favs = registry.list("alice", Some(true)).await.unwrap();
            assert!(!favs.iter().any(|s| s.id == s1.id));
        });
    }

    #[test]
    fn test_registry_delete_removes_and_signals() {
        let store = Rc::new(MockStore::new());
        let bus = EventBus::new();
        let registry = SessionRegistry::new(store.clone(), bus.clone());

        block_on(async {
            let a = registry.create("alice", "A").await.unwrap();
            let b = registry.create("alice", "B").await.unwrap();
            let _ = bus.drain();

            registry.delete(&a.id).await.unwrap();
            assert_eq!(registry.len(), 1);
            assert_eq!(registry.get(&b.id).unwrap().title, "B");
            assert!(registry.get(&a.id).is_none());
        });

        let events = bus.drain();
        assert!(events.iter().any(|e| matches!(
            e,
            ChatEvent::SessionDeleted { session_id } if session_id.starts_with('s')
        )));
    }

    #[test]
    fn test_registry_failed_mutations_leave_mirror_untouched() {
        let store = Rc::new(MockStore::new());
        let registry = SessionRegistry::new(store.clone(), EventBus::new());

        block_on(async {
            let a = registry.create("alice", "A").await.unwrap();
            registry.create("alice", "B").await.unwrap();
            let before = registry.sessions();

            store.fail_writes.set(true);
            let err = registry.create("alice", "C").await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Persist);
            assert_eq!(registry.sessions(), before);

            assert!(registry.rename(&a.id, "X").await.is_err());
            assert_eq!(registry.sessions(), before);

            assert!(registry.set_favorite(&a.id, true).await.is_err());
            assert_eq!(registry.sessions(), before);

            assert!(registry.delete(&a.id).await.is_err());
            assert_eq!(registry.sessions(), before);

            store.fail_writes.set(false);
            store.fail_reads.set(true);
            let err = registry.list("alice", None).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Fetch);
            assert_eq!(registry.sessions(), before);
        });
    }

    #[test]
    fn test_registry_rename_of_missing_session_is_persist_error() {
        let store = Rc::new(MockStore::new());
        let registry = SessionRegistry::new(store.clone(), EventBus::new());

        let err = block_on(registry.rename("nope", "Title")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persist);
        assert!(err.to_string().contains("Session not found: nope"));
    }

    #[test]
    fn test_registry_validation_happens_before_store() {
        let store = Rc::new(MockStore::new());
        let registry = SessionRegistry::new(store.clone(), EventBus::new());
        store.fail_writes.set(true);

        block_on(async {
            let err = registry.rename("s1", "   ").await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
            let err = registry.create("", "Trip").await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        });
    }

    // ─── ConversationController Tests ────────────────────────

    #[test]
    fn test_submit_scenario_hello() {
        let store = Rc::new(MockStore::new());
        let bus = EventBus::new();
        let provider = Rc::new(MockProvider::new("hi there", Some(vec![])));
        let ctl = controller(&store, provider, &bus);

        let outcome = block_on(ctl.submit("s1", "alice", "hello")).unwrap();
        assert!(matches!(outcome, SubmitOutcome::Completed { .. }));

        let buf = ctl.messages("s1");
        assert_eq!(buf.len(), 2);
        assert_eq!(buf[0].sender, Sender::User);
        assert_eq!(buf[0].content, "hello");
        assert_eq!(buf[0].user_id.as_deref(), Some("alice"));
        assert_eq!(buf[1].sender, Sender::Assistant);
        assert_eq!(buf[1].content, "hi there");
        assert_eq!(buf[1].context, Some(vec![]));
        assert_eq!(ctl.state("s1"), ExchangeState::Idle);
    }

    #[test]
    fn test_submit_state_transitions() {
        let store = Rc::new(MockStore::new());
        let bus = EventBus::new();
        let ctl = controller(&store, Rc::new(MockProvider::new("ok", None)), &bus);

        block_on(ctl.submit("s1", "alice", "hello")).unwrap();

        let states: Vec<ExchangeState> = bus
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                ChatEvent::ExchangeStateChanged { state, .. } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                ExchangeState::SendingUser,
                ExchangeState::AwaitingReply,
                ExchangeState::PersistingReply,
                ExchangeState::Idle,
            ]
        );
    }

    #[test]
    fn test_submit_rejects_blank_text_without_store_call() {
        let store = Rc::new(MockStore::new());
        let ctl = controller(&store, Rc::new(MockProvider::new("ok", None)), &EventBus::new());

        let err = block_on(ctl.submit("s1", "alice", "   \n\t")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.append_calls.get(), 0);
        assert!(ctl.messages("s1").is_empty());
    }

    #[test]
    fn test_submit_trims_text() {
        let store = Rc::new(MockStore::new());
        let ctl = controller(&store, Rc::new(MockProvider::new("ok", None)), &EventBus::new());

        block_on(ctl.submit("s1", "alice", "  hello  ")).unwrap();
        assert_eq!(ctl.messages("s1")[0].content, "hello");
    }

    #[test]
    fn test_concurrent_submit_on_same_session_runs_once() {
        let store = Rc::new(MockStore::new());
        let provider = Rc::new(SlowProvider { calls: Cell::new(0) });
        let ctl = controller(&store, provider.clone(), &EventBus::new());

        let (first, second) = block_on(async {
            futures::join!(
                ctl.submit("s1", "alice", "first"),
                ctl.submit("s1", "alice", "second")
            )
        });

        assert!(matches!(first.unwrap(), SubmitOutcome::Completed { .. }));
        assert_eq!(second.unwrap(), SubmitOutcome::Busy);
        assert_eq!(provider.calls.get(), 1);

        let buf = ctl.messages("s1");
        let users: Vec<&str> = buf
            .iter()
            .filter(|m| m.sender == Sender::User)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(users, vec!["first"]);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_concurrent_submit_on_different_sessions_both_run() {
        let store = Rc::new(MockStore::new());
        let provider = Rc::new(SlowProvider { calls: Cell::new(0) });
        let ctl = controller(&store, provider.clone(), &EventBus::new());

        let (a, b) = block_on(async {
            futures::join!(
                ctl.submit("s1", "alice", "one"),
                ctl.submit("s2", "alice", "two")
            )
        });

        assert!(matches!(a.unwrap(), SubmitOutcome::Completed { .. }));
        assert!(matches!(b.unwrap(), SubmitOutcome::Completed { .. }));
        assert_eq!(provider.calls.get(), 2);
        assert_eq!(ctl.messages("s1")[1].content, "re: one");
        assert_eq!(ctl.messages("s2")[1].content, "re: two");
    }

    #[test]
    fn test_provider_failure_keeps_user_message_and_returns_to_idle() {
        let store = Rc::new(MockStore::new());
        let bus = EventBus::new();
        let ctl = controller(&store, Rc::new(FailingProvider), &bus);

        let err = block_on(ctl.submit("s1", "alice", "hello")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);

        let buf = ctl.messages("s1");
        assert_eq!(buf.len(), 1);
        assert_eq!(buf[0].sender, Sender::User);
        assert_eq!(ctl.state("s1"), ExchangeState::Idle);

        let events = bus.drain();
        assert!(events.iter().any(|e| matches!(
            e,
            ChatEvent::ExchangeStateChanged { state: ExchangeState::Failed, .. }
        )));
        assert!(events.iter().any(|e| matches!(e, ChatEvent::Error { .. })));
    }

    #[test]
    fn test_submit_after_failure_is_accepted() {
        let store = Rc::new(MockStore::new());
        let ctl = controller(&store, Rc::new(MockProvider::new("fine", None)), &EventBus::new());

        store.fail_sender.set(Some(Sender::Assistant));
        let err = block_on(ctl.submit("s1", "alice", "first")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persist);
        assert_eq!(ctl.messages("s1").len(), 1);

        store.fail_sender.set(None);
        let outcome = block_on(ctl.submit("s1", "alice", "second")).unwrap();
        assert!(matches!(outcome, SubmitOutcome::Completed { .. }));

        let contents: Vec<String> = ctl.messages("s1").into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["first", "second", "fine"]);
    }

    #[test]
    fn test_user_persist_failure_adds_nothing() {
        let store = Rc::new(MockStore::new());
        let provider = Rc::new(MockProvider::new("never", None));
        let ctl = controller(&store, provider.clone(), &EventBus::new());

        store.fail_sender.set(Some(Sender::User));
        let err = block_on(ctl.submit("s1", "alice", "hello")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persist);
        assert!(ctl.messages("s1").is_empty());
        assert!(provider.seen.borrow().is_empty());
        assert_eq!(ctl.state("s1"), ExchangeState::Idle);
    }

    #[test]
    fn test_empty_reply_is_provider_error() {
        let store = Rc::new(MockStore::new());
        let ctl = controller(&store, Rc::new(MockProvider::new("   ", None)), &EventBus::new());

        let err = block_on(ctl.submit("s1", "alice", "hello")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert_eq!(ctl.messages("s1").len(), 1);
        assert_eq!(store.append_calls.get(), 1);
    }

    #[test]
    fn test_prompt_history_excludes_system_and_ends_with_submission() {
        let store = Rc::new(MockStore::new());
        let base = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
        store.seed_message("s1", Sender::System, "session started", base, "h1");
        store.seed_message("s1", Sender::User, "earlier question", base + Duration::seconds(1), "h2");
        store.seed_message("s1", Sender::Assistant, "earlier answer", base + Duration::seconds(2), "h3");

        let provider = Rc::new(MockProvider::new("ok", None));
        let ctl = controller(&store, provider.clone(), &EventBus::new());

        block_on(async {
            ctl.load_history("s1").await.unwrap();
            ctl.submit("s1", "alice", "new question").await.unwrap();
        });

        let seen = provider.seen.borrow();
        let history: Vec<&str> = seen[0].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(history, vec!["earlier question", "earlier answer", "new question"]);
        assert_eq!(ctl.messages("s1").len(), 5);
    }

    #[test]
    fn test_load_history_sorts_and_replaces() {
        let store = Rc::new(MockStore::new());
        let t = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
        store.seed_message("s1", Sender::User, "b", t, "b");
        store.seed_message("s1", Sender::User, "late", t + Duration::seconds(5), "a");
        store.seed_message("s1", Sender::User, "a", t, "a0");
        store.seed_message("s2", Sender::User, "other", t, "x");

        let ctl = controller(&store, Rc::new(MockProvider::new("ok", None)), &EventBus::new());
        let loaded = block_on(ctl.load_history("s1")).unwrap();

        let ids: Vec<&str> = loaded.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a0", "b", "a"]);
        assert_ordered(&ctl.messages("s1"));

        // a second load replaces, it does not merge
        let ctl = ctl.with_history_page(PageRequest::new(1, 2));
        let loaded = block_on(ctl.load_history("s1")).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(ctl.messages("s1").len(), 1);
    }

    #[test]
    fn test_load_history_failure_keeps_buffer() {
        let store = Rc::new(MockStore::new());
        let ctl = controller(&store, Rc::new(MockProvider::new("ok", None)), &EventBus::new());
        block_on(ctl.submit("s1", "alice", "hello")).unwrap();
        let before = ctl.messages("s1");

        store.fail_reads.set(true);
        let err = block_on(ctl.load_history("s1")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fetch);
        assert_eq!(ctl.messages("s1"), before);
    }

    #[test]
    fn test_messages_stay_ordered_across_exchanges() {
        let store = Rc::new(MockStore::new());
        let ctl = controller(&store, Rc::new(MockProvider::new("ok", None)), &EventBus::new());

        block_on(async {
            for text in ["one", "two", "three"] {
                ctl.submit("s1", "alice", text).await.unwrap();
            }
        });
        let buf = ctl.messages("s1");
        assert_eq!(buf.len(), 6);
        assert_ordered(&buf);
    }

    #[test]
    fn test_forget_drops_idle_buffer() {
        let store = Rc::new(MockStore::new());
        let ctl = controller(&store, Rc::new(MockProvider::new("ok", None)), &EventBus::new());
        block_on(ctl.submit("s1", "alice", "hello")).unwrap();

        assert!(ctl.forget("s1"));
        assert!(ctl.messages("s1").is_empty());
        assert!(ctl.forget("unknown"));
    }

    #[test]
    fn test_forget_during_exchange_drops_buffer_when_it_settles() {
        let store = Rc::new(MockStore::new());
        let provider = Rc::new(SlowProvider { calls: Cell::new(0) });
        let ctl = controller(&store, provider, &EventBus::new());

        let (outcome, (forgotten, buffered)) = block_on(async {
            futures::join!(ctl.submit("s1", "alice", "hello"), async {
                (ctl.forget("s1"), ctl.messages("s1").len())
            })
        });

        assert!(matches!(outcome.unwrap(), SubmitOutcome::Completed { .. }));
        assert!(!forgotten);
        assert_eq!(buffered, 1);
        assert!(ctl.messages("s1").is_empty());
        assert_eq!(ctl.state("s1"), ExchangeState::Idle);

        // A later exchange starts from a fresh buffer and is kept
        block_on(ctl.submit("s1", "alice", "again")).unwrap();
        assert_eq!(ctl.messages("s1").len(), 2);
    }

    #[test]
    fn test_unknown_session_state_is_idle() {
        let store = Rc::new(MockStore::new());
        let ctl = controller(&store, Rc::new(MockProvider::new("ok", None)), &EventBus::new());
        assert_eq!(ctl.state("nothing"), ExchangeState::Idle);
        assert!(ctl.messages("nothing").is_empty());
    }
}

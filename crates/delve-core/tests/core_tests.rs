#[cfg(test)]
mod tests {
    use delve_core::*;
    use std::sync::Arc;
    use uuid::Uuid;

    // ── Command tests ──────────────────────────────────────────

    #[test]
    fn test_command_token_format() {
        let cmd = Command::read("R0").with_index(3);
        assert_eq!(cmd.token(), "3.read.R0");
        assert_eq!(Command::explore("abc").with_index(1).to_string(), "1.explore.abc");
    }

    #[test]
    fn test_command_tokens_correlate_by_index() {
        let sent = [
            Command::read("R7").with_index(1),
            Command::explore("R7").with_index(2),
        ];
        let tokens: Vec<String> = sent.iter().map(Command::token).collect();
        for (token, original) in tokens.iter().zip(sent.iter()) {
            let decoded = Command::from_token(token).unwrap();
            assert_eq!(&decoded, original);
        }
        let second = Command::from_token(&tokens[1]).unwrap();
        assert_eq!(second.index(), 2);
        assert_eq!(second.kind(), CommandKind::Explore);
        assert_eq!(second.room_id(), "R7");
    }

    #[test]
    fn test_command_token_room_id_with_dots() {
        let cmd = Command::from_token("4.explore.room.with.dots").unwrap();
        assert_eq!(cmd.index(), 4);
        assert_eq!(cmd.room_id(), "room.with.dots");
    }

    #[test]
    fn test_command_token_rejects_garbage() {
        assert!(matches!(
            Command::from_token("nope"),
            Err(DelveError::CommandToken(_))
        ));
        assert!(matches!(
            Command::from_token("x.read.R0"),
            Err(DelveError::CommandToken(_))
        ));
        assert!(matches!(
            Command::from_token("1.read."),
            Err(DelveError::CommandToken(_))
        ));
        assert!(matches!(
            Command::from_token("1.fly.R0"),
            Err(DelveError::CommandKind(_))
        ));
    }

    #[test]
    fn test_command_kind_serde() {
        let json = serde_json::to_string(&CommandKind::Explore).unwrap();
        assert_eq!(json, "\"explore\"");
        let kind: CommandKind = serde_json::from_str("\"read\"").unwrap();
        assert_eq!(kind, CommandKind::Read);
    }

    // ── Writing tests ──────────────────────────────────────────

    #[test]
    fn test_writing_map_aggregates_by_ascending_order() {
        let mut map = WritingMap::new();
        map.insert(Writing::new("b", 2));
        map.insert(Writing::new("a", 0));
        map.insert(Writing::new("c", 5));
        assert_eq!(map.message(), "abc");

        map.insert(Writing::new("A", 0));
        assert_eq!(map.message(), "Abc");
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_writing_map_skips_sentinel() {
        let mut map = WritingMap::new();
        assert!(!map.insert(Writing::new("ghost", Writing::NO_WRITING)));
        map.insert(Writing::new("x", 1));
        assert!(!map.insert(Writing::new("late ghost", -1)));
        assert_eq!(map.message(), "x");
        assert!(map.get(-1).is_none());
    }

    #[test]
    fn test_writing_map_clear() {
        let mut map = WritingMap::new();
        map.insert(Writing::new("x", 1));
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.message(), "");
    }

    // ── Room tests ─────────────────────────────────────────────

    #[test]
    fn test_room_claims_once() {
        let room = Room::new("R0");
        assert!(room.try_claim_writing());
        assert!(!room.try_claim_writing());
        assert!(room.is_awaiting_writing());

        assert!(room.try_claim_connections());
        assert!(!room.try_claim_connections());
        assert!(room.is_awaiting_connections());
    }

    #[test]
    fn test_room_no_claim_after_result() {
        let room = Room::new("R0");
        assert!(room.try_claim_writing());
        assert!(room.set_writing(Writing::new("", Writing::NO_WRITING)));
        assert!(!room.is_awaiting_writing());
        assert!(room.has_writing());
        assert!(!room.try_claim_writing());
    }

    #[test]
    fn test_room_set_once() {
        let room = Room::new("R0");
        assert!(room.set_writing(Writing::new("first", 1)));
        assert!(!room.set_writing(Writing::new("second", 2)));
        assert_eq!(room.writing().unwrap().text, "first");

        let a = Arc::new(Room::new("A"));
        let b = Arc::new(Room::new("B"));
        assert!(room.set_connections(&[a.clone(), b.clone()]));
        assert!(!room.set_connections(&[b.clone()]));
        let ids: Vec<String> = room
            .connections()
            .unwrap()
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn test_room_release_allows_reclaim() {
        let room = Room::new("R0");
        assert!(room.try_claim_connections());
        room.release(CommandKind::Explore);
        assert!(!room.is_awaiting_connections());
        assert!(room.try_claim_connections());
    }

    #[test]
    fn test_room_connections_drop_with_registry() {
        let room = Room::new("R0");
        {
            let gone = Arc::new(Room::new("gone"));
            room.set_connections(&[gone]);
        }
        assert!(room.has_connections());
        assert!(room.connections().unwrap().is_empty());
    }

    #[test]
    fn test_room_concurrent_claims_single_winner() {
        let room = Arc::new(Room::new("R0"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let room = Arc::clone(&room);
                std::thread::spawn(move || room.try_claim_connections())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    // ── Error tests ────────────────────────────────────────────

    #[test]
    fn test_error_display() {
        let err = DelveError::Request {
            status: 400,
            message: "bad drone".into(),
        };
        let s = err.to_string();
        assert!(s.contains("400"));
        assert!(s.contains("bad drone"));
        assert!(DelveError::Transport("reset".into()).is_transport());
        assert!(!DelveError::NotFound("report".into()).is_transport());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DelveError = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    // ── Event tests ────────────────────────────────────────────

    #[test]
    fn test_event_serde_tagged() {
        let event = SessionEvent::ExplorerFinished {
            session_id: Uuid::nil(),
            drone_id: "D1".into(),
            rooms_processed: 12,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "explorer_finished");
        assert_eq!(json["rooms_processed"], 12);
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.publish(SessionEvent::Cancelled {
            session_id: Uuid::nil(),
        });
        match rx.recv().await.unwrap() {
            SessionEvent::Cancelled { session_id } => assert_eq!(session_id, Uuid::nil()),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_event_bus_without_subscribers() {
        let bus = EventBus::default();
        bus.publish(SessionEvent::Cancelled {
            session_id: Uuid::new_v4(),
        });
    }
}

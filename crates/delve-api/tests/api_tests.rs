#[cfg(test)]
mod tests {
    use delve_api::wire;
    use delve_api::*;
    use delve_core::{Command, CommandKind, DelveError};
    use serde_json::json;

    // ── Wire tests ─────────────────────────────────────────────

    #[test]
    fn test_encode_commands_keys_by_token() {
        let commands = [
            Command::read("R0").with_index(1),
            Command::explore("R0").with_index(2),
        ];
        let body = wire::encode_commands(&commands);
        assert_eq!(
            body,
            json!({
                "1.read.R0": { "read": "R0" },
                "2.explore.R0": { "explore": "R0" },
            })
        );
    }

    #[test]
    fn test_decode_start() {
        let body = json!({ "roomId": "R0", "drones": ["D1", "D2"] });
        let (room, drones) = wire::decode_start(&body).unwrap();
        assert_eq!(room, "R0");
        assert_eq!(drones, vec!["D1", "D2"]);
    }

    #[test]
    fn test_decode_start_missing_field() {
        let err = wire::decode_start(&json!({ "drones": [] })).unwrap_err();
        assert!(matches!(err, DelveError::Decode(_)));
    }

    #[test]
    fn test_decode_commands_sorted_by_index() {
        let body = json!({
            "3.read.R1": { "writing": "", "order": -1 },
            "1.explore.R0": { "connections": ["R1", "R2"] },
            "2.read.R0": { "writing": "hi", "order": 0 },
        });
        let outcomes = wire::decode_commands(&body).unwrap();
        let indices: Vec<u32> = outcomes.iter().map(|o| o.command.index()).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(
            outcomes[0].result,
            CommandResult::Connections {
                rooms: vec!["R1".into(), "R2".into()]
            }
        );
        assert_eq!(outcomes[2].command.room_id(), "R1");
    }

    #[test]
    fn test_decode_commands_error_result() {
        let body = json!({ "1.explore.R9": { "error": "no such room" } });
        let outcomes = wire::decode_commands(&body).unwrap();
        assert_eq!(
            outcomes[0].result,
            CommandResult::Error {
                message: "no such room".into()
            }
        );
        assert_eq!(outcomes[0].command.kind(), CommandKind::Explore);
    }

    #[test]
    fn test_decode_commands_skips_bad_tokens() {
        let body = json!({
            "garbage": { "connections": [] },
            "1.read.R0": { "writing": "a", "order": 2 },
        });
        let outcomes = wire::decode_commands(&body).unwrap();
        assert_eq!(outcomes.len(), 1);
    }

    #[test]
    fn test_decode_commands_wrong_shape_fails() {
        let body = json!({ "1.read.R0": { "connections": [] } });
        assert!(matches!(
            wire::decode_commands(&body),
            Err(DelveError::Decode(_))
        ));
        assert!(wire::decode_commands(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_report_wire() {
        assert_eq!(wire::encode_report("Hi"), json!({ "message": "Hi" }));
        assert_eq!(
            wire::decode_report(&json!({ "response": "ok" })).unwrap(),
            "ok"
        );
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(wire::error_message(r#"{"error":"bad drone"}"#), "bad drone");
        assert_eq!(wire::error_message("  plain text \n"), "plain text");
    }

    // ── HTTP client tests ──────────────────────────────────────

    fn client(server: &mockito::ServerGuard) -> HttpApiClient {
        HttpApiClient::new(server.url(), "ops@example.com", None).unwrap()
    }

    #[tokio::test]
    async fn test_http_start_sends_commander_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/start")
            .match_header("x-commander-email", "ops@example.com")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"roomId":"R0","drones":["D1"]}"#)
            .create_async()
            .await;

        let resp = client(&server).start().await.unwrap();
        assert_eq!(
            resp,
            ApiResponse::Start {
                room_id: "R0".into(),
                drone_ids: vec!["D1".into()]
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_commands_roundtrip() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/drone/D1/commands")
            .match_body(mockito::Matcher::Json(json!({
                "1.explore.R0": { "explore": "R0" },
                "2.read.R0": { "read": "R0" },
            })))
            .with_status(200)
            .with_body(
                r#"{"1.explore.R0":{"connections":["R1"]},"2.read.R0":{"writing":"x","order":4}}"#,
            )
            .create_async()
            .await;

        let commands = [
            Command::explore("R0").with_index(1),
            Command::read("R0").with_index(2),
        ];
        let resp = client(&server).send_commands("D1", &commands).await.unwrap();
        let ApiResponse::Commands { drone_id, outcomes } = resp else {
            panic!("expected commands response");
        };
        assert_eq!(drone_id, "D1");
        assert_eq!(outcomes.len(), 2);
        assert_eq!(
            outcomes[1].result,
            CommandResult::Writing {
                text: "x".into(),
                order: 4
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_report() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/report")
            .match_body(mockito::Matcher::Json(json!({ "message": "Hello" })))
            .with_status(200)
            .with_body(r#"{"response":"Correct"}"#)
            .create_async()
            .await;

        let resp = client(&server).send_report("Hello").await.unwrap();
        assert_eq!(
            resp,
            ApiResponse::Report {
                ack: "Correct".into()
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/drone/D9/commands")
            .with_status(404)
            .create_async()
            .await;

        let resp = client(&server)
            .send_commands("D9", &[Command::read("R0").with_index(1)])
            .await
            .unwrap();
        assert_eq!(resp, ApiResponse::NotFound);
    }

    #[tokio::test]
    async fn test_http_bad_request_carries_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/drone/D1/commands")
            .with_status(400)
            .with_body(r#"{"error":"too many commands"}"#)
            .create_async()
            .await;

        let resp = client(&server)
            .send_commands("D1", &[Command::read("R0").with_index(1)])
            .await
            .unwrap();
        assert_eq!(
            resp,
            ApiResponse::Error {
                status: 400,
                message: "too many commands".into()
            }
        );
    }

    #[tokio::test]
    async fn test_http_malformed_body_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/start")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = client(&server).start().await.unwrap_err();
        assert!(matches!(err, DelveError::Decode(_)));
    }

    #[tokio::test]
    async fn test_http_connection_refused_is_transport_error() {
        let api = HttpApiClient::new("http://127.0.0.1:1", "", None).unwrap();
        let err = api.start().await.unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_http_trims_trailing_slash() {
        let api = HttpApiClient::new("http://localhost:10001/", "", None).unwrap();
        assert_eq!(api.base_url(), "http://localhost:10001");
        assert_eq!(api.name(), "http");
    }

    // ── Mock client tests ──────────────────────────────────────

    #[tokio::test]
    async fn test_mock_records_requests_in_order() {
        let api = MockApiClient::new("R0", ["D1"]);
        api.start().await.unwrap();
        api.execute(&ApiRequest::Commands {
            drone_id: "D1".into(),
            commands: vec![Command::read("R0").with_index(1)],
        })
        .await
        .unwrap();
        api.send_report("done").await.unwrap();

        let labels: Vec<&str> = api.requests.lock().iter().map(ApiRequest::label).collect();
        assert_eq!(labels, vec!["start", "commands", "report"]);
        assert_eq!(api.reports(), vec!["done"]);
        assert_eq!(api.max_batch(), 1);
    }

    #[tokio::test]
    async fn test_mock_transport_failures() {
        let api = MockApiClient::new("R0", ["D1"]).with_transport_failures(1);
        let cmd = [Command::explore("R0").with_index(1)];
        assert!(api.send_commands("D1", &cmd).await.unwrap_err().is_transport());
        assert!(api.send_commands("D1", &cmd).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_report_rejection() {
        let api = MockApiClient::new("R0", ["D1"]).with_report_rejection(400, "wrong message");
        assert_eq!(
            api.send_report("guess").await.unwrap(),
            ApiResponse::Error {
                status: 400,
                message: "wrong message".into()
            }
        );
        assert_eq!(api.reports(), vec!["guess"]);
    }

    #[tokio::test]
    async fn test_mock_unknown_room_is_error_result() {
        let api = MockApiClient::new("R0", ["D1"]);
        let resp = api
            .send_commands("D1", &[Command::explore("R7").with_index(1)])
            .await
            .unwrap();
        let ApiResponse::Commands { outcomes, .. } = resp else {
            panic!("expected commands response");
        };
        assert!(matches!(outcomes[0].result, CommandResult::Error { .. }));
    }

    #[tokio::test]
    async fn test_mock_one_way_edge() {
        let api = MockApiClient::new("R0", ["D1"]).with_edge("R0", "R1");
        let resp = api
            .send_commands(
                "D1",
                &[
                    Command::explore("R0").with_index(1),
                    Command::explore("R1").with_index(2),
                ],
            )
            .await
            .unwrap();
        let ApiResponse::Commands { outcomes, .. } = resp else {
            panic!("expected commands response");
        };
        assert_eq!(
            outcomes[1].result,
            CommandResult::Connections { rooms: vec![] }
        );
    }

    #[tokio::test]
    async fn test_mock_with_room_replaces_room() {
        let api = MockApiClient::new("R0", ["D1"]).with_room(
            "R0",
            MockRoom {
                connections: vec!["R5".into()],
                writing: Some(("w".into(), 2)),
            },
        );
        let resp = api
            .send_commands(
                "D1",
                &[
                    Command::explore("R0").with_index(1),
                    Command::read("R0").with_index(2),
                ],
            )
            .await
            .unwrap();
        let ApiResponse::Commands { outcomes, .. } = resp else {
            panic!("expected commands response");
        };
        assert_eq!(
            outcomes[0].result,
            CommandResult::Connections {
                rooms: vec!["R5".into()]
            }
        );
        assert_eq!(api.expected_message(), "w");
    }
}

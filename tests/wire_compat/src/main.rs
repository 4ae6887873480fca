fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;

    use ferry_protocol::{
        CompleteResponse, ControlReply, ControlRequest, ErrorBody, InitiateResponse, MediaKind,
        PartUrlResponse, UploadSession,
    };
    use ferry_session_store::{FileSessionStore, SessionStore};

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes `fixture` into `T`, re-serializes it and compares the
    /// JSON values (key order is irrelevant).
    fn assert_roundtrip<T>(name: &str, fixture: serde_json::Value) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  rust: {reserialized}"
        );
        parsed
    }

    fn roundtrip_fixture<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        assert_roundtrip(name, load_fixture(name))
    }

    // --- Control-plane requests ---

    #[test]
    fn fixture_initiate_request() {
        let req: ControlRequest = roundtrip_fixture("initiate_request.json");
        match req {
            ControlRequest::Initiate(init) => {
                assert_eq!(init.kind, MediaKind::Video);
                assert_eq!(init.file_size, 23 * 1024 * 1024);
                assert_eq!(init.file_name.as_deref(), Some("IMG_0420.MOV"));
            }
            other => panic!("expected initiate, got {}", other.action()),
        }
    }

    #[test]
    fn fixture_get_part_url_request() {
        let req: ControlRequest = roundtrip_fixture("get_part_url_request.json");
        assert_eq!(req.action(), "getPartUrl");
        let ControlRequest::GetPartUrl(part) = req else {
            panic!("expected getPartUrl");
        };
        assert_eq!(part.part_number, 3);
    }

    #[test]
    fn fixture_complete_request() {
        let req: ControlRequest = roundtrip_fixture("complete_request.json");
        let ControlRequest::Complete(complete) = req else {
            panic!("expected complete");
        };
        let numbers: Vec<u32> = complete.parts.iter().map(|p| p.part_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert!(complete.parts[0].integrity_tag.starts_with('"'));
    }

    #[test]
    fn fixture_abort_request() {
        let req: ControlRequest = roundtrip_fixture("abort_request.json");
        assert_eq!(req.action(), "abort");
    }

    // --- Control-plane replies ---

    #[test]
    fn fixture_initiate_response() {
        let resp: InitiateResponse = roundtrip_fixture("initiate_response.json");
        assert_eq!(resp.object_key, "videos/user-81/7f3c2a.mp4");

        let reply: ControlReply<InitiateResponse> =
            serde_json::from_value(load_fixture("initiate_response.json")).unwrap();
        assert_eq!(reply.into_result().unwrap(), resp);
    }

    #[test]
    fn fixture_part_url_response() {
        let resp: PartUrlResponse = roundtrip_fixture("part_url_response.json");
        assert!(resp.url.contains("partNumber=3"));
    }

    #[test]
    fn fixture_complete_response() {
        let resp: CompleteResponse = roundtrip_fixture("complete_response.json");
        assert_eq!(resp.object_key, "videos/user-81/7f3c2a.mp4");
    }

    #[test]
    fn fixture_error_reply() {
        let body: ErrorBody = roundtrip_fixture("error_reply.json");
        assert!(body.is_unauthorized());

        let reply: ControlReply<PartUrlResponse> =
            serde_json::from_value(load_fixture("error_reply.json")).unwrap();
        assert_eq!(reply.into_result().unwrap_err(), body);
    }

    // --- Persisted session record ---

    #[test]
    fn fixture_session_record() {
        let mut record = load_fixture("session_record.json");
        record
            .as_object_mut()
            .unwrap()
            .remove("recordId")
            .expect("record carries its record id");

        let session: UploadSession = assert_roundtrip("session_record.json", record);
        assert_eq!(session.total_parts, 5);
        assert_eq!(session.completed_part_numbers().into_iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(session.created_at.to_rfc3339(), "2026-03-01T12:00:00+00:00");
        session.validate().unwrap();
    }

    #[tokio::test]
    async fn session_record_loads_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).with_staleness_window(Duration::MAX);
        let path = store.record_path("media-item-81");
        fs::copy(fixtures_dir().join("session_record.json"), &path).unwrap();

        let session = store.load("media-item-81").await.unwrap().unwrap();
        assert_eq!(session.session_id, "2~kq9TQm1bX0aP");
        assert_eq!(session.completed_count(), 2);

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0, "media-item-81");
    }

    #[tokio::test]
    async fn stored_record_matches_fixture_shape() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).with_staleness_window(Duration::MAX);

        let mut fixture = load_fixture("session_record.json");
        let fixture_map = fixture.as_object_mut().unwrap();
        fixture_map.remove("recordId");
        let session: UploadSession = serde_json::from_value(fixture.clone()).unwrap();

        store.save("media-item-81", &session).await.unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.record_path("media-item-81")).unwrap())
                .unwrap();

        assert_eq!(written, load_fixture("session_record.json"));
    }
}

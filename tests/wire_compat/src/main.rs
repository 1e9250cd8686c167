fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use kiosksync_protocol::messages::{
        DownloadFileRequest, ErrorResponse, FileEntryPayload, FinishSyncRequest,
        FinishSyncResponse, RequestFilesRequest, RequestFilesResponse, RequestSyncRequest,
        SyncTurnResponse,
    };
    use kiosksync_protocol::types::SyncStatus;

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent comparison).
    ///
    /// Every fixture is written so that no present field is dropped by an
    /// omit-empty rule; a roundtrip mismatch therefore means the wire format
    /// changed.
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  rust:    {reserialized}"
        );
    }

    // --- Queue endpoint payloads ---

    #[test]
    fn fixture_request_sync_request() {
        roundtrip_test::<RequestSyncRequest>("request_sync_request.json");
    }

    #[test]
    fn fixture_sync_turn_response_active() {
        roundtrip_test::<SyncTurnResponse>("sync_turn_response_active.json");
        let parsed: SyncTurnResponse =
            serde_json::from_value(load_fixture("sync_turn_response_active.json")).unwrap();
        assert_eq!(parsed.status, SyncStatus::Active);
        assert!(parsed.position.is_none());
    }

    #[test]
    fn fixture_sync_turn_response_queued() {
        roundtrip_test::<SyncTurnResponse>("sync_turn_response_queued.json");
        let parsed: SyncTurnResponse =
            serde_json::from_value(load_fixture("sync_turn_response_queued.json")).unwrap();
        assert_eq!(parsed.status, SyncStatus::Queued);
        assert_eq!(parsed.position, Some(2));
    }

    #[test]
    fn fixture_sync_turn_response_not_queued() {
        roundtrip_test::<SyncTurnResponse>("sync_turn_response_not_queued.json");
    }

    #[test]
    fn fixture_finish_sync_request() {
        roundtrip_test::<FinishSyncRequest>("finish_sync_request.json");
    }

    #[test]
    fn fixture_finish_sync_response() {
        roundtrip_test::<FinishSyncResponse>("finish_sync_response.json");
    }

    // --- File delivery payloads ---

    #[test]
    fn fixture_request_files_info() {
        roundtrip_test::<RequestFilesRequest>("request_files_request_info.json");
    }

    #[test]
    fn fixture_request_files_response() {
        roundtrip_test::<RequestFilesResponse>("request_files_response.json");
        let parsed: RequestFilesResponse =
            serde_json::from_value(load_fixture("request_files_response.json")).unwrap();

        let hint = &parsed.files["hints/h1.txt"];
        assert!(hint.compressed);
        assert!(hint.data.is_some());
        assert!(hint.error.is_empty());

        let missing = &parsed.files["missing.txt"];
        assert_eq!(missing.error, "not found");
        assert!(missing.data.is_none());
    }

    #[test]
    fn fixture_request_files_response_info_only() {
        roundtrip_test::<RequestFilesResponse>("request_files_response_info.json");
    }

    #[test]
    fn fixture_download_file_request() {
        roundtrip_test::<DownloadFileRequest>("download_file_request.json");
    }

    #[test]
    fn fixture_error_response() {
        roundtrip_test::<ErrorResponse>("error_response.json");
    }

    // --- Omitted-field defaults ---

    #[test]
    fn request_files_missing_info_only_defaults_false() {
        let json = r#"{
            "kiosk_id": "kiosk-7",
            "files": ["hints/h1.txt", "audio/a.mp3"]
        }"#;
        let req: RequestFilesRequest = serde_json::from_str(json).unwrap();
        assert!(!req.info_only, "missing info_only should default to false");
    }

    #[test]
    fn turn_response_missing_position_defaults_none() {
        let json = r#"{"status": "active", "generation": 12}"#;
        let resp: SyncTurnResponse = serde_json::from_str(json).unwrap();
        assert!(resp.position.is_none());
    }

    #[test]
    fn file_entry_error_only_defaults_rest() {
        let json = r#"{"error": "permission denied"}"#;
        let entry: FileEntryPayload = serde_json::from_str(json).unwrap();
        assert_eq!(entry.size, 0);
        assert!(!entry.compressed);
        assert!(entry.data.is_none());
    }

    #[test]
    fn file_entry_data_decodes_base64() {
        let json = r#"{"data": "SGVsbG8="}"#;
        let entry: FileEntryPayload = serde_json::from_str(json).unwrap();
        assert_eq!(entry.data.unwrap(), b"Hello");
    }
}

use super::*;

#[test]
fn serves_pool_and_worker_statistics() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("shares.bin");
    let now = unix_now();

    let mut file = std::fs::File::create(&log).unwrap();
    for _ in 0..60 {
        file.write_all(&encode_share(now, 1, 100, [10, 0, 0, 1], 2, 1))
            .unwrap();
    }
    for _ in 0..30 {
        file.write_all(&encode_share(now, 1, 200, [10, 0, 0, 2], 1, 1))
            .unwrap();
    }
    for _ in 0..3 {
        file.write_all(&encode_share(now, 2, 42, [10, 0, 0, 3], 7, 0))
            .unwrap();
    }
    // user_id zero fails validation and must be dropped
    file.write_all(&encode_share(now, 0, 7, [10, 0, 0, 4], 9, 1))
        .unwrap();
    file.flush().unwrap();

    let server = TestServer::spawn(&log);
    server.wait_until(|response| response["result"]["pool"]["accept_count"] == 90);

    let response = server.get("/");
    assert_eq!(response.headers()["content-type"], "text/json");

    let root: Value = response.json().unwrap();
    assert_eq!(root["error_no"], 0);
    assert_eq!(root["error_msg"], "");

    let pool = &root["result"]["pool"];
    assert_eq!(pool["accept"], serde_json::json!([150, 150, 150]));
    assert_eq!(pool["reject"], serde_json::json!([0, 0, 21]));
    assert_eq!(pool["accept_count"], 90);
    assert_eq!(pool["workers"], 3);
    assert_eq!(pool["users"], 2);

    let uptime = root["result"]["uptime"].as_str().unwrap();
    assert_eq!(uptime.len(), "00 d 00 h 00 m 00 s".len(), "uptime: {uptime}");
    assert!(uptime.starts_with("00 d 00 h"), "uptime: {uptime}");
    assert!(root["result"]["request"].as_u64().unwrap() >= 1);

    let status = server.get_json("/worker_status?user_id=1&worker_id=100");
    assert_eq!(status["error_no"], 0);
    let row = &status["result"][0];
    assert_eq!(row["worker_id"], 100);
    assert_eq!(row["accept"], serde_json::json!([120, 120, 120]));
    assert_eq!(row["reject"], serde_json::json!([0, 0, 0]));
    assert_eq!(row["accept_count"], 60);
    assert_eq!(row["last_share_ip"], "10.0.0.1");
    assert_eq!(row["last_share_time"], now);
    assert!(row.get("workers").is_none());

    // worker_id zero is the user total, which also reports live workers
    let total = server.get_json("/worker_status/?user_id=1&worker_id=0");
    let row = &total["result"][0];
    assert_eq!(row["worker_id"], 0);
    assert_eq!(row["accept"], serde_json::json!([150, 150, 150]));
    assert_eq!(row["accept_count"], 90);
    assert_eq!(row["workers"], 2);

    let batch = server.get_json("/worker_status?user_id=1&worker_id=100,200");
    assert_eq!(batch["result"].as_array().unwrap().len(), 2);
    assert_eq!(batch["result"][0]["worker_id"], 100);
    assert_eq!(batch["result"][1]["worker_id"], 200);
    assert_eq!(batch["result"][1]["accept_count"], 30);
    assert!(batch["result"][0].get("workers").is_none());
    assert!(batch["result"][1].get("workers").is_none());

    let merged = server.get_json("/worker_status?user_id=1&worker_id=100,200&is_merge=true");
    let rows = merged["result"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["worker_id"], 0);
    assert_eq!(rows[0]["accept"], serde_json::json!([150, 150, 150]));
    assert_eq!(rows[0]["accept_count"], 90);
    assert_eq!(rows[0]["last_share_time"], now);
    assert!(rows[0].get("workers").is_none());

    let posted = server.post_form_json("/worker_status", "user_id=2&worker_id=42");
    let row = &posted["result"][0];
    assert_eq!(row["reject"], serde_json::json!([0, 0, 21]));
    assert_eq!(row["accept_count"], 0);
    assert_eq!(row["last_share_ip"], "10.0.0.3");

    let unknown = server.get_json("/worker_status?user_id=9&worker_id=900");
    let row = &unknown["result"][0];
    assert_eq!(row["worker_id"], 900);
    assert_eq!(row["accept"], serde_json::json!([0, 0, 0]));
    assert_eq!(row["accept_count"], 0);
    assert_eq!(row["last_share_ip"], "0.0.0.0");
    assert_eq!(row["last_share_time"], 0);
}

#[test]
fn missing_parameters_yield_error_json_with_http_200() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("shares.bin");
    std::fs::File::create(&log).unwrap();

    let server = TestServer::spawn(&log);

    for path in [
        "/worker_status",
        "/worker_status?user_id=1",
        "/worker_status?worker_id=100",
    ] {
        let response = server.get(path);
        assert_eq!(response.status(), 200, "for {path}");

        let body: Value = response.json().unwrap();
        assert_eq!(body["error_no"], 1, "for {path}");
        assert_eq!(body["error_msg"], "invalid args", "for {path}");
    }
}

#[test]
fn stale_records_in_the_backlog_are_ignored() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("shares.bin");
    let now = unix_now();

    let mut file = std::fs::File::create(&log).unwrap();
    file.write_all(&encode_share(now - 2000, 1, 100, [10, 0, 0, 1], 5, 1))
        .unwrap();
    file.write_all(&encode_share(now, 1, 100, [10, 0, 0, 1], 5, 1))
        .unwrap();
    file.flush().unwrap();

    let server = TestServer::spawn(&log);
    server.wait_until(|response| response["result"]["pool"]["accept_count"] == 1);

    let status = server.get_json("/worker_status?user_id=1&worker_id=100");
    assert_eq!(status["result"][0]["accept_count"], 1);
    assert_eq!(
        status["result"][0]["accept"],
        serde_json::json!([5, 5, 5])
    );
}

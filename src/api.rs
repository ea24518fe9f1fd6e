use {
    super::*,
    axum::{
        Form, Router,
        extract::{Query, State},
        http::header::CONTENT_TYPE,
        response::{IntoResponse, Response},
        routing::get,
    },
    tower_http::timeout::TimeoutLayer,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Responses keep the upstream wire shape: `Content-Type: text/json`,
/// HTTP 200 even for application errors, and `error_no`/`error_msg`
/// framing around every body.
pub(crate) fn router(server: Arc<StatsServer>) -> Router {
    Router::new()
        .route("/", get(server_status))
        .route(
            "/worker_status",
            get(worker_status_query).post(worker_status_form),
        )
        .route(
            "/worker_status/",
            get(worker_status_query).post(worker_status_form),
        )
        .layer(TimeoutLayer::new(HTTP_TIMEOUT))
        .with_state(server)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error_no: u32,
    error_msg: String,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    error_no: u32,
    error_msg: String,
    result: StatusResult,
}

#[derive(Debug, Serialize)]
struct StatusResult {
    uptime: String,
    request: u64,
    repbytes: u64,
    pool: PoolSummary,
}

#[derive(Debug, Serialize)]
struct PoolSummary {
    accept: [u64; 3],
    reject: [u64; 3],
    accept_count: u32,
    workers: u64,
    users: u64,
}

#[derive(Debug, Serialize)]
struct WorkerStatusBody {
    error_no: u32,
    error_msg: String,
    result: Vec<WorkerRow>,
}

#[derive(Debug, Serialize)]
struct WorkerRow {
    worker_id: i64,
    accept: [u64; 3],
    reject: [u64; 3],
    accept_count: u32,
    last_share_ip: String,
    last_share_time: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    workers: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WorkerStatusParams {
    user_id: Option<String>,
    worker_id: Option<String>,
    is_merge: Option<String>,
}

async fn server_status(State(server): State<Arc<StatsServer>>) -> Response {
    let request = server.request_count.fetch_add(1, Ordering::Relaxed) + 1;

    let now = unix_now();
    let pool = server.registry.pool_status(now);
    let (workers, users) = server.registry.counts();

    let body = StatusBody {
        error_no: 0,
        error_msg: String::new(),
        result: StatusResult {
            uptime: format_uptime(server.uptime()),
            request,
            repbytes: server.response_bytes.load(Ordering::Relaxed),
            pool: PoolSummary {
                accept: [pool.accept_1m, pool.accept_5m, pool.accept_15m],
                reject: [0, 0, pool.reject_15m],
                accept_count: pool.accept_count,
                workers,
                users,
            },
        },
    };

    respond(&server, &body)
}

async fn worker_status_query(
    State(server): State<Arc<StatsServer>>,
    Query(params): Query<WorkerStatusParams>,
) -> Response {
    worker_status(&server, params)
}

async fn worker_status_form(
    State(server): State<Arc<StatsServer>>,
    Form(params): Form<WorkerStatusParams>,
) -> Response {
    worker_status(&server, params)
}

fn worker_status(server: &StatsServer, params: WorkerStatusParams) -> Response {
    server.request_count.fetch_add(1, Ordering::Relaxed);

    let (Some(user_id), Some(worker_ids)) = (params.user_id, params.worker_id) else {
        return respond(
            server,
            &ErrorBody {
                error_no: 1,
                error_msg: "invalid args".into(),
            },
        );
    };

    let user_id: i32 = user_id.trim().parse().unwrap_or_default();

    let is_merge = params
        .is_merge
        .is_some_and(|value| value.starts_with(['T', 't']));

    // Unparseable ids degrade to zero, the user-total pseudo worker.
    let keys: Vec<WorkerKey> = worker_ids
        .split(',')
        .map(|worker_id| WorkerKey::new(user_id, worker_id.trim().parse().unwrap_or_default()))
        .collect();

    let now = unix_now();
    let statuses = server.registry.status_batch(&keys, now);

    let rows = if is_merge {
        vec![worker_row(WorkerStatus::merge(&statuses), 0, None)]
    } else {
        statuses
            .iter()
            .zip(&keys)
            .map(|(status, key)| {
                let workers = key
                    .is_user_total()
                    .then(|| server.registry.user_worker_count(user_id));
                worker_row(*status, key.worker_id, workers)
            })
            .collect()
    };

    respond(
        server,
        &WorkerStatusBody {
            error_no: 0,
            error_msg: String::new(),
            result: rows,
        },
    )
}

fn worker_row(status: WorkerStatus, worker_id: i64, workers: Option<i32>) -> WorkerRow {
    WorkerRow {
        worker_id,
        accept: [status.accept_1m, status.accept_5m, status.accept_15m],
        reject: [0, 0, status.reject_15m],
        accept_count: status.accept_count,
        last_share_ip: status.last_share_ip.to_string(),
        last_share_time: status.last_share_time,
        workers,
    }
}

fn respond(server: &StatsServer, body: &impl Serialize) -> Response {
    let body = serde_json::to_string(body).unwrap_or_default();
    server
        .response_bytes
        .fetch_add(body.len() as u64, Ordering::Relaxed);
    ([(CONTENT_TYPE, "text/json")], body).into_response()
}

fn format_uptime(seconds: u32) -> String {
    format!(
        "{:02} d {:02} h {:02} m {:02} s",
        seconds / 86400,
        seconds % 86400 / 3600,
        seconds % 3600 / 60,
        seconds % 60
    )
}

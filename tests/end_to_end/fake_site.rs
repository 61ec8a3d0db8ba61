//! In-process stand-in for the lookup sites
//!
//! Serves the full-name and verification-digit form pages and the birth-date
//! AJAX page on `127.0.0.1:0`. Each token page load opens a server-side session (cookie
//! plus token); submissions are only honoured when cookie and token belong
//! to the same session. Replies can be scripted per identifier to simulate
//! rate limiting, refusals and empty results. Responses are gzip-compressed
//! when the client asks for it.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use tower_http::compression::CompressionLayer;

const COOKIE_NAME: &str = "site_session";
const FULL_NAME_PATH: &str = "/pe/buscar-datos-por-dni";
const DIGIT_PATH: &str = "/pe/obtener-digito-verificador-del-dni";

/// Scripted reply for the next submission of an identifier
#[derive(Debug, Clone)]
pub enum Reply {
    /// Bare HTTP status with an empty body
    Status(u16),
    /// Literal body with status 200
    Body(&'static str),
    /// AJAX error envelope with the given message
    Rejected(&'static str),
}

/// Someone the site knows about
#[derive(Debug, Clone, Default)]
pub struct Person {
    pub given_names: &'static str,
    pub paternal: &'static str,
    pub maternal: &'static str,
    pub birth_date: &'static str,
    pub check_digit: &'static str,
}

#[derive(Default)]
struct SiteState {
    next_session: AtomicU64,
    token_pages: AtomicU64,
    token_mismatches: AtomicU64,
    gzip_requests: AtomicU64,
    sessions: Mutex<HashMap<String, String>>,
    people: Mutex<HashMap<String, Person>>,
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    submissions: Mutex<HashMap<String, u64>>,
    arrivals: Mutex<Vec<Instant>>,
}

/// Handle to a running fake site
#[derive(Clone)]
pub struct FakeSite {
    state: Arc<SiteState>,
    addr: SocketAddr,
}

impl FakeSite {
    /// Bind to an ephemeral port and serve in the background
    pub async fn start() -> Self {
        let state = Arc::new(SiteState::default());
        let app = Router::new()
            .route(FULL_NAME_PATH, get(form_page).post(form_submit))
            .route(DIGIT_PATH, get(digit_page).post(digit_submit))
            .route("/fecha-de-nacimiento-con-dni/", get(ajax_page))
            .route("/wp-admin/admin-ajax.php", axum::routing::post(ajax_submit))
            .with_state(Arc::clone(&state))
            .layer(CompressionLayer::new());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { state, addr }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn add_person(&self, dni: &str, person: Person) {
        self.state
            .people
            .lock()
            .unwrap()
            .insert(dni.to_string(), person);
    }

    /// Queue replies served before the normal answer for `dni`
    pub fn script(&self, dni: &str, replies: Vec<Reply>) {
        self.state
            .scripts
            .lock()
            .unwrap()
            .entry(dni.to_string())
            .or_default()
            .extend(replies);
    }

    pub fn token_pages(&self) -> u64 {
        self.state.token_pages.load(Ordering::SeqCst)
    }

    pub fn token_mismatches(&self) -> u64 {
        self.state.token_mismatches.load(Ordering::SeqCst)
    }

    pub fn gzip_requests(&self) -> u64 {
        self.state.gzip_requests.load(Ordering::SeqCst)
    }

    /// Submissions received for one identifier
    pub fn submissions_for(&self, dni: &str) -> u64 {
        self.state
            .submissions
            .lock()
            .unwrap()
            .get(dni)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_submissions(&self) -> u64 {
        self.state.submissions.lock().unwrap().values().sum()
    }

    /// Arrival time of every request, in order
    pub fn arrivals(&self) -> Vec<Instant> {
        let mut arrivals = self.state.arrivals.lock().unwrap().clone();
        arrivals.sort();
        arrivals
    }
}

fn observe(state: &SiteState, headers: &HeaderMap) {
    state.arrivals.lock().unwrap().push(Instant::now());
    let gzip = headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("gzip"))
        .unwrap_or(false);
    if gzip {
        state.gzip_requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Create a server-side session and return (cookie header, token)
fn open_session(state: &SiteState) -> (String, String) {
    state.token_pages.fetch_add(1, Ordering::SeqCst);
    let id = state.next_session.fetch_add(1, Ordering::SeqCst);
    let session_id = format!("s{}", id);
    let token = format!("tok{:04}x{}", id, fastrand::u32(..));
    state
        .sessions
        .lock()
        .unwrap()
        .insert(session_id.clone(), token.clone());
    (
        format!("{}={}; Path=/; HttpOnly", COOKIE_NAME, session_id),
        token,
    )
}

/// Whether the cookie and the submitted token belong together
fn token_matches(state: &SiteState, headers: &HeaderMap, token: Option<&String>) -> bool {
    let session_id = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                (name == COOKIE_NAME).then(|| value.to_string())
            })
        });
    let (Some(session_id), Some(token)) = (session_id, token) else {
        return false;
    };
    state.sessions.lock().unwrap().get(&session_id) == Some(token)
}

/// Count a submission and pop its next scripted reply
fn next_reply(state: &SiteState, dni: &str) -> Option<Reply> {
    *state
        .submissions
        .lock()
        .unwrap()
        .entry(dni.to_string())
        .or_insert(0) += 1;
    state
        .scripts
        .lock()
        .unwrap()
        .get_mut(dni)
        .and_then(VecDeque::pop_front)
}

/// Token-bearing form page posting `field` back to `action`
fn token_form_page(state: &SiteState, headers: &HeaderMap, action: &str, field: &str) -> Response {
    observe(state, headers);
    let (cookie, token) = open_session(state);
    let page = format!(
        r#"<!DOCTYPE html>
<html><head><title>Consulta DNI</title></head>
<body>
  <form method="POST" action="{action}">
    <input type="hidden" name="_token" value="{}">
    <input type="text" name="{field}" maxlength="8">
    <button type="submit">Buscar</button>
  </form>
</body></html>"#,
        token
    );
    ([(header::SET_COOKIE, cookie)], Html(page)).into_response()
}

/// Shared checks for HTML form submissions
///
/// Returns the person on file, or the response to send instead.
fn form_preamble(
    state: &SiteState,
    headers: &HeaderMap,
    form: &HashMap<String, String>,
    field: &str,
) -> Result<(String, Person), Response> {
    observe(state, headers);
    let dni = form.get(field).cloned().unwrap_or_default();

    if !token_matches(state, headers, form.get("_token")) {
        state.token_mismatches.fetch_add(1, Ordering::SeqCst);
        return Err(StatusCode::FORBIDDEN.into_response());
    }

    match next_reply(state, &dni) {
        Some(Reply::Status(code)) => {
            return Err(StatusCode::from_u16(code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                .into_response())
        }
        Some(Reply::Body(body)) => return Err(body.into_response()),
        Some(Reply::Rejected(message)) => return Err(message.into_response()),
        None => {}
    }

    let person = state.people.lock().unwrap().get(&dni).cloned();
    match person {
        Some(person) => Ok((dni, person)),
        None => Err("0".into_response()),
    }
}

async fn form_page(State(state): State<Arc<SiteState>>, headers: HeaderMap) -> Response {
    token_form_page(&state, &headers, FULL_NAME_PATH, "dni")
}

async fn form_submit(
    State(state): State<Arc<SiteState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let (dni, person) = match form_preamble(&state, &headers, &form, "dni") {
        Ok(found) => found,
        Err(response) => return response,
    };
    Html(format!(
        r#"<!DOCTYPE html>
<html><body>
  <h2>Resultado de la consulta</h2>
  <form>
    <input type="text" id="dni" value="{dni}" readonly>
    <input type="text" id="nombres" value="{}" readonly>
    <input type="text" id="apellidop" value="{}" readonly>
    <input type="text" id="apellidom" value="{}" readonly>
  </form>
  <p>Los datos mostrados provienen de fuentes publicas.</p>
</body></html>"#,
        person.given_names, person.paternal, person.maternal
    ))
    .into_response()
}

async fn digit_page(State(state): State<Arc<SiteState>>, headers: HeaderMap) -> Response {
    token_form_page(&state, &headers, DIGIT_PATH, "dniveri")
}

async fn digit_submit(
    State(state): State<Arc<SiteState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let (dni, person) = match form_preamble(&state, &headers, &form, "dniveri") {
        Ok(found) => found,
        Err(response) => return response,
    };
    Html(format!(
        r#"<!DOCTYPE html>
<html><body>
  <h2>Digito verificador del DNI {dni}</h2>
  <p>El dígito verificador es <mark>{}</mark></p>
</body></html>"#,
        person.check_digit
    ))
    .into_response()
}

async fn ajax_page(State(state): State<Arc<SiteState>>, headers: HeaderMap) -> Response {
    observe(&state, &headers);
    let (cookie, token) = open_session(&state);
    let page = format!(
        r#"<!DOCTYPE html>
<html><head>
<script type="text/javascript">
/* <![CDATA[ */
var fecha_vars = {{"ajax_url":"\/wp-admin\/admin-ajax.php","nonce":"{}"}};
/* ]]> */
</script>
</head><body><h1>Fecha de nacimiento con DNI</h1></body></html>"#,
        token
    );
    ([(header::SET_COOKIE, cookie)], Html(page)).into_response()
}

async fn ajax_submit(
    State(state): State<Arc<SiteState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    observe(&state, &headers);
    let dni = form.get("dni").cloned().unwrap_or_default();

    if form.get("action").map(String::as_str) != Some("buscar_fecha") {
        return "0".into_response();
    }
    if !token_matches(&state, &headers, form.get("security")) {
        state.token_mismatches.fetch_add(1, Ordering::SeqCst);
        return "-1".into_response();
    }

    match next_reply(&state, &dni) {
        Some(Reply::Status(code)) => {
            return StatusCode::from_u16(code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                .into_response()
        }
        Some(Reply::Body(body)) => return body.into_response(),
        Some(Reply::Rejected(message)) => {
            return Json(serde_json::json!({ "success": false, "data": { "message": message } }))
                .into_response()
        }
        None => {}
    }

    let person = state.people.lock().unwrap().get(&dni).cloned();
    match person {
        Some(person) => Json(serde_json::json!({
            "success": true,
            "data": {
                "dni": dni,
                "nombres": format!("{} {} {}", person.given_names, person.paternal, person.maternal),
                "fechaNacimiento": person.birth_date,
            }
        }))
        .into_response(),
        None => Json(serde_json::json!({
            "success": false,
            "data": { "message": "No se encontraron resultados" }
        }))
        .into_response(),
    }
}

//! Fake collaborators and a request harness for handler tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use tower::ServiceExt;

use tunnelgate_core::{
    Auth, AuthError, Config, Database, JsonDatabase, Tunnel, TunnelError, TunnelManager,
};

use crate::state::AppState;
use crate::templates::{AssetSource, Templates};

pub const VALID_TOKEN: &str = "valid-token";
pub const GOOD_KEY: &str = "good-key";

/// Accepts [`VALID_TOKEN`] and exchanges [`GOOD_KEY`] for it
#[derive(Default)]
pub struct FakeAuth {
    authorized_calls: AtomicUsize,
    logins: Mutex<Vec<String>>,
    /// When set, `login` blocks until this receives a message
    hold_login: Option<Mutex<mpsc::Receiver<()>>>,
    /// When set, `login` reports the email here once it finishes
    login_done: Option<Mutex<mpsc::Sender<String>>>,
}

impl FakeAuth {
    /// `login` waits for `release`, then reports the email on `done`
    pub fn holding(release: mpsc::Receiver<()>, done: mpsc::Sender<String>) -> Self {
        Self {
            hold_login: Some(Mutex::new(release)),
            login_done: Some(Mutex::new(done)),
            ..Default::default()
        }
    }

    pub fn authorized_calls(&self) -> usize {
        self.authorized_calls.load(Ordering::SeqCst)
    }

    pub fn logins(&self) -> Vec<String> {
        self.logins.lock().unwrap().clone()
    }
}

impl Auth for FakeAuth {
    fn authorized(&self, token: &str) -> bool {
        self.authorized_calls.fetch_add(1, Ordering::SeqCst);
        token == VALID_TOKEN
    }

    fn verify(&self, key: &str) -> Result<String, AuthError> {
        if key == GOOD_KEY {
            Ok(VALID_TOKEN.to_string())
        } else {
            Err(AuthError::TokenExpired)
        }
    }

    fn login(&self, email: &str, _config: &Config) -> Result<(), AuthError> {
        if let Some(hold) = &self.hold_login {
            let _ = hold.lock().unwrap().recv();
        }
        self.logins.lock().unwrap().push(email.to_string());
        if let Some(done) = &self.login_done {
            let _ = done.lock().unwrap().send(email.to_string());
        }
        Ok(())
    }
}

/// Records calls; rejects creation when `reject` is set
#[derive(Default)]
pub struct FakeTunnels {
    created: Mutex<Vec<(String, String, u16)>>,
    deleted: Mutex<Vec<String>>,
    reject: bool,
    /// When set, creation blocks until this receives a message
    hold_create: Option<Mutex<mpsc::Receiver<()>>>,
}

impl FakeTunnels {
    pub fn holding(release: mpsc::Receiver<()>) -> Self {
        Self {
            hold_create: Some(Mutex::new(release)),
            ..Default::default()
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Default::default()
        }
    }

    pub fn created(&self) -> Vec<(String, String, u16)> {
        self.created.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

impl TunnelManager for FakeTunnels {
    fn create_tunnel_for_client(
        &self,
        domain: &str,
        client_name: &str,
        client_port: u16,
    ) -> Result<Tunnel, TunnelError> {
        if let Some(hold) = &self.hold_create {
            let _ = hold.lock().unwrap().recv();
        }
        self.created.lock().unwrap().push((
            domain.to_string(),
            client_name.to_string(),
            client_port,
        ));
        if self.reject {
            return Err(TunnelError::DomainTaken(domain.to_string()));
        }
        Ok(tunnel(domain))
    }

    fn delete_tunnel(&self, domain: &str) {
        self.deleted.lock().unwrap().push(domain.to_string());
    }
}

pub fn tunnel(domain: &str) -> Tunnel {
    Tunnel {
        domain: domain.to_string(),
        client_name: "laptop".to_string(),
        client_port: 8080,
        tunnel_port: 9300,
        created_at: Utc::now(),
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub struct Harness {
    pub auth: Arc<FakeAuth>,
    pub db: Arc<JsonDatabase>,
    pub tunnels: Arc<FakeTunnels>,
    state: AppState,
    app: Router,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(FakeAuth::default(), FakeTunnels::default())
    }

    pub fn build(auth: FakeAuth, tunnels: FakeTunnels) -> Self {
        let auth = Arc::new(auth);
        let db = Arc::new(JsonDatabase::in_memory());
        let tunnels = Arc::new(tunnels);
        let templates = Templates::load(&AssetSource::Bundled).unwrap();

        let state = AppState::new(
            Config::default(),
            db.clone(),
            auth.clone(),
            tunnels.clone(),
            templates,
        );
        let app = super::router(state.clone());

        Self {
            auth,
            db,
            tunnels,
            state,
            app,
        }
    }

    pub fn app(&self) -> Router {
        self.app.clone()
    }

    pub fn templates(&self) -> &Templates {
        &self.state.templates
    }

    pub fn add_tunnel(&self, domain: &str) {
        self.db.set_tunnel(tunnel(domain)).unwrap();
    }

    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let res = self.app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();

        TestResponse {
            status,
            headers,
            body: String::from_utf8(body.to_vec()).unwrap(),
        }
    }
}

/// Build a request, optionally with a session cookie and a form body
pub fn request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    form: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("access_token={token}"));
    }

    match form {
        Some(form) => builder
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
    routing::{get, post},
};
use chrono::{Duration, Utc};
use easyweb::config::{Configuration, EnvironmentName, HostEnvironment};
use easyweb::content::Linkable;
use easyweb::guard::RouteFilters;
use easyweb::module::{Module, RegistrationContext};
use easyweb::routing::RouteKind;
use easyweb::services::{CaptchaStore, FormCollection, FormPostResult, FormService};
use easyweb::{Container, Result, SiteError, Startup};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

const PAGES: &str = r#"[
    { "id": "1", "path": "/", "title": "Home" },
    { "id": "2", "path": "/contact", "title": "Contact" },
    { "id": "3", "path": "/thanks", "title": "Thanks", "resultLink": "GoodPostPage" },
    { "id": "4", "path": "/sorry", "title": "Sorry", "resultLink": "BadPostPage" },
    { "id": "5", "path": "/news", "title": "News" },
    { "id": "6", "path": "/news/launch", "title": "Launch" },
    { "id": "7", "path": "/members", "title": "Members", "requiresAuthentication": true }
]"#;

const INDEX_VIEW: &str = "{{ page.title }}|{{ culture }}{% if partial %}|partial{% endif %}{% if form_result %}|{{ form_result.successful }}{% endif %}";

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn content_root() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "appsettings.json",
        r#"{
            "SiteOptions": {
                "SiteName": "Test site",
                "Cultures": ["sv-SE", "en-US"],
                "Modules": [{ "Name": "News", "Route": "/news" }]
            },
            "SecurityOptions": {
                "UseAuthentication": true,
                "MemberTokens": ["member-secret"]
            }
        }"#,
    );
    write(root, "Content/pages.json", PAGES);
    write(root, "Views/_Default/Index.html", INDEX_VIEW);
    write(root, "Views/News/Index.html", "News: {{ page.title }}");
    write(root, "Views/Error401.html", "Please log in");
    write(root, "js/site.js", "console.log('site');");
    write(root, "css/site.css", "body { margin: 0; }");
    dir
}

/// Form service answering from the posted `outcome` field, counting its calls
struct CountingForms {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl FormService for CountingForms {
    async fn handle_form(&self, form: &FormCollection, _page: &Linkable) -> Result<FormPostResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match form.get("outcome") {
            Some("good") => Ok(FormPostResult::succeeded(Uuid::new_v4())),
            Some("crash") => Err(SiteError::FormProcessing("mail relay refused".to_string())),
            _ => Ok(FormPostResult::failed(vec!["outcome is required".to_string()])),
        }
    }
}

struct CountingFormsModule {
    calls: Arc<AtomicUsize>,
}

impl Module for CountingFormsModule {
    fn name(&self) -> &'static str {
        "counting-forms"
    }

    fn register(&self, container: &mut Container, _ctx: &RegistrationContext) -> Result<()> {
        container.register_as::<dyn FormService, _, _>(
            CountingForms {
                calls: self.calls.clone(),
            },
            |s| s as Arc<dyn FormService>,
        );
        Ok(())
    }
}

struct Site {
    _dir: TempDir,
    app: Router,
    container: Arc<Container>,
    calls: Arc<AtomicUsize>,
    startup: Startup,
}

impl Site {
    fn captcha(&self) -> String {
        self.container
            .resolve::<CaptchaStore>()
            .unwrap()
            .issue_at(Utc::now() - Duration::seconds(30))
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }
}

fn site_with(dir: TempDir, env: EnvironmentName, customize: impl FnOnce(Startup) -> Startup) -> Site {
    let env = HostEnvironment::new(env, dir.path());
    let configuration = Configuration::load(&env).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut startup = customize(
        Startup::new(configuration, env).with_module(CountingFormsModule {
            calls: calls.clone(),
        }),
    );
    let mut container = Container::new();
    startup.configure_services(&mut container).unwrap();
    let container = Arc::new(container);
    let app = startup.configure(container.clone()).unwrap();

    Site {
        _dir: dir,
        app,
        container,
        calls,
        startup,
    }
}

fn site(env: EnvironmentName) -> Site {
    site_with(content_root(), env, |startup| startup)
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn form_post(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

async fn text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_pages_render_their_views() {
    let site = site(EnvironmentName::Production);

    let response = site.send(get_request("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "Home|sv-SE");

    let response = site.send(get_request("/contact")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(header::SET_COOKIE));
    assert_eq!(text(response).await, "Contact|sv-SE");
}

#[tokio::test]
async fn test_module_pages_use_module_views() {
    let site = site(EnvironmentName::Production);
    let response = site.send(get_request("/news/launch")).await;
    assert_eq!(text(response).await, "News: Launch");
}

#[tokio::test]
async fn test_culture_follows_accept_language() {
    let site = site(EnvironmentName::Production);
    let request = Request::builder()
        .uri("/contact")
        .header(header::ACCEPT_LANGUAGE, "en")
        .body(Body::empty())
        .unwrap();
    let response = site.send(request).await;
    assert_eq!(response.headers()[header::CONTENT_LANGUAGE], "en-US");
    assert_eq!(text(response).await, "Contact|en-US");
}

#[tokio::test]
async fn test_unknown_page_is_not_found() {
    let site = site(EnvironmentName::Production);
    let response = site.send(get_request("/no-such-page")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_protected_page_renders_status_view() {
    let site = site(EnvironmentName::Production);
    let response = site.send(get_request("/members")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(text(response).await, "Please log in");

    let request = Request::builder()
        .uri("/members")
        .header(header::COOKIE, "ew-auth=member-secret")
        .body(Body::empty())
        .unwrap();
    let response = site.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_successful_post_redirects_to_good_post_page() {
    let site = site(EnvironmentName::Production);
    let body = format!("name=Ada&outcome=good&ew-captcha={}", site.captcha());

    let response = site.send(form_post("/contact", body)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/thanks");
    assert_eq!(site.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_post_redirects_to_bad_post_page() {
    let site = site(EnvironmentName::Production);
    let body = format!("name=Ada&outcome=bad&ew-captcha={}", site.captcha());

    let response = site.send(form_post("/contact", body)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/sorry");
}

#[tokio::test]
async fn test_background_post_renders_result_in_place() {
    let site = site(EnvironmentName::Production);
    let body = format!("outcome=good&ew-captcha={}", site.captcha());
    let mut request = form_post("/contact", body);
    request
        .headers_mut()
        .insert("x-requested-with", "XMLHttpRequest".parse().unwrap());

    let response = site.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "Thanks|sv-SE|partial|true");
}

#[tokio::test]
async fn test_post_without_captcha_never_reaches_form_service() {
    let site = site(EnvironmentName::Production);

    let response = site
        .send(form_post("/contact", "name=Ada&outcome=good".to_string()))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = site
        .send(form_post("/contact", "outcome=good&ew-captcha=forged".to_string()))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(site.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_antiforgery_is_only_enforced_where_declared() {
    let dir = content_root();
    let site = site_with(dir, EnvironmentName::Production, |startup| {
        startup.with_route(
            "subscribe",
            "/api/subscribe",
            post(|| async { "subscribed" }).route_layer(RouteFilters::new().into_layer(1024)),
        )
    });

    // Page posts carry no antiforgery token and still go through.
    let body = format!("outcome=good&ew-captcha={}", site.captcha());
    let response = site.send(form_post("/contact", body)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = site
        .send(form_post("/api/subscribe", "email=a%40b.se".to_string()))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut request = form_post(
        "/api/subscribe",
        "email=a%40b.se&__RequestVerificationToken=t0ken".to_string(),
    );
    request
        .headers_mut()
        .insert(header::COOKIE, "ew-xsrf=t0ken".parse().unwrap());
    let response = site.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_static_scripts_and_styles() {
    let site = site(EnvironmentName::Production);

    let response = site.send(get_request("/js/site.js")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "console.log('site');");

    let response = site.send(get_request("/css/site.css")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = site.send(get_request("/js/missing.js")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_images_are_served_through_thumbnail_generator() {
    let dir = content_root();
    write(dir.path(), "Media/images/logo.svg", "<svg/>");
    let site = site_with(dir, EnvironmentName::Production, |startup| startup);

    let response = site.send(get_request("/images/logo.svg?w=120")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");

    let response = site.send(get_request("/images/missing.png")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

fn failing(startup: Startup) -> Startup {
    startup
        .with_route(
            "failing",
            "/failing",
            get(|| async { Err::<String, SiteError>(SiteError::Internal("database offline".to_string())) }),
        )
        .with_route(
            "panicking",
            "/panicking",
            get(|| async {
                if true {
                    panic!("handler exploded");
                }
                "unreachable"
            }),
        )
}

#[tokio::test]
async fn test_development_shows_diagnostic_page() {
    let site = site_with(content_root(), EnvironmentName::Development, failing);

    let response = site.send(get_request("/failing")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let html = text(response).await;
    assert!(html.contains("database offline"));
    assert!(html.contains("GET /failing"));

    let response = site.send(get_request("/panicking")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(text(response).await.contains("handler exploded"));
}

#[tokio::test]
async fn test_development_creates_web_root() {
    let dir = content_root();
    let web_root = dir.path().join("wwwroot");
    let site = site_with(dir, EnvironmentName::Development, |startup| startup);
    assert!(web_root.is_dir());

    std::fs::write(web_root.join("robots.txt"), "User-agent: *").unwrap();
    let response = site.send(get_request("/robots.txt")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "User-agent: *");
}

#[tokio::test]
async fn test_production_renders_static_view() {
    let dir = content_root();
    write(dir.path(), "Views/Static.html", "Something went wrong ({{ status_code }})");
    let site = site_with(dir, EnvironmentName::Production, failing);

    let response = site.send(get_request("/failing")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let html = text(response).await;
    assert_eq!(html, "Something went wrong (500)");
    assert!(!html.contains("database offline"));
}

#[tokio::test]
async fn test_production_falls_back_to_static_error_document() {
    let dir = content_root();
    write(dir.path(), "Resources/StaticError.html", "<h1>Static error</h1>");
    let site = site_with(dir, EnvironmentName::Production, failing);

    let response = site.send(get_request("/failing")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text(response).await, "<h1>Static error</h1>");
}

#[tokio::test]
async fn test_form_service_failure_reaches_exception_handling() {
    let site = site(EnvironmentName::Development);
    let body = format!("outcome=crash&ew-captcha={}", site.captcha());

    let response = site.send(form_post("/contact", body)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(text(response).await.contains("mail relay refused"));
}

#[tokio::test]
async fn test_production_sends_hsts() {
    let site = site(EnvironmentName::Production);
    let response = site.send(get_request("/")).await;
    assert_eq!(
        response.headers()[header::STRICT_TRANSPORT_SECURITY],
        "max-age=2592000"
    );

    let site = site_with(content_root(), EnvironmentName::Development, |startup| startup);
    let response = site.send(get_request("/")).await;
    assert!(!response.headers().contains_key(header::STRICT_TRANSPORT_SECURITY));
}

#[tokio::test]
async fn test_mixed_case_urls_redirect_to_lowercase() {
    let site = site(EnvironmentName::Production);
    let response = site.send(get_request("/Contact")).await;
    assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/contact");
}

#[tokio::test]
async fn test_route_order() {
    let site = site_with(content_root(), EnvironmentName::Production, failing);
    let kinds: Vec<RouteKind> = site.startup.route_entries().iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            RouteKind::Custom,
            RouteKind::Custom,
            RouteKind::Home,
            RouteKind::Asset,
            RouteKind::Asset,
            RouteKind::Module,
            RouteKind::Module,
            RouteKind::CatchAll,
        ]
    );
}

fn cached_content_root() -> TempDir {
    let dir = content_root();
    write(
        dir.path(),
        "appsettings.Production.json",
        r#"{
            "SiteOptions": { "OutputCache": { "Enabled": true } },
            "FormOptions": { "CaptchaMinSeconds": 0 }
        }"#,
    );
    dir
}

fn with_xsrf_cookie(mut request: Request<Body>, token: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert(header::COOKIE, format!("ew-xsrf={}", token).parse().unwrap());
    request
}

#[tokio::test]
async fn test_output_cache_never_shares_form_tokens() {
    let dir = cached_content_root();
    write(
        dir.path(),
        "Views/_Default/Index.html",
        "{{ page.title }}|{{ captcha_token() }}",
    );
    let site = site_with(dir, EnvironmentName::Production, |startup| startup);

    let mut tokens = Vec::new();
    for visitor in ["visitor-a", "visitor-b"] {
        let response = site
            .send(with_xsrf_cookie(get_request("/contact"), visitor))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-output-cache").is_none());
        assert_eq!(response.headers()[header::CACHE_CONTROL], "private, no-store");
        let html = text(response).await;
        tokens.push(html.trim_start_matches("Contact|").to_string());
    }
    assert_ne!(tokens[0], tokens[1]);

    for token in &tokens {
        let body = format!("outcome=good&ew-captcha={}", token);
        let response = site.send(form_post("/contact", body)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
    assert_eq!(site.calls.load(Ordering::SeqCst), 2);

    // Pages without visitor tokens are still replayed.
    site.send(with_xsrf_cookie(get_request("/news"), "visitor-a")).await;
    let response = site
        .send(with_xsrf_cookie(get_request("/news"), "visitor-b"))
        .await;
    assert_eq!(response.headers()["x-output-cache"], "hit");
    assert_eq!(text(response).await, "News: News");
}

#[tokio::test]
async fn test_output_cache_serves_large_pages_uncached() {
    let dir = cached_content_root();
    let large = "x".repeat(3 * 1024 * 1024);
    write(dir.path(), "Views/_Default/Index.html", &large);
    let site = site_with(dir, EnvironmentName::Production, |startup| startup);

    let response = site
        .send(with_xsrf_cookie(get_request("/contact"), "visitor-a"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-output-cache").is_none());
    assert_eq!(text(response).await.len(), large.len());
}

#[tokio::test]
async fn test_production_error_pages_send_hsts() {
    let site = site_with(content_root(), EnvironmentName::Production, failing);
    let response = site.send(get_request("/failing")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.headers()[header::STRICT_TRANSPORT_SECURITY],
        "max-age=2592000"
    );
}

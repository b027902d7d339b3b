use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use reqwest::Url;
use serde_json::json;
use spotsearch::config::AuthEndpoints;
use spotsearch::error::AuthError;
use spotsearch::management::*;
use spotsearch::messages::{Background, Request, Response};
use spotsearch::platform::LoopbackLauncher;
use spotsearch::spotify::auth::{CodeGrant, TokenExchanger};
use spotsearch::storage::*;
use spotsearch::types::{RedirectParams, TokenResponse};
use spotsearch::utils::derive_challenge;
use tokio::time::sleep;

const REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";
const FALLBACK_URI: &str = "https://fallback.example/cb";

fn endpoints() -> AuthEndpoints {
    AuthEndpoints {
        authorize_url: "https://accounts.example/authorize".to_string(),
        scope: "playlist-read-private playlist-read-collaborative".to_string(),
        redirect_uri: REDIRECT_URI.to_string(),
        fallback_redirect_uri: FALLBACK_URI.to_string(),
        show_dialog: true,
    }
}

fn query_param(url: &str, key: &str) -> Option<String> {
    Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

#[derive(Debug, Clone, PartialEq)]
struct ExchangeCall {
    client_id: String,
    code: String,
    code_verifier: String,
    redirect_uri: String,
}

#[derive(Clone, Default)]
struct FakeExchanger {
    calls: Arc<Mutex<Vec<ExchangeCall>>>,
    fail_with: Option<String>,
}

impl TokenExchanger for FakeExchanger {
    async fn exchange(&self, grant: CodeGrant<'_>) -> Result<TokenResponse, AuthError> {
        self.calls.lock().unwrap().push(ExchangeCall {
            client_id: grant.client_id.to_string(),
            code: grant.code.to_string(),
            code_verifier: grant.code_verifier.to_string(),
            redirect_uri: grant.redirect_uri.to_string(),
        });
        if let Some(description) = &self.fail_with {
            return Err(AuthError::TokenExchangeFailed {
                description: description.clone(),
            });
        }
        Ok(TokenResponse {
            access_token: "access-1".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            scope: None,
            expires_in: 3600,
        })
    }

    async fn refresh(&self, _client_id: &str, _refresh_token: &str) -> Result<TokenResponse, AuthError> {
        Err(AuthError::RefreshFailed("not expected".to_string()))
    }
}

#[derive(Clone, Copy)]
enum Behavior {
    EchoState,
    WrongState,
    Denied,
    Cancel,
    Unavailable,
}

#[derive(Clone)]
struct FakeLauncher {
    behavior: Behavior,
    launched: Arc<Mutex<Vec<String>>>,
}

impl FakeLauncher {
    fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            launched: Arc::default(),
        }
    }
}

impl InteractiveAuthLauncher for FakeLauncher {
    async fn launch(&self, auth_url: &str, redirect_uri: &str) -> Result<String, LaunchError> {
        self.launched.lock().unwrap().push(auth_url.to_string());
        let state = query_param(auth_url, "state").unwrap_or_default();
        match self.behavior {
            Behavior::EchoState => Ok(format!("{}?code=code-1&state={}", redirect_uri, state)),
            Behavior::WrongState => Ok(format!("{}?code=code-1&state=forged", redirect_uri)),
            Behavior::Denied => Ok(format!("{}?error=access_denied&state={}", redirect_uri, state)),
            Behavior::Cancel => Err(LaunchError::Cancelled("user closed the window".to_string())),
            Behavior::Unavailable => Err(LaunchError::Unavailable("no identity api".to_string())),
        }
    }
}

#[derive(Clone, Default)]
struct FakeTabs {
    next: Arc<AtomicU64>,
    opened: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<Vec<TabId>>>,
    fail_open: bool,
}

impl TabController for FakeTabs {
    async fn open_tab(&self, url: &str) -> Result<TabId, AuthError> {
        if self.fail_open {
            return Err(AuthError::Browser("no browser window".to_string()));
        }
        self.opened.lock().unwrap().push(url.to_string());
        Ok(TabId(self.next.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn close_tab(&self, tab: TabId) -> Result<(), AuthError> {
        self.closed.lock().unwrap().push(tab);
        Ok(())
    }
}

// Never reports a navigation
struct NoNavigation;

impl NavigationWatcher for NoNavigation {
    async fn next_navigation(&self) -> Option<Navigation> {
        std::future::pending().await
    }
}

// Plays the user: after an unrelated page load, lands the latest opened tab
// on the redirect URI with that tab's state
struct RedirectingNavigation {
    tabs: FakeTabs,
    served: AtomicUsize,
}

impl NavigationWatcher for RedirectingNavigation {
    async fn next_navigation(&self) -> Option<Navigation> {
        loop {
            sleep(Duration::from_millis(50)).await;
            let opened = self.tabs.opened.lock().unwrap().clone();
            let served = self.served.load(Ordering::SeqCst);
            if served < opened.len() * 2 {
                self.served.fetch_add(1, Ordering::SeqCst);
                let tab = TabId(opened.len() as u64);
                if served % 2 == 0 {
                    return Some(Navigation {
                        tab,
                        url: "https://accounts.example/login".to_string(),
                    });
                }
                let auth_url = &opened[opened.len() - 1];
                let redirect_uri = query_param(auth_url, "redirect_uri").unwrap();
                let state = query_param(auth_url, "state").unwrap();
                return Some(Navigation {
                    tab,
                    url: format!("{}#code=code-2&state={}", redirect_uri, state),
                });
            }
        }
    }
}

fn authorizer<L: InteractiveAuthLauncher, N: NavigationWatcher>(
    memory: &MemoryStore,
    exchanger: &FakeExchanger,
    launcher: L,
    tabs: &FakeTabs,
    navigation: N,
) -> Authorizer<MemoryStore, FakeExchanger, L, FakeTabs, N> {
    let fallback = TabAuthFlow::new(tabs.clone(), navigation, endpoints().redirect_uris());
    Authorizer::new(
        CredentialStore::new(memory.clone()),
        exchanger.clone(),
        launcher,
        fallback,
        endpoints(),
    )
}

#[tokio::test]
async fn test_empty_client_id_is_rejected() {
    let memory = MemoryStore::new();
    let exchanger = FakeExchanger::default();
    let launcher = FakeLauncher::new(Behavior::EchoState);
    let tabs = FakeTabs::default();
    let auth = authorizer(&memory, &exchanger, launcher.clone(), &tabs, NoNavigation);

    assert!(matches!(
        auth.authorize("   ").await,
        Err(AuthError::InvalidClientId)
    ));
    assert!(launcher.launched.lock().unwrap().is_empty());
    assert_eq!(auth.stage(), AuthStage::Failed);
}

#[tokio::test]
async fn test_interactive_flow_stores_tokens() {
    let memory = MemoryStore::new();
    let exchanger = FakeExchanger::default();
    let launcher = FakeLauncher::new(Behavior::EchoState);
    let tabs = FakeTabs::default();
    let auth = authorizer(&memory, &exchanger, launcher.clone(), &tabs, NoNavigation);

    auth.authorize("client-1").await.unwrap();
    assert_eq!(auth.stage(), AuthStage::Complete);

    let launched = launcher.launched.lock().unwrap().clone();
    assert_eq!(launched.len(), 1);
    let auth_url = &launched[0];
    assert!(auth_url.starts_with("https://accounts.example/authorize?"));
    assert_eq!(query_param(auth_url, "client_id").as_deref(), Some("client-1"));
    assert_eq!(query_param(auth_url, "response_type").as_deref(), Some("code"));
    assert_eq!(query_param(auth_url, "redirect_uri").as_deref(), Some(REDIRECT_URI));
    assert_eq!(query_param(auth_url, "code_challenge_method").as_deref(), Some("S256"));
    assert_eq!(query_param(auth_url, "show_dialog").as_deref(), Some("true"));
    assert_eq!(
        query_param(auth_url, "scope").as_deref(),
        Some("playlist-read-private playlist-read-collaborative")
    );

    // The verifier sent to the token endpoint matches the challenge sent to
    // the authorization endpoint
    let calls = exchanger.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].client_id, "client-1");
    assert_eq!(calls[0].code, "code-1");
    assert_eq!(calls[0].redirect_uri, REDIRECT_URI);
    assert_eq!(calls[0].code_verifier.len(), 128);
    assert_eq!(
        query_param(auth_url, "code_challenge"),
        Some(derive_challenge(&calls[0].code_verifier))
    );

    let snapshot = memory.snapshot();
    assert_eq!(snapshot.get(KEY_ACCESS_TOKEN), Some(&json!("access-1")));
    assert_eq!(snapshot.get(KEY_REFRESH_TOKEN), Some(&json!("refresh-1")));
    assert_eq!(snapshot.get(KEY_CLIENT_ID), Some(&json!("client-1")));
    assert!(snapshot.contains_key(KEY_EXPIRES_AT));

    // Transient secrets are gone
    assert!(!snapshot.contains_key(KEY_CODE_VERIFIER));
    assert!(!snapshot.contains_key(KEY_STATE));
    assert!(tabs.opened.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_state_mismatch_never_exchanges() {
    let memory = MemoryStore::new();
    let exchanger = FakeExchanger::default();
    let tabs = FakeTabs::default();
    let auth = authorizer(
        &memory,
        &exchanger,
        FakeLauncher::new(Behavior::WrongState),
        &tabs,
        NoNavigation,
    );

    assert!(matches!(
        auth.authorize("client-1").await,
        Err(AuthError::StateMismatch)
    ));
    assert!(exchanger.calls.lock().unwrap().is_empty());
    assert_eq!(auth.stage(), AuthStage::Failed);

    let snapshot = memory.snapshot();
    assert!(!snapshot.contains_key(KEY_ACCESS_TOKEN));
    assert!(!snapshot.contains_key(KEY_CODE_VERIFIER));
    assert!(!snapshot.contains_key(KEY_STATE));
}

#[tokio::test]
async fn test_denied_redirect_is_auth_denied() {
    let memory = MemoryStore::new();
    let exchanger = FakeExchanger::default();
    let tabs = FakeTabs::default();
    let auth = authorizer(
        &memory,
        &exchanger,
        FakeLauncher::new(Behavior::Denied),
        &tabs,
        NoNavigation,
    );

    let err = auth.authorize("client-1").await.unwrap_err();
    assert!(matches!(err, AuthError::AuthDenied(ref e) if e == "access_denied"));
    assert!(exchanger.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_launch_does_not_fall_back() {
    let memory = MemoryStore::new();
    let exchanger = FakeExchanger::default();
    let tabs = FakeTabs::default();
    let auth = authorizer(
        &memory,
        &exchanger,
        FakeLauncher::new(Behavior::Cancel),
        &tabs,
        NoNavigation,
    );

    assert!(matches!(
        auth.authorize("client-1").await,
        Err(AuthError::AuthDenied(_))
    ));
    assert!(tabs.opened.lock().unwrap().is_empty());
    assert!(!memory.snapshot().contains_key(KEY_CODE_VERIFIER));
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_launcher_falls_back_to_tab() {
    let memory = MemoryStore::new();
    let exchanger = FakeExchanger::default();
    let tabs = FakeTabs::default();
    let navigation = RedirectingNavigation {
        tabs: tabs.clone(),
        served: AtomicUsize::new(0),
    };
    let auth = authorizer(
        &memory,
        &exchanger,
        FakeLauncher::new(Behavior::Unavailable),
        &tabs,
        navigation,
    );

    auth.authorize("client-1").await.unwrap();

    let opened = tabs.opened.lock().unwrap().clone();
    assert_eq!(opened.len(), 1);
    assert_eq!(query_param(&opened[0], "redirect_uri").as_deref(), Some(FALLBACK_URI));
    assert_eq!(tabs.closed.lock().unwrap().as_slice(), &[TabId(1)]);

    // The exchange names the redirect URI the code was issued for
    let calls = exchanger.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].code, "code-2");
    assert_eq!(calls[0].redirect_uri, FALLBACK_URI);
    assert_eq!(
        memory.snapshot().get(KEY_ACCESS_TOKEN),
        Some(&json!("access-1"))
    );
    assert!(!auth.fallback().is_pending());
}

#[tokio::test]
async fn test_no_mechanism_left_is_launch_unavailable() {
    let memory = MemoryStore::new();
    let exchanger = FakeExchanger::default();
    let tabs = FakeTabs {
        fail_open: true,
        ..FakeTabs::default()
    };
    let auth = authorizer(
        &memory,
        &exchanger,
        FakeLauncher::new(Behavior::Unavailable),
        &tabs,
        NoNavigation,
    );

    let err = auth.authorize("client-1").await.unwrap_err();
    assert!(matches!(err, AuthError::LaunchUnavailable(_)));
    assert!(!auth.fallback().is_pending());
    assert!(!memory.snapshot().contains_key(KEY_STATE));
}

#[tokio::test]
async fn test_failed_exchange_stores_nothing() {
    let memory = MemoryStore::new();
    let exchanger = FakeExchanger {
        fail_with: Some("Invalid authorization code".to_string()),
        ..FakeExchanger::default()
    };
    let tabs = FakeTabs::default();
    let auth = authorizer(
        &memory,
        &exchanger,
        FakeLauncher::new(Behavior::EchoState),
        &tabs,
        NoNavigation,
    );

    let err = auth.authorize("client-1").await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid authorization code");

    let snapshot = memory.snapshot();
    assert!(!snapshot.contains_key(KEY_ACCESS_TOKEN));
    assert!(!snapshot.contains_key(KEY_CODE_VERIFIER));
}

#[tokio::test(start_paused = true)]
async fn test_fallback_times_out() {
    let tabs = FakeTabs::default();
    let flow = TabAuthFlow::new(tabs.clone(), NoNavigation, endpoints().redirect_uris());

    let started = tokio::time::Instant::now();
    let result = flow.run("https://accounts.example/authorize?state=s").await;

    assert!(matches!(result, Err(AuthError::AuthTimeout)));
    assert!(started.elapsed() >= FALLBACK_TIMEOUT);
    assert!(!flow.is_pending());
    assert_eq!(tabs.closed.lock().unwrap().as_slice(), &[TabId(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_second_fallback_interrupts_first() {
    let tabs = FakeTabs::default();
    let flow = TabAuthFlow::new(tabs.clone(), NoNavigation, endpoints().redirect_uris());

    let (first, second, observed) = tokio::join!(
        flow.run("https://accounts.example/authorize?state=one"),
        async {
            sleep(Duration::from_secs(1)).await;
            flow.run("https://accounts.example/authorize?state=two").await
        },
        async {
            sleep(Duration::from_secs(2)).await;
            flow.observe(&Navigation {
                tab: TabId(2),
                url: format!("{}?code=abc&state=two", REDIRECT_URI),
            })
        }
    );

    assert!(matches!(first, Err(AuthError::Interrupted)));
    assert_eq!(
        second.unwrap(),
        RedirectParams {
            code: Some("abc".to_string()),
            state: Some("two".to_string()),
            error: None,
        }
    );
    assert!(observed);

    // Both tabs get closed, the interrupted one right away
    assert_eq!(tabs.closed.lock().unwrap().as_slice(), &[TabId(1), TabId(2)]);
}

#[tokio::test(start_paused = true)]
async fn test_interrupted_attempt_keeps_newer_pending_record() {
    let memory = MemoryStore::new();
    let exchanger = FakeExchanger::default();
    let tabs = FakeTabs::default();
    let auth = authorizer(
        &memory,
        &exchanger,
        FakeLauncher::new(Behavior::Unavailable),
        &tabs,
        NoNavigation,
    );

    let (first, _second, stored) = tokio::join!(
        auth.authorize("client-1"),
        async {
            sleep(Duration::from_secs(1)).await;
            auth.authorize("client-1").await
        },
        async {
            sleep(Duration::from_secs(2)).await;
            let pending = auth.fallback().is_pending();
            (pending, memory.snapshot())
        }
    );

    assert!(matches!(first, Err(AuthError::Interrupted)));
    let (still_pending, snapshot) = stored;
    assert!(still_pending);

    // The record on disk is the second attempt's, matching its open tab
    let opened = tabs.opened.lock().unwrap().clone();
    let second_state = query_param(&opened[1], "state").unwrap();
    assert_eq!(snapshot.get(KEY_STATE), Some(&json!(second_state)));
    assert!(snapshot.contains_key(KEY_CODE_VERIFIER));
}

#[tokio::test]
async fn test_loopback_launcher_silence_is_unavailable() {
    let launcher = LoopbackLauncher::new()
        .without_browser()
        .with_timeout(Duration::from_millis(50));

    let result = launcher
        .launch(
            "https://accounts.example/authorize?state=s",
            "http://127.0.0.1:0/callback",
        )
        .await;
    assert!(matches!(result, Err(LaunchError::Unavailable(_))));
}

#[tokio::test]
async fn test_observe_ignores_unrelated_navigation() {
    let flow = TabAuthFlow::new(FakeTabs::default(), NoNavigation, endpoints().redirect_uris());
    // Nothing pending and not a redirect
    assert!(!flow.observe(&Navigation {
        tab: TabId(1),
        url: "https://open.spotify.com/".to_string(),
    }));
    // A redirect with nothing pending
    assert!(!flow.observe(&Navigation {
        tab: TabId(1),
        url: format!("{}?code=abc&state=s", REDIRECT_URI),
    }));
}

#[test]
fn test_validate_redirect_order() {
    let params = RedirectParams {
        code: Some("code".to_string()),
        state: Some("expected".to_string()),
        error: None,
    };
    assert_eq!(validate_redirect(&params, "expected").unwrap(), "code");

    let denied = RedirectParams {
        error: Some("access_denied".to_string()),
        ..params.clone()
    };
    assert!(matches!(
        validate_redirect(&denied, "expected"),
        Err(AuthError::AuthDenied(_))
    ));

    let no_code = RedirectParams {
        code: None,
        ..params.clone()
    };
    assert!(matches!(
        validate_redirect(&no_code, "expected"),
        Err(AuthError::NoAuthorizationCode)
    ));

    // Comparison is exact
    assert!(matches!(
        validate_redirect(&params, "Expected"),
        Err(AuthError::StateMismatch)
    ));
    let missing_state = RedirectParams {
        state: None,
        ..params
    };
    assert!(matches!(
        validate_redirect(&missing_state, "expected"),
        Err(AuthError::StateMismatch)
    ));
}

#[test]
fn test_stage_names() {
    assert_eq!(AuthStage::PkceReady.to_string(), "pkce_ready");
    assert_eq!(AuthStage::AwaitingRedirect.to_string(), "awaiting_redirect");
    assert_eq!(AuthStage::TokenExchanged.to_string(), "token_exchanged");
}

struct FixedTokens;

impl AccessTokens for FixedTokens {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok("token-1".to_string())
    }

    async fn refreshed_access_token(&self) -> Result<String, AuthError> {
        Ok("token-2".to_string())
    }
}

#[tokio::test]
async fn test_background_answers_credential_requests() {
    let memory = MemoryStore::new();
    let exchanger = FakeExchanger::default();
    let tabs = FakeTabs::default();
    let auth = authorizer(
        &memory,
        &exchanger,
        FakeLauncher::new(Behavior::EchoState),
        &tabs,
        NoNavigation,
    );
    let background = Background::new(auth, FixedTokens);

    let request: Request =
        serde_json::from_str(r#"{"action":"initiate_oauth","client_id":"client-1"}"#).unwrap();
    assert_eq!(background.handle(request).await, Some(Response::ok()));

    let response = background.handle(Request::GetAccessToken).await.unwrap();
    assert_eq!(response.access_token.as_deref(), Some("token-1"));
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({"success": true, "access_token": "token-1"})
    );

    // Page requests are not the background's business
    assert_eq!(background.handle(Request::ToggleSearch).await, None);

    let failed = background
        .handle(Request::InitiateOauth {
            client_id: String::new(),
        })
        .await
        .unwrap();
    assert!(!failed.success);
    assert_eq!(failed.error.as_deref(), Some("Invalid client ID provided"));
}

#[test]
fn test_request_wire_format() {
    let toggle: Request = serde_json::from_str(r#"{"action":"toggle-search"}"#).unwrap();
    assert_eq!(toggle, Request::ToggleSearch);

    let changed: Request =
        serde_json::from_str(r#"{"action":"auth_state_changed","authenticated":true}"#).unwrap();
    assert_eq!(changed, Request::AuthStateChanged { authenticated: true });

    assert_eq!(
        serde_json::to_value(Request::GetAccessToken).unwrap(),
        json!({"action": "get_access_token"})
    );
    assert_eq!(
        serde_json::to_value(Response::failure("boom")).unwrap(),
        json!({"success": false, "error": "boom"})
    );
}

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use vidnest::config::Config;
use vidnest::oauth::{FederatedProfile, IdentityProvider};
use vidnest::server::{build_router, AppState};
use vidnest::{db, migrate};

const BOUNDARY: &str = "vidnest-test-boundary";

struct TestApp {
    _tmp: TempDir,
    router: Router,
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

async fn spawn_app() -> TestApp {
    spawn_app_with(None).await
}

async fn spawn_app_with(identity: Option<Arc<dyn IdentityProvider>>) -> TestApp {
    let tmp = TempDir::new().unwrap();
    let config = Config::minimal(tmp.path());
    let pool = db::connect(&config).await.unwrap();
    migrate::apply_schema(&pool).await.unwrap();

    let mut state = AppState::new(config, pool).unwrap();
    if let Some(provider) = identity {
        state = state.with_identity_provider(provider);
    }
    let router = build_router(state).unwrap();
    TestApp { _tmp: tmp, router }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        Reply {
            status,
            headers,
            body,
        }
    }

    async fn json(&self, method: Method, uri: &str, token: Option<&str>, body: Value) -> Reply {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn multipart(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        fields: &[(&str, &str)],
        files: &[(&str, &str, &[u8])],
    ) -> Reply {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = multipart_body(fields, files);
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    /// Registers `name` and logs in, returning (user id, access token).
    async fn signup(&self, name: &str) -> (String, String) {
        let email = format!("{}@example.com", name);
        let reply = self
            .multipart(
                Method::POST,
                "/api/v1/users/register",
                None,
                &[
                    ("fullName", name),
                    ("email", &email),
                    ("username", name),
                    ("password", "correct-horse"),
                ],
                &[("avatar", "avatar.png", b"png-bytes")],
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        let id = reply.body["data"]["_id"].as_str().unwrap().to_string();

        let reply = self
            .json(
                Method::POST,
                "/api/v1/users/login",
                None,
                json!({ "username": name, "password": "correct-horse" }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
        let token = reply.body["data"]["accessToken"].as_str().unwrap().to_string();
        (id, token)
    }

    async fn publish(&self, token: &str, title: &str, published: bool) -> String {
        let flag = if published { "true" } else { "false" };
        let reply = self
            .multipart(
                Method::POST,
                "/api/v1/videos",
                Some(token),
                &[
                    ("title", title),
                    ("description", "a test upload"),
                    ("isPublished", flag),
                ],
                &[
                    ("videoFile", "clip.mp4", b"mp4-bytes"),
                    ("thumbnail", "thumb.png", b"png-bytes"),
                ],
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        reply.body["data"]["_id"].as_str().unwrap().to_string()
    }
}

fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for (name, file_name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&prefix))
        .map(|v| {
            v[prefix.len()..]
                .split(';')
                .next()
                .unwrap_or_default()
                .to_string()
        })
}

// ═══════════════════════════════════════════════════════════════════════
// Health and accounts
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_healthcheck() {
    let app = spawn_app().await;
    let reply = app.call(Method::GET, "/api/v1/healthcheck", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["success"], true);
    assert_eq!(reply.body["data"]["status"], "ok");
    assert!(reply.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_missing_avatar() {
    let app = spawn_app().await;
    app.signup("ana").await;

    let again = app
        .multipart(
            Method::POST,
            "/api/v1/users/register",
            None,
            &[
                ("fullName", "Ana Two"),
                ("email", "ANA@example.com"),
                ("username", "someone"),
                ("password", "correct-horse"),
            ],
            &[("avatar", "avatar.png", b"png")],
        )
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
    assert_eq!(again.body["error"]["code"], "conflict");

    let no_avatar = app
        .multipart(
            Method::POST,
            "/api/v1/users/register",
            None,
            &[
                ("fullName", "Bo"),
                ("email", "bo@example.com"),
                ("username", "bo"),
                ("password", "correct-horse"),
            ],
            &[],
        )
        .await;
    assert_eq!(no_avatar.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_sets_cookies_and_rejects_bad_password() {
    let app = spawn_app().await;
    app.signup("ana").await;

    let bad = app
        .json(
            Method::POST,
            "/api/v1/users/login",
            None,
            json!({ "email": "ana@example.com", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(bad.status, StatusCode::UNAUTHORIZED);

    let ok = app
        .json(
            Method::POST,
            "/api/v1/users/login",
            None,
            json!({ "email": "ana@example.com", "password": "correct-horse" }),
        )
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert!(cookie_value(&ok.headers, "accessToken").is_some());
    assert!(cookie_value(&ok.headers, "refreshToken").is_some());
    assert!(ok.body["data"]["user"].get("passwordHash").is_none());
    assert!(ok.body["data"]["user"].get("refreshToken").is_none());
}

#[tokio::test]
async fn test_refresh_rotates_and_logout_revokes() {
    let app = spawn_app().await;
    app.signup("ana").await;
    let login = app
        .json(
            Method::POST,
            "/api/v1/users/login",
            None,
            json!({ "username": "ana", "password": "correct-horse" }),
        )
        .await;
    let first = login.body["data"]["refreshToken"].as_str().unwrap().to_string();

    let rotated = app
        .json(
            Method::POST,
            "/api/v1/users/refresh-token",
            None,
            json!({ "refreshToken": first }),
        )
        .await;
    assert_eq!(rotated.status, StatusCode::OK, "{}", rotated.body);
    let second = rotated.body["data"]["refreshToken"].as_str().unwrap().to_string();
    let access = rotated.body["data"]["accessToken"].as_str().unwrap().to_string();
    assert_ne!(first, second);

    let reused = app
        .json(
            Method::POST,
            "/api/v1/users/refresh-token",
            None,
            json!({ "refreshToken": first }),
        )
        .await;
    assert_eq!(reused.status, StatusCode::UNAUTHORIZED);

    let logout = app.call(Method::POST, "/api/v1/users/logout", Some(&access)).await;
    assert_eq!(logout.status, StatusCode::OK);

    let after = app
        .json(
            Method::POST,
            "/api/v1/users/refresh-token",
            None,
            json!({ "refreshToken": second }),
        )
        .await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = spawn_app().await;
    let reply = app.call(Method::GET, "/api/v1/users/current-user", None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = app
        .call(Method::GET, "/api/v1/users/current-user", Some("not-a-jwt"))
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password() {
    let app = spawn_app().await;
    let (_, token) = app.signup("ana").await;

    let wrong = app
        .json(
            Method::POST,
            "/api/v1/users/password",
            Some(&token),
            json!({ "oldPassword": "nope-nope", "newPassword": "battery-staple" }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let ok = app
        .json(
            Method::POST,
            "/api/v1/users/password",
            Some(&token),
            json!({ "oldPassword": "correct-horse", "newPassword": "battery-staple" }),
        )
        .await;
    assert_eq!(ok.status, StatusCode::OK);

    let login = app
        .json(
            Method::POST,
            "/api/v1/users/login",
            None,
            json!({ "username": "ana", "password": "battery-staple" }),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
}

// ═══════════════════════════════════════════════════════════════════════
// Channels and subscriptions
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_channel_profile_is_viewer_relative() {
    let app = spawn_app().await;
    let (ana_id, _) = app.signup("ana").await;
    let (_, bo_token) = app.signup("bo").await;

    let toggle = app
        .call(
            Method::POST,
            &format!("/api/v1/subscriptions/c/{}", ana_id),
            Some(&bo_token),
        )
        .await;
    assert_eq!(toggle.status, StatusCode::OK);
    assert_eq!(toggle.body["data"]["state"], "added");

    let profile = app
        .call(Method::GET, "/api/v1/users/c/ANA", Some(&bo_token))
        .await;
    assert_eq!(profile.status, StatusCode::OK, "{}", profile.body);
    assert_eq!(profile.body["data"]["subscribersCount"], 1);
    assert_eq!(profile.body["data"]["isSubscribed"], true);

    let subscribers = app
        .call(
            Method::GET,
            &format!("/api/v1/subscriptions/c/{}", ana_id),
            Some(&bo_token),
        )
        .await;
    assert_eq!(subscribers.body["data"].as_array().unwrap().len(), 1);
    assert_eq!(subscribers.body["data"][0]["username"], "bo");

    let missing = app
        .call(Method::GET, "/api/v1/users/c/nobody", Some(&bo_token))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cannot_subscribe_to_self() {
    let app = spawn_app().await;
    let (ana_id, token) = app.signup("ana").await;
    let reply = app
        .call(
            Method::POST,
            &format!("/api/v1/subscriptions/c/{}", ana_id),
            Some(&token),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_subscription_lists_are_viewer_relative() {
    let app = spawn_app().await;
    let (ana_id, _) = app.signup("ana").await;
    let (bo_id, bo) = app.signup("bo").await;
    let (cy_id, cy) = app.signup("cy").await;

    for (channel, token) in [(&ana_id, &bo), (&ana_id, &cy), (&bo_id, &cy)] {
        let reply = app
            .call(
                Method::POST,
                &format!("/api/v1/subscriptions/c/{}", channel),
                Some(token.as_str()),
            )
            .await;
        assert_eq!(reply.body["data"]["state"], "added");
    }

    let find = |cards: &Value, username: &str| -> Value {
        cards
            .as_array()
            .unwrap()
            .iter()
            .find(|card| card["username"] == username)
            .cloned()
            .unwrap_or_else(|| panic!("no card for {}", username))
    };

    let subscribers = app
        .call(
            Method::GET,
            &format!("/api/v1/subscriptions/c/{}", ana_id),
            Some(&bo),
        )
        .await;
    assert_eq!(subscribers.status, StatusCode::OK, "{}", subscribers.body);
    let cards = &subscribers.body["data"];
    assert_eq!(cards.as_array().unwrap().len(), 2);
    let bo_card = find(cards, "bo");
    assert_eq!(bo_card["_id"], bo_id.as_str());
    assert_eq!(bo_card["subscribersCount"], 1);
    assert_eq!(bo_card["isSubscribed"], false);
    let cy_card = find(cards, "cy");
    assert_eq!(cy_card["subscribersCount"], 0);
    assert_eq!(cy_card["isSubscribed"], false);

    let followed = app
        .call(
            Method::GET,
            &format!("/api/v1/subscriptions/u/{}", cy_id),
            Some(&bo),
        )
        .await;
    assert_eq!(followed.status, StatusCode::OK, "{}", followed.body);
    let cards = &followed.body["data"];
    assert_eq!(cards.as_array().unwrap().len(), 2);
    let ana_card = find(cards, "ana");
    assert_eq!(ana_card["subscribersCount"], 2);
    assert_eq!(ana_card["isSubscribed"], true);
    let bo_card = find(cards, "bo");
    assert_eq!(bo_card["subscribersCount"], 1);
    assert_eq!(bo_card["isSubscribed"], false);

    let as_cy = app
        .call(
            Method::GET,
            &format!("/api/v1/subscriptions/u/{}", cy_id),
            Some(&cy),
        )
        .await;
    assert_eq!(find(&as_cy.body["data"], "bo")["isSubscribed"], true);
}

#[tokio::test]
async fn test_user_lists_distinguish_missing_from_empty() {
    let app = spawn_app().await;
    let (ana_id, ana) = app.signup("ana").await;
    let nobody = "00000000-0000-4000-8000-000000000000";

    for prefix in [
        "/api/v1/subscriptions/c",
        "/api/v1/subscriptions/u",
        "/api/v1/posts/user",
        "/api/v1/playlists/user",
    ] {
        let missing = app
            .call(Method::GET, &format!("{}/{}", prefix, nobody), Some(&ana))
            .await;
        assert_eq!(missing.status, StatusCode::NOT_FOUND, "{}", prefix);

        let empty = app
            .call(Method::GET, &format!("{}/{}", prefix, ana_id), Some(&ana))
            .await;
        assert_eq!(empty.status, StatusCode::OK, "{}: {}", prefix, empty.body);
        assert!(empty.body["data"].as_array().unwrap().is_empty(), "{}", prefix);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Videos
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_fetch_counts_views_and_records_history_once() {
    let app = spawn_app().await;
    let (_, ana) = app.signup("ana").await;
    let (_, bo) = app.signup("bo").await;
    let video = app.publish(&ana, "Cooking basics", true).await;

    let first = app
        .call(Method::GET, &format!("/api/v1/videos/{}", video), Some(&bo))
        .await;
    assert_eq!(first.status, StatusCode::OK, "{}", first.body);
    assert_eq!(first.body["data"]["views"], 1);

    let second = app
        .call(Method::GET, &format!("/api/v1/videos/{}", video), Some(&bo))
        .await;
    assert_eq!(second.body["data"]["views"], 2);

    let history = app.call(Method::GET, "/api/v1/users/history", Some(&bo)).await;
    assert_eq!(history.status, StatusCode::OK);
    let entries = history.body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["_id"], video.as_str());
    assert_eq!(entries[0]["owner"]["username"], "ana");
}

#[tokio::test]
async fn test_search_excludes_unpublished_and_paginates() {
    let app = spawn_app().await;
    let (_, ana) = app.signup("ana").await;
    app.publish(&ana, "Cat video one", true).await;
    app.publish(&ana, "Another CAT video", true).await;
    app.publish(&ana, "Cat secret", false).await;
    app.publish(&ana, "Dog video", true).await;

    let reply = app
        .call(Method::GET, "/api/v1/videos?query=cat&limit=1&page=1", Some(&ana))
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    let data = &reply.body["data"];
    assert_eq!(data["totalDocs"], 2);
    assert_eq!(data["totalPages"], 2);
    assert_eq!(data["hasNextPage"], true);
    assert_eq!(data["docs"].as_array().unwrap().len(), 1);

    let beyond = app
        .call(Method::GET, "/api/v1/videos?query=cat&limit=1&page=5", Some(&ana))
        .await;
    assert_eq!(beyond.body["data"]["totalDocs"], 2);
    assert!(beyond.body["data"]["docs"].as_array().unwrap().is_empty());

    let none = app
        .call(Method::GET, "/api/v1/videos?query=zebra", Some(&ana))
        .await;
    assert_eq!(none.body["data"]["totalDocs"], 0);
    assert_eq!(none.body["data"]["totalPages"], 0);
}

#[tokio::test]
async fn test_search_rejects_bad_input() {
    let app = spawn_app().await;
    let (_, ana) = app.signup("ana").await;

    let empty = app.call(Method::GET, "/api/v1/videos?query=", Some(&ana)).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let missing = app.call(Method::GET, "/api/v1/videos", Some(&ana)).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let sort = app
        .call(Method::GET, "/api/v1/videos?query=a&sortBy=title", Some(&ana))
        .await;
    assert_eq!(sort.status, StatusCode::BAD_REQUEST);

    let direction = app
        .call(Method::GET, "/api/v1/videos?query=a&sortType=sideways", Some(&ana))
        .await;
    assert_eq!(direction.status, StatusCode::BAD_REQUEST);
    assert!(direction.body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("sideways"));

    let page = app
        .call(Method::GET, "/api/v1/videos?query=a&page=0", Some(&ana))
        .await;
    assert_eq!(page.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_sorts_by_views_in_both_directions() {
    let app = spawn_app().await;
    let (_, ana) = app.signup("ana").await;
    let (_, bo) = app.signup("bo").await;
    app.publish(&ana, "Clip quiet", true).await;
    let middle = app.publish(&ana, "Clip middling", true).await;
    let popular = app.publish(&ana, "Clip popular", true).await;

    for (video, views) in [(&middle, 1), (&popular, 2)] {
        for _ in 0..views {
            let reply = app
                .call(Method::GET, &format!("/api/v1/videos/{}", video), Some(&bo))
                .await;
            assert_eq!(reply.status, StatusCode::OK);
        }
    }

    let titles = |reply: &Reply| -> Vec<String> {
        reply.body["data"]["docs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|doc| doc["title"].as_str().unwrap().to_string())
            .collect()
    };

    let asc = app
        .call(
            Method::GET,
            "/api/v1/videos?query=clip&sortBy=views&sortType=asc",
            Some(&ana),
        )
        .await;
    assert_eq!(asc.status, StatusCode::OK, "{}", asc.body);
    assert_eq!(titles(&asc), ["Clip quiet", "Clip middling", "Clip popular"]);

    let desc = app
        .call(
            Method::GET,
            "/api/v1/videos?query=clip&sortBy=views&sortType=desc",
            Some(&ana),
        )
        .await;
    assert_eq!(titles(&desc), ["Clip popular", "Clip middling", "Clip quiet"]);
    assert_eq!(desc.body["data"]["docs"][0]["views"], 2);
}

#[tokio::test]
async fn test_search_matches_non_ascii_case_insensitively() {
    let app = spawn_app().await;
    let (_, ana) = app.signup("ana").await;
    let video = app.publish(&ana, "ÉTUDE in C", true).await;
    app.publish(&ana, "Etude without accent", true).await;

    // étude, ÉTUDE, ÉtUdE
    for query in ["%C3%A9tude", "%C3%89TUDE", "%C3%89tUdE"] {
        let reply = app
            .call(Method::GET, &format!("/api/v1/videos?query={}", query), Some(&ana))
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
        assert_eq!(reply.body["data"]["totalDocs"], 1, "query {}", query);
        assert_eq!(reply.body["data"]["docs"][0]["_id"], video.as_str());
    }

    let renamed = app
        .multipart(
            Method::PATCH,
            &format!("/api/v1/videos/{}", video),
            Some(&ana),
            &[("title", "ÖVERTURE")],
            &[],
        )
        .await;
    assert_eq!(renamed.status, StatusCode::OK, "{}", renamed.body);

    let old = app
        .call(Method::GET, "/api/v1/videos?query=%C3%A9tude", Some(&ana))
        .await;
    assert_eq!(old.body["data"]["totalDocs"], 0);
    let new = app
        .call(Method::GET, "/api/v1/videos?query=%C3%B6verture", Some(&ana))
        .await;
    assert_eq!(new.body["data"]["totalDocs"], 1);
}

#[tokio::test]
async fn test_unpublished_video_hidden_from_others() {
    let app = spawn_app().await;
    let (_, ana) = app.signup("ana").await;
    let (_, bo) = app.signup("bo").await;
    let video = app.publish(&ana, "Draft", false).await;

    let other = app
        .call(Method::GET, &format!("/api/v1/videos/{}", video), Some(&bo))
        .await;
    assert_eq!(other.status, StatusCode::NOT_FOUND);

    let owner = app
        .call(Method::GET, &format!("/api/v1/videos/{}", video), Some(&ana))
        .await;
    assert_eq!(owner.status, StatusCode::OK);

    let toggled = app
        .call(
            Method::PATCH,
            &format!("/api/v1/videos/toggle/publish/{}", video),
            Some(&ana),
        )
        .await;
    assert_eq!(toggled.status, StatusCode::OK);
    assert_eq!(toggled.body["data"]["isPublished"], true);

    let visible = app
        .call(Method::GET, &format!("/api/v1/videos/{}", video), Some(&bo))
        .await;
    assert_eq!(visible.status, StatusCode::OK);
}

#[tokio::test]
async fn test_unpublished_video_rejects_writes_from_others() {
    let app = spawn_app().await;
    let (_, ana) = app.signup("ana").await;
    let (_, bo) = app.signup("bo").await;
    let video = app.publish(&ana, "Draft", false).await;
    let thread = format!("/api/v1/comments/{}", video);
    let like = format!("/api/v1/likes/toggle/v/{}", video);

    let comment = app
        .json(Method::POST, &thread, Some(&bo), json!({ "content": "sneaky" }))
        .await;
    assert_eq!(comment.status, StatusCode::NOT_FOUND, "{}", comment.body);

    let liked = app.call(Method::POST, &like, Some(&bo)).await;
    assert_eq!(liked.status, StatusCode::NOT_FOUND, "{}", liked.body);

    let created = app
        .json(
            Method::POST,
            "/api/v1/playlists",
            Some(&bo),
            json!({ "name": "Mine", "description": "later" }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let playlist = created.body["data"]["_id"].as_str().unwrap().to_string();
    let added = app
        .call(
            Method::PATCH,
            &format!("/api/v1/playlists/add/{}/{}", video, playlist),
            Some(&bo),
        )
        .await;
    assert_eq!(added.status, StatusCode::NOT_FOUND, "{}", added.body);

    let own_comment = app
        .json(Method::POST, &thread, Some(&ana), json!({ "content": "note to self" }))
        .await;
    assert_eq!(own_comment.status, StatusCode::CREATED);
    let own_like = app.call(Method::POST, &like, Some(&ana)).await;
    assert_eq!(own_like.body["data"]["state"], "added");

    let listed = app.call(Method::GET, &thread, Some(&ana)).await;
    assert_eq!(listed.body["data"]["totalDocs"], 1);
}

#[tokio::test]
async fn test_video_ownership_and_malformed_ids() {
    let app = spawn_app().await;
    let (_, ana) = app.signup("ana").await;
    let (_, bo) = app.signup("bo").await;
    let video = app.publish(&ana, "Mine", true).await;

    let stolen = app
        .call(Method::DELETE, &format!("/api/v1/videos/{}", video), Some(&bo))
        .await;
    assert_eq!(stolen.status, StatusCode::FORBIDDEN);

    let toggled = app
        .call(
            Method::PATCH,
            &format!("/api/v1/videos/toggle/publish/{}", video),
            Some(&bo),
        )
        .await;
    assert_eq!(toggled.status, StatusCode::FORBIDDEN);

    let malformed = app
        .call(Method::GET, "/api/v1/videos/not-an-id", Some(&bo))
        .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);

    let absent = app
        .call(
            Method::DELETE,
            "/api/v1/videos/00000000-0000-4000-8000-000000000000",
            Some(&ana),
        )
        .await;
    assert_eq!(absent.status, StatusCode::NOT_FOUND);

    let deleted = app
        .call(Method::DELETE, &format!("/api/v1/videos/{}", video), Some(&ana))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body["data"]["_id"], video.as_str());
}

#[tokio::test]
async fn test_video_update_by_owner() {
    let app = spawn_app().await;
    let (_, ana) = app.signup("ana").await;
    let (_, bo) = app.signup("bo").await;
    let video = app.publish(&ana, "Old title", true).await;
    let uri = format!("/api/v1/videos/{}", video);

    let denied = app
        .multipart(Method::PATCH, &uri, Some(&bo), &[("title", "Hijacked")], &[])
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let empty = app.multipart(Method::PATCH, &uri, Some(&ana), &[], &[]).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let updated = app
        .multipart(
            Method::PATCH,
            &uri,
            Some(&ana),
            &[("title", "New title")],
            &[("thumbnail", "fresh.png", b"png-2")],
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK, "{}", updated.body);
    assert_eq!(updated.body["data"]["title"], "New title");
    assert_eq!(updated.body["data"]["description"], "a test upload");
}

// ═══════════════════════════════════════════════════════════════════════
// Likes, comments, posts
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_like_toggle_twice_restores_state() {
    let app = spawn_app().await;
    let (_, ana) = app.signup("ana").await;
    let (_, bo) = app.signup("bo").await;
    let video = app.publish(&ana, "Likeable", true).await;
    let toggle = format!("/api/v1/likes/toggle/v/{}", video);

    let added = app.call(Method::POST, &toggle, Some(&bo)).await;
    assert_eq!(added.body["data"]["state"], "added");

    let liked = app.call(Method::GET, "/api/v1/likes/videos", Some(&bo)).await;
    assert_eq!(liked.body["data"].as_array().unwrap().len(), 1);

    let detail = app
        .call(Method::GET, &format!("/api/v1/videos/{}", video), Some(&bo))
        .await;
    assert_eq!(detail.body["data"]["likesCount"], 1);
    assert_eq!(detail.body["data"]["isLiked"], true);

    let removed = app.call(Method::POST, &toggle, Some(&bo)).await;
    assert_eq!(removed.body["data"]["state"], "removed");

    let detail = app
        .call(Method::GET, &format!("/api/v1/videos/{}", video), Some(&bo))
        .await;
    assert_eq!(detail.body["data"]["likesCount"], 0);
    assert_eq!(detail.body["data"]["isLiked"], false);

    let missing = app
        .call(
            Method::POST,
            "/api/v1/likes/toggle/v/00000000-0000-4000-8000-000000000000",
            Some(&bo),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_comment_thread_and_ownership() {
    let app = spawn_app().await;
    let (_, ana) = app.signup("ana").await;
    let (_, bo) = app.signup("bo").await;
    let video = app.publish(&ana, "Discuss", true).await;
    let thread = format!("/api/v1/comments/{}", video);

    let blank = app
        .json(Method::POST, &thread, Some(&bo), json!({ "content": "   " }))
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let created = app
        .json(Method::POST, &thread, Some(&bo), json!({ "content": "first!" }))
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let comment = created.body["data"]["_id"].as_str().unwrap().to_string();

    app.call(
        Method::POST,
        &format!("/api/v1/likes/toggle/c/{}", comment),
        Some(&ana),
    )
    .await;

    let listed = app.call(Method::GET, &thread, Some(&ana)).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body["data"]["totalDocs"], 1);
    let first = &listed.body["data"]["docs"][0];
    assert_eq!(first["content"], "first!");
    assert_eq!(first["likesCount"], 1);
    assert_eq!(first["isLiked"], true);
    assert_eq!(first["owner"]["username"], "bo");

    let edit = format!("/api/v1/comments/c/{}", comment);
    let denied = app
        .json(Method::PATCH, &edit, Some(&ana), json!({ "content": "edited" }))
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let ok = app
        .json(Method::PATCH, &edit, Some(&bo), json!({ "content": "edited" }))
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body["data"]["content"], "edited");

    let denied = app.call(Method::DELETE, &edit, Some(&ana)).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    let deleted = app.call(Method::DELETE, &edit, Some(&bo)).await;
    assert_eq!(deleted.status, StatusCode::OK);
}

#[tokio::test]
async fn test_posts_feed_and_ownership() {
    let app = spawn_app().await;
    let (ana_id, ana) = app.signup("ana").await;
    let (_, bo) = app.signup("bo").await;

    let created = app
        .json(Method::POST, "/api/v1/posts", Some(&ana), json!({ "content": "hello" }))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let post = created.body["data"]["_id"].as_str().unwrap().to_string();

    let liked = app
        .call(Method::POST, &format!("/api/v1/likes/toggle/p/{}", post), Some(&bo))
        .await;
    assert_eq!(liked.body["data"]["state"], "added");

    let feed = app
        .call(Method::GET, &format!("/api/v1/posts/user/{}", ana_id), Some(&bo))
        .await;
    assert_eq!(feed.status, StatusCode::OK);
    assert_eq!(feed.body["data"][0]["likesCount"], 1);
    assert_eq!(feed.body["data"][0]["isLiked"], true);

    let uri = format!("/api/v1/posts/{}", post);
    let denied = app
        .json(Method::PATCH, &uri, Some(&bo), json!({ "content": "mine now" }))
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    let denied = app.call(Method::DELETE, &uri, Some(&bo)).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    let deleted = app.call(Method::DELETE, &uri, Some(&ana)).await;
    assert_eq!(deleted.status, StatusCode::OK);
}

// ═══════════════════════════════════════════════════════════════════════
// Playlists and dashboard
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_playlist_membership() {
    let app = spawn_app().await;
    let (ana_id, ana) = app.signup("ana").await;
    let (_, bo) = app.signup("bo").await;
    let video = app.publish(&ana, "Track one", true).await;

    let created = app
        .json(
            Method::POST,
            "/api/v1/playlists",
            Some(&ana),
            json!({ "name": "Favourites", "description": "best of" }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let playlist = created.body["data"]["_id"].as_str().unwrap().to_string();
    let add = format!("/api/v1/playlists/add/{}/{}", video, playlist);

    let added = app.call(Method::PATCH, &add, Some(&ana)).await;
    assert_eq!(added.status, StatusCode::OK, "{}", added.body);
    assert_eq!(added.body["data"]["totalVideos"], 1);
    assert_eq!(added.body["data"]["videos"][0]["_id"], video.as_str());

    let duplicate = app.call(Method::PATCH, &add, Some(&ana)).await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let foreign = app.call(Method::PATCH, &add, Some(&bo)).await;
    assert_eq!(foreign.status, StatusCode::FORBIDDEN);

    let lists = app
        .call(Method::GET, &format!("/api/v1/playlists/user/{}", ana_id), Some(&bo))
        .await;
    assert_eq!(lists.body["data"].as_array().unwrap().len(), 1);
    assert_eq!(lists.body["data"][0]["totalVideos"], 1);

    let remove = format!("/api/v1/playlists/remove/{}/{}", video, playlist);
    let removed = app.call(Method::PATCH, &remove, Some(&ana)).await;
    assert_eq!(removed.status, StatusCode::OK);
    assert_eq!(removed.body["data"]["totalVideos"], 0);
    assert!(removed.body["data"]["videos"].as_array().unwrap().is_empty());

    let again = app.call(Method::PATCH, &remove, Some(&ana)).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);

    let uri = format!("/api/v1/playlists/{}", playlist);
    let denied = app
        .json(Method::PATCH, &uri, Some(&bo), json!({ "name": "Taken" }))
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    let renamed = app
        .json(Method::PATCH, &uri, Some(&ana), json!({ "name": "Renamed" }))
        .await;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.body["data"]["name"], "Renamed");
    assert_eq!(renamed.body["data"]["description"], "best of");

    let denied = app.call(Method::DELETE, &uri, Some(&bo)).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    let deleted = app.call(Method::DELETE, &uri, Some(&ana)).await;
    assert_eq!(deleted.status, StatusCode::OK);
    let gone = app.call(Method::GET, &uri, Some(&ana)).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_dashboard_totals() {
    let app = spawn_app().await;
    let (ana_id, ana) = app.signup("ana").await;
    let (_, bo) = app.signup("bo").await;
    let video = app.publish(&ana, "Stats", true).await;
    app.publish(&ana, "Hidden stats", false).await;

    app.call(Method::GET, &format!("/api/v1/videos/{}", video), Some(&bo))
        .await;
    app.call(Method::POST, &format!("/api/v1/likes/toggle/v/{}", video), Some(&bo))
        .await;
    app.call(Method::POST, &format!("/api/v1/subscriptions/c/{}", ana_id), Some(&bo))
        .await;

    let stats = app.call(Method::GET, "/api/v1/dashboard/stats", Some(&ana)).await;
    assert_eq!(stats.status, StatusCode::OK, "{}", stats.body);
    assert_eq!(stats.body["data"]["totalVideos"], 2);
    assert_eq!(stats.body["data"]["totalViews"], 1);
    assert_eq!(stats.body["data"]["totalLikes"], 1);
    assert_eq!(stats.body["data"]["totalSubscribers"], 1);

    let videos = app
        .call(Method::GET, "/api/v1/dashboard/videos?limit=1", Some(&ana))
        .await;
    assert_eq!(videos.body["data"]["totalDocs"], 2);
    assert_eq!(videos.body["data"]["totalPages"], 2);
}

// ═══════════════════════════════════════════════════════════════════════
// Google sign-in
// ═══════════════════════════════════════════════════════════════════════

struct FakeProvider;

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn authorize_url(&self, state: &str) -> anyhow::Result<String> {
        Ok(format!("https://id.example.test/authorize?state={}", state))
    }

    async fn exchange(&self, code: &str) -> anyhow::Result<FederatedProfile> {
        if code != "good-code" {
            anyhow::bail!("invalid grant");
        }
        Ok(FederatedProfile {
            provider_id: "google-123".to_string(),
            email: "Zoe.Q@example.com".to_string(),
            email_verified: true,
            display_name: "Zoe Q".to_string(),
            photo_url: None,
        })
    }
}

#[tokio::test]
async fn test_google_sign_in_flow() {
    let app = spawn_app_with(Some(Arc::new(FakeProvider))).await;

    let start = app.call(Method::GET, "/api/v1/auth/google", None).await;
    assert!(start.status.is_redirection());
    let state = cookie_value(&start.headers, "oauthState").unwrap();
    let location = start.headers[header::LOCATION].to_str().unwrap();
    assert!(location.contains(&state));

    let mismatch = app
        .send(
            Request::builder()
                .uri("/api/v1/auth/google/callback?code=good-code&state=forged")
                .header(header::COOKIE, format!("oauthState={}", state))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(mismatch.status, StatusCode::BAD_REQUEST);

    let rejected = app
        .send(
            Request::builder()
                .uri(format!("/api/v1/auth/google/callback?code=bad&state={}", state))
                .header(header::COOKIE, format!("oauthState={}", state))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(rejected.status, StatusCode::UNAUTHORIZED);

    let done = app
        .send(
            Request::builder()
                .uri(format!(
                    "/api/v1/auth/google/callback?code=good-code&state={}",
                    state
                ))
                .header(header::COOKIE, format!("oauthState={}", state))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert!(done.status.is_redirection(), "{}", done.status);
    assert_eq!(
        done.headers[header::LOCATION].to_str().unwrap(),
        "/api/v1/users/current-user"
    );
    let token = cookie_value(&done.headers, "accessToken").unwrap();

    let me = app
        .call(Method::GET, "/api/v1/users/current-user", Some(&token))
        .await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["data"]["username"], "zoe.q");
    assert_eq!(me.body["data"]["email"], "zoe.q@example.com");

    let password_login = app
        .json(
            Method::POST,
            "/api/v1/users/login",
            None,
            json!({ "username": "zoe.q", "password": "anything-at-all" }),
        )
        .await;
    assert_eq!(password_login.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_google_sign_in_unconfigured() {
    let app = spawn_app().await;
    let reply = app.call(Method::GET, "/api/v1/auth/google", None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

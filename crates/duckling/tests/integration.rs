//! Integration tests for Duckling using wiremock

use bytes::Bytes;
use duckling::{fetch, ConversionOptions, FetchOptions, Gateway, GatewayOutcome, Status};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn target(server: &MockServer, p: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
}

#[tokio::test]
async fn test_html_is_converted_to_gemtext() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/index.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<h1>Hi</h1>", "text/html; charset=utf-8"),
        )
        .mount(&mock_server)
        .await;

    let gateway = Gateway::default();
    let url = target(&mock_server, "/index.html");

    match gateway.outcome(&url).await {
        GatewayOutcome::ConvertedPage {
            title,
            url: page_url,
            gemtext,
        } => {
            assert_eq!(title, "Hi");
            assert_eq!(page_url, url.as_str());
            assert!(gemtext.contains("# Hi"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let resp = gateway.handle(&url).await;
    assert_eq!(resp.status, Status::Success);
    assert_eq!(resp.meta, "text/gemini");
}

#[tokio::test]
async fn test_full_page_conversion() {
    let mock_server = MockServer::start().await;

    let html = r#"<!DOCTYPE html>
<html>
<head><title>Test Page</title><script>alert('bad');</script></head>
<body>
    <nav><a href="/">Home</a></nav>
    <h1>Hello World</h1>
    <p>Read the <a href="/guide">guide</a> first.</p>
    <ul>
        <li>Item 1</li>
        <li>Item 2</li>
    </ul>
</body>
</html>"#;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html"))
        .mount(&mock_server)
        .await;

    let gateway = Gateway::builder()
        .conversion_options(
            ConversionOptions::builder()
                .numbered_links(true)
                .build()
                .unwrap(),
        )
        .build();
    let resp = gateway.handle(&target(&mock_server, "/")).await;

    let body = String::from_utf8(resp.body.unwrap().to_vec()).unwrap();
    assert!(body.starts_with("# Test Page\n"));
    assert!(body.contains("# Hello World"));
    assert!(body.contains("Read the guide[1] first."));
    assert!(body.contains("=> /guide [1] guide"));
    assert!(body.contains("* Item 1"));
    assert!(body.contains("* Item 2"));
    assert!(!body.contains("alert"));
    assert!(!body.contains("Home"));
}

#[tokio::test]
async fn test_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&mock_server)
        .await;

    let gateway = Gateway::default();
    let url = target(&mock_server, "/missing");

    assert_eq!(gateway.outcome(&url).await, GatewayOutcome::NotFound);

    let resp = gateway.handle(&url).await;
    assert_eq!(resp.status, Status::NotFound);
    assert_eq!(resp.meta, "Not found");
    assert!(resp.body.is_none());
}

#[tokio::test]
async fn test_redirect_is_surfaced() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>moved</p>", "text/html"))
        .mount(&mock_server)
        .await;

    let gateway = Gateway::default();
    let location = target(&mock_server, "/new").to_string();

    assert_eq!(
        gateway.outcome(&target(&mock_server, "/old")).await,
        GatewayOutcome::Redirect {
            location: location.clone()
        }
    );

    let resp = gateway.handle(&target(&mock_server, "/old")).await;
    assert_eq!(resp.status, Status::Redirect);
    assert_eq!(resp.meta, location);
    assert!(resp.body.is_none());
}

#[tokio::test]
async fn test_redirect_to_error_is_still_redirect() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/gone"))
        .mount(&mock_server)
        .await;

    let gateway = Gateway::default();
    let outcome = gateway.outcome(&target(&mock_server, "/old")).await;

    // The unmatched /gone answers 404, but the redirect wins
    assert_eq!(
        outcome,
        GatewayOutcome::Redirect {
            location: target(&mock_server, "/gone").to_string()
        }
    );
}

#[tokio::test]
async fn test_trailing_slash_normalisation_is_not_a_redirect() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("root", "text/plain"))
        .mount(&mock_server)
        .await;

    // "http://127.0.0.1:port" parses to "http://127.0.0.1:port/"
    let url = Url::parse(&mock_server.uri()).unwrap();
    let gateway = Gateway::default();

    assert_eq!(
        gateway.outcome(&url).await,
        GatewayOutcome::Content {
            content_type: "text/plain".to_string(),
            body: Bytes::from_static(b"root"),
        }
    );
}

#[tokio::test]
async fn test_fragment_is_not_a_redirect() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("page", "text/plain"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = target(&mock_server, "/page#section");
    let gateway = Gateway::default();

    assert_eq!(
        gateway.outcome(&url).await,
        GatewayOutcome::Content {
            content_type: "text/plain".to_string(),
            body: Bytes::from_static(b"page"),
        }
    );
}

#[tokio::test]
async fn test_credentials_are_not_a_redirect() {
    let mock_server = MockServer::start().await;

    // user:pw
    Mock::given(method("GET"))
        .and(path("/private"))
        .and(header("authorization", "Basic dXNlcjpwdw=="))
        .respond_with(ResponseTemplate::new(200).set_body_raw("secret", "text/plain"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut url = target(&mock_server, "/private");
    url.set_username("user").unwrap();
    url.set_password(Some("pw")).unwrap();

    let resp = Gateway::default().handle(&url).await;

    assert_eq!(resp.status, Status::Success);
    assert_eq!(resp.meta, "text/plain");
    assert_eq!(resp.body, Some(Bytes::from_static(b"secret")));
}

#[tokio::test]
async fn test_unsupported_scheme() {
    let gateway = Gateway::default();
    let url = Url::parse("ftp://example.org/file").unwrap();

    assert_eq!(
        gateway.outcome(&url).await,
        GatewayOutcome::UnsupportedScheme {
            scheme: "ftp".to_string()
        }
    );

    let resp = gateway.handle(&url).await;
    assert_eq!(resp.status, Status::ProxyRequestRefused);
    assert_eq!(resp.meta, "Scheme not supported: ftp");
}

#[tokio::test]
async fn test_total_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let gateway = Gateway::builder()
        .fetch_options(
            FetchOptions::builder()
                .total_timeout(Duration::from_secs(1))
                .build()
                .unwrap(),
        )
        .build();
    let url = target(&mock_server, "/slow");

    match gateway.outcome(&url).await {
        GatewayOutcome::UpstreamFailure { message } => {
            assert!(message.contains("1 seconds"), "message: {}", message);
            assert!(message.contains(url.as_str()));
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let resp = gateway.handle(&url).await;
    assert_eq!(resp.status, Status::ProxyError);
}

#[tokio::test]
async fn test_json_passthrough() {
    let mock_server = MockServer::start().await;

    let json = r#"{"key": "value"}"#;

    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(json)
                .insert_header("content-type", "application/json"),
        )
        .mount(&mock_server)
        .await;

    let gateway = Gateway::default();
    let url = target(&mock_server, "/data.json");

    assert_eq!(
        gateway.outcome(&url).await,
        GatewayOutcome::Content {
            content_type: "application/json".to_string(),
            body: Bytes::from(json),
        }
    );

    let resp = gateway.handle(&url).await;
    assert_eq!(resp.status, Status::Success);
    assert_eq!(resp.meta, "application/json");
    assert_eq!(resp.body, Some(Bytes::from(json)));
}

#[tokio::test]
async fn test_binary_passthrough() {
    let mock_server = MockServer::start().await;

    let png = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0xFF];

    Mock::given(method("GET"))
        .and(path("/image.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(png.clone())
                .insert_header("content-type", "image/png"),
        )
        .mount(&mock_server)
        .await;

    let resp = Gateway::default()
        .handle(&target(&mock_server, "/image.png"))
        .await;

    assert_eq!(resp.status, Status::Success);
    assert_eq!(resp.meta, "image/png");
    assert_eq!(resp.body.unwrap().to_vec(), png);
}

#[tokio::test]
async fn test_5xx_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/error"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let resp = Gateway::default()
        .handle(&target(&mock_server, "/error"))
        .await;

    assert_eq!(resp.status, Status::ProxyError);
    assert_eq!(resp.meta, "Failure: HTTP status: 500 Internal Server Error");
}

#[tokio::test]
async fn test_unfiltered_html_passthrough() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<h1>Hi</h1>", "text/html"))
        .mount(&mock_server)
        .await;

    let resp = Gateway::builder()
        .filter_markup(false)
        .build()
        .handle(&target(&mock_server, "/"))
        .await;

    assert_eq!(resp.status, Status::Success);
    assert_eq!(resp.meta, "text/html");
    assert_eq!(resp.body, Some(Bytes::from_static(b"<h1>Hi</h1>")));
}

#[tokio::test]
async fn test_custom_user_agent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "DucklingTest/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&mock_server)
        .await;

    let gateway = Gateway::builder()
        .fetch_options(
            FetchOptions::builder()
                .user_agent("DucklingTest/1.0")
                .build()
                .unwrap(),
        )
        .build();

    let resp = gateway.handle(&target(&mock_server, "/")).await;
    assert_eq!(resp.status, Status::Success);
}

#[tokio::test]
async fn test_no_user_agent_by_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&mock_server)
        .await;

    let url = format!("{}/", mock_server.uri());
    let resource = fetch(&url).await.unwrap();
    assert_eq!(resource.status.as_u16(), 200);
    assert_eq!(resource.final_url, url);

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("user-agent").is_none());
}

//! Example: Run a few URLs through the gateway and summarise the responses
//!
//! Run with: cargo run -p duckling --example proxy_urls
//!
//! Needs network access. Exits non-zero when a response does not meet its
//! expectation.

use duckling::{Gateway, Status};
use url::Url;

/// Test case definition
struct TestCase {
    url: &'static str,
    description: &'static str,
    expect_status: Status,
    expect_meta: Option<&'static str>,
    expect_contains: Option<&'static str>,
}

const TEST_CASES: &[TestCase] = &[
    TestCase {
        url: "https://example.com/",
        description: "Simple HTML page",
        expect_status: Status::Success,
        expect_meta: Some("text/gemini"),
        expect_contains: Some("# Example Domain"),
    },
    TestCase {
        url: "https://httpbin.org/json",
        description: "JSON passes through",
        expect_status: Status::Success,
        expect_meta: Some("application/json"),
        expect_contains: Some("slideshow"),
    },
    TestCase {
        url: "https://httpbin.org/redirect-to?url=https%3A%2F%2Fexample.com%2F",
        description: "Redirect is surfaced to the client",
        expect_status: Status::Redirect,
        expect_meta: Some("https://example.com/"),
        expect_contains: None,
    },
    TestCase {
        url: "https://httpbin.org/status/404",
        description: "Missing page",
        expect_status: Status::NotFound,
        expect_meta: None,
        expect_contains: None,
    },
    TestCase {
        url: "ftp://ftp.example.com/",
        description: "Unsupported scheme",
        expect_status: Status::ProxyRequestRefused,
        expect_meta: None,
        expect_contains: None,
    },
];

#[tokio::main]
async fn main() {
    println!("Duckling URL Examples");
    println!("=====================\n");

    let gateway = Gateway::default();
    let mut passed = 0;
    let mut failed = 0;

    for (i, case) in TEST_CASES.iter().enumerate() {
        println!("{}. {}", i + 1, case.description);
        println!("   URL: {}", case.url);

        let url = match Url::parse(case.url) {
            Ok(url) => url,
            Err(e) => {
                println!("   Invalid URL: {}", e);
                failed += 1;
                continue;
            }
        };

        let response = gateway.handle(&url).await;
        println!("   Header: {} {}", response.status, response.meta);

        let body = response
            .body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default();
        if !body.is_empty() {
            let preview: String = body.chars().take(100).collect();
            println!(
                "   Preview: {}{}",
                preview.replace('\n', " "),
                if body.len() > 100 { "..." } else { "" }
            );
        }

        let mut ok = response.status == case.expect_status;
        if let Some(meta) = case.expect_meta {
            ok &= response.meta == meta;
        }
        if let Some(text) = case.expect_contains {
            ok &= body.contains(text);
        }

        if ok {
            println!("   ✓ PASS\n");
            passed += 1;
        } else {
            println!("   ✗ FAIL (expectations not met)\n");
            failed += 1;
        }
    }

    println!("=====================");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed > 0 {
        std::process::exit(1);
    }
}

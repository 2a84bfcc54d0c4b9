mod common;

use std::time::{Duration, Instant};

use chickadee::resolver::{
    HttpResponse, IpApiResolver, RateLimit, Resolver, VirusTotalResolver,
};
use chickadee::FieldSpec;
use common::{batch_echo, ok_json, Scripted};
use serde_json::json;

fn geo_fields() -> FieldSpec {
    FieldSpec::parse("query,count,as,country,status,message")
}

/// Throttled once with an advertised reset, then answered.
#[test]
fn throttled_request_is_retried_after_reset() {
    let script = Scripted::new(vec![
        HttpResponse::new(429, "").with_header("X-Ttl", "1"),
        ok_json(json!({"query": "8.8.8.8", "status": "success", "country": "United States"})),
    ]);
    let mut resolver = IpApiResolver::free(script.clone(), "en");

    let start = Instant::now();
    let rec = resolver.resolve_one("8.8.8.8", &geo_fields());

    assert_eq!(rec["status"], "success");
    assert_eq!(rec["country"], "United States");
    assert_eq!(script.request_count(), 2);
    assert!(start.elapsed() >= Duration::from_secs(1));
    let reqs = script.requests();
    assert!(reqs[1].at.duration_since(reqs[0].at) >= Duration::from_secs(1));
}

/// Exhausted quota on a success holds back the next request.
#[test]
fn exhausted_quota_holds_next_request() {
    let script = Scripted::new(vec![
        ok_json(json!({"query": "1.1.1.1"}))
            .with_header("X-Rl", "0")
            .with_header("X-Ttl", "1"),
        ok_json(json!({"query": "9.9.9.9"})).with_header("X-Rl", "14"),
    ]);
    let mut resolver = IpApiResolver::free(script.clone(), "en");
    resolver.resolve_one("1.1.1.1", &geo_fields());
    resolver.resolve_one("9.9.9.9", &geo_fields());

    let reqs = script.requests();
    assert_eq!(reqs.len(), 2);
    assert!(reqs[1].at.duration_since(reqs[0].at) >= Duration::from_secs(1));
}

#[test]
fn unauthorized_is_not_retried() {
    let script = Scripted::new(vec![
        HttpResponse::new(403, "forbidden"),
        ok_json(json!({"query": "8.8.8.8"})),
    ]);
    let mut resolver = IpApiResolver::pro(script.clone(), "bad-key", "en");
    let rec = resolver.resolve_one("8.8.8.8", &geo_fields());

    assert_eq!(rec["status"], "failed");
    assert_eq!(rec["query"], "8.8.8.8");
    assert!(rec["message"].as_str().unwrap().contains("authorization"));
    assert_eq!(script.request_count(), 1);
}

#[test]
fn transport_failure_becomes_record() {
    let script = Scripted::new(vec![]);
    let mut resolver = IpApiResolver::free(script.clone(), "en");
    let rec = resolver.resolve_one("8.8.8.8", &geo_fields());
    assert_eq!(rec["status"], "failed");
    assert_eq!(script.request_count(), 1);
}

#[test]
fn batches_are_chunked_by_hundred() {
    let addresses: Vec<String> = (0..250)
        .map(|i| format!("8.8.{}.{}", i / 200, i % 200 + 1))
        .collect();
    let script = Scripted::new(vec![
        batch_echo(&addresses[0..100]),
        batch_echo(&addresses[100..200]),
        batch_echo(&addresses[200..250]),
    ]);
    let mut resolver = IpApiResolver::free(script.clone(), "ja");
    let records = resolver.resolve_many(&addresses, &geo_fields());

    assert_eq!(records.len(), 250);
    assert_eq!(records[249]["query"], addresses[249].as_str());
    let reqs = script.requests();
    let sizes: Vec<usize> = reqs
        .iter()
        .map(|r| r.body.as_ref().unwrap().as_array().unwrap().len())
        .collect();
    assert_eq!(sizes, vec![100, 100, 50]);
    assert!(reqs.iter().all(|r| r.method == "POST" && r.url.ends_with("/batch")));
    assert_eq!(reqs[0].param("lang"), Some("ja"));
    assert_eq!(reqs[0].param("fields"), Some("query,as,country,status,message"));
    assert_eq!(reqs[0].body.as_ref().unwrap()[0], json!({"query": "8.8.0.1"}));
}

#[test]
fn throttled_batch_is_resent_unchanged() {
    let addresses: Vec<String> = vec!["8.8.8.8".into(), "1.1.1.1".into()];
    let script = Scripted::new(vec![
        HttpResponse::new(429, ""),
        batch_echo(&addresses),
    ]);
    let limit = RateLimit::new(true).with_cooldown(Duration::from_millis(150));
    let mut resolver = IpApiResolver::free(script.clone(), "en").with_rate_limit(limit);

    let start = Instant::now();
    let records = resolver.resolve_many(&addresses, &geo_fields());

    assert!(start.elapsed() >= Duration::from_millis(150));
    let reqs = script.requests();
    assert_eq!(reqs.len(), 2);
    assert_eq!(reqs[0].body, reqs[1].body);
    assert!(reqs[1].at.duration_since(reqs[0].at) >= Duration::from_millis(150));
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r["status"] == "success"));
}

#[test]
fn exhausted_quota_delays_next_chunk() {
    let addresses: Vec<String> = (1..=150).map(|i| format!("4.4.{}.{}", i / 100, i % 100)).collect();
    let first: Vec<serde_json::Value> = addresses[..100]
        .iter()
        .map(|a| json!({"query": a, "status": "success"}))
        .collect();
    let script = Scripted::new(vec![
        ok_json(serde_json::Value::Array(first))
            .with_header("X-Rl", "0")
            .with_header("X-Ttl", "1"),
        batch_echo(&addresses[100..]),
    ]);
    let mut resolver = IpApiResolver::free(script.clone(), "en");
    let records = resolver.resolve_many(&addresses, &geo_fields());

    assert_eq!(records.len(), 150);
    let reqs = script.requests();
    assert_eq!(reqs.len(), 2);
    assert_eq!(reqs[1].body.as_ref().unwrap().as_array().unwrap().len(), 50);
    assert!(reqs[1].at.duration_since(reqs[0].at) >= Duration::from_secs(1));
}

#[test]
fn batch_rejection_fails_only_that_chunk() {
    let addresses: Vec<String> = (1..=150).map(|i| format!("9.9.{}.{}", i / 100, i % 100)).collect();
    let script = Scripted::new(vec![
        HttpResponse::new(500, ""),
        batch_echo(&addresses[100..]),
    ]);
    let mut resolver = IpApiResolver::free(script.clone(), "en");
    let records = resolver.resolve_many(&addresses, &geo_fields());

    assert_eq!(records.len(), 150);
    assert!(records[..100].iter().all(|r| r["status"] == "failed"));
    assert!(records[100..].iter().all(|r| r["status"] == "success"));
}

#[test]
fn virustotal_cools_down_on_no_content() {
    let script = Scripted::new(vec![
        HttpResponse::new(204, ""),
        ok_json(json!({"response_code": 1, "asn": 15169, "as_owner": "Google LLC", "country": "US"})),
    ]);
    let limit = RateLimit::new(true).with_cooldown(Duration::from_millis(200));
    let mut resolver = VirusTotalResolver::new(script.clone(), "k3y", "en").with_rate_limit(limit);

    let start = Instant::now();
    let rec = resolver.resolve_one("8.8.8.8", &FieldSpec::default());

    assert!(start.elapsed() >= Duration::from_millis(200));
    assert_eq!(script.request_count(), 2);
    assert_eq!(rec["asn"], "AS15169 Google LLC");
    let req = &script.requests()[0];
    assert_eq!(req.param("apikey"), Some("k3y"));
    assert_eq!(req.param("ip"), Some("8.8.8.8"));
}

#[test]
fn virustotal_status_taxonomy() {
    let script = Scripted::new(vec![
        HttpResponse::new(400, ""),
        HttpResponse::new(403, ""),
        HttpResponse::new(502, ""),
    ]);
    let mut resolver = VirusTotalResolver::new(script.clone(), "k", "en");
    let addresses = vec!["1.1.1.1".to_string(), "2.2.2.2".into(), "3.3.3.3".into()];
    let records = resolver.resolve_many(&addresses, &FieldSpec::default());

    assert!(!resolver.supports_batch());
    assert_eq!(script.request_count(), 3);
    let messages: Vec<&str> = records.iter().map(|r| r["message"].as_str().unwrap()).collect();
    assert!(messages[0].contains("invalid request"));
    assert!(messages[1].contains("authorization"));
    assert!(messages[2].contains("unavailable"));
    assert!(records.iter().all(|r| r["status"] == "failed"));
    assert_eq!(records[2]["query"], "3.3.3.3");
}

#[test]
fn language_falls_back_silently() {
    let script = Scripted::new(vec![ok_json(json!({"query": "1.1.1.1"}))]);
    let mut resolver = IpApiResolver::free(script.clone(), "tlh");
    assert_eq!(resolver.language(), "en");
    resolver.resolve_one("1.1.1.1", &geo_fields());
    assert_eq!(script.requests()[0].param("lang"), Some("en"));

    let vt = VirusTotalResolver::new(Scripted::new(vec![]), "k", "de");
    assert_eq!(vt.language(), "en");
}

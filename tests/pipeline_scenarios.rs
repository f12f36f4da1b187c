// tests/pipeline_scenarios.rs
//
// End-to-end pipeline behavior with in-memory providers, verifier and rationale backend.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::{cand, recommender, FakeProvider, FakeRationale, FakeVerifier, RationaleMode};
use tolearn_recommender::recommend::{ProviderKind, RecommendError, RecommendQuery};

#[tokio::test]
async fn pf_loan_scenario_dedupes_verifies_and_explains() {
    let dup = cand(ProviderKind::Tavily, "PF 대출 구조", "https://news.example/pf");
    let mut items = vec![
        dup.clone(),
        cand(ProviderKind::Tavily, "PF 부실 사례", "https://news.example/case"),
        dup,
        cand(ProviderKind::Tavily, "브릿지론 이해", "https://edu.example/bridge"),
        cand(ProviderKind::Tavily, "죽은 링크", "https://dead.example/x"),
    ];
    // The dead link has the best provider score; reachability must still win.
    items[4].score = Some(0.99);

    let tavily = Arc::new(FakeProvider::ok(ProviderKind::Tavily, items));
    let dart = Arc::new(FakeProvider::ok(
        ProviderKind::Dart,
        vec![cand(ProviderKind::Dart, "분기보고서", "https://dart.example/1")],
    ));
    let verifier = Arc::new(FakeVerifier::new([
        "https://news.example/pf",
        "https://news.example/case",
        "https://edu.example/bridge",
    ]));
    let rationale = Arc::new(FakeRationale::new(RationaleMode::Disabled));
    let rec = recommender(vec![tavily.clone(), dart.clone()], verifier.clone(), rationale);

    let q = RecommendQuery::for_topic("PF 대출 리스크", 3)
        .with_providers(vec![ProviderKind::Tavily]);
    let out = rec.recommend(&q).await.expect("pipeline succeeds");

    assert_eq!(dart.calls(), 0, "unrequested provider must not be called");
    assert_eq!(verifier.calls(), 4, "four unique links probed");
    assert_eq!(out.len(), 3);
    assert!(out.iter().all(|c| c.verified == Some(true)));
    assert!(out.iter().all(|c| c.link != "https://dead.example/x"));
    for c in &out {
        let reason = c.reason.as_deref().unwrap_or_default();
        assert!(!reason.is_empty());
        assert!(reason.starts_with("PF 대출 리스크와"));
    }
}

#[tokio::test]
async fn failing_provider_does_not_abort_siblings() {
    let broken = Arc::new(FakeProvider::failing(ProviderKind::Tavily));
    let dart = Arc::new(FakeProvider::ok(
        ProviderKind::Dart,
        vec![
            cand(ProviderKind::Dart, "사업보고서", "https://dart.example/a"),
            cand(ProviderKind::Dart, "감사보고서", "https://dart.example/b"),
        ],
    ));
    let verifier = Arc::new(FakeVerifier::new(["https://dart.example/b"]));
    let rationale = Arc::new(FakeRationale::new(RationaleMode::Disabled));
    let rec = recommender(vec![broken.clone(), dart], verifier, rationale);

    let out = rec
        .recommend(&RecommendQuery::for_topic("삼성전자", 5))
        .await
        .expect("partial failure is absorbed");

    assert_eq!(broken.calls(), 1);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].link, "https://dart.example/b");
    assert_eq!(out[0].verified, Some(true));
    assert_eq!(out[1].verified, Some(false));
}

#[tokio::test]
async fn no_configured_provider_fails_before_any_call() {
    let tavily = Arc::new(FakeProvider::unconfigured(ProviderKind::Tavily));
    let kif = Arc::new(FakeProvider::unconfigured(ProviderKind::KifEdu));
    let verifier = Arc::new(FakeVerifier::new([]));
    let rationale = Arc::new(FakeRationale::new(RationaleMode::Fail));
    let rec = recommender(vec![tavily.clone(), kif.clone()], verifier.clone(), rationale.clone());

    let err = rec
        .recommend(&RecommendQuery::for_topic("금리", 3))
        .await
        .unwrap_err();

    assert_eq!(err, RecommendError::NoProviderAvailable);
    assert_eq!(err.code(), "RECOMMEND_PROVIDER_MISSING");
    assert_eq!(tavily.calls() + kif.calls(), 0);
    assert_eq!(verifier.calls(), 0);
    assert_eq!(rationale.calls(), 0);
}

#[tokio::test]
async fn requesting_only_unconfigured_providers_is_a_config_error() {
    let tavily = Arc::new(FakeProvider::ok(
        ProviderKind::Tavily,
        vec![cand(ProviderKind::Tavily, "t", "https://t")],
    ));
    let dart = Arc::new(FakeProvider::unconfigured(ProviderKind::Dart));
    let rec = recommender(
        vec![tavily.clone(), dart],
        Arc::new(FakeVerifier::new([])),
        Arc::new(FakeRationale::new(RationaleMode::Disabled)),
    );

    let q = RecommendQuery::for_topic("금리", 3).with_providers(vec![ProviderKind::Dart]);
    let err = rec.recommend(&q).await.unwrap_err();
    assert_eq!(err, RecommendError::NoProviderAvailable);
    assert_eq!(tavily.calls(), 0);
}

#[tokio::test]
async fn empty_upstream_skips_verification_and_rationale() {
    let tavily = Arc::new(FakeProvider::ok(ProviderKind::Tavily, vec![]));
    let broken = Arc::new(FakeProvider::failing(ProviderKind::KifEdu));
    let verifier = Arc::new(FakeVerifier::new([]));
    let rationale = Arc::new(FakeRationale::new(RationaleMode::Fail));
    let rec = recommender(vec![tavily, broken], verifier.clone(), rationale.clone());

    let err = rec
        .recommend(&RecommendQuery::for_topic("예금자 보호", 3))
        .await
        .unwrap_err();

    assert_eq!(err, RecommendError::EmptyUpstream);
    assert_eq!(err.code(), "RECOMMENDATION_EMPTY");
    assert_ne!(err.code(), RecommendError::NothingVerified.code());
    assert_eq!(verifier.calls(), 0);
    assert_eq!(rationale.calls(), 0);
}

#[tokio::test]
async fn fanout_limit_is_inflated_with_a_floor() {
    let tavily = Arc::new(FakeProvider::ok(
        ProviderKind::Tavily,
        vec![cand(ProviderKind::Tavily, "t", "https://t")],
    ));
    let rec = recommender(
        vec![tavily.clone()],
        Arc::new(FakeVerifier::new([])),
        Arc::new(FakeRationale::new(RationaleMode::Disabled)),
    );

    rec.recommend(&RecommendQuery::for_topic("x", 1)).await.unwrap();
    assert_eq!(tavily.last_limit.load(std::sync::atomic::Ordering::SeqCst), 6);

    rec.recommend(&RecommendQuery::for_topic("x", 4)).await.unwrap();
    assert_eq!(tavily.last_limit.load(std::sync::atomic::Ordering::SeqCst), 12);
}

#[tokio::test]
async fn verification_is_bounded_to_four_times_limit() {
    let items = (0..10)
        .map(|i| {
            let link = format!("https://x.example/{i}");
            cand(ProviderKind::Tavily, &format!("자료 {i}"), &link)
        })
        .collect();
    let tavily = Arc::new(FakeProvider::ok(ProviderKind::Tavily, items));
    let verifier = Arc::new(FakeVerifier::new(["https://x.example/9"]));
    let rec = recommender(
        vec![tavily],
        verifier.clone(),
        Arc::new(FakeRationale::new(RationaleMode::Disabled)),
    );

    let out = rec.recommend(&RecommendQuery::for_topic("x", 1)).await.unwrap();
    assert_eq!(verifier.calls(), 4);
    // The only reachable link was never probed, so nothing is verified.
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].title, "자료 0");
    assert_eq!(out[0].verified, Some(false));
}

#[tokio::test]
async fn provider_order_breaks_ties_regardless_of_completion_order() {
    let slow_dart = Arc::new(
        FakeProvider::ok(
            ProviderKind::Dart,
            vec![cand(ProviderKind::Dart, "dart first", "https://d")],
        )
        .delayed(Duration::from_millis(80)),
    );
    let fast_tavily = Arc::new(FakeProvider::ok(
        ProviderKind::Tavily,
        vec![cand(ProviderKind::Tavily, "tavily second", "https://t")],
    ));
    let rec = recommender(
        vec![fast_tavily, slow_dart],
        Arc::new(FakeVerifier::new(["https://d", "https://t"])),
        Arc::new(FakeRationale::new(RationaleMode::Disabled)),
    );

    let q = RecommendQuery::for_topic("x", 2)
        .with_providers(vec![ProviderKind::Dart, ProviderKind::Tavily]);
    let out = rec.recommend(&q).await.unwrap();
    let titles: Vec<&str> = out.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["dart first", "tavily second"]);
}

#[tokio::test]
async fn llm_reasons_are_used_and_gaps_fall_back_per_item() {
    let tavily = Arc::new(FakeProvider::ok(
        ProviderKind::Tavily,
        vec![
            cand(ProviderKind::Tavily, "a", "https://a"),
            cand(ProviderKind::Tavily, "b", "https://b"),
        ],
    ));
    let mut answers = HashMap::new();
    answers.insert("https://a".to_string(), "금리 구조를 쉽게 설명합니다.".to_string());
    let rationale = Arc::new(FakeRationale::new(RationaleMode::Answer(answers)));
    let rec = recommender(
        vec![tavily],
        Arc::new(FakeVerifier::new(["https://a", "https://b"])),
        rationale.clone(),
    );

    let out = rec.recommend(&RecommendQuery::for_topic("금리", 2)).await.unwrap();
    assert_eq!(rationale.calls(), 1, "one batched call");
    assert_eq!(out[0].reason.as_deref(), Some("금리 구조를 쉽게 설명합니다."));
    assert_eq!(
        out[1].reason.as_deref(),
        Some("금리와 직접적으로 연관된 최신 자료입니다: b 설명")
    );
}

#[tokio::test]
async fn failing_rationale_backend_degrades_to_templates() {
    let tavily = Arc::new(FakeProvider::ok(
        ProviderKind::Tavily,
        vec![cand(ProviderKind::Tavily, "a", "https://a")],
    ));
    let rec = recommender(
        vec![tavily],
        Arc::new(FakeVerifier::new([])),
        Arc::new(FakeRationale::new(RationaleMode::Fail)),
    );

    let out = rec.recommend(&RecommendQuery::for_topic("ETF", 3)).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(
        out[0].reason.as_deref(),
        Some("ETF와 직접적으로 연관된 최신 자료입니다: a 설명")
    );
}

#[tokio::test]
async fn links_differing_only_by_query_are_verified_separately() {
    let viewer = "https://dart.fss.or.kr/dsaf001/main.do";
    let dart = Arc::new(FakeProvider::ok(
        ProviderKind::Dart,
        vec![
            cand(ProviderKind::Dart, "사업보고서", &format!("{viewer}?rcpNo=1")),
            cand(ProviderKind::Dart, "감사보고서", &format!("{viewer}?rcpNo=2")),
        ],
    ));
    let verifier = Arc::new(FakeVerifier::new([
        "https://dart.fss.or.kr/dsaf001/main.do?rcpNo=1",
    ]));
    let rec = recommender(
        vec![dart],
        verifier.clone(),
        Arc::new(FakeRationale::new(RationaleMode::Disabled)),
    );

    let out = rec.recommend(&RecommendQuery::for_topic("삼성전자", 2)).await.unwrap();
    assert_eq!(verifier.calls(), 2);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].link, format!("{viewer}?rcpNo=1"));
    assert_eq!(out[0].verified, Some(true));
    assert_eq!(out[1].link, format!("{viewer}?rcpNo=2"));
    assert_eq!(
        out[1].verified,
        Some(false),
        "unreachable filing must not inherit a sibling's result"
    );
}

#[tokio::test]
async fn repeated_links_are_checked_once() {
    let tavily = Arc::new(FakeProvider::ok(
        ProviderKind::Tavily,
        vec![
            cand(ProviderKind::Tavily, "금리 기초", "https://b.example/rate"),
            cand(ProviderKind::Tavily, "금리 입문", "https://b.example/rate"),
        ],
    ));
    let verifier = Arc::new(FakeVerifier::new(["https://b.example/rate"]));
    let rec = recommender(
        vec![tavily],
        verifier.clone(),
        Arc::new(FakeRationale::new(RationaleMode::Disabled)),
    );

    let out = rec.recommend(&RecommendQuery::for_topic("금리", 2)).await.unwrap();
    assert_eq!(verifier.calls(), 1);
    assert!(out.iter().all(|c| c.verified == Some(true)));
}

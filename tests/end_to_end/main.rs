//! End-to-end runs against a local fake of the lookup sites
//!
//! Every test spins up its own site on an ephemeral port and drives a full
//! coordinator run with an in-memory store as both source and sink.

mod fake_site;

use std::time::Duration;

use dni_fetcher::app::{
    Coordinator, CoordinatorConfig, Field, LookupVariant, MemoryStore, RateGateConfig,
    RetryPolicy, WorkerConfig,
};

use fake_site::{FakeSite, Person, Reply};

/// Configuration with no pacing, no backoff waits and a generous budget
fn fast_config(site: &FakeSite, variant: LookupVariant, workers: usize) -> CoordinatorConfig {
    let mut config = CoordinatorConfig::default()
        .with_variant(variant)
        .with_base_url(site.base_url())
        .with_progress(false);
    config.worker = WorkerConfig::unpaced(workers);
    config.rate = RateGateConfig {
        max_per_window: 100,
        window: Duration::from_secs(1),
        min_interval: Duration::ZERO,
        safety_margin: Duration::ZERO,
    };
    config.session.rotation_pause = Duration::ZERO;
    config.session.request_timeout = Duration::from_secs(5);
    config.session.connect_timeout = Duration::from_secs(2);
    config.retry = RetryPolicy {
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        rate_limit_cooldown: Duration::ZERO,
        rate_limit_step: Duration::ZERO,
        ..Default::default()
    };
    config
}

fn person(given: &'static str, paternal: &'static str, maternal: &'static str) -> Person {
    Person {
        given_names: given,
        paternal,
        maternal,
        ..Default::default()
    }
}

/// Ten identifiers, two workers, five requests per window
#[tokio::test]
async fn test_batch_respects_shared_window() {
    let site = FakeSite::start().await;
    let ids: Vec<String> = (1..=10).map(|n| format!("{:08}", 40_000_000 + n)).collect();
    for id in &ids {
        site.add_person(id, person("ANA MARIA", "LOPEZ", "QUISPE"));
    }

    let mut config = fast_config(&site, LookupVariant::FullName, 2);
    config.rate = RateGateConfig {
        max_per_window: 5,
        window: Duration::from_secs(1),
        min_interval: Duration::ZERO,
        safety_margin: Duration::from_millis(100),
    };

    let store = MemoryStore::with_pending(ids.clone());
    let summary = Coordinator::new(config)
        .run(&store, store.clone())
        .await
        .unwrap();

    assert_eq!(summary.total, 10);
    assert_eq!(summary.succeeded, 10);
    assert_eq!(summary.failed, 0);
    assert_eq!(store.written().await.len(), 10);
    assert_eq!(site.token_mismatches(), 0);

    // Proactive rotation after every third lookup
    assert!(site.token_pages() >= 4);
    assert_eq!(summary.rotations, site.token_pages() - 2);

    let arrivals = site.arrivals();
    assert_eq!(summary.requests, arrivals.len() as u64);
    for pair in arrivals.windows(6) {
        assert!(
            pair[5].duration_since(pair[0]) >= Duration::from_secs(1),
            "six requests inside one window"
        );
    }
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let site = FakeSite::start().await;
    site.add_person("11111111", person("LUIS", "RAMOS", "PEREZ"));

    let store = MemoryStore::with_pending(["00000000", "11111111"]);
    let summary = Coordinator::new(fast_config(&site, LookupVariant::FullName, 1))
        .run(&store, store.clone())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures_by_category.get("not_found"), Some(&1));
    assert_eq!(site.submissions_for("00000000"), 1);
    assert_eq!(
        store.value("11111111", Field::PaternalSurname).await.as_deref(),
        Some("RAMOS")
    );
}

#[tokio::test]
async fn test_partial_record_is_saved() {
    let site = FakeSite::start().await;
    site.add_person("22222222", person("ROSA", "HUAMAN", ""));

    let store = MemoryStore::with_pending(["22222222"]);
    let summary = Coordinator::new(fast_config(&site, LookupVariant::FullName, 1))
        .run(&store, store.clone())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(
        store.value("22222222", Field::GivenNames).await.as_deref(),
        Some("ROSA")
    );
    assert_eq!(store.value("22222222", Field::MaternalSurname).await, None);
}

#[tokio::test]
async fn test_rate_limit_rotates_session() {
    let site = FakeSite::start().await;
    site.add_person("33333333", person("JUAN", "TORRES", "DIAZ"));
    site.script("33333333", vec![Reply::Status(429)]);

    let mut config = fast_config(&site, LookupVariant::FullName, 1);
    config.session.rotate_every = 0;

    let store = MemoryStore::with_pending(["33333333"]);
    let summary = Coordinator::new(config)
        .run(&store, store.clone())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(site.submissions_for("33333333"), 2);
    assert_eq!(site.token_pages(), 2);
    assert_eq!(summary.rotations, 1);
    assert_eq!(site.token_mismatches(), 0);
}

/// An expired CSRF token (HTTP 419) is retried on a fresh session
#[tokio::test]
async fn test_expired_token_rotates_session() {
    let site = FakeSite::start().await;
    site.add_person("31313131", person("IRMA", "QUISPE", "ROJAS"));
    site.script("31313131", vec![Reply::Status(419)]);

    let mut config = fast_config(&site, LookupVariant::FullName, 1);
    config.session.rotate_every = 0;

    let store = MemoryStore::with_pending(["31313131"]);
    let summary = Coordinator::new(config)
        .run(&store, store.clone())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(site.submissions_for("31313131"), 2);
    assert_eq!(site.token_pages(), 2);
    assert_eq!(summary.rotations, 1);
    assert_eq!(
        store.value("31313131", Field::GivenNames).await.as_deref(),
        Some("IRMA")
    );
}

/// A 5xx reply is retried without giving up the session
#[tokio::test]
async fn test_server_error_retries_same_session() {
    let site = FakeSite::start().await;
    site.add_person("32323232", person("OSCAR", "MEZA", "LUNA"));
    site.script("32323232", vec![Reply::Status(503)]);

    let mut config = fast_config(&site, LookupVariant::FullName, 1);
    config.session.rotate_every = 0;

    let store = MemoryStore::with_pending(["32323232"]);
    let summary = Coordinator::new(config)
        .run(&store, store.clone())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(site.submissions_for("32323232"), 2);
    assert_eq!(site.token_pages(), 1);
    assert_eq!(summary.rotations, 0);
}

/// Repeated refusals exhaust the retries; the next identifier gets a new session
#[tokio::test]
async fn test_access_denied_exhausts_retries() {
    let site = FakeSite::start().await;
    site.add_person("44444444", person("ELENA", "CASTRO", "VEGA"));
    site.add_person("55555555", person("PEDRO", "SALAS", "MORI"));
    site.script("44444444", vec![Reply::Body("-1"), Reply::Body("-1")]);

    let mut config = fast_config(&site, LookupVariant::FullName, 1);
    config.session.rotate_every = 0;
    config.retry.max_attempts = 2;

    let store = MemoryStore::with_pending(["44444444", "55555555"]);
    let summary = Coordinator::new(config)
        .run(&store, store.clone())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failures_by_category.get("retries_exhausted"), Some(&1));
    assert_eq!(site.submissions_for("44444444"), 2);
    assert_eq!(site.token_pages(), 3);
    assert!(store.value("55555555", Field::GivenNames).await.is_some());
}

#[tokio::test]
async fn test_invalid_identifier_makes_no_request() {
    let site = FakeSite::start().await;
    site.add_person("66666666", person("CARMEN", "ROJAS", "LEON"));

    let store = MemoryStore::with_pending(["12AB5678", "66666666"]);
    let summary = Coordinator::new(fast_config(&site, LookupVariant::FullName, 1))
        .run(&store, store.clone())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failures_by_category.get("invalid_input"), Some(&1));
    assert_eq!(site.submissions_for("12AB5678"), 0);
    assert_eq!(site.total_submissions(), 1);
}

/// JSON endpoint, gzip responses and the "too many requests" envelope
#[tokio::test]
async fn test_birth_date_over_gzip() {
    let site = FakeSite::start().await;
    site.add_person(
        "77777777",
        Person {
            given_names: "MARIO",
            paternal: "VARGAS",
            maternal: "LLOSA",
            birth_date: "28/03/1986",
            ..Default::default()
        },
    );
    site.script(
        "77777777",
        vec![Reply::Rejected("Demasiadas solicitudes, intente mas tarde")],
    );

    let mut config = fast_config(&site, LookupVariant::BirthDate, 1);
    config.session.rotate_every = 0;

    let store = MemoryStore::with_pending(["77777777"]);
    let summary = Coordinator::new(config)
        .run(&store, store.clone())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(site.submissions_for("77777777"), 2);
    assert_eq!(site.token_pages(), 2);
    assert!(site.gzip_requests() > 0);
    assert_eq!(
        store.value("77777777", Field::BirthDate).await.as_deref(),
        Some("28/03/1986")
    );
}

/// A reply naming the person but carrying no date is not a result
#[tokio::test]
async fn test_birth_date_missing_is_no_data() {
    let site = FakeSite::start().await;
    site.add_person("78787878", person("JUAN", "PEREZ", "SOTO"));

    let store = MemoryStore::with_pending(["78787878"]);
    let summary = Coordinator::new(fast_config(&site, LookupVariant::BirthDate, 1))
        .run(&store, store.clone())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.failures_by_category.get("no_data"), Some(&1));
    assert_eq!(site.submissions_for("78787878"), 1);
    assert_eq!(store.value("78787878", Field::BirthDate).await, None);
}

#[tokio::test]
async fn test_verification_digit_lookup() {
    let site = FakeSite::start().await;
    site.add_person(
        "45454545",
        Person {
            given_names: "NORMA",
            paternal: "CHAVEZ",
            maternal: "RIOS",
            check_digit: "7",
            ..Default::default()
        },
    );

    let store = MemoryStore::with_pending(["45454545", "00000001"]);
    let summary = Coordinator::new(fast_config(&site, LookupVariant::VerificationDigit, 1))
        .run(&store, store.clone())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failures_by_category.get("not_found"), Some(&1));
    assert_eq!(site.token_mismatches(), 0);
    assert_eq!(
        store.value("45454545", Field::VerificationDigit).await.as_deref(),
        Some("7")
    );
}

#[tokio::test]
async fn test_cancelled_run_reports_everything() {
    let site = FakeSite::start().await;
    site.add_person("88888888", person("ROSA", "PAZ", "SOTO"));

    let store = MemoryStore::with_pending(["88888888", "99999999"]);
    let coordinator = Coordinator::new(fast_config(&site, LookupVariant::FullName, 2));
    coordinator.cancellation_token().cancel();
    let summary = coordinator.run(&store, store.clone()).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.failures_by_category.get("cancelled"), Some(&2));
    assert_eq!(site.total_submissions(), 0);
    assert!(summary.is_accounted());
}

#[tokio::test]
async fn test_sink_failure_is_counted() {
    let site = FakeSite::start().await;
    site.add_person("10101010", person("LUZ", "NINA", "CCORI"));
    site.add_person("20202020", person("RAUL", "APAZA", "MAMANI"));

    let store = MemoryStore::with_pending(["10101010", "20202020"]);
    store.fail_writes_for("10101010").await;
    let summary = Coordinator::new(fast_config(&site, LookupVariant::FullName, 2))
        .run(&store, store.clone())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.sink_errors, 1);
    assert!(summary.is_accounted());
}

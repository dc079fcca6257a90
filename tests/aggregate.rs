mod common;

use std::sync::Arc;

use common::*;
use tsl_trust::tsl::{ParserOptions, RootList, TerritoryRegistry, TslError, TslService};

struct Federation {
    fetcher: Arc<MemoryFetcher>,
    lotl_signer: TestIdentity,
    _dir: tempfile::TempDir,
    service: TslService,
}

/// Root list pointing at EE, LV and LT, each with one CA service
fn federation() -> Federation {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = MemoryFetcher::new();
    let lotl_signer = TestIdentity::root("LOTL signer");

    let mut lotl = ListSpec::lotl(301).with_service(ServiceSpec::granted(
        "EU Root Service",
        &TestIdentity::root("EU Root CA").cert,
        "2019-01-01T00:00:00Z",
    ));
    for code in ["EE", "LV", "LT"] {
        let operator = TestIdentity::root(&format!("{code} Trusted List Operator"));
        let ca = TestIdentity::root(&format!("{code} Qualified CA"));
        let list = ListSpec::territory(code, 10).with_service(ServiceSpec::granted(
            &format!("{code} Qualified CA"),
            &ca.cert,
            "2019-01-01T00:00:00Z",
        ));
        fetcher.publish_with_digest(&tl_url(code), list.signed_by(&operator));
        lotl = lotl.with_territory_pointer(code, &tl_url(code), &[&operator.cert]);
    }
    fetcher.publish_with_digest(LOTL_URL, lotl.signed_by(&lotl_signer));

    let root = RootList {
        url: LOTL_URL.to_string(),
        territory: "EU".to_string(),
        anchors: vec![lotl_signer.cert.clone()],
    };
    let service = TslService::new(
        parser(&dir, fetcher.clone(), ParserOptions::default()),
        Arc::new(TerritoryRegistry::new()),
        root,
    );

    Federation {
        fetcher,
        lotl_signer,
        _dir: dir,
        service,
    }
}

fn names(services: &[tsl_trust::tsl::Service]) -> Vec<&str> {
    services.iter().map(|s| s.name.as_str()).collect()
}

#[tokio::test]
async fn test_failing_territory_is_skipped() {
    let federation = federation();
    for code in ["EE", "LV", "LT"] {
        assert!(federation.service.activate(code));
    }
    federation.fetcher.fail(&tl_url("LT"));

    let services = federation.service.parse(TIMEOUT).await.unwrap();
    assert_eq!(
        names(&services),
        vec!["EU Root Service", "EE Qualified CA", "LV Qualified CA"]
    );
}

#[tokio::test]
async fn test_inactive_territories_are_not_fetched() {
    let federation = federation();
    federation.service.activate("lv");

    let services = federation.service.parse(TIMEOUT).await.unwrap();
    assert_eq!(names(&services), vec!["EU Root Service", "LV Qualified CA"]);
    assert_eq!(federation.fetcher.downloads(&tl_url("EE")), 0);
    assert_eq!(federation.fetcher.downloads(&tl_url("LT")), 0);
}

#[tokio::test]
async fn test_no_active_territory_returns_root_services() {
    let federation = federation();

    let services = federation.service.parse(TIMEOUT).await.unwrap();
    assert_eq!(names(&services), vec!["EU Root Service"]);
}

#[tokio::test]
async fn test_territory_without_pointer_is_unsupported() {
    let federation = federation();
    federation.service.activate("EE");
    federation.service.activate("FI");

    let result = federation.service.parse(TIMEOUT).await;
    assert!(matches!(result, Err(TslError::UnsupportedTerritory(code)) if code == "FI"));
}

#[tokio::test]
async fn test_all_territories_failing() {
    let federation = federation();
    federation.service.activate("LT");
    federation.fetcher.fail(&tl_url("LT"));

    let result = federation.service.parse(TIMEOUT).await;
    assert!(matches!(result, Err(TslError::NoTerritorySucceeded)));
}

#[tokio::test]
async fn test_root_list_failure_is_fatal() {
    let federation = federation();
    federation.service.activate("EE");

    let impostor = TestIdentity::root("Impostor");
    federation
        .fetcher
        .publish_with_digest(LOTL_URL, ListSpec::lotl(302).signed_by(&impostor));

    let result = federation.service.parse(TIMEOUT).await;
    assert!(matches!(result, Err(TslError::Signature(_))));

    // a genuine list that no longer points at EE
    federation.fetcher.publish_with_digest(
        LOTL_URL,
        ListSpec::lotl(303).signed_by(&federation.lotl_signer),
    );
    let result = federation.service.parse(TIMEOUT).await;
    assert!(matches!(result, Err(TslError::UnsupportedTerritory(code)) if code == "EE"));
}

mod common;

use common::{spawn_stac, MockOptions};
use esgf_stac::client::{build_http_client, ClientOptions};
use esgf_stac::profile::profile_for;
use esgf_stac::query::{TimeFilterMethod, TimeRange};
use esgf_stac::scenarios::FILTER_SCENARIOS;
use esgf_stac::suite::checks::CheckFailure;
use esgf_stac::suite::{run_case, Case, CaseParams, Check, CheckContext};

fn ctx(data_challenge: u8) -> CheckContext {
    CheckContext {
        http: build_http_client(&ClientOptions::default()).unwrap(),
        expectations: profile_for(data_challenge).unwrap(),
    }
}

fn case(check: Check, endpoint: &str) -> Case {
    Case {
        check,
        endpoint: endpoint.to_string(),
        params: CaseParams::None,
    }
}

fn scenario_case(name: &str, endpoint: &str) -> Case {
    Case {
        check: Check::SearchingWithFilters,
        endpoint: endpoint.to_string(),
        params: CaseParams::FilterScenario {
            name: name.to_string(),
            filter: FILTER_SCENARIOS[name].clone(),
        },
    }
}

fn assertion_message(result: Result<(), CheckFailure>) -> String {
    match result {
        Err(CheckFailure::Assertion(msg)) => msg,
        other => panic!("Expected an assertion failure, got {:?}", other),
    }
}

fn dc4_counts() -> Vec<(serde_json::Value, u64)> {
    [
        ("var_id_eq_rsus_rsds", 56),
        ("var_id_in_rsus_rsds", 56),
        ("var_id_tas_source_id_MIROC6", 2),
        ("member_id_eq_r2i1p1f1", 19),
        ("variant_label_eq_r2i1p1f1", 22),
    ]
    .into_iter()
    .map(|(name, n)| (FILTER_SCENARIOS[name].to_cql2_json(), n))
    .collect()
}

mod filters {
    use super::*;

    #[tokio::test]
    async fn default_profile_accepts_any_matches() {
        let (_server, base) = spawn_stac(MockOptions::default()).await;
        for name in FILTER_SCENARIOS.keys() {
            run_case(&scenario_case(name, &base), &ctx(0)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn default_profile_rejects_zero_matches() {
        let (_server, base) = spawn_stac(MockOptions {
            total: 0,
            ..Default::default()
        })
        .await;
        let msg = assertion_message(
            run_case(&scenario_case("member_id_eq_r2i1p1f1", &base), &ctx(0)).await,
        );
        assert!(msg.contains("was 0, expected > 0"), "{}", msg);
    }

    #[tokio::test]
    async fn data_challenge_4_exact_counts() {
        let (_server, base) = spawn_stac(MockOptions {
            filter_counts: dc4_counts(),
            ..Default::default()
        })
        .await;
        for name in FILTER_SCENARIOS.keys() {
            run_case(&scenario_case(name, &base), &ctx(4)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn data_challenge_4_flags_wrong_count() {
        let mut counts = dc4_counts();
        counts[3].1 = 20;
        let (_server, base) = spawn_stac(MockOptions {
            filter_counts: counts,
            ..Default::default()
        })
        .await;
        let msg = assertion_message(
            run_case(&scenario_case("member_id_eq_r2i1p1f1", &base), &ctx(4)).await,
        );
        assert!(msg.contains("was 20, expected == 19"), "{}", msg);
    }
}

mod assets {
    use super::*;

    #[tokio::test]
    async fn file_attributes_present() {
        let (_server, base) = spawn_stac(MockOptions::default()).await;
        run_case(&case(Check::AssetsIncludeFileExtensionAttributes, &base), &ctx(0))
            .await
            .unwrap();
        run_case(&case(Check::ItemContent, &base), &ctx(0))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn file_attributes_missing() {
        let (_server, base) = spawn_stac(MockOptions {
            asset_fields: false,
            ..Default::default()
        })
        .await;
        let msg = assertion_message(
            run_case(&case(Check::AssetsIncludeFileExtensionAttributes, &base), &ctx(0)).await,
        );
        assert!(msg.contains("file:size"), "{}", msg);
    }
}

mod paging {
    use super::*;

    #[tokio::test]
    async fn partial_last_page() {
        let (_server, base) = spawn_stac(MockOptions::default()).await;
        run_case(&case(Check::Pagination, &base), &ctx(0))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn exact_multiple_ends_with_empty_page() {
        let (server, base) = spawn_stac(MockOptions {
            total: 20,
            trailing_empty_page: true,
            ..Default::default()
        })
        .await;
        run_case(&case(Check::Pagination, &base), &ctx(0))
            .await
            .unwrap();

        let searches = server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.url.path() == "/search")
            .count();
        assert_eq!(searches, 3);
    }

    #[tokio::test]
    async fn exact_multiple_without_empty_page_is_one_short() {
        let (_server, base) = spawn_stac(MockOptions {
            total: 20,
            ..Default::default()
        })
        .await;
        let msg = assertion_message(run_case(&case(Check::Pagination, &base), &ctx(0)).await);
        assert_eq!(
            msg,
            "expected 2 pages after the first (20 matched, 10 per page), got 1"
        );
    }

    #[tokio::test]
    async fn empty_first_page_with_matches_fails() {
        let (_server, base) = spawn_stac(MockOptions {
            total: 0,
            reported_matched: Some(56),
            ..Default::default()
        })
        .await;
        let msg = assertion_message(run_case(&case(Check::Pagination, &base), &ctx(0)).await);
        assert_eq!(msg, "first page returned no items although 56 matched");
    }

    #[tokio::test]
    async fn missing_pages_fail() {
        let (_server, base) = spawn_stac(MockOptions {
            reported_matched: Some(56),
            ..Default::default()
        })
        .await;
        let msg = assertion_message(run_case(&case(Check::Pagination, &base), &ctx(0)).await);
        assert_eq!(
            msg,
            "expected 5 pages after the first (56 matched, 10 per page), got 2"
        );
    }

    #[tokio::test]
    async fn get_only_endpoint() {
        let (_server, base) = spawn_stac(MockOptions {
            post_search: false,
            legacy_context: true,
            ..Default::default()
        })
        .await;
        run_case(&case(Check::Pagination, &base), &ctx(0))
            .await
            .unwrap();
    }
}

mod catalog {
    use super::*;

    #[tokio::test]
    async fn collections_and_extent() {
        let (_server, base) = spawn_stac(MockOptions::default()).await;
        run_case(&case(Check::Collections, &base), &ctx(0))
            .await
            .unwrap();
        run_case(&case(Check::Cmip6CollectionGeospatialExtent, &base), &ctx(0))
            .await
            .unwrap();
        run_case(&case(Check::ValidateCatalog, &base), &ctx(0))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_cmip6_collection() {
        let (_server, base) = spawn_stac(MockOptions {
            collections: vec!["CMIP7".into()],
            ..Default::default()
        })
        .await;
        let msg = assertion_message(run_case(&case(Check::Collections, &base), &ctx(0)).await);
        assert!(msg.contains("CMIP6"), "{}", msg);

        match run_case(&case(Check::Cmip6CollectionGeospatialExtent, &base), &ctx(0)).await {
            Err(CheckFailure::Error(e)) => assert!(e.to_string().contains("CMIP6")),
            other => panic!("Expected CollectionNotFound, got {:?}", other),
        }
    }
}

mod extension {
    use super::*;

    #[tokio::test]
    async fn published_extension_url() {
        let (_server, base) = spawn_stac(MockOptions::default()).await;
        run_case(&case(Check::EndpointUsesPublishedCmip6Extension, &base), &ctx(0))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn no_cmip6_extension() {
        let (_server, base) = spawn_stac(MockOptions {
            stac_extensions: vec![],
            ..Default::default()
        })
        .await;
        let msg = assertion_message(
            run_case(&case(Check::EndpointUsesPublishedCmip6Extension, &base), &ctx(0)).await,
        );
        assert_eq!(msg, "No CMIP6 STAC extension found.");
    }

    #[tokio::test]
    async fn ambiguous_cmip6_extensions() {
        let (_server, base) = spawn_stac(MockOptions {
            stac_extensions: vec![
                "https://example.org/cmip6/v1.0.0/schema.json".into(),
                "https://example.org/cmip6-legacy/schema.json".into(),
            ],
            ..Default::default()
        })
        .await;
        let msg = assertion_message(
            run_case(&case(Check::EndpointUsesPublishedCmip6Extension, &base), &ctx(0)).await,
        );
        assert!(msg.starts_with("Multiple possible cmip6 extensions found"), "{}", msg);
    }
}

mod temporal {
    use super::*;

    #[tokio::test]
    async fn every_method_finds_items() {
        let (_server, base) = spawn_stac(MockOptions::default()).await;
        let range = TimeRange::parse("1850-01-01", "2020-01-01").unwrap();
        for method in TimeFilterMethod::ALL {
            let c = Case {
                check: Check::Cmip6TemporalQuery,
                endpoint: base.clone(),
                params: CaseParams::Temporal { range, method },
            };
            run_case(&c, &ctx(0)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn empty_result_fails() {
        let (_server, base) = spawn_stac(MockOptions {
            total: 0,
            ..Default::default()
        })
        .await;
        let c = Case {
            check: Check::Cmip6TemporalQuery,
            endpoint: base.clone(),
            params: CaseParams::Temporal {
                range: TimeRange::parse("1850-01-01", "2020-01-01").unwrap(),
                method: TimeFilterMethod::Query,
            },
        };
        let msg = assertion_message(run_case(&c, &ctx(0)).await);
        assert!(msg.contains("using query"), "{}", msg);
    }
}

mod facets {
    use super::*;

    #[tokio::test]
    async fn buckets_present() {
        let (_server, base) = spawn_stac(MockOptions::default()).await;
        run_case(&case(Check::FacetCounts, &base), &ctx(0))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn empty_buckets_fail() {
        let (_server, base) = spawn_stac(MockOptions {
            buckets_per_aggregation: 0,
            ..Default::default()
        })
        .await;
        let msg = assertion_message(run_case(&case(Check::FacetCounts, &base), &ctx(0)).await);
        assert!(msg.contains("has 0 buckets"), "{}", msg);
    }
}

#[tokio::test]
async fn mismatched_params_are_a_local_error() {
    let (_server, base) = spawn_stac(MockOptions::default()).await;
    let c = Case {
        check: Check::SearchingWithFilters,
        endpoint: base,
        params: CaseParams::None,
    };
    match run_case(&c, &ctx(0)).await {
        Err(CheckFailure::Error(e)) => assert!(!e.is_remote()),
        other => panic!("Expected a config error, got {:?}", other),
    }
}

//! End-to-end tests for the scan pipeline.
//!
//! Each case is a repository tree served by a fake provider. The pipeline
//! downloads it, detects frameworks, infers conventions and persists the
//! config; the stored config is then checked against the expectations.

mod common;

use std::sync::Arc;

use common::{zip_tree, FakeProvider, TestHarness};
use reposcan::infer::TestType;
use reposcan::provider::ProviderKind;

/// Represents a single end-to-end scan case.
struct ScanCase {
    /// Test case name for identification.
    name: &'static str,
    /// Files in the repository, relative to its root.
    files: &'static [(&'static str, &'static str)],
    /// Expected (framework type, version) pairs, in detection order.
    expected_frameworks: &'static [(&'static str, &'static str)],
    expected_coverage: &'static str,
    /// Expected unit-test location, if any framework was detected.
    expected_unit_folder: Option<&'static str>,
    expected_feature_domain: bool,
    expected_external_repo: Option<&'static str>,
}

const SCAN_CASES: &[ScanCase] = &[
    ScanCase {
        name: "jest_project",
        files: &[
            (
                "package.json",
                r#"{"name":"web","devDependencies":{"jest":"^29.7.0","eslint":"^8.0.0"}}"#,
            ),
            ("src/index.js", "export default 1;\n"),
        ],
        expected_frameworks: &[("jest", "^29.7.0")],
        expected_coverage: "coverage/",
        expected_unit_folder: Some("same-folder-as-component"),
        expected_feature_domain: false,
        expected_external_repo: None,
    },
    ScanCase {
        name: "rspec_rails_project",
        files: &[
            (
                "Gemfile",
                "source 'https://rubygems.org'\ngem 'rails', '~> 7.1'\ngem 'rspec-rails', '~> 6.1'\n",
            ),
            ("app/models/user.rb", "class User; end\n"),
        ],
        expected_frameworks: &[("RSpec", "6.1")],
        expected_coverage: "coverage/",
        expected_unit_folder: Some("spec/models/"),
        expected_feature_domain: false,
        expected_external_repo: None,
    },
    ScanCase {
        name: "pytest_project",
        files: &[
            ("requirements.txt", "flask==3.0.0\npytest==7.4.0\n"),
            ("app/__init__.py", ""),
        ],
        expected_frameworks: &[("pytest", "7.4.0")],
        expected_coverage: "htmlcov/",
        expected_unit_folder: Some("tests/unit/"),
        expected_feature_domain: false,
        expected_external_repo: None,
    },
    ScanCase {
        name: "go_module",
        files: &[("go.mod", "module example.com/svc\n\ngo 1.22\n")],
        expected_frameworks: &[("Go Testing", "")],
        expected_coverage: "coverage/",
        expected_unit_folder: Some("tests/"),
        expected_feature_domain: false,
        expected_external_repo: None,
    },
    ScanCase {
        name: "feature_domain_layout",
        files: &[
            ("package.json", r#"{"devDependencies":{"mocha":"10.2.0"}}"#),
            ("src/features/billing/invoice.js", "module.exports = {};\n"),
        ],
        expected_frameworks: &[("mocha", "10.2.0")],
        expected_coverage: "coverage/",
        expected_unit_folder: Some("test/"),
        expected_feature_domain: true,
        expected_external_repo: None,
    },
    ScanCase {
        name: "external_test_repo",
        files: &[
            ("Cargo.toml", "[package]\nname = \"svc\"\n"),
            ("tests-repo/README.md", "Tests live here.\n"),
        ],
        expected_frameworks: &[("Rust Test", "")],
        expected_coverage: "coverage/",
        expected_unit_folder: Some("tests/unit/"),
        expected_feature_domain: false,
        expected_external_repo: Some("tests-repo/"),
    },
    ScanCase {
        name: "no_frameworks",
        files: &[("README.md", "# Docs only\n")],
        expected_frameworks: &[],
        expected_coverage: "coverage/",
        expected_unit_folder: None,
        expected_feature_domain: false,
        expected_external_repo: None,
    },
    ScanCase {
        name: "malformed_manifest_is_skipped",
        files: &[
            ("package.json", "{ not json"),
            ("requirements.txt", "pytest\n"),
        ],
        expected_frameworks: &[("pytest", "")],
        expected_coverage: "htmlcov/",
        expected_unit_folder: Some("tests/unit/"),
        expected_feature_domain: false,
        expected_external_repo: None,
    },
];

#[tokio::test]
async fn test_all_scan_cases() {
    let mut failures = Vec::new();

    for case in SCAN_CASES {
        if let Err(e) = run_case(case).await {
            failures.push(format!("{}: {}", case.name, e));
        }
    }

    if !failures.is_empty() {
        panic!(
            "{} of {} scan cases failed:\n{}",
            failures.len(),
            SCAN_CASES.len(),
            failures.join("\n")
        );
    }
}

async fn run_case(case: &ScanCase) -> Result<(), String> {
    let harness = TestHarness::new();
    let provider = Arc::new(FakeProvider::new(ProviderKind::GitHub));
    let slug = format!("acme/{}", case.name);
    provider.serve(&slug, zip_tree(&format!("acme-{}-0a1b2c3", case.name), case.files));
    harness.register(case.name, ProviderKind::GitHub, &slug);

    let pipeline = harness.pipeline(&[provider]);
    let outcome = harness
        .scan(&pipeline, case.name, ProviderKind::GitHub, &slug)
        .await;
    if !outcome.success {
        return Err(format!("scan failed: {:?}", outcome.error));
    }

    let config = harness
        .stored_config(case.name)
        .ok_or_else(|| "no config stored".to_string())?;

    let frameworks: Vec<(String, String)> = config
        .test_frameworks
        .iter()
        .map(|f| (f.kind.to_string(), f.version.clone()))
        .collect();
    let expected: Vec<(String, String)> = case
        .expected_frameworks
        .iter()
        .map(|(kind, version)| (kind.to_string(), version.to_string()))
        .collect();
    if frameworks != expected {
        return Err(format!("frameworks {:?}, expected {:?}", frameworks, expected));
    }
    if outcome.frameworks != config.test_frameworks {
        return Err("outcome frameworks differ from stored ones".to_string());
    }

    if config.coverage_folder_path != case.expected_coverage {
        return Err(format!(
            "coverage '{}', expected '{}'",
            config.coverage_folder_path, case.expected_coverage
        ));
    }

    let unit = config.test_type_handling.get(&TestType::Unit).map(String::as_str);
    if unit != case.expected_unit_folder {
        return Err(format!(
            "unit folder {:?}, expected {:?}",
            unit, case.expected_unit_folder
        ));
    }

    if config.feature_domain_based_test != case.expected_feature_domain {
        return Err(format!(
            "feature_domain_based_test {}, expected {}",
            config.feature_domain_based_test, case.expected_feature_domain
        ));
    }
    if config.external_test_repo.as_deref() != case.expected_external_repo {
        return Err(format!(
            "external_test_repo {:?}, expected {:?}",
            config.external_test_repo, case.expected_external_repo
        ));
    }
    if config.user_test_folder_preference.is_some() {
        return Err("a fresh scan must not invent a folder preference".to_string());
    }

    if !harness.scratch_entries().is_empty() {
        return Err("working directory left behind".to_string());
    }

    Ok(())
}

#[tokio::test]
async fn test_jest_conventions_in_detail() {
    let harness = TestHarness::new();
    let provider = Arc::new(FakeProvider::new(ProviderKind::GitHub));
    provider.serve(
        "acme/web",
        zip_tree(
            "acme-web-9f8e7d6",
            &[("package.json", r#"{"devDependencies":{"jest":"29.7.0"}}"#)],
        ),
    );
    harness.register("gh-web", ProviderKind::GitHub, "acme/web");

    let pipeline = harness.pipeline(&[provider]);
    let outcome = harness
        .scan(&pipeline, "gh-web", ProviderKind::GitHub, "acme/web")
        .await;
    assert!(outcome.success, "{:?}", outcome.error);

    let config = harness.stored_config("gh-web").unwrap();
    assert_eq!(
        config.test_folder_patterns.get("jest").unwrap(),
        &vec!["__tests__/".to_string(), "src/components/".to_string()]
    );
    assert_eq!(
        config.test_file_naming_convention.get("javascript").unwrap(),
        &vec![
            "*.test.js".to_string(),
            "*.test.tsx".to_string(),
            "*.spec.js".to_string()
        ]
    );
    assert_eq!(
        config.test_type_handling.get(&TestType::Integration).unwrap(),
        "__tests__/"
    );
}

#[tokio::test]
async fn test_gitlab_nested_group_slug() {
    let harness = TestHarness::new();
    let provider = Arc::new(FakeProvider::new(ProviderKind::GitLab));
    provider.serve(
        "group/sub/app",
        zip_tree("app-main-1234abcd", &[("composer.json", r#"{"require-dev":{"phpunit/phpunit":"^10.5"}}"#)]),
    );
    harness.register("gl-app", ProviderKind::GitLab, "group/sub/app");

    let pipeline = harness.pipeline(&[provider]);
    let outcome = harness
        .scan(&pipeline, "gl-app", ProviderKind::GitLab, "group/sub/app")
        .await;
    assert!(outcome.success, "{:?}", outcome.error);

    let config = harness.stored_config("gl-app").unwrap();
    assert_eq!(config.test_frameworks.len(), 1);
    assert_eq!(config.test_frameworks[0].kind.as_str(), "PHPUnit");
    assert_eq!(config.test_frameworks[0].version, "^10.5");
}

#[tokio::test]
async fn test_rescan_preserves_user_preference() {
    let harness = TestHarness::new();
    let provider = Arc::new(FakeProvider::new(ProviderKind::GitHub));
    provider.serve(
        "acme/api",
        zip_tree("acme-api-1111111", &[("requirements.txt", "pytest==7.4.0\n")]),
    );
    harness.register("gh-api", ProviderKind::GitHub, "acme/api");
    let pipeline = harness.pipeline(&[provider.clone()]);

    let first = harness
        .scan(&pipeline, "gh-api", ProviderKind::GitHub, "acme/api")
        .await;
    assert!(first.success);
    let before = harness.stored_config("gh-api").unwrap();

    let preference = serde_json::json!({"unit": "qa/unit/", "e2e": "qa/e2e/"});
    let updated = reposcan::db::config_repo::set_user_test_folder_preference(
        &harness.db,
        "gh-api",
        Some(&preference),
        &reposcan::db::now_timestamp(),
    )
    .unwrap();
    assert!(updated);

    // The repository moved to jest in the meantime.
    provider.serve(
        "acme/api",
        zip_tree(
            "acme-api-2222222",
            &[("package.json", r#"{"devDependencies":{"jest":"^29.0.0"}}"#)],
        ),
    );
    let second = harness
        .scan(&pipeline, "gh-api", ProviderKind::GitHub, "acme/api")
        .await;
    assert!(second.success, "{:?}", second.error);

    let after = harness.stored_config("gh-api").unwrap();
    assert_eq!(after.user_test_folder_preference, Some(preference));
    assert_eq!(after.test_frameworks[0].kind.as_str(), "jest");
    assert_eq!(after.coverage_folder_path, "coverage/");
    assert_eq!(after.created_at, before.created_at);
    assert!(after.updated_at >= before.updated_at);
    assert_eq!(provider.downloads(), 2);
}

#[tokio::test]
async fn test_identical_rescan_is_idempotent() {
    let harness = TestHarness::new();
    let provider = Arc::new(FakeProvider::new(ProviderKind::GitHub));
    provider.serve(
        "acme/shop",
        zip_tree("acme-shop-abcdef0", &[("Gemfile", "gem 'rspec', '3.12.0'\n")]),
    );
    harness.register("gh-shop", ProviderKind::GitHub, "acme/shop");
    let pipeline = harness.pipeline(&[provider]);

    for _ in 0..2 {
        let outcome = harness
            .scan(&pipeline, "gh-shop", ProviderKind::GitHub, "acme/shop")
            .await;
        assert!(outcome.success, "{:?}", outcome.error);
    }

    let config = harness.stored_config("gh-shop").unwrap();
    assert_eq!(config.test_frameworks.len(), 1);
    assert_eq!(config.test_frameworks[0].version, "3.12.0");
    assert_eq!(
        config.test_type_handling.get(&TestType::System).map(String::as_str),
        Some("spec/system/")
    );
}

#[tokio::test]
async fn test_missing_repository_leaves_nothing_behind() {
    let harness = TestHarness::new();
    let provider = Arc::new(FakeProvider::new(ProviderKind::GitHub));
    harness.register("gh-gone", ProviderKind::GitHub, "acme/gone");
    let pipeline = harness.pipeline(&[provider.clone()]);

    let outcome = harness
        .scan(&pipeline, "gh-gone", ProviderKind::GitHub, "acme/gone")
        .await;
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("not found"));
    assert!(outcome.frameworks.is_empty());
    assert!(harness.stored_config("gh-gone").is_none());
    assert!(harness.scratch_entries().is_empty());
    assert_eq!(provider.downloads(), 0);
}

#[tokio::test]
async fn test_corrupt_archive_keeps_previous_config() {
    let harness = TestHarness::new();
    let provider = Arc::new(FakeProvider::new(ProviderKind::GitHub));
    provider.serve(
        "acme/lib",
        zip_tree("acme-lib-0000001", &[("go.mod", "module x\n")]),
    );
    harness.register("gh-lib", ProviderKind::GitHub, "acme/lib");
    let pipeline = harness.pipeline(&[provider.clone()]);

    assert!(
        harness
            .scan(&pipeline, "gh-lib", ProviderKind::GitHub, "acme/lib")
            .await
            .success
    );
    let before = harness.stored_config("gh-lib").unwrap();

    provider.serve("acme/lib", b"definitely not a zip archive".to_vec());
    let outcome = harness
        .scan(&pipeline, "gh-lib", ProviderKind::GitHub, "acme/lib")
        .await;
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("Archive corrupt"));

    assert_eq!(harness.stored_config("gh-lib").unwrap(), before);
    assert!(harness.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_unregistered_provider_fails_scan() {
    let harness = TestHarness::new();
    let github = Arc::new(FakeProvider::new(ProviderKind::GitHub));
    harness.register("gl-svc", ProviderKind::GitLab, "group/svc");
    let pipeline = harness.pipeline(&[github]);

    let outcome = harness
        .scan(&pipeline, "gl-svc", ProviderKind::GitLab, "group/svc")
        .await;
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("Unsupported provider"));
}

//! Test convention inference.
//!
//! Everything except the two layout checks is a pure function of the detected
//! framework list, so identical detection results always yield identical
//! conventions.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detect::DetectedFramework;

pub mod table;

pub use table::{profile_for, FrameworkProfile, DEFAULT_COVERAGE_FOLDER};

/// Test categories a repository may keep in separate folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    Unit,
    Integration,
    System,
}

/// Folders whose presence marks feature/domain-based test organization.
const FEATURE_DOMAIN_MARKERS: &[&str] = &["src/features", "src/domains"];

/// Folder whose presence marks tests kept in a separate repository.
const EXTERNAL_TEST_REPO_MARKER: &str = "tests-repo";

/// Everything inferred for one repository tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conventions {
    pub folder_patterns: BTreeMap<String, Vec<String>>,
    pub naming_conventions: BTreeMap<String, Vec<String>>,
    pub coverage_folder: String,
    pub type_handling: BTreeMap<TestType, String>,
    pub feature_domain_based: bool,
    pub external_test_repo: Option<String>,
}

/// The framework-driven part of [`Conventions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkConventions {
    pub folder_patterns: BTreeMap<String, Vec<String>>,
    pub naming_conventions: BTreeMap<String, Vec<String>>,
    pub coverage_folder: String,
    pub type_handling: BTreeMap<TestType, String>,
}

/// Layout facts read from the tree itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeLayout {
    pub feature_domain_based: bool,
    pub external_test_repo: Option<String>,
}

/// Applies each framework's profile in detection order. A later framework
/// replaces an earlier one's naming list for the same language and its folder
/// for the same test type.
pub fn infer_from_frameworks(frameworks: &[DetectedFramework]) -> FrameworkConventions {
    let mut folder_patterns = BTreeMap::new();
    let mut naming_conventions = BTreeMap::new();
    let mut type_handling = BTreeMap::new();

    for fw in frameworks {
        let profile = profile_for(&fw.kind);
        folder_patterns.insert(fw.kind.to_string(), to_owned_list(profile.folders));
        naming_conventions.insert(profile.language.to_string(), to_owned_list(profile.naming));
        for (test_type, folder) in profile.handling {
            type_handling.insert(*test_type, folder.to_string());
        }
    }

    FrameworkConventions {
        folder_patterns,
        naming_conventions,
        coverage_folder: coverage_folder(frameworks).to_string(),
        type_handling,
    }
}

/// First coverage location whose framework was detected, else the default.
pub fn coverage_folder(frameworks: &[DetectedFramework]) -> &'static str {
    table::COVERAGE_PRECEDENCE
        .iter()
        .find(|(kind, _)| frameworks.iter().any(|fw| &fw.kind == kind))
        .map(|(_, folder)| *folder)
        .unwrap_or(DEFAULT_COVERAGE_FOLDER)
}

pub fn inspect_layout(root: &Path) -> TreeLayout {
    let feature_domain_based = FEATURE_DOMAIN_MARKERS
        .iter()
        .any(|marker| root.join(marker).exists());
    let external_test_repo = root
        .join(EXTERNAL_TEST_REPO_MARKER)
        .exists()
        .then(|| format!("{}/", EXTERNAL_TEST_REPO_MARKER));

    TreeLayout {
        feature_domain_based,
        external_test_repo,
    }
}

/// Full inference for a materialized tree.
pub fn infer(frameworks: &[DetectedFramework], root: &Path) -> Conventions {
    let from_frameworks = infer_from_frameworks(frameworks);
    let layout = inspect_layout(root);

    Conventions {
        folder_patterns: from_frameworks.folder_patterns,
        naming_conventions: from_frameworks.naming_conventions,
        coverage_folder: from_frameworks.coverage_folder,
        type_handling: from_frameworks.type_handling,
        feature_domain_based: layout.feature_domain_based,
        external_test_repo: layout.external_test_repo,
    }
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

//! Test framework detection over a materialized repository tree.
//!
//! Detection is a table of independent [`Probe`]s, one per ecosystem. Each
//! probe reads its own manifest(s) and either contributes frameworks or fails
//! with a [`ManifestError`]; a failing probe never affects the others.

use std::fmt;
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod manifest;
pub mod probes;
pub mod versions;

pub use manifest::ManifestError;
pub use probes::{Probe, PROBES};

/// Test frameworks the detector knows how to recognize.
///
/// Identifiers read back from storage that are not in this list survive as
/// `Custom` so older or hand-edited configs still round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FrameworkKind {
    Jest,
    Mocha,
    Jasmine,
    Pytest,
    Unittest,
    JUnit,
    TestNG,
    Spek,
    PHPUnit,
    Codeception,
    NUnit,
    XUnit,
    MSTest,
    GoTesting,
    XCTest,
    RSpec,
    Minitest,
    ScalaTest,
    RustTest,
    Custom(String),
}

impl FrameworkKind {
    /// Stored identifier. These strings are part of the persisted config format.
    pub fn as_str(&self) -> &str {
        match self {
            FrameworkKind::Jest => "jest",
            FrameworkKind::Mocha => "mocha",
            FrameworkKind::Jasmine => "jasmine",
            FrameworkKind::Pytest => "pytest",
            FrameworkKind::Unittest => "unittest",
            FrameworkKind::JUnit => "JUnit",
            FrameworkKind::TestNG => "TestNG",
            FrameworkKind::Spek => "Spek",
            FrameworkKind::PHPUnit => "PHPUnit",
            FrameworkKind::Codeception => "Codeception",
            FrameworkKind::NUnit => "NUnit",
            FrameworkKind::XUnit => "xUnit",
            FrameworkKind::MSTest => "MSTest",
            FrameworkKind::GoTesting => "Go Testing",
            FrameworkKind::XCTest => "XCTest",
            FrameworkKind::RSpec => "RSpec",
            FrameworkKind::Minitest => "Minitest",
            FrameworkKind::ScalaTest => "ScalaTest",
            FrameworkKind::RustTest => "Rust Test",
            FrameworkKind::Custom(name) => name,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "jest" => FrameworkKind::Jest,
            "mocha" => FrameworkKind::Mocha,
            "jasmine" => FrameworkKind::Jasmine,
            "pytest" => FrameworkKind::Pytest,
            "unittest" => FrameworkKind::Unittest,
            "JUnit" => FrameworkKind::JUnit,
            "TestNG" => FrameworkKind::TestNG,
            "Spek" => FrameworkKind::Spek,
            "PHPUnit" => FrameworkKind::PHPUnit,
            "Codeception" => FrameworkKind::Codeception,
            "NUnit" => FrameworkKind::NUnit,
            "xUnit" => FrameworkKind::XUnit,
            "MSTest" => FrameworkKind::MSTest,
            "Go Testing" => FrameworkKind::GoTesting,
            "XCTest" => FrameworkKind::XCTest,
            "RSpec" => FrameworkKind::RSpec,
            "Minitest" => FrameworkKind::Minitest,
            "ScalaTest" => FrameworkKind::ScalaTest,
            "Rust Test" => FrameworkKind::RustTest,
            other => FrameworkKind::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for FrameworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FrameworkKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FrameworkKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(FrameworkKind::parse(&s))
    }
}

/// A framework found in the tree. `version` is whatever the manifest declared
/// and may be empty when no version could be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedFramework {
    #[serde(rename = "type")]
    pub kind: FrameworkKind,
    #[serde(default)]
    pub version: String,
}

impl DetectedFramework {
    pub fn new(kind: FrameworkKind, version: impl Into<String>) -> Self {
        Self {
            kind,
            version: version.into(),
        }
    }

    pub fn unversioned(kind: FrameworkKind) -> Self {
        Self::new(kind, String::new())
    }
}

/// Runs a probe table against a tree root.
#[derive(Clone, Copy)]
pub struct Detector {
    probes: &'static [Probe],
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector {
    /// Detector over the built-in ecosystem table.
    pub fn new() -> Self {
        Self { probes: PROBES }
    }

    pub fn with_probes(probes: &'static [Probe]) -> Self {
        Self { probes }
    }

    /// Detects frameworks under `root`. Never fails: a probe that cannot parse
    /// its manifest simply contributes nothing.
    pub fn detect(&self, root: &Path) -> Vec<DetectedFramework> {
        let mut found = Vec::new();

        for probe in self.probes {
            match (probe.run)(root) {
                Ok(frameworks) => {
                    if !frameworks.is_empty() {
                        debug!(
                            "Probe '{}' found {} framework(s)",
                            probe.ecosystem,
                            frameworks.len()
                        );
                    }
                    found.extend(frameworks);
                }
                Err(e) => {
                    warn!("Probe '{}' skipped: {}", probe.ecosystem, e);
                }
            }
        }

        dedup_frameworks(found)
    }
}

/// Collapses repeated framework types, keeping first-seen order. A later
/// non-empty version fills in an earlier empty one.
fn dedup_frameworks(found: Vec<DetectedFramework>) -> Vec<DetectedFramework> {
    let mut result: Vec<DetectedFramework> = Vec::with_capacity(found.len());
    for fw in found {
        match result.iter_mut().find(|existing| existing.kind == fw.kind) {
            Some(existing) => {
                if existing.version.is_empty() && !fw.version.is_empty() {
                    existing.version = fw.version;
                }
            }
            None => result.push(fw),
        }
    }
    result
}

/// Convenience wrapper over the default probe table.
pub fn detect(root: &Path) -> Vec<DetectedFramework> {
    Detector::new().detect(root)
}

//! The ecosystem probe table.
//!
//! Adding an ecosystem means adding one [`Probe`] to [`PROBES`]. Probes share
//! no state and are run in table order, which fixes the order of results.

use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use super::manifest::{self, ManifestError};
use super::versions;
use super::{DetectedFramework, FrameworkKind};

pub type ProbeFn = fn(&Path) -> Result<Vec<DetectedFramework>, ManifestError>;

/// One isolated detection rule.
pub struct Probe {
    /// Short ecosystem name used in logs.
    pub ecosystem: &'static str,
    /// Manifest files the probe reads, for documentation and logs.
    pub manifests: &'static [&'static str],
    pub run: ProbeFn,
}

pub static PROBES: &[Probe] = &[
    Probe {
        ecosystem: "javascript",
        manifests: &["package.json"],
        run: probe_javascript,
    },
    Probe {
        ecosystem: "python",
        manifests: &["requirements.txt", "pyproject.toml"],
        run: probe_python,
    },
    Probe {
        ecosystem: "maven",
        manifests: &["pom.xml"],
        run: probe_maven,
    },
    Probe {
        ecosystem: "gradle",
        manifests: &["build.gradle", "build.gradle.kts"],
        run: probe_gradle,
    },
    Probe {
        ecosystem: "php",
        manifests: &["composer.json"],
        run: probe_php,
    },
    Probe {
        ecosystem: "dotnet",
        manifests: &["*.csproj"],
        run: probe_dotnet,
    },
    Probe {
        ecosystem: "go",
        manifests: &["go.mod"],
        run: probe_go,
    },
    Probe {
        ecosystem: "swift",
        manifests: &["Package.swift"],
        run: probe_swift,
    },
    Probe {
        ecosystem: "ruby",
        manifests: &["Gemfile"],
        run: probe_ruby,
    },
    Probe {
        ecosystem: "scala",
        manifests: &["build.sbt"],
        run: probe_scala,
    },
    Probe {
        ecosystem: "rust",
        manifests: &["Cargo.toml"],
        run: probe_rust,
    },
];

/// How deep below the root to look for project files such as `*.csproj`.
const PROJECT_FILE_DEPTH: usize = 3;

fn probe_javascript(root: &Path) -> Result<Vec<DetectedFramework>, ManifestError> {
    let Some(package) = manifest::read_json(root, "package.json")? else {
        return Ok(Vec::new());
    };
    let deps = manifest::merged_dependencies(&package, &["dependencies", "devDependencies"]);

    let mut found = Vec::new();
    for (name, kind) in [
        ("jest", FrameworkKind::Jest),
        ("mocha", FrameworkKind::Mocha),
        ("jasmine", FrameworkKind::Jasmine),
    ] {
        if let Some((_, version)) = deps.iter().find(|(dep, _)| dep == name) {
            found.push(DetectedFramework::new(kind, version.clone()));
        }
    }
    Ok(found)
}

fn probe_python(root: &Path) -> Result<Vec<DetectedFramework>, ManifestError> {
    let mut found = Vec::new();

    if let Some(requirements) = manifest::read_optional(root, "requirements.txt")? {
        for line in requirements.lines().map(str::trim) {
            if line.starts_with("pytest") {
                found.push(DetectedFramework::new(
                    FrameworkKind::Pytest,
                    versions::pinned_requirement(line),
                ));
            }
            if line.starts_with("unittest") {
                found.push(DetectedFramework::unversioned(FrameworkKind::Unittest));
            }
        }
    }

    if let Some(pyproject) = manifest::read_optional(root, "pyproject.toml")? {
        if pyproject.contains("pytest") {
            found.push(DetectedFramework::unversioned(FrameworkKind::Pytest));
        }
    }

    Ok(found)
}

/// A `<dependency>` block from a pom.
#[derive(Debug, Default)]
struct PomDependency {
    group_id: String,
    artifact_id: String,
    version: String,
}

fn probe_maven(root: &Path) -> Result<Vec<DetectedFramework>, ManifestError> {
    let Some(pom) = manifest::read_optional(root, "pom.xml")? else {
        return Ok(Vec::new());
    };
    let dependencies = parse_pom_dependencies(&pom).map_err(|reason| ManifestError::Xml {
        path: root.join("pom.xml"),
        reason,
    })?;

    // Every pom reports JUnit; TestNG needs its marker.
    let mut found = Vec::new();
    for (marker, kind, required) in [
        ("junit", FrameworkKind::JUnit, false),
        ("testng", FrameworkKind::TestNG, true),
    ] {
        if required && !pom.contains(marker) {
            continue;
        }
        // Prefer a literal version on the matching dependency; property
        // references like ${junit.version} fall back to the text heuristic.
        let declared = dependencies
            .iter()
            .filter(|d| d.artifact_id.contains(marker) || d.group_id.contains(marker))
            .map(|d| d.version.trim())
            .find(|v| !v.is_empty() && v.starts_with(|c: char| c.is_ascii_digit()));
        let version = match declared {
            Some(v) => v.to_string(),
            None => versions::version_after(&pom, marker),
        };
        found.push(DetectedFramework::new(kind, version));
    }
    Ok(found)
}

fn parse_pom_dependencies(xml: &str) -> Result<Vec<PomDependency>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut dependencies = Vec::new();
    let mut current: Option<PomDependency> = None;
    let mut field: Option<Vec<u8>> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = e.local_name().as_ref().to_vec();
                if name == b"dependency" {
                    current = Some(PomDependency::default());
                } else if current.is_some() {
                    field = Some(name);
                }
            }
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"dependency" {
                    if let Some(dep) = current.take() {
                        dependencies.push(dep);
                    }
                }
                field = None;
            }
            Ok(Event::Text(e)) => {
                if let (Some(dep), Some(name)) = (current.as_mut(), field.as_deref()) {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    match name {
                        b"groupId" => dep.group_id = text,
                        b"artifactId" => dep.artifact_id = text,
                        b"version" => dep.version = text,
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "XML parsing error at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
    }

    Ok(dependencies)
}

fn probe_gradle(root: &Path) -> Result<Vec<DetectedFramework>, ManifestError> {
    let mut found = Vec::new();
    for file in ["build.gradle", "build.gradle.kts"] {
        let Some(gradle) = manifest::read_optional(root, file)? else {
            continue;
        };
        for (marker, kind) in [
            ("junit", FrameworkKind::JUnit),
            ("testng", FrameworkKind::TestNG),
            ("spek", FrameworkKind::Spek),
        ] {
            if gradle.contains(marker) {
                found.push(DetectedFramework::new(
                    kind,
                    versions::version_after(&gradle, marker),
                ));
            }
        }
    }
    Ok(found)
}

fn probe_php(root: &Path) -> Result<Vec<DetectedFramework>, ManifestError> {
    let Some(composer) = manifest::read_json(root, "composer.json")? else {
        return Ok(Vec::new());
    };
    let deps = manifest::merged_dependencies(&composer, &["require", "require-dev"]);

    let mut found = Vec::new();
    for (name, kind) in [
        ("phpunit/phpunit", FrameworkKind::PHPUnit),
        ("codeception/codeception", FrameworkKind::Codeception),
    ] {
        if let Some((_, version)) = deps.iter().find(|(dep, _)| dep == name) {
            found.push(DetectedFramework::new(kind, version.clone()));
        }
    }
    Ok(found)
}

fn probe_dotnet(root: &Path) -> Result<Vec<DetectedFramework>, ManifestError> {
    let mut found = Vec::new();
    for path in manifest::find_by_extension(root, ".csproj", PROJECT_FILE_DEPTH) {
        let content = std::fs::read(&path).map_err(|e| ManifestError::Read {
            path: path.clone(),
            source: e,
        })?;
        // NuGet package ids are case-insensitive ("xunit" vs "xUnit").
        let lowered = String::from_utf8_lossy(&content).to_lowercase();
        for (marker, kind) in [
            ("nunit", FrameworkKind::NUnit),
            ("xunit", FrameworkKind::XUnit),
            ("mstest", FrameworkKind::MSTest),
        ] {
            if lowered.contains(marker) {
                found.push(DetectedFramework::new(
                    kind,
                    versions::version_after(&lowered, marker),
                ));
            }
        }
    }
    Ok(found)
}

fn probe_go(root: &Path) -> Result<Vec<DetectedFramework>, ManifestError> {
    Ok(marker_file(root, "go.mod", FrameworkKind::GoTesting))
}

fn probe_swift(root: &Path) -> Result<Vec<DetectedFramework>, ManifestError> {
    Ok(marker_file(root, "Package.swift", FrameworkKind::XCTest))
}

fn probe_rust(root: &Path) -> Result<Vec<DetectedFramework>, ManifestError> {
    Ok(marker_file(root, "Cargo.toml", FrameworkKind::RustTest))
}

/// Ecosystems whose test runner ships with the toolchain: the manifest's
/// presence is the whole signal.
fn marker_file(root: &Path, name: &str, kind: FrameworkKind) -> Vec<DetectedFramework> {
    if root.join(name).is_file() {
        vec![DetectedFramework::unversioned(kind)]
    } else {
        Vec::new()
    }
}

fn probe_ruby(root: &Path) -> Result<Vec<DetectedFramework>, ManifestError> {
    let Some(gemfile) = manifest::read_optional(root, "Gemfile")? else {
        return Ok(Vec::new());
    };
    let mut found = Vec::new();
    for (marker, kind) in [("rspec", FrameworkKind::RSpec), ("minitest", FrameworkKind::Minitest)] {
        if gemfile.contains(marker) {
            found.push(DetectedFramework::new(
                kind,
                versions::gemfile_version(&gemfile, marker),
            ));
        }
    }
    Ok(found)
}

fn probe_scala(root: &Path) -> Result<Vec<DetectedFramework>, ManifestError> {
    let Some(sbt) = manifest::read_optional(root, "build.sbt")? else {
        return Ok(Vec::new());
    };
    if sbt.contains("scalatest") {
        Ok(vec![DetectedFramework::new(
            FrameworkKind::ScalaTest,
            versions::version_after(&sbt, "scalatest"),
        )])
    } else {
        Ok(Vec::new())
    }
}

//! Per-framework convention defaults.

use crate::detect::FrameworkKind;

use super::TestType;

/// Conventions one framework implies.
#[derive(Debug)]
pub struct FrameworkProfile {
    pub folders: &'static [&'static str],
    /// Ecosystem language the naming globs are filed under.
    pub language: &'static str,
    pub naming: &'static [&'static str],
    pub handling: &'static [(TestType, &'static str)],
}

const JEST: FrameworkProfile = FrameworkProfile {
    folders: &["__tests__/", "src/components/"],
    language: "javascript",
    naming: &["*.test.js", "*.test.tsx", "*.spec.js"],
    handling: &[
        (TestType::Unit, "same-folder-as-component"),
        (TestType::Integration, "__tests__/"),
    ],
};

const MOCHA: FrameworkProfile = FrameworkProfile {
    folders: &["test/"],
    language: "javascript",
    naming: &["*.test.js", "*.spec.js"],
    handling: &[
        (TestType::Unit, "test/"),
        (TestType::Integration, "test/integration/"),
    ],
};

const JASMINE: FrameworkProfile = FrameworkProfile {
    folders: &["spec/"],
    language: "javascript",
    naming: &["*.spec.js"],
    handling: &[(TestType::Unit, "spec/")],
};

const PYTHON: FrameworkProfile = FrameworkProfile {
    folders: &["tests/"],
    language: "python",
    naming: &["test_*.py", "*_test.py"],
    handling: &[
        (TestType::Unit, "tests/unit/"),
        (TestType::Integration, "tests/integration/"),
    ],
};

const JVM_JAVA: FrameworkProfile = FrameworkProfile {
    folders: &["src/test/java/"],
    language: "java",
    naming: &["*Test.java", "*Tests.java"],
    handling: &[
        (TestType::Unit, "src/test/java/"),
        (TestType::Integration, "src/test/integration/"),
    ],
};

const SPEK: FrameworkProfile = FrameworkProfile {
    folders: &["src/test/kotlin/"],
    language: "kotlin",
    naming: &["*Test.kt", "*Tests.kt"],
    handling: &[
        (TestType::Unit, "src/test/kotlin/"),
        (TestType::Integration, "src/integration/kotlin/"),
    ],
};

const PHPUNIT: FrameworkProfile = FrameworkProfile {
    folders: &["tests/"],
    language: "php",
    naming: &["*Test.php"],
    handling: &[
        (TestType::Unit, "tests/unit/"),
        (TestType::Integration, "tests/integration/"),
    ],
};

const CODECEPTION: FrameworkProfile = FrameworkProfile {
    folders: &["tests/"],
    language: "php",
    naming: &["*Test.php"],
    handling: &[
        (TestType::Unit, "tests/unit/"),
        (TestType::Integration, "tests/functional/"),
    ],
};

const DOTNET: FrameworkProfile = FrameworkProfile {
    folders: &["Tests/"],
    language: "csharp",
    naming: &["*Tests.cs"],
    handling: &[
        (TestType::Unit, "Tests/UnitTests/"),
        (TestType::Integration, "Tests/IntegrationTests/"),
    ],
};

const GO_TESTING: FrameworkProfile = FrameworkProfile {
    folders: &["tests/"],
    language: "go",
    naming: &["*_test.go"],
    handling: &[
        (TestType::Unit, "tests/"),
        (TestType::Integration, "integration_tests/"),
    ],
};

const XCTEST: FrameworkProfile = FrameworkProfile {
    folders: &["Tests/"],
    language: "swift",
    naming: &["*Tests.swift"],
    handling: &[
        (TestType::Unit, "Tests/UnitTests/"),
        (TestType::Integration, "Tests/IntegrationTests/"),
    ],
};

const RSPEC: FrameworkProfile = FrameworkProfile {
    folders: &["spec/"],
    language: "ruby",
    naming: &["*_spec.rb"],
    handling: &[
        (TestType::Unit, "spec/models/"),
        (TestType::Integration, "spec/integration/"),
        (TestType::System, "spec/system/"),
    ],
};

const MINITEST: FrameworkProfile = FrameworkProfile {
    folders: &["test/"],
    language: "ruby",
    naming: &["*_test.rb"],
    handling: &[
        (TestType::Unit, "test/models/"),
        (TestType::Integration, "test/integration/"),
        (TestType::System, "test/system/"),
    ],
};

const SCALATEST: FrameworkProfile = FrameworkProfile {
    folders: &["test/"],
    language: "scala",
    naming: &["*Spec.scala"],
    handling: &[
        (TestType::Unit, "src/test/scala/"),
        (TestType::Integration, "src/integration/scala/"),
    ],
};

const RUST_TEST: FrameworkProfile = FrameworkProfile {
    folders: &["tests/"],
    language: "rust",
    naming: &["*_test.rs"],
    handling: &[
        (TestType::Unit, "tests/unit/"),
        (TestType::Integration, "tests/integration/"),
    ],
};

/// Fallback for framework types without a profile.
pub const UNKNOWN: FrameworkProfile = FrameworkProfile {
    folders: &["tests/"],
    language: "unknown",
    naming: &["*.test.*", "*.spec.*"],
    handling: &[(TestType::Unit, "tests/")],
};

pub fn profile_for(kind: &FrameworkKind) -> &'static FrameworkProfile {
    match kind {
        FrameworkKind::Jest => &JEST,
        FrameworkKind::Mocha => &MOCHA,
        FrameworkKind::Jasmine => &JASMINE,
        FrameworkKind::Pytest | FrameworkKind::Unittest => &PYTHON,
        FrameworkKind::JUnit | FrameworkKind::TestNG => &JVM_JAVA,
        FrameworkKind::Spek => &SPEK,
        FrameworkKind::PHPUnit => &PHPUNIT,
        FrameworkKind::Codeception => &CODECEPTION,
        FrameworkKind::NUnit | FrameworkKind::XUnit | FrameworkKind::MSTest => &DOTNET,
        FrameworkKind::GoTesting => &GO_TESTING,
        FrameworkKind::XCTest => &XCTEST,
        FrameworkKind::RSpec => &RSPEC,
        FrameworkKind::Minitest => &MINITEST,
        FrameworkKind::ScalaTest => &SCALATEST,
        FrameworkKind::RustTest => &RUST_TEST,
        FrameworkKind::Custom(_) => &UNKNOWN,
    }
}

/// Coverage report locations, checked in order against the detected set.
pub const COVERAGE_PRECEDENCE: &[(FrameworkKind, &str)] = &[
    (FrameworkKind::Jest, "coverage/"),
    (FrameworkKind::Pytest, "htmlcov/"),
    (FrameworkKind::JUnit, "target/site/jacoco/"),
];

pub const DEFAULT_COVERAGE_FOLDER: &str = "coverage/";

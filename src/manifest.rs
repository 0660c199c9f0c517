//! Package manifest loading and root-directory layout.
//!
//! A manifest is a TOML file of `[[package]]` tables, each a loosely-typed
//! package description. Mandatory keys are checked by the resolver rather
//! than by serde so that a missing key surfaces as a configuration error
//! naming the key, before any filesystem access.

use crate::error::{InstallError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

/// Default cache subdirectory beneath the project root.
const CACHE_SUBDIR: &str = "externals/src_repo";
/// Default extraction subdirectory beneath the project root.
const EXTRACT_SUBDIR: &str = "externals/src";
/// Default build subdirectory beneath the project root.
const BUILD_SUBDIR: &str = "externals/build";
/// Default install subdirectory beneath the project root.
const INSTALL_SUBDIR: &str = "externals/install";

/// Environment variable naming the project root directory.
pub const PROJECT_ROOT_VAR: &str = "PROJECT_ROOT";

/// A raw, unresolved package description as read from the manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPackage {
    /// Unique package identifier; also the install subdirectory name.
    pub name: Option<String>,
    /// Archive or `*.git` name; the suffix selects download and extraction.
    pub file_name: Option<String>,
    /// Ordered mirror base URLs; first success wins.
    pub urls: Option<Vec<String>>,
    /// One of `make`, `imake`, `cmake`, `distutils`.
    pub build_type: Option<String>,

    /// Override for the download cache directory.
    pub cache_directory: Option<Utf8PathBuf>,
    /// Override for the extraction root.
    pub extract_root: Option<Utf8PathBuf>,
    /// Override for the build root.
    pub build_root: Option<Utf8PathBuf>,
    /// Override for the install root.
    pub install_root: Option<Utf8PathBuf>,

    /// Arguments appended to the configure invocation.
    #[serde(default)]
    pub configure_args: Vec<String>,
    /// Configure command override; empty selects `<source>/configure`.
    #[serde(default)]
    pub configure_cmd: String,
    /// Patch files applied in order before configuring.
    #[serde(default)]
    pub patches: Vec<String>,
    /// Scripts run before the build strategy, from the source directory.
    #[serde(default)]
    pub pre_install_scripts: Vec<String>,
    /// Scripts run after config deployment, from the install directory.
    #[serde(default)]
    pub post_install_scripts: Vec<String>,
    /// `[source, destination]` template pairs deployed after installation.
    #[serde(default)]
    pub config_files: Vec<(String, String)>,
    /// Paths that must exist for the package to count as installed.
    #[serde(default)]
    pub install_check_files: Vec<String>,
    /// `[command, expected stdout]` pairs proving installation.
    #[serde(default)]
    pub install_check_cmds: Vec<(String, String)>,
}

/// A parsed manifest.
#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    /// The package descriptions, in installation order.
    #[serde(default, rename = "package")]
    pub packages: Vec<RawPackage>,
}

/// Loads and parses a manifest file.
///
/// # Errors
///
/// Returns [`InstallError::InvalidManifest`] if the file cannot be read or
/// is not valid TOML.
pub fn load_manifest(path: &Utf8Path) -> Result<Vec<RawPackage>> {
    let contents =
        std::fs::read_to_string(path.as_std_path()).map_err(|err| InstallError::InvalidManifest {
            path: path.to_owned(),
            reason: err.to_string(),
        })?;

    let manifest: Manifest =
        toml::from_str(&contents).map_err(|err| InstallError::InvalidManifest {
            path: path.to_owned(),
            reason: err.to_string(),
        })?;

    Ok(manifest.packages)
}

/// The four default root directories a pipeline run works beneath.
///
/// Replaces the original design's process-global environment lookup: the
/// hosting CLI reads `PROJECT_ROOT` (or a flag) and fails fast, and the
/// orchestrator only ever sees this explicit struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootLayout {
    /// Where downloaded archives are cached.
    pub cache_dir: Utf8PathBuf,
    /// Where archives are extracted.
    pub extract_root: Utf8PathBuf,
    /// Where out-of-tree builds run.
    pub build_root: Utf8PathBuf,
    /// Where packages are installed, one subdirectory per package.
    pub install_root: Utf8PathBuf,
}

impl RootLayout {
    /// Derives the conventional layout beneath a project root.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use pkgforge::manifest::RootLayout;
    ///
    /// let roots = RootLayout::under(Utf8Path::new("/work/project"));
    /// assert_eq!(roots.cache_dir, "/work/project/externals/src_repo");
    /// assert_eq!(roots.install_root, "/work/project/externals/install");
    /// ```
    #[must_use]
    pub fn under(project_root: &Utf8Path) -> Self {
        Self {
            cache_dir: project_root.join(CACHE_SUBDIR),
            extract_root: project_root.join(EXTRACT_SUBDIR),
            build_root: project_root.join(BUILD_SUBDIR),
            install_root: project_root.join(INSTALL_SUBDIR),
        }
    }

    /// Reads the project root from the `PROJECT_ROOT` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::ProjectRootUnset`] if the variable is absent —
    /// a startup-time failure, not a per-package one.
    pub fn from_env() -> Result<Self> {
        let root = std::env::var(PROJECT_ROOT_VAR).map_err(|_| InstallError::ProjectRootUnset)?;
        Ok(Self::under(Utf8Path::new(&root)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_manifest_with_two_packages() {
        let document = r#"
            [[package]]
            name = "zlib"
            file_name = "zlib-1.3.tar.gz"
            urls = ["https://zlib.net"]
            build_type = "make"
            configure_args = ["--static"]
            install_check_files = ["zlib/lib/libz.a"]

            [[package]]
            name = "cmocka"
            file_name = "cmocka-1.1.7.tar.xz"
            urls = ["https://cmocka.org/files/1.1"]
            build_type = "cmake"
            install_check_cmds = [["pkg-config --modversion cmocka", "1.1.7"]]
        "#;

        let manifest: Manifest = toml::from_str(document).expect("manifest should parse");
        assert_eq!(manifest.packages.len(), 2);

        let zlib = &manifest.packages[0];
        assert_eq!(zlib.name.as_deref(), Some("zlib"));
        assert_eq!(zlib.configure_args, vec!["--static"]);
        assert!(zlib.install_check_cmds.is_empty());

        let cmocka = &manifest.packages[1];
        assert_eq!(cmocka.build_type.as_deref(), Some("cmake"));
        assert_eq!(
            cmocka.install_check_cmds,
            vec![(
                "pkg-config --modversion cmocka".to_owned(),
                "1.1.7".to_owned()
            )]
        );
    }

    #[test]
    fn missing_mandatory_keys_parse_as_none() {
        // Mandatory-key enforcement belongs to the resolver, not the parser.
        let manifest: Manifest =
            toml::from_str("[[package]]\nname = \"zlib\"").expect("manifest should parse");
        assert!(manifest.packages[0].file_name.is_none());
        assert!(manifest.packages[0].urls.is_none());
    }

    #[test]
    fn load_manifest_reports_unreadable_file() {
        let err = load_manifest(Utf8Path::new("/nonexistent/packages.toml"))
            .expect_err("expected read failure");
        assert!(matches!(err, InstallError::InvalidManifest { .. }));
    }

    #[test]
    fn load_manifest_reports_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[[package").expect("write");
        let path = Utf8PathBuf::from_path_buf(file.path().to_owned()).expect("utf8 path");

        let err = load_manifest(&path).expect_err("expected parse failure");
        assert!(matches!(err, InstallError::InvalidManifest { .. }));
    }

    #[test]
    fn root_layout_under_derives_the_four_roots() {
        let roots = RootLayout::under(Utf8Path::new("/proj"));
        assert_eq!(roots.cache_dir, "/proj/externals/src_repo");
        assert_eq!(roots.extract_root, "/proj/externals/src");
        assert_eq!(roots.build_root, "/proj/externals/build");
        assert_eq!(roots.install_root, "/proj/externals/install");
    }
}

//! Package specification resolution.
//!
//! [`PackageSpec::resolve`] turns a raw manifest entry into the fully
//! path-concrete, substitution-resolved description every later stage
//! consumes. Resolution validates mandatory keys, derives the cache,
//! source, build, and install paths, runs both substitution passes over
//! every optional field, enforces the installation-proof invariant, and
//! establishes the root directory skeleton on the execution target.

use crate::error::{InstallError, Result};
use crate::executor::Executor;
use crate::manifest::{RawPackage, RootLayout};
use crate::substitute::{resolve_pairs, resolve_strings, resolve_text, Bindings};
use camino::{Utf8Path, Utf8PathBuf};

/// Recognised archive suffixes, longest first so `.tar.gz` wins over `.tar`.
pub const ARCHIVE_SUFFIXES: &[&str] = &[".tar.bz2", ".tar.gz", ".tar.xz", ".tar", ".zip", ".git"];

/// The directory creation mode used for the root skeleton.
const ROOT_DIR_MODE: u32 = 0o755;

/// Command run on the target to locate the Python site-packages directory.
const SITE_PACKAGES_QUERY: &[&str] = &[
    "python3",
    "-c",
    "import site; print(site.getsitepackages()[0])",
];

/// Strips one recognised archive suffix from a file name.
///
/// Unrecognised suffixes are left alone here; they only become an error at
/// extraction time, the first point the suffix must match a known format.
///
/// # Examples
///
/// ```
/// use pkgforge::spec::file_stem;
///
/// assert_eq!(file_stem("foo-1.2.tar.gz"), "foo-1.2");
/// assert_eq!(file_stem("bar.git"), "bar");
/// assert_eq!(file_stem("odd.rar"), "odd.rar");
/// ```
#[must_use]
pub fn file_stem(file_name: &str) -> &str {
    for suffix in ARCHIVE_SUFFIXES {
        if let Some(stem) = file_name.strip_suffix(suffix) {
            return stem;
        }
    }
    file_name
}

/// A fully resolved package description, immutable after construction.
#[derive(Debug, Clone)]
pub struct PackageSpec {
    /// Unique package identifier.
    pub name: String,
    /// Archive or `*.git` file name.
    pub file_name: String,
    /// Ordered mirror base URLs.
    pub download_urls: Vec<String>,
    /// Build strategy name; validated when a strategy is selected.
    pub build_type: String,

    /// Root directory for cached downloads.
    pub cache_dir: Utf8PathBuf,
    /// Root directory for extracted sources.
    pub extract_root: Utf8PathBuf,
    /// Root directory for out-of-tree builds.
    pub build_root: Utf8PathBuf,
    /// Root directory for installs.
    pub install_root: Utf8PathBuf,

    /// `<cache_dir>/<file_name>` — the downloaded archive.
    pub source_archive_path: Utf8PathBuf,
    /// `<extract_root>/<stem>` — the extracted source tree.
    pub source_extracted_path: Utf8PathBuf,
    /// Build directory; equals the source tree for in-source (`imake`) builds.
    pub build_path: Utf8PathBuf,
    /// Install prefix; for `distutils` the target's site-packages directory.
    pub install_path: Utf8PathBuf,

    /// Resolved configure arguments, in order.
    pub configure_args: Vec<String>,
    /// Resolved configure command; empty selects `<source>/configure`.
    pub configure_cmd: String,
    /// Resolved patch file paths, applied in order.
    pub patches: Vec<Utf8PathBuf>,
    /// Resolved pre-install script paths.
    pub pre_install_scripts: Vec<Utf8PathBuf>,
    /// Resolved post-install script paths.
    pub post_install_scripts: Vec<Utf8PathBuf>,
    /// Resolved `(source, destination)` config-file pairs.
    pub config_files: Vec<(Utf8PathBuf, Utf8PathBuf)>,
    /// Resolved install-check file paths.
    pub install_check_files: Vec<String>,
    /// Resolved `(command, expected stdout)` install checks.
    pub install_check_cmds: Vec<(String, String)>,
}

impl PackageSpec {
    /// Resolves a raw description against the default roots and target.
    ///
    /// Creates the four root directories on the target as a side effect;
    /// resolution establishes the directory skeleton both locally and
    /// remotely.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a missing mandatory key (before any
    /// filesystem access) or an empty verification set, and an execution
    /// error if the distutils site-packages query fails. A failed query
    /// aborts resolution for this package only.
    pub fn resolve(
        raw: &RawPackage,
        roots: &RootLayout,
        executor: &dyn Executor,
    ) -> Result<Self> {
        let name = mandatory(&raw.name, "name")?;
        let file_name = mandatory(&raw.file_name, "file_name")?;
        let download_urls = raw
            .urls
            .clone()
            .ok_or(InstallError::MissingKey { key: "urls" })?;
        let build_type = mandatory(&raw.build_type, "build_type")?;

        let stem = file_stem(&file_name).to_owned();

        let cache_dir = raw.cache_directory.clone().unwrap_or_else(|| roots.cache_dir.clone());
        let extract_root = raw.extract_root.clone().unwrap_or_else(|| roots.extract_root.clone());
        let build_root = raw.build_root.clone().unwrap_or_else(|| roots.build_root.clone());
        let install_root = raw.install_root.clone().unwrap_or_else(|| roots.install_root.clone());

        let source_archive_path = cache_dir.join(&file_name);
        let source_extracted_path = extract_root.join(&stem);

        // imake builds are in-source; everything else builds out of tree.
        let build_path = if build_type == "imake" {
            source_extracted_path.clone()
        } else {
            build_root.join(&stem)
        };

        // distutils installs into the target runtime's site directory, not
        // under the install root.
        let install_path = if build_type == "distutils" {
            query_site_packages(executor)?
        } else {
            install_root.join(&name)
        };

        let package_vars: Bindings = vec![
            ("INSTALL_ROOT_DIR".to_owned(), install_root.to_string()),
            ("SOURCE_ROOT_DIR".to_owned(), extract_root.to_string()),
            ("BUILD_ROOT_DIR".to_owned(), build_root.to_string()),
            ("PACKAGE_INSTALL_DIR".to_owned(), install_path.to_string()),
            (
                "PACKAGE_SOURCE_DIR".to_owned(),
                source_extracted_path.to_string(),
            ),
            ("PACKAGE_BUILD_DIR".to_owned(), build_path.to_string()),
        ];

        let download_urls = resolve_strings(download_urls, &package_vars);
        let configure_args = resolve_strings(raw.configure_args.clone(), &package_vars);
        let configure_cmd = resolve_text(&raw.configure_cmd, &package_vars);
        let patches = resolve_paths(raw.patches.clone(), &package_vars);
        let pre_install_scripts = resolve_paths(raw.pre_install_scripts.clone(), &package_vars);
        let post_install_scripts = resolve_paths(raw.post_install_scripts.clone(), &package_vars);
        let config_files = resolve_pairs(raw.config_files.clone(), &package_vars)
            .into_iter()
            .map(|(source, dest)| (Utf8PathBuf::from(source), Utf8PathBuf::from(dest)))
            .collect();
        let install_check_files = resolve_strings(raw.install_check_files.clone(), &package_vars);
        let install_check_cmds = resolve_pairs(raw.install_check_cmds.clone(), &package_vars);

        if install_check_files.is_empty() && install_check_cmds.is_empty() {
            return Err(InstallError::NoInstallProof { name });
        }

        for dir in [&cache_dir, &extract_root, &build_root, &install_root] {
            executor.mkdirs(dir, ROOT_DIR_MODE)?;
        }

        let spec = Self {
            name,
            file_name,
            download_urls,
            build_type,
            cache_dir,
            extract_root,
            build_root,
            install_root,
            source_archive_path,
            source_extracted_path,
            build_path,
            install_path,
            configure_args,
            configure_cmd,
            patches,
            pre_install_scripts,
            post_install_scripts,
            config_files,
            install_check_files,
            install_check_cmds,
        };

        log::debug!("resolved package spec: {spec:#?}");
        Ok(spec)
    }

    /// The bindings for the six package-scoped substitution variables.
    ///
    /// Used wherever script or config-file *contents* are substituted after
    /// resolution.
    #[must_use]
    pub fn package_vars(&self) -> Bindings {
        vec![
            ("INSTALL_ROOT_DIR".to_owned(), self.install_root.to_string()),
            ("SOURCE_ROOT_DIR".to_owned(), self.extract_root.to_string()),
            ("BUILD_ROOT_DIR".to_owned(), self.build_root.to_string()),
            (
                "PACKAGE_INSTALL_DIR".to_owned(),
                self.install_path.to_string(),
            ),
            (
                "PACKAGE_SOURCE_DIR".to_owned(),
                self.source_extracted_path.to_string(),
            ),
            ("PACKAGE_BUILD_DIR".to_owned(), self.build_path.to_string()),
        ]
    }

    /// Returns whether the downloaded archive is already in the cache.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    pub fn archive_exists(&self, executor: &dyn Executor) -> Result<bool> {
        executor.exists(&self.source_archive_path)
    }
}

fn mandatory(field: &Option<String>, key: &'static str) -> Result<String> {
    field.clone().ok_or(InstallError::MissingKey { key })
}

fn resolve_paths(items: Vec<String>, package_vars: &Bindings) -> Vec<Utf8PathBuf> {
    resolve_strings(items, package_vars)
        .into_iter()
        .map(Utf8PathBuf::from)
        .collect()
}

/// Asks the target's Python runtime where site-packages lives.
fn query_site_packages(executor: &dyn Executor) -> Result<Utf8PathBuf> {
    let argv: Vec<String> = SITE_PACKAGES_QUERY.iter().map(|s| (*s).to_owned()).collect();
    let output = executor.run_command(&argv, Utf8Path::new("."), false)?;

    if !output.stderr.is_empty() {
        return Err(InstallError::Execution {
            command: argv.join(" "),
            stderr: output.stderr,
        });
    }

    Ok(Utf8PathBuf::from(output.stdout.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::CommandOutput;
    use crate::test_support::StubExecutor;
    use rstest::rstest;

    fn roots() -> RootLayout {
        RootLayout::under(Utf8Path::new("/proj"))
    }

    fn raw_package() -> RawPackage {
        RawPackage {
            name: Some("zlib".to_owned()),
            file_name: Some("zlib-1.3.tar.gz".to_owned()),
            urls: Some(vec!["https://zlib.net".to_owned()]),
            build_type: Some("make".to_owned()),
            install_check_files: vec!["zlib/lib/libz.a".to_owned()],
            ..RawPackage::default()
        }
    }

    #[rstest]
    #[case::tar_gz("foo-1.2.tar.gz", "foo-1.2")]
    #[case::tar_bz2("foo.tar.bz2", "foo")]
    #[case::tar_xz("foo.tar.xz", "foo")]
    #[case::tar("foo.tar", "foo")]
    #[case::zip("foo.zip", "foo")]
    #[case::git("bar.git", "bar")]
    #[case::unrecognised("odd.rar", "odd.rar")]
    fn file_stem_strips_one_suffix(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(file_stem(input), expected);
    }

    #[test]
    fn resolve_derives_all_paths() {
        let executor = StubExecutor::new();
        let spec = PackageSpec::resolve(&raw_package(), &roots(), &executor).expect("resolve");

        assert_eq!(
            spec.source_archive_path,
            "/proj/externals/src_repo/zlib-1.3.tar.gz"
        );
        assert_eq!(spec.source_extracted_path, "/proj/externals/src/zlib-1.3");
        assert_eq!(spec.build_path, "/proj/externals/build/zlib-1.3");
        assert_eq!(spec.install_path, "/proj/externals/install/zlib");
    }

    #[test]
    fn resolve_creates_root_skeleton() {
        let executor = StubExecutor::new();
        PackageSpec::resolve(&raw_package(), &roots(), &executor).expect("resolve");

        for dir in [
            "/proj/externals/src_repo",
            "/proj/externals/src",
            "/proj/externals/build",
            "/proj/externals/install",
        ] {
            assert!(
                executor.exists(Utf8Path::new(dir)).expect("exists"),
                "expected {dir} to be created"
            );
        }
    }

    #[test]
    fn imake_builds_in_source() {
        let mut raw = raw_package();
        raw.build_type = Some("imake".to_owned());

        let executor = StubExecutor::new();
        let spec = PackageSpec::resolve(&raw, &roots(), &executor).expect("resolve");
        assert_eq!(spec.build_path, spec.source_extracted_path);
    }

    #[test]
    fn distutils_install_path_comes_from_target_runtime() {
        let mut raw = raw_package();
        raw.build_type = Some("distutils".to_owned());

        let executor = StubExecutor::new();
        executor.set_output(
            "python3 -c import site; print(site.getsitepackages()[0])",
            CommandOutput {
                stdout: "/usr/lib/python3.12/site-packages\n".to_owned(),
                stderr: String::new(),
            },
        );

        let spec = PackageSpec::resolve(&raw, &roots(), &executor).expect("resolve");
        assert_eq!(spec.install_path, "/usr/lib/python3.12/site-packages");
    }

    #[test]
    fn distutils_query_failure_aborts_resolution() {
        let mut raw = raw_package();
        raw.build_type = Some("distutils".to_owned());

        let executor = StubExecutor::new();
        executor.set_output(
            "python3 -c import site; print(site.getsitepackages()[0])",
            CommandOutput {
                stdout: String::new(),
                stderr: "Error: python3 not found".to_owned(),
            },
        );

        let err = PackageSpec::resolve(&raw, &roots(), &executor).expect_err("expected failure");
        assert!(matches!(err, InstallError::Execution { .. }));
    }

    #[rstest]
    #[case::name("name")]
    #[case::file_name("file_name")]
    #[case::urls("urls")]
    #[case::build_type("build_type")]
    fn missing_mandatory_key_is_rejected(#[case] key: &str) {
        let mut raw = raw_package();
        match key {
            "name" => raw.name = None,
            "file_name" => raw.file_name = None,
            "urls" => raw.urls = None,
            "build_type" => raw.build_type = None,
            other => panic!("unexpected key {other}"),
        }

        let executor = StubExecutor::new();
        let err = PackageSpec::resolve(&raw, &roots(), &executor).expect_err("expected rejection");
        assert!(matches!(err, InstallError::MissingKey { key: k } if k == key));
    }

    #[test]
    fn missing_mandatory_key_aborts_before_filesystem_access() {
        let mut raw = raw_package();
        raw.urls = None;

        let executor = StubExecutor::new();
        let _ = PackageSpec::resolve(&raw, &roots(), &executor);
        assert!(
            !executor
                .exists(Utf8Path::new("/proj/externals/src_repo"))
                .expect("exists"),
            "no directories may be created for an invalid description"
        );
    }

    #[test]
    fn package_without_any_install_proof_is_rejected() {
        let mut raw = raw_package();
        raw.install_check_files.clear();
        raw.install_check_cmds.clear();

        let executor = StubExecutor::new();
        let err = PackageSpec::resolve(&raw, &roots(), &executor).expect_err("expected rejection");
        assert!(matches!(err, InstallError::NoInstallProof { name } if name == "zlib"));
    }

    #[test]
    fn configure_args_are_substituted_with_package_variables() {
        let mut raw = raw_package();
        raw.configure_args = vec!["--with-build=$PACKAGE_BUILD_DIR".to_owned()];

        let executor = StubExecutor::new();
        let spec = PackageSpec::resolve(&raw, &roots(), &executor).expect("resolve");
        assert_eq!(
            spec.configure_args,
            vec!["--with-build=/proj/externals/build/zlib-1.3".to_owned()]
        );
    }

    #[test]
    fn install_check_cmds_see_the_install_directory() {
        let mut raw = raw_package();
        raw.install_check_cmds = vec![(
            "$PACKAGE_INSTALL_DIR/bin/tool --version".to_owned(),
            "1.3".to_owned(),
        )];

        let executor = StubExecutor::new();
        let spec = PackageSpec::resolve(&raw, &roots(), &executor).expect("resolve");
        assert_eq!(
            spec.install_check_cmds[0].0,
            "/proj/externals/install/zlib/bin/tool --version"
        );
    }
}

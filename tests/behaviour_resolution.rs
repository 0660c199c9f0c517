//! Behaviour-driven tests for package specification resolution.
//!
//! These scenarios validate path derivation, variable substitution, the
//! distutils install-path query, and the resolution-time invariants, using
//! the in-memory executor stub.

use camino::Utf8Path;
use pkgforge::error::{InstallError, Result as PkgResult};
use pkgforge::executor::CommandOutput;
use pkgforge::manifest::{RawPackage, RootLayout};
use pkgforge::spec::PackageSpec;
use pkgforge::test_support::StubExecutor;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;

const SITE_PACKAGES: &str = "/usr/lib/python3.12/site-packages";

#[derive(Default)]
struct ResolutionWorld {
    executor: StubExecutor,
    raw: RefCell<RawPackage>,
    resolved: RefCell<Option<PkgResult<PackageSpec>>>,
}

impl ResolutionWorld {
    fn spec(&self) -> PackageSpec {
        let resolved = self.resolved.borrow();
        match resolved.as_ref().expect("resolution should have run") {
            Ok(spec) => spec.clone(),
            Err(err) => panic!("resolution failed: {err}"),
        }
    }
}

fn base_package() -> RawPackage {
    RawPackage {
        name: Some("zlib".to_owned()),
        file_name: Some("zlib-1.3.tar.gz".to_owned()),
        urls: Some(vec!["https://zlib.net".to_owned()]),
        build_type: Some("make".to_owned()),
        install_check_files: vec!["zlib/lib/libz.a".to_owned()],
        ..RawPackage::default()
    }
}

#[fixture]
fn resolution_world() -> ResolutionWorld {
    ResolutionWorld::default()
}

#[given("a make package description")]
fn given_make_package(resolution_world: &ResolutionWorld) {
    resolution_world.raw.replace(base_package());
}

#[given("a make package description with a configure argument referencing the install directory")]
fn given_configure_arg_package(resolution_world: &ResolutionWorld) {
    resolution_world.raw.replace(RawPackage {
        configure_args: vec!["--with-root=$PACKAGE_INSTALL_DIR".to_owned()],
        ..base_package()
    });
}

#[given("a distutils package description")]
fn given_distutils_package(resolution_world: &ResolutionWorld) {
    resolution_world.raw.replace(RawPackage {
        build_type: Some("distutils".to_owned()),
        ..base_package()
    });
}

#[given("the target reports a site-packages directory")]
fn given_site_packages(resolution_world: &ResolutionWorld) {
    resolution_world.executor.set_output(
        "python3 -c import site; print(site.getsitepackages()[0])",
        CommandOutput {
            stdout: format!("{SITE_PACKAGES}\n"),
            stderr: String::new(),
        },
    );
}

#[given("a package description missing its file name")]
fn given_missing_file_name(resolution_world: &ResolutionWorld) {
    resolution_world.raw.replace(RawPackage {
        file_name: None,
        ..base_package()
    });
}

#[given("a make package description without any installation checks")]
fn given_no_checks(resolution_world: &ResolutionWorld) {
    resolution_world.raw.replace(RawPackage {
        install_check_files: Vec::new(),
        install_check_cmds: Vec::new(),
        ..base_package()
    });
}

#[when("the description is resolved")]
fn when_resolved(resolution_world: &ResolutionWorld) {
    let raw = resolution_world.raw.borrow();
    let roots = RootLayout::under(Utf8Path::new("/proj"));
    let result = PackageSpec::resolve(&raw, &roots, &resolution_world.executor);
    resolution_world.resolved.replace(Some(result));
}

#[then("resolution succeeds")]
fn then_resolution_succeeds(resolution_world: &ResolutionWorld) {
    let _ = resolution_world.spec();
}

#[then("the archive path is beneath the cache directory")]
fn then_archive_path(resolution_world: &ResolutionWorld) {
    assert_eq!(
        resolution_world.spec().source_archive_path,
        "/proj/externals/src_repo/zlib-1.3.tar.gz"
    );
}

#[then("the extracted and build paths strip the archive suffix")]
fn then_stemmed_paths(resolution_world: &ResolutionWorld) {
    let spec = resolution_world.spec();
    assert_eq!(spec.source_extracted_path, "/proj/externals/src/zlib-1.3");
    assert_eq!(spec.build_path, "/proj/externals/build/zlib-1.3");
}

#[then("the configure argument names the concrete install directory")]
fn then_configure_arg_substituted(resolution_world: &ResolutionWorld) {
    assert_eq!(
        resolution_world.spec().configure_args,
        vec!["--with-root=/proj/externals/install/zlib".to_owned()]
    );
}

#[then("the install path is the reported site-packages directory")]
fn then_site_packages_install(resolution_world: &ResolutionWorld) {
    assert_eq!(resolution_world.spec().install_path, SITE_PACKAGES);
}

#[then("resolution fails naming the missing key")]
fn then_missing_key(resolution_world: &ResolutionWorld) {
    let resolved = resolution_world.resolved.borrow();
    let result = resolved.as_ref().expect("resolution should have run");
    assert!(matches!(
        result,
        Err(InstallError::MissingKey { key: "file_name" })
    ));
}

#[then("resolution fails because no installation proof exists")]
fn then_no_proof(resolution_world: &ResolutionWorld) {
    let resolved = resolution_world.resolved.borrow();
    let result = resolved.as_ref().expect("resolution should have run");
    assert!(matches!(
        result,
        Err(InstallError::NoInstallProof { name }) if name == "zlib"
    ));
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(path = "tests/features/resolution.feature", index = 0)]
fn scenario_derived_paths(resolution_world: ResolutionWorld) {
    let _ = resolution_world;
}

#[scenario(path = "tests/features/resolution.feature", index = 1)]
fn scenario_configure_arg_substitution(resolution_world: ResolutionWorld) {
    let _ = resolution_world;
}

#[scenario(path = "tests/features/resolution.feature", index = 2)]
fn scenario_distutils_install_path(resolution_world: ResolutionWorld) {
    let _ = resolution_world;
}

#[scenario(path = "tests/features/resolution.feature", index = 3)]
fn scenario_missing_mandatory_key(resolution_world: ResolutionWorld) {
    let _ = resolution_world;
}

#[scenario(path = "tests/features/resolution.feature", index = 4)]
fn scenario_no_installation_proof(resolution_world: ResolutionWorld) {
    let _ = resolution_world;
}

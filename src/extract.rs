//! Suffix-dispatched archive extraction on the execution target.
//!
//! Extraction always shells out (`tar`, `unzip`, `cp`) through the executor
//! rather than unpacking in-process, so the same code path works whether the
//! archive lives on this machine or on a remote host.

use crate::error::{InstallError, Result};
use crate::executor::Executor;
use crate::spec::PackageSpec;

/// Mode applied to extraction destination directories.
const EXTRACT_DIR_MODE: u32 = 0o755;

/// The recognised archive formats, keyed by file-name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// A cached git clone, copied rather than unpacked.
    Git,
    /// A zip archive.
    Zip,
    /// An uncompressed tar archive.
    Tar,
    /// A bzip2-compressed tar archive.
    TarBz2,
    /// A gzip-compressed tar archive.
    TarGz,
    /// An xz-compressed tar archive.
    TarXz,
}

/// Classifies a file name by its archive suffix.
///
/// # Errors
///
/// Returns [`InstallError::UnsupportedArchive`] for an unrecognised suffix.
/// This is the point where a bad suffix becomes fatal; earlier stages treat
/// the name as opaque.
pub fn archive_kind(file_name: &str) -> Result<ArchiveKind> {
    // Compound suffixes first so `.tar.gz` is not classified as plain tar.
    if file_name.ends_with(".tar.bz2") {
        Ok(ArchiveKind::TarBz2)
    } else if file_name.ends_with(".tar.gz") {
        Ok(ArchiveKind::TarGz)
    } else if file_name.ends_with(".tar.xz") {
        Ok(ArchiveKind::TarXz)
    } else if file_name.ends_with(".tar") {
        Ok(ArchiveKind::Tar)
    } else if file_name.ends_with(".zip") {
        Ok(ArchiveKind::Zip)
    } else if file_name.ends_with(".git") {
        Ok(ArchiveKind::Git)
    } else {
        Err(InstallError::UnsupportedArchive {
            file_name: file_name.to_owned(),
        })
    }
}

/// How an extraction stage concluded for one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// The destination directory already existed.
    AlreadyExtracted,
    /// The archive was unpacked.
    Extracted,
}

/// Unpacks the cached archive into the extraction root on the target.
///
/// Idempotent: an existing destination directory is taken as proof of a
/// previous extraction and nothing is done.
///
/// # Errors
///
/// Returns a configuration error for an unrecognised suffix, or an execution
/// error if the unpacking command reports an error on stderr.
pub fn extract_package(spec: &PackageSpec, executor: &dyn Executor) -> Result<ExtractOutcome> {
    let kind = archive_kind(&spec.file_name)?;

    if executor.exists(&spec.source_extracted_path)? {
        return Ok(ExtractOutcome::AlreadyExtracted);
    }

    let archive = spec.source_archive_path.as_str();
    let argv: Vec<String> = match kind {
        ArchiveKind::Git => {
            // A clone is already a directory tree; copy its contents across.
            executor.mkdirs(&spec.source_extracted_path, EXTRACT_DIR_MODE)?;
            vec![
                "bash".to_owned(),
                "-c".to_owned(),
                format!("cp -rf {archive}/* {}", spec.source_extracted_path),
            ]
        }
        ArchiveKind::Zip => vec!["unzip".to_owned(), archive.to_owned()],
        ArchiveKind::Tar => tar_argv("-xf", archive),
        ArchiveKind::TarBz2 => tar_argv("-xjf", archive),
        ArchiveKind::TarGz => tar_argv("-xzf", archive),
        ArchiveKind::TarXz => tar_argv("-xJf", archive),
    };

    let output = executor.run_command(&argv, &spec.extract_root, false)?;
    if !output.succeeded() {
        return Err(InstallError::Execution {
            command: argv.join(" "),
            stderr: output.stderr,
        });
    }

    Ok(ExtractOutcome::Extracted)
}

fn tar_argv(flags: &str, archive: &str) -> Vec<String> {
    vec!["tar".to_owned(), flags.to_owned(), archive.to_owned()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::CommandOutput;
    use crate::manifest::{RawPackage, RootLayout};
    use crate::test_support::StubExecutor;
    use camino::Utf8Path;
    use rstest::rstest;

    fn resolved_spec(file_name: &str, executor: &StubExecutor) -> PackageSpec {
        let raw = RawPackage {
            name: Some("pkg".to_owned()),
            file_name: Some(file_name.to_owned()),
            urls: Some(vec!["https://mirror.example".to_owned()]),
            build_type: Some("make".to_owned()),
            install_check_files: vec!["pkg/done".to_owned()],
            ..RawPackage::default()
        };
        PackageSpec::resolve(&raw, &RootLayout::under(Utf8Path::new("/proj")), executor)
            .expect("resolve")
    }

    #[rstest]
    #[case::git("repo.git", ArchiveKind::Git)]
    #[case::zip("pkg.zip", ArchiveKind::Zip)]
    #[case::tar("pkg.tar", ArchiveKind::Tar)]
    #[case::tar_bz2("pkg.tar.bz2", ArchiveKind::TarBz2)]
    #[case::tar_gz("pkg-1.2.tar.gz", ArchiveKind::TarGz)]
    #[case::tar_xz("pkg.tar.xz", ArchiveKind::TarXz)]
    fn classifies_known_suffixes(#[case] file_name: &str, #[case] expected: ArchiveKind) {
        assert_eq!(archive_kind(file_name).expect("kind"), expected);
    }

    #[test]
    fn unknown_suffix_is_a_configuration_error() {
        let err = archive_kind("pkg.rar").expect_err("expected rejection");
        assert!(matches!(err, InstallError::UnsupportedArchive { .. }));
    }

    #[rstest]
    #[case::tar_gz("pkg-1.2.tar.gz", &["tar", "-xzf", "/proj/externals/src_repo/pkg-1.2.tar.gz"])]
    #[case::tar_bz2("pkg-1.2.tar.bz2", &["tar", "-xjf", "/proj/externals/src_repo/pkg-1.2.tar.bz2"])]
    #[case::tar_xz("pkg-1.2.tar.xz", &["tar", "-xJf", "/proj/externals/src_repo/pkg-1.2.tar.xz"])]
    #[case::tar("pkg-1.2.tar", &["tar", "-xf", "/proj/externals/src_repo/pkg-1.2.tar"])]
    #[case::zip("pkg-1.2.zip", &["unzip", "/proj/externals/src_repo/pkg-1.2.zip"])]
    fn unpack_command_matches_suffix(#[case] file_name: &str, #[case] expected: &[&str]) {
        let executor = StubExecutor::new();
        let spec = resolved_spec(file_name, &executor);

        let outcome = extract_package(&spec, &executor).expect("extract");
        assert_eq!(outcome, ExtractOutcome::Extracted);

        let recorded = executor.commands();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].argv, expected);
        assert_eq!(recorded[0].cwd, "/proj/externals/src");
    }

    #[test]
    fn existing_destination_skips_extraction() {
        let executor = StubExecutor::new();
        let spec = resolved_spec("pkg-1.2.tar.gz", &executor);
        executor.create_dir(spec.source_extracted_path.as_str());

        let outcome = extract_package(&spec, &executor).expect("extract");
        assert_eq!(outcome, ExtractOutcome::AlreadyExtracted);
        assert!(executor.commands().is_empty());
    }

    #[test]
    fn git_clone_is_copied_not_unpacked() {
        let executor = StubExecutor::new();
        let spec = resolved_spec("tool.git", &executor);

        extract_package(&spec, &executor).expect("extract");

        let recorded = executor.commands();
        assert_eq!(recorded[0].argv[0], "bash");
        assert!(recorded[0].argv[2].starts_with("cp -rf /proj/externals/src_repo/tool.git/*"));
        assert!(
            executor
                .exists(&spec.source_extracted_path)
                .expect("exists"),
            "destination directory must be created before the copy"
        );
    }

    #[test]
    fn unpack_error_surfaces_as_execution_failure() {
        let executor = StubExecutor::new();
        let spec = resolved_spec("pkg-1.2.tar.gz", &executor);
        executor.set_output(
            "tar -xzf /proj/externals/src_repo/pkg-1.2.tar.gz",
            CommandOutput {
                stdout: String::new(),
                stderr: "tar: Error is not recoverable".to_owned(),
            },
        );

        let err = extract_package(&spec, &executor).expect_err("expected failure");
        assert!(matches!(err, InstallError::Execution { .. }));
    }
}

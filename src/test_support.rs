//! In-memory stand-ins for the executor and fetcher seams.
//!
//! Available to this crate's unit tests and, through the `test-support`
//! feature, to the behavioural tests under `tests/`. The stub executor
//! models the target as a flat map of files and directories and records
//! every command it is asked to run; commands succeed with empty output
//! unless a canned output is registered for their exact argv line.

use crate::download::{ArchiveFetcher, DownloadError, FetchedArchive};
use crate::error::Result;
use crate::executor::{CommandOutput, Executor};
use camino::{Utf8Path, Utf8PathBuf};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One command observed by the stub executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    /// The argv line as given.
    pub argv: Vec<String>,
    /// The working directory it was to run in.
    pub cwd: Utf8PathBuf,
    /// Whether it was spawned in the background.
    pub background: bool,
}

type CommandEffect = Box<dyn Fn(&StubExecutor)>;

/// An in-memory execution target.
#[derive(Default)]
pub struct StubExecutor {
    files: RefCell<BTreeMap<Utf8PathBuf, Vec<u8>>>,
    dirs: RefCell<BTreeSet<Utf8PathBuf>>,
    recorded: RefCell<Vec<RecordedCommand>>,
    outputs: RefCell<HashMap<String, CommandOutput>>,
    effects: RefCell<HashMap<String, CommandEffect>>,
    capture_on_remove: RefCell<BTreeSet<Utf8PathBuf>>,
    captured: RefCell<BTreeMap<Utf8PathBuf, Vec<u8>>>,
}

impl StubExecutor {
    /// Creates an empty target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `path` as an existing directory.
    pub fn create_dir(&self, path: &str) {
        insert_with_ancestors(&mut self.dirs.borrow_mut(), Utf8Path::new(path));
    }

    /// Registers a canned output for the exact argv line `command`.
    pub fn set_output(&self, command: &str, output: CommandOutput) {
        self.outputs.borrow_mut().insert(command.to_owned(), output);
    }

    /// Registers a one-shot side effect run when `command` succeeds, for
    /// modelling commands that create files or directories.
    pub fn on_command_success(&self, command: &str, effect: impl Fn(&Self) + 'static) {
        self.effects
            .borrow_mut()
            .insert(command.to_owned(), Box::new(effect));
    }

    /// Every command observed so far, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.recorded.borrow().clone()
    }

    /// Preserves the contents of `path` when it is later removed.
    pub fn capture_file_on_remove(&self, path: &str) {
        self.capture_on_remove
            .borrow_mut()
            .insert(Utf8PathBuf::from(path));
    }

    /// Contents preserved by [`Self::capture_file_on_remove`].
    #[must_use]
    pub fn captured_file(&self, path: &str) -> Option<Vec<u8>> {
        self.captured.borrow().get(Utf8Path::new(path)).cloned()
    }
}

fn insert_with_ancestors(dirs: &mut BTreeSet<Utf8PathBuf>, path: &Utf8Path) {
    let mut current = Utf8PathBuf::new();
    for component in path.components() {
        current.push(component);
        dirs.insert(current.clone());
    }
}

impl Executor for StubExecutor {
    fn exists(&self, path: &Utf8Path) -> Result<bool> {
        Ok(self.files.borrow().contains_key(path) || self.dirs.borrow().contains(path))
    }

    fn mkdirs(&self, path: &Utf8Path, _mode: u32) -> Result<()> {
        insert_with_ancestors(&mut self.dirs.borrow_mut(), path);
        Ok(())
    }

    fn read_file(&self, path: &Utf8Path) -> Result<Vec<u8>> {
        self.files.borrow().get(path).cloned().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, path.to_string()).into()
        })
    }

    fn write_file(&self, path: &Utf8Path, data: &[u8], _mode: u32) -> Result<()> {
        if let Some(parent) = path.parent() {
            insert_with_ancestors(&mut self.dirs.borrow_mut(), parent);
        }
        self.files.borrow_mut().insert(path.to_owned(), data.to_vec());
        Ok(())
    }

    fn remove_file(&self, path: &Utf8Path) -> Result<()> {
        let removed = self.files.borrow_mut().remove(path).ok_or_else(|| {
            crate::error::InstallError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                path.to_string(),
            ))
        })?;
        if self.capture_on_remove.borrow().contains(path) {
            self.captured.borrow_mut().insert(path.to_owned(), removed);
        }
        Ok(())
    }

    fn remove_tree(&self, path: &Utf8Path) -> Result<()> {
        self.files
            .borrow_mut()
            .retain(|file, _| !file.starts_with(path));
        self.dirs.borrow_mut().retain(|dir| !dir.starts_with(path));
        Ok(())
    }

    fn file_size(&self, path: &Utf8Path) -> Result<Option<u64>> {
        Ok(self.files.borrow().get(path).map(|data| data.len() as u64))
    }

    fn run_command(
        &self,
        argv: &[String],
        cwd: &Utf8Path,
        background: bool,
    ) -> Result<CommandOutput> {
        self.recorded.borrow_mut().push(RecordedCommand {
            argv: argv.to_vec(),
            cwd: cwd.to_owned(),
            background,
        });

        let key = argv.join(" ");
        let output = self
            .outputs
            .borrow()
            .get(&key)
            .cloned()
            .unwrap_or_default();

        if output.succeeded() {
            let effect = self.effects.borrow_mut().remove(&key);
            if let Some(effect) = effect {
                effect(self);
            }
        }

        Ok(output)
    }
}

/// An [`ArchiveFetcher`] that serves fixed bodies by URL.
#[derive(Default)]
pub struct StaticFetcher {
    bodies: RefCell<HashMap<String, Vec<u8>>>,
}

impl StaticFetcher {
    /// Creates a fetcher with no registered bodies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `data` for `url`.
    pub fn stage(&self, url: &str, data: &[u8]) {
        self.bodies.borrow_mut().insert(url.to_owned(), data.to_vec());
    }
}

impl ArchiveFetcher for StaticFetcher {
    fn content_length(&self, url: &str) -> std::result::Result<Option<u64>, DownloadError> {
        match self.bodies.borrow().get(url) {
            Some(data) => Ok(Some(data.len() as u64)),
            None => Err(DownloadError::NotFound {
                url: url.to_owned(),
            }),
        }
    }

    fn fetch(&self, url: &str) -> std::result::Result<FetchedArchive, DownloadError> {
        match self.bodies.borrow().get(url) {
            Some(data) => Ok(FetchedArchive {
                data: data.clone(),
                advertised_len: Some(data.len() as u64),
            }),
            None => Err(DownloadError::NotFound {
                url: url.to_owned(),
            }),
        }
    }
}

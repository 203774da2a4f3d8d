//! Fakes and fixtures shared by the unit tests.

use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::error::ReleaseError;
use crate::git::{ChangeDetector, Vcs};
use crate::process::{CommandLine, CommandRunner};
use crate::prompt::Prompter;

/// Answers prompts from a fixed script.
///
/// `select` expects a zero-based index, `confirm` treats "y" as yes.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub rejections: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            rejections: Vec::new(),
        }
    }

    fn next(&mut self, message: &str) -> Result<String> {
        self.answers
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted answer for: {}", message))
    }
}

impl Prompter for ScriptedPrompter {
    fn select(&mut self, message: &str, options: &[String]) -> Result<usize> {
        let index: usize = self.next(message)?.parse()?;
        if index >= options.len() {
            return Err(anyhow!("scripted index {} out of range", index));
        }
        Ok(index)
    }

    fn input(
        &mut self,
        message: &str,
        validate: &dyn Fn(&str) -> std::result::Result<(), String>,
    ) -> Result<String> {
        loop {
            let answer = self.next(message)?;
            match validate(&answer) {
                Ok(()) => return Ok(answer),
                Err(reason) => self.rejections.push(reason),
            }
        }
    }

    fn confirm(&mut self, message: &str) -> Result<bool> {
        Ok(self.next(message)? == "y")
    }
}

/// Records commands instead of running them.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    pub commands: RefCell<Vec<String>>,
    pub fail_on: Option<String>,
}

impl RecordingRunner {
    pub fn failing_on(program_and_first_arg: &str) -> Self {
        Self {
            commands: RefCell::new(Vec::new()),
            fail_on: Some(program_and_first_arg.to_string()),
        }
    }

    pub fn recorded(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &CommandLine, _cwd: &Path) -> Result<()> {
        let line = command.to_string();
        self.commands.borrow_mut().push(line.clone());

        if let Some(prefix) = &self.fail_on {
            if line.starts_with(prefix.as_str()) {
                return Err(ReleaseError::CommandFailed {
                    command: line,
                    status: "exit status: 1".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// In-memory repository state.
///
/// A package counts as changed when its directory name is in `changed`.
#[derive(Debug, Clone)]
pub struct FakeVcs {
    pub dirty: bool,
    pub branch: String,
    pub remote_report: String,
    pub marker: Option<String>,
    pub changed: HashSet<String>,
}

impl FakeVcs {
    pub fn tagged(marker: &str) -> Self {
        Self {
            dirty: false,
            branch: "main".to_string(),
            remote_report: "    main pushes to main (up to date)\n".to_string(),
            marker: Some(marker.to_string()),
            changed: HashSet::new(),
        }
    }

    pub fn untagged() -> Self {
        Self {
            marker: None,
            ..Self::tagged("")
        }
    }

    pub fn with_changed<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.changed = dirs.into_iter().map(Into::into).collect();
        self
    }
}

impl ChangeDetector for FakeVcs {
    fn last_release_marker(&self) -> Result<String> {
        self.marker.clone().ok_or_else(|| {
            ReleaseError::MissingReleaseMarker(git2::Error::from_str("No names found")).into()
        })
    }

    fn has_changed(&self, _marker: &str, source_dir: &Path, _manifest_path: &Path) -> Result<bool> {
        let dir_name = source_dir
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(self.changed.contains(&dir_name))
    }
}

impl Vcs for FakeVcs {
    fn is_dirty(&self) -> Result<bool> {
        Ok(self.dirty)
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self.branch.clone())
    }

    fn remote_status(&self, _remote: &str) -> Result<String> {
        Ok(self.remote_report.clone())
    }
}

/// A temporary workspace with a root package.json and `packages/`.
pub struct WorkspaceFixture {
    dir: TempDir,
}

impl WorkspaceFixture {
    pub fn new(root_version: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("package.json"),
            format!(
                "{{\n  \"name\": \"workspace-root\",\n  \"version\": \"{}\",\n  \"private\": true\n}}\n",
                root_version
            ),
        )
        .unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn manifest_path(&self, dir: &str) -> PathBuf {
        self.root().join("packages").join(dir).join("package.json")
    }

    pub fn public_package(&self, name: &str, version: &str, deps: &[(&str, &str)]) -> PathBuf {
        self.write_package(name, version, deps, &[], true)
    }

    pub fn private_package(&self, name: &str, version: &str) -> PathBuf {
        self.write_package(name, version, &[], &[], false)
    }

    pub fn write_package(
        &self,
        name: &str,
        version: &str,
        deps: &[(&str, &str)],
        peers: &[(&str, &str)],
        public: bool,
    ) -> PathBuf {
        let mut manifest = serde_json::Map::new();
        manifest.insert("name".into(), name.into());
        manifest.insert("version".into(), version.into());
        if public {
            manifest.insert("publishConfig".into(), serde_json::json!({ "access": "public" }));
        } else {
            manifest.insert("private".into(), true.into());
        }
        for (key, entries) in [("dependencies", deps), ("peerDependencies", peers)] {
            if !entries.is_empty() {
                let map: serde_json::Map<String, serde_json::Value> = entries
                    .iter()
                    .map(|(n, r)| (n.to_string(), serde_json::Value::from(*r)))
                    .collect();
                manifest.insert(key.into(), map.into());
            }
        }

        let path = self.manifest_path(name);
        fs::create_dir_all(path.parent().unwrap().join("src")).unwrap();
        fs::write(&path, serde_json::to_string_pretty(&manifest).unwrap() + "\n").unwrap();
        path
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.root().join(relative)).unwrap()
    }
}

/// `git init` with `main` as the initial branch.
pub fn init_repo(path: &Path) -> git2::Repository {
    let mut options = git2::RepositoryInitOptions::new();
    options.initial_head("main");
    let repo = git2::Repository::init_opts(path, &options).unwrap();

    let mut config = repo.config().unwrap();
    config.set_str("user.name", "Release Bot").unwrap();
    config.set_str("user.email", "release@example.com").unwrap();
    repo
}

/// Stage everything and commit on HEAD.
pub fn commit_all(repo: &git2::Repository, message: &str) {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();

    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let signature = repo.signature().unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .unwrap();
}

/// Lightweight tag on HEAD.
pub fn tag_head(repo: &git2::Repository, name: &str) {
    let head = repo.head().unwrap().peel(git2::ObjectType::Commit).unwrap();
    repo.tag_lightweight(name, &head, false).unwrap();
}

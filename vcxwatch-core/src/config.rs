//! Configuration file handling
//!
//! The configuration is a TOML file. Relative paths resolve against
//! `project_root`, which itself resolves against the directory holding the
//! configuration file.

use crate::monitor::MonitorConfig;
use crate::reconcile::orchestrator::{DEFAULT_GENERATOR_TIMEOUT, DEFAULT_MAX_SAFE_DELETE};
use crate::reconcile::paths::absolutize;
use crate::reconcile::{CommandGenerator, NormalizedPath, OrchestratorConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_FILE: &str = "vcxwatch.toml";
pub const DEFAULT_CACHE_FILE: &str = ".vcxwatch-cache.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse config {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write config {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },

    #[error("Invalid configuration:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Regeneration tool; a bare name is looked up on `PATH`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<PathBuf>,
    pub args: Vec<String>,
    /// Defaults to the project root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            working_dir: None,
            timeout_secs: DEFAULT_GENERATOR_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project_root: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_file: Option<PathBuf>,
    /// Defaults to `<project_file>.filters`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters_file: Option<PathBuf>,
    pub watch_paths: Vec<PathBuf>,
    pub watch_extensions: Vec<String>,
    pub ignored_name_patterns: Vec<String>,
    pub ignored_dirs: Vec<String>,
    pub debounce_ms: u64,
    pub trigger_debounce_ms: u64,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<PathBuf>,
    /// 0 disables periodic patrol
    pub patrol_interval_minutes: u64,
    pub pre_generation_delete: bool,
    pub max_safe_delete: usize,
    pub generator: GeneratorConfig,

    #[serde(skip)]
    base_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            project_file: None,
            filters_file: None,
            watch_paths: vec![PathBuf::from("Source"), PathBuf::from("Plugins")],
            watch_extensions: [".cpp", ".h", ".hpp", ".c", ".inl"].map(String::from).to_vec(),
            ignored_name_patterns: [
                ".obj", ".pdb", ".tmp", ".user", ".log", ".ilk", ".ipch", ".sdf", ".vs",
                ".VC.opendb", ".suo", ".ncb", ".bak", "~", ".swp", ".lock", ".autocover", ".asset",
            ]
            .map(String::from)
            .to_vec(),
            ignored_dirs: [
                "/intermediate/", "/saved/", "/binaries/", "/build/", "/deriveddata/", "/staging/",
                "/unrealbuildtool/", "/logs/", "/backup/",
            ]
            .map(String::from)
            .to_vec(),
            debounce_ms: 1500,
            trigger_debounce_ms: 250,
            dry_run: false,
            backup_dir: None,
            report_file: None,
            cache_file: None,
            patrol_interval_minutes: 0,
            pre_generation_delete: true,
            max_safe_delete: DEFAULT_MAX_SAFE_DELETE,
            generator: GeneratorConfig::default(),
            base_dir: PathBuf::from("."),
        }
    }
}

const TEMPLATE: &str = r#"# vcxwatch configuration

# Root of the project; relative to this file
project_root = "."

# Generated project descriptor; changes to it (and its .filters file) trigger a run
project_file = "Intermediate/ProjectFiles/MyGame.vcxproj"
# filters_file = "Intermediate/ProjectFiles/MyGame.vcxproj.filters"

# Directories watched recursively, relative to project_root
watch_paths = ["Source", "Plugins"]

watch_extensions = [".cpp", ".h", ".hpp", ".c", ".inl"]

# Case-insensitive substrings of file names that are never watched
ignored_name_patterns = [".obj", ".pdb", ".tmp", ".user", ".log", ".bak", "~", ".swp"]

# Case-insensitive path fragments that are never watched
ignored_dirs = ["/intermediate/", "/saved/", "/binaries/", "/build/"]

debounce_ms = 1500
trigger_debounce_ms = 250

# Report deletions without touching the filesystem
dry_run = false

# Copy files here before deleting them
# backup_dir = "Saved/vcxwatch-backup"

# Append deletion summaries here
# report_file = "Saved/Logs/vcxwatch.log"

# Minutes between patrols for files removed while nothing was watching; 0 = off
patrol_interval_minutes = 0

pre_generation_delete = true

# A single diff removing more files than this deletes nothing
max_safe_delete = 50

[generator]
program = "GenerateProjectFiles.bat"
args = []
timeout_secs = 600
"#;

impl Config {
    /// Load and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let base_dir = absolutize(path).parent().map(Path::to_path_buf).unwrap_or_default();
        let config = Self::from_toml_str(&content, base_dir)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse configuration text; relative paths resolve against `base_dir`
    pub fn from_toml_str(
        content: &str,
        base_dir: impl Into<PathBuf>,
    ) -> std::result::Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(content)?;
        config.base_dir = base_dir.into();
        Ok(config)
    }

    /// Commented starting configuration written by `init`
    pub fn template() -> &'static str {
        TEMPLATE
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;
        write_file(path, &content)
    }

    pub fn write_template(path: &Path) -> Result<()> {
        write_file(path, TEMPLATE)
    }

    pub fn project_root(&self) -> PathBuf {
        absolutize(&self.base_dir.join(&self.project_root))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        absolutize(&self.project_root().join(path))
    }

    pub fn project_file_path(&self) -> Option<PathBuf> {
        self.project_file.as_deref().map(|p| self.resolve(p))
    }

    pub fn filters_file_path(&self) -> Option<PathBuf> {
        match &self.filters_file {
            Some(filters) => Some(self.resolve(filters)),
            None => self.project_file_path().map(|project| {
                let mut name = project.into_os_string();
                name.push(".filters");
                PathBuf::from(name)
            }),
        }
    }

    /// Project file then filters file; their union is the reference set
    pub fn descriptors(&self) -> Vec<PathBuf> {
        self.project_file_path().into_iter().chain(self.filters_file_path()).collect()
    }

    /// Paths whose changes always trigger a run
    pub fn trigger_paths(&self) -> Vec<PathBuf> {
        self.descriptors()
    }

    /// Existing watch directories plus the directory holding the project file
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = Vec::new();
        let mut seen = Vec::new();

        let configured = self.watch_paths.iter().map(|p| self.resolve(p));
        let descriptor_dir =
            self.project_file_path().and_then(|p| p.parent().map(Path::to_path_buf));

        for root in configured.chain(descriptor_dir) {
            if !root.is_dir() {
                warn!("Watch path is not a directory, skipping: {:?}", root);
                continue;
            }
            let key = NormalizedPath::new(&root);
            if !seen.contains(&key) {
                seen.push(key);
                roots.push(root);
            }
        }
        roots
    }

    pub fn cache_path(&self) -> PathBuf {
        match &self.cache_file {
            Some(path) => self.resolve(path),
            None => self.project_root().join(DEFAULT_CACHE_FILE),
        }
    }

    pub fn backup_path(&self) -> Option<PathBuf> {
        self.backup_dir.as_deref().map(|p| self.resolve(p))
    }

    pub fn report_path(&self) -> Option<PathBuf> {
        self.report_file.as_deref().map(|p| self.resolve(p))
    }

    pub fn patrol_interval(&self) -> Option<Duration> {
        (self.patrol_interval_minutes > 0)
            .then(|| Duration::from_secs(self.patrol_interval_minutes * 60))
    }

    /// Collect every problem rather than stopping at the first
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        match self.project_file_path() {
            None => problems.push("project_file is not set".to_string()),
            Some(project) if !project.is_file() => {
                problems.push(format!("project file not found: {}", project.display()))
            }
            Some(_) => {}
        }
        if let Some(filters) = self.filters_file_path() {
            if !filters.is_file() {
                problems.push(format!("filters file not found: {}", filters.display()));
            }
        }

        if self.generator.program.as_deref().is_none_or(|p| p.as_os_str().is_empty()) {
            problems.push("generator.program is not set".to_string());
        }
        if self.generator.timeout_secs == 0 {
            problems.push("generator.timeout_secs must be greater than 0".to_string());
        }
        if self.watch_extensions.is_empty() {
            problems.push("watch_extensions is empty".to_string());
        }

        if problems.is_empty() { Ok(()) } else { Err(ConfigError::Invalid(problems)) }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            watch_roots: self.watch_roots(),
            trigger_paths: self.trigger_paths(),
            watch_extensions: self.watch_extensions.clone(),
            ignored_name_patterns: self.ignored_name_patterns.clone(),
            ignored_dirs: self.ignored_dirs.clone(),
            debounce: Duration::from_millis(self.debounce_ms),
            trigger_debounce: Duration::from_millis(self.trigger_debounce_ms),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let mut protected_dirs = self.watch_roots();
        protected_dirs.push(self.project_root());

        OrchestratorConfig {
            descriptors: self.descriptors(),
            pre_generation_delete: self.pre_generation_delete,
            max_safe_delete: self.max_safe_delete,
            generator_timeout: Duration::from_secs(self.generator.timeout_secs),
            report_file: self.report_path(),
            protected_dirs,
        }
    }

    /// The configured generator, if a program is set
    pub fn command_generator(&self) -> Option<CommandGenerator> {
        let program = self.generator.program.as_deref()?;
        // Only paths with a separator are project-relative; bare names go through PATH
        let program = if program.components().count() > 1 {
            self.resolve(program)
        } else {
            program.to_path_buf()
        };
        let working_dir = match &self.generator.working_dir {
            Some(dir) => self.resolve(dir),
            None => self.project_root(),
        };
        Some(
            CommandGenerator::new(program, self.generator.args.clone())
                .with_working_dir(working_dir),
        )
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    let err = |source| ConfigError::Write { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(err)?;
        }
    }
    std::fs::write(path, content).map_err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(dir: &TempDir) -> Config {
        let root = dir.path();
        std::fs::create_dir_all(root.join("Source")).unwrap();
        std::fs::create_dir_all(root.join("Intermediate/ProjectFiles")).unwrap();
        std::fs::write(root.join("Intermediate/ProjectFiles/Game.vcxproj"), "<Project/>").unwrap();
        std::fs::write(root.join("Intermediate/ProjectFiles/Game.vcxproj.filters"), "<Project/>")
            .unwrap();

        let config_path = root.join(DEFAULT_CONFIG_FILE);
        std::fs::write(
            &config_path,
            r#"
project_file = "Intermediate/ProjectFiles/Game.vcxproj"
backup_dir = "Saved/Backup"
max_safe_delete = 10

[generator]
program = "tools/generate.sh"
args = ["-project"]
"#,
        )
        .unwrap();
        Config::load(&config_path).unwrap()
    }

    #[test]
    fn test_defaults_apply_to_missing_fields() {
        let dir = TempDir::new().unwrap();
        let config = project(&dir);

        assert_eq!(config.debounce_ms, 1500);
        assert_eq!(config.trigger_debounce_ms, 250);
        assert!(config.pre_generation_delete);
        assert_eq!(config.max_safe_delete, 10);
        assert_eq!(config.generator.timeout_secs, 600);
        assert!(config.ignored_dirs.contains(&"/intermediate/".to_string()));
        assert_eq!(config.patrol_interval(), None);
    }

    #[test]
    fn test_paths_resolve_against_project_root() {
        let dir = TempDir::new().unwrap();
        let config = project(&dir);
        let root = absolutize(dir.path());

        assert_eq!(config.project_root(), root);
        assert_eq!(
            config.filters_file_path().unwrap(),
            root.join("Intermediate/ProjectFiles/Game.vcxproj.filters")
        );
        assert_eq!(config.descriptors().len(), 2);
        assert_eq!(config.backup_path().unwrap(), root.join("Saved/Backup"));
        assert_eq!(config.cache_path(), root.join(DEFAULT_CACHE_FILE));
    }

    #[test]
    fn test_watch_roots_skip_missing_and_include_descriptor_dir() {
        let dir = TempDir::new().unwrap();
        let config = project(&dir);
        let root = absolutize(dir.path());

        // Plugins does not exist
        assert_eq!(
            config.watch_roots(),
            vec![root.join("Source"), root.join("Intermediate/ProjectFiles")]
        );
        let protected = config.orchestrator_config().protected_dirs;
        assert!(protected.contains(&root));
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        let dir = TempDir::new().unwrap();
        assert!(project(&dir).validate().is_ok());
    }

    #[test]
    fn test_validate_collects_all_problems() {
        let dir = TempDir::new().unwrap();
        let config =
            Config::from_toml_str(r#"project_file = "Missing.vcxproj""#, dir.path()).unwrap();

        match config.validate() {
            Err(ConfigError::Invalid(problems)) => {
                assert_eq!(problems.len(), 3, "{problems:?}");
                assert!(problems.iter().any(|p| p.contains("generator.program")));
            }
            other => panic!("expected invalid config, got {:?}", other),
        }

        let empty = Config::from_toml_str("", dir.path()).unwrap();
        assert!(matches!(
            empty.validate(),
            Err(ConfigError::Invalid(p)) if p[0].contains("project_file")
        ));
    }

    #[test]
    fn test_generator_program_resolution() {
        let dir = TempDir::new().unwrap();
        let mut config = project(&dir);
        let root = absolutize(dir.path());

        let generator = config.command_generator().unwrap();
        let expected = root.join("tools/generate.sh").display().to_string();
        assert!(generator.command_line().starts_with(&expected));

        config.generator.program = Some(PathBuf::from("ubt"));
        assert_eq!(config.command_generator().unwrap().command_line(), "ubt -project");
    }

    #[test]
    fn test_template_parses() {
        let dir = TempDir::new().unwrap();
        let config = Config::from_toml_str(Config::template(), dir.path()).unwrap();
        assert!(config.project_file.is_some());
        assert_eq!(config.max_safe_delete, 50);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let config = project(&dir);
        let path = dir.path().join("copy").join(DEFAULT_CONFIG_FILE);

        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.max_safe_delete, config.max_safe_delete);
        assert_eq!(loaded.generator, config.generator);
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "debounce_ms = \"soon\"").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(DEFAULT_CONFIG_FILE));
    }
}

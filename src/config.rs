use std::env;
use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// Environment variable naming the scene to load when none is given.
pub const SCENE_ENV: &str = "SCENEC_SCENE";

/// Scene file picked up from the working directory.
pub const DEFAULT_SCENE_FILE: &str = "globes.scene";

/// Scene used when nothing else resolves.
pub const DEMO_SCENE: &str = "\
draw(sphere(<20, -5, 10>, 30, red, 0.5, 0.0))
a = sphere(<-15, -5, -10>, 30)
b = sphere(<-15, -5, -10>, 25)
draw(csg(a, b, 'difference', rgb(0.0, 1.0, 1.0), 0.0, 0.8))
";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    /// `--no-color` wins over the config file; `auto` colors only a terminal.
    pub fn enabled(self, no_color_flag: bool) -> bool {
        if no_color_flag {
            return false;
        }
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => io::stderr().is_terminal(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("line {line}: expected `key=value`, found `{content}`")]
    MalformedLine { line: usize, content: String },

    #[error("line {line}: unknown color choice `{value}` (expected always, never or auto)")]
    InvalidColor { line: usize, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub default_scene: Option<PathBuf>,
    pub color: ColorChoice,
}

/// Where the scene text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneSource {
    File(PathBuf),
    BuiltIn,
}

impl SceneSource {
    /// Name shown in diagnostics.
    pub fn name(&self) -> String {
        match self {
            SceneSource::File(path) => path.display().to_string(),
            SceneSource::BuiltIn => "<demo scene>".to_string(),
        }
    }

    pub fn read(&self) -> io::Result<String> {
        match self {
            SceneSource::File(path) => fs::read_to_string(path),
            SceneSource::BuiltIn => Ok(DEMO_SCENE.to_string()),
        }
    }
}

/// `$XDG_CONFIG_HOME/scenec/config`, or `~/.config/scenec/config`.
pub fn config_file_path() -> Option<PathBuf> {
    let config_dir = match env::var("XDG_CONFIG_HOME") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(env::var("HOME").ok()?).join(".config"),
    };
    Some(config_dir.join("scenec").join("config"))
}

impl Config {
    /// Reads the user config file. A missing file gives the defaults.
    ///
    /// Runs before logging is set up, since the color choice configures
    /// the logger; callers log the error themselves.
    pub fn load() -> Result<Self, ConfigError> {
        match config_file_path() {
            Some(path) => Config::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => Config::parse(&contents),
            Err(_) => Ok(Config::default()),
        }
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.starts_with('#') || line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::MalformedLine {
                    line: index + 1,
                    content: line.to_string(),
                });
            };
            let value = value.trim();

            match key.trim() {
                "default_scene" => config.default_scene = Some(PathBuf::from(value)),
                "color" => {
                    config.color = match value {
                        "auto" => ColorChoice::Auto,
                        "always" => ColorChoice::Always,
                        "never" => ColorChoice::Never,
                        other => {
                            return Err(ConfigError::InvalidColor {
                                line: index + 1,
                                value: other.to_string(),
                            })
                        }
                    }
                }
                other => debug!(key = other, "unknown config key"),
            }
        }

        Ok(config)
    }

    /// Picks the scene to load using the process environment and working
    /// directory.
    pub fn resolve_scene(&self, explicit: Option<&Path>) -> SceneSource {
        let from_env = env::var(SCENE_ENV).ok();
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        self.resolve_scene_in(explicit, from_env.as_deref(), &cwd)
    }

    /// Resolution order:
    /// 1. explicit path from the command line
    /// 2. `SCENEC_SCENE`
    /// 3. `default_scene` from the config file, if it exists
    /// 4. `globes.scene` in `cwd`
    /// 5. the built-in demo scene
    pub fn resolve_scene_in(&self, explicit: Option<&Path>, from_env: Option<&str>, cwd: &Path) -> SceneSource {
        if let Some(path) = explicit {
            return SceneSource::File(path.to_path_buf());
        }

        if let Some(value) = from_env.filter(|v| !v.is_empty()) {
            debug!(env = SCENE_ENV, value, "scene from environment");
            return SceneSource::File(PathBuf::from(value));
        }

        if let Some(path) = &self.default_scene {
            let path = if path.is_relative() { cwd.join(path) } else { path.clone() };
            if path.exists() {
                debug!(path = %path.display(), "scene from config");
                return SceneSource::File(path);
            }
            warn!(path = %path.display(), "configured default_scene does not exist");
        }

        let local = cwd.join(DEFAULT_SCENE_FILE);
        if local.exists() {
            return SceneSource::File(local);
        }

        debug!("no scene file found, using the demo scene");
        SceneSource::BuiltIn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("scenec-config-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_parse_config() {
        let config = Config::parse("# scenec\n\ndefault_scene = scenes/fractal.scene\ncolor=never\nfoo=bar\n").unwrap();
        assert_eq!(config.default_scene, Some(PathBuf::from("scenes/fractal.scene")));
        assert_eq!(config.color, ColorChoice::Never);
    }

    #[test]
    fn test_parse_config_errors() {
        assert_eq!(
            Config::parse("color=always\njust some words"),
            Err(ConfigError::MalformedLine { line: 2, content: "just some words".to_string() })
        );
        assert_eq!(
            Config::parse("color = sometimes"),
            Err(ConfigError::InvalidColor { line: 1, value: "sometimes".to_string() })
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = scratch_dir("load");
        let path = dir.join("config");

        assert_eq!(Config::load_from(&path), Ok(Config::default()));

        fs::write(&path, "# colors off\ncolor = never\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.color, ColorChoice::Never);
        assert!(!config.color.enabled(false));

        fs::write(&path, "color = loud\n").unwrap();
        assert_eq!(
            Config::load_from(&path),
            Err(ConfigError::InvalidColor { line: 1, value: "loud".to_string() })
        );

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_color_flag_overrides_config() {
        assert!(!ColorChoice::Always.enabled(true));
        assert!(ColorChoice::Always.enabled(false));
        assert!(!ColorChoice::Never.enabled(false));
    }

    #[test]
    fn test_resolution_order() {
        let dir = scratch_dir("order");
        let configured = dir.join("configured.scene");
        fs::write(&configured, "draw(cube(1))").unwrap();
        fs::write(dir.join(DEFAULT_SCENE_FILE), "draw(cube(2))").unwrap();

        let config = Config { default_scene: Some(configured.clone()), color: ColorChoice::Auto };
        let explicit = Path::new("given.scene");

        assert_eq!(
            config.resolve_scene_in(Some(explicit), Some("env.scene"), &dir),
            SceneSource::File(explicit.to_path_buf())
        );
        assert_eq!(
            config.resolve_scene_in(None, Some("env.scene"), &dir),
            SceneSource::File(PathBuf::from("env.scene"))
        );
        assert_eq!(config.resolve_scene_in(None, None, &dir), SceneSource::File(configured));
        assert_eq!(
            Config::default().resolve_scene_in(None, Some(""), &dir),
            SceneSource::File(dir.join(DEFAULT_SCENE_FILE))
        );

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_files_fall_back_to_demo() {
        let dir = scratch_dir("fallback");
        let config = Config { default_scene: Some(PathBuf::from("gone.scene")), color: ColorChoice::Auto };
        let source = config.resolve_scene_in(None, None, &dir);
        assert_eq!(source, SceneSource::BuiltIn);
        assert_eq!(source.read().unwrap(), DEMO_SCENE);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_demo_scene_parses() {
        let program = crate::parse(DEMO_SCENE).unwrap();
        assert_eq!(program.len(), 4);
    }
}

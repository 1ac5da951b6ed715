//! Build configuration.
//!
//! A [`BuildConfig`] is assembled once per invocation from, in increasing
//! precedence: built-in defaults, an optional `sphinx-make.toml`, the
//! make-style environment variables (`SPHINXBUILD`, `SPHINXOPTS`, `PAPER`,
//! `BUILDDIR`) and finally explicit command-line overrides.

use std::fmt;
use std::path::{Path, PathBuf};

use config::{Config, ConfigBuilder, File, FileFormat};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_CONFIG_FILE: &str = "sphinx-make.toml";
pub const DEFAULT_SPHINX_BUILD: &str = "sphinx-build";
pub const DEFAULT_BUILD_DIR: &str = "sphinx/build";
pub const SOURCE_DIR: &str = "sphinx/source";
pub const OUTPUT_DIR: &str = "docs";

/// Environment variables consulted while loading, paired with the
/// configuration key each one sets.
const ENV_VARS: &[(&str, &str)] = &[
    ("SPHINXBUILD", "sphinx_build"),
    ("SPHINXOPTS", "sphinx_opts"),
    ("PAPER", "paper"),
    ("BUILDDIR", "build_dir"),
];

/// LaTeX paper sizes understood by the `paper` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperSize {
    A4,
    Letter,
}

impl PaperSize {
    const TABLE: &'static [(&'static str, PaperSize)] =
        &[("a4", PaperSize::A4), ("letter", PaperSize::Letter)];

    /// Look up a paper size by its option value. Matching is exact, as with
    /// make variable expansion.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, size)| *size)
    }

    pub fn name(self) -> &'static str {
        match self {
            PaperSize::A4 => "a4",
            PaperSize::Letter => "letter",
        }
    }

    /// The flag fragment passed to the documentation tool.
    pub fn flag(self) -> [String; 2] {
        ["-D".to_string(), format!("latex_paper_size={}", self.name())]
    }
}

impl fmt::Display for PaperSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Settings for a single documentation build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Executable of the documentation tool
    pub sphinx_build: String,
    /// Extra flags, appended verbatim after the paper flag
    pub sphinx_opts: String,
    /// Paper size name; see [`PaperSize`]
    pub paper: String,
    /// Base directory for the doctree cache
    pub build_dir: PathBuf,
    #[serde(skip_deserializing, default = "default_source_dir")]
    pub source_dir: PathBuf,
    #[serde(skip_deserializing, default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from(SOURCE_DIR)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(OUTPUT_DIR)
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            sphinx_build: DEFAULT_SPHINX_BUILD.to_string(),
            sphinx_opts: String::new(),
            paper: String::new(),
            build_dir: PathBuf::from(DEFAULT_BUILD_DIR),
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
        }
    }
}

/// Values given explicitly on the command line. They win over every other
/// source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub sphinx_build: Option<String>,
    pub sphinx_opts: Option<String>,
    pub paper: Option<String>,
    pub build_dir: Option<PathBuf>,
}

impl BuildConfig {
    /// Load the configuration without command-line overrides.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_with_overrides(file, &ConfigOverrides::default())
    }

    pub fn load_with_overrides(file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut builder = Self::defaults()?;

        if let Some(path) = file {
            debug!("Reading configuration file {}", path.display());
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        for (var, key) in ENV_VARS {
            let value = std::env::var(var).ok();
            if value.is_some() {
                debug!("Taking '{}' from ${}", key, var);
            }
            builder = builder.set_override_option(*key, value)?;
        }

        let s = builder
            .set_override_option("sphinx_build", overrides.sphinx_build.clone())?
            .set_override_option("sphinx_opts", overrides.sphinx_opts.clone())?
            .set_override_option("paper", overrides.paper.clone())?
            .set_override_option(
                "build_dir",
                overrides
                    .build_dir
                    .as_ref()
                    .map(|dir| dir.to_string_lossy().into_owned()),
            )?
            .build()?;

        Ok(s.try_deserialize()?)
    }

    fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>> {
        Ok(Config::builder()
            .set_default("sphinx_build", DEFAULT_SPHINX_BUILD)?
            .set_default("sphinx_opts", "")?
            .set_default("paper", "")?
            .set_default("build_dir", DEFAULT_BUILD_DIR)?)
    }

    /// Resolve the `paper` option. Unknown values yield no paper size; a
    /// warning is logged so a typo does not go unnoticed.
    pub fn paper_size(&self) -> Option<PaperSize> {
        let name = self.paper.trim();
        if name.is_empty() {
            return None;
        }
        let size = PaperSize::from_name(name);
        if size.is_none() {
            warn!(
                "Ignoring unknown paper size '{}' (expected one of: a4, letter)",
                name
            );
        }
        size
    }

    /// Tokens of `sphinx_opts`, split the way an unquoted make variable is.
    pub fn sphinx_opts_tokens(&self) -> Vec<String> {
        self.sphinx_opts
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Program and leading arguments of the tool. `SPHINXBUILD` may hold a
    /// whole command such as `python -m sphinx`.
    pub fn sphinx_build_tokens(&self) -> Vec<String> {
        self.sphinx_build
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Location of the doctree cache.
    pub fn doctree_dir(&self) -> PathBuf {
        self.build_dir.join("doctrees")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const NO_ENV: [(&str, Option<&str>); 4] = [
        ("SPHINXBUILD", None),
        ("SPHINXOPTS", None),
        ("PAPER", None),
        ("BUILDDIR", None),
    ];

    #[test]
    fn test_paper_size_lookup() {
        assert_eq!(PaperSize::from_name("a4"), Some(PaperSize::A4));
        assert_eq!(PaperSize::from_name("letter"), Some(PaperSize::Letter));
        assert_eq!(PaperSize::from_name("A4"), None);
        assert_eq!(PaperSize::from_name("legal"), None);
        assert_eq!(PaperSize::from_name(""), None);
        assert_eq!(
            PaperSize::Letter.flag(),
            ["-D".to_string(), "latex_paper_size=letter".to_string()]
        );
    }

    #[test]
    fn test_unknown_paper_is_ignored() {
        let config = BuildConfig {
            paper: "b5".to_string(),
            ..BuildConfig::default()
        };
        assert_eq!(config.paper_size(), None);

        let config = BuildConfig {
            paper: " a4 ".to_string(),
            ..BuildConfig::default()
        };
        assert_eq!(config.paper_size(), Some(PaperSize::A4));
    }

    #[test]
    #[serial]
    fn test_defaults() {
        temp_env::with_vars(NO_ENV, || {
            let config = BuildConfig::load(None).unwrap();
            assert_eq!(config, BuildConfig::default());
            assert_eq!(config.build_dir, PathBuf::from("sphinx/build"));
            assert_eq!(config.source_dir, PathBuf::from("sphinx/source"));
            assert_eq!(config.output_dir, PathBuf::from("docs"));
            assert_eq!(config.doctree_dir(), PathBuf::from("sphinx/build/doctrees"));
        });
    }

    #[test]
    #[serial]
    fn test_missing_file_is_optional() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sphinx-make.toml");

        temp_env::with_vars(NO_ENV, || {
            let config = BuildConfig::load(Some(&path)).unwrap();
            assert_eq!(config, BuildConfig::default());
        });
    }

    #[test]
    #[serial]
    fn test_file_then_env_then_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sphinx-make.toml");
        fs::write(
            &path,
            "sphinx_opts = \"-W\"\npaper = \"letter\"\nbuild_dir = \"out\"\n",
        )
        .unwrap();

        temp_env::with_vars(NO_ENV, || {
            let config = BuildConfig::load(Some(&path)).unwrap();
            assert_eq!(config.sphinx_opts, "-W");
            assert_eq!(config.paper_size(), Some(PaperSize::Letter));
            assert_eq!(config.build_dir, PathBuf::from("out"));
        });

        temp_env::with_vars(
            [
                ("SPHINXBUILD", Some("python -m sphinx")),
                ("SPHINXOPTS", None),
                ("PAPER", Some("a4")),
                ("BUILDDIR", None),
            ],
            || {
                let config = BuildConfig::load(Some(&path)).unwrap();
                assert_eq!(config.sphinx_build, "python -m sphinx");
                assert_eq!(config.sphinx_opts, "-W");
                assert_eq!(config.paper, "a4");

                let overrides = ConfigOverrides {
                    paper: Some(String::new()),
                    build_dir: Some(PathBuf::from("/tmp/doctree-cache")),
                    ..ConfigOverrides::default()
                };
                let config = BuildConfig::load_with_overrides(Some(&path), &overrides).unwrap();
                assert_eq!(config.paper_size(), None);
                assert_eq!(config.build_dir, PathBuf::from("/tmp/doctree-cache"));
                assert_eq!(config.output_dir, PathBuf::from("docs"));
            },
        );
    }

    #[test]
    #[serial]
    fn test_fixed_directories_ignore_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sphinx-make.toml");
        fs::write(&path, "output_dir = \"site\"\nsource_dir = \"src\"\n").unwrap();

        temp_env::with_vars(NO_ENV, || {
            let config = BuildConfig::load(Some(&path)).unwrap();
            assert_eq!(config.source_dir, PathBuf::from("sphinx/source"));
            assert_eq!(config.output_dir, PathBuf::from("docs"));
        });
    }

    #[test]
    #[serial]
    fn test_build_dir_override_keeps_path() {
        let overrides = ConfigOverrides {
            build_dir: Some(PathBuf::from("../cache dir/sphinx")),
            ..ConfigOverrides::default()
        };
        temp_env::with_vars(
            [
                ("SPHINXBUILD", None),
                ("SPHINXOPTS", None),
                ("PAPER", None),
                ("BUILDDIR", Some("from-env")),
            ],
            || {
                let config = BuildConfig::load_with_overrides(None, &overrides).unwrap();
                assert_eq!(config.build_dir, PathBuf::from("../cache dir/sphinx"));
                assert_eq!(
                    config.doctree_dir(),
                    PathBuf::from("../cache dir/sphinx/doctrees")
                );
            },
        );
    }

    #[test]
    fn test_sphinx_opts_tokens() {
        let config = BuildConfig {
            sphinx_opts: "  -W\t--keep-going -j auto ".to_string(),
            ..BuildConfig::default()
        };
        assert_eq!(
            config.sphinx_opts_tokens(),
            vec!["-W", "--keep-going", "-j", "auto"]
        );
        assert!(BuildConfig::default().sphinx_opts_tokens().is_empty());
    }

    #[test]
    fn test_sphinx_build_tokens() {
        assert_eq!(
            BuildConfig::default().sphinx_build_tokens(),
            vec!["sphinx-build"]
        );
        let config = BuildConfig {
            sphinx_build: "python3 -m sphinx".to_string(),
            ..BuildConfig::default()
        };
        assert_eq!(config.sphinx_build_tokens(), vec!["python3", "-m", "sphinx"]);
    }
}

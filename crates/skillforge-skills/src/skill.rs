//! Skill definition and artifact access
//!
//! Each skill is a folder containing SKILL.md, optionally with YAML frontmatter

use regex::Regex;
use serde::Deserialize;
use skillforge_types::{ForgeError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Definition file whose presence marks a directory as a skill
pub const DEFINITION_FILE: &str = "SKILL.md";
/// Name of the optimized rewrite written alongside the definition
pub const OPTIMIZED_FILE: &str = "SKILL.optimized.md";

/// Maximum description length shown in listings
const MAX_DESCRIPTION_LENGTH: usize = 1024;

const FRONTMATTER_PATTERN: &str = r"^---\s*\n([\s\S]*?)\n---\s*(?:\n|$)";

/// Skill metadata extracted from YAML frontmatter
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SkillMetadata {
    /// Declared skill name
    pub name: String,
    /// What the skill does and when to use it
    #[serde(default)]
    pub description: String,
}

/// A skill on disk
#[derive(Debug, Clone)]
pub struct Skill {
    /// Skill id (the directory name)
    pub id: String,
    /// Full path to skill directory
    pub path: PathBuf,
    /// Frontmatter metadata, if the definition carries any
    pub metadata: Option<SkillMetadata>,
}

impl Skill {
    /// Load a skill from its directory. Fails with `ContentUnavailable` when
    /// the definition file is missing or unreadable.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let definition = dir.join(DEFINITION_FILE);
        let content = read_artifact(&definition)?;

        let id = dir
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                let reason = "skill directory has no name";
                ForgeError::content_unavailable(
                    dir,
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, reason),
                )
            })?;

        let metadata = parse_frontmatter(&content)?;
        if let Some(meta) = &metadata {
            validate_metadata(&id, meta);
        }

        Ok(Self {
            id,
            path: dir.to_path_buf(),
            metadata,
        })
    }

    /// Path of the original definition
    pub fn definition_path(&self) -> PathBuf {
        self.path.join(DEFINITION_FILE)
    }

    /// Path of the optimized rewrite
    pub fn optimized_path(&self) -> PathBuf {
        self.path.join(OPTIMIZED_FILE)
    }

    /// Read the original definition
    pub fn read_content(&self) -> Result<String> {
        read_artifact(&self.definition_path())
    }

    /// Read the optimized rewrite
    pub fn read_optimized(&self) -> Result<String> {
        read_artifact(&self.optimized_path())
    }

    /// Whether an optimized rewrite exists on disk
    pub fn has_optimized(&self) -> bool {
        self.optimized_path().is_file()
    }

    /// Write the optimized rewrite, replacing any previous one. Fails with
    /// `ArtifactWrite` when the file cannot be written.
    pub fn write_optimized(&self, content: &str) -> Result<PathBuf> {
        let path = self.optimized_path();
        fs::write(&path, content).map_err(|e| ForgeError::artifact_write(&path, e))?;
        debug!("Wrote optimized artifact {:?}", path);
        Ok(path)
    }

    /// Description from frontmatter, or an empty string
    pub fn description(&self) -> &str {
        self.metadata
            .as_ref()
            .map(|m| m.description.as_str())
            .unwrap_or("")
    }

    /// Concise listing line: "- {id}: {description}"
    pub fn to_summary(&self) -> String {
        if self.description().is_empty() {
            format!("- {}", self.id)
        } else {
            format!("- {}: {}", self.id, self.description())
        }
    }
}

/// Read an artifact, mapping any I/O failure to `ContentUnavailable`
pub fn read_artifact(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| ForgeError::content_unavailable(path, e))
}

fn frontmatter_regex() -> Result<&'static Regex> {
    static FRONTMATTER: OnceLock<Regex> = OnceLock::new();
    if let Some(re) = FRONTMATTER.get() {
        return Ok(re);
    }
    let re = Regex::new(FRONTMATTER_PATTERN).map_err(|e| ForgeError::InvalidPattern {
        pattern: FRONTMATTER_PATTERN,
        reason: e.to_string(),
    })?;
    Ok(FRONTMATTER.get_or_init(|| re))
}

/// Extract frontmatter metadata; definitions without it are still valid skills
fn parse_frontmatter(content: &str) -> Result<Option<SkillMetadata>> {
    let Some(yaml) = frontmatter_regex()?
        .captures(content)
        .and_then(|caps| caps.get(1))
    else {
        return Ok(None);
    };

    match serde_yaml::from_str::<SkillMetadata>(yaml.as_str()) {
        Ok(metadata) => Ok(Some(metadata)),
        Err(e) => {
            debug!("Ignoring unparseable frontmatter: {}", e);
            Ok(None)
        }
    }
}

fn validate_metadata(id: &str, metadata: &SkillMetadata) {
    if metadata.name != id {
        warn!(
            "Skill directory '{}' declares name '{}'; the directory name is used as id",
            id, metadata.name
        );
    }

    if metadata.description.len() > MAX_DESCRIPTION_LENGTH {
        warn!(
            "Skill '{}' description exceeds {} characters (was {})",
            id,
            MAX_DESCRIPTION_LENGTH,
            metadata.description.len()
        );
    }
}

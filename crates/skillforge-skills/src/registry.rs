//! Skills registry for discovering skills across directories

use skillforge_types::{ForgeError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::skill::{Skill, DEFINITION_FILE};

/// Skills discovered on disk, keyed by id
pub struct SkillsRegistry {
    /// All discovered skills, ordered by id
    skills: BTreeMap<String, Skill>,
    /// Skills directories to scan
    directories: Vec<PathBuf>,
}

impl SkillsRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            skills: BTreeMap::new(),
            directories: Vec::new(),
        }
    }

    /// Add a skills directory to scan
    pub fn add_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directories.push(dir.into());
        self
    }

    /// Scan all configured directories. Subdirectories without a definition
    /// file are silently excluded; the first directory to provide an id wins.
    pub fn discover(&mut self) -> Result<()> {
        info!(
            "Starting skills discovery in {} directories",
            self.directories.len()
        );

        let directories = self.directories.clone();

        for dir in &directories {
            if !dir.exists() {
                debug!("Skills directory does not exist: {:?}", dir);
                continue;
            }

            if !dir.is_dir() {
                warn!("Skills path is not a directory: {:?}", dir);
                continue;
            }

            self.scan_directory(dir)?;
        }

        info!("Discovered {} skills", self.skills.len());
        Ok(())
    }

    /// Scan a single directory for skills
    fn scan_directory(&mut self, dir: &Path) -> Result<()> {
        let entries = std::fs::read_dir(dir).map_err(|e| ForgeError::content_unavailable(dir, e))?;

        for entry in entries {
            let path = entry
                .map_err(|e| ForgeError::content_unavailable(dir, e))?
                .path();

            if !path.is_dir() || !path.join(DEFINITION_FILE).is_file() {
                continue;
            }

            match Skill::from_dir(&path) {
                Ok(skill) => {
                    if self.skills.contains_key(&skill.id) {
                        debug!("Skill {} already discovered, ignoring {:?}", skill.id, path);
                        continue;
                    }
                    debug!("Discovered skill: {} at {:?}", skill.id, path);
                    self.skills.insert(skill.id.clone(), skill);
                }
                Err(e) if e.is_skill_local() => {
                    warn!("Skipping {:?}: {}", path, e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Get a skill by id
    pub fn get(&self, id: &str) -> Option<&Skill> {
        self.skills.get(id)
    }

    /// All discovered skills, ordered by id
    pub fn skills(&self) -> impl Iterator<Item = &Skill> {
        self.skills.values()
    }

    /// Get all skill ids, ordered
    pub fn skill_names(&self) -> impl Iterator<Item = &String> {
        self.skills.keys()
    }

    /// Get number of skills
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Human-readable listing, one line per skill
    pub fn generate_skills_list(&self) -> String {
        if self.skills.is_empty() {
            return "No skills available".to_string();
        }

        self.skills
            .values()
            .map(Skill::to_summary)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for SkillsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

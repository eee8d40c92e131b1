//! SkillForge Skills
//!
//! Discovers skills on disk and gives access to their artifacts.
//!
//! A skill is a directory containing a `SKILL.md` definition; the directory
//! name is the skill id. The definition is opaque text, although an optional
//! YAML frontmatter block (`name`, `description`) is read for display.
//! Optimized rewrites live next to the definition as `SKILL.optimized.md`.

#![deny(unsafe_code, dead_code, unused_imports, unused_variables, missing_docs)]

pub mod registry;
pub mod skill;

pub use registry::SkillsRegistry;
pub use skill::{Skill, SkillMetadata, DEFINITION_FILE, OPTIMIZED_FILE};

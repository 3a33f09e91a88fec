//! Dashboard configuration: sections, step patterns, maintainers and thresholds.
//!
//! Loaded from YAML and compiled once into [`CompiledConfig`] so that patterns
//! are never re-parsed per job.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::matcher::{CategoryMatcher, FatalStepMatcher};
use crate::error::{AppError, AppResult};
use crate::models::Maintainer;

/// Section id used for jobs no section pattern claims.
pub const FALLBACK_SECTION_ID: &str = "other";

/// Root of the YAML dashboard configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Ordered job groupings; the first section whose pattern matches wins.
    #[serde(default)]
    pub sections: Vec<SectionConfig>,
    /// Sub-project views grouping several sections.
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
    /// Regexes naming the steps that execute the real tests.
    #[serde(default)]
    pub fatal_step_patterns: Vec<String>,
    /// Job name patterns marking a job as required.
    #[serde(default)]
    pub required_tests: Vec<String>,
    /// Per-job maintainer assignment by name pattern.
    #[serde(default)]
    pub job_maintainers: Vec<JobMaintainerRule>,
    /// Maintainer directory keyed by GitHub login.
    #[serde(default)]
    pub maintainers: BTreeMap<String, MaintainerEntry>,
    /// Display name overrides keyed by raw job name.
    #[serde(default)]
    pub display_names: BTreeMap<String, String>,
    /// Rename pairs rejected by a human.
    #[serde(default)]
    pub rename_exclusions: Vec<RenamePair>,
    /// Rename pairs confirmed by a human; history is always transplanted.
    #[serde(default)]
    pub job_aliases: Vec<RenamePair>,
    #[serde(default)]
    pub thresholds: Thresholds,
}

/// One dashboard section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Project (sub-project view) this section belongs to.
    #[serde(default)]
    pub project: Option<String>,
    /// Job name patterns (`substring` or `/regex/`).
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Logins maintaining every job in the section.
    #[serde(default)]
    pub maintainers: Vec<String>,
}

/// A sub-project view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMaintainerRule {
    pub pattern: String,
    pub maintainers: Vec<String>,
}

/// Maintainer directory entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaintainerEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slack: Option<String>,
}

/// An (old name, new name) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenamePair {
    #[serde(alias = "oldName")]
    pub old: String,
    #[serde(alias = "newName")]
    pub new: String,
}

/// Tunable windows and heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Position-aligned similarity above which a rename is proposed.
    pub similarity: f64,
    /// Common-prefix ratio above which a rename is proposed.
    pub prefix_ratio: f64,
    /// Days a rename candidate survives without being re-detected.
    pub candidate_ttl_days: i64,
    /// Days of history kept in the failed-test index.
    pub failure_index_days: i64,
    /// Days of PR runs analysed for flakiness.
    pub flaky_window_days: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            similarity: 0.7,
            prefix_ratio: 0.6,
            candidate_ttl_days: 3,
            failure_index_days: 30,
            flaky_window_days: 14,
        }
    }
}

impl DashboardConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(content: &str) -> AppResult<Self> {
        let config: DashboardConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for section in &self.sections {
            if section.id.trim().is_empty() {
                errors.push(format!("section '{}' has an empty id", section.name));
            } else if !seen.insert(section.id.as_str()) {
                errors.push(format!("duplicate section id '{}'", section.id));
            }

            if let Some(project) = &section.project
                && !self.projects.iter().any(|p| &p.id == project)
            {
                errors.push(format!(
                    "section '{}' references unknown project '{}'",
                    section.id, project
                ));
            }
        }

        let t = &self.thresholds;
        if !(0.0..=1.0).contains(&t.similarity) || !(0.0..=1.0).contains(&t.prefix_ratio) {
            errors.push("rename thresholds must be between 0 and 1".to_string());
        }
        if t.candidate_ttl_days < 0 || t.failure_index_days <= 0 || t.flaky_window_days <= 0 {
            errors.push("threshold windows must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Config(errors.join("; ")))
        }
    }

    /// Compile every pattern list once.
    pub fn compile(self) -> CompiledConfig {
        let fatal_steps = FatalStepMatcher::new(&self.fatal_step_patterns);

        let (sections, mut rejected) = CategoryMatcher::compile(
            self.sections
                .iter()
                .enumerate()
                .flat_map(|(idx, s)| s.patterns.iter().map(move |p| (idx, p.as_str()))),
        );

        let (required, more) =
            CategoryMatcher::compile(self.required_tests.iter().map(|p| ((), p.as_str())));
        rejected.extend(more);

        let (job_maintainers, more) = CategoryMatcher::compile(
            self.job_maintainers
                .iter()
                .enumerate()
                .map(|(idx, rule)| (idx, rule.pattern.as_str())),
        );
        rejected.extend(more);
        rejected.extend(fatal_steps.rejected().iter().cloned());

        let fallback_section = SectionConfig {
            id: FALLBACK_SECTION_ID.to_string(),
            name: "Other".to_string(),
            description: None,
            project: None,
            patterns: Vec::new(),
            maintainers: Vec::new(),
        };

        CompiledConfig {
            raw: self,
            fatal_steps,
            sections,
            required,
            job_maintainers,
            fallback_section,
            rejected_patterns: rejected,
        }
    }
}

/// Dashboard configuration with every pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    pub raw: DashboardConfig,
    pub fatal_steps: FatalStepMatcher,
    sections: CategoryMatcher<usize>,
    required: CategoryMatcher<()>,
    job_maintainers: CategoryMatcher<usize>,
    fallback_section: SectionConfig,
    /// Pattern strings that failed to compile and were skipped.
    pub rejected_patterns: Vec<String>,
}

impl CompiledConfig {
    pub fn thresholds(&self) -> &Thresholds {
        &self.raw.thresholds
    }

    /// Section owning a job; unmatched jobs land in the fallback section.
    pub fn section_for(&self, job_name: &str) -> &SectionConfig {
        self.sections
            .first_match(job_name)
            .and_then(|idx| self.raw.sections.get(*idx))
            .unwrap_or(&self.fallback_section)
    }

    /// Configured sections followed by the fallback section.
    pub fn all_sections(&self) -> impl Iterator<Item = &SectionConfig> {
        self.raw
            .sections
            .iter()
            .chain(std::iter::once(&self.fallback_section))
    }

    pub fn is_required(&self, job_name: &str) -> bool {
        self.required.is_match(job_name)
    }

    pub fn display_name(&self, job_name: &str) -> String {
        self.raw
            .display_names
            .get(job_name)
            .cloned()
            .unwrap_or_else(|| job_name.to_string())
    }

    /// Section maintainers plus every matching per-job rule, deduplicated.
    pub fn maintainers_for(&self, job_name: &str) -> Vec<Maintainer> {
        let section = self.section_for(job_name);
        let mut logins: Vec<&str> = section.maintainers.iter().map(String::as_str).collect();

        for idx in self.job_maintainers.all_matches(job_name) {
            if let Some(rule) = self.raw.job_maintainers.get(*idx) {
                logins.extend(rule.maintainers.iter().map(String::as_str));
            }
        }

        let mut seen = HashSet::new();
        logins
            .into_iter()
            .filter(|login| seen.insert(*login))
            .map(|login| {
                let entry = self.raw.maintainers.get(login);
                if entry.is_none() {
                    warn!("Maintainer '{}' is not in the maintainer directory", login);
                }
                Maintainer {
                    login: login.to_string(),
                    name: entry.and_then(|e| e.name.clone()),
                    slack: entry.and_then(|e| e.slack.clone()),
                }
            })
            .collect()
    }

    /// True when a human rejected this rename pair.
    pub fn is_rename_excluded(&self, old: &str, new: &str) -> bool {
        self.raw
            .rename_exclusions
            .iter()
            .any(|pair| pair.old == old && pair.new == new)
    }

    pub fn job_aliases(&self) -> &[RenamePair] {
        &self.raw.job_aliases
    }
}

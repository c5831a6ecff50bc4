// src/recipe/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::errors::{Result, RundagError};
use crate::model::Task;

/// Top-level recipe as read from a TOML file.
///
/// ```toml
/// [recipe]
/// description = "align and summarise"
///
/// [stage.prep]
/// tool = "prepare-inputs --into {output_dir}"
///
/// [stage.align]
/// tool = "align --sample {seq} --threads {s.threads} > {out.bam}"
/// after = ["prep"]
/// cpu_req = 2
/// tasks = 4
/// outputs = [{ name = "bam", basename = "aligned.bam" }]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecipe {
    #[serde(default)]
    pub recipe: RecipeSection,

    /// All stages from `[stage.<name>]`. Keys are the stage names.
    #[serde(default)]
    pub stage: BTreeMap<String, StageSpec>,
}

/// `[recipe]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RecipeSection {
    #[serde(default)]
    pub description: Option<String>,
}

/// `[stage.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StageSpec {
    /// Command template for this stage's tasks. Required unless `noop`.
    #[serde(default)]
    pub tool: Option<String>,

    /// Stages that must finish before this one's tasks may run.
    #[serde(default)]
    pub after: Vec<String>,

    /// CPUs claimed by each task of this stage.
    #[serde(default = "default_cpu_req")]
    pub cpu_req: u32,

    /// Whether a failing task of this stage is fatal for the execution.
    #[serde(default = "default_must_succeed")]
    pub must_succeed: bool,

    /// Marker stage: tasks complete immediately without running a command.
    #[serde(default)]
    pub noop: bool,

    /// Fan-out: how many tasks this stage materialises into.
    #[serde(default = "default_fanout")]
    pub tasks: u32,

    /// Declared output files of each task.
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
}

/// One declared output file of a stage's tasks.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputSpec {
    /// Logical name, referenced as `{out.<name>}` in the tool template.
    pub name: String,
    pub basename: String,
}

fn default_cpu_req() -> u32 {
    1
}

fn default_must_succeed() -> bool {
    true
}

fn default_fanout() -> u32 {
    1
}

/// Opaque per-stage configuration passed through to command generation;
/// outer keys are stage names. The core does not interpret the values.
pub type StageValues = BTreeMap<String, BTreeMap<String, String>>;

/// A validated recipe. Construct via `Recipe::try_from(RawRecipe)` or
/// [`crate::recipe::load_and_validate`].
#[derive(Debug, Clone)]
pub struct Recipe {
    description: Option<String>,
    stages: BTreeMap<String, StageSpec>,
}

impl Recipe {
    pub(crate) fn new_unchecked(raw: RawRecipe) -> Self {
        Self {
            description: raw.recipe.description,
            stages: raw.stage,
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Stages in name order.
    pub fn stages(&self) -> impl Iterator<Item = (&str, &StageSpec)> {
        self.stages.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn stage(&self, name: &str) -> Option<&StageSpec> {
        self.stages.get(name)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl StageSpec {
    /// Render this stage's command template for a concrete task.
    ///
    /// Substituted placeholders: `{output_dir}`, `{log_dir}`, `{task_id}`,
    /// `{stage}`, `{seq}`, `{out.NAME}` for declared output paths, and
    /// `{s.KEY}` / `{p.KEY}` for settings and parameters. Anything else is
    /// left untouched so shell constructs like `${VAR}` survive.
    pub fn generate_command(
        &self,
        task: &Task,
        settings: Option<&BTreeMap<String, String>>,
        parameters: Option<&BTreeMap<String, String>>,
    ) -> Result<String> {
        let template = self.tool.as_deref().ok_or_else(|| {
            RundagError::Config(format!("stage '{}' has no tool", task.stage_name))
        })?;

        let mut cmd = template.to_string();
        for file in &task.output_files {
            if let Some(path) = &file.path {
                cmd = cmd.replace(
                    &format!("{{out.{}}}", file.name),
                    &path.display().to_string(),
                );
            }
        }
        if let Some(dir) = &task.output_dir {
            cmd = cmd.replace("{output_dir}", &dir.display().to_string());
        }
        if let Some(dir) = &task.log_dir {
            cmd = cmd.replace("{log_dir}", &dir.display().to_string());
        }
        cmd = cmd.replace("{task_id}", &task.id.to_string());
        cmd = cmd.replace("{stage}", &task.stage_name);
        cmd = cmd.replace("{seq}", &task.seq.to_string());
        if let Some(settings) = settings {
            for (key, value) in settings {
                cmd = cmd.replace(&format!("{{s.{key}}}"), value);
            }
        }
        if let Some(parameters) = parameters {
            for (key, value) in parameters {
                cmd = cmd.replace(&format!("{{p.{key}}}"), value);
            }
        }
        Ok(cmd)
    }
}

// src/recipe/render.rs

//! Rendering a recipe into persistable stages, tasks and graphs.

use std::collections::BTreeMap;

use tracing::debug;

use crate::dag::DepGraph;
use crate::model::{Execution, Stage, StageId, Task, TaskFile, TaskId};
use crate::recipe::Recipe;

/// Output of [`render_recipe`]: stages and tasks ready to persist, plus the
/// stage-level dependency structure needed to build both graphs once ids
/// are assigned.
#[derive(Debug)]
pub struct RenderedRecipe {
    pub stages: Vec<Stage>,
    pub tasks: Vec<Task>,
    stage_after: BTreeMap<String, Vec<String>>,
}

/// Render `recipe` for `execution`, reusing persisted stages and tasks.
///
/// Identity across runs is `(stage name, seq)`: a surviving row with the
/// same coordinates is carried over untouched, which is how resumed
/// executions keep their completed work. New stages and tasks come out
/// with id 0 and must be persisted before graphs are built.
pub fn render_recipe(
    execution: &Execution,
    recipe: &Recipe,
    existing_stages: Vec<Stage>,
    existing_tasks: Vec<Task>,
) -> RenderedRecipe {
    let mut existing_stages: BTreeMap<String, Stage> = existing_stages
        .into_iter()
        .map(|s| (s.name.clone(), s))
        .collect();
    let mut existing_tasks: BTreeMap<(String, u32), Task> = existing_tasks
        .into_iter()
        .map(|t| ((t.stage_name.clone(), t.seq), t))
        .collect();

    let mut stages = Vec::new();
    let mut tasks = Vec::new();
    let mut stage_after = BTreeMap::new();

    for (name, spec) in recipe.stages() {
        let stage = existing_stages.remove(name).unwrap_or_else(|| Stage {
            id: 0,
            execution_id: execution.id,
            name: name.to_string(),
        });

        for seq in 0..spec.tasks {
            let task = existing_tasks
                .remove(&(name.to_string(), seq))
                .unwrap_or_else(|| {
                    let mut task =
                        Task::new(stage.id, name, seq, spec.cpu_req, spec.must_succeed, spec.noop);
                    task.output_files = spec
                        .outputs
                        .iter()
                        .map(|o| TaskFile {
                            name: o.name.clone(),
                            basename: o.basename.clone(),
                            path: None,
                        })
                        .collect();
                    task
                });
            tasks.push(task);
        }

        stage_after.insert(name.to_string(), spec.after.clone());
        stages.push(stage);
    }

    debug!(
        execution = %execution.name,
        stages = stages.len(),
        tasks = tasks.len(),
        "rendered recipe"
    );

    RenderedRecipe {
        stages,
        tasks,
        stage_after,
    }
}

impl RenderedRecipe {
    /// Propagate freshly assigned stage ids into the tasks that still
    /// reference their stage by name only.
    pub fn bind_stage_ids(&mut self) {
        let ids: BTreeMap<&str, StageId> = self
            .stages
            .iter()
            .map(|s| (s.name.as_str(), s.id))
            .collect();
        for task in &mut self.tasks {
            if task.stage_id == 0 {
                if let Some(&id) = ids.get(task.stage_name.as_str()) {
                    task.stage_id = id;
                }
            }
        }
    }

    /// Build the task and stage dependency graphs. All ids must be
    /// assigned. Task edges are the product of stage edges: every task of a
    /// dependency stage gates every task of the dependent stage.
    pub fn build_graphs(&self) -> (DepGraph, DepGraph) {
        let stage_by_name: BTreeMap<&str, StageId> = self
            .stages
            .iter()
            .map(|s| (s.name.as_str(), s.id))
            .collect();

        let mut stage_tasks: BTreeMap<StageId, Vec<TaskId>> = BTreeMap::new();
        let mut task_g = DepGraph::new();
        let mut stage_g = DepGraph::new();

        for stage in &self.stages {
            stage_g.add_node(stage.id);
        }
        for task in &self.tasks {
            task_g.add_node(task.id);
            stage_tasks.entry(task.stage_id).or_default().push(task.id);
        }

        for (name, deps) in &self.stage_after {
            let Some(&to_stage) = stage_by_name.get(name.as_str()) else {
                continue;
            };
            for dep in deps {
                let Some(&from_stage) = stage_by_name.get(dep.as_str()) else {
                    continue;
                };
                stage_g.add_edge(from_stage, to_stage);
                for &from_task in stage_tasks.get(&from_stage).map(Vec::as_slice).unwrap_or(&[]) {
                    for &to_task in stage_tasks.get(&to_stage).map(Vec::as_slice).unwrap_or(&[]) {
                        task_g.add_edge(from_task, to_task);
                    }
                }
            }
        }

        (task_g, stage_g)
    }
}

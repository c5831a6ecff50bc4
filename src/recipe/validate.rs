// src/recipe/validate.rs

use std::collections::BTreeSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{Result, RundagError};
use crate::model::validate_word_name;
use crate::recipe::model::{RawRecipe, Recipe};

impl TryFrom<RawRecipe> for Recipe {
    type Error = RundagError;

    fn try_from(raw: RawRecipe) -> std::result::Result<Self, Self::Error> {
        validate_raw_recipe(&raw)?;
        Ok(Recipe::new_unchecked(raw))
    }
}

fn validate_raw_recipe(raw: &RawRecipe) -> Result<()> {
    ensure_has_stages(raw)?;
    validate_stages(raw)?;
    validate_stage_dependencies(raw)?;
    validate_dag(raw)?;
    Ok(())
}

fn ensure_has_stages(raw: &RawRecipe) -> Result<()> {
    if raw.stage.is_empty() {
        return Err(RundagError::Config(
            "recipe must contain at least one [stage.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_stages(raw: &RawRecipe) -> Result<()> {
    for (name, spec) in raw.stage.iter() {
        validate_word_name("stage", name)?;

        if !spec.noop && spec.tool.is_none() {
            return Err(RundagError::Config(format!(
                "stage '{name}' needs a tool (or `noop = true`)"
            )));
        }
        if spec.cpu_req == 0 {
            return Err(RundagError::Config(format!(
                "stage '{name}': cpu_req must be >= 1 (got 0)"
            )));
        }
        if spec.tasks == 0 {
            return Err(RundagError::Config(format!(
                "stage '{name}': tasks must be >= 1 (got 0)"
            )));
        }

        let mut seen = BTreeSet::new();
        for output in &spec.outputs {
            if !seen.insert(output.name.as_str()) {
                return Err(RundagError::Config(format!(
                    "stage '{name}' declares output '{}' more than once",
                    output.name
                )));
            }
        }
    }
    Ok(())
}

fn validate_stage_dependencies(raw: &RawRecipe) -> Result<()> {
    for (name, spec) in raw.stage.iter() {
        for dep in spec.after.iter() {
            if !raw.stage.contains_key(dep) {
                return Err(RundagError::Config(format!(
                    "stage '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
            if dep == name {
                return Err(RundagError::Config(format!(
                    "stage '{name}' cannot depend on itself in `after`"
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(raw: &RawRecipe) -> Result<()> {
    // Build a simple petgraph graph from the stages and their dependencies.
    //
    // Edge direction: dep -> stage
    // For:
    //   [stage.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in raw.stage.keys() {
        graph.add_node(name.as_str());
    }
    for (name, spec) in raw.stage.iter() {
        for dep in spec.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(RundagError::DagCycle(format!(
            "cycle involving stage '{}'",
            cycle.node_id()
        ))),
    }
}

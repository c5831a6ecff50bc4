#![allow(dead_code)]

use std::collections::BTreeMap;

use rundag::recipe::{OutputSpec, RawRecipe, Recipe, RecipeSection, StageSpec};

/// Builder for `Recipe` to simplify test setup.
pub struct RecipeBuilder {
    raw: RawRecipe,
}

impl RecipeBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawRecipe {
                recipe: RecipeSection::default(),
                stage: BTreeMap::new(),
            },
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.raw.recipe.description = Some(description.to_string());
        self
    }

    pub fn with_stage(mut self, name: &str, spec: StageSpec) -> Self {
        self.raw.stage.insert(name.to_string(), spec);
        self
    }

    pub fn build(self) -> Recipe {
        Recipe::try_from(self.raw).expect("Failed to build valid recipe from builder")
    }
}

impl Default for RecipeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StageSpec`.
pub struct StageSpecBuilder {
    spec: StageSpec,
}

impl StageSpecBuilder {
    pub fn new(tool: &str) -> Self {
        Self {
            spec: StageSpec {
                tool: Some(tool.to_string()),
                after: vec![],
                cpu_req: 1,
                must_succeed: true,
                noop: false,
                tasks: 1,
                outputs: vec![],
            },
        }
    }

    /// A marker stage with no command.
    pub fn noop() -> Self {
        Self {
            spec: StageSpec {
                tool: None,
                after: vec![],
                cpu_req: 1,
                must_succeed: true,
                noop: true,
                tasks: 1,
                outputs: vec![],
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.spec.after.push(dep.to_string());
        self
    }

    pub fn cpu_req(mut self, cpu_req: u32) -> Self {
        self.spec.cpu_req = cpu_req;
        self
    }

    pub fn must_succeed(mut self, val: bool) -> Self {
        self.spec.must_succeed = val;
        self
    }

    pub fn tasks(mut self, fanout: u32) -> Self {
        self.spec.tasks = fanout;
        self
    }

    pub fn output(mut self, name: &str, basename: &str) -> Self {
        self.spec.outputs.push(OutputSpec {
            name: name.to_string(),
            basename: basename.to_string(),
        });
        self
    }

    pub fn build(self) -> StageSpec {
        self.spec
    }
}

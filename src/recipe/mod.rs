// src/recipe/mod.rs

//! Recipe loading, validation and rendering.
//!
//! A recipe declares stages (tool template, CPU requirement, fan-out,
//! declared outputs) and their dependencies. [`render_recipe`] turns a
//! validated recipe into the stages, tasks and graphs the engine executes.

pub mod loader;
pub mod model;
pub mod render;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{OutputSpec, RawRecipe, Recipe, RecipeSection, StageSpec, StageValues};
pub use render::{RenderedRecipe, render_recipe};

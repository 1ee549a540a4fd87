pub mod addons;
pub mod config;
pub mod error;
pub mod fetch;
pub mod form;
pub mod ipc;
pub mod logging;
pub mod menu;
pub mod recipe;
pub mod runtime;
pub mod scanner;
pub mod store;

pub use error::{RecipeError, RecipeResult};

//! Toolkit-free controller behind the desktop form.
//!
//! The GUI only renders these fields and forwards button presses; every rule
//! about what may be added, edited or deleted lives here so it can be tested
//! without a window.

use std::path::Path;

use tracing::{info, warn};

use crate::addons::{Addon, AddonCache, AddonListSource, AddonSource};
use crate::error::{RecipeError, RecipeResult};
use crate::recipe::{RecipeDraft, RecipePatch, RecipeType, parse_ingredients};
use crate::store::RecipeStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecipeMode {
    #[default]
    Normal,
    Modded,
}

#[derive(Debug, Clone)]
pub struct AddForm {
    pub name: String,
    pub mode: RecipeMode,
    pub kind: RecipeType,
    pub output: String,
    pub ingredients: String,
    /// Index into `FormState::addons`.
    pub addon: Option<usize>,
}

impl Default for AddForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            mode: RecipeMode::Normal,
            kind: RecipeType::Shaped,
            output: String::new(),
            ingredients: String::new(),
            addon: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EditForm {
    /// Recipe currently loaded into the form; `None` until one is picked.
    pub loaded: Option<String>,
    pub kind: String,
    pub output: String,
    pub ingredients: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub message: String,
    pub is_error: bool,
}

#[derive(Debug, Default)]
pub struct FormState {
    pub add: AddForm,
    pub edit: EditForm,
    pub search_term: String,
    pub search_results: Vec<String>,
    pub addons: Vec<Addon>,
    pending_delete: Option<String>,
    status: Option<StatusLine>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Option<&StatusLine> {
        self.status.as_ref()
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    pub fn pending_delete(&self) -> Option<&str> {
        self.pending_delete.as_deref()
    }

    pub fn submit_add(&mut self, store: &mut RecipeStore) -> RecipeResult<()> {
        let result = self.try_add(store);
        self.report(result, "Recipe created successfully.")
    }

    fn try_add(&mut self, store: &mut RecipeStore) -> RecipeResult<()> {
        let name = self.add.name.trim().to_string();
        if name.is_empty() {
            return Err(RecipeError::validation("Recipe filename cannot be empty."));
        }
        if store.contains(&name) {
            return Err(RecipeError::DuplicateName(name));
        }
        let addon = match self.add.mode {
            RecipeMode::Normal => None,
            RecipeMode::Modded => {
                let Some(index) = self.add.addon else {
                    return Err(RecipeError::validation(
                        "Please select an addon or switch to Normal recipe mode.",
                    ));
                };
                let addon = self.addons.get(index).cloned().ok_or_else(|| {
                    RecipeError::validation("Selected addon information not found.")
                })?;
                Some(addon)
            }
        };
        let recipe = RecipeDraft {
            kind: self.add.kind.as_str().to_string(),
            output: self.add.output.clone(),
            ingredients: self.add.ingredients.clone(),
            addon,
        }
        .validate()?;
        store.create(&name, recipe)?;

        info!("form created recipe {name}");
        self.add = AddForm::default();
        self.load_for_edit(store, &name)
    }

    pub fn load_for_edit(&mut self, store: &RecipeStore, name: &str) -> RecipeResult<()> {
        let recipe = store
            .get(name)
            .ok_or_else(|| RecipeError::NotFound(name.to_string()))?;
        self.edit = EditForm {
            loaded: Some(name.to_string()),
            kind: recipe.kind.clone(),
            output: recipe.output.clone(),
            ingredients: recipe.ingredients.join(", "),
        };
        Ok(())
    }

    pub fn reset_edit(&mut self) {
        self.edit = EditForm::default();
    }

    /// Every field is required here; the form never leaves a value to keep.
    pub fn submit_edit(&mut self, store: &mut RecipeStore) -> RecipeResult<()> {
        let result = self.try_edit(store);
        self.report(result, "Recipe updated successfully.")
    }

    fn try_edit(&mut self, store: &mut RecipeStore) -> RecipeResult<()> {
        let Some(name) = self.edit.loaded.clone() else {
            return Err(RecipeError::validation("Please select a valid recipe."));
        };
        if self.edit.kind.trim().is_empty() {
            return Err(RecipeError::validation("Recipe type cannot be empty."));
        }
        if self.edit.output.trim().is_empty() {
            return Err(RecipeError::validation("Output item cannot be empty."));
        }
        if self.edit.ingredients.trim().is_empty() {
            return Err(RecipeError::validation("Ingredients cannot be empty."));
        }
        if parse_ingredients(&self.edit.ingredients).is_empty() {
            return Err(RecipeError::validation(
                "At least one valid ingredient is required.",
            ));
        }
        store.edit(
            &name,
            &RecipePatch {
                kind: Some(self.edit.kind.clone()),
                output: Some(self.edit.output.clone()),
                ingredients: Some(self.edit.ingredients.clone()),
            },
        )
    }

    /// Stages a delete; nothing is removed until `confirm_delete`.
    pub fn request_delete(&mut self, store: &RecipeStore, name: &str) -> RecipeResult<()> {
        let name = name.trim();
        let result = if store.contains(name) {
            self.pending_delete = Some(name.to_string());
            Ok(())
        } else {
            Err(RecipeError::NotFound(name.to_string()))
        };
        if let Err(error) = &result {
            self.set_error(error);
        }
        result
    }

    pub fn confirm_delete(&mut self, store: &mut RecipeStore) -> RecipeResult<()> {
        let Some(name) = self.pending_delete.take() else {
            let error = RecipeError::validation("Please select a recipe to delete.");
            self.set_error(&error);
            return Err(error);
        };
        let result = store.delete(&name).map(|_| {
            if self.edit.loaded.as_deref() == Some(name.as_str()) {
                self.reset_edit();
            }
            self.search_results.retain(|hit| hit != &name);
        });
        self.report(result, "Recipe deleted successfully.")
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    pub fn run_search(&mut self, store: &RecipeStore) -> RecipeResult<()> {
        let result = store.search(&self.search_term).map(|matches| {
            matches
                .into_iter()
                .map(|(name, _)| name.to_string())
                .collect::<Vec<_>>()
        });
        match result {
            Ok(names) => {
                let message = if names.is_empty() {
                    format!(
                        "No recipes found matching '{}'.",
                        self.search_term.trim().to_lowercase()
                    )
                } else {
                    format!("Found {} matching recipes.", names.len())
                };
                self.search_results = names;
                self.set_info(message);
                Ok(())
            }
            Err(error) => {
                self.search_results.clear();
                self.set_error(&error);
                Err(error)
            }
        }
    }

    pub fn export(&mut self, store: &RecipeStore, target: &Path) -> RecipeResult<()> {
        let result = store.export(target);
        let message = format!("Recipes exported successfully to {}.", target.display());
        self.report(result, &message)
    }

    /// Loads the addon list for the modded picker through the cache policy.
    pub fn fetch_addons(&mut self, cache: &AddonCache, source: &dyn AddonSource) {
        let outcome = cache.refresh(source);
        self.replace_addons(outcome.addons);
        match outcome.warning {
            Some(warning) => {
                warn!("{warning}");
                self.status = Some(StatusLine {
                    message: warning,
                    is_error: true,
                });
            }
            None => {
                let origin = match outcome.source {
                    AddonListSource::Cache => "local database",
                    _ => "the web",
                };
                let message = format!("Loaded {} addons from {origin}.", self.addons.len());
                self.set_info(message);
            }
        }
    }

    pub fn force_update(
        &mut self,
        cache: &AddonCache,
        source: &dyn AddonSource,
    ) -> RecipeResult<()> {
        let result = cache
            .force_refresh(source)
            .map(|addons| self.replace_addons(addons));
        let message = format!(
            "Addons database updated successfully with {} addons.",
            self.addons.len()
        );
        self.report(result, &message)
    }

    fn replace_addons(&mut self, addons: Vec<Addon>) {
        let selected = self
            .add
            .addon
            .and_then(|index| self.addons.get(index))
            .map(|addon| addon.name.clone());
        self.addons = addons;
        self.add.addon =
            selected.and_then(|name| self.addons.iter().position(|addon| addon.name == name));
    }

    fn report(&mut self, result: RecipeResult<()>, success: &str) -> RecipeResult<()> {
        match &result {
            Ok(()) => self.set_info(success.to_string()),
            Err(error) => self.set_error(error),
        }
        result
    }

    fn set_info(&mut self, message: String) {
        self.status = Some(StatusLine {
            message,
            is_error: false,
        });
    }

    fn set_error(&mut self, error: &RecipeError) {
        warn!("{error}");
        self.status = Some(StatusLine {
            message: error.to_string(),
            is_error: true,
        });
    }
}

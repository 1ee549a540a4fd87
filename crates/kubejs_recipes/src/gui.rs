use std::path::PathBuf;

use anyhow::{Result, anyhow};
use eframe::egui::{self, Color32, Context};
use eframe::Frame;
use kubejs_recipes_core::addons::{AddonCache, AddonSource};
use kubejs_recipes_core::form::{FormState, RecipeMode};
use kubejs_recipes_core::recipe::RecipeType;
use kubejs_recipes_core::store::{RecipeStore, to_pretty_json};
use tracing::info;

pub fn run(
    store: RecipeStore,
    addons: AddonCache,
    source: Box<dyn AddonSource>,
    export_default: PathBuf,
) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([860.0, 640.0]),
        ..Default::default()
    };
    let app = RecipeApp {
        store,
        addons,
        source,
        export_default,
        form: FormState::new(),
        screen: Screen::default(),
        selected: None,
    };
    info!("opening desktop form");
    eframe::run_native(
        "KubeJS Recipe Manager",
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
    .map_err(|error| anyhow!("desktop form failed: {error}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Screen {
    #[default]
    View,
    Add,
    Edit,
    Search,
}

struct RecipeApp {
    store: RecipeStore,
    addons: AddonCache,
    source: Box<dyn AddonSource>,
    export_default: PathBuf,
    form: FormState,
    screen: Screen,
    /// Recipe highlighted in the View tab.
    selected: Option<String>,
}

impl RecipeApp {
    fn draw_tabs(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.selectable_value(&mut self.screen, Screen::View, "View Recipes");
            ui.selectable_value(&mut self.screen, Screen::Add, "Add Recipe");
            ui.selectable_value(&mut self.screen, Screen::Edit, "Edit Recipe");
            ui.selectable_value(&mut self.screen, Screen::Search, "Search");
            ui.separator();
            if ui.button("Export...").clicked() {
                self.export();
            }
            if ui.button("Update Addons").clicked() {
                let _ = self.form.force_update(&self.addons, self.source.as_ref());
            }
        });
    }

    fn draw_status(&mut self, ui: &mut egui::Ui) {
        if let Some(status) = self.form.status() {
            let color = if status.is_error {
                Color32::LIGHT_RED
            } else {
                Color32::LIGHT_GREEN
            };
            ui.colored_label(color, &status.message);
        } else {
            ui.label(format!("{} recipes", self.store.len()));
        }
    }

    fn draw_view_screen(&mut self, ui: &mut egui::Ui) {
        ui.heading("Recipes");
        if self.store.is_empty() {
            ui.label("No recipes found.");
            return;
        }

        let names = self.store.names().map(str::to_string).collect::<Vec<_>>();
        ui.columns(2, |columns| {
            egui::ScrollArea::vertical()
                .id_salt("recipe_list")
                .show(&mut columns[0], |ui| {
                    for name in &names {
                        let is_selected = self.selected.as_deref() == Some(name.as_str());
                        if ui.selectable_label(is_selected, name).clicked() {
                            self.selected = Some(name.clone());
                        }
                    }
                });

            let ui = &mut columns[1];
            let Some(name) = self.selected.clone() else {
                ui.label("Select a recipe to see its details.");
                return;
            };
            let Some(recipe) = self.store.get(&name) else {
                self.selected = None;
                return;
            };
            let mut rendered = to_pretty_json(recipe);
            ui.add(
                egui::TextEdit::multiline(&mut rendered)
                    .code_editor()
                    .interactive(false),
            );
            ui.horizontal(|ui| {
                if ui.button("Edit").clicked()
                    && self.form.load_for_edit(&self.store, &name).is_ok()
                {
                    self.screen = Screen::Edit;
                }
                if ui.button("Delete").clicked() {
                    let _ = self.form.request_delete(&self.store, &name);
                }
            });
        });
    }

    fn draw_add_screen(&mut self, ui: &mut egui::Ui) {
        ui.heading("Add Recipe");
        egui::Grid::new("add_form").num_columns(2).show(ui, |ui| {
            ui.label("Recipe filename:");
            ui.text_edit_singleline(&mut self.form.add.name);
            ui.end_row();

            ui.label("Recipe mode:");
            ui.horizontal(|ui| {
                ui.radio_value(&mut self.form.add.mode, RecipeMode::Normal, "Normal");
                let modded = ui.radio_value(&mut self.form.add.mode, RecipeMode::Modded, "Modded");
                if modded.clicked() && self.form.addons.is_empty() {
                    self.form.fetch_addons(&self.addons, self.source.as_ref());
                }
            });
            ui.end_row();

            if self.form.add.mode == RecipeMode::Modded {
                ui.label("Addon:");
                let selected = self
                    .form
                    .add
                    .addon
                    .and_then(|index| self.form.addons.get(index))
                    .map(|addon| addon.name.clone())
                    .unwrap_or_else(|| "Select an addon".to_string());
                egui::ComboBox::from_id_salt("addon")
                    .selected_text(selected)
                    .show_ui(ui, |ui| {
                        for (index, addon) in self.form.addons.iter().enumerate() {
                            ui.selectable_value(&mut self.form.add.addon, Some(index), &addon.name);
                        }
                    });
                ui.end_row();
            }

            ui.label("Recipe type:");
            egui::ComboBox::from_id_salt("add_kind")
                .selected_text(self.form.add.kind.as_str())
                .show_ui(ui, |ui| {
                    for kind in RecipeType::ALL {
                        ui.selectable_value(&mut self.form.add.kind, kind, kind.as_str());
                    }
                });
            ui.end_row();

            ui.label("Output item:");
            ui.text_edit_singleline(&mut self.form.add.output);
            ui.end_row();

            ui.label("Ingredients (comma-separated):");
            ui.text_edit_multiline(&mut self.form.add.ingredients);
            ui.end_row();
        });

        if ui.button("Create Recipe").clicked() && self.form.submit_add(&mut self.store).is_ok() {
            self.screen = Screen::Edit;
        }
    }

    fn draw_edit_screen(&mut self, ui: &mut egui::Ui) {
        ui.heading("Edit Recipe");
        let loaded = self.form.edit.loaded.clone();
        egui::ComboBox::from_id_salt("edit_pick")
            .selected_text(loaded.as_deref().unwrap_or("Select a recipe"))
            .show_ui(ui, |ui| {
                let names = self.store.names().map(str::to_string).collect::<Vec<_>>();
                for name in names {
                    let picked = loaded.as_deref() == Some(name.as_str());
                    if ui.selectable_label(picked, &name).clicked() {
                        let _ = self.form.load_for_edit(&self.store, &name);
                    }
                }
            });
        if loaded.is_none() {
            return;
        }

        egui::Grid::new("edit_form").num_columns(2).show(ui, |ui| {
            ui.label("Recipe type:");
            ui.text_edit_singleline(&mut self.form.edit.kind);
            ui.end_row();

            ui.label("Output item:");
            ui.text_edit_singleline(&mut self.form.edit.output);
            ui.end_row();

            ui.label("Ingredients (comma-separated):");
            ui.text_edit_multiline(&mut self.form.edit.ingredients);
            ui.end_row();
        });

        ui.horizontal(|ui| {
            if ui.button("Save Changes").clicked() {
                let _ = self.form.submit_edit(&mut self.store);
            }
            if ui.button("Reset").clicked()
                && let Some(name) = &loaded
            {
                let _ = self.form.load_for_edit(&self.store, name);
            }
        });
    }

    fn draw_search_screen(&mut self, ui: &mut egui::Ui) {
        ui.heading("Search Recipes");
        ui.horizontal(|ui| {
            let response = ui.text_edit_singleline(&mut self.form.search_term);
            let submitted =
                response.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));
            if ui.button("Search").clicked() || submitted {
                let _ = self.form.run_search(&self.store);
            }
        });

        let hits = self.form.search_results.clone();
        egui::ScrollArea::vertical().show(ui, |ui| {
            for name in hits {
                let Some(recipe) = self.store.get(&name) else {
                    continue;
                };
                ui.collapsing(&name, |ui| {
                    ui.monospace(to_pretty_json(recipe));
                });
            }
        });
    }

    fn draw_delete_confirmation(&mut self, ctx: &Context) {
        let Some(name) = self.form.pending_delete().map(str::to_string) else {
            return;
        };
        let mut confirmed = false;
        let mut cancelled = false;
        egui::Window::new("Confirm Delete")
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label(format!("Are you sure you want to delete recipe '{name}'?"));
                ui.horizontal(|ui| {
                    confirmed = ui.button("Yes").clicked();
                    cancelled = ui.button("No").clicked();
                });
            });
        if confirmed {
            if self.form.confirm_delete(&mut self.store).is_ok() {
                self.selected = None;
            }
        } else if cancelled {
            self.form.cancel_delete();
        }
    }

    fn export(&mut self) {
        let file_name = self
            .export_default
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "export.js".to_string());
        let mut dialog = rfd::FileDialog::new()
            .add_filter("JavaScript files", &["js"])
            .add_filter("JSON files", &["json"])
            .set_file_name(file_name);
        if let Some(parent) = self.export_default.parent() {
            dialog = dialog.set_directory(parent);
        }
        if let Some(target) = dialog.save_file() {
            let _ = self.form.export(&self.store, &target);
        }
    }
}

impl eframe::App for RecipeApp {
    fn update(&mut self, ctx: &Context, _frame: &mut Frame) {
        egui::TopBottomPanel::top("tabs").show(ctx, |ui| {
            self.draw_tabs(ui);
        });
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            self.draw_status(ui);
        });
        egui::CentralPanel::default().show(ctx, |ui| match self.screen {
            Screen::View => self.draw_view_screen(ui),
            Screen::Add => self.draw_add_screen(ui),
            Screen::Edit => self.draw_edit_screen(ui),
            Screen::Search => self.draw_search_screen(ui),
        });
        self.draw_delete_confirmation(ctx);
    }
}

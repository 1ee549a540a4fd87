//! Numbered text menu over any line reader and writer.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use tracing::info;

use crate::addons::{Addon, AddonCache, AddonSource};
use crate::recipe::{RecipeDraft, RecipePatch, RecipeType, parse_ingredients};
use crate::store::{RecipeStore, export_target, to_pretty_json};

const RULE: &str = "==============================";
const SEPARATOR: &str = "------------------------------";

pub struct MenuSession<'a, R, W> {
    store: &'a mut RecipeStore,
    addons: &'a AddonCache,
    source: &'a dyn AddonSource,
    export_default: PathBuf,
    input: R,
    output: W,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    Create,
    Edit,
    Delete,
    View,
    Search,
    Export,
    Exit,
}

impl MenuChoice {
    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "1" => Some(Self::Create),
            "2" => Some(Self::Edit),
            "3" => Some(Self::Delete),
            "4" => Some(Self::View),
            "5" => Some(Self::Search),
            "6" => Some(Self::Export),
            "7" => Some(Self::Exit),
            _ => None,
        }
    }
}

impl<'a, R: BufRead, W: Write> MenuSession<'a, R, W> {
    pub fn new(
        store: &'a mut RecipeStore,
        addons: &'a AddonCache,
        source: &'a dyn AddonSource,
        export_default: PathBuf,
        input: R,
        output: W,
    ) -> Self {
        Self {
            store,
            addons,
            source,
            export_default,
            input,
            output,
        }
    }

    /// Runs until the user picks Exit or the input ends.
    pub fn run(&mut self) -> io::Result<()> {
        info!("menu session started");
        loop {
            writeln!(self.output)?;
            writeln!(self.output, "KubeJS Recipe Manager")?;
            writeln!(self.output, "{RULE}")?;
            writeln!(self.output, "1. Create a new recipe")?;
            writeln!(self.output, "2. Edit an existing recipe")?;
            writeln!(self.output, "3. Delete a recipe")?;
            writeln!(self.output, "4. View all recipes")?;
            writeln!(self.output, "5. Search recipes")?;
            writeln!(self.output, "6. Export recipes")?;
            writeln!(self.output, "7. Exit")?;
            writeln!(self.output, "{RULE}")?;

            let Some(choice) = self.prompt("Enter your choice (1-7): ")? else {
                break;
            };
            match MenuChoice::parse(&choice) {
                Some(MenuChoice::Create) => self.create_recipe()?,
                Some(MenuChoice::Edit) => self.edit_recipe()?,
                Some(MenuChoice::Delete) => self.delete_recipe()?,
                Some(MenuChoice::View) => self.view_recipes()?,
                Some(MenuChoice::Search) => self.search_recipes()?,
                Some(MenuChoice::Export) => self.export_recipes()?,
                Some(MenuChoice::Exit) => {
                    writeln!(self.output, "Thank you for using KubeJS Recipe Manager!")?;
                    break;
                }
                None => writeln!(
                    self.output,
                    "Invalid choice. Please enter a number between 1 and 7."
                )?,
            }
        }
        info!("menu session finished");
        self.output.flush()
    }

    /// Prints `text` and reads one trimmed line; `None` at end of input.
    fn prompt(&mut self, text: &str) -> io::Result<Option<String>> {
        write!(self.output, "{text}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn create_recipe(&mut self) -> io::Result<()> {
        let Some(name) = self.prompt("Enter the recipe filename (without extension): ")? else {
            return Ok(());
        };
        if name.is_empty() {
            writeln!(self.output, "Recipe filename cannot be empty.")?;
            return Ok(());
        }
        if self.store.contains(&name) {
            writeln!(self.output, "A recipe with this filename already exists.")?;
            return Ok(());
        }

        let Some(addon) = self.choose_addon()? else {
            return Ok(());
        };
        if let Some(addon) = &addon {
            writeln!(self.output)?;
            writeln!(self.output, "Using addon: {}", addon.name)?;
            writeln!(self.output, "Addon URL: {}", addon.url)?;
            writeln!(
                self.output,
                "Note: You may need to refer to the addon documentation for specific recipe types and formats."
            )?;
        }

        writeln!(self.output)?;
        writeln!(self.output, "Select recipe type:")?;
        self.print_recipe_types()?;
        let Some(selection) = self.prompt("Enter number (1-10): ")? else {
            return Ok(());
        };
        let kind = match selection.parse::<usize>() {
            Ok(index) => match RecipeType::from_index(index) {
                Some(kind) => kind,
                None => {
                    writeln!(
                        self.output,
                        "Invalid selection. Please enter a number between 1 and 10."
                    )?;
                    return Ok(());
                }
            },
            Err(_) => {
                writeln!(self.output, "Invalid input. Please enter a number.")?;
                return Ok(());
            }
        };

        let Some(output) = self.prompt("Enter the output item: ")? else {
            return Ok(());
        };
        let Some(ingredients) = self.prompt("Enter the ingredients (comma-separated): ")? else {
            return Ok(());
        };

        let draft = RecipeDraft {
            kind: kind.as_str().to_string(),
            output,
            ingredients,
            addon,
        };
        let result = draft
            .validate()
            .and_then(|recipe| self.store.create(&name, recipe));
        match result {
            Ok(()) => {
                writeln!(self.output, "Recipe created successfully.")?;
                self.edit_named(name.trim())
            }
            Err(error) => writeln!(self.output, "{error}"),
        }
    }

    /// Normal vs modded choice. Outer `None` means input ended; inner `None`
    /// means a normal recipe.
    fn choose_addon(&mut self) -> io::Result<Option<Option<Addon>>> {
        writeln!(self.output)?;
        writeln!(
            self.output,
            "Do you want to make a normal Minecraft recipe or a modded one?"
        )?;
        writeln!(self.output, "1. Normal Minecraft recipe")?;
        writeln!(self.output, "2. Modded recipe (using KubeJS addons)")?;
        let Some(choice) = self.prompt("Enter your choice (1-2): ")? else {
            return Ok(None);
        };
        if choice != "2" {
            return Ok(Some(None));
        }

        writeln!(self.output)?;
        writeln!(self.output, "Fetching KubeJS addons...")?;
        let outcome = self.addons.refresh(self.source);
        if let Some(warning) = &outcome.warning {
            writeln!(self.output, "Warning: {warning}")?;
        }
        let addons = outcome.addons;
        if addons.is_empty() {
            writeln!(
                self.output,
                "No addons found or error fetching addons. Defaulting to normal recipe."
            )?;
            return Ok(Some(None));
        }

        writeln!(self.output)?;
        writeln!(self.output, "Available KubeJS addons:")?;
        for (index, addon) in addons.iter().enumerate() {
            writeln!(self.output, "{}. {}", index + 1, addon.name)?;
        }
        let Some(selection) = self.prompt(&format!(
            "Enter addon number (1-{}) or 0 to cancel: ",
            addons.len()
        ))?
        else {
            return Ok(None);
        };
        let picked = match selection.parse::<usize>() {
            Ok(0) => {
                writeln!(
                    self.output,
                    "Addon selection cancelled. Defaulting to normal recipe."
                )?;
                None
            }
            Ok(index) if index <= addons.len() => addons.into_iter().nth(index - 1),
            Ok(_) => {
                writeln!(self.output, "Invalid selection. Defaulting to normal recipe.")?;
                None
            }
            Err(_) => {
                writeln!(self.output, "Invalid input. Defaulting to normal recipe.")?;
                None
            }
        };
        Ok(Some(picked))
    }

    fn edit_recipe(&mut self) -> io::Result<()> {
        let Some(name) = self.prompt("Enter the recipe filename to edit: ")? else {
            return Ok(());
        };
        if name.is_empty() {
            writeln!(self.output, "Recipe filename cannot be empty.")?;
            return Ok(());
        }
        self.edit_named(&name)
    }

    fn edit_named(&mut self, name: &str) -> io::Result<()> {
        let Some(current) = self.store.get(name) else {
            writeln!(self.output, "Recipe not found.")?;
            return Ok(());
        };
        let rendered = to_pretty_json(current);
        writeln!(self.output, "Current recipe:")?;
        writeln!(self.output, "{rendered}")?;

        writeln!(
            self.output,
            "Select recipe type (or press Enter to keep the current type):"
        )?;
        writeln!(self.output, "0. Keep current type")?;
        self.print_recipe_types()?;
        let Some(selection) = self.prompt("Enter number (0-10): ")? else {
            return Ok(());
        };
        let kind = if selection.is_empty() {
            None
        } else {
            match selection.parse::<usize>() {
                Ok(0) => None,
                Ok(index) => match RecipeType::from_index(index) {
                    Some(kind) => Some(kind.as_str().to_string()),
                    None => {
                        writeln!(self.output, "Invalid selection. Using current type.")?;
                        None
                    }
                },
                Err(_) => {
                    writeln!(self.output, "Invalid input. Using current type.")?;
                    None
                }
            }
        };

        let Some(output) = self.prompt(
            "Enter the new output item (or press Enter to keep the current output): ",
        )?
        else {
            return Ok(());
        };
        let Some(ingredients) = self.prompt(
            "Enter the new ingredients (comma-separated, or press Enter to keep the current ingredients): ",
        )?
        else {
            return Ok(());
        };
        if !ingredients.is_empty() && parse_ingredients(&ingredients).is_empty() {
            writeln!(
                self.output,
                "Warning: No valid ingredients provided. Keeping existing ingredients."
            )?;
        }

        let patch = RecipePatch {
            kind,
            output: Some(output),
            ingredients: Some(ingredients),
        };
        match self.store.edit(name, &patch) {
            Ok(()) => writeln!(self.output, "Recipe edited successfully."),
            Err(error) => writeln!(self.output, "{error}"),
        }
    }

    fn delete_recipe(&mut self) -> io::Result<()> {
        let Some(name) = self.prompt("Enter the recipe filename to delete: ")? else {
            return Ok(());
        };
        if name.is_empty() {
            writeln!(self.output, "Recipe filename cannot be empty.")?;
            return Ok(());
        }
        if !self.store.contains(&name) {
            writeln!(self.output, "Recipe not found.")?;
            return Ok(());
        }
        let Some(confirm) = self.prompt(&format!(
            "Are you sure you want to delete recipe '{name}'? (y/n): "
        ))?
        else {
            return Ok(());
        };
        if !confirm.eq_ignore_ascii_case("y") {
            writeln!(self.output, "Deletion cancelled.")?;
            return Ok(());
        }
        match self.store.delete(&name) {
            Ok(_) => writeln!(self.output, "Recipe deleted successfully."),
            Err(error) => writeln!(self.output, "{error}"),
        }
    }

    fn view_recipes(&mut self) -> io::Result<()> {
        if self.store.is_empty() {
            return writeln!(self.output, "No recipes found.");
        }
        for (name, recipe) in self.store.iter() {
            writeln!(self.output, "Recipe filename: {name}")?;
            writeln!(self.output, "{}", to_pretty_json(recipe))?;
            writeln!(self.output, "{SEPARATOR}")?;
        }
        Ok(())
    }

    fn search_recipes(&mut self) -> io::Result<()> {
        if self.store.is_empty() {
            return writeln!(self.output, "No recipes found.");
        }
        let Some(term) = self.prompt("Enter search term: ")? else {
            return Ok(());
        };
        let matches = match self.store.search(&term) {
            Ok(matches) => matches,
            Err(error) => return writeln!(self.output, "{error}"),
        };
        if matches.is_empty() {
            return writeln!(
                self.output,
                "No recipes found matching '{}'.",
                term.to_lowercase()
            );
        }
        for (name, recipe) in matches {
            writeln!(self.output, "Recipe filename: {name}")?;
            writeln!(self.output, "{}", to_pretty_json(recipe))?;
            writeln!(self.output, "{SEPARATOR}")?;
        }
        Ok(())
    }

    fn export_recipes(&mut self) -> io::Result<()> {
        let default_display = self.export_default.display().to_string();
        let Some(filename) =
            self.prompt(&format!("Enter export filename (default: {default_display}): "))?
        else {
            return Ok(());
        };
        if filename.is_empty() {
            writeln!(self.output, "Using default filename: {default_display}")?;
        }
        let target = export_target(&filename, &self.export_default);
        match self.store.export(&target) {
            Ok(()) => writeln!(
                self.output,
                "Recipes exported successfully to {}.",
                target.display()
            ),
            Err(error) => writeln!(self.output, "{error}"),
        }
    }

    fn print_recipe_types(&mut self) -> io::Result<()> {
        for (index, kind) in RecipeType::ALL.iter().enumerate() {
            writeln!(self.output, "{}. {}", index + 1, kind.as_str())?;
        }
        Ok(())
    }
}

use log::info;

use crate::{constants::NAME_MAX_LENGTH, error::Error, schema::Ingredient, store::Store};

pub async fn create_ingredient<S: Store + ?Sized>(
    store: &S,
    name: &str,
    measurement_unit: &str,
) -> Result<Ingredient, Error> {
    let name = name.trim();
    let measurement_unit = measurement_unit.trim();

    for (field, value) in [("name", name), ("measurement_unit", measurement_unit)] {
        if value.is_empty() || value.chars().count() > NAME_MAX_LENGTH {
            return Err(Error::validation(format!(
                "Ingredient {field} must be between 1 and {NAME_MAX_LENGTH} characters"
            )));
        }
    }

    match store.create_ingredient(name, measurement_unit).await? {
        Some(ingredient) => {
            info!(
                "Created ingredient {} ({}) with id {}",
                ingredient.name, ingredient.measurement_unit, ingredient.id
            );
            Ok(ingredient)
        }
        None => Err(Error::Duplicate(format!(
            "Ingredient {name} measured in {measurement_unit} already exists"
        ))),
    }
}

pub async fn get_ingredient<S: Store + ?Sized>(store: &S, id: i32) -> Result<Ingredient, Error> {
    store
        .get_ingredient(id)
        .await?
        .ok_or_else(|| Error::not_found("No ingredient exists with specified id"))
}

/// Ingredients whose name starts with `name`, ignoring case.
pub async fn list_ingredients<S: Store + ?Sized>(
    store: &S,
    name: Option<&str>,
) -> Result<Vec<Ingredient>, Error> {
    let prefix = name.map(str::trim).filter(|prefix| !prefix.is_empty());
    store.list_ingredients(prefix).await
}

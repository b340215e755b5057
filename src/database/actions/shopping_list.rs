use std::collections::BTreeMap;

use log::debug;

use crate::{
    constants::SHOPPING_LIST_HEADER,
    error::Error,
    schema::{Id, LinkKind, RecipePart},
    store::Store,
    views::{ShoppingList, ShoppingListLine},
};

/// Sums amounts per (name, unit) pair. The same ingredient name measured in
/// different units stays on separate lines. Lines come out ordered by name,
/// then unit, comparing bytes.
pub fn aggregate(parts: Vec<RecipePart>) -> Vec<ShoppingListLine> {
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
    for part in parts {
        *totals
            .entry((part.name, part.measurement_unit))
            .or_insert(0) += i64::from(part.amount);
    }

    totals
        .into_iter()
        .map(|((name, unit), total_amount)| ShoppingListLine {
            name,
            total_amount,
            unit,
        })
        .collect()
}

pub fn render(lines: &[ShoppingListLine]) -> String {
    let mut text = String::from(SHOPPING_LIST_HEADER);
    text.push('\n');
    for line in lines {
        text.push_str(&format!(
            "{} - {} {}\n",
            line.name, line.total_amount, line.unit
        ));
    }

    text
}

pub async fn build_shopping_list<S: Store + ?Sized>(
    store: &S,
    user_id: Id,
) -> Result<ShoppingList, Error> {
    let cart = store
        .list_linked_recipes(LinkKind::ShoppingCart, user_id)
        .await?;
    if cart.is_empty() {
        debug!("Shopping cart of user {user_id} is empty");
        return Ok(ShoppingList::Empty);
    }

    // recipes in the cart may have no ingredient rows left
    let parts = store.list_cart_parts(user_id).await?;
    Ok(ShoppingList::Report(aggregate(parts)))
}

pub mod associations;
pub mod ingredients;
pub mod recipes;
pub mod shopping_list;
pub mod short_links;
pub mod subscriptions;
pub mod tags;
pub mod users;

#[cfg(test)]
pub(crate) mod fixtures;

use log::info;

use crate::{constants::NAME_MAX_LENGTH, error::Error, schema::Tag, store::Store};

pub async fn create_tag<S: Store + ?Sized>(store: &S, name: &str, slug: &str) -> Result<Tag, Error> {
    let name = name.trim();
    let slug = slug.trim();

    if name.is_empty() || name.chars().count() > NAME_MAX_LENGTH {
        return Err(Error::validation(format!(
            "Tag name must be between 1 and {NAME_MAX_LENGTH} characters"
        )));
    }
    if slug.is_empty()
        || slug.len() > NAME_MAX_LENGTH
        || !slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::validation(
            "Slug may contain only latin letters, digits, hyphens and underscores",
        ));
    }

    match store.create_tag(name, slug).await? {
        Some(tag) => {
            info!("Created tag {} ({})", tag.slug, tag.id);
            Ok(tag)
        }
        None => Err(Error::Duplicate(String::from(
            "A tag with that name or slug already exists",
        ))),
    }
}

pub async fn get_tag<S: Store + ?Sized>(store: &S, id: i32) -> Result<Tag, Error> {
    store
        .get_tag(id)
        .await?
        .ok_or_else(|| Error::not_found("No tag exists with specified id"))
}

pub async fn list_tags<S: Store + ?Sized>(store: &S) -> Result<Vec<Tag>, Error> {
    store.list_tags().await
}

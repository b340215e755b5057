use crate::{
    memory::MemoryStore,
    schema::{Id, Ingredient, IngredientAmount, NewUser, RecipeFields, Tag, User},
    store::Store,
};

pub(crate) struct Fixture {
    pub store: MemoryStore,
    pub alice: User,
    pub bob: User,
    pub breakfast: Tag,
    pub lunch: Tag,
    pub salt: Ingredient,
    pub flour: Ingredient,
    pub milk: Ingredient,
}

pub(crate) fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        first_name: username.to_string(),
        last_name: String::from("Tester"),
    }
}

pub(crate) async fn fixture() -> Fixture {
    let store = MemoryStore::new();

    let alice = store.create_user(&new_user("alice")).await.unwrap().unwrap();
    let bob = store.create_user(&new_user("bob")).await.unwrap().unwrap();
    let breakfast = store
        .create_tag("Breakfast", "breakfast")
        .await
        .unwrap()
        .unwrap();
    let lunch = store.create_tag("Lunch", "lunch").await.unwrap().unwrap();
    let salt = store.create_ingredient("Salt", "g").await.unwrap().unwrap();
    let flour = store.create_ingredient("Flour", "g").await.unwrap().unwrap();
    let milk = store.create_ingredient("Milk", "ml").await.unwrap().unwrap();

    Fixture {
        store,
        alice,
        bob,
        breakfast,
        lunch,
        salt,
        flour,
        milk,
    }
}

pub(crate) fn fields(name: &str) -> RecipeFields {
    RecipeFields {
        name: name.to_string(),
        text: format!("How to make {name}"),
        cooking_time: 15,
        image: format!("media/{name}.png"),
    }
}

pub(crate) fn amounts(items: &[(Id, i32)]) -> Vec<IngredientAmount> {
    items
        .iter()
        .map(|(id, amount)| IngredientAmount {
            id: *id,
            amount: *amount,
        })
        .collect()
}

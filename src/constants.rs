pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
/// Larger `limit` values are clamped to this.
pub const PAGE_LIMIT_MAX: i64 = 100;

pub const MIN_AMOUNT: i32 = 1;
pub const MAX_AMOUNT: i32 = 32_000;

pub const MIN_COOKING_TIME: i32 = 1;
pub const MAX_COOKING_TIME: i32 = 32_000;

pub const NAME_MAX_LENGTH: usize = 256;

/// Usernames that would shadow `/users/me`.
pub const BANNED_USERNAMES: &[&str] = &["me"];

pub const SHOPPING_LIST_HEADER: &str = "Shopping list:";
pub const SHOPPING_LIST_FILENAME: &str = "shopping_cart.txt";

pub const SESSION_LIFETIME_HOURS: i64 = 24;

pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const USER_COUNT_PER_PAGE: i64 = 10;
pub const INGREDIENT_COUNT_PER_PAGE: i64 = 100;

pub const RECIPE_NAME_MAX_LEN: usize = 256;
pub const INGREDIENT_NAME_MAX_LEN: usize = 256;
pub const MEASUREMENT_UNIT_MAX_LEN: usize = 256;
pub const TAG_NAME_MAX_LEN: usize = 200;
pub const TAG_SLUG_MAX_LEN: usize = 200;
pub const TAG_COLOR_LEN: usize = 7;

pub const SHOPPING_LIST_HEADER: &str = "Shopping list";
pub const SHOPPING_LIST_FILENAME: &str = "ShoppingCart.txt";

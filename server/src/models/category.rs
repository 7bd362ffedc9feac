use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Categories seeded by the initial migration, kept in the same id order.
pub const DEFAULT_CATEGORIES: [(&str, &str); 6] = [
    ("Music", "Concerts, festivals and live performances"),
    ("Sports", "Games, matches and tournaments"),
    ("Entertainment", "Comedy, theatre and shows"),
    ("Education", "Workshops, lectures and seminars"),
    ("Food & Drink", "Tastings, food festivals and dinners"),
    ("Arts & Culture", "Exhibitions, galleries and cultural events"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
}

impl Category {
    pub fn defaults() -> Vec<Category> {
        DEFAULT_CATEGORIES
            .iter()
            .zip(1..)
            .map(|((name, description), id)| Category {
                id,
                name: name.to_string(),
                description: Some(description.to_string()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_numbered_from_one() {
        let categories = Category::defaults();
        assert_eq!(categories.len(), 6);
        assert_eq!(categories[0].id, 1);
        assert_eq!(categories[4].name, "Food & Drink");
    }
}

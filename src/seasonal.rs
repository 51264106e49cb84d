use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SeasonalFood {
    pub name: String,
    pub description: String,
    pub icon: String,
    pub recommended: bool,
}

impl SeasonalFood {
    fn new(name: &str, description: &str, icon: &str, recommended: bool) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            recommended,
        }
    }
}

/// A solar-term entry with foods to favor and foods to avoid.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SolarTerm {
    pub name: String,
    pub description: String,
    pub recommended_foods: Vec<SeasonalFood>,
    pub avoid_foods: Vec<SeasonalFood>,
}

/// The seeded current term. A date-indexed table of all 24 terms is out of
/// scope; the tips screen always shows this entry.
pub fn current_solar_term() -> SolarTerm {
    SolarTerm {
        name: "White Dew".to_string(),
        description: "Dew forms as nights cool; favor moistening foods and ease off raw, cold dishes.".to_string(),
        recommended_foods: vec![
            SeasonalFood::new(
                "Pear",
                "Moistens the lungs and soothes autumn dryness.",
                "fas fa-apple-alt",
                true,
            ),
            SeasonalFood::new(
                "White fungus",
                "Nourishing and hydrating, good stewed with rock sugar.",
                "fa-solid fa-seedling",
                true,
            ),
            SeasonalFood::new(
                "Glutinous rice",
                "Warms the stomach as the weather turns.",
                "fa-solid fa-bowl-rice",
                true,
            ),
        ],
        avoid_foods: vec![
            SeasonalFood::new(
                "Cold seafood",
                "Raw and chilled shellfish tax digestion in cooling weather.",
                "fas fa-shrimp",
                false,
            ),
            SeasonalFood::new(
                "Spicy food",
                "Heavy spice aggravates seasonal dryness.",
                "fa-solid fa-pepper-hot",
                false,
            ),
        ],
    }
}

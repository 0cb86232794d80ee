//! Styles and body placements offered to the user.

use serde::{Serialize, Deserialize};

pub const DEFAULT_STYLE: &str = "Traditional";

pub const STYLES: &[&str] = &[
    "Traditional",
    "Minimalist",
    "Realism",
    "Japanese (Irezumi)",
    "Blackwork",
    "Fineline",
    "Cyberpunk",
    "Geometric",
];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    #[default]
    Full,
    Arm,
    Leg,
    Back,
    Chest,
    Custom,
}

impl Placement {
    pub const ALL: [Placement; 6] = [
        Placement::Full,
        Placement::Arm,
        Placement::Leg,
        Placement::Back,
        Placement::Chest,
        Placement::Custom,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Placement::Full => "full",
            Placement::Arm => "arm",
            Placement::Leg => "leg",
            Placement::Back => "back",
            Placement::Chest => "chest",
            Placement::Custom => "custom",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Placement::Full => "Full Image",
            Placement::Arm => "Arm/Hand",
            Placement::Leg => "Leg",
            Placement::Back => "Back",
            Placement::Chest => "Chest",
            Placement::Custom => "Custom Area",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.slug().eq_ignore_ascii_case(slug.trim()))
    }

    /// Clause appended to the concept so the model knows where the ink goes.
    /// A custom placement only contributes once a region has been committed.
    pub fn area_clause(self, has_selection: bool) -> Option<&'static str> {
        match self {
            Placement::Custom if has_selection => Some("in the selected area"),
            Placement::Arm => Some("on the arm/hand area"),
            Placement::Leg => Some("on the leg area"),
            Placement::Back => Some("on the back area"),
            Placement::Chest => Some("on the chest area"),
            Placement::Full | Placement::Custom => None,
        }
    }

    pub fn example_prompts(self) -> &'static [&'static str] {
        match self {
            Placement::Full => &[
                "A meaningful quote in elegant script",
                "A nature scene with mountains and trees",
                "Abstract geometric patterns",
            ],
            Placement::Arm => &[
                "A sleeve of roses and thorns",
                "Tribal band pattern",
                "A clock with roman numerals",
                "A snake coiling around the arm",
                "Mandala on the wrist",
            ],
            Placement::Leg => &[
                "A dragon wrapping around the calf",
                "Floral design with butterflies",
                "Polynesian tribal pattern",
                "An anchor with rope",
                "A lion portrait",
            ],
            Placement::Back => &[
                "Angel wings spanning the shoulders",
                "A Japanese koi fish scene",
                "A phoenix rising from flames",
                "A tree of life",
                "A detailed skull with flowers",
            ],
            Placement::Chest => &[
                "An anatomical heart with flowers",
                "Eagle with spread wings",
                "A sacred geometry pattern",
                "A crown with jewels",
                "A compass with coordinates",
            ],
            Placement::Custom => &[
                "A small delicate butterfly",
                "A minimalist moon phases design",
                "A tiny heart outline",
                "A small star constellation",
                "An infinity symbol",
            ],
        }
    }
}

/// Concept text with the placement clause appended, if any.
pub fn enrich_prompt(concept: &str, placement: Placement, has_selection: bool) -> String {
    match placement.area_clause(has_selection) {
        Some(clause) => format!("{} {}", concept.trim(), clause),
        None => concept.trim().to_string(),
    }
}

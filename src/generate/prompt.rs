//! Prompt construction from a free-text style description.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptCategory {
    Nature,
    Abstract,
    Pattern,
    Other,
}

const NATURE_WORDS: &[&str] = &[
    "nature", "forest", "tree", "flower", "garden", "leaf", "leaves", "mountain", "ocean", "sea",
    "river", "water", "sky", "landscape", "jungle", "botanical", "sunset",
];
const ABSTRACT_WORDS: &[&str] = &[
    "abstract", "geometric", "surreal", "cubism", "minimal", "fluid", "gradient", "shapes",
    "cosmic", "neon",
];
const PATTERN_WORDS: &[&str] = &[
    "pattern", "texture", "mosaic", "tile", "tiles", "fabric", "stripes", "weave", "knit",
    "tessellation", "lattice",
];

impl PromptCategory {
    /// Keyword match on whole words (plural `s` ignored), checked in
    /// declaration order.
    pub fn classify(description: &str) -> Self {
        let lower = description.to_lowercase();
        let words: Vec<&str> =
            lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect();
        let hit = |vocab: &[&str]| {
            words.iter().any(|w| {
                vocab.contains(w) || w.strip_suffix('s').is_some_and(|stem| vocab.contains(&stem))
            })
        };

        if hit(NATURE_WORDS) {
            Self::Nature
        } else if hit(ABSTRACT_WORDS) {
            Self::Abstract
        } else if hit(PATTERN_WORDS) {
            Self::Pattern
        } else {
            Self::Other
        }
    }

    fn theme(self) -> &'static str {
        match self {
            Self::Nature => {
                "Weave organic natural forms (foliage, water, terrain) through the modules so \
                 the scene grows out of the code."
            }
            Self::Abstract => {
                "Render the modules as bold abstract shapes and color fields while the grid \
                 stays legible."
            }
            Self::Pattern => {
                "Turn the module grid into a repeating decorative pattern or texture that \
                 follows the dark and light cells exactly."
            }
            Self::Other => "Blend the reference artwork into the code in a tasteful, polished way.",
        }
    }
}

const STRUCTURE_RULES: &str = "Maintain finder patterns: keep the three corner squares crisp, \
square and unobstructed. Keep high contrast between dark and light modules. Do not distort QR \
structure: no warping, cropping or moving of modules, and keep the white quiet zone around the code.";

/// Builds the provider prompt for a payload and optional style description.
pub fn build_prompt(description: Option<&str>, payload: &str) -> String {
    let description = description.map(str::trim).filter(|d| !d.is_empty());
    let category = description.map(PromptCategory::classify).unwrap_or(PromptCategory::Other);

    let mut prompt = String::from("Create an artistic, scannable QR code image. ");
    prompt.push_str(category.theme());
    if let Some(d) = description {
        prompt.push_str(" Style: ");
        prompt.push_str(d);
        prompt.push('.');
    }
    prompt.push(' ');
    prompt.push_str(STRUCTURE_RULES);
    prompt.push_str(" The code encodes ");
    prompt.push_str(payload);
    prompt.push_str(" and must still scan to exactly that value.");
    prompt
}

#[cfg(test)]
mod prompt_tests {
    use test_case::test_case;

    use super::{build_prompt, PromptCategory};

    #[test_case("a misty pine forest at dawn", PromptCategory::Nature)]
    #[test_case("Ocean waves", PromptCategory::Nature)]
    #[test_case("bold geometric shapes", PromptCategory::Abstract)]
    #[test_case("mosaic tiles in terracotta", PromptCategory::Pattern)]
    #[test_case("cyberpunk city", PromptCategory::Other)]
    #[test_case("", PromptCategory::Other)]
    #[test_case("treehouse", PromptCategory::Other)]
    fn test_classify(description: &str, category: PromptCategory) {
        assert_eq!(PromptCategory::classify(description), category);
    }

    #[test]
    fn test_nature_wins_over_pattern() {
        assert_eq!(PromptCategory::classify("leaf pattern"), PromptCategory::Nature);
    }

    #[test_case(None)]
    #[test_case(Some("watercolor flowers"))]
    #[test_case(Some("   "))]
    fn test_prompt_keeps_structure_rules(description: Option<&str>) {
        let prompt = build_prompt(description, "https://example.com");
        let lower = prompt.to_lowercase();
        assert!(lower.contains("finder patterns"));
        assert!(lower.contains("high contrast"));
        assert!(lower.contains("do not distort qr structure"));
        assert!(prompt.contains("https://example.com"));
    }

    #[test]
    fn test_prompt_includes_description() {
        let prompt = build_prompt(Some("watercolor flowers"), "https://example.com");
        assert!(prompt.contains("Style: watercolor flowers."));
        assert!(prompt.contains("foliage"));
    }
}

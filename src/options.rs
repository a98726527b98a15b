use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{PostingsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PostingsOption {
    #[serde(default = "PostingsOption::default_packing")]
    pub packing: PackingOption,
    #[serde(default = "PostingsOption::default_skip_multiplier")]
    #[validate(range(min = 2, max = 64))]
    pub skip_multiplier: u32,
    #[serde(default = "PostingsOption::default_max_skip_levels")]
    #[validate(range(min = 1, max = 10))]
    pub max_skip_levels: u32,
    #[serde(default)]
    pub verify_checksums: bool,
}

impl PostingsOption {
    fn default_packing() -> PackingOption {
        PackingOption::Lanes
    }

    fn default_skip_multiplier() -> u32 {
        8
    }

    fn default_max_skip_levels() -> u32 {
        10
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        let option: PostingsOption =
            toml::from_str(s).map_err(|e| PostingsError::InvalidOption(e.to_string()))?;
        option
            .validate()
            .map_err(|e| PostingsError::InvalidOption(e.to_string()))?;
        Ok(option)
    }
}

impl Default for PostingsOption {
    fn default() -> Self {
        Self {
            packing: Self::default_packing(),
            skip_multiplier: Self::default_skip_multiplier(),
            max_skip_levels: Self::default_max_skip_levels(),
            verify_checksums: false,
        }
    }
}

/// Bit packing layout of full blocks. Each layout is tied to one format
/// version; readers pick the layout from the stored version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackingOption {
    WordPair,
    Lanes,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_from_empty() {
        let option = PostingsOption::from_toml("").unwrap();
        assert_eq!(option, PostingsOption::default());
        assert_eq!(option.packing, PackingOption::Lanes);
    }

    #[test]
    fn test_parse() {
        let option = PostingsOption::from_toml(
            r#"
            packing = "word_pair"
            skip_multiplier = 4
            verify_checksums = true
            "#,
        )
        .unwrap();
        assert_eq!(option.packing, PackingOption::WordPair);
        assert_eq!(option.skip_multiplier, 4);
        assert_eq!(option.max_skip_levels, 10);
        assert!(option.verify_checksums);
    }

    #[test]
    fn test_invalid() {
        assert!(PostingsOption::from_toml("skip_multiplier = 1").is_err());
        assert!(PostingsOption::from_toml("max_skip_levels = 11").is_err());
        assert!(PostingsOption::from_toml("packing = \"elias_fano\"").is_err());
        assert!(matches!(
            PostingsOption::from_toml("block_size = 64"),
            Err(PostingsError::InvalidOption(_))
        ));
    }
}

//! Profession posts: public cards where members advertise a service.
//!
//! Each card carries a gray "Delete" button.  The button's custom id embeds
//! the author's id so that only the author can remove the post.

use cutie_store::ExternalId;
use serde_json::{json, Value};
use thiserror::Error;

use crate::interaction::InteractionData;

const DELETE_PREFIX: &str = "profession_delete:";

// Component types / styles
const ACTION_ROW: u8 = 1;
const BUTTON: u8 = 2;
const SECONDARY: u8 = 2;

/// Longest name accepted; it is shown as the card's headline.
pub const NAME_LIMIT: usize = 256;

/// Discord rejects embed field values longer than this.
pub const FIELD_LIMIT: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfessionError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{field} is longer than {limit} characters")]
    TooLong { field: &'static str, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfessionPost {
    pub name: String,
    pub description: String,
    /// One requirement per line.
    pub requirements: String,
}

impl ProfessionPost {
    /// Read the three string options.  Commas in the requirements become
    /// line breaks.  Values that would not fit in a card are rejected.
    pub fn from_options(data: &InteractionData) -> Result<Self, ProfessionError> {
        let option = |name: &'static str| {
            data.option_str(name).ok_or(ProfessionError::Missing(name))
        };

        let post = Self {
            name: option("name")?.to_string(),
            description: option("description")?.to_string(),
            requirements: option("requirements")?
                .split(',')
                .map(str::trim)
                .collect::<Vec<_>>()
                .join("\n"),
        };

        check_len("name", &post.name, NAME_LIMIT)?;
        check_len("description", &post.description, FIELD_LIMIT)?;
        check_len("requirements", &post.requirements, FIELD_LIMIT)?;

        Ok(post)
    }
}

fn check_len(field: &'static str, value: &str, limit: usize) -> Result<(), ProfessionError> {
    if value.chars().count() > limit {
        return Err(ProfessionError::TooLong { field, limit });
    }
    Ok(())
}

/// Action row holding the author-only delete button.
pub fn delete_button(author: ExternalId) -> Value {
    json!({
        "type": ACTION_ROW,
        "components": [
            {
                "type": BUTTON,
                "style": SECONDARY,
                "label": "Delete",
                "custom_id": format!("{DELETE_PREFIX}{author}")
            }
        ]
    })
}

/// Author id encoded in a delete button's custom id.
pub fn delete_owner(custom_id: &str) -> Option<ExternalId> {
    custom_id.strip_prefix(DELETE_PREFIX)?.parse().ok()
}

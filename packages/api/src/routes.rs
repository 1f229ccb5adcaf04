use serde::{Deserialize, Serialize};

use crate::ranking::Period;

pub mod auth;
pub mod dashboard;
pub mod health;
pub mod ranking;
pub mod sales;
pub mod sellers;

#[derive(Clone, Copy, Deserialize, Serialize, Debug, Default)]
pub struct RankingParams {
    pub period: Option<Period>,
}

impl RankingParams {
    pub fn period(&self) -> Period {
        self.period.unwrap_or_default()
    }
}

/// Accepts inline images in the `data:image/<subtype>;base64,` form only.
pub(crate) fn is_image_data_url(value: &str) -> bool {
    let Some(rest) = value.strip_prefix("data:image/") else {
        return false;
    };
    let Some((subtype, _payload)) = rest.split_once(";base64,") else {
        return false;
    };
    !subtype.is_empty()
        && subtype
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

use std::collections::HashMap;

use serde::Deserialize;
use uuid::Uuid;

use crate::{skills::repo_types::RatedSkill, users::repo_types::User};

/// Submitted user attributes. Blank inputs are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserParams {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub contact_number: Option<String>,
    /// `(skill id, rating)` as submitted; `None` when the form carried no skill inputs.
    pub skill_ratings: Option<Vec<(String, String)>>,
}

impl UserParams {
    /// Builds params from urlencoded pairs, accepting both `user[name]` and `name` keys.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = UserParams::default();
        for (key, value) in pairs {
            let key = key
                .strip_prefix("user[")
                .and_then(|k| k.strip_suffix(']'))
                .map(str::to_string)
                .unwrap_or(key);

            if let Some(skill_id) = key
                .strip_prefix("skill_ratings][")
                .or_else(|| key.strip_prefix("skill_ratings["))
            {
                let skill_id = skill_id.trim_end_matches(']').to_string();
                params
                    .skill_ratings
                    .get_or_insert_with(Vec::new)
                    .push((skill_id, value.trim().to_string()));
                continue;
            }

            let slot = match key.as_str() {
                "name" => &mut params.name,
                "email" => &mut params.email,
                "password" => &mut params.password,
                "city" => &mut params.city,
                "state" => &mut params.state,
                "country" => &mut params.country,
                "contact_number" => &mut params.contact_number,
                _ => continue,
            };
            *slot = if key == "password" {
                Some(value).filter(|v| !v.is_empty())
            } else {
                Some(value.trim().to_string()).filter(|v| !v.is_empty())
            };
        }
        params
    }
}

#[derive(Debug, Deserialize)]
pub struct StatesQuery {
    pub country_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MethodOverride {
    #[serde(rename = "_method")]
    pub method: Option<String>,
}

/// Values echoed back into the user form.
#[derive(Debug, Clone, Default)]
pub struct UserForm {
    pub id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub contact_number: String,
    pub ratings: HashMap<String, String>,
}

impl UserForm {
    pub fn from_params(id: Option<Uuid>, p: &UserParams) -> Self {
        Self {
            id,
            name: p.name.clone().unwrap_or_default(),
            email: p.email.clone().unwrap_or_default(),
            city: p.city.clone().unwrap_or_default(),
            state: p.state.clone().unwrap_or_default(),
            country: p.country.clone().unwrap_or_default(),
            contact_number: p.contact_number.clone().unwrap_or_default(),
            ratings: p
                .skill_ratings
                .iter()
                .flatten()
                .cloned()
                .collect(),
        }
    }

    pub fn from_user(user: &User, skills: &[RatedSkill]) -> Self {
        Self {
            id: Some(user.id),
            name: user.name.clone(),
            email: user.email.clone(),
            city: user.city.clone().unwrap_or_default(),
            state: user.state.clone().unwrap_or_default(),
            country: user.country.clone().unwrap_or_default(),
            contact_number: user.contact_number.clone().unwrap_or_default(),
            ratings: skills
                .iter()
                .filter_map(|s| s.rating.map(|r| (s.skill_id.to_string(), r.to_string())))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn reads_nested_user_keys_and_blanks_become_none() {
        let params = UserParams::from_pairs(pairs(&[
            ("user[name]", "  Ali Raza "),
            ("user[email]", "ali@example.com"),
            ("user[state]", ""),
            ("user[country]", "PK"),
            ("authenticity_token", "ignored"),
        ]));
        assert_eq!(params.name.as_deref(), Some("Ali Raza"));
        assert_eq!(params.email.as_deref(), Some("ali@example.com"));
        assert_eq!(params.state, None);
        assert_eq!(params.country.as_deref(), Some("PK"));
        assert_eq!(params.skill_ratings, None);
    }

    #[test]
    fn accepts_flat_keys() {
        let params = UserParams::from_pairs(pairs(&[("name", "Sara"), ("city", "Karachi")]));
        assert_eq!(params.name.as_deref(), Some("Sara"));
        assert_eq!(params.city.as_deref(), Some("Karachi"));
    }

    #[test]
    fn password_is_not_trimmed() {
        let params = UserParams::from_pairs(pairs(&[("user[password]", " secret ")]));
        assert_eq!(params.password.as_deref(), Some(" secret "));
    }

    #[test]
    fn collects_skill_ratings() {
        let params = UserParams::from_pairs(pairs(&[
            ("user[skill_ratings][abc]", "8"),
            ("user[skill_ratings][def]", ""),
        ]));
        assert_eq!(
            params.skill_ratings,
            Some(vec![
                ("abc".to_string(), "8".to_string()),
                ("def".to_string(), String::new()),
            ])
        );
    }
}

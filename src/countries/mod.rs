//! Static country and state reference table.

mod table;

use table::COUNTRIES;

pub type State = (&'static str, &'static str);

#[derive(Debug)]
pub struct Country {
    pub code: &'static str,
    pub name: &'static str,
    pub states: &'static [State],
}

pub fn all() -> &'static [Country] {
    COUNTRIES
}

pub fn find(code: &str) -> Option<&'static Country> {
    let code = code.trim();
    COUNTRIES.iter().find(|c| c.code.eq_ignore_ascii_case(code))
}

/// Ordered `(code, name)` state pairs, or `None` for an unknown country code.
pub fn states(code: &str) -> Option<&'static [State]> {
    find(code).map(|c| c.states)
}

/// Human-readable state name, falling back to the stored code.
pub fn state_name<'a>(country: &str, state: &'a str) -> &'a str {
    states(country)
        .and_then(|s| s.iter().find(|(code, _)| *code == state))
        .map(|(_, name)| *name)
        .unwrap_or(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pakistan_has_seven_states_including_punjab() {
        let states = states("PK").expect("PK is known");
        assert_eq!(states.len(), 7);
        assert!(states.contains(&("PB", "Punjab")));
    }

    #[test]
    fn unknown_country_has_no_states() {
        assert!(states("abc").is_none());
        assert!(states("").is_none());
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        assert_eq!(find(" pk ").map(|c| c.name), Some("Pakistan"));
    }

    #[test]
    fn large_countries_resolve() {
        let us = states("us").expect("US is known");
        assert_eq!(us.len(), 57);
        assert!(us.contains(&("CA", "California")));
        assert_eq!(find("IN").map(|c| c.name), Some("India"));
        assert!(states("DE").is_some_and(|s| s.contains(&("BY", "Bayern"))));
    }

    #[test]
    fn countries_are_listed_by_name() {
        let names: Vec<_> = all().iter().map(|c| c.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(names.len() > 240);
    }

    #[test]
    fn state_names_fall_back_to_codes() {
        assert_eq!(state_name("PK", "PB"), "Punjab");
        assert_eq!(state_name("PK", "PK"), "PK");
        assert_eq!(state_name("ZZ", "Lahore"), "Lahore");
    }
}

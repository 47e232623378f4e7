//! Markup for user pages and the fragments streamed into them.

use std::fmt::Write;

use crate::{
    countries::{self, State},
    html::escape,
    skills::repo_types::{RatedSkill, Skill, SkillKind},
    users::{
        dto::UserForm,
        repo_types::User,
        services::{Field, ValidationErrors, RATING_RANGE},
    },
};

pub const USERS_TARGET: &str = "users";
pub const MODAL_TARGET: &str = "modal";
pub const STATE_SELECT_ID: &str = "user_state";

pub fn dom_id(user: &User) -> String {
    format!("user_{}", user.id)
}

fn location(user: &User) -> String {
    let country = user.country.as_deref().unwrap_or_default();
    let state = user
        .state
        .as_deref()
        .map(|s| countries::state_name(country, s))
        .unwrap_or_default();
    let country = countries::find(country).map(|c| c.name).unwrap_or(country);
    [user.city.as_deref().unwrap_or_default(), state, country]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Single user card; the unit that create/update streams swap in.
pub fn user_partial(user: &User) -> String {
    format!(
        r#"<div id="{dom_id}" class="card mb-2">
  <div class="card-body d-flex justify-content-between align-items-start">
    <div>
      <h2 class="h5 mb-1">{name}</h2>
      <div class="text-muted">{email}</div>
      <div>{contact}</div>
      <div class="small">{location}</div>
    </div>
    <div class="btn-group">
      <a class="btn btn-sm btn-outline-secondary" href="/users/{id}" data-turbo-stream="true">Show</a>
      <a class="btn btn-sm btn-outline-primary" href="/users/{id}/edit" data-turbo-stream="true">Edit</a>
      <form action="/users/{id}?_method=delete" method="post" data-turbo-confirm="Are you sure?">
        <button class="btn btn-sm btn-outline-danger" type="submit">Destroy</button>
      </form>
    </div>
  </div>
</div>"#,
        dom_id = dom_id(user),
        id = user.id,
        name = escape(&user.name),
        email = escape(&user.email),
        contact = escape(user.contact_number.as_deref().unwrap_or_default()),
        location = escape(&location(user)),
    )
}

/// The `users` container, replaced wholesale when the index is streamed.
pub fn users_list(users: &[User]) -> String {
    let mut list = String::new();
    for user in users {
        list.push_str(&user_partial(user));
    }
    format!(r#"<div id="{USERS_TARGET}">{list}</div>"#)
}

pub fn index_body(users: &[User]) -> String {
    let list = users_list(users);
    format!(
        r#"<div class="d-flex justify-content-between align-items-center mb-3">
  <h1 class="h3">Users</h1>
  <div>
    <a class="btn btn-primary" href="/users/new" data-turbo-stream="true">New user</a>
    <form class="d-inline" action="/logout" method="post">
      <button class="btn btn-link" type="submit">Sign out</button>
    </form>
  </div>
</div>
{list}"#
    )
}

/// Bootstrap dialog driven by the `bs-modal` controller.
pub fn modal(title: &str, body: &str) -> String {
    format!(
        r#"<div id="{MODAL_TARGET}"><div class="modal fade" tabindex="-1" data-controller="bs-modal">
  <div class="modal-dialog modal-lg">
    <div class="modal-content">
      <div class="modal-header">
        <h2 class="modal-title h5">{title}</h2>
        <button type="button" class="btn-close" data-bs-dismiss="modal" aria-label="Close"></button>
      </div>
      <div class="modal-body">{body}</div>
    </div>
  </div>
</div></div>"#,
        title = escape(title),
    )
}

/// `<select>` of states for a country; empty when the country is unknown.
pub fn states_select(states: Option<&[State]>, selected: &str) -> String {
    let mut options = String::from(r#"<option value="">Select state</option>"#);
    for (code, name) in states.unwrap_or_default() {
        let _ = write!(
            options,
            r#"<option value="{code}"{sel}>{name}</option>"#,
            code = escape(code),
            name = escape(name),
            sel = if *code == selected { " selected" } else { "" },
        );
    }
    format!(
        r#"<select class="form-select" name="user[state]" id="{STATE_SELECT_ID}">{options}</select>"#
    )
}

fn country_select(selected: &str) -> String {
    let mut options = String::from(r#"<option value="">Select country</option>"#);
    for country in countries::all() {
        let _ = write!(
            options,
            r#"<option value="{code}"{sel}>{name}</option>"#,
            code = country.code,
            name = escape(country.name),
            sel = if country.code == selected { " selected" } else { "" },
        );
    }
    format!(
        r#"<select class="form-select" name="user[country]" id="user_country" data-controller="countries">{options}</select>"#
    )
}

fn input(label: &str, name: &str, kind: &str, value: &str, invalid: bool) -> String {
    let class = if invalid { "form-control is-invalid" } else { "form-control" };
    format!(
        r#"<div class="mb-3">
  <label class="form-label" for="user_{name}">{label}</label>
  <input class="{class}" type="{kind}" name="user[{name}]" id="user_{name}" value="{value}">
</div>"#,
        value = escape(value),
    )
}

fn skill_inputs(skills: &[Skill], form: &UserForm) -> String {
    let mut out = String::new();
    for kind in SkillKind::ALL {
        let _ = write!(out, r#"<fieldset class="mb-3"><legend class="h6">{}</legend><div class="row">"#, kind.label());
        for skill in skills.iter().filter(|s| s.kind == kind) {
            let id = skill.id.to_string();
            let value = form.ratings.get(&id).map(String::as_str).unwrap_or_default();
            let _ = write!(
                out,
                r#"<div class="col-md-4 mb-2">
  <label class="form-label small" for="skill_{id}">{name}</label>
  <input class="form-control form-control-sm" type="number" min="{min}" max="{max}" name="user[skill_ratings][{id}]" id="skill_{id}" value="{value}">
</div>"#,
                name = escape(&skill.name),
                value = escape(value),
                min = RATING_RANGE.start(),
                max = RATING_RANGE.end(),
            );
        }
        out.push_str("</div></fieldset>");
    }
    out
}

fn error_list(errors: &ValidationErrors) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let mut items = String::new();
    for message in errors.full_messages() {
        let _ = write!(items, "<li>{}</li>", escape(&message));
    }
    format!(
        r#"<div id="error_explanation" class="alert alert-danger"><ul class="mb-0">{items}</ul></div>"#
    )
}

/// User form; posts to create, or to update via method override when editing.
pub fn form(form: &UserForm, errors: &ValidationErrors, skills: &[Skill]) -> String {
    let (action, submit) = match form.id {
        Some(id) => (format!("/users/{id}?_method=patch"), "Update User"),
        None => ("/users".to_string(), "Create User"),
    };
    let states = countries::states(&form.country);
    let invalid = |field| errors.on(field).next().is_some();
    format!(
        r#"<form id="user_form" action="{action}" method="post" data-action="submit->bs-modal#submit">
{errors}
{name}
{email}
{password}
{contact}
<div class="mb-3">
  <label class="form-label" for="user_country">Country</label>
  {country}
</div>
<div class="mb-3">
  <label class="form-label" for="{STATE_SELECT_ID}">State</label>
  {state}
</div>
{city}
{skills}
<button class="btn btn-primary" type="submit">{submit}</button>
</form>"#,
        errors = error_list(errors),
        name = input("Name", "name", "text", &form.name, invalid(Field::Name)),
        email = input("Email", "email", "email", &form.email, invalid(Field::Email)),
        password = input("Password", "password", "password", "", invalid(Field::Password)),
        contact = input(
            "Contact number",
            "contact_number",
            "tel",
            &form.contact_number,
            invalid(Field::ContactNumber),
        ),
        country = country_select(&form.country),
        state = states_select(states, &form.state),
        city = input("City", "city", "text", &form.city, false),
        skills = skill_inputs(skills, form),
    )
}

pub fn details(user: &User, skills: &[RatedSkill]) -> String {
    let mut groups = String::new();
    for kind in SkillKind::ALL {
        let rows: String = skills
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| {
                format!(
                    "<li>{} <span class=\"badge bg-secondary\">{}</span></li>",
                    escape(&s.name),
                    s.rating.map(|r| r.to_string()).unwrap_or_else(|| "-".into())
                )
            })
            .collect();
        if !rows.is_empty() {
            let _ = write!(groups, "<h3 class=\"h6\">{}</h3><ul>{rows}</ul>", kind.label());
        }
    }
    if groups.is_empty() {
        groups.push_str("<p class=\"text-muted\">No skills rated yet.</p>");
    }
    format!(
        r#"<dl class="row">
  <dt class="col-sm-4">Email</dt><dd class="col-sm-8">{email}</dd>
  <dt class="col-sm-4">Contact number</dt><dd class="col-sm-8">{contact}</dd>
  <dt class="col-sm-4">Location</dt><dd class="col-sm-8">{location}</dd>
</dl>
{groups}"#,
        email = escape(&user.email),
        contact = escape(user.contact_number.as_deref().unwrap_or_default()),
        location = escape(&location(user)),
    )
}

pub fn page_with_back_link(heading: &str, body: &str) -> String {
    format!(
        r#"<h1 class="h3 mb-3">{heading}</h1>
{body}
<a href="/users">Back to users</a>"#,
        heading = escape(heading),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::{
        dto::UserParams,
        services::{validate, Mode},
    };
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn user() -> User {
        User {
            id: Uuid::nil(),
            name: "Ali <Raza>".into(),
            email: "ali@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            city: Some("Lahore".into()),
            state: Some("PB".into()),
            country: Some("PK".into()),
            contact_number: Some("+92 300 1234567".into()),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn partial_is_addressable_and_escaped() {
        let html = user_partial(&user());
        assert!(html.contains(&format!("id=\"user_{}\"", Uuid::nil())));
        assert!(html.contains("Ali &lt;Raza&gt;"));
        assert!(html.contains("Lahore, Punjab, Pakistan"));
        assert!(!html.contains("argon2"));
    }

    #[test]
    fn form_lists_error_messages() {
        let params = UserParams::default();
        let errors = validate(&params, Mode::Create, &[]);
        let html = form(&UserForm::from_params(None, &params), &errors, &[]);
        assert!(html.contains("<li>Name can&#39;t be blank</li>"));
        assert!(html.contains("<li>Email can&#39;t be blank</li>"));
        assert!(html.contains(r#"action="/users""#));
        assert!(html.contains(r#"class="form-control is-invalid" type="text" name="user[name]""#));
    }

    #[test]
    fn edit_form_patches_through_override() {
        let u = user();
        let html = form(&UserForm::from_user(&u, &[]), &ValidationErrors::default(), &[]);
        assert!(html.contains(&format!("action=\"/users/{}?_method=patch\"", u.id)));
        assert!(html.contains(r#"<option value="PB" selected>Punjab</option>"#));
        assert!(html.contains(r#"<option value="PK" selected>Pakistan</option>"#));
        assert!(!html.contains("error_explanation"));
    }

    #[test]
    fn unknown_country_renders_empty_state_select() {
        let html = states_select(countries::states("abc"), "");
        assert_eq!(html.matches("<option").count(), 1);
        assert!(html.contains(&format!("id=\"{STATE_SELECT_ID}\"")));
    }

    #[test]
    fn details_group_skills_by_kind() {
        let skills = vec![
            RatedSkill {
                skill_id: Uuid::new_v4(),
                name: "React JS".into(),
                kind: SkillKind::FrontEnd,
                rating: Some(8),
            },
            RatedSkill {
                skill_id: Uuid::new_v4(),
                name: "Ruby".into(),
                kind: SkillKind::BackEnd,
                rating: None,
            },
        ];
        let html = details(&user(), &skills);
        let front = html.find("Front-end skills").unwrap();
        let back = html.find("Back-end skills").unwrap();
        assert!(front < back);
        assert!(html.contains("React JS <span class=\"badge bg-secondary\">8</span>"));
    }
}

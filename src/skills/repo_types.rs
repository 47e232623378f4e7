use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Discriminates the two skill families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "skill_kind", rename_all = "snake_case")]
pub enum SkillKind {
    FrontEnd,
    BackEnd,
}

impl SkillKind {
    pub const ALL: [SkillKind; 2] = [SkillKind::FrontEnd, SkillKind::BackEnd];

    pub fn label(self) -> &'static str {
        match self {
            SkillKind::FrontEnd => "Front-end skills",
            SkillKind::BackEnd => "Back-end skills",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Skill {
    pub id: Uuid,
    pub name: String,
    pub kind: SkillKind,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Join row between a user and a skill.
#[derive(Debug, Clone, FromRow)]
pub struct UserSkill {
    pub id: Uuid,
    pub user_id: Uuid,
    pub skill_id: Uuid,
    pub rating: Option<i32>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A user's skill joined with its name and kind, for display.
#[derive(Debug, Clone, FromRow)]
pub struct RatedSkill {
    pub skill_id: Uuid,
    pub name: String,
    pub kind: SkillKind,
    pub rating: Option<i32>,
}

pub mod repo;
pub mod repo_types;

use sqlx::PgPool;
use tracing::info;

use repo_types::{Skill, SkillKind};

const FRONT_END: &[&str] = &["HTML", "CSS3", "React JS", "Bootstrap", "Angular"];
const BACK_END: &[&str] = &["Ruby", "Python", "Java", "Node JS"];

/// Makes sure the fixed skill catalogue exists. Safe to run on every start.
pub async fn seed(db: &PgPool) -> sqlx::Result<Vec<Skill>> {
    let mut skills = Vec::with_capacity(FRONT_END.len() + BACK_END.len());
    for (kind, names) in [(SkillKind::FrontEnd, FRONT_END), (SkillKind::BackEnd, BACK_END)] {
        for name in names {
            skills.push(Skill::find_or_create(db, name, kind).await?);
        }
    }
    info!(count = skills.len(), "skills seeded");
    Ok(skills)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::repo_types::UserSkill;
    use crate::users::repo_types::{NewUser, User};

    #[sqlx::test(migrations = "./migrations")]
    async fn seeding_is_idempotent(pool: PgPool) {
        let first = seed(&pool).await.unwrap();
        let second = seed(&pool).await.unwrap();
        assert_eq!(first.len(), 9);
        assert_eq!(Skill::all(&pool).await.unwrap().len(), 9);
        let ids: Vec<_> = first.iter().map(|s| s.id).collect();
        let again: Vec<_> = second.iter().map(|s| s.id).collect();
        assert_eq!(ids, again);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn deleting_a_user_removes_their_skills(pool: PgPool) {
        let user = User::create(&pool, &NewUser::fixture("skills@example.com", "hash"))
            .await
            .unwrap();
        let skills = seed(&pool).await.unwrap();
        for skill in skills.iter().take(6) {
            UserSkill::create(&pool, user.id, skill.id, Some(8)).await.unwrap();
        }
        assert_eq!(UserSkill::count_for_user(&pool, user.id).await.unwrap(), 6);

        assert!(User::delete(&pool, user.id).await.unwrap());

        assert_eq!(UserSkill::count_for_user(&pool, user.id).await.unwrap(), 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn join_rows_require_both_parents(pool: PgPool) {
        let skill = Skill::find_or_create(&pool, "HTML", SkillKind::FrontEnd)
            .await
            .unwrap();
        let err = UserSkill::create(&pool, uuid::Uuid::new_v4(), skill.id, Some(5))
            .await
            .unwrap_err();
        assert!(matches!(err, sqlx::Error::Database(_)));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn rated_skills_are_grouped_by_kind(pool: PgPool) {
        let user = User::create(&pool, &NewUser::fixture("rated@example.com", "hash"))
            .await
            .unwrap();
        let python = Skill::find_or_create(&pool, "Python", SkillKind::BackEnd).await.unwrap();
        let css = Skill::find_or_create(&pool, "CSS3", SkillKind::FrontEnd).await.unwrap();
        UserSkill::create(&pool, user.id, python.id, Some(7)).await.unwrap();
        UserSkill::create(&pool, user.id, css.id, Some(9)).await.unwrap();

        let rated = UserSkill::for_user(&pool, user.id).await.unwrap();
        let names: Vec<_> = rated.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["CSS3", "Python"]);
        assert_eq!(rated[0].rating, Some(9));
    }
}

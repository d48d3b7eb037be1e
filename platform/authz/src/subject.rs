use std::collections::HashSet;

use entity::kinds::SubjectType;
use sea_orm::{ConnectionTrait, DbErr};
use uuid::Uuid;

use crate::model::Subject;
use crate::repo::roles;

/// Drop repeated (type, ref) pairs, keeping first occurrences in order.
pub fn unique_subjects(subjects: Vec<Subject>) -> Vec<Subject> {
    let mut seen = HashSet::new();
    subjects
        .into_iter()
        .filter(|s| seen.insert((s.subject_type, s.subject_ref.clone())))
        .collect()
}

/// The subject itself plus, for a suite, each contained role as a role subject.
pub async fn expand_subject<C: ConnectionTrait>(
    conn: &C,
    subject: Subject,
) -> Result<Vec<Subject>, DbErr> {
    let mut expanded = vec![subject.clone()];
    if subject.subject_type == SubjectType::Suite {
        if let Ok(suite_id) = Uuid::parse_str(&subject.subject_ref) {
            for role_id in roles::roles_in_suite(conn, suite_id).await? {
                expanded.push(Subject::new(SubjectType::Role, role_id.to_string()));
            }
        }
    }
    Ok(unique_subjects(expanded))
}

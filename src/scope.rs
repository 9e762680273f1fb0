//! Who may see what.
//!
//! A [`Caller`] carries a typed role set. For the role an endpoint serves, the caller's
//! organizational [`Anchor`] is resolved first, then [`resolve_scope`] filters already
//! fetched courses and sections down to the ones visible from that anchor.

use std::collections::BTreeSet;

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{Error, Result},
    model::{Course, Department, Role, Section, TeacherAssignment, User},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roles(BTreeSet<Role>);

impl Roles {
    pub fn has(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Role> for Roles {
    fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Identity of the user behind a request.
#[derive(Debug, Clone)]
pub struct Caller {
    pub id: String,
    pub name: String,
    pub roles: Roles,
    pub department: Option<String>,
    pub school: Option<String>,
}

impl From<User> for Caller {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            roles: user.roles.into_iter().collect(),
            department: user.department,
            school: user.school,
        }
    }
}

pub fn has_role(caller: &Caller, role: Role) -> bool {
    caller.roles.has(role)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Anchor {
    Institution,
    School { school: String },
    Department { department: String, school: String },
    Teacher { teacher: String },
}

impl Anchor {
    /// Anchor of `caller` acting as `role`. The department document is needed to know
    /// which school an HOD's sections live in.
    pub fn resolve(caller: &Caller, role: Role, department: Option<&Department>) -> Result<Self> {
        if !has_role(caller, role) {
            return Err(Error::Forbidden(format!(
                "user {} does not have the {:?} role",
                caller.id, role
            )));
        }
        match role {
            Role::Admin => Ok(Anchor::Institution),
            Role::Dean => caller
                .school
                .clone()
                .map(|school| Anchor::School { school })
                .ok_or_else(|| {
                    Error::ScopeNotFound(format!("dean {} is not assigned to a school", caller.id))
                }),
            Role::Hod => {
                let Some(department_id) = &caller.department else {
                    return Err(Error::ScopeNotFound(format!(
                        "HOD {} is not assigned to a department",
                        caller.id
                    )));
                };
                match department {
                    Some(d) if &d.id == department_id => Ok(Anchor::Department {
                        department: d.id.clone(),
                        school: d.school.clone(),
                    }),
                    _ => Err(Error::ScopeNotFound(format!(
                        "department {department_id} of HOD {} not found",
                        caller.id
                    ))),
                }
            }
            Role::Teacher => Ok(Anchor::Teacher {
                teacher: caller.id.clone(),
            }),
            Role::Student => Err(Error::Forbidden(
                "students have no analytics scope".to_string(),
            )),
        }
    }
}

/// Data [`resolve_scope`] filters. Callers may pass more than the anchor can see.
#[derive(Debug, Clone, Copy)]
pub struct ScopeInputs<'a> {
    pub courses: &'a [Course],
    pub sections: &'a [Section],
    pub departments: &'a [Department],
    pub assignments: &'a [TeacherAssignment],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub anchor: Anchor,
    pub courses: BTreeSet<String>,
    pub sections: BTreeSet<String>,
    pub students: BTreeSet<String>,
    /// (section, course) pairs a teacher is assigned to
    pub assignments: Option<BTreeSet<(String, String)>>,
}

impl Scope {
    pub fn contains_course(&self, course: &str) -> bool {
        self.anchor == Anchor::Institution || self.courses.contains(course)
    }

    pub fn contains_section(&self, section: &str) -> bool {
        self.anchor == Anchor::Institution || self.sections.contains(section)
    }

    pub fn contains_student(&self, student: &str) -> bool {
        self.anchor == Anchor::Institution || self.students.contains(student)
    }

    /// Whether `section` may be reported on for `course`.
    pub fn covers(&self, section: &Section, course: &str) -> bool {
        if !self.contains_section(&section.id) || !section.courses.iter().any(|c| c == course) {
            return false;
        }
        match &self.assignments {
            Some(pairs) => pairs.contains(&(section.id.clone(), course.to_string())),
            None => true,
        }
    }
}

fn sections_touching<'a>(
    sections: &'a [Section],
    school: &str,
    courses: &BTreeSet<String>,
) -> impl Iterator<Item = &'a Section> {
    sections.iter().filter(move |s| {
        s.school.as_deref() == Some(school) && s.courses.iter().any(|c| courses.contains(c))
    })
}

/// Courses, sections and students visible from `anchor`.
pub fn resolve_scope(anchor: Anchor, inputs: ScopeInputs<'_>) -> Scope {
    let mut assignments = None;
    let (courses, sections): (BTreeSet<String>, Vec<&Section>) = match &anchor {
        Anchor::Institution => (
            inputs.courses.iter().map(|c| c.id.clone()).collect(),
            inputs.sections.iter().collect(),
        ),
        Anchor::Department { department, school } => {
            let courses: BTreeSet<String> = inputs
                .courses
                .iter()
                .filter(|c| c.department.as_deref() == Some(department.as_str()))
                .map(|c| c.id.clone())
                .collect();
            let sections = sections_touching(inputs.sections, school, &courses).collect();
            (courses, sections)
        }
        Anchor::School { school } => {
            let departments: BTreeSet<&str> = inputs
                .departments
                .iter()
                .filter(|d| &d.school == school)
                .map(|d| d.id.as_str())
                .collect();
            let courses: BTreeSet<String> = inputs
                .courses
                .iter()
                .filter(|c| {
                    c.department
                        .as_deref()
                        .is_some_and(|d| departments.contains(d))
                })
                .map(|c| c.id.clone())
                .collect();
            let sections = sections_touching(inputs.sections, school, &courses).collect();
            (courses, sections)
        }
        Anchor::Teacher { teacher } => {
            let pairs: BTreeSet<(String, String)> = inputs
                .assignments
                .iter()
                .filter(|a| &a.teacher == teacher)
                .map(|a| (a.section.clone(), a.course.clone()))
                .collect();
            let courses = pairs.iter().map(|(_, c)| c.clone()).collect();
            let sections = inputs
                .sections
                .iter()
                .filter(|s| {
                    pairs
                        .iter()
                        .any(|(sec, c)| sec == &s.id && s.courses.contains(c))
                })
                .collect();
            assignments = Some(pairs);
            (courses, sections)
        }
    };
    let students = sections
        .iter()
        .flat_map(|s| s.students.iter().cloned())
        .collect();
    Scope {
        anchor,
        courses,
        sections: sections.iter().map(|s| s.id.clone()).collect(),
        students,
        assignments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(roles: &[Role], department: Option<&str>, school: Option<&str>) -> Caller {
        Caller {
            id: "u1".into(),
            name: "Dr. Rao".into(),
            roles: roles.iter().copied().collect(),
            department: department.map(Into::into),
            school: school.map(Into::into),
        }
    }

    fn department(id: &str, school: &str) -> Department {
        Department {
            id: id.into(),
            name: id.to_uppercase(),
            school: school.into(),
        }
    }

    fn course(id: &str, department: &str) -> Course {
        Course {
            id: id.into(),
            title: id.into(),
            course_code: None,
            department: Some(department.into()),
            units: vec![],
            coordinators: vec![],
        }
    }

    fn section(id: &str, school: &str, courses: &[&str], students: &[&str]) -> Section {
        Section {
            id: id.into(),
            name: id.into(),
            school: Some(school.into()),
            department: None,
            courses: courses.iter().map(|s| s.to_string()).collect(),
            students: students.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn world() -> (Vec<Course>, Vec<Section>, Vec<Department>) {
        (
            vec![course("c1", "cs"), course("c2", "cs"), course("c3", "ee"), course("c4", "law")],
            vec![
                section("s1", "eng", &["c1"], &["st1", "st2"]),
                section("s2", "eng", &["c3"], &["st3"]),
                section("s3", "eng", &["c2", "c3"], &["st2", "st4"]),
                // same course taught under another school
                section("s4", "other", &["c1"], &["st9"]),
                section("s5", "humanities", &["c4"], &["st7"]),
            ],
            vec![
                department("cs", "eng"),
                department("ee", "eng"),
                department("law", "humanities"),
            ],
        )
    }

    #[test]
    fn hod_without_department_is_scope_not_found() {
        let err = Anchor::resolve(&caller(&[Role::Hod], None, None), Role::Hod, None).unwrap_err();
        assert!(matches!(err, Error::ScopeNotFound(_)));
        let err = Anchor::resolve(&caller(&[Role::Hod], Some("cs"), None), Role::Hod, None)
            .unwrap_err();
        assert!(matches!(err, Error::ScopeNotFound(_)));
    }

    #[test]
    fn missing_role_is_forbidden() {
        let err = Anchor::resolve(&caller(&[Role::Teacher], None, None), Role::Admin, None)
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[test]
    fn roles_are_a_set() {
        let c = caller(&[Role::Teacher, Role::Hod, Role::Teacher], Some("cs"), None);
        assert!(has_role(&c, Role::Teacher));
        assert!(has_role(&c, Role::Hod));
        assert!(!has_role(&c, Role::Admin));
        assert_eq!(c.roles.iter().count(), 2);
    }

    #[test]
    fn hod_scope() {
        let (courses, sections, departments) = world();
        let cs = department("cs", "eng");
        let anchor = Anchor::resolve(&caller(&[Role::Hod], Some("cs"), None), Role::Hod, Some(&cs))
            .unwrap();
        let scope = resolve_scope(
            anchor,
            ScopeInputs {
                courses: &courses,
                sections: &sections,
                departments: &departments,
                assignments: &[],
            },
        );
        assert_eq!(scope.courses, BTreeSet::from(["c1".to_string(), "c2".to_string()]));
        assert_eq!(scope.sections, BTreeSet::from(["s1".to_string(), "s3".to_string()]));
        assert_eq!(
            scope.students.iter().map(String::as_str).collect::<Vec<_>>(),
            ["st1", "st2", "st4"]
        );
        assert!(!scope.contains_student("st9"));
        assert!(!scope.contains_course("c3"));
    }

    #[test]
    fn dean_scope_spans_departments_of_school() {
        let (courses, sections, departments) = world();
        let anchor = Anchor::resolve(
            &caller(&[Role::Dean], None, Some("eng")),
            Role::Dean,
            None,
        )
        .unwrap();
        let scope = resolve_scope(
            anchor,
            ScopeInputs {
                courses: &courses,
                sections: &sections,
                departments: &departments,
                assignments: &[],
            },
        );
        assert_eq!(scope.courses.len(), 3);
        assert_eq!(scope.sections.len(), 3);
        assert!(!scope.contains_course("c4"));
    }

    #[test]
    fn teacher_scope_follows_assignments() {
        let (courses, sections, departments) = world();
        let assignments = vec![TeacherAssignment {
            id: "a1".into(),
            teacher: "u1".into(),
            section: "s3".into(),
            course: "c2".into(),
        }];
        let anchor =
            Anchor::resolve(&caller(&[Role::Teacher], None, None), Role::Teacher, None).unwrap();
        let scope = resolve_scope(
            anchor,
            ScopeInputs {
                courses: &courses,
                sections: &sections,
                departments: &departments,
                assignments: &assignments,
            },
        );
        assert_eq!(scope.courses, BTreeSet::from(["c2".to_string()]));
        assert!(scope.covers(&sections[2], "c2"));
        // s3 also carries c3, but the teacher is not assigned to it
        assert!(!scope.covers(&sections[2], "c3"));
    }

    #[test]
    fn admin_sees_everything() {
        let (courses, sections, departments) = world();
        let scope = resolve_scope(
            Anchor::Institution,
            ScopeInputs {
                courses: &courses,
                sections: &sections,
                departments: &departments,
                assignments: &[],
            },
        );
        assert!(scope.contains_student("not-in-any-section"));
        assert_eq!(scope.sections.len(), 5);
    }
}

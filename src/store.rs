use std::{path::Path, str::FromStr};

use serde::Deserialize;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::info;

use crate::{
    error::Result,
    model::{
        Course, Department, Document, Quiz, QuizAttempt, ReadingMaterial, School, Section,
        Student, StudentProgress, TeacherAssignment, Unit, User, Video,
    },
};

/// JSON document store on top of SQLite.
///
/// Every collection lives in the `documents` table; filters are evaluated with
/// SQLite's JSON functions so callers only deal with typed [`Document`]s.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::from_pool(pool).await
    }

    /// Private in-memory database, used by tests and the fixture tooling.
    pub async fn in_memory() -> Result<Self> {
        // every connection to :memory: is a new database, keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!()
            .run(&pool)
            .await
            .map_err(sqlx::Error::from)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn put<D: Document>(&self, doc: &D) -> Result<()> {
        let body = serde_json::to_string(doc)?;
        sqlx::query(
            "insert into documents (collection, id, body) values (?, ?, ?)
             on conflict (collection, id) do update set body = excluded.body",
        )
        .bind(D::COLLECTION)
        .bind(doc.id())
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn put_all<D: Document>(&self, docs: &[D]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for doc in docs {
            let body = serde_json::to_string(doc)?;
            sqlx::query(
                "insert into documents (collection, id, body) values (?, ?, ?)
                 on conflict (collection, id) do update set body = excluded.body",
            )
            .bind(D::COLLECTION)
            .bind(doc.id())
            .bind(body)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn get<D: Document>(&self, id: &str) -> Result<Option<D>> {
        let body = sqlx::query_scalar::<_, String>(
            "select body from documents where collection = ? and id = ?",
        )
        .bind(D::COLLECTION)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        body.map(|b| serde_json::from_str(&b).map_err(Into::into))
            .transpose()
    }

    pub async fn all<D: Document>(&self) -> Result<Vec<D>> {
        let bodies = sqlx::query_scalar::<_, String>(
            "select body from documents where collection = ? order by rowid",
        )
        .bind(D::COLLECTION)
        .fetch_all(&self.pool)
        .await?;
        decode_all(bodies)
    }

    /// Documents whose id is in `ids`, in insertion order.
    pub async fn get_many<D: Document>(&self, ids: &[String]) -> Result<Vec<D>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let bodies = sqlx::query_scalar::<_, String>(
            "select body from documents
             where collection = ? and id in (select value from json_each(?))
             order by rowid",
        )
        .bind(D::COLLECTION)
        .bind(serde_json::to_string(ids)?)
        .fetch_all(&self.pool)
        .await?;
        decode_all(bodies)
    }

    /// Documents whose top level `field` equals `value`.
    pub async fn find<D: Document>(&self, field: &str, value: &str) -> Result<Vec<D>> {
        self.find_where(&[(field, value)]).await
    }

    /// Documents matching every `(field, value)` equality.
    pub async fn find_where<D: Document>(&self, filters: &[(&str, &str)]) -> Result<Vec<D>> {
        let mut sql = String::from("select body from documents where collection = ?");
        for _ in filters {
            sql.push_str(" and json_extract(body, ?) = ?");
        }
        sql.push_str(" order by rowid");
        let mut query = sqlx::query_scalar::<_, String>(&sql).bind(D::COLLECTION);
        for (field, value) in filters {
            query = query.bind(format!("$.{field}")).bind(*value);
        }
        let bodies = query.fetch_all(&self.pool).await?;
        decode_all(bodies)
    }

    pub async fn find_one<D: Document>(&self, field: &str, value: &str) -> Result<Option<D>> {
        Ok(self.find(field, value).await?.into_iter().next())
    }

    /// Documents whose top level `field` is one of `values`.
    pub async fn find_in<D: Document>(&self, field: &str, values: &[String]) -> Result<Vec<D>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let bodies = sqlx::query_scalar::<_, String>(
            "select body from documents
             where collection = ? and json_extract(body, ?) in (select value from json_each(?))
             order by rowid",
        )
        .bind(D::COLLECTION)
        .bind(format!("$.{field}"))
        .bind(serde_json::to_string(values)?)
        .fetch_all(&self.pool)
        .await?;
        decode_all(bodies)
    }

    /// Documents whose array `field` contains `value`.
    pub async fn find_containing<D: Document>(&self, field: &str, value: &str) -> Result<Vec<D>> {
        let bodies = sqlx::query_scalar::<_, String>(
            "select body from documents
             where collection = ?
               and exists (select 1 from json_each(documents.body, ?) where json_each.value = ?)
             order by rowid",
        )
        .bind(D::COLLECTION)
        .bind(format!("$.{field}"))
        .bind(value)
        .fetch_all(&self.pool)
        .await?;
        decode_all(bodies)
    }

    pub async fn import(&self, fixture: &Fixture) -> Result<()> {
        self.put_all(&fixture.schools).await?;
        self.put_all(&fixture.departments).await?;
        self.put_all(&fixture.users).await?;
        self.put_all(&fixture.students).await?;
        self.put_all(&fixture.courses).await?;
        self.put_all(&fixture.units).await?;
        self.put_all(&fixture.videos).await?;
        self.put_all(&fixture.reading_materials).await?;
        self.put_all(&fixture.quizzes).await?;
        self.put_all(&fixture.quiz_attempts).await?;
        self.put_all(&fixture.student_progress).await?;
        self.put_all(&fixture.sections).await?;
        self.put_all(&fixture.teacher_assignments).await?;
        info!(
            "imported {} students, {} courses, {} sections",
            fixture.students.len(),
            fixture.courses.len(),
            fixture.sections.len()
        );
        Ok(())
    }

    pub async fn import_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(anyhow::Error::from)?;
        let fixture: Fixture = serde_json::from_str(&content)?;
        self.import(&fixture).await
    }
}

fn decode_all<D: Document>(bodies: Vec<String>) -> Result<Vec<D>> {
    bodies
        .iter()
        .map(|b| serde_json::from_str(b).map_err(Into::into))
        .collect()
}

/// Snapshot of every collection, the format of `seed` files.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Fixture {
    pub schools: Vec<School>,
    pub departments: Vec<Department>,
    pub users: Vec<User>,
    pub students: Vec<Student>,
    pub courses: Vec<Course>,
    pub units: Vec<Unit>,
    pub videos: Vec<Video>,
    pub reading_materials: Vec<ReadingMaterial>,
    pub quizzes: Vec<Quiz>,
    pub quiz_attempts: Vec<QuizAttempt>,
    pub student_progress: Vec<StudentProgress>,
    pub sections: Vec<Section>,
    pub teacher_assignments: Vec<TeacherAssignment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str, courses: &[&str], students: &[&str]) -> Section {
        Section {
            id: id.into(),
            name: id.to_uppercase(),
            school: Some("sch".into()),
            department: None,
            courses: courses.iter().map(|s| s.to_string()).collect(),
            students: students.iter().map(|s| s.to_string()).collect(),
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

    #[tokio::test]
    async fn put_get_and_replace() {
        let store = Store::in_memory().await.unwrap();
        store.put(&course("c1", "d1")).await.unwrap();
        let mut updated = course("c1", "d1");
        updated.title = "Algorithms".into();
        store.put(&updated).await.unwrap();

        let got: Course = store.get("c1").await.unwrap().unwrap();
        assert_eq!(got.title, "Algorithms");
        assert_eq!(store.all::<Course>().await.unwrap().len(), 1);
        assert!(store.get::<Course>("missing").await.unwrap().is_none());
        // same id in another collection is a different document
        assert!(store.get::<Section>("c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn filters() {
        let store = Store::in_memory().await.unwrap();
        store
            .put_all(&[course("c1", "d1"), course("c2", "d2"), course("c3", "d1")])
            .await
            .unwrap();
        store
            .put_all(&[
                section("s1", &["c1"], &["st1", "st2"]),
                section("s2", &["c2", "c3"], &["st3"]),
            ])
            .await
            .unwrap();

        let d1: Vec<Course> = store.find("department", "d1").await.unwrap();
        let both: Vec<Course> = store
            .find_where(&[("department", "d1"), ("title", "c3")])
            .await
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(
            d1.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            ["c1", "c3"]
        );

        let with_c3: Vec<Section> = store.find_containing("courses", "c3").await.unwrap();
        assert_eq!(with_c3.len(), 1);
        assert_eq!(with_c3[0].id, "s2");

        let picked: Vec<Course> = store
            .get_many(&["c3".to_string(), "c1".to_string(), "nope".to_string()])
            .await
            .unwrap();
        assert_eq!(picked.len(), 2);

        let in_depts: Vec<Course> = store
            .find_in("department", &["d2".to_string()])
            .await
            .unwrap();
        assert_eq!(in_depts[0].id, "c2");
        assert!(store.find_in::<Course>("department", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn import_fixture() {
        let store = Store::in_memory().await.unwrap();
        let fixture: Fixture = serde_json::from_str(
            r#"{
                "departments": [{"id": "d1", "name": "CS", "school": "sch"}],
                "courses": [{"id": "c1", "title": "Databases", "department": "d1"}],
                "readingMaterials": [{"id": "r1", "course": "c1", "title": "Notes", "approvalStatus": "pending"}]
            }"#,
        )
        .unwrap();
        store.import(&fixture).await.unwrap();
        let material: ReadingMaterial = store.get("r1").await.unwrap().unwrap();
        assert!(!material.is_countable());
        assert_eq!(store.all::<Department>().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_approval_status_is_readable() {
        let store = Store::in_memory().await.unwrap();
        sqlx::query("INSERT INTO documents (collection, id, body) VALUES (?, ?, ?)")
            .bind(ReadingMaterial::COLLECTION)
            .bind("r9")
            .bind(r#"{"id":"r9","course":"c1","title":"Slides","approvalStatus":"draft"}"#)
            .execute(store.pool())
            .await
            .unwrap();
        let materials: Vec<ReadingMaterial> = store.find("course", "c1").await.unwrap();
        assert_eq!(materials.len(), 1);
        assert!(materials[0].is_countable());
    }
}

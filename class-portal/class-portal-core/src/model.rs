//! Nested class documents: class → subject → category → file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A grade or course, the root of one persisted document.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassDoc {
    pub id: Uuid,
    pub class_name: String,
    #[serde(default)]
    pub subjects: Vec<SubjectDoc>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SubjectDoc {
    pub name: String,
    #[serde(default)]
    pub categories: Vec<CategoryDoc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CategoryDoc {
    #[serde(rename = "type")]
    pub category_type: String,
    #[serde(default)]
    pub files: Vec<FileRecord>,
}

/// Metadata for one uploaded file. The bytes live in blob storage under
/// `stored_name`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: Uuid,
    pub file_name: String,
    pub file_url: String,
    pub stored_name: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Projection of a class used by the summary listing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    pub id: Uuid,
    pub class_name: String,
}

/// Where a file sits in the tree, by name.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FilePath {
    pub class_name: String,
    pub subject: String,
    pub category: String,
}

/// A file record flattened with its location. Never persisted; always
/// computed from the class tree.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub class_id: Uuid,
    #[serde(flatten)]
    pub path: FilePath,
    #[serde(flatten)]
    pub file: FileRecord,
}

impl ClassDoc {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            class_name: class_name.into(),
            subjects: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> ClassSummary {
        ClassSummary {
            id: self.id,
            class_name: self.class_name.clone(),
        }
    }

    pub fn subject(&self, name: &str) -> Option<&SubjectDoc> {
        self.subjects.iter().find(|s| s.name == name)
    }

    /// Find the subject by name, appending an empty one if absent.
    pub fn subject_or_insert(&mut self, name: &str) -> &mut SubjectDoc {
        let idx = match self.subjects.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                self.subjects.push(SubjectDoc {
                    name: name.to_string(),
                    categories: Vec::new(),
                });
                self.subjects.len() - 1
            }
        };
        &mut self.subjects[idx]
    }

    /// Iterate every file in the class together with its location.
    pub fn entries(&self) -> impl Iterator<Item = FileEntry> + '_ {
        self.subjects.iter().flat_map(move |subject| {
            subject.categories.iter().flat_map(move |category| {
                category.files.iter().map(move |file| FileEntry {
                    class_id: self.id,
                    path: FilePath {
                        class_name: self.class_name.clone(),
                        subject: subject.name.clone(),
                        category: category.category_type.clone(),
                    },
                    file: file.clone(),
                })
            })
        })
    }

    /// Locate a file by id, returning (subject index, category index, file index).
    pub fn position_of(&self, file_id: Uuid) -> Option<(usize, usize, usize)> {
        for (si, subject) in self.subjects.iter().enumerate() {
            for (ci, category) in subject.categories.iter().enumerate() {
                if let Some(fi) = category.files.iter().position(|f| f.id == file_id) {
                    return Some((si, ci, fi));
                }
            }
        }
        None
    }
}

impl SubjectDoc {
    pub fn category(&self, category_type: &str) -> Option<&CategoryDoc> {
        self.categories
            .iter()
            .find(|c| c.category_type == category_type)
    }

    pub fn category_or_insert(&mut self, category_type: &str) -> &mut CategoryDoc {
        let idx = match self
            .categories
            .iter()
            .position(|c| c.category_type == category_type)
        {
            Some(idx) => idx,
            None => {
                self.categories.push(CategoryDoc {
                    category_type: category_type.to_string(),
                    files: Vec::new(),
                });
                self.categories.len() - 1
            }
        };
        &mut self.categories[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> FileRecord {
        FileRecord {
            id: Uuid::new_v4(),
            file_name: name.to_string(),
            file_url: format!("http://localhost/uploads/{name}"),
            stored_name: name.to_string(),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn find_or_insert_reuses_existing_nodes() {
        let mut class = ClassDoc::new("Class 9");
        class
            .subject_or_insert("Maths")
            .category_or_insert("Notes")
            .files
            .push(record("a.pdf"));
        class
            .subject_or_insert("Maths")
            .category_or_insert("Notes")
            .files
            .push(record("b.pdf"));

        assert_eq!(class.subjects.len(), 1);
        assert_eq!(class.subjects[0].categories.len(), 1);
        assert_eq!(class.subjects[0].categories[0].files.len(), 2);
    }

    #[test]
    fn entries_carry_location() {
        let mut class = ClassDoc::new("Class 10");
        let file = record("notes.pdf");
        let id = file.id;
        class
            .subject_or_insert("Science")
            .category_or_insert("Tests")
            .files
            .push(file);

        let entries: Vec<_> = class.entries().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].class_id, class.id);
        assert_eq!(entries[0].path.subject, "Science");
        assert_eq!(entries[0].path.category, "Tests");
        assert_eq!(class.position_of(id), Some((0, 0, 0)));
        assert_eq!(class.position_of(Uuid::new_v4()), None);
    }

    #[test]
    fn wire_names_are_camel_case() {
        let mut class = ClassDoc::new("Class 6");
        class
            .subject_or_insert("English")
            .category_or_insert("Notes")
            .files
            .push(record("x.txt"));
        let v = serde_json::to_value(&class).unwrap();
        assert_eq!(v["className"], "Class 6");
        let category = &v["subjects"][0]["categories"][0];
        assert_eq!(category["type"], "Notes");
        assert!(category["files"][0]["fileUrl"].is_string());
        assert!(category["files"][0]["uploadedAt"].is_string());
        assert!(v["createdAt"].is_string());

        let entry = class.entries().next().unwrap();
        let v = serde_json::to_value(&entry).unwrap();
        assert_eq!(v["className"], "Class 6");
        assert_eq!(v["subject"], "English");
        assert_eq!(v["category"], "Notes");
        assert_eq!(v["fileName"], "x.txt");
    }

    #[test]
    fn created_at_defaults_when_absent() {
        let id = Uuid::new_v4();
        let before = Utc::now();
        let class: ClassDoc = serde_json::from_value(serde_json::json!({
            "id": id,
            "className": "Class 5",
        }))
        .unwrap();
        assert_eq!(class.id, id);
        assert!(class.subjects.is_empty());
        assert!(class.created_at >= before);
    }
}

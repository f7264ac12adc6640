//! Filesystem-backed store for class documents.
//!
//! Each [`ClassDoc`] is persisted as `<id>.json` under the store directory
//! and loaded into memory at startup. Every mutation rewrites the whole
//! class document it touches.

use crate::error::{PortalError, Result};
use crate::model::{CategoryDoc, ClassDoc, ClassSummary, FileEntry, FilePath, FileRecord, SubjectDoc};
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Optional location hints narrowing a file lookup. Each given level must
/// exist or the lookup fails at that level.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PathFilter {
    pub class_name: Option<String>,
    pub subject: Option<String>,
    pub category: Option<String>,
}

impl PathFilter {
    /// Drop blank values so `?className=` behaves like an absent hint.
    pub fn normalized(self) -> Self {
        fn keep(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        Self {
            class_name: keep(self.class_name),
            subject: keep(self.subject),
            category: keep(self.category),
        }
    }
}

/// Mutable fields of a file. Unset fields keep their current value.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileUpdate {
    pub file_name: Option<String>,
    pub class_name: Option<String>,
    pub subject: Option<String>,
    pub category: Option<String>,
}

impl FileUpdate {
    pub fn is_empty(&self) -> bool {
        self.file_name.is_none()
            && self.class_name.is_none()
            && self.subject.is_none()
            && self.category.is_none()
    }
}

struct Located {
    class: usize,
    subject: usize,
    category: usize,
    file: usize,
}

pub struct ClassStore {
    classes: Vec<ClassDoc>,
    dir: PathBuf,
}

impl ClassStore {
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating store directory {}", dir.display()))?;
        let mut classes = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }
            let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            else {
                continue;
            };
            match Self::load(&path) {
                Ok(doc) if doc.id == id => classes.push(doc),
                Ok(doc) => warn!(path = %path.display(), doc_id = %doc.id, "class id does not match file name, skipping"),
                Err(err) => warn!(path = %path.display(), error = %err, "failed to load class document"),
            }
        }
        classes.sort_by_key(|c| c.created_at);
        debug!(count = classes.len(), dir = %dir.display(), "loaded class store");
        Ok(Self { classes, dir })
    }

    fn load(path: &Path) -> anyhow::Result<ClassDoc> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn save(&self, doc: &ClassDoc) -> anyhow::Result<()> {
        let path = self.path(doc.id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(doc)?)
            .with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &path).with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }

    /// All classes in creation order.
    pub fn classes(&self) -> &[ClassDoc] {
        &self.classes
    }

    pub fn summaries(&self) -> Vec<ClassSummary> {
        self.classes.iter().map(ClassDoc::summary).collect()
    }

    pub fn class(&self, id: Uuid) -> Result<&ClassDoc> {
        self.classes
            .iter()
            .find(|c| c.id == id)
            .ok_or(PortalError::ClassNotFound)
    }

    pub fn class_by_name(&self, name: &str) -> Option<&ClassDoc> {
        self.classes.iter().find(|c| c.class_name == name)
    }

    pub fn subject(&self, class_id: Uuid, subject: &str) -> Result<&SubjectDoc> {
        self.class(class_id)?
            .subject(subject)
            .ok_or(PortalError::SubjectNotFound)
    }

    pub fn categories(&self, class_id: Uuid, subject: &str) -> Result<&[CategoryDoc]> {
        Ok(&self.subject(class_id, subject)?.categories)
    }

    pub fn category(&self, class_id: Uuid, subject: &str, category: &str) -> Result<&CategoryDoc> {
        self.subject(class_id, subject)?
            .category(category)
            .ok_or(PortalError::CategoryNotFound)
    }

    pub fn files(&self, class_id: Uuid, subject: &str, category: &str) -> Result<&[FileRecord]> {
        Ok(&self.category(class_id, subject, category)?.files)
    }

    /// Flat view of every file, derived from the class tree.
    pub fn file_index(&self) -> Vec<FileEntry> {
        self.classes.iter().flat_map(ClassDoc::entries).collect()
    }

    pub fn find_file(&self, file_id: Uuid, filter: &PathFilter) -> Result<FileEntry> {
        let at = self.locate(file_id, filter)?;
        Ok(self.entry_at(&at))
    }

    fn entry_at(&self, at: &Located) -> FileEntry {
        let class = &self.classes[at.class];
        let subject = &class.subjects[at.subject];
        let category = &subject.categories[at.category];
        FileEntry {
            class_id: class.id,
            path: FilePath {
                class_name: class.class_name.clone(),
                subject: subject.name.clone(),
                category: category.category_type.clone(),
            },
            file: category.files[at.file].clone(),
        }
    }

    fn locate(&self, file_id: Uuid, filter: &PathFilter) -> Result<Located> {
        let classes: Vec<usize> = match &filter.class_name {
            Some(name) => {
                let matched: Vec<usize> = self
                    .classes
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| &c.class_name == name)
                    .map(|(i, _)| i)
                    .collect();
                if matched.is_empty() {
                    return Err(PortalError::ClassNotFound);
                }
                matched
            }
            None => (0..self.classes.len()).collect(),
        };

        let mut subject_seen = filter.subject.is_none();
        let mut category_seen = filter.category.is_none();
        for ci in classes {
            for (si, subject) in self.classes[ci].subjects.iter().enumerate() {
                if filter.subject.as_ref().is_some_and(|s| s != &subject.name) {
                    continue;
                }
                subject_seen = true;
                for (ki, category) in subject.categories.iter().enumerate() {
                    if filter
                        .category
                        .as_ref()
                        .is_some_and(|c| c != &category.category_type)
                    {
                        continue;
                    }
                    category_seen = true;
                    if let Some(fi) = category.files.iter().position(|f| f.id == file_id) {
                        return Ok(Located {
                            class: ci,
                            subject: si,
                            category: ki,
                            file: fi,
                        });
                    }
                }
            }
        }
        if !subject_seen {
            Err(PortalError::SubjectNotFound)
        } else if !category_seen {
            Err(PortalError::CategoryNotFound)
        } else {
            Err(PortalError::FileNotFound)
        }
    }

    /// Append `record` under `path`, creating the class, subject and
    /// category nodes that do not exist yet.
    pub fn add_file(&mut self, path: &FilePath, record: FileRecord) -> Result<FileEntry> {
        validate_path(path)?;
        let mut doc = self
            .class_by_name(&path.class_name)
            .cloned()
            .unwrap_or_else(|| ClassDoc::new(path.class_name.clone()));
        doc.subject_or_insert(&path.subject)
            .category_or_insert(&path.category)
            .files
            .push(record.clone());
        self.save(&doc)?;
        let entry = FileEntry {
            class_id: doc.id,
            path: path.clone(),
            file: record,
        };
        self.commit(doc);
        Ok(entry)
    }

    /// Rename and/or relocate a file. The file keeps its id and blob.
    pub fn update_file(&mut self, file_id: Uuid, update: &FileUpdate) -> Result<FileEntry> {
        let at = self.locate(file_id, &PathFilter::default())?;
        let current = self.entry_at(&at);

        let mut record = current.file.clone();
        if let Some(name) = update.file_name.as_deref().map(str::trim) {
            if name.is_empty() {
                return Err(PortalError::bad_request("fileName must not be empty"));
            }
            record.file_name = name.to_string();
        }
        let target = FilePath {
            class_name: pick(&update.class_name, &current.path.class_name),
            subject: pick(&update.subject, &current.path.subject),
            category: pick(&update.category, &current.path.category),
        };
        validate_path(&target)?;

        if target == current.path {
            let mut doc = self.classes[at.class].clone();
            doc.subjects[at.subject].categories[at.category].files[at.file] = record.clone();
            self.save(&doc)?;
            self.commit(doc);
            return Ok(FileEntry { file: record, ..current });
        }

        let mut source = self.classes[at.class].clone();
        source.subjects[at.subject].categories[at.category]
            .files
            .remove(at.file);
        let mut dest = if target.class_name == source.class_name {
            None
        } else {
            Some(
                self.class_by_name(&target.class_name)
                    .cloned()
                    .unwrap_or_else(|| ClassDoc::new(target.class_name.clone())),
            )
        };
        dest.as_mut()
            .unwrap_or(&mut source)
            .subject_or_insert(&target.subject)
            .category_or_insert(&target.category)
            .files
            .push(record.clone());

        let class_id = dest.as_ref().map_or(source.id, |d| d.id);
        self.save(&source)?;
        if let Some(dest) = &dest {
            if let Err(err) = self.save(dest) {
                // Put the source document back so the file stays where it was.
                if let Err(restore) = self.save(&self.classes[at.class]) {
                    warn!(class_id = %source.id, error = %restore, "failed to restore class document");
                }
                return Err(err.into());
            }
        }
        self.commit(source);
        if let Some(dest) = dest {
            self.commit(dest);
        }
        Ok(FileEntry {
            class_id,
            path: target,
            file: record,
        })
    }

    /// Remove a file record, returning it so the caller can drop its blob.
    pub fn remove_file(&mut self, file_id: Uuid, filter: &PathFilter) -> Result<FileEntry> {
        let at = self.locate(file_id, filter)?;
        let entry = self.entry_at(&at);
        let mut doc = self.classes[at.class].clone();
        doc.subjects[at.subject].categories[at.category]
            .files
            .remove(at.file);
        self.save(&doc)?;
        self.commit(doc);
        Ok(entry)
    }

    fn commit(&mut self, doc: ClassDoc) {
        match self.classes.iter_mut().find(|c| c.id == doc.id) {
            Some(slot) => *slot = doc,
            None => self.classes.push(doc),
        }
    }
}

fn pick(update: &Option<String>, current: &str) -> String {
    update
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(current)
        .to_string()
}

fn validate_path(path: &FilePath) -> Result<()> {
    for (field, value) in [
        ("className", &path.class_name),
        ("subject", &path.subject),
        ("category", &path.category),
    ] {
        if value.trim().is_empty() {
            return Err(PortalError::bad_request(format!("{field} is required")));
        }
    }
    Ok(())
}

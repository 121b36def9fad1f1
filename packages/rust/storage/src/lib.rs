//! Two-tier content store: raw bodies under `html_root_dir`, parsed JSON
//! under `json_root_dir`.
//!
//! The [`ContentStore`] knows nothing about pipelines. It maps a
//! [`SourceReference`] and [`ContentKind`] to a deterministic path, serves
//! reads only when the caller's read order includes [`ReadSource::File`], and
//! applies the write/backup policy.
//!
//! **Write rules:**
//! - Primary artifacts are replaced through a temp file + rename, so a write
//!   is an idempotent overwrite.
//! - Backups are created with create-new semantics under a fresh name and are
//!   never overwritten.

pub mod layout;

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use ladle_shared::{
    ContentKind, LadleError, PolicyConfig, RawContent, ReadSource, Result, SourceReference,
    StructuredContent, SystemPolicyConfig,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Upper bound on backup sequence numbers tried within one second.
const MAX_BACKUP_SEQ: u32 = 1000;

/// Content read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredContent {
    Raw(RawContent),
    Structured(StructuredContent),
}

impl StoredContent {
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Raw(_) => ContentKind::Raw,
            Self::Structured(_) => ContentKind::Structured,
        }
    }

    pub fn source(&self) -> &SourceReference {
        match self {
            Self::Raw(raw) => &raw.source,
            Self::Structured(content) => &content.source,
        }
    }
}

/// What a write actually produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Primary artifact, if written.
    pub primary: Option<PathBuf>,
    /// Backup artifact, if written.
    pub backup: Option<PathBuf>,
}

/// File-backed content store.
#[derive(Debug, Clone)]
pub struct ContentStore {
    html_root: PathBuf,
    json_root: PathBuf,
    readonly: bool,
}

impl ContentStore {
    /// Open a store in read-write mode, creating both roots.
    pub fn open(html_root: impl Into<PathBuf>, json_root: impl Into<PathBuf>) -> Result<Self> {
        let html_root = html_root.into();
        let json_root = json_root.into();
        for root in [&html_root, &json_root] {
            std::fs::create_dir_all(root).map_err(|e| LadleError::io(root, e))?;
        }

        Ok(Self {
            html_root,
            json_root,
            readonly: false,
        })
    }

    /// Open a store in read-only mode. Roots need not exist.
    pub fn open_readonly(html_root: impl Into<PathBuf>, json_root: impl Into<PathBuf>) -> Self {
        Self {
            html_root: html_root.into(),
            json_root: json_root.into(),
            readonly: true,
        }
    }

    /// Open a read-write store at the roots named in `[policy]`.
    pub fn from_config(config: &SystemPolicyConfig) -> Result<Self> {
        Self::open(&config.html_root_dir, &config.json_root_dir)
    }

    /// Root directory for a content kind.
    pub fn root(&self, kind: ContentKind) -> &Path {
        match kind {
            ContentKind::Raw => &self.html_root,
            ContentKind::Structured => &self.json_root,
        }
    }

    /// Primary artifact path for `source`.
    pub fn path_for(&self, source: &SourceReference, kind: ContentKind) -> PathBuf {
        layout::primary_path(self.root(kind), source, kind)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Look up stored content following `read_order`.
    ///
    /// Only [`ReadSource::File`] entries are served here; live retrieval is the
    /// fetcher's job. A read order without `File` yields `None` even when the
    /// artifact exists.
    pub fn read(
        &self,
        source: &SourceReference,
        kind: ContentKind,
        read_order: &[ReadSource],
    ) -> Result<Option<StoredContent>> {
        if !read_order.contains(&ReadSource::File) {
            debug!(%source, "read order excludes file, skipping store");
            return Ok(None);
        }

        let path = self.path_for(source, kind);
        let body = match std::fs::read_to_string(&path) {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(%source, path = %path.display(), "store miss");
                return Ok(None);
            }
            Err(e) => return Err(LadleError::io(&path, e)),
        };

        debug!(%source, path = %path.display(), "store hit");
        let content = match kind {
            ContentKind::Raw => StoredContent::Raw(RawContent {
                source: source.clone(),
                body,
            }),
            ContentKind::Structured => {
                let parsed: StructuredContent = serde_json::from_str(&body).map_err(|e| {
                    LadleError::Storage(format!("corrupt entry {}: {e}", path.display()))
                })?;
                StoredContent::Structured(parsed)
            }
        };
        Ok(Some(content))
    }

    /// Typed [`read`](Self::read) for raw content.
    pub fn read_raw(
        &self,
        source: &SourceReference,
        read_order: &[ReadSource],
    ) -> Result<Option<RawContent>> {
        match self.read(source, ContentKind::Raw, read_order)? {
            Some(StoredContent::Raw(raw)) => Ok(Some(raw)),
            _ => Ok(None),
        }
    }

    /// Typed [`read`](Self::read) for structured content.
    pub fn read_structured(
        &self,
        source: &SourceReference,
        read_order: &[ReadSource],
    ) -> Result<Option<StructuredContent>> {
        match self.read(source, ContentKind::Structured, read_order)? {
            Some(StoredContent::Structured(content)) => Ok(Some(content)),
            _ => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Persist `content` according to `policy`.
    ///
    /// Nothing is written unless `write_contents` is set. With `write_backup`
    /// a distinct backup copy is created alongside the primary.
    pub fn write(&self, content: &StoredContent, policy: &PolicyConfig) -> Result<WriteReceipt> {
        self.check_writable()?;

        let source = content.source();
        let kind = content.kind();

        if !policy.write_contents {
            debug!(%source, ?kind, "write_contents disabled, not persisting");
            return Ok(WriteReceipt::default());
        }

        let bytes = match content {
            StoredContent::Raw(raw) => raw.body.clone().into_bytes(),
            StoredContent::Structured(structured) => serde_json::to_vec_pretty(structured)
                .map_err(|e| LadleError::Storage(format!("serialize {source}: {e}")))?,
        };

        let primary = self.path_for(source, kind);
        write_atomic(&primary, &bytes)?;
        info!(%source, path = %primary.display(), "wrote content");

        let backup = if policy.write_backup {
            let path = write_backup(&primary, &bytes)?;
            info!(%source, path = %path.display(), "wrote backup");
            Some(path)
        } else {
            None
        };

        Ok(WriteReceipt {
            primary: Some(primary),
            backup,
        })
    }

    /// Typed [`write`](Self::write) for raw content.
    pub fn write_raw(&self, raw: &RawContent, policy: &PolicyConfig) -> Result<WriteReceipt> {
        self.write(&StoredContent::Raw(raw.clone()), policy)
    }

    /// Typed [`write`](Self::write) for structured content.
    pub fn write_structured(
        &self,
        content: &StructuredContent,
        policy: &PolicyConfig,
    ) -> Result<WriteReceipt> {
        self.write(&StoredContent::Structured(content.clone()), policy)
    }

    /// Existing backups for `source`, oldest first.
    pub fn list_backups(
        &self,
        source: &SourceReference,
        kind: ContentKind,
    ) -> Result<Vec<PathBuf>> {
        let primary = self.path_for(source, kind);
        let Some(dir) = primary.parent() else {
            return Ok(Vec::new());
        };

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LadleError::io(dir, e)),
        };

        let mut backups: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| layout::is_backup_of(&primary, path))
            .collect();
        backups.sort();
        Ok(backups)
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(LadleError::Storage(
                "content store is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }
}

/// Replace `path` with `bytes` via a uniquely named sibling temp file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| LadleError::Storage(format!("no parent for {}", path.display())))?;
    std::fs::create_dir_all(parent).map_err(|e| LadleError::store_write(parent, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{file_name}.{}.tmp", Uuid::now_v7()));

    std::fs::write(&tmp, bytes).map_err(|e| LadleError::store_write(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(LadleError::store_write(path, e));
    }
    Ok(())
}

/// Create a new backup file next to `primary`, never touching existing ones.
fn write_backup(primary: &Path, bytes: &[u8]) -> Result<PathBuf> {
    for seq in 0..MAX_BACKUP_SEQ {
        let candidate = layout::backup_path(primary, seq);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(mut file) => {
                file.write_all(bytes)
                    .map_err(|e| LadleError::store_write(&candidate, e))?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(LadleError::store_write(&candidate, e)),
        }
    }

    warn!(path = %primary.display(), "backup sequence exhausted");
    Err(LadleError::store_write(
        primary,
        std::io::Error::new(ErrorKind::AlreadyExists, "no free backup name"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("ladle-store-test-{}", Uuid::now_v7()))
    }

    fn test_store(root: &Path) -> ContentStore {
        ContentStore::open(root.join("html"), root.join("json")).expect("open store")
    }

    fn policy(write_contents: bool, write_backup: bool) -> PolicyConfig {
        PolicyConfig {
            read_order: vec![ReadSource::File],
            write_contents,
            write_backup,
        }
    }

    fn raw(location: &str, body: &str) -> RawContent {
        RawContent {
            source: SourceReference::new(location, "list"),
            body: body.into(),
        }
    }

    #[test]
    fn raw_roundtrip_is_byte_identical() {
        let root = temp_root();
        let store = test_store(&root);
        let content = raw("https://example.com/list", "<html><body>ünïcode ✓</body></html>");

        let receipt = store
            .write_raw(&content, &policy(true, false))
            .expect("write");
        assert!(receipt.primary.is_some());
        assert!(receipt.backup.is_none());

        let read = store
            .read_raw(&content.source, &[ReadSource::File])
            .expect("read")
            .expect("hit");
        assert_eq!(read.body.as_bytes(), content.body.as_bytes());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn structured_roundtrip() {
        let root = temp_root();
        let store = test_store(&root);
        let content = StructuredContent::new(
            SourceReference::new("https://example.com/list", "list"),
            "links",
            json!({"links": ["https://example.com/b"]}),
        );

        store
            .write_structured(&content, &policy(true, false))
            .expect("write");
        let read = store
            .read_structured(&content.source, &[ReadSource::Web, ReadSource::File])
            .expect("read")
            .expect("hit");
        assert_eq!(read, content);

        let path = store.path_for(&content.source, ContentKind::Structured);
        assert!(path.starts_with(root.join("json")));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn web_only_read_order_never_hits_store() {
        let root = temp_root();
        let store = test_store(&root);
        let content = raw("https://example.com/a", "cached");
        store.write_raw(&content, &policy(true, false)).unwrap();

        let read = store.read_raw(&content.source, &[ReadSource::Web]).unwrap();
        assert!(read.is_none());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn miss_returns_none() {
        let root = temp_root();
        let store = test_store(&root);
        let source = SourceReference::new("https://example.com/missing", "list");
        assert!(store.read_raw(&source, &[ReadSource::File]).unwrap().is_none());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn write_contents_disabled_writes_nothing() {
        let root = temp_root();
        let store = test_store(&root);
        let content = raw("https://example.com/a", "body");

        let receipt = store.write_raw(&content, &policy(false, true)).unwrap();
        assert_eq!(receipt, WriteReceipt::default());
        assert!(!store.path_for(&content.source, ContentKind::Raw).exists());
        assert!(
            store
                .list_backups(&content.source, ContentKind::Raw)
                .unwrap()
                .is_empty()
        );

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn backups_are_never_overwritten() {
        let root = temp_root();
        let store = test_store(&root);
        let first = raw("https://example.com/a", "first");
        let second = raw("https://example.com/a", "second");

        let r1 = store.write_raw(&first, &policy(true, true)).unwrap();
        let r2 = store.write_raw(&second, &policy(true, true)).unwrap();
        assert_ne!(r1.backup, r2.backup);

        let primary = store.path_for(&first.source, ContentKind::Raw);
        assert_eq!(std::fs::read_to_string(&primary).unwrap(), "second");

        let backups = store.list_backups(&first.source, ContentKind::Raw).unwrap();
        assert_eq!(backups.len(), 2);
        let contents: Vec<String> = backups
            .iter()
            .map(|p| std::fs::read_to_string(p).unwrap())
            .collect();
        assert!(contents.contains(&"first".to_string()));
        assert!(contents.contains(&"second".to_string()));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn repeated_writes_produce_identical_primary() {
        let root = temp_root();
        let store = test_store(&root);
        let content = raw("https://example.com/a", "same body");

        let r1 = store.write_raw(&content, &policy(true, false)).unwrap();
        let bytes1 = std::fs::read(r1.primary.as_ref().unwrap()).unwrap();
        let r2 = store.write_raw(&content, &policy(true, false)).unwrap();
        let bytes2 = std::fs::read(r2.primary.as_ref().unwrap()).unwrap();

        assert_eq!(r1.primary, r2.primary);
        assert_eq!(bytes1, bytes2);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn readonly_rejects_writes() {
        let root = temp_root();
        let store = ContentStore::open_readonly(root.join("html"), root.join("json"));
        let result = store.write_raw(&raw("https://example.com/a", "x"), &policy(true, false));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }

    #[test]
    fn unwritable_destination_reports_store_write() {
        let root = temp_root();
        std::fs::create_dir_all(&root).unwrap();
        // A regular file where the html root should be.
        let blocker = root.join("html");
        std::fs::write(&blocker, "not a directory").unwrap();

        let store = ContentStore {
            html_root: blocker,
            json_root: root.join("json"),
            readonly: false,
        };
        let err = store
            .write_raw(&raw("https://example.com/a", "x"), &policy(true, false))
            .unwrap_err();
        assert!(matches!(err, LadleError::StoreWrite { .. }));

        let _ = std::fs::remove_dir_all(&root);
    }
}

use crate::config::DocumentsConfig;
use crate::document::{ContextDocument, Document, DocumentKind, ToolsPromptDocument};
use crate::file;
use crate::metrics_defs::{DOCUMENTS_RESOLVED, DOCUMENTS_TIER_FAILED};
use crate::store::{DocumentStore, StoreError, open_store};
use shared::counter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The source a document was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Store,
    File,
    Builtin,
}

impl Tier {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Tier::Store => "store",
            Tier::File => "file",
            Tier::Builtin => "builtin",
        }
    }
}

/// Resolves documents through the store, file and built-in tiers.
///
/// The resolver is immutable once built and shared between requests.
pub struct ConfigResolver {
    store: Option<Arc<dyn DocumentStore>>,
    context_file: PathBuf,
    tools_prompt_file: PathBuf,
}

impl ConfigResolver {
    pub fn new(
        context_file: PathBuf,
        tools_prompt_file: PathBuf,
        store: Option<Arc<dyn DocumentStore>>,
    ) -> Self {
        ConfigResolver {
            store,
            context_file,
            tools_prompt_file,
        }
    }

    /// Builds the resolver from configuration, opening the store if one is
    /// configured. Must be called from within a tokio runtime.
    pub fn from_config(config: &DocumentsConfig) -> Result<Self, StoreError> {
        let store = config.store.as_ref().map(open_store).transpose()?;
        Ok(Self::new(
            config.context_file.clone(),
            config.tools_prompt_file.clone(),
            store,
        ))
    }

    pub fn store_configured(&self) -> bool {
        self.store.is_some()
    }

    pub async fn context(&self, report_id: Option<&str>) -> ContextDocument {
        self.resolve(report_id).await
    }

    pub async fn tools_prompt(&self, prompt_id: Option<&str>) -> ToolsPromptDocument {
        self.resolve(prompt_id).await
    }

    pub async fn resolve<D: Document>(&self, id: Option<&str>) -> D {
        let (document, tier) = self.resolve_with_tier(id).await;
        counter!(DOCUMENTS_RESOLVED, "kind" => D::KIND.as_str(), "tier" => tier.as_str())
            .increment(1);
        tracing::debug!(kind = D::KIND.as_str(), tier = tier.as_str(), "Resolved document");
        document
    }

    /// Tries each tier in turn. Never fails: the built-in tier always answers.
    pub async fn resolve_with_tier<D: Document>(&self, id: Option<&str>) -> (D, Tier) {
        let id = id.filter(|id| !id.is_empty()).or(D::DEFAULT_ID);

        if let (Some(store), Some(id)) = (&self.store, id) {
            match store.fetch(&D::LAYOUT, id).await {
                Ok(Some(fields)) => return (D::from_fields(fields), Tier::Store),
                Ok(None) => {
                    tracing::debug!(kind = D::KIND.as_str(), id, "No active record in store");
                }
                Err(e) => {
                    counter!(DOCUMENTS_TIER_FAILED, "kind" => D::KIND.as_str(), "tier" => Tier::Store.as_str())
                        .increment(1);
                    tracing::warn!(
                        kind = D::KIND.as_str(),
                        backend = store.backend(),
                        id,
                        error = %e,
                        "Store lookup failed"
                    );
                }
            }
        }

        let path = self.file_path(D::KIND);
        match file::load::<D>(path).await {
            Ok(document) => return (document, Tier::File),
            Err(e) if e.is_not_found() => {
                tracing::debug!(kind = D::KIND.as_str(), path = %path.display(), "No document file");
            }
            Err(e) => {
                counter!(DOCUMENTS_TIER_FAILED, "kind" => D::KIND.as_str(), "tier" => Tier::File.as_str())
                    .increment(1);
                tracing::warn!(
                    kind = D::KIND.as_str(),
                    path = %path.display(),
                    error = %e,
                    "Failed to load document file"
                );
            }
        }

        (D::builtin(), Tier::Builtin)
    }

    fn file_path(&self, kind: DocumentKind) -> &Path {
        match kind {
            DocumentKind::Context => &self.context_file,
            DocumentKind::ToolsPrompt => &self.tools_prompt_file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentFields, DocumentLayout};
    use crate::store::SqliteStore;
    use crate::store::testutils::create_database;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Store that always fails, recording the ids it was asked for.
    #[derive(Default)]
    struct BrokenStore {
        requested: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl DocumentStore for BrokenStore {
        fn backend(&self) -> &'static str {
            "broken"
        }

        async fn fetch(
            &self,
            layout: &DocumentLayout,
            id: &str,
        ) -> Result<Option<DocumentFields>, StoreError> {
            self.requested
                .lock()
                .unwrap()
                .push((layout.table.to_string(), id.to_string()));
            Err(StoreError::Sqlx(sqlx::Error::PoolTimedOut))
        }
    }

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn test_builtin_when_nothing_configured() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ConfigResolver::new(
            dir.path().join("context_data.json"),
            dir.path().join("tools_prompt.json"),
            None,
        );
        assert!(!resolver.store_configured());

        let (doc, tier) = resolver.resolve_with_tier::<ContextDocument>(Some("r1")).await;
        assert_eq!(tier, Tier::Builtin);
        assert_eq!(doc.context["report_metadata"]["title"], "空间转录组深度分析报告");

        let doc = resolver.tools_prompt(None).await;
        assert_eq!(doc, ToolsPromptDocument::builtin());
    }

    #[tokio::test]
    async fn test_broken_store_and_broken_file_fall_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let context_file = write_file(dir.path(), "context.json", "{\"system\": ");
        let tools_file = write_file(dir.path(), "tools.json", "[]");
        let store = Arc::new(BrokenStore::default());
        let resolver = ConfigResolver::new(
            context_file,
            tools_file,
            Some(store.clone() as Arc<dyn DocumentStore>),
        );

        let (doc, tier) = resolver.resolve_with_tier::<ContextDocument>(Some("r1")).await;
        assert_eq!(tier, Tier::Builtin);
        assert_eq!(doc, ContextDocument::builtin());

        let (doc, tier) = resolver.resolve_with_tier::<ToolsPromptDocument>(None).await;
        assert_eq!(tier, Tier::Builtin);
        assert_eq!(doc, ToolsPromptDocument::builtin());

        // Tools prompt without an id is looked up under the default id
        let requested = store.requested.lock().unwrap().clone();
        assert_eq!(
            requested,
            vec![
                ("report_context".to_string(), "r1".to_string()),
                ("tools_prompt".to_string(), "default_tools_prompt".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_context_without_id_skips_store() {
        let dir = tempfile::tempdir().unwrap();
        let context_file = write_file(
            dir.path(),
            "context.json",
            r#"{"system": "from file", "context": {"k": "v"}, "instructions": "file rules"}"#,
        );
        let store = Arc::new(BrokenStore::default());
        let resolver = ConfigResolver::new(
            context_file,
            dir.path().join("tools.json"),
            Some(store.clone() as Arc<dyn DocumentStore>),
        );

        for id in [None, Some("")] {
            let (doc, tier) = resolver.resolve_with_tier::<ContextDocument>(id).await;
            assert_eq!(tier, Tier::File);
            assert_eq!(doc.system, "from file");
        }
        assert!(store.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_tier_serves_file_object() {
        let dir = tempfile::tempdir().unwrap();
        let context_file = write_file(
            dir.path(),
            "context.json",
            r#"{"system": "s", "context": {"a": 1}, "instructions": "i", "version": "2"}"#,
        );
        let tools_file = write_file(
            dir.path(),
            "tools.json",
            r#"{"report_metadata": {"title": "x"}}"#,
        );
        let resolver = ConfigResolver::new(context_file, tools_file, None);

        let (doc, tier) = resolver.resolve_with_tier::<ContextDocument>(None).await;
        assert_eq!(tier, Tier::File);
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            serde_json::json!({"system": "s", "context": {"a": 1}, "instructions": "i", "version": "2"})
        );

        // An object with none of the document's keys is a broken file
        let (doc, tier) = resolver.resolve_with_tier::<ToolsPromptDocument>(None).await;
        assert_eq!(tier, Tier::Builtin);
        assert_eq!(doc, ToolsPromptDocument::builtin());
    }

    #[tokio::test]
    async fn test_store_tier_with_field_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("report_context.db");
        create_database(
            &db,
            &[
                r#"INSERT INTO report_context (report_id, system_prompt, context_data, instructions)
                   VALUES ('LUAD_2025_001', 'db system', '{"report_metadata": {"title": "db title"}}', NULL)"#,
                r#"INSERT INTO report_context (report_id, system_prompt, context_data, instructions, is_active)
                   VALUES ('retired', 'old', '{}', 'old', 0)"#,
            ],
        )
        .await;
        let context_file = write_file(
            dir.path(),
            "context.json",
            r#"{"system": "from file", "context": {}, "instructions": "file rules"}"#,
        );
        let resolver = ConfigResolver::new(
            context_file,
            dir.path().join("tools.json"),
            Some(Arc::new(SqliteStore::open(&db))),
        );

        let (doc, tier) = resolver
            .resolve_with_tier::<ContextDocument>(Some("LUAD_2025_001"))
            .await;
        assert_eq!(tier, Tier::Store);
        assert_eq!(doc.system, "db system");
        assert_eq!(doc.context["report_metadata"]["title"], "db title");
        assert_eq!(doc.instructions, ContextDocument::builtin().instructions);

        // Inactive records fall through to the file
        let (doc, tier) = resolver
            .resolve_with_tier::<ContextDocument>(Some("retired"))
            .await;
        assert_eq!(tier, Tier::File);
        assert_eq!(doc.system, "from file");

        // No tools_prompt row and no tools file
        let (_, tier) = resolver.resolve_with_tier::<ToolsPromptDocument>(None).await;
        assert_eq!(tier, Tier::Builtin);
    }

    #[tokio::test]
    async fn test_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = DocumentsConfig {
            context_file: dir.path().join("context.json"),
            tools_prompt_file: dir.path().join("tools.json"),
            store: Some(crate::config::StoreConfig::Sqlite {
                path: dir.path().join("missing.db"),
            }),
        };
        let resolver = ConfigResolver::from_config(&config).unwrap();
        assert!(resolver.store_configured());

        // Missing database falls through without surfacing an error
        let (_, tier) = resolver.resolve_with_tier::<ContextDocument>(Some("r1")).await;
        assert_eq!(tier, Tier::Builtin);
    }
}

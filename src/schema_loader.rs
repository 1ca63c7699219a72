use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use crate::cache::ParsedSchemaCache;
use crate::error::LibXml2Error;
use crate::libxml2::{LibXml2Wrapper, XmlSchemaPtr};

/// Cached regex for the `version` attribute of the BMECAT root element
static ROOT_VERSION_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_root_version_regex() -> &'static Regex {
    ROOT_VERSION_REGEX.get_or_init(|| {
        Regex::new(r#"(?is)<(?:[A-Za-z_][\w.\-]*:)?BMECAT\b[^>]*?\bversion\s*=\s*["']([^"']+)["']"#)
            .expect("Failed to compile BMECAT version regex")
    })
}

/// Cached regex for the BMECAT root start tag, with or without a prefix
static ROOT_ELEMENT_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_root_element_regex() -> &'static Regex {
    ROOT_ELEMENT_REGEX.get_or_init(|| {
        Regex::new(r#"(?is)<(?:([A-Za-z_][\w.\-]*):)?BMECAT\b([^>]*)>"#)
            .expect("Failed to compile BMECAT root element regex")
    })
}

/// Cached regex for `xmlns` and `xmlns:prefix` attributes inside a start tag
static NAMESPACE_ATTRIBUTE_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_namespace_attribute_regex() -> &'static Regex {
    NAMESPACE_ATTRIBUTE_REGEX.get_or_init(|| {
        Regex::new(
            r#"(?:^|\s)(xmlns(?::[A-Za-z_][\w.\-]*)?)\s*=\s*(?:"([^"]*)"|'([^']*)')"#,
        )
        .expect("Failed to compile namespace attribute regex")
    })
}

/// Namespace of the 2005 family of BMEcat schemas
pub const BMECAT_2005_NAMESPACE: &str = "http://www.bmecat.org/bmecat/2005";

/// BMEcat versions with a bundled schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BmecatVersion {
    V1_2,
    V2005,
    V2005_1,
    V2005_2,
}

impl BmecatVersion {
    pub const ALL: [BmecatVersion; 4] = [
        BmecatVersion::V1_2,
        BmecatVersion::V2005,
        BmecatVersion::V2005_1,
        BmecatVersion::V2005_2,
    ];

    /// Assumed when a document states no version at all
    pub const NEWEST: BmecatVersion = BmecatVersion::V2005_2;

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "1.2" => Some(BmecatVersion::V1_2),
            "2005" => Some(BmecatVersion::V2005),
            "2005.1" => Some(BmecatVersion::V2005_1),
            "2005.2" => Some(BmecatVersion::V2005_2),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BmecatVersion::V1_2 => "1.2",
            BmecatVersion::V2005 => "2005",
            BmecatVersion::V2005_1 => "2005.1",
            BmecatVersion::V2005_2 => "2005.2",
        }
    }

    /// Comma separated list for diagnostics
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(BmecatVersion::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for BmecatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which compiled schema a document is checked against.
///
/// 2005 documents may place their elements in [`BMECAT_2005_NAMESPACE`];
/// those need a schema with that target namespace. BMEcat 1.2 has no
/// namespaced form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaKey {
    version: BmecatVersion,
    namespaced: bool,
}

impl SchemaKey {
    pub fn plain(version: BmecatVersion) -> Self {
        Self {
            version,
            namespaced: false,
        }
    }

    pub fn namespaced(version: BmecatVersion) -> Option<Self> {
        match version {
            BmecatVersion::V1_2 => None,
            _ => Some(Self {
                version,
                namespaced: true,
            }),
        }
    }

    /// Key for a document of `version` whose root sits in `namespace`.
    /// `None` when no bundled schema can describe that combination.
    pub fn for_namespace(version: BmecatVersion, namespace: Option<&str>) -> Option<Self> {
        match namespace {
            None => Some(Self::plain(version)),
            Some(ns) if ns == BMECAT_2005_NAMESPACE => Self::namespaced(version),
            Some(_) => None,
        }
    }

    pub fn version(&self) -> BmecatVersion {
        self.version
    }

    pub fn is_namespaced(&self) -> bool {
        self.namespaced
    }

    pub fn schema_file_name(&self) -> &'static str {
        match (self.version, self.namespaced) {
            (BmecatVersion::V1_2, _) => "bmecat-1-2.xsd",
            (BmecatVersion::V2005, false) => "bmecat-2005.xsd",
            (BmecatVersion::V2005_1, false) => "bmecat-2005-1.xsd",
            (BmecatVersion::V2005_2, false) => "bmecat-2005-2.xsd",
            (BmecatVersion::V2005, true) => "bmecat-2005-ns.xsd",
            (BmecatVersion::V2005_1, true) => "bmecat-2005-1-ns.xsd",
            (BmecatVersion::V2005_2, true) => "bmecat-2005-2-ns.xsd",
        }
    }
}

impl From<BmecatVersion> for SchemaKey {
    fn from(version: BmecatVersion) -> Self {
        Self::plain(version)
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespaced {
            write!(f, "{} (namespaced)", self.version)
        } else {
            write!(f, "{}", self.version)
        }
    }
}

/// How a version string was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    RootAttribute,
    NamespaceDeclaration,
    Default,
}

/// Version string as stated or inferred, not yet checked against the supported set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredVersion {
    pub raw: String,
    pub source: VersionSource,
}

/// Work out which BMEcat version a document claims to be.
///
/// Order: root `version` attribute, then a `xmlns:bmecat` declaration (2005),
/// then the newest supported version.
pub fn detect_version(content: &str) -> DeclaredVersion {
    if let Some(caps) = get_root_version_regex().captures(content) {
        return DeclaredVersion {
            raw: caps[1].trim().to_string(),
            source: VersionSource::RootAttribute,
        };
    }

    if content.to_ascii_lowercase().contains("xmlns:bmecat") {
        return DeclaredVersion {
            raw: BmecatVersion::V2005.as_str().to_string(),
            source: VersionSource::NamespaceDeclaration,
        };
    }

    DeclaredVersion {
        raw: BmecatVersion::NEWEST.as_str().to_string(),
        source: VersionSource::Default,
    }
}

/// Namespace the BMECAT root element lives in, if any.
///
/// For `<BMECAT xmlns="...">` that is the default namespace; for
/// `<p:BMECAT xmlns:p="...">` it is the namespace bound to `p`. Only
/// declarations on the root start tag are considered.
pub fn declared_namespace(content: &str) -> Option<String> {
    let caps = get_root_element_regex().captures(content)?;
    let wanted = match caps.get(1) {
        Some(prefix) => format!("xmlns:{}", prefix.as_str()),
        None => "xmlns".to_string(),
    };
    let attributes = caps.get(2).map_or("", |m| m.as_str());

    get_namespace_attribute_regex()
        .captures_iter(attributes)
        .find(|attr| &attr[1] == wanted.as_str())
        .and_then(|attr| attr.get(2).or_else(|| attr.get(3)))
        .map(|value| value.as_str().trim().to_string())
        .filter(|ns| !ns.is_empty())
}

/// Provider of raw XSD bytes. A miss is `None`, never an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn load(&self, key: SchemaKey) -> Option<Vec<u8>>;
}

/// Schemas compiled into the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedSchemas;

impl EmbeddedSchemas {
    fn contents(key: SchemaKey) -> &'static str {
        match (key.version(), key.is_namespaced()) {
            (BmecatVersion::V1_2, _) => include_str!("../schemas/bmecat-1-2.xsd"),
            (BmecatVersion::V2005, false) => include_str!("../schemas/bmecat-2005.xsd"),
            (BmecatVersion::V2005_1, false) => include_str!("../schemas/bmecat-2005-1.xsd"),
            (BmecatVersion::V2005_2, false) => include_str!("../schemas/bmecat-2005-2.xsd"),
            (BmecatVersion::V2005, true) => include_str!("../schemas/bmecat-2005-ns.xsd"),
            (BmecatVersion::V2005_1, true) => include_str!("../schemas/bmecat-2005-1-ns.xsd"),
            (BmecatVersion::V2005_2, true) => include_str!("../schemas/bmecat-2005-2-ns.xsd"),
        }
    }
}

#[async_trait]
impl SchemaSource for EmbeddedSchemas {
    async fn load(&self, key: SchemaKey) -> Option<Vec<u8>> {
        Some(Self::contents(key).as_bytes().to_vec())
    }
}

/// Schemas read from `<dir>/<schema file name>`
#[derive(Debug, Clone)]
pub struct FilesystemSchemas {
    dir: PathBuf,
}

impl FilesystemSchemas {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl SchemaSource for FilesystemSchemas {
    async fn load(&self, key: SchemaKey) -> Option<Vec<u8>> {
        let path = self.dir.join(key.schema_file_name());
        match tokio::fs::read(&path).await {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "schema file not readable");
                None
            }
        }
    }
}

/// Tries each source in order and returns the first hit
#[derive(Clone, Default)]
pub struct ChainedSchemaSource {
    sources: Vec<Arc<dyn SchemaSource>>,
}

impl ChainedSchemaSource {
    pub fn new(sources: Vec<Arc<dyn SchemaSource>>) -> Self {
        Self { sources }
    }

    /// Embedded schemas first, then the optional directory
    pub fn embedded_then_filesystem(dir: Option<PathBuf>) -> Self {
        let mut sources: Vec<Arc<dyn SchemaSource>> = vec![Arc::new(EmbeddedSchemas)];
        if let Some(dir) = dir {
            sources.push(Arc::new(FilesystemSchemas::new(dir)));
        }
        Self { sources }
    }
}

#[async_trait]
impl SchemaSource for ChainedSchemaSource {
    async fn load(&self, key: SchemaKey) -> Option<Vec<u8>> {
        for source in &self.sources {
            if let Some(data) = source.load(key).await {
                return Some(data);
            }
        }
        None
    }
}

/// Why a compiled schema could not be produced
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaLoadError {
    #[error("No XSD schema available for BMEcat version {0}")]
    Unavailable(SchemaKey),

    #[error("XSD schema for BMEcat version {key} could not be compiled: {source}")]
    Compile { key: SchemaKey, source: LibXml2Error },

    #[error("Schema compilation task failed: {0}")]
    Task(String),
}

/// Loads raw schemas from a [`SchemaSource`] and keeps compiled copies
pub struct SchemaLoader {
    source: Arc<dyn SchemaSource>,
    cache: ParsedSchemaCache,
}

impl SchemaLoader {
    pub fn new(source: Arc<dyn SchemaSource>, cache_capacity: u64) -> Self {
        Self {
            source,
            cache: ParsedSchemaCache::new(cache_capacity),
        }
    }

    /// Compiled schema for `key`. Concurrent first requests share one
    /// compilation; failures are not remembered.
    pub async fn load_schema(&self, key: SchemaKey) -> Result<Arc<XmlSchemaPtr>, SchemaLoadError> {
        let source = Arc::clone(&self.source);
        self.cache
            .get_or_load(key, move || async move {
                let data = source
                    .load(key)
                    .await
                    .ok_or(SchemaLoadError::Unavailable(key))?;

                tracing::debug!(schema = %key, bytes = data.len(), "compiling BMEcat schema");

                let schema = tokio::task::spawn_blocking(move || {
                    LibXml2Wrapper::new().parse_schema_from_memory(&data)
                })
                .await
                .map_err(|e| SchemaLoadError::Task(e.to_string()))?
                .map_err(|source| SchemaLoadError::Compile { key, source })?;

                Ok::<_, SchemaLoadError>(Arc::new(schema))
            })
            .await
    }

    pub fn cache(&self) -> &ParsedSchemaCache {
        &self.cache
    }
}

use std::sync::Arc;

use moka::future::Cache;

use crate::libxml2::XmlSchemaPtr;
use crate::schema_loader::SchemaKey;

/// In-memory cache of compiled libxml2 schemas, one entry per [`SchemaKey`]
///
/// `moka` gives "thundering herd" protection: when several imports ask for the
/// same missing schema at once, only one of them compiles it and the others
/// wait for that result.
pub struct ParsedSchemaCache {
    cache: Cache<SchemaKey, Arc<XmlSchemaPtr>>,
}

impl ParsedSchemaCache {
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(max_capacity).build();

        Self { cache }
    }

    /// Get a compiled schema from the cache, or load it if missing.
    ///
    /// The `loader` future is only awaited if the key is missing. An `Err` is
    /// handed to every waiter and nothing is stored, so the next call retries.
    pub async fn get_or_load<F, Fut, E>(
        &self,
        key: SchemaKey,
        loader: F,
    ) -> Result<Arc<XmlSchemaPtr>, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Arc<XmlSchemaPtr>, E>>,
        E: Send + Sync + Clone + 'static,
    {
        self.cache
            .try_get_with(key, loader())
            .await
            .map_err(|e| (*e).clone())
    }

    pub async fn get(&self, key: SchemaKey) -> Option<Arc<XmlSchemaPtr>> {
        self.cache.get(&key).await
    }

    pub async fn invalidate(&self, key: SchemaKey) {
        self.cache.invalidate(&key).await;
    }

    /// Approximate entry count; moka applies pending writes lazily
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libxml2::LibXml2Wrapper;
    use crate::schema_loader::BmecatVersion;

    const SIMPLE_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="BMECAT" type="xs:string"/>
</xs:schema>"#;

    fn compile() -> Result<Arc<XmlSchemaPtr>, String> {
        LibXml2Wrapper::new()
            .parse_schema_from_memory(SIMPLE_XSD.as_bytes())
            .map(Arc::new)
            .map_err(|e| e.to_string())
    }

    #[tokio::test]
    async fn test_get_or_load_stores_result() {
        let cache = ParsedSchemaCache::new(4);
        assert!(cache.get(BmecatVersion::V1_2.into()).await.is_none());

        let first = cache
            .get_or_load(BmecatVersion::V1_2.into(), || async { compile() })
            .await
            .unwrap();

        let cached = cache.get(BmecatVersion::V1_2.into()).await.unwrap();
        assert_eq!(first.as_ptr(), cached.as_ptr());
    }

    #[tokio::test]
    async fn test_second_load_reuses_entry() {
        let cache = ParsedSchemaCache::new(4);

        let first = cache
            .get_or_load(BmecatVersion::V2005.into(), || async { compile() })
            .await
            .unwrap();
        let second = cache
            .get_or_load(BmecatVersion::V2005.into(), || async {
                Err::<Arc<XmlSchemaPtr>, String>("loader must not run".to_string())
            })
            .await
            .unwrap();

        assert_eq!(first.as_ptr(), second.as_ptr());
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = ParsedSchemaCache::new(4);

        let failed = cache
            .get_or_load(BmecatVersion::V2005_1.into(), || async {
                Err::<Arc<XmlSchemaPtr>, String>("boom".to_string())
            })
            .await;
        assert_eq!(failed.unwrap_err(), "boom");
        assert!(cache.get(BmecatVersion::V2005_1.into()).await.is_none());

        let recovered = cache
            .get_or_load(BmecatVersion::V2005_1.into(), || async { compile() })
            .await;
        assert!(recovered.is_ok());
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = ParsedSchemaCache::new(4);
        cache
            .get_or_load(BmecatVersion::V2005_2.into(), || async { compile() })
            .await
            .unwrap();

        cache.invalidate(BmecatVersion::V2005_2.into()).await;
        assert!(cache.get(BmecatVersion::V2005_2.into()).await.is_none());
    }

    #[tokio::test]
    async fn test_namespaced_key_is_a_separate_entry() {
        let cache = ParsedSchemaCache::new(4);
        let plain = SchemaKey::plain(BmecatVersion::V2005);
        let namespaced = SchemaKey::namespaced(BmecatVersion::V2005).unwrap();

        cache.get_or_load(plain, || async { compile() }).await.unwrap();
        assert!(cache.get(plain).await.is_some());
        assert!(cache.get(namespaced).await.is_none());
    }
}

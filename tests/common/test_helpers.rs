use std::path::PathBuf;

use catalog_import::logging;
use catalog_import::model::ImportMetadata;

/// Test fixture paths
pub struct TestFixtures {
    pub fixtures_dir: PathBuf,
}

impl TestFixtures {
    pub fn new() -> Self {
        logging::init_test();
        let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures");

        Self { fixtures_dir }
    }

    pub fn bmecat_dir(&self) -> PathBuf {
        self.fixtures_dir.join("bmecat")
    }

    pub fn datanorm_dir(&self) -> PathBuf {
        self.fixtures_dir.join("datanorm")
    }

    pub fn configs_dir(&self) -> PathBuf {
        self.fixtures_dir.join("configs")
    }

    pub fn bmecat(&self, name: &str) -> PathBuf {
        self.bmecat_dir().join(name)
    }

    pub fn datanorm(&self, name: &str) -> PathBuf {
        self.datanorm_dir().join(name)
    }

    pub fn strict_config(&self) -> PathBuf {
        self.configs_dir().join("strict.toml")
    }

    pub fn bundled_schemas_dir(&self) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("schemas")
    }
}

/// Fixture contents as text
pub async fn read_fixture(path: PathBuf) -> String {
    tokio::fs::read_to_string(&path)
        .await
        .unwrap_or_else(|e| panic!("fixture {} not readable: {}", path.display(), e))
}

pub fn metadata() -> ImportMetadata {
    ImportMetadata::new("tenant-test")
}

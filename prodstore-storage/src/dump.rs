//! JSON dump file holding the product collection.

use crate::error::StorageError;
use prodstore_protocol::Product;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Reads and writes the collection dump file.
#[derive(Debug, Clone)]
pub struct DumpManager {
    path: PathBuf,
}

impl DumpManager {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the collection. A missing file is an empty collection.
    pub fn load(&self) -> Result<Vec<Product>, StorageError> {
        if !self.path.exists() {
            tracing::info!(
                "Dump file {} not found, starting with an empty collection",
                self.path.display()
            );
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let products: Vec<Product> = serde_json::from_reader(BufReader::new(file))?;
        tracing::info!(
            "Loaded {} product(s) from {}",
            products.len(),
            self.path.display()
        );
        Ok(products)
    }

    /// Writes the collection, replacing the dump file atomically.
    pub fn save(&self, products: &[Product]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.temp_path();
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, products)?;
            writer.write_all(b"\n")?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        tracing::debug!(
            "Saved {} product(s) to {}",
            products.len(),
            self.path.display()
        );
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use prodstore_protocol::{Coordinates, NewProduct};
    use tempfile::tempdir;

    fn product(id: u64) -> Product {
        NewProduct {
            name: format!("Item {id}"),
            coordinates: Coordinates { x: 0.5, y: 2 },
            price: 10.0 * id as f64,
            part_number: format!("P-{id}"),
            manufacture_cost: None,
            unit_of_measure: None,
        }
        .into_product(id, Utc::now())
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let dump = DumpManager::new(dir.path().join("products.json"));
        assert!(dump.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let dump = DumpManager::new(dir.path().join("data").join("products.json"));
        let products = vec![product(1), product(2)];

        dump.save(&products).unwrap();
        assert_eq!(dump.load().unwrap(), products);
        assert!(!dump.temp_path().exists());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("products.json");
        fs::write(&path, "{not json").unwrap();

        let dump = DumpManager::new(&path);
        assert!(matches!(dump.load(), Err(StorageError::Json(_))));
    }
}

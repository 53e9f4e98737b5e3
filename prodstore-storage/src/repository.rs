//! In-memory product collection backed by a dump file.

use crate::dump::DumpManager;
use crate::error::StorageError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use prodstore_protocol::{NewProduct, Product};
use std::collections::HashSet;

/// Type name reported by INFO.
pub const COLLECTION_TYPE: &str = "Vec<Product>";

/// The product collection.
///
/// All operations take `&self`; a single lock guards the products so
/// check-then-insert operations such as [`add_if_max`](Self::add_if_max)
/// are atomic.
pub struct ProductRepository {
    products: RwLock<Vec<Product>>,
    init_date: DateTime<Utc>,
    dump: DumpManager,
}

impl ProductRepository {
    /// Loads the collection from the dump file.
    pub fn open(dump: DumpManager) -> Result<Self, StorageError> {
        let products = dump.load()?;
        Ok(Self {
            products: RwLock::new(products),
            init_date: Utc::now(),
            dump,
        })
    }

    /// Creates an empty collection that saves to `dump`.
    pub fn empty(dump: DumpManager) -> Self {
        Self {
            products: RwLock::new(Vec::new()),
            init_date: Utc::now(),
            dump,
        }
    }

    /// Checks every product and that ids are unique.
    pub fn validate_all(&self) -> Result<(), StorageError> {
        let products = self.products.read();
        let mut seen = HashSet::with_capacity(products.len());
        for product in products.iter() {
            product
                .validate()
                .map_err(|e| StorageError::Invalid(format!("product #{}: {}", product.id, e.0)))?;
            if !seen.insert(product.id) {
                return Err(StorageError::Invalid(format!(
                    "duplicate product id {}",
                    product.id
                )));
            }
        }
        Ok(())
    }

    /// Writes the collection to the dump file.
    pub fn save(&self) -> Result<(), StorageError> {
        let snapshot = self.products.read().clone();
        self.dump.save(&snapshot)
    }

    pub fn init_date(&self) -> DateTime<Utc> {
        self.init_date
    }

    pub fn collection_type(&self) -> &'static str {
        COLLECTION_TYPE
    }

    pub fn len(&self) -> usize {
        self.products.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.read().is_empty()
    }

    /// Returns all products in natural order.
    pub fn all_sorted(&self) -> Vec<Product> {
        let mut products = self.products.read().clone();
        products.sort_by(Product::compare);
        products
    }

    pub fn get(&self, id: u64) -> Option<Product> {
        self.products.read().iter().find(|p| p.id == id).cloned()
    }

    /// Adds a product, assigning the next id and the creation date.
    pub fn add(&self, draft: NewProduct) -> Result<Product, StorageError> {
        draft.validate()?;
        let mut products = self.products.write();
        Ok(Self::insert(&mut products, draft))
    }

    fn insert(products: &mut Vec<Product>, draft: NewProduct) -> Product {
        let id = products.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let product = draft.into_product(id, Utc::now());
        products.push(product.clone());
        tracing::debug!("Added product #{}", id);
        product
    }

    /// Replaces the fields of product `id`, keeping its id and creation date.
    pub fn update(&self, id: u64, draft: NewProduct) -> Result<Product, StorageError> {
        draft.validate()?;
        let mut products = self.products.write();
        let slot = products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StorageError::NotFound(id))?;
        *slot = draft.into_product(id, slot.creation_date);
        Ok(slot.clone())
    }

    pub fn remove(&self, id: u64) -> Result<Product, StorageError> {
        let mut products = self.products.write();
        let pos = products
            .iter()
            .position(|p| p.id == id)
            .ok_or(StorageError::NotFound(id))?;
        Ok(products.remove(pos))
    }

    /// Removes every product and returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut products = self.products.write();
        let removed = products.len();
        products.clear();
        removed
    }

    /// Returns the first product in natural order.
    pub fn first(&self) -> Option<Product> {
        self.min()
    }

    pub fn max(&self) -> Option<Product> {
        self.products.read().iter().max_by(|a, b| a.compare(b)).cloned()
    }

    pub fn min(&self) -> Option<Product> {
        self.products.read().iter().min_by(|a, b| a.compare(b)).cloned()
    }

    /// Adds `draft` only if its price is greater than every stored price.
    ///
    /// Returns `None` when the condition does not hold.
    pub fn add_if_max(&self, draft: NewProduct) -> Result<Option<Product>, StorageError> {
        self.add_if(draft, |price, current| price > current)
    }

    /// Adds `draft` only if its price is less than every stored price.
    pub fn add_if_min(&self, draft: NewProduct) -> Result<Option<Product>, StorageError> {
        self.add_if(draft, |price, current| price < current)
    }

    fn add_if(
        &self,
        draft: NewProduct,
        beats: impl Fn(f64, f64) -> bool,
    ) -> Result<Option<Product>, StorageError> {
        draft.validate()?;
        let mut products = self.products.write();
        if products.iter().all(|p| beats(draft.price, p.price)) {
            Ok(Some(Self::insert(&mut products, draft)))
        } else {
            Ok(None)
        }
    }

    pub fn sum_of_price(&self) -> f64 {
        self.products.read().iter().map(|p| p.price).sum()
    }

    /// Returns products whose price equals `price`, in natural order.
    pub fn filter_by_price(&self, price: f64) -> Vec<Product> {
        self.filter(|p| p.price == price)
    }

    /// Returns products whose part number contains `part`, in natural order.
    pub fn filter_contains_part_number(&self, part: &str) -> Vec<Product> {
        self.filter(|p| p.part_number.contains(part))
    }

    fn filter(&self, keep: impl Fn(&Product) -> bool) -> Vec<Product> {
        let mut products: Vec<Product> = self
            .products
            .read()
            .iter()
            .filter(|p| keep(p))
            .cloned()
            .collect();
        products.sort_by(Product::compare);
        products
    }
}

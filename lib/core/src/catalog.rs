use crate::{Error, Result};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: u64,
    pub product_name: String,
    pub aisle_id: u64,
    pub department_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aisle {
    pub aisle_id: u64,
    pub aisle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub department_id: u64,
    pub department: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogLevel {
    Product,
    Aisle,
    Department,
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    name: String,
    aisle: String,
    department: String,
}

/// Read-only product → aisle → department lookup, keyed by product token.
/// Only used to label points during evaluation.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: AHashMap<String, CatalogEntry>,
}

impl Catalog {
    /// Join the three tables. A product pointing at an unknown aisle or
    /// department is rejected.
    pub fn new(products: &[Product], aisles: &[Aisle], departments: &[Department]) -> Result<Self> {
        let aisle_names: AHashMap<u64, &str> = aisles
            .iter()
            .map(|a| (a.aisle_id, a.aisle.as_str()))
            .collect();
        let department_names: AHashMap<u64, &str> = departments
            .iter()
            .map(|d| (d.department_id, d.department.as_str()))
            .collect();

        let mut entries = AHashMap::with_capacity(products.len());
        for (index, product) in products.iter().enumerate() {
            let aisle = aisle_names.get(&product.aisle_id).ok_or_else(|| {
                Error::invalid_record(index, format!("unknown aisle {}", product.aisle_id))
            })?;
            let department = department_names.get(&product.department_id).ok_or_else(|| {
                Error::invalid_record(
                    index,
                    format!("unknown department {}", product.department_id),
                )
            })?;
            entries.insert(
                product.product_id.to_string(),
                CatalogEntry {
                    name: product.product_name.clone(),
                    aisle: aisle.to_string(),
                    department: department.to_string(),
                },
            );
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn label(&self, entity_id: &str, level: CatalogLevel) -> Option<&str> {
        self.entries.get(entity_id).map(|e| match level {
            CatalogLevel::Product => e.name.as_str(),
            CatalogLevel::Aisle => e.aisle.as_str(),
            CatalogLevel::Department => e.department.as_str(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        let products = vec![Product {
            product_id: 24852,
            product_name: "Banana".to_string(),
            aisle_id: 24,
            department_id: 4,
        }];
        let aisles = vec![Aisle {
            aisle_id: 24,
            aisle: "fresh fruits".to_string(),
        }];
        let departments = vec![Department {
            department_id: 4,
            department: "produce".to_string(),
        }];
        Catalog::new(&products, &aisles, &departments).unwrap()
    }

    #[test]
    fn test_labels_per_level() {
        let c = catalog();
        assert_eq!(c.label("24852", CatalogLevel::Product), Some("Banana"));
        assert_eq!(c.label("24852", CatalogLevel::Aisle), Some("fresh fruits"));
        assert_eq!(c.label("24852", CatalogLevel::Department), Some("produce"));
        assert_eq!(c.label("1", CatalogLevel::Department), None);
    }

    #[test]
    fn test_unknown_aisle_rejected() {
        let products = vec![Product {
            product_id: 1,
            product_name: "x".to_string(),
            aisle_id: 999,
            department_id: 1,
        }];
        let err = Catalog::new(&products, &[], &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord { index: 0, .. }));
    }
}

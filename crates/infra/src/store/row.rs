//! Encoding of quantity rows.

use printfloor_inventory::QuantityRow;

use super::r#trait::{Row, StoreError};

pub fn quantity_row(quantity: u64) -> Result<Row, StoreError> {
    Ok(serde_json::to_value(QuantityRow::new(quantity))?)
}

pub fn read_quantity(row: &Row) -> Result<u64, StoreError> {
    let decoded: QuantityRow = serde_json::from_value(row.clone())?;
    Ok(decoded.quantity)
}

/// Quantity of an optional row; absent rows count as zero.
pub fn quantity_or_zero(row: Option<&Row>) -> Result<u64, StoreError> {
    row.map(read_quantity).transpose().map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_rows_read_as_zero() {
        assert_eq!(quantity_or_zero(None).unwrap(), 0);
        let row = quantity_row(7).unwrap();
        assert_eq!(row, serde_json::json!({"quantity": 7}));
        assert_eq!(quantity_or_zero(Some(&row)).unwrap(), 7);
    }

    #[test]
    fn negative_stored_quantity_is_malformed() {
        let row = serde_json::json!({"quantity": -3});
        assert!(matches!(read_quantity(&row), Err(StoreError::Encoding(_))));
    }
}

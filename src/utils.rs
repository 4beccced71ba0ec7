use std::str::FromStr;

use rust_decimal::Decimal;

use crate::errors::{RentalError, Result};

/// Decimals are stored as TEXT; anything that does not parse back is a
/// storage fault, not a caller error.
pub fn parse_decimal(column: &str, stored: &str) -> Result<Decimal> {
    Decimal::from_str(stored).map_err(|e| {
        log::error!("Column {} holds a bad decimal {:?}: {}", column, stored, e);
        RentalError::ServiceFailure(format!("bad decimal value in {column}: {stored}"))
    })
}

pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RentalError::invalid(format!("{field} is empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_decimals_parse() {
        assert_eq!(parse_decimal("price", "450.00").unwrap(), Decimal::new(450, 0));
        assert!(matches!(
            parse_decimal("price", "lots"),
            Err(RentalError::ServiceFailure(_))
        ));
    }

    #[test]
    fn blank_strings_are_rejected() {
        assert!(require_non_empty("name", "").is_err());
        assert!(require_non_empty("name", "   ").is_err());
        assert!(require_non_empty("name", "Michal").is_ok());
    }
}

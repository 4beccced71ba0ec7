use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    errors::{RentalError, Result},
    utils::{parse_decimal, require_non_empty},
};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Car {
    pub id: Option<i64>,
    pub license_plate: String,
    pub model: String,
    pub price: Decimal,
    pub number_of_km: Decimal,
    /// Derived from the leases table; true while the car has an open lease.
    #[serde(default)]
    pub is_borrowed: bool,
}

impl Car {
    pub fn new(
        license_plate: impl Into<String>,
        model: impl Into<String>,
        price: Decimal,
        number_of_km: Decimal,
    ) -> Self {
        Self {
            id: None,
            license_plate: license_plate.into(),
            model: model.into(),
            price,
            number_of_km,
            is_borrowed: false,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        require_non_empty("car license plate", &self.license_plate)?;
        require_non_empty("car model", &self.model)?;
        if self.price <= Decimal::ZERO {
            return Err(RentalError::invalid("car price must be positive"));
        }
        if self.number_of_km < Decimal::ZERO {
            return Err(RentalError::invalid("car number of kilometers is negative"));
        }
        Ok(())
    }

    pub(crate) fn stored_id(&self) -> Result<i64> {
        stored_id("car", self.id)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: Option<i64>,
    pub name: String,
    pub address: String,
    pub phone_number: String,
}

impl Customer {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            address: address.into(),
            phone_number: phone_number.into(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        require_non_empty("customer name", &self.name)?;
        require_non_empty("customer address", &self.address)?;
        require_non_empty("customer phone number", &self.phone_number)
    }

    pub(crate) fn stored_id(&self) -> Result<i64> {
        stored_id("customer", self.id)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Lease {
    pub id: Option<i64>,
    pub customer: Customer,
    pub car: Car,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub price: Decimal,
    /// The day the car actually came back. `None` while the lease is open.
    pub real_end_date: Option<NaiveDate>,
}

impl Lease {
    pub fn new(
        customer: Customer,
        car: Car,
        date_from: NaiveDate,
        date_to: NaiveDate,
        price: Decimal,
    ) -> Self {
        Self {
            id: None,
            customer,
            car,
            date_from,
            date_to,
            price,
            real_end_date: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.real_end_date.is_none()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self.customer.id {
            None => return Err(RentalError::invalid("lease customer id is not set")),
            Some(id) if id <= 0 => {
                return Err(RentalError::invalid("lease customer id is not positive"))
            }
            Some(_) => {}
        }
        match self.car.id {
            None => return Err(RentalError::invalid("lease car id is not set")),
            Some(id) if id <= 0 => return Err(RentalError::invalid("lease car id is not positive")),
            Some(_) => {}
        }
        if self.price < Decimal::ZERO {
            return Err(RentalError::invalid("lease price is negative"));
        }
        if self.price.normalize().scale() > 2 {
            return Err(RentalError::invalid(format!(
                "lease price {} has more than two decimal places",
                self.price
            )));
        }
        if self.date_to < self.date_from {
            return Err(RentalError::invalid("date to should not be before date from"));
        }
        if let Some(real_end) = self.real_end_date {
            if real_end < self.date_from {
                return Err(RentalError::invalid(
                    "real end date should not be before date from",
                ));
            }
        }
        Ok(())
    }

    /// Price as written to the database: always two decimal places.
    pub(crate) fn stored_price(&self) -> String {
        let mut price = self.price;
        price.rescale(2);
        price.to_string()
    }

    pub(crate) fn stored_id(&self) -> Result<i64> {
        stored_id("lease", self.id)
    }
}

fn stored_id(entity: &str, id: Option<i64>) -> Result<i64> {
    id.ok_or_else(|| RentalError::invalid(format!("{entity} id is not set")))
}

#[derive(Debug, FromRow)]
pub(crate) struct CarRow {
    pub id: i64,
    pub license_plate: String,
    pub model: String,
    pub price: String,
    pub number_of_km: String,
    pub is_borrowed: i64,
}

impl TryFrom<CarRow> for Car {
    type Error = RentalError;

    fn try_from(row: CarRow) -> Result<Self> {
        Ok(Car {
            id: Some(row.id),
            license_plate: row.license_plate,
            model: row.model,
            price: parse_decimal("cars.price", &row.price)?,
            number_of_km: parse_decimal("cars.number_of_km", &row.number_of_km)?,
            is_borrowed: row.is_borrowed != 0,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct CustomerRow {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub phone_number: String,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: Some(row.id),
            name: row.name,
            address: row.address,
            phone_number: row.phone_number,
        }
    }
}

/// One lease joined with its customer and car.
#[derive(Debug, FromRow)]
pub(crate) struct LeaseRow {
    pub id: i64,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub real_end_date: Option<NaiveDate>,
    pub price: String,
    pub customer_id: i64,
    pub customer_name: String,
    pub customer_address: String,
    pub customer_phone_number: String,
    pub car_id: i64,
    pub car_license_plate: String,
    pub car_model: String,
    pub car_price: String,
    pub car_number_of_km: String,
    pub car_is_borrowed: i64,
}

impl TryFrom<LeaseRow> for Lease {
    type Error = RentalError;

    fn try_from(row: LeaseRow) -> Result<Self> {
        let car = Car::try_from(CarRow {
            id: row.car_id,
            license_plate: row.car_license_plate,
            model: row.car_model,
            price: row.car_price,
            number_of_km: row.car_number_of_km,
            is_borrowed: row.car_is_borrowed,
        })?;
        let customer = Customer::from(CustomerRow {
            id: row.customer_id,
            name: row.customer_name,
            address: row.customer_address,
            phone_number: row.customer_phone_number,
        });
        Ok(Lease {
            id: Some(row.id),
            customer,
            car,
            date_from: row.date_from,
            date_to: row.date_to,
            price: parse_decimal("leases.price", &row.price)?,
            real_end_date: row.real_end_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn stored_lease() -> Lease {
        let mut customer = Customer::new("Michal Vitek", "Vajanskeho 47", "+420746654738");
        customer.id = Some(1);
        let mut car = Car::new("1A1 2547", "Audi A3", Decimal::new(450, 0), Decimal::new(23000, 0));
        car.id = Some(1);
        Lease::new(customer, car, date(2017, 3, 25), date(2017, 3, 27), Decimal::new(12000, 0))
    }

    #[test]
    fn car_validation() {
        let car = Car::new("1A1 2547", "Audi A3", Decimal::new(450, 0), Decimal::ZERO);
        assert!(car.validate().is_ok());

        let mut bad = car.clone();
        bad.price = Decimal::ZERO;
        assert!(bad.validate().is_err());

        let mut bad = car.clone();
        bad.number_of_km = Decimal::new(-1, 0);
        assert!(bad.validate().is_err());

        let mut bad = car;
        bad.model.clear();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn lease_dates_must_be_ordered() {
        let mut lease = stored_lease();
        assert!(lease.validate().is_ok());

        lease.date_to = date(2017, 3, 24);
        assert!(lease.validate().is_err());

        lease.date_to = lease.date_from;
        assert!(lease.validate().is_ok());

        lease.real_end_date = Some(date(2017, 3, 1));
        assert!(lease.validate().is_err());
    }

    #[test]
    fn lease_requires_positive_references() {
        let mut lease = stored_lease();
        lease.customer.id = None;
        assert!(lease.validate().is_err());

        let mut lease = stored_lease();
        lease.car.id = Some(-4);
        assert!(lease.validate().is_err());
    }

    #[test]
    fn lease_price_is_stored_with_two_decimals() {
        let mut lease = stored_lease();
        assert_eq!(lease.stored_price(), "12000.00");

        lease.price = Decimal::new(12345, 3);
        assert!(lease.validate().is_err());

        lease.price = Decimal::new(-1, 0);
        assert!(lease.validate().is_err());
    }
}

#![allow(dead_code)]

use car_rental::{db, AppState, Car, Customer, Lease};
use chrono::NaiveDate;
use rust_decimal::Decimal;

pub async fn setup_state() -> AppState {
    let db_pool = db::connect_in_memory()
        .await
        .expect("Failed to open in-memory database");
    AppState { db_pool }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn audi() -> Car {
    Car::new("1A1 2547", "Audi A3", Decimal::new(450, 0), Decimal::new(23000, 0))
}

pub fn bmw() -> Car {
    Car::new("1B3 3546", "BMW X6", Decimal::new(340, 0), Decimal::new(45000, 0))
}

pub fn passat() -> Car {
    Car::new("1T5 6784", "VW PASSAT", Decimal::new(467, 0), Decimal::new(57000, 0))
}

pub fn michal() -> Customer {
    Customer::new("Michal Vitek", "Vajanskeho 47", "+420746654738")
}

pub fn jozko() -> Customer {
    Customer::new("Jozko Voracek", "Tlusteho 47", "+420733456980")
}

pub fn david() -> Customer {
    Customer::new("David Konecny", "Lokalni 23", "+420723434580")
}

pub async fn stored_car(state: &AppState, mut car: Car) -> Car {
    state.cars().add_car(&mut car).await.expect("car stored");
    car
}

pub async fn stored_customer(state: &AppState, mut customer: Customer) -> Customer {
    state
        .customers()
        .create_customer(&mut customer)
        .await
        .expect("customer stored");
    customer
}

pub fn lease_of(customer: &Customer, car: &Car, from: NaiveDate, to: NaiveDate) -> Lease {
    Lease::new(
        customer.clone(),
        car.clone(),
        from,
        to,
        Decimal::new(12000, 0),
    )
}

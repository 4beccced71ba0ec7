use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    db::{check_lookup_id, generated_key},
    errors::{unique_violation, RentalError, Result},
    structs::{Car, CarRow},
    utils::require_non_empty,
};

const SELECT_CARS: &str = "SELECT c.id, c.license_plate, c.model, c.price, c.number_of_km, \
     EXISTS(SELECT 1 FROM leases l WHERE l.car_id = c.id AND l.real_end_date IS NULL) AS is_borrowed \
     FROM cars c";

#[derive(Debug, Clone)]
pub struct CarManager {
    db_pool: SqlitePool,
}

impl CarManager {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// Inserts a new car and stores the generated id on it.
    pub async fn add_car(&self, car: &mut Car) -> Result<()> {
        if car.id.is_some() {
            return Err(RentalError::invalid("car is already stored"));
        }
        car.validate()?;

        let mut tx = self.db_pool.begin().await?;
        let rows = sqlx::query(
            "INSERT INTO cars (license_plate, model, price, number_of_km) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(&car.license_plate)
        .bind(&car.model)
        .bind(car.price.to_string())
        .bind(car.number_of_km.to_string())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| write_error(e, car))?;
        let id = generated_key(&rows, &format!("car {}", car.license_plate))?;
        tx.commit().await?;

        car.id = Some(id);
        car.is_borrowed = false;
        log::info!("Car created: {:?}", car);
        Ok(())
    }

    /// Overwrites every stored column of the car with the given values.
    pub async fn edit_car(&self, car: &Car) -> Result<()> {
        let id = car.stored_id()?;
        car.validate()?;

        let mut tx = self.db_pool.begin().await?;
        let result = sqlx::query(
            "UPDATE cars SET license_plate = ?, model = ?, price = ?, number_of_km = ? WHERE id = ?",
        )
        .bind(&car.license_plate)
        .bind(&car.model)
        .bind(car.price.to_string())
        .bind(car.number_of_km.to_string())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, car))?;
        if result.rows_affected() != 1 {
            return Err(RentalError::NotFound { entity: "Car", id });
        }
        tx.commit().await?;

        log::info!("Car updated: {:?}", car);
        Ok(())
    }

    pub async fn delete_car(&self, car: &Car) -> Result<()> {
        let id = car.stored_id()?;

        let mut tx = self.db_pool.begin().await?;
        let result = sqlx::query("DELETE FROM cars WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() != 1 {
            return Err(RentalError::NotFound { entity: "Car", id });
        }
        tx.commit().await?;

        log::info!("Car with id {} deleted", id);
        Ok(())
    }

    pub async fn delete_all_cars(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cars")
            .execute(&self.db_pool)
            .await?;
        log::info!("Deleted {} cars", result.rows_affected());
        Ok(result.rows_affected())
    }

    pub async fn get_all_cars(&self) -> Result<Vec<Car>> {
        let rows = sqlx::query_as::<_, CarRow>(&format!("{SELECT_CARS} ORDER BY c.id"))
            .fetch_all(&self.db_pool)
            .await
            .map_err(|e| {
                log::error!("Failed to get cars: {}", e);
                RentalError::Database(e)
            })?;
        rows.into_iter().map(Car::try_from).collect()
    }

    /// Cars with no open lease.
    pub async fn get_available_cars(&self) -> Result<Vec<Car>> {
        let rows = sqlx::query_as::<_, CarRow>(&format!(
            "{SELECT_CARS} WHERE c.id NOT IN \
             (SELECT car_id FROM leases WHERE real_end_date IS NULL) ORDER BY c.id"
        ))
        .fetch_all(&self.db_pool)
        .await?;
        rows.into_iter().map(Car::try_from).collect()
    }

    pub async fn get_car_by_id(&self, id: i64) -> Result<Option<Car>> {
        check_lookup_id(id)?;
        let mut conn = self.db_pool.acquire().await?;
        fetch_car(&mut conn, id).await
    }

    pub async fn get_car_by_license_plate(&self, license_plate: &str) -> Result<Option<Car>> {
        require_non_empty("license plate", license_plate)?;
        log::debug!("Looking up car {}", license_plate);
        sqlx::query_as::<_, CarRow>(&format!("{SELECT_CARS} WHERE c.license_plate = ?"))
            .bind(license_plate)
            .fetch_optional(&self.db_pool)
            .await?
            .map(Car::try_from)
            .transpose()
    }

    /// True when the car exists and has no open lease.
    pub async fn is_car_available(&self, id: i64) -> Result<bool> {
        let car = self
            .get_car_by_id(id)
            .await?
            .ok_or(RentalError::NotFound { entity: "Car", id })?;
        Ok(!car.is_borrowed)
    }
}

/// Loads one car on an already acquired connection, so it can run inside a
/// caller's transaction.
pub(crate) async fn fetch_car(conn: &mut SqliteConnection, id: i64) -> Result<Option<Car>> {
    log::debug!("Looking up car {}", id);
    sqlx::query_as::<_, CarRow>(&format!("{SELECT_CARS} WHERE c.id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .map(Car::try_from)
        .transpose()
}

fn write_error(err: sqlx::Error, car: &Car) -> RentalError {
    match unique_violation(&err) {
        Some(_) => RentalError::Duplicate(format!(
            "license plate {} is already registered",
            car.license_plate
        )),
        None => {
            log::error!("Failed to write car {}: {}", car.license_plate, err);
            RentalError::Database(err)
        }
    }
}

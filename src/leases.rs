use chrono::NaiveDate;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::{
    cars::fetch_car,
    customers::fetch_customer,
    db::{check_lookup_id, generated_key},
    errors::{unique_violation, RentalError, Result},
    structs::{Car, Customer, Lease, LeaseRow},
};

const SELECT_LEASES: &str = "SELECT l.id, l.date_from, l.date_to, l.real_end_date, l.price, \
     cu.id AS customer_id, cu.name AS customer_name, cu.address AS customer_address, \
     cu.phone_number AS customer_phone_number, \
     c.id AS car_id, c.license_plate AS car_license_plate, c.model AS car_model, \
     c.price AS car_price, c.number_of_km AS car_number_of_km, \
     EXISTS(SELECT 1 FROM leases o WHERE o.car_id = c.id AND o.real_end_date IS NULL) AS car_is_borrowed \
     FROM leases l \
     JOIN customers cu ON cu.id = l.customer_id \
     JOIN cars c ON c.id = l.car_id";

fn select_leases(filter: &str) -> String {
    format!("{SELECT_LEASES} {filter} ORDER BY l.id")
}

/// Leases link customers to cars. Writes check that both referenced rows
/// exist and that a car never has more than one open lease.
#[derive(Debug, Clone)]
pub struct LeaseManager {
    db_pool: SqlitePool,
}

impl LeaseManager {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// Takes the write lock up front so the open-lease guard and the write
    /// see the same state. A competing writer waits for `busy_timeout`.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.db_pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Stores a new lease. On success the lease carries its generated id and
    /// its car is marked as borrowed if the lease is still open.
    pub async fn create_lease(&self, lease: &mut Lease) -> Result<()> {
        if lease.id.is_some() {
            return Err(RentalError::invalid("lease id should not be set"));
        }
        lease.validate()?;
        let customer_id = lease.customer.stored_id()?;
        let car_id = lease.car.stored_id()?;

        let mut tx = self.begin_write().await?;
        check_references(&mut tx, lease, None).await?;

        let rows = sqlx::query(
            "INSERT INTO leases (customer_id, car_id, date_from, date_to, real_end_date, price) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(customer_id)
        .bind(car_id)
        .bind(lease.date_from)
        .bind(lease.date_to)
        .bind(lease.real_end_date)
        .bind(lease.stored_price())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| write_error(e, car_id))?;
        let id = generated_key(&rows, &format!("lease of car {car_id}"))?;
        let borrowed = car_has_open_lease(&mut tx, car_id).await?;
        tx.commit().await?;

        lease.id = Some(id);
        lease.car.is_borrowed = borrowed;
        log::info!("Lease created: {:?}", lease);
        Ok(())
    }

    pub async fn update_lease(&self, lease: &mut Lease) -> Result<()> {
        let id = lease.stored_id()?;
        lease.validate()?;
        let customer_id = lease.customer.stored_id()?;
        let car_id = lease.car.stored_id()?;

        let mut tx = self.begin_write().await?;
        let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM leases WHERE id = ?)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if exists == 0 {
            return Err(RentalError::NotFound { entity: "Lease", id });
        }
        check_references(&mut tx, lease, Some(id)).await?;

        let result = sqlx::query(
            "UPDATE leases SET customer_id = ?, car_id = ?, date_from = ?, date_to = ?, \
             real_end_date = ?, price = ? WHERE id = ?",
        )
        .bind(customer_id)
        .bind(car_id)
        .bind(lease.date_from)
        .bind(lease.date_to)
        .bind(lease.real_end_date)
        .bind(lease.stored_price())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, car_id))?;
        if result.rows_affected() != 1 {
            return Err(RentalError::NotFound { entity: "Lease", id });
        }
        let borrowed = car_has_open_lease(&mut tx, car_id).await?;
        tx.commit().await?;

        lease.car.is_borrowed = borrowed;
        log::info!("Lease updated: {:?}", lease);
        Ok(())
    }

    /// Records the day the car came back, closing the lease.
    pub async fn end_lease(&self, lease: &mut Lease, returned_on: NaiveDate) -> Result<()> {
        let id = lease.stored_id()?;
        let car_id = lease.car.stored_id()?;
        if !lease.is_open() {
            return Err(RentalError::invalid(format!("lease {id} has already ended")));
        }
        if returned_on < lease.date_from {
            return Err(RentalError::invalid(
                "real end date should not be before date from",
            ));
        }

        let mut tx = self.begin_write().await?;
        let result = sqlx::query(
            "UPDATE leases SET real_end_date = ? WHERE id = ? AND real_end_date IS NULL",
        )
        .bind(returned_on)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() != 1 {
            return Err(RentalError::NotFound { entity: "Lease", id });
        }
        let borrowed = car_has_open_lease(&mut tx, car_id).await?;
        tx.commit().await?;

        lease.real_end_date = Some(returned_on);
        lease.car.is_borrowed = borrowed;
        log::info!("Lease {} ended on {}", id, returned_on);
        Ok(())
    }

    pub async fn delete_lease(&self, lease: &mut Lease) -> Result<()> {
        let id = lease.stored_id()?;
        let car_id = lease.car.stored_id()?;

        let mut tx = self.begin_write().await?;
        let result = sqlx::query("DELETE FROM leases WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() != 1 {
            return Err(RentalError::NotFound { entity: "Lease", id });
        }
        let borrowed = car_has_open_lease(&mut tx, car_id).await?;
        tx.commit().await?;

        lease.car.is_borrowed = borrowed;
        log::info!("Lease with id {} deleted", id);
        Ok(())
    }

    pub async fn delete_all_leases(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM leases")
            .execute(&self.db_pool)
            .await?;
        log::info!("Deleted {} leases", result.rows_affected());
        Ok(result.rows_affected())
    }

    pub async fn get_lease_by_id(&self, id: i64) -> Result<Option<Lease>> {
        check_lookup_id(id)?;
        log::debug!("Looking up lease {}", id);
        sqlx::query_as::<_, LeaseRow>(&select_leases("WHERE l.id = ?"))
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .map(Lease::try_from)
            .transpose()
    }

    pub async fn get_all_leases(&self) -> Result<Vec<Lease>> {
        let rows = sqlx::query_as::<_, LeaseRow>(&select_leases(""))
            .fetch_all(&self.db_pool)
            .await
            .map_err(|e| {
                log::error!("Failed to get leases: {}", e);
                RentalError::Database(e)
            })?;
        rows.into_iter().map(Lease::try_from).collect()
    }

    /// Leases whose agreed end (`date_to`) falls on `end_date`.
    pub async fn get_all_leases_by_end_date(&self, end_date: NaiveDate) -> Result<Vec<Lease>> {
        let rows = sqlx::query_as::<_, LeaseRow>(&select_leases("WHERE l.date_to = ?"))
            .bind(end_date)
            .fetch_all(&self.db_pool)
            .await?;
        rows.into_iter().map(Lease::try_from).collect()
    }

    pub async fn find_leases_for_customer(&self, customer: &Customer) -> Result<Vec<Lease>> {
        let customer_id = customer.stored_id()?;
        let rows = sqlx::query_as::<_, LeaseRow>(&select_leases("WHERE l.customer_id = ?"))
            .bind(customer_id)
            .fetch_all(&self.db_pool)
            .await?;
        rows.into_iter().map(Lease::try_from).collect()
    }

    pub async fn find_leases_for_car(&self, car: &Car) -> Result<Vec<Lease>> {
        let car_id = car.stored_id()?;
        let rows = sqlx::query_as::<_, LeaseRow>(&select_leases("WHERE l.car_id = ?"))
            .bind(car_id)
            .fetch_all(&self.db_pool)
            .await?;
        rows.into_iter().map(Lease::try_from).collect()
    }

    pub async fn find_open_lease_for_car(&self, car_id: i64) -> Result<Option<Lease>> {
        check_lookup_id(car_id)?;
        sqlx::query_as::<_, LeaseRow>(&select_leases(
            "WHERE l.car_id = ? AND l.real_end_date IS NULL",
        ))
        .bind(car_id)
        .fetch_optional(&self.db_pool)
        .await?
        .map(Lease::try_from)
        .transpose()
    }
}

/// Runs inside the write transaction: the customer and car must exist, and an
/// open lease may only target a car whose open lease (if any) is `lease_id`.
async fn check_references(
    conn: &mut SqliteConnection,
    lease: &Lease,
    lease_id: Option<i64>,
) -> Result<()> {
    let customer_id = lease.customer.stored_id()?;
    let car_id = lease.car.stored_id()?;

    if fetch_customer(conn, customer_id).await?.is_none() {
        return Err(RentalError::NotFound { entity: "Customer", id: customer_id });
    }
    if fetch_car(conn, car_id).await?.is_none() {
        return Err(RentalError::NotFound { entity: "Car", id: car_id });
    }
    if lease.is_open() {
        let open: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM leases WHERE car_id = ? AND real_end_date IS NULL",
        )
        .bind(car_id)
        .fetch_optional(&mut *conn)
        .await?;
        if let Some(open_id) = open {
            if Some(open_id) != lease_id {
                log::warn!("Car {} already has open lease {}", car_id, open_id);
                return Err(RentalError::CarUnavailable { car_id });
            }
        }
    }
    Ok(())
}

async fn car_has_open_lease(conn: &mut SqliteConnection, car_id: i64) -> Result<bool> {
    let open: i64 = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM leases WHERE car_id = ? AND real_end_date IS NULL)",
    )
    .bind(car_id)
    .fetch_one(conn)
    .await?;
    Ok(open != 0)
}

fn write_error(err: sqlx::Error, car_id: i64) -> RentalError {
    match unique_violation(&err) {
        // only the one-open-lease-per-car index is unique on this table
        Some(_) => RentalError::CarUnavailable { car_id },
        None => {
            log::error!("Failed to write lease of car {}: {}", car_id, err);
            RentalError::Database(err)
        }
    }
}

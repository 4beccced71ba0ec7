use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    db::{check_lookup_id, generated_key},
    errors::{RentalError, Result},
    structs::{Customer, CustomerRow},
};

#[derive(Debug, Clone)]
pub struct CustomerManager {
    db_pool: SqlitePool,
}

impl CustomerManager {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn create_customer(&self, customer: &mut Customer) -> Result<()> {
        if customer.id.is_some() {
            return Err(RentalError::invalid("customer is already stored"));
        }
        customer.validate()?;

        let mut tx = self.db_pool.begin().await?;
        let rows = sqlx::query(
            "INSERT INTO customers (name, address, phone_number) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&customer.name)
        .bind(&customer.address)
        .bind(&customer.phone_number)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            log::error!("Failed to insert customer {}: {}", customer.name, e);
            RentalError::Database(e)
        })?;
        let id = generated_key(&rows, &format!("customer {}", customer.name))?;
        tx.commit().await?;

        customer.id = Some(id);
        log::info!("Customer created: {:?}", customer);
        Ok(())
    }

    pub async fn update_customer(&self, customer: &Customer) -> Result<()> {
        let id = customer.stored_id()?;
        customer.validate()?;

        let mut tx = self.db_pool.begin().await?;
        let result = sqlx::query(
            "UPDATE customers SET name = ?, address = ?, phone_number = ? WHERE id = ?",
        )
        .bind(&customer.name)
        .bind(&customer.address)
        .bind(&customer.phone_number)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() != 1 {
            return Err(RentalError::NotFound { entity: "Customer", id });
        }
        tx.commit().await?;

        log::info!("Customer updated: {:?}", customer);
        Ok(())
    }

    /// Removes the customer together with all of their leases.
    pub async fn delete_customer(&self, customer: &Customer) -> Result<()> {
        let id = customer.stored_id()?;

        let mut tx = self.db_pool.begin().await?;
        let result = sqlx::query("DELETE FROM customers WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() != 1 {
            return Err(RentalError::NotFound { entity: "Customer", id });
        }
        tx.commit().await?;

        log::info!("Customer with id {} deleted", id);
        Ok(())
    }

    pub async fn delete_all_customers(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM customers")
            .execute(&self.db_pool)
            .await?;
        log::info!("Deleted {} customers", result.rows_affected());
        Ok(result.rows_affected())
    }

    pub async fn find_customer_by_id(&self, id: i64) -> Result<Option<Customer>> {
        check_lookup_id(id)?;
        let mut conn = self.db_pool.acquire().await?;
        fetch_customer(&mut conn, id).await
    }

    pub async fn get_all_customers(&self) -> Result<Vec<Customer>> {
        let customers = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, name, address, phone_number FROM customers ORDER BY id",
        )
        .fetch_all(&self.db_pool)
        .await
        .map_err(|e| {
            log::error!("Failed to get customers: {}", e);
            RentalError::Database(e)
        })?;
        Ok(customers.into_iter().map(Customer::from).collect())
    }
}

pub(crate) async fn fetch_customer(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Customer>> {
    log::debug!("Looking up customer {}", id);
    let row = sqlx::query_as::<_, CustomerRow>(
        "SELECT id, name, address, phone_number FROM customers WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(Customer::from))
}

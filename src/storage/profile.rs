use futures::stream::BoxStream;

use super::changes::{observe, Table};
use super::schema::Database;
use super::types::{DatabaseError, ProfileRow};
use crate::model::ChurchProfile;

impl Database {
    // ========================================================================
    // Profile Operations
    // ========================================================================

    pub async fn get_profile(&self) -> Result<Option<ChurchProfile>, DatabaseError> {
        let row: Option<ProfileRow> = sqlx::query_as(
            r#"
            SELECT id, name, logo_url, welcome_message, address, phone, website,
                   email, mission, service_times, social_link
            FROM church_profile
            WHERE id = ?
        "#,
        )
        .bind(ProfileRow::SINGLETON_ID)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ProfileRow::into_profile))
    }

    /// Swap the singleton profile for `profile` (delete then insert, one transaction).
    pub async fn replace_profile(&self, profile: &ChurchProfile) -> Result<(), DatabaseError> {
        let row = ProfileRow::from_profile(profile);

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM church_profile")
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO church_profile (id, name, logo_url, welcome_message, address, phone,
                                        website, email, mission, service_times, social_link)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(row.id)
        .bind(row.name)
        .bind(row.logo_url)
        .bind(row.welcome_message)
        .bind(row.address)
        .bind(row.phone)
        .bind(row.website)
        .bind(row.email)
        .bind(row.mission)
        .bind(row.service_times)
        .bind(row.social_link)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.changes.notify(Table::Profile);
        tracing::debug!("Replaced cached church profile");
        Ok(())
    }

    pub async fn delete_profile(&self) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM church_profile")
            .execute(&self.pool)
            .await?;
        self.changes.notify(Table::Profile);
        Ok(())
    }

    pub fn observe_profile(&self) -> BoxStream<'static, Result<Option<ChurchProfile>, DatabaseError>> {
        let db = self.clone();
        observe(self.changes.subscribe(Table::Profile), move || {
            let db = db.clone();
            async move { db.get_profile().await }
        })
    }
}

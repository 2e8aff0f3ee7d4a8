use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use argon2::{
    Argon2,
    password_hash::{PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, IsolationLevel,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

pub struct UserService;

impl UserService {
    pub fn hash_password(password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
        let argon2 = Argon2::default();
        let parsed_hash =
            argon2::PasswordHash::new(hash).map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    pub async fn find_by_username<C: ConnectionTrait>(
        db: &C,
        username: &str,
    ) -> Result<Option<users::Model>, AppError> {
        Ok(Users::find()
            .filter(users::Column::Username.eq(username))
            .one(db)
            .await?)
    }

    pub async fn get<C: ConnectionTrait>(db: &C, id: &str) -> Result<users::Model, AppError> {
        Users::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Self-registration. The very first account becomes an administrator.
    pub async fn register<C: TransactionTrait + ConnectionTrait>(
        db: &C,
        username: &str,
        password: &str,
    ) -> Result<users::Model, AppError> {
        // Only one of several concurrent registrations may observe an empty table.
        // SQLite already serializes writers.
        let isolation = (db.get_database_backend() == DbBackend::Postgres)
            .then_some(IsolationLevel::Serializable);
        let txn = db.begin_with_config(isolation, None).await?;
        let is_first = Users::find().count(&txn).await? == 0;
        let user = Self::insert_user(&txn, username, password, is_first).await?;
        txn.commit().await?;

        if is_first {
            info!("👑 First user '{}' registered as administrator", user.username);
        }
        Ok(user)
    }

    /// Admin-initiated account creation.
    pub async fn create_user<C: ConnectionTrait>(
        db: &C,
        username: &str,
        password: &str,
        is_admin: bool,
    ) -> Result<users::Model, AppError> {
        Self::insert_user(db, username, password, is_admin).await
    }

    async fn insert_user<C: ConnectionTrait>(
        db: &C,
        username: &str,
        password: &str,
        is_admin: bool,
    ) -> Result<users::Model, AppError> {
        if Self::find_by_username(db, username).await?.is_some() {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }

        let user = users::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            username: Set(username.to_string()),
            password_hash: Set(Self::hash_password(password)?),
            is_active: Set(true),
            is_admin: Set(is_admin),
            created_at: Set(Utc::now()),
        };

        user.insert(db)
            .await
            .map_err(|_e| AppError::Conflict("Username already exists".to_string()))
    }

    /// Unknown users, wrong passwords and deactivated accounts all fail identically.
    pub async fn authenticate<C: ConnectionTrait>(
        db: &C,
        username: &str,
        password: &str,
    ) -> Result<users::Model, AppError> {
        let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

        let user = Self::find_by_username(db, username)
            .await?
            .ok_or_else(invalid)?;

        if !Self::verify_password(password, &user.password_hash)? || !user.is_active {
            return Err(invalid());
        }

        Ok(user)
    }

    pub async fn list_users<C: ConnectionTrait>(db: &C) -> Result<Vec<users::Model>, AppError> {
        Ok(Users::find()
            .order_by_asc(users::Column::CreatedAt)
            .all(db)
            .await?)
    }

    /// Soft activation toggle. The last active account can never be deactivated.
    pub async fn set_active<C: TransactionTrait>(
        db: &C,
        id: &str,
        active: bool,
    ) -> Result<users::Model, AppError> {
        let txn = db.begin().await?;
        let user = Self::get(&txn, id).await?;

        if user.is_active == active {
            txn.commit().await?;
            return Ok(user);
        }

        if !active {
            let active_count = Users::find()
                .filter(users::Column::IsActive.eq(true))
                .count(&txn)
                .await?;
            if active_count <= 1 {
                return Err(AppError::BadRequest(
                    "Cannot deactivate the last active user".to_string(),
                ));
            }
            if user.is_admin && Self::active_admin_count(&txn).await? <= 1 {
                return Err(AppError::BadRequest(
                    "Cannot deactivate the last active administrator".to_string(),
                ));
            }
        }

        let mut model: users::ActiveModel = user.into();
        model.is_active = Set(active);
        let updated = model.update(&txn).await?;

        if !active {
            Tokens::delete_many()
                .filter(tokens::Column::UserId.eq(id))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        info!("👤 User {} active={}", updated.username, updated.is_active);
        Ok(updated)
    }

    pub async fn set_admin<C: TransactionTrait>(
        db: &C,
        id: &str,
        admin: bool,
    ) -> Result<users::Model, AppError> {
        let txn = db.begin().await?;
        let user = Self::get(&txn, id).await?;

        if user.is_admin == admin {
            txn.commit().await?;
            return Ok(user);
        }

        if !admin && user.is_active && Self::active_admin_count(&txn).await? <= 1 {
            return Err(AppError::BadRequest(
                "Cannot revoke the last active administrator".to_string(),
            ));
        }

        let mut model: users::ActiveModel = user.into();
        model.is_admin = Set(admin);
        let updated = model.update(&txn).await?;
        txn.commit().await?;
        Ok(updated)
    }

    pub async fn active_admins<C: ConnectionTrait>(db: &C) -> Result<Vec<users::Model>, AppError> {
        Ok(Users::find()
            .filter(users::Column::IsActive.eq(true))
            .filter(users::Column::IsAdmin.eq(true))
            .all(db)
            .await?)
    }

    async fn active_admin_count<C: ConnectionTrait>(db: &C) -> Result<u64, AppError> {
        Ok(Users::find()
            .filter(users::Column::IsActive.eq(true))
            .filter(users::Column::IsAdmin.eq(true))
            .count(db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = UserService::hash_password("correct horse").unwrap();
        assert!(UserService::verify_password("correct horse", &hash).unwrap());
        assert!(!UserService::verify_password("battery staple", &hash).unwrap());
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Restaurant fields the fee calculator and dispatcher read: location,
/// flat-fee override, commission, happy-hour window.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "restaurants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub name: String,
    pub street: String,
    pub city: String,
    pub sub_city: Option<String>,
    pub latitude: f64,
    pub longitude: f64,

    /// Non-zero value replaces the configured base fee term.
    pub flat_delivery_fee: Decimal,
    pub commission_rate: Decimal,
    pub is_partnered: bool,

    pub happy_hour_enabled: bool,
    pub happy_hour_percent: Decimal,
    /// Comma-separated lowercase weekday names ("mon,tue,wed").
    pub happy_hour_days: Option<String>,
    pub happy_hour_start_date: Option<NaiveDate>,
    pub happy_hour_end_date: Option<NaiveDate>,
    /// "HH:MM"; the window may wrap midnight.
    pub happy_hour_start_time: Option<String>,
    pub happy_hour_end_time: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

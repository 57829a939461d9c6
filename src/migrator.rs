use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_restaurants_table::Migration),
            Box::new(m20260101_000002_create_drivers_table::Migration),
            Box::new(m20260101_000003_create_orders_table::Migration),
            Box::new(m20260101_000004_create_order_items_table::Migration),
            Box::new(m20260101_000005_create_order_status_history_table::Migration),
            Box::new(m20260101_000006_create_driver_assignments_table::Migration),
            Box::new(m20260101_000007_create_deliveries_table::Migration),
        ]
    }
}

mod m20260101_000001_create_restaurants_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000001_create_restaurants_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Restaurants::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Restaurants::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Restaurants::Name).string().not_null())
                        .col(ColumnDef::new(Restaurants::Street).string().not_null())
                        .col(ColumnDef::new(Restaurants::City).string().not_null())
                        .col(ColumnDef::new(Restaurants::SubCity).string().null())
                        .col(ColumnDef::new(Restaurants::Latitude).double().not_null())
                        .col(ColumnDef::new(Restaurants::Longitude).double().not_null())
                        .col(
                            ColumnDef::new(Restaurants::FlatDeliveryFee)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Restaurants::CommissionRate)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Restaurants::IsPartnered)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Restaurants::HappyHourEnabled)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Restaurants::HappyHourPercent)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Restaurants::HappyHourDays).string().null())
                        .col(
                            ColumnDef::new(Restaurants::HappyHourStartDate)
                                .date()
                                .null(),
                        )
                        .col(ColumnDef::new(Restaurants::HappyHourEndDate).date().null())
                        .col(
                            ColumnDef::new(Restaurants::HappyHourStartTime)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Restaurants::HappyHourEndTime)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Restaurants::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Restaurants::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Restaurants::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Restaurants {
        Table,
        Id,
        Name,
        Street,
        City,
        SubCity,
        Latitude,
        Longitude,
        FlatDeliveryFee,
        CommissionRate,
        IsPartnered,
        HappyHourEnabled,
        HappyHourPercent,
        HappyHourDays,
        HappyHourStartDate,
        HappyHourEndDate,
        HappyHourStartTime,
        HappyHourEndTime,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20260101_000002_create_drivers_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000002_create_drivers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Drivers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Drivers::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Drivers::Name).string().not_null())
                        .col(
                            ColumnDef::new(Drivers::IsAvailable)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Drivers::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Drivers::VerificationStatus)
                                .string()
                                .not_null()
                                .default("pending"),
                        )
                        .col(ColumnDef::new(Drivers::VehicleType).string().not_null())
                        .col(ColumnDef::new(Drivers::CurrentLatitude).double().null())
                        .col(ColumnDef::new(Drivers::CurrentLongitude).double().null())
                        .col(
                            ColumnDef::new(Drivers::Rating)
                                .double()
                                .not_null()
                                .default(5.0),
                        )
                        .col(
                            ColumnDef::new(Drivers::CompletedDeliveries)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Drivers::LastSeenAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Drivers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Drivers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Drivers::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Drivers {
        Table,
        Id,
        Name,
        IsAvailable,
        IsActive,
        VerificationStatus,
        VehicleType,
        CurrentLatitude,
        CurrentLongitude,
        Rating,
        CompletedDeliveries,
        LastSeenAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20260101_000003_create_orders_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000003_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Orders::RestaurantId).uuid().not_null())
                        .col(ColumnDef::new(Orders::DriverId).uuid().null())
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(ColumnDef::new(Orders::PaymentStatus).string().not_null())
                        .col(ColumnDef::new(Orders::PaymentMethod).string().not_null())
                        .col(ColumnDef::new(Orders::FlowType).string().not_null())
                        .col(ColumnDef::new(Orders::DeliveryStreet).string().not_null())
                        .col(ColumnDef::new(Orders::DeliveryCity).string().not_null())
                        .col(ColumnDef::new(Orders::DeliverySubCity).string().null())
                        .col(ColumnDef::new(Orders::DeliveryLatitude).double().not_null())
                        .col(
                            ColumnDef::new(Orders::DeliveryLongitude)
                                .double()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::Subtotal)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::Discount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::DeliveryFee)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::ServiceFee)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Tip).decimal().not_null().default(0))
                        .col(
                            ColumnDef::new(Orders::TotalAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::CancellationReason).string().null())
                        .col(ColumnDef::new(Orders::VerificationCode).string().null())
                        .col(
                            ColumnDef::new(Orders::VerificationExpiresAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::VerificationAttempts)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::VerifiedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Orders::ReceiptAmount).decimal().null())
                        .col(ColumnDef::new(Orders::ReceiptImageRef).string().null())
                        .col(
                            ColumnDef::new(Orders::ConfirmedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::DeliveredAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::CancelledAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_orders_driver_id")
                        .table(Orders::Table)
                        .col(Orders::DriverId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Orders {
        Table,
        Id,
        CustomerId,
        RestaurantId,
        DriverId,
        Status,
        PaymentStatus,
        PaymentMethod,
        FlowType,
        DeliveryStreet,
        DeliveryCity,
        DeliverySubCity,
        DeliveryLatitude,
        DeliveryLongitude,
        Subtotal,
        Discount,
        DeliveryFee,
        ServiceFee,
        Tip,
        TotalAmount,
        CancellationReason,
        VerificationCode,
        VerificationExpiresAt,
        VerificationAttempts,
        VerifiedAt,
        ReceiptAmount,
        ReceiptImageRef,
        ConfirmedAt,
        DeliveredAt,
        CancelledAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20260101_000004_create_order_items_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000004_create_order_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::Name).string().not_null())
                        .col(ColumnDef::new(OrderItems::UnitPrice).decimal().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(OrderItems::Subtotal).decimal().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        Name,
        UnitPrice,
        Quantity,
        Subtotal,
    }
}

mod m20260101_000005_create_order_status_history_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000005_create_order_status_history_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderStatusHistory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderStatusHistory::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusHistory::OrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusHistory::OldStatus)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusHistory::NewStatus)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusHistory::ActorRole)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderStatusHistory::ActorId).uuid().null())
                        .col(
                            ColumnDef::new(OrderStatusHistory::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_order_status_history_order_id")
                        .table(OrderStatusHistory::Table)
                        .col(OrderStatusHistory::OrderId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderStatusHistory::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum OrderStatusHistory {
        Table,
        Id,
        OrderId,
        OldStatus,
        NewStatus,
        ActorRole,
        ActorId,
        CreatedAt,
    }
}

mod m20260101_000006_create_driver_assignments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000006_create_driver_assignments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DriverAssignments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DriverAssignments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DriverAssignments::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(DriverAssignments::DriverId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DriverAssignments::Status)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DriverAssignments::OfferedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DriverAssignments::RespondedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_driver_assignments_order_id")
                        .table(DriverAssignments::Table)
                        .col(DriverAssignments::OrderId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DriverAssignments::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum DriverAssignments {
        Table,
        Id,
        OrderId,
        DriverId,
        Status,
        OfferedAt,
        RespondedAt,
    }
}

mod m20260101_000007_create_deliveries_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000007_create_deliveries_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Deliveries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Deliveries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Deliveries::OrderId).uuid().not_null())
                        .col(ColumnDef::new(Deliveries::DriverId).uuid().not_null())
                        .col(ColumnDef::new(Deliveries::Status).string().not_null())
                        .col(ColumnDef::new(Deliveries::PickupAddress).string().not_null())
                        .col(ColumnDef::new(Deliveries::PickupLatitude).double().not_null())
                        .col(
                            ColumnDef::new(Deliveries::PickupLongitude)
                                .double()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Deliveries::DropoffAddress)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Deliveries::DropoffLatitude)
                                .double()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Deliveries::DropoffLongitude)
                                .double()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Deliveries::DistanceKm).double().not_null())
                        .col(
                            ColumnDef::new(Deliveries::ProofOfDeliveryRef)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Deliveries::AssignedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Deliveries::PickedUpAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Deliveries::DeliveredAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_deliveries_order_id")
                        .table(Deliveries::Table)
                        .col(Deliveries::OrderId)
                        .unique()
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Deliveries::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Deliveries {
        Table,
        Id,
        OrderId,
        DriverId,
        Status,
        PickupAddress,
        PickupLatitude,
        PickupLongitude,
        DropoffAddress,
        DropoffLatitude,
        DropoffLongitude,
        DistanceKm,
        ProofOfDeliveryRef,
        AssignedAt,
        PickedUpAt,
        DeliveredAt,
    }
}

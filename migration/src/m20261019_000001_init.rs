use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ========== LOCATIONS ==========
        manager
            .create_table(
                Table::create()
                    .table(Locations::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Locations::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Locations::Name).string_len(100).not_null())
                    .col(ColumnDef::new(Locations::Description).text())
                    .col(ColumnDef::new(Locations::Latitude).double())
                    .col(ColumnDef::new(Locations::Longitude).double())
                    .col(ColumnDef::new(Locations::Altitude).double())
                    .col(ColumnDef::new(Locations::Building).string_len(100))
                    .col(ColumnDef::new(Locations::Floor).string_len(50))
                    .col(ColumnDef::new(Locations::Room).string_len(100))
                    .col(ColumnDef::new(Locations::Zone).string_len(100))
                    .col(ColumnDef::new(Locations::ResponsiblePerson).string_len(100))
                    .col(ColumnDef::new(Locations::Phone).string_len(20))
                    .col(ColumnDef::new(Locations::Email).string_len(100))
                    .col(
                        ColumnDef::new(Locations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Locations::UpdatedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Locations::Version).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        // Case-insensitive unique index on location name
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS locations_name_lower_idx ON locations (LOWER(name))",
            )
            .await?;

        // ========== SENSORS ==========
        manager
            .create_table(
                Table::create()
                    .table(Sensors::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Sensors::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Sensors::Name).string_len(100).not_null())
                    .col(ColumnDef::new(Sensors::SensorType).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Sensors::DeviceId)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Sensors::LocationId).uuid().not_null())
                    .col(ColumnDef::new(Sensors::IsActive).boolean().not_null().default(true))
                    .col(ColumnDef::new(Sensors::Model).string_len(100))
                    .col(ColumnDef::new(Sensors::Manufacturer).string_len(100))
                    .col(ColumnDef::new(Sensors::SerialNumber).string_len(100).unique_key())
                    .col(ColumnDef::new(Sensors::Description).text())
                    .col(ColumnDef::new(Sensors::Unit).string_len(20))
                    .col(ColumnDef::new(Sensors::MinValue).double())
                    .col(ColumnDef::new(Sensors::MaxValue).double())
                    .col(
                        ColumnDef::new(Sensors::UpdateInterval)
                            .integer()
                            .not_null()
                            .default(60),
                    )
                    .col(ColumnDef::new(Sensors::AlertThresholdMin).double())
                    .col(ColumnDef::new(Sensors::AlertThresholdMax).double())
                    .col(ColumnDef::new(Sensors::InstallationDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Sensors::LastCalibration).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Sensors::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Sensors::UpdatedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Sensors::Version).big_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sensors_location")
                            .from(Sensors::Table, Sensors::LocationId)
                            .to(Locations::Table, Locations::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sensors_location")
                    .table(Sensors::Table)
                    .col(Sensors::LocationId)
                    .to_owned(),
            )
            .await?;

        // ========== READINGS ==========
        manager
            .create_table(
                Table::create()
                    .table(Readings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Readings::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Readings::SensorId).uuid().not_null())
                    .col(ColumnDef::new(Readings::Value).double().not_null())
                    .col(
                        ColumnDef::new(Readings::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Readings::ReceivedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Readings::QualityScore)
                            .double()
                            .not_null()
                            .default(1.0),
                    )
                    .col(ColumnDef::new(Readings::IsValid).boolean().not_null().default(true))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_readings_sensor")
                            .from(Readings::Table, Readings::SensorId)
                            .to(Sensors::Table, Sensors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Sensor history lookups, newest first
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_readings_sensor_time ON readings (sensor_id, timestamp DESC)",
            )
            .await?;

        // ========== ALERTS ==========
        // No foreign key: resolved alerts outlive their sensor.
        manager
            .create_table(
                Table::create()
                    .table(Alerts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Alerts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Alerts::SensorId).uuid().not_null())
                    .col(ColumnDef::new(Alerts::AlertType).string_len(32).not_null())
                    .col(ColumnDef::new(Alerts::Severity).string_len(16).not_null())
                    .col(ColumnDef::new(Alerts::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Alerts::Title).string_len(200).not_null())
                    .col(ColumnDef::new(Alerts::Message).text().not_null())
                    .col(ColumnDef::new(Alerts::ExceededBound).string_len(8))
                    .col(ColumnDef::new(Alerts::ThresholdValue).double())
                    .col(ColumnDef::new(Alerts::ActualValue).double())
                    .col(
                        ColumnDef::new(Alerts::TriggeredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alerts::AcknowledgedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Alerts::AcknowledgedBy).string_len(100))
                    .col(ColumnDef::new(Alerts::ResolvedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Alerts::ResolvedBy).string_len(100))
                    .col(ColumnDef::new(Alerts::Version).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_alerts_sensor_status")
                    .table(Alerts::Table)
                    .col(Alerts::SensorId)
                    .col(Alerts::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alerts::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Readings::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sensors::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Locations::Table).if_exists().to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum Locations {
    Table,
    Id,
    Name,
    Description,
    Latitude,
    Longitude,
    Altitude,
    Building,
    Floor,
    Room,
    Zone,
    ResponsiblePerson,
    Phone,
    Email,
    CreatedAt,
    UpdatedAt,
    Version,
}

#[derive(DeriveIden)]
pub enum Sensors {
    Table,
    Id,
    Name,
    SensorType,
    DeviceId,
    LocationId,
    IsActive,
    Model,
    Manufacturer,
    SerialNumber,
    Description,
    Unit,
    MinValue,
    MaxValue,
    UpdateInterval,
    AlertThresholdMin,
    AlertThresholdMax,
    InstallationDate,
    LastCalibration,
    CreatedAt,
    UpdatedAt,
    Version,
}

#[derive(DeriveIden)]
pub enum Readings {
    Table,
    Id,
    SensorId,
    Value,
    Timestamp,
    ReceivedAt,
    QualityScore,
    IsValid,
}

#[derive(DeriveIden)]
pub enum Alerts {
    Table,
    Id,
    SensorId,
    AlertType,
    Severity,
    Status,
    Title,
    Message,
    ExceededBound,
    ThresholdValue,
    ActualValue,
    TriggeredAt,
    AcknowledgedAt,
    AcknowledgedBy,
    ResolvedAt,
    ResolvedBy,
    Version,
}

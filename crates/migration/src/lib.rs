pub use sea_orm_migration::prelude::*;

mod m20260630_000001_init;
mod m20260718_000002_debts;
mod m20260801_000003_schedules;
mod m20260809_000004_history_bin;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260630_000001_init::Migration),
            Box::new(m20260718_000002_debts::Migration),
            Box::new(m20260801_000003_schedules::Migration),
            Box::new(m20260809_000004_history_bin::Migration),
        ]
    }
}

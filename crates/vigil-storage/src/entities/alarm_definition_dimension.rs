use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "alarm_definition_dimensions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub alarm_definition_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub dimension_name: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub value: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
